use std::sync::Mutex;
use std::time::{Duration, Instant};

struct State {
    last_hit: Option<Instant>,
    deactivated: bool,
}

/// Tracks viewer activity for a single stream from segment-file requests. A stream
/// is reported "active" for `active_window` after its last hit, which absorbs
/// normal HLS polling gaps; the spec's separate hot/active windows collapse into
/// this one, since `is_active()` is the only thing ever observed either way. Plain
/// imperative methods — no chaining, no shared fluent builder.
pub struct Liveness {
    state: Mutex<State>,
    active_window: Duration,
}

impl Liveness {
    pub fn new(active_window: Duration) -> Self {
        Liveness {
            state: Mutex::new(State { last_hit: None, deactivated: false }),
            active_window,
        }
    }

    /// Records a viewer request (a playlist or segment fetch).
    pub fn hit(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last_hit = Some(Instant::now());
        state.deactivated = false;
    }

    /// Forces the tracker idle regardless of recent hits.
    pub fn deactivate(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.deactivated = true;
    }

    pub fn is_active(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.deactivated {
            return false;
        }
        match state.last_hit {
            Some(last) => last.elapsed() < self.active_window,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn starts_inactive() {
        let l = Liveness::new(Duration::from_secs(60));
        assert!(!l.is_active());
    }

    #[test]
    fn hit_makes_active() {
        let l = Liveness::new(Duration::from_secs(60));
        l.hit();
        assert!(l.is_active());
    }

    #[test]
    fn goes_idle_after_window() {
        let l = Liveness::new(Duration::from_millis(20));
        l.hit();
        assert!(l.is_active());
        sleep(Duration::from_millis(40));
        assert!(!l.is_active());
    }

    #[test]
    fn deactivate_forces_idle() {
        let l = Liveness::new(Duration::from_secs(60));
        l.hit();
        assert!(l.is_active());
        l.deactivate();
        assert!(!l.is_active());
    }

    #[test]
    fn hit_after_deactivate_reactivates() {
        let l = Liveness::new(Duration::from_secs(60));
        l.deactivate();
        l.hit();
        assert!(l.is_active());
    }
}
