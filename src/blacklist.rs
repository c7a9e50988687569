use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Record {
    count: u32,
    banned_until: Option<Instant>,
}

impl Record {
    fn new() -> Self {
        Record { count: 0, banned_until: None }
    }

    fn is_banned(&self, now: Instant) -> bool {
        matches!(self.banned_until, Some(until) if until > now)
    }
}

struct Inner {
    records: Mutex<HashMap<String, Record>>,
    limit: u32,
    ban_duration: Duration,
}

/// Failure blacklist: a URI that fails to start repeatedly is banned for a fixed
/// duration. Rather than a nilable pointer whose methods no-op on a nil receiver,
/// "blacklisting turned off" is its own variant chosen once at construction —
/// callers never need to branch on whether the feature is enabled.
pub enum Blacklist {
    Enabled(Inner),
    Disabled,
}

impl Blacklist {
    pub fn enabled(limit: u32, ban_duration: Duration) -> Self {
        Blacklist::Enabled(Inner {
            records: Mutex::new(HashMap::new()),
            limit,
            ban_duration,
        })
    }

    pub fn disabled() -> Self {
        Blacklist::Disabled
    }

    /// Records a failure for `uri`. Once the failure count exceeds the configured
    /// limit, the entry is banned for `ban_duration` and its count reset.
    pub fn add_or_increase(&self, uri: &str) {
        let inner = match self {
            Blacklist::Disabled => return,
            Blacklist::Enabled(inner) => inner,
        };

        let now = Instant::now();
        let mut records = inner.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records.entry(uri.to_string()).or_insert_with(Record::new);

        if record.is_banned(now) {
            tracing::debug!(uri, "already banned, skipping");
            return;
        }

        record.count += 1;
        if record.count > inner.limit {
            record.banned_until = Some(now + inner.ban_duration);
            record.count = 0;
            crate::metrics::BLACKLIST_BANS_TOTAL.inc();
            tracing::info!(uri, "source banned after repeated failures");
        }
    }

    pub fn is_banned(&self, uri: &str) -> bool {
        let inner = match self {
            Blacklist::Disabled => return false,
            Blacklist::Enabled(inner) => inner,
        };
        let now = Instant::now();
        let records = inner.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(uri).is_some_and(|r| r.is_banned(now))
    }

    pub fn remove(&self, uri: &str) {
        let inner = match self {
            Blacklist::Disabled => return,
            Blacklist::Enabled(inner) => inner,
        };
        let mut records = inner.records.lock().unwrap_or_else(|e| e.into_inner());
        records.remove(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_never_bans() {
        let bl = Blacklist::disabled();
        for _ in 0..10 {
            bl.add_or_increase("rtsp://cam/1");
        }
        assert!(!bl.is_banned("rtsp://cam/1"));
    }

    #[test]
    fn bans_after_limit_exceeded() {
        let bl = Blacklist::enabled(2, Duration::from_secs(60));
        assert!(!bl.is_banned("rtsp://cam/1"));
        bl.add_or_increase("rtsp://cam/1");
        assert!(!bl.is_banned("rtsp://cam/1"));
        bl.add_or_increase("rtsp://cam/1");
        assert!(!bl.is_banned("rtsp://cam/1"));
        bl.add_or_increase("rtsp://cam/1");
        assert!(bl.is_banned("rtsp://cam/1"));
    }

    #[test]
    fn remove_clears_ban() {
        let bl = Blacklist::enabled(1, Duration::from_secs(60));
        bl.add_or_increase("rtsp://cam/1");
        bl.add_or_increase("rtsp://cam/1");
        assert!(bl.is_banned("rtsp://cam/1"));
        bl.remove("rtsp://cam/1");
        assert!(!bl.is_banned("rtsp://cam/1"));
    }

    #[test]
    fn independent_uris_tracked_separately() {
        let bl = Blacklist::enabled(1, Duration::from_secs(60));
        bl.add_or_increase("rtsp://cam/1");
        bl.add_or_increase("rtsp://cam/1");
        assert!(bl.is_banned("rtsp://cam/1"));
        assert!(!bl.is_banned("rtsp://cam/2"));
    }
}
