// Metric name/help strings below are fixed literals, so `IntGauge::new`/`IntCounter::new`
// can only fail on a malformed name — never at these call sites. `unwrap_used` is denied
// crate-wide; allow it locally rather than widen the lint everywhere else.
#![allow(clippy::unwrap_used)]

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static STREAMS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("streams_running", "number of streams currently running").unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

pub static TRANSCODER_RESTARTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "transcoder_restarts_total",
        "number of times a transcoder process was restarted",
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static TRANSCODER_CRASHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "transcoder_crashes_total",
        "number of times a transcoder process exited unexpectedly",
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static BLACKLIST_BANS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("blacklist_bans_total", "number of sources banned for repeated failure").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Renders the registry in the Prometheus text exposition format.
pub fn render() -> String {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    let mfs = REGISTRY.gather();
    encoder.encode(&mfs, &mut buf).ok();
    String::from_utf8(buf).unwrap_or_default()
}
