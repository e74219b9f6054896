use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref FRAMES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_frames_total",
        "Total sensor frames received from the peripheral"
    ))
    .unwrap();
    pub static ref FRAME_DECODE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_frame_decode_failures_total",
        "Total malformed sensor frames dropped"
    ))
    .unwrap();
    pub static ref ENVELOPES_PUBLISHED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_envelopes_published_total",
        "Total envelopes handed to the transport"
    ))
    .unwrap();
    pub static ref FRAMES_DROPPED_DISCONNECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_frames_dropped_disconnected_total",
        "Total readings dropped while the transport was disconnected"
    ))
    .unwrap();
    pub static ref CHANNEL_FULL_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_channel_full_total",
        "Total number of times the frame channel was full (backpressure events)"
    ))
    .unwrap();
    pub static ref COMMANDS_APPLIED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_commands_applied_total",
        "Total Start/Stop commands applied to the capture session"
    ))
    .unwrap();
    pub static ref COMMANDS_IGNORED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_commands_ignored_total",
        "Total unrecognized commands applied as no-ops"
    ))
    .unwrap();
    pub static ref MARKER_WRITES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_marker_writes_total",
        "Total capture markers written to the peripheral"
    ))
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(FRAMES_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(FRAME_DECODE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(ENVELOPES_PUBLISHED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(FRAMES_DROPPED_DISCONNECTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(CHANNEL_FULL_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(COMMANDS_APPLIED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(COMMANDS_IGNORED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(MARKER_WRITES_TOTAL.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
