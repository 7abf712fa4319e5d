use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("termai.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("termai.client.request_errors");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("termai.stream.chunks");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("termai.stream.fragments");
pub(crate) static STREAM_BYTES: Counter = Counter::new("termai.stream.bytes");

pub(crate) static SESSION_TURNS: Counter = Counter::new("termai.session.turns");
pub(crate) static SESSION_TURN_ERRORS: Counter = Counter::new("termai.session.turn_errors");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("termai.session.turn_duration_seconds");
pub(crate) static SESSION_COMMANDS: Counter = Counter::new("termai.session.commands");
pub(crate) static SESSION_SAVES: Counter = Counter::new("termai.session.saves");

pub(crate) static REMOTE_REQUESTS: Counter = Counter::new("termai.remote.requests");
pub(crate) static REMOTE_ERRORS: Counter = Counter::new("termai.remote.errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_TURN_ERRORS);
    collector.register_moments(&SESSION_TURN_DURATION);
    collector.register_counter(&SESSION_COMMANDS);
    collector.register_counter(&SESSION_SAVES);

    collector.register_counter(&REMOTE_REQUESTS);
    collector.register_counter(&REMOTE_ERRORS);
}

/// Environment variable holding the log filter.
pub const LOG_FILTER_VARIABLE: &str = "TERMAI_LOG";

/// Install the stderr tracing subscriber.
///
/// The filter comes from `TERMAI_LOG` and defaults to `warn`, so diagnostics
/// stay out of the way of streamed output.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_FILTER_VARIABLE)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
