use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatterbox.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("chatterbox.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatterbox.client.request_duration_seconds");
pub(crate) static CLIENT_MODEL_LISTINGS: Counter =
    Counter::new("chatterbox.client.model_listings");

pub(crate) static STREAM_RECORDS: Counter = Counter::new("chatterbox.stream.records");
pub(crate) static STREAM_MALFORMED_RECORDS: Counter =
    Counter::new("chatterbox.stream.malformed_records");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatterbox.stream.bytes");

pub(crate) static SESSION_TURNS: Counter = Counter::new("chatterbox.session.turns");
pub(crate) static SESSION_CANCELLATIONS: Counter =
    Counter::new("chatterbox.session.cancellations");
pub(crate) static SESSION_FAILURES: Counter = Counter::new("chatterbox.session.failures");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("chatterbox.session.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);
    collector.register_counter(&CLIENT_MODEL_LISTINGS);

    collector.register_counter(&STREAM_RECORDS);
    collector.register_counter(&STREAM_MALFORMED_RECORDS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_CANCELLATIONS);
    collector.register_counter(&SESSION_FAILURES);
    collector.register_moments(&SESSION_TURN_DURATION);
}
