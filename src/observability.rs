use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("dialchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("dialchat.client.request_errors");
pub(crate) static CLIENT_MALFORMED_RESPONSES: Counter =
    Counter::new("dialchat.client.malformed_responses");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("dialchat.client.request_duration_seconds");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("dialchat.stream.frames");
pub(crate) static STREAM_MALFORMED_FRAMES: Counter =
    Counter::new("dialchat.stream.malformed_frames");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("dialchat.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("dialchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("dialchat.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("dialchat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("dialchat.stream.duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("dialchat.session.turns");
pub(crate) static SESSION_ROLLBACKS: Counter = Counter::new("dialchat.session.rollbacks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_MALFORMED_RESPONSES);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_MALFORMED_FRAMES);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_ROLLBACKS);
}
