pub mod forwarder;

pub use forwarder::{ForwardError, ForwardResult, Forwarder, UpstreamResponse};
