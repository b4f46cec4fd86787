pub mod parser;
pub mod reactor;

pub use parser::{RequestLine, RequestLineError};
pub use reactor::{ConnectionServer, MAX_REQUEST_LINE_BYTES};
