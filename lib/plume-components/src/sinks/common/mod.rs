//! Building blocks shared by several sinks.

mod http;
pub use self::http::{HttpTransport, HttpTransportConfiguration, TransportError};
