pub mod remote_caller;
pub mod request_builder;
pub mod result_writer;

pub use remote_caller::{classify_response, RemoteCaller};
pub use request_builder::{ChatRequest, OutboundPayload, RequestBuilder};
pub use result_writer::{sanitize_name, ResultWriter};
