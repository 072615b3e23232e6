pub mod atomic_file;
pub mod http_client;
pub mod mock_http;

pub use http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use mock_http::{MockHttpClient, MockReply, RecordedCall};
