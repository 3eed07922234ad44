//! Request decorators layered over an [`HttpClient`](super::HttpClient).

mod header;
mod url_param;

pub use header::Header;
pub use url_param::UrlParam;
