//! Static page acquisition over plain HTTP.
//!
//! Used when a page cannot be rendered, or rendering yields no preview
//! candidates and the static HTML might.

pub mod encoding;
pub mod http_client;

pub use http_client::{HttpClient, HttpResponse};
