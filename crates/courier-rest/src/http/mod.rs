//! HTTP transport seam
//!
//! The dispatcher talks to the network only through [`HttpClient`], so tests
//! can script responses without opening sockets.

mod client;
mod reqwest_client;

pub use client::{HttpClient, HttpRequest, HttpResponse, TransportError, TransportErrorKind};
pub use reqwest_client::ReqwestHttpClient;
