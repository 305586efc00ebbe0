//! # chat-rest
//!
//! Rate limited REST execution.
//!
//! Requests are keyed by route template and major parameter, delayed until
//! their bucket (and the global limit) allows them, retried on 429, and
//! mapped onto the typed errors of `chat-common`.

pub mod executor;
pub mod ratelimit;
pub mod request;
pub mod route;
pub mod transport;

pub use executor::{RestExecutor, RestResponse};
pub use ratelimit::{BucketSnapshot, RateLimitHeaders, RateLimitTracker};
pub use request::{FileAttachment, RequestBody, RestRequest};
pub use route::{Endpoint, Route, RouteKey};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

pub use reqwest::Method;
