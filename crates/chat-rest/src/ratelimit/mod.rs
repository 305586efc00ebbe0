//! Rate limit tracking

mod headers;
mod tracker;

pub use headers::{
    RateLimitHeaders, HEADER_BUCKET, HEADER_DATE, HEADER_GLOBAL, HEADER_LIMIT, HEADER_REMAINING,
    HEADER_RESET, HEADER_RESET_AFTER, HEADER_RETRY_AFTER,
};
pub use tracker::{BucketSnapshot, RateLimitTracker};
