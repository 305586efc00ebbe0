//! REST executor
//!
//! One [`RestExecutor::execute`] call is one observable result, even though
//! it may wait on rate limits and retry internally.

use chat_common::{
    ClientConfig, ClientError, ClientResult, NotFoundKind, PermissionKind, RequestSnapshot,
    ResponseSnapshot, RestContext, RestErrorBody,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::ratelimit::{RateLimitHeaders, RateLimitTracker};
use crate::request::RestRequest;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/seung/chat-client, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Used when a 429 carries no usable retry hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
/// Base delay before retrying a 5xx or connect failure
const SERVER_ERROR_BACKOFF: Duration = Duration::from_millis(500);
const SERVER_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Successful response
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| ClientError::malformed(format!("response body: {e}")))
    }

    pub fn json_value(&self) -> ClientResult<serde_json::Value> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        self.json()
    }
}

pub struct RestExecutor {
    transport: Arc<dyn HttpTransport>,
    tracker: Arc<RateLimitTracker>,
    base_url: String,
    authorization: String,
    max_retries: u32,
    closed: watch::Sender<bool>,
}

impl RestExecutor {
    pub fn new(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let token = config.token.trim();
        let authorization = if token.starts_with("Bot ") || token.starts_with("Bearer ") {
            token.to_string()
        } else {
            format!("Bot {token}")
        };

        Self {
            transport,
            tracker: Arc::new(RateLimitTracker::new()),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            authorization,
            max_retries: config.rest.max_retries,
            closed: watch::Sender::new(false),
        }
    }

    /// Executor backed by `reqwest` with the configured timeout
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config.rest_timeout())
            .map_err(|e| ClientError::network(e.message, false))?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    /// Reject new calls and abort calls waiting on a rate limit
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: RestRequest) -> ClientResult<T> {
        self.execute(request).await?.json()
    }

    pub async fn execute(&self, request: RestRequest) -> ClientResult<RestResponse> {
        let mut closed = self.closed.subscribe();
        let snapshot = request.snapshot();
        let route = request.route();
        let mut attempt: u32 = 0;

        loop {
            if *closed.borrow() {
                return Err(ClientError::ClientClosed);
            }

            loop {
                let wait = self.tracker.reserve(route);
                if wait.is_zero() {
                    break;
                }
                sleep_or_closed(wait, &mut closed).await?;
            }

            tracing::debug!(
                route = %route.key,
                path = %snapshot.path,
                attempt,
                "Sending REST request"
            );

            let response = match self.transport.send(self.http_request(&request)).await {
                Ok(response) => response,
                Err(e) if e.connect && attempt < self.max_retries => {
                    self.tracker.release(route);
                    attempt += 1;
                    let delay = server_error_backoff(attempt);
                    tracing::warn!(route = %route.key, error = %e, attempt, "Connect failure, retrying");
                    sleep_or_closed(delay, &mut closed).await?;
                    continue;
                }
                Err(e) => {
                    self.tracker.release(route);
                    tracing::warn!(route = %route.key, error = %e, "REST request failed");
                    return Err(ClientError::network(e.message, e.connect));
                }
            };

            let headers = RateLimitHeaders::parse(&response.headers);

            match response.status {
                200..=299 => {
                    self.tracker.update(route, &headers);
                    return Ok(RestResponse {
                        status: response.status,
                        headers: response.headers,
                        body: response.body,
                    });
                }
                429 => {
                    let body = RestErrorBody::parse(&response.body);
                    let retry_after = headers
                        .retry_after
                        .or_else(|| {
                            body.retry_after
                                .filter(|s| s.is_finite() && *s >= 0.0)
                                .map(Duration::from_secs_f64)
                        })
                        .unwrap_or(DEFAULT_RETRY_AFTER);
                    let global = headers.global || body.global == Some(true);

                    // Learn the bucket hash and clock offset before emptying the bucket
                    self.tracker.update(route, &headers);
                    self.tracker.rate_limited(route, retry_after, global);

                    if attempt >= self.max_retries {
                        tracing::warn!(
                            route = %route.key,
                            attempts = attempt + 1,
                            "Rate limited and out of retries"
                        );
                        return Err(ClientError::RateLimited {
                            route: route.key.to_string(),
                            retry_after,
                            global,
                        });
                    }
                    attempt += 1;
                    tracing::debug!(
                        route = %route.key,
                        retry_after_ms = retry_after.as_millis() as u64,
                        global,
                        attempt,
                        "Received 429, retrying"
                    );
                }
                502..=504 if attempt < self.max_retries => {
                    self.tracker.update(route, &headers);
                    attempt += 1;
                    let delay = server_error_backoff(attempt);
                    tracing::warn!(
                        route = %route.key,
                        status = response.status,
                        attempt,
                        "Server unavailable, retrying"
                    );
                    sleep_or_closed(delay, &mut closed).await?;
                }
                status => {
                    self.tracker.update(route, &headers);
                    let error = map_error(status, snapshot, response);
                    tracing::debug!(error = %error, "REST request returned an error");
                    return Err(error);
                }
            }
        }
    }

    fn http_request(&self, request: &RestRequest) -> HttpRequest {
        let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
        if request.authorized {
            headers.push(("Authorization".to_string(), self.authorization.clone()));
        }
        if let Some(reason) = &request.audit_reason {
            headers.push(("X-Audit-Log-Reason".to_string(), reason.clone()));
        }

        HttpRequest {
            method: request.route.key.method.clone(),
            url: format!("{}{}", self.base_url, request.route.path),
            query: request.query.clone(),
            headers,
            body: request.body.clone(),
        }
    }
}

async fn sleep_or_closed(duration: Duration, closed: &mut watch::Receiver<bool>) -> ClientResult<()> {
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        _ = closed.wait_for(|closed| *closed) => Err(ClientError::ClientClosed),
    }
}

fn server_error_backoff(attempt: u32) -> Duration {
    SERVER_ERROR_BACKOFF
        .saturating_mul(1 << attempt.saturating_sub(1).min(8))
        .min(SERVER_ERROR_BACKOFF_MAX)
}

/// Map a non-2xx response onto the typed error taxonomy
fn map_error(status: u16, request: RequestSnapshot, response: HttpResponse) -> ClientError {
    let body = RestErrorBody::parse(&response.body);
    let errors = body.field_errors();
    let context = Box::new(RestContext {
        request,
        response: ResponseSnapshot {
            status,
            body: response.body,
            code: body.code,
            message: body.message,
        },
    });

    match status {
        400 => ClientError::BadRequest { errors, context },
        403 => ClientError::PermissionDenied {
            kind: PermissionKind::from_code(body.code),
            context,
        },
        404 => ClientError::NotFound {
            kind: NotFoundKind::from_code(body.code),
            context,
        },
        _ => ClientError::Http { context },
    }
}
