//! HTTP transport seam
//!
//! The executor only talks to [`HttpTransport`]; [`ReqwestTransport`] is the
//! production implementation.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;

use crate::request::RequestBody;

/// Fully resolved outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path without a query string; the transport encodes `query`
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

/// Raw response; header names are lowercase
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// The request never reached the server
    pub connect: bool,
    pub timeout: bool,
}

impl TransportError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connect: true,
            timeout: false,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connect: false,
            timeout: false,
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest` backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn build_multipart(
        payload_json: Option<serde_json::Value>,
        files: Vec<crate::request::FileAttachment>,
    ) -> Result<Form, TransportError> {
        let mut form = Form::new();
        if let Some(payload) = payload_json {
            form = form.text("payload_json", payload.to_string());
        }
        for (index, file) in files.into_iter().enumerate() {
            let mut part = Part::bytes(file.data).file_name(file.filename);
            if let Some(content_type) = &file.content_type {
                part = part
                    .mime_str(content_type)
                    .map_err(|e| TransportError::other(format!("invalid content type: {e}")))?;
            }
            form = form.part(format!("files[{index}]"), part);
        }
        Ok(form)
    }
}

fn map_error(error: &reqwest::Error) -> TransportError {
    TransportError {
        message: error.to_string(),
        connect: error.is_connect(),
        timeout: error.is_timeout(),
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart {
                payload_json,
                files,
            } => builder.multipart(Self::build_multipart(payload_json, files)?),
        };

        let response = builder.send().await.map_err(|e| map_error(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| map_error(&e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
