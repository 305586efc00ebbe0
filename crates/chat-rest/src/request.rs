//! Outgoing REST requests

use chat_common::RequestSnapshot;
use reqwest::Method;
use serde_json::Value;

use crate::route::{Endpoint, Route};

/// A file uploaded as a multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl FileAttachment {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// `payload_json` plus `files[n]` parts
    Multipart {
        payload_json: Option<Value>,
        files: Vec<FileAttachment>,
    },
}

impl RequestBody {
    /// Text form kept in error snapshots; file contents are left out
    fn describe(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Json(value) => Some(value.to_string()),
            Self::Multipart {
                payload_json,
                files,
            } => {
                let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
                Some(format!(
                    "multipart payload_json={} files={names:?}",
                    payload_json.as_ref().map_or_else(|| "null".to_string(), Value::to_string)
                ))
            }
        }
    }
}

/// A request to the REST API
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub(crate) route: Route,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) audit_reason: Option<String>,
    pub(crate) authorized: bool,
}

impl RestRequest {
    pub fn new(method: Method, endpoint: Endpoint, params: &[&str]) -> Self {
        Self::from_route(endpoint.route(method, params))
    }

    /// Request against an arbitrary path below the API base
    pub fn from_path(method: Method, path: &str) -> Self {
        Self::from_route(Route::from_path(method, path))
    }

    pub fn from_route(route: Route) -> Self {
        Self {
            route,
            query: Vec::new(),
            body: RequestBody::Empty,
            audit_reason: None,
            authorized: true,
        }
    }

    pub fn get(endpoint: Endpoint, params: &[&str]) -> Self {
        Self::new(Method::GET, endpoint, params)
    }

    pub fn post(endpoint: Endpoint, params: &[&str]) -> Self {
        Self::new(Method::POST, endpoint, params)
    }

    pub fn patch(endpoint: Endpoint, params: &[&str]) -> Self {
        Self::new(Method::PATCH, endpoint, params)
    }

    pub fn put(endpoint: Endpoint, params: &[&str]) -> Self {
        Self::new(Method::PUT, endpoint, params)
    }

    pub fn delete(endpoint: Endpoint, params: &[&str]) -> Self {
        Self::new(Method::DELETE, endpoint, params)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body; on a multipart request it becomes `payload_json`
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = match self.body {
            RequestBody::Multipart { files, .. } => RequestBody::Multipart {
                payload_json: Some(value),
                files,
            },
            _ => RequestBody::Json(value),
        };
        self
    }

    /// Attach a file, switching the body to multipart
    #[must_use]
    pub fn attach(mut self, file: FileAttachment) -> Self {
        self.body = match self.body {
            RequestBody::Empty => RequestBody::Multipart {
                payload_json: None,
                files: vec![file],
            },
            RequestBody::Json(value) => RequestBody::Multipart {
                payload_json: Some(value),
                files: vec![file],
            },
            RequestBody::Multipart {
                payload_json,
                mut files,
            } => {
                files.push(file);
                RequestBody::Multipart {
                    payload_json,
                    files,
                }
            }
        };
        self
    }

    /// Reason shown in the server audit log
    #[must_use]
    pub fn audit_reason(mut self, reason: impl Into<String>) -> Self {
        self.audit_reason = Some(reason.into());
        self
    }

    /// Skip the `Authorization` header, e.g. for webhook execution
    #[must_use]
    pub fn without_authorization(mut self) -> Self {
        self.authorized = false;
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Query parameters in the order they were added, not yet encoded
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.route.key.method.to_string(),
            path: self.route.path.clone(),
            query: self.query.clone(),
            route: self.route.key.to_string(),
            body: self.body.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_kept_raw_and_in_order() {
        let request = RestRequest::get(Endpoint::Message, &["1"])
            .query("limit", 50)
            .query("around", "a b&c");
        assert_eq!(
            request.query_pairs(),
            [("limit".to_string(), "50".to_string()), ("around".to_string(), "a b&c".to_string())]
        );
        let snapshot = request.snapshot();
        assert_eq!(snapshot.path, "/channels/1/messages");
        assert_eq!(snapshot.query.len(), 2);
    }

    #[test]
    fn test_attach_moves_json_into_payload() {
        let request = RestRequest::post(Endpoint::Message, &["1"])
            .json(json!({"content": "hi"}))
            .attach(FileAttachment::new("a.txt", b"hello".to_vec()))
            .attach(FileAttachment::new("b.png", vec![0u8; 4]).with_content_type("image/png"));

        match request.body() {
            RequestBody::Multipart { payload_json, files } => {
                assert_eq!(payload_json.as_ref().unwrap()["content"], "hi");
                assert_eq!(files.len(), 2);
                assert_eq!(files[1].content_type.as_deref(), Some("image/png"));
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn test_json_after_attach_sets_payload() {
        let request = RestRequest::post(Endpoint::Message, &["1"])
            .attach(FileAttachment::new("a.txt", b"x".to_vec()))
            .json(json!({"content": "late"}));
        assert!(matches!(
            request.body(),
            RequestBody::Multipart { payload_json: Some(_), .. }
        ));
    }

    #[test]
    fn test_snapshot() {
        let request = RestRequest::patch(Endpoint::Role, &["10", "20"]).json(json!({"color": 1}));
        let snapshot = request.snapshot();
        assert_eq!(snapshot.method, "PATCH");
        assert_eq!(snapshot.path, "/guilds/10/roles/20");
        assert_eq!(snapshot.route, "PATCH /guilds/{}/roles/{}");
        assert_eq!(snapshot.body.as_deref(), Some(r#"{"color":1}"#));
    }
}
