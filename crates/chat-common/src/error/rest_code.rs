//! JSON error bodies returned by the REST API
//!
//! ```json
//! {"code": 50035, "message": "Invalid Form Body",
//!  "errors": {"content": {"_errors": [{"code": "BASE_TYPE_MAX_LENGTH", "message": "..."}]}}}
//! ```

use serde::{Deserialize, Serialize};

/// Numeric error code from a REST error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestErrorCode {
    UnknownAccount,
    UnknownApplication,
    UnknownChannel,
    UnknownServer,
    UnknownMember,
    UnknownMessage,
    UnknownRole,
    UnknownUser,
    MissingAccess,
    CannotSendEmptyMessage,
    CannotMessageUser,
    MissingPermissions,
    InvalidFormBody,
    Other(u32),
}

impl RestErrorCode {
    pub fn from_u32(code: u32) -> Self {
        match code {
            10001 => Self::UnknownAccount,
            10002 => Self::UnknownApplication,
            10003 => Self::UnknownChannel,
            10004 => Self::UnknownServer,
            10007 => Self::UnknownMember,
            10008 => Self::UnknownMessage,
            10011 => Self::UnknownRole,
            10013 => Self::UnknownUser,
            50001 => Self::MissingAccess,
            50006 => Self::CannotSendEmptyMessage,
            50007 => Self::CannotMessageUser,
            50013 => Self::MissingPermissions,
            50035 => Self::InvalidFormBody,
            other => Self::Other(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::UnknownAccount => 10001,
            Self::UnknownApplication => 10002,
            Self::UnknownChannel => 10003,
            Self::UnknownServer => 10004,
            Self::UnknownMember => 10007,
            Self::UnknownMessage => 10008,
            Self::UnknownRole => 10011,
            Self::UnknownUser => 10013,
            Self::MissingAccess => 50001,
            Self::CannotSendEmptyMessage => 50006,
            Self::CannotMessageUser => 50007,
            Self::MissingPermissions => 50013,
            Self::InvalidFormBody => 50035,
            Self::Other(code) => code,
        }
    }
}

impl Serialize for RestErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

impl<'de> Deserialize<'de> for RestErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_u32)
    }
}

/// Parsed REST error body; every field is optional since proxies and
/// 5xx pages do not follow the format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestErrorBody {
    #[serde(default)]
    pub code: Option<RestErrorCode>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
    /// Only present on 429 responses, in seconds
    #[serde(default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub global: Option<bool>,
}

impl RestErrorBody {
    /// Lenient parse, an unparsable body yields an empty value
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        self.errors.as_ref().map(FieldError::collect).unwrap_or_default()
    }
}

/// A single field-level validation failure from a 400 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field, e.g. `embeds.0.title`
    pub path: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    /// Flatten the nested `errors` object into field errors
    pub fn collect(errors: &serde_json::Value) -> Vec<FieldError> {
        let mut out = Vec::new();
        collect_into(errors, &mut Vec::new(), &mut out);
        out
    }
}

fn collect_into(value: &serde_json::Value, path: &mut Vec<String>, out: &mut Vec<FieldError>) {
    let Some(object) = value.as_object() else {
        return;
    };

    for (key, child) in object {
        if key == "_errors" {
            for entry in child.as_array().into_iter().flatten() {
                let text = |field: &str| {
                    entry
                        .get(field)
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                out.push(FieldError {
                    path: path.join("."),
                    code: text("code"),
                    message: text("message"),
                });
            }
        } else {
            path.push(key.clone());
            collect_into(child, path, out);
            path.pop();
        }
    }
}
