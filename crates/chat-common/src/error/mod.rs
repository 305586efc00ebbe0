//! Error types shared by the REST and gateway layers

mod client_error;
mod rest_code;

pub use client_error::{
    ClientError, ClientResult, ErrorKind, NotFoundKind, PermissionKind, RequestSnapshot,
    ResponseSnapshot, RestContext,
};
pub use rest_code::{FieldError, RestErrorBody, RestErrorCode};
