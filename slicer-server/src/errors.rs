use crate::cut::CutError;
use crate::render::body::{JSON_MEDIA_TYPE, ResponseBody, full_body, make_response};
use crate::workspace::{NotAuthorized, WorkspaceError};
use http::{Method, Response, StatusCode};
use serde::Serialize;

/// Result type alias for request handling
pub type Result<T, E = SlicerError> = std::result::Result<T, E>;

/// Errors that abort the handling of a single request
#[derive(thiserror::Error, Debug)]
pub enum SlicerError {
    /// Malformed or invalid client input
    #[error("{0}")]
    Request(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(#[from] NotAuthorized),

    #[error("No route matches '{0}'")]
    NotFound(String),

    #[error("Method {0} is not allowed")]
    MethodNotAllowed(Method),

    /// Server misconfiguration, never the client's fault
    #[error("Internal error: {0}")]
    Internal(String),

    /// Raised by the aggregation engine and reported unchanged
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl From<CutError> for SlicerError {
    fn from(err: CutError) -> Self {
        SlicerError::Request(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl SlicerError {
    pub fn status(&self) -> StatusCode {
        match self {
            SlicerError::Request(_) => StatusCode::BAD_REQUEST,
            SlicerError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            SlicerError::NotFound(_) => StatusCode::NOT_FOUND,
            SlicerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            SlicerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SlicerError::Workspace(e) => e.status(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SlicerError::Request(_) => "request_error",
            SlicerError::NotAuthorized(_) => "not_authorized",
            SlicerError::NotFound(_) => "not_found",
            SlicerError::MethodNotAllowed(_) => "method_not_allowed",
            SlicerError::Internal(_) => "internal_error",
            SlicerError::Workspace(e) => e.kind(),
        }
    }

    /// Renders the error as a `{"error": kind, "message": text}` document.
    pub fn into_response(self) -> Response<ResponseBody> {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
        make_response(self.status(), JSON_MEDIA_TYPE, full_body(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn error_json(err: SlicerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_request_error_rendering() {
        let (status, body) =
            error_json(SlicerError::Request("'page' should be a number".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "request_error");
        assert_eq!(body["message"], "'page' should be a number");
    }

    #[tokio::test]
    async fn test_not_authorized_is_distinct_from_request_error() {
        let (status, body) =
            error_json(NotAuthorized::new("cube 'sales' is not accessible").into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "not_authorized");
    }

    #[tokio::test]
    async fn test_workspace_errors_keep_their_classification() {
        let (status, body) =
            error_json(WorkspaceError::NoSuchCube("sales".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no_such_cube");
        assert_eq!(body["message"], "Unknown cube 'sales'");
    }

    #[test]
    fn test_cut_errors_are_request_errors() {
        let err: SlicerError = CutError::InvalidCut("date".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_status() {
        let err = SlicerError::Internal("Unsupported authorization method: ldap".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "internal_error");
    }
}
