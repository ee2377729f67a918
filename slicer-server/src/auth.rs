use crate::config::HTTP_BASIC;
use crate::errors::{Result, SlicerError};
use crate::workspace::{Cube, Workspace};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use http::header::AUTHORIZATION;

/// Identifies the caller and asks the workspace authorizer about cube access.
pub struct AuthorizationGate<'a> {
    method: &'a str,
    workspace: &'a dyn Workspace,
}

impl<'a> AuthorizationGate<'a> {
    pub fn new(method: &'a str, workspace: &'a dyn Workspace) -> Self {
        Self { method, workspace }
    }

    /// Extracts the caller identity. `None` means anonymous.
    pub fn prepare_token(&self, headers: &HeaderMap) -> Result<Option<String>> {
        match self.method {
            HTTP_BASIC => Ok(basic_auth_username(headers)),
            other => Err(SlicerError::Internal(format!(
                "Unsupported authorization method: {other}"
            ))),
        }
    }

    /// Open access unless the workspace has an authorizer.
    pub fn authorize(&self, token: Option<&str>, cube: &dyn Cube) -> Result<()> {
        let Some(authorizer) = self.workspace.authorizer() else {
            return Ok(());
        };

        authorizer.authorize(token, cube).map_err(|denied| {
            tracing::warn!(
                cube = cube.name(),
                identity = token.unwrap_or("<anonymous>"),
                reason = %denied,
                "Authorization denied"
            );
            SlicerError::NotAuthorized(denied)
        })
    }
}

/// Username of `Authorization: Basic <base64(user:password)>`, if well formed.
fn basic_auth_username(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, _password) = credentials.split_once(':')?;
    Some(username.to_string())
}
