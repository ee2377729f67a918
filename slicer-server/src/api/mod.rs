//! Endpoint handlers. Each one runs after the request context is built and,
//! for cube routes, after authorization.

pub mod aggregate;
pub mod cubes;
pub mod info;

use crate::errors::{Result, SlicerError};
use crate::render::json::Node;
use serde::Serialize;

/// Serializes an eager document for the JSON renderer.
fn document<T: Serialize + ?Sized>(value: &T) -> Result<Node> {
    Node::from_serialize(value)
        .map_err(|err| SlicerError::Internal(format!("Failed to encode response: {err}")))
}
