use super::document;
use crate::context::RequestContext;
use crate::errors::{Result, SlicerError};
use crate::metrics_defs::{CUBE_LIST_CACHE_HIT, CUBE_LIST_CACHE_MISS};
use crate::render::body::ResponseBody;
use crate::render::json_response;
use crate::workspace::{CubeDescription, PUBLIC_MODEL, Workspace, WorkspaceError};
use http::Response;
use serde_json::Value;
use shared::counter;
use tokio::sync::OnceCell;

/// Cube list memoized for the lifetime of the process. Concurrent first
/// requests wait on a single lookup; a failed lookup is not remembered.
#[derive(Debug, Default)]
pub struct CubeListCache {
    cubes: OnceCell<Vec<CubeDescription>>,
}

impl CubeListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, workspace: &dyn Workspace) -> Result<&[CubeDescription], WorkspaceError> {
        if let Some(cubes) = self.cubes.get() {
            counter!(CUBE_LIST_CACHE_HIT).increment(1);
            return Ok(cubes);
        }

        let cubes = self
            .cubes
            .get_or_try_init(|| async {
                counter!(CUBE_LIST_CACHE_MISS).increment(1);
                let cubes = workspace.list_cubes().await?;
                tracing::debug!(count = cubes.len(), "Cached cube list");
                Ok::<_, WorkspaceError>(cubes)
            })
            .await?;
        Ok(cubes)
    }
}

pub async fn list_cubes(
    ctx: &RequestContext,
    cache: &CubeListCache,
    workspace: &dyn Workspace,
) -> Result<Response<ResponseBody>> {
    let cubes = cache.get(workspace).await?;
    Ok(json_response(document(cubes)?, ctx))
}

/// Public model of the context cube, extended with its features.
pub fn cube_model(ctx: &RequestContext, workspace: &dyn Workspace) -> Result<Response<ResponseBody>> {
    let cube = ctx
        .cube
        .as_ref()
        .ok_or_else(|| SlicerError::Internal("No cube in request context".to_string()))?;

    let mut model = cube.to_dict(PUBLIC_MODEL);
    model.insert("features".to_string(), workspace.cube_features(cube.as_ref()));
    Ok(json_response(document(&Value::Object(model))?, ctx))
}
