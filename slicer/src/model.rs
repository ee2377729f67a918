//! Workspace backed by a static model description from the config file.
//!
//! It serves cube metadata only. Aggregation needs an engine, so the
//! browser answers every aggregation with `WorkspaceError::Unsupported`.

use crate::authorization::RightsAuthorizer;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use slicer_server::cut::Cell;
use slicer_server::query::AggregateQuery;
use slicer_server::workspace::{
    AggregationResult, Attribute, Authorizer, Browser, Cube, CubeDescription, ModelOptions,
    Workspace, WorkspaceError,
};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub cubes: Vec<CubeConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CubeConfig {
    pub name: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub info: Option<Value>,
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,
    #[serde(default)]
    pub aggregates: Vec<AggregateConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DimensionConfig {
    pub name: String,
    pub label: Option<String>,
    /// A dimension without levels is flat: its only attribute is the dimension itself.
    #[serde(default)]
    pub levels: Vec<LevelConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LevelConfig {
    pub name: String,
    pub label: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AggregateConfig {
    pub name: String,
    pub label: Option<String>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("duplicate cube '{0}'")]
    DuplicateCube(String),
    #[error("duplicate attribute '{attribute}' in cube '{cube}'")]
    DuplicateAttribute { cube: String, attribute: String },
}

#[derive(Debug)]
pub struct ModelCube {
    config: CubeConfig,
}

impl ModelCube {
    fn new(config: CubeConfig) -> Result<Self, ModelError> {
        let cube = ModelCube { config };
        let mut seen = HashSet::new();
        for attribute in cube.dimension_attributes().chain(cube.aggregate_attributes()) {
            if !seen.insert(attribute.name.clone()) {
                return Err(ModelError::DuplicateAttribute {
                    cube: cube.config.name.clone(),
                    attribute: attribute.name,
                });
            }
        }
        Ok(cube)
    }

    fn label(&self) -> String {
        self.config
            .label
            .clone()
            .unwrap_or_else(|| self.config.name.clone())
    }

    fn dimension_attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.config.dimensions.iter().flat_map(|dimension| {
            let attributes: Vec<Attribute> = if dimension.levels.is_empty() {
                vec![Attribute::new(&dimension.name, dimension.label.clone())]
            } else {
                dimension
                    .levels
                    .iter()
                    .map(|level| {
                        Attribute::new(
                            format!("{}.{}", dimension.name, level.name),
                            level.label.clone(),
                        )
                    })
                    .collect()
            };
            attributes
        })
    }

    fn aggregate_attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.config
            .aggregates
            .iter()
            .map(|aggregate| Attribute::new(&aggregate.name, aggregate.label.clone()))
    }

    fn dimension_dict(&self, dimension: &DimensionConfig, options: ModelOptions) -> Value {
        let label = match (&dimension.label, options.create_label) {
            (Some(label), _) => Value::from(label.as_str()),
            (None, true) => Value::from(dimension.name.as_str()),
            (None, false) => Value::Null,
        };

        let levels: Vec<Value> = dimension
            .levels
            .iter()
            .map(|level| {
                let attribute = if options.full_attribute_names {
                    format!("{}.{}", dimension.name, level.name)
                } else {
                    level.name.clone()
                };
                let label = match (&level.label, options.create_label) {
                    (Some(label), _) => Value::from(label.as_str()),
                    (None, true) => Value::from(level.name.as_str()),
                    (None, false) => Value::Null,
                };
                json!({"name": level.name, "label": label, "attributes": [attribute]})
            })
            .collect();

        json!({
            "name": dimension.name,
            "label": label,
            "is_flat": dimension.levels.is_empty(),
            "levels": levels,
        })
    }
}

impl Cube for ModelCube {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn get_attributes(
        &self,
        names: &[&str],
        aggregated: bool,
    ) -> Result<Vec<Attribute>, WorkspaceError> {
        names
            .iter()
            .map(|name| {
                let found = if aggregated {
                    self.dimension_attributes()
                        .chain(self.aggregate_attributes())
                        .find(|attribute| attribute.name == *name)
                } else {
                    self.dimension_attributes()
                        .find(|attribute| attribute.name == *name)
                };
                found.ok_or_else(|| WorkspaceError::NoSuchAttribute(name.to_string()))
            })
            .collect()
    }

    fn to_dict(&self, options: ModelOptions) -> Map<String, Value> {
        let mut model = Map::new();
        model.insert("name".into(), json!(self.config.name));
        model.insert("label".into(), json!(self.label()));
        if let Some(category) = &self.config.category {
            model.insert("category".into(), json!(category));
        }
        if let Some(info) = &self.config.info {
            model.insert("info".into(), info.clone());
        }

        let dimensions: Vec<Value> = if options.expand_dimensions {
            self.config
                .dimensions
                .iter()
                .map(|dimension| self.dimension_dict(dimension, options))
                .collect()
        } else {
            self.config
                .dimensions
                .iter()
                .map(|dimension| json!(dimension.name))
                .collect()
        };
        model.insert("dimensions".into(), Value::Array(dimensions));

        let aggregates: Vec<Value> = self
            .aggregate_attributes()
            .map(|attribute| json!({"name": attribute.name, "label": attribute.display_label()}))
            .collect();
        model.insert("aggregates".into(), Value::Array(aggregates));
        model
    }
}

/// Browser for a cube without an aggregation backend.
#[derive(Debug)]
struct MetadataBrowser {
    cube: String,
}

#[async_trait]
impl Browser for MetadataBrowser {
    async fn aggregate(
        &self,
        _cell: Option<&Cell>,
        _query: &AggregateQuery,
    ) -> Result<AggregationResult, WorkspaceError> {
        Err(WorkspaceError::Unsupported(format!(
            "No aggregation backend is configured for cube '{}'",
            self.cube
        )))
    }
}

pub struct StaticWorkspace {
    cubes: Vec<Arc<ModelCube>>,
    authorizer: Option<RightsAuthorizer>,
}

impl StaticWorkspace {
    pub fn new(
        model: ModelConfig,
        authorizer: Option<RightsAuthorizer>,
    ) -> Result<Self, ModelError> {
        let mut names = HashSet::new();
        let mut cubes = Vec::with_capacity(model.cubes.len());
        for config in model.cubes {
            if !names.insert(config.name.clone()) {
                return Err(ModelError::DuplicateCube(config.name));
            }
            cubes.push(Arc::new(ModelCube::new(config)?));
        }

        tracing::info!(cubes = cubes.len(), "Loaded model");
        Ok(StaticWorkspace { cubes, authorizer })
    }
}

#[async_trait]
impl Workspace for StaticWorkspace {
    async fn cube(&self, name: &str) -> Result<Arc<dyn Cube>, WorkspaceError> {
        self.cubes
            .iter()
            .find(|cube| cube.name() == name)
            .map(|cube| cube.clone() as Arc<dyn Cube>)
            .ok_or_else(|| WorkspaceError::NoSuchCube(name.to_string()))
    }

    async fn browser(&self, cube: &Arc<dyn Cube>) -> Result<Arc<dyn Browser>, WorkspaceError> {
        Ok(Arc::new(MetadataBrowser {
            cube: cube.name().to_string(),
        }))
    }

    async fn list_cubes(&self) -> Result<Vec<CubeDescription>, WorkspaceError> {
        Ok(self
            .cubes
            .iter()
            .map(|cube| CubeDescription {
                name: cube.config.name.clone(),
                label: cube.label(),
                category: cube.config.category.clone(),
                info: cube.config.info.clone(),
            })
            .collect())
    }

    fn cube_features(&self, _cube: &dyn Cube) -> Value {
        json!({"actions": []})
    }

    fn authorizer(&self) -> Option<&dyn Authorizer> {
        self.authorizer.as_ref().map(|a| a as &dyn Authorizer)
    }
}
