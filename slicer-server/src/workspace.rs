//! Interfaces of the aggregation engine the server sits in front of.
//!
//! Cube metadata, aggregation and authorization decisions are made by the
//! engine. The server only resolves, forwards and renders.

use crate::cut::Cell;
use crate::query::AggregateQuery;
use async_trait::async_trait;
use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name of the synthetic result column telling whether a row matches the split cell.
pub const SPLIT_DIMENSION_NAME: &str = "__within_split__";

/// One row of an aggregation result, keyed by column label.
pub type Record = Map<String, Value>;

/// Errors raised by the engine. Their kind and status are reported unchanged.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("Unknown cube '{0}'")]
    NoSuchCube(String),

    #[error("Unknown attribute '{0}'")]
    NoSuchAttribute(String),

    #[error("{0}")]
    Argument(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("{0}")]
    Unsupported(String),
}

impl WorkspaceError {
    pub fn status(&self) -> StatusCode {
        match self {
            WorkspaceError::NoSuchCube(_) => StatusCode::NOT_FOUND,
            WorkspaceError::NoSuchAttribute(_) | WorkspaceError::Argument(_) => {
                StatusCode::BAD_REQUEST
            }
            WorkspaceError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WorkspaceError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkspaceError::NoSuchCube(_) => "no_such_cube",
            WorkspaceError::NoSuchAttribute(_) => "no_such_attribute",
            WorkspaceError::Argument(_) => "argument_error",
            WorkspaceError::Backend(_) => "backend_error",
            WorkspaceError::Unsupported(_) => "not_implemented",
        }
    }
}

/// Denial signal of an [`Authorizer`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct NotAuthorized {
    pub message: String,
}

impl NotAuthorized {
    pub fn new<M: Into<String>>(message: M) -> Self {
        NotAuthorized {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub label: Option<String>,
}

impl Attribute {
    pub fn new<N: Into<String>>(name: N, label: Option<String>) -> Self {
        Attribute {
            name: name.into(),
            label,
        }
    }

    /// Human readable label, falling back to the raw name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Controls the shape of [`Cube::to_dict`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelOptions {
    pub expand_dimensions: bool,
    pub with_mappings: bool,
    pub full_attribute_names: bool,
    pub create_label: bool,
}

/// Public model description served by `/cube/<name>/model`.
pub const PUBLIC_MODEL: ModelOptions = ModelOptions {
    expand_dimensions: true,
    with_mappings: false,
    full_attribute_names: true,
    create_label: true,
};

pub trait Cube: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Looks up attributes by name. With `aggregated` set, measure aggregates
    /// are considered as well as dimension attributes.
    fn get_attributes(
        &self,
        names: &[&str],
        aggregated: bool,
    ) -> Result<Vec<Attribute>, WorkspaceError>;

    fn to_dict(&self, options: ModelOptions) -> Map<String, Value>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn aggregate(
        &self,
        cell: Option<&Cell>,
        query: &AggregateQuery,
    ) -> Result<AggregationResult, WorkspaceError>;
}

pub trait Authorizer: Send + Sync {
    fn authorize(&self, token: Option<&str>, cube: &dyn Cube) -> Result<(), NotAuthorized>;
}

#[async_trait]
pub trait Workspace: Send + Sync {
    async fn cube(&self, name: &str) -> Result<Arc<dyn Cube>, WorkspaceError>;

    async fn browser(&self, cube: &Arc<dyn Cube>) -> Result<Arc<dyn Browser>, WorkspaceError>;

    async fn list_cubes(&self) -> Result<Vec<CubeDescription>, WorkspaceError>;

    fn cube_features(&self, cube: &dyn Cube) -> Value;

    /// `None` means every caller may access every cube.
    fn authorizer(&self) -> Option<&dyn Authorizer> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CubeDescription {
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

/// Lazily produced result rows. Rows are pulled while the response is written.
pub struct RecordSet(Box<dyn Iterator<Item = Record> + Send>);

impl RecordSet {
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        RecordSet(Box::new(records.into_iter()))
    }

    pub fn empty() -> Self {
        RecordSet::new(Vec::new())
    }
}

impl Iterator for RecordSet {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.0.next()
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordSet(..)")
    }
}

/// Output of [`Browser::aggregate`].
#[derive(Debug)]
pub struct AggregationResult {
    pub summary: Record,
    pub remainder: Record,
    pub cells: RecordSet,
    pub total_cell_count: Option<u64>,
    pub aggregates: Vec<String>,
    pub cell: Option<Cell>,
    /// Drilled-down dimension to the levels it was drilled through.
    pub levels: BTreeMap<String, Vec<String>>,
    pub attributes: Vec<String>,
    /// Column labels of every row in `cells`, in display order.
    pub labels: Vec<String>,
    pub has_split: bool,
}

impl AggregationResult {
    pub fn new(cells: RecordSet, labels: Vec<String>) -> Self {
        AggregationResult {
            summary: Record::new(),
            remainder: Record::new(),
            cells,
            total_cell_count: None,
            aggregates: Vec::new(),
            cell: None,
            levels: BTreeMap::new(),
            attributes: Vec::new(),
            labels,
            has_split: false,
        }
    }
}
