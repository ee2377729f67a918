//! In-memory workspace used by the unit tests.

use crate::cut::{Cell, Cut};
use crate::query::AggregateQuery;
use crate::workspace::{
    AggregationResult, Attribute, Authorizer, Browser, Cube, CubeDescription, ModelOptions,
    NotAuthorized, Record, RecordSet, Workspace, WorkspaceError,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
pub struct FakeCube {
    name: String,
    label: String,
    attributes: Vec<Attribute>,
    aggregates: Vec<Attribute>,
}

impl FakeCube {
    pub fn sales() -> Arc<FakeCube> {
        Arc::new(FakeCube {
            name: "sales".into(),
            label: "Sales".into(),
            attributes: vec![
                Attribute::new("date.year", Some("Year".into())),
                Attribute::new("geo.country", None),
            ],
            aggregates: vec![
                Attribute::new("amount_sum", Some("Amount Sum".into())),
                Attribute::new("record_count", Some("Count".into())),
            ],
        })
    }

    pub fn named(name: &str) -> Arc<FakeCube> {
        Arc::new(FakeCube {
            name: name.into(),
            label: name.to_uppercase(),
            attributes: Vec::new(),
            aggregates: Vec::new(),
        })
    }
}

impl Cube for FakeCube {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_attributes(
        &self,
        names: &[&str],
        aggregated: bool,
    ) -> Result<Vec<Attribute>, WorkspaceError> {
        names
            .iter()
            .map(|name| {
                self.attributes
                    .iter()
                    .chain(self.aggregates.iter().filter(|_| aggregated))
                    .find(|attribute| attribute.name == *name)
                    .cloned()
                    .ok_or_else(|| WorkspaceError::NoSuchAttribute(name.to_string()))
            })
            .collect()
    }

    fn to_dict(&self, options: ModelOptions) -> Map<String, Value> {
        let mut model = Map::new();
        model.insert("name".into(), json!(self.name));
        model.insert("label".into(), json!(self.label));
        model.insert("expanded".into(), json!(options.expand_dimensions));
        model.insert("with_mappings".into(), json!(options.with_mappings));
        model.insert(
            "attributes".into(),
            json!(self.attributes.iter().map(|a| &a.name).collect::<Vec<_>>()),
        );
        model.insert(
            "aggregates".into(),
            json!(self.aggregates.iter().map(|a| &a.name).collect::<Vec<_>>()),
        );
        model
    }
}

/// Browser replaying scripted rows and remembering every query it was given.
#[derive(Default)]
pub struct FakeBrowser {
    records: Vec<Record>,
    labels: Vec<String>,
    failure: Option<WorkspaceError>,
    queries: Mutex<Vec<(Option<Vec<Cut>>, AggregateQuery)>>,
}

impl FakeBrowser {
    pub fn new(records: Vec<Record>, labels: &[&str]) -> Self {
        FakeBrowser {
            records,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            ..FakeBrowser::default()
        }
    }

    pub fn failing(error: WorkspaceError) -> Self {
        FakeBrowser {
            failure: Some(error),
            ..FakeBrowser::default()
        }
    }

    /// Cuts of the cell and the query of every aggregation, in call order.
    pub fn queries(&self) -> Vec<(Option<Vec<Cut>>, AggregateQuery)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn aggregate(
        &self,
        cell: Option<&Cell>,
        query: &AggregateQuery,
    ) -> Result<AggregationResult, WorkspaceError> {
        self.queries
            .lock()
            .unwrap()
            .push((cell.map(|c| c.cuts().to_vec()), query.clone()));

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut result =
            AggregationResult::new(RecordSet::new(self.records.clone()), self.labels.clone());
        result.aggregates = query.aggregates.clone();
        result.cell = cell.cloned();
        result.has_split = query.split.is_some();
        result.total_cell_count = Some(self.records.len() as u64);
        Ok(result)
    }
}

/// Grants each user access to a fixed set of cubes. Anonymous callers are denied.
pub struct RightsAuthorizer {
    rights: HashMap<String, Vec<String>>,
}

impl Authorizer for RightsAuthorizer {
    fn authorize(&self, token: Option<&str>, cube: &dyn Cube) -> Result<(), NotAuthorized> {
        let token = token.ok_or_else(|| NotAuthorized::new("anonymous access"))?;
        match self.rights.get(token) {
            Some(cubes) if cubes.iter().any(|c| c == cube.name()) => Ok(()),
            _ => Err(NotAuthorized::new(format!(
                "'{token}' may not access cube '{}'",
                cube.name()
            ))),
        }
    }
}

pub struct FakeWorkspace {
    cubes: Vec<Arc<FakeCube>>,
    browser: Arc<FakeBrowser>,
    authorizer: Option<RightsAuthorizer>,
    list_calls: AtomicUsize,
    list_delay: Option<Duration>,
    list_failures: AtomicUsize,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        FakeWorkspace {
            cubes: vec![FakeCube::sales(), FakeCube::named("visits")],
            browser: Arc::new(FakeBrowser::default()),
            authorizer: None,
            list_calls: AtomicUsize::new(0),
            list_delay: None,
            list_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_rights(mut self, rights: &[(&str, &[&str])]) -> Self {
        let rights = rights
            .iter()
            .map(|(user, cubes)| {
                (
                    user.to_string(),
                    cubes.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect();
        self.authorizer = Some(RightsAuthorizer { rights });
        self
    }

    pub fn with_browser(mut self, browser: FakeBrowser) -> Self {
        self.browser = Arc::new(browser);
        self
    }

    /// Makes `list_cubes` slow enough for concurrent callers to overlap.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// The next `count` calls to `list_cubes` fail.
    pub fn with_list_failures(self, count: usize) -> Self {
        self.list_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn browser(&self) -> &Arc<FakeBrowser> {
        &self.browser
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Workspace for FakeWorkspace {
    async fn cube(&self, name: &str) -> Result<Arc<dyn Cube>, WorkspaceError> {
        self.cubes
            .iter()
            .find(|cube| cube.name() == name)
            .map(|cube| cube.clone() as Arc<dyn Cube>)
            .ok_or_else(|| WorkspaceError::NoSuchCube(name.to_string()))
    }

    async fn browser(&self, _cube: &Arc<dyn Cube>) -> Result<Arc<dyn Browser>, WorkspaceError> {
        Ok(self.browser.clone())
    }

    async fn list_cubes(&self) -> Result<Vec<CubeDescription>, WorkspaceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        let failures = self.list_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.list_failures.store(failures - 1, Ordering::SeqCst);
            return Err(WorkspaceError::Backend("model store unavailable".into()));
        }

        Ok(self
            .cubes
            .iter()
            .map(|cube| CubeDescription {
                name: cube.name.clone(),
                label: cube.label.clone(),
                category: None,
                info: None,
            })
            .collect())
    }

    fn cube_features(&self, _cube: &dyn Cube) -> Value {
        json!({"actions": ["aggregate", "model"]})
    }

    fn authorizer(&self) -> Option<&dyn Authorizer> {
        self.authorizer.as_ref().map(|a| a as &dyn Authorizer)
    }
}
