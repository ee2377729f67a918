//! Per-request context, prepared before any endpoint handler runs.

use crate::auth::AuthorizationGate;
use crate::config::ServerOptions;
use crate::cut::{Cell, cuts_from_string};
use crate::errors::{Result, SlicerError};
use crate::params::{QueryParams, str_to_bool};
use crate::workspace::{Browser, Cube, Workspace};
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;

/// One `field[:direction]` sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderEntry {
    pub field: String,
    pub direction: Option<String>,
}

impl OrderEntry {
    pub fn new(field: &str, direction: Option<&str>) -> Self {
        OrderEntry {
            field: field.to_string(),
            direction: direction.map(str::to_string),
        }
    }
}

/// Everything a handler needs to know about the request it serves. Owned by
/// that request only.
pub struct RequestContext {
    pub cube: Option<Arc<dyn Cube>>,
    pub browser: Option<Arc<dyn Browser>>,
    /// `None` means no cut was requested, which differs from an empty cell.
    pub cell: Option<Cell>,
    pub split: Option<Cell>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub order: Vec<OrderEntry>,
    pub authorization_token: Option<String>,
    pub json_record_limit: usize,
    pub prettyprint: bool,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("cube", &self.cube.as_ref().map(|c| c.name().to_string()))
            .field("cell", &self.cell)
            .field("split", &self.split)
            .field("page", &self.page)
            .field("page_size", &self.page_size)
            .field("order", &self.order)
            .field("authorization_token", &self.authorization_token)
            .field("json_record_limit", &self.json_record_limit)
            .field("prettyprint", &self.prettyprint)
            .finish_non_exhaustive()
    }
}

/// Runs the preparation steps in order. The first failing step aborts the
/// chain and no later step runs.
pub struct RequestContextBuilder<'a> {
    workspace: &'a dyn Workspace,
    options: &'a ServerOptions,
}

impl<'a> RequestContextBuilder<'a> {
    pub fn new(workspace: &'a dyn Workspace, options: &'a ServerOptions) -> Self {
        Self { workspace, options }
    }

    pub async fn build(
        &self,
        cube_name: Option<&str>,
        params: &QueryParams,
        headers: &HeaderMap,
    ) -> Result<RequestContext> {
        let cube = match cube_name {
            Some(name) => Some(self.workspace.cube(name).await?),
            None => None,
        };

        let browser = match &cube {
            Some(cube) => Some(self.workspace.browser(cube).await?),
            None => None,
        };

        let cell = resolve_cell(cube.as_ref(), params, "cut")?;

        let page = parse_number(params, "page")?;
        let page_size = parse_number(params, "pagesize")?;
        if page_size == Some(0) {
            return Err(SlicerError::Request(
                "'pagesize' should be a positive number".to_string(),
            ));
        }

        let order = parse_order(params);

        let authorization_token = AuthorizationGate::new(
            &self.options.authorization_method,
            self.workspace,
        )
        .prepare_token(headers)?;

        let prettyprint = match params.get("prettyprint") {
            Some(value) => str_to_bool(value).unwrap_or(false),
            None => self.options.prettyprint,
        };

        Ok(RequestContext {
            cube,
            browser,
            cell,
            split: None,
            page,
            page_size,
            order,
            authorization_token,
            json_record_limit: self.options.json_record_limit,
            prettyprint,
        })
    }
}

/// Collects the cuts of every occurrence of `arg_name`, in order. Returns
/// `None` when there are none.
pub fn resolve_cell(
    cube: Option<&Arc<dyn Cube>>,
    params: &QueryParams,
    arg_name: &str,
) -> Result<Option<Cell>> {
    let mut cuts = Vec::new();
    for cut_string in params.get_all(arg_name) {
        cuts.extend(cuts_from_string(cut_string)?);
    }

    if cuts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Cell::new(cube.cloned(), cuts)))
    }
}

fn parse_number(params: &QueryParams, name: &str) -> Result<Option<u64>> {
    params
        .get(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| SlicerError::Request(format!("'{name}' should be a number")))
        })
        .transpose()
}

/// `order=field[:direction],...`, accumulated over every occurrence. Tokens
/// with more than one `:` keep only the first two components.
fn parse_order(params: &QueryParams) -> Vec<OrderEntry> {
    params
        .get_all("order")
        .flat_map(|orders| orders.split(','))
        .map(|token| {
            let mut parts = token.split(':');
            let field = parts.next().unwrap_or(token);
            OrderEntry::new(field, parts.next())
        })
        .collect()
}
