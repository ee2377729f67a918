//! Aggregation query assembly from request parameters.

use crate::context::{OrderEntry, RequestContext, resolve_cell};
use crate::cut::Cell;
use crate::errors::Result;
use crate::params::{ParameterChoice, QueryParams, validated_parameter};

/// Everything forwarded to [`crate::workspace::Browser::aggregate`] besides the cell.
#[derive(Clone, Debug, Default)]
pub struct AggregateQuery {
    pub aggregates: Vec<String>,
    pub drilldown: Vec<String>,
    pub split: Option<Cell>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub order: Vec<OrderEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl ParameterChoice for OutputFormat {
    const NAME: &'static str = "format";
    const CHOICES: &'static [(&'static str, Self)] =
        &[("json", OutputFormat::Json), ("csv", OutputFormat::Csv)];
    const DEFAULT: Self = OutputFormat::Json;
}

/// What the first CSV row contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderType {
    Names,
    Labels,
    None,
}

impl ParameterChoice for HeaderType {
    const NAME: &'static str = "header";
    const CHOICES: &'static [(&'static str, Self)] = &[
        ("names", HeaderType::Names),
        ("labels", HeaderType::Labels),
        ("none", HeaderType::None),
    ];
    const DEFAULT: Self = HeaderType::Labels;
}

#[derive(Debug)]
pub struct AggregateRequest {
    pub format: OutputFormat,
    pub header: HeaderType,
    /// Accepted for compatibility. CSV output always uses the result labels.
    pub fields: Option<Vec<String>>,
    pub query: AggregateQuery,
}

impl AggregateRequest {
    /// Validates output options, resolves the split cell into `ctx` and
    /// gathers the query arguments. No engine call is made here.
    pub fn assemble(ctx: &mut RequestContext, params: &QueryParams) -> Result<Self> {
        let format = validated_parameter::<OutputFormat>(params)?;
        let header = validated_parameter::<HeaderType>(params)?;

        let fields = params
            .get("fields")
            .filter(|fields| !fields.is_empty())
            .map(|fields| fields.split(',').map(str::to_lowercase).collect());

        ctx.split = resolve_cell(ctx.cube.as_ref(), params, "split")?;

        let query = AggregateQuery {
            aggregates: params.split_all("aggregates", '|'),
            drilldown: params.split_all("drilldown", '|'),
            split: ctx.split.clone(),
            page: ctx.page,
            page_size: ctx.page_size,
            order: ctx.order.clone(),
        };

        tracing::debug!(
            ?format,
            ?header,
            aggregates = ?query.aggregates,
            drilldown = ?query.drilldown,
            has_split = query.split.is_some(),
            "Assembled aggregate query"
        );

        Ok(AggregateRequest {
            format,
            header,
            fields,
            query,
        })
    }
}
