use crate::context::RequestContext;
use crate::errors::{Result, SlicerError};
use crate::params::QueryParams;
use crate::query::{AggregateRequest, OutputFormat};
use crate::render::body::ResponseBody;
use crate::render::csv::{CsvGenerator, csv_header};
use crate::render::json::result_document;
use crate::render::{csv_response, json_response};
use http::Response;

pub async fn aggregate(
    ctx: &mut RequestContext,
    params: &QueryParams,
) -> Result<Response<ResponseBody>> {
    let request = AggregateRequest::assemble(ctx, params)?;

    let (cube, browser) = match (&ctx.cube, &ctx.browser) {
        (Some(cube), Some(browser)) => (cube.clone(), browser.clone()),
        _ => {
            return Err(SlicerError::Internal(
                "No cube browser in request context".to_string(),
            ));
        }
    };

    let result = browser.aggregate(ctx.cell.as_ref(), &request.query).await?;

    match request.format {
        OutputFormat::Json => {
            let document = result_document(result).map_err(|err| {
                SlicerError::Internal(format!("Failed to encode aggregation result: {err}"))
            })?;
            Ok(json_response(document, ctx))
        }
        OutputFormat::Csv => {
            let header = csv_header(request.header, &result.labels, cube.as_ref())?;
            let fields = result.labels.clone();
            Ok(csv_response(CsvGenerator::new(result.cells, fields, header)))
        }
    }
}
