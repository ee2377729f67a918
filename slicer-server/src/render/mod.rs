pub mod body;
pub mod csv;
pub mod json;

use crate::context::RequestContext;
use body::{CSV_MEDIA_TYPE, JSON_MEDIA_TYPE, ResponseBody, make_response, streamed_body};
use csv::CsvGenerator;
use http::{Response, StatusCode};
use json::{JsonEncoder, Node};

/// Streams `document` with the record limit and indentation of the request.
pub fn json_response(document: Node, ctx: &RequestContext) -> Response<ResponseBody> {
    let chunks = JsonEncoder::new(ctx.json_record_limit, ctx.prettyprint).encode(document);
    make_response(StatusCode::OK, JSON_MEDIA_TYPE, streamed_body(chunks))
}

pub fn csv_response(generator: CsvGenerator) -> Response<ResponseBody> {
    make_response(StatusCode::OK, CSV_MEDIA_TYPE, streamed_body(generator.rows()))
}
