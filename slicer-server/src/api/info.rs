use super::document;
use crate::config::ServerOptions;
use crate::context::RequestContext;
use crate::errors::Result;
use crate::render::body::{ResponseBody, TEXT_MEDIA_TYPE, full_body, make_response};
use crate::render::json_response;
use http::{Response, StatusCode};
use serde::Serialize;

pub const API_VERSION: u32 = 2;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: &'static str,
    server_version: &'static str,
    api_version: u32,
}

#[derive(Debug, Serialize)]
struct ServerInfo<'a> {
    authorization_method: &'a str,
    version: &'static str,
    api_version: u32,
}

/// Liveness marker
pub fn index() -> Response<ResponseBody> {
    make_response(StatusCode::OK, TEXT_MEDIA_TYPE, full_body("Slicer\n"))
}

pub fn version(ctx: &RequestContext) -> Result<Response<ResponseBody>> {
    let info = VersionInfo {
        version: SERVER_VERSION,
        server_version: SERVER_VERSION,
        api_version: API_VERSION,
    };
    Ok(json_response(document(&info)?, ctx))
}

pub fn info(ctx: &RequestContext, options: &ServerOptions) -> Result<Response<ResponseBody>> {
    let info = ServerInfo {
        authorization_method: &options.authorization_method,
        version: SERVER_VERSION,
        api_version: API_VERSION,
    };
    Ok(json_response(document(&info)?, ctx))
}
