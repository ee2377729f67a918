use crate::ServerError;
use crate::api::cubes::CubeListCache;
use crate::api::{aggregate, cubes, info};
use crate::auth::AuthorizationGate;
use crate::config::ServerOptions;
use crate::context::RequestContextBuilder;
use crate::errors::Result;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT, REQUESTS_TOTAL};
use crate::params::QueryParams;
use crate::render::body::ResponseBody;
use crate::routes::{Endpoint, RouteMatch, RouteTable};
use crate::workspace::Workspace;
use http::request::Parts;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response};
use shared::{counter, gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Process-wide state shared by every request. Read-only after startup,
/// apart from the cube list cache.
pub struct Slicer {
    workspace: Arc<dyn Workspace>,
    options: ServerOptions,
    routes: RouteTable,
    cube_list: CubeListCache,
}

impl Slicer {
    pub fn new(workspace: Arc<dyn Workspace>, options: ServerOptions) -> Self {
        Slicer {
            workspace,
            options,
            routes: RouteTable::slicer(),
            cube_list: CubeListCache::new(),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    async fn dispatch(&self, route: RouteMatch<'_>, parts: &Parts) -> Result<Response<ResponseBody>> {
        tracing::debug!(
            route = route.endpoint.as_str(),
            cube = route.cube_name.as_deref(),
            "Matched route"
        );

        let params = QueryParams::parse(parts.uri.query());
        let mut ctx = RequestContextBuilder::new(self.workspace.as_ref(), &self.options)
            .build(route.cube_name.as_deref(), &params, &parts.headers)
            .await?;

        if let Some(cube) = &ctx.cube {
            AuthorizationGate::new(&self.options.authorization_method, self.workspace.as_ref())
                .authorize(ctx.authorization_token.as_deref(), cube.as_ref())?;
        }

        match route.endpoint {
            Endpoint::Index => Ok(info::index()),
            Endpoint::Version => info::version(&ctx),
            Endpoint::Info => info::info(&ctx, &self.options),
            Endpoint::Cubes => {
                cubes::list_cubes(&ctx, &self.cube_list, self.workspace.as_ref()).await
            }
            Endpoint::CubeModel => cubes::cube_model(&ctx, self.workspace.as_ref()),
            Endpoint::CubeAggregate => aggregate::aggregate(&mut ctx, &params).await,
        }
    }
}

/// hyper service wrapping the shared [`Slicer`] state.
#[derive(Clone)]
pub struct SlicerService {
    app: Arc<Slicer>,
}

impl SlicerService {
    pub fn new(app: Arc<Slicer>) -> Self {
        SlicerService { app }
    }

    /// Handles one request. Every failure is rendered as a JSON error response.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ResponseBody> {
        let (parts, _) = request.into_parts();
        let route = self.app.routes.resolve(&parts.method, parts.uri.path());
        let route_name = route
            .as_ref()
            .map(|route| route.endpoint.as_str())
            .unwrap_or("unknown");

        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        let start = Instant::now();

        let result = match route {
            Ok(route) => self.app.dispatch(route, &parts).await,
            Err(err) => Err(err),
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(
                        method = %parts.method,
                        path = parts.uri.path(),
                        status = status.as_u16(),
                        error = %err,
                        "Request failed"
                    );
                } else {
                    tracing::warn!(
                        method = %parts.method,
                        path = parts.uri.path(),
                        status = status.as_u16(),
                        error = %err,
                        "Request rejected"
                    );
                }
                err.into_response()
            }
        };

        let status = response.status().as_u16().to_string();
        histogram!(REQUEST_DURATION, "route" => route_name, "status" => status.clone())
            .record(start.elapsed().as_secs_f64());
        counter!(REQUESTS_TOTAL, "route" => route_name, "status" => status).increment(1);
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);

        response
    }
}

impl Service<Request<Incoming>> for SlicerService {
    type Response = Response<ResponseBody>;
    type Error = ServerError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(request).await) })
    }
}
