use crate::errors::{Result, SlicerError};
use http::Method;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Param,
}

/// A path pattern such as `/cube/{name}/model`. At most one parameter, which
/// always names the cube.
#[derive(Debug)]
struct PathPattern {
    segments: Vec<PathSegment>,
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        let normalized = pattern.trim().trim_matches('/');
        let segments = if normalized.is_empty() {
            vec![]
        } else {
            normalized
                .split('/')
                .map(|s| {
                    if s.starts_with('{') && s.ends_with('}') {
                        PathSegment::Param
                    } else {
                        PathSegment::Static(s.to_string())
                    }
                })
                .collect()
        };
        PathPattern { segments }
    }

    /// Returns `Some(param)` on a match. Trailing slashes are ignored.
    fn matches<'a>(&self, request_path: &'a str) -> Option<Option<&'a str>> {
        let normalized = request_path.trim().trim_matches('/');
        let request_segments: Vec<&'a str> = if normalized.is_empty() {
            vec![]
        } else {
            normalized.split('/').collect()
        };

        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut param = None;
        for (pattern, segment) in self.segments.iter().zip(request_segments) {
            match pattern {
                PathSegment::Static(s) if s == segment => {}
                PathSegment::Static(_) => return None,
                PathSegment::Param if segment.is_empty() => return None,
                PathSegment::Param => param = Some(segment),
            }
        }
        Some(param)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Index,
    Version,
    Info,
    Cubes,
    CubeModel,
    CubeAggregate,
}

impl Endpoint {
    /// Low-cardinality name used in logs and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Index => "index",
            Endpoint::Version => "version",
            Endpoint::Info => "info",
            Endpoint::Cubes => "cubes",
            Endpoint::CubeModel => "cube_model",
            Endpoint::CubeAggregate => "aggregate",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a> {
    pub endpoint: Endpoint,
    /// Percent-decoded cube name.
    pub cube_name: Option<Cow<'a, str>>,
}

#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<(PathPattern, Endpoint)>,
}

impl RouteTable {
    pub fn new(routes: &[(&str, Endpoint)]) -> Self {
        RouteTable {
            routes: routes
                .iter()
                .map(|(pattern, endpoint)| (PathPattern::parse(pattern), *endpoint))
                .collect(),
        }
    }

    pub fn slicer() -> Self {
        RouteTable::new(&[
            ("/", Endpoint::Index),
            ("/version", Endpoint::Version),
            ("/info", Endpoint::Info),
            ("/cubes", Endpoint::Cubes),
            ("/cube/{name}/model", Endpoint::CubeModel),
            ("/cube/{name}/aggregate", Endpoint::CubeAggregate),
        ])
    }

    /// Every route is read-only: only `GET` and `HEAD` are served.
    pub fn resolve<'a>(&self, method: &Method, path: &'a str) -> Result<RouteMatch<'a>> {
        let route_match = self
            .routes
            .iter()
            .find_map(|(pattern, endpoint)| {
                pattern.matches(path).map(|param| (*endpoint, param))
            });
        let Some((endpoint, param)) = route_match else {
            return Err(SlicerError::NotFound(path.to_string()));
        };

        if method != Method::GET && method != Method::HEAD {
            return Err(SlicerError::MethodNotAllowed(method.clone()));
        }

        let cube_name = param.map(decode_segment).transpose()?;
        Ok(RouteMatch {
            endpoint,
            cube_name,
        })
    }
}

fn decode_segment(segment: &str) -> Result<Cow<'_, str>> {
    percent_decode_str(segment).decode_utf8().map_err(|_| {
        SlicerError::Request(format!("path segment '{segment}' is not valid UTF-8"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        let table = RouteTable::slicer();
        for (path, endpoint) in [
            ("/", Endpoint::Index),
            ("", Endpoint::Index),
            ("/version", Endpoint::Version),
            ("/info/", Endpoint::Info),
            ("/cubes", Endpoint::Cubes),
        ] {
            let route_match = table.resolve(&Method::GET, path).unwrap();
            assert_eq!(route_match.endpoint, endpoint, "{path}");
            assert_eq!(route_match.cube_name, None);
        }
    }

    #[test]
    fn test_cube_routes() {
        let table = RouteTable::slicer();
        assert_eq!(
            table.resolve(&Method::GET, "/cube/sales/model").unwrap(),
            RouteMatch {
                endpoint: Endpoint::CubeModel,
                cube_name: Some("sales".into()),
            }
        );
        assert_eq!(
            table.resolve(&Method::HEAD, "/cube/sales/aggregate/").unwrap(),
            RouteMatch {
                endpoint: Endpoint::CubeAggregate,
                cube_name: Some("sales".into()),
            }
        );
    }

    #[test]
    fn test_cube_name_is_percent_decoded() {
        let table = RouteTable::slicer();
        let route_match = table.resolve(&Method::GET, "/cube/sal%65s/model").unwrap();
        assert_eq!(route_match.cube_name.as_deref(), Some("sales"));

        let route_match = table
            .resolve(&Method::GET, "/cube/north%20sales%C3%A9/aggregate")
            .unwrap();
        assert_eq!(route_match.cube_name.as_deref(), Some("north salesé"));

        // Encoded slashes stay inside the segment
        let route_match = table.resolve(&Method::GET, "/cube/a%2Fb/model").unwrap();
        assert_eq!(route_match.cube_name.as_deref(), Some("a/b"));
    }

    #[test]
    fn test_invalid_utf8_cube_name() {
        let table = RouteTable::slicer();
        assert!(matches!(
            table.resolve(&Method::GET, "/cube/%FF%FE/model"),
            Err(SlicerError::Request(_))
        ));
    }

    #[test]
    fn test_unknown_paths() {
        let table = RouteTable::slicer();
        for path in ["/cube", "/cube/sales", "/cube//model", "/cube/sales/facts", "/nope"] {
            assert!(
                matches!(table.resolve(&Method::GET, path), Err(SlicerError::NotFound(_))),
                "{path}"
            );
        }
    }

    #[test]
    fn test_write_methods_are_rejected() {
        let table = RouteTable::slicer();
        assert!(matches!(
            table.resolve(&Method::POST, "/cubes"),
            Err(SlicerError::MethodNotAllowed(Method::POST))
        ));
        // Unknown paths take precedence
        assert!(matches!(
            table.resolve(&Method::DELETE, "/nope"),
            Err(SlicerError::NotFound(_))
        ));
    }
}
