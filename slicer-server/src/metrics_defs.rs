use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route, status.",
};

pub const REQUESTS_TOTAL: MetricDef = MetricDef {
    name: "requests.total",
    metric_type: MetricType::Counter,
    description: "Number of handled requests. Tagged with route, status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const CUBE_LIST_CACHE_HIT: MetricDef = MetricDef {
    name: "cube_list.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of /cubes requests served from the cached cube list",
};

pub const CUBE_LIST_CACHE_MISS: MetricDef = MetricDef {
    name: "cube_list.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of /cubes requests that had to list cubes from the workspace",
};

pub const JSON_RECORDS_TRUNCATED: MetricDef = MetricDef {
    name: "json.records.truncated",
    metric_type: MetricType::Counter,
    description: "Number of JSON sequences cut short by the record limit",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_TOTAL,
    REQUESTS_INFLIGHT,
    CUBE_LIST_CACHE_HIT,
    CUBE_LIST_CACHE_MISS,
    JSON_RECORDS_TRUNCATED,
];
