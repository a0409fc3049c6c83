pub mod http_metrics;
pub mod request_id;

pub use http_metrics::metrics_middleware;
pub use request_id::{REQUEST_ID_HEADER, make_request_span, request_id_middleware};
