// GET /healthz handler

use std::convert::Infallible;
use tracing::debug;
use warp::http::StatusCode;

use crate::consumer::Liveness;

pub async fn health_handler(liveness: Liveness) -> Result<impl warp::Reply, Infallible> {
    match liveness.check() {
        Ok(()) => Ok(warp::reply::with_status("OK".to_string(), StatusCode::OK)),
        Err(e) => {
            debug!(error = %e, "health check failed");
            Ok(warp::reply::with_status(
                e.to_string(),
                StatusCode::SERVICE_UNAVAILABLE,
            ))
        }
    }
}
