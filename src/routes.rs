// Route definitions and the health listener

use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warp::Filter;

use crate::consumer::Liveness;
use crate::handlers;

pub fn configure_routes(
    liveness: Liveness,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // GET /healthz
    warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_liveness(liveness))
        .and_then(handlers::health_handler)
}

fn with_liveness(
    liveness: Liveness,
) -> impl Filter<Extract = (Liveness,), Error = Infallible> + Clone {
    warp::any().map(move || liveness.clone())
}

/// Serve `/healthz` on `addr` until `shutdown` is cancelled
pub async fn serve_health(addr: SocketAddr, liveness: Liveness, shutdown: CancellationToken) {
    match TcpListener::bind(addr).await {
        Ok(listener) => serve_health_on(listener, liveness, shutdown).await,
        Err(e) => error!(%addr, error = %e, "health server error"),
    }
}

/// Serve `/healthz` on an already bound listener until `shutdown` is cancelled
pub(crate) async fn serve_health_on(
    listener: TcpListener,
    liveness: Liveness,
    shutdown: CancellationToken,
) {
    let addr = listener.local_addr().ok();
    info!(addr = ?addr, "health server running");

    warp::serve(configure_routes(liveness))
        .incoming(listener)
        .graceful(shutdown.cancelled_owned())
        .run()
        .await;

    info!(addr = ?addr, "health server stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;
    use warp::http::StatusCode;

    #[tokio::test]
    async fn test_healthz_ok() {
        let routes = configure_routes(Liveness::new());

        let res = warp::test::request()
            .method("GET")
            .path("/healthz")
            .reply(&routes)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(&res.body()[..], b"OK");
    }

    #[tokio::test]
    async fn test_healthz_stale() {
        let liveness = Liveness::starting_at(Utc::now() - TimeDelta::seconds(31));
        let routes = configure_routes(liveness);

        let res = warp::test::request()
            .method("GET")
            .path("/healthz")
            .reply(&routes)
            .await;

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("no recent poll"));
    }

    #[tokio::test]
    async fn test_healthz_recovers_after_touch() {
        let liveness = Liveness::starting_at(Utc::now() - TimeDelta::seconds(120));
        let routes = configure_routes(liveness.clone());

        liveness.touch();

        let res = warp::test::request()
            .method("GET")
            .path("/healthz")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let routes = configure_routes(Liveness::new());

        let res = warp::test::request()
            .method("GET")
            .path("/metrics")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_health_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_health(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            Liveness::new(),
            shutdown.clone(),
        ));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("health server should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_serve_health_on_keeps_bound_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_health_on(listener, Liveness::new(), shutdown.clone()));

        // The port stays taken while serving
        assert!(TcpListener::bind(addr).await.is_err());

        let res = reqwest::get(format!("http://{}/healthz", addr)).await.unwrap();
        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(res.text().await.unwrap(), "OK");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("health server should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_serve_health_returns_when_address_taken() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            serve_health(addr, Liveness::new(), CancellationToken::new()),
        )
        .await
        .expect("bind failure should end the listener task");
    }
}
