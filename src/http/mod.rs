//! HTTP interface: dashboard pages, JSON aggregate endpoints, the SQL
//! console, and the nginx config-snippet generator.

mod error;
mod handlers;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::Ballcone;

/// Shared application state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub ballcone: Arc<Ballcone>,
}

pub fn router(ballcone: Arc<Ballcone>) -> Router {
    let state = AppState { ballcone };

    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/services/{service}", get(handlers::service_overview))
        .route("/services/{service}/average/{field}", get(handlers::average))
        .route("/services/{service}/count/{field}", get(handlers::count))
        .route("/services/{service}/count_group/{group}", get(handlers::count_group))
        .route("/services/{service}/{command}", get(handlers::command))
        .route("/sql", get(handlers::sql_get).post(handlers::sql_post))
        .route("/nginx", get(handlers::nginx_config))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::core::geoip::NoGeoIp;
    use crate::db::Dao;

    async fn test_app() -> Router {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let dao = Dao::new(pool);
        let ballcone = Arc::new(Ballcone::new(dao, Arc::new(NoGeoIp), 5, 30));
        router(ballcone)
    }

    #[tokio::test]
    async fn dashboard_renders_with_no_services() {
        let app = test_app().await;
        let response = app
            .oneshot(axum::http::Request::builder().uri("/").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_service_returns_404() {
        let app = test_app().await;
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/services/nosuch")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn average_endpoint_returns_json_for_known_service() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let dao = Dao::new(pool);
        dao.create_table("blog").await.unwrap();
        let ballcone = Arc::new(Ballcone::new(dao, Arc::new(NoGeoIp), 5, 30));
        let app = router(ballcone);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/services/blog/average/generation_time")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["table"], "blog");
    }

    #[tokio::test]
    async fn nginx_rejects_invalid_ip() {
        let app = test_app().await;
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/nginx?service=blog&ip=not-an-ip")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
