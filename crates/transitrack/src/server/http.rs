//! Actix Web HTTP API for location submission and queries.
//!
//! The server runs on a dedicated thread so the live channel's tokio
//! runtime stays free of Actix runtime concerns. A oneshot handle stops
//! it on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::directory::AccountDirectory;
use crate::error::Error;
use crate::ingest::LocationIngest;
use crate::report::ReportInput;
use crate::stops::StopIndex;

/// Shared state backing the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Ingest pipeline for submissions and latest-position queries.
    pub ingest: LocationIngest,
    /// Stop index for nearest-stop queries.
    pub stops: StopIndex,
    /// Optional account directory gating submissions.
    pub directory: Option<Arc<dyn AccountDirectory>>,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("stops", &self.stops.len())
            .field("gated", &self.directory.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle for the HTTP server thread.
#[derive(Debug, Default)]
pub struct HttpServerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl HttpServerHandle {
    /// Signal the server to stop and block until the thread exits.
    pub fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// Register the API routes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/location", web::post().to(submit_location))
        .route("/locations/{entity_id}", web::get().to(latest_location))
        .route("/nearest-stop", web::post().to(nearest_stop));
}

/// Spawn the HTTP server thread and return a handle that can stop it.
///
/// # Errors
///
/// Returns an error if the server thread cannot be spawned. Bind
/// failures surface inside the thread and are logged.
pub fn spawn_http_server(addr: SocketAddr, state: ApiState) -> crate::error::Result<HttpServerHandle> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = std::thread::Builder::new()
        .name("transitrack-http".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::new(state.clone()))
                        .configure(routes)
                })
                .bind(addr)?
                .run();

                info!("HTTP API listening on {addr}");

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            }) {
                error!("HTTP server error: {err}");
            }
        })?;

    Ok(HttpServerHandle {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Map a crate error onto the HTTP response contract.
fn error_response(err: &Error) -> HttpResponse {
    match err {
        Error::InvalidInput { message } => {
            HttpResponse::BadRequest().json(json!({ "error": message }))
        }
        Error::NotFound { .. } => {
            HttpResponse::NotFound().json(json!({ "error": "No location found" }))
        }
        Error::Unauthorized => {
            HttpResponse::Unauthorized().json(json!({ "error": "Invalid credentials" }))
        }
        other => {
            error!("Request failed: {other}");
            HttpResponse::InternalServerError().json(json!({ "error": "Server error" }))
        }
    }
}

/// Check the optional submission gate.
async fn authorize(state: &ApiState, req: &HttpRequest) -> Result<(), Error> {
    let Some(directory) = &state.directory else {
        return Ok(());
    };

    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    let (Some(email), Some(password)) =
        (header("x-account-email"), header("x-account-password"))
    else {
        return Err(Error::Unauthorized);
    };

    directory.verify_credentials(&email, &password).await?;
    Ok(())
}

/// POST /location — persist a driver location and broadcast it.
async fn submit_location(
    req: HttpRequest,
    body: web::Json<ReportInput>,
    state: web::Data<ApiState>,
) -> HttpResponse {
    if let Err(err) = authorize(&state, &req).await {
        return error_response(&err);
    }

    match state.ingest.submit(body.into_inner()) {
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Location saved successfully" })),
        Err(err) => error_response(&err),
    }
}

/// Response body for latest-position queries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LatestResponse {
    latitude: f64,
    longitude: f64,
    recorded_at: chrono::DateTime<chrono::Utc>,
}

/// GET /locations/{entity_id} — fetch the latest location of a bus.
async fn latest_location(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> HttpResponse {
    let entity_id = path.into_inner();
    match state.ingest.latest(&entity_id) {
        Ok(report) => HttpResponse::Ok().json(LatestResponse {
            latitude: report.latitude,
            longitude: report.longitude,
            recorded_at: report.recorded_at,
        }),
        Err(err) => error_response(&err),
    }
}

/// Query body for nearest-stop lookups.
#[derive(Debug, Deserialize)]
struct NearestQuery {
    latitude: f64,
    longitude: f64,
}

/// POST /nearest-stop — find the closest stop to a point.
async fn nearest_stop(
    body: web::Json<NearestQuery>,
    state: web::Data<ApiState>,
) -> HttpResponse {
    match state.stops.nearest(body.latitude, body.longitude) {
        Ok(nearest) => HttpResponse::Ok().json(nearest),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::hub::BroadcastHub;
    use crate::stops::StopPoint;
    use crate::storage::Storage;
    use actix_web::{http::StatusCode, test};
    use std::sync::Mutex;

    fn test_state(directory: Option<Arc<dyn AccountDirectory>>) -> ApiState {
        let storage = Arc::new(Mutex::new(Storage::open_in_memory().unwrap()));
        let hub = Arc::new(BroadcastHub::new());
        ApiState {
            ingest: LocationIngest::new(storage, hub),
            stops: StopIndex::new(vec![
                StopPoint::new(1, "A", 0.0, 0.0),
                StopPoint::new(2, "B", 1.0, 1.0),
            ]),
            directory,
        }
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_submit_then_get_latest() {
        let app = test_app!(test_state(None));

        let req = test::TestRequest::post()
            .uri("/location")
            .set_json(json!({ "entityId": "bus-1", "latitude": 51.5, "longitude": -0.12 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/locations/bus-1")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["latitude"], 51.5);
        assert_eq!(body["longitude"], -0.12);
        assert!(body["recordedAt"].is_string());
    }

    #[actix_web::test]
    async fn test_submit_invalid_latitude_is_400() {
        let app = test_app!(test_state(None));

        let req = test::TestRequest::post()
            .uri("/location")
            .set_json(json!({ "entityId": "bus-1", "latitude": 120.0, "longitude": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_submit_missing_fields_is_400() {
        let app = test_app!(test_state(None));

        let req = test::TestRequest::post()
            .uri("/location")
            .set_json(json!({ "entityId": "bus-1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_latest_unknown_entity_is_404() {
        let app = test_app!(test_state(None));

        let req = test::TestRequest::get().uri("/locations/ghost").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_nearest_stop_returns_closest() {
        let app = test_app!(test_state(None));

        let req = test::TestRequest::post()
            .uri("/nearest-stop")
            .set_json(json!({ "latitude": 0.1, "longitude": 0.1 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "A");
        assert!(body["distanceKm"].as_f64().unwrap() > 0.0);
    }

    #[actix_web::test]
    async fn test_nearest_stop_out_of_range_is_400() {
        let app = test_app!(test_state(None));

        let req = test::TestRequest::post()
            .uri("/nearest-stop")
            .set_json(json!({ "latitude": 95.0, "longitude": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_nearest_stop_empty_index_is_500() {
        let mut state = test_state(None);
        state.stops = StopIndex::default();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/nearest-stop")
            .set_json(json!({ "latitude": 0.0, "longitude": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_gated_submission_requires_credentials() {
        let directory = Arc::new(StaticDirectory::with_accounts([(
            "driver@example.com".to_string(),
            "pw".to_string(),
        )]));
        let app = test_app!(test_state(Some(directory)));

        // No credentials
        let req = test::TestRequest::post()
            .uri("/location")
            .set_json(json!({ "entityId": "bus-1", "latitude": 0.0, "longitude": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Wrong credentials
        let req = test::TestRequest::post()
            .uri("/location")
            .insert_header(("x-account-email", "driver@example.com"))
            .insert_header(("x-account-password", "wrong"))
            .set_json(json!({ "entityId": "bus-1", "latitude": 0.0, "longitude": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Valid credentials
        let req = test::TestRequest::post()
            .uri("/location")
            .insert_header(("x-account-email", "driver@example.com"))
            .insert_header(("x-account-password", "pw"))
            .set_json(json!({ "entityId": "bus-1", "latitude": 0.0, "longitude": 0.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
