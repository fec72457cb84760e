use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::ToSocketAddrs;

use crate::container::{self, ContainerID};
use crate::detail::{ContainerDetail, DetailTracker};
use crate::engine::{self, DEFAULT_LOG_TAIL, Transport};
use crate::health::{Alert, Notifier};
use crate::logs::LogRecord;
use crate::poller::Poller;

mod models;

pub use models::{
    ContainerEntry, ContainersResponse, ErrorBody, FormattedSample, LogParams, SampleView,
    StatusResponse,
};

/// Upper bound for the `tail` query parameter of the log endpoint.
const MAX_LOG_TAIL: usize = 10_000;

pub struct AppState<T, N> {
    poller: Arc<Poller<T, N>>,
    details: Arc<DetailTracker>,
}

impl<T, N> Clone for AppState<T, N> {
    fn clone(&self) -> Self {
        Self {
            poller: Arc::clone(&self.poller),
            details: Arc::clone(&self.details),
        }
    }
}

impl<T, N> AppState<T, N> {
    pub fn new(poller: Arc<Poller<T, N>>, details: Arc<DetailTracker>) -> Self {
        Self { poller, details }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] engine::Error),
    #[error(transparent)]
    InvalidContainerID(#[from] container::Error),
    #[error("no polling cycle has completed yet")]
    NotReady,
    #[error("no container selected")]
    NoSelection,
    #[error("selection changed while fetching container details")]
    SelectionChanged,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(err) if err.is_connectivity() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Engine(engine::Error::Status { status, .. })
                if *status == StatusCode::NOT_FOUND =>
            {
                StatusCode::NOT_FOUND
            }
            ApiError::Engine(engine::Error::Status { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidContainerID(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NoSelection => StatusCode::NOT_FOUND,
            ApiError::SelectionChanged => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("API request failed: {self}");
        } else {
            log::debug!("API request rejected: {self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type Result<T> = std::result::Result<T, ApiError>;

async fn get_status<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
) -> Json<StatusResponse> {
    let poller = &state.poller;
    Json(StatusResponse {
        connectivity: poller.gateway().status().await,
        cycle: poller.cycle_status(),
        settings: poller.settings(),
    })
}

async fn retry_connectivity<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
) -> Result<Json<StatusResponse>> {
    let endpoint = state.poller.gateway().reconnect().await?;
    log::info!("manual retry connected to {endpoint}");
    Ok(get_status(State(state)).await)
}

async fn list_containers<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
) -> Result<Json<ContainersResponse>> {
    let report = state.poller.latest().ok_or(ApiError::NotReady)?;
    Ok(Json(report.into()))
}

async fn container_metrics<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SampleView>>> {
    let id = ContainerID::new(id)?;
    let history = state.poller.metrics().history(&id);
    Ok(Json(history.into_iter().map(SampleView::from).collect()))
}

async fn container_logs<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
    Path(id): Path<String>,
    Query(params): Query<LogParams>,
) -> Result<Json<Vec<LogRecord>>> {
    let id = ContainerID::new(id)?;
    let gateway = state.poller.gateway();
    let records = match params.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => gateway.search_logs(&id, term).await?,
        _ => {
            let tail = params.tail.unwrap_or(DEFAULT_LOG_TAIL).clamp(1, MAX_LOG_TAIL);
            gateway.log_records(&id, tail).await?
        }
    };
    Ok(Json(records))
}

async fn restart_container<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = ContainerID::new(id)?;
    state.poller.gateway().restart(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn select_container<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
    Path(id): Path<String>,
) -> Result<Json<ContainerDetail>> {
    let id = ContainerID::new(id)?;
    let selection = state.details.select(id);
    let published = state
        .details
        .refresh(state.poller.gateway(), state.poller.metrics(), selection)
        .await?;
    if !published {
        return Err(ApiError::SelectionChanged);
    }
    state
        .details
        .detail()
        .map(Json)
        .ok_or(ApiError::SelectionChanged)
}

async fn get_selection<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
) -> Result<Json<ContainerDetail>> {
    state.details.detail().map(Json).ok_or(ApiError::NoSelection)
}

async fn clear_selection<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
) -> StatusCode {
    state.details.clear();
    StatusCode::NO_CONTENT
}

async fn list_alerts<T: Transport, N: Notifier>(
    State(state): State<AppState<T, N>>,
) -> Json<Vec<Alert>> {
    Json(state.poller.alerter().recent())
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new<T, N>(state: AppState<T, N>) -> Self
    where
        T: Transport + 'static,
        N: Notifier + 'static,
    {
        Self {
            router: router(state),
        }
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("status API listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}

fn router<T, N>(state: AppState<T, N>) -> axum::Router
where
    T: Transport + 'static,
    N: Notifier + 'static,
{
    axum::Router::new()
        .route("/status", get(get_status::<T, N>))
        .route("/connectivity/retry", post(retry_connectivity::<T, N>))
        .route("/containers", get(list_containers::<T, N>))
        .route("/containers/{id}/metrics", get(container_metrics::<T, N>))
        .route("/containers/{id}/logs", get(container_logs::<T, N>))
        .route("/containers/{id}/restart", post(restart_container::<T, N>))
        .route(
            "/selection",
            get(get_selection::<T, N>).delete(clear_selection::<T, N>),
        )
        .route("/selection/{id}", post(select_container::<T, N>))
        .route("/alerts", get(list_alerts::<T, N>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::testing::{FakeTransport, Reply};
    use crate::health::LogNotifier;
    use crate::poller::tests::{endpoint, poller};

    async fn app() -> (axum::Router, Arc<Poller<FakeTransport, LogNotifier>>) {
        let poller = Arc::new(poller().await);
        let state = AppState::new(Arc::clone(&poller), Arc::new(DetailTracker::default()));
        (router(state), poller)
    }

    async fn send(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_containers_before_first_cycle() {
        let (app, _) = app().await;
        let (status, body) = send(&app, "GET", "/containers").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_containers_are_formatted() {
        let (app, poller) = app().await;
        poller.poll_once().await.unwrap();

        let (status, body) = send(&app, "GET", "/containers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_cpu_percent"], "20.00");
        let web = &body["containers"][0];
        assert_eq!(web["name"], "web");
        assert_eq!(web["state"], "running");
        assert_eq!(web["sample"]["formatted"]["memory_usage"], "256 B");
        assert_eq!(web["sample"]["formatted"]["memory_limit"], "1.0 KB");
        assert!(body["containers"][1]["sample"].is_null());
    }

    #[tokio::test]
    async fn test_metrics_history() {
        let (app, poller) = app().await;
        poller.poll_once().await.unwrap();
        poller.poll_once().await.unwrap();

        let (status, body) = send(&app, "GET", "/containers/aaa/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "GET", "/containers/not%20valid/metrics").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_logs_and_search() {
        let (app, poller) = app().await;
        let transport = poller.gateway().transport();
        transport.script(
            &endpoint(),
            "/containers/aaa/logs?stdout=1&stderr=1&timestamps=1&tail=5",
            vec![Reply::Ok("booting\nWARN slow disk\n")],
        );
        transport.script(
            &endpoint(),
            "/containers/aaa/logs?stdout=1&stderr=1&timestamps=1&tail=1000",
            vec![Reply::Ok("booting\nWARN slow disk\nerror: Disk full\n")],
        );

        let (status, body) = send(&app, "GET", "/containers/aaa/logs?tail=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["severity"], "warning");

        let (status, body) = send(&app, "GET", "/containers/aaa/logs?search=DISK").await;
        assert_eq!(status, StatusCode::OK);
        let messages: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["WARN slow disk", "error: Disk full"]);
    }

    #[tokio::test]
    async fn test_engine_errors_are_mapped() {
        let (app, poller) = app().await;
        let transport = poller.gateway().transport();
        transport.script(
            &endpoint(),
            "/containers/gone/restart",
            vec![Reply::Status(StatusCode::NOT_FOUND)],
        );
        transport.script(
            &endpoint(),
            "/containers/aaa/restart",
            vec![Reply::Status(StatusCode::INTERNAL_SERVER_ERROR)],
        );
        transport.script(&endpoint(), "/containers/bbb/restart", vec![Reply::Ok("")]);

        let (status, _) = send(&app, "POST", "/containers/gone/restart").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/containers/aaa/restart").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let (status, _) = send(&app, "POST", "/containers/bbb/restart").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_503() {
        let (app, poller) = app().await;
        poller
            .gateway()
            .transport()
            .script(&endpoint(), "/containers/aaa/restart", vec![Reply::Refused]);

        let (status, _) = send(&app, "POST", "/containers/aaa/restart").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_status_and_retry() {
        let (app, _) = app().await;
        let (status, body) = send(&app, "POST", "/connectivity/retry").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connectivity"]["active"]["address"], "localhost:2375");
        assert_eq!(body["connectivity"]["consecutive_failures"], 0);
        assert_eq!(body["settings"]["refreshIntervalSeconds"], 10);
    }

    #[tokio::test]
    async fn test_selection_round_trip() {
        let (app, poller) = app().await;
        poller.gateway().transport().script(
            &endpoint(),
            "/containers/aaa/logs?stdout=1&stderr=1&timestamps=1&tail=100",
            vec![Reply::Ok("ready\n")],
        );

        let (status, _) = send(&app, "GET", "/selection").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "POST", "/selection/aaa").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inspect"]["Name"], "/web");
        assert_eq!(body["logs"][0]["message"], "ready");

        let (status, _) = send(&app, "GET", "/selection").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "DELETE", "/selection").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", "/selection").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alerts() {
        let (app, poller) = app().await;
        poller
            .alerter()
            .emit(&crate::health::HealthEvent::Removed {
                name: "web".to_owned(),
            })
            .await;

        let (status, body) = send(&app, "GET", "/alerts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["message"], "Container web was removed");
        assert!(body[0]["time"].as_str().is_some());
    }
}
