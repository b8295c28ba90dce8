use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::cli::{Scenario, SimulateArgs, build_scenario};
use crate::core::{DEFAULT_MAX_CYCLES, RecurringItem, SimulationError, Snapshot, simulate};
use crate::store::RecordStore;

#[derive(Clone)]
struct AppState {
    store_path: Arc<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    payment_size: Option<f64>,
    investment_size: Option<f64>,
    initial_payment: Option<f64>,
    profit_tax: Option<f64>,
    yearly_skim: Option<f64>,
    payment_interest_rate: Option<f64>,
    investment_interest_rate: Option<f64>,
    start_month: Option<u32>,
    max_cycles: Option<u32>,

    items: Option<Vec<RecurringItem>>,
}

#[derive(Debug)]
struct ApiRequest {
    scenario: Scenario,
    items: Option<Vec<RecurringItem>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    settled: bool,
    cycles: u32,
    snapshots: Vec<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ItemsResponse {
    items: Vec<RecurringItem>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiFailure = (StatusCode, String);

pub async fn run_http_server(port: u16, store_path: PathBuf) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = AppState {
        store_path: Arc::new(store_path),
    };
    let app = Router::new()
        .route("/api/items", get(items_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "payoff HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/items");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn items_handler(State(state): State<AppState>) -> Response {
    let store_path = Arc::clone(&state.store_path);
    let loaded = tokio::task::spawn_blocking(move || RecordStore::open(store_path.as_path())).await;
    match loaded {
        Ok(Ok(store)) => json_response(
            StatusCode::OK,
            ItemsResponse {
                items: store.items().to_vec(),
            },
        ),
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        Err(e) => {
            error!(error = %e, "item listing task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let store_path = Arc::clone(&state.store_path);
    let outcome =
        tokio::task::spawn_blocking(move || run_simulation(store_path.as_path(), request)).await;

    match outcome {
        Ok(Ok((status, response))) => json_response(status, response),
        Ok(Err((status, msg))) => error_response(status, &msg),
        Err(e) => {
            error!(error = %e, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn run_simulation(
    store_path: &Path,
    request: ApiRequest,
) -> Result<(StatusCode, SimulateResponse), ApiFailure> {
    let items = match request.items {
        Some(items) => items,
        None => RecordStore::open(store_path)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .items()
            .to_vec(),
    };

    let scenario = request.scenario;
    match simulate(&scenario.rates, &scenario.inputs, &items) {
        Ok(snapshots) => Ok((
            StatusCode::OK,
            SimulateResponse {
                settled: true,
                cycles: cycles_run(&snapshots),
                snapshots,
                error: None,
            },
        )),
        Err(SimulationError::NonConvergent {
            max_cycles,
            partial,
        }) => {
            let message = SimulationError::NonConvergent {
                max_cycles,
                partial: Vec::new(),
            }
            .to_string();
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                SimulateResponse {
                    settled: false,
                    cycles: cycles_run(&partial),
                    snapshots: partial,
                    error: Some(message),
                },
            ))
        }
        Err(e) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
    }
}

fn cycles_run(snapshots: &[Snapshot]) -> u32 {
    snapshots.last().map_or(0, |s| s.cycle)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.payment_size {
        args.payment_size = v;
    }
    if let Some(v) = payload.investment_size {
        args.investment_size = v;
    }
    if let Some(v) = payload.initial_payment {
        args.initial_payment = v;
    }
    if let Some(v) = payload.profit_tax {
        args.profit_tax = v;
    }
    if let Some(v) = payload.yearly_skim {
        args.yearly_skim = v;
    }
    if let Some(v) = payload.payment_interest_rate {
        args.payment_interest_rate = v;
    }
    if let Some(v) = payload.investment_interest_rate {
        args.investment_interest_rate = v;
    }
    if let Some(v) = payload.start_month {
        args.start_month = Some(v);
    }
    if let Some(v) = payload.max_cycles {
        args.max_cycles = v;
    }

    let scenario = build_scenario(args)?;
    Ok(ApiRequest {
        scenario,
        items: payload.items,
    })
}

fn default_args_for_api() -> SimulateArgs {
    SimulateArgs {
        payment_size: 10_000.0,
        investment_size: 0.0,
        initial_payment: 0.0,
        profit_tax: 0.0,
        yearly_skim: 0.0,
        payment_interest_rate: 0.0,
        investment_interest_rate: 0.0,
        start_month: None,
        max_cycles: DEFAULT_MAX_CYCLES,
    }
}
