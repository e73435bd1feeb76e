use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Local;
use crac_fuzzy::{Controller, FuzzyEngine, DEFAULT_TOP_RULES};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use tokio::sync::RwLock as AsyncRwLock;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::simulation::{
    check_alerts, metrics, Alert, Simulation, SimulationMetrics, SimulationParams,
    SimulationResults,
};

const MAX_ALERTS: usize = 100;
const RECENT_ALERTS: usize = 10;

type ApiResponse = (StatusCode, axum::Json<serde_json::Value>);

// Shared between the HTTP handlers and the simulation worker
#[derive(Clone)]
pub struct WebState {
    pub engine: Arc<FuzzyEngine>,
    pub setpoint: f64,
    pub server_state: Arc<AsyncRwLock<ServerState>>,
}

impl WebState {
    pub fn new(engine: Arc<FuzzyEngine>, setpoint: f64) -> Self {
        let server_state = ServerState::new(Controller::new(engine.clone()));
        WebState {
            engine,
            setpoint,
            server_state: Arc::new(AsyncRwLock::new(server_state)),
        }
    }
}

pub struct ServerState {
    pub controller: Controller,
    pub simulation: SimulationState,
    pub alerts: Vec<Alert>,
}

impl ServerState {
    pub fn new(controller: Controller) -> Self {
        ServerState {
            controller,
            simulation: SimulationState::default(),
            alerts: Vec::new(),
        }
    }

    pub fn push_alerts(&mut self, alerts: Vec<Alert>) {
        self.alerts.extend(alerts);
        if self.alerts.len() > MAX_ALERTS {
            let excess = self.alerts.len() - MAX_ALERTS;
            self.alerts.drain(..excess);
        }
    }
}

#[derive(Default, Clone, Serialize)]
pub struct SimulationState {
    pub running: bool,
    pub progress: f64,
    /// `[]` until a run finishes.
    #[serde(serialize_with = "data_or_empty")]
    pub data: Option<SimulationData>,
}

fn data_or_empty<S: Serializer>(
    data: &Option<SimulationData>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match data {
        Some(data) => data.serialize(serializer),
        None => serializer.serialize_seq(Some(0))?.end(),
    }
}

#[derive(Clone, Serialize)]
#[serde(untagged)]
pub enum SimulationData {
    Completed {
        results: SimulationResults,
        metrics: SimulationMetrics,
        completed: bool,
    },
    Failed {
        error: String,
        completed: bool,
    },
}

fn default_external_temperature() -> f64 {
    25.0
}

fn default_thermal_load() -> f64 {
    40.0
}

#[derive(Deserialize)]
pub struct CalculateRequest {
    #[serde(rename = "erro", default)]
    error: f64,
    #[serde(rename = "delta_erro", default)]
    error_rate: f64,
    #[serde(rename = "temp_externa", default = "default_external_temperature")]
    external_temperature: f64,
    #[serde(rename = "carga_termica", default = "default_thermal_load")]
    thermal_load: f64,
}

#[derive(Deserialize)]
pub struct RulesQuery {
    limit: Option<usize>,
}

fn bad_request(message: impl Into<String>) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "success": false,
            "error": message.into()
        })),
    )
}

fn ok(body: serde_json::Value) -> ApiResponse {
    (StatusCode::OK, axum::Json(body))
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/api/calculate", post(calculate))
        .route("/api/inference/last", get(last_inference))
        .route("/api/membership_functions", get(membership_functions))
        .route("/api/rules", get(rules))
        .route("/api/simulation/start", post(start_simulation))
        .route("/api/simulation/status", get(simulation_status))
        .route("/api/alerts", get(alerts))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn create_web_server(state: WebState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Starting web server on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("web server stopped")
}

async fn calculate(
    State(state): State<WebState>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> ApiResponse {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(e) => return bad_request(e.body_text()),
    };

    let mut server_state = state.server_state.write().await;
    let power = server_state.controller.calculate(
        request.error,
        request.error_rate,
        request.external_temperature,
        request.thermal_load,
    );
    let Some(trace) = server_state.controller.last_trace() else {
        return bad_request("no inference trace recorded");
    };
    let report = trace.report(DEFAULT_TOP_RULES);

    // The room temperature is reconstructed from the clamped error
    let temperature = state.setpoint + trace.inputs.error;
    let alerts = check_alerts(temperature, power, Local::now().timestamp());
    server_state.push_alerts(alerts);

    ok(json!({
        "success": true,
        "potencia_crac": (power * 100.0).round() / 100.0,
        "inference_details": report
    }))
}

async fn last_inference(State(state): State<WebState>) -> ApiResponse {
    let server_state = state.server_state.read().await;
    let report = server_state
        .controller
        .last_trace()
        .map(|trace| trace.report(DEFAULT_TOP_RULES));
    ok(json!({
        "success": true,
        "inference_details": report
    }))
}

async fn membership_functions(State(state): State<WebState>) -> ApiResponse {
    ok(json!({
        "success": true,
        "data": state.engine.membership_curves()
    }))
}

async fn rules(State(state): State<WebState>, Query(query): Query<RulesQuery>) -> ApiResponse {
    ok(json!({
        "success": true,
        "rules": state.engine.rule_table(query.limit)
    }))
}

async fn start_simulation(
    State(state): State<WebState>,
    payload: Result<Json<SimulationParams>, JsonRejection>,
) -> ApiResponse {
    let Json(params) = match payload {
        Ok(params) => params,
        Err(e) => return bad_request(e.body_text()),
    };

    {
        let mut server_state = state.server_state.write().await;
        if server_state.simulation.running {
            return bad_request("a simulation is already running");
        }
        server_state.simulation = SimulationState {
            running: true,
            progress: 0.0,
            data: None,
        };
    }

    info!(
        "starting simulation from {:.1}°C, external base {:.1}°C, load base {:.1}%",
        params.initial_temperature, params.external_base, params.load_base
    );
    tokio::spawn(run_simulation(state, params));

    ok(json!({
        "success": true,
        "message": "simulation started"
    }))
}

async fn run_simulation(state: WebState, params: SimulationParams) {
    let started = Local::now().timestamp();
    let simulation = Simulation::new(state.engine.clone(), state.setpoint);
    let shared = state.server_state.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::from_entropy();
        simulation.run(params, &mut rng, |progress| {
            shared.blocking_write().simulation.progress = progress;
        })
    })
    .await;

    let mut server_state = state.server_state.write().await;
    match outcome {
        Ok(results) => {
            for i in 0..results.len() {
                let timestamp = started + results.time[i] as i64 * 60;
                let alerts = check_alerts(results.temperature[i], results.power_crac[i], timestamp);
                server_state.push_alerts(alerts);
            }
            let metrics = metrics(&results);
            info!(
                "simulation finished: rmse {:.2}, {:.1}% in range, {} violations",
                metrics.rmse, metrics.percent_in_range, metrics.violations
            );
            server_state.simulation.progress = 100.0;
            server_state.simulation.data = Some(SimulationData::Completed {
                results,
                metrics,
                completed: true,
            });
        }
        Err(e) => {
            error!("simulation failed: {}", e);
            server_state.simulation.data = Some(SimulationData::Failed {
                error: e.to_string(),
                completed: false,
            });
        }
    }
    server_state.simulation.running = false;
}

async fn simulation_status(State(state): State<WebState>) -> axum::Json<SimulationState> {
    let server_state = state.server_state.read().await;
    axum::Json(server_state.simulation.clone())
}

async fn alerts(State(state): State<WebState>) -> ApiResponse {
    let server_state = state.server_state.read().await;
    let recent = &server_state.alerts[server_state.alerts.len().saturating_sub(RECENT_ALERTS)..];
    ok(json!({ "alerts": recent }))
}
