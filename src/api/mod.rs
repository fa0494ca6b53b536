use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AllocationFailure, AllocationStats, DEFAULT_CONFIDENCE_Z, DEFAULT_ITERATIONS,
    DEFAULT_PENALTY_MULTIPLIER, DominanceMatrix, ModelResult, PlantSpec, SimulationConfig,
    default_catalog, default_fields, run_model,
};

#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    version,
    about = "Monte Carlo crop allocation ranking under market caps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log per-allocation progress
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every allocation and print the ranked summary as JSON
    Run(RunArgs),
    /// Serve the simulation over HTTP
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = default_fields(),
        help = "Field areas in hectares, in processing order"
    )]
    pub fields: Vec<f64>,
    #[arg(
        long,
        help = "JSON file with the crop catalog; defaults to the built-in catalog"
    )]
    pub catalog: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_PENALTY_MULTIPLIER,
        help = "Price multiplier for tonnage beyond a crop's market cap"
    )]
    pub penalty: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_CONFIDENCE_Z,
        help = "Critical value for the confidence interval, e.g. 1.96 or 1.65"
    )]
    pub confidence_z: f64,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[arg(
        long,
        default_value_t = 1,
        help = "Worker threads; 1 evaluates allocations sequentially"
    )]
    pub workers: usize,
    #[arg(long, help = "Only report the best N allocations")]
    pub top: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    fields: Option<Vec<f64>>,
    catalog: Option<Vec<PlantSpec>>,
    iterations: Option<u32>,
    penalty_multiplier: Option<f64>,
    confidence_z: Option<f64>,
    seed: Option<u64>,
    workers: Option<usize>,
    top: Option<usize>,
}

#[derive(Debug)]
struct ApiRequest {
    config: SimulationConfig,
    top: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    iterations: u32,
    penalty_multiplier: f64,
    confidence_z: f64,
    seed: u64,
    total_allocations: usize,
    completed_allocations: usize,
    cancelled_allocations: usize,
    ranked: Vec<AllocationStats>,
    dominance: DominanceMatrix,
    failures: Vec<AllocationFailure>,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    fields: Vec<f64>,
    catalog: Vec<PlantSpec>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn default_run_args() -> RunArgs {
    RunArgs {
        fields: default_fields(),
        catalog: None,
        iterations: DEFAULT_ITERATIONS,
        penalty: DEFAULT_PENALTY_MULTIPLIER,
        confidence_z: DEFAULT_CONFIDENCE_Z,
        seed: 42,
        workers: 1,
        top: None,
    }
}

pub fn load_catalog(path: Option<&Path>) -> Result<Vec<PlantSpec>, String> {
    let Some(path) = path else {
        return Ok(default_catalog());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read catalog {}: {e}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| format!("failed to parse catalog {}: {e}", path.display()))
}

fn build_config(args: &RunArgs, catalog: &[PlantSpec]) -> Result<SimulationConfig, String> {
    if args.fields.is_empty() {
        return Err("--fields must list at least one field".to_string());
    }
    if args.iterations == 0 {
        return Err("--iterations must be > 0".to_string());
    }
    if !(args.penalty > 0.0 && args.penalty < 1.0) {
        return Err("--penalty must be strictly between 0 and 1".to_string());
    }
    if !args.confidence_z.is_finite() || args.confidence_z <= 0.0 {
        return Err("--confidence-z must be > 0".to_string());
    }
    if args.workers == 0 {
        return Err("--workers must be >= 1".to_string());
    }
    if args.top == Some(0) {
        return Err("--top must be >= 1 when set".to_string());
    }

    let mut config =
        SimulationConfig::from_parts(&args.fields, catalog).map_err(|e| e.to_string())?;
    config.iterations = args.iterations;
    config.penalty_multiplier = args.penalty;
    config.confidence_z = args.confidence_z;
    config.seed = args.seed;
    config.workers = args.workers;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn build_simulate_response(
    config: &SimulationConfig,
    model: ModelResult,
    top: Option<usize>,
) -> SimulateResponse {
    let completed_allocations = model.ranked.len();
    let mut ranked = model.ranked;
    let mut dominance = model.dominance;
    if let Some(limit) = top {
        // Row counts stay relative to the full ranking.
        ranked.truncate(limit);
        dominance.cells.truncate(limit);
        for row in &mut dominance.cells {
            row.truncate(limit);
        }
        dominance.row_counts.truncate(limit);
    }

    SimulateResponse {
        iterations: config.iterations,
        penalty_multiplier: config.penalty_multiplier,
        confidence_z: config.confidence_z,
        seed: config.seed,
        total_allocations: model.total_allocations,
        completed_allocations,
        cancelled_allocations: model.cancelled_allocations,
        ranked,
        dominance,
        failures: model.failures,
    }
}

/// Runs a batch from the command line. Ctrl-C stops it between allocations
/// and the completed part is still reported.
pub async fn run_cli(args: RunArgs) -> Result<(), String> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let config = build_config(&args, &catalog)?;
    let cancel = Arc::new(AtomicBool::new(false));

    let worker_config = config.clone();
    let worker_cancel = Arc::clone(&cancel);
    let mut batch =
        tokio::task::spawn_blocking(move || run_model(&worker_config, &worker_cancel));

    let joined = tokio::select! {
        joined = &mut batch => joined,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, finishing allocations already in progress");
            cancel.store(true, Ordering::Relaxed);
            batch.await
        }
    };
    let model = joined
        .map_err(|e| format!("simulation task failed: {e}"))?
        .map_err(|e| e.to_string())?;

    let response = build_simulate_response(&config, model, args.top);
    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| format!("failed to serialize results: {e}"))?;
    println!("{json}");
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/catalog", get(catalog_handler))
        .route("/api/simulate", post(simulate_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("harvest HTTP API listening on http://{addr}");
    axum::serve(listener, app).await
}

async fn catalog_handler() -> Response {
    json_response(
        StatusCode::OK,
        CatalogResponse {
            fields: default_fields(),
            catalog: default_catalog(),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let config = request.config.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let cancel = AtomicBool::new(false);
        run_model(&config, &cancel)
    })
    .await;

    match joined {
        Ok(Ok(model)) => json_response(
            StatusCode::OK,
            build_simulate_response(&request.config, model, request.top),
        ),
        Ok(Err(err)) => {
            let status = if err.is_configuration() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, &err.to_string())
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
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
    let payload: SimulatePayload =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut args = default_run_args();
    if let Some(fields) = payload.fields {
        args.fields = fields;
    }
    if let Some(iterations) = payload.iterations {
        args.iterations = iterations;
    }
    if let Some(penalty) = payload.penalty_multiplier {
        args.penalty = penalty;
    }
    if let Some(z) = payload.confidence_z {
        args.confidence_z = z;
    }
    if let Some(seed) = payload.seed {
        args.seed = seed;
    }
    if let Some(workers) = payload.workers {
        args.workers = workers;
    }
    args.top = payload.top;

    let catalog = payload.catalog.unwrap_or_else(default_catalog);
    let config = build_config(&args, &catalog)?;
    Ok(ApiRequest {
        config,
        top: args.top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CropType;

    fn sample_args() -> RunArgs {
        let mut args = default_run_args();
        args.iterations = 200;
        args
    }

    #[test]
    fn build_config_uses_built_in_defaults() {
        let config = build_config(&default_run_args(), &default_catalog()).expect("valid");
        assert_eq!(config.fields().len(), 4);
        assert_eq!(config.catalog().len(), 4);
        assert_eq!(config.iterations, 10_000);
        assert_eq!(config.penalty_multiplier, 0.4);
        assert_eq!(config.confidence_z, 1.96);
        assert_eq!(config.workers, 1);
    }

    fn rejection(mutate: impl FnOnce(&mut RunArgs)) -> String {
        let mut args = sample_args();
        mutate(&mut args);
        build_config(&args, &default_catalog()).expect_err("must reject")
    }

    #[test]
    fn build_config_rejects_invalid_flags() {
        assert!(rejection(|a| a.iterations = 0).contains("--iterations"));
        assert!(rejection(|a| a.penalty = 1.0).contains("--penalty"));
        assert!(rejection(|a| a.penalty = 0.0).contains("--penalty"));
        assert!(rejection(|a| a.confidence_z = -1.0).contains("--confidence-z"));
        assert!(rejection(|a| a.workers = 0).contains("--workers"));
        assert!(rejection(|a| a.fields.clear()).contains("--fields"));
        assert!(rejection(|a| a.top = Some(0)).contains("--top"));
    }

    #[test]
    fn build_config_names_the_offending_field() {
        let mut args = sample_args();
        args.fields = vec![10.0, -2.0];
        let err = build_config(&args, &default_catalog()).expect_err("negative area");
        assert!(err.contains("field 2"), "{err}");
    }

    #[test]
    fn build_config_names_the_offending_catalog_entry() {
        let mut catalog = default_catalog();
        catalog[1].price_per_ton = vec![(100.0, 0.5), (200.0, 0.2)];
        let err = build_config(&sample_args(), &catalog).expect_err("bad mass");
        assert!(err.contains("WHEAT price per ton"), "{err}");

        let mut catalog = default_catalog();
        catalog[0].market_cap_tons = 0.0;
        let err = build_config(&sample_args(), &catalog).expect_err("zero cap");
        assert!(err.contains("BARLEY"), "{err}");

        let err = build_config(&sample_args(), &[]).expect_err("empty catalog");
        assert!(err.contains("empty configuration"), "{err}");
    }

    #[test]
    fn api_request_from_json_parses_camel_case_keys() {
        let json = r#"{
          "fields": [10, 20],
          "iterations": 300,
          "penaltyMultiplier": 0.5,
          "confidenceZ": 1.65,
          "seed": 9,
          "workers": 2,
          "top": 3,
          "catalog": [
            {
              "crop": "CORN",
              "pricePerTon": [[100.0, 0.5], [120.0, 0.5]],
              "yieldPerHa": [[8.0, 1.0]],
              "marketCapTons": 90
            }
          ]
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let config = &request.config;
        assert_eq!(config.fields().len(), 2);
        assert_eq!(config.fields()[1].hectares(), 20.0);
        assert_eq!(config.iterations, 300);
        assert_eq!(config.penalty_multiplier, 0.5);
        assert_eq!(config.confidence_z, 1.65);
        assert_eq!(config.seed, 9);
        assert_eq!(config.workers, 2);
        assert_eq!(request.top, Some(3));
        assert_eq!(config.catalog()[0].crop(), &CropType::new("CORN"));
        assert_eq!(config.catalog()[0].market_cap_tons(), 90.0);
    }

    #[test]
    fn oversized_farms_are_rejected_before_simulation() {
        let err = rejection(|a| a.fields = vec![5.0; 20]);
        assert!(err.contains("4^20 allocations exceed the limit"), "{err}");

        let fields = serde_json::to_string(&vec![5.0; 20]).expect("serializes");
        let err = api_request_from_json(&format!(r#"{{"fields": {fields}}}"#))
            .expect_err("20 fields over 4 crops is too many");
        assert!(err.contains("exceed the limit"), "{err}");
    }

    #[test]
    fn api_request_from_empty_json_uses_defaults() {
        let request = api_request_from_json("{}").expect("defaults apply");
        assert_eq!(request.config.fields().len(), 4);
        assert_eq!(request.config.catalog().len(), 4);
        assert_eq!(request.top, None);
    }

    #[test]
    fn load_catalog_defaults_when_no_path_given() {
        let catalog = load_catalog(None).expect("built-in");
        assert_eq!(catalog, default_catalog());
        let err = load_catalog(Some(Path::new("/nonexistent/catalog.json")))
            .expect_err("missing file");
        assert!(err.contains("failed to read catalog"));
    }

    #[test]
    fn catalog_json_round_trips() {
        let json = serde_json::to_string(&default_catalog()).expect("serialize");
        assert!(json.contains("\"marketCapTons\""));
        let parsed: Vec<PlantSpec> = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, default_catalog());
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut args = sample_args();
        args.fields = vec![15.0, 8.0];
        let config = build_config(&args, &default_catalog()).expect("valid");
        let cancel = AtomicBool::new(false);
        let model = run_model(&config, &cancel).expect("runs");
        let response = build_simulate_response(&config, model, None);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"ranked\""));
        assert!(json.contains("\"dominance\""));
        assert!(json.contains("\"rowCounts\""));
        assert!(json.contains("\"ciLeft\""));
        assert!(json.contains("\"ciRight\""));
        assert!(json.contains("\"stdDev\""));
        assert!(json.contains("\"totalAllocations\":16"));
    }

    #[test]
    fn top_limit_truncates_ranking_and_matrix() {
        let mut args = sample_args();
        args.fields = vec![15.0, 8.0];
        let config = build_config(&args, &default_catalog()).expect("valid");
        let cancel = AtomicBool::new(false);
        let model = run_model(&config, &cancel).expect("runs");
        let full_counts = model.dominance.row_counts.clone();

        let response = build_simulate_response(&config, model, Some(5));
        assert_eq!(response.ranked.len(), 5);
        assert_eq!(response.completed_allocations, 16);
        assert_eq!(response.dominance.cells.len(), 5);
        assert!(response.dominance.cells.iter().all(|row| row.len() == 5));
        assert_eq!(response.dominance.row_counts, full_counts[..5].to_vec());
    }
}
