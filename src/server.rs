//! Blocking JSON-over-HTTP transport.
//!
//! Requests are served one at a time on the calling thread, so a `predict`
//! never observes a half-finished `retrain` from the same server.

use std::io;

use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tiny_http::{Header, Request, Response, Server};

use crate::classifier::Label;
use crate::config::ServerConfig;
use crate::model_store::ModelStore;
use crate::pipeline::{PipelineError, RetrainOutcome};
use crate::service::{ClassificationService, ServiceError};

#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(alias = "textos")]
    texts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RetrainRequest {
    #[serde(alias = "textos")]
    texts: Vec<String>,
    labels: Vec<Label>,
}

/// Status code and JSON body of a handled request. `body` is `None` for 204.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    fn json(status: u16, body: Value) -> Self {
        Self { status, body: Some(body) }
    }

    fn detail(status: u16, detail: impl ToString) -> Self {
        Self::json(status, json!({ "detail": detail.to_string() }))
    }
}

fn status_for(err: &ServiceError) -> u16 {
    match err {
        ServiceError::Input(_) => 400,
        ServiceError::ModelNotFound(_) => 503,
        ServiceError::Pipeline(PipelineError::Training(_)) => 400,
        ServiceError::Persistence(_)
        | ServiceError::Prediction(_)
        | ServiceError::Pipeline(_) => 500,
    }
}

/// Dispatches one request against `service`. Independent of the socket layer.
pub fn route<S: ModelStore>(service: &ClassificationService<S>, method: &str, url: &str, body: &[u8]) -> ApiResponse {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        ("OPTIONS", _) => ApiResponse { status: 204, body: None },
        ("GET", "/health") => match serde_json::to_value(service.health()) {
            Ok(health) => ApiResponse::json(200, health),
            Err(e) => ApiResponse::detail(500, e),
        },
        ("POST", "/predict") => {
            let request: PredictRequest = match serde_json::from_slice(body) {
                Ok(request) => request,
                Err(e) => return ApiResponse::detail(400, format!("invalid request body: {}", e)),
            };
            match service.predict(&request.texts) {
                Ok(predictions) => {
                    let labels: Vec<&Label> = predictions.iter().map(|p| &p.label).collect();
                    let probabilities: Vec<f64> = predictions.iter().map(|p| p.probability).collect();
                    ApiResponse::json(200, json!({ "predictions": labels, "probabilities": probabilities }))
                }
                Err(e) => ApiResponse::detail(status_for(&e), e),
            }
        }
        ("POST", "/retrain") => {
            let request: RetrainRequest = match serde_json::from_slice(body) {
                Ok(request) => request,
                Err(e) => return ApiResponse::detail(400, format!("invalid request body: {}", e)),
            };
            match service.retrain(&request.texts, &request.labels) {
                Ok(RetrainOutcome::Trained(summary)) => ApiResponse::json(
                    200,
                    json!({
                        "message": "model retrained",
                        "metrics": summary.report,
                        "train_size": summary.train_size,
                        "test_size": summary.test_size,
                        "stratified": summary.stratified,
                        "model_info": summary.model_info,
                    }),
                ),
                Ok(RetrainOutcome::InsufficientExamples { received }) => ApiResponse::json(
                    422,
                    json!({
                        "message": format!("insufficient examples: need at least 2, got {}", received)
                    }),
                ),
                Err(e) => ApiResponse::detail(status_for(&e), e),
            }
        }
        (_, "/health" | "/predict" | "/retrain") => ApiResponse::detail(405, "method not allowed"),
        _ => ApiResponse::detail(404, "not found"),
    }
}

/// CORS headers for a request from `origin`; empty when the origin is not allowed.
pub fn cors_headers(origin: Option<&str>, allowed_origins: &[String]) -> Vec<(&'static str, String)> {
    let Some(origin) = origin.filter(|o| allowed_origins.iter().any(|a| a == o)) else {
        return Vec::new();
    };
    vec![
        ("Access-Control-Allow-Origin", origin.to_string()),
        ("Access-Control-Allow-Credentials", "true".to_string()),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS".to_string()),
        ("Access-Control-Allow-Headers", "Content-Type, Authorization".to_string()),
        ("Vary", "Origin".to_string()),
    ]
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn handle<S: ModelStore>(service: &ClassificationService<S>, config: &ServerConfig, mut request: Request) -> io::Result<()> {
    let method = request.method().as_str().to_uppercase();
    let url = request.url().to_string();
    let origin = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Origin"))
        .map(|h| h.value.as_str().to_string());

    let mut body = Vec::new();
    let api_response = match request.as_reader().read_to_end(&mut body) {
        Ok(_) => route(service, &method, &url, &body),
        Err(e) => ApiResponse::detail(400, format!("could not read request body: {}", e)),
    };
    info!("{} {} -> {}", method, url, api_response.status);

    let payload = api_response.body.map(|b| b.to_string()).unwrap_or_default();
    let mut response = Response::from_string(payload).with_status_code(api_response.status);
    if api_response.status != 204 {
        if let Some(h) = header("Content-Type", "application/json") {
            response = response.with_header(h);
        }
    }
    for (name, value) in cors_headers(origin.as_deref(), &config.allowed_origins) {
        match header(name, &value) {
            Some(h) => response = response.with_header(h),
            None => warn!("Skipping unencodable header {}", name),
        }
    }
    request.respond(response)
}

/// Binds `config.addr` and serves requests until the listener shuts down.
pub fn serve<S: ModelStore>(service: &ClassificationService<S>, config: &ServerConfig) -> io::Result<()> {
    let server = Server::http(config.addr.as_str()).map_err(io::Error::other)?;
    info!("Listening on http://{}", config.addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle(service, config, request) {
            error!("Failed to send response: {}", e);
        }
    }
    Ok(())
}
