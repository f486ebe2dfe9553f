//! HTTP server for detection requests
//!
//! `synthscan serve ./photos --classifier ./detect.py` starts a local API:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | Endpoint index |
//! | `GET /api/health` | Liveness and loaded model |
//! | `POST /api/detect/image` | Detect one base64-encoded image |
//! | `GET\|POST /api/analyze?path=` | Scan a server-local file or folder |

use crate::analyzer::{collect_image_files, DetectionResult, Detector, FileDetection};
use crate::classifier::Classifier;
use crate::report::Summary;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest decoded image accepted by `/api/detect/image`.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Request bodies are read up to this many bytes (base64 of a 10MB image plus JSON framing).
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    detail: String,
}

#[derive(Deserialize)]
struct ImageDetectionRequest {
    image: String,
}

#[derive(Serialize)]
pub struct DetectionResponse {
    #[serde(flatten)]
    pub result: DetectionResult,
    /// Wall-clock seconds spent on the request
    pub processing_time: f64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AnalyzeParams {
    pub path: String,
}

#[derive(Serialize)]
pub struct AnalysisReport {
    pub generated: String,
    pub summary: Summary,
    pub files: Vec<FileDetection>,
    pub params: AnalyzeParams,
}

/// Start server and block serving requests
pub fn start<C: Classifier>(port: u16, path: PathBuf, detector: Detector<C>) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let url = format!("http://localhost:{}", port);
    let path_str = path.canonicalize().unwrap_or(path).display().to_string();

    eprintln!("\n\x1b[1;32mSynthscan\x1b[0m");
    eprintln!("   {}", url);
    eprintln!("   Model:     {}", detector.model_name());
    eprintln!("   Analyzing: {}\n", path_str);
    info!(%addr, model = detector.model_name(), "server listening");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &detector, &path_str) {
            warn!(error = %e, "failed to answer request");
        }
    }

    Ok(())
}

fn handle_request<C: Classifier>(
    mut request: Request,
    detector: &Detector<C>,
    default_path: &str,
) -> std::io::Result<()> {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("/");
    let method = request.method().clone();
    debug!(%method, path, "request");

    let (status, body) = match (&method, path) {
        (&Method::Get, "/") => (200, index_json()),

        (&Method::Get, "/api/health") => (200, health_json(detector.model_name())),

        (&Method::Post, "/api/detect/image") => match read_body(&mut request)? {
            Some(body) => detect_payload(detector, &body),
            None => error_response(400, "Image too large (max 10MB)"),
        },

        (&Method::Get, "/api/analyze") | (&Method::Post, "/api/analyze") => {
            let params = parse_params(&mut request, default_path)?;
            info!(path = %params.path, "batch analysis");
            let report = run_analysis(detector, params);
            (200, serde_json::to_string(&ApiResponse::success(report))?)
        }

        _ => error_response(404, "Not found"),
    };

    let response = Response::from_string(body).with_status_code(status);
    match Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => request.respond(response.with_header(header)),
        Err(()) => request.respond(response),
    }
}

/// Read the request body, or `None` if it exceeds the body limit.
fn read_body(request: &mut Request) -> std::io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)?;
    if body.len() as u64 > MAX_BODY_BYTES {
        return Ok(None);
    }
    Ok(Some(body))
}

fn index_json() -> String {
    serde_json::json!({
        "message": "AI-generated image detection API",
        "version": VERSION,
        "endpoints": {
            "health": "/api/health",
            "detect_image": "/api/detect/image",
            "analyze": "/api/analyze",
        }
    })
    .to_string()
}

fn health_json(model_name: &str) -> String {
    serde_json::json!({
        "status": "healthy",
        "models": { "image": model_name },
        "version": VERSION,
    })
    .to_string()
}

fn error_response(status: u16, detail: impl Into<String>) -> (u16, String) {
    let body = serde_json::to_string(&ErrorDetail { detail: detail.into() })
        .unwrap_or_else(|_| "{}".to_string());
    (status, body)
}

/// Decode a base64 image, with or without a `data:image/...;base64,` prefix.
fn decode_image_payload(payload: &str) -> Result<Vec<u8>, String> {
    let encoded = if payload.contains(',') {
        payload.split(',').nth(1).unwrap_or("")
    } else {
        payload
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("Invalid image data: {}", e))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err("Image too large (max 10MB)".to_string());
    }
    Ok(bytes)
}

/// Handle a `/api/detect/image` body, returning status and JSON.
fn detect_payload<C: Classifier>(detector: &Detector<C>, body: &[u8]) -> (u16, String) {
    let start = Instant::now();

    let request: ImageDetectionRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return error_response(400, format!("Invalid request body: {}", e)),
    };

    let bytes = match decode_image_payload(&request.image) {
        Ok(b) => b,
        Err(detail) => return error_response(400, detail),
    };

    let result = detector.detect(&bytes);
    if let Some(error) = result.error.clone() {
        return error_response(500, error);
    }

    let response = DetectionResponse {
        result,
        processing_time: start.elapsed().as_secs_f64(),
    };
    info!(
        is_ai_generated = response.result.is_ai_generated,
        confidence = response.result.confidence,
        processing_time = response.processing_time,
        "image detected"
    );

    match serde_json::to_string(&response) {
        Ok(json) => (200, json),
        Err(e) => error_response(500, e.to_string()),
    }
}

fn parse_params(request: &mut Request, default_path: &str) -> std::io::Result<AnalyzeParams> {
    let url = request.url().to_string();

    // Try query string
    if let Some(query) = url.split('?').nth(1) {
        if let Ok(params) = serde_urlencoded::from_str::<AnalyzeParams>(query) {
            return Ok(params);
        }
    }

    // Try JSON body
    if let Some(body) = read_body(request)? {
        if let Ok(params) = serde_json::from_slice::<AnalyzeParams>(&body) {
            return Ok(params);
        }
    }

    Ok(AnalyzeParams {
        path: default_path.to_string(),
    })
}

fn run_analysis<C: Classifier>(detector: &Detector<C>, params: AnalyzeParams) -> AnalysisReport {
    let files = collect_image_files(&PathBuf::from(&params.path));
    let results: Vec<FileDetection> = files.par_iter().map(|p| detector.analyze_file(p)).collect();

    AnalysisReport {
        generated: chrono::Local::now().to_rfc3339(),
        summary: Summary::from_results(&results),
        files: results,
        params,
    }
}
