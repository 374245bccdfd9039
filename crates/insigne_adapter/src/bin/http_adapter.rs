#![forbid(unsafe_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use insigne_adapter::AdapterRuntime;
use serde_json::{json, Value};

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()));
    let bind = match runtime.lock() {
        Ok(rt) => rt.bind_addr().to_string(),
        Err(_) => "127.0.0.1:8080".to_string(),
    };
    let addr: SocketAddr = bind.parse()?;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/v1/webhook/submission",
            post(ingest_submission).options(preflight_write),
        )
        .route("/v1/insigne/generate", post(trigger_generation))
        .route(
            "/v1/insigne/by-token",
            get(read_by_token).options(preflight_read),
        )
        .route("/v1/insigne/latest", get(read_latest))
        .route("/v1/insigne/lookup", get(lookup_submission))
        .route("/v1/insigne/assets", get(read_insigne_assets))
        .route("/v1/admin/queue", get(admin_queue))
        .route(
            "/v1/admin/approve",
            post(admin_approve).options(preflight_write),
        )
        .route(
            "/v1/admin/deliver",
            post(admin_deliver).options(preflight_write),
        )
        .with_state(runtime);

    println!("insigne_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

const ALLOWED_HEADERS: &str = "Content-Type, Accept, x-admin-key";

fn read_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers
}

fn write_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers
}

fn respond(
    status: u16,
    headers: HeaderMap,
    body: Value,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, headers, Json(body))
}

fn lock_poisoned(headers: HeaderMap) -> (StatusCode, HeaderMap, Json<Value>) {
    respond(
        500,
        headers,
        json!({ "ok": false, "error": "adapter runtime lock poisoned" }),
    )
}

fn presented_admin_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-admin-key").and_then(|v| v.to_str().ok())
}

fn query_param<'a>(params: &'a HashMap<String, String>, key: &str) -> &'a str {
    params.get(key).map(String::as_str).unwrap_or("")
}

async fn preflight_read() -> (StatusCode, HeaderMap) {
    (StatusCode::NO_CONTENT, read_headers())
}

async fn preflight_write() -> (StatusCode, HeaderMap) {
    (StatusCode::NO_CONTENT, write_headers())
}

async fn healthz(State(runtime): State<SharedRuntime>) -> (StatusCode, HeaderMap, Json<Value>) {
    let runtime = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(read_headers()),
    };
    let report = runtime.health_report();
    respond(
        200,
        read_headers(),
        serde_json::to_value(report).unwrap_or_else(|_| json!({ "status": "error" })),
    )
}

/// Public webhook entry. Answers the sender as soon as the record exists;
/// generation runs afterwards on a background task whose failure is logged,
/// never surfaced to the sender.
async fn ingest_submission(
    State(runtime): State<SharedRuntime>,
    raw_body: String,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let dispatch = {
        let mut rt = match runtime.lock() {
            Ok(rt) => rt,
            Err(_) => return lock_poisoned(write_headers()),
        };
        rt.ingest(&raw_body)
    };

    if let Some(target) = dispatch.generation_target.clone() {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            let outcome = match runtime.lock() {
                Ok(mut rt) => {
                    let (status, body) = rt.trigger_generation(&target);
                    if status == 200 {
                        Ok(())
                    } else {
                        Err(format!("status={status} body={body}"))
                    }
                }
                Err(_) => Err("adapter runtime lock poisoned".to_string()),
            };
            if let Err(err) = outcome {
                eprintln!("insigne_adapter_http generation trigger failed for {target}: {err}");
            }
        });
    }

    respond(dispatch.http_status, write_headers(), dispatch.body)
}

async fn trigger_generation(
    State(runtime): State<SharedRuntime>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let mut rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(write_headers()),
    };
    let (status, body) = rt.trigger_generation(query_param(&params, "id"));
    respond(status, write_headers(), body)
}

async fn read_by_token(
    State(runtime): State<SharedRuntime>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(read_headers()),
    };
    let (status, body) = rt.read_by_token(query_param(&params, "token"));
    respond(status, read_headers(), body)
}

async fn read_latest(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(read_headers()),
    };
    if !rt.check_admin_key(presented_admin_key(&headers)) {
        return respond(401, read_headers(), json!({ "ok": false }));
    }
    let (status, body) = rt.read_latest();
    respond(status, read_headers(), body)
}

async fn lookup_submission(
    State(runtime): State<SharedRuntime>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(read_headers()),
    };
    let (status, body) = rt.lookup(query_param(&params, "submission_id"));
    respond(status, read_headers(), body)
}

async fn read_insigne_assets(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(read_headers()),
    };
    if !rt.check_admin_key(presented_admin_key(&headers)) {
        return respond(401, read_headers(), json!({ "ok": false }));
    }
    let (status, body) = rt.insigne_assets(query_param(&params, "id"));
    respond(status, read_headers(), body)
}

async fn admin_queue(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(read_headers()),
    };
    if !rt.check_admin_key(presented_admin_key(&headers)) {
        return respond(401, read_headers(), json!({ "ok": false }));
    }
    let (status, body) = rt.admin_queue();
    respond(status, read_headers(), body)
}

async fn admin_approve(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let mut rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(write_headers()),
    };
    if !rt.check_admin_key(presented_admin_key(&headers)) {
        return respond(401, write_headers(), json!({ "ok": false }));
    }
    let (status, body) = rt.approve(query_param(&params, "id"));
    respond(status, write_headers(), body)
}

async fn admin_deliver(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let mut rt = match runtime.lock() {
        Ok(rt) => rt,
        Err(_) => return lock_poisoned(write_headers()),
    };
    if !rt.check_admin_key(presented_admin_key(&headers)) {
        return respond(401, write_headers(), json!({ "ok": false }));
    }
    let (status, body) = rt.deliver(query_param(&params, "id"));
    respond(status, write_headers(), body)
}
