//! Thin HTTP surface over [`RegionService`].
//!
//! Startup runs in phases: the store must answer a ping, then bootstrap
//! seeding runs once, then requests are served. A seeding failure is
//! logged and serving continues.
//!
//! Routes:
//! - `GET  /healthz`
//! - `GET  /status?prefix=<code>`
//! - `GET  /hierarchy?code=<code>`
//! - `GET  /search?q=<text>`
//! - `POST /ingest?source=<tag>` with a GeoJSON body

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use url::form_urlencoded;

use wilayah_hierarchy::{HierarchyError, RegionService, SeedOutcome, Seeder};

struct ServerState {
    service: RegionService,
}

pub async fn serve(service: RegionService, seeder: Option<Seeder>, listen: SocketAddr) -> Result<()> {
    service
        .store()
        .ping()
        .await
        .context("store is not ready")?;

    if let Some(seeder) = seeder {
        match service.seed(&seeder).await {
            Ok(SeedOutcome::Seeded(report)) => {
                tracing::info!(written = report.written, "bootstrap seed applied")
            }
            Ok(outcome) => tracing::debug!(?outcome, "bootstrap seed skipped"),
            Err(err) => tracing::error!(error = %err, "bootstrap seed failed, serving anyway"),
        }
    }

    let state = Arc::new(ServerState { service });
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {listen}: {e}"))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;
    tracing::info!(addr = %bound, backend = state.service.store().backend(), "listening");

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("serve: accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let params = parse_query_params(req.uri().query());
    let service = &state.service;

    let resp = match (method, path.as_str()) {
        (Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (Method::GET, "/status") => match params.get("prefix") {
            Some(prefix) => reply(service.status(prefix).await),
            None => json_error(StatusCode::BAD_REQUEST, "missing `prefix` parameter"),
        },
        (Method::GET, "/hierarchy") => match params.get("code") {
            Some(code) => reply(service.query_hierarchy(code).await),
            None => json_error(StatusCode::BAD_REQUEST, "missing `code` parameter"),
        },
        (Method::GET, "/search") => {
            let q = params.get("q").map(String::as_str).unwrap_or_default();
            reply(service.search(q).await)
        }
        (Method::POST, "/ingest") => {
            let Some(source) = params.get("source").cloned() else {
                return Ok(json_error(
                    StatusCode::BAD_REQUEST,
                    "missing `source` parameter",
                ));
            };
            let body = req.into_body().collect().await?.to_bytes();
            match std::str::from_utf8(&body) {
                Ok(text) => reply(service.ingest(&source, text).await),
                Err(_) => json_error(StatusCode::BAD_REQUEST, "body is not UTF-8"),
            }
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(resp)
}

fn reply<T: Serialize>(result: Result<T, HierarchyError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(err) => json_error(error_status(&err), &err.to_string()),
    }
}

fn error_status(err: &HierarchyError) -> StatusCode {
    if err.is_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if err.is_bad_input() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": msg }))
}

fn parse_query_params(query: Option<&str>) -> HashMap<String, String> {
    let Some(q) = query else {
        return HashMap::new();
    };
    form_urlencoded::parse(q.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
