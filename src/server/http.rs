//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling; each accepted
//! connection is served on its own task and requests share no in-process
//! mutable state beyond `AppState`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::assets::AssetStore;
use crate::config::Args;
use crate::db::schemas::{DistrictDoc, MediaDoc, PanchayatDoc};
use crate::db::MongoClient;
use crate::ingest::descriptor::{DISTRICT, MEDIA, PANCHAYAT};
use crate::routes;
use crate::types::Result;

type FullBody = Full<Bytes>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// External image/video host client
    pub assets: Arc<dyn AssetStore>,
    /// Startup instant for uptime reporting
    pub started: Instant,
}

impl AppState {
    pub fn new(args: Args, mongo: Option<MongoClient>, assets: Arc<dyn AssetStore>) -> Self {
        Self {
            args,
            mongo,
            assets,
            started: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Darshan listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure JWT secret in use");
    }

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, hyper::Error>(handle_request(state, addr, req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error from {}: {}", addr, err);
            }
        });
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Response<FullBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state)).await
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // ====================================================================
        // Content API
        // ====================================================================
        (_, p) if p.starts_with("/api/districts") => {
            routes::entity::handle::<DistrictDoc>(req, state, &path, "/api/districts", &DISTRICT)
                .await
        }

        (_, p) if p.starts_with("/api/panchayats") => {
            routes::entity::handle::<PanchayatDoc>(req, state, &path, "/api/panchayats", &PANCHAYAT)
                .await
        }

        (_, p) if p.starts_with("/api/media") => {
            routes::entity::handle::<MediaDoc>(req, state, &path, "/api/media", &MEDIA).await
        }

        _ => not_found_response(&path),
    }
}

fn preflight_response() -> Response<FullBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header(
            "Access-Control-Allow-Headers",
            "Authorization, Content-Type",
        )
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn not_found_response(path: &str) -> Response<FullBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(format!(
            "{{\"success\":false,\"message\":\"No route for {}\"}}",
            path
        ))))
        .unwrap()
}
