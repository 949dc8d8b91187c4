//! Demo binary: serves a greeting API through a Plug.
//!
//! ```text
//! api-plugger --config plug.toml --port 8000
//! curl http://127.0.0.1:8000/greeting?name=you
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;

use api_plugger::{
    api::{ApiError, Operation, Reply},
    config::{load_config, PlugConfig},
    contract::layer_middleware,
    lifecycle::signals,
    observability::logging,
    option, HttpServer, Plug, RestApi, Shared,
};

#[derive(Debug, Parser)]
#[command(name = "api-plugger", version, about = "Serve a REST API through a Plug")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to listen on (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct GreetingQuery {
    name: Option<String>,
}

fn greeting_api() -> RestApi {
    let mut api = RestApi::new("greeter");
    api.add_operation(Operation::new("getGreeting", Method::GET, "/greeting", |request| async move {
        let Query(query) = Query::<GreetingQuery>::try_from_uri(&request.uri)
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let name = query.name.filter(|name| !name.is_empty()).unwrap_or_else(|| "World".to_string());
        Reply::ok(json!({ "greeting": format!("Hello, {name}!") }))
    }));
    api
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PlugConfig::default(),
    };
    logging::init(&config.observability)?;

    tracing::info!("api-plugger v{} starting", env!("CARGO_PKG_VERSION"));

    let mut options = config.options();
    options.extend(cli.host.map(option::with_host));
    options.extend(cli.port.map(option::with_port));

    let mut plug = Plug::new(HttpServer::new(), Shared::new(greeting_api()), options)?;
    plug.set_middleware(
        "/greeting",
        layer_middleware(SetResponseHeaderLayer::if_not_present(
            header::SERVER,
            HeaderValue::from_static(concat!("api-plugger/", env!("CARGO_PKG_VERSION"))),
        )),
        &[Method::GET],
    );
    let plug = Arc::new(plug);

    let mut serving = {
        let plug = plug.clone();
        tokio::spawn(async move { plug.serve().await })
    };

    tokio::select! {
        result = &mut serving => {
            // listeners stopped on their own, e.g. a bind failure
            result??;
        }
        signal = signals::terminated() => {
            tracing::info!(signal = %signal?, "Shutdown signal received");
            plug.shutdown().await?;
            serving.await??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
