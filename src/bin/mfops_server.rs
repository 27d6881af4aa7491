//! MetaFlex Ops API server binary.
//!
//! HTTP REST surface over the task sheet: login, overview, task lists,
//! guarded grid saves, archive.

use clap::Parser;
use metaflex_ops::api::{run_api_server, server::ApiConfig};
use metaflex_ops::config::OpsConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mfops-server")]
#[command(version)]
#[command(about = "MetaFlex Ops API Server - HTTP REST API for the task sheet")]
#[command(long_about = r#"
MetaFlex Ops API Server

Role-gated REST endpoints over the shared task sheet:
  - POST /api/v1/login        - Log in, returns a session token
  - GET  /api/v1/overview     - KPIs for the caller's scope
  - GET  /api/v1/tasks        - Task list (view=my|all)
  - POST /api/v1/tasks        - Add a task
  - POST /api/v1/tasks/update - Update one task's status/due date
  - POST /api/v1/tasks/save   - Save an edited grid (guarded, auto-archives)
  - GET  /api/v1/archive      - Archived tasks
  - GET  /api/v1/quarantine   - Rows rejected at load

Additional endpoints:
  - GET  /health              - Health check
  - GET  /version             - Server version info

Features:
  - Saves refuse to shrink the sheet (the one hard rule)
  - Done rows auto-archive with a timestamp
  - CORS enabled, graceful shutdown on SIGINT/SIGTERM
  - JSON response format with request IDs

Example usage:
  mfops-server                           # Start on localhost:8080
  mfops-server --host 0.0.0.0 --port 3000

  curl -X POST http://localhost:8080/api/v1/login \
    -H "Content-Type: application/json" \
    -d '{"username": "tea", "password": "..."}'
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, env = "MFOPS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MFOPS_PORT")]
    port: Option<u16>,

    /// Path to the config file (defaults to ./mfops.yaml when present)
    #[arg(short, long, env = "MFOPS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = OpsConfig::load(args.config.as_deref())?;

    let api = ApiConfig {
        host: args.host.unwrap_or_else(|| config.server.host.clone()),
        port: args.port.unwrap_or(config.server.port),
    };

    run_api_server(api, config).await
}
