//! MetaFlex Ops HTTP API.
//!
//! Role-gated REST surface over the task sheet: login, overview KPIs, task
//! lists, add/update/save, archive. Run with `mfops serve` or `mfops-server`.

pub mod handlers;
pub mod server;

pub use server::run_api_server;
