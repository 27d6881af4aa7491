//! MetaFlex Ops - task tracking over a shared spreadsheet
//!
//! This library loads a task worksheet whose headers may be blank or
//! duplicated, normalizes it into a table with collision-free column ids,
//! coerces rows into typed records, and writes edits back under a guard
//! that refuses any save that would shrink the sheet.
//!
//! # Features
//!
//! - Column normalization with `___{i}` physical ids and suffix stripping
//! - Status/progress reconciliation (Open/Working/Done, 0-100%)
//! - Guarded write-back; Done rows relocate to an Archive worksheet
//! - Pluggable sheet backends: local .xlsx, Google Sheets REST, in-memory
//! - Role-gated HTTP API and a CLI
//!
//! # Example
//!
//! ```no_run
//! use metaflex_ops::schema::NormalizerConfig;
//! use metaflex_ops::sheets::{self, MemorySheets, SheetWriter};
//!
//! let mut store = MemorySheets::new();
//! let table = sheets::load_table(&store, "Otter_Tasks", &NormalizerConfig::default())?;
//!
//! let mut writer = SheetWriter::new(&mut store, "Otter_Tasks", "Archive");
//! writer.save(&table)?;
//! # Ok::<(), metaflex_ops::error::OpsError>(())
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod schema;
pub mod sheets;
pub mod status;
pub mod tasks;
pub mod types;

// Re-export commonly used types
pub use error::{OpsError, OpsResult};
pub use schema::{NormalizerConfig, SheetTable};
pub use status::TaskStatus;
pub use types::{AccessScope, Kpis, QuarantinedRow, Role, TaskRecord};
