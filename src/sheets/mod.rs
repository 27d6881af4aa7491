//! Spreadsheet backends.
//!
//! The spreadsheet is an opaque collaborator behind [`SheetStore`]: a local
//! `.xlsx` workbook for development, the Google Sheets REST API in
//! production, and an in-memory store for tests. All operations are
//! attempt-once, fail-visible; retry is the caller's (human's) job.

mod memory;
mod remote;
pub mod writer;
mod xlsx;

pub use memory::MemorySheets;
pub use remote::RemoteSheets;
pub use writer::{SheetWriter, WriteOutcome};
pub use xlsx::XlsxSheets;

use crate::error::OpsResult;
use crate::schema::{normalize, NormalizerConfig, SheetTable};

/// Backend contract. Grids are rows of string cells; row 0 is the header.
pub trait SheetStore {
    fn worksheet_exists(&self, worksheet: &str) -> OpsResult<bool>;

    /// Full grid of the worksheet, header row included. A missing or empty
    /// worksheet reads as an empty grid.
    fn read_all(&self, worksheet: &str) -> OpsResult<Vec<Vec<String>>>;

    /// Number of grid rows currently in the worksheet (header included).
    fn row_count(&self, worksheet: &str) -> OpsResult<usize> {
        Ok(self.read_all(worksheet)?.len())
    }

    /// Replace the worksheet contents with `grid`, starting at the top-left
    /// cell. An in-place update: cells beyond the grid are left alone, which
    /// is exactly why writes are guarded against shrinking.
    fn overwrite(&mut self, worksheet: &str, grid: &[Vec<String>]) -> OpsResult<()>;

    fn append_row(&mut self, worksheet: &str, row: &[String]) -> OpsResult<()>;

    /// Delete one grid row by zero-based index (0 is the header row).
    fn delete_row(&mut self, worksheet: &str, index: usize) -> OpsResult<()>;

    /// Create the worksheet with the given header row if it does not exist.
    fn ensure_worksheet(&mut self, worksheet: &str, header: &[String]) -> OpsResult<()>;
}

/// Read a worksheet and normalize it into a [`SheetTable`].
///
/// An empty or header-only worksheet yields an empty table; the surface
/// layers degrade to an informational message rather than an error.
pub fn load_table<S: SheetStore + ?Sized>(
    store: &S,
    worksheet: &str,
    config: &NormalizerConfig,
) -> OpsResult<SheetTable> {
    let grid = store.read_all(worksheet)?;
    if grid.len() < 2 {
        return Ok(SheetTable::from_parts(Vec::new(), Vec::new()));
    }
    let headers = grid[0].clone();
    Ok(normalize(&headers, &grid[1..], config))
}
