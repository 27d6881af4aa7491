//! Guarded write-back to the active worksheet.
//!
//! The one hard rule of this codebase: a save may never shrink the visible
//! sheet. An edited table with fewer rows than the live sheet is rejected
//! before any cell is touched. Archival is the sanctioned removal path:
//! rows whose status has reached "Done" are copied to the Archive worksheet
//! (with a timestamp) and only then deleted from the active sheet.

use super::SheetStore;
use crate::error::{OpsError, OpsResult};
use crate::schema::{strip_suffix, SheetSchema, SheetTable};
use crate::status::should_archive;
use crate::types::{TaskRecord, TASK_SHEET_HEADER};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// What a save actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub rows_written: usize,
    pub archived: usize,
}

pub struct SheetWriter<'a, S: SheetStore + ?Sized> {
    store: &'a mut S,
    active: String,
    archive: String,
}

impl<'a, S: SheetStore + ?Sized> SheetWriter<'a, S> {
    pub fn new(store: &'a mut S, active: &str, archive: &str) -> Self {
        Self {
            store,
            active: active.to_string(),
            archive: archive.to_string(),
        }
    }

    /// Persist an edited table, then relocate any rows that reached "Done".
    ///
    /// Precondition: `table.rows + header >= current sheet rows`, otherwise
    /// [`OpsError::WouldDeleteRows`] and nothing is written. The write is an
    /// in-place update of header and data rows, not clear-then-write.
    pub fn save(&mut self, table: &SheetTable) -> OpsResult<WriteOutcome> {
        let current = self.store.row_count(&self.active)?;
        let incoming = table.row_count() + 1;
        if incoming < current {
            return Err(OpsError::WouldDeleteRows {
                have: incoming,
                need: current,
            });
        }

        let mut grid = Vec::with_capacity(incoming);
        grid.push(table.clean_headers());
        grid.extend(table.rows().iter().cloned());
        self.store.overwrite(&self.active, &grid)?;

        let archived = self.archive_done_rows()?;
        Ok(WriteOutcome {
            rows_written: table.row_count(),
            archived,
        })
    }

    /// Move every row whose status is "Done" to the Archive worksheet.
    ///
    /// The Archive worksheet is created on first use with the active sheet's
    /// header plus an "Archived Date" column. Archived rows get Status and
    /// progress pinned to their terminal values before the copy.
    pub fn archive_done_rows(&mut self) -> OpsResult<usize> {
        let grid = self.store.read_all(&self.active)?;
        if grid.len() < 2 {
            return Ok(0);
        }
        let headers = &grid[0];
        let status_idx = match headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("status"))
        {
            Some(idx) => idx,
            None => return Ok(0),
        };
        let progress_idx = headers.iter().position(|h| {
            let lower = h.to_lowercase();
            lower.contains("progress") && lower.contains('%')
        });

        let done: Vec<usize> = grid
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, row)| {
                row.get(status_idx)
                    .map(|s| should_archive(s))
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();
        if done.is_empty() {
            return Ok(0);
        }

        let mut archive_header = headers.clone();
        archive_header.push("Archived Date".to_string());
        self.store.ensure_worksheet(&self.archive, &archive_header)?;

        let stamp = Local::now().format("%m/%d/%Y %I:%M %p").to_string();
        for &i in &done {
            let mut row = grid[i].clone();
            row.resize(headers.len(), String::new());
            row[status_idx] = "Done".to_string();
            if let Some(p) = progress_idx {
                row[p] = "100%".to_string();
            }
            row.push(stamp.clone());
            self.store.append_row(&self.archive, &row)?;
        }

        // Delete bottom-up so earlier indices stay valid.
        for &i in done.iter().rev() {
            self.store.delete_row(&self.active, i)?;
        }

        Ok(done.len())
    }

    /// Append one task, matching values to the sheet's own header order.
    ///
    /// An empty worksheet is seeded with the well-known header first.
    pub fn append_task(&mut self, record: &TaskRecord) -> OpsResult<()> {
        let grid = self.store.read_all(&self.active)?;
        if grid.is_empty() {
            let header: Vec<String> = TASK_SHEET_HEADER.iter().map(|s| s.to_string()).collect();
            self.store.ensure_worksheet(&self.active, &header)?;
            let row: Vec<String> = TASK_SHEET_HEADER
                .iter()
                .map(|h| record.field(h))
                .collect();
            return self.store.append_row(&self.active, &row);
        }

        let schema = SheetSchema::task_sheet();
        let row: Vec<String> = grid[0]
            .iter()
            .map(|h| {
                let clean = strip_suffix(h.trim());
                match schema.logical_for(&clean) {
                    Some(logical) => record.field(logical),
                    None => String::new(),
                }
            })
            .collect();
        self.store.append_row(&self.active, &row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, NormalizerConfig};
    use crate::sheets::MemorySheets;
    use crate::status::TaskStatus;
    use pretty_assertions::assert_eq;

    const ACTIVE: &str = "Otter_Tasks";
    const ARCHIVE: &str = "Archive";

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn seeded_store() -> MemorySheets {
        MemorySheets::new().with_sheet(
            ACTIVE,
            grid(&[
                &["Task", "Person", "Status", "Progress %"],
                &["Fix bug", "Alice", "Open", "0%"],
                &["Write tests", "Bob", "Working on it", "50%"],
            ]),
        )
    }

    fn load(store: &MemorySheets) -> SheetTable {
        let raw = store.read_all(ACTIVE).unwrap();
        normalize(&raw[0].clone(), &raw[1..], &NormalizerConfig::default())
    }

    #[test]
    fn save_rejects_shrinking_table() {
        let mut store = seeded_store();
        let mut table = load(&store);
        table.rows_mut().pop();

        let err = SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
            .save(&table)
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::WouldDeleteRows { have: 2, need: 3 }
        ));
        // Nothing was mutated.
        assert_eq!(store.grid(ACTIVE).unwrap().len(), 3);
        assert_eq!(store.grid(ACTIVE).unwrap()[1][0], "Fix bug");
    }

    #[test]
    fn save_restores_clean_headers() {
        let mut store = seeded_store();
        let table = load(&store);
        assert_eq!(table.columns()[0], "Task___0");

        SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
            .save(&table)
            .unwrap();
        assert_eq!(
            store.grid(ACTIVE).unwrap()[0],
            vec!["Task", "Person", "Status", "Progress %"]
        );
    }

    #[test]
    fn done_rows_relocate_to_archive() {
        let mut store = seeded_store();
        let mut table = load(&store);
        // Edit the second row's status to Done.
        let status_idx = table.column_index("Status").unwrap();
        table.rows_mut()[1][status_idx] = "Done".to_string();

        let outcome = SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
            .save(&table)
            .unwrap();
        assert_eq!(outcome.archived, 1);

        let active = store.grid(ACTIVE).unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|row| row[0] != "Write tests"));

        let archive = store.grid(ARCHIVE).unwrap();
        assert_eq!(
            archive[0],
            vec!["Task", "Person", "Status", "Progress %", "Archived Date"]
        );
        assert_eq!(archive[1][0], "Write tests");
        assert_eq!(archive[1][2], "Done");
        assert_eq!(archive[1][3], "100%");
        assert!(!archive[1][4].is_empty());
    }

    #[test]
    fn archive_sweep_without_done_rows_is_a_no_op() {
        let mut store = seeded_store();
        let archived = SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
            .archive_done_rows()
            .unwrap();
        assert_eq!(archived, 0);
        assert!(!store.worksheet_exists(ARCHIVE).unwrap());
    }

    #[test]
    fn append_task_matches_sheet_header_order() {
        let mut store = MemorySheets::new().with_sheet(
            ACTIVE,
            grid(&[&["Assigned To", "Task", "Status", "Progress %"]]),
        );
        let record = TaskRecord {
            transcript_id: Some("T9".to_string()),
            date_assigned: None,
            person: "Alice".to_string(),
            task: "New thing".to_string(),
            project: "Marketing".to_string(),
            status: TaskStatus::Open,
            due_date: None,
            notes: String::new(),
            progress_percent: 0,
        };

        SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
            .append_task(&record)
            .unwrap();
        assert_eq!(
            store.grid(ACTIVE).unwrap()[1],
            vec!["Alice", "New thing", "Open", "0%"]
        );
    }

    #[test]
    fn append_task_seeds_empty_worksheet() {
        let mut store = MemorySheets::new();
        let record = TaskRecord {
            transcript_id: None,
            date_assigned: None,
            person: "Alice".to_string(),
            task: "First task".to_string(),
            project: "General".to_string(),
            status: TaskStatus::Open,
            due_date: None,
            notes: String::new(),
            progress_percent: 0,
        };

        SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
            .append_task(&record)
            .unwrap();
        let sheet = store.grid(ACTIVE).unwrap();
        assert_eq!(sheet[0].len(), TASK_SHEET_HEADER.len());
        assert_eq!(sheet[1][2], "Alice");
        assert_eq!(sheet[1][8], "0%");
    }
}
