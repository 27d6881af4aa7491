//! In-memory sheet store for tests and demos.

use super::SheetStore;
use crate::error::{OpsError, OpsResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MemorySheets {
    sheets: BTreeMap<String, Vec<Vec<String>>>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding for tests.
    pub fn with_sheet(mut self, worksheet: &str, grid: Vec<Vec<String>>) -> Self {
        self.sheets.insert(worksheet.to_string(), grid);
        self
    }

    /// Direct access for assertions.
    pub fn grid(&self, worksheet: &str) -> Option<&Vec<Vec<String>>> {
        self.sheets.get(worksheet)
    }
}

impl SheetStore for MemorySheets {
    fn worksheet_exists(&self, worksheet: &str) -> OpsResult<bool> {
        Ok(self.sheets.contains_key(worksheet))
    }

    fn read_all(&self, worksheet: &str) -> OpsResult<Vec<Vec<String>>> {
        Ok(self.sheets.get(worksheet).cloned().unwrap_or_default())
    }

    fn overwrite(&mut self, worksheet: &str, grid: &[Vec<String>]) -> OpsResult<()> {
        let sheet = self.sheets.entry(worksheet.to_string()).or_default();
        // Update in place: rows beyond the new grid stay put.
        for (i, row) in grid.iter().enumerate() {
            if i < sheet.len() {
                sheet[i] = row.clone();
            } else {
                sheet.push(row.clone());
            }
        }
        Ok(())
    }

    fn append_row(&mut self, worksheet: &str, row: &[String]) -> OpsResult<()> {
        self.sheets
            .entry(worksheet.to_string())
            .or_default()
            .push(row.to_vec());
        Ok(())
    }

    fn delete_row(&mut self, worksheet: &str, index: usize) -> OpsResult<()> {
        let sheet = self
            .sheets
            .get_mut(worksheet)
            .ok_or_else(|| OpsError::Sheet(format!("worksheet '{}' not found", worksheet)))?;
        if index >= sheet.len() {
            return Err(OpsError::Sheet(format!(
                "row {} out of range for worksheet '{}'",
                index, worksheet
            )));
        }
        sheet.remove(index);
        Ok(())
    }

    fn ensure_worksheet(&mut self, worksheet: &str, header: &[String]) -> OpsResult<()> {
        self.sheets
            .entry(worksheet.to_string())
            .or_insert_with(|| vec![header.to_vec()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn overwrite_updates_in_place() {
        let mut store = MemorySheets::new().with_sheet(
            "Tasks",
            grid(&[&["Task"], &["a"], &["b"], &["c"]]),
        );
        store
            .overwrite("Tasks", &grid(&[&["Task"], &["x"]]))
            .unwrap();
        // Rows beyond the written grid remain.
        assert_eq!(store.grid("Tasks").unwrap().len(), 4);
        assert_eq!(store.grid("Tasks").unwrap()[1], vec!["x"]);
        assert_eq!(store.grid("Tasks").unwrap()[2], vec!["b"]);
    }

    #[test]
    fn ensure_worksheet_is_idempotent() {
        let mut store = MemorySheets::new();
        let header = vec!["Task".to_string()];
        store.ensure_worksheet("Archive", &header).unwrap();
        store.append_row("Archive", &["done".to_string()]).unwrap();
        store.ensure_worksheet("Archive", &header).unwrap();
        assert_eq!(store.grid("Archive").unwrap().len(), 2);
    }

    #[test]
    fn delete_row_out_of_range_is_an_error() {
        let mut store = MemorySheets::new().with_sheet("Tasks", grid(&[&["Task"]]));
        assert!(store.delete_row("Tasks", 5).is_err());
        assert!(store.delete_row("Missing", 0).is_err());
    }
}
