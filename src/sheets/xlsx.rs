//! Local `.xlsx` workbook backend.
//!
//! Reads through calamine and writes the whole workbook back through
//! rust_xlsxwriter. Fine for a workbook of task-tracker size; the point of
//! this backend is development and offline use, not scale.

use super::SheetStore;
use crate::error::{OpsError, OpsResult};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct XlsxSheets {
    path: PathBuf,
}

impl XlsxSheets {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every worksheet into memory, preserving sheet order.
    fn load_all(&self) -> OpsResult<Vec<(String, Vec<Vec<String>>)>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut workbook: Xlsx<_> = open_workbook(&self.path)
            .map_err(|e| OpsError::Sheet(format!("failed to open workbook: {}", e)))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names().to_vec() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| OpsError::Sheet(format!("failed to read '{}': {}", name, e)))?;
            let (height, width) = range.get_size();
            let mut grid = Vec::with_capacity(height);
            for row in 0..height {
                let mut cells = Vec::with_capacity(width);
                for col in 0..width {
                    let value = match range.get((row, col)) {
                        Some(cell) => cell_to_string(cell),
                        None => String::new(),
                    };
                    cells.push(value);
                }
                grid.push(cells);
            }
            sheets.push((name, grid));
        }
        Ok(sheets)
    }

    /// Rewrite the workbook from in-memory grids.
    fn save_all(&self, sheets: &[(String, Vec<Vec<String>>)]) -> OpsResult<()> {
        let mut workbook = Workbook::new();
        for (name, grid) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(name)
                .map_err(|e| OpsError::Sheet(format!("failed to name worksheet: {}", e)))?;
            for (r, row) in grid.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    worksheet
                        .write_string(r as u32, c as u16, cell)
                        .map_err(|e| OpsError::Sheet(format!("failed to write cell: {}", e)))?;
                }
            }
        }
        workbook
            .save(&self.path)
            .map_err(|e| OpsError::Sheet(format!("failed to save workbook: {}", e)))?;
        Ok(())
    }

    fn mutate<F>(&mut self, worksheet: &str, f: F) -> OpsResult<()>
    where
        F: FnOnce(&mut Vec<Vec<String>>) -> OpsResult<()>,
    {
        let mut sheets = self.load_all()?;
        let grid = sheets
            .iter_mut()
            .find(|(name, _)| name == worksheet)
            .map(|(_, grid)| grid)
            .ok_or_else(|| OpsError::Sheet(format!("worksheet '{}' not found", worksheet)))?;
        f(grid)?;
        self.save_all(&sheets)
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

impl SheetStore for XlsxSheets {
    fn worksheet_exists(&self, worksheet: &str) -> OpsResult<bool> {
        Ok(self.load_all()?.iter().any(|(name, _)| name == worksheet))
    }

    fn read_all(&self, worksheet: &str) -> OpsResult<Vec<Vec<String>>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|(name, _)| name == worksheet)
            .map(|(_, grid)| grid)
            .unwrap_or_default())
    }

    fn overwrite(&mut self, worksheet: &str, new_grid: &[Vec<String>]) -> OpsResult<()> {
        self.mutate(worksheet, |grid| {
            for (i, row) in new_grid.iter().enumerate() {
                if i < grid.len() {
                    grid[i] = row.clone();
                } else {
                    grid.push(row.clone());
                }
            }
            Ok(())
        })
    }

    fn append_row(&mut self, worksheet: &str, row: &[String]) -> OpsResult<()> {
        self.mutate(worksheet, |grid| {
            grid.push(row.to_vec());
            Ok(())
        })
    }

    fn delete_row(&mut self, worksheet: &str, index: usize) -> OpsResult<()> {
        self.mutate(worksheet, |grid| {
            if index >= grid.len() {
                return Err(OpsError::Sheet(format!(
                    "row {} out of range",
                    index
                )));
            }
            grid.remove(index);
            Ok(())
        })
    }

    fn ensure_worksheet(&mut self, worksheet: &str, header: &[String]) -> OpsResult<()> {
        let mut sheets = self.load_all()?;
        if sheets.iter().any(|(name, _)| name == worksheet) {
            return Ok(());
        }
        sheets.push((worksheet.to_string(), vec![header.to_vec()]));
        self.save_all(&sheets)
    }
}
