//! Google Sheets REST backend.
//!
//! Thin blocking client over the v4 values/batchUpdate endpoints. One
//! attempt per call, no retry: a connectivity or auth failure surfaces to
//! the user as-is. The bearer token comes from the secrets config; minting
//! it from a service account is a deployment concern, not handled here.

use super::SheetStore;
use crate::error::{OpsError, OpsResult};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Clone)]
pub struct RemoteSheets {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

impl RemoteSheets {
    pub fn new(spreadsheet_id: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        }
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.spreadsheet_id, suffix)
    }

    fn sheet_properties(&self) -> OpsResult<Vec<SheetProperties>> {
        let meta: SpreadsheetMeta = self
            .client
            .get(self.url(""))
            .bearer_auth(&self.token)
            .query(&[("fields", "sheets.properties")])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    fn sheet_id(&self, worksheet: &str) -> OpsResult<i64> {
        self.sheet_properties()?
            .into_iter()
            .find(|p| p.title == worksheet)
            .map(|p| p.sheet_id)
            .ok_or_else(|| OpsError::Sheet(format!("worksheet '{}' not found", worksheet)))
    }

    fn batch_update(&self, requests: Value) -> OpsResult<()> {
        self.client
            .post(self.url(":batchUpdate"))
            .bearer_auth(&self.token)
            .json(&json!({ "requests": requests }))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn put_values(&self, range: &str, values: &[Vec<String>]) -> OpsResult<()> {
        self.client
            .put(self.url(&format!("/values/{}", range)))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "values": values }))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

/// The API returns numbers and bools for unformatted cells; everything is a
/// string on our side of the seam.
fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetStore for RemoteSheets {
    fn worksheet_exists(&self, worksheet: &str) -> OpsResult<bool> {
        Ok(self
            .sheet_properties()?
            .iter()
            .any(|p| p.title == worksheet))
    }

    fn read_all(&self, worksheet: &str) -> OpsResult<Vec<Vec<String>>> {
        let range: ValueRange = self
            .client
            .get(self.url(&format!("/values/{}", worksheet)))
            .bearer_auth(&self.token)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    fn overwrite(&mut self, worksheet: &str, grid: &[Vec<String>]) -> OpsResult<()> {
        self.put_values(&format!("{}!A1", worksheet), grid)
    }

    fn append_row(&mut self, worksheet: &str, row: &[String]) -> OpsResult<()> {
        self.client
            .post(self.url(&format!("/values/{}:append", worksheet)))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "values": [row] }))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn delete_row(&mut self, worksheet: &str, index: usize) -> OpsResult<()> {
        let sheet_id = self.sheet_id(worksheet)?;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": index,
                    "endIndex": index + 1,
                }
            }
        }]))
    }

    fn ensure_worksheet(&mut self, worksheet: &str, header: &[String]) -> OpsResult<()> {
        if self.worksheet_exists(worksheet)? {
            return Ok(());
        }
        self.batch_update(json!([{
            "addSheet": { "properties": { "title": worksheet } }
        }]))?;
        self.put_values(&format!("{}!A1", worksheet), &[header.to_vec()])
    }
}
