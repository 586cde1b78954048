// Google Sheets v4 table store
//
// Spreadsheet lookup by name goes through the Drive v3 files listing; the
// worksheet is picked by title or zero-based index from the spreadsheet's
// sheet properties. Reads use the values API with unformatted values, writes
// use values:batchUpdate with RAW input so numbers stay numbers.
//
// API Documentation: https://developers.google.com/sheets/api/reference/rest

use super::{column_letter, sheet_row_number, CellWrite, TableSnapshot, TableStore};
use crate::error::{truncate, TableError};
use crate::extractors::{build_http_client, per_minute_limiter, DirectRateLimiter};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use songstats_common::config::SheetsConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Numbers come back as written, not as the sheet's number format shows them
const VALUE_READ_OPTIONS: [(&str, &str); 3] = [
    ("majorDimension", "ROWS"),
    ("valueRenderOption", "UNFORMATTED_VALUE"),
    ("dateTimeRenderOption", "FORMATTED_STRING"),
];

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetInfo {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: usize,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    column_count: usize,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Google Sheets worksheet as a [`TableStore`]
pub struct SheetsClient {
    client: Client,
    access_token: String,
    spreadsheet_id: String,
    sheet_id: i64,
    sheet_title: String,
    /// Grid width; appending a header past it needs a dimension change first
    column_count: Mutex<usize>,
    rate_limiter: DirectRateLimiter,
}

impl SheetsClient {
    /// Open a worksheet of a spreadsheet
    ///
    /// `spreadsheet` is a spreadsheet name visible to the token's account or
    /// a spreadsheet id. `worksheet` is a title or a zero-based index.
    pub async fn open(
        access_token: String,
        spreadsheet: &str,
        worksheet: &str,
        config: &SheetsConfig,
    ) -> Result<Self, TableError> {
        let client = build_http_client(Duration::from_secs(config.timeout_secs))
            .map_err(|e| TableError::Network(e.to_string()))?;
        let rate_limiter = per_minute_limiter(config.requests_per_minute);

        let mut this = Self {
            client,
            access_token,
            spreadsheet_id: String::new(),
            sheet_id: 0,
            sheet_title: String::new(),
            column_count: Mutex::new(0),
            rate_limiter,
        };

        this.spreadsheet_id = this.find_spreadsheet(spreadsheet).await?;
        let properties = this.find_worksheet(worksheet).await?;

        info!(
            spreadsheet = %spreadsheet,
            spreadsheet_id = %this.spreadsheet_id,
            worksheet = %properties.title,
            "Opened worksheet"
        );

        this.sheet_id = properties.sheet_id;
        this.sheet_title = properties.title;
        this.column_count = Mutex::new(
            properties
                .grid_properties
                .map(|g| g.column_count)
                .unwrap_or_default(),
        );
        Ok(this)
    }

    pub fn sheet_title(&self) -> &str {
        &self.sheet_title
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, TableError> {
        self.rate_limiter.until_ready().await;
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(TableError::NotFound(truncate(&body, 200)))
        } else {
            Err(TableError::Api {
                status: status.as_u16(),
                message: truncate(&body, 200),
            })
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, TableError> {
        serde_json::from_str(body).map_err(|e| TableError::Parse(e.to_string()))
    }

    async fn find_spreadsheet(&self, spreadsheet: &str) -> Result<String, TableError> {
        let q = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            spreadsheet.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME
        );
        let body = self
            .send(
                self.client
                    .get(DRIVE_FILES)
                    .query(&[("q", q.as_str()), ("fields", "files(id,name)")]),
            )
            .await?;
        let list: FileList = Self::parse(&body)?;

        if let Some(file) = list.files.into_iter().next() {
            debug!(name = %file.name, id = %file.id, "Found spreadsheet by name");
            return Ok(file.id);
        }
        if looks_like_spreadsheet_id(spreadsheet) {
            return Ok(spreadsheet.to_string());
        }
        Err(TableError::NotFound(format!(
            "spreadsheet '{}' (is it shared with this account?)",
            spreadsheet
        )))
    }

    async fn find_worksheet(&self, worksheet: &str) -> Result<SheetProperties, TableError> {
        let body = self
            .send(
                self.client
                    .get(format!("{}/{}", SHEETS_BASE, self.spreadsheet_id))
                    .query(&[("fields", "sheets.properties")]),
            )
            .await?;
        let info: SpreadsheetInfo = Self::parse(&body)?;
        let sheets: Vec<SheetProperties> = info.sheets.into_iter().map(|s| s.properties).collect();

        select_worksheet(&sheets, worksheet)
            .cloned()
            .ok_or_else(|| TableError::NotFound(format!("worksheet '{}'", worksheet)))
    }

    /// A1 range on this worksheet
    fn range(&self, a1: &str) -> String {
        format!("'{}'!{}", self.sheet_title.replace('\'', "''"), a1)
    }

    async fn get_values(&self, a1: &str) -> Result<Vec<Vec<String>>, TableError> {
        let url = values_url(&self.spreadsheet_id, &self.range(a1));
        let body = self
            .send(self.client.get(url).query(&VALUE_READ_OPTIONS))
            .await?;
        let range: ValueRange = Self::parse(&body)?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn batch_update_values(&self, data: Vec<Value>) -> Result<(), TableError> {
        let url = format!("{}/{}/values:batchUpdate", SHEETS_BASE, self.spreadsheet_id);
        let body = json!({ "valueInputOption": "RAW", "data": data });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn append_grid_column(&self) -> Result<(), TableError> {
        let url = format!("{}/{}:batchUpdate", SHEETS_BASE, self.spreadsheet_id);
        let body = json!({
            "requests": [{
                "appendDimension": {
                    "sheetId": self.sheet_id,
                    "dimension": "COLUMNS",
                    "length": 1
                }
            }]
        });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for SheetsClient {
    async fn read_all(&self) -> Result<TableSnapshot, TableError> {
        let mut values = self.get_values("A:ZZZ").await?;
        if values.is_empty() {
            return Ok(TableSnapshot::default());
        }
        let header = values.remove(0);
        Ok(TableSnapshot {
            header,
            rows: values,
        })
    }

    async fn read_header(&self) -> Result<Vec<String>, TableError> {
        Ok(self.get_values("1:1").await?.into_iter().next().unwrap_or_default())
    }

    async fn read_row(&self, row_index: usize) -> Result<Vec<String>, TableError> {
        let n = sheet_row_number(row_index);
        Ok(self
            .get_values(&format!("{n}:{n}"))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    async fn append_column(&self, name: &str) -> Result<usize, TableError> {
        let column = self.read_header().await?.len();

        let mut column_count = self.column_count.lock().await;
        if column >= *column_count {
            self.append_grid_column().await?;
            *column_count = column + 1;
        }

        let cell = format!("{}1", column_letter(column));
        self.batch_update_values(vec![json!({
            "range": self.range(&cell),
            "values": [[name]],
        })])
        .await?;

        debug!(column = %name, position = %cell, "Appended header column");
        Ok(column)
    }

    async fn write_cells(&self, row_index: usize, cells: &[CellWrite]) -> Result<(), TableError> {
        let row = sheet_row_number(row_index);
        let data = cells
            .iter()
            .map(|c| {
                json!({
                    "range": self.range(&format!("{}{}", column_letter(c.column), row)),
                    "values": [[c.value.to_json()]],
                })
            })
            .collect();
        self.batch_update_values(data).await
    }
}

fn select_worksheet<'a>(sheets: &'a [SheetProperties], worksheet: &str) -> Option<&'a SheetProperties> {
    let worksheet = worksheet.trim();
    if let Ok(index) = worksheet.parse::<usize>() {
        if let Some(sheet) = sheets.iter().find(|s| s.index == index) {
            return Some(sheet);
        }
    }
    sheets.iter().find(|s| s.title == worksheet)
}

/// Drive ids are long URL-safe tokens without spaces
fn looks_like_spreadsheet_id(s: &str) -> bool {
    s.len() >= 40
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn values_url(spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}/{}/values/{}",
        SHEETS_BASE,
        spreadsheet_id,
        urlencoding::encode(range)
    )
}
