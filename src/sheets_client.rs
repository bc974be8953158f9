use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use google_sheets4::api::{Scope, ValueRange};
use google_sheets4::Sheets;
use log::{debug, info};
use serde_json::Value;

use crate::auth::{self, HttpsConnector};
use crate::config::SheetsConfig;
use crate::email::NormalizedRecord;
use crate::sync::RowSink;

/// Column A..E: from, subject, date, body, id
const ROW_COLUMNS: &str = "A:E";
const ID_COLUMN: &str = "E:E";

pub struct SheetsClient {
    hub: Sheets<HttpsConnector>,
    spreadsheet_id: String,
    sheet_name: String,
}

impl SheetsClient {
    pub async fn new(config: &SheetsConfig) -> Result<Self> {
        info!("Connecting to Google Sheets API via OAuth2");

        let auth = auth::authenticator(
            &config.credentials_path,
            &config.token_cache_path,
            "Google Sheets",
        )
        .await?;
        let hub = Sheets::new(auth::https_client()?, auth);

        info!("✅ Google Sheets API connection established successfully");

        Ok(Self::from_hub(hub, &config.spreadsheet_id, &config.sheet_name))
    }

    pub fn from_hub(hub: Sheets<HttpsConnector>, spreadsheet_id: &str, sheet_name: &str) -> Self {
        SheetsClient {
            hub,
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
        }
    }

    fn range(&self, columns: &str) -> String {
        a1_range(&self.sheet_name, columns)
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn list_known_ids(&self) -> Result<HashSet<String>> {
        let range = self.range(ID_COLUMN);
        debug!("Reading existing ids from {}", range);

        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, &range)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .with_context(|| format!("Unable to read ids from {}", range))?;

        let ids = ids_from_values(value_range.values.unwrap_or_default());
        info!("Sheet already holds {} id(s)", ids.len());

        Ok(ids)
    }

    async fn append(&self, records: &[NormalizedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let range = self.range(ROW_COLUMNS);
        let request = ValueRange {
            values: Some(records_to_values(records)),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .values_append(request, &self.spreadsheet_id, &range)
            .value_input_option("RAW")
            .insert_data_option("INSERT_ROWS")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .with_context(|| format!("Unable to append {} row(s) to {}", records.len(), range))?;

        Ok(())
    }

    fn sink_name(&self) -> &str {
        &self.sheet_name
    }
}

/// A1 notation, quoting sheet names that are not plain identifiers
pub fn a1_range(sheet_name: &str, columns: &str) -> String {
    if sheet_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}!{}", sheet_name, columns)
    } else {
        format!("'{}'!{}", sheet_name.replace('\'', "''"), columns)
    }
}

/// First cell of every non-empty row
fn ids_from_values(rows: Vec<Vec<Value>>) -> HashSet<String> {
    rows.into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter_map(|cell| match cell {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|id| !id.is_empty())
        .collect()
}

fn records_to_values(records: &[NormalizedRecord]) -> Vec<Vec<Value>> {
    records
        .iter()
        .map(|record| record.to_row().into_iter().map(Value::String).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    #[test]
    fn test_a1_range() {
        assert_eq!(a1_range("Sheet1", "E:E"), "Sheet1!E:E");
        assert_eq!(a1_range("Mail log", "A:E"), "'Mail log'!A:E");
        assert_eq!(a1_range("Bob's", "A:E"), "'Bob''s'!A:E");
    }

    #[test]
    fn test_ids_from_values() {
        let rows = vec![
            vec![json!("18c2f0")],
            vec![],
            vec![json!("")],
            vec![json!(12345)],
            vec![json!("18c2f0")],
        ];

        let ids = ids_from_values(rows);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("18c2f0"));
        assert!(ids.contains("12345"));
    }

    #[test]
    fn test_records_to_values() {
        let record = NormalizedRecord {
            id: "abc".to_string(),
            from: "jane@x.com".to_string(),
            subject: "Hi".to_string(),
            date: DateTime::parse_from_rfc3339("2026-01-13T14:55:10+05:30").unwrap(),
            body: "Body".to_string(),
        };

        let values = records_to_values(&[record]);
        assert_eq!(
            values,
            vec![vec![
                json!("jane@x.com"),
                json!("Hi"),
                json!("2026-01-13T14:55:10+05:30"),
                json!("Body"),
                json!("abc"),
            ]]
        );
    }
}
