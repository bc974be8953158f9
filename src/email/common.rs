/// Common structures shared by the mailbox, the normalizer and the sheet
use chrono::{DateTime, FixedOffset, SecondsFormat};

/// Message as fetched from the mailbox, before any cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub sender_raw: String,
    pub subject_raw: Option<String>,
    pub date_raw: String,
    pub body_raw: String,
}

/// Message ready to be written as one spreadsheet row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: DateTime<FixedOffset>,
    pub body: String,
}

/// Number of columns written per message
pub const ROW_WIDTH: usize = 5;

impl NormalizedRecord {
    /// Canonical ISO-8601 timestamp, offset included (e.g. `2026-01-13T14:55:10+05:30`)
    pub fn date_string(&self) -> String {
        canonical_timestamp(&self.date)
    }

    /// Sheet row in column order: from, subject, date, body, id
    pub fn to_row(&self) -> [String; ROW_WIDTH] {
        [
            self.from.clone(),
            self.subject.clone(),
            self.date_string(),
            self.body.clone(),
            self.id.clone(),
        ]
    }
}

pub fn canonical_timestamp(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_column_order() {
        let record = NormalizedRecord {
            id: "18c2f".to_string(),
            from: "jane@example.com".to_string(),
            subject: "Invoice".to_string(),
            date: DateTime::parse_from_rfc3339("2026-01-13T14:55:10+05:30").unwrap(),
            body: "Hello".to_string(),
        };

        assert_eq!(
            record.to_row(),
            [
                "jane@example.com".to_string(),
                "Invoice".to_string(),
                "2026-01-13T14:55:10+05:30".to_string(),
                "Hello".to_string(),
                "18c2f".to_string(),
            ]
        );
    }
}
