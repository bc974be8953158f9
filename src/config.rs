use anyhow::Result;
use serde::Deserialize;

use crate::email::normalizer::DEFAULT_MAX_BODY_LEN;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub sheets: SheetsConfig,
    pub checkpoint_path: String,
    pub max_body_len: usize,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["02:00", "14:00"])
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub credentials_path: String,
    pub token_cache_path: String,
}

const REQUIRED_VARS: [&str; 2] = ["GMAIL_CREDENTIALS_PATH", "SHEETS_SPREADSHEET_ID"];

impl Config {
    pub fn new() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. `new` reads the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Vérifier les variables requises
        Self::check_required_vars(&lookup)?;

        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let required = |name: &str| lookup(name).unwrap_or_default();

        let gmail_credentials = required("GMAIL_CREDENTIALS_PATH");

        // Longueur maximale du corps, 48000 par défaut
        let max_body_len = match lookup("MAX_BODY_LEN") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(len) if len > 0 => len,
                _ => {
                    log::warn!(
                        "MAX_BODY_LEN '{}' is not a positive integer, using {}",
                        raw,
                        DEFAULT_MAX_BODY_LEN
                    );
                    DEFAULT_MAX_BODY_LEN
                }
            },
            None => DEFAULT_MAX_BODY_LEN,
        };

        Ok(Config {
            sheets: SheetsConfig {
                spreadsheet_id: required("SHEETS_SPREADSHEET_ID"),
                sheet_name: var_or("SHEETS_SHEET_NAME", "Sheet1"),
                credentials_path: var_or("SHEETS_CREDENTIALS_PATH", &gmail_credentials),
                token_cache_path: var_or("SHEETS_TOKEN_CACHE_PATH", "./sheets-token-cache.json"),
            },
            gmail: GmailConfig {
                credentials_path: gmail_credentials,
                token_cache_path: var_or("GMAIL_TOKEN_CACHE_PATH", "./gmail-token-cache.json"),
            },
            checkpoint_path: var_or("CHECKPOINT_PATH", "./state.json"),
            max_body_len,
            // Configuration du scheduler
            scheduler: SchedulerConfig {
                enabled: var_or("SCHEDULER_ENABLED", "false")
                    .parse()
                    .unwrap_or(false),
                schedule_times: var_or("SCHEDULER_TIMES", "02:00")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        })
    }

    fn check_required_vars<F>(lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing_vars: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|var| lookup(*var).map_or(true, |v| v.trim().is_empty()))
            .collect();

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file with your settings:\n\
                    GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                    SHEETS_SPREADSHEET_ID=<spreadsheet id from the sheet URL>\n\
                 \n\
                 2. Or export them manually:\n\
                    export GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                    export SHEETS_SPREADSHEET_ID=...\n\
                    cargo run -- --dry-run",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("GMAIL_CREDENTIALS_PATH", "/secrets/client.json"),
            ("SHEETS_SPREADSHEET_ID", "sheet-123"),
        ]))
        .unwrap();

        assert_eq!(config.gmail.token_cache_path, "./gmail-token-cache.json");
        assert_eq!(config.sheets.sheet_name, "Sheet1");
        assert_eq!(config.sheets.credentials_path, "/secrets/client.json");
        assert_eq!(config.checkpoint_path, "./state.json");
        assert_eq!(config.max_body_len, DEFAULT_MAX_BODY_LEN);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.schedule_times, vec!["02:00".to_string()]);
    }

    #[test]
    fn test_missing_vars_are_all_reported() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err().to_string();
        assert!(err.contains("GMAIL_CREDENTIALS_PATH"));
        assert!(err.contains("SHEETS_SPREADSHEET_ID"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GMAIL_CREDENTIALS_PATH", "gmail.json"),
            ("SHEETS_SPREADSHEET_ID", "abc"),
            ("SHEETS_SHEET_NAME", "Inbox"),
            ("SHEETS_CREDENTIALS_PATH", "sheets.json"),
            ("MAX_BODY_LEN", "1000"),
            ("SCHEDULER_ENABLED", "true"),
            ("SCHEDULER_TIMES", "08:00, 20:30,"),
        ]))
        .unwrap();

        assert_eq!(config.sheets.sheet_name, "Inbox");
        assert_eq!(config.sheets.credentials_path, "sheets.json");
        assert_eq!(config.max_body_len, 1000);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.schedule_times, vec!["08:00", "20:30"]);
    }

    #[test]
    fn test_invalid_max_body_len_falls_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("GMAIL_CREDENTIALS_PATH", "gmail.json"),
            ("SHEETS_SPREADSHEET_ID", "abc"),
            ("MAX_BODY_LEN", "lots"),
        ]))
        .unwrap();
        assert_eq!(config.max_body_len, DEFAULT_MAX_BODY_LEN);
    }
}
