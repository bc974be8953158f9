use std::fs;

use mailsheet::email::{normalize, ContentNormalizer};
use mailsheet::error::NormalizeError;
use mailsheet::gmail_client::parse_raw_message;

fn load(name: &str) -> Vec<u8> {
    fs::read(format!("data_test/{}", name))
        .unwrap_or_else(|e| panic!("Failed to read test email file data_test/{}: {}", name, e))
}

#[test]
fn test_multipart_invoice_email() {
    let raw = parse_raw_message("inv-1042", &load("invoice.eml")).expect("Failed to parse email");

    assert_eq!(raw.sender_raw, "Acme Billing <billing@acme.example>");
    assert_eq!(raw.subject_raw.as_deref(), Some("Invoice #1042 – January"));
    assert_eq!(raw.date_raw, "Tue, 13 Jan 2026 14:55:10 +0530 (IST)");

    let record = normalize(&raw).expect("Failed to normalize email");

    assert_eq!(record.id, "inv-1042");
    assert_eq!(record.from, "billing@acme.example");
    assert_eq!(record.subject, "Invoice #1042 – January");
    assert_eq!(record.date_string(), "2026-01-13T14:55:10+05:30");
    assert_eq!(
        record.body,
        "Hello,\nYour invoice #1042 is ready.\nAmount due: 120.00 EUR\nThanks,\nAcme"
    );
}

#[test]
fn test_html_newsletter_email() {
    let raw = parse_raw_message("news-1", &load("newsletter.eml")).expect("Failed to parse email");
    assert!(raw.body_raw.contains("<p>First story</p>"));

    let record = normalize(&raw).expect("Failed to normalize email");

    assert_eq!(record.from, "newsletter@weekly.example");
    assert_eq!(record.subject, "Weekly digest");
    assert_eq!(record.date_string(), "2026-10-02T23:01:59-07:00");

    assert!(!record.body.contains('<'), "tags left in body: {}", record.body);
    let lines: Vec<&str> = record.body.lines().collect();
    let first = lines.iter().position(|l| l.contains("First story"));
    let second = lines.iter().position(|l| l.contains("Second story"));
    assert!(first.is_some() && second.is_some());
    assert_ne!(first, second);
    assert!(lines.iter().all(|l| !l.trim().is_empty() && l.trim() == *l));
}

#[test]
fn test_email_without_date_is_rejected() {
    let raw = parse_raw_message("nodate", &load("no_date.eml")).expect("Failed to parse email");
    assert_eq!(raw.date_raw, "");

    let err = normalize(&raw).unwrap_err();
    assert_eq!(err, NormalizeError::DateParse { raw: String::new() });
}

#[test]
fn test_large_body_is_clamped() {
    let mut raw = parse_raw_message("inv-1042", &load("invoice.eml")).expect("Failed to parse email");
    raw.body_raw = "line of text\n".repeat(10_000);

    let normalizer = ContentNormalizer::new(5_000);
    let record = normalizer.normalize(&raw).unwrap();

    assert!(record.body.chars().count() <= 5_000);
    assert!(record.body.ends_with("...[truncated due to size limit]"));
}
