use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use tokio::sync::Mutex;

use mailsheet::config::Config;
use mailsheet::email::ContentNormalizer;
use mailsheet::gmail_client::GmailClient;
use mailsheet::sheets_client::SheetsClient;
use mailsheet::sync::{CheckpointStore, SyncOptions, SyncOutcome, Synchronizer};

type GmailToSheets = Synchronizer<GmailClient, SheetsClient>;

#[derive(Parser)]
#[command(name = "mailsheet")]
#[command(about = "Export unread Gmail messages to a Google Sheet")]
#[command(version = "0.1.0")]
struct Args {
    /// Dry-run mode: fetch and normalize emails without writing to the sheet or marking them read
    #[arg(short, long)]
    dry_run: bool,

    /// Daemon mode: run the sync at the scheduled times
    #[arg(long)]
    daemon: bool,

    /// Maximum number of unread emails to process per run (default: unlimited)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    // Parse les arguments
    let args = Args::parse();

    // Initialize logger
    env_logger::init();

    if args.dry_run {
        info!("🧪 Starting mailsheet in DRY-RUN mode");
    } else {
        info!("🚀 Starting Gmail → Sheets sync");
    }

    // Charger la configuration
    let config = Config::new()?;

    // Check configuration only
    if args.check_config {
        println!("✅ Configuration valid!");
        println!("📧 Gmail credentials: {}", config.gmail.credentials_path);
        println!("💾 Gmail token cache: {}", config.gmail.token_cache_path);
        println!(
            "📊 Spreadsheet: {} (sheet '{}')",
            config.sheets.spreadsheet_id, config.sheets.sheet_name
        );
        println!("🔑 Sheets credentials: {}", config.sheets.credentials_path);
        println!("💾 Sheets token cache: {}", config.sheets.token_cache_path);
        println!("📍 Checkpoint: {}", config.checkpoint_path);
        println!("✂️  Max body length: {} chars", config.max_body_len);
        if config.scheduler.enabled {
            println!("📅 Schedule: {:?}", config.scheduler.schedule_times);
        }
        return Ok(());
    }

    let options = SyncOptions {
        limit: args.limit,
        dry_run: args.dry_run,
    };

    // Daemon mode
    if args.daemon {
        info!("🔄 Starting in daemon mode");
        return run_daemon_mode(config, options).await;
    }

    // One-shot run
    let synchronizer = build_synchronizer(&config, options).await?;

    match synchronizer.run().await {
        Ok(outcome) => {
            report(&outcome);
            Ok(())
        }
        Err(e) => {
            let e = anyhow::Error::from(e);
            error!("❌ Sync failed: {:#}", e);
            Err(e)
        }
    }
}

async fn build_synchronizer(config: &Config, options: SyncOptions) -> Result<GmailToSheets> {
    let gmail = GmailClient::new(&config.gmail).await?;
    let sheets = SheetsClient::new(&config.sheets).await?;

    Ok(Synchronizer::new(
        gmail,
        sheets,
        ContentNormalizer::new(config.max_body_len),
        CheckpointStore::new(&config.checkpoint_path),
        options,
    ))
}

fn report(outcome: &SyncOutcome) {
    if let SyncOutcome::DryRun {
        records,
        already_known,
        ..
    } = outcome
    {
        println!("\n{}", "=".repeat(80));
        println!("🧪 DRY-RUN - EMAILS THAT WOULD BE APPENDED");
        println!("{}", "=".repeat(80));
        for (index, record) in records.iter().enumerate() {
            println!("📧 {}/{} (ID: {})", index + 1, records.len(), record.id);
            println!("   From: {}", record.from);
            println!("   Subject: {}", record.subject);
            println!("   Date: {}", record.date_string());
            println!(
                "   Body: {} chars, preview: {}",
                record.body.chars().count(),
                record.body.chars().take(120).collect::<String>().replace('\n', " ")
            );
        }
        println!("{}", "-".repeat(60));
        println!("ℹ️  {} email(s) already in the sheet", already_known);
    }

    println!("{}", outcome);
    info!("{}", outcome);
}

async fn run_daemon_mode(config: Config, options: SyncOptions) -> Result<()> {
    use chrono::{Local, Timelike};
    use tokio_cron_scheduler::{Job, JobScheduler};

    if !config.scheduler.enabled {
        error!("❌ Daemon mode requires SCHEDULER_ENABLED=true");
        anyhow::bail!("Scheduler not enabled in configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ No schedule times defined (SCHEDULER_TIMES)");
        anyhow::bail!("No schedule times defined");
    }

    info!("📅 Configured sync times: {:?}", config.scheduler.schedule_times);

    // Clients are built once; yup-oauth2 refreshes tokens as needed
    let synchronizer = Arc::new(build_synchronizer(&config, options).await?);
    // A run still in progress makes the next trigger skip
    let running = Arc::new(Mutex::new(()));

    // Créer le scheduler
    let scheduler = JobScheduler::new().await?;
    let mut jobs = 0;

    // Un job par heure configurée
    for schedule_time in &config.scheduler.schedule_times {
        let Some(cron_expr) = cron_for(schedule_time) else {
            error!("❌ Invalid schedule time: {}. Use the HH:MM format", schedule_time);
            continue;
        };
        info!("📆 Adding scheduled job: {} (cron: {})", schedule_time, cron_expr);

        let synchronizer = synchronizer.clone();
        let running = running.clone();
        let schedule_time = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let synchronizer = synchronizer.clone();
            let running = running.clone();
            let schedule_time = schedule_time.clone();

            Box::pin(async move {
                let Ok(_guard) = running.try_lock() else {
                    warn!("⚠️  Previous sync still running, skipping {} run", schedule_time);
                    return;
                };

                info!("⏰ Scheduled run at {} - syncing emails...", schedule_time);
                match synchronizer.run().await {
                    Ok(outcome) => info!("✅ Scheduled run at {} finished: {}", schedule_time, outcome),
                    Err(e) => error!(
                        "❌ Scheduled run at {} failed: {:#}",
                        schedule_time,
                        anyhow::Error::from(e)
                    ),
                }
            })
        })?;

        scheduler.add(job).await?;
        jobs += 1;
    }

    if jobs == 0 {
        anyhow::bail!("No valid schedule time in {:?}", config.scheduler.schedule_times);
    }

    // Démarrer le scheduler
    scheduler.start().await?;

    info!("✅ Daemon started. Waiting for scheduled times...");
    info!("⏸️  Press Ctrl+C to stop the daemon");

    // Keep the daemon alive
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon alive - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}

/// "HH:MM" → daily cron expression "0 MM HH * * *"
fn cron_for(schedule_time: &str) -> Option<String> {
    let (hour, minute) = schedule_time.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok().filter(|h| *h < 24)?;
    let minute: u32 = minute.parse().ok().filter(|m| *m < 60)?;
    Some(format!("0 {} {} * * *", minute, hour))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cron_for() {
        assert_eq!(cron_for("02:00").as_deref(), Some("0 0 2 * * *"));
        assert_eq!(cron_for(" 14:30 ").as_deref(), Some("0 30 14 * * *"));
        assert_eq!(cron_for("24:00"), None);
        assert_eq!(cron_for("noon"), None);
        assert_eq!(cron_for("12:61"), None);
    }
}
