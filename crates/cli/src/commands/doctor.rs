//! Doctor command - validate configuration and show status

use anyhow::Result;
use herald_adapters::store::SqliteArticleStore;
use herald_domain::ArticleStore;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    channels: CheckResult,
    store: CheckResult,
    outbox: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        channels: CheckResult::error("Not checked"),
        store: CheckResult::error("Not checked"),
        outbox: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.channels = check_channels(config);
        report.store = check_store(config).await;
        report.outbox = check_outbox(config);
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.channels,
        &report.store,
        &report.outbox,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_channels(config: &AppConfig) -> CheckResult {
    if let Err(e) = config.validate(true) {
        return CheckResult::error(e.to_string());
    }

    let enabled: Vec<&str> = config
        .channels
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.name.as_str())
        .collect();

    if enabled.is_empty() {
        return CheckResult::warn("No channels enabled; nothing will be announced");
    }

    // Credentials only need to exist at run time, so a missing env var is
    // a warning here rather than an error
    let missing: Vec<&str> = config
        .channels
        .iter()
        .filter(|c| c.enabled && std::env::var(&c.access_token_env).is_err())
        .map(|c| c.name.as_str())
        .collect();

    let result = if missing.is_empty() {
        CheckResult::ok(format!("{} channel(s) enabled", enabled.len()))
    } else {
        CheckResult::warn(format!(
            "Credentials not set for enabled channel(s): {}",
            missing.join(", ")
        ))
    };

    result.with_details(serde_json::json!({
        "enabled": enabled,
        "missing_credentials": missing,
    }))
}

async fn check_store(config: &AppConfig) -> CheckResult {
    match SqliteArticleStore::new(&config.general.state_db_path).await {
        Ok(store) => match store.list_publications().await {
            Ok(publications) => {
                let result = if publications.is_empty() {
                    CheckResult::warn("Store reachable but no publications are seeded")
                } else {
                    CheckResult::ok(format!("{} publication(s) known", publications.len()))
                };
                result.with_details(serde_json::json!({
                    "publications": publications.iter().map(|p| &p.title).collect::<Vec<_>>(),
                }))
            }
            Err(e) => CheckResult::error(format!("Failed to list publications: {}", e)),
        },
        Err(e) => CheckResult::error(format!("Failed to open article store: {}", e)),
    }
}

fn check_outbox(config: &AppConfig) -> CheckResult {
    let dir = &config.general.outbox_dir;
    match std::fs::create_dir_all(dir) {
        Ok(()) => CheckResult::ok(format!("Outbox directory writable: {}", dir.display())),
        Err(e) => CheckResult::error(format!(
            "Cannot create outbox directory {}: {}",
            dir.display(),
            e
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("herald Doctor Report");
    println!("====================");
    println!();

    print_check("Config", &report.config);
    print_check("Channels", &report.channels);
    print_check("Store", &report.store);
    print_check("Outbox", &report.outbox);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: herald run --dry-run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
