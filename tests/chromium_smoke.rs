//! Live browser smoke test.
//!
//! Skipped unless `GLEANER_CHROME_BIN` points at a Chrome/Chromium binary;
//! running it exercises the full launch → navigate → snapshot → extract →
//! release path against a real page.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use gleaner::config::{GleanerConfig, Verbosity};
use gleaner::plan::{FieldSpec, JobSpec, Selector, SelectorPlan};
use gleaner::runner::Gleaner;

#[tokio::test]
async fn chromium_launches_navigates_and_extracts() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let chrome_bin = match env::var("GLEANER_CHROME_BIN") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => {
            eprintln!("skipping chromium smoke test: GLEANER_CHROME_BIN not set");
            return Ok(());
        }
    };

    if !chrome_bin.exists() {
        eprintln!(
            "skipping chromium smoke test: chrome executable not found at {}",
            chrome_bin.display()
        );
        return Ok(());
    }

    let config = GleanerConfig {
        chrome_executable: Some(chrome_bin),
        verbose: Verbosity::Minimal,
        ..GleanerConfig::default()
    };

    let job = JobSpec {
        url: "https://example.com".to_string(),
        plan: SelectorPlan::List {
            root: Selector::Css("body".to_string()),
            fields: vec![
                FieldSpec::text("Heading", "h1"),
                FieldSpec::text("More", "a").sentinel("no link"),
            ],
        },
        sinks: Vec::new(),
    };

    let gleaner = Gleaner::new(config);
    let report = gleaner
        .run(&job)
        .await
        .context("live extraction run failed")?;

    info!(
        "extracted {} record(s) in {} ms",
        report.records.len(),
        report.metrics.navigate_ms + report.metrics.extract_ms
    );

    assert_eq!(report.records.len(), 1);
    assert_eq!(
        report.records.records()[0].get("Heading"),
        Some("Example Domain")
    );

    Ok(())
}
