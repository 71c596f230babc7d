//! High-level extraction facade.
//!
//! [`Gleaner`] wires the stages together: compile the plan, acquire a
//! session, navigate, snapshot the DOM, release the session, execute the
//! plan, and write the configured sinks. The session is released on every
//! exit path — including compile and navigation failures — and before
//! extraction begins, so a browser process never outlives the one
//! navigation it exists for.

use serde_json::json;
use thiserror::Error;

use crate::config::GleanerConfig;
use crate::dom::Document;
use crate::extract::{ResultSet, run_plan};
use crate::logging::{GleanerLogger, LogConfig};
use crate::metrics::{RunMetrics, stage_elapsed_ms, start_stage_timer};
use crate::normalize::NormalizeError;
use crate::plan::{JobSpec, PlanError};
use crate::serialize::{SerializeError, write_sink};
use crate::session::{BrowserSession, ChromiumSession, SessionError};

/// Failure of one extraction run, tagged by stage.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub records: ResultSet,
    pub metrics: RunMetrics,
}

/// Plan-driven structured extractor.
pub struct Gleaner {
    config: GleanerConfig,
    logger: GleanerLogger,
}

impl Gleaner {
    pub fn new(config: GleanerConfig) -> Self {
        let logger = GleanerLogger::with_config(LogConfig {
            verbose: config.verbose,
            external_logger: config.logger.clone(),
        });
        Self { config, logger }
    }

    pub fn config(&self) -> &GleanerConfig {
        &self.config
    }

    pub fn logger(&self) -> &GleanerLogger {
        &self.logger
    }

    /// Run a job against a freshly launched headless browser session.
    pub async fn run(&self, job: &JobSpec) -> Result<RunReport, RunError> {
        self.logger.debug(
            format!("launching browser session ({})", self.config.window_size),
            Some("session"),
            None,
        );
        let session = ChromiumSession::launch(&self.config).await?;
        self.run_with(session, job).await
    }

    /// Run a job against an already-acquired session. The session is owned
    /// by this call and released before it returns, on success or failure.
    pub async fn run_with<S: BrowserSession>(
        &self,
        session: S,
        job: &JobSpec,
    ) -> Result<RunReport, RunError> {
        let plan = match job.compile() {
            Ok(plan) => plan,
            Err(err) => {
                let _ = session.close().await;
                return Err(err.into());
            }
        };

        let mut metrics = RunMetrics::default();

        self.logger
            .info(format!("navigating to {}", job.url), Some("navigate"), None);
        let nav_timer = start_stage_timer();
        let html = match self.snapshot(&session, &job.url).await {
            Ok(html) => html,
            Err(err) => {
                let _ = session.close().await;
                return Err(err.into());
            }
        };
        metrics.navigate_ms = stage_elapsed_ms(nav_timer);
        session.close().await?;
        self.logger.debug(
            format!("captured snapshot ({} bytes), session released", html.len()),
            Some("session"),
            None,
        );

        let extract_timer = start_stage_timer();
        let document = Document::parse(&html);
        let records = run_plan(&document, &plan, &mut metrics)?;
        metrics.extract_ms = stage_elapsed_ms(extract_timer);
        self.logger.info(
            format!(
                "extracted {} records from {} matched elements",
                records.len(),
                metrics.roots_matched
            ),
            Some("extract"),
            Some(json!({
                "fields_defaulted": metrics.fields_defaulted,
                "items_skipped": metrics.items_skipped,
            })),
        );

        let field_names = plan.field_names();
        for sink in &job.sinks {
            write_sink(&records, &field_names, sink)?;
            self.logger
                .info(describe_sink(sink), Some("serialize"), None);
        }

        Ok(RunReport { records, metrics })
    }

    async fn snapshot(
        &self,
        session: &impl BrowserSession,
        url: &str,
    ) -> Result<String, SessionError> {
        session.navigate(url).await?;
        session.content().await
    }
}

fn describe_sink(sink: &crate::plan::SinkSpec) -> String {
    match sink {
        crate::plan::SinkSpec::Delimited { path, .. } => {
            format!("wrote delimited output to {}", path.display())
        }
        crate::plan::SinkSpec::Json { path } => {
            format!("wrote JSON output to {}", path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Verbosity;
    use crate::normalize::Transform;
    use crate::plan::{ExtractMode, FieldSpec, Selector, SelectorPlan, SinkSpec};
    use crate::serialize::delimited_to_string;
    use crate::session::SnapshotSession;

    const BOOKS: &str = r#"
        <html><body>
            <ul>
                <li class="result">
                    <span class="title">Learning Spanish</span>
                    <a class="author" href="/a/1">Alice</a>
                </li>
                <li class="result">
                    <span class="title">Spanish Verbs</span>
                </li>
            </ul>
        </body></html>
    "#;

    fn quiet_gleaner() -> Gleaner {
        Gleaner::new(GleanerConfig {
            verbose: Verbosity::Minimal,
            ..GleanerConfig::default()
        })
    }

    fn books_job() -> JobSpec {
        JobSpec {
            url: "https://example.test/search".to_string(),
            plan: SelectorPlan::List {
                root: Selector::Css("li.result".to_string()),
                fields: vec![
                    FieldSpec::text("Title", "span.title").sentinel("title not found"),
                    FieldSpec::text("Author", "a.author")
                        .mode(ExtractMode::MultiText {
                            separator: ";".to_string(),
                        })
                        .sentinel("author not found"),
                ],
            },
            sinks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn end_to_end_emits_sentinel_backed_records() {
        let gleaner = quiet_gleaner();
        let session = SnapshotSession::new(BOOKS);
        let report = gleaner
            .run_with(session, &books_job())
            .await
            .expect("run succeeds");

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records.records()[0].get("Author"), Some("Alice"));
        assert_eq!(
            report.records.records()[1].get("Author"),
            Some("author not found")
        );

        let text = delimited_to_string(
            &report.records,
            &["Title".to_string(), "Author".to_string()],
            '|',
            false,
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Title|Author");
        assert_eq!(lines[1], "Learning Spanish|Alice");
        assert_eq!(lines[2], "Spanish Verbs|author not found");
    }

    #[tokio::test]
    async fn repeated_runs_serialize_identically() {
        let gleaner = quiet_gleaner();
        let job = books_job();

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let report = gleaner
                .run_with(SnapshotSession::new(BOOKS), &job)
                .await
                .expect("run succeeds");
            outputs.push(delimited_to_string(
                &report.records,
                &["Title".to_string(), "Author".to_string()],
                '|',
                false,
            ));
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn session_is_released_on_success() {
        let gleaner = quiet_gleaner();
        let session = Arc::new(SnapshotSession::new(BOOKS));
        gleaner
            .run_with(Arc::clone(&session), &books_job())
            .await
            .expect("run succeeds");
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn session_is_released_on_plan_failure() {
        let gleaner = quiet_gleaner();
        let session = Arc::new(SnapshotSession::new(BOOKS));
        let mut job = books_job();
        job.plan = SelectorPlan::List {
            root: Selector::Css("li[unclosed".to_string()),
            fields: vec![FieldSpec::text("Title", "span")],
        };

        let err = gleaner
            .run_with(Arc::clone(&session), &job)
            .await
            .expect_err("bad plan fails");
        assert!(matches!(err, RunError::Plan(_)));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn session_is_released_on_normalization_failure() {
        let gleaner = quiet_gleaner();
        let session = Arc::new(SnapshotSession::new(BOOKS));
        let mut job = books_job();
        job.plan = SelectorPlan::List {
            root: Selector::Css("li.result".to_string()),
            fields: vec![FieldSpec::text("Number", "span.title").transforms(vec![
                Transform::DigitsOnly,
                Transform::ParseNumber,
            ])],
        };

        let err = gleaner
            .run_with(Arc::clone(&session), &job)
            .await
            .expect_err("strict numeric failure");
        assert!(matches!(err, RunError::Normalize(_)));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn sinks_are_written_from_a_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv_path = dir.path().join("books.csv");
        let json_path = dir.path().join("books.json");

        let mut job = books_job();
        job.sinks = vec![
            SinkSpec::Delimited {
                path: csv_path.clone(),
                delimiter: '|',
                include_index: false,
            },
            SinkSpec::Json {
                path: json_path.clone(),
            },
        ];

        let gleaner = quiet_gleaner();
        gleaner
            .run_with(SnapshotSession::new(BOOKS), &job)
            .await
            .expect("run succeeds");

        let csv = std::fs::read_to_string(&csv_path).expect("csv written");
        assert!(csv.starts_with("Title|Author\n"));
        let json = std::fs::read_to_string(&json_path).expect("json written");
        assert!(json.contains("\"Title\": \"Learning Spanish\""));
    }
}
