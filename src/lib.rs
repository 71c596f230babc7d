//! Plan-driven structured extraction from web pages.
//!
//! A [`Gleaner`](runner::Gleaner) run drives one headless browser session to
//! a target page, snapshots the DOM, executes a declarative
//! [`SelectorPlan`](plan::SelectorPlan) against the snapshot, normalises
//! field values, and serialises the resulting records to delimited and/or
//! JSON sinks. Absent elements are a normal outcome — fields fall back to
//! per-field sentinel values so every record keeps the declared shape —
//! while session, navigation, normalization, and serialization failures
//! surface as typed per-stage errors.
//!
//! Plans are plain data: a job file names the URL, the plan, and the sinks,
//! so different pages become configuration instances of one extractor.

pub mod config;
pub mod dom;
pub mod extract;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod plan;
pub mod runner;
pub mod serialize;
pub mod session;

pub use config::{ConfigError, GleanerConfig, GleanerConfigOverrides, Verbosity, WindowSize};
pub use extract::{Record, ResultSet};
pub use plan::{ExtractMode, FieldSpec, JobSpec, PlanError, Selector, SelectorPlan, SinkSpec};
pub use runner::{Gleaner, RunError, RunReport};
pub use session::{BrowserSession, ChromiumSession, SessionError, SnapshotSession};
