pub mod aggregate;
pub mod config;
pub mod enrich;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod source;

pub use aggregate::aggregate;
pub use config::{ConfigError, PipelineConfig};
pub use enrich::{enrich, ValidationReport};
pub use error::PipelineError;
pub use orchestrator::{AggregateOutcome, Pipeline, ReferenceOrigin, RunOutcome, RunReport, Stage};
pub use reconcile::{detect_scheme, reconcile, ReconcileReport, Scheme};
pub use source::{ArchiveSource, HttpSource, ReferenceSource, SourceError};
