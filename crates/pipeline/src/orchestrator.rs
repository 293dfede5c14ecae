use chrono::{DateTime, Utc};
use regfin_core::{AggregateRow, ExpenseRecord, Period, ReferenceEntity};
use regfin_import::{normalize_table, parse_registry, read_archive};
use regfin_storage::{read_consolidated, write_aggregates, write_consolidated, Repository};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::enrich::{enrich, ValidationReport};
use crate::error::PipelineError;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::source::{ArchiveSource, ReferenceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovering,
    PerPeriodFetch,
    PerFileParse,
    Accumulating,
    Reconciling,
    Aggregating,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovering => "discovering",
            Stage::PerPeriodFetch => "per_period_fetch",
            Stage::PerFileParse => "per_file_parse",
            Stage::Accumulating => "accumulating",
            Stage::Reconciling => "reconciling",
            Stage::Aggregating => "aggregating",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    info!(%stage, "pipeline stage");
}

/// Where the reference registry used in a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceOrigin {
    Remote,
    Snapshot,
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub periods: Vec<Period>,
    pub archives_skipped: usize,
    pub files_accepted: usize,
    pub files_skipped: usize,
    pub records: usize,
    pub reference_origin: ReferenceOrigin,
    pub reference_entities: usize,
    pub reconciliation: ReconcileReport,
    pub validation: ValidationReport,
    pub aggregates: usize,
    pub persistence_errors: Vec<String>,
    pub exported: Vec<PathBuf>,
    pub export_errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<ExpenseRecord>,
    pub aggregates: Vec<AggregateRow>,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub aggregates: Vec<AggregateRow>,
    pub validation: ValidationReport,
    pub persistence_errors: Vec<String>,
}

#[derive(Debug, Default)]
struct Intake {
    records: Vec<ExpenseRecord>,
    periods: Vec<Period>,
    candidates: usize,
    archives_skipped: usize,
    files_accepted: usize,
    files_skipped: usize,
}

/// Drives one ingestion run: discovery, per-archive parsing, reconciliation,
/// enrichment, aggregation and persistence, strictly one step at a time.
pub struct Pipeline<S, R> {
    source: S,
    repository: R,
    config: PipelineConfig,
}

impl<S, R> Pipeline<S, R>
where
    S: ArchiveSource + ReferenceSource,
    R: Repository,
{
    pub fn new(source: S, repository: R, config: PipelineConfig) -> Self {
        Pipeline {
            source,
            repository,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Runs the whole pipeline. Only an empty intake is an error; source,
    /// parse, persistence and export failures are logged and reported.
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let started_at = Utc::now();

        let intake = match self.ingest().await {
            Ok(intake) => intake,
            Err(e) => {
                enter(Stage::Failed);
                error!(error = %e, "pipeline run failed");
                return Err(e);
            }
        };
        info!(
            periods = intake.periods.len(),
            records = intake.records.len(),
            "intake complete"
        );

        let (reference, reference_origin) = self.load_reference().await;

        enter(Stage::Reconciling);
        let (records, reconciliation) = reconcile(intake.records, &reference);
        info!(
            scheme = ?reconciliation.scheme,
            matched = reconciliation.matched,
            unmatched = reconciliation.unmatched,
            "identifiers reconciled"
        );

        enter(Stage::Aggregating);
        let (enriched, validation) = enrich(&records, &reference);
        let aggregates = aggregate(&enriched);
        info!(
            accepted = validation.accepted,
            rejected = validation.invalid_identifier + validation.non_positive_value,
            groups = aggregates.len(),
            "expenses aggregated"
        );

        enter(Stage::Persisting);
        let mut persistence_errors = Vec::new();
        if let Err(e) = self.repository.replace_expenses(&records).await {
            note_failure(&mut persistence_errors, "expense_records", e.into());
        }
        if reference_origin == ReferenceOrigin::Remote {
            if let Err(e) = self.repository.replace_entities(&reference).await {
                note_failure(&mut persistence_errors, "active_entities", e.into());
            }
        }
        if let Err(e) = self.repository.replace_aggregates(&aggregates).await {
            note_failure(&mut persistence_errors, "expense_aggregates", e.into());
        }

        let (exported, export_errors) = self.export(&records, &aggregates);

        enter(Stage::Done);
        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            periods: intake.periods,
            archives_skipped: intake.archives_skipped,
            files_accepted: intake.files_accepted,
            files_skipped: intake.files_skipped,
            records: records.len(),
            reference_origin,
            reference_entities: reference.len(),
            reconciliation,
            validation,
            aggregates: aggregates.len(),
            persistence_errors,
            exported,
            export_errors,
        };

        Ok(RunOutcome {
            records,
            aggregates,
            report,
        })
    }

    /// Recomputes enrichment and aggregation from the persisted consolidated
    /// records, or from the consolidated export when the repository has none.
    pub async fn aggregate_persisted(&self) -> Result<AggregateOutcome, PipelineError> {
        let mut records = self.repository.read_expenses().await.unwrap_or_else(|e| {
            warn!(error = %PipelineError::from(e), "could not read persisted expenses");
            Vec::new()
        });
        if records.is_empty() {
            if let Some(dir) = &self.config.export_dir {
                match read_consolidated(dir) {
                    Ok(from_export) => records = from_export,
                    Err(e) => warn!(error = %PipelineError::from(e), "no consolidated export"),
                }
            }
        }
        if records.is_empty() {
            enter(Stage::Failed);
            return Err(PipelineError::NoDataFound { candidates: 0 });
        }

        let reference = self.repository.read_entities().await.unwrap_or_else(|e| {
            warn!(error = %PipelineError::from(e), "could not read entity snapshot");
            Vec::new()
        });

        enter(Stage::Aggregating);
        let (enriched, validation) = enrich(&records, &reference);
        let aggregates = aggregate(&enriched);

        enter(Stage::Persisting);
        let mut persistence_errors = Vec::new();
        if let Err(e) = self.repository.replace_aggregates(&aggregates).await {
            note_failure(&mut persistence_errors, "expense_aggregates", e.into());
        }
        if let Some(dir) = &self.config.export_dir {
            if let Err(e) = write_aggregates(dir, &aggregates) {
                note_failure(&mut persistence_errors, "aggregate backup", e.into());
            }
        }

        enter(Stage::Done);
        Ok(AggregateOutcome {
            aggregates,
            validation,
            persistence_errors,
        })
    }

    async fn ingest(&self) -> Result<Intake, PipelineError> {
        enter(Stage::Discovering);
        let mut intake = Intake::default();
        let max_periods = self.config.max_periods;

        let mut years = self.source.list_years().await.unwrap_or_else(|e| {
            warn!(error = %PipelineError::from(e), "year listing unavailable");
            Vec::new()
        });
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();

        'years: for year in years {
            if intake.periods.len() >= max_periods {
                break;
            }
            let names = match self.source.list_archives(year).await {
                Ok(names) => names,
                Err(e) => {
                    warn!(year, error = %PipelineError::from(e), "archive listing unavailable");
                    continue;
                }
            };

            let mut archives: Vec<(Period, String)> = names
                .into_iter()
                .filter_map(|name| match Period::from_archive_name(&name) {
                    Ok(period) => Some((period, name)),
                    Err(e) => {
                        debug!(archive = %name, error = %e, "not a period archive");
                        None
                    }
                })
                .collect();
            archives.sort_by(|a, b| b.0.cmp(&a.0));

            for (period, name) in archives {
                if intake.periods.len() >= max_periods {
                    break 'years;
                }
                if intake.periods.contains(&period) {
                    debug!(archive = %name, %period, "period already ingested");
                    continue;
                }
                intake.candidates += 1;
                self.ingest_archive(year, &name, period, &mut intake).await;
            }
        }

        if intake.records.is_empty() {
            return Err(PipelineError::NoDataFound {
                candidates: intake.candidates,
            });
        }
        Ok(intake)
    }

    /// Fetches and parses one archive. The period is only used when at least
    /// one of its files yields records.
    async fn ingest_archive(&self, year: u16, name: &str, period: Period, intake: &mut Intake) {
        enter(Stage::PerPeriodFetch);
        let bytes = match self.source.fetch_archive(year, name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(archive = %name, error = %PipelineError::from(e), "archive skipped");
                intake.archives_skipped += 1;
                return;
            }
        };
        let entries = match read_archive(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %PipelineError::malformed(name, e), "archive skipped");
                intake.archives_skipped += 1;
                return;
            }
        };

        enter(Stage::PerFileParse);
        let mut period_records = Vec::new();
        for entry in entries {
            let table = match entry.table {
                Ok(table) => table,
                Err(e) => {
                    warn!(error = %PipelineError::malformed(&entry.name, e), "file skipped");
                    intake.files_skipped += 1;
                    continue;
                }
            };
            match normalize_table(&table, period) {
                Ok(records) => {
                    info!(file = %entry.name, records = records.len(), "file accepted");
                    intake.files_accepted += 1;
                    period_records.extend(records);
                }
                Err(skip) => {
                    info!(file = %entry.name, reason = %skip, "file skipped");
                    intake.files_skipped += 1;
                }
            }
        }

        if period_records.is_empty() {
            info!(archive = %name, %period, "archive yielded no records");
            intake.archives_skipped += 1;
            return;
        }

        enter(Stage::Accumulating);
        info!(%period, records = period_records.len(), "period ingested");
        intake.periods.push(period);
        intake.records.extend(period_records);
    }

    /// Remote registry first, then the persisted snapshot, then nothing.
    async fn load_reference(&self) -> (Vec<ReferenceEntity>, ReferenceOrigin) {
        let remote = match self.source.fetch_registry().await {
            Ok(bytes) => parse_registry(&bytes).map_err(PipelineError::from),
            Err(e) => Err(e.into()),
        };
        match remote {
            Ok(entities) if !entities.is_empty() => {
                info!(entities = entities.len(), "reference registry loaded");
                return (entities, ReferenceOrigin::Remote);
            }
            Ok(_) => warn!("reference registry is empty"),
            Err(e) => warn!(error = %e, "reference registry unavailable"),
        }

        match self.repository.read_entities().await {
            Ok(entities) if !entities.is_empty() => {
                info!(entities = entities.len(), "using persisted entity snapshot");
                (entities, ReferenceOrigin::Snapshot)
            }
            Ok(_) => {
                warn!("no entity snapshot; legal names will be unknown");
                (Vec::new(), ReferenceOrigin::Empty)
            }
            Err(e) => {
                warn!(error = %PipelineError::from(e), "no entity snapshot; legal names will be unknown");
                (Vec::new(), ReferenceOrigin::Empty)
            }
        }
    }

    fn export(&self, records: &[ExpenseRecord], aggregates: &[AggregateRow]) -> (Vec<PathBuf>, Vec<String>) {
        let mut exported = Vec::new();
        let mut errors = Vec::new();
        let Some(dir) = &self.config.export_dir else {
            return (exported, errors);
        };

        match write_consolidated(dir, records) {
            Ok(export) => {
                exported.push(export.csv_path);
                exported.push(export.zip_path);
            }
            Err(e) => note_failure(&mut errors, "consolidated export", e.into()),
        }
        match write_aggregates(dir, aggregates) {
            Ok(path) => exported.push(path),
            Err(e) => note_failure(&mut errors, "aggregate backup", e.into()),
        }
        if !exported.is_empty() {
            info!(files = exported.len(), dir = %dir.display(), "exports written");
        }
        (exported, errors)
    }
}

fn note_failure(errors: &mut Vec<String>, target: &str, err: PipelineError) {
    warn!(target_table = target, error = %err, "write failed");
    errors.push(format!("{target}: {err}"));
}
