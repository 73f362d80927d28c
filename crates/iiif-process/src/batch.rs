//! Batch processing across many source images
//!
//! Sources are processed strictly one after another; concurrency exists only
//! inside each orchestrator run. When reporting is on, every manifest is also
//! written to the report sink in the background, and the batch waits for all
//! of those writes before it returns.

use crate::backend::{Driver, PaletteService, Processor};
use crate::config::{ProcessConfig, DEFAULT_REPORT_NAME};
use crate::error::ProcessError;
use crate::instructions::InstructionSet;
use crate::manifest::{BatchReport, ProcessManifest};
use crate::orchestrator::DerivativeOrchestrator;
use crate::uri::Uri;
use futures::future::join_all;
use iiif_cache::{cache_from_config, Cache};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, Instrument};

/// Where and under which name process reports are written
#[derive(Debug, Clone)]
pub struct Reporting {
    sink: Arc<dyn Cache>,
    name: String,
}

impl Reporting {
    /// Report into `sink` as `process.json`
    #[inline]
    #[must_use]
    pub fn new(sink: Arc<dyn Cache>) -> Self {
        Self {
            sink,
            name: DEFAULT_REPORT_NAME.to_string(),
        }
    }

    /// With report file name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Report file name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache key of the report for `origin`
    #[must_use]
    pub fn key_for(&self, origin: &str) -> String {
        report_key(origin, &self.name)
    }
}

/// Everything a batch run needs
#[derive(Debug, Clone)]
pub struct BatchOptions {
    config: Arc<ProcessConfig>,
    driver: Arc<dyn Driver>,
    processor: Arc<dyn Processor>,
    palette: Arc<dyn PaletteService>,
    instructions: Arc<InstructionSet>,
    reporting: Option<Reporting>,
}

impl BatchOptions {
    /// Create options with reporting off
    #[must_use]
    pub fn new(
        config: Arc<ProcessConfig>,
        driver: Arc<dyn Driver>,
        processor: Arc<dyn Processor>,
        palette: Arc<dyn PaletteService>,
        instructions: Arc<InstructionSet>,
    ) -> Self {
        Self {
            config,
            driver,
            processor,
            palette,
            instructions,
            reporting: None,
        }
    }

    /// Create options, reporting into the derivatives cache if the
    /// configuration enables reports
    ///
    /// The cache is built once here and shared by every report write.
    ///
    /// # Errors
    /// - `ProcessError::InvalidConfig` if the configuration does not
    ///   validate or the derivatives cache cannot be built
    pub fn from_config(
        config: Arc<ProcessConfig>,
        driver: Arc<dyn Driver>,
        processor: Arc<dyn Processor>,
        palette: Arc<dyn PaletteService>,
        instructions: Arc<InstructionSet>,
    ) -> Result<Self, ProcessError> {
        config.validate()?;

        let reporting = if config.report.enabled {
            let sink = cache_from_config(&config.derivatives.cache)
                .map_err(|e| ProcessError::InvalidConfig(e.to_string()))?;
            Some(Reporting::new(sink).with_name(config.report.name.clone()))
        } else {
            None
        };

        Ok(Self {
            reporting,
            ..Self::new(config, driver, processor, palette, instructions)
        })
    }

    /// With reports written into `sink`
    #[inline]
    #[must_use]
    pub fn with_reporting(mut self, reporting: Reporting) -> Self {
        self.reporting = Some(reporting);
        self
    }

    /// Active reporting, if any
    #[inline]
    #[must_use]
    pub fn reporting(&self) -> Option<&Reporting> {
        self.reporting.as_ref()
    }

    fn orchestrator(&self) -> DerivativeOrchestrator {
        DerivativeOrchestrator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.driver),
            Arc::clone(&self.processor),
            Arc::clone(&self.palette),
        )
    }
}

/// Process every source in order and collect their manifests
///
/// Report write failures are logged and listed in
/// [`BatchReport::failed_reports`]; they never fail the batch. Two sources
/// with the same origin share one entry, the later manifest winning both in
/// the report and in the sink: a pending write for the same key is settled
/// before the next one starts.
#[instrument(skip_all, fields(sources = sources.len(), reporting = options.reporting.is_some()))]
pub async fn process_many(options: &BatchOptions, sources: &[Uri]) -> BatchReport {
    let orchestrator = options.orchestrator();
    let mut report = BatchReport::new();
    let mut writes: BTreeMap<String, JoinHandle<Result<(), ProcessError>>> = BTreeMap::new();

    for source in sources {
        let origin = source.origin().to_string();
        let manifest = orchestrator.process(source, &options.instructions).await;

        info!(
            origin = %origin,
            derivatives = manifest.uris.len(),
            failures = manifest.summary().failures.len(),
            "source processed"
        );

        if let Some(reporting) = &options.reporting {
            let key = reporting.key_for(&origin);

            if let Some(pending) = writes.remove(&key) {
                debug!(key = %key, "waiting for earlier report write");
                settle(&mut report, key.clone(), pending.await);
            }

            let sink = Arc::clone(&reporting.sink);
            let body = manifest.clone();
            let task_key = key.clone();
            let handle = tokio::spawn(
                async move { write_report(sink.as_ref(), &task_key, &body).await }
                    .in_current_span(),
            );
            writes.insert(key, handle);
        }

        report.insert(origin, manifest);
    }

    let (keys, handles): (Vec<_>, Vec<_>) = writes.into_iter().unzip();
    for (key, joined) in keys.into_iter().zip(join_all(handles).await) {
        settle(&mut report, key, joined);
    }

    report
}

fn settle(
    report: &mut BatchReport,
    key: String,
    joined: Result<Result<(), ProcessError>, JoinError>,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(key = %key, "{e}");
            report.record_failed_report(key);
        }
        Err(e) => {
            error!(key = %key, "report write task failed: {e}");
            report.record_failed_report(key);
        }
    }
}

async fn write_report(
    sink: &dyn Cache,
    key: &str,
    manifest: &ProcessManifest,
) -> Result<(), ProcessError> {
    let body = manifest.to_json()?;
    sink.set(key, body)
        .await
        .map_err(|source| ProcessError::ReportPersist {
            key: key.to_string(),
            source,
        })
}

/// `<origin>/<name>`, without doubled separators
#[must_use]
pub fn report_key(origin: &str, name: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}
