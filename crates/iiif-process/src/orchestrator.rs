//! Parallel derivative generation for one source image
//!
//! For a source and an instruction set of N labels the orchestrator spawns
//! N derivative tasks plus one palette task, then waits for exactly N + 1
//! completion signals. Failed tasks still signal completion; their errors
//! arrive on a separate channel and are logged and recorded in the
//! manifest's [`TaskSummary`]. Nothing a single task does can abort its
//! siblings or the call.

use crate::backend::{Dimensions, Driver, PaletteService, Processor};
use crate::config::ProcessConfig;
use crate::error::ProcessError;
use crate::instructions::{InstructionSet, Label, ResolvedInstructions};
use crate::manifest::{ProcessManifest, TaskFailure, TaskKind, TaskSummary};
use crate::rewrite;
use crate::uri::Uri;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, Instrument};

/// Sends one completion signal when dropped
///
/// Held by every task for its whole lifetime, so a task signals exactly once
/// whether it returns normally, returns early on error, or panics.
struct CompletionSignal(mpsc::UnboundedSender<()>);

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Error notification from a task
type TaskError = (TaskKind, ProcessError);

/// Collaborators shared by every task of one run
#[derive(Debug, Clone)]
struct TaskContext {
    config: Arc<ProcessConfig>,
    driver: Arc<dyn Driver>,
    processor: Arc<dyn Processor>,
    palette: Arc<dyn PaletteService>,
    manifest: Arc<Mutex<ProcessManifest>>,
    errors: mpsc::UnboundedSender<TaskError>,
}

/// Fans out derivative and palette tasks for one source image
#[derive(Debug, Clone)]
pub struct DerivativeOrchestrator {
    config: Arc<ProcessConfig>,
    driver: Arc<dyn Driver>,
    processor: Arc<dyn Processor>,
    palette: Arc<dyn PaletteService>,
}

impl DerivativeOrchestrator {
    /// Create orchestrator
    #[inline]
    #[must_use]
    pub fn new(
        config: Arc<ProcessConfig>,
        driver: Arc<dyn Driver>,
        processor: Arc<dyn Processor>,
        palette: Arc<dyn PaletteService>,
    ) -> Self {
        Self {
            config,
            driver,
            processor,
            palette,
        }
    }

    /// Produce every derivative of `source` plus its palette
    ///
    /// Best effort: the manifest holds only the labels whose tasks
    /// succeeded, and `palette` only if the palette service is enabled and
    /// succeeded. Per-task errors are logged and listed in
    /// [`ProcessManifest::summary`], never returned.
    ///
    /// A task whose backend call never returns keeps this call from
    /// returning; there is no per-task deadline.
    #[instrument(skip(self, instructions), fields(source = %source, labels = instructions.len()))]
    pub async fn process(&self, source: &Uri, instructions: &InstructionSet) -> ProcessManifest {
        let spawned = instructions.len() + 1;

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel();

        let ctx = TaskContext {
            config: Arc::clone(&self.config),
            driver: Arc::clone(&self.driver),
            processor: Arc::clone(&self.processor),
            palette: Arc::clone(&self.palette),
            manifest: Arc::new(Mutex::new(ProcessManifest::new())),
            errors: err_tx,
        };

        tokio::spawn(
            palette_task(ctx.clone(), source.clone(), CompletionSignal(done_tx.clone()))
                .in_current_span(),
        );

        for (label, params) in instructions {
            tokio::spawn(
                derivative_task(
                    ctx.clone(),
                    source.clone(),
                    label.clone(),
                    params.ensure_defaults(),
                    CompletionSignal(done_tx.clone()),
                )
                .in_current_span(),
            );
        }

        // Only tasks hold senders from here on.
        drop(done_tx);
        let manifest = Arc::clone(&ctx.manifest);
        drop(ctx);

        let mut summary = TaskSummary {
            spawned,
            ..TaskSummary::default()
        };

        while summary.completed < spawned {
            tokio::select! {
                biased;

                Some((task, err)) = err_rx.recv() => {
                    record_failure(&mut summary, source, task, &err);
                }

                signal = done_rx.recv() => match signal {
                    Some(()) => summary.completed += 1,
                    None => break,
                },
            }
        }

        // A task reports its error before it signals, so anything left is
        // already queued.
        while let Ok((task, err)) = err_rx.try_recv() {
            record_failure(&mut summary, source, task, &err);
        }

        debug!(
            completed = summary.completed,
            failed = summary.failures.len(),
            "all tasks finished"
        );

        let manifest = std::mem::take(&mut *manifest.lock());
        manifest.with_summary(summary)
    }
}

fn record_failure(summary: &mut TaskSummary, source: &Uri, task: TaskKind, err: &ProcessError) {
    error!(source = %source, task = %task, kind = %err.kind(), "{err}");
    summary.failures.push(TaskFailure::new(task, err));
}

async fn palette_task(ctx: TaskContext, source: Uri, _signal: CompletionSignal) {
    if let Err(err) = compute_palette(&ctx, &source).await {
        let _ = ctx.errors.send((TaskKind::Palette, err));
    }
}

async fn compute_palette(ctx: &TaskContext, source: &Uri) -> Result<(), ProcessError> {
    let image = ctx
        .driver
        .open_image(&ctx.config, source.origin())
        .await
        .map_err(|e| ProcessError::SourceOpen {
            origin: source.origin().to_string(),
            source: e,
        })?;

    if !ctx.config.palette_enabled() {
        return Ok(());
    }

    let palette = ctx
        .palette
        .compute(&ctx.config.palette, image.as_ref())
        .await
        .map_err(|e| ProcessError::Palette {
            uri: source.to_string(),
            source: e,
        })?;

    ctx.manifest.lock().palette = Some(palette);
    Ok(())
}

async fn derivative_task(
    ctx: TaskContext,
    source: Uri,
    label: Label,
    instructions: ResolvedInstructions,
    _signal: CompletionSignal,
) {
    match derive(&ctx, &source, &label, &instructions).await {
        Ok((uri, dimensions)) => {
            debug!(source = %source, label = %label, uri = %uri, "derivative ready");
            ctx.manifest
                .lock()
                .insert_derivative(label, uri, dimensions);
        }
        Err(err) => {
            let _ = ctx.errors.send((TaskKind::Derivative(label), err));
        }
    }
}

async fn derive(
    ctx: &TaskContext,
    source: &Uri,
    label: &Label,
    instructions: &ResolvedInstructions,
) -> Result<(String, Dimensions), ProcessError> {
    let process_uri = rewrite::effective_uri(source, label, instructions)?;

    let derivative = ctx
        .processor
        .process(&process_uri, label, instructions)
        .await
        .map_err(|e| ProcessError::Derivative {
            uri: source.to_string(),
            label: label.clone(),
            source: e,
        })?;

    let dimensions = derivative
        .image
        .dimensions()
        .map_err(|e| ProcessError::DimensionQuery {
            uri: source.to_string(),
            label: label.clone(),
            source: e,
        })?;

    Ok((derivative.uri.to_string(), dimensions))
}
