//! IIIF Process - derivative fan-out and fan-in
//!
//! Turns one source image plus a labelled set of IIIF instructions into a
//! manifest of derivatives:
//! - Runs every derivative and the palette concurrently
//! - Rewrites id/secret sources to their per-label targets
//! - Absorbs per-task failures into a best-effort manifest
//! - Processes batches of sources and persists per-source reports
//!
//! Image decoding and encoding live behind the [`Driver`], [`Processor`] and
//! [`PaletteService`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use iiif_process::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     driver: Arc<dyn Driver>,
//! #     processor: Arc<dyn Processor>,
//! #     palette: Arc<dyn PaletteService>,
//! # ) -> Result<(), ProcessError> {
//! let config = Arc::new(ProcessConfig::new().with_palette());
//! let orchestrator = DerivativeOrchestrator::new(config, driver, processor, palette);
//!
//! let instructions = InstructionSet::new()
//!     .with(Label::new("b")?, Instructions::new().with_size("!2048,1536"));
//!
//! let manifest = orchestrator.process(&Uri::parse("avocado.png")?, &instructions).await;
//! println!("{}", String::from_utf8_lossy(&manifest.to_json()?));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod instructions;
pub mod manifest;
pub mod orchestrator;
pub mod rewrite;
pub mod uri;

pub use backend::{
    Derivative, Dimensions, Driver, ImageHandle, Palette, PaletteService, Processor, Swatch,
};
pub use batch::{process_many, report_key, BatchOptions, Reporting};
pub use config::{
    CacheSection, ExtruderConfig, NamedConfig, PaletteConfig, ProcessConfig, ReportConfig,
    DEFAULT_REPORT_NAME, PALETTE_SERVICE,
};
pub use error::{BoxError, ErrorKind, ProcessError};
pub use instructions::{InstructionSet, Instructions, Label, LabelError, ResolvedInstructions};
pub use manifest::{BatchReport, ProcessManifest, TaskFailure, TaskKind, TaskSummary};
pub use orchestrator::DerivativeOrchestrator;
pub use uri::{TargetOptions, Uri, UriDriver, UriError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with IIIF Process
    pub use crate::{
        process_many, BatchOptions, BatchReport, DerivativeOrchestrator, Driver, InstructionSet,
        Instructions, Label, PaletteService, ProcessConfig, ProcessError, ProcessManifest,
        Processor, Reporting, Uri,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
