//! External collaborators
//!
//! The orchestrator never touches pixels. Opening sources, producing
//! derivatives and summarising colours go through these traits, which
//! image backends implement.

use crate::config::{PaletteConfig, ProcessConfig};
use crate::error::BoxError;
use crate::instructions::{Label, ResolvedInstructions};
use crate::uri::Uri;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Pixel dimensions of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions
    #[inline]
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<Dimensions> for [u32; 2] {
    fn from(d: Dimensions) -> Self {
        [d.width, d.height]
    }
}

/// Decoded or derived image
pub trait ImageHandle: Send + Sync + Debug {
    /// Pixel dimensions
    ///
    /// # Errors
    /// Backend-specific failure to inspect the image.
    fn dimensions(&self) -> Result<Dimensions, BoxError>;
}

/// Opens origin images
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// Open the image at `origin`
    async fn open_image(
        &self,
        config: &ProcessConfig,
        origin: &str,
    ) -> Result<Box<dyn ImageHandle>, BoxError>;
}

/// Output of a [`Processor`]
#[derive(Debug)]
pub struct Derivative {
    /// Where the derivative was written
    pub uri: Uri,
    /// The derivative image
    pub image: Box<dyn ImageHandle>,
}

/// Produces one derivative per call
#[async_trait]
pub trait Processor: Send + Sync + Debug {
    /// Produce the derivative `label` of `uri` by applying `instructions`
    async fn process(
        &self,
        uri: &Uri,
        label: &Label,
        instructions: &ResolvedInstructions,
    ) -> Result<Derivative, BoxError>;
}

/// One dominant colour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swatch {
    /// Closest named colour
    pub name: String,
    /// Hex value, e.g. `#b6a14d`
    pub hex: String,
    /// Palette the name was taken from
    pub reference: String,
}

/// Dominant colours of an image
pub type Palette = Vec<Swatch>;

/// Computes palettes
#[async_trait]
pub trait PaletteService: Send + Sync + Debug {
    /// Summarise the dominant colours of `image`
    async fn compute(
        &self,
        config: &PaletteConfig,
        image: &dyn ImageHandle,
    ) -> Result<Palette, BoxError>;
}
