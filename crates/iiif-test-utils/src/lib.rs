//! Testing utilities for the IIIF process workspace
//!
//! In-memory fakes for the image backends, a cache that fails on demand, and
//! the avocado fixture used across the test suites.

#![allow(missing_docs)]

use async_trait::async_trait;
use iiif_cache::{Cache, CacheError, CacheResult, MemoryCache};
use iiif_process::uri::FileUri;
use iiif_process::{
    BoxError, Derivative, Dimensions, Driver, ImageHandle, InstructionSet, Instructions, Label,
    Palette, PaletteConfig, PaletteService, ProcessConfig, Processor, ResolvedInstructions, Swatch,
    TargetOptions, Uri,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Size of `avocado.png`
pub const AVOCADO_DIMENSIONS: Dimensions = Dimensions {
    width: 4032,
    height: 3024,
};

/// Install a test-friendly tracing subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn label(name: &str) -> Label {
    Label::new(name).unwrap()
}

/// `o` rotated by -1, `b` fit into 2048x1536, `d` a 320px dithered crop
pub fn avocado_instructions() -> InstructionSet {
    InstructionSet::new()
        .with(Label::original(), Instructions::new().with_rotation("-1"))
        .with(label("b"), Instructions::new().with_size("!2048,1536"))
        .with(
            label("d"),
            Instructions::new()
                .with_region("-1,-1,320,320")
                .with_quality("dither"),
        )
}

/// `count` labels `l0..`, each a distinct thumbnail size
pub fn many_instructions(count: usize) -> InstructionSet {
    (0..count)
        .map(|i| {
            (
                label(&format!("l{i}")),
                Instructions::new().with_size(format!("{},", 16 + i)),
            )
        })
        .collect()
}

pub fn avocado_palette() -> Palette {
    vec![
        Swatch {
            name: "olive".to_string(),
            hex: "#b6a14d".to_string(),
            reference: "crayola".to_string(),
        },
        Swatch {
            name: "darkolivegreen".to_string(),
            hex: "#4e5a2b".to_string(),
            reference: "css4".to_string(),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct FakeImage {
    dimensions: Dimensions,
    broken: bool,
}

impl FakeImage {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            broken: false,
        }
    }

    /// Image whose dimensions cannot be read
    pub fn broken(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            broken: true,
        }
    }
}

impl ImageHandle for FakeImage {
    fn dimensions(&self) -> Result<Dimensions, BoxError> {
        if self.broken {
            return Err("corrupt image header".into());
        }
        Ok(self.dimensions)
    }
}

/// Serves images from a fixed table of origins
#[derive(Debug, Default)]
pub struct FakeDriver {
    images: HashMap<String, Dimensions>,
    opened: AtomicUsize,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, origin: &str, dimensions: Dimensions) -> Self {
        self.images.insert(origin.to_string(), dimensions);
        self
    }

    pub fn avocado() -> Self {
        Self::new().with_image("avocado.png", AVOCADO_DIMENSIONS)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open_image(
        &self,
        _config: &ProcessConfig,
        origin: &str,
    ) -> Result<Box<dyn ImageHandle>, BoxError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let dimensions = self
            .images
            .get(origin)
            .ok_or_else(|| format!("no such image: {origin}"))?;
        Ok(Box::new(FakeImage::new(*dimensions)))
    }
}

/// One recorded processor call
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCall {
    pub uri: Uri,
    pub label: Label,
    pub instructions: ResolvedInstructions,
}

/// Computes derivative paths and sizes without touching pixels
///
/// File sources produce `<origin>/<region>/<size>/<rotation>/<quality>.<format>`
/// with the `default` quality written as `color`; rewrite sources produce
/// their target.
#[derive(Debug, Default)]
pub struct FakeProcessor {
    sources: HashMap<String, Dimensions>,
    failing: HashSet<Label>,
    broken: HashSet<Label>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ProcessCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, origin: &str, dimensions: Dimensions) -> Self {
        self.sources.insert(origin.to_string(), dimensions);
        self
    }

    pub fn avocado() -> Self {
        Self::new().with_source("avocado.png", AVOCADO_DIMENSIONS)
    }

    /// Fail every call for `label`
    pub fn failing(mut self, label: Label) -> Self {
        self.failing.insert(label);
        self
    }

    /// Succeed for `label` but return an image without readable dimensions
    pub fn broken_dimensions(mut self, label: Label) -> Self {
        self.broken.insert(label);
        self
    }

    /// Sleep this long in every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ProcessCall> {
        self.calls.lock().clone()
    }

    /// Highest number of calls that were running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn derive(
        &self,
        uri: &Uri,
        label: &Label,
        instructions: &ResolvedInstructions,
    ) -> Result<Derivative, BoxError> {
        if self.failing.contains(label) {
            return Err(format!("processing {label} failed").into());
        }

        let source = self
            .sources
            .get(uri.origin())
            .ok_or_else(|| format!("no such image: {}", uri.origin()))?;

        let path = match uri {
            Uri::Rewrite(_) => uri.target(&TargetOptions::new())?,
            Uri::File(_) | Uri::IdSecret(_) => {
                let quality = match instructions.quality.as_str() {
                    "default" => "color",
                    other => other,
                };
                format!(
                    "{}/{}/{}/{}/{}.{}",
                    uri.origin(),
                    instructions.region,
                    instructions.size,
                    instructions.rotation,
                    quality,
                    instructions.format
                )
            }
        };

        let dimensions = size_dimensions(
            &instructions.size,
            region_dimensions(&instructions.region, *source),
        );
        let image = if self.broken.contains(label) {
            FakeImage::broken(dimensions)
        } else {
            FakeImage::new(dimensions)
        };

        Ok(Derivative {
            uri: Uri::File(FileUri::new(path)),
            image: Box::new(image),
        })
    }
}

#[async_trait]
impl Processor for FakeProcessor {
    async fn process(
        &self,
        uri: &Uri,
        label: &Label,
        instructions: &ResolvedInstructions,
    ) -> Result<Derivative, BoxError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.calls.lock().push(ProcessCall {
            uri: uri.clone(),
            label: label.clone(),
            instructions: instructions.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.derive(uri, label, instructions);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Size of a region, `x,y,w,h` taking the last two values
fn region_dimensions(region: &str, source: Dimensions) -> Dimensions {
    match region {
        "full" => source,
        "square" => {
            let side = source.width.min(source.height);
            Dimensions::new(side, side)
        }
        _ => {
            let parts: Vec<&str> = region.split(',').collect();
            match parts.as_slice() {
                [_, _, w, h] => match (w.parse(), h.parse()) {
                    (Ok(w), Ok(h)) => Dimensions::new(w, h),
                    _ => source,
                },
                _ => source,
            }
        }
    }
}

/// Output size for IIIF `full`, `max`, `w,h`, `w,`, `,h` and `!w,h`
fn size_dimensions(size: &str, region: Dimensions) -> Dimensions {
    let (best_fit, size) = match size.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, size),
    };
    let Some((w, h)) = size.split_once(',') else {
        return region;
    };

    let scale = |from: u32, num: u32, den: u32| {
        (f64::from(from) * f64::from(num) / f64::from(den)).round() as u32
    };

    match (w.parse::<u32>().ok(), h.parse::<u32>().ok()) {
        (Some(w), Some(h)) if best_fit => {
            let ratio = (f64::from(w) / f64::from(region.width))
                .min(f64::from(h) / f64::from(region.height));
            Dimensions::new(
                (f64::from(region.width) * ratio).round() as u32,
                (f64::from(region.height) * ratio).round() as u32,
            )
        }
        (Some(w), Some(h)) => Dimensions::new(w, h),
        (Some(w), None) => Dimensions::new(w, scale(region.height, w, region.width)),
        (None, Some(h)) => Dimensions::new(scale(region.width, h, region.height), h),
        (None, None) => region,
    }
}

/// Returns a fixed palette, or fails
#[derive(Debug, Default)]
pub struct FakePalette {
    fail: bool,
    calls: AtomicUsize,
}

impl FakePalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaletteService for FakePalette {
    async fn compute(
        &self,
        config: &PaletteConfig,
        image: &dyn ImageHandle,
    ) -> Result<Palette, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(format!("{} extruder failed", config.extruder.name).into());
        }
        image.dimensions()?;
        Ok(avocado_palette())
    }
}

/// Memory cache whose writes fail for chosen keys
#[derive(Debug)]
pub struct FailingCache {
    inner: MemoryCache,
    failing: HashSet<String>,
    first_write_delay: Option<Duration>,
    writes: Mutex<Vec<String>>,
}

impl FailingCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new(1_000),
            failing: HashSet::new(),
            first_write_delay: None,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// Hold the first write back for `delay`, letting later writes overtake it
    pub fn with_slow_first_write(mut self, delay: Duration) -> Self {
        self.first_write_delay = Some(delay);
        self
    }

    /// Keys of every attempted write, in order
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }
}

impl Default for FailingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for FailingCache {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, body: Vec<u8>) -> CacheResult<()> {
        let first = {
            let mut writes = self.writes.lock();
            writes.push(key.to_string());
            writes.len() == 1
        };
        if let Some(delay) = self.first_write_delay.filter(|_| first) {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(key) {
            return Err(CacheError::io(
                key,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
            ));
        }
        self.inner.set(key, body).await
    }

    async fn unset(&self, key: &str) -> CacheResult<()> {
        self.inner.unset(key).await
    }
}
