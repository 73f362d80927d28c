//! Derivative instructions
//!
//! An [`InstructionSet`] maps each [`Label`] to the IIIF parameters of one
//! derivative. Instructions are decoded with every field optional and
//! resolved against system defaults before use.

use crate::error::ProcessError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// Default IIIF region
pub const DEFAULT_REGION: &str = "full";
/// Default IIIF size
pub const DEFAULT_SIZE: &str = "full";
/// Default IIIF rotation
pub const DEFAULT_ROTATION: &str = "0";
/// Default IIIF quality
pub const DEFAULT_QUALITY: &str = "default";
/// Default output format
pub const DEFAULT_FORMAT: &str = "jpg";

/// Short identifier for one derivative slot
///
/// Labels end up in cache paths and query strings, so they may not be empty
/// and may not contain `/` or `?`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

/// Reason a string is not a valid [`Label`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("label is empty")]
    Empty,
    #[error("label {0:?} contains a reserved character")]
    ReservedCharacter(String),
}

impl Label {
    /// Label reserved for the unmodified source
    pub const ORIGINAL: &'static str = "o";

    /// Create a validated label
    ///
    /// # Errors
    /// - `LabelError` if the label is empty or contains `/` or `?`
    pub fn new(label: impl Into<String>) -> Result<Self, LabelError> {
        let label = label.into();
        if label.is_empty() {
            return Err(LabelError::Empty);
        }
        if label.contains(['/', '?']) {
            return Err(LabelError::ReservedCharacter(label));
        }
        Ok(Self(label))
    }

    /// The label of the unmodified source
    #[inline]
    #[must_use]
    pub fn original() -> Self {
        Self(Self::ORIGINAL.to_string())
    }

    /// Check if this label denotes the unmodified source
    #[inline]
    #[must_use]
    pub fn is_original(&self) -> bool {
        self.0 == Self::ORIGINAL
    }

    /// Get label text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

/// Parameters for one derivative, any of which may be unset
///
/// An empty string counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Instructions {
    /// Create instructions with nothing set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// With size
    #[inline]
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// With rotation
    #[inline]
    #[must_use]
    pub fn with_rotation(mut self, rotation: impl Into<String>) -> Self {
        self.rotation = Some(rotation.into());
        self
    }

    /// With quality
    #[inline]
    #[must_use]
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// With format
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Fill every unset field with its default
    #[must_use]
    pub fn ensure_defaults(&self) -> ResolvedInstructions {
        fn pick(value: Option<&String>, default: &str) -> String {
            value
                .filter(|v| !v.is_empty())
                .map_or_else(|| default.to_string(), Clone::clone)
        }

        ResolvedInstructions {
            region: pick(self.region.as_ref(), DEFAULT_REGION),
            size: pick(self.size.as_ref(), DEFAULT_SIZE),
            rotation: pick(self.rotation.as_ref(), DEFAULT_ROTATION),
            quality: pick(self.quality.as_ref(), DEFAULT_QUALITY),
            format: pick(self.format.as_ref(), DEFAULT_FORMAT),
        }
    }
}

/// Instructions with every field present
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedInstructions {
    pub region: String,
    pub size: String,
    pub rotation: String,
    pub quality: String,
    pub format: String,
}

impl Default for ResolvedInstructions {
    fn default() -> Self {
        Instructions::default().ensure_defaults()
    }
}

/// Keyed collection of derivative instructions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionSet(BTreeMap<Label, Instructions>);

impl InstructionSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the instructions for `label`
    #[inline]
    #[must_use]
    pub fn with(mut self, label: Label, instructions: Instructions) -> Self {
        self.0.insert(label, instructions);
        self
    }

    /// Instructions for `label`
    #[inline]
    #[must_use]
    pub fn get(&self, label: &Label) -> Option<&Instructions> {
        self.0.get(label)
    }

    /// Number of derivatives
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no derivatives
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode from JSON, e.g. `{"o": {"size": "full"}, "b": {"size": "!2048,1536"}}`
    ///
    /// # Errors
    /// - `ProcessError::InvalidInstructions` for malformed JSON or labels
    pub fn from_json(body: &[u8]) -> Result<Self, ProcessError> {
        serde_json::from_slice(body).map_err(|e| ProcessError::InvalidInstructions(e.to_string()))
    }

    /// Read and decode an instructions file
    ///
    /// # Errors
    /// - `ProcessError::Io` if the file cannot be read
    /// - `ProcessError::InvalidInstructions` if it does not decode
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProcessError> {
        let path = path.as_ref();
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| ProcessError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&body)
    }
}

impl FromIterator<(Label, Instructions)> for InstructionSet {
    fn from_iter<I: IntoIterator<Item = (Label, Instructions)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a InstructionSet {
    type Item = (&'a Label, &'a Instructions);
    type IntoIter = std::collections::btree_map::Iter<'a, Label, Instructions>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_validation() {
        assert!(Label::new("b").is_ok());
        assert_eq!(Label::new(""), Err(LabelError::Empty));
        assert!(matches!(
            Label::new("a/b"),
            Err(LabelError::ReservedCharacter(_))
        ));
        assert!(Label::new("a?b").is_err());
    }

    #[test]
    fn original_label() {
        assert!(Label::original().is_original());
        assert!(!Label::new("b").unwrap().is_original());
        assert_eq!(Label::original().as_str(), "o");
    }

    #[test]
    fn ensure_defaults_fills_unset_fields() {
        let resolved = Instructions::new().with_size("!2048,1536").ensure_defaults();

        assert_eq!(resolved.region, "full");
        assert_eq!(resolved.size, "!2048,1536");
        assert_eq!(resolved.rotation, "0");
        assert_eq!(resolved.quality, "default");
        assert_eq!(resolved.format, "jpg");
    }

    #[test]
    fn ensure_defaults_treats_empty_as_unset() {
        let resolved = Instructions::new().with_format("").ensure_defaults();
        assert_eq!(resolved.format, "jpg");
    }

    #[test]
    fn decodes_instruction_file() {
        let body = br#"{
            "o": {"size": "full", "format": "", "rotation": "-1"},
            "b": {"size": "!2048,1536", "format": "jpg"},
            "d": {"size": "full", "quality": "dither", "region": "-1,-1,320,320"}
        }"#;

        let set = InstructionSet::from_json(body).unwrap();
        assert_eq!(set.len(), 3);

        let d = set.get(&Label::new("d").unwrap()).unwrap();
        assert_eq!(d.region.as_deref(), Some("-1,-1,320,320"));
        assert_eq!(d.quality.as_deref(), Some("dither"));

        let o = set.get(&Label::original()).unwrap().ensure_defaults();
        assert_eq!(o.rotation, "-1");
        assert_eq!(o.format, "jpg");
    }

    #[test]
    fn rejects_invalid_label_in_json() {
        let result = InstructionSet::from_json(br#"{"a/b": {}}"#);
        assert!(matches!(result, Err(ProcessError::InvalidInstructions(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        let result = InstructionSet::from_json(b"[1, 2]");
        assert!(matches!(result, Err(ProcessError::InvalidInstructions(_))));
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let json = serde_json::to_string(&Instructions::new().with_size("full")).unwrap();
        assert_eq!(json, r#"{"size":"full"}"#);
    }
}
