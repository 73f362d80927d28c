//! Source URIs
//!
//! A [`Uri`] names an origin image together with the driver variant used to
//! reach it. The variant is fixed when the string is parsed:
//!
//! - `avocado.png`, `file:///avocado.png` → [`Uri::File`]
//! - `idsecret:///avocado.png?id=1234&secret=s3cr3t&secret_o=0r1g` → [`Uri::IdSecret`]
//! - `rewrite:///avocado.png?target=123/4_s3cr3t_b.jpg` → [`Uri::Rewrite`]

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use url::form_urlencoded;

const FILE_SCHEME: &str = "file";
const IDSECRET_SCHEME: &str = "idsecret";
const REWRITE_SCHEME: &str = "rewrite";

/// URI parsing and target derivation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("empty uri")]
    Empty,

    #[error("unsupported uri scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing origin in {0}")]
    MissingOrigin(String),

    #[error("missing {param} parameter in {uri}")]
    MissingParameter { uri: String, param: &'static str },

    #[error("invalid id {0:?}")]
    InvalidId(String),

    #[error("missing {0} option")]
    MissingOption(&'static str),

    #[error("original requested but uri has no original secret")]
    MissingOriginalSecret,
}

/// Driver variant of a [`Uri`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriDriver {
    File,
    IdSecret,
    Rewrite,
}

impl UriDriver {
    /// Scheme name of this driver
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => FILE_SCHEME,
            Self::IdSecret => IDSECRET_SCHEME,
            Self::Rewrite => REWRITE_SCHEME,
        }
    }
}

impl Display for UriDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value options for target derivation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOptions(BTreeMap<String, String>);

impl TargetOptions {
    /// Create empty options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any previous value
    #[inline]
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Check if `key` is set
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Plain path to an origin image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileUri {
    origin: String,
}

impl FileUri {
    /// Create from an origin path
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

/// Origin addressed through an id and secret
///
/// Derivatives live at a target computed from the id, the secret (or the
/// original secret for the unmodified source), the label and the format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdSecretUri {
    origin: String,
    id: u64,
    secret: String,
    secret_o: Option<String>,
}

impl IdSecretUri {
    /// Create from parts
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, id: u64, secret: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            id,
            secret: secret.into(),
            secret_o: None,
        }
    }

    /// With secret for the unmodified source
    #[inline]
    #[must_use]
    pub fn with_original_secret(mut self, secret_o: impl Into<String>) -> Self {
        self.secret_o = Some(secret_o.into());
        self
    }

    /// Numeric id
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Derive the target path from `label`, `format` and `original` options
    ///
    /// # Errors
    /// - `UriError::MissingOption` if `label` or `format` is unset
    /// - `UriError::MissingOriginalSecret` if `original` is set but there is
    ///   no original secret
    pub fn target(&self, opts: &TargetOptions) -> Result<String, UriError> {
        let label = opts.get("label").ok_or(UriError::MissingOption("label"))?;
        let format = opts.get("format").ok_or(UriError::MissingOption("format"))?;

        let secret = if opts.contains("original") {
            self.secret_o
                .as_deref()
                .ok_or(UriError::MissingOriginalSecret)?
        } else {
            &self.secret
        };

        Ok(format!(
            "{}/{}_{}_{}.{}",
            id_tree(self.id),
            self.id,
            secret,
            label,
            format
        ))
    }

    fn parse(
        raw: &str,
        origin: String,
        query: &BTreeMap<String, String>,
    ) -> Result<Self, UriError> {
        let missing = |param| UriError::MissingParameter {
            uri: raw.to_string(),
            param,
        };

        let id = query.get("id").ok_or_else(|| missing("id"))?;
        let id = id.parse().map_err(|_| UriError::InvalidId(id.clone()))?;
        let secret = query.get("secret").ok_or_else(|| missing("secret"))?;

        Ok(Self {
            origin,
            id,
            secret: secret.clone(),
            secret_o: query.get("secret_o").cloned(),
        })
    }
}

/// Origin paired with an explicit derivative target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RewriteUri {
    origin: String,
    target: String,
}

impl RewriteUri {
    /// Create from origin and target
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            target: target.into(),
        }
    }
}

/// Source URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Uri {
    File(FileUri),
    IdSecret(IdSecretUri),
    Rewrite(RewriteUri),
}

impl Uri {
    /// Parse a URI string
    ///
    /// Strings without a recognised `scheme://` prefix are plain file paths.
    ///
    /// # Errors
    /// - `UriError` for empty input, unknown schemes, or missing parameters
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        if raw.is_empty() {
            return Err(UriError::Empty);
        }

        let Some((scheme, rest)) = split_scheme(raw) else {
            return Ok(Self::File(FileUri::new(raw)));
        };

        let rest = rest.strip_prefix('/').unwrap_or(rest);
        let (origin, query) = match rest.split_once('?') {
            Some((origin, query)) => (origin, query),
            None => (rest, ""),
        };

        if origin.is_empty() {
            return Err(UriError::MissingOrigin(raw.to_string()));
        }

        let query: BTreeMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        match scheme.to_ascii_lowercase().as_str() {
            FILE_SCHEME => Ok(Self::File(FileUri::new(origin))),
            IDSECRET_SCHEME => Ok(Self::IdSecret(IdSecretUri::parse(
                raw,
                origin.to_string(),
                &query,
            )?)),
            REWRITE_SCHEME => {
                let target = query.get("target").ok_or_else(|| UriError::MissingParameter {
                    uri: raw.to_string(),
                    param: "target",
                })?;
                Ok(Self::Rewrite(RewriteUri::new(origin, target.clone())))
            }
            other => Err(UriError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Driver variant
    #[inline]
    #[must_use]
    pub fn driver(&self) -> UriDriver {
        match self {
            Self::File(_) => UriDriver::File,
            Self::IdSecret(_) => UriDriver::IdSecret,
            Self::Rewrite(_) => UriDriver::Rewrite,
        }
    }

    /// Origin image path
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        match self {
            Self::File(u) => &u.origin,
            Self::IdSecret(u) => &u.origin,
            Self::Rewrite(u) => &u.origin,
        }
    }

    /// Path derivatives are written to
    ///
    /// File URIs target their origin and rewrite URIs their stored target;
    /// id/secret URIs derive one from `opts`.
    ///
    /// # Errors
    /// - `UriError` if an id/secret target cannot be derived
    pub fn target(&self, opts: &TargetOptions) -> Result<String, UriError> {
        match self {
            Self::File(u) => Ok(u.origin.clone()),
            Self::IdSecret(u) => u.target(opts),
            Self::Rewrite(u) => Ok(u.target.clone()),
        }
    }
}

impl Display for Uri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(u) => f.write_str(&u.origin),
            Self::IdSecret(u) => {
                let mut query = form_urlencoded::Serializer::new(String::new());
                query.append_pair("id", &u.id.to_string());
                query.append_pair("secret", &u.secret);
                if let Some(secret_o) = &u.secret_o {
                    query.append_pair("secret_o", secret_o);
                }
                write!(f, "{IDSECRET_SCHEME}:///{}?{}", u.origin, query.finish())
            }
            Self::Rewrite(u) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("target", &u.target)
                    .finish();
                write!(f, "{REWRITE_SCHEME}:///{}?{}", u.origin, query)
            }
        }
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Turn `<origin>?target=<target>` into a parseable rewrite URI string
#[inline]
#[must_use]
pub fn rewrite_uri_string(raw: &str) -> String {
    format!("{REWRITE_SCHEME}:///{}", raw.trim_start_matches('/'))
}

/// Split `scheme://rest`, ignoring strings whose prefix is not a scheme
fn split_scheme(raw: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = raw.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// `1234567` → `123/456/7`
fn id_tree(id: u64) -> String {
    let digits = id.to_string();
    digits
        .as_bytes()
        .chunks(3)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> TargetOptions {
        let mut opts = TargetOptions::new();
        for (k, v) in pairs {
            opts.set(*k, *v);
        }
        opts
    }

    #[test]
    fn bare_path_is_file_uri() {
        let uri = Uri::parse("avocado.png").unwrap();
        assert_eq!(uri.driver(), UriDriver::File);
        assert_eq!(uri.origin(), "avocado.png");
        assert_eq!(uri.to_string(), "avocado.png");
    }

    #[test]
    fn file_scheme_strips_root() {
        let uri = Uri::parse("file:///avocado.png").unwrap();
        assert_eq!(uri, Uri::File(FileUri::new("avocado.png")));
    }

    #[test]
    fn absolute_file_path_survives_scheme() {
        let uri = Uri::parse("file:////var/images/avocado.png").unwrap();
        assert_eq!(uri.origin(), "/var/images/avocado.png");
    }

    #[test]
    fn parses_idsecret_uri() {
        let uri =
            Uri::parse("idsecret:///avocado.png?id=1234567&secret=s3cr3t&secret_o=0r1g").unwrap();
        assert_eq!(uri.driver(), UriDriver::IdSecret);
        assert_eq!(uri.origin(), "avocado.png");

        let Uri::IdSecret(inner) = &uri else {
            panic!("expected idsecret uri");
        };
        assert_eq!(inner.id(), 1_234_567);
    }

    #[test]
    fn idsecret_requires_id_and_secret() {
        assert!(matches!(
            Uri::parse("idsecret:///avocado.png?secret=x"),
            Err(UriError::MissingParameter { param: "id", .. })
        ));
        assert!(matches!(
            Uri::parse("idsecret:///avocado.png?id=1"),
            Err(UriError::MissingParameter { param: "secret", .. })
        ));
        assert!(matches!(
            Uri::parse("idsecret:///avocado.png?id=abc&secret=x"),
            Err(UriError::InvalidId(_))
        ));
    }

    #[test]
    fn idsecret_target_uses_secret_and_id_tree() {
        let uri = IdSecretUri::new("avocado.png", 1_234_567, "s3cr3t").with_original_secret("0r1g");

        let target = uri.target(&opts(&[("label", "b"), ("format", "jpg")])).unwrap();
        assert_eq!(target, "123/456/7/1234567_s3cr3t_b.jpg");

        let original = uri
            .target(&opts(&[("label", "o"), ("format", "png"), ("original", "1")]))
            .unwrap();
        assert_eq!(original, "123/456/7/1234567_0r1g_o.png");
    }

    #[test]
    fn idsecret_target_errors() {
        let uri = IdSecretUri::new("avocado.png", 1, "s3cr3t");

        assert_eq!(
            uri.target(&opts(&[("format", "jpg")])),
            Err(UriError::MissingOption("label"))
        );
        assert_eq!(
            uri.target(&opts(&[("label", "o"), ("format", "jpg"), ("original", "1")])),
            Err(UriError::MissingOriginalSecret)
        );
    }

    #[test]
    fn rewrite_round_trip() {
        let raw = rewrite_uri_string("avocado.png?target=123/4_s3cr3t_b.jpg");
        assert_eq!(raw, "rewrite:///avocado.png?target=123/4_s3cr3t_b.jpg");

        let uri = Uri::parse(&raw).unwrap();
        assert_eq!(uri.driver(), UriDriver::Rewrite);
        assert_eq!(uri.origin(), "avocado.png");
        assert_eq!(uri.target(&TargetOptions::new()).unwrap(), "123/4_s3cr3t_b.jpg");

        assert_eq!(Uri::parse(&uri.to_string()).unwrap(), uri);
    }

    #[test]
    fn idsecret_display_round_trips() {
        let uri = Uri::IdSecret(IdSecretUri::new("a b.png", 42, "x+y").with_original_secret("z"));
        assert_eq!(Uri::parse(&uri.to_string()).unwrap(), uri);
    }

    #[test]
    fn rejects_unknown_scheme_and_empty() {
        assert_eq!(Uri::parse(""), Err(UriError::Empty));
        assert!(matches!(
            Uri::parse("s3://bucket/avocado.png"),
            Err(UriError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Uri::parse("rewrite:///?target=x"),
            Err(UriError::MissingOrigin(_))
        ));
    }

    #[test]
    fn id_tree_groups_digits() {
        assert_eq!(id_tree(7), "7");
        assert_eq!(id_tree(123), "123");
        assert_eq!(id_tree(1_234_567), "123/456/7");
    }
}
