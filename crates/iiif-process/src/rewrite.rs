//! Effective processing URIs
//!
//! Id/secret sources cannot be handed to a processor directly: their
//! derivatives live at a target computed per label and format. The rewriter
//! turns such a source into a rewrite URI pointing at that target. Every other
//! variant is processed as is.

use crate::error::ProcessError;
use crate::instructions::{Label, ResolvedInstructions};
use crate::uri::{rewrite_uri_string, IdSecretUri, TargetOptions, Uri};
use url::form_urlencoded;

/// Options used to derive the target of `label`
///
/// Always carries `label` and `format`; `original=1` is added only for the
/// label of the unmodified source.
#[must_use]
pub fn target_options(label: &Label, instructions: &ResolvedInstructions) -> TargetOptions {
    let mut opts = TargetOptions::new();
    opts.set("label", label.as_str());
    opts.set("format", instructions.format.as_str());

    if label.is_original() {
        opts.set("original", "1");
    }

    opts
}

/// Resolve the URI a processor should receive for `label`
///
/// # Errors
/// - `ProcessError::Rewrite` if the target cannot be derived or the rewrite
///   URI does not parse
pub fn effective_uri(
    source: &Uri,
    label: &Label,
    instructions: &ResolvedInstructions,
) -> Result<Uri, ProcessError> {
    match source {
        Uri::IdSecret(inner) => rewrite_idsecret(source, inner, label, instructions),
        Uri::File(_) | Uri::Rewrite(_) => Ok(source.clone()),
    }
}

fn rewrite_idsecret(
    source: &Uri,
    inner: &IdSecretUri,
    label: &Label,
    instructions: &ResolvedInstructions,
) -> Result<Uri, ProcessError> {
    let rewrite_error = |e| ProcessError::Rewrite {
        uri: source.to_string(),
        label: label.clone(),
        source: e,
    };

    let target = inner
        .target(&target_options(label, instructions))
        .map_err(rewrite_error)?;

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("target", &target)
        .finish();
    let raw = rewrite_uri_string(&format!("{}?{query}", source.origin()));
    let uri = Uri::parse(&raw).map_err(rewrite_error)?;

    tracing::trace!(source = %source, label = %label, target = %target, "rewrote processing uri");
    Ok(uri)
}
