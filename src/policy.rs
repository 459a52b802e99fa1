//! Per-format processing exceptions.
//!
//! The exceptions table maps a MIME subtype (`jpeg`, `gif`, `svg+xml`) to a
//! list of flags that switch off parts of the pipeline for that format:
//!
//! | Flag | Effect |
//! |---|---|
//! | `disable_processing` | main file keeps its original encoding |
//! | `disable_responsive` | no responsive variants at all |
//! | `disable_processing_responsive` | variants are generated in the original encoding |
//!
//! A subtype with no entry gets full processing. That is the normal case,
//! not an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single exception flag as written in `upload.toml`.
///
/// The camelCase spellings used by older media-library configs are accepted
/// as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionFlag {
    #[serde(alias = "disableProcessing")]
    DisableProcessing,
    #[serde(alias = "disableResponsive")]
    DisableResponsive,
    #[serde(alias = "disableProcessingResponsive")]
    DisableProcessingResponsive,
}

impl ExceptionFlag {
    /// Spelling used in `upload.toml`.
    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionFlag::DisableProcessing => "disable_processing",
            ExceptionFlag::DisableResponsive => "disable_responsive",
            ExceptionFlag::DisableProcessingResponsive => "disable_processing_responsive",
        }
    }
}

/// Exceptions table keyed by MIME subtype.
pub type ExceptionTable = BTreeMap<String, Vec<ExceptionFlag>>;

/// Resolved processing decision for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatPolicy {
    pub skip_transcode: bool,
    pub skip_responsive: bool,
    pub responsive_keeps_original_format: bool,
}

impl FormatPolicy {
    /// Look up the flags for `subtype`. Subtype matching is case-insensitive.
    pub fn resolve(subtype: &str, exceptions: &ExceptionTable) -> Self {
        let flags = exceptions
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(subtype))
            .map(|(_, flags)| flags.as_slice())
            .unwrap_or_default();
        Self::from_flags(flags)
    }

    pub fn from_flags(flags: &[ExceptionFlag]) -> Self {
        Self {
            skip_transcode: flags.contains(&ExceptionFlag::DisableProcessing),
            skip_responsive: flags.contains(&ExceptionFlag::DisableResponsive),
            responsive_keeps_original_format: flags
                .contains(&ExceptionFlag::DisableProcessingResponsive),
        }
    }
}

/// The exceptions shipped in the stock configuration.
pub fn default_exceptions() -> ExceptionTable {
    use ExceptionFlag::*;
    BTreeMap::from([
        (
            "svg+xml".to_string(),
            vec![DisableProcessing, DisableResponsive],
        ),
        (
            "gif".to_string(),
            vec![DisableProcessing, DisableProcessingResponsive],
        ),
        ("jpeg".to_string(), vec![DisableProcessingResponsive]),
    ])
}
