use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Quality applied when the caller sends no usable settings document.
pub const DEFAULT_QUALITY: u8 = 85;

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

/// Target format requested by the caller. `Keep` re-encodes in the source
/// format where one of the lossy codecs applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Keep,
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Keep => "keep",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }
}

/// Per-request optimization settings, sent as a JSON document in the
/// `settings` multipart field.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OptimizationSettings {
    #[serde(default)]
    pub format: OutputFormat,

    /// Lossy-compression quality: 10 = smallest output, 100 = highest fidelity.
    #[serde(default = "default_quality")]
    #[validate(range(min = 10, max = 100))]
    pub quality: u8,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Keep,
            quality: DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl OptimizationSettings {
    /// Parses the raw `settings` field.
    ///
    /// Leniency policy: a missing, empty, or syntactically broken document
    /// falls back to the defaults. A well-formed JSON document with an
    /// unknown format or an out-of-range quality is rejected.
    pub fn from_raw(raw: Option<&str>) -> Result<Self, SettingsError> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Malformed settings JSON, falling back to defaults: {}", e);
                return Ok(Self::default());
            }
        };

        let settings: Self =
            serde_json::from_value(value).map_err(|e| SettingsError::Invalid(e.to_string()))?;
        settings
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        Ok(settings)
    }
}
