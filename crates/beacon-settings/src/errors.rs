//! Settings error type.

use thiserror::Error;

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Failure while loading or parsing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading the settings file failed.
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file or a merged layer could not be extracted.
    #[error("settings extraction failed: {0}")]
    Figment(#[from] figment::Error),

    /// A settings value could not be (de)serialized.
    #[error("settings json error: {0}")]
    Json(#[from] serde_json::Error),
}
