//! Persistent SML settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compose::ComposerSettings;
use crate::error::Result;
use crate::payload::SmlVariant;

/// Default cap on cards shown by one `xloadcards` action.
pub const DEFAULT_MAX_CARDS: usize = 5;

/// Types never shown as cards when loading remote pages.
pub const DEFAULT_SKIP_TYPES: [&str; 5] = [
    "Organization",
    "NewsMediaOrganization",
    "WebSite",
    "BreadcrumbList",
    "WebPage",
];

/// Settings shared by the composer and the action dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmlSettings {
    /// Default layout for outgoing structured mail.
    pub variant: SmlVariant,
    /// Write the `Date` header in UTC (`+0000`).
    pub hide_timezone: bool,
    /// Plain-text body used when the caller supplies none.
    pub plain_text_fallback: String,
    /// Maximum number of cards rendered by one load action.
    pub max_cards: usize,
    /// `@type` values skipped when loading remote cards.
    pub skip_types: Vec<String>,
    /// Directory for shared files and calendar exports.
    pub temp_dir: PathBuf,
    /// User agent for remote fetches.
    pub user_agent: String,
}

impl Default for SmlSettings {
    fn default() -> Self {
        Self {
            variant: SmlVariant::default(),
            hide_timezone: false,
            plain_text_fallback: crate::compose::DEFAULT_PLAIN_TEXT.to_string(),
            max_cards: DEFAULT_MAX_CARDS,
            skip_types: DEFAULT_SKIP_TYPES.iter().map(ToString::to_string).collect(),
            temp_dir: default_temp_dir(),
            user_agent: concat!("structmail/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SmlSettings {
    /// Default settings file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("structmail")
            .join("settings.json")
    }

    /// Loads settings, falling back to defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let settings = serde_json::from_str(&contents)?;
                tracing::debug!("Settings loaded from {:?}", path);
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Saves settings as pretty JSON, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        tracing::info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Composer settings derived from these settings.
    #[must_use]
    pub fn composer_settings(&self) -> ComposerSettings {
        ComposerSettings {
            hide_timezone: self.hide_timezone,
            plain_text_fallback: self.plain_text_fallback.clone(),
        }
    }

    /// Checks whether cards of this type are skipped.
    #[must_use]
    pub fn skips_type(&self, kind: &str) -> bool {
        self.skip_types.iter().any(|skip| skip == kind)
    }
}

fn default_temp_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("structmail")
        .join("temp")
}
