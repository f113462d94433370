//! One-time profile setup, gated by a marker file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::actions::{Action, ActionExecutor, ActionOutcome};
use crate::channels::Quiescent;
use crate::config::BotConfig;
use crate::error::{ActionError, Result, SetupError};

/// Marker recording that the profile was configured.
///
/// Only existence matters; the contents are informational.
#[derive(Debug, Clone)]
pub struct ProfileMarker {
    path: PathBuf,
}

impl ProfileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Create (or overwrite) the marker.
    pub async fn record(&self) -> std::result::Result<(), SetupError> {
        let contents = format!("configured {}\n", Utc::now().to_rfc3339());
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| SetupError::MarkerWrite {
                path: self.path.clone(),
                source,
            })
    }
}

/// What [`ProfileSetup::ensure`] did.
#[derive(Debug)]
pub enum SetupOutcome {
    /// Marker present; nothing executed.
    AlreadyConfigured,
    /// Profile updated and marker written.
    Configured,
    /// Profile update failed; marker left absent so the next start retries.
    UpdateFailed(ActionError),
}

/// Sets the bot's display name and about text once.
#[derive(Debug, Clone)]
pub struct ProfileSetup {
    marker: ProfileMarker,
    name: String,
    about: String,
}

impl ProfileSetup {
    pub fn new(marker: ProfileMarker, name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            marker,
            name: name.into(),
            about: about.into(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            ProfileMarker::new(config.marker_path.clone()),
            config.bot_name.clone(),
            config.bot_about.clone(),
        )
    }

    /// Run the profile update unless the marker says it already ran.
    pub async fn ensure(
        &self,
        idle: &Quiescent,
        executor: &dyn ActionExecutor,
    ) -> Result<SetupOutcome> {
        if self.marker.exists().await {
            return Ok(SetupOutcome::AlreadyConfigured);
        }

        let action = Action::UpdateProfile {
            name: self.name.clone(),
            about: self.about.clone(),
        };
        match executor.execute(idle, &action).await {
            ActionOutcome::Ok => {
                self.marker.record().await?;
                info!(marker = %self.marker.path().display(), "Bot profile configured");
                Ok(SetupOutcome::Configured)
            }
            ActionOutcome::Failed(e) => {
                warn!("Profile update failed, will retry on next start: {e}");
                Ok(SetupOutcome::UpdateFailed(e))
            }
        }
    }
}
