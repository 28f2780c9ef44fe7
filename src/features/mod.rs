//! Feature loops started and stopped together by the orchestrator
//!
//! Every loop runs while its phase token is live: one unit of work, then a
//! cancellable wait. A stop takes effect at the next wait, never in the
//! middle of a key press/release pair.

mod afk;
mod chat;
mod clicking;
mod feed;
mod walk;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::StateEvent;
use crate::input::{InputError, InputPort};
use crate::settings::{Settings, SettingsError, SettingsHandle};
use crate::state::StatusBoard;

/// The independent timed behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Continuous clicking, plain or circular
    Clicking,
    /// Periodic chat feed command
    Feed,
    /// One-shot AFK command
    Afk,
    /// Randomized walk-key tapping
    Walk,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Clicking => write!(f, "clicking"),
            Feature::Feed => write!(f, "feed"),
            Feature::Afk => write!(f, "afk"),
            Feature::Walk => write!(f, "walk"),
        }
    }
}

impl Feature {
    /// Features to run for `settings`. Clicking always runs.
    pub fn enabled(settings: &Settings) -> Vec<Feature> {
        let mut features = vec![Feature::Clicking];
        if settings.feed {
            features.push(Feature::Feed);
        }
        if settings.afk {
            features.push(Feature::Afk);
        }
        if settings.walk {
            features.push(Feature::Walk);
        }
        features
    }

    /// Restore this feature's numeric settings to defaults
    fn reset_settings(self, settings: &mut Settings) {
        match self {
            Feature::Clicking => settings.reset_click(),
            Feature::Walk => settings.reset_walk(),
            Feature::Feed | Feature::Afk => {}
        }
    }
}

/// Errors that end a feature loop early
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Everything a feature loop needs for one Running phase
#[derive(Clone)]
pub struct FeatureContext {
    pub input: Arc<dyn InputPort>,
    pub status: Arc<StatusBoard>,
    /// Cancelled when the phase stops
    pub run: CancellationToken,
}

/// Wait for `duration` unless the phase stops first.
/// Returns whether the phase is still running afterwards.
pub(crate) async fn pause(run: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = run.cancelled() => false,
        _ = tokio::time::sleep(duration) => !run.is_cancelled(),
    }
}

/// Run one feature loop to completion, recovering from its errors.
///
/// Invalid settings reset the feature's settings to defaults (persisted);
/// other failures are logged. Neither affects the other loops.
pub async fn run(
    feature: Feature,
    ctx: FeatureContext,
    settings: SettingsHandle,
    events: broadcast::Sender<StateEvent>,
) {
    debug!(%feature, "feature loop starting");
    let snapshot = settings.snapshot();

    let result = match feature {
        Feature::Clicking => clicking::run(&ctx, &snapshot).await,
        Feature::Feed => feed::run(&ctx).await,
        Feature::Afk => afk::run(&ctx).await,
        Feature::Walk => walk::run(&ctx, &snapshot).await,
    };

    match result {
        Ok(()) => info!(%feature, "feature loop finished"),
        Err(FeatureError::Settings(e)) => {
            warn!(%feature, error = %e, "invalid settings, restoring defaults");
            settings.update(|s| feature.reset_settings(s));
            let _ = events.send(StateEvent::SettingsReset { feature });
        }
        Err(e) => {
            warn!(%feature, error = %e, "feature loop failed");
            let _ = events.send(StateEvent::FeatureExited {
                feature,
                reason: e.to_string(),
            });
        }
    }
}
