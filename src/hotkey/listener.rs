//! Supervision of the global key subscription
//!
//! The supervisor owns at most one live subscription. Starting it tears the
//! previous one down, subscribes again and samples liveness after a short
//! probe so a tap that dies immediately is reported as a startup failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::input::{InputError, KeyEvent, KeySource, ListenerHandle};

/// Timers driving listener supervision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerTimings {
    /// Period of the liveness check
    pub watchdog: Duration,
    /// Wait after subscribing before sampling liveness
    pub probe: Duration,
    /// Delay before retrying a failed start
    pub retry: Duration,
}

impl Default for ListenerTimings {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(5),
            probe: Duration::from_millis(200),
            retry: Duration::from_secs(1),
        }
    }
}

/// Errors that can occur when starting the key listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to subscribe to key events: {0}")]
    Subscribe(#[from] InputError),

    #[error("key listener died during startup")]
    DiedOnStartup,
}

/// Keeps one global key subscription alive
pub struct ListenerSupervisor {
    source: Arc<dyn KeySource>,
    handle: Option<Box<dyn ListenerHandle>>,
    probe: Duration,
}

impl ListenerSupervisor {
    pub fn new(source: Arc<dyn KeySource>, probe: Duration) -> Self {
        Self {
            source,
            handle: None,
            probe,
        }
    }

    /// Replace the current subscription with a fresh one.
    ///
    /// Returns the receiving end of the new subscription's events once the
    /// listener has survived the probe interval.
    pub async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<KeyEvent>, ListenerError> {
        self.stop();

        let (tx, rx) = mpsc::unbounded_channel();
        self.handle = Some(self.source.subscribe(tx)?);

        tokio::time::sleep(self.probe).await;
        if !self.is_alive() {
            self.stop();
            return Err(ListenerError::DiedOnStartup);
        }

        info!("key listener started");
        Ok(rx)
    }

    /// Whether a subscription exists and is still delivering events
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_alive())
    }

    /// Tear down the current subscription, if any
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
            debug!("key listener stopped");
        }
    }
}

impl Drop for ListenerSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::NamedKey;
    use crate::input::testing::ScriptedKeySource;

    #[tokio::test(start_paused = true)]
    async fn test_start_delivers_events() {
        let source = ScriptedKeySource::new();
        let mut supervisor = ListenerSupervisor::new(source.clone(), Duration::from_millis(200));

        let mut rx = supervisor.start().await.unwrap();
        assert!(supervisor.is_alive());

        source.press(NamedKey::Space.into());
        assert_eq!(rx.recv().await, Some(KeyEvent::Pressed(NamedKey::Space.into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_stops_previous_subscription() {
        let source = ScriptedKeySource::new();
        let mut supervisor = ListenerSupervisor::new(source.clone(), Duration::from_millis(200));

        let _first = supervisor.start().await.unwrap();
        let _second = supervisor.start().await.unwrap();
        assert_eq!(source.subscription_count(), 2);
        assert!(source.latest_alive());

        supervisor.stop();
        assert!(!source.latest_alive());
        assert!(!supervisor.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_failure() {
        let source = ScriptedKeySource::new();
        source.fail_next(1);
        let mut supervisor = ListenerSupervisor::new(source.clone(), Duration::from_millis(200));

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, ListenerError::Subscribe(InputError::EventTapCreation)));
        assert!(!supervisor.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_on_probe() {
        let source = ScriptedKeySource::new();
        source.set_start_dead(true);
        let mut supervisor = ListenerSupervisor::new(source.clone(), Duration::from_millis(200));

        let start = tokio::time::Instant::now();
        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, ListenerError::DiedOnStartup));
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }
}
