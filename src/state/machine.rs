//! Automation orchestrator
//!
//! Two states, Idle and Running. Entering Running spawns one task per enabled
//! feature under a fresh cancellation token; leaving it cancels the token and
//! waits for every loop to finish, so two Running phases never overlap.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::StateEvent;
use crate::features::{self, Feature, FeatureContext};
use crate::hotkey::HotkeyCommand;
use crate::input::InputPort;
use crate::settings::SettingsHandle;

use super::status::StatusBoard;

/// The two states of the orchestrator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// No feature loops running, waiting for a toggle
    #[default]
    Idle,
    /// Feature loops are running
    Running,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Running => write!(f, "Running"),
        }
    }
}

/// Commands accepted by the orchestrator, processed one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Idle to Running, or Running to Idle
    Toggle,
    /// Enter Running; ignored when already running
    Start,
    /// Enter Idle; ignored when already idle
    Stop,
}

/// One Running phase
struct Phase {
    run: CancellationToken,
    tasks: JoinSet<()>,
    started_at: Instant,
}

/// Starts and stops the feature loops together
pub struct AutomationOrchestrator {
    state: State,
    phase: Option<Phase>,
    input: Arc<dyn InputPort>,
    settings: SettingsHandle,
    status: Arc<StatusBoard>,
    events: broadcast::Sender<StateEvent>,
    /// Used to request a fresh key listener after every stop
    hotkey: mpsc::Sender<HotkeyCommand>,
}

impl AutomationOrchestrator {
    pub fn new(
        input: Arc<dyn InputPort>,
        settings: SettingsHandle,
        status: Arc<StatusBoard>,
        events: broadcast::Sender<StateEvent>,
        hotkey: mpsc::Sender<HotkeyCommand>,
    ) -> Self {
        Self {
            state: State::Idle,
            phase: None,
            input,
            settings,
            status,
            events,
            hotkey,
        }
    }

    /// Get the current state
    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    /// Process commands until `shutdown` fires or every sender is gone,
    /// then force Idle
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ControlCommand>,
        shutdown: CancellationToken,
    ) {
        info!("orchestrator started in Idle state");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }

        self.shutdown().await;
        info!("orchestrator stopped");
    }

    pub async fn handle(&mut self, command: ControlCommand) {
        debug!(?command, state = %self.state, "control command");
        match command {
            ControlCommand::Toggle => self.toggle().await,
            ControlCommand::Start => self.start(),
            ControlCommand::Stop => self.stop().await,
        }
    }

    pub async fn toggle(&mut self) {
        match self.state {
            State::Idle => self.start(),
            State::Running => self.stop().await,
        }
    }

    /// Spawn one loop per enabled feature
    pub fn start(&mut self) {
        if self.state == State::Running {
            debug!("already running, start ignored");
            return;
        }

        let settings = self.settings.snapshot();
        let enabled = Feature::enabled(&settings);
        let run = CancellationToken::new();
        let ctx = FeatureContext {
            input: Arc::clone(&self.input),
            status: Arc::clone(&self.status),
            run: run.clone(),
        };

        let mut tasks = JoinSet::new();
        for feature in &enabled {
            tasks.spawn(features::run(
                *feature,
                ctx.clone(),
                self.settings.clone(),
                self.events.clone(),
            ));
        }

        self.phase = Some(Phase {
            run,
            tasks,
            started_at: Instant::now(),
        });
        self.status.set_running(true);
        self.transition_to(State::Running, 0);

        let _ = self.events.send(StateEvent::AutomationStarted { features: enabled });
    }

    /// Stop every loop and request a fresh key listener
    pub async fn stop(&mut self) {
        if self.halt().await {
            if let Err(e) = self.hotkey.send(HotkeyCommand::RestartListener).await {
                warn!(?e, "could not request key listener restart");
            }
        }
    }

    /// Force Idle without restarting the listener
    pub async fn shutdown(&mut self) {
        self.halt().await;
    }

    /// Cancel the current phase and wait for its loops. Returns whether a
    /// phase was running.
    async fn halt(&mut self) -> bool {
        let Some(mut phase) = self.phase.take() else {
            debug!("already idle, stop ignored");
            return false;
        };

        phase.run.cancel();
        self.status.set_running(false);

        while let Some(result) = phase.tasks.join_next().await {
            if let Err(e) = result {
                error!(?e, "feature task panicked");
            }
        }

        self.status.reset_display();
        let duration_ms = phase.started_at.elapsed().as_millis() as u64;
        self.transition_to(State::Idle, duration_ms);

        let _ = self.events.send(StateEvent::AutomationStopped { duration_ms });
        true
    }

    fn transition_to(&mut self, new_state: State, duration_ms: u64) {
        info!(
            from = %self.state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );
        self.state = new_state;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::input::testing::RecordingInput;
    use crate::settings::MemoryStore;

    struct Harness {
        orchestrator: AutomationOrchestrator,
        input: Arc<RecordingInput>,
        status: Arc<StatusBoard>,
        events: broadcast::Receiver<StateEvent>,
        hotkey: mpsc::Receiver<HotkeyCommand>,
    }

    fn create_orchestrator(pairs: &[(&str, &str)]) -> Harness {
        let store = Arc::new(MemoryStore::with_pairs(pairs));
        let settings = SettingsHandle::load(store);
        let input = RecordingInput::new();
        let status = StatusBoard::new();
        let (events_tx, events) = broadcast::channel(32);
        let (hotkey_tx, hotkey) = mpsc::channel(8);

        let orchestrator = AutomationOrchestrator::new(
            input.clone(),
            settings,
            status.clone(),
            events_tx,
            hotkey_tx,
        );
        Harness {
            orchestrator,
            input,
            status,
            events,
            hotkey,
        }
    }

    #[test]
    fn test_initial_state() {
        let h = create_orchestrator(&[]);
        assert_eq!(h.orchestrator.state(), State::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_starts_clicking() {
        let mut h = create_orchestrator(&[]);

        h.orchestrator.toggle().await;
        assert_eq!(h.orchestrator.state(), State::Running);
        assert!(h.status.snapshot().running);
        assert_eq!(
            h.events.try_recv().unwrap(),
            StateEvent::AutomationStarted {
                features: vec![Feature::Clicking]
            }
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!h.input.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_features_all_start() {
        let mut h = create_orchestrator(&[("feed", "true"), ("afk", "true"), ("walk", "true")]);

        h.orchestrator.start();
        assert_eq!(
            h.events.try_recv().unwrap(),
            StateEvent::AutomationStarted {
                features: vec![Feature::Clicking, Feature::Feed, Feature::Afk, Feature::Walk]
            }
        );
        h.orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_twice_stops_and_restarts_listener() {
        let mut h = create_orchestrator(&[]);

        h.orchestrator.toggle().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.orchestrator.toggle().await;
        let stopped_at = tokio::time::Instant::now();

        assert_eq!(h.orchestrator.state(), State::Idle);
        let status = h.status.snapshot();
        assert!(!status.running);
        assert_eq!(status.click_delay_ms, 0);
        assert_eq!(status.feed_countdown_text(), "--");
        assert_eq!(h.hotkey.try_recv(), Ok(HotkeyCommand::RestartListener));

        let _started = h.events.try_recv().unwrap();
        assert_eq!(
            h.events.try_recv().unwrap(),
            StateEvent::AutomationStopped { duration_ms: 1500 }
        );

        // the loops were awaited, nothing clicks afterwards
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.input.clicks().iter().all(|t| *t <= stopped_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_does_not_restart_listener() {
        let mut h = create_orchestrator(&[]);

        h.orchestrator.start();
        h.orchestrator.shutdown().await;
        assert_eq!(h.orchestrator.state(), State::Idle);
        assert!(h.hotkey.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redundant_commands_are_ignored() {
        let mut h = create_orchestrator(&[]);

        h.orchestrator.stop().await;
        assert!(h.hotkey.try_recv().is_err());
        assert!(h.events.try_recv().is_err());

        h.orchestrator.start();
        h.orchestrator.start();
        assert_eq!(h.orchestrator.state(), State::Running);
        let _started = h.events.try_recv().unwrap();
        assert!(h.events.try_recv().is_err());
        h.orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_toggles_never_overlap() {
        let h = create_orchestrator(&[]);
        let mut events = h.events;
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(h.orchestrator.run(rx, shutdown.clone()));

        for _ in 0..3 {
            tx.send(ControlCommand::Toggle).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.status.snapshot().running);

        shutdown.cancel();
        task.await.unwrap();
        assert!(!h.status.snapshot().running);

        let kinds: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| match e {
                StateEvent::AutomationStarted { .. } => "started",
                StateEvent::AutomationStopped { .. } => "stopped",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["started", "stopped", "started", "stopped"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_settings_do_not_stop_other_loops() {
        let mut h = create_orchestrator(&[("walk", "true"), ("walk_min", "x")]);

        h.orchestrator.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.orchestrator.state(), State::Running);
        assert!(!h.input.clicks().is_empty());

        let _started = h.events.try_recv().unwrap();
        assert_eq!(
            h.events.try_recv().unwrap(),
            StateEvent::SettingsReset {
                feature: Feature::Walk
            }
        );
        h.orchestrator.shutdown().await;
    }
}
