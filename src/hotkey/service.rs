//! The long-lived hotkey task
//!
//! One task owns the listener supervisor, the matcher (and with it the set
//! of held keys) and the recorder. It routes key events, runs the watchdog
//! that restarts a dead listener, and hands toggles to the orchestrator
//! without ever blocking on it.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::StateEvent;
use crate::input::{KeyEvent, KeySource};
use crate::settings::SettingsHandle;
use crate::state::{ControlCommand, ListenerHealth, StatusBoard};

use super::chord::HotkeyChord;
use super::listener::{ListenerSupervisor, ListenerTimings};
use super::matcher::HotkeyMatcher;
use super::recorder::{HotkeyRecorder, RecordStep};

/// Hotkey text shown while recording, before the first key
pub const RECORDING_TEXT: &str = "Recording…";

/// Commands accepted by the hotkey service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCommand {
    /// Learn a new chord from the next keys pressed
    BeginRecording,
    /// Tear down and re-create the global key subscription
    RestartListener,
    /// The stored hotkey was changed elsewhere; pick it up
    ReloadHotkey,
    /// Stop the listener and exit
    Shutdown,
}

pub struct HotkeyService {
    supervisor: ListenerSupervisor,
    matcher: HotkeyMatcher,
    recorder: HotkeyRecorder,
    settings: SettingsHandle,
    status: Arc<StatusBoard>,
    control: mpsc::Sender<ControlCommand>,
    events: broadcast::Sender<StateEvent>,
    timings: ListenerTimings,
    key_rx: Option<mpsc::UnboundedReceiver<KeyEvent>>,
    retry_at: Option<Instant>,
    started_once: bool,
}

impl HotkeyService {
    pub fn new(
        source: Arc<dyn KeySource>,
        settings: SettingsHandle,
        status: Arc<StatusBoard>,
        control: mpsc::Sender<ControlCommand>,
        events: broadcast::Sender<StateEvent>,
        timings: ListenerTimings,
    ) -> Self {
        let chord = settings.hotkey();
        status.set_hotkey(chord.to_string());

        Self {
            supervisor: ListenerSupervisor::new(source, timings.probe),
            matcher: HotkeyMatcher::new(chord),
            recorder: HotkeyRecorder::new(),
            settings,
            status,
            control,
            events,
            timings,
            key_rx: None,
            retry_at: None,
            started_once: false,
        }
    }

    /// Run until `Shutdown` is received or every command sender is gone
    pub async fn run(mut self, mut commands: mpsc::Receiver<HotkeyCommand>) {
        info!(hotkey = %self.matcher.chord(), "hotkey service started");
        self.restart_listener().await;

        let period = self.timings.watchdog;
        let mut watchdog = tokio::time::interval_at(Instant::now() + period, period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = next_event(&mut self.key_rx) => match event {
                    Some(event) => self.handle_key(event),
                    None => {
                        debug!("key event channel closed");
                        self.key_rx = None;
                    }
                },

                command = commands.recv() => match command {
                    Some(HotkeyCommand::BeginRecording) => self.begin_recording(),
                    Some(HotkeyCommand::RestartListener) => self.restart_listener().await,
                    Some(HotkeyCommand::ReloadHotkey) => self.reload_hotkey(),
                    Some(HotkeyCommand::Shutdown) | None => break,
                },

                _ = watchdog.tick() => {
                    if !self.supervisor.is_alive() {
                        warn!("key listener is not alive, restarting");
                        self.restart_listener().await;
                    }
                }

                _ = sleep_until(self.retry_at) => {
                    self.retry_at = None;
                    self.restart_listener().await;
                }
            }
        }

        self.recorder.abort();
        self.supervisor.stop();
        self.status.set_listener(ListenerHealth::Stopped);
        info!("hotkey service stopped");
    }

    async fn restart_listener(&mut self) {
        if self.recorder.is_active() {
            // the chord was cleared when recording began and stays unset
            warn!("listener restarted during hotkey recording, recording aborted");
            self.recorder.abort();
            self.status.set_hotkey(self.matcher.chord().to_string());
        }

        self.key_rx = None;
        self.retry_at = None;
        self.matcher.reset();
        self.status.set_chord_matched(false);
        if self.started_once {
            self.status.set_listener(ListenerHealth::Restarting);
        }
        self.started_once = true;

        match self.supervisor.start().await {
            Ok(rx) => {
                self.key_rx = Some(rx);
                self.status.set_listener(ListenerHealth::Running);
                let _ = self.events.send(StateEvent::ListenerStarted);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_ms = self.timings.retry.as_millis() as u64,
                    "key listener failed to start"
                );
                self.status.set_listener(ListenerHealth::Stopped);
                self.retry_at = Some(Instant::now() + self.timings.retry);
                let _ = self.events.send(StateEvent::ListenerFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn handle_key(&mut self, event: KeyEvent) {
        // held keys are tracked even while recording; only firing is skipped
        let recording = self.recorder.is_active();
        match event {
            KeyEvent::Pressed(key) => {
                if self.matcher.on_press(key) && !recording {
                    self.dispatch_toggle();
                }
            }
            KeyEvent::Released(key) => self.matcher.on_release(key),
        }

        if recording {
            self.handle_recording(event);
        }
        self.status.set_chord_matched(self.matcher.is_matched());
    }

    fn dispatch_toggle(&self) {
        match self.control.try_send(ControlCommand::Toggle) {
            Ok(()) => debug!("toggle dispatched"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("orchestrator busy, toggle dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("orchestrator gone, toggle dropped");
            }
        }
    }

    fn begin_recording(&mut self) {
        info!("hotkey recording started");
        self.recorder.begin();
        self.matcher.set_chord(HotkeyChord::empty());
        self.status.set_chord_matched(false);
        self.status.set_hotkey(RECORDING_TEXT.to_string());
        let _ = self.events.send(StateEvent::RecordingStarted);
    }

    fn handle_recording(&mut self, event: KeyEvent) {
        let step = match event {
            KeyEvent::Pressed(key) => self.recorder.on_press(key),
            KeyEvent::Released(key) => self.recorder.on_release(key),
        };

        match step {
            RecordStep::Pending => {}
            RecordStep::Tentative(chord) => self.status.set_hotkey(chord.to_string()),
            RecordStep::Finished(chord) => {
                info!(hotkey = %chord, "hotkey recorded");
                let hotkey = chord.to_string();
                self.apply_chord(chord);
                let _ = self.events.send(StateEvent::HotkeyRecorded { hotkey });
            }
            RecordStep::Cancelled => {
                info!("hotkey recording cancelled, hotkey cleared");
                self.apply_chord(HotkeyChord::empty());
                let _ = self.events.send(StateEvent::RecordingCancelled);
            }
        }
    }

    /// Make `chord` the active hotkey and persist it
    fn apply_chord(&mut self, chord: HotkeyChord) {
        self.settings.set_hotkey(chord.clone());
        self.status.set_hotkey(chord.to_string());
        self.matcher.set_chord(chord);
        self.status.set_chord_matched(self.matcher.is_matched());
    }

    fn reload_hotkey(&mut self) {
        if self.recorder.is_active() {
            debug!("hotkey reload ignored while recording");
            return;
        }
        let chord = self.settings.hotkey();
        debug!(hotkey = %chord, "hotkey reloaded");
        self.status.set_hotkey(chord.to_string());
        self.matcher.set_chord(chord);
        self.status.set_chord_matched(self.matcher.is_matched());
    }
}

async fn next_event(rx: &mut Option<mpsc::UnboundedReceiver<KeyEvent>>) -> Option<KeyEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
