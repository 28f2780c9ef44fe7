//! Test doubles for the input traits

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{InputError, InputPort, KeyEvent, KeySource, ListenerHandle};
use crate::hotkey::KeyToken;

/// One action performed on a [`RecordingInput`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Press(KeyToken),
    Release(KeyToken),
    Click,
    Move(f64, f64),
}

/// InputPort that records every action with the (tokio) time it happened
#[derive(Debug)]
pub struct RecordingInput {
    actions: Mutex<Vec<(Instant, Action)>>,
    pointer: Mutex<(f64, f64)>,
}

impl RecordingInput {
    pub fn new() -> Arc<Self> {
        Self::with_pointer(100.0, 100.0)
    }

    pub fn with_pointer(x: f64, y: f64) -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(Vec::new()),
            pointer: Mutex::new((x, y)),
        })
    }

    pub fn actions(&self) -> Vec<(Instant, Action)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<Instant> {
        self.actions()
            .into_iter()
            .filter(|(_, a)| matches!(a, Action::Click))
            .map(|(t, _)| t)
            .collect()
    }

    pub fn presses_of(&self, key: KeyToken) -> Vec<Instant> {
        self.actions()
            .into_iter()
            .filter(|(_, a)| *a == Action::Press(key))
            .map(|(t, _)| t)
            .collect()
    }

    pub fn releases_of(&self, key: KeyToken) -> Vec<Instant> {
        self.actions()
            .into_iter()
            .filter(|(_, a)| *a == Action::Release(key))
            .map(|(t, _)| t)
            .collect()
    }

    /// Keys pressed and not yet released
    pub fn held_keys(&self) -> Vec<KeyToken> {
        let mut held = Vec::new();
        for (_, action) in self.actions() {
            match action {
                Action::Press(k) if !held.contains(&k) => held.push(k),
                Action::Release(k) => held.retain(|h| *h != k),
                _ => {}
            }
        }
        held
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push((Instant::now(), action));
    }
}

impl InputPort for RecordingInput {
    fn press_key(&self, key: KeyToken) -> Result<(), InputError> {
        self.record(Action::Press(key));
        Ok(())
    }

    fn release_key(&self, key: KeyToken) -> Result<(), InputError> {
        self.record(Action::Release(key));
        Ok(())
    }

    fn click(&self) -> Result<(), InputError> {
        self.record(Action::Click);
        Ok(())
    }

    fn pointer_position(&self) -> Result<(f64, f64), InputError> {
        Ok(*self.pointer.lock().unwrap())
    }

    fn set_pointer_position(&self, x: f64, y: f64) -> Result<(), InputError> {
        *self.pointer.lock().unwrap() = (x, y);
        self.record(Action::Move(x, y));
        Ok(())
    }
}

/// KeySource whose subscriptions are driven by the test
///
/// Each successful subscription is recorded; the test can inject events into
/// the latest one, kill it, or make the next subscriptions fail.
#[derive(Debug, Default)]
pub struct ScriptedKeySource {
    subscriptions: Mutex<Vec<Subscription>>,
    failures_left: AtomicUsize,
    start_dead: AtomicBool,
}

#[derive(Debug)]
struct Subscription {
    events: mpsc::UnboundedSender<KeyEvent>,
    alive: Arc<AtomicBool>,
}

struct ScriptedHandle {
    alive: Arc<AtomicBool>,
}

impl ListenerHandle for ScriptedHandle {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl ScriptedKeySource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` subscribe calls return an error
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Make subscriptions come up dead until cleared
    pub fn set_start_dead(&self, dead: bool) {
        self.start_dead.store(dead, Ordering::SeqCst);
    }

    /// Number of successful subscribe calls so far
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// Whether the latest subscription is alive
    pub fn latest_alive(&self) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .last()
            .is_some_and(|s| s.alive.load(Ordering::SeqCst))
    }

    /// Kill the latest subscription as if the platform listener died
    pub fn kill_latest(&self) {
        if let Some(sub) = self.subscriptions.lock().unwrap().last() {
            sub.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Deliver an event on the latest live subscription
    pub fn send(&self, event: KeyEvent) {
        let subs = self.subscriptions.lock().unwrap();
        if let Some(sub) = subs.last() {
            if sub.alive.load(Ordering::SeqCst) {
                let _ = sub.events.send(event);
            }
        }
    }

    pub fn press(&self, key: KeyToken) {
        self.send(KeyEvent::Pressed(key));
    }

    pub fn release(&self, key: KeyToken) {
        self.send(KeyEvent::Released(key));
    }
}

impl KeySource for ScriptedKeySource {
    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<KeyEvent>,
    ) -> Result<Box<dyn ListenerHandle>, InputError> {
        let pending = self.failures_left.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_left.store(pending - 1, Ordering::SeqCst);
            return Err(InputError::EventTapCreation);
        }

        let alive = Arc::new(AtomicBool::new(!self.start_dead.load(Ordering::SeqCst)));
        self.subscriptions.lock().unwrap().push(Subscription {
            events,
            alive: Arc::clone(&alive),
        });
        Ok(Box::new(ScriptedHandle { alive }))
    }
}
