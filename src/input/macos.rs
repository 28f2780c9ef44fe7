//! CoreGraphics input backend
//!
//! Global key events come from a listen-only CGEventTap running on a
//! dedicated thread with its own CFRunLoop. Synthetic input is posted as
//! CGEvents at the HID level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, CGKeyCode, CGMouseButton, EventField,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{InputError, InputPort, KeyEvent, KeySource, ListenerHandle};
use crate::hotkey::{KeyToken, NamedKey};

/// How long the listener thread runs its loop before checking the stop flag
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

fn event_source() -> Result<CGEventSource, InputError> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| InputError::EventSource)
}

/// Posts synthetic keyboard and pointer events
pub struct CgOutput;

impl CgOutput {
    /// Create the output, checking that an event source is available
    pub fn new() -> Result<Self, InputError> {
        event_source()?;
        Ok(Self)
    }

    fn post_key(&self, key: KeyToken, down: bool) -> Result<(), InputError> {
        let code = key_code(key).ok_or(InputError::UnmappedKey(key))?;
        let event = CGEvent::new_keyboard_event(event_source()?, code, down)
            .map_err(|_| InputError::Post("keyboard"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_mouse(
        &self,
        kind: CGEventType,
        button: CGMouseButton,
        at: CGPoint,
    ) -> Result<(), InputError> {
        let event = CGEvent::new_mouse_event(event_source()?, kind, at, button)
            .map_err(|_| InputError::Post("mouse"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl InputPort for CgOutput {
    fn press_key(&self, key: KeyToken) -> Result<(), InputError> {
        self.post_key(key, true)
    }

    fn release_key(&self, key: KeyToken) -> Result<(), InputError> {
        self.post_key(key, false)
    }

    fn click(&self) -> Result<(), InputError> {
        let (x, y) = self.pointer_position()?;
        let at = CGPoint::new(x, y);
        self.post_mouse(CGEventType::LeftMouseDown, CGMouseButton::Left, at)?;
        self.post_mouse(CGEventType::LeftMouseUp, CGMouseButton::Left, at)
    }

    fn pointer_position(&self) -> Result<(f64, f64), InputError> {
        let event = CGEvent::new(event_source()?).map_err(|_| InputError::Post("location"))?;
        let point = event.location();
        Ok((point.x, point.y))
    }

    fn set_pointer_position(&self, x: f64, y: f64) -> Result<(), InputError> {
        CGDisplay::warp_mouse_cursor_position(CGPoint::new(x, y))
            .map_err(|_| InputError::Post("pointer move"))
    }
}

/// Global key listener backed by CGEventTap
pub struct CgKeySource;

struct TapHandle {
    /// Cleared to ask the listener thread to exit
    running: Arc<AtomicBool>,
    /// Cleared by the listener thread when it exits
    alive: Arc<AtomicBool>,
}

impl ListenerHandle for TapHandle {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for TapHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl KeySource for CgKeySource {
    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<KeyEvent>,
    ) -> Result<Box<dyn ListenerHandle>, InputError> {
        let running = Arc::new(AtomicBool::new(true));
        let alive = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let thread_alive = Arc::clone(&alive);

        thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                info!("key listener thread started");

                if let Err(e) = run_event_loop(events, &thread_running) {
                    error!(?e, "key listener error");
                }

                thread_alive.store(false, Ordering::SeqCst);
                info!("key listener thread stopped");
            })
            .map_err(|e| InputError::ThreadSpawn(e.to_string()))?;

        Ok(Box::new(TapHandle { running, alive }))
    }
}

/// Run the CFRunLoop with the event tap until stopped or the tap is disabled
fn run_event_loop(
    events: mpsc::UnboundedSender<KeyEvent>,
    running: &AtomicBool,
) -> Result<(), InputError> {
    let disabled = Arc::new(AtomicBool::new(false));
    let tap_disabled = Arc::clone(&disabled);

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown | CGEventType::KeyUp | CGEventType::FlagsChanged => {
                if let Some(key_event) = translate(event_type, event) {
                    let _ = events.send(key_event);
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled");
                tap_disabled.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        callback,
    )
    .map_err(|_| InputError::EventTapCreation)?;

    tap.enable();

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| InputError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("event tap created and enabled");

    while running.load(Ordering::SeqCst) && !disabled.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }
    }

    debug!(disabled = disabled.load(Ordering::SeqCst), "event loop exiting");
    Ok(())
}

/// Convert a tap event into a key event
fn translate(event_type: CGEventType, event: &CGEvent) -> Option<KeyEvent> {
    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as CGKeyCode;
    let key = key_token(code)?;

    match event_type {
        CGEventType::KeyDown => Some(KeyEvent::Pressed(key)),
        CGEventType::KeyUp => Some(KeyEvent::Released(key)),
        _ => {
            // modifier: pressed iff its flag is now set
            let flag = modifier_flag(code)?;
            if event.get_flags().contains(flag) {
                Some(KeyEvent::Pressed(key))
            } else {
                Some(KeyEvent::Released(key))
            }
        }
    }
}

fn modifier_flag(code: CGKeyCode) -> Option<CGEventFlags> {
    match code {
        56 | 60 => Some(CGEventFlags::CGEventFlagShift),
        59 | 62 => Some(CGEventFlags::CGEventFlagControl),
        58 | 61 => Some(CGEventFlags::CGEventFlagAlternate),
        55 | 54 => Some(CGEventFlags::CGEventFlagCommand),
        57 => Some(CGEventFlags::CGEventFlagAlphaShift),
        _ => None,
    }
}

/// ANSI layout virtual key codes for character keys
const CHAR_CODES: &[(char, CGKeyCode)] = &[
    ('a', 0), ('s', 1), ('d', 2), ('f', 3), ('h', 4), ('g', 5), ('z', 6), ('x', 7),
    ('c', 8), ('v', 9), ('b', 11), ('q', 12), ('w', 13), ('e', 14), ('r', 15),
    ('y', 16), ('t', 17), ('1', 18), ('2', 19), ('3', 20), ('4', 21), ('6', 22),
    ('5', 23), ('=', 24), ('9', 25), ('7', 26), ('-', 27), ('8', 28), ('0', 29),
    (']', 30), ('o', 31), ('u', 32), ('[', 33), ('i', 34), ('p', 35), ('l', 37),
    ('j', 38), ('\'', 39), ('k', 40), (';', 41), ('\\', 42), (',', 43), ('/', 44),
    ('n', 45), ('m', 46), ('.', 47), ('`', 50),
];

const NAMED_CODES: &[(NamedKey, CGKeyCode)] = &[
    (NamedKey::Enter, 36),
    (NamedKey::Tab, 48),
    (NamedKey::Space, 49),
    (NamedKey::Backspace, 51),
    (NamedKey::Esc, 53),
    (NamedKey::Cmd, 55),
    (NamedKey::Shift, 56),
    (NamedKey::CapsLock, 57),
    (NamedKey::Alt, 58),
    (NamedKey::Ctrl, 59),
    (NamedKey::F(5), 96),
    (NamedKey::F(6), 97),
    (NamedKey::F(7), 98),
    (NamedKey::F(3), 99),
    (NamedKey::F(8), 100),
    (NamedKey::F(9), 101),
    (NamedKey::F(11), 103),
    (NamedKey::F(10), 109),
    (NamedKey::F(12), 111),
    (NamedKey::F(4), 118),
    (NamedKey::F(2), 120),
    (NamedKey::F(1), 122),
    (NamedKey::Left, 123),
    (NamedKey::Right, 124),
    (NamedKey::Down, 125),
    (NamedKey::Up, 126),
];

fn key_code(key: KeyToken) -> Option<CGKeyCode> {
    match key {
        KeyToken::Named(named) => NAMED_CODES
            .iter()
            .find(|(k, _)| *k == named)
            .map(|(_, code)| *code),
        KeyToken::Character(c) => CHAR_CODES
            .iter()
            .find(|(k, _)| *k == c)
            .map(|(_, code)| *code),
    }
}

fn key_token(code: CGKeyCode) -> Option<KeyToken> {
    // right-hand modifiers report as their left-hand key
    let code = match code {
        60 => 56,
        62 => 59,
        61 => 58,
        54 => 55,
        other => other,
    };
    NAMED_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(k, _)| KeyToken::Named(*k))
        .or_else(|| {
            CHAR_CODES
                .iter()
                .find(|(_, c)| *c == code)
                .map(|(k, _)| KeyToken::Character(*k))
        })
}
