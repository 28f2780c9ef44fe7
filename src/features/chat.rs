//! Typing chat commands

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;

use crate::hotkey::{KeyToken, NamedKey};
use crate::input::{InputError, InputPort};
use crate::settings::Bounds;

/// Key that opens the chat box
pub const OPEN_CHAT: KeyToken = KeyToken::Character('t');

/// Pause after opening chat and before submitting
pub const SETTLE: Duration = Duration::from_millis(200);

/// Per-character delay while typing a chat command, milliseconds
pub const KEYSTROKE_DELAY_MS: Bounds = Bounds { min: 50, max: 150 };

/// Tap each character of `text`, optionally waiting a random delay after each
pub async fn type_text(
    input: &dyn InputPort,
    text: &str,
    delay_ms: Option<Bounds>,
    rng: &mut StdRng,
) -> Result<(), InputError> {
    for c in text.chars() {
        input.tap_key(KeyToken::character(c))?;
        if let Some(bounds) = delay_ms {
            let ms = rng.gen_range(bounds.range());
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
    Ok(())
}

/// Open chat, type `command` with keystroke jitter, and submit
pub async fn send_command(
    input: &dyn InputPort,
    command: &str,
    rng: &mut StdRng,
) -> Result<(), InputError> {
    input.tap_key(OPEN_CHAT)?;
    tokio::time::sleep(SETTLE).await;
    type_text(input, command, Some(KEYSTROKE_DELAY_MS), rng).await?;
    tokio::time::sleep(SETTLE).await;
    input.tap_key(NamedKey::Enter.into())
}
