//! One-shot AFK command shortly after automation starts

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::hotkey::NamedKey;

use super::{chat, pause, FeatureContext, FeatureError};

pub const AFK_COMMAND: &str = "/afk";

pub const AFK_DELAY: Duration = Duration::from_secs(5);

pub async fn run(ctx: &FeatureContext) -> Result<(), FeatureError> {
    if !pause(&ctx.run, AFK_DELAY).await {
        return Ok(());
    }

    let mut rng = StdRng::from_entropy();
    chat::type_text(ctx.input.as_ref(), AFK_COMMAND, None, &mut rng).await?;
    ctx.input.tap_key(NamedKey::Enter.into())?;
    debug!("afk command sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::context;
    use crate::hotkey::KeyToken;
    use crate::input::testing::{Action, RecordingInput};

    #[tokio::test(start_paused = true)]
    async fn test_sends_once_after_delay() {
        let input = RecordingInput::new();
        let ctx = context(input.clone());
        let start = tokio::time::Instant::now();

        run(&ctx).await.unwrap();

        let presses: Vec<KeyToken> = input
            .actions()
            .into_iter()
            .filter_map(|(_, a)| match a {
                Action::Press(k) => Some(k),
                _ => None,
            })
            .collect();
        let expected: Vec<KeyToken> = "/afk"
            .chars()
            .map(KeyToken::character)
            .chain([NamedKey::Enter.into()])
            .collect();
        assert_eq!(presses, expected);
        assert_eq!(start.elapsed(), AFK_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_delay_sends_nothing() {
        let input = RecordingInput::new();
        let ctx = context(input.clone());
        let stopper = ctx.run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            stopper.cancel();
        });

        run(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(input.actions().is_empty());
    }
}
