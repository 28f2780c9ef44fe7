//! Periodic chat feed command with a visible countdown

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{chat, pause, FeatureContext, FeatureError};

pub const FEED_COMMAND: &str = "/feed";

/// Countdown before the first command, seconds
pub const WARM_UP_SECS: u32 = 30;

/// Countdown between commands, seconds
pub const INTERVAL_SECS: RangeInclusive<u32> = 61..=70;

const TICK: Duration = Duration::from_secs(1);

pub async fn run(ctx: &FeatureContext) -> Result<(), FeatureError> {
    let mut rng = StdRng::from_entropy();
    let result = feed_loop(ctx, &mut rng).await;
    ctx.status.set_feed_countdown(None);
    result
}

async fn feed_loop(ctx: &FeatureContext, rng: &mut StdRng) -> Result<(), FeatureError> {
    let mut wait = WARM_UP_SECS;
    loop {
        if !countdown(ctx, wait).await {
            return Ok(());
        }

        chat::send_command(ctx.input.as_ref(), FEED_COMMAND, rng).await?;
        wait = rng.gen_range(INTERVAL_SECS);
        debug!(next_in_secs = wait, "feed command sent");
    }
}

/// Tick the displayed countdown once per second.
/// Returns false if the phase stopped before it reached zero.
async fn countdown(ctx: &FeatureContext, secs: u32) -> bool {
    for remaining in (1..=secs).rev() {
        ctx.status.set_feed_countdown(Some(remaining));
        if !pause(&ctx.run, TICK).await {
            return false;
        }
    }
    true
}
