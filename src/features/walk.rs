//! Randomized walk-key tapping
//!
//! Each cycle presses one opposing pair, forward/back or left/right, in a
//! random order so the key sequence has no fixed pattern.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::hotkey::KeyToken;
use crate::input::InputPort;
use crate::settings::{Bounds, Settings};

use super::{pause, FeatureContext, FeatureError};

pub const FORWARD_BACK: [KeyToken; 2] = [KeyToken::Character('w'), KeyToken::Character('s')];

pub const LEFT_RIGHT: [KeyToken; 2] = [KeyToken::Character('a'), KeyToken::Character('d')];

/// Pause between releasing the first key and pressing the second
pub const BETWEEN_KEYS: Duration = Duration::from_millis(100);

pub async fn run(ctx: &FeatureContext, settings: &Settings) -> Result<(), FeatureError> {
    let params = settings.walk_params()?;
    let interval_ms = Bounds {
        min: params.interval_secs.min.saturating_mul(1000),
        max: params.interval_secs.max.saturating_mul(1000),
    };
    let mut rng = StdRng::from_entropy();

    info!(
        min_secs = params.interval_secs.min,
        max_secs = params.interval_secs.max,
        "walk loop started"
    );

    loop {
        let wait = Duration::from_millis(rng.gen_range(interval_ms.range()));
        if !pause(&ctx.run, wait).await {
            return Ok(());
        }

        let [first, second] = choose_pair(&mut rng);
        debug!(first = %first, second = %second, "walking");
        hold(ctx.input.as_ref(), first, params.hold_ms, &mut rng).await?;
        tokio::time::sleep(BETWEEN_KEYS).await;
        hold(ctx.input.as_ref(), second, params.hold_ms, &mut rng).await?;
    }
}

/// Pick one of the opposing pairs, in either order
fn choose_pair(rng: &mut StdRng) -> [KeyToken; 2] {
    let mut pair = if rng.gen_bool(0.5) {
        FORWARD_BACK
    } else {
        LEFT_RIGHT
    };
    if rng.gen_bool(0.5) {
        pair.reverse();
    }
    pair
}

/// Press `key`, keep it down for a random duration, release it.
/// The hold is not cut short by a stop so the key is never left down.
async fn hold(
    input: &dyn InputPort,
    key: KeyToken,
    hold_ms: Bounds,
    rng: &mut StdRng,
) -> Result<(), FeatureError> {
    input.press_key(key)?;
    let held = Duration::from_millis(rng.gen_range(hold_ms.range()));
    tokio::time::sleep(held).await;
    input.release_key(key)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::context;
    use crate::input::testing::{Action, RecordingInput};
    use std::collections::HashSet;

    #[test]
    fn test_choose_pair_covers_all_orders() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<[KeyToken; 2]> = (0..200).map(|_| choose_pair(&mut rng)).collect();
        assert_eq!(seen.len(), 4);
        for pair in seen {
            let set: HashSet<KeyToken> = pair.into_iter().collect();
            let fb: HashSet<KeyToken> = FORWARD_BACK.into_iter().collect();
            let lr: HashSet<KeyToken> = LEFT_RIGHT.into_iter().collect();
            assert!(set == fb || set == lr);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_intervals_and_one_pair_per_cycle() {
        let input = RecordingInput::new();
        let ctx = context(input.clone());
        let stopper = ctx.run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(300)).await;
            stopper.cancel();
        });

        let start = tokio::time::Instant::now();
        run(&ctx, &Settings::default()).await.unwrap();

        let actions = input.actions();
        let presses: Vec<_> = actions
            .iter()
            .filter_map(|(t, a)| match a {
                Action::Press(k) => Some((*t, *k)),
                _ => None,
            })
            .collect();
        assert!(presses.len() >= 2 * 20);
        assert_eq!(presses.len() % 2, 0);

        let mut last_release = start;
        for cycle in presses.chunks(2) {
            let (first_at, first) = cycle[0];
            let (_, second) = cycle[1];
            let pair: HashSet<KeyToken> = [first, second].into_iter().collect();
            let fb: HashSet<KeyToken> = FORWARD_BACK.into_iter().collect();
            let lr: HashSet<KeyToken> = LEFT_RIGHT.into_iter().collect();
            assert!(pair == fb || pair == lr, "mixed pair {first} {second}");

            let gap = first_at - last_release;
            assert!(gap >= Duration::from_secs(3), "gap {gap:?}");
            assert!(gap <= Duration::from_secs(10), "gap {gap:?}");

            last_release = *input.releases_of(second).iter().find(|t| **t > first_at).unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_hold_releases_keys() {
        let input = RecordingInput::new();
        let ctx = context(input.clone());
        let mut settings = Settings::default();
        settings.walk_min = "1".into();
        settings.walk_max = "1".into();
        settings.walk_duration_min = "500".into();
        settings.walk_duration_max = "500".into();

        let stopper = ctx.run.clone();
        tokio::spawn(async move {
            // first key is held from 1.0s to 1.5s
            tokio::time::sleep(Duration::from_millis(1200)).await;
            stopper.cancel();
        });
        run(&ctx, &settings).await.unwrap();

        assert!(input.held_keys().is_empty());
        let presses = input
            .actions()
            .into_iter()
            .filter(|(_, a)| matches!(a, Action::Press(_)))
            .count();
        assert_eq!(presses, 2);
    }
}
