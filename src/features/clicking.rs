//! Continuous clicking, optionally around a slowly drifting circle

use std::f64::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::settings::{CircleParams, Settings};

use super::{pause, FeatureContext, FeatureError};

/// Circle radius in pointer units
pub const RADIUS: f64 = 5.0;

/// Clicks per revolution: the angle advances by π/12 each click
pub const STEPS_PER_REVOLUTION: u32 = 24;

/// Position along a circle whose center drifts after a number of revolutions
#[derive(Debug, Clone)]
pub struct CircleMotion {
    center: (f64, f64),
    /// Index of the current angle, `0..STEPS_PER_REVOLUTION`
    step: u32,
    /// Full revolutions since the last drift
    spins: u32,
    params: CircleParams,
}

impl CircleMotion {
    /// Start at angle 0 around `center`
    pub fn new(center: (f64, f64), params: CircleParams) -> Self {
        Self {
            center,
            step: 0,
            spins: 0,
            params,
        }
    }

    #[cfg(test)]
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    #[cfg(test)]
    pub fn spins(&self) -> u32 {
        self.spins
    }

    /// Current angle, always in `[0, 2π)`
    pub fn angle(&self) -> f64 {
        f64::from(self.step) * TAU / f64::from(STEPS_PER_REVOLUTION)
    }

    /// Pointer position for the current angle
    pub fn point(&self) -> (f64, f64) {
        let angle = self.angle();
        (
            self.center.0 + RADIUS * angle.cos(),
            self.center.1 + RADIUS * angle.sin(),
        )
    }

    /// Move to the next angle. Completing a revolution counts a spin, and
    /// enough spins shift the center by the drift on both axes.
    pub fn advance(&mut self) {
        self.step = (self.step + 1) % STEPS_PER_REVOLUTION;
        if self.step != 0 {
            return;
        }

        self.spins += 1;
        if self.spins >= self.params.spins_before_drift {
            let drift = f64::from(self.params.drift);
            self.center = (self.center.0 + drift, self.center.1 + drift);
            self.spins = 0;
            debug!(center = ?self.center, "circle center drifted");
        }
    }
}

/// Click until the phase stops. The mode is fixed when the loop starts.
pub async fn run(ctx: &FeatureContext, settings: &Settings) -> Result<(), FeatureError> {
    let params = settings.click_params()?;
    let mut rng = StdRng::from_entropy();

    let mut circle = match params.circle {
        Some(circle_params) => {
            let anchor = ctx.input.pointer_position()?;
            Some(CircleMotion::new(anchor, circle_params))
        }
        None => None,
    };

    info!(
        circular = circle.is_some(),
        min_delay_ms = params.delay_ms.min,
        max_delay_ms = params.delay_ms.max,
        "clicking loop started"
    );

    while !ctx.run.is_cancelled() {
        if let Some(motion) = circle.as_mut() {
            let (x, y) = motion.point();
            ctx.input.set_pointer_position(x, y)?;
        }

        let delay_ms = rng.gen_range(params.delay_ms.range());
        ctx.status.set_click_delay(delay_ms);
        ctx.input.click()?;

        if let Some(motion) = circle.as_mut() {
            motion.advance();
        }

        if !pause(&ctx.run, Duration::from_millis(delay_ms)).await {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::context;
    use crate::input::testing::{Action, RecordingInput};

    fn motion(spins_before_drift: u32, drift: i32) -> CircleMotion {
        CircleMotion::new(
            (100.0, 200.0),
            CircleParams {
                spins_before_drift,
                drift,
            },
        )
    }

    #[test]
    fn test_first_point_is_east_of_center() {
        let m = motion(10, 2);
        assert_eq!(m.angle(), 0.0);
        assert_eq!(m.point(), (105.0, 200.0));
    }

    #[test]
    fn test_angle_stays_in_range() {
        let mut m = motion(3, 1);
        for _ in 0..(STEPS_PER_REVOLUTION * 7 + 5) {
            m.advance();
            assert!((0.0..TAU).contains(&m.angle()));
        }
    }

    #[test]
    fn test_drift_after_exact_revolutions() {
        let mut m = motion(10, 2);
        for revolution in 1..=9 {
            for _ in 0..STEPS_PER_REVOLUTION {
                m.advance();
            }
            assert_eq!(m.spins(), revolution);
            assert_eq!(m.center(), (100.0, 200.0));
        }

        for _ in 0..STEPS_PER_REVOLUTION {
            m.advance();
        }
        assert_eq!(m.center(), (102.0, 202.0));
        assert_eq!(m.spins(), 0);
        assert_eq!(m.angle(), 0.0);
    }

    #[test]
    fn test_negative_drift() {
        let mut m = motion(1, -4);
        for _ in 0..STEPS_PER_REVOLUTION {
            m.advance();
        }
        assert_eq!(m.center(), (96.0, 196.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_delays_within_bounds() {
        let input = RecordingInput::new();
        let ctx = context(input.clone());
        let stopper = ctx.run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            stopper.cancel();
        });

        run(&ctx, &Settings::default()).await.unwrap();

        let clicks = input.clicks();
        assert!(clicks.len() > 50);
        for pair in clicks.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(100), "gap {gap:?}");
            assert!(gap <= Duration::from_millis(300), "gap {gap:?}");
        }
        let delay = ctx.status.snapshot().click_delay_ms;
        assert!((100..=300).contains(&delay));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circular_moves_before_each_click() {
        let input = RecordingInput::with_pointer(50.0, 50.0);
        let ctx = context(input.clone());
        let mut settings = Settings::default();
        settings.circle = true;
        settings.min_delay = "10".into();
        settings.max_delay = "10".into();

        let stopper = ctx.run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            stopper.cancel();
        });
        run(&ctx, &settings).await.unwrap();

        let actions: Vec<Action> = input.actions().into_iter().map(|(_, a)| a).collect();
        assert_eq!(actions[0], Action::Move(55.0, 50.0));
        assert_eq!(actions[1], Action::Click);
        assert!(matches!(actions[2], Action::Move(..)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_latency_is_one_click() {
        let input = RecordingInput::new();
        let ctx = context(input.clone());
        let mut settings = Settings::default();
        settings.min_delay = "1000".into();
        settings.max_delay = "1000".into();

        let stopper = ctx.run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            stopper.cancel();
        });
        let start = tokio::time::Instant::now();
        run(&ctx, &settings).await.unwrap();

        // clicks at 0s, 1s and 2s; the stop lands mid-wait
        assert_eq!(input.clicks().len(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }
}
