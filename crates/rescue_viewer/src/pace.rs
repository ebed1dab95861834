use std::time::Duration;

/// Pacing source for the reconciliation engine. Every dwell is a suspension
/// point; mutations never span one. `Instant` resolves dwells immediately so
/// tests and headless replays stay deterministic and fast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacer {
    Wall { seconds_per_unit: f32 },
    Instant,
}

impl Pacer {
    pub fn wall() -> Self {
        Pacer::Wall {
            seconds_per_unit: 1.0,
        }
    }

    pub async fn dwell(&self, units: f32) {
        match self {
            Pacer::Wall { seconds_per_unit } => {
                let seconds = (units * seconds_per_unit).max(0.0);
                tokio::time::sleep(Duration::from_secs_f32(seconds)).await;
            }
            Pacer::Instant => {}
        }
    }
}
