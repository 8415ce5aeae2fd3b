use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::readings::repo;

/// Timestamps for one synthetic batch: every `interval` across the
/// trailing `window` ending at `end`, both endpoints included.
fn sample_times(end: OffsetDateTime, window: Duration, interval: Duration) -> Vec<OffsetDateTime> {
    let mut times = Vec::new();
    let mut t = end - window;
    while t <= end {
        times.push(t);
        t += interval;
    }
    times
}

/// Replace the whole table with synthetic readings. Destructive: the clear
/// and the inserts commit as one transaction, so a failure part-way leaves
/// the previous data intact.
pub async fn regenerate(
    db: &SqlitePool,
    window: Duration,
    interval: Duration,
    mut values: impl FnMut() -> (f64, Option<f64>),
) -> anyhow::Result<u64> {
    let end = repo::now_second_precision();
    let mut tx = db.begin().await.context("begin regenerate")?;

    let dropped = repo::delete_all(&mut tx).await?;
    let mut count = 0u64;
    for ts in sample_times(end, window, interval) {
        let (temperature, humidity) = values();
        repo::insert_tx(&mut tx, temperature, humidity, ts).await?;
        count += 1;
    }
    tx.commit().await.context("commit regenerate")?;

    info!(dropped, inserted = count, "sensor table regenerated");
    Ok(count)
}

/// Additive variant: the same sampling grid, without clearing first.
pub async fn backfill(
    db: &SqlitePool,
    window: Duration,
    interval: Duration,
    mut values: impl FnMut() -> (f64, Option<f64>),
) -> anyhow::Result<u64> {
    let end = repo::now_second_precision();
    let mut tx = db.begin().await.context("begin backfill")?;

    let mut count = 0u64;
    for ts in sample_times(end, window, interval) {
        let (temperature, humidity) = values();
        repo::insert_tx(&mut tx, temperature, humidity, ts).await?;
        count += 1;
    }
    tx.commit().await.context("commit backfill")?;
    Ok(count)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Uniform-random indoor climate: 20–30 °C, 40–60 % RH.
// StdRng rather than thread_rng: the closure crosses await points.
pub fn random_climate() -> impl FnMut() -> (f64, Option<f64>) {
    let mut rng = StdRng::from_entropy();
    move || {
        (
            round2(rng.gen_range(20.0..30.0)),
            Some(round2(rng.gen_range(40.0..60.0))),
        )
    }
}

/// Temperature-only samples for the additive generator.
pub fn random_temperature() -> impl FnMut() -> (f64, Option<f64>) {
    let mut rng = StdRng::from_entropy();
    move || (round2(rng.gen_range(20.0..30.0)), None)
}
