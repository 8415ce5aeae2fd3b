use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use time::OffsetDateTime;

/// One temperature/humidity sample. Readings are global; they carry no
/// owner and no foreign keys.
#[derive(Debug, Clone, FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub timestamp: OffsetDateTime,
}

/// Current UTC time truncated to whole seconds, the resolution the table
/// and the external format work at.
pub fn now_second_precision() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - time::Duration::nanoseconds(now.nanosecond() as i64)
}

/// Store one reading. The timestamp defaults to "now" when the producer
/// does not assign one; out-of-order timestamps are accepted as-is.
pub async fn insert(
    db: &SqlitePool,
    temperature: f64,
    humidity: Option<f64>,
    timestamp: Option<OffsetDateTime>,
) -> anyhow::Result<SensorReading> {
    let ts = timestamp.unwrap_or_else(now_second_precision);
    let reading = sqlx::query_as::<_, SensorReading>(
        r#"
        INSERT INTO sensor_data (temperature, humidity, timestamp)
        VALUES (?, ?, ?)
        RETURNING id, temperature, humidity, timestamp
        "#,
    )
    .bind(temperature)
    .bind(humidity)
    .bind(ts)
    .fetch_one(db)
    .await?;
    Ok(reading)
}

/// All readings with `start <= timestamp <= end`, oldest first.
pub async fn query_range(
    db: &SqlitePool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> anyhow::Result<Vec<SensorReading>> {
    let rows = sqlx::query_as::<_, SensorReading>(
        r#"
        SELECT id, temperature, humidity, timestamp
        FROM sensor_data
        WHERE timestamp BETWEEN ? AND ?
        ORDER BY timestamp ASC
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Wipe the table inside a caller-owned transaction.
pub async fn delete_all(tx: &mut Transaction<'_, Sqlite>) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM sensor_data")
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// Insert one reading inside a caller-owned transaction.
pub async fn insert_tx(
    tx: &mut Transaction<'_, Sqlite>,
    temperature: f64,
    humidity: Option<f64>,
    timestamp: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sensor_data (temperature, humidity, timestamp)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(temperature)
    .bind(humidity)
    .bind(timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_db() -> SqlitePool {
    let db = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory db");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("migrations");
    db
}
