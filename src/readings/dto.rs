use serde::Serialize;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::readings::repo::SensorReading;

/// Wire format for timestamps: `YYYY-MM-DD HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// External representation of one reading.
#[derive(Debug, Serialize)]
pub struct ReadingDto {
    pub id: i64,
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub timestamp: String,
}

/// Why a stored reading could not be represented externally. Callers
/// choose whether to skip the record or fail the whole response.
#[derive(Debug, Error)]
pub enum ReadingConvertError {
    #[error("temperature is not a finite number")]
    BadTemperature,
    #[error("humidity is not a finite number")]
    BadHumidity,
    #[error("timestamp failed to format: {0}")]
    BadTimestamp(#[from] time::error::Format),
}

impl SensorReading {
    /// Validate field by field instead of swallowing conversion failures;
    /// numeric fields must be finite floats, the timestamp must format.
    pub fn to_external(&self) -> Result<ReadingDto, ReadingConvertError> {
        if !self.temperature.is_finite() {
            return Err(ReadingConvertError::BadTemperature);
        }
        if let Some(h) = self.humidity {
            if !h.is_finite() {
                return Err(ReadingConvertError::BadHumidity);
            }
        }
        Ok(ReadingDto {
            id: self.id,
            temperature: self.temperature,
            humidity: self.humidity,
            timestamp: self.timestamp.format(TIMESTAMP_FORMAT)?,
        })
    }
}
