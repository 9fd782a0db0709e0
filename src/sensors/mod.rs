use chrono::{DateTime, Utc};

pub mod ccs811;

/// One algorithm result read from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub co2_ppm: u16,
    pub tvoc_ppb: u16,
    pub timestamp: DateTime<Utc>,
}
