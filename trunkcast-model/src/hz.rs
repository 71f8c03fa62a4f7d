//! Serde helpers for frequencies.
//!
//! Frequencies are always carried as integer Hz. Producers sometimes emit them
//! as JSON floats (`771356250.0`), so deserialization accepts any number and
//! rounds it.

use serde::{Deserialize, Deserializer};

/// Convert a MHz decimal to integer Hz.
pub fn mhz_to_hz(mhz: f64) -> u64 {
    (mhz * 1_000_000.0).round() as u64
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "invalid frequency: {value}"
        )));
    }
    Ok(value.round() as u64)
}

pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64))
}
