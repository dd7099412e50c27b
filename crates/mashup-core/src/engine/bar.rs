//! Bar timing configuration
//!
//! A bar is divided into a fixed power-of-two number of slices. The slice
//! length comes from the tempo and a multiplier derived from the slice count:
//!
//! ```text
//! multiplier       = log2(subdivisions / 2)
//! seconds_per_slice = 60 / (bpm * multiplier)
//! bar_duration      = seconds_per_slice * subdivisions
//! ```
//!
//! At 4 subdivisions the multiplier is 1, so one slice lasts one beat.

use serde::{Deserialize, Serialize};

use crate::error::{MashupError, MashupResult};

/// Supported subdivision counts per bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Subdivisions {
    Four = 4,
    Eight = 8,
    Sixteen = 16,
    ThirtyTwo = 32,
}

impl Subdivisions {
    pub const ALL: [Subdivisions; 4] = [
        Subdivisions::Four,
        Subdivisions::Eight,
        Subdivisions::Sixteen,
        Subdivisions::ThirtyTwo,
    ];

    /// Number of slices per bar
    pub fn count(self) -> u32 {
        self as u32
    }

    /// Parse a slice count, rejecting anything outside {4, 8, 16, 32}
    pub fn from_count(count: u32) -> MashupResult<Self> {
        match count {
            4 => Ok(Subdivisions::Four),
            8 => Ok(Subdivisions::Eight),
            16 => Ok(Subdivisions::Sixteen),
            32 => Ok(Subdivisions::ThirtyTwo),
            other => Err(MashupError::InvalidConfig(format!(
                "subdivisions per bar must be 4, 8, 16 or 32 (got {})",
                other
            ))),
        }
    }

    /// Tempo multiplier `log2(n / 2)`
    pub fn bpm_multiplier(self) -> f64 {
        (self.count() as f64 / 2.0).log2()
    }
}

impl TryFrom<u32> for Subdivisions {
    type Error = MashupError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Subdivisions::from_count(value)
    }
}

impl From<Subdivisions> for u32 {
    fn from(value: Subdivisions) -> Self {
        value.count()
    }
}

impl Default for Subdivisions {
    fn default() -> Self {
        Subdivisions::ThirtyTwo
    }
}

/// Tempo and subdivision of a bar, immutable once playback starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarConfig {
    bpm: f64,
    subdivisions: Subdivisions,
}

impl BarConfig {
    /// Validate and build a bar configuration
    pub fn new(bpm: f64, subdivisions: Subdivisions) -> MashupResult<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(MashupError::InvalidConfig(format!(
                "bpm must be a positive number (got {})",
                bpm
            )));
        }
        Ok(Self { bpm, subdivisions })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn subdivisions(&self) -> Subdivisions {
        self.subdivisions
    }

    /// Slices per bar as a plain count
    pub fn slices(&self) -> u32 {
        self.subdivisions.count()
    }

    /// Length of one slice in seconds
    pub fn seconds_per_slice(&self) -> f64 {
        60.0 / (self.bpm * self.subdivisions.bpm_multiplier())
    }

    /// Length of one bar in seconds
    pub fn bar_duration(&self) -> f64 {
        self.seconds_per_slice() * self.slices() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_slice_length_at_160_bpm() {
        let config = BarConfig::new(160.0, Subdivisions::Four).unwrap();
        assert!((config.seconds_per_slice() - 0.375).abs() < 1e-12);
        assert!((config.bar_duration() - 1.5).abs() < 1e-12);

        let config = BarConfig::new(160.0, Subdivisions::ThirtyTwo).unwrap();
        // log2(16) = 4
        assert!((config.seconds_per_slice() - 0.09375).abs() < 1e-12);
    }

    #[test]
    fn test_bar_duration_matches_slices() {
        for bpm in [60.0, 93.5, 160.0, 240.0] {
            for subdivisions in Subdivisions::ALL {
                let config = BarConfig::new(bpm, subdivisions).unwrap();
                let sps = config.seconds_per_slice();
                assert!(sps > 0.0);
                let expected = sps * subdivisions.count() as f64;
                assert!((config.bar_duration() - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_rejects_bad_bpm() {
        for bpm in [0.0, -120.0, f64::NAN, f64::INFINITY] {
            let err = BarConfig::new(bpm, Subdivisions::Four).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
    }

    #[test]
    fn test_subdivision_parsing() {
        assert_eq!(Subdivisions::from_count(16).unwrap(), Subdivisions::Sixteen);
        assert!(Subdivisions::from_count(12).is_err());
        assert!(Subdivisions::from_count(2).is_err());

        let parsed: Subdivisions = serde_yaml::from_str("8").unwrap();
        assert_eq!(parsed, Subdivisions::Eight);
        assert!(serde_yaml::from_str::<Subdivisions>("6").is_err());
        assert_eq!(serde_yaml::to_string(&Subdivisions::Four).unwrap().trim(), "4");
    }
}
