use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Parameters for one stress-test session. Immutable once the session has
/// started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Number of worker processes to fork.
    pub worker_count: usize,
    /// Compute/idle ratio control: lower values widen the sleep between
    /// bursts without shrinking the bursts.
    pub speed_factor: u32,
    /// Scales the burst size per tick.
    pub max_usage: u32,
    /// Wall-clock test length in seconds.
    pub duration: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            speed_factor: 100,
            max_usage: 100,
            duration: 30,
        }
    }
}

impl TestConfig {
    /// Range-checks every field; called by the controller before any
    /// resource is allocated.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.worker_count == 0 {
            return Err(ValidationError::NoWorkers);
        }
        if self.speed_factor == 0 || self.speed_factor > 100 {
            return Err(ValidationError::SpeedFactorOutOfRange(self.speed_factor));
        }
        if self.max_usage == 0 || self.max_usage > 100 {
            return Err(ValidationError::MaxUsageOutOfRange(self.max_usage));
        }
        if self.duration == 0 {
            return Err(ValidationError::DurationNotPositive(0));
        }
        Ok(())
    }

    /// Parses raw operator input for the duration field.
    pub fn parse_duration(raw: &str) -> Result<u64, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::DurationMissing);
        }
        let seconds: i64 = raw
            .parse()
            .map_err(|_| ValidationError::DurationNotANumber(raw.to_string()))?;
        if seconds <= 0 {
            return Err(ValidationError::DurationNotPositive(seconds));
        }
        Ok(seconds as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(TestConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let base = TestConfig::default();
        assert_eq!(
            TestConfig { worker_count: 0, ..base.clone() }.validate(),
            Err(ValidationError::NoWorkers)
        );
        assert_eq!(
            TestConfig { speed_factor: 150, ..base.clone() }.validate(),
            Err(ValidationError::SpeedFactorOutOfRange(150))
        );
        assert_eq!(
            TestConfig { max_usage: 0, ..base.clone() }.validate(),
            Err(ValidationError::MaxUsageOutOfRange(0))
        );
        assert_eq!(
            TestConfig { duration: 0, ..base }.validate(),
            Err(ValidationError::DurationNotPositive(0))
        );
    }

    #[test]
    fn parses_positive_durations() {
        assert_eq!(TestConfig::parse_duration("30"), Ok(30));
        assert_eq!(TestConfig::parse_duration(" 5 "), Ok(5));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert_eq!(
            TestConfig::parse_duration("abc"),
            Err(ValidationError::DurationNotANumber("abc".to_string()))
        );
        assert_eq!(
            TestConfig::parse_duration("-5"),
            Err(ValidationError::DurationNotPositive(-5))
        );
        assert_eq!(
            TestConfig::parse_duration("0"),
            Err(ValidationError::DurationNotPositive(0))
        );
        assert_eq!(TestConfig::parse_duration(""), Err(ValidationError::DurationMissing));
    }
}
