//! Configuration for the request scheduler.

use std::time::Duration;

use crate::error::SchedulerError;

/// How the pacing interval is measured for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// The slot stays reserved until the operation settled and `min_spacing`
    /// has passed since it was admitted
    SinceAdmission,

    /// The slot cools down for `min_spacing` after the operation settled
    AfterSettlement,
}

/// Configuration for a scheduler instance
///
/// Set once at construction; a running scheduler never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of operations executing at the same time
    pub ceiling: usize,

    /// Minimum interval between two admissions on the same slot
    pub min_spacing: Duration,

    /// Where the pacing interval starts counting
    pub pacing: Pacing,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            // Two outbound calls at a time, one per second per slot
            ceiling: 2,
            min_spacing: Duration::from_millis(1000),
            pacing: Pacing::SinceAdmission,
        }
    }
}

impl SchedulerConfig {
    /// Config for a single-lane dispatcher with a cooldown after every call
    pub fn serial(min_spacing: Duration) -> Self {
        Self {
            ceiling: 1,
            min_spacing,
            pacing: Pacing::AfterSettlement,
        }
    }

    /// Set the concurrency ceiling
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Set the pacing interval
    pub fn with_min_spacing(mut self, min_spacing: Duration) -> Self {
        self.min_spacing = min_spacing;
        self
    }

    /// Create config from environment variables
    ///
    /// - `DEALDESK_MAX_CONCURRENT`: ceiling
    /// - `DEALDESK_MIN_SPACING_MS`: pacing interval in milliseconds
    ///
    /// Missing, unparsable or zero values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("DEALDESK_MAX_CONCURRENT") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.ceiling = n,
                _ => {}
            }
        }

        if let Some(val) = lookup("DEALDESK_MIN_SPACING_MS") {
            if let Ok(ms) = val.trim().parse() {
                config.min_spacing = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Check that the config can drive a scheduler
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.ceiling == 0 {
            return Err(SchedulerError::config("ceiling must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.ceiling, 2);
        assert_eq!(config.min_spacing, Duration::from_millis(1000));
        assert_eq!(config.pacing, Pacing::SinceAdmission);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serial_config() {
        let config = SchedulerConfig::serial(Duration::from_millis(250));
        assert_eq!(config.ceiling, 1);
        assert_eq!(config.min_spacing, Duration::from_millis(250));
        assert_eq!(config.pacing, Pacing::AfterSettlement);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let config = SchedulerConfig::default().with_ceiling(0);
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = [
            ("DEALDESK_MAX_CONCURRENT", "4"),
            ("DEALDESK_MIN_SPACING_MS", " 250 "),
        ]
        .into_iter()
        .collect();

        let config = SchedulerConfig::from_vars(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.ceiling, 4);
        assert_eq!(config.min_spacing, Duration::from_millis(250));
    }

    #[test]
    fn test_from_vars_ignores_garbage() {
        let config = SchedulerConfig::from_vars(|key| match key {
            "DEALDESK_MAX_CONCURRENT" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_from_vars_ignores_zero_ceiling() {
        let config = SchedulerConfig::from_vars(|key| match key {
            "DEALDESK_MAX_CONCURRENT" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.ceiling, 2);
        assert!(config.validate().is_ok());
    }
}
