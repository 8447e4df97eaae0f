use std::fmt;

/// Lowest temperature (°C) still considered normal.
pub const LOW_THRESHOLD_C: f64 = 0.0;
/// Highest temperature (°C) still considered normal.
pub const HIGH_THRESHOLD_C: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    BelowRange,
    AboveRange,
    Normal,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::BelowRange => "BELOW_RANGE",
            AlertLevel::AboveRange => "ABOVE_RANGE",
            AlertLevel::Normal => "NORMAL",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, AlertLevel::Normal)
    }

    /// Human-readable line for `temperature` at this level.
    pub fn message(&self, temperature: f64) -> String {
        match self {
            AlertLevel::BelowRange => {
                format!("ALERT: Temperature is {temperature}°C - BELOW {LOW_THRESHOLD_C}°C!")
            }
            AlertLevel::AboveRange => {
                format!("ALERT: Temperature is {temperature}°C - ABOVE {HIGH_THRESHOLD_C}°C!")
            }
            AlertLevel::Normal => format!(
                "Temperature {temperature}°C is within normal range ({LOW_THRESHOLD_C}-{HIGH_THRESHOLD_C}°C)"
            ),
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both thresholds are exclusive: 0°C and 24°C are still normal.
pub fn classify(temperature: f64) -> AlertLevel {
    if temperature < LOW_THRESHOLD_C {
        AlertLevel::BelowRange
    } else if temperature > HIGH_THRESHOLD_C {
        AlertLevel::AboveRange
    } else {
        AlertLevel::Normal
    }
}
