//! Threshold status classification.

use core::fmt;

/// Health of a metric relative to its control limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Status {
    /// No value to classify.
    Unknown,
    /// Within `[lcl, ucl]`.
    Normal,
    /// Outside the control limits.
    Warning,
    /// Beyond the critical rule.
    Critical,
}

impl Status {
    /// Lowercase name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Normal => "normal",
            Status::Warning => "warning",
            Status::Critical => "critical",
        }
    }

    /// Whether the status calls for attention.
    pub fn is_alerting(&self) -> bool {
        matches!(self, Status::Warning | Status::Critical)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a value against its control limits and critical threshold.
///
/// The critical rule only applies when a threshold is set: a value above
/// it, or below half the lower control limit, is critical. Otherwise a
/// value outside `[lcl, ucl]` is a warning. Critical takes precedence.
pub fn classify_status(value: Option<f64>, ucl: f64, lcl: f64, critical: Option<f64>) -> Status {
    let Some(value) = value else {
        return Status::Unknown;
    };

    if let Some(threshold) = critical {
        if value > threshold || value < lcl / 2.0 {
            return Status::Critical;
        }
    }

    if value > ucl || value < lcl {
        return Status::Warning;
    }

    Status::Normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_value_is_unknown() {
        assert_eq!(classify_status(None, 150.0, 50.0, Some(200.0)), Status::Unknown);
        assert_eq!(classify_status(None, 150.0, 50.0, None), Status::Unknown);
    }

    #[test]
    fn latency_examples() {
        assert_eq!(classify_status(Some(175.0), 150.0, 50.0, Some(200.0)), Status::Warning);
        assert_eq!(classify_status(Some(220.0), 150.0, 50.0, Some(200.0)), Status::Critical);
        assert_eq!(classify_status(Some(20.0), 150.0, 50.0, Some(200.0)), Status::Critical);
        assert_eq!(classify_status(Some(100.0), 150.0, 50.0, Some(200.0)), Status::Normal);
    }

    #[test]
    fn critical_dominates_warning() {
        // Both above ucl and above the threshold.
        assert_eq!(classify_status(Some(500.0), 150.0, 50.0, Some(200.0)), Status::Critical);
        // Both below lcl and below lcl / 2.
        assert_eq!(classify_status(Some(10.0), 150.0, 50.0, Some(200.0)), Status::Critical);
    }

    #[test]
    fn without_threshold_never_critical() {
        assert_eq!(classify_status(Some(10_000.0), 150.0, 50.0, None), Status::Warning);
        assert_eq!(classify_status(Some(1.0), 150.0, 50.0, None), Status::Warning);
    }

    #[test]
    fn zero_threshold_is_not_unset() {
        assert_eq!(classify_status(Some(1.0), 150.0, 0.0, Some(0.0)), Status::Critical);
        assert_eq!(classify_status(Some(1.0), 150.0, 0.0, None), Status::Normal);
    }

    #[test]
    fn limits_are_inclusive() {
        assert_eq!(classify_status(Some(150.0), 150.0, 50.0, Some(200.0)), Status::Normal);
        assert_eq!(classify_status(Some(50.0), 150.0, 50.0, Some(200.0)), Status::Normal);
        assert_eq!(classify_status(Some(200.0), 250.0, 50.0, Some(200.0)), Status::Normal);
    }

    #[test]
    fn display_names() {
        assert_eq!(Status::Critical.to_string(), "critical");
        assert!(Status::Warning.is_alerting());
        assert!(!Status::Unknown.is_alerting());
    }
}
