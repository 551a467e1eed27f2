//! Categorical views derived from continuous analysis numbers.

use std::fmt;

/// Change-impact risk bucket derived from a blast-radius risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify a risk score.
    ///
    /// `> 100` is Critical, `>= 30` High, `>= 10` Medium, anything else Low.
    pub fn from_score(score: f64) -> Self {
        if score > 100.0 {
            Self::Critical
        } else if score >= 30.0 {
            Self::High
        } else if score >= 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary test status, kept apart from the percentage so it can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverageStatus {
    Tested,
    Untested,
}

impl CoverageStatus {
    /// `Untested` only for exactly 0 %.
    pub fn from_percentage(pct: f64) -> Self {
        if pct == 0.0 {
            Self::Untested
        } else {
            Self::Tested
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tested => "Tested",
            Self::Untested => "Untested",
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tested share of `total` symbols as a percentage, or `None` when there are no symbols.
pub fn coverage_percentage(tested: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(tested as f64 / total as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(9.99), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(10.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(29.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100.1), RiskLevel::Critical);
    }

    #[test]
    fn negative_scores_are_low() {
        assert_eq!(RiskLevel::from_score(-4.0), RiskLevel::Low);
    }

    #[test]
    fn coverage_status_is_untested_only_at_zero() {
        assert_eq!(CoverageStatus::from_percentage(0.0), CoverageStatus::Untested);
        assert_eq!(CoverageStatus::from_percentage(0.1), CoverageStatus::Tested);
        assert_eq!(CoverageStatus::from_percentage(100.0), CoverageStatus::Tested);
    }

    #[test]
    fn percentage_of_nothing_is_absent() {
        assert_eq!(coverage_percentage(0, 0), None);
        assert_eq!(coverage_percentage(0, 3), Some(0.0));
        let pct = coverage_percentage(4, 6).unwrap();
        assert!((pct - 66.666).abs() < 0.01);
    }
}
