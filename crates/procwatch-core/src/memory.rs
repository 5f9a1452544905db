//! Self-memory budget for the watchdog.

/// Pressure levels relative to the configured self-memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    /// Comfortably under budget (< 80%)
    Normal,
    /// Approaching the budget (80-100%)
    Warning,
    /// Over budget; watchdog remediation fires
    Breach,
}

/// Compares the monitor's own memory footprint against its configured limit.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
    limit_mb: f64,
}

impl MemoryBudget {
    pub fn new(limit_mb: f64) -> Self {
        Self { limit_mb }
    }

    pub fn limit_mb(&self) -> f64 {
        self.limit_mb
    }

    /// Usage as a fraction of the budget.
    pub fn usage_ratio(&self, usage_mb: f64) -> f64 {
        if self.limit_mb <= 0.0 {
            return 0.0;
        }
        usage_mb / self.limit_mb
    }

    pub fn pressure(&self, usage_mb: f64) -> MemoryPressure {
        match self.usage_ratio(usage_mb) {
            r if r < 0.8 => MemoryPressure::Normal,
            r if r <= 1.0 => MemoryPressure::Warning,
            _ => MemoryPressure::Breach,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_levels() {
        let budget = MemoryBudget::new(100.0);
        assert_eq!(budget.pressure(50.0), MemoryPressure::Normal);
        assert_eq!(budget.pressure(85.0), MemoryPressure::Warning);
        assert_eq!(budget.pressure(100.0), MemoryPressure::Warning);
        assert_eq!(budget.pressure(150.0), MemoryPressure::Breach);
    }

    #[test]
    fn test_zero_limit_never_breaches() {
        let budget = MemoryBudget::new(0.0);
        assert_eq!(budget.pressure(10_000.0), MemoryPressure::Normal);
    }
}
