//! Test subset runner contract.

use serde::{Deserialize, Serialize};

use crate::errors::TestRunError;
use crate::types::{TestVerdict, UnitRef};

/// Result of running the test subset that owns a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub pass: bool,
    /// Line coverage of the unit's owning module, 0-100. `None` when the
    /// run printed nothing the coverage pattern recognises.
    pub coverage: Option<f64>,
    pub timed_out: bool,
}

impl TestOutcome {
    pub fn passed(coverage: f64) -> Self {
        Self {
            pass: true,
            coverage: Some(coverage),
            timed_out: false,
        }
    }

    pub fn failed(coverage: f64) -> Self {
        Self {
            pass: false,
            coverage: Some(coverage),
            timed_out: false,
        }
    }

    pub fn passed_without_coverage() -> Self {
        Self {
            pass: true,
            coverage: None,
            timed_out: false,
        }
    }

    pub fn verdict(&self) -> TestVerdict {
        if self.timed_out {
            TestVerdict::TimedOut
        } else if self.pass {
            TestVerdict::Pass
        } else {
            TestVerdict::Fail
        }
    }
}

/// Black-box runner for a unit's associated test subset. Blocking; the
/// implementation enforces its own timeout.
pub trait TestRunner: Send + Sync {
    fn run_tests(&self, unit: &UnitRef) -> Result<TestOutcome, TestRunError>;
}
