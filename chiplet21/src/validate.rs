//! # Validators
//! Range checks for library records and chip records, applied as they are loaded.
//!

// Workspace Imports
use chiplet21utils::ErrorContext;

// Local Imports
use crate::error::{ChipError, ChipResult};

///
/// # Range Checker
///
/// Accumulates an [ErrorContext] stack and produces [ChipError::Range] failures naming
/// both the offending field and the record it belongs to.
///
#[derive(Debug, Clone, Default)]
pub struct RangeChecker {
    pub(crate) ctx: Vec<ErrorContext>,
}
impl RangeChecker {
    pub fn new(ctx: Vec<ErrorContext>) -> Self {
        Self { ctx }
    }
    /// Create a [ChipError::Range] for `field`
    pub fn err(&self, field: &str, value: f64, message: impl Into<String>) -> ChipError {
        let mut stack = self.ctx.clone();
        stack.push(ErrorContext::Field(field.to_string()));
        ChipError::Range {
            field: field.to_string(),
            value,
            message: message.into(),
            stack,
        }
    }
    fn check(&self, b: bool, field: &str, value: f64, message: &str) -> ChipResult<()> {
        match b {
            true => Ok(()),
            false => Err(self.err(field, value, message)),
        }
    }
    /// Probabilities, yields, fractions: `[0, 1]`
    pub fn unit(&self, field: &str, value: f64) -> ChipResult<()> {
        self.check(
            (0.0..=1.0).contains(&value),
            field,
            value,
            "must lie within [0, 1]",
        )
    }
    /// Costs, areas, densities: `>= 0`
    pub fn non_negative(&self, field: &str, value: f64) -> ChipResult<()> {
        self.check(value >= 0.0, field, value, "must be non-negative")
    }
    /// Shape parameters, ratios, divisors: `> 0`
    pub fn positive(&self, field: &str, value: f64) -> ChipResult<()> {
        self.check(value > 0.0, field, value, "must be positive")
    }
    /// Group sizes, sample counts: `>= lo`
    pub fn at_least(&self, field: &str, value: f64, lo: f64) -> ChipResult<()> {
        let msg = format!("must be at least {}", lo);
        self.check(value >= lo, field, value, &msg)
    }
}

/// Trait for records which check their own fields upon load
pub trait Validate {
    /// Check every field, reporting failures in the context of `ctx`
    fn validate(&self, ctx: &RangeChecker) -> ChipResult<()>;
}
