//! Hit-condition grammar: an operator (`>`, `>=`, `==`, `%`) followed by
//! a non-negative integer count.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::EngineError;

/// Comparison applied to a breakpoint's hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOperator {
    /// `>N`
    Greater,
    /// `>=N`
    GreaterOrEqual,
    /// `==N`
    Equal,
    /// `%N`: every Nth hit.
    Modulo,
}

impl HitOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            HitOperator::Greater => ">",
            HitOperator::GreaterOrEqual => ">=",
            HitOperator::Equal => "==",
            HitOperator::Modulo => "%",
        }
    }
}

/// A parsed hit condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitCondition {
    pub operator: HitOperator,
    pub count: u64,
}

fn pattern() -> Result<&'static Regex, EngineError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(>=|==|>|%)\s*(\d+)\s*$"))
        .as_ref()
        .map_err(|e| EngineError::validation("hit_condition", e.to_string()))
}

impl HitCondition {
    /// Parse `input`, failing with a validation error on anything that is
    /// not `<op><count>`.
    pub fn parse(input: &str) -> Result<Self, EngineError> {
        let invalid = |message: String| EngineError::validation("hit_condition", message);

        let caps = pattern()?.captures(input).ok_or_else(|| {
            invalid(format!(
                "expected one of >N, >=N, ==N or %N, got {input:?}"
            ))
        })?;
        let operator = match &caps[1] {
            ">" => HitOperator::Greater,
            ">=" => HitOperator::GreaterOrEqual,
            "==" => HitOperator::Equal,
            _ => HitOperator::Modulo,
        };
        let count: u64 = caps[2]
            .parse()
            .map_err(|_| invalid(format!("hit count out of range in {input:?}")))?;
        if operator == HitOperator::Modulo && count == 0 {
            return Err(invalid("%0 never matches".to_string()));
        }
        Ok(Self { operator, count })
    }

    /// Whether the `hits`-th hit (1-based) should pause.
    pub fn is_satisfied(&self, hits: u64) -> bool {
        match self.operator {
            HitOperator::Greater => hits > self.count,
            HitOperator::GreaterOrEqual => hits >= self.count,
            HitOperator::Equal => hits == self.count,
            HitOperator::Modulo => self.count != 0 && hits % self.count == 0,
        }
    }

    /// Whether only adapters with full hit-condition support accept this.
    pub fn requires_full_support(&self) -> bool {
        self.operator != HitOperator::Equal
    }
}

impl FromStr for HitCondition {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.as_str(), self.count)
    }
}
