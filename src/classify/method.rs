//! Classification methods

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ClassifyError;

/// How breakpoints for a numeric column are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakMethod {
    EqualInterval,
    Quantile,
    #[serde(alias = "jenks")]
    Jenk,
    HeadTail,
}

impl BreakMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakMethod::EqualInterval => "equal_interval",
            BreakMethod::Quantile => "quantile",
            BreakMethod::Jenk => "jenk",
            BreakMethod::HeadTail => "head_tail",
        }
    }

    /// Storage-side function returning the breakpoint array
    pub fn function_name(&self) -> String {
        format!("{}_bins", self.as_str())
    }

    /// Quantile bins are computed over integer-cast values
    pub fn casts_to_integer(&self) -> bool {
        matches!(self, BreakMethod::Quantile)
    }

    /// Computed in-process from the column range, no storage function needed
    pub fn is_local(&self) -> bool {
        matches!(self, BreakMethod::EqualInterval)
    }
}

impl fmt::Display for BreakMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakMethod {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal_interval" => Ok(BreakMethod::EqualInterval),
            "quantile" => Ok(BreakMethod::Quantile),
            "jenk" | "jenks" => Ok(BreakMethod::Jenk),
            "head_tail" => Ok(BreakMethod::HeadTail),
            other => Err(ClassifyError::UnknownMethod(other.to_string())),
        }
    }
}
