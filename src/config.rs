use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How the register allocator treats each method's variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterAllocation {
    /// One slot per parameter, local and temporary, in declaration order.
    #[default]
    Off,
    /// Graph coloring with as few registers as possible.
    Minimal,
    /// Graph coloring with at most `k` registers beyond the parameters.
    Bounded(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid register allocation mode '{0}': expected 'off', '0' or a positive register count")]
    InvalidRegisterMode(String),
}

impl FromStr for RegisterAllocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "off" | "-1" => Ok(RegisterAllocation::Off),
            "0" => Ok(RegisterAllocation::Minimal),
            other => match other.parse::<usize>() {
                Ok(k) if k > 0 => Ok(RegisterAllocation::Bounded(k)),
                _ => Err(ConfigError::InvalidRegisterMode(s.to_string())),
            },
        }
    }
}

impl fmt::Display for RegisterAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterAllocation::Off => write!(f, "off"),
            RegisterAllocation::Minimal => write!(f, "0"),
            RegisterAllocation::Bounded(k) => write!(f, "{}", k),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Run constant propagation and folding before lowering.
    pub optimize: bool,
    pub register_allocation: RegisterAllocation,
}
