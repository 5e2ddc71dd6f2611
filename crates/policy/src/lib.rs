//! Resource policy checks for CloudFormation templates.

mod document;
mod ecr;
mod vars;

use iacscan_core::{CheckRegistry, CoreError};

pub use ecr::EcrPolicyCheck;
pub use vars::{VariablePattern, SLS_DEFAULT_VAR_PATTERN};

/// Registers every built-in check.
pub fn register_builtin(registry: &mut CheckRegistry) -> Result<(), CoreError> {
    registry.register(Box::new(EcrPolicyCheck::new()))?;
    Ok(())
}
