use thiserror::Error;

/// Errors surfaced by the MDP model and the planning/learning routines.
///
/// Running out of iteration budget in value iteration is not an error;
/// solvers return a best-effort solution flagged as not converged.
#[derive(Error, Debug)]
pub enum RlError {
    #[error("action {action} is not legal in state {state}")]
    IllegalAction { state: usize, action: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, RlError>;
