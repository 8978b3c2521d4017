use core_types::InvalidToken;
use ledger::LedgerError;
use thiserror::Error;

pub type GateResult<T> = Result<T, GateError>;

/// Faults only. Decision outcomes live in [`crate::Verification`] and [`crate::Admission`].
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidToken),
    #[error(transparent)]
    Storage(#[from] LedgerError),
}

impl GateError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, GateError::InvalidRequest(_))
    }
}
