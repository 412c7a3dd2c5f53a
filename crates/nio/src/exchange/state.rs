use std::sync::atomic::{AtomicU8, Ordering};

use crate::protocol::ContractViolation;

/// The lifecycle of a single request/response exchange.
///
/// ```text
/// Receiving -> ExpectationCheck -> Dispatched -> ResponseReady -> Sending -> Completed
///     |               |                ^               ^
///     |               +----------------|---------------+   (gate answers directly)
///     +--------------------------------+---------------+   (no expectation / engine response)
///
/// every non terminal state may move to Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExchangeState {
    Receiving = 0,
    ExpectationCheck = 1,
    Dispatched = 2,
    ResponseReady = 3,
    Sending = 4,
    Completed = 5,
    Failed = 6,
}

impl ExchangeState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Completed | ExchangeState::Failed)
    }

    /// Returns true if a response may still be submitted in this state.
    #[inline]
    pub fn accepts_response(self) -> bool {
        matches!(self, ExchangeState::ExpectationCheck | ExchangeState::Dispatched)
    }

    pub fn can_transition_to(self, to: ExchangeState) -> bool {
        use ExchangeState::*;

        if to == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, to),
            (Receiving, ExpectationCheck | Dispatched | ResponseReady)
                | (ExpectationCheck, Dispatched | ResponseReady)
                | (Dispatched, ResponseReady)
                | (ResponseReady, Sending)
                | (Sending, Completed)
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ExchangeState::Receiving,
            1 => ExchangeState::ExpectationCheck,
            2 => ExchangeState::Dispatched,
            3 => ExchangeState::ResponseReady,
            4 => ExchangeState::Sending,
            5 => ExchangeState::Completed,
            _ => ExchangeState::Failed,
        }
    }
}

/// Atomic holder of an [`ExchangeState`], shared between the reactor and workers.
///
/// Every transition is a compare-and-swap from an expected state, so of two
/// racing transitions out of the same state exactly one wins and the loser learns
/// the state the winner left behind.
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU8,
}

impl StateCell {
    pub fn new() -> Self {
        Self { state: AtomicU8::new(ExchangeState::Receiving as u8) }
    }

    #[inline]
    pub fn get(&self) -> ExchangeState {
        ExchangeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves from exactly `from` to `to`.
    ///
    /// Returns the actual current state as the error when the cell is not in `from`.
    /// An edge the lifecycle does not have is a contract violation.
    pub fn transition(&self, from: ExchangeState, to: ExchangeState) -> Result<Result<(), ExchangeState>, ContractViolation> {
        if !from.can_transition_to(to) {
            return Err(ContractViolation::IllegalTransition { from, to });
        }

        Ok(self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ExchangeState::from_u8))
    }

    /// Moves to `to` from whichever state the cell is in, if the lifecycle allows it.
    pub fn advance(&self, to: ExchangeState) -> Result<ExchangeState, ContractViolation> {
        let mut current = self.get();
        loop {
            if !current.can_transition_to(to) {
                return Err(ContractViolation::IllegalTransition { from: current, to });
            }
            match self.state.compare_exchange(current as u8, to as u8, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(current),
                Err(actual) => current = ExchangeState::from_u8(actual),
            }
        }
    }

    /// Moves to `Failed` unless the exchange already reached a terminal state.
    pub fn fail(&self) -> bool {
        self.advance(ExchangeState::Failed).is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
