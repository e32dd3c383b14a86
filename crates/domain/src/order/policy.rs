//! Configurable rules for status changes and stock restoration.

use std::str::FromStr;

use store::OrderStatus;
use thiserror::Error;

use super::OrderError;

/// How status changes are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may be set from any status.
    #[default]
    Permissive,
    /// Only moves listed by [`OrderStatus::allowed_next`] are accepted.
    Strict,
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status policy: {0} (expected 'permissive' or 'strict')")]
pub struct UnknownPolicy(pub String);

impl TransitionPolicy {
    /// Checks a move from `from` to `to`.
    pub fn check(&self, from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        match self {
            TransitionPolicy::Permissive => Ok(()),
            TransitionPolicy::Strict if from.can_transition_to(to) => Ok(()),
            TransitionPolicy::Strict => Err(OrderError::InvalidStatusTransition { from, to }),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Policy knobs of the order workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderPolicy {
    pub transitions: TransitionPolicy,
    /// Return stock when an order is cancelled, or deleted without having
    /// been cancelled first.
    pub restock_on_cancel: bool,
}

impl OrderPolicy {
    /// Permissive transitions, no restocking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transition policy.
    pub fn with_transitions(mut self, transitions: TransitionPolicy) -> Self {
        self.transitions = transitions;
        self
    }

    /// Enables or disables restocking on cancel.
    pub fn with_restock_on_cancel(mut self, enabled: bool) -> Self {
        self.restock_on_cancel = enabled;
        self
    }
}
