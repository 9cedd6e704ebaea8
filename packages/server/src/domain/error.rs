//! Domain error types.

use thiserror::Error;

use super::entity::{Phase, ReadySignal};

/// Validation failures of value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0} contains an invalid character")]
    InvalidCharacter(&'static str),
}

/// Failures of the shared key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not execute the command.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The key holds a value of another kind (e.g. a hash accessed as a set).
    #[error("key '{0}' holds a value of another type")]
    WrongType(String),

    /// The stored value could not be interpreted.
    #[error("could not decode value of key '{key}': {reason}")]
    Decode { key: String, reason: String },
}

/// Failures of the relay bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("failed to publish on '{channel}': {reason}")]
    Publish { channel: String, reason: String },

    #[error("failed to subscribe to '{channel}': {reason}")]
    Subscribe { channel: String, reason: String },
}

/// Failures of the content-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Request(String),

    #[error("unexpected content response: {0}")]
    InvalidResponse(String),
}

/// Rejected readiness signals. None of these mutate room state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("player '{0}' is not in the room")]
    UnknownPlayer(String),

    #[error("player '{0}' is not marked ready in the store")]
    NotEligible(String),

    #[error("player '{0}' is already marked as ready")]
    AlreadyReady(String),

    #[error("{signal:?} is not accepted while the room is {phase:?}")]
    WrongPhase { phase: Phase, signal: ReadySignal },

    #[error("'{0}' is not a candidate of this round")]
    UnknownCandidate(String),

    /// 同じラウンドで別のプレイヤーが既に提出した画像
    #[error("'{0}' was already submitted by another player")]
    DuplicateSubmission(String),
}
