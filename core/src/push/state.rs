use serde::{Deserialize, Serialize};

/// How a push session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushOutcome {
    Success,
    Failure,
}

/// Lifecycle of a single push.
///
/// `Idle -> SessionOpen -> Streaming -> Closed`. A push that cannot open its
/// session goes straight from `Idle` to `Closed(Failure)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushState {
    Idle,
    SessionOpen,
    Streaming,
    Closed(PushOutcome),
}

impl PushState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PushState::Closed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: PushState) -> bool {
        matches!(
            (self, next),
            (PushState::Idle, PushState::SessionOpen)
                | (PushState::Idle, PushState::Closed(PushOutcome::Failure))
                | (PushState::SessionOpen, PushState::Streaming)
                | (PushState::SessionOpen, PushState::Closed(PushOutcome::Failure))
                | (PushState::Streaming, PushState::Closed(_))
                | (PushState::Closed(_), PushState::Idle)
        )
    }
}
