use crate::error::Error;

/// Lifecycle states of a single logical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestState {
    Idle,
    Pending,
    Retrying,
    Success,
    Error,
    Cancelled,
}

impl RequestState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Pending => "PENDING",
            Self::Retrying => "RETRYING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Per-request state machine. Owned by the task driving the request; the
/// engine advances it at fixed points so observers always see a consistent
/// lifecycle. Terminal states have no outgoing edges.
#[derive(Debug)]
pub struct StateMachine {
    current: RequestState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: RequestState::Idle,
        }
    }

    pub fn current(&self) -> RequestState {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transition(&mut self, next: RequestState) -> Result<(), Error> {
        if !transition_allowed(self.current, next) {
            return Err(Error::DeterministicState {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn transition_allowed(from: RequestState, to: RequestState) -> bool {
    use RequestState::{Cancelled, Error, Idle, Pending, Retrying, Success};
    matches!(
        (from, to),
        (Idle, Pending | Cancelled)
            | (Pending, Success | Error | Retrying | Cancelled)
            | (Retrying, Pending | Success | Error | Cancelled)
    )
}
