//! The agent instance state machine (§4.9).

use serde::{Deserialize, Serialize};

/// An agent instance's lifecycle state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered but not yet admitted.
    Created,
    /// Admitted; resources are being provisioned.
    Initializing,
    /// Provisioned, awaiting its first run.
    Ready,
    /// Actively running.
    Running,
    /// Runtime suspended, resources retained.
    Paused,
    /// Tearing down.
    Stopping,
    /// Terminated; resources released.
    Stopped,
    /// An unrecoverable error occurred.
    Failed,
    /// Coming back from `failed`.
    Restarting,
}

impl AgentState {
    /// Whether `self -> next` is a valid transition (§4.9 transition table).
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Created, Initializing)
                | (Created, Failed)
                | (Initializing, Ready)
                | (Initializing, Failed)
                | (Ready, Running)
                | (Ready, Failed)
                | (Running, Paused)
                | (Running, Stopping)
                | (Running, Restarting)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Stopping)
                | (Paused, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
                | (Stopped, Initializing)
                | (Stopped, Failed)
                | (Failed, Restarting)
                | (Restarting, Initializing)
                | (Restarting, Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AgentState::*;

    #[test]
    fn accepts_every_transition_in_the_table() {
        let table = [
            (Created, Initializing),
            (Created, Failed),
            (Initializing, Ready),
            (Initializing, Failed),
            (Ready, Running),
            (Ready, Failed),
            (Running, Paused),
            (Running, Stopping),
            (Running, Restarting),
            (Running, Failed),
            (Paused, Running),
            (Paused, Stopping),
            (Paused, Failed),
            (Stopping, Stopped),
            (Stopping, Failed),
            (Stopped, Initializing),
            (Stopped, Failed),
            (Failed, Restarting),
            (Restarting, Initializing),
            (Restarting, Failed),
        ];
        for (from, to) in table {
            assert!(from.can_transition_to(to), "{from:?} -> {to:?} should be valid");
        }
    }

    #[test]
    fn rejects_everything_else() {
        assert!(!Created.can_transition_to(Running));
        assert!(!Ready.can_transition_to(Stopped));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Paused.can_transition_to(Initializing));
    }
}
