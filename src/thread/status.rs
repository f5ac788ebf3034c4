//! Thread lifecycle status

use std::fmt;

/// Status of a thread. The numeric values are stable and shown by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// At least one call is in flight
    Running = 1,
    /// Program loaded, no call in flight
    Idle = 2,
    /// Killed by the host
    Terminated = 3,
    /// Killed after an uncaught error in the worker
    Errored = 4,
}

impl Status {
    /// `Terminated` and `Errored` are final: no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Terminated | Status::Errored)
    }

    /// A thread accepts new calls only while it is not terminal.
    pub fn accepts_calls(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Running => "running",
            Status::Idle => "idle",
            Status::Terminated => "terminated",
            Status::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!Status::Running.is_terminal());
        assert!(!Status::Idle.is_terminal());
        assert!(Status::Terminated.is_terminal());
        assert!(Status::Errored.is_terminal());
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(Status::Running as u8, 1);
        assert_eq!(Status::Idle as u8, 2);
        assert_eq!(Status::Terminated as u8, 3);
        assert_eq!(Status::Errored as u8, 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::Idle.to_string(), "idle");
        assert_eq!(Status::Errored.to_string(), "errored");
    }
}
