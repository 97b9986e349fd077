use crate::notice::Notice;

/// Result of a connect request on the edge `user -> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Created,
    Reactivated,
    AlreadyConnected,
    SelfConnection,
}

/// Result of a disconnect request on the edge `user -> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Removed,
    NotConnected,
}

impl ConnectOutcome {
    /// Whether the edge went from absent/deleted to active.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Created | Self::Reactivated)
    }

    pub fn notice(&self, target: &str) -> Notice {
        match self {
            Self::Created | Self::Reactivated => {
                Notice::success(format!("You are now connected with {}", target))
            }
            Self::AlreadyConnected => Notice::info("Connection already exists"),
            Self::SelfConnection => Notice::warning("You cannot connect with yourself"),
        }
    }
}

impl DisconnectOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            Self::Removed => Notice::success("Connection removed"),
            Self::NotConnected => Notice::error("Connection not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::Level;

    #[test]
    fn only_created_and_reactivated_count_as_changes() {
        assert!(ConnectOutcome::Created.changed());
        assert!(ConnectOutcome::Reactivated.changed());
        assert!(!ConnectOutcome::AlreadyConnected.changed());
        assert!(!ConnectOutcome::SelfConnection.changed());
    }

    #[test]
    fn notices_match_outcomes() {
        assert_eq!(ConnectOutcome::AlreadyConnected.notice("bob").level, Level::Info);
        assert_eq!(
            ConnectOutcome::Created.notice("bob").message,
            "You are now connected with bob"
        );
        assert_eq!(DisconnectOutcome::NotConnected.notice().level, Level::Error);
        assert_eq!(DisconnectOutcome::Removed.notice().level, Level::Success);
    }
}
