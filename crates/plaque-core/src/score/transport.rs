use std::time::Duration;

use serde::Serialize;

use super::channel::ChannelStatus;

/// Externally visible transport label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Polling,
    Disconnected,
}

/// Active score transport. Exactly one strategy is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Disconnected,
    Push,
    Polling { every: Duration },
}

impl Transport {
    pub const fn connection_status(self) -> ConnectionStatus {
        match self {
            Self::Disconnected => ConnectionStatus::Disconnected,
            Self::Push => ConnectionStatus::Connected,
            Self::Polling { .. } => ConnectionStatus::Polling,
        }
    }

    pub const fn is_polling(self) -> bool {
        matches!(self, Self::Polling { .. })
    }

    /// Next transport after the push channel reports `status`.
    ///
    /// `Connecting` never starts polling on its own: an established
    /// fallback keeps running while the channel reconnects.
    pub fn on_channel_status(self, status: ChannelStatus, poll_every: Duration) -> Self {
        match (status, self) {
            (ChannelStatus::Open, _) => Self::Push,
            (ChannelStatus::Error, Self::Polling { every }) => Self::Polling { every },
            (ChannelStatus::Error, _) => Self::Polling { every: poll_every },
            (ChannelStatus::Connecting, Self::Polling { every }) => Self::Polling { every },
            (ChannelStatus::Connecting, _) => Self::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERY: Duration = Duration::from_millis(3_000);

    #[test]
    fn error_switches_to_polling() {
        let next = Transport::Disconnected.on_channel_status(ChannelStatus::Error, EVERY);
        assert_eq!(next, Transport::Polling { every: EVERY });
        assert_eq!(next.connection_status(), ConnectionStatus::Polling);

        let from_push = Transport::Push.on_channel_status(ChannelStatus::Error, EVERY);
        assert!(from_push.is_polling());
    }

    #[test]
    fn connecting_does_not_start_polling() {
        assert_eq!(
            Transport::Disconnected.on_channel_status(ChannelStatus::Connecting, EVERY),
            Transport::Disconnected
        );
        assert_eq!(
            Transport::Push.on_channel_status(ChannelStatus::Connecting, EVERY),
            Transport::Disconnected
        );
    }

    #[test]
    fn polling_survives_reconnect_attempts_until_open() {
        let polling = Transport::Polling { every: EVERY };
        assert_eq!(
            polling.on_channel_status(ChannelStatus::Connecting, EVERY),
            polling
        );
        assert_eq!(
            polling.on_channel_status(ChannelStatus::Open, EVERY),
            Transport::Push
        );
    }

    #[test]
    fn connection_status_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Polling).expect("serializes");
        assert_eq!(json, "\"polling\"");
    }
}
