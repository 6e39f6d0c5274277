use strum::{Display, EnumCount, EnumIter, FromRepr};

/// How the external tool probes the network.
#[derive(Default, Clone, Copy, Display, FromRepr, EnumIter, EnumCount, PartialEq, Eq, Debug)]
pub enum ScanMode {
    #[default]
    #[strum(to_string = "ARP Scan")]
    Arp,
    #[strum(to_string = "Ping Scan")]
    Ping,
}

impl ScanMode {
    pub fn previous(&self) -> Self {
        let current_index: usize = *self as usize;
        let previous_index = current_index.saturating_sub(1);
        Self::from_repr(previous_index).unwrap_or(*self)
    }

    pub fn next(&self) -> Self {
        let current_index = *self as usize;
        let next_index = current_index.saturating_add(1);
        Self::from_repr(next_index).unwrap_or(*self)
    }
}

/// Network mask appended to a bare target address.
#[derive(Clone, Copy, Display, FromRepr, EnumIter, EnumCount, PartialEq, Eq, Debug)]
pub enum CidrSuffix {
    #[strum(to_string = "/8")]
    Slash8,
    #[strum(to_string = "/16")]
    Slash16,
    #[strum(to_string = "/24")]
    Slash24,
    #[strum(to_string = "/25")]
    Slash25,
    #[strum(to_string = "/26")]
    Slash26,
    #[strum(to_string = "/27")]
    Slash27,
    #[strum(to_string = "/28")]
    Slash28,
    #[strum(to_string = "/29")]
    Slash29,
    #[strum(to_string = "/30")]
    Slash30,
}

impl Default for CidrSuffix {
    fn default() -> Self {
        CidrSuffix::Slash24
    }
}

impl CidrSuffix {
    pub fn prefix_len(&self) -> u8 {
        match self {
            CidrSuffix::Slash8 => 8,
            CidrSuffix::Slash16 => 16,
            CidrSuffix::Slash24 => 24,
            CidrSuffix::Slash25 => 25,
            CidrSuffix::Slash26 => 26,
            CidrSuffix::Slash27 => 27,
            CidrSuffix::Slash28 => 28,
            CidrSuffix::Slash29 => 29,
            CidrSuffix::Slash30 => 30,
        }
    }

    pub fn previous(&self) -> Self {
        let current_index: usize = *self as usize;
        let previous_index = current_index.saturating_sub(1);
        Self::from_repr(previous_index).unwrap_or(*self)
    }

    pub fn next(&self) -> Self {
        let current_index = *self as usize;
        let next_index = current_index.saturating_add(1);
        Self::from_repr(next_index).unwrap_or(*self)
    }
}

/// Lifecycle of one scan session.
#[derive(Default, Clone, Copy, Display, PartialEq, Eq, Debug)]
pub enum ScanState {
    #[default]
    #[strum(to_string = "Ready")]
    Idle,
    #[strum(to_string = "Waiting for password")]
    AwaitingAuth,
    #[strum(to_string = "Authenticating...")]
    Authenticating,
    #[strum(to_string = "Scanning...")]
    Running,
    #[strum(to_string = "Scan complete")]
    Completed,
    #[strum(to_string = "Scan failed")]
    Failed,
    #[strum(to_string = "Scan stopped")]
    Stopped,
}

impl ScanState {
    /// A subprocess is (or may be about to be) alive in this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ScanState::AwaitingAuth | ScanState::Authenticating | ScanState::Running
        )
    }
}

/// How a scan subprocess ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExitKind {
    /// Exit code 0, normal termination.
    Completed,
    /// Clean exit with a nonzero code.
    Code(i32),
    /// Killed by a signal or otherwise abnormal termination.
    Crashed,
    /// Terminated because the session was cancelled.
    Stopped,
}
