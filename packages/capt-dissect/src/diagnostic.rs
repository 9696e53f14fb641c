use core::fmt;

use capt_proto::{Category, DiagnosticKind};

use crate::channel::Channel;

/// A trace problem, located by the packet and channel it was found on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub sequence: u64,
    pub channel: Channel,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub const fn new(sequence: u64, channel: Channel, kind: DiagnosticKind) -> Self {
        Self {
            sequence,
            channel,
            kind,
        }
    }

    pub const fn category(&self) -> Category {
        self.kind.category()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}] {}", self.sequence, self.channel, self.kind)
    }
}
