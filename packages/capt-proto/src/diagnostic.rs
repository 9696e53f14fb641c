//! Problems found while reading a trace.
//!
//! None of these stop decoding. A damaged or partial trace still produces
//! every command that can be recovered, and each problem is reported once
//! next to them.

use thiserror::Error;

/// The four families of trace problems.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Category {
    /// Bytes that no registered opcode or pending message explains.
    UnknownOpcode,
    /// A fragment that cannot be paired with a header without guessing.
    AmbiguousContinuation,
    /// A message whose byte count differs from its declared size.
    SizeMismatch,
    /// A container whose nested messages do not line up with its size.
    MalformedContainer,
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum DiagnosticKind {
    #[error("Unrecognized opcode {opcode:#06X}.")]
    UnknownOpcode { opcode: u16 },

    /// Too few bytes to even hold an opcode.
    #[error("Insufficient data: {len} byte(s) do not hold an opcode.")]
    InsufficientData { len: usize },

    /// Starts with a registered opcode but is no valid header, and no
    /// message is pending on its channel.
    #[error(
        "Fragment of {len} byte(s) starting with {opcode:#06X} has no pending header on its channel."
    )]
    OrphanedFragment { opcode: u16, len: usize },

    /// A new header arrived while an earlier message on the same channel was
    /// still incomplete. The incomplete message is dropped.
    #[error(
        "Header from packet {header_sequence} was still owed {remaining} byte(s) when a new header arrived; discarded."
    )]
    InterruptedSegment { header_sequence: u64, remaining: usize },

    #[error(
        "Continuation in packet {sequence} does not follow its header in packet {header_sequence}."
    )]
    OutOfOrderContinuation { header_sequence: u64, sequence: u64 },

    #[error("Message declares {declared} byte(s) but {actual} byte(s) were seen.")]
    SizeMismatch { declared: u16, actual: usize },

    #[error(
        "Nested message at offset {offset} needs {needed} byte(s) but only {available} remain in the container."
    )]
    ContainerOverrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Nested message at offset {offset} declares an impossible size of {size} byte(s).")]
    UndersizedNested { offset: usize, size: u16 },

    #[error("Containers nested {depth} deep exceed the limit of {limit}.")]
    NestingTooDeep { depth: usize, limit: usize },
}

impl DiagnosticKind {
    pub const fn category(&self) -> Category {
        match self {
            Self::UnknownOpcode { .. } | Self::InsufficientData { .. } => Category::UnknownOpcode,
            Self::OrphanedFragment { .. }
            | Self::InterruptedSegment { .. }
            | Self::OutOfOrderContinuation { .. } => Category::AmbiguousContinuation,
            Self::SizeMismatch { .. } => Category::SizeMismatch,
            Self::ContainerOverrun { .. }
            | Self::UndersizedNested { .. }
            | Self::NestingTooDeep { .. } => Category::MalformedContainer,
        }
    }
}
