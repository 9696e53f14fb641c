//! Decoding of the Canon Advanced Printing Technology (CAPT) printer control protocol.
//!
//! Every CAPT message starts with a four byte [`Header`]: a little-endian opcode followed by a
//! little-endian size covering the whole message, header included. Opcodes fall into two families
//! sharing the same channel: status exchanges (the host asks, the device answers with a message
//! using the same opcode) and device control commands. One reserved opcode,
//! [`MULTI_COMMAND`](opcode::ops::MULTI_COMMAND), bundles several complete messages into a single
//! container.
//!
//! This crate is transport agnostic. It turns one complete message into a [`Command`] tree using
//! the [`CommandDecoder`]; reassembling messages split across transport packets is left to the
//! caller.

#![no_std]

extern crate alloc;

pub mod command;
pub mod diagnostic;
pub mod opcode;
pub mod schema;

mod decode;
mod header;

pub use command::{Command, CommandDecoder, CommandFlags, Decoded};
pub use decode::{Decode, DecodeError, DecodeErrorKind};
pub use diagnostic::{Category, DiagnosticKind};
pub use header::Header;
pub use opcode::{Classification, Opcode, classify, mnemonic};
pub use schema::{Direction, Field, FieldSpec, FieldValue, Unit};

/// Size of the opcode and size fields that start every message.
pub const HEADER_SIZE: usize = 4;
