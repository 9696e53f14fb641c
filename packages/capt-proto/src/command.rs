//! Turning complete messages into [`Command`] trees.

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::{
    HEADER_SIZE,
    decode::{Decode, DecodeError},
    diagnostic::DiagnosticKind,
    header::Header,
    opcode::{self, Classification},
    schema::{self, Direction, Field},
};

bitflags! {
    /// Annotations attached to a decoded [`Command`].
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct CommandFlags: u8 {
        /// The message was stitched together from several transport packets.
        const REASSEMBLED = 1 << 0;

        /// More bytes were seen than the header declared.
        const SIZE_MISMATCH = 1 << 1;

        /// Fewer bytes were available than the header declared.
        const TRUNCATED = 1 << 2;

        /// The nested messages of this container did not line up.
        const MALFORMED_CONTAINER = 1 << 3;
    }
}

/// A decoded CAPT message.
///
/// Only [`MULTI_COMMAND`](opcode::ops::MULTI_COMMAND) containers have
/// children. Only opcodes with a [schema](crate::schema) have fields; every
/// other command keeps its parameters as raw bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Command {
    pub opcode: u16,
    pub mnemonic: &'static str,
    pub classification: Classification,
    pub direction: Direction,

    /// Size from the header, including the header itself.
    pub declared_size: u16,

    /// Parameter bytes, following the header up to the declared size.
    #[cfg_attr(feature = "serde_bytes", serde(with = "serde_bytes"))]
    pub params: Vec<u8>,

    pub children: Vec<Command>,
    pub fields: Vec<Field>,
    pub flags: CommandFlags,
}

impl Command {
    /// Looks up a decoded field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_container(&self) -> bool {
        self.classification == Classification::Container
    }

    /// This command and all of its descendants, depth first.
    pub fn walk(&self) -> impl Iterator<Item = &Command> {
        let mut stack = alloc::vec![self];
        core::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

/// A decoded command along with the problems found while decoding it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Decoded {
    pub command: Command,
    pub diagnostics: Vec<DiagnosticKind>,
}

/// Decodes complete messages into [`Command`]s.
///
/// Containers are expanded recursively. The wire format puts no limit on how
/// deep containers may nest, so the decoder stops expanding past
/// [`max_depth`](Self::max_depth) levels and reports the rest as malformed.
/// The depth itself never exceeds [`MAX_DEPTH_LIMIT`](Self::MAX_DEPTH_LIMIT).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CommandDecoder {
    max_depth: usize,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDecoder {
    pub const DEFAULT_MAX_DEPTH: usize = 4;

    /// Upper bound on the depth limit, keeping recursion shallow.
    pub const MAX_DEPTH_LIMIT: usize = 64;

    pub const fn new() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a decoder expanding containers `max_depth` levels deep,
    /// clamped to [`MAX_DEPTH_LIMIT`](Self::MAX_DEPTH_LIMIT).
    pub const fn with_max_depth(max_depth: usize) -> Self {
        let max_depth = if max_depth > Self::MAX_DEPTH_LIMIT {
            Self::MAX_DEPTH_LIMIT
        } else {
            max_depth
        };

        Self { max_depth }
    }

    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decodes one complete message travelling in `direction`.
    ///
    /// Bytes past the declared size are not parameters; the command is
    /// flagged [`SIZE_MISMATCH`](CommandFlags::SIZE_MISMATCH) and reporting
    /// them is left to whoever assembled the buffer. A buffer shorter than its
    /// declared size is decoded as far as it goes, flagged
    /// [`TRUNCATED`](CommandFlags::TRUNCATED) and reported.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if `message` is too short to hold a header.
    pub fn decode(&self, message: &[u8], direction: Direction) -> Result<Decoded, DecodeError> {
        let header = Header::decode(&mut &message[..])?;
        let mut diagnostics = Vec::new();
        let command = self.decode_message(header, message, direction, 0, &mut diagnostics);

        Ok(Decoded {
            command,
            diagnostics,
        })
    }

    fn decode_message(
        &self,
        header: Header,
        message: &[u8],
        direction: Direction,
        depth: usize,
        diagnostics: &mut Vec<DiagnosticKind>,
    ) -> Command {
        let declared = header.size as usize;
        let classification = opcode::classify(header.opcode);
        let mut flags = CommandFlags::empty();

        if message.len() < declared {
            flags |= CommandFlags::TRUNCATED;
            diagnostics.push(DiagnosticKind::SizeMismatch {
                declared: header.size,
                actual: message.len(),
            });
        } else if message.len() > declared {
            flags |= CommandFlags::SIZE_MISMATCH;
        }

        let end = declared.min(message.len());
        let params = message.get(HEADER_SIZE..end).unwrap_or_default();

        let mut children = Vec::new();
        let mut fields = Vec::new();

        if classification == Classification::Container {
            if depth >= self.max_depth {
                flags |= CommandFlags::MALFORMED_CONTAINER;
                diagnostics.push(DiagnosticKind::NestingTooDeep {
                    depth: depth + 1,
                    limit: self.max_depth,
                });
            } else if !self.decode_children(
                params,
                header.param_len(),
                direction,
                depth + 1,
                &mut children,
                diagnostics,
            ) {
                flags |= CommandFlags::MALFORMED_CONTAINER;
            }
        } else if let Some(schema) = schema::schema_for(header.opcode, direction) {
            fields = schema::decode_fields(schema, params);
        }

        Command {
            opcode: header.opcode,
            mnemonic: opcode::mnemonic(header.opcode),
            classification,
            direction,
            declared_size: header.size,
            params: params.to_vec(),
            children,
            fields,
            flags,
        }
    }

    /// Decodes the nested messages packed into a container's parameters.
    ///
    /// `region` holds the parameter bytes actually present, `declared_len`
    /// the number the container's header promised. Returns `false` if the
    /// nested messages did not line up with the container.
    fn decode_children(
        &self,
        region: &[u8],
        declared_len: usize,
        direction: Direction,
        depth: usize,
        children: &mut Vec<Command>,
        diagnostics: &mut Vec<DiagnosticKind>,
    ) -> bool {
        let mut cursor = 0;

        while cursor < region.len() {
            let rest = &region[cursor..];
            let offset = HEADER_SIZE + cursor;

            let Some(header) = Header::peek(rest) else {
                if cursor + HEADER_SIZE > declared_len {
                    diagnostics.push(DiagnosticKind::ContainerOverrun {
                        offset,
                        needed: HEADER_SIZE,
                        available: declared_len.saturating_sub(cursor),
                    });
                    return false;
                }
                return true;
            };

            if !header.is_sized() {
                diagnostics.push(DiagnosticKind::UndersizedNested {
                    offset,
                    size: header.size,
                });
                return false;
            }

            let size = header.size as usize;
            let Some(nested) = rest.get(..size) else {
                // A nested message cut short by a truncated buffer is already
                // reported on the container itself.
                if cursor + size > declared_len {
                    diagnostics.push(DiagnosticKind::ContainerOverrun {
                        offset,
                        needed: size,
                        available: declared_len.saturating_sub(cursor),
                    });
                    return false;
                }
                return true;
            };

            children.push(self.decode_message(header, nested, direction, depth, diagnostics));
            cursor += size;
        }

        true
    }
}
