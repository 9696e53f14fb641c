use crate::{
    HEADER_SIZE,
    decode::{Decode, DecodeError},
    opcode::Opcode,
};

/// The opcode and size fields starting every CAPT message.
///
/// # Encoding
///
/// | Field    | Size | Description |
/// |----------|------|-------------|
/// | `opcode` | 2    | Little-endian [opcode](crate::opcode::ops). |
/// | `size`   | 2    | Little-endian size of the whole message, including these four bytes. |
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Header {
    pub opcode: u16,
    pub size: u16,
}

impl Header {
    /// Reads a header from the start of `data` without consuming it.
    pub fn peek(mut data: &[u8]) -> Option<Self> {
        Self::decode(&mut data).ok()
    }

    /// Reads a header from the start of `data` if it can open a new message.
    ///
    /// That is the case when the opcode is registered and the declared size
    /// can at least hold the header itself.
    pub fn recognize(data: &[u8]) -> Option<Self> {
        Self::peek(data).filter(|header| header.is_recognized() && header.is_sized())
    }

    /// Whether the opcode is registered.
    pub fn is_recognized(&self) -> bool {
        Opcode::from_raw(self.opcode).is_some()
    }

    /// Whether the declared size covers at least the header.
    pub fn is_sized(&self) -> bool {
        self.size as usize >= HEADER_SIZE
    }

    /// Number of parameter bytes the header announces.
    pub fn param_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }
}

impl Decode for Header {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let opcode = u16::decode(data)?;
        let size = u16::decode(data)?;

        Ok(Self { opcode, size })
    }
}
