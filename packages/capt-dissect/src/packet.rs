use crate::{
    channel::{Channel, EndpointId},
    hex::{ParseHexError, parse_hex},
};

/// A transport packet as captured, before any reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Position in the capture. Unique and increasing.
    pub sequence: u64,
    pub src: EndpointId,
    pub dst: EndpointId,
    pub payload: Vec<u8>,
}

impl RawPacket {
    pub fn new(sequence: u64, src: EndpointId, dst: EndpointId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            src,
            dst,
            payload: payload.into(),
        }
    }

    /// Builds a packet whose payload is given as a hex dump.
    pub fn from_hex(
        sequence: u64,
        src: EndpointId,
        dst: EndpointId,
        dump: &str,
    ) -> Result<Self, ParseHexError> {
        Ok(Self::new(sequence, src, dst, parse_hex(dump)?))
    }

    pub const fn channel(&self) -> Channel {
        Channel::new(self.src, self.dst)
    }
}
