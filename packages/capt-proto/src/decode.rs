use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    type_name: &'static str,
}

impl DecodeError {
    pub fn new<T>(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            type_name: core::any::type_name::<T>(),
        }
    }

    pub const fn kind(&self) -> DecodeErrorKind {
        self.kind
    }
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Failed to decode {}: {}", self.type_name, self.kind)
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Message was too short.")]
    UnexpectedEnd,
}

/// A type that can be reconstructed (decoded) from a raw sequence of bytes.
///
/// Implementors of this trait define how to parse their binary representation
/// from an input buffer. The input slice will be advanced by the number of bytes
/// successfully consumed during decoding.
pub trait Decode {
    /// Attempts to decode `Self` from the beginning of the provided byte slice.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the input is insufficient to decode a
    /// complete value of this type.
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

macro_rules! impl_decode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
                    let bytes = data
                        .get(..size_of::<$t>())
                        .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
                    let mut raw = [0; size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    *data = &data[size_of::<$t>()..];
                    Ok(Self::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_decode_for_primitive!(u8, u16, u32, u64, i8, i16, i32, i64);

impl<const N: usize> Decode for [u8; N] {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let (bytes, rest) = data
            .split_first_chunk::<N>()
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
        *data = rest;
        Ok(*bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{Decode, DecodeErrorKind};

    #[test]
    fn little_endian_advances_slice() {
        let mut data: &[u8] = &[0xA1, 0xA1, 0x08, 0x00, 0xAA];

        assert_eq!(u16::decode(&mut data).unwrap(), 0xA1A1);
        assert_eq!(u16::decode(&mut data).unwrap(), 0x0008);
        assert_eq!(data, &[0xAA]);
    }

    #[test]
    fn short_input_leaves_slice_untouched() {
        let mut data: &[u8] = &[0xA1];

        let err = u16::decode(&mut data).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnexpectedEnd);
        assert_eq!(data, &[0xA1]);
    }
}
