//! Fixed field layouts of the messages that carry structured parameters.
//!
//! Offsets are relative to the parameter region, which starts right after the
//! four byte [`Header`](crate::Header). Each table describes the most detailed
//! layout known across device models; older models send shorter messages and
//! simply omit trailing fields, so fields past the end of a message are
//! skipped rather than treated as errors.
//!
//! Field names prefixed with `unknown_` are present on the wire but their
//! meaning has not been worked out.

use alloc::vec::Vec;
use core::fmt;

use crate::opcode::Opcode;

/// Which way a message travels.
///
/// Directional opcodes use one layout for the host's request and another for
/// the device's reply. The direction comes from the channel the message was
/// seen on, never from its contents.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Direction {
    /// Sent by the host to the device.
    DeviceBound,
    /// Sent by the device to the host.
    HostBound,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Signedness {
    Unsigned,
    Signed,
}

/// How a decoded value should be read.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum Unit {
    /// An opaque identifier, best shown in hexadecimal.
    Identifier,
    /// Length in tenths of a millimetre.
    TenthMillimetre,
    DotsPerInch,
    PagesPerHour,
    Dots,
    Bytes,
    Lines,
    Pages,
}

impl Unit {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Identifier => "",
            Self::TenthMillimetre => "x0.1 mm",
            Self::DotsPerInch => "dpi",
            Self::PagesPerHour => "pages/hour",
            Self::Dots => "dots",
            Self::Bytes => "bytes",
            Self::Lines => "lines",
            Self::Pages => "pages",
        }
    }
}

/// Layout of a single field.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    /// Width in bytes, between 1 and 8.
    pub width: usize,
    pub endian: Endian,
    pub signedness: Signedness,
    pub unit: Option<Unit>,
}

impl FieldSpec {
    /// A little-endian unsigned field without a unit.
    pub const fn unsigned(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
            endian: Endian::Little,
            signedness: Signedness::Unsigned,
            unit: None,
        }
    }

    /// A little-endian signed field without a unit.
    pub const fn signed(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            signedness: Signedness::Signed,
            ..Self::unsigned(name, offset, width)
        }
    }

    pub const fn big_endian(self) -> Self {
        Self {
            endian: Endian::Big,
            ..self
        }
    }

    pub const fn with_unit(self, unit: Unit) -> Self {
        Self {
            unit: Some(unit),
            ..self
        }
    }

    /// Reads this field out of a parameter region.
    ///
    /// Returns `None` when the region ends before the field does.
    pub fn extract(&self, params: &[u8]) -> Option<Field> {
        if self.width == 0 || self.width > 8 {
            return None;
        }
        let bytes = params.get(self.offset..self.offset.checked_add(self.width)?)?;

        let raw = match self.endian {
            Endian::Little => bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &byte| acc << 8 | byte as u64),
            Endian::Big => bytes.iter().fold(0u64, |acc, &byte| acc << 8 | byte as u64),
        };

        let value = match self.signedness {
            Signedness::Unsigned => FieldValue::Unsigned(raw),
            Signedness::Signed => {
                let shift = 64 - 8 * self.width as u32;
                FieldValue::Signed(((raw << shift) as i64) >> shift)
            }
        };

        Some(Field {
            name: self.name,
            value,
            unit: self.unit,
        })
    }
}

/// A typed value read from a message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
}

impl FieldValue {
    /// The value as an unsigned integer, if it is one.
    pub const fn as_unsigned(self) -> Option<u64> {
        match self {
            Self::Unsigned(value) => Some(value),
            Self::Signed(_) => None,
        }
    }

    /// The value as a signed integer, if it fits.
    pub fn as_signed(self) -> Option<i64> {
        match self {
            Self::Unsigned(value) => i64::try_from(value).ok(),
            Self::Signed(value) => Some(value),
        }
    }
}

/// A decoded field: name, value and unit.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Field {
    pub name: &'static str,
    pub value: FieldValue,
    pub unit: Option<Unit>,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value, self.unit) {
            (FieldValue::Unsigned(value), Some(Unit::Identifier)) => {
                write!(f, "{}: {value:#06X}", self.name)
            }
            (FieldValue::Unsigned(value), unit) => {
                write!(f, "{}: {value}", self.name)?;
                write_suffix(f, unit)
            }
            (FieldValue::Signed(value), unit) => {
                write!(f, "{}: {value}", self.name)?;
                write_suffix(f, unit)
            }
        }
    }
}

fn write_suffix(f: &mut fmt::Formatter<'_>, unit: Option<Unit>) -> fmt::Result {
    match unit.map(Unit::suffix) {
        Some(suffix) if !suffix.is_empty() => write!(f, " ({suffix})"),
        _ => Ok(()),
    }
}

/// Decodes every field of `schema` present in `params`, in table order.
pub fn decode_fields(schema: &[FieldSpec], params: &[u8]) -> Vec<Field> {
    schema.iter().filter_map(|spec| spec.extract(params)).collect()
}

/// The layout used for `opcode` travelling in `direction`, if it has one.
///
/// Requests under a [directional](Opcode::is_directional) opcode carry no
/// parameters, so only the device's reply has a layout.
pub const fn schema_for(opcode: u16, direction: Direction) -> Option<&'static [FieldSpec]> {
    let Some(opcode) = Opcode::from_raw(opcode) else {
        return None;
    };
    if opcode.is_directional() && matches!(direction, Direction::DeviceBound) {
        return None;
    }

    match opcode {
        Opcode::Ident => Some(IDENTIFICATION),
        Opcode::ExtendedStatus => Some(EXTENDED_STATUS),
        Opcode::PageCount => Some(PAGE_COUNT),
        Opcode::PageParams => Some(PAGE_PARAMETERS),
        Opcode::CompressionParams => Some(COMPRESSION_PARAMETERS),
        Opcode::JobSetup => Some(JOB_SETUP),
        _ => None,
    }
}

const ID: Unit = Unit::Identifier;
const MM: Unit = Unit::TenthMillimetre;

/// Device identification, sent in reply to [`IDENT`](crate::opcode::ops::IDENT).
///
/// CAPT 1 devices stop after `unknown_d`, CAPT 2 devices after `unknown_i`.
pub const IDENTIFICATION: &[FieldSpec] = &[
    FieldSpec::unsigned("version_a", 0, 2).with_unit(ID),
    FieldSpec::unsigned("product_id", 2, 2).with_unit(ID),
    FieldSpec::unsigned("firmware_version", 4, 2).with_unit(ID),
    FieldSpec::unsigned("buffer_size", 6, 2).with_unit(Unit::Bytes),
    FieldSpec::unsigned("buffers", 8, 2),
    FieldSpec::unsigned("unknown_b", 10, 2).with_unit(ID),
    FieldSpec::unsigned("unknown_c", 12, 2).with_unit(ID),
    FieldSpec::unsigned("unknown_d", 14, 2).with_unit(ID),
    // CAPT 2.0 and later
    FieldSpec::unsigned("throughput", 16, 2).with_unit(Unit::PagesPerHour),
    FieldSpec::unsigned("unknown_e", 18, 2).with_unit(ID),
    FieldSpec::unsigned("mp_tray_max_width", 20, 2).with_unit(MM),
    FieldSpec::unsigned("duplex_max_width", 22, 2).with_unit(MM),
    FieldSpec::unsigned("mp_tray_max_length", 24, 2).with_unit(MM),
    FieldSpec::unsigned("unknown_f", 26, 2).with_unit(ID),
    FieldSpec::unsigned("duplex_max_length", 28, 2).with_unit(MM),
    FieldSpec::unsigned("unknown_g", 30, 2).with_unit(ID),
    FieldSpec::unsigned("mp_tray_min_width", 32, 2).with_unit(MM),
    FieldSpec::unsigned("duplex_min_width", 34, 2).with_unit(MM),
    FieldSpec::unsigned("mp_tray_min_length", 36, 2).with_unit(MM),
    FieldSpec::unsigned("duplex_min_length", 38, 2).with_unit(MM),
    FieldSpec::unsigned("margin_top", 40, 1).with_unit(MM),
    FieldSpec::unsigned("margin_bottom", 41, 1).with_unit(MM),
    FieldSpec::unsigned("margin_left", 42, 1).with_unit(MM),
    FieldSpec::unsigned("margin_right", 43, 1).with_unit(MM),
    FieldSpec::unsigned("resolution_x", 44, 2).with_unit(Unit::DotsPerInch),
    FieldSpec::unsigned("resolution_y", 46, 2).with_unit(Unit::DotsPerInch),
    FieldSpec::unsigned("version_b", 48, 1),
    FieldSpec::unsigned("engine_type", 49, 2).with_unit(ID),
    FieldSpec::unsigned("unknown_i", 51, 1).with_unit(ID),
    // CAPT 3.0 and later
    FieldSpec::unsigned("unknown_j", 52, 2).with_unit(ID),
    FieldSpec::unsigned("unknown_k", 54, 2).with_unit(ID),
    FieldSpec::unsigned("color_throughput", 56, 2).with_unit(Unit::PagesPerHour),
    FieldSpec::unsigned("unknown_m", 58, 2).with_unit(ID),
];

/// Reply to [`EXTENDED_STATUS`](crate::opcode::ops::EXTENDED_STATUS).
pub const EXTENDED_STATUS: &[FieldSpec] = &[
    FieldSpec::unsigned("status_0", 0, 2).with_unit(ID),
    FieldSpec::unsigned("status_1", 2, 2).with_unit(ID),
    FieldSpec::unsigned("status_2", 4, 2).with_unit(ID),
    FieldSpec::unsigned("status_3", 6, 2).with_unit(ID),
    FieldSpec::unsigned("status_4", 8, 2).with_unit(ID),
    FieldSpec::unsigned("status_5", 10, 2).with_unit(ID),
    FieldSpec::unsigned("unknown_a", 12, 2).with_unit(ID),
    FieldSpec::unsigned("page_decoding", 14, 2),
    FieldSpec::unsigned("page_printing", 16, 2),
    FieldSpec::unsigned("page_out", 18, 2),
    FieldSpec::unsigned("page_completed", 20, 2),
];

/// Reply to [`PAGE_COUNT`](crate::opcode::ops::PAGE_COUNT).
pub const PAGE_COUNT: &[FieldSpec] =
    &[FieldSpec::unsigned("total_pages", 0, 4).with_unit(Unit::Pages)];

/// Page and raster geometry, sent before each page.
pub const PAGE_PARAMETERS: &[FieldSpec] = &[
    FieldSpec::unsigned("model_id", 2, 2).with_unit(ID),
    FieldSpec::unsigned("margin_height", 22, 2).with_unit(Unit::Dots),
    FieldSpec::unsigned("margin_width", 24, 2).with_unit(Unit::Dots),
    FieldSpec::unsigned("raster_line_size", 26, 2).with_unit(Unit::Bytes),
    FieldSpec::unsigned("raster_lines", 28, 2).with_unit(Unit::Lines),
    FieldSpec::unsigned("paper_width", 30, 2).with_unit(Unit::Dots),
    FieldSpec::unsigned("paper_height", 32, 2).with_unit(Unit::Dots),
];

/// HiSCoA decompression parameters (CAPT 2 and later).
pub const COMPRESSION_PARAMETERS: &[FieldSpec] = &[
    FieldSpec::signed("origin_3", 0, 1),
    FieldSpec::signed("origin_5", 1, 1),
    FieldSpec::signed("origin_0", 2, 1),
    FieldSpec::signed("origin_m1", 3, 1),
    FieldSpec::signed("origin_m3", 4, 1),
    FieldSpec::unsigned("band_lines", 6, 2).with_unit(Unit::Lines),
];

/// Job setup, sent once at the start of a job.
pub const JOB_SETUP: &[FieldSpec] = &[
    FieldSpec::unsigned("job_flags", 0, 2).with_unit(ID),
    FieldSpec::unsigned("job_id", 2, 2),
    FieldSpec::unsigned("year", 4, 2),
    FieldSpec::unsigned("month", 6, 1),
    FieldSpec::unsigned("day", 7, 1),
    FieldSpec::unsigned("hour", 8, 1),
    FieldSpec::unsigned("minute", 9, 1),
    FieldSpec::unsigned("second", 10, 1),
];
