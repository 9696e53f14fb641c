//! CAPT opcodes and their classification.

/// CAPT opcodes, as the little-endian `u16` read from the start of a message.
pub mod ops {
    // status exchanges; the device answers with the same opcode
    pub const JOB_STATUS: u16 = 0xA0A1;
    pub const EXTENDED_STATUS: u16 = 0xA0A8;
    pub const IDENT_REQUEST: u16 = 0xA1A0;
    pub const IDENT: u16 = 0xA1A1;
    pub const PAGE_COUNT: u16 = 0xA3A3;
    pub const STATUS_CHECK: u16 = 0xE0A0;

    // device control
    pub const NOP: u16 = 0xA0A0;
    pub const JOB_BEGIN: u16 = 0xA2A0;
    pub const PRINT_DATA: u16 = 0xC0A0;
    pub const PRINT_DATA_END: u16 = 0xC0A4;
    pub const PAGE_PARAMS: u16 = 0xD0A0;
    pub const RASTER_SETUP_END: u16 = 0xD0A1;
    pub const RASTER_END: u16 = 0xD0A2;
    pub const COMPRESSION_PARAMS: u16 = 0xD0A4;
    pub const FIRE: u16 = 0xE0A7;
    pub const JOB_END: u16 = 0xE0A9;
    pub const JOB_SETUP: u16 = 0xE1A1;

    /// Raster data compressed with HiSCoA (CAPT 2 and later).
    pub const HISCOA_DATA: u16 = 0x8000;

    /// Bundles several complete messages into one.
    pub const MULTI_COMMAND: u16 = 0xD0A9;
}

/// Mnemonic reported for opcodes missing from the registry.
pub const UNKNOWN_MNEMONIC: &str = "unknown";

/// What family of message an opcode belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Classification {
    /// Status or information exchange.
    Status,
    /// Device control command.
    Control,
    /// The multi-command container.
    Container,
    /// Not in the registry.
    Unrecognized,
}

/// A registered CAPT opcode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u16)]
#[non_exhaustive]
pub enum Opcode {
    JobStatus = ops::JOB_STATUS,
    ExtendedStatus = ops::EXTENDED_STATUS,
    IdentRequest = ops::IDENT_REQUEST,
    Ident = ops::IDENT,
    PageCount = ops::PAGE_COUNT,
    StatusCheck = ops::STATUS_CHECK,

    Nop = ops::NOP,
    JobBegin = ops::JOB_BEGIN,
    PrintData = ops::PRINT_DATA,
    PrintDataEnd = ops::PRINT_DATA_END,
    PageParams = ops::PAGE_PARAMS,
    RasterSetupEnd = ops::RASTER_SETUP_END,
    RasterEnd = ops::RASTER_END,
    CompressionParams = ops::COMPRESSION_PARAMS,
    Fire = ops::FIRE,
    JobEnd = ops::JOB_END,
    JobSetup = ops::JOB_SETUP,
    HiscoaData = ops::HISCOA_DATA,

    MultiCommand = ops::MULTI_COMMAND,
}

/// Opcodes whose messages are status or information exchanges.
pub const STATUS_OPCODES: &[Opcode] = &[
    Opcode::JobStatus,
    Opcode::ExtendedStatus,
    Opcode::IdentRequest,
    Opcode::Ident,
    Opcode::PageCount,
    Opcode::StatusCheck,
];

/// Opcodes whose messages control the device, the container included.
pub const CONTROL_OPCODES: &[Opcode] = &[
    Opcode::Nop,
    Opcode::JobBegin,
    Opcode::PrintData,
    Opcode::PrintDataEnd,
    Opcode::PageParams,
    Opcode::RasterSetupEnd,
    Opcode::RasterEnd,
    Opcode::CompressionParams,
    Opcode::Fire,
    Opcode::JobEnd,
    Opcode::JobSetup,
    Opcode::HiscoaData,
    Opcode::MultiCommand,
];

impl Opcode {
    /// Looks up a raw opcode in the registry.
    pub const fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            ops::JOB_STATUS => Self::JobStatus,
            ops::EXTENDED_STATUS => Self::ExtendedStatus,
            ops::IDENT_REQUEST => Self::IdentRequest,
            ops::IDENT => Self::Ident,
            ops::PAGE_COUNT => Self::PageCount,
            ops::STATUS_CHECK => Self::StatusCheck,
            ops::NOP => Self::Nop,
            ops::JOB_BEGIN => Self::JobBegin,
            ops::PRINT_DATA => Self::PrintData,
            ops::PRINT_DATA_END => Self::PrintDataEnd,
            ops::PAGE_PARAMS => Self::PageParams,
            ops::RASTER_SETUP_END => Self::RasterSetupEnd,
            ops::RASTER_END => Self::RasterEnd,
            ops::COMPRESSION_PARAMS => Self::CompressionParams,
            ops::FIRE => Self::Fire,
            ops::JOB_END => Self::JobEnd,
            ops::JOB_SETUP => Self::JobSetup,
            ops::HISCOA_DATA => Self::HiscoaData,
            ops::MULTI_COMMAND => Self::MultiCommand,
            _ => return None,
        })
    }

    pub const fn raw(self) -> u16 {
        self as u16
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::JobStatus => "CAPT_CHKJOBSTAT",
            Self::ExtendedStatus => "CAPT_CHKXSTAT",
            Self::IdentRequest => "CAPT_IDENT_REQ",
            Self::Ident => "CAPT_IDENT",
            Self::PageCount => "CAPT_PAGE_COUNT",
            Self::StatusCheck => "CAPT_CHKSTATUS",
            Self::Nop => "CAPT_NOP",
            Self::JobBegin => "CAPT_JOB_BEGIN",
            Self::PrintData => "CAPT_PRINT_DATA",
            Self::PrintDataEnd => "CAPT_PRINT_DATA_END",
            Self::PageParams => "CAPT_SET_PARM_PAGE",
            Self::RasterSetupEnd => "CAPT_RASTER_SETUP_END",
            Self::RasterEnd => "CAPT_RASTER_END",
            Self::CompressionParams => "CAPT_SET_PARM_HISCOA",
            Self::Fire => "CAPT_FIRE",
            Self::JobEnd => "CAPT_JOB_END",
            Self::JobSetup => "CAPT_JOB_SETUP",
            Self::HiscoaData => "CAPT_HISCOA_DATA",
            Self::MultiCommand => "CAPT_MULTICOMMAND",
        }
    }

    pub const fn classification(self) -> Classification {
        match self {
            Self::JobStatus
            | Self::ExtendedStatus
            | Self::IdentRequest
            | Self::Ident
            | Self::PageCount
            | Self::StatusCheck => Classification::Status,
            Self::MultiCommand => Classification::Container,
            Self::Nop
            | Self::JobBegin
            | Self::PrintData
            | Self::PrintDataEnd
            | Self::PageParams
            | Self::RasterSetupEnd
            | Self::RasterEnd
            | Self::CompressionParams
            | Self::Fire
            | Self::JobEnd
            | Self::JobSetup
            | Self::HiscoaData => Classification::Control,
        }
    }

    /// Whether requests and replies share this opcode with different layouts.
    ///
    /// The host sends these with no parameters and the device answers with
    /// the information under the same opcode.
    pub const fn is_directional(self) -> bool {
        matches!(
            self,
            Self::JobStatus | Self::ExtendedStatus | Self::Ident | Self::PageCount
        )
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(raw: u16) -> Result<Self, u16> {
        Self::from_raw(raw).ok_or(raw)
    }
}

/// Classifies a raw opcode.
pub const fn classify(raw: u16) -> Classification {
    match Opcode::from_raw(raw) {
        Some(opcode) => opcode.classification(),
        None => Classification::Unrecognized,
    }
}

/// Mnemonic of a raw opcode, or [`UNKNOWN_MNEMONIC`].
pub const fn mnemonic(raw: u16) -> &'static str {
    match Opcode::from_raw(raw) {
        Some(opcode) => opcode.mnemonic(),
        None => UNKNOWN_MNEMONIC,
    }
}
