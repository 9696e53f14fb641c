//! Page raster data carried by print jobs.
//!
//! Every page of a job opens with a [`PAGE_PARAMS`](ops::PAGE_PARAMS)
//! command, streams its compressed raster in data commands and closes with
//! [`RASTER_END`](ops::RASTER_END). A [`RasterCollector`] follows that
//! sequence across decoded commands and hands back one [`RasterPage`] per
//! closed page. The raster stays compressed; only the framing is removed.

use capt_proto::{Command, CommandDecoder, DecodeError, Direction, Header, opcode::ops};
use log::{debug, trace, warn};
use thiserror::Error;

/// Number of leading bytes that identify a job file.
pub const MAGIC_SIZE: usize = 8;

/// Protocol generation a job was written for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CaptVersion {
    Capt1,
    Capt2,
}

impl CaptVersion {
    const CAPT1_MAGIC: [u8; MAGIC_SIZE] = [0x01, 0x00, 0x18, 0x00, 0xCE, 0xDA, 0xDE, 0xFA];
    const CAPT2_MAGIC: [u8; MAGIC_SIZE] = [0x01, 0x00, 0x28, 0x00, 0xCE, 0xDA, 0xDE, 0xFA];

    /// Identifies the protocol generation from the first bytes of a job.
    pub fn from_magic(data: &[u8]) -> Option<Self> {
        match data.first_chunk::<MAGIC_SIZE>()? {
            &Self::CAPT1_MAGIC => Some(Self::Capt1),
            &Self::CAPT2_MAGIC => Some(Self::Capt2),
            _ => None,
        }
    }

    /// Compression used for page raster data.
    pub const fn codec(self) -> Codec {
        match self {
            Self::Capt1 => Codec::Scoa,
            Self::Capt2 => Codec::Hiscoa,
        }
    }
}

/// Raster compression scheme, told apart by the command carrying the data.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Codec {
    /// Carried in [`PRINT_DATA`](ops::PRINT_DATA).
    Scoa,
    /// Carried in [`HISCOA_DATA`](ops::HISCOA_DATA).
    Hiscoa,
}

impl Codec {
    pub const fn from_data_opcode(opcode: u16) -> Option<Self> {
        match opcode {
            ops::PRINT_DATA => Some(Self::Scoa),
            ops::HISCOA_DATA => Some(Self::Hiscoa),
            _ => None,
        }
    }

    pub const fn data_opcode(self) -> u16 {
        match self {
            Self::Scoa => ops::PRINT_DATA,
            Self::Hiscoa => ops::HISCOA_DATA,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Scoa => "SCOA",
            Self::Hiscoa => "HISCOA",
        }
    }
}

/// The compressed raster of one page.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RasterPage {
    /// One-based position of the page in the job.
    pub number: usize,
    /// `None` if the page carried no data and the job's version is unknown.
    pub codec: Option<Codec>,
    /// Bytes per raster line, if the page parameters held it.
    pub line_size: Option<u64>,
    /// Raster lines on the page, if the page parameters held it.
    pub lines: Option<u64>,
    #[cfg_attr(feature = "serde_bytes", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
}

impl RasterPage {
    /// Page width in dots.
    pub fn width(&self) -> Option<u64> {
        self.line_size?.checked_mul(8)
    }

    /// Text header describing the page, for writing the data out raw.
    ///
    /// Holds the codec name, the width and height in dots and the data size,
    /// one item per line. Unknown values are written as zero.
    pub fn raw_header(&self) -> String {
        format!(
            "{}\n{} {}\n{}\n",
            self.codec.map_or("RAW", Codec::name),
            self.width().unwrap_or(0),
            self.lines.unwrap_or(0),
            self.data.len()
        )
    }
}

/// Groups raster data from decoded commands into pages.
///
/// Only device-bound commands are considered. Containers are searched for
/// nested raster commands.
#[derive(Debug, Clone, Default)]
pub struct RasterCollector {
    codec: Option<Codec>,
    current: Option<RasterPage>,
    pages: usize,
}

impl RasterCollector {
    /// Creates a collector accepting data in either codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector that only gathers the codec of `version`.
    pub fn for_version(version: CaptVersion) -> Self {
        Self {
            codec: Some(version.codec()),
            ..Self::default()
        }
    }

    /// Whether a page has been opened and not closed yet.
    pub fn in_page(&self) -> bool {
        self.current.is_some()
    }

    /// Number of pages opened so far.
    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Follows one top-level command, returning the pages it closes.
    pub fn push(&mut self, command: &Command) -> Vec<RasterPage> {
        let mut closed = Vec::new();
        if command.direction != Direction::DeviceBound {
            return closed;
        }

        for command in command.walk() {
            match command.opcode {
                ops::PAGE_PARAMS => self.open(command),
                ops::RASTER_END => closed.extend(self.close()),
                opcode => {
                    if let Some(codec) = Codec::from_data_opcode(opcode) {
                        self.append(codec, &command.params);
                    }
                }
            }
        }

        closed
    }

    /// Hands back the open page, if any, without waiting for its end.
    pub fn take_unfinished(&mut self) -> Option<RasterPage> {
        self.current.take()
    }

    fn open(&mut self, command: &Command) {
        if let Some(page) = self.current.take() {
            warn!(
                "Page {} never ended, dropping {} byte(s) of raster data.",
                page.number,
                page.data.len()
            );
        }

        self.pages += 1;
        let dimension = |name: &str| command.field(name).and_then(|field| field.value.as_unsigned());
        let page = RasterPage {
            number: self.pages,
            codec: self.codec,
            line_size: dimension("raster_line_size"),
            lines: dimension("raster_lines"),
            data: Vec::new(),
        };
        debug!(
            "Page {} opened ({:?} byte(s) per line, {:?} line(s)).",
            page.number, page.line_size, page.lines
        );
        self.current = Some(page);
    }

    fn append(&mut self, codec: Codec, data: &[u8]) {
        if self.codec.is_some_and(|expected| expected != codec) {
            trace!("Skipping {} data outside the job's codec.", codec.name());
            return;
        }

        let Some(page) = self.current.as_mut() else {
            warn!(
                "Dropping {} byte(s) of {} data sent outside a page.",
                data.len(),
                codec.name()
            );
            return;
        };

        match page.codec {
            Some(existing) if existing != codec => {
                warn!(
                    "Page {} mixes {} and {} data, keeping the former.",
                    page.number,
                    existing.name(),
                    codec.name()
                );
            }
            _ => {
                page.codec = Some(codec);
                page.data.extend_from_slice(data);
            }
        }
    }

    fn close(&mut self) -> Option<RasterPage> {
        let Some(page) = self.current.take() else {
            debug!("Raster end without an open page.");
            return None;
        };

        debug!(
            "Page {} closed with {} byte(s) of raster data.",
            page.number,
            page.data.len()
        );
        Some(page)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("Job does not start with a known CAPT magic.")]
    UnknownMagic,

    #[error("Message at offset {offset} declares {size} byte(s), less than its header.")]
    UndersizedMessage { offset: usize, size: u16 },

    #[error("Message at offset {offset} runs past the end of the job.")]
    Truncated { offset: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The pages of a job file.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Job {
    pub version: CaptVersion,
    /// Number of top-level messages in the job.
    pub messages: usize,
    pub pages: Vec<RasterPage>,
}

/// Reads a job file: the device-bound message stream a driver produces.
///
/// The stream starts with a magic message naming the protocol generation and
/// is otherwise a plain run of messages, each directly after the last.
///
/// # Errors
///
/// Returns a [`JobError`] if the magic is unknown or a message does not fit
/// the job.
pub fn read_job(data: &[u8]) -> Result<Job, JobError> {
    let version = CaptVersion::from_magic(data).ok_or(JobError::UnknownMagic)?;
    debug!("Reading {version:?} job of {} byte(s).", data.len());

    let decoder = CommandDecoder::new();
    let mut collector = RasterCollector::for_version(version);
    let mut pages = Vec::new();
    let mut messages = 0;
    let mut offset = 0;

    while offset < data.len() {
        let rest = &data[offset..];
        let header = Header::peek(rest).ok_or(JobError::Truncated { offset })?;
        if !header.is_sized() {
            return Err(JobError::UndersizedMessage {
                offset,
                size: header.size,
            });
        }
        let message = rest
            .get(..header.size as usize)
            .ok_or(JobError::Truncated { offset })?;

        let decoded = decoder.decode(message, Direction::DeviceBound)?;
        for kind in &decoded.diagnostics {
            trace!("Job offset {offset}: {kind}");
        }
        pages.extend(collector.push(&decoded.command));

        messages += 1;
        offset += message.len();
    }

    if let Some(page) = collector.take_unfinished() {
        warn!("Job ends inside page {}.", page.number);
    }

    Ok(Job {
        version,
        messages,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(opcode: u16, params: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + params.len());
        bytes.extend_from_slice(&opcode.to_le_bytes());
        bytes.extend_from_slice(&((4 + params.len()) as u16).to_le_bytes());
        bytes.extend_from_slice(params);
        bytes
    }

    fn page_params(line_size: u16, lines: u16) -> Vec<u8> {
        let mut params = [0; 30];
        params[26..28].copy_from_slice(&line_size.to_le_bytes());
        params[28..30].copy_from_slice(&lines.to_le_bytes());
        message(ops::PAGE_PARAMS, &params)
    }

    fn decode(bytes: &[u8]) -> Command {
        CommandDecoder::new()
            .decode(bytes, Direction::DeviceBound)
            .unwrap()
            .command
    }

    #[test]
    fn magic_identifies_version() {
        let capt1 = [0x01, 0x00, 0x18, 0x00, 0xCE, 0xDA, 0xDE, 0xFA, 0x00];
        let capt2 = [0x01, 0x00, 0x28, 0x00, 0xCE, 0xDA, 0xDE, 0xFA];

        assert_eq!(CaptVersion::from_magic(&capt1), Some(CaptVersion::Capt1));
        assert_eq!(CaptVersion::from_magic(&capt2), Some(CaptVersion::Capt2));
        assert_eq!(CaptVersion::from_magic(&capt2[..7]), None);
        assert_eq!(CaptVersion::from_magic(&[0xA0, 0xA0, 0x04, 0x00, 0, 0, 0, 0]), None);
        assert_eq!(CaptVersion::Capt2.codec().data_opcode(), ops::HISCOA_DATA);
    }

    #[test]
    fn data_is_gathered_until_raster_end() {
        let mut collector = RasterCollector::new();

        assert!(collector.push(&decode(&page_params(4, 3))).is_empty());
        assert!(collector.push(&decode(&message(ops::PRINT_DATA, &[0x9A; 4]))).is_empty());
        assert!(collector.push(&decode(&message(ops::NOP, &[0x00; 4]))).is_empty());
        assert!(collector.push(&decode(&message(ops::PRINT_DATA, &[0x9B; 4]))).is_empty());
        let pages = collector.push(&decode(&message(ops::RASTER_END, &[])));

        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.number, 1);
        assert_eq!(page.codec, Some(Codec::Scoa));
        assert_eq!(page.width(), Some(32));
        assert_eq!(page.lines, Some(3));
        assert_eq!(page.data, [0x9A, 0x9A, 0x9A, 0x9A, 0x9B, 0x9B, 0x9B, 0x9B]);
        assert_eq!(page.raw_header(), "SCOA\n32 3\n8\n");
        assert!(!collector.in_page());

        // Data after the end belongs to no page.
        assert!(collector.push(&decode(&message(ops::PRINT_DATA, &[0x9C; 4]))).is_empty());
        assert_eq!(collector.take_unfinished(), None);
    }

    #[test]
    fn raster_inside_containers_is_found() {
        let mut container = Vec::new();
        container.extend(page_params(2, 1));
        container.extend(message(ops::HISCOA_DATA, &[0x01, 0x02]));
        container.extend(message(ops::RASTER_END, &[]));

        let pages = RasterCollector::new().push(&decode(&message(ops::MULTI_COMMAND, &container)));

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].codec, Some(Codec::Hiscoa));
        assert_eq!(pages[0].data, [0x01, 0x02]);
    }

    #[test]
    fn other_codec_and_replies_are_ignored() {
        let mut collector = RasterCollector::for_version(CaptVersion::Capt2);
        collector.push(&decode(&page_params(2, 1)));
        collector.push(&decode(&message(ops::PRINT_DATA, &[0xFF; 2])));
        collector.push(&decode(&message(ops::HISCOA_DATA, &[0x11; 2])));

        let mut reply = decode(&message(ops::HISCOA_DATA, &[0xEE; 2]));
        reply.direction = Direction::HostBound;
        collector.push(&reply);

        let page = collector.take_unfinished().unwrap();
        assert_eq!(page.codec, Some(Codec::Hiscoa));
        assert_eq!(page.data, [0x11, 0x11]);
    }

    #[test]
    fn unended_page_is_dropped_by_the_next() {
        let mut collector = RasterCollector::new();
        collector.push(&decode(&page_params(1, 1)));
        collector.push(&decode(&message(ops::PRINT_DATA, &[0x01])));
        collector.push(&decode(&page_params(1, 1)));
        let pages = collector.push(&decode(&message(ops::RASTER_END, &[])));

        assert_eq!(collector.page_count(), 2);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 2);
        assert_eq!(pages[0].codec, None);
        assert!(pages[0].data.is_empty());
        assert_eq!(pages[0].raw_header(), "RAW\n8 1\n0\n");
    }

    #[test]
    fn job_file_is_split_into_pages() {
        let mut job = message(0x0001, &[0xCE, 0xDA, 0xDE, 0xFA]);
        job[2] = 0x18;
        job.resize(0x18, 0);
        for fill in [0x9A, 0x9B] {
            job.extend(page_params(2, 2));
            job.extend(message(ops::PRINT_DATA, &[fill; 3]));
            job.extend(message(ops::HISCOA_DATA, &[0x00; 3]));
            job.extend(message(ops::RASTER_END, &[]));
        }

        let read = read_job(&job).unwrap();

        assert_eq!(read.version, CaptVersion::Capt1);
        assert_eq!(read.messages, 9);
        assert_eq!(read.pages.len(), 2);
        assert_eq!(read.pages[0].data, [0x9A; 3]);
        assert_eq!(read.pages[1].number, 2);
        assert_eq!(read.pages[1].data, [0x9B; 3]);
    }

    #[test]
    fn malformed_jobs_are_rejected() {
        let mut job = vec![0x01, 0x00, 0x28, 0x00, 0xCE, 0xDA, 0xDE, 0xFA];
        job.resize(0x28, 0);

        assert_eq!(read_job(&job[..0x20]), Err(JobError::Truncated { offset: 0 }));
        assert_eq!(read_job(&[0xA0, 0xA0, 0x04, 0x00, 0, 0, 0, 0]), Err(JobError::UnknownMagic));

        let mut undersized = job.clone();
        undersized.extend([0xA0, 0xA0, 0x02, 0x00]);
        assert_eq!(
            read_job(&undersized),
            Err(JobError::UndersizedMessage { offset: 0x28, size: 2 })
        );

        let mut cut = job;
        cut.extend([0xA0, 0xA0]);
        assert_eq!(read_job(&cut), Err(JobError::Truncated { offset: 0x28 }));
    }
}
