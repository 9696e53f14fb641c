//! Dissector for captured CAPT printer traffic.
//!
//! A printer and its host exchange CAPT messages over a transport that is free
//! to cut them into several packets. A [`Dissector`] takes the captured packets
//! in order, puts split messages back together with a [`SegmentTracker`], and
//! decodes every complete message into a [`Command`](capt_proto::Command).
//! Anything in the capture that does not add up is reported as a
//! [`Diagnostic`] instead of stopping the dissection.
//!
//! Print jobs can also be taken apart page by page with a
//! [`RasterCollector`], or read straight from a job file with [`read_job`].

pub use capt_proto as protocol;

pub mod channel;
pub mod config;
pub mod diagnostic;
pub mod dissector;
pub mod hex;
pub mod packet;
pub mod raster;
pub mod tracker;

pub use channel::{Channel, EndpointId, HOST_ENDPOINT};
pub use config::{ConfigError, DissectorConfig};
pub use diagnostic::Diagnostic;
pub use dissector::{DissectedCommand, Dissection, Dissector};
pub use hex::{ParseHexError, parse_hex};
pub use packet::RawPacket;
pub use raster::{CaptVersion, Codec, Job, JobError, RasterCollector, RasterPage, read_job};
pub use tracker::{ChannelState, LogicalMessage, PendingSegment, SegmentTracker, Step};
