//! A dissection session over one capture.

use std::borrow::Borrow;

use capt_proto::{Command, CommandDecoder, CommandFlags, Decoded, DiagnosticKind};
use log::{debug, trace, warn};

use crate::{
    channel::Channel,
    config::{ConfigError, DissectorConfig},
    diagnostic::Diagnostic,
    packet::RawPacket,
    tracker::{LogicalMessage, SegmentTracker},
};

/// A top-level command and where in the capture it came from.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DissectedCommand {
    /// Packet holding the message header.
    pub sequence: u64,
    /// Packet holding the last byte of the message. Equal to `sequence`
    /// unless the message was reassembled.
    pub completed_sequence: u64,
    pub channel: Channel,
    pub command: Command,
}

/// Everything produced by one or more packets.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Dissection {
    pub commands: Vec<DissectedCommand>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Dissection {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.diagnostics.is_empty()
    }

    pub fn extend(&mut self, other: Dissection) {
        self.commands.extend(other.commands);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Turns a stream of captured packets into commands.
///
/// Owns the reassembly state for one capture. Feed packets in capture order
/// and [`reset`](Self::reset) before starting on an unrelated capture.
///
/// ```
/// use capt_dissect::{Dissector, RawPacket, HOST_ENDPOINT};
///
/// let mut dissector = Dissector::default();
///
/// let first = dissector.feed(&RawPacket::new(1, 2, HOST_ENDPOINT, [0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB]));
/// assert!(first.is_empty());
///
/// let second = dissector.feed(&RawPacket::new(2, 2, HOST_ENDPOINT, [0xCC, 0xDD]));
/// assert_eq!(second.commands[0].command.mnemonic, "CAPT_IDENT");
/// ```
#[derive(Debug, Clone)]
pub struct Dissector {
    config: DissectorConfig,
    tracker: SegmentTracker,
    decoder: CommandDecoder,
}

impl Default for Dissector {
    fn default() -> Self {
        Self::from_valid(DissectorConfig::default())
    }
}

impl Dissector {
    /// Creates a dissector with the given settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the settings are invalid.
    pub fn new(config: DissectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: DissectorConfig) -> Self {
        Self {
            tracker: SegmentTracker::new().with_split_concatenated(config.split_concatenated),
            decoder: CommandDecoder::with_max_depth(config.max_container_depth),
            config,
        }
    }

    pub fn config(&self) -> &DissectorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &SegmentTracker {
        &self.tracker
    }

    /// Feeds the next packet of the capture.
    pub fn feed(&mut self, packet: &RawPacket) -> Dissection {
        let step = self.tracker.feed(packet);
        let mut output = Dissection {
            commands: Vec::with_capacity(step.messages.len()),
            diagnostics: step.diagnostics,
        };

        for message in step.messages {
            self.decode_message(message, &mut output);
        }

        output
    }

    /// Feeds a run of packets, in order, and collects everything they produce.
    pub fn dissect<I>(&mut self, packets: I) -> Dissection
    where
        I: IntoIterator,
        I::Item: Borrow<RawPacket>,
    {
        let mut output = Dissection::default();
        for packet in packets {
            output.extend(self.feed(packet.borrow()));
        }
        output
    }

    fn decode_message(&self, message: LogicalMessage, output: &mut Dissection) {
        let channel = message.channel();
        let sequence = message.header_sequence();
        let direction = channel.direction(self.config.host_endpoint);

        match self.decoder.decode(message.bytes(), direction) {
            Ok(Decoded {
                mut command,
                diagnostics,
            }) => {
                if message.is_reassembled() {
                    command.flags |= CommandFlags::REASSEMBLED;
                }

                for kind in diagnostics {
                    let diagnostic = Diagnostic::new(sequence, channel, kind);
                    warn!("{diagnostic}");
                    output.diagnostics.push(diagnostic);
                }

                trace!(
                    "#{} [{}] {} ({} byte(s), {} child(ren), {} field(s))",
                    sequence,
                    channel,
                    command.mnemonic,
                    command.declared_size,
                    command.children.len(),
                    command.fields.len()
                );

                output.commands.push(DissectedCommand {
                    sequence,
                    completed_sequence: message.completed_sequence(),
                    channel,
                    command,
                });
            }
            // The tracker only emits messages that start with a header, so this
            // is not expected to happen.
            Err(err) => {
                let diagnostic = Diagnostic::new(
                    sequence,
                    channel,
                    DiagnosticKind::InsufficientData {
                        len: message.bytes().len(),
                    },
                );
                warn!("{diagnostic} ({err})");
                output.diagnostics.push(diagnostic);
            }
        }
    }

    /// Whether a message is still waiting for continuation packets.
    pub fn has_pending(&self) -> bool {
        self.tracker.has_pending()
    }

    /// Discards all reassembly state, as before a new capture.
    pub fn reset(&mut self) {
        debug!("Resetting dissector.");
        self.tracker.reset();
    }
}
