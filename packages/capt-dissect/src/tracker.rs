//! Reassembly of messages split across transport packets.
//!
//! A device answering a status request often sends the header of its reply in
//! one packet and the rest in one or more following packets. The header
//! declares the full size, so a header with fewer bytes behind it than
//! declared opens a pending segment on its channel, and the packets after it
//! on that channel fill it up until the declared size is reached.
//!
//! Continuations carry no header of their own, so they are paired with a
//! pending segment purely by channel. Devices keep at most one transfer in
//! flight per channel, which makes that pairing unambiguous; when a trace
//! breaks that rule the tracker reports it instead of guessing.

use std::collections::HashMap;

use capt_proto::{Decode, DiagnosticKind, Header, Opcode};
use log::{debug, trace, warn};

use crate::{channel::Channel, diagnostic::Diagnostic, packet::RawPacket};

/// An incomplete message waiting for the rest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSegment {
    header: Header,
    header_sequence: u64,
    bytes: Vec<u8>,
    remaining: usize,
    segments: usize,
}

impl PendingSegment {
    pub fn header(&self) -> Header {
        self.header
    }

    /// Sequence number of the packet holding the header.
    pub fn header_sequence(&self) -> u64 {
        self.header_sequence
    }

    /// Bytes collected so far, header included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes still owed before the message is complete.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Packets collected so far, header packet included.
    pub fn segments(&self) -> usize {
        self.segments
    }
}

/// A complete message, ready to be decoded.
///
/// Always holds at least as many bytes as its header declares. Any bytes
/// beyond that were reported as a size mismatch when the message was
/// assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalMessage {
    channel: Channel,
    header: Header,
    header_sequence: u64,
    completed_sequence: u64,
    segments: usize,
    bytes: Vec<u8>,
}

impl LogicalMessage {
    fn whole(packet: &RawPacket, header: Header, bytes: &[u8]) -> Self {
        Self {
            channel: packet.channel(),
            header,
            header_sequence: packet.sequence,
            completed_sequence: packet.sequence,
            segments: 1,
            bytes: bytes.to_vec(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn opcode(&self) -> u16 {
        self.header.opcode
    }

    pub fn declared_size(&self) -> u16 {
        self.header.size
    }

    /// Sequence number of the packet holding the header.
    pub fn header_sequence(&self) -> u64 {
        self.header_sequence
    }

    /// Sequence number of the packet that completed the message.
    pub fn completed_sequence(&self) -> u64 {
        self.completed_sequence
    }

    /// Number of transport packets the message was spread over.
    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn is_reassembled(&self) -> bool {
        self.segments > 1
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ChannelState {
    #[default]
    Idle,
    AwaitingContinuation {
        remaining: usize,
    },
}

/// What feeding one packet produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub messages: Vec<LogicalMessage>,
    pub diagnostics: Vec<Diagnostic>,
    /// State of the packet's channel afterwards.
    pub state: ChannelState,
}

impl Step {
    fn flag(&mut self, packet: &RawPacket, kind: DiagnosticKind) {
        let diagnostic = Diagnostic::new(packet.sequence, packet.channel(), kind);
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }
}

/// Per-channel reassembly state.
///
/// Packets must be fed in capture order. Call [`reset`](Self::reset) before
/// feeding packets from an unrelated capture.
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    pending: HashMap<Channel, PendingSegment>,
    split_concatenated: bool,
}

impl Default for SegmentTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentTracker {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            split_concatenated: true,
        }
    }

    /// Whether complete messages trailing a self-contained one in the same
    /// packet are emitted on their own. Enabled by default.
    pub fn with_split_concatenated(mut self, split: bool) -> Self {
        self.split_concatenated = split;
        self
    }

    /// Feeds the next packet of the capture.
    pub fn feed(&mut self, packet: &RawPacket) -> Step {
        let channel = packet.channel();
        let payload = packet.payload.as_slice();
        let mut step = Step::default();

        trace!(
            "#{} [{}] {} byte(s): {:02X?}",
            packet.sequence,
            channel,
            payload.len(),
            payload
        );

        if payload.is_empty() {
            trace!("Ignoring empty packet #{}.", packet.sequence);
        } else if let Some(header) = Header::recognize(payload) {
            if let Some(stale) = self.pending.remove(&channel) {
                step.flag(
                    packet,
                    DiagnosticKind::InterruptedSegment {
                        header_sequence: stale.header_sequence,
                        remaining: stale.remaining,
                    },
                );
            }
            self.open(packet, header, &mut step);
        } else if self.pending.contains_key(&channel) {
            self.continue_segment(packet, &mut step);
        } else {
            step.flag(packet, unexplained(payload));
        }

        step.state = self.state(channel);
        step
    }

    /// Handles a packet that starts with a valid header.
    fn open(&mut self, packet: &RawPacket, header: Header, step: &mut Step) {
        let payload = packet.payload.as_slice();

        if header.size as usize > payload.len() {
            self.hold(packet, header, payload);
            return;
        }

        let mut cursor = 0;
        let mut current = header;
        loop {
            let end = cursor + current.size as usize;
            let rest = &payload[end..];
            let next = Header::recognize(rest).filter(|_| self.split_concatenated);

            match next {
                Some(next) if next.size as usize <= rest.len() => {
                    step.messages
                        .push(LogicalMessage::whole(packet, current, &payload[cursor..end]));
                    cursor = end;
                    current = next;
                }
                // A bundled message cut off by the end of the packet continues
                // in the next one.
                Some(next) => {
                    step.messages
                        .push(LogicalMessage::whole(packet, current, &payload[cursor..end]));
                    self.hold(packet, next, rest);
                    break;
                }
                None => {
                    // Whatever cannot be split off stays with the last message.
                    if !rest.is_empty() {
                        step.flag(
                            packet,
                            DiagnosticKind::SizeMismatch {
                                declared: current.size,
                                actual: payload.len() - cursor,
                            },
                        );
                    }
                    step.messages
                        .push(LogicalMessage::whole(packet, current, &payload[cursor..]));
                    break;
                }
            }
        }

        if step.messages.len() > 1 {
            debug!(
                "Split packet #{} into {} messages.",
                packet.sequence,
                step.messages.len()
            );
        }
    }

    /// Opens a pending segment for `header`, whose message starts at `bytes`
    /// and runs past the end of `packet`.
    fn hold(&mut self, packet: &RawPacket, header: Header, bytes: &[u8]) {
        let remaining = header.size as usize - bytes.len();
        trace!(
            "#{} opens {:#06X} on [{}], {} byte(s) to go.",
            packet.sequence,
            header.opcode,
            packet.channel(),
            remaining
        );
        self.pending.insert(
            packet.channel(),
            PendingSegment {
                header,
                header_sequence: packet.sequence,
                bytes: bytes.to_vec(),
                remaining,
                segments: 1,
            },
        );
    }

    /// Handles a headerless packet on a channel with a pending segment.
    fn continue_segment(&mut self, packet: &RawPacket, step: &mut Step) {
        let channel = packet.channel();
        let Some(pending) = self.pending.get_mut(&channel) else {
            return;
        };

        if packet.sequence <= pending.header_sequence {
            step.flag(
                packet,
                DiagnosticKind::OutOfOrderContinuation {
                    header_sequence: pending.header_sequence,
                    sequence: packet.sequence,
                },
            );
            return;
        }

        let len = packet.payload.len();
        pending.bytes.extend_from_slice(&packet.payload);
        pending.segments += 1;

        if len < pending.remaining {
            pending.remaining -= len;
            trace!(
                "#{} continues #{}, {} byte(s) to go.",
                packet.sequence,
                pending.header_sequence,
                pending.remaining
            );
            return;
        }

        let excess = len - pending.remaining;
        let Some(done) = self.pending.remove(&channel) else {
            return;
        };

        if excess > 0 {
            step.flag(
                packet,
                DiagnosticKind::SizeMismatch {
                    declared: done.header.size,
                    actual: done.bytes.len(),
                },
            );
        }

        debug!(
            "Reassembled {:#06X} on [{}] from {} packets (#{} to #{}).",
            done.header.opcode, channel, done.segments, done.header_sequence, packet.sequence
        );

        step.messages.push(LogicalMessage {
            channel,
            header: done.header,
            header_sequence: done.header_sequence,
            completed_sequence: packet.sequence,
            segments: done.segments,
            bytes: done.bytes,
        });
    }

    pub fn state(&self, channel: Channel) -> ChannelState {
        match self.pending.get(&channel) {
            Some(pending) => ChannelState::AwaitingContinuation {
                remaining: pending.remaining,
            },
            None => ChannelState::Idle,
        }
    }

    pub fn pending(&self, channel: Channel) -> Option<&PendingSegment> {
        self.pending.get(&channel)
    }

    /// Channels holding an incomplete message, in order.
    pub fn pending_channels(&self) -> Vec<Channel> {
        let mut channels: Vec<_> = self.pending.keys().copied().collect();
        channels.sort_unstable();
        channels
    }

    /// Whether any channel holds an incomplete message, as happens at the end
    /// of a truncated capture.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of channels holding an incomplete message.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops all per-channel state.
    pub fn reset(&mut self) {
        debug!(
            "Resetting segment tracker, dropping {} pending segment(s).",
            self.pending.len()
        );
        self.pending.clear();
    }
}

/// Describes a headerless packet that no pending segment explains.
fn unexplained(payload: &[u8]) -> DiagnosticKind {
    match u16::decode(&mut &payload[..]) {
        Ok(opcode) if Opcode::from_raw(opcode).is_some() => DiagnosticKind::OrphanedFragment {
            opcode,
            len: payload.len(),
        },
        Ok(opcode) => DiagnosticKind::UnknownOpcode { opcode },
        Err(_) => DiagnosticKind::InsufficientData { len: payload.len() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::HOST_ENDPOINT;

    const DEVICE: u32 = 2;

    fn reply(sequence: u64, payload: &[u8]) -> RawPacket {
        RawPacket::new(sequence, DEVICE, HOST_ENDPOINT, payload)
    }

    #[test]
    fn short_header_awaits_continuation() {
        let mut tracker = SegmentTracker::new();

        let step = tracker.feed(&reply(1, &[0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB]));

        assert!(step.messages.is_empty());
        assert!(step.diagnostics.is_empty());
        assert_eq!(step.state, ChannelState::AwaitingContinuation { remaining: 2 });

        let pending = tracker.pending(Channel::new(DEVICE, HOST_ENDPOINT)).unwrap();
        assert_eq!(pending.header_sequence(), 1);
        assert_eq!(pending.bytes(), [0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB]);
    }

    #[test]
    fn continuation_completes_message() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB]));

        let step = tracker.feed(&reply(2, &[0xCC, 0xDD]));

        assert_eq!(step.state, ChannelState::Idle);
        assert!(step.diagnostics.is_empty());
        let [message] = step.messages.as_slice() else {
            panic!("expected one message, got {:?}", step.messages);
        };
        assert_eq!(
            message.bytes(),
            [0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert_eq!(message.header_sequence(), 1);
        assert_eq!(message.completed_sequence(), 2);
        assert_eq!(message.segments(), 2);
        assert!(!tracker.has_pending());
    }

    #[test]
    fn partial_continuation_keeps_waiting() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x0A, 0x00]));

        let step = tracker.feed(&reply(2, &[0x01, 0x02, 0x03]));

        assert!(step.messages.is_empty());
        assert_eq!(step.state, ChannelState::AwaitingContinuation { remaining: 3 });
    }

    #[test]
    fn overlong_continuation_is_flagged() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x06, 0x00]));

        let step = tracker.feed(&reply(2, &[0x01, 0x02, 0x03]));

        assert_eq!(step.messages.len(), 1);
        assert_eq!(step.messages[0].bytes().len(), 7);
        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::SizeMismatch {
                declared: 6,
                actual: 7
            }
        );
    }

    #[test]
    fn unknown_bytes_on_idle_channel() {
        let mut tracker = SegmentTracker::new();

        let step = tracker.feed(&reply(1, &[0x00, 0x00]));

        assert!(step.messages.is_empty());
        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::UnknownOpcode { opcode: 0x0000 }
        );
    }

    #[test]
    fn single_byte_is_insufficient() {
        let mut tracker = SegmentTracker::new();

        let step = tracker.feed(&reply(1, &[0xA1]));

        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::InsufficientData { len: 1 }
        );
    }

    #[test]
    fn registered_opcode_without_valid_header_is_orphaned() {
        let mut tracker = SegmentTracker::new();

        let step = tracker.feed(&reply(1, &[0xA1, 0xA1, 0x02]));

        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::OrphanedFragment {
                opcode: 0xA1A1,
                len: 3
            }
        );
    }

    #[test]
    fn new_header_interrupts_pending_segment() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x08, 0x00]));

        let step = tracker.feed(&reply(2, &[0xA8, 0xA0, 0x04, 0x00]));

        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::InterruptedSegment {
                header_sequence: 1,
                remaining: 4
            }
        );
        assert_eq!(step.messages.len(), 1);
        assert_eq!(step.messages[0].opcode(), 0xA0A8);
        assert_eq!(step.state, ChannelState::Idle);
    }

    #[test]
    fn continuation_must_follow_header() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(5, &[0xA1, 0xA1, 0x08, 0x00]));

        let step = tracker.feed(&reply(5, &[0x01, 0x02, 0x03, 0x04]));

        assert!(step.messages.is_empty());
        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::OutOfOrderContinuation {
                header_sequence: 5,
                sequence: 5
            }
        );
        assert_eq!(step.state, ChannelState::AwaitingContinuation { remaining: 4 });
    }

    #[test]
    fn other_channels_do_not_complete_segment() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x08, 0x00]));

        let step = tracker.feed(&RawPacket::new(2, 7, HOST_ENDPOINT, [1, 2, 3, 4]));

        assert!(step.messages.is_empty());
        assert_eq!(step.diagnostics.len(), 1);
        assert_eq!(tracker.pending_channels(), [Channel::new(DEVICE, HOST_ENDPOINT)]);
    }

    #[test]
    fn bundled_messages_are_split() {
        let mut tracker = SegmentTracker::new();

        let step = tracker.feed(&reply(
            1,
            &[0xA0, 0xA0, 0x04, 0x00, 0xA9, 0xE0, 0x06, 0x00, 0x01, 0x02],
        ));

        assert!(step.diagnostics.is_empty());
        let opcodes: Vec<_> = step.messages.iter().map(LogicalMessage::opcode).collect();
        assert_eq!(opcodes, [0xA0A0, 0xE0A9]);
    }

    #[test]
    fn unsplittable_trailer_stays_with_last_message() {
        let mut tracker = SegmentTracker::new();

        let step = tracker.feed(&reply(1, &[0xA0, 0xA0, 0x04, 0x00, 0x00, 0x00, 0x08, 0x00]));

        assert_eq!(step.messages.len(), 1);
        assert_eq!(step.messages[0].bytes().len(), 8);
        assert_eq!(
            step.diagnostics[0].kind,
            DiagnosticKind::SizeMismatch {
                declared: 4,
                actual: 8
            }
        );
        assert!(!tracker.has_pending());
    }

    #[test]
    fn incomplete_bundled_message_awaits_continuation() {
        let mut tracker = SegmentTracker::new();

        let first = tracker.feed(&reply(
            1,
            &[0xA0, 0xA0, 0x04, 0x00, 0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB],
        ));

        assert!(first.diagnostics.is_empty());
        assert_eq!(first.messages.len(), 1);
        assert_eq!(first.messages[0].opcode(), 0xA0A0);
        assert_eq!(first.messages[0].bytes().len(), 4);
        assert_eq!(first.state, ChannelState::AwaitingContinuation { remaining: 2 });

        let second = tracker.feed(&reply(2, &[0xCC, 0xDD]));

        assert!(second.diagnostics.is_empty());
        let [message] = second.messages.as_slice() else {
            panic!("expected one message, got {:?}", second.messages);
        };
        assert_eq!(message.opcode(), 0xA1A1);
        assert_eq!(message.header_sequence(), 1);
        assert_eq!(
            message.bytes(),
            [0xA1, 0xA1, 0x08, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn splitting_can_be_disabled() {
        let mut tracker = SegmentTracker::new().with_split_concatenated(false);

        let step = tracker.feed(&reply(1, &[0xA0, 0xA0, 0x04, 0x00, 0xA0, 0xA0, 0x04, 0x00]));

        assert_eq!(step.messages.len(), 1);
        assert_eq!(step.diagnostics.len(), 1);
    }

    #[test]
    fn empty_packets_are_ignored() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x08, 0x00]));

        let step = tracker.feed(&reply(2, &[]));

        assert!(step.messages.is_empty());
        assert!(step.diagnostics.is_empty());
        assert_eq!(step.state, ChannelState::AwaitingContinuation { remaining: 4 });
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = SegmentTracker::new();
        tracker.feed(&reply(1, &[0xA1, 0xA1, 0x08, 0x00]));
        tracker.feed(&RawPacket::new(2, HOST_ENDPOINT, DEVICE, [0xA1, 0xA1, 0x10, 0x00]));
        assert_eq!(tracker.pending_channels().len(), 2);
        assert_eq!(tracker.len(), 2);

        tracker.reset();

        assert!(tracker.is_empty());
        assert!(!tracker.has_pending());
        assert_eq!(tracker.state(Channel::new(DEVICE, HOST_ENDPOINT)), ChannelState::Idle);
    }
}
