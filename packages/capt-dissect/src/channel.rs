use core::fmt;

use capt_proto::Direction;

/// Identifies one side of a conversation, such as a USB endpoint or a TCP peer.
pub type EndpointId = u32;

/// Endpoint id standing in for the host. No device is ever assigned this id.
pub const HOST_ENDPOINT: EndpointId = u32::MAX;

/// One direction of traffic between two endpoints.
///
/// `a -> b` and `b -> a` are different channels.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Channel {
    pub src: EndpointId,
    pub dst: EndpointId,
}

impl Channel {
    pub const fn new(src: EndpointId, dst: EndpointId) -> Self {
        Self { src, dst }
    }

    /// The channel carrying traffic the other way.
    pub const fn reversed(self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
        }
    }

    /// Direction of messages on this channel, given which endpoint is the host.
    pub const fn direction(self, host: EndpointId) -> Direction {
        if self.dst == host {
            Direction::HostBound
        } else {
            Direction::DeviceBound
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn endpoint(f: &mut fmt::Formatter<'_>, id: EndpointId) -> fmt::Result {
            if id == HOST_ENDPOINT {
                f.write_str("host")
            } else {
                write!(f, "{id}")
            }
        }

        endpoint(f, self.src)?;
        f.write_str(" -> ")?;
        endpoint(f, self.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_destination() {
        let reply = Channel::new(3, HOST_ENDPOINT);

        assert_eq!(reply.direction(HOST_ENDPOINT), Direction::HostBound);
        assert_eq!(reply.reversed().direction(HOST_ENDPOINT), Direction::DeviceBound);
        assert_ne!(reply, reply.reversed());
    }

    #[test]
    fn display_names_the_host() {
        assert_eq!(Channel::new(HOST_ENDPOINT, 2).to_string(), "host -> 2");
    }
}
