use capt_proto::CommandDecoder;
use thiserror::Error;

use crate::channel::{EndpointId, HOST_ENDPOINT};

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConfigError {
    #[error("Container depth limit must be at least 1.")]
    ZeroContainerDepth,

    #[error("Container depth limit of {depth} exceeds the maximum of {limit}.")]
    ContainerDepthTooLarge { depth: usize, limit: usize },
}

/// Settings for a [`Dissector`](crate::Dissector).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DissectorConfig {
    /// Endpoint of the host. Messages sent to it are device replies.
    pub host_endpoint: EndpointId,
    /// How many containers deep the decoder expands before giving up.
    pub max_container_depth: usize,
    /// Whether complete messages bundled behind another in one packet are
    /// emitted on their own.
    pub split_concatenated: bool,
}

impl Default for DissectorConfig {
    fn default() -> Self {
        Self {
            host_endpoint: HOST_ENDPOINT,
            max_container_depth: CommandDecoder::DEFAULT_MAX_DEPTH,
            split_concatenated: true,
        }
    }
}

impl DissectorConfig {
    pub fn with_host_endpoint(mut self, host: EndpointId) -> Self {
        self.host_endpoint = host;
        self
    }

    pub fn with_max_container_depth(mut self, depth: usize) -> Self {
        self.max_container_depth = depth;
        self
    }

    pub fn with_split_concatenated(mut self, split: bool) -> Self {
        self.split_concatenated = split;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_container_depth == 0 {
            return Err(ConfigError::ZeroContainerDepth);
        }
        if self.max_container_depth > CommandDecoder::MAX_DEPTH_LIMIT {
            return Err(ConfigError::ContainerDepthTooLarge {
                depth: self.max_container_depth,
                limit: CommandDecoder::MAX_DEPTH_LIMIT,
            });
        }

        Ok(())
    }
}
