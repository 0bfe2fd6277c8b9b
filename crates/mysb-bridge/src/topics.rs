//! Topic taxonomy and request classification.
//!
//! | Kind            | Request topic                | Reply topic                  |
//! |-----------------|------------------------------|------------------------------|
//! | Id              | `{sub}/255/255/3/0/3`        | `{pub}/255/255/3/0/4`        |
//! | Firmware config | `{sub}/{node}/255/4/0/0`     | `{pub}/{node}/255/4/0/1`     |
//! | Firmware data   | `{sub}/{node}/255/4/0/2`     | `{pub}/{node}/255/4/0/3`     |
//! | Bootloader      | `{bootloader}/{node}/{cmd}`  | staged for the next config   |

use thiserror::Error;

/// Segments after the sub prefix: node, child, command, ack, type.
const NODE_TOPIC_SEGMENTS: usize = 5;

/// Segments after the bootloader prefix: node, command.
const BOOTLOADER_TOPIC_SEGMENTS: usize = 2;

/// Broadcast node id, used by nodes that do not yet have an id.
pub const BROADCAST_NODE: &str = "255";

/// Errors raised while classifying a topic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Topic under a known prefix has the wrong number of segments.
    #[error("topic {topic:?} has {actual} segments after the prefix, expected {expected}")]
    SegmentCount {
        /// The offending topic.
        topic: String,
        /// Segments required.
        expected: usize,
        /// Segments found.
        actual: usize,
    },

    /// Bootloader command segment is not a number.
    #[error("bootloader command {command:?} in topic {topic:?} is not a number")]
    InvalidCommand {
        /// The offending topic.
        topic: String,
        /// The command segment.
        command: String,
    },
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A node without an id asks for one.
    IdRequest,
    /// A node asks which firmware it should run.
    FirmwareConfig {
        /// Requesting node.
        node_id: String,
    },
    /// A node asks for one block of firmware.
    FirmwareData {
        /// Requesting node.
        node_id: String,
    },
    /// An operator issued a bootloader command for a node.
    Bootloader {
        /// Target node.
        node_id: String,
        /// Command code.
        command: u16,
    },
    /// Anything else.
    Unrecognized,
}

impl Request {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::IdRequest => "id",
            Request::FirmwareConfig { .. } => "firmware_config",
            Request::FirmwareData { .. } => "firmware_data",
            Request::Bootloader { .. } => "bootloader",
            Request::Unrecognized => "unrecognized",
        }
    }

    /// Node the request concerns, if it names one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Request::FirmwareConfig { node_id }
            | Request::FirmwareData { node_id }
            | Request::Bootloader { node_id, .. } => Some(node_id),
            Request::IdRequest | Request::Unrecognized => None,
        }
    }
}

/// Topic prefixes and the patterns derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    sub: String,
    publish: String,
    bootloader: String,
}

impl Topics {
    /// Create a taxonomy from the three configured prefixes.
    pub fn new(
        sub: impl Into<String>,
        publish: impl Into<String>,
        bootloader: impl Into<String>,
    ) -> Self {
        Topics {
            sub: sub.into(),
            publish: publish.into(),
            bootloader: bootloader.into(),
        }
    }

    /// Subscribe prefix.
    pub fn sub(&self) -> &str {
        &self.sub
    }

    /// Publish prefix.
    pub fn publish(&self) -> &str {
        &self.publish
    }

    /// Bootloader command prefix.
    pub fn bootloader(&self) -> &str {
        &self.bootloader
    }

    /// Patterns the transport must subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            format!("{}/255/255/3/0/3", self.sub),
            format!("{}/+/255/4/0/0", self.sub),
            format!("{}/+/255/4/0/2", self.sub),
            format!("{}/+/+", self.bootloader),
        ]
    }

    /// Reply topic for an id request.
    pub fn id_response(&self) -> String {
        format!("{}/255/255/3/0/4", self.publish)
    }

    /// Reply topic for a firmware config request.
    pub fn firmware_config_response(&self, node_id: &str) -> String {
        format!("{}/{}/255/4/0/1", self.publish, node_id)
    }

    /// Reply topic for a firmware data request.
    pub fn firmware_data_response(&self, node_id: &str) -> String {
        format!("{}/{}/255/4/0/3", self.publish, node_id)
    }

    /// Classify an inbound topic.
    ///
    /// Topics outside both prefixes are [`Request::Unrecognized`]. Topics
    /// under a prefix with the wrong segment count are an error.
    pub fn classify(&self, topic: &str) -> Result<Request, TopicError> {
        if let Some(rest) = strip_prefix(topic, &self.bootloader) {
            let segments: Vec<&str> = rest.split('/').collect();
            if segments.len() != BOOTLOADER_TOPIC_SEGMENTS {
                return Err(TopicError::SegmentCount {
                    topic: topic.to_string(),
                    expected: BOOTLOADER_TOPIC_SEGMENTS,
                    actual: segments.len(),
                });
            }

            let command = segments[1]
                .parse::<u16>()
                .map_err(|_| TopicError::InvalidCommand {
                    topic: topic.to_string(),
                    command: segments[1].to_string(),
                })?;

            return Ok(Request::Bootloader {
                node_id: segments[0].to_string(),
                command,
            });
        }

        let Some(rest) = strip_prefix(topic, &self.sub) else {
            return Ok(Request::Unrecognized);
        };

        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() != NODE_TOPIC_SEGMENTS {
            return Err(TopicError::SegmentCount {
                topic: topic.to_string(),
                expected: NODE_TOPIC_SEGMENTS,
                actual: segments.len(),
            });
        }

        let node_id = segments[0];
        let request = match segments[1..] {
            ["255", "3", "0", "3"] if node_id == BROADCAST_NODE => Request::IdRequest,
            ["255", "4", "0", "0"] => Request::FirmwareConfig {
                node_id: node_id.to_string(),
            },
            ["255", "4", "0", "2"] => Request::FirmwareData {
                node_id: node_id.to_string(),
            },
            _ => Request::Unrecognized,
        };
        Ok(request)
    }
}

/// Strip `prefix` and the following '/' from `topic`.
fn strip_prefix<'a>(topic: &'a str, prefix: &str) -> Option<&'a str> {
    topic.strip_prefix(prefix)?.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Topics {
        Topics::new("mysensors_rx", "mysensors_tx", "mysensors/bootloader")
    }

    #[test]
    fn test_subscriptions() {
        assert_eq!(
            topics().subscriptions(),
            vec![
                "mysensors_rx/255/255/3/0/3",
                "mysensors_rx/+/255/4/0/0",
                "mysensors_rx/+/255/4/0/2",
                "mysensors/bootloader/+/+",
            ]
        );
    }

    #[test]
    fn test_request_node_id() {
        let topics = topics();
        let node = |topic: &str| topics.classify(topic).unwrap().node_id().map(str::to_string);
        assert_eq!(node("mysensors/bootloader/7/1"), Some("7".to_string()));
        assert_eq!(node("mysensors_rx/7/255/4/0/0"), Some("7".to_string()));
        assert_eq!(node("mysensors_rx/7/255/4/0/2"), Some("7".to_string()));
        assert_eq!(node("mysensors_rx/255/255/3/0/3"), None);
        assert_eq!(node("elsewhere/7"), None);
    }

    #[test]
    fn test_response_topics() {
        let topics = topics();
        assert_eq!(topics.id_response(), "mysensors_tx/255/255/3/0/4");
        assert_eq!(topics.firmware_config_response("12"), "mysensors_tx/12/255/4/0/1");
        assert_eq!(topics.firmware_data_response("12"), "mysensors_tx/12/255/4/0/3");
    }

    #[test]
    fn test_classify_requests() {
        let topics = topics();
        assert_eq!(
            topics.classify("mysensors_rx/255/255/3/0/3"),
            Ok(Request::IdRequest)
        );
        assert_eq!(
            topics.classify("mysensors_rx/7/255/4/0/0"),
            Ok(Request::FirmwareConfig {
                node_id: "7".to_string()
            })
        );
        assert_eq!(
            topics.classify("mysensors_rx/7/255/4/0/2"),
            Ok(Request::FirmwareData {
                node_id: "7".to_string()
            })
        );
        assert_eq!(
            topics.classify("mysensors/bootloader/2/2"),
            Ok(Request::Bootloader {
                node_id: "2".to_string(),
                command: 2
            })
        );
    }

    #[test]
    fn test_empty_node_id() {
        assert_eq!(
            topics().classify("mysensors_rx//255/4/0/0"),
            Ok(Request::FirmwareConfig {
                node_id: String::new()
            })
        );
    }

    #[test]
    fn test_id_request_requires_broadcast_node() {
        assert_eq!(
            topics().classify("mysensors_rx/4/255/3/0/3"),
            Ok(Request::Unrecognized)
        );
    }

    #[test]
    fn test_unrelated_topics() {
        let topics = topics();
        assert_eq!(topics.classify("other/1/2/3/4/5"), Ok(Request::Unrecognized));
        assert_eq!(topics.classify("mysensors_rxx/1/255/4/0/0"), Ok(Request::Unrecognized));
        assert_eq!(topics.classify("mysensors_rx/1/1/1/1/1"), Ok(Request::Unrecognized));
        assert_eq!(topics.classify("mysensors_rx"), Ok(Request::Unrecognized));
    }

    #[test]
    fn test_wrong_segment_count() {
        assert_eq!(
            topics().classify("mysensors_rx/1/255/4"),
            Err(TopicError::SegmentCount {
                topic: "mysensors_rx/1/255/4".to_string(),
                expected: 5,
                actual: 3,
            })
        );
        assert!(matches!(
            topics().classify("mysensors/bootloader/1"),
            Err(TopicError::SegmentCount { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_bad_bootloader_command() {
        assert!(matches!(
            topics().classify("mysensors/bootloader/1/erase"),
            Err(TopicError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn test_request_kind_labels() {
        assert_eq!(Request::IdRequest.kind(), "id");
        assert_eq!(Request::Unrecognized.kind(), "unrecognized");
    }
}
