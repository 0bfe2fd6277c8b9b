//! Inbound message handling.

use mysb_firmware::{FirmwareImage, FirmwareStore};
use mysb_metrics::{metric_defs, metrics};
use mysb_wire::{
    bootloader_command_name, bootloader_command_takes_id, encode_id, FirmwareConfig,
    FirmwareData, FirmwareRequest, Record,
};
use tracing::{debug, error, info, trace, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::session::SessionState;
use crate::topics::{Request, Topics};

/// Blocks between progress log lines during a transfer.
pub const PROGRESS_INTERVAL: u16 = 25;

/// A message for the transport to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Topic to publish on.
    pub topic: String,
    /// Payload to publish. Empty when firmware could not be served.
    pub payload: String,
}

impl Reply {
    fn new(topic: String, payload: String) -> Self {
        Reply { topic, payload }
    }
}

/// Turns inbound `(topic, payload)` pairs into replies.
///
/// Safe to share across threads; every method takes `&self`.
#[derive(Debug)]
pub struct Router {
    topics: Topics,
    store: FirmwareStore,
    session: SessionState,
    auto_id_enabled: bool,
}

impl Router {
    /// Build a router from configuration.
    pub fn new(config: &BridgeConfig) -> Self {
        Router {
            topics: Topics::new(
                config.sub_topic.as_str(),
                config.pub_topic.as_str(),
                config.bootloader_topic.as_str(),
            ),
            store: FirmwareStore::open(
                &config.firmware_base_path,
                config.nodes.clone(),
                config.store_options(),
            ),
            session: SessionState::new(config.next_id),
            auto_id_enabled: config.auto_id_enabled,
        }
    }

    /// Build a router from already-constructed parts.
    pub fn from_parts(
        topics: Topics,
        store: FirmwareStore,
        session: SessionState,
        auto_id_enabled: bool,
    ) -> Self {
        Router {
            topics,
            store,
            session,
            auto_id_enabled,
        }
    }

    /// Topic patterns the transport must subscribe to.
    pub fn subscription_topics(&self) -> Vec<String> {
        self.topics.subscriptions()
    }

    /// The topic taxonomy.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// The firmware store.
    pub fn store(&self) -> &FirmwareStore {
        &self.store
    }

    /// Id counter and staged bootloader replies.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Handle one inbound message.
    ///
    /// Never fails: malformed input yields `None` and a log line, and firmware
    /// that cannot be served yields a reply with an empty payload.
    pub fn handle_inbound(&self, topic: &str, payload: &str) -> Option<Reply> {
        match self.route(topic, payload) {
            Ok(reply) => reply,
            Err(err) => {
                match &err {
                    BridgeError::Topic(_) => {
                        metrics::counter!(metric_defs::REJECTED_TOPICS.name).increment(1);
                        error!(topic, "{}", err);
                    }
                    BridgeError::IdsExhausted { .. } => error!(topic, "{}", err),
                    _ => warn!(topic, payload, "{}", err),
                }
                None
            }
        }
    }

    fn route(&self, topic: &str, payload: &str) -> Result<Option<Reply>> {
        let request = self.topics.classify(topic)?;
        let kind = request.kind();
        metrics::counter!(metric_defs::REQUESTS.name, "kind" => kind).increment(1);

        let reply = match request {
            Request::Bootloader { node_id, command } => {
                self.bootloader_command(&node_id, command, payload)?;
                None
            }
            Request::IdRequest => self.id_request()?,
            Request::FirmwareConfig { node_id } => Some(self.firmware_config(&node_id, payload)?),
            Request::FirmwareData { node_id } => Some(self.firmware_data(&node_id, payload)?),
            Request::Unrecognized => {
                trace!(topic, "Ignoring unrecognized topic");
                None
            }
        };

        if let Some(reply) = &reply {
            metrics::counter!(metric_defs::REPLIES.name, "kind" => kind).increment(1);
            if reply.payload.is_empty() {
                metrics::counter!(metric_defs::EMPTY_REPLIES.name, "kind" => kind).increment(1);
            }
        }
        Ok(reply)
    }

    /// Answer a bootloader command and stage the reply for the node's next
    /// firmware config request.
    fn bootloader_command(&self, node_id: &str, command: u16, payload: &str) -> Result<()> {
        let value = if bootloader_command_takes_id(command) {
            payload
                .trim()
                .parse::<u16>()
                .map_err(|_| BridgeError::InvalidBootloaderPayload {
                    node_id: node_id.to_string(),
                    command,
                    payload: payload.to_string(),
                })?
        } else {
            0
        };

        let reply = FirmwareConfig::bootloader(command, value).encode();
        info!(
            node_id,
            command = bootloader_command_name(command),
            payload,
            reply = %reply,
            "Staging bootloader command"
        );

        if let Some(previous) = self.session.stage(node_id, reply) {
            debug!(node_id, previous = %previous, "Replaced staged bootloader reply");
        }
        metrics::counter!(metric_defs::BOOTLOADER_STAGED.name).increment(1);
        Ok(())
    }

    fn id_request(&self) -> Result<Option<Reply>> {
        if !self.auto_id_enabled {
            debug!("Id request ignored, auto-assignment disabled");
            return Ok(None);
        }

        let id = self.session.next_id().ok_or(BridgeError::IdsExhausted {
            last_id: self.session.last_id(),
        })?;
        info!(id, "Assigning node id");
        Ok(Some(Reply::new(self.topics.id_response(), encode_id(id))))
    }

    fn firmware_config(&self, node_id: &str, payload: &str) -> Result<Reply> {
        let topic = self.topics.firmware_config_response(node_id);

        if let Some(staged) = self.session.take_pending(node_id) {
            info!(node_id, reply = %staged, "Delivering staged bootloader reply");
            metrics::counter!(metric_defs::BOOTLOADER_DELIVERED.name).increment(1);
            return Ok(Reply::new(topic, staged));
        }

        let request = FirmwareConfig::decode(payload)?;
        let response = match self
            .store
            .fetch(node_id, request.firmware_type, request.version)
        {
            Ok((resolved, image)) => {
                let response = FirmwareConfig {
                    firmware_type: resolved.firmware_type,
                    version: resolved.version,
                    blocks: image.blocks(),
                    crc: image.checksum(),
                };
                info!(
                    node_id,
                    source = %resolved.source,
                    request = %request,
                    response = %response,
                    "Firmware config request"
                );
                response.encode()
            }
            Err(err) => {
                error!(node_id, request = %request, "{}", err);
                String::new()
            }
        };

        Ok(Reply::new(topic, response))
    }

    fn firmware_data(&self, node_id: &str, payload: &str) -> Result<Reply> {
        let topic = self.topics.firmware_data_response(node_id);
        let request = FirmwareRequest::decode(payload)?;

        let response = match self
            .store
            .fetch(node_id, request.firmware_type, request.version)
        {
            Ok((resolved, image)) => {
                log_progress(node_id, request.block, &image);
                metrics::counter!(metric_defs::BLOCKS_SERVED.name).increment(1);
                FirmwareData::reply(
                    resolved.firmware_type,
                    resolved.version,
                    request.block,
                    image.block(request.block),
                )
                .encode()
            }
            Err(err) => {
                error!(node_id, request = %request, "{}", err);
                String::new()
            }
        };

        Ok(Reply::new(topic, response))
    }
}

/// Nodes fetch blocks from the highest index down to zero.
fn log_progress(node_id: &str, block: u16, image: &FirmwareImage) {
    let blocks = image.blocks();
    if u32::from(block) + 1 == u32::from(blocks) {
        info!(node_id, blocks, "Firmware transfer started");
    } else if block == 0 {
        info!(node_id, blocks, "Sending final firmware block");
    } else if is_progress_block(block) {
        debug!(node_id, block, blocks, "Firmware transfer progress");
    } else {
        trace!(node_id, block, blocks, "Sending firmware block");
    }

    if block >= blocks {
        warn!(node_id, block, blocks, "Requested block is past the end of the image");
    }
}

/// Whether `block` is a progress milestone, counting blocks from one.
fn is_progress_block(block: u16) -> bool {
    (u32::from(block) + 1) % u32::from(PROGRESS_INTERVAL) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysb_firmware::FirmwareMapping;

    #[test]
    fn test_progress_blocks_count_from_one() {
        assert!(is_progress_block(24));
        assert!(is_progress_block(49));
        assert!(is_progress_block(u16::MAX - 11));
        assert!(!is_progress_block(0));
        assert!(!is_progress_block(25));
        assert!(!is_progress_block(50));
        assert!(!is_progress_block(u16::MAX));
    }

    fn router(auto_id_enabled: bool, next_id: u16) -> Router {
        Router::new(&BridgeConfig {
            auto_id_enabled,
            next_id,
            firmware_base_path: "/nonexistent/firmware".into(),
            nodes: vec![FirmwareMapping::default_for(1, 1)],
            ..BridgeConfig::default()
        })
    }

    #[test]
    fn test_id_request_disabled() {
        assert_eq!(router(false, 1).handle_inbound("mysensors_rx/255/255/3/0/3", ""), None);
    }

    #[test]
    fn test_id_request_assigns_next() {
        let router = router(true, 12);
        let reply = router
            .handle_inbound("mysensors_rx/255/255/3/0/3", "")
            .unwrap();
        assert_eq!(reply.topic, "mysensors_tx/255/255/3/0/4");
        assert_eq!(reply.payload, "13");
    }

    #[test]
    fn test_id_request_exhausted() {
        let router = router(true, 254);
        assert_eq!(router.handle_inbound("mysensors_rx/255/255/3/0/3", ""), None);
    }

    #[test]
    fn test_bootloader_command_is_staged_not_replied() {
        let router = router(false, 1);
        assert_eq!(router.handle_inbound("mysensors/bootloader/1/1", ""), None);
        assert_eq!(
            router.session().take_pending("1"),
            Some("0100000000007ADA".to_string())
        );
    }

    #[test]
    fn test_bootloader_set_id_requires_number() {
        let router = router(false, 1);
        assert_eq!(router.handle_inbound("mysensors/bootloader/2/2", "nine"), None);
        assert_eq!(router.session().pending_count(), 0);
    }

    #[test]
    fn test_bootloader_unknown_command_ignores_payload() {
        let router = router(false, 1);
        router.handle_inbound("mysensors/bootloader/4/7", "junk");
        assert_eq!(
            router.session().take_pending("4"),
            Some("0700000000007ADA".to_string())
        );
    }

    #[test]
    fn test_unresolvable_config_gives_empty_payload() {
        let reply = router(false, 1)
            .handle_inbound("mysensors_rx/3/255/4/0/0", "010001005000D446")
            .unwrap();
        assert_eq!(reply.topic, "mysensors_tx/3/255/4/0/1");
        assert_eq!(reply.payload, "");
    }

    #[test]
    fn test_unresolvable_data_gives_empty_payload() {
        let reply = router(false, 1)
            .handle_inbound("mysensors_rx/3/255/4/0/2", "010001000100")
            .unwrap();
        assert_eq!(reply.topic, "mysensors_tx/3/255/4/0/3");
        assert_eq!(reply.payload, "");
    }

    #[test]
    fn test_malformed_payload_gives_no_reply() {
        let router = router(false, 1);
        assert_eq!(router.handle_inbound("mysensors_rx/3/255/4/0/0", "0100"), None);
        assert_eq!(router.handle_inbound("mysensors_rx/3/255/4/0/2", "ZZ0001000100"), None);
    }

    #[test]
    fn test_structural_mismatch_gives_no_reply() {
        assert_eq!(router(true, 1).handle_inbound("mysensors_rx/255/3", ""), None);
    }

    #[test]
    fn test_unrecognized_topic_gives_no_reply() {
        assert_eq!(router(true, 1).handle_inbound("something/else", "1"), None);
    }
}
