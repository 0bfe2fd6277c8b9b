//! Request routing for the MySensors OTA bridge.
//!
//! The transport hands every inbound `(topic, payload)` pair to
//! [`Router::handle_inbound`] and publishes whatever [`Reply`] comes back.
//! The router classifies the topic ([`Topics::classify`]), drives the
//! firmware store and wire codec, and keeps the [`SessionState`] that lets a
//! bootloader command preempt a node's next firmware config reply.
//!
//! ```no_run
//! use mysb_bridge::{BridgeConfig, Router};
//!
//! let config = BridgeConfig::load(None)?;
//! let router = Router::new(&config);
//! for pattern in router.subscription_topics() {
//!     println!("subscribe {}", pattern);
//! }
//! if let Some(reply) = router.handle_inbound("mysensors_rx/12/255/4/0/0", "010001005000D446") {
//!     println!("{} {}", reply.topic, reply.payload);
//! }
//! # Ok::<(), mysb_bridge::ConfigError>(())
//! ```

pub mod config;
pub mod error;
pub mod router;
pub mod session;
pub mod topics;

pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, Result};
pub use router::{Reply, Router};
pub use session::SessionState;
pub use topics::{Request, TopicError, Topics};
