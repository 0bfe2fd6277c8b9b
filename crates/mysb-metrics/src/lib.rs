//! Metrics infrastructure for the MySensors OTA bridge.
//!
//! This crate declares every metric the bridge emits as a structured [`Metric`]
//! constant and re-exports the `metrics` crate. Nothing is recorded unless the
//! host installs a recorder; with the `prometheus` feature the runner can
//! install an HTTP exporter via [`install_prometheus`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mysb_metrics::{describe_metrics, metric_defs};
//!
//! describe_metrics();
//! metrics::counter!(metric_defs::REQUESTS.name, "kind" => "firmware_config").increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use mysb_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const BLOCKS_SERVED: Metric = Metric::counter("mysb.firmware.blocks_served")
///     .with_description("Firmware blocks served")
///     .with_unit(Unit::Count)
///     .with_labels(&["node"]);
///
/// assert_eq!(BLOCKS_SERVED.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "mysb.bridge.requests").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the bridge.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Request Routing
    // ========================================================================

    /// Inbound messages classified by request kind.
    ///
    /// Labels: kind (id, firmware_config, firmware_data, bootloader, unrecognized)
    pub const REQUESTS: Metric = Metric::counter("mysb.bridge.requests")
        .with_description("Inbound messages by request kind")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Inbound messages rejected for having the wrong topic structure.
    pub const REJECTED_TOPICS: Metric = Metric::counter("mysb.bridge.rejected_topics")
        .with_description("Inbound messages rejected for topic structure")
        .with_unit(Unit::Count);

    /// Replies handed back to the transport.
    ///
    /// Labels: kind
    pub const REPLIES: Metric = Metric::counter("mysb.bridge.replies")
        .with_description("Replies returned to the transport")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Replies degraded to an empty payload because firmware could not be served.
    ///
    /// Labels: kind
    pub const EMPTY_REPLIES: Metric = Metric::counter("mysb.bridge.empty_replies")
        .with_description("Replies degraded to an empty payload")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    // ========================================================================
    // Session State
    // ========================================================================

    /// Node ids handed out by auto-assignment.
    pub const IDS_ASSIGNED: Metric = Metric::counter("mysb.session.ids_assigned")
        .with_description("Node ids handed out by auto-assignment")
        .with_unit(Unit::Count);

    /// Bootloader replies staged for a node.
    pub const BOOTLOADER_STAGED: Metric = Metric::counter("mysb.session.bootloader_staged")
        .with_description("Bootloader replies staged")
        .with_unit(Unit::Count);

    /// Staged bootloader replies delivered in place of a firmware config reply.
    pub const BOOTLOADER_DELIVERED: Metric = Metric::counter("mysb.session.bootloader_delivered")
        .with_description("Staged bootloader replies delivered")
        .with_unit(Unit::Count);

    /// Bootloader replies currently waiting for their node.
    pub const BOOTLOADER_PENDING: Metric = Metric::gauge("mysb.session.bootloader_pending")
        .with_description("Bootloader replies waiting for delivery")
        .with_unit(Unit::Count);

    // ========================================================================
    // Firmware Store
    // ========================================================================

    /// Resolutions by winning tier.
    ///
    /// Labels: source (user_defined, node_asserted, default)
    pub const RESOLUTIONS: Metric = Metric::counter("mysb.firmware.resolutions")
        .with_description("Firmware resolutions by winning tier")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Firmware images decoded from disk.
    pub const IMAGE_LOADS: Metric = Metric::counter("mysb.firmware.image_loads")
        .with_description("Firmware images decoded from disk")
        .with_unit(Unit::Count);

    /// Image requests answered from the image cache.
    pub const IMAGE_CACHE_HITS: Metric = Metric::counter("mysb.firmware.image_cache_hits")
        .with_description("Image requests answered from cache")
        .with_unit(Unit::Count);

    /// Time spent decoding an image from disk.
    pub const IMAGE_LOAD_TIME: Metric = Metric::histogram("mysb.firmware.image_load_time_us")
        .with_description("Time spent decoding a firmware image")
        .with_unit(Unit::Microseconds);

    /// Firmware data blocks served.
    pub const BLOCKS_SERVED: Metric = Metric::counter("mysb.firmware.blocks_served")
        .with_description("Firmware data blocks served")
        .with_unit(Unit::Count);

    /// All metrics, for registration at startup.
    pub const ALL: &[&Metric] = &[
        &REQUESTS,
        &REJECTED_TOPICS,
        &REPLIES,
        &EMPTY_REPLIES,
        &IDS_ASSIGNED,
        &BOOTLOADER_STAGED,
        &BOOTLOADER_DELIVERED,
        &BOOTLOADER_PENDING,
        &RESOLUTIONS,
        &IMAGE_LOADS,
        &IMAGE_CACHE_HITS,
        &IMAGE_LOAD_TIME,
        &BLOCKS_SERVED,
    ];
}

/// Describes all metrics used by the bridge.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder serving scrapes on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
