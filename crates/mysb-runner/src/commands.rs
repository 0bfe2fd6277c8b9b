//! `mysb` subcommand implementations.

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mysb_bridge::{BridgeConfig, Reply, Router};
use mysb_firmware::{FirmwareImage, ParseMode, ResolvedFirmware};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::line_server::LineServer;
use crate::{Result, RunnerError};

/// Summary of a decoded firmware image.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageSummary {
    /// Source file.
    pub path: PathBuf,
    /// Address of the first data record.
    pub start_address: u32,
    /// Padded image length in bytes.
    pub bytes: usize,
    /// Number of 16-byte blocks.
    pub blocks: u16,
    /// CRC-16 of the padded image.
    pub checksum: u16,
    /// Every block as uppercase hex, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
}

impl ImageSummary {
    /// Summarize `image`, optionally including every block.
    pub fn new(path: &Path, image: &FirmwareImage, dump: bool) -> Self {
        ImageSummary {
            path: path.to_path_buf(),
            start_address: image.start_address(),
            bytes: image.len(),
            blocks: image.blocks(),
            checksum: image.checksum(),
            data: dump.then(|| image.iter_blocks().map(hex::encode_upper).collect()),
        }
    }
}

/// Resolution result as printed by `mysb resolve`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolutionSummary {
    /// Node that was resolved.
    pub node_id: String,
    /// Winning tier.
    pub source: String,
    /// Firmware type served.
    pub firmware_type: u16,
    /// Firmware version served.
    pub version: u16,
    /// Image file.
    pub path: PathBuf,
}

impl ResolutionSummary {
    fn new(node_id: &str, resolved: &ResolvedFirmware) -> Self {
        ResolutionSummary {
            node_id: node_id.to_string(),
            source: resolved.source.to_string(),
            firmware_type: resolved.firmware_type,
            version: resolved.version,
            path: resolved.path.clone(),
        }
    }
}

/// `mysb inspect`
pub fn inspect(
    out: &mut impl Write,
    file: &Path,
    json: bool,
    dump: bool,
    strict: bool,
) -> Result<()> {
    let mode = if strict {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };
    let image = FirmwareImage::load_with(file, mode)?;
    let summary = ImageSummary::new(file, &image, dump);

    if json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "File:          {}", summary.path.display())?;
    writeln!(out, "Start address: 0x{:04X}", summary.start_address)?;
    writeln!(out, "Size:          {} bytes", summary.bytes)?;
    writeln!(out, "Blocks:        {}", summary.blocks)?;
    writeln!(
        out,
        "Checksum:      {} (0x{:04X})",
        summary.checksum, summary.checksum
    )?;

    if let Some(blocks) = &summary.data {
        writeln!(out)?;
        for (index, block) in blocks.iter().enumerate() {
            writeln!(out, "{:5}  {}", index, block)?;
        }
    }
    Ok(())
}

/// `mysb resolve`
pub fn resolve(
    out: &mut impl Write,
    config: &BridgeConfig,
    node_id: &str,
    firmware_type: u16,
    version: u16,
    json: bool,
) -> Result<()> {
    let router = Router::new(config);
    let resolved = router.store().resolve(node_id, firmware_type, version)?;
    let summary = ResolutionSummary::new(node_id, &resolved);

    if json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{} type {} version {} ({}) {}",
            summary.node_id,
            summary.firmware_type,
            summary.version,
            summary.source,
            summary.path.display()
        )?;
    }
    Ok(())
}

/// `mysb handle`
pub fn handle(
    out: &mut impl Write,
    config: &BridgeConfig,
    topic: &str,
    payload: &str,
) -> Result<Option<Reply>> {
    let router = Router::new(config);
    let reply = router.handle_inbound(topic, payload);
    match &reply {
        Some(reply) => writeln!(out, "{} {}", reply.topic, reply.payload)?,
        None => writeln!(out, "(no reply)")?,
    }
    Ok(reply)
}

/// `mysb serve`
pub fn serve(config: &BridgeConfig, listen: SocketAddr, metrics: Option<SocketAddr>) -> Result<()> {
    install_metrics(metrics)?;
    for line in metric_catalogue() {
        debug!("Metric {}", line);
    }
    config.log_summary();

    let router = Arc::new(Router::new(config));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = LineServer::bind(listen, router).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, shutting down");
            }
            let _ = shutdown_tx.send(true);
        });

        server.run(shutdown_rx).await?;
        Ok::<(), RunnerError>(())
    })
}

/// One line per emitted metric: name, kind and label keys.
pub fn metric_catalogue() -> Vec<String> {
    mysb_metrics::metric_defs::ALL
        .iter()
        .map(|metric| {
            if metric.labels.is_empty() {
                format!("{} ({})", metric.name, metric.kind)
            } else {
                format!("{} ({}) [{}]", metric.name, metric.kind, metric.labels.join(", "))
            }
        })
        .collect()
}

#[cfg(feature = "prometheus")]
fn install_metrics(addr: Option<SocketAddr>) -> Result<()> {
    if let Some(addr) = addr {
        mysb_metrics::install_prometheus(addr)
            .map_err(|e| RunnerError::Metrics(e.to_string()))?;
        info!(%addr, "Prometheus exporter listening");
    }
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(addr: Option<SocketAddr>) -> Result<()> {
    if addr.is_some() {
        return Err(RunnerError::Metrics(
            "built without the prometheus feature".to_string(),
        ));
    }
    Ok(())
}

/// Load configuration from an optional file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    Ok(BridgeConfig::load(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_catalogue() {
        let catalogue = metric_catalogue();
        assert_eq!(catalogue.len(), mysb_metrics::metric_defs::ALL.len());
        assert!(catalogue.contains(&"mysb.bridge.requests (counter) [kind]".to_string()));
        assert!(catalogue.contains(&"mysb.session.bootloader_pending (gauge)".to_string()));
        assert!(catalogue.contains(&"mysb.firmware.image_load_time_us (histogram)".to_string()));
    }

    #[test]
    fn test_metrics_flag_without_feature() {
        if cfg!(feature = "prometheus") {
            return;
        }
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert!(matches!(install_metrics(Some(addr)), Err(RunnerError::Metrics(_))));
        assert!(install_metrics(None).is_ok());
    }
}
