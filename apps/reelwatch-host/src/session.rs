//! One browser connection, from the first frame to EOF.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use reelwatch_api::WatchIngest;
use reelwatch_core::debug_log::{DetectorEvent, EventEntry};
use reelwatch_core::detector::{
    spawn_detector, Detector, DetectorHandle, DetectorStatus, DetectorTiming,
};
use reelwatch_detect::SiteDatabase;

use crate::bridge::BrowserBridge;
use crate::codec::{read_frame, write_message};
use crate::error::HostError;
use crate::protocol::{BrowserMessage, HostMessage, Inbound};

/// Outcome counts for one connection, from the detector's event log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub submitted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl SessionSummary {
    fn from_events(events: &[EventEntry]) -> Self {
        events
            .iter()
            .fold(Self::default(), |mut summary, (_, event)| {
                match event {
                    DetectorEvent::Submitted { .. } => summary.submitted += 1,
                    DetectorEvent::Duplicate { .. } => summary.duplicates += 1,
                    DetectorEvent::ExtractionFailed { .. } | DetectorEvent::SubmitFailed { .. } => {
                        summary.failed += 1
                    }
                    _ => {}
                }
                summary
            })
    }
}

/// Run the detector against the browser on the other end of `reader`/`writer`
/// until the browser closes the pipe.
pub async fn serve<R, W, I>(
    reader: R,
    writer: W,
    ingest: I,
    sites: SiteDatabase,
    timing: DetectorTiming,
    request_timeout: Duration,
) -> Result<SessionSummary, HostError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    I: WatchIngest + 'static,
{
    let (bridge, outbound) = BrowserBridge::new(request_timeout);
    let writer_task = tokio::spawn(write_loop(writer, outbound));

    let detector = Detector::new(bridge.clone(), ingest, sites, timing);
    let (handle, detector_task) = spawn_detector(detector);
    let status_task = tokio::spawn(log_status(handle.subscribe()));

    let result = read_loop(reader, &bridge, &handle).await;
    if let Err(e) = &result {
        error!(error = %e, "Browser connection failed");
    }

    if let status @ (DetectorStatus::Armed { .. } | DetectorStatus::Reporting { .. }) =
        handle.status()
    {
        info!(?status, "Browser went away during an active watch");
    }
    bridge.close();
    let summary = SessionSummary::from_events(&handle.events());
    drop(handle);
    if let Err(e) = detector_task.await {
        error!(error = %e, "Detector task panicked");
    }
    drop(bridge);
    if let Err(e) = writer_task.await {
        error!(error = %e, "Writer task panicked");
    }
    if let Err(e) = status_task.await {
        error!(error = %e, "Status task panicked");
    }

    result.map(|()| summary)
}

/// Log detector state transitions until the detector stops.
async fn log_status(mut status: watch::Receiver<DetectorStatus>) {
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        match current {
            DetectorStatus::Idle => debug!("Detector idle"),
            DetectorStatus::Armed {
                tab,
                site,
                kind,
                remaining_secs,
                ..
            } => debug!(%tab, %site, %kind, remaining_secs, "Detector armed"),
            DetectorStatus::Reporting { tab, url } => {
                info!(%tab, %url, "Reporting watched title")
            }
        }
    }
}

async fn read_loop<R>(
    mut reader: R,
    bridge: &BrowserBridge,
    detector: &DetectorHandle,
) -> Result<(), HostError>
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = read_frame(&mut reader).await? {
        let message: BrowserMessage = match serde_json::from_slice(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping malformed message");
                continue;
            }
        };

        match Inbound::from(message) {
            Inbound::Event(event) => detector.send(event)?,
            Inbound::Reply { id, result } => {
                if !bridge.resolve(id, result) {
                    debug!(id, "Dropping reply with no waiting request");
                }
            }
        }
    }

    info!("Browser closed the connection");
    Ok(())
}

/// Drain the outbound queue until every bridge handle is gone.
async fn write_loop<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<HostMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_message(&mut writer, &message).await {
            error!(id = message.id(), error = %e, "Failed to write to browser");
            break;
        }
    }
}
