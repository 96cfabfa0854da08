use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::FlowSettings;
use crate::error::StopRequested;
use crate::probe::{DeviceController, Frame, Marker, Probe, ProbeGateway, Rect, RecognitionResult};

/// What a recognize-and-click attempt ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The probe hit; its box centroid was clicked.
    Recognized(Rect),
    /// The probe missed; the fallback rect was clicked instead.
    Fallback(Rect),
    /// The probe missed and there was no fallback. Nothing was clicked.
    Missed,
}

impl ClickOutcome {
    pub fn success(&self) -> bool {
        !matches!(self, ClickOutcome::Missed)
    }
}

/// One recognize-and-click request.
#[derive(Debug, Clone, Copy)]
pub struct ClickTarget {
    pub marker: Marker,
    /// Log label when the target is found.
    pub found: &'static str,
    /// Log label when it is not.
    pub missing: &'static str,
    pub fallback: Option<Rect>,
}

impl ClickTarget {
    pub const fn new(marker: Marker, found: &'static str, missing: &'static str) -> Self {
        Self {
            marker,
            found,
            missing,
            fallback: None,
        }
    }

    pub const fn with_fallback(mut self, fallback: Rect) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

pub const BUY: ClickTarget = ClickTarget::new(Marker::Buy, "shop.buy.found", "shop.buy.missing");
pub const CLOSE_ITEM: ClickTarget =
    ClickTarget::new(Marker::CloseItem, "shop.close.found", "shop.close.missing");
pub const REFRESH: ClickTarget = ClickTarget::new(
    Marker::Refresh,
    "shop.refresh.found",
    "shop.refresh.missing",
);
pub const BACK: ClickTarget = ClickTarget::new(Marker::Back, "shop.back.found", "shop.back.missing");

/// Thin layer over the two external boundaries. Every probe goes through here so the
/// cancellation token is honored before each one.
pub struct Actor<'a> {
    pub gateway: &'a dyn ProbeGateway,
    pub device: &'a dyn DeviceController,
    pub settings: &'a FlowSettings,
    pub stop: &'a CancellationToken,
}

impl<'a> Actor<'a> {
    pub fn new(
        gateway: &'a dyn ProbeGateway,
        device: &'a dyn DeviceController,
        settings: &'a FlowSettings,
        stop: &'a CancellationToken,
    ) -> Self {
        Self {
            gateway,
            device,
            settings,
            stop,
        }
    }

    pub fn check_stop(&self) -> anyhow::Result<()> {
        if self.stop.is_cancelled() {
            return Err(StopRequested.into());
        }
        Ok(())
    }

    pub async fn capture(&self) -> anyhow::Result<Frame> {
        self.device.capture().await.context("capture frame")
    }

    pub async fn probe(&self, marker: Marker, frame: &Frame) -> anyhow::Result<RecognitionResult> {
        self.check_stop()?;
        let probe = Probe::from(marker);
        self.gateway
            .probe(&probe, frame)
            .await
            .with_context(|| format!("probe {}", marker.name()))
    }

    pub async fn click_rect(&self, rect: Rect) -> anyhow::Result<()> {
        let (x, y) = rect.center();
        self.device
            .click(x, y)
            .await
            .with_context(|| format!("click ({x}, {y})"))
    }

    /// Lets a UI transition finish before the next capture.
    pub async fn settle(&self) {
        tokio::time::sleep(self.settings.settle()).await;
    }

    /// Probe for `target` and click its centroid, or the fallback rect when the probe misses.
    /// Uses `frame` when given, otherwise captures a fresh one. Never retries.
    pub async fn recognize_and_click(
        &self,
        target: ClickTarget,
        frame: Option<Frame>,
    ) -> anyhow::Result<ClickOutcome> {
        let frame = match frame {
            Some(f) => f,
            None => self.capture().await?,
        };

        let res = self.probe(target.marker, &frame).await?;
        if let Some(bbox) = res.actionable() {
            tracing::info!(?bbox, "{}", target.found);
            self.click_rect(bbox).await?;
            return Ok(ClickOutcome::Recognized(bbox));
        }
        if let Some(fallback) = target.fallback {
            tracing::info!(?fallback, "{} fallback", target.missing);
            self.click_rect(fallback).await?;
            return Ok(ClickOutcome::Fallback(fallback));
        }
        tracing::info!("{}", target.missing);
        Ok(ClickOutcome::Missed)
    }

    /// Dismisses an overlay by tapping the fixed blank area. Nothing to recognize there.
    pub async fn click_blank(&self) -> anyhow::Result<()> {
        tracing::debug!(area = ?self.settings.blank_area, "shop.blank.click");
        self.click_rect(self.settings.blank_area).await
    }
}
