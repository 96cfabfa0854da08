use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::action::Actor;
use crate::config::FlowSettings;
use crate::error::{FlowError, StopRequested};
use crate::payload::ShopPayload;
use crate::probe::{DeviceController, ProbeGateway};

use super::classifier::classify;
use super::context::FlowContext;
use super::handlers::{HandlerStep, ShopFlow};
use super::state::ScreenState;

/// Why a flow ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowExit {
    /// Enough consecutive frames matched nothing.
    Settled,
    /// A handler asked to stop (unknown screen).
    HandlerStopped,
    /// The wall-clock budget ran out. Still a success.
    DeadlineElapsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReport {
    pub exit: FlowExit,
    pub iterations: u64,
    pub elapsed: Duration,
    pub purchases: u32,
}

/// Runs one shop episode until it settles, a handler stops it, or the deadline passes.
///
/// Cancellation and faults end the loop with an error; nothing is retried at this level.
pub async fn run_shop_flow(
    gateway: &dyn ProbeGateway,
    device: &dyn DeviceController,
    payload: &ShopPayload,
    settings: &FlowSettings,
    stop: &CancellationToken,
) -> Result<FlowReport, FlowError> {
    settings
        .validate()
        .map_err(|err| FlowError::Config(format!("{err:#}")))?;

    let started = Instant::now();
    let deadline = settings.timeout();
    let mut ctx = FlowContext::new(started);
    let flow = ShopFlow::new(
        Actor::new(gateway, device, settings, stop),
        payload.shop_type,
        &payload.buff_priority,
    );

    tracing::info!(
        shop_type = ?payload.shop_type,
        timeout_secs = settings.timeout_secs,
        priorities = !payload.buff_priority.is_empty(),
        "shop.flow.start"
    );

    loop {
        if stop.is_cancelled() {
            tracing::warn!(iterations = ctx.iteration, "shop.flow.cancelled");
            return Err(FlowError::Cancelled {
                iterations: ctx.iteration,
            });
        }
        if started.elapsed() >= deadline {
            tracing::info!(iterations = ctx.iteration, "shop.flow.deadline");
            return Ok(report(FlowExit::DeadlineElapsed, &ctx));
        }

        ctx.iteration += 1;
        match iterate(&flow, &mut ctx).await {
            Ok(None) => {}
            Ok(Some(exit)) => {
                let report = report(exit, &ctx);
                tracing::info!(
                    exit = ?report.exit,
                    iterations = report.iterations,
                    purchases = report.purchases,
                    "shop.flow.done"
                );
                return Ok(report);
            }
            Err(err) if err.is::<StopRequested>() => {
                tracing::warn!(iterations = ctx.iteration, "shop.flow.cancelled");
                return Err(FlowError::Cancelled {
                    iterations: ctx.iteration,
                });
            }
            Err(err) => {
                tracing::error!(
                    iteration = ctx.iteration,
                    error = %format!("{err:#}"),
                    "shop.flow.fault"
                );
                return Err(FlowError::Fault {
                    iteration: ctx.iteration,
                    source: err,
                });
            }
        }
    }
}

/// One capture, one classification, at most one handler. `Some` ends the flow.
async fn iterate(flow: &ShopFlow<'_>, ctx: &mut FlowContext) -> anyhow::Result<Option<FlowExit>> {
    let actor = flow.actor();
    let frame = actor.capture().await?;
    let state = classify(actor, &frame, ctx).await?;
    tracing::debug!(iteration = ctx.iteration, %state, "shop.flow.state");

    if state == ScreenState::ShopFlowComplete {
        ctx.consecutive_complete += 1;
        let threshold = actor.settings.complete_threshold;
        tracing::info!(
            count = ctx.consecutive_complete,
            threshold,
            "shop.flow.complete_candidate"
        );
        if ctx.consecutive_complete >= threshold {
            return Ok(Some(FlowExit::Settled));
        }
        actor.settle().await;
        return Ok(None);
    }

    ctx.consecutive_complete = 0;
    match flow.handle(state, ctx).await? {
        HandlerStep::Continue => Ok(None),
        HandlerStep::Stop => Ok(Some(FlowExit::HandlerStopped)),
    }
}

fn report(exit: FlowExit, ctx: &FlowContext) -> FlowReport {
    FlowReport {
        exit,
        iterations: ctx.iteration,
        elapsed: ctx.started_at.elapsed(),
        purchases: ctx.purchases,
    }
}

/// Boolean surface for the host: parses the raw payload and runs the flow.
///
/// A bad payload fails before any capture or click.
pub async fn invoke(
    gateway: &dyn ProbeGateway,
    device: &dyn DeviceController,
    raw: &Value,
    settings: &FlowSettings,
    stop: &CancellationToken,
) -> bool {
    let outcome = match ShopPayload::from_value(raw) {
        Ok(payload) => run_shop_flow(gateway, device, &payload, settings, stop).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(_) => true,
        Err(err) => {
            let kind = err.kind();
            tracing::error!(
                kind,
                error = %format!("{:#}", anyhow::Error::from(err)),
                "shop.invoke.failed"
            );
            false
        }
    }
}
