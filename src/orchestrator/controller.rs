//! Dashboard run controller.
//!
//! Owns start/cancel orchestration for every dashboard and emits events for presentation layers.

use super::Dashboards;
use crate::dashboards::{DashboardUpdate, Feature};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control dashboard runs.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start(Feature),
    Cancel(Feature),
    Quit,
}

/// Events sent back to the UI. Progress itself travels over each dashboard's watch channel.
#[derive(Debug, Clone)]
pub(crate) enum UiEvent {
    Started { feature: Feature, run_id: u64 },
    Update(DashboardUpdate),
    Message(String),
}

fn start(dashboards: &mut Dashboards, feature: Feature, event_tx: &UnboundedSender<UiEvent>) {
    match dashboards.start(feature) {
        Ok(Some(run_id)) => {
            let _ = event_tx.send(UiEvent::Started { feature, run_id });
        }
        Ok(None) => {
            let _ = event_tx.send(UiEvent::Message(format!("{feature} is already running")));
        }
        Err(e) => {
            let _ = event_tx.send(UiEvent::Message(format!("{feature}: {e:#}")));
        }
    }
}

/// Orchestrate dashboard runs based on UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    mut dashboards: Dashboards,
    launch: Option<Feature>,
    event_tx: UnboundedSender<UiEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    if let Some(feature) = launch {
        start(&mut dashboards, feature, &event_tx);
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(feature)) => start(&mut dashboards, feature, &event_tx),
                    Some(UiCommand::Cancel(feature)) => {
                        if dashboards.status(feature).phase.is_in_flight() {
                            dashboards.cancel(feature);
                            let _ = event_tx.send(UiEvent::Message(format!("{feature} cancelled")));
                        }
                    }
                    // Quit, or the UI went away: nothing may commit after this point.
                    Some(UiCommand::Quit) | None => {
                        dashboards.cancel_all();
                        break;
                    }
                }
            }
            Some(update) = dashboards.next_update() => {
                let _ = event_tx.send(UiEvent::Update(update));
            }
        }
    }

    Ok(())
}
