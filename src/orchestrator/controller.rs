//! Command loop between the presentation layer and the list controller.
//!
//! Every command runs as its own task so a print batch never blocks status toggles or
//! navigation; the loop only reaps finished tasks and reports panics.

use super::list::{ActionError, Confirmation, ListController};
use crate::entity::Route;
use crate::model::{GroupingKey, Notice, RecordId};
use crate::status::StatusFilter;
use crate::workflow::WorkflowError;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Load,
    Reload,
    LoadGroupings,
    SelectGrouping(GroupingKey),
    SelectStatus(StatusFilter),
    Advance(RecordId),
    Delete(RecordId, Confirmation),
    OpenDetail(RecordId),
    CloseDetail,
    PrintUnprinted,
    PrintOne(RecordId),
    Navigate(Route),
    Quit,
}

async fn dispatch(controller: &ListController, cmd: UiCommand) {
    let outcome: Result<(), ActionError> = match cmd {
        UiCommand::Load => {
            controller.load().await;
            Ok(())
        }
        UiCommand::Reload => {
            controller.reload().await;
            Ok(())
        }
        UiCommand::LoadGroupings => {
            // Failures are reported by the controller itself.
            let _ = controller.groupings().await;
            Ok(())
        }
        UiCommand::SelectGrouping(g) => {
            controller.select_grouping(g).await;
            Ok(())
        }
        UiCommand::SelectStatus(s) => {
            controller.select_status(s).await;
            Ok(())
        }
        UiCommand::Advance(id) => controller.advance(&id).await.map(|_| ()),
        UiCommand::Delete(id, confirm) => controller.delete(&id, confirm).await.map(|_| ()),
        UiCommand::OpenDetail(id) => {
            let _ = controller.open_detail(&id).await;
            Ok(())
        }
        UiCommand::CloseDetail => {
            controller.close_detail();
            Ok(())
        }
        UiCommand::PrintUnprinted => controller.print_unprinted().await.map(|_| ()),
        UiCommand::PrintOne(id) => controller.print_one(&id).await.map(|_| ()),
        UiCommand::Navigate(route) => controller.navigate(route).map(|_| ()),
        UiCommand::Quit => Ok(()),
    };
    if let Err(e) = outcome {
        report(controller, &e);
    }
}

/// Surface errors that no lower layer has already turned into a notice.
fn report(controller: &ListController, err: &ActionError) {
    tracing::debug!(error = %err, "action failed");
    match err {
        ActionError::ActionRejected(_)
        | ActionError::Unsupported { .. }
        | ActionError::UnknownRecord(_)
        | ActionError::Workflow(WorkflowError::NoWorkflow(_) | WorkflowError::MissingId) => {
            controller.notify(Notice::info("Not available", err.to_string()));
        }
        ActionError::Restricted | ActionError::Workflow(_) | ActionError::Gateway(_) => {}
    }
}

/// Drive `controller` from UI commands until `Quit` or the command channel closes.
pub async fn run_controller(
    controller: Arc<ListController>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for cmd in [UiCommand::Load, UiCommand::LoadGroupings] {
        let c = controller.clone();
        tasks.spawn(async move { dispatch(&c, cmd).await });
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => break,
                    Some(cmd) => {
                        tracing::debug!(?cmd, "command");
                        let c = controller.clone();
                        tasks.spawn(async move { dispatch(&c, cmd).await });
                    }
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "command task failed");
                    controller.notify(Notice::error("Internal error", e.to_string()));
                }
            }
        }
    }

    if controller.is_printing() {
        tracing::warn!("quitting with a print run in progress");
    }
    tasks.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::entity::EntityKind;
    use crate::model::ConsoleEvent;
    use crate::session::Session;
    use crate::test_support::{record, test_config, FakeGateway};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn loop_loads_on_start_and_runs_commands_until_quit() {
        let cfg = test_config("http://unused");
        let gateway = FakeGateway::with_records(vec![record(
            json!({"id": 5, "profile_status": "Pending"}),
        )]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let controller = Arc::new(ListController::new(
            &cfg,
            Session::with_token("t"),
            gateway.clone(),
            Arc::new(QueryCache::new()),
            None,
            event_tx,
        ));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_controller(controller.clone(), cmd_rx));

        loop {
            if let Some(ConsoleEvent::CollectionChanged) = event_rx.recv().await {
                break;
            }
        }
        cmd_tx.send(UiCommand::Advance(RecordId::from("5"))).unwrap();
        loop {
            if let Some(ConsoleEvent::AdvanceFinished { .. }) = event_rx.recv().await {
                break;
            }
        }
        cmd_tx.send(UiCommand::Navigate(Route::Create)).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(gateway.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            gateway.field_of("5", "profile_status").as_deref(),
            Some("Confirm")
        );
        assert_eq!(controller.entity(), EntityKind::Participants);
    }
}
