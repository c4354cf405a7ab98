//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use reportflow_client::ApiClient;
use reportflow_event_stream::{EventSource, EventStreamConsumer, TerminalReason};
use reportflow_protocol::EventRecord;
use reportflow_wizard::{LogLine, Workflow, WorkflowEvent};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::config::WizardConfig;

/// Prints a workflow notification for the user.
fn print_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::StepChanged(step) => println!("== {step} =="),
        WorkflowEvent::UploadProgress(p) => {
            println!("   {} {}% ({}/{} bytes)", p.filename, p.percent(), p.offset, p.total_size);
        }
        WorkflowEvent::Log(line) => println!("{line}"),
        WorkflowEvent::ProcessingFinished { success: true } => println!("processing finished"),
        WorkflowEvent::ProcessingFinished { success: false } => println!("processing failed"),
    }
}

/// Cancels `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, shutting down");
            token.cancel();
        }
    });
}

/// `reportflow run`.
pub async fn run(config: &WizardConfig, args: RunArgs) -> anyhow::Result<()> {
    let api = Arc::new(ApiClient::new(&config.api_base_url)?);
    let mut workflow = Workflow::new(Arc::clone(&api), api, config.workflow_config());
    let mut events = workflow
        .take_events()
        .context("workflow events already taken")?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let result = tokio::select! {
        result = drive(&mut workflow, config, &args) => result,
        _ = cancel.cancelled() => Err(anyhow::anyhow!("interrupted")),
    };

    workflow.close().await;
    drop(workflow);
    let _ = printer.await;
    result
}

async fn drive(
    workflow: &mut Workflow<ApiClient>,
    config: &WizardConfig,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let session_id = workflow
        .create_session(&args.client, args.sub_client.as_deref())
        .await?;
    info!(session = %session_id, "workflow started");

    workflow.upload_files(&args.files).await?;
    workflow.start_processing().await?;
    workflow.wait_processing().await?;

    if let Some(path) = &args.output {
        let archive = workflow.download_results().await?;
        std::fs::write(path, &archive)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("results saved to {}", path.display());
    }

    if args.ingest {
        let stats = workflow.ingest(config.indices.clone()).await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    println!("session {session_id} done");
    Ok(())
}

/// `reportflow watch <session>`.
pub async fn watch(config: &WizardConfig, session_id: &str) -> anyhow::Result<()> {
    let source: Arc<dyn EventSource> = Arc::new(ApiClient::new(&config.api_base_url)?);
    let mut consumer = EventStreamConsumer::new(source, config.consumer_config());

    consumer
        .open(
            session_id,
            Box::new(|record: &EventRecord| {
                println!("{}", LogLine::from_payload(record.payload()));
            }),
        )
        .await;

    let finished = tokio::select! {
        reason = consumer.wait_terminated() => reason,
        _ = tokio::signal::ctrl_c() => None,
    };
    consumer.close().await;

    match finished {
        Some(TerminalReason::Done) => Ok(()),
        Some(TerminalReason::Error) => anyhow::bail!("processing of session {session_id} failed"),
        Some(TerminalReason::Cancelled) | None => anyhow::bail!("interrupted"),
    }
}

/// `reportflow config`.
pub fn show_config(config: &WizardConfig, path: &Path) -> anyhow::Result<()> {
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
