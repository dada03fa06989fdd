//! `prowl daemon` — the full proactive runtime.

use prowl_core::event::DomainEvent;
use prowl_proactive::ProactiveCoordinator;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = super::build_runtime().await?;

    let task_count = runtime.scheduler.list_tasks().await.len();
    println!("🐾 Prowl daemon — proactive runtime");
    println!("   Model:    {}", runtime.config.provider.model);
    println!("   Data dir: {}", runtime.config.data_dir().display());
    println!("   Tasks:    {task_count}");
    println!(
        "   Tick:     {}s (rescan every {}s)",
        runtime.config.proactive.tick_secs, runtime.config.proactive.rescan_secs
    );
    println!();
    println!("   Ctrl-C to stop.");

    // Surface pipeline events in the daemon log
    let mut events = runtime.event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.as_ref() {
                    DomainEvent::TaskCreated { name, .. } => {
                        info!(task = %name, "Task created");
                    }
                    DomainEvent::TaskFired { name, .. } => {
                        info!(task = %name, "Task fired");
                    }
                    DomainEvent::ItemProcessed { task_id, .. } => {
                        info!(task_id = %task_id, "Work item delivered");
                    }
                    DomainEvent::ItemProcessingError {
                        item,
                        error_message,
                        ..
                    } => {
                        warn!(item = %item, error = %error_message, "Work item delivery failed");
                    }
                    _ => {}
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let coordinator = ProactiveCoordinator::start(
        runtime.agent.clone(),
        runtime.scheduler.clone(),
        runtime.event_bus.clone(),
        Duration::from_secs(runtime.config.proactive.rescan_secs),
    );

    info!("Proactive runtime started");
    tokio::signal::ctrl_c().await?;

    coordinator.stop();
    info!("Proactive runtime stopped");
    Ok(())
}
