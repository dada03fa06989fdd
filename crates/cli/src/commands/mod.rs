//! CLI command implementations.

pub mod chat;
pub mod daemon;
pub mod task;

use prowl_agent::Agent;
use prowl_config::AppConfig;
use prowl_core::event::EventBus;
use prowl_providers::OpenAiCompatProvider;
use prowl_scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

/// Everything a command needs, built from config.
pub struct Runtime {
    pub config: AppConfig,
    pub agent: Arc<Agent>,
    pub scheduler: Arc<Scheduler>,
    pub event_bus: Arc<EventBus>,
}

/// Build the agent, scheduler, and tool registry from config.
pub async fn build_runtime() -> Result<Runtime, Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let api_key = config.api_key.clone().ok_or(
        "No API key configured. Set PROWL_API_KEY or add api_key to ~/.prowl/config.toml",
    )?;

    let event_bus = Arc::new(EventBus::default());

    let provider = Arc::new(OpenAiCompatProvider::new(
        config.provider.name.clone(),
        config.provider.base_url.clone(),
        api_key,
    )?);

    let scheduler = Arc::new(Scheduler::new(
        &config.data_dir(),
        Duration::from_secs(config.proactive.tick_secs),
        event_bus.clone(),
    )?);

    let agent = Arc::new(
        Agent::new(
            provider,
            config.provider.model.clone(),
            config.agent.temperature,
            config.agent.system_prompt.clone(),
            event_bus.clone(),
        )
        .with_max_iterations(config.agent.max_iterations)
        .with_max_tokens(config.agent.max_tokens),
    );

    // Register the built-in tools, including the scheduler-backed ones
    let registry = prowl_tools::default_registry(scheduler.clone());
    for tool in registry.into_tools() {
        tracing::debug!(tool = tool.name(), "Registering built-in tool");
        agent.register_tool(tool).await;
    }

    Ok(Runtime {
        config,
        agent,
        scheduler,
        event_bus,
    })
}

/// Scheduler-only runtime for task CRUD; no provider or API key needed.
pub fn build_scheduler() -> Result<(AppConfig, Arc<Scheduler>), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let scheduler = Arc::new(Scheduler::new(
        &config.data_dir(),
        Duration::from_secs(config.proactive.tick_secs),
        Arc::new(EventBus::default()),
    )?);
    Ok((config, scheduler))
}
