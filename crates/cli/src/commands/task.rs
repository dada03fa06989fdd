//! `prowl task` — Manage proactive scheduled tasks.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use prowl_scheduler::{TaskAction, TaskKind, TaskSpec, Trigger};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task (one of --at / --every is required)
    Add {
        /// Task name
        name: String,

        /// Prompt delivered to the agent when the task fires
        prompt: String,

        /// Fire once at this RFC 3339 timestamp
        #[arg(long)]
        at: Option<String>,

        /// Fire repeatedly, e.g. "*/5 * * * *" for every 5 minutes
        #[arg(long)]
        every: Option<String>,

        /// Cap on the number of firings
        #[arg(long)]
        max_runs: Option<u32>,
    },

    /// List all tasks
    List,

    /// Remove a task by id
    Rm { id: String },

    /// Disable a task without removing it
    Pause { id: String },

    /// Re-enable a paused task
    Resume { id: String },
}

pub async fn run(command: TaskCommands) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, scheduler) = super::build_scheduler()?;

    match command {
        TaskCommands::Add {
            name,
            prompt,
            at,
            every,
            max_runs,
        } => {
            let at: Option<DateTime<Utc>> = at
                .map(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .map(|t| t.with_timezone(&Utc))
                        .map_err(|e| format!("Bad --at timestamp: {e}"))
                })
                .transpose()?;

            let kind = match (&at, &every) {
                (Some(_), None) => TaskKind::Scheduled,
                (None, Some(_)) => TaskKind::Recurring,
                _ => {
                    println!("❌ Provide exactly one of --at or --every.");
                    println!("   Examples:");
                    println!("   prowl task add standup \"Draft my standup notes\" --at 2026-08-08T08:30:00Z");
                    println!("   prowl task add digest \"Summarize my inbox\" --every \"*/30 * * * *\"");
                    return Ok(());
                }
            };

            let task = scheduler
                .create_task(TaskSpec {
                    name,
                    kind,
                    trigger: Trigger { at, every },
                    action: TaskAction {
                        prompt,
                        allowed_tools: None,
                    },
                    enabled: true,
                    max_runs,
                })
                .await?;

            println!("✅ Task '{}' created (id {})", task.name, task.id);
            if let Some(next) = task.next_run {
                println!("   Next run: {}", next.to_rfc3339());
            }
        }

        TaskCommands::List => {
            let tasks = scheduler.list_tasks().await;
            if tasks.is_empty() {
                println!("📋 No tasks scheduled.");
                println!();
                println!("   Add one with:");
                println!("   prowl task add digest \"Summarize my inbox\" --every \"*/30 * * * *\"");
                return Ok(());
            }

            println!("📋 Tasks ({}):", tasks.len());
            println!("{:-<72}", "");
            for task in tasks {
                let status = if task.enabled { "✅" } else { "⏸️ " };
                let next = task
                    .next_run
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "—".into());
                println!(
                    "  {status} {:<20} {:<12} runs: {:<4} next: {next}",
                    task.name,
                    format!("{:?}", task.kind).to_lowercase(),
                    task.run_count
                );
                println!("      └─ id: {}", task.id);
            }
        }

        TaskCommands::Rm { id } => {
            if scheduler.delete_task(&id).await? {
                println!("🗑️  Task {id} removed.");
            } else {
                println!("❌ Task {id} not found.");
            }
        }

        TaskCommands::Pause { id } => match scheduler.toggle_task(&id, false).await {
            Ok(task) => println!("⏸️  Task '{}' paused.", task.name),
            Err(_) => println!("❌ Task {id} not found."),
        },

        TaskCommands::Resume { id } => match scheduler.toggle_task(&id, true).await {
            Ok(task) => println!("▶️  Task '{}' resumed.", task.name),
            Err(_) => println!("❌ Task {id} not found."),
        },
    }

    Ok(())
}
