//! The agent reasoning loop implementation.

use chrono::Utc;
use prowl_core::error::{AgentError, Error, Result};
use prowl_core::event::{DomainEvent, EventBus};
use prowl_core::message::{Message, Role};
use prowl_core::provider::{Provider, ProviderRequest};
use prowl_core::tool::{Tool, ToolCall, ToolRegistry};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// The steerable agent: one conversation, one reasoning loop.
///
/// Concurrency contract: the message log and steering queue are mutated
/// only by the agent's own methods — collaborators reach in exclusively
/// through `steer`, `resume`, and `is_idle`. The steering queue is a
/// short-critical-section mutex so `steer` is synchronous and never
/// blocks; the "wait until idle" in `run` is an async lock acquisition,
/// whose release on reaching idle doubles as the wake-up notification.
pub struct Agent {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Maximum loop iterations per run/resume call
    max_iterations: u32,

    /// Base system prompt, without the generated tool listing
    base_prompt: String,

    /// Tool registry owned by this agent
    tools: tokio::sync::RwLock<ToolRegistry>,

    /// Cached system message content (base prompt + tool listing)
    system_content: Mutex<String>,

    /// The ordered message log
    log: Mutex<Vec<Message>>,

    /// FIFO queue of messages awaiting injection
    steering: Mutex<VecDeque<Message>>,

    /// Whether the loop is currently active
    running: AtomicBool,

    /// Held for the duration of a run/resume call; acquiring it is the
    /// "wait until idle" of `run`
    run_permit: tokio::sync::Mutex<()>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl Agent {
    /// Create a new agent with an empty tool registry.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        system_prompt: impl Into<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let base_prompt = system_prompt.into();
        let system_content = render_system_content(&base_prompt, &ToolRegistry::new());

        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_iterations: 25,
            base_prompt,
            tools: tokio::sync::RwLock::new(ToolRegistry::new()),
            log: Mutex::new(vec![Message::system(&system_content)]),
            system_content: Mutex::new(system_content),
            steering: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
            run_permit: tokio::sync::Mutex::new(()),
            event_bus,
        }
    }

    /// Set the maximum number of loop iterations per call.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Whether the loop is currently inactive.
    pub fn is_idle(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// A snapshot of the current message log.
    pub fn log_snapshot(&self) -> Vec<Message> {
        self.lock_log().clone()
    }

    /// Replace the message log with a previously persisted one.
    ///
    /// The restored log keeps this agent's system message in first
    /// position; a leading system message in `messages` is replaced.
    pub fn restore_log(&self, mut messages: Vec<Message>) {
        let system = Message::system(self.current_system_content());
        if messages.first().map(|m| m.role) == Some(Role::System) {
            messages[0] = system;
        } else {
            messages.insert(0, system);
        }
        *self.lock_log() = messages;
    }

    /// Inject a message from outside the normal user-input path.
    ///
    /// Never blocks and never inspects run state: the message is queued and
    /// picked up at the loop's next checkpoint, or by the next
    /// `run`/`resume` call if the agent is idle.
    pub fn steer(&self, message: Message) {
        debug!(content = %message.content, "Message steered into queue");
        self.lock_steering().push_back(message);
    }

    /// Register a tool, replacing any previous one with the same name, and
    /// regenerate the system message's tool listing in place.
    pub async fn register_tool(&self, tool: Box<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.register(tool);
        let content = render_system_content(&self.base_prompt, &tools);
        drop(tools);

        if let Ok(mut cached) = self.system_content.lock() {
            *cached = content.clone();
        }
        let mut log = self.lock_log();
        if let Some(first) = log.first_mut()
            && first.role == Role::System
        {
            first.content = content;
        }
    }

    /// Reset the log to only the system message and empty the steering
    /// queue. Does not touch the running flag.
    pub fn clear(&self) {
        *self.lock_log() = vec![Message::system(self.current_system_content())];
        self.lock_steering().clear();
    }

    /// Process a user message and return the final assistant text.
    ///
    /// If the agent is running, waits (asynchronously, no polling) until it
    /// reaches idle before starting.
    pub async fn run(&self, user_text: impl Into<String>) -> Result<String> {
        let _permit = self.run_permit.lock().await;
        self.lock_log().push(Message::user(user_text));
        self.drive().await
    }

    /// Wake an idle agent to drain its steering queue.
    ///
    /// If the agent is already running this is a no-op returning an empty
    /// string — never an error. The busy loop will pick the queue up at its
    /// own next checkpoint.
    pub async fn resume(&self) -> Result<String> {
        let Ok(_permit) = self.run_permit.try_lock() else {
            return Ok(String::new());
        };
        self.drive().await
    }

    /// Run the loop to exhaustion, maintaining the running flag on both
    /// success and error paths.
    async fn drive(&self) -> Result<String> {
        self.running.store(true, Ordering::SeqCst);
        let result = self.loop_to_answer().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// The core Reason→Act→Observe loop.
    ///
    /// Each iteration: drain one steered message ahead of any model call;
    /// stop at an assistant-final log tail once the queue is empty; else
    /// call the provider and execute whatever tools it requests.
    async fn loop_to_answer(&self) -> Result<String> {
        let mut iteration = 0u32;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(
                    iterations = iteration,
                    "Agent loop exceeded max iterations"
                );
                return Err(Error::Agent(AgentError::IterationLimit {
                    max_iterations: self.max_iterations,
                }));
            }

            // Steered messages take priority over calling the model
            let steered = self.lock_steering().pop_front();
            if let Some(message) = steered {
                self.lock_log().push(message);
            }

            // An assistant tail with an empty queue is the natural idle
            // point; with a non-empty queue, loop so the steered message is
            // processed before we stop
            let tail = {
                let log = self.lock_log();
                log.last()
                    .filter(|m| m.role == Role::Assistant)
                    .map(|m| m.content.clone())
            };
            if let Some(answer) = tail {
                if self.lock_steering().is_empty() {
                    return Ok(answer);
                }
                continue;
            }

            debug!(iteration, "Agent loop iteration");

            let messages = self.lock_log().clone();
            let request = ProviderRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: self.tools.read().await.definitions(),
            };

            // Transport errors abort the whole call
            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            if response.message.tool_calls.is_empty() {
                // Final answer: append and loop — the next tail check
                // returns it, or drains steering that arrived meanwhile
                self.lock_log().push(response.message);
                continue;
            }

            let tool_calls = response.message.tool_calls.clone();
            debug!(tool_count = tool_calls.len(), "Executing tool calls");
            self.lock_log().push(response.message);

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    // Malformed argument JSON degrades to an empty object
                    // rather than failing the call
                    arguments: serde_json::from_str(&tc.arguments)
                        .unwrap_or_else(|_| serde_json::json!({})),
                };

                let start = std::time::Instant::now();
                let result = self.tools.read().await.execute(&call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let (success, output) = match result {
                    Ok(tool_result) => (tool_result.success, tool_result.output),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        // Report the error to the model so it can recover
                        (false, format!("Error: {e}"))
                    }
                };

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                self.lock_log()
                    .push(Message::tool_result(&tc.id, &tc.name, output));
            }
        }
    }

    fn current_system_content(&self) -> String {
        self.system_content
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|_| self.base_prompt.clone())
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_steering(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        match self.steering.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Build the system message content: base prompt plus the tool listing.
fn render_system_content(base_prompt: &str, tools: &ToolRegistry) -> String {
    let names = tools.names();
    if names.is_empty() {
        return base_prompt.to_string();
    }

    let mut content = format!("{base_prompt}\n\n## Available tools\n");
    for def in tools.definitions() {
        content.push_str(&format!("- {}: {}\n", def.name, def.description));
    }
    content
}
