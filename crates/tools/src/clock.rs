//! Clock tool — current date and time.
//!
//! The model has no reliable sense of "now"; scheduling a task at an
//! absolute instant needs one.

use async_trait::async_trait;
use chrono::Utc;
use prowl_core::error::ToolError;
use prowl_core::tool::{Tool, ToolResult};

pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Get the current UTC date and time in RFC 3339 format. Use this before scheduling tasks at absolute times."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(Utc::now().to_rfc3339()))
    }
}
