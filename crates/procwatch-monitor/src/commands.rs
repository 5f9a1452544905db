//! Command routing from channel requests into engine operations.
//!
//! The table is an open registry: adding a command is one new match arm.
//! Mutating handlers complete synchronously under the engine's state lock,
//! so they cannot interleave with a sampling tick mid-mutation.

use async_trait::async_trait;
use serde_json::{json, Value};

use procwatch_core::WatchTarget;
use procwatch_ipc::{CommandError, CommandHandler, CommandResult};

use crate::engine::WeakEngine;
use crate::MonitorEngine;

/// The engine's channel-facing command dispatcher.
pub struct EngineCommands {
    engine: WeakEngine,
}

impl EngineCommands {
    pub(crate) fn new(engine: WeakEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl CommandHandler for EngineCommands {
    async fn handle(&self, command: &str, payload: Value) -> CommandResult {
        let Some(engine) = self.engine.upgrade() else {
            return Err(CommandError::internal("monitor engine is gone"));
        };

        match command {
            "ping" => Ok(json!({ "pong": true })),

            "status" => Ok(status(&engine)),

            "add_target" => {
                let target = parse_target(&payload)?;
                Ok(json!({ "added": engine.add_target(target) }))
            }

            "remove_target" => {
                let target = parse_target(&payload)?;
                Ok(json!({ "removed": engine.remove_watch_target(&target.kind, &target.id) }))
            }

            "list_targets" => Ok(json!({ "targets": engine.targets() })),

            "get_snapshots" => Ok(json!({ "snapshots": engine.snapshots() })),

            "start" => {
                engine.start();
                Ok(json!({ "running": true }))
            }

            "stop" => {
                engine.stop();
                Ok(json!({ "running": false }))
            }

            other => Err(CommandError::unknown_command(other)),
        }
    }
}

fn status(engine: &MonitorEngine) -> Value {
    json!({
        "running": engine.is_running(),
        "targets": engine.target_count(),
        "snapshots": engine.snapshot_count(),
        "uptimeSecs": engine.uptime_secs(),
    })
}

fn parse_target(payload: &Value) -> Result<WatchTarget, CommandError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| CommandError::invalid_payload(format!("expected {{kind, id}}: {e}")))
}
