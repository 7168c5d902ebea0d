use async_trait::async_trait;
use serenity::all::Context;
use tracing::info;

use super::{Execute, Invocation, Trigger};
use crate::definition::HandlerDefinition;
use crate::Data;

/// Writes the definition's `message` setting to the log. Meant for events.
pub struct LogHandler;

#[async_trait]
impl Execute for LogHandler {
    async fn execute(
        &self,
        _ctx: &Context,
        _data: &Data,
        definition: &HandlerDefinition,
        invocation: &Invocation<'_>,
    ) -> anyhow::Result<()> {
        let message = definition.setting_str("message").unwrap_or("handled");
        match &invocation.trigger {
            Trigger::Ready(ready) => info!("[{}] {} ({})", definition.name, message, ready.user.name),
            Trigger::Message(msg) => info!(
                "[{}] {} (from {} in channel {})",
                definition.name, message, msg.author.name, msg.channel_id
            ),
            _ => info!("[{}] {}", definition.name, message),
        }
        Ok(())
    }
}
