use async_trait::async_trait;
use serenity::all::Context;

use super::{Execute, Invocation};
use crate::definition::HandlerDefinition;
use crate::Data;

/// Answers with the definition's `response` setting. `{user}` becomes a
/// mention of the caller; `ephemeral = true` hides the reply from others.
pub struct ReplyHandler;

#[async_trait]
impl Execute for ReplyHandler {
    async fn execute(
        &self,
        ctx: &Context,
        _data: &Data,
        definition: &HandlerDefinition,
        invocation: &Invocation<'_>,
    ) -> anyhow::Result<()> {
        let template = definition
            .setting_str("response")
            .ok_or_else(|| anyhow::anyhow!("'{}' has no response configured", definition.name))?;
        let content = render(template, invocation.context().map(|c| c.user_id));
        let ephemeral = definition.setting_bool("ephemeral").unwrap_or(false);

        invocation.respond(&ctx.http, &content, ephemeral).await
    }
}

fn render(template: &str, user_id: Option<u64>) -> String {
    match user_id {
        Some(id) => template.replace("{user}", &format!("<@{}>", id)),
        None => template.to_string(),
    }
}
