use async_trait::async_trait;
use serenity::all::{CommandDataOptionValue, CommandInteraction, Context, EditInteractionResponse};
use tracing::{error, info};

use super::{Execute, Invocation, Trigger};
use crate::definition::HandlerDefinition;
use crate::notify::{Notifier, NotifyLevel};
use crate::reconcile::ReconcileScope;
use crate::Data;

/// Reloads definitions and re-syncs commands (give it `owner_only = true`).
///
/// Options: `names` (comma separated), `exclude`, `force`.
pub struct ReloadHandler;

#[async_trait]
impl Execute for ReloadHandler {
    async fn execute(
        &self,
        ctx: &Context,
        data: &Data,
        _definition: &HandlerDefinition,
        invocation: &Invocation<'_>,
    ) -> anyhow::Result<()> {
        let Trigger::Command(cmd) = &invocation.trigger else {
            anyhow::bail!("reload can only run as a slash command");
        };
        let scope = scope_from_options(cmd);
        info!("Reload requested by {}: {:?}", cmd.user.name, scope);

        invocation.defer_ephemeral(&ctx.http).await?;

        let content = match data.reconciler.reconcile(&scope).await {
            Ok(report) => {
                data.notifier
                    .notify(
                        NotifyLevel::Info,
                        &format!("Reload by {}: {}", cmd.user.name, report),
                    )
                    .await;
                format!("✅ Reloaded: {}", report)
            }
            Err(e) => {
                error!("Reload failed: {}", e);
                data.notifier
                    .notify(NotifyLevel::Error, &format!("Reload failed: {}", e))
                    .await;
                format!("❌ Reload failed: {}", e)
            }
        };

        cmd.edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await?;
        Ok(())
    }
}

fn scope_from_options(cmd: &CommandInteraction) -> ReconcileScope {
    let mut names = None;
    let mut exclude = false;
    let mut force = false;
    for option in &cmd.data.options {
        match (option.name.as_str(), &option.value) {
            ("names", CommandDataOptionValue::String(value)) => names = Some(value.as_str()),
            ("exclude", CommandDataOptionValue::Boolean(value)) => exclude = *value,
            ("force", CommandDataOptionValue::Boolean(value)) => force = *value,
            _ => {}
        }
    }
    ReconcileScope::from_parts(names, exclude, force)
}
