//! Routes gateway events and interactions to loaded definitions.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{ActivityData, CommandType, Context, EventHandler, Interaction, Message, Ready};
use tracing::{debug, error, info, warn};

use crate::commands::{Invocation, Trigger};
use crate::config::Config;
use crate::cooldown::{CooldownStatus, CooldownStore, InvocationContext};
use crate::definition::{HandlerDefinition, HandlerKind};
use crate::notify::{ChannelNotifier, Notifier, NotifyLevel};
use crate::remote::HttpCommands;
use crate::Data;

/// The interaction type name autocomplete requests are routed to.
pub const AUTOCOMPLETE: &str = "autocomplete";

pub struct Dispatcher {
    data: Arc<Data>,
}

impl Dispatcher {
    pub fn new(data: Arc<Data>) -> Self {
        Self { data }
    }
}

/// Outcome of the gates that run before a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    OwnerOnly,
    CoolingDown(String),
}

/// Owner-only first, then cooldowns. Invocations without a caller skip both.
pub fn admit(
    config: &Config,
    cooldowns: &CooldownStore,
    definition: &HandlerDefinition,
    caller: Option<&InvocationContext>,
) -> Admission {
    let Some(caller) = caller else {
        return Admission::Allowed;
    };
    if definition.owner_only && !config.is_owner(caller.user_id) {
        return Admission::OwnerOnly;
    }
    match cooldowns.check(definition, caller) {
        CooldownStatus::Ready => Admission::Allowed,
        status => Admission::CoolingDown(status.describe().unwrap_or_default()),
    }
}

/// Component and modal custom ids are `<definition name>[:<payload>]`.
pub fn custom_id_target(custom_id: &str) -> &str {
    custom_id.split_once(':').map_or(custom_id, |(name, _)| name)
}

pub fn command_kind(kind: CommandType) -> HandlerKind {
    match kind {
        CommandType::ChatInput => HandlerKind::ChatCommand,
        _ => HandlerKind::ContextCommand,
    }
}

#[async_trait]
impl EventHandler for Dispatcher {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected", ready.user.name);
        let config = &self.data.config;
        ctx.set_activity(Some(ActivityData::custom(&config.status_message)));

        if let Some(channel_id) = config.notify_channel_id {
            self.data.notifier.install(Arc::new(ChannelNotifier::new(
                ctx.http.clone(),
                channel_id,
                config.notify_level,
            )));
        }

        self.data
            .reconciler
            .attach_remote(Arc::new(HttpCommands::new(ctx.http.clone(), config.dev_guild_id)));

        if config.register_commands {
            match self.data.reconciler.reconcile_all(false).await {
                Ok(report) => info!("Commands synced: {}", report),
                Err(e) => {
                    error!("Command sync failed: {}", e);
                    self.data
                        .notifier
                        .notify(NotifyLevel::Error, &format!("Command sync failed: {}", e))
                        .await;
                }
            }
        }

        let invocation = Invocation::new(Trigger::Ready(&ready));
        self.run(&ctx, HandlerKind::Event, "ready", &invocation).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match &interaction {
            Interaction::Command(cmd) => {
                let kind = command_kind(cmd.data.kind);
                let invocation = Invocation::new(Trigger::Command(cmd));
                self.run(&ctx, kind, &cmd.data.name, &invocation).await;
            }
            Interaction::Autocomplete(cmd) => {
                self.run(
                    &ctx,
                    HandlerKind::InteractionType,
                    AUTOCOMPLETE,
                    &Invocation::new(Trigger::Autocomplete(cmd)),
                )
                .await;
            }
            Interaction::Component(cmp) => {
                let name = custom_id_target(&cmp.data.custom_id);
                let invocation = Invocation::new(Trigger::Component(cmp));
                self.run(&ctx, HandlerKind::Component, name, &invocation).await;
            }
            Interaction::Modal(modal) => {
                let name = custom_id_target(&modal.data.custom_id);
                let invocation = Invocation::new(Trigger::Modal(modal));
                self.run(&ctx, HandlerKind::Modal, name, &invocation).await;
            }
            other => debug!("Ignoring interaction {:?}", other.kind()),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let invocation = Invocation::new(Trigger::Message(&msg));
        self.run(&ctx, HandlerKind::Event, "message", &invocation).await;
    }
}

impl Dispatcher {
    async fn run(&self, ctx: &Context, kind: HandlerKind, name: &str, invocation: &Invocation<'_>) {
        let definition = self.data.registry.read().get(kind, name).cloned();
        let Some(definition) = definition else {
            if kind.is_application_command() {
                warn!("No {} definition named '{}'", kind, name);
                self.reply(ctx, invocation, "This command is no longer available.")
                    .await;
            }
            return;
        };

        let caller = invocation.context();
        match admit(&self.data.config, &self.data.cooldowns, &definition, caller.as_ref()) {
            Admission::Allowed => {}
            Admission::OwnerOnly => {
                info!("Denied owner-only {} '{}' to {:?}", kind, name, caller);
                self.reply(ctx, invocation, "🔒 Only bot owners can use this.")
                    .await;
                return;
            }
            Admission::CoolingDown(wait) => {
                self.reply(ctx, invocation, &format!("⏳ Slow down, try again in {}.", wait))
                    .await;
                return;
            }
        }

        let Some(handler) = self.data.handlers.resolve(&definition) else {
            warn!(
                "{} '{}' names unknown handler '{}'",
                kind,
                name,
                definition.handler_id()
            );
            self.reply(ctx, invocation, "This command has no handler.").await;
            return;
        };

        debug!("Running {} '{}'", kind, name);
        match handler.execute(ctx, &self.data, &definition, invocation).await {
            Ok(()) => {
                if let Some(caller) = caller {
                    self.data.cooldowns.record(&definition, &caller);
                }
            }
            Err(e) => {
                error!("{} '{}' failed: {:#}", kind, name, e);
                self.data
                    .notifier
                    .notify(NotifyLevel::Error, &format!("{} '{}' failed: {}", kind, name, e))
                    .await;
                self.reply(ctx, invocation, "❌ Something went wrong.").await;
            }
        }
    }

    async fn reply(&self, ctx: &Context, invocation: &Invocation<'_>, content: &str) {
        if let Err(e) = invocation.respond(&ctx.http, content, true).await {
            warn!("Failed to respond: {:#}", e);
        }
    }
}
