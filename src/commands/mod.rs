use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, ComponentInteraction, Context, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, Http, Message,
    ModalInteraction, Ready,
};

use crate::cooldown::InvocationContext;
use crate::definition::HandlerDefinition;
use crate::Data;

pub mod admin;
pub mod log;
pub mod reply;

/// What triggered a handler.
pub enum Trigger<'a> {
    Command(&'a CommandInteraction),
    Autocomplete(&'a CommandInteraction),
    Component(&'a ComponentInteraction),
    Modal(&'a ModalInteraction),
    Message(&'a Message),
    Ready(&'a Ready),
}

/// How the next reply to an interaction has to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    InitialResponse,
    Followup,
}

/// Whether an interaction already got its one initial response.
#[derive(Debug, Default)]
pub struct Acknowledgement(AtomicBool);

impl Acknowledgement {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn delivery(&self) -> Delivery {
        if self.0.load(Ordering::Acquire) {
            Delivery::Followup
        } else {
            Delivery::InitialResponse
        }
    }
}

pub struct Invocation<'a> {
    pub trigger: Trigger<'a>,
    acknowledgement: Acknowledgement,
}

impl<'a> Invocation<'a> {
    pub fn new(trigger: Trigger<'a>) -> Self {
        Self {
            trigger,
            acknowledgement: Acknowledgement::default(),
        }
    }

    /// The caller, when there is one.
    pub fn context(&self) -> Option<InvocationContext> {
        let (user, guild) = match &self.trigger {
            Trigger::Command(cmd) | Trigger::Autocomplete(cmd) => (cmd.user.id, cmd.guild_id),
            Trigger::Component(cmp) => (cmp.user.id, cmp.guild_id),
            Trigger::Modal(modal) => (modal.user.id, modal.guild_id),
            Trigger::Message(msg) => (msg.author.id, msg.guild_id),
            Trigger::Ready(_) => return None,
        };
        Some(InvocationContext::new(user.get(), guild.map(|g| g.get())))
    }

    /// Acknowledges an interaction privately without content. Later
    /// replies go out as followups.
    pub async fn defer_ephemeral(&self, http: &Http) -> anyhow::Result<()> {
        let defer = || CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true));
        match &self.trigger {
            Trigger::Command(cmd) => cmd.create_response(http, defer()).await?,
            Trigger::Component(cmp) => cmp.create_response(http, defer()).await?,
            Trigger::Modal(modal) => modal.create_response(http, defer()).await?,
            Trigger::Autocomplete(_) | Trigger::Message(_) | Trigger::Ready(_) => return Ok(()),
        }
        self.acknowledgement.mark();
        Ok(())
    }

    /// Sends a plain message back to wherever the invocation came from.
    /// Autocomplete and ready have nowhere to reply to.
    pub async fn respond(&self, http: &Http, content: &str, ephemeral: bool) -> anyhow::Result<()> {
        let message = || {
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            )
        };
        let followup = || {
            CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(ephemeral)
        };
        let delivery = self.acknowledgement.delivery();
        match (&self.trigger, delivery) {
            (Trigger::Command(cmd), Delivery::InitialResponse) => cmd.create_response(http, message()).await?,
            (Trigger::Command(cmd), Delivery::Followup) => {
                cmd.create_followup(http, followup()).await?;
            }
            (Trigger::Component(cmp), Delivery::InitialResponse) => cmp.create_response(http, message()).await?,
            (Trigger::Component(cmp), Delivery::Followup) => {
                cmp.create_followup(http, followup()).await?;
            }
            (Trigger::Modal(modal), Delivery::InitialResponse) => modal.create_response(http, message()).await?,
            (Trigger::Modal(modal), Delivery::Followup) => {
                modal.create_followup(http, followup()).await?;
            }
            (Trigger::Message(msg), _) => {
                msg.reply(http, content).await?;
                return Ok(());
            }
            (Trigger::Autocomplete(_) | Trigger::Ready(_), _) => return Ok(()),
        }
        self.acknowledgement.mark();
        Ok(())
    }
}

/// The code behind a definition.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(
        &self,
        ctx: &Context,
        data: &Data,
        definition: &HandlerDefinition,
        invocation: &Invocation<'_>,
    ) -> anyhow::Result<()>;
}

/// Execute functions by id. Definitions name theirs with `handler`.
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn Execute>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The handlers shipped with the bot.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register("reply", Arc::new(reply::ReplyHandler));
        table.register("log", Arc::new(log::LogHandler));
        table.register("reload", Arc::new(admin::ReloadHandler));
        table
    }

    pub fn register(&mut self, id: impl Into<String>, handler: Arc<dyn Execute>) {
        self.handlers.insert(id.into(), handler);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Execute>> {
        self.handlers.get(id).cloned()
    }

    pub fn resolve(&self, definition: &HandlerDefinition) -> Option<Arc<dyn Execute>> {
        self.get(definition.handler_id())
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::HandlerKind;

    #[test]
    fn test_replies_after_acknowledgement_are_followups() {
        let ack = Acknowledgement::default();
        assert_eq!(ack.delivery(), Delivery::InitialResponse);
        ack.mark();
        assert_eq!(ack.delivery(), Delivery::Followup);
        ack.mark();
        assert_eq!(ack.delivery(), Delivery::Followup);
    }

    #[test]
    fn test_resolve_uses_handler_id() {
        let table = HandlerTable::builtin();
        assert_eq!(table.ids(), vec!["log", "reload", "reply"]);

        let ping = HandlerDefinition::new(HandlerKind::ChatCommand, "ping").with_handler("reply");
        assert!(table.resolve(&ping).is_some());

        // Without `handler`, the definition name is the id.
        let reload = HandlerDefinition::new(HandlerKind::ChatCommand, "reload");
        assert!(table.resolve(&reload).is_some());

        let unknown = HandlerDefinition::new(HandlerKind::ChatCommand, "dance");
        assert!(table.resolve(&unknown).is_none());
    }
}
