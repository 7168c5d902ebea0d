use crate::definition::HandlerKind;
use crate::notify::NotifyLevel;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub owner_ids: Vec<u64>,
    pub dev_guild_id: Option<u64>,
    pub register_commands: bool,
    pub status_message: String,

    // Definition discovery
    pub definitions_root: PathBuf,
    pub chat_command_dirs: Vec<PathBuf>,
    pub context_command_dirs: Vec<PathBuf>,
    pub event_dirs: Vec<PathBuf>,
    pub interaction_dirs: Vec<PathBuf>,
    pub component_dirs: Vec<PathBuf>,
    pub modal_dirs: Vec<PathBuf>,

    // Operator surfaces
    pub notify_channel_id: Option<u64>,
    pub notify_level: NotifyLevel,
    pub console_enabled: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            owner_ids: parse_id_list(&env::var("OWNER_IDS").unwrap_or_default())?,
            dev_guild_id: env::var("DEV_GUILD_ID").ok().and_then(|id| id.parse().ok()),
            register_commands: env::var("REGISTER_COMMANDS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Ready to assist!".to_string()),
            definitions_root: env::var("DEFINITIONS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            chat_command_dirs: dirs_var("CHAT_COMMANDS_DIRS", "commands/chat"),
            context_command_dirs: dirs_var("CONTEXT_COMMANDS_DIRS", "commands/context"),
            event_dirs: dirs_var("EVENTS_DIRS", "events"),
            interaction_dirs: dirs_var("INTERACTIONS_DIRS", "interactions"),
            component_dirs: dirs_var("COMPONENTS_DIRS", "components"),
            modal_dirs: dirs_var("MODALS_DIRS", "modals"),
            notify_channel_id: env::var("NOTIFY_CHANNEL_ID").ok().and_then(|id| id.parse().ok()),
            notify_level: env::var("NOTIFY_LEVEL")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(NotifyLevel::Warn),
            console_enabled: env::var("CONSOLE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }

    pub fn directories_for(&self, kind: HandlerKind) -> &[PathBuf] {
        match kind {
            HandlerKind::ChatCommand => &self.chat_command_dirs,
            HandlerKind::ContextCommand => &self.context_command_dirs,
            HandlerKind::Event => &self.event_dirs,
            HandlerKind::InteractionType => &self.interaction_dirs,
            HandlerKind::Component => &self.component_dirs,
            HandlerKind::Modal => &self.modal_dirs,
        }
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_ids.contains(&user_id)
    }
}

fn dirs_var(name: &str, default: &str) -> Vec<PathBuf> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_id_list(raw: &str) -> anyhow::Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .map_err(|_| anyhow::anyhow!("OWNER_IDS entry '{}' must be a valid u64", id))
        })
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("owner_ids", &self.owner_ids)
            .field("dev_guild_id", &self.dev_guild_id)
            .field("register_commands", &self.register_commands)
            .field("status_message", &self.status_message)
            .field("definitions_root", &self.definitions_root)
            .field("chat_command_dirs", &self.chat_command_dirs)
            .field("context_command_dirs", &self.context_command_dirs)
            .field("event_dirs", &self.event_dirs)
            .field("interaction_dirs", &self.interaction_dirs)
            .field("component_dirs", &self.component_dirs)
            .field("modal_dirs", &self.modal_dirs)
            .field("notify_channel_id", &self.notify_channel_id)
            .field("notify_level", &self.notify_level)
            .field("console_enabled", &self.console_enabled)
            .finish()
    }
}
