//! Handler definitions as loaded from definition files.
//!
//! A definition is plain data. The code that runs for it is resolved
//! separately through [`crate::commands::HandlerTable`] using
//! [`HandlerDefinition::handler_id`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of units the dispatcher can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    ChatCommand,
    ContextCommand,
    Event,
    InteractionType,
    Component,
    Modal,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 6] = [
        HandlerKind::ChatCommand,
        HandlerKind::ContextCommand,
        HandlerKind::Event,
        HandlerKind::InteractionType,
        HandlerKind::Component,
        HandlerKind::Modal,
    ];

    /// Kinds that exist as application commands on Discord's side.
    pub fn is_application_command(self) -> bool {
        matches!(self, HandlerKind::ChatCommand | HandlerKind::ContextCommand)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::ChatCommand => "chat command",
            HandlerKind::ContextCommand => "context command",
            HandlerKind::Event => "event",
            HandlerKind::InteractionType => "interaction",
            HandlerKind::Component => "component",
            HandlerKind::Modal => "modal",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum interval, in seconds, between invocations of one handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownSpec {
    /// Per guild, shared by every member of that guild.
    pub servers: Option<u64>,
    /// Per user, across all guilds and DMs.
    pub users: Option<u64>,
}

impl CooldownSpec {
    pub fn is_empty(&self) -> bool {
        self.servers.is_none() && self.users.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    #[default]
    ChatInput,
    User,
    Message,
}

impl CommandType {
    pub fn code(self) -> u8 {
        match self {
            CommandType::ChatInput => 1,
            CommandType::User => 2,
            CommandType::Message => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl OptionType {
    pub fn code(self) -> u8 {
        match self {
            OptionType::SubCommand => 1,
            OptionType::SubCommandGroup => 2,
            OptionType::String => 3,
            OptionType::Integer => 4,
            OptionType::Boolean => 5,
            OptionType::User => 6,
            OptionType::Channel => 7,
            OptionType::Role => 8,
            OptionType::Mentionable => 9,
            OptionType::Number => 10,
            OptionType::Attachment => 11,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Vec<CommandChoice>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
    #[serde(default)]
    pub autocomplete: bool,
    #[serde(default)]
    pub channel_types: Vec<u8>,
}

impl CommandOption {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            choices: Vec::new(),
            options: Vec::new(),
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            autocomplete: false,
            channel_types: Vec::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// The Discord-facing part of a command definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    #[serde(rename = "type", default)]
    pub kind: CommandType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    pub default_member_permissions: Option<String>,
    pub dm_permission: Option<bool>,
    #[serde(default)]
    pub nsfw: bool,
    pub integration_types: Option<Vec<u8>>,
    pub contexts: Option<Vec<u8>>,
}

impl CommandData {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }
}

/// One loaded unit of bot behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDefinition {
    pub name: String,
    pub kind: HandlerKind,
    pub cooldown: Option<CooldownSpec>,
    pub owner_only: bool,
    pub handler: Option<String>,
    pub data: Option<CommandData>,
    /// Every key of the file not covered above.
    pub settings: toml::Table,
}

#[derive(Deserialize)]
struct DefinitionFile {
    name: Option<String>,
    #[serde(default)]
    cooldown: Option<CooldownSpec>,
    #[serde(default)]
    owner_only: bool,
    handler: Option<String>,
    data: Option<CommandData>,
    #[serde(flatten)]
    settings: toml::Table,
}

impl HandlerDefinition {
    pub fn new(kind: HandlerKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            cooldown: None,
            owner_only: false,
            handler: None,
            data: None,
            settings: toml::Table::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: CooldownSpec) -> Self {
        self.cooldown = (!cooldown.is_empty()).then_some(cooldown);
        self
    }

    pub fn with_data(mut self, data: CommandData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Parses one definition file. Returns `Ok(None)` for a file that
    /// declares nothing.
    pub fn from_toml(
        kind: HandlerKind,
        file_stem: &str,
        source: &str,
    ) -> Result<Option<Self>, toml::de::Error> {
        let table: toml::Table = toml::from_str(source)?;
        if table.is_empty() {
            return Ok(None);
        }

        let file: DefinitionFile = toml::from_str(source)?;
        Ok(Some(Self {
            name: file.name.unwrap_or_else(|| file_stem.to_string()),
            kind,
            cooldown: file.cooldown.filter(|c| !c.is_empty()),
            owner_only: file.owner_only,
            handler: file.handler,
            data: file.data,
            settings: file.settings,
        }))
    }

    /// Id of the execute function this definition runs.
    pub fn handler_id(&self) -> &str {
        self.handler.as_deref().unwrap_or(&self.name)
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn setting_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(|v| v.as_bool())
    }
}
