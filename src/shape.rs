//! The comparable form of an application command.
//!
//! Discord echoes back fields a definition file usually omits (nullable
//! permissions, integration types, `nsfw`, empty option lists). Both the
//! local and the remote side are brought into [`CommandShape::normalized`]
//! form before comparing, otherwise every pass would report an update.
//! Option lists compare positionally: reordering options is a change.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::definition::{CommandChoice, CommandOption, CommandType, HandlerDefinition, HandlerKind};

/// Installation context Discord assumes when none is given (guild install).
pub const DEFAULT_INTEGRATION_TYPE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandShape {
    #[serde(rename = "type", default = "chat_input")]
    pub kind: u8,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionShape>,
    #[serde(default, deserialize_with = "permissions")]
    pub default_member_permissions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_permission: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub nsfw: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub integration_types: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionShape {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub required: bool,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    #[serde(default, deserialize_with = "nullable")]
    pub autocomplete: bool,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
}

fn chat_input() -> u8 {
    CommandType::ChatInput.code()
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Discord sends a string; serenity's model serializes a bitflag integer.
fn permissions<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Bits(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Bits(bits) => bits.to_string(),
    }))
}

impl From<&CommandOption> for OptionShape {
    fn from(option: &CommandOption) -> Self {
        Self {
            kind: option.kind.code(),
            name: option.name.clone(),
            description: option.description.clone(),
            required: option.required,
            choices: option.choices.clone(),
            options: option.options.iter().map(OptionShape::from).collect(),
            min_value: option.min_value,
            max_value: option.max_value,
            min_length: option.min_length,
            max_length: option.max_length,
            autocomplete: option.autocomplete,
            channel_types: option.channel_types.clone(),
        }
    }
}

impl CommandShape {
    /// Builds the shape a definition registers as. `None` for kinds that
    /// have no application command.
    pub fn from_definition(definition: &HandlerDefinition) -> Option<Self> {
        if !definition.kind.is_application_command() {
            return None;
        }

        let data = definition.data.clone().unwrap_or_default();
        // The directory decides the kind, not `data.type`.
        let kind = match (definition.kind, data.kind) {
            (HandlerKind::ChatCommand, CommandType::ChatInput) => CommandType::ChatInput,
            (HandlerKind::ChatCommand, other) => {
                warn!(
                    "Chat command '{}' declares type {:?}, registering it as a slash command",
                    definition.name, other
                );
                CommandType::ChatInput
            }
            (_, CommandType::ChatInput) => CommandType::User,
            (_, kind) => kind,
        };

        let shape = Self {
            kind: kind.code(),
            name: definition.name.clone(),
            description: data.description,
            options: data.options.iter().map(OptionShape::from).collect(),
            default_member_permissions: data.default_member_permissions,
            dm_permission: data.dm_permission,
            nsfw: data.nsfw,
            integration_types: data.integration_types.unwrap_or_default(),
            contexts: data.contexts,
        };
        Some(shape.normalized())
    }

    /// Parses a command as returned by Discord.
    pub fn from_remote(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(serde_json::from_value::<Self>(value)?.normalized())
    }

    /// Fills in the values Discord reports for fields left unset.
    pub fn normalized(mut self) -> Self {
        self.dm_permission.get_or_insert(true);
        if self.integration_types.is_empty() {
            self.integration_types.push(DEFAULT_INTEGRATION_TYPE);
        }
        if self.contexts.as_ref().is_some_and(Vec::is_empty) {
            self.contexts = None;
        }
        self
    }

    /// Remote commands are matched by type and name.
    pub fn key(&self) -> (u8, &str) {
        (self.kind, &self.name)
    }
}
