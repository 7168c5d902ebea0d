use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Command, CommandId, GuildId, Http};

use crate::error::RemoteError;
use crate::shape::CommandShape;

/// A command as currently registered with Discord.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommand {
    pub id: u64,
    pub shape: CommandShape,
}

/// The application command endpoints reconciliation needs.
#[async_trait]
pub trait RemoteCommands: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RemoteCommand>, RemoteError>;
    async fn create(&self, shape: &CommandShape) -> Result<(), RemoteError>;
    async fn update(&self, id: u64, shape: &CommandShape) -> Result<(), RemoteError>;
    async fn delete(&self, id: u64) -> Result<(), RemoteError>;
}

/// Registers commands globally, or in one guild when developing.
pub struct HttpCommands {
    http: Arc<Http>,
    guild_id: Option<GuildId>,
}

impl HttpCommands {
    pub fn new(http: Arc<Http>, guild_id: Option<u64>) -> Self {
        Self {
            http,
            guild_id: guild_id.map(GuildId::new),
        }
    }
}

fn to_remote(command: Command) -> Result<RemoteCommand, RemoteError> {
    let id = command.id.get();
    let shape = CommandShape::from_remote(serde_json::to_value(&command)?)?;
    Ok(RemoteCommand { id, shape })
}

#[async_trait]
impl RemoteCommands for HttpCommands {
    async fn fetch_all(&self) -> Result<Vec<RemoteCommand>, RemoteError> {
        let commands = match self.guild_id {
            Some(guild_id) => self.http.get_guild_commands(guild_id).await?,
            None => self.http.get_global_commands().await?,
        };
        commands.into_iter().map(to_remote).collect()
    }

    async fn create(&self, shape: &CommandShape) -> Result<(), RemoteError> {
        match self.guild_id {
            Some(guild_id) => self.http.create_guild_command(guild_id, shape).await?,
            None => self.http.create_global_command(shape).await?,
        };
        Ok(())
    }

    async fn update(&self, id: u64, shape: &CommandShape) -> Result<(), RemoteError> {
        let command_id = CommandId::new(id);
        match self.guild_id {
            Some(guild_id) => {
                self.http
                    .edit_guild_command(guild_id, command_id, shape)
                    .await?
            }
            None => self.http.edit_global_command(command_id, shape).await?,
        };
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<(), RemoteError> {
        let command_id = CommandId::new(id);
        match self.guild_id {
            Some(guild_id) => self.http.delete_guild_command(guild_id, command_id).await?,
            None => self.http.delete_global_command(command_id).await?,
        }
        Ok(())
    }
}
