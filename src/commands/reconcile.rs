//! Startup convergence of the platform's registered slash commands with ours.
//!
//! Remote commands we no longer declare are deleted. Every local command is
//! (re)created; the platform upserts by name, so recreating an existing one is
//! harmless. Each call is independent and best-effort.

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use super::CommandDefinition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ReconcilePlan<'a> {
    pub to_delete: Vec<RemoteCommand>,
    pub to_create: Vec<&'a CommandDefinition>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: Vec<String>,
    pub created: Vec<String>,
    pub failed_deletes: Vec<String>,
    pub failed_creates: Vec<String>,
    /// `false` when the remote list could not be fetched and deletions were skipped.
    pub listed: bool,
}

/// The platform's command registry for one scope.
#[async_trait]
pub trait CommandRegistry: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<RemoteCommand>>;
    async fn delete(&self, command: &RemoteCommand) -> anyhow::Result<()>;
    async fn create(&self, definition: &CommandDefinition) -> anyhow::Result<()>;
}

pub fn plan<'a>(local: &'a [CommandDefinition], remote: &[RemoteCommand]) -> ReconcilePlan<'a> {
    let local_names: HashSet<&str> = local.iter().map(|c| c.name.as_str()).collect();

    ReconcilePlan {
        to_delete: remote
            .iter()
            .filter(|c| !local_names.contains(c.name.as_str()))
            .cloned()
            .collect(),
        to_create: local.iter().collect(),
    }
}

pub async fn reconcile(
    registry: &dyn CommandRegistry,
    local: &[CommandDefinition],
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let remote = match registry.list().await {
        Ok(remote) => {
            report.listed = true;
            remote
        }
        Err(e) => {
            error!("Could not fetch registered commands, skipping cleanup: {}", e);
            Vec::new()
        }
    };

    let plan = plan(local, &remote);

    info!("Checking for commands to unregister...");
    for command in &plan.to_delete {
        info!("Unregistering command '{}' ({})", command.name, command.id);
        match registry.delete(command).await {
            Ok(()) => report.deleted.push(command.name.clone()),
            Err(e) => {
                error!("Cannot delete command '{}': {}", command.name, e);
                report.failed_deletes.push(command.name.clone());
            }
        }
    }

    info!("Registering {} commands", plan.to_create.len());
    for definition in plan.to_create {
        match registry.create(definition).await {
            Ok(()) => report.created.push(definition.name.clone()),
            Err(e) => {
                error!("Cannot create command '{}': {}", definition.name, e);
                report.failed_creates.push(definition.name.clone());
            }
        }
    }

    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    Guild(serenity::GuildId),
    Global,
}

impl CommandScope {
    pub fn from_guild_id(guild_id: Option<u64>) -> Self {
        guild_id
            .map(|id| CommandScope::Guild(serenity::GuildId::new(id)))
            .unwrap_or(CommandScope::Global)
    }
}

pub struct SerenityCommandRegistry {
    http: Arc<serenity::Http>,
    scope: CommandScope,
}

impl SerenityCommandRegistry {
    pub fn new(http: Arc<serenity::Http>, scope: CommandScope) -> Self {
        Self { http, scope }
    }
}

#[async_trait]
impl CommandRegistry for SerenityCommandRegistry {
    async fn list(&self) -> anyhow::Result<Vec<RemoteCommand>> {
        let http: &serenity::Http = &self.http;
        let commands = match self.scope {
            CommandScope::Guild(guild_id) => guild_id.get_commands(http).await?,
            CommandScope::Global => serenity::Command::get_global_commands(http).await?,
        };
        Ok(commands
            .into_iter()
            .map(|c| RemoteCommand {
                id: c.id.get(),
                name: c.name,
            })
            .collect())
    }

    async fn delete(&self, command: &RemoteCommand) -> anyhow::Result<()> {
        let http: &serenity::Http = &self.http;
        let command_id = serenity::CommandId::new(command.id);
        match self.scope {
            CommandScope::Guild(guild_id) => guild_id.delete_command(http, command_id).await?,
            CommandScope::Global => {
                serenity::Command::delete_global_command(http, command_id).await?
            }
        }
        Ok(())
    }

    async fn create(&self, definition: &CommandDefinition) -> anyhow::Result<()> {
        let http: &serenity::Http = &self.http;
        let builder = definition.to_create_command();
        match self.scope {
            CommandScope::Guild(guild_id) => {
                guild_id.create_command(http, builder).await?;
            }
            CommandScope::Global => {
                serenity::Command::create_global_command(http, builder).await?;
            }
        }
        Ok(())
    }
}
