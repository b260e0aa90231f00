use crate::{Data, Error};
use poise::serenity_prelude as serenity;

pub mod ask;
pub mod reconcile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParameter {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    pub required: bool,
}

/// A slash command as this bot declares it, independent of the platform's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<CommandParameter>,
}

impl CommandDefinition {
    pub fn to_create_command(&self) -> serenity::CreateCommand {
        self.parameters.iter().fold(
            serenity::CreateCommand::new(&self.name).description(&self.description),
            |command, param| {
                let kind = match param.kind {
                    ParameterKind::String => serenity::CommandOptionType::String,
                };
                command.add_option(
                    serenity::CreateCommandOption::new(kind, &param.name, &param.description)
                        .required(param.required),
                )
            },
        )
    }
}

/// Commands this bot owns in its scope; anything else registered there is removed at startup.
pub fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition {
        name: "ask".to_string(),
        description: "Ask the bot a question".to_string(),
        parameters: vec![CommandParameter {
            name: "question".to_string(),
            description: "The question you want to ask".to_string(),
            kind: ParameterKind::String,
            required: true,
        }],
    }]
}

/// Handlers, dispatched by command name. Built once when the framework is constructed.
pub fn handlers() -> Vec<poise::Command<Data, Error>> {
    vec![ask::ask()]
}
