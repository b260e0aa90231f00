use crate::ask::{AskRequest, Responder};
use crate::{Context, Error};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;

/// Ask the bot a question
#[poise::command(slash_command)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "The question you want to ask"] question: String,
) -> Result<(), Error> {
    let poise::Context::Application(app_ctx) = ctx else {
        return Ok(());
    };
    let interaction = app_ctx.interaction;

    let request = AskRequest {
        interaction_id: interaction.id.to_string(),
        user_id: interaction.user.id.to_string(),
        user_name: interaction.user.name.clone(),
        guild_id: interaction.guild_id.map(|id| id.to_string()),
        question,
    };

    let responder = InteractionResponder::new(&ctx.serenity_context().http, interaction);
    ctx.data().ask.handle(&request, &responder).await;
    Ok(())
}

/// Defers the interaction, then edits the deferred response in place.
pub struct InteractionResponder<'a> {
    http: &'a serenity::Http,
    interaction: &'a serenity::CommandInteraction,
}

impl<'a> InteractionResponder<'a> {
    pub fn new(http: &'a serenity::Http, interaction: &'a serenity::CommandInteraction) -> Self {
        Self { http, interaction }
    }
}

#[async_trait]
impl Responder for InteractionResponder<'_> {
    async fn acknowledge(&self) -> anyhow::Result<()> {
        self.interaction.defer(self.http).await?;
        Ok(())
    }

    async fn deliver(&self, content: &str) -> anyhow::Result<()> {
        self.interaction
            .edit_response(
                self.http,
                serenity::EditInteractionResponse::new().content(content),
            )
            .await?;
        Ok(())
    }
}
