use sev0::ask::AskOrchestrator;
use sev0::commands::{self, reconcile};
use sev0::db::{Database, MessageStore};
use sev0::ingest::{EventFilter, Ingestor};
use sev0::llm::{Agent, LlmClient};
use sev0::tools::builtin::RecentMessagesTool;
use sev0::tools::ToolRegistry;
use sev0::{config::Config, events, health, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    debug!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let db = Database::new(&config)?;
    db.execute_init()?;
    let store: Arc<dyn MessageStore> = Arc::new(db);

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(RecentMessagesTool::new(
        store.clone(),
        config.recent_messages_default_limit,
        config.recent_messages_max_limit,
    )));
    let tools = Arc::new(tools);

    let llm = Arc::new(LlmClient::new(&config)?);
    let agent = Agent::new(llm, tools.clone(), config.agent_max_iterations);
    let ask = AskOrchestrator::new(
        Arc::new(agent),
        config.system_prompt.clone(),
        tools.names(),
        Duration::from_secs(config.ack_timeout_secs),
        Duration::from_secs(config.ask_timeout_secs),
    );

    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_port).await {
            error!("Health endpoint stopped: {}", e);
        }
    });

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::handlers(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("Connected as {} ({})", ready.user.name, ready.user.id);

                let scope = reconcile::CommandScope::from_guild_id(config.guild_id);
                let registry = reconcile::SerenityCommandRegistry::new(ctx.http.clone(), scope);
                let report = reconcile::reconcile(&registry, &commands::definitions()).await;
                if report.failed_creates.is_empty() && report.failed_deletes.is_empty() {
                    info!(
                        "Commands reconciled in {:?}: created {:?}, deleted {:?}",
                        scope, report.created, report.deleted
                    );
                } else {
                    warn!("Command reconciliation finished with failures: {:?}", report);
                }

                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let ingestor = Ingestor::new(
                    store,
                    EventFilter::new(ready.user.id.to_string()),
                    Duration::from_secs(config.store_timeout_secs),
                );

                info!("Bot is ready!");
                Ok(Data { ingestor, ask })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Client error: {}", e))?;

    Ok(())
}
