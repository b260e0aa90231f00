use crate::ingest::{EventKind, IncomingMessage, IngestOutcome};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tokio::task::JoinHandle;
use tracing::debug;

/// Routes gateway events to ingestion. Storage runs in its own task per event.
pub async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    dispatch(data, event);
    Ok(())
}

fn dispatch(data: &Data, event: &serenity::FullEvent) -> Option<JoinHandle<IngestOutcome>> {
    to_incoming(event).map(|incoming| data.ingestor.spawn(incoming))
}

fn to_incoming(event: &serenity::FullEvent) -> Option<IncomingMessage> {
    match event {
        serenity::FullEvent::Message { new_message } => Some(IncomingMessage::from_message(
            new_message,
            EventKind::Created,
        )),
        serenity::FullEvent::MessageUpdate { new, event, .. } => {
            let incoming = match new {
                Some(message) => Some(IncomingMessage::from_message(message, EventKind::Updated)),
                None => IncomingMessage::from_update(event),
            };
            if incoming.is_none() {
                debug!("Ignoring partial update for message {}", event.id);
            }
            incoming
        }
        _ => None,
    }
}
