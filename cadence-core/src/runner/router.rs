use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::RouteError;
use crate::protocol::ClickEvent;
use crate::registry::{Entry, Registry};
use crate::runner::worker::BlockEvent;

/// Delivers events into block mailboxes. Mailboxes are indexed like the
/// registry entries.
#[derive(Debug)]
pub(crate) struct Router {
    registry: Arc<Registry>,
    mailboxes: Vec<mpsc::Sender<BlockEvent>>,
}

impl Router {
    pub(crate) fn new(registry: Arc<Registry>, mailboxes: Vec<mpsc::Sender<BlockEvent>>) -> Self {
        debug_assert_eq!(registry.len(), mailboxes.len());
        Self { registry, mailboxes }
    }

    pub(crate) fn route_click(&self, click: ClickEvent) -> Result<(), RouteError> {
        let instance = click.instance.as_deref().ok_or(RouteError::MissingInstance)?;
        let entry = self
            .registry
            .resolve(instance)
            .map_err(|_| RouteError::UnresolvedInstance(instance.to_string()))?
            .clone();
        self.deliver(&entry, BlockEvent::Click(click))
    }

    pub(crate) fn deliver(&self, entry: &Entry, event: BlockEvent) -> Result<(), RouteError> {
        if entry.status().is_terminal() {
            return Err(RouteError::Errored(entry.name().to_string()));
        }
        let Some(mailbox) = self.mailboxes.get(entry.index()) else {
            return Err(RouteError::UnresolvedInstance(entry.instance().to_string()));
        };
        mailbox.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => RouteError::Busy(entry.name().to_string()),
            TrySendError::Closed(_) => RouteError::Errored(entry.name().to_string()),
        })
    }
}
