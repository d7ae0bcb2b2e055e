use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use super::{NotificationError, NotificationRouter, NotificationSink, TenderEvent};
use crate::store::NotificationStore;

/// Routes each event and persists the resulting record.
pub struct StoredNotificationSink {
    router: NotificationRouter,
    store: Arc<dyn NotificationStore>,
}

impl StoredNotificationSink {
    pub fn new(router: NotificationRouter, store: Arc<dyn NotificationStore>) -> Self {
        Self { router, store }
    }
}

#[async_trait]
impl NotificationSink for StoredNotificationSink {
    async fn emit(&self, event: TenderEvent) -> Result<(), NotificationError> {
        let record = self.router.route(&event, Utc::now());
        self.store.append_notification(record).await?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotificationSink {
    events: Arc<Mutex<Vec<TenderEvent>>>,
}

impl RecordingNotificationSink {
    pub fn events(&self) -> Vec<TenderEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(TenderEvent::event_type).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn emit(&self, event: TenderEvent) -> Result<(), NotificationError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

/// Rejects every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingNotificationSink;

#[async_trait]
impl NotificationSink for FailingNotificationSink {
    async fn emit(&self, event: TenderEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery(format!("sink offline for `{}`", event.event_type())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::StoredNotificationSink;
    use crate::domain::quotation::QuotationId;
    use crate::notify::{NotificationRouter, NotificationSink, TenderEvent};
    use crate::store::{InMemoryTenderStore, NotificationStore};

    #[tokio::test]
    async fn stored_sink_persists_routed_records() {
        let store = Arc::new(InMemoryTenderStore::new());
        let sink = StoredNotificationSink::new(NotificationRouter::default(), store.clone());

        sink.emit(TenderEvent::QuotationClosed {
            quotation_id: QuotationId::new("QT-1"),
            items_closed: 2,
        })
        .await
        .expect("emit");

        let records =
            store.notifications_for_quotation(&QuotationId::new("QT-1")).await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "quotation_closed");
        assert_eq!(records[0].action_url.as_deref(), Some("/quotations/QT-1"));

        assert!(store.mark_notification_read(&records[0].id).await.expect("mark"));
        assert!(!store.mark_notification_read(&records[0].id).await.expect("mark again"));
    }
}
