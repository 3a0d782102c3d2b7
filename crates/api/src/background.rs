//! Long-running tasks spawned next to the HTTP server.
use std::time::Duration;

use cra_core::events::bus::EventBus;
use cra_core::events::types::DocumentEvent;
use cra_core::manager::DocumentManager;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodically purge trash that has outlived the retention window.
pub fn spawn_trash_sweeper(documents: DocumentManager, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match documents.sweep_trash().await {
                Ok(0) => tracing::debug!("trash sweep found nothing to purge"),
                Ok(purged) => tracing::info!(purged, "trash sweep completed"),
                Err(e) => tracing::error!(error = %e, "trash sweep failed"),
            }
        }
    })
}

/// Deliver share notifications. Delivery here is a structured log line per
/// recipient; a mail or push sender would subscribe the same way.
pub fn spawn_notification_logger(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(DocumentEvent::Shared(notice)) => {
                    for user_id in &notice.user_ids {
                        tracing::info!(
                            document_id = %notice.document_id,
                            title = %notice.document_title,
                            shared_by = %notice.shared_by,
                            recipient = %user_id,
                            can_edit = notice.can_edit,
                            can_delete = notice.can_delete,
                            "document shared"
                        );
                    }
                }
                Ok(other) => tracing::debug!(event = ?other, "document event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification subscriber lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cra_core::events::types::ShareNotice;
    use uuid::Uuid;

    #[tokio::test]
    async fn notification_logger_stops_when_bus_closes() {
        let bus = EventBus::new(8);
        let handle = spawn_notification_logger(&bus);
        assert_eq!(bus.subscriber_count(), 1);

        bus.notify(DocumentEvent::Shared(ShareNotice {
            document_id: Uuid::now_v7(),
            document_title: "Protocol".into(),
            shared_by: Uuid::now_v7(),
            user_ids: vec![Uuid::now_v7()],
            can_edit: false,
            can_delete: false,
            timestamp: Utc::now(),
        }));
        drop(bus);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger should exit")
            .expect("logger should not panic");
    }
}
