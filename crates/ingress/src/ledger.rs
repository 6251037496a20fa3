//! Event and ingress audit ledger

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use spf_common::db::MetadataStore;
use spf_common::errors::Result;
use spf_common::records::{Event, EventName, EventStatus, IngressPackage, IngressStatus, Scope};
use tracing::{debug, warn};
use uuid::Uuid;

/// Terminal overwrite applied by [`Ledger::complete`]
#[derive(Debug, Clone)]
pub struct EventUpdate {
    pub status: EventStatus,
    pub annotation: Option<Value>,
}

impl EventUpdate {
    pub fn completed() -> Self {
        Self {
            status: EventStatus::Completed,
            annotation: None,
        }
    }

    pub fn failed(annotation: Value) -> Self {
        Self {
            status: EventStatus::Failed,
            annotation: Some(annotation),
        }
    }
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn MetadataStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Open an INITIATED event.
    pub async fn begin(&self, user_id: Uuid, name: EventName, annotation: Option<Value>) -> Result<Event> {
        let event = Event {
            id: Uuid::now_v7(),
            user_id,
            name,
            status: EventStatus::Initiated,
            annotation,
            datetime: Utc::now(),
        };
        self.store.insert_event(&event).await?;
        debug!(event_id = %event.id, name = %event.name, "Event initiated");
        Ok(event)
    }

    /// Move an event to its terminal status.
    pub async fn complete(&self, mut event: Event, update: EventUpdate) -> Result<Event> {
        if event.status.is_terminal() {
            warn!(event_id = %event.id, status = %event.status, "Event already terminal");
        }
        event.status = update.status;
        if update.annotation.is_some() {
            event.annotation = update.annotation;
        }
        event.datetime = Utc::now();
        self.store.update_event(&event).await?;
        debug!(event_id = %event.id, status = %event.status, "Event completed");
        Ok(event)
    }

    pub async fn add_ingress_package(&self, user_id: Uuid, package_name: &str) -> Result<IngressPackage> {
        let package = IngressPackage {
            id: Uuid::now_v7(),
            user_id,
            package_name: package_name.to_string(),
            status: IngressStatus::Received,
            datetime: Utc::now(),
        };
        self.store.insert_ingress_package(&package).await?;
        Ok(package)
    }

    pub async fn events(&self, scope: Scope) -> Result<Vec<Event>> {
        self.store.list_events(scope.owner_filter()).await
    }

    pub async fn ingress_packages(&self, scope: Scope) -> Result<Vec<IngressPackage>> {
        self.store.list_ingress_packages(scope.owner_filter()).await
    }
}

/// Annotation recorded for a failed run.
pub fn failure_annotation(kind: &str, message: impl std::fmt::Display) -> Value {
    serde_json::json!({
        "error_type": kind,
        "error": message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spf_common::db::InMemoryStore;
    use spf_common::errors::AppError;
    use spf_common::records::SCOPE_ALL_USERS;

    #[tokio::test]
    async fn test_begin_then_complete() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Ledger::new(store.clone());
        let user = Uuid::new_v4();

        let event = ledger.begin(user, EventName::UploadPackage, None).await.unwrap();
        assert_eq!(event.status, EventStatus::Initiated);

        let failed = ledger
            .complete(event.clone(), EventUpdate::failed(failure_annotation("InvalidPackageFormat", "doc.txt")))
            .await
            .unwrap();
        assert_eq!(failed.status, EventStatus::Failed);
        assert!(failed.datetime >= event.datetime);

        let stored = store.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Failed);
        assert_eq!(stored.annotation.unwrap()["error_type"], "InvalidPackageFormat");
    }

    #[tokio::test]
    async fn test_completing_unknown_event_fails() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Ledger::new(store.clone());
        let event = Event {
            id: Uuid::now_v7(),
            user_id: Uuid::new_v4(),
            name: EventName::RetrievePackage,
            status: EventStatus::Initiated,
            annotation: None,
            datetime: Utc::now(),
        };

        let err = ledger.complete(event.clone(), EventUpdate::completed()).await.unwrap_err();
        assert!(matches!(err, AppError::EventNotFound { .. }));
        assert!(store.find_event(event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_scoped() {
        let ledger = Ledger::new(Arc::new(InMemoryStore::new()));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        ledger.begin(alice, EventName::MakePackage, None).await.unwrap();
        ledger.begin(bob, EventName::MakePackage, None).await.unwrap();

        let own = ledger.events(Scope::new(alice, false, None)).await.unwrap();
        assert_eq!(own.len(), 1);

        // all_users without privilege still sees only its own events
        let denied = ledger
            .events(Scope::new(alice, false, Some(SCOPE_ALL_USERS)))
            .await
            .unwrap();
        assert_eq!(denied.len(), 1);

        let all = ledger
            .events(Scope::new(alice, true, Some(SCOPE_ALL_USERS)))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
