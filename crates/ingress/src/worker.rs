//! Queue-driven task worker
//!
//! Polls the task queue and runs each message through its pipeline:
//! 1. Poison messages (unparseable bodies) are logged and deleted
//! 2. A pipeline that reached a terminal ledger state has its message deleted
//! 3. A transient failure of a replayable task is left for redelivery until
//!    the queue's receive budget is spent
//! 4. A ledger write failure leaves the message for redelivery, unless the
//!    uploaded file it names has already been consumed
//!
//! Upload and register-content runs consume their uploaded file, so they are
//! never replayed.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use spf_common::metrics::record_message;
use spf_common::queue::{ReceivedTask, TaskMessage, TaskQueue};
use tracing::{error, info, instrument, warn};

use crate::errors::Result;
use crate::pipelines::{Outcome, Pipelines};

/// Consecutive failures before polling pauses
const MAX_FAILURES: u32 = 5;
const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const IDLE_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to one delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pipeline completed; message deleted
    Completed,
    /// Pipeline failed for good; message deleted
    Failed,
    /// Message left on the queue
    Redeliver,
    /// Body could not be parsed; message deleted
    Poison,
}

impl Disposition {
    fn as_str(&self) -> &'static str {
        match self {
            Disposition::Completed => "completed",
            Disposition::Failed => "failed",
            Disposition::Redeliver => "redeliver",
            Disposition::Poison => "poison",
        }
    }
}

/// Terminal state of a run, stripped of its response
struct Settled {
    failed: bool,
    transient: bool,
}

impl<T> From<Outcome<T>> for Settled {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            failed: outcome.failed(),
            transient: outcome.transient,
        }
    }
}

pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    pipelines: Pipelines,
    max_receive_count: u32,
}

impl Worker {
    pub fn new(queue: Arc<dyn TaskQueue>, pipelines: Pipelines, max_receive_count: u32) -> Self {
        Self {
            queue,
            pipelines,
            max_receive_count,
        }
    }

    /// Poll until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut consecutive_failures = 0;

        loop {
            if consecutive_failures >= MAX_FAILURES {
                warn!(failures = consecutive_failures, "Circuit breaker open, pausing...");
                tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
                consecutive_failures = 0;
                info!("Circuit breaker reset, resuming...");
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                result = self.queue.receive() => {
                    match result {
                        Ok(tasks) if tasks.is_empty() => {
                            tokio::time::sleep(IDLE_BACKOFF).await;
                        }
                        Ok(tasks) => {
                            for task in &tasks {
                                match self.process(task).await {
                                    Disposition::Completed => consecutive_failures = 0,
                                    Disposition::Redeliver => consecutive_failures += 1,
                                    Disposition::Failed | Disposition::Poison => {}
                                }
                            }
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            error!(error = %e, failures = consecutive_failures, "Failed to receive messages from queue");
                            tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    /// Run one delivered message and settle it on the queue.
    #[instrument(skip(self, received), fields(receive_count = received.receive_count))]
    pub async fn process(&self, received: &ReceivedTask) -> Disposition {
        let (kind, disposition) = match &received.task {
            Err(reason) => {
                warn!(reason = %reason, "Discarding unparseable message");
                ("unknown", Disposition::Poison)
            }
            Ok(task) => (task.kind(), self.settle(task, received.receive_count).await),
        };

        if disposition != Disposition::Redeliver {
            if let Err(e) = self.queue.delete(&received.receipt_handle).await {
                error!(error = %e, "Failed to delete message");
            }
        }
        record_message(kind, disposition.as_str());
        disposition
    }

    async fn settle(&self, task: &TaskMessage, receive_count: u32) -> Disposition {
        match self.dispatch(task).await {
            Ok(Settled { failed: false, .. }) => Disposition::Completed,
            Ok(Settled { transient: true, .. })
                if is_replayable(task) && receive_count < self.max_receive_count =>
            {
                info!(kind = task.kind(), receive_count, "Transient failure, leaving for redelivery");
                Disposition::Redeliver
            }
            Ok(_) => Disposition::Failed,
            Err(e) if input_survives(task) => {
                error!(kind = task.kind(), error = %e, "Ledger unavailable, leaving for redelivery");
                Disposition::Redeliver
            }
            Err(e) => {
                error!(kind = task.kind(), error = %e, "Ledger unavailable after the upload was consumed");
                Disposition::Failed
            }
        }
    }

    async fn dispatch(&self, task: &TaskMessage) -> Result<Settled> {
        info!(kind = task.kind(), user_id = %task.user_id(), "Processing task");
        let settled: Settled = match task {
            TaskMessage::UploadPackage {
                user_id,
                file_path,
                package_name,
            } => self
                .pipelines
                .upload(*user_id, Path::new(file_path), package_name)
                .await?
                .into(),
            TaskMessage::RegisterContent {
                user_id,
                file_path,
                options,
            } => self
                .pipelines
                .register_content(*user_id, Path::new(file_path), options)
                .await?
                .into(),
            TaskMessage::MakePackage {
                user_id,
                pid_v3,
                xml_uri,
                renditions,
            } => self
                .pipelines
                .make_package(*user_id, pid_v3, xml_uri.as_deref(), renditions)
                .await?
                .into(),
            TaskMessage::RetrievePackage { user_id, pid_v3 } => {
                self.pipelines.retrieve_packages(*user_id, pid_v3).await?.into()
            }
        };
        Ok(settled)
    }
}

/// Uploaded files are removed once a run gets past opening its event.
fn input_survives(task: &TaskMessage) -> bool {
    match task {
        TaskMessage::UploadPackage { file_path, .. } | TaskMessage::RegisterContent { file_path, .. } => {
            Path::new(file_path).exists()
        }
        TaskMessage::MakePackage { .. } | TaskMessage::RetrievePackage { .. } => true,
    }
}

fn is_replayable(task: &TaskMessage) -> bool {
    matches!(
        task,
        TaskMessage::MakePackage { .. } | TaskMessage::RetrievePackage { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::testing::harness;
    use spf_common::db::MetadataStore;
    use spf_common::queue::InMemoryQueue;
    use spf_common::records::{EventName, EventStatus};
    use spf_common::storage::InMemoryObjectStorage;
    use uuid::Uuid;

    fn make_package(user_id: Uuid) -> TaskMessage {
        TaskMessage::MakePackage {
            user_id,
            pid_v3: "S0001".to_string(),
            xml_uri: Some("http://minio:9000/spf/S0001.xml".to_string()),
            renditions: Vec::new(),
        }
    }

    async fn deliver(queue: &InMemoryQueue, task: TaskMessage) -> ReceivedTask {
        queue.send(&task).await.unwrap();
        queue.receive().await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_completed_message_is_deleted() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let queue = InMemoryQueue::new();
        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);

        let received = deliver(&queue, make_package(Uuid::new_v4())).await;
        assert_eq!(worker.process(&received).await, Disposition::Completed);
        assert_eq!(queue.deleted().await, vec![received.receipt_handle]);
        assert_eq!(h.store.count_article_files("S0001").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_redelivered_within_budget() {
        let storage = InMemoryObjectStorage::default().failing_on(["S0001.zip"]);
        let h = harness(storage, false).await;
        let queue = InMemoryQueue::new();
        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);

        let mut received = deliver(&queue, make_package(Uuid::new_v4())).await;
        assert_eq!(worker.process(&received).await, Disposition::Redeliver);
        assert!(queue.deleted().await.is_empty());

        received.receive_count = 3;
        assert_eq!(worker.process(&received).await, Disposition::Failed);
        assert_eq!(queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_is_not_replayed() {
        let h = harness(InMemoryObjectStorage::default().failing_on(["doc.zip"]), false).await;
        let queue = InMemoryQueue::new();
        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = crate::package::fixtures::sample_package(dir.path(), "doc.zip");

        let task = TaskMessage::UploadPackage {
            user_id: Uuid::new_v4(),
            file_path: path.to_string_lossy().into_owned(),
            package_name: "doc.zip".to_string(),
        };
        let received = deliver(&queue, task).await;
        assert_eq!(worker.process(&received).await, Disposition::Failed);
        assert_eq!(queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_survives_ledger_outage() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let queue = InMemoryQueue::new();
        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);
        let dir = tempfile::tempdir().unwrap();
        let path = crate::package::fixtures::sample_package(dir.path(), "doc.zip");

        let task = TaskMessage::UploadPackage {
            user_id: Uuid::new_v4(),
            file_path: path.to_string_lossy().into_owned(),
            package_name: "doc.zip".to_string(),
        };
        let mut received = deliver(&queue, task).await;

        h.store.set_events_offline(true);
        assert_eq!(worker.process(&received).await, Disposition::Redeliver);
        assert!(path.exists());
        assert!(queue.deleted().await.is_empty());
        assert!(h.storage.objects().await.is_empty());

        h.store.set_events_offline(false);
        received.receive_count = 2;
        assert_eq!(worker.process(&received).await, Disposition::Completed);
        assert!(!path.exists());
        assert_eq!(h.store.list_ingress_packages(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consumed_upload_is_not_redelivered() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let queue = InMemoryQueue::new();
        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);

        let task = TaskMessage::RegisterContent {
            user_id: Uuid::new_v4(),
            file_path: "/nonexistent/spf/S0001.zip".to_string(),
            options: Default::default(),
        };
        let received = deliver(&queue, task).await;

        h.store.set_events_offline(true);
        assert_eq!(worker.process(&received).await, Disposition::Failed);
        assert_eq!(queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_poison_message_is_deleted() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let queue = InMemoryQueue::new();
        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);

        let received = ReceivedTask {
            receipt_handle: "r-1".to_string(),
            receive_count: 1,
            task: Err("missing field `type`".to_string()),
        };
        assert_eq!(worker.process(&received).await, Disposition::Poison);
        assert_eq!(queue.deleted().await, vec!["r-1".to_string()]);
        assert!(h.store.list_events(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue_until_shutdown() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let queue = InMemoryQueue::new();
        let user = Uuid::new_v4();
        queue
            .send(&TaskMessage::RetrievePackage {
                user_id: user,
                pid_v3: "S0001".to_string(),
            })
            .await
            .unwrap();

        let worker = Worker::new(Arc::new(queue.clone()), h.pipelines.clone(), 3);
        worker.run(tokio::time::sleep(Duration::from_millis(200))).await;

        assert!(queue.pending().await.is_empty());
        let events = h.store.list_events(Some(user)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventName::RetrievePackage);
        assert_eq!(events[0].status, EventStatus::Completed);
    }
}
