//! SQS task queue
//!
//! Provides:
//! - SQS client wrapper behind the [`TaskQueue`] trait
//! - The [`TaskMessage`] envelope carried between gateway and worker
//! - An in-memory queue for tests
//!
//! Redelivery is bounded by the queue's redrive policy
//! (`max_receive_count`), after which SQS moves the message to the dead
//! letter queue.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client as SqsClient;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::errors::{AppError, Result};
use crate::records::RenditionEntry;

/// Work handed from the gateway to the ingress worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskMessage {
    /// Store a raw uploaded package
    UploadPackage {
        user_id: Uuid,
        file_path: String,
        package_name: String,
    },
    /// Register a package's content and synchronize its article
    RegisterContent {
        user_id: Uuid,
        file_path: String,
        #[serde(default)]
        options: RegisterOptions,
    },
    /// Build and version a distributable package
    MakePackage {
        user_id: Uuid,
        pid_v3: String,
        #[serde(default)]
        xml_uri: Option<String>,
        #[serde(default)]
        renditions: Vec<RenditionEntry>,
    },
    /// List the packages generated for a document
    RetrievePackage { user_id: Uuid, pid_v3: String },
}

impl TaskMessage {
    pub fn user_id(&self) -> Uuid {
        match self {
            TaskMessage::UploadPackage { user_id, .. }
            | TaskMessage::RegisterContent { user_id, .. }
            | TaskMessage::MakePackage { user_id, .. }
            | TaskMessage::RetrievePackage { user_id, .. } => *user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskMessage::UploadPackage { .. } => "upload_package",
            TaskMessage::RegisterContent { .. } => "register_content",
            TaskMessage::MakePackage { .. } => "make_package",
            TaskMessage::RetrievePackage { .. } => "retrieve_package",
        }
    }
}

/// Synchronization options for a register-content run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOptions {
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    #[serde(default)]
    pub issue_id: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub other_pids: Vec<String>,
}

fn default_is_public() -> bool {
    true
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            is_public: true,
            issue_id: None,
            order: None,
            other_pids: Vec::new(),
        }
    }
}

/// A delivered message
#[derive(Debug, Clone)]
pub struct ReceivedTask {
    pub receipt_handle: String,
    /// Approximate number of deliveries, including this one
    pub receive_count: u32,
    /// Parsed body; `Err` carries the parse failure for poison messages
    pub task: std::result::Result<TaskMessage, String>,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn send(&self, task: &TaskMessage) -> Result<String>;
    async fn receive(&self) -> Result<Vec<ReceivedTask>>;
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

/// SQS Queue client wrapper
pub struct Queue {
    client: SqsClient,
    url: String,
    config: QueueConfig,
}

impl Queue {
    /// Create a new queue client
    pub async fn new(config: &QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);
        Self::with_client(client, config)
    }

    /// Create with existing AWS client
    pub fn with_client(client: SqsClient, config: &QueueConfig) -> Result<Self> {
        let url = config
            .task_queue_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "Missing value for queue.task_queue_url".to_string(),
            })?;

        Ok(Self {
            client,
            url,
            config: config.clone(),
        })
    }

    fn to_received(message: Message) -> Option<ReceivedTask> {
        let receipt_handle = message.receipt_handle?;
        let receive_count = message
            .attributes
            .as_ref()
            .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let task = match message.body.as_deref() {
            Some(body) => serde_json::from_str(body).map_err(|e| e.to_string()),
            None => Err("Message has no body".to_string()),
        };

        Some(ReceivedTask {
            receipt_handle,
            receive_count,
            task,
        })
    }
}

#[async_trait]
impl TaskQueue for Queue {
    /// Send a message to the queue
    async fn send(&self, task: &TaskMessage) -> Result<String> {
        let body = serde_json::to_string(task).map_err(|e| AppError::QueueError {
            message: format!("Failed to serialize message: {}", e),
        })?;

        let result = self
            .client
            .send_message()
            .queue_url(&self.url)
            .message_body(&body)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to send message: {}", e),
            })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, kind = task.kind(), "Message sent to queue");

        Ok(message_id)
    }

    /// Receive messages from the queue
    async fn receive(&self) -> Result<Vec<ReceivedTask>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(self.config.batch_size as i32)
            .visibility_timeout(self.config.visibility_timeout_secs as i32)
            .wait_time_seconds(self.config.poll_timeout_secs as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages: Vec<_> = result
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(Self::to_received)
            .collect();
        debug!(count = messages.len(), "Received messages from queue");

        Ok(messages)
    }

    /// Delete a message after processing
    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryState {
    pending: VecDeque<(String, TaskMessage, u32)>,
    in_flight: Vec<(String, TaskMessage, u32)>,
    deleted: Vec<String>,
}

/// Queue kept in memory.
///
/// Every `receive` first returns undeleted in-flight messages to the
/// pending list, which stands in for the visibility timeout expiring.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending(&self) -> Vec<TaskMessage> {
        let state = self.state.lock().await;
        state
            .pending
            .iter()
            .chain(state.in_flight.iter())
            .map(|(_, task, _)| task.clone())
            .collect()
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn send(&self, task: &TaskMessage) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.state
            .lock()
            .await
            .pending
            .push_back((id.clone(), task.clone(), 0));
        Ok(id)
    }

    async fn receive(&self) -> Result<Vec<ReceivedTask>> {
        let mut state = self.state.lock().await;
        let returned: Vec<_> = state.in_flight.drain(..).collect();
        state.pending.extend(returned);

        let mut delivered = Vec::new();
        while let Some((id, task, count)) = state.pending.pop_front() {
            delivered.push(ReceivedTask {
                receipt_handle: id.clone(),
                receive_count: count + 1,
                task: Ok(task.clone()),
            });
            state.in_flight.push((id, task, count + 1));
        }
        Ok(delivered)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.in_flight.retain(|(id, _, _)| id != receipt_handle);
        state.deleted.push(receipt_handle.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_message_is_tagged() {
        let user_id = Uuid::new_v4();
        let msg = TaskMessage::RetrievePackage {
            user_id,
            pid_v3: "S0001".to_string(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "retrieve_package");
        assert_eq!(msg.user_id(), user_id);
    }

    #[test]
    fn test_register_options_default_to_public() {
        let msg: TaskMessage = serde_json::from_value(serde_json::json!({
            "type": "register_content",
            "user_id": Uuid::nil(),
            "file_path": "/tmp/a/doc.zip",
        }))
        .unwrap();

        match msg {
            TaskMessage::RegisterContent { options, .. } => assert!(options.is_public),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_in_memory_queue_redelivers_until_deleted() {
        let queue = InMemoryQueue::new();
        queue
            .send(&TaskMessage::RetrievePackage {
                user_id: Uuid::nil(),
                pid_v3: "S0001".into(),
            })
            .await
            .unwrap();

        let first = queue.receive().await.unwrap();
        assert_eq!(first[0].receive_count, 1);

        let second = queue.receive().await.unwrap();
        assert_eq!(second[0].receive_count, 2);

        queue.delete(&second[0].receipt_handle).await.unwrap();
        assert!(queue.receive().await.unwrap().is_empty());
    }
}
