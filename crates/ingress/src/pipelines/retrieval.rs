//! Package retrieval

use serde::{Deserialize, Serialize};
use serde_json::json;
use spf_common::metrics::PipelineMetrics;
use spf_common::records::{ArticleFiles, EventName};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{Outcome, Pipelines};
use crate::errors::Result;
use crate::ledger::{failure_annotation, EventUpdate};

/// `doc_pkg` empty with no errors means nothing was generated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub errors: Vec<String>,
    pub doc_pkg: Vec<ArticleFiles>,
}

impl Pipelines {
    /// Every package version of `pid_v3`, newest first.
    #[instrument(skip(self))]
    pub async fn retrieve_packages(&self, user_id: Uuid, pid_v3: &str) -> Result<Outcome<RetrievalResponse>> {
        let metrics = PipelineMetrics::start("retrieve_package");
        let event = self
            .ledger
            .begin(user_id, EventName::RetrievePackage, Some(json!({ "pid_v3": pid_v3 })))
            .await?;

        match self.store.list_article_files(pid_v3).await {
            Ok(doc_pkg) => {
                debug!(pid_v3, packages = doc_pkg.len(), "Packages listed");
                let event = self.ledger.complete(event, EventUpdate::completed()).await?;
                metrics.finish("completed");
                Ok(Outcome {
                    event,
                    response: RetrievalResponse {
                        errors: Vec::new(),
                        doc_pkg,
                    },
                    transient: false,
                })
            }
            Err(err) => {
                warn!(pid_v3, error = %err, "Package listing failed");
                let errors = vec![err.to_string()];
                let mut annotation = failure_annotation(err.kind(), &err);
                annotation["errors"] = json!(errors);
                let event = self.ledger.complete(event, EventUpdate::failed(annotation)).await?;
                metrics.finish("failed");
                Ok(Outcome {
                    event,
                    response: RetrievalResponse {
                        errors,
                        doc_pkg: Vec::new(),
                    },
                    transient: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use spf_common::db::{InMemoryStore, MetadataStore};
    use spf_common::errors::{AppError, Result as StoreResult};
    use spf_common::records::{
        Article, Event, EventStatus, IngressPackage, Issue, Journal, NewArticleFiles,
        ReceivedPackage,
    };
    use spf_common::storage::InMemoryObjectStorage;

    use super::*;
    use crate::pipelines::testing::{harness, pipelines_with};

    /// Delegates to an in-memory store but cannot list article files.
    struct UnlistableStore(InMemoryStore);

    #[async_trait]
    impl MetadataStore for UnlistableStore {
        async fn find_article(&self, pid_v3: &str) -> StoreResult<Option<Article>> {
            self.0.find_article(pid_v3).await
        }
        async fn save_article(&self, article: &Article) -> StoreResult<()> {
            self.0.save_article(article).await
        }
        async fn find_issue(&self, id: &str) -> StoreResult<Option<Issue>> {
            self.0.find_issue(id).await
        }
        async fn find_journal(&self, id: &str) -> StoreResult<Option<Journal>> {
            self.0.find_journal(id).await
        }
        async fn count_article_files(&self, aid: &str) -> StoreResult<u64> {
            self.0.count_article_files(aid).await
        }
        async fn insert_article_files(&self, files: NewArticleFiles) -> StoreResult<ArticleFiles> {
            self.0.insert_article_files(files).await
        }
        async fn list_article_files(&self, _aid: &str) -> StoreResult<Vec<ArticleFiles>> {
            Err(AppError::DatabaseConnection {
                message: "connection reset".to_string(),
            })
        }
        async fn save_received_package(&self, package: &ReceivedPackage) -> StoreResult<()> {
            self.0.save_received_package(package).await
        }
        async fn find_received_package(&self, id: &str) -> StoreResult<Option<ReceivedPackage>> {
            self.0.find_received_package(id).await
        }
        async fn insert_event(&self, event: &Event) -> StoreResult<()> {
            self.0.insert_event(event).await
        }
        async fn update_event(&self, event: &Event) -> StoreResult<()> {
            self.0.update_event(event).await
        }
        async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
            self.0.find_event(id).await
        }
        async fn list_events(&self, user_id: Option<Uuid>) -> StoreResult<Vec<Event>> {
            self.0.list_events(user_id).await
        }
        async fn insert_ingress_package(&self, package: &IngressPackage) -> StoreResult<()> {
            self.0.insert_ingress_package(package).await
        }
        async fn list_ingress_packages(&self, user_id: Option<Uuid>) -> StoreResult<Vec<IngressPackage>> {
            self.0.list_ingress_packages(user_id).await
        }
    }

    #[tokio::test]
    async fn test_no_packages_is_not_an_error() {
        let h = harness(InMemoryObjectStorage::default(), false).await;

        let outcome = h.pipelines.retrieve_packages(Uuid::new_v4(), "S0001").await.unwrap();
        assert_eq!(outcome.event.status, EventStatus::Completed);
        assert_eq!(outcome.response, RetrievalResponse::default());
    }

    #[tokio::test]
    async fn test_packages_listed_newest_first() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let user = Uuid::new_v4();
        let xml = Some("http://minio:9000/spf/S0001.xml");
        h.pipelines.make_package(user, "S0001", xml, &[]).await.unwrap();
        h.pipelines.make_package(user, "S0001", xml, &[]).await.unwrap();

        let outcome = h.pipelines.retrieve_packages(user, "S0001").await.unwrap();
        let versions: Vec<i32> = outcome.response.doc_pkg.iter().map(|f| f.version).collect();
        assert_eq!(versions, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_query_failure_is_failed_with_errors() {
        let store = InMemoryStore::new();
        let pipelines = pipelines_with(
            InMemoryObjectStorage::default(),
            Arc::new(UnlistableStore(store.clone())),
            false,
        );

        let outcome = pipelines.retrieve_packages(Uuid::new_v4(), "S0001").await.unwrap();
        assert_eq!(outcome.event.status, EventStatus::Failed);
        assert_eq!(outcome.response.errors.len(), 1);
        assert!(outcome.response.doc_pkg.is_empty());

        let stored = store.find_event(outcome.event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Failed);
        assert_eq!(stored.annotation.unwrap()["errors"].as_array().unwrap().len(), 1);
    }
}
