//! Metadata store abstraction
//!
//! [`MetadataStore`] is the seam the ingress core depends on. The sea-orm
//! [`Repository`](super::Repository) implements it against Postgres and
//! [`InMemoryStore`] keeps everything behind one mutex for tests and local
//! runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::records::{
    Article, ArticleFiles, Event, IngressPackage, Issue, Journal, NewArticleFiles,
    ReceivedPackage,
};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    // Articles, issues, journals
    async fn find_article(&self, pid_v3: &str) -> Result<Option<Article>>;
    /// Insert or fully overwrite the record.
    async fn save_article(&self, article: &Article) -> Result<()>;
    async fn find_issue(&self, id: &str) -> Result<Option<Issue>>;
    async fn find_journal(&self, id: &str) -> Result<Option<Journal>>;

    // Article files
    async fn count_article_files(&self, aid: &str) -> Result<u64>;
    /// Persist a new version numbered `count + 1`, atomically per `aid`.
    async fn insert_article_files(&self, files: NewArticleFiles) -> Result<ArticleFiles>;
    /// Versions of a document, newest first.
    async fn list_article_files(&self, aid: &str) -> Result<Vec<ArticleFiles>>;

    // Received packages
    async fn save_received_package(&self, package: &ReceivedPackage) -> Result<()>;
    async fn find_received_package(&self, id: &str) -> Result<Option<ReceivedPackage>>;

    // Ledger
    async fn insert_event(&self, event: &Event) -> Result<()>;
    async fn update_event(&self, event: &Event) -> Result<()>;
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>>;
    /// Events newest first, optionally restricted to one user.
    async fn list_events(&self, user_id: Option<Uuid>) -> Result<Vec<Event>>;
    async fn insert_ingress_package(&self, package: &IngressPackage) -> Result<()>;
    async fn list_ingress_packages(&self, user_id: Option<Uuid>) -> Result<Vec<IngressPackage>>;
}

/// Version that follows `count` existing versions of a document.
pub fn version_after(count: u64) -> Result<i32> {
    i32::try_from(count)
        .ok()
        .and_then(|c| c.checked_add(1))
        .ok_or_else(|| AppError::Internal {
            message: format!("version counter overflow after {count} versions"),
        })
}

#[derive(Default)]
struct Tables {
    articles: HashMap<String, Article>,
    issues: HashMap<String, Issue>,
    journals: HashMap<String, Journal>,
    article_files: Vec<ArticleFiles>,
    received_packages: HashMap<String, ReceivedPackage>,
    events: HashMap<Uuid, Event>,
    ingress_packages: Vec<IngressPackage>,
}

/// In-process store
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    events_offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_issue(&self, issue: Issue) {
        self.tables.lock().await.issues.insert(issue.id.clone(), issue);
    }

    pub async fn insert_journal(&self, journal: Journal) {
        self.tables.lock().await.journals.insert(journal.id.clone(), journal);
    }

    /// While set, event writes fail as a lost database connection would.
    pub fn set_events_offline(&self, offline: bool) {
        self.events_offline.store(offline, Ordering::SeqCst);
    }

    fn check_events_online(&self) -> Result<()> {
        if self.events_offline.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "events table unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn find_article(&self, pid_v3: &str) -> Result<Option<Article>> {
        Ok(self.tables.lock().await.articles.get(pid_v3).cloned())
    }

    async fn save_article(&self, article: &Article) -> Result<()> {
        self.tables
            .lock()
            .await
            .articles
            .insert(article.pid_v3.clone(), article.clone());
        Ok(())
    }

    async fn find_issue(&self, id: &str) -> Result<Option<Issue>> {
        Ok(self.tables.lock().await.issues.get(id).cloned())
    }

    async fn find_journal(&self, id: &str) -> Result<Option<Journal>> {
        Ok(self.tables.lock().await.journals.get(id).cloned())
    }

    async fn count_article_files(&self, aid: &str) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables.article_files.iter().filter(|f| f.aid == aid).count() as u64)
    }

    async fn insert_article_files(&self, files: NewArticleFiles) -> Result<ArticleFiles> {
        let mut tables = self.tables.lock().await;
        let count = tables.article_files.iter().filter(|f| f.aid == files.aid).count();
        let record = files.into_version(version_after(count as u64)?);

        debug!(aid = %record.aid, version = record.version, "Created article files");
        tables.article_files.push(record.clone());
        Ok(record)
    }

    async fn list_article_files(&self, aid: &str) -> Result<Vec<ArticleFiles>> {
        let tables = self.tables.lock().await;
        let mut files: Vec<_> = tables
            .article_files
            .iter()
            .filter(|f| f.aid == aid)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.updated.cmp(&a.updated).then(b.version.cmp(&a.version)));
        Ok(files)
    }

    async fn save_received_package(&self, package: &ReceivedPackage) -> Result<()> {
        self.tables
            .lock()
            .await
            .received_packages
            .insert(package.id.clone(), package.clone());
        Ok(())
    }

    async fn find_received_package(&self, id: &str) -> Result<Option<ReceivedPackage>> {
        Ok(self.tables.lock().await.received_packages.get(id).cloned())
    }

    async fn insert_event(&self, event: &Event) -> Result<()> {
        self.check_events_online()?;
        self.tables.lock().await.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        self.check_events_online()?;
        let mut tables = self.tables.lock().await;
        match tables.events.get_mut(&event.id) {
            Some(stored) => {
                *stored = event.clone();
                Ok(())
            }
            None => Err(AppError::EventNotFound {
                id: event.id.to_string(),
            }),
        }
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn list_events(&self, user_id: Option<Uuid>) -> Result<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|e| user_id.map_or(true, |u| e.user_id == u))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        Ok(events)
    }

    async fn insert_ingress_package(&self, package: &IngressPackage) -> Result<()> {
        self.tables.lock().await.ingress_packages.push(package.clone());
        Ok(())
    }

    async fn list_ingress_packages(&self, user_id: Option<Uuid>) -> Result<Vec<IngressPackage>> {
        let tables = self.tables.lock().await;
        let mut packages: Vec<_> = tables
            .ingress_packages
            .iter()
            .filter(|p| user_id.map_or(true, |u| p.user_id == u))
            .cloned()
            .collect();
        packages.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        Ok(packages)
    }
}
