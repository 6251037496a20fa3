//! Repository pattern for database operations
//!
//! Implements [`MetadataStore`] over sea-orm with proper error handling and
//! transaction support.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::db::models::*;
use crate::db::store::{version_after, MetadataStore};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::records::{
    Article, ArticleFiles, Event, IngressPackage, Issue, Journal, NewArticleFiles,
    ReceivedPackage,
};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl MetadataStore for Repository {
    // ========================================================================
    // Article Operations
    // ========================================================================

    async fn find_article(&self, pid_v3: &str) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(pid_v3.to_string())
            .one(self.read_conn())
            .await?
            .map(ArticleModel::into_record)
            .transpose()
    }

    async fn save_article(&self, article: &Article) -> Result<()> {
        let model = ArticleActiveModel::from_record(article)?;
        let exists = ArticleEntity::find_by_id(article.pid_v3.clone())
            .one(self.write_conn())
            .await?
            .is_some();

        if exists {
            model.update(self.write_conn()).await?;
        } else {
            model.insert(self.write_conn()).await?;
        }
        Ok(())
    }

    async fn find_issue(&self, id: &str) -> Result<Option<Issue>> {
        Ok(IssueEntity::find_by_id(id.to_string())
            .one(self.read_conn())
            .await?
            .map(Into::into))
    }

    async fn find_journal(&self, id: &str) -> Result<Option<Journal>> {
        Ok(JournalEntity::find_by_id(id.to_string())
            .one(self.read_conn())
            .await?
            .map(Into::into))
    }

    // ========================================================================
    // Article Files Operations
    // ========================================================================

    async fn count_article_files(&self, aid: &str) -> Result<u64> {
        ArticleFilesEntity::find()
            .filter(ArticleFilesColumn::Aid.eq(aid))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_article_files(&self, files: NewArticleFiles) -> Result<ArticleFiles> {
        let txn = self.write_conn().begin().await?;

        // Serializes concurrent version assignment for the same document
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtext($1))",
            [sea_orm::Value::from(files.aid.clone())],
        ))
        .await?;

        let count = ArticleFilesEntity::find()
            .filter(ArticleFilesColumn::Aid.eq(files.aid.as_str()))
            .count(&txn)
            .await?;

        let record = files.into_version(version_after(count)?);
        ArticleFilesActiveModel::from_record(&record)?.insert(&txn).await?;
        txn.commit().await?;

        debug!(aid = %record.aid, version = record.version, "Created article files");
        Ok(record)
    }

    async fn list_article_files(&self, aid: &str) -> Result<Vec<ArticleFiles>> {
        ArticleFilesEntity::find()
            .filter(ArticleFilesColumn::Aid.eq(aid))
            .order_by_desc(ArticleFilesColumn::UpdatedAt)
            .order_by_desc(ArticleFilesColumn::Version)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(ArticleFilesModel::into_record)
            .collect()
    }

    // ========================================================================
    // Received Package Operations
    // ========================================================================

    async fn save_received_package(&self, package: &ReceivedPackage) -> Result<()> {
        let model = ReceivedPackageActiveModel::from_record(package)?;
        let exists = ReceivedPackageEntity::find_by_id(package.id.clone())
            .one(self.write_conn())
            .await?
            .is_some();

        if exists {
            model.update(self.write_conn()).await?;
        } else {
            model.insert(self.write_conn()).await?;
        }
        Ok(())
    }

    async fn find_received_package(&self, id: &str) -> Result<Option<ReceivedPackage>> {
        ReceivedPackageEntity::find_by_id(id.to_string())
            .one(self.read_conn())
            .await?
            .map(ReceivedPackageModel::into_record)
            .transpose()
    }

    // ========================================================================
    // Ledger Operations
    // ========================================================================

    async fn insert_event(&self, event: &Event) -> Result<()> {
        EventActiveModel::from(event).insert(self.write_conn()).await?;
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        match EventActiveModel::from(event).update(self.write_conn()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(AppError::EventNotFound {
                id: event.id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>> {
        EventEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .map(EventModel::into_record)
            .transpose()
    }

    async fn list_events(&self, user_id: Option<Uuid>) -> Result<Vec<Event>> {
        let mut query = EventEntity::find();
        if let Some(user_id) = user_id {
            query = query.filter(EventColumn::UserId.eq(user_id));
        }

        query
            .order_by_desc(EventColumn::Datetime)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(EventModel::into_record)
            .collect()
    }

    async fn insert_ingress_package(&self, package: &IngressPackage) -> Result<()> {
        IngressPackageActiveModel::from(package)
            .insert(self.write_conn())
            .await?;
        Ok(())
    }

    async fn list_ingress_packages(&self, user_id: Option<Uuid>) -> Result<Vec<IngressPackage>> {
        let mut query = IngressPackageEntity::find();
        if let Some(user_id) = user_id {
            query = query.filter(IngressPackageColumn::UserId.eq(user_id));
        }

        query
            .order_by_desc(IngressPackageColumn::Datetime)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(IngressPackageModel::into_record)
            .collect()
    }
}
