//! Article entity
//!
//! Multi-valued facets are stored as JSONB and converted to the typed
//! record in [`crate::records::Article`].

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::errors::Result as AppResult;
use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub pid_v3: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub pid: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub aop_pid: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub doi: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub scielo_pids: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub journal_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub issue_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub url_segment: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub aop_url_segs: Option<serde_json::Value>,

    #[sea_orm(column_type = "Text", nullable)]
    pub article_type: Option<String>,

    pub article_order: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub elocation: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub fpage: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub fpage_sequence: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub lpage: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub publication_date: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub original_language: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub languages: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub htmls: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub translated_titles: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub section: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub trans_sections: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub abstracts: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub abstract_languages: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub authors: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub authors_meta: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub pdfs: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub xml: Option<String>,

    pub is_public: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn into_record(self) -> AppResult<records::Article> {
        Ok(records::Article {
            pid_v3: self.pid_v3,
            pid: self.pid,
            aop_pid: self.aop_pid,
            doi: self.doi,
            scielo_pids: serde_json::from_value(self.scielo_pids)?,
            journal_id: self.journal_id,
            issue_id: self.issue_id,
            url_segment: self.url_segment,
            aop_url_segs: self.aop_url_segs.map(serde_json::from_value).transpose()?,
            article_type: self.article_type,
            order: self.article_order,
            elocation: self.elocation,
            fpage: self.fpage,
            fpage_sequence: self.fpage_sequence,
            lpage: self.lpage,
            publication_date: self.publication_date,
            original_language: self.original_language,
            languages: serde_json::from_value(self.languages)?,
            htmls: serde_json::from_value(self.htmls)?,
            title: self.title,
            translated_titles: serde_json::from_value(self.translated_titles)?,
            section: self.section,
            trans_sections: serde_json::from_value(self.trans_sections)?,
            abstract_text: self.abstract_text,
            abstracts: serde_json::from_value(self.abstracts)?,
            abstract_languages: serde_json::from_value(self.abstract_languages)?,
            keywords: serde_json::from_value(self.keywords)?,
            authors: serde_json::from_value(self.authors)?,
            authors_meta: serde_json::from_value(self.authors_meta)?,
            pdfs: serde_json::from_value(self.pdfs)?,
            xml: self.xml,
            is_public: self.is_public,
            created: self.created_at.with_timezone(&Utc),
            updated: self.updated_at.with_timezone(&Utc),
        })
    }
}

impl ActiveModel {
    /// Every column set from the record.
    pub fn from_record(article: &records::Article) -> AppResult<Self> {
        Ok(Self {
            pid_v3: Set(article.pid_v3.clone()),
            pid: Set(article.pid.clone()),
            aop_pid: Set(article.aop_pid.clone()),
            doi: Set(article.doi.clone()),
            scielo_pids: Set(serde_json::to_value(&article.scielo_pids)?),
            journal_id: Set(article.journal_id.clone()),
            issue_id: Set(article.issue_id.clone()),
            url_segment: Set(article.url_segment.clone()),
            aop_url_segs: Set(article.aop_url_segs.as_ref().map(serde_json::to_value).transpose()?),
            article_type: Set(article.article_type.clone()),
            article_order: Set(article.order),
            elocation: Set(article.elocation.clone()),
            fpage: Set(article.fpage.clone()),
            fpage_sequence: Set(article.fpage_sequence.clone()),
            lpage: Set(article.lpage.clone()),
            publication_date: Set(article.publication_date.clone()),
            original_language: Set(article.original_language.clone()),
            languages: Set(serde_json::to_value(&article.languages)?),
            htmls: Set(serde_json::to_value(&article.htmls)?),
            title: Set(article.title.clone()),
            translated_titles: Set(serde_json::to_value(&article.translated_titles)?),
            section: Set(article.section.clone()),
            trans_sections: Set(serde_json::to_value(&article.trans_sections)?),
            abstract_text: Set(article.abstract_text.clone()),
            abstracts: Set(serde_json::to_value(&article.abstracts)?),
            abstract_languages: Set(serde_json::to_value(&article.abstract_languages)?),
            keywords: Set(serde_json::to_value(&article.keywords)?),
            authors: Set(serde_json::to_value(&article.authors)?),
            authors_meta: Set(serde_json::to_value(&article.authors_meta)?),
            pdfs: Set(serde_json::to_value(&article.pdfs)?),
            xml: Set(article.xml.clone()),
            is_public: Set(article.is_public),
            created_at: Set(article.created.into()),
            updated_at: Set(article.updated.into()),
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::IssueId",
        to = "super::issue::Column::Id"
    )]
    Issue,

    #[sea_orm(has_many = "super::article_files::Entity")]
    ArticleFiles,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl Related<super::article_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArticleFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
