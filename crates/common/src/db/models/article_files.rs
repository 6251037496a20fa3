//! Article files entity (append-only package versions)

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::errors::Result as AppResult;
use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Document id (`pid_v3`); unique together with `version`
    #[sea_orm(column_type = "Text")]
    pub aid: String,

    pub version: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub scielo_pids: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub xml: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub file: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub assets: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub renditions: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn into_record(self) -> AppResult<records::ArticleFiles> {
        Ok(records::ArticleFiles {
            id: self.id,
            aid: self.aid,
            version: self.version,
            scielo_pids: serde_json::from_value(self.scielo_pids)?,
            xml: serde_json::from_value(self.xml)?,
            file: serde_json::from_value(self.file)?,
            assets: serde_json::from_value(self.assets)?,
            renditions: serde_json::from_value(self.renditions)?,
            created: self.created_at.with_timezone(&Utc),
            updated: self.updated_at.with_timezone(&Utc),
        })
    }
}

impl ActiveModel {
    pub fn from_record(files: &records::ArticleFiles) -> AppResult<Self> {
        Ok(Self {
            id: Set(files.id),
            aid: Set(files.aid.clone()),
            version: Set(files.version),
            scielo_pids: Set(serde_json::to_value(&files.scielo_pids)?),
            xml: Set(serde_json::to_value(&files.xml)?),
            file: Set(serde_json::to_value(&files.file)?),
            assets: Set(serde_json::to_value(&files.assets)?),
            renditions: Set(serde_json::to_value(&files.renditions)?),
            created_at: Set(files.created.into()),
            updated_at: Set(files.updated.into()),
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article::Entity",
        from = "Column::Aid",
        to = "super::article::Column::PidV3"
    )]
    Article,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Article.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
