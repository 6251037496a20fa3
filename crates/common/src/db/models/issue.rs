//! Issue entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub journal_id: String,

    /// Issue number; `ahead` for ahead-of-print placeholders
    #[sea_orm(column_type = "Text", nullable)]
    pub number: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub url_segment: Option<String>,
}

impl From<Model> for records::Issue {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            journal_id: model.journal_id,
            number: model.number,
            url_segment: model.url_segment,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal::Entity",
        from = "Column::JournalId",
        to = "super::journal::Column::Id"
    )]
    Journal,

    #[sea_orm(has_many = "super::article::Entity")]
    Articles,
}

impl Related<super::journal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journal.def()
    }
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Articles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
