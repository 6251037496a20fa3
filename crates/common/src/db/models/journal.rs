//! Journal entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "journals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub acronym: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub eissn: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub pissn: Option<String>,
}

impl From<Model> for records::Journal {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            acronym: model.acronym,
            title: model.title,
            eissn: model.eissn,
            pissn: model.pissn,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
