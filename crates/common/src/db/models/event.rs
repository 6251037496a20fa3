//! Ledger event entity

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::errors::Result as AppResult;
use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    /// Short event name code (`UP`, `RP`, ...)
    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// `I`, `C` or `F`
    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub annotation: Option<serde_json::Value>,

    pub datetime: DateTimeWithTimeZone,
}

impl Model {
    pub fn into_record(self) -> AppResult<records::Event> {
        Ok(records::Event {
            id: self.id,
            user_id: self.user_id,
            name: self.name.parse()?,
            status: self.status.parse()?,
            annotation: self.annotation,
            datetime: self.datetime.with_timezone(&Utc),
        })
    }
}

impl From<&records::Event> for ActiveModel {
    fn from(event: &records::Event) -> Self {
        Self {
            id: Set(event.id),
            user_id: Set(event.user_id),
            name: Set(event.name.as_str().to_string()),
            status: Set(event.status.as_str().to_string()),
            annotation: Set(event.annotation.clone()),
            datetime: Set(event.datetime.into()),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
