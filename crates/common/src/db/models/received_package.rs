//! Received package entity (latest raw deposit per document)

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::errors::Result as AppResult;
use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "received_packages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub file: serde_json::Value,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn into_record(self) -> AppResult<records::ReceivedPackage> {
        Ok(records::ReceivedPackage {
            id: self.id,
            file: serde_json::from_value(self.file)?,
            updated: self.updated_at.with_timezone(&Utc),
        })
    }
}

impl ActiveModel {
    pub fn from_record(package: &records::ReceivedPackage) -> AppResult<Self> {
        Ok(Self {
            id: Set(package.id.clone()),
            file: Set(serde_json::to_value(&package.file)?),
            updated_at: Set(package.updated.into()),
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
