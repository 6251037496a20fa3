//! Ingress package entity

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::errors::Result as AppResult;
use crate::records;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingress_packages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub package_name: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub datetime: DateTimeWithTimeZone,
}

impl Model {
    pub fn into_record(self) -> AppResult<records::IngressPackage> {
        Ok(records::IngressPackage {
            id: self.id,
            user_id: self.user_id,
            package_name: self.package_name,
            status: self.status.parse()?,
            datetime: self.datetime.with_timezone(&Utc),
        })
    }
}

impl From<&records::IngressPackage> for ActiveModel {
    fn from(package: &records::IngressPackage) -> Self {
        Self {
            id: Set(package.id),
            user_id: Set(package.user_id),
            package_name: Set(package.package_name.clone()),
            status: Set(package.status.as_str().to_string()),
            datetime: Set(package.datetime.into()),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
