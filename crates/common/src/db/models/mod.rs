//! SeaORM entity models
//!
//! Database entities for the SPF ingress services

mod article;
mod article_files;
mod event;
mod ingress_package;
mod issue;
mod journal;
mod received_package;

pub use article::{
    Entity as ArticleEntity,
    Model as ArticleModel,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

pub use issue::{
    Entity as IssueEntity,
    Model as IssueModel,
    ActiveModel as IssueActiveModel,
    Column as IssueColumn,
};

pub use journal::{
    Entity as JournalEntity,
    Model as JournalModel,
    ActiveModel as JournalActiveModel,
    Column as JournalColumn,
};

pub use article_files::{
    Entity as ArticleFilesEntity,
    Model as ArticleFilesModel,
    ActiveModel as ArticleFilesActiveModel,
    Column as ArticleFilesColumn,
};

pub use event::{
    Entity as EventEntity,
    Model as EventModel,
    ActiveModel as EventActiveModel,
    Column as EventColumn,
};

pub use ingress_package::{
    Entity as IngressPackageEntity,
    Model as IngressPackageModel,
    ActiveModel as IngressPackageActiveModel,
    Column as IngressPackageColumn,
};

pub use received_package::{
    Entity as ReceivedPackageEntity,
    Model as ReceivedPackageModel,
    ActiveModel as ReceivedPackageActiveModel,
    Column as ReceivedPackageColumn,
};
