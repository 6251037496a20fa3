//! Domain records shared by the gateway and the ingress worker

pub mod article;
pub mod article_files;
pub mod file;
pub mod ledger;

pub use article::{
    AopUrlSegments, Article, ArticlePdf, AuthorMeta, HtmlLanguage, Issue, Journal,
    LanguageAbstract, LanguageKeywords, ScieloPids, TranslatedSection, TranslatedTitle,
};
pub use article_files::{ArticleFiles, NewArticleFiles, RenditionFile};
pub use file::{ContentManifest, FileDescriptor, PackageManifest, RenditionEntry, StoredFile};
pub use ledger::{
    Event, EventName, EventStatus, IngressPackage, IngressStatus, ReceivedPackage, Scope,
    SCOPE_ALL_USERS,
};
