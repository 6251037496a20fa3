//! Article metadata synchronization
//!
//! Overwrites an article record with everything read from a newly processed
//! package. Every facet is replaced, never merged, except the issue link
//! (kept when no issue is given), the ahead-of-print URL snapshot (taken
//! once) and the `other` identifiers (unioned with the extra pids).
//! The record is built in memory and persisted once at the end.

use std::sync::Arc;

use chrono::Utc;
use spf_common::db::MetadataStore;
use spf_common::errors::{AppError, Result};
use spf_common::records::{
    AopUrlSegments, Article, ArticlePdf, AuthorMeta, HtmlLanguage, LanguageAbstract,
    LanguageKeywords, RenditionEntry, ScieloPids, TranslatedSection, TranslatedTitle,
};
use tracing::{info, instrument};

use crate::package::{Author, PackageMetadata};

/// Caller-supplied settings for an update
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub is_public: bool,
    pub issue_id: Option<String>,
    /// Raw order value; falls back to the package's legacy order when it
    /// does not parse
    pub order: Option<String>,
    pub other_pids: Vec<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            is_public: true,
            issue_id: None,
            order: None,
            other_pids: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn MetadataStore>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, metadata, renditions, options))]
    pub async fn update(
        &self,
        pid_v3: &str,
        metadata: &PackageMetadata,
        xml_uri: &str,
        renditions: &[RenditionEntry],
        options: &UpdateOptions,
    ) -> Result<Article> {
        let mut article = self
            .store
            .find_article(pid_v3)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: pid_v3.to_string(),
            })?;

        article.pdfs = renditions.iter().cloned().map(ArticlePdf::from).collect();
        article.xml = Some(xml_uri.to_string());
        self.set_issue(&mut article, options.issue_id.as_deref()).await?;
        article.order = resolve_order(options.order.as_deref(), metadata);
        set_ids(&mut article, metadata);
        article.is_public = options.is_public;
        set_languages(&mut article, metadata);
        set_abstracts(&mut article, metadata);
        set_authors(&mut article, &metadata.authors);
        set_pages(&mut article, metadata);
        article.publication_date = Some(metadata.pub_date.join("-"));
        set_sections(&mut article, metadata);
        set_titles(&mut article, metadata);
        article.article_type = metadata.article_type.clone();
        article
            .scielo_pids
            .other
            .extend(options.other_pids.iter().cloned());
        article.updated = Utc::now();

        self.store.save_article(&article).await?;
        info!(issue_id = ?article.issue_id, "Article synchronized");
        Ok(article)
    }

    async fn set_issue(&self, article: &mut Article, issue_id: Option<&str>) -> Result<()> {
        let current = match article.issue_id.as_deref() {
            Some(id) => self.store.find_issue(id).await?,
            None => None,
        };

        if let Some(current) = &current {
            if current.is_ahead_of_print() && article.aop_url_segs.is_none() {
                article.aop_url_segs = Some(AopUrlSegments {
                    url_seg_article: article.url_segment.clone(),
                    url_seg_issue: current.url_segment.clone(),
                });
            }
        }

        let target = issue_id
            .map(str::to_string)
            .or_else(|| article.issue_id.clone())
            .ok_or_else(|| AppError::IssueNotFound {
                id: "(article has no issue)".to_string(),
            })?;
        let issue = self
            .store
            .find_issue(&target)
            .await?
            .ok_or_else(|| AppError::IssueNotFound { id: target.clone() })?;

        article.journal_id = Some(issue.journal_id.clone());
        article.issue_id = Some(issue.id);
        Ok(())
    }
}

/// Parse the supplied order, falling back to the package's legacy order.
pub fn resolve_order(raw: Option<&str>, metadata: &PackageMetadata) -> Option<i32> {
    match raw.map(str::trim).and_then(|v| v.parse::<i32>().ok()) {
        Some(order) => Some(order),
        None => {
            info!(
                value = ?raw,
                fallback = ?metadata.order,
                "Invalid article order, using the last digits of the v2 pid"
            );
            metadata.order
        }
    }
}

fn set_ids(article: &mut Article, metadata: &PackageMetadata) {
    if let Some(pid_v3) = &metadata.pid_v3 {
        article.pid_v3 = pid_v3.clone();
    }
    article.pid = metadata.pid_v2.clone();
    article.aop_pid = metadata.aop_pid.clone();
    article.doi = metadata.doi.clone();
    article.scielo_pids = ScieloPids {
        v1: None,
        v2: metadata.pid_v2.clone(),
        v3: metadata.pid_v3.clone(),
        other: metadata.other_ids.clone(),
    };
}

fn set_languages(article: &mut Article, metadata: &PackageMetadata) {
    article.original_language = metadata.lang.clone();
    article.languages = metadata.languages.clone();
    article.htmls = metadata
        .languages
        .iter()
        .map(|lang| HtmlLanguage { lang: lang.clone() })
        .collect();
}

fn set_abstracts(article: &mut Article, metadata: &PackageMetadata) {
    article.abstract_text = metadata.abstract_text().map(str::to_string);
    article.abstracts = metadata
        .abstracts
        .iter()
        .map(|(language, text)| LanguageAbstract {
            language: language.clone(),
            text: text.clone(),
        })
        .collect();
    article.abstract_languages = metadata.abstracts.iter().map(|(l, _)| l.clone()).collect();
    article.keywords = metadata
        .keywords
        .iter()
        .map(|(language, keywords)| LanguageKeywords {
            language: language.clone(),
            keywords: keywords.clone(),
        })
        .collect();
}

fn set_authors(article: &mut Article, authors: &[Author]) {
    article.authors = authors
        .iter()
        .map(|a| format!("{}, {}", a.surname, a.given_names))
        .collect();

    article.authors_meta = authors
        .iter()
        .filter(|a| a.orcid.is_some() || a.affiliation.is_some())
        .map(|a| AuthorMeta {
            name: match &a.prefix {
                Some(prefix) => format!("{} {}, {}", a.surname, prefix, a.given_names),
                None => format!("{}, {}", a.surname, a.given_names),
            },
            orcid: a.orcid.clone(),
            affiliation: a.affiliation.clone(),
        })
        .collect();
}

fn set_pages(article: &mut Article, metadata: &PackageMetadata) {
    article.elocation = metadata.elocation_id.clone();
    article.fpage = metadata.fpage.clone();
    article.fpage_sequence = metadata.fpage_seq.clone();
    article.lpage = metadata.lpage.clone();
}

fn set_sections(article: &mut Article, metadata: &PackageMetadata) {
    article.section = metadata.section().map(str::to_string);
    article.trans_sections = metadata
        .sections
        .iter()
        .map(|(language, name)| TranslatedSection {
            language: language.clone(),
            name: name.clone(),
        })
        .collect();
}

fn set_titles(article: &mut Article, metadata: &PackageMetadata) {
    let primary = metadata.primary_lang();
    article.title = metadata.title().map(str::to_string);
    article.translated_titles = metadata
        .titles
        .iter()
        .filter(|(language, _)| language != primary)
        .map(|(language, name)| TranslatedTitle {
            language: language.clone(),
            name: name.clone(),
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use spf_common::db::InMemoryStore;
    use spf_common::records::Issue;

    fn issue(id: &str, number: &str) -> Issue {
        Issue {
            id: id.to_string(),
            journal_id: "j1".to_string(),
            number: Some(number.to_string()),
            url_segment: Some(format!("seg-{id}")),
        }
    }

    fn metadata() -> PackageMetadata {
        PackageMetadata {
            article_type: Some("research-article".to_string()),
            lang: Some("en".to_string()),
            languages: vec!["en".to_string(), "pt".to_string()],
            pid_v2: Some("S1234-56782021000100012".to_string()),
            pid_v3: Some("S0001".to_string()),
            doi: Some("10.1590/x".to_string()),
            order: Some(12),
            titles: vec![
                ("en".to_string(), "Title A".to_string()),
                ("pt".to_string(), "Título A".to_string()),
            ],
            sections: vec![("en".to_string(), "Articles".to_string())],
            abstracts: vec![
                ("en".to_string(), "Abstract".to_string()),
                ("pt".to_string(), "Resumo".to_string()),
            ],
            keywords: vec![("en".to_string(), vec!["one".to_string()])],
            authors: vec![
                Author {
                    surname: "Silva".to_string(),
                    given_names: "Ana".to_string(),
                    prefix: Some("da".to_string()),
                    orcid: Some("0000-0002-1825-0097".to_string()),
                    ..Default::default()
                },
                Author {
                    surname: "Souza".to_string(),
                    given_names: "João".to_string(),
                    ..Default::default()
                },
            ],
            fpage: Some("10".to_string()),
            fpage_seq: Some("a".to_string()),
            lpage: Some("20".to_string()),
            pub_date: vec!["2021".to_string(), "03".to_string()],
            ..Default::default()
        }
    }

    fn rendition() -> RenditionEntry {
        RenditionEntry {
            name: "S0001.pdf".to_string(),
            mimetype: Some("application/pdf".to_string()),
            lang: Some("en".to_string()),
            kind: Some("pdf".to_string()),
            uri: "http://minio:9000/spf/S0001.pdf".to_string(),
            size_bytes: Some(7),
        }
    }

    async fn setup(current_issue: &str, number: &str) -> (Arc<InMemoryStore>, Synchronizer) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_issue(issue(current_issue, number)).await;
        store.insert_issue(issue("i2", "2")).await;

        let mut article = Article::new("S0001");
        article.issue_id = Some(current_issue.to_string());
        article.url_segment = Some("art-seg".to_string());
        article.title = Some("stale".to_string());
        article.trans_sections = vec![TranslatedSection {
            language: "es".to_string(),
            name: "stale".to_string(),
        }];
        article.scielo_pids.other.insert("old".to_string());
        store.save_article(&article).await.unwrap();

        let synchronizer = Synchronizer::new(store.clone());
        (store, synchronizer)
    }

    #[tokio::test]
    async fn test_end_to_end_titles() {
        let (_, sync) = setup("i1", "1").await;
        let article = sync
            .update("S0001", &metadata(), "http://x/S0001.xml", &[], &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(article.title.as_deref(), Some("Title A"));
        assert_eq!(
            article.translated_titles,
            vec![TranslatedTitle {
                language: "pt".to_string(),
                name: "Título A".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_update_overwrites_every_facet() {
        let (store, sync) = setup("i1", "1").await;
        let options = UpdateOptions {
            is_public: false,
            issue_id: None,
            order: Some("7".to_string()),
            other_pids: vec!["legacy-1".to_string()],
        };
        sync.update("S0001", &metadata(), "http://x/S0001.xml", &[rendition()], &options)
            .await
            .unwrap();

        let article = store.find_article("S0001").await.unwrap().unwrap();
        assert_eq!(article.pdfs.len(), 1);
        assert_eq!(article.pdfs[0].url, "http://minio:9000/spf/S0001.pdf");
        assert_eq!(article.xml.as_deref(), Some("http://x/S0001.xml"));
        assert_eq!(article.issue_id.as_deref(), Some("i1"));
        assert_eq!(article.journal_id.as_deref(), Some("j1"));
        assert_eq!(article.order, Some(7));
        assert_eq!(article.pid.as_deref(), Some("S1234-56782021000100012"));
        assert_eq!(article.doi.as_deref(), Some("10.1590/x"));
        assert!(!article.is_public);
        assert_eq!(article.original_language.as_deref(), Some("en"));
        assert_eq!(article.htmls.len(), 2);
        assert_eq!(article.abstract_text.as_deref(), Some("Abstract"));
        assert_eq!(article.abstract_languages, vec!["en", "pt"]);
        assert_eq!(article.keywords[0].keywords, vec!["one"]);
        assert_eq!(article.authors, vec!["Silva, Ana", "Souza, João"]);
        assert_eq!(article.authors_meta.len(), 1);
        assert_eq!(article.authors_meta[0].name, "Silva da, Ana");
        assert_eq!(article.fpage_sequence.as_deref(), Some("a"));
        assert_eq!(article.publication_date.as_deref(), Some("2021-03"));
        assert_eq!(article.section.as_deref(), Some("Articles"));
        assert_eq!(article.trans_sections.len(), 1);
        assert_eq!(article.article_type.as_deref(), Some("research-article"));
        assert_eq!(
            article.scielo_pids.other.iter().collect::<Vec<_>>(),
            vec!["legacy-1"]
        );
        assert!(article.aop_url_segs.is_none());
    }

    #[tokio::test]
    async fn test_empty_sections_clear_translations() {
        let (_, sync) = setup("i1", "1").await;
        let mut meta = metadata();
        meta.sections.clear();

        let article = sync
            .update("S0001", &meta, "http://x/S0001.xml", &[], &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(article.section, None);
        assert!(article.trans_sections.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_order_falls_back() {
        let (_, sync) = setup("i1", "1").await;
        for raw in [None, Some(""), Some("abc")] {
            let options = UpdateOptions {
                order: raw.map(str::to_string),
                ..Default::default()
            };
            let article = sync
                .update("S0001", &metadata(), "http://x/S0001.xml", &[], &options)
                .await
                .unwrap();
            assert_eq!(article.order, Some(12), "order {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_ahead_of_print_snapshot_is_taken_once() {
        let (store, sync) = setup("aop", "ahead").await;

        let article = sync
            .update("S0001", &metadata(), "http://x/S0001.xml", &[], &UpdateOptions::default())
            .await
            .unwrap();
        let snapshot = AopUrlSegments {
            url_seg_article: Some("art-seg".to_string()),
            url_seg_issue: Some("seg-aop".to_string()),
        };
        assert_eq!(article.aop_url_segs.as_ref(), Some(&snapshot));
        assert_eq!(article.issue_id.as_deref(), Some("aop"));

        // A later ahead update with a changed URL keeps the first snapshot.
        let mut changed = article.clone();
        changed.url_segment = Some("new-seg".to_string());
        store.save_article(&changed).await.unwrap();
        let article = sync
            .update("S0001", &metadata(), "http://x/S0001.xml", &[], &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(article.aop_url_segs.as_ref(), Some(&snapshot));

        let options = UpdateOptions {
            issue_id: Some("i2".to_string()),
            ..Default::default()
        };
        let article = sync
            .update("S0001", &metadata(), "http://x/S0001.xml", &[], &options)
            .await
            .unwrap();
        assert_eq!(article.issue_id.as_deref(), Some("i2"));
        assert_eq!(article.aop_url_segs.as_ref(), Some(&snapshot));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let (_, sync) = setup("i1", "1").await;
        let err = sync
            .update("S9999", &metadata(), "http://x/S9999.xml", &[], &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_issue() {
        let (store, sync) = setup("i1", "1").await;
        let options = UpdateOptions {
            issue_id: Some("missing".to_string()),
            ..Default::default()
        };
        let err = sync
            .update("S0001", &metadata(), "http://x/S0001.xml", &[], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IssueNotFound { .. }));
        assert_eq!(
            store.find_article("S0001").await.unwrap().unwrap().title.as_deref(),
            Some("stale")
        );
    }

    #[test]
    fn test_primary_language_never_translated() {
        let mut article = Article::new("S0001");
        let mut meta = metadata();
        meta.titles.push(("en".to_string(), "Duplicate".to_string()));
        set_titles(&mut article, &meta);
        assert!(article.translated_titles.iter().all(|t| t.language != "en"));
    }
}
