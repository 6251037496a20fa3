//! Article, issue and journal records

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::RenditionEntry;

/// Issue number that marks an ahead-of-print placeholder issue.
pub const AHEAD_OF_PRINT_NUMBER: &str = "ahead";

/// Persistent article metadata, keyed by `pid_v3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub pid_v3: String,
    pub pid: Option<String>,
    pub aop_pid: Option<String>,
    pub doi: Option<String>,
    pub scielo_pids: ScieloPids,

    pub journal_id: Option<String>,
    pub issue_id: Option<String>,
    pub url_segment: Option<String>,
    pub aop_url_segs: Option<AopUrlSegments>,

    pub article_type: Option<String>,
    pub order: Option<i32>,
    pub elocation: Option<String>,
    pub fpage: Option<String>,
    pub fpage_sequence: Option<String>,
    pub lpage: Option<String>,
    pub publication_date: Option<String>,

    pub original_language: Option<String>,
    pub languages: Vec<String>,
    pub htmls: Vec<HtmlLanguage>,

    pub title: Option<String>,
    pub translated_titles: Vec<TranslatedTitle>,
    pub section: Option<String>,
    pub trans_sections: Vec<TranslatedSection>,
    pub abstract_text: Option<String>,
    pub abstracts: Vec<LanguageAbstract>,
    pub abstract_languages: Vec<String>,
    pub keywords: Vec<LanguageKeywords>,
    pub authors: Vec<String>,
    pub authors_meta: Vec<AuthorMeta>,

    pub pdfs: Vec<ArticlePdf>,
    pub xml: Option<String>,
    pub is_public: bool,

    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Article {
    /// Bare record as created by external registration.
    pub fn new(pid_v3: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            pid_v3: pid_v3.into(),
            pid: None,
            aop_pid: None,
            doi: None,
            scielo_pids: ScieloPids::default(),
            journal_id: None,
            issue_id: None,
            url_segment: None,
            aop_url_segs: None,
            article_type: None,
            order: None,
            elocation: None,
            fpage: None,
            fpage_sequence: None,
            lpage: None,
            publication_date: None,
            original_language: None,
            languages: Vec::new(),
            htmls: Vec::new(),
            title: None,
            translated_titles: Vec::new(),
            section: None,
            trans_sections: Vec::new(),
            abstract_text: None,
            abstracts: Vec::new(),
            abstract_languages: Vec::new(),
            keywords: Vec::new(),
            authors: Vec::new(),
            authors_meta: Vec::new(),
            pdfs: Vec::new(),
            xml: None,
            is_public: false,
            created: now,
            updated: now,
        }
    }
}

/// Alternate identifiers of an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScieloPids {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v3: Option<String>,
    #[serde(default)]
    pub other: BTreeSet<String>,
}

/// URL segments captured before an ahead-of-print article moves to a
/// numbered issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AopUrlSegments {
    pub url_seg_article: Option<String>,
    pub url_seg_issue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlLanguage {
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedTitle {
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedSection {
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageAbstract {
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageKeywords {
    pub language: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorMeta {
    pub name: String,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
}

/// Rendition as exposed on the article (`url` instead of `uri`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePdf {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl From<RenditionEntry> for ArticlePdf {
    fn from(entry: RenditionEntry) -> Self {
        Self {
            name: entry.name,
            url: entry.uri,
            lang: entry.lang,
            mimetype: entry.mimetype,
            kind: entry.kind,
            size_bytes: entry.size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub journal_id: String,
    pub number: Option<String>,
    pub url_segment: Option<String>,
}

impl Issue {
    pub fn is_ahead_of_print(&self) -> bool {
        self.number.as_deref() == Some(AHEAD_OF_PRINT_NUMBER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: String,
    pub acronym: Option<String>,
    pub title: Option<String>,
    pub eissn: Option<String>,
    pub pissn: Option<String>,
}

impl Journal {
    /// Electronic ISSN, falling back to the print one.
    pub fn issn(&self) -> Option<&str> {
        self.eissn
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.pissn.as_deref().filter(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendition_becomes_pdf_with_url() {
        let pdf = ArticlePdf::from(RenditionEntry {
            name: "a.pdf".into(),
            mimetype: Some("application/pdf".into()),
            lang: Some("en".into()),
            kind: Some("pdf".into()),
            uri: "http://minio/spf/a.pdf".into(),
            size_bytes: Some(10),
        });
        assert_eq!(pdf.url, "http://minio/spf/a.pdf");

        let json = serde_json::to_value(&pdf).unwrap();
        assert!(json.get("uri").is_none());
        assert_eq!(json["type"], "pdf");
    }

    #[test]
    fn test_journal_issn_prefers_electronic() {
        let mut journal = Journal {
            id: "j1".into(),
            acronym: Some("abc".into()),
            title: None,
            eissn: Some("1234-5678".into()),
            pissn: Some("8765-4321".into()),
        };
        assert_eq!(journal.issn(), Some("1234-5678"));

        journal.eissn = Some(String::new());
        assert_eq!(journal.issn(), Some("8765-4321"));
    }

    #[test]
    fn test_ahead_of_print_issue() {
        let issue = Issue {
            id: "i1".into(),
            journal_id: "j1".into(),
            number: Some("ahead".into()),
            url_segment: Some("2020.nahead".into()),
        };
        assert!(issue.is_ahead_of_print());
    }
}
