//! Bibliographic metadata read from SciELO PS (JATS) documents

use std::collections::BTreeSet;

use super::xml::Element;

/// Per-language pairs keep document order; the first entry for a language wins.
pub type ByLanguage<T> = Vec<(String, T)>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub surname: String,
    pub given_names: String,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub article_type: Option<String>,
    /// Primary language
    pub lang: Option<String>,
    /// Primary language followed by translation languages
    pub languages: Vec<String>,

    pub pid_v2: Option<String>,
    pub pid_v3: Option<String>,
    pub doi: Option<String>,
    pub aop_pid: Option<String>,
    pub other_ids: BTreeSet<String>,
    /// Legacy order hint
    pub order: Option<i32>,

    pub issn: Option<String>,
    pub acronym: Option<String>,

    pub titles: ByLanguage<String>,
    pub sections: ByLanguage<String>,
    pub abstracts: ByLanguage<String>,
    pub keywords: ByLanguage<Vec<String>>,
    pub authors: Vec<Author>,

    pub fpage: Option<String>,
    pub fpage_seq: Option<String>,
    pub lpage: Option<String>,
    pub elocation_id: Option<String>,
    /// Year, month and day, as present
    pub pub_date: Vec<String>,
}

impl PackageMetadata {
    pub fn from_root(root: &Element) -> Self {
        let lang = root.attr("xml:lang").map(str::to_string);
        let sub_articles = translations(root);

        let mut languages: Vec<String> = lang.iter().cloned().collect();
        for sub in &sub_articles {
            if let Some(l) = sub.attr("xml:lang") {
                push_unique(&mut languages, l.to_string());
            }
        }

        let mut meta = PackageMetadata {
            article_type: root.attr("article-type").map(str::to_string),
            lang: lang.clone(),
            languages,
            ..Default::default()
        };

        let article_meta = root
            .child("front")
            .and_then(|f| f.child("article-meta"));
        let journal_meta = root
            .child("front")
            .and_then(|f| f.child("journal-meta"));

        if let Some(jm) = journal_meta {
            read_journal(jm, &mut meta);
        }
        if let Some(am) = article_meta {
            read_ids(am, &mut meta);
            read_pages(am, &mut meta);
            meta.pub_date = pub_date(am);
            meta.authors = authors(am, root);
        }

        let main_lang = lang.unwrap_or_default();
        if let Some(am) = article_meta {
            read_language_facets(am, &main_lang, &mut meta);
        }
        for sub in &sub_articles {
            let sub_lang = sub.attr("xml:lang").unwrap_or_default().to_string();
            if let Some(front) = sub.child("front-stub").or_else(|| sub.child("front")) {
                read_language_facets(front, &sub_lang, &mut meta);
            }
        }

        meta
    }

    fn lookup<'a, T>(pairs: &'a ByLanguage<T>, lang: Option<&str>) -> Option<&'a T> {
        let lang = lang?;
        pairs.iter().find(|(l, _)| l == lang).map(|(_, v)| v)
    }

    /// Title in the primary language
    pub fn title(&self) -> Option<&str> {
        Self::lookup(&self.titles, self.lang.as_deref()).map(String::as_str)
    }

    pub fn section(&self) -> Option<&str> {
        Self::lookup(&self.sections, self.lang.as_deref()).map(String::as_str)
    }

    pub fn abstract_text(&self) -> Option<&str> {
        Self::lookup(&self.abstracts, self.lang.as_deref()).map(String::as_str)
    }

    pub fn primary_lang(&self) -> &str {
        self.lang.as_deref().unwrap_or_default()
    }
}

fn translations(root: &Element) -> Vec<&Element> {
    root.children_named("sub-article")
        .filter(|s| s.attr("article-type") == Some("translation"))
        .collect()
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn insert_lang<T>(pairs: &mut ByLanguage<T>, lang: &str, value: T) {
    if lang.is_empty() || pairs.iter().any(|(l, _)| l == lang) {
        return;
    }
    pairs.push((lang.to_string(), value));
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn read_journal(jm: &Element, meta: &mut PackageMetadata) {
    meta.acronym = jm
        .children_named("journal-id")
        .find(|e| e.attr("journal-id-type") == Some("publisher-id"))
        .and_then(|e| non_empty(e.text()));

    let issns: Vec<&Element> = jm.children_named("issn").collect();
    let electronic = issns.iter().find(|e| {
        e.attr("pub-type") == Some("epub") || e.attr("publication-format") == Some("electronic")
    });
    meta.issn = electronic
        .or_else(|| issns.first())
        .and_then(|e| non_empty(e.text()));
}

fn read_ids(am: &Element, meta: &mut PackageMetadata) {
    for id in am.children_named("article-id") {
        let value = id.text();
        if value.is_empty() {
            continue;
        }
        match (id.attr("pub-id-type"), id.attr("specific-use")) {
            (_, Some("scielo-v3")) => meta.pid_v3 = Some(value),
            (_, Some("scielo-v2")) => meta.pid_v2 = Some(value),
            (_, Some("previous-pid")) => meta.aop_pid = Some(value),
            (Some("publisher-id"), None) if meta.pid_v2.is_none() => meta.pid_v2 = Some(value),
            (Some("doi"), _) => meta.doi = Some(value),
            (Some("other"), _) => {
                meta.other_ids.insert(value);
            }
            _ => {}
        }
    }

    meta.order = meta
        .other_ids
        .iter()
        .find_map(|v| v.parse::<i32>().ok())
        .or_else(|| meta.pid_v2.as_deref().and_then(order_from_v2));
}

/// Last five digits of a legacy v2 id
fn order_from_v2(pid_v2: &str) -> Option<i32> {
    let digits: String = pid_v2.chars().filter(char::is_ascii_digit).collect();
    let tail = &digits[digits.len().saturating_sub(5)..];
    tail.parse().ok()
}

fn read_pages(am: &Element, meta: &mut PackageMetadata) {
    if let Some(fpage) = am.child("fpage") {
        meta.fpage = non_empty(fpage.text());
        meta.fpage_seq = fpage.attr("seq").map(str::to_string);
    }
    meta.lpage = am.child("lpage").and_then(|e| non_empty(e.text()));
    meta.elocation_id = am.child("elocation-id").and_then(|e| non_empty(e.text()));
}

fn pub_date(am: &Element) -> Vec<String> {
    let dates: Vec<&Element> = am.children_named("pub-date").collect();
    let chosen = dates
        .iter()
        .find(|d| d.attr("date-type") == Some("pub") || d.attr("pub-type") == Some("epub"))
        .or_else(|| dates.first());

    let Some(date) = chosen else {
        return Vec::new();
    };

    let mut parts = Vec::new();
    for (name, width) in [("year", 4usize), ("month", 2), ("day", 2)] {
        match date.child(name).map(|e| e.text()) {
            Some(v) if !v.is_empty() => parts.push(format!("{v:0>width$}")),
            _ => break,
        }
    }
    parts
}

fn authors(am: &Element, root: &Element) -> Vec<Author> {
    let Some(group) = am.child("contrib-group") else {
        return Vec::new();
    };

    group
        .children_named("contrib")
        .filter(|c| c.attr("contrib-type") == Some("author"))
        .filter_map(|contrib| {
            let name = contrib.child("name")?;
            let field = |n: &str| name.child(n).and_then(|e| non_empty(e.text()));

            let orcid = contrib
                .children_named("contrib-id")
                .find(|e| e.attr("contrib-id-type") == Some("orcid"))
                .and_then(|e| non_empty(e.text()));

            let affiliation = contrib
                .children_named("xref")
                .filter(|x| x.attr("ref-type") == Some("aff"))
                .filter_map(|x| x.attr("rid"))
                .find_map(|rid| affiliation(root, rid));

            Some(Author {
                surname: field("surname").unwrap_or_default(),
                given_names: field("given-names").unwrap_or_default(),
                prefix: field("prefix"),
                suffix: field("suffix"),
                orcid,
                affiliation,
            })
        })
        .collect()
}

fn affiliation(root: &Element, rid: &str) -> Option<String> {
    let aff = root
        .find_all("aff")
        .into_iter()
        .find(|a| a.attr("id") == Some(rid))?;
    let institutions = aff.find_all("institution");
    institutions
        .iter()
        .find(|i| i.attr("content-type") == Some("orgname"))
        .or_else(|| institutions.first())
        .and_then(|i| non_empty(i.text()))
}

/// Titles, sections, abstracts and keywords of one article or translation.
fn read_language_facets(front: &Element, lang: &str, meta: &mut PackageMetadata) {
    if let Some(group) = front.child("title-group") {
        if let Some(title) = group.child("article-title").and_then(|t| non_empty(t.text())) {
            insert_lang(&mut meta.titles, lang, title);
        }
        for trans in group.children_named("trans-title-group") {
            let trans_lang = trans.attr("xml:lang").unwrap_or_default();
            if let Some(title) = trans.child("trans-title").and_then(|t| non_empty(t.text())) {
                insert_lang(&mut meta.titles, trans_lang, title);
            }
        }
    }

    if let Some(categories) = front.child("article-categories") {
        let heading = categories
            .children_named("subj-group")
            .find(|g| g.attr("subj-group-type") == Some("heading"));
        if let Some(subject) = heading
            .and_then(|g| g.child("subject"))
            .and_then(|s| non_empty(s.text()))
        {
            insert_lang(&mut meta.sections, lang, subject);
        }
    }

    for abs in front.children_named("abstract") {
        // Graphical and highlight abstracts carry an abstract-type.
        if abs.attr("abstract-type").is_some() {
            continue;
        }
        let abs_lang = abs.attr("xml:lang").unwrap_or(lang);
        if let Some(text) = non_empty(abs.text_excluding(&["title"])) {
            insert_lang(&mut meta.abstracts, abs_lang, text);
        }
    }
    for abs in front.children_named("trans-abstract") {
        let abs_lang = abs.attr("xml:lang").unwrap_or_default();
        if let Some(text) = non_empty(abs.text_excluding(&["title"])) {
            insert_lang(&mut meta.abstracts, abs_lang, text);
        }
    }

    for group in front.children_named("kwd-group") {
        let kwd_lang = group.attr("xml:lang").unwrap_or(lang);
        let keywords: Vec<String> = group
            .children_named("kwd")
            .filter_map(|k| non_empty(k.text()))
            .collect();
        if !keywords.is_empty() {
            insert_lang(&mut meta.keywords, kwd_lang, keywords);
        }
    }
}
