//! Test fixtures shared by package and pipeline tests

use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

/// SciELO PS document for `S0001`: English with a Portuguese translation
/// and one figure referenced as `fig1`.
pub const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<article xmlns:xlink="http://www.w3.org/1999/xlink" article-type="research-article" xml:lang="en">
  <front>
    <journal-meta>
      <journal-id journal-id-type="publisher-id">abc</journal-id>
      <issn pub-type="ppub">0000-0001</issn>
      <issn pub-type="epub">1234-5678</issn>
    </journal-meta>
    <article-meta>
      <article-id specific-use="scielo-v3" pub-id-type="publisher-id">S0001</article-id>
      <article-id specific-use="scielo-v2" pub-id-type="publisher-id">S1234-56782021000100012</article-id>
      <article-id pub-id-type="doi">10.1590/abc.2021.001</article-id>
      <article-categories>
        <subj-group subj-group-type="heading"><subject>Articles</subject></subj-group>
      </article-categories>
      <title-group>
        <article-title>Title A</article-title>
        <trans-title-group xml:lang="pt"><trans-title>Título A</trans-title></trans-title-group>
      </title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <contrib-id contrib-id-type="orcid">0000-0002-1825-0097</contrib-id>
          <name><surname>Silva</surname><given-names>Ana</given-names><prefix>da</prefix></name>
          <xref ref-type="aff" rid="aff1">1</xref>
        </contrib>
        <contrib contrib-type="author">
          <name><surname>Souza</surname><given-names>João</given-names></name>
        </contrib>
      </contrib-group>
      <aff id="aff1"><institution content-type="orgdiv1">Dept</institution><institution content-type="orgname">Universidade X</institution></aff>
      <pub-date date-type="pub" publication-format="electronic"><day>5</day><month>3</month><year>2021</year></pub-date>
      <fpage seq="a">10</fpage>
      <lpage>20</lpage>
      <abstract><title>Abstract</title><p>English abstract.</p></abstract>
      <trans-abstract xml:lang="pt"><title>Resumo</title><p>Resumo em português.</p></trans-abstract>
      <kwd-group xml:lang="en"><kwd>one</kwd><kwd>two</kwd></kwd-group>
      <kwd-group xml:lang="pt"><kwd>um</kwd></kwd-group>
    </article-meta>
  </front>
  <body><fig><graphic xlink:href="fig1"/></fig></body>
  <sub-article article-type="translation" xml:lang="pt" id="s1">
    <front-stub>
      <article-categories>
        <subj-group subj-group-type="heading"><subject>Artigos</subject></subj-group>
      </article-categories>
      <title-group><article-title>Título A (tradução)</article-title></title-group>
    </front-stub>
  </sub-article>
</article>"#;

/// Write a zip named `file_name` holding `entries` into `dir`.
pub fn write_zip(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file_name);
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// The `S0001` package with its figure and two renditions.
pub fn sample_package(dir: &Path, file_name: &str) -> PathBuf {
    write_zip(
        dir,
        file_name,
        &[
            ("S0001.xml", SAMPLE_XML.as_bytes()),
            ("fig1.jpg", b"jpeg-bytes"),
            ("S0001.pdf", b"%PDF-en"),
            ("S0001-pt.pdf", b"%PDF-pt"),
        ],
    )
}
