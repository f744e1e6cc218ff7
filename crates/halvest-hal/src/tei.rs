//! Streaming parser for the HAL XML-TEI search responses.
//!
//! Two entry points: [`parse_page_head`] reads the pagination measures
//! and the next cursor (all the crawl client needs to drive the loop),
//! [`parse_records`] extracts the paper records for the formatter.
//! Record-level problems never abort a page; they surface as
//! [`RecordOutcome::Drop`] with an inspectable reason. A page missing
//! its measure elements is a protocol error and fatal to the crawl.

use chrono::{Local, NaiveDate};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::record::{AuthorRecord, PaperRecord, canonical_halid, extract_year};

/// Malformed or unexpected API response shape. Fatal: the cursor
/// cannot be safely advanced past an unparseable page.
#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
}

impl ProtocolError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol error: {}", self.message)
    }
}

impl std::error::Error for ProtocolError {}

impl From<quick_xml::Error> for ProtocolError {
    fn from(e: quick_xml::Error) -> Self {
        Self::new(format!("XML parse error: {e}"))
    }
}

/// Pagination header of one response page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHead {
    /// Total matches for the whole query (first `measure`).
    pub total_matches: u64,
    /// Documents returned on this page (second `measure`).
    pub returned: u64,
    /// Cursor for the next page, from the root `next` attribute.
    pub next_cursor: Option<String>,
}

/// Why a match was not turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No author-submitted file reference on the match.
    NoPdf,
    /// The submitted file is not a PDF.
    NotPdf,
    /// The PDF's release date is in the future.
    Embargoed,
    /// A required field is absent.
    MissingField(&'static str),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPdf => f.write_str("no submitted file"),
            Self::NotPdf => f.write_str("submitted file is not a pdf"),
            Self::Embargoed => f.write_str("pdf under embargo"),
            Self::MissingField(name) => write!(f, "missing {name}"),
        }
    }
}

/// Outcome of extracting one match.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Keep(PaperRecord),
    Drop(DropReason),
}

/// Parse the pagination header of a response page.
pub fn parse_page_head(xml: &str) -> Result<PageHead, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut next_cursor = None;
    let mut saw_root = false;
    let mut quantities: Vec<u64> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                if !saw_root {
                    saw_root = true;
                    next_cursor = attr_ci(&e, b"next");
                }
                if is_elem(&e, b"measure") {
                    let q = attr_ci(&e, b"quantity")
                        .ok_or_else(|| ProtocolError::new("measure without quantity"))?;
                    let q = q
                        .parse()
                        .map_err(|_| ProtocolError::new(format!("bad measure quantity: {q}")))?;
                    quantities.push(q);
                    if quantities.len() == 2 {
                        break;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if quantities.len() < 2 {
        return Err(ProtocolError::new("response is missing measure elements"));
    }
    Ok(PageHead {
        total_matches: quantities[0],
        returned: quantities[1],
        next_cursor,
    })
}

/// Extract every match of a response page as a kept record or a drop.
pub fn parse_records(xml: &str) -> Result<Vec<RecordOutcome>, ProtocolError> {
    parse_records_at(xml, Local::now().date_naive())
}

/// As [`parse_records`], with an explicit "today" for the embargo check.
pub fn parse_records_at(xml: &str, today: NaiveDate) -> Result<Vec<RecordOutcome>, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut outcomes = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if is_elem(&e, b"biblFull") => {
                let raw = parse_match(&mut reader)?;
                outcomes.push(finish_match(raw, today));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(outcomes)
}

/// First author-submitted file reference of a match.
struct PdfRef {
    target: String,
    notbefore: Option<String>,
}

/// Raw fields of one `biblFull` match before validation.
#[derive(Default)]
struct RawMatch {
    pdf: Option<PdfRef>,
    halid: Option<String>,
    title: Option<String>,
    date: Option<String>,
    lang: Option<String>,
    domains: Vec<String>,
    authors: Vec<AuthorRecord>,
}

fn parse_match(reader: &mut Reader<&[u8]>) -> Result<RawMatch, ProtocolError> {
    let mut m = RawMatch::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if is_elem(&e, b"ref") && is_author_file(&e) {
                    let target = attr_ci(&e, b"target").unwrap_or_default();
                    let notbefore = parse_ref_embargo(reader)?;
                    // Several files may be submitted; the first one is
                    // assumed to be the main publication.
                    if m.pdf.is_none() {
                        m.pdf = Some(PdfRef { target, notbefore });
                    }
                } else if is_elem(&e, b"idno") {
                    let kind = attr_ci(&e, b"type");
                    let text = reader.read_text(e.name())?.trim().to_string();
                    if m.halid.is_none()
                        && kind.as_deref().is_some_and(|k| k.contains("halId"))
                        && !text.is_empty()
                    {
                        m.halid = Some(text);
                    }
                } else if is_elem(&e, b"title") {
                    if m.title.is_none() {
                        let text = reader.read_text(e.name())?.trim().to_string();
                        if !text.is_empty() {
                            m.title = Some(text);
                        }
                    }
                } else if is_elem(&e, b"date") {
                    let kind = attr_ci(&e, b"type");
                    let text = reader.read_text(e.name())?.trim().to_string();
                    if m.date.is_none()
                        && kind.as_deref().is_some_and(|k| k.contains("whenProduced"))
                        && !text.is_empty()
                    {
                        m.date = Some(text);
                    }
                } else if is_elem(&e, b"language") {
                    if m.lang.is_none() {
                        m.lang = attr_ci(&e, b"ident");
                    }
                } else if is_elem(&e, b"classCode") {
                    if is_hal_domain(&e) {
                        if let Some(code) = attr_ci(&e, b"n") {
                            m.domains.push(code);
                        }
                    }
                } else if is_elem(&e, b"author") {
                    if attr_ci(&e, b"role").as_deref() == Some("aut") {
                        let author = parse_author(reader)?;
                        if !author.name.is_empty() {
                            m.authors.push(author);
                        }
                    } else {
                        reader.read_to_end(e.name())?;
                    }
                }
            }
            Event::Empty(e) => {
                if is_elem(&e, b"ref") && is_author_file(&e) {
                    if m.pdf.is_none() {
                        m.pdf = Some(PdfRef {
                            target: attr_ci(&e, b"target").unwrap_or_default(),
                            notbefore: None,
                        });
                    }
                } else if is_elem(&e, b"language") {
                    if m.lang.is_none() {
                        m.lang = attr_ci(&e, b"ident");
                    }
                } else if is_elem(&e, b"classCode") && is_hal_domain(&e) {
                    if let Some(code) = attr_ci(&e, b"n") {
                        m.domains.push(code);
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref().eq_ignore_ascii_case(b"biblFull") => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(m)
}

/// Scan a `ref` subtree for the embargo release date.
fn parse_ref_embargo(reader: &mut Reader<&[u8]>) -> Result<Option<String>, ProtocolError> {
    let mut buf = Vec::new();
    let mut notbefore = None;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                if is_elem(&e, b"date") && notbefore.is_none() {
                    notbefore = attr_ci(&e, b"notbefore");
                }
            }
            Event::End(e) if e.local_name().as_ref().eq_ignore_ascii_case(b"ref") => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(notbefore)
}

/// Parse one `author role="aut"` subtree. Malformed nested identifier
/// nodes are skipped individually, never abort the author.
fn parse_author(reader: &mut Reader<&[u8]>) -> Result<AuthorRecord, ProtocolError> {
    let mut author = AuthorRecord::default();
    let mut name_parts: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if is_elem(&e, b"forename") {
                    let text = reader.read_text(e.name())?.trim().to_string();
                    if !text.is_empty() {
                        name_parts.push(text);
                    }
                } else if is_elem(&e, b"surname") {
                    let text = reader.read_text(e.name())?.trim().to_string();
                    if !text.is_empty() {
                        name_parts.push(text);
                    }
                } else if is_elem(&e, b"email") {
                    let text = reader.read_text(e.name())?.trim().to_string();
                    if !text.is_empty() {
                        author.external_ids.insert("email".to_string(), text);
                    }
                } else if is_elem(&e, b"idno") {
                    let kind = attr_ci(&e, b"type");
                    let text = reader.read_text(e.name())?.trim().to_string();
                    match kind {
                        Some(kind) if !text.is_empty() => {
                            author.external_ids.insert(kind, text);
                        }
                        _ => {} // malformed identifier node, skip it
                    }
                } else if is_elem(&e, b"affiliation") {
                    if let Some(target) = affiliation_target(&e) {
                        author.affiliations.push(target);
                    } else {
                        let text = reader.read_text(e.name())?.trim().to_string();
                        if !text.is_empty() {
                            author.affiliations.push(text);
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if is_elem(&e, b"affiliation") {
                    if let Some(target) = affiliation_target(&e) {
                        author.affiliations.push(target);
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref().eq_ignore_ascii_case(b"author") => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    author.name = name_parts.join(" ");
    Ok(author)
}

/// Validate a raw match through the ordered predicate chain.
fn finish_match(m: RawMatch, today: NaiveDate) -> RecordOutcome {
    let Some(pdf) = m.pdf else {
        return RecordOutcome::Drop(DropReason::NoPdf);
    };
    if !is_pdf_target(&pdf.target) {
        return RecordOutcome::Drop(DropReason::NotPdf);
    }
    if under_embargo(pdf.notbefore.as_deref(), today) {
        return RecordOutcome::Drop(DropReason::Embargoed);
    }
    let Some(halid_raw) = m.halid else {
        return RecordOutcome::Drop(DropReason::MissingField("halid"));
    };
    let Some(title) = m.title else {
        return RecordOutcome::Drop(DropReason::MissingField("title"));
    };
    let Some(date) = m.date else {
        return RecordOutcome::Drop(DropReason::MissingField("date"));
    };
    let Some(lang) = m.lang else {
        return RecordOutcome::Drop(DropReason::MissingField("language"));
    };

    RecordOutcome::Keep(PaperRecord {
        halid: canonical_halid(&halid_raw).to_string(),
        lang,
        domain: m.domains,
        year: extract_year(&date),
        title,
        authors: m.authors,
        url: pdf.target,
        timestamp: Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
    })
}

/// The submitted file must be a PDF.
fn is_pdf_target(target: &str) -> bool {
    target.ends_with(".pdf")
}

/// A release date strictly in the future means closed access for now.
/// An absent or unparseable date is treated as already released.
fn under_embargo(notbefore: Option<&str>, today: NaiveDate) -> bool {
    match notbefore.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()) {
        Some(release) => release > today,
        None => false,
    }
}

fn is_author_file(e: &BytesStart) -> bool {
    attr_ci(e, b"subtype").is_some_and(|s| s.contains("author"))
}

fn is_hal_domain(e: &BytesStart) -> bool {
    attr_ci(e, b"scheme").is_some_and(|s| s.contains("halDomain"))
}

/// Case-insensitive local-name comparison (TEI uses camelCase names).
fn is_elem(e: &BytesStart, name: &[u8]) -> bool {
    e.local_name().as_ref().eq_ignore_ascii_case(name)
}

/// Case-insensitive attribute lookup by local name.
fn attr_ci(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(name) {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

/// Structure pointer of an `affiliation` element, leading `#` stripped.
fn affiliation_target(e: &BytesStart) -> Option<String> {
    let target = attr_ci(e, b"ref")?;
    let target = target.trim_start_matches('#').trim();
    (!target.is_empty()).then(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn page(matches: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0" next="AoEpMjM0NTY3">
 <teiHeader>
  <encodingDesc>
   <measure unit="match" quantity="12345"/>
   <measure unit="document" quantity="500"/>
  </encodingDesc>
 </teiHeader>
 <text><body><listBibl>{matches}</listBibl></body></text>
</TEI>"#
        )
    }

    fn valid_match() -> &'static str {
        r##"<biblFull>
  <titleStmt><title>Deep Learning for Mud Analysis</title></titleStmt>
  <editionStmt><edition type="current">
    <date type="whenProduced">2023-05-12</date>
    <ref type="file" subtype="author" target="https://hal.science/hal-04286657/file/x.pdf">
      <date notBefore="2020-01-01"/>
    </ref>
  </edition></editionStmt>
  <idno type="halId">hal-04286657</idno>
  <sourceDesc><biblStruct><analytic>
    <author role="aut">
      <persName><forename>Jane</forename><surname>Doe</surname></persName>
      <idno type="ORCID">0000-0001-2345-6789</idno>
      <affiliation ref="#struct-1"/>
    </author>
    <author role="crp"><persName><surname>Ignored</surname></persName></author>
  </analytic></biblStruct></sourceDesc>
  <profileDesc>
    <langUsage><language ident="en">English</language></langUsage>
    <textClass><classCode scheme="halDomain" n="info"/></textClass>
  </profileDesc>
</biblFull>"##
    }

    #[test]
    fn head_reads_measures_and_cursor() {
        let head = parse_page_head(&page("")).unwrap();
        assert_eq!(head.total_matches, 12345);
        assert_eq!(head.returned, 500);
        assert_eq!(head.next_cursor.as_deref(), Some("AoEpMjM0NTY3"));
    }

    #[test]
    fn head_missing_measures_is_protocol_error() {
        let xml = r#"<TEI next="x"><teiHeader/></TEI>"#;
        assert!(parse_page_head(xml).is_err());
    }

    #[test]
    fn head_single_measure_is_protocol_error() {
        let xml = r#"<TEI next="x"><measure quantity="3"/></TEI>"#;
        assert!(parse_page_head(xml).is_err());
    }

    #[test]
    fn head_bad_quantity_is_protocol_error() {
        let xml = r#"<TEI next="x"><measure quantity="many"/><measure quantity="2"/></TEI>"#;
        assert!(parse_page_head(xml).is_err());
    }

    #[test]
    fn valid_match_kept_with_all_fields() {
        let outcomes = parse_records_at(&page(valid_match()), today()).unwrap();
        assert_eq!(outcomes.len(), 1);
        let RecordOutcome::Keep(rec) = &outcomes[0] else {
            panic!("expected kept record, got {:?}", outcomes[0]);
        };
        assert_eq!(rec.halid, "04286657");
        assert_eq!(rec.lang, "en");
        assert_eq!(rec.year, "2023");
        assert_eq!(rec.title, "Deep Learning for Mud Analysis");
        assert_eq!(rec.domain, vec!["info".to_string()]);
        assert!(rec.url.ends_with(".pdf"));
        assert_eq!(rec.authors.len(), 1);
        let author = &rec.authors[0];
        assert_eq!(author.name, "Jane Doe");
        assert_eq!(author.affiliations, vec!["struct-1".to_string()]);
        assert_eq!(
            author.external_ids.get("ORCID").map(String::as_str),
            Some("0000-0001-2345-6789")
        );
    }

    #[test]
    fn affiliation_ref_stripped_text_as_fallback() {
        let xml = page(
            r##"<biblFull>
  <titleStmt><title>T</title></titleStmt>
  <editionStmt><edition>
    <date type="whenProduced">2023-05-12</date>
    <ref subtype="author" target="https://hal.science/hal-1/file/x.pdf"/>
  </edition></editionStmt>
  <idno type="halId">hal-1</idno>
  <sourceDesc><biblStruct><analytic>
    <author role="aut">
      <persName><surname>Doe</surname></persName>
      <affiliation ref="#struct-42"/>
      <affiliation>Inria</affiliation>
    </author>
  </analytic></biblStruct></sourceDesc>
  <profileDesc><langUsage><language ident="en">English</language></langUsage></profileDesc>
</biblFull>"##,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        let RecordOutcome::Keep(rec) = &outcomes[0] else {
            panic!("expected kept record, got {:?}", outcomes[0]);
        };
        assert_eq!(
            rec.authors[0].affiliations,
            vec!["struct-42".to_string(), "Inria".to_string()]
        );
    }

    #[test]
    fn match_without_ref_dropped() {
        let xml = page(
            r#"<biblFull><titleStmt><title>T</title></titleStmt>
               <idno type="halId">hal-1</idno></biblFull>"#,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        assert_eq!(outcomes, vec![RecordOutcome::Drop(DropReason::NoPdf)]);
    }

    #[test]
    fn non_pdf_target_dropped() {
        let xml = page(
            r#"<biblFull>
               <ref subtype="author" target="https://hal.science/file/x.docx"/>
               </biblFull>"#,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        assert_eq!(outcomes, vec![RecordOutcome::Drop(DropReason::NotPdf)]);
    }

    #[test]
    fn future_embargo_dropped() {
        let xml = page(
            r#"<biblFull>
               <ref subtype="author" target="https://hal.science/file/x.pdf">
                 <date notBefore="2030-01-01"/>
               </ref>
               </biblFull>"#,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        assert_eq!(outcomes, vec![RecordOutcome::Drop(DropReason::Embargoed)]);
    }

    #[test]
    fn past_embargo_passes_predicate() {
        assert!(!under_embargo(Some("2020-01-01"), today()));
        assert!(under_embargo(Some("2030-01-01"), today()));
        assert!(!under_embargo(None, today()));
        assert!(!under_embargo(Some("garbage"), today()));
    }

    #[test]
    fn embargo_on_today_is_released() {
        assert!(!under_embargo(Some("2024-06-01"), today()));
    }

    #[test]
    fn missing_language_dropped_with_reason() {
        let xml = page(
            r#"<biblFull>
               <titleStmt><title>T</title></titleStmt>
               <editionStmt><edition type="current">
                 <date type="whenProduced">2023</date>
                 <ref subtype="author" target="https://hal.science/file/x.pdf"/>
               </edition></editionStmt>
               <idno type="halId">hal-1</idno>
               </biblFull>"#,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        assert_eq!(
            outcomes,
            vec![RecordOutcome::Drop(DropReason::MissingField("language"))]
        );
    }

    #[test]
    fn malformed_author_idno_skipped_record_kept() {
        let xml = page(
            r#"<biblFull>
               <titleStmt><title>T</title></titleStmt>
               <editionStmt><edition type="current">
                 <date type="whenProduced">2023-01-01</date>
                 <ref subtype="author" target="https://hal.science/file/x.pdf"/>
               </edition></editionStmt>
               <idno type="halId">hal-9</idno>
               <author role="aut">
                 <persName><surname>Solo</surname></persName>
                 <idno>no-type-attribute</idno>
               </author>
               <profileDesc><langUsage><language ident="fr"/></langUsage></profileDesc>
               </biblFull>"#,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        let RecordOutcome::Keep(rec) = &outcomes[0] else {
            panic!("expected kept record");
        };
        assert_eq!(rec.authors.len(), 1);
        assert_eq!(rec.authors[0].name, "Solo");
        assert!(rec.authors[0].external_ids.is_empty());
    }

    #[test]
    fn first_of_several_refs_wins() {
        let xml = page(
            r#"<biblFull>
               <titleStmt><title>T</title></titleStmt>
               <editionStmt><edition type="current">
                 <date type="whenProduced">2023-01-01</date>
                 <ref subtype="author" target="https://hal.science/file/main.pdf"/>
                 <ref subtype="author" target="https://hal.science/file/annex.pdf"/>
               </edition></editionStmt>
               <idno type="halId">hal-9</idno>
               <profileDesc><langUsage><language ident="fr"/></langUsage></profileDesc>
               </biblFull>"#,
        );
        let outcomes = parse_records_at(&xml, today()).unwrap();
        let RecordOutcome::Keep(rec) = &outcomes[0] else {
            panic!("expected kept record");
        };
        assert!(rec.url.ends_with("main.pdf"));
    }

    #[test]
    fn multiple_matches_mixed_outcomes() {
        let both = format!(
            "{}{}",
            valid_match(),
            r#"<biblFull><titleStmt><title>No file</title></titleStmt></biblFull>"#
        );
        let outcomes = parse_records_at(&page(&both), today()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], RecordOutcome::Keep(_)));
        assert_eq!(outcomes[1], RecordOutcome::Drop(DropReason::NoPdf));
    }
}
