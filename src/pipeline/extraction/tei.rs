//! TEI markup parsing for extraction-service responses.
//!
//! The service answers with a TEI XML document. We build a small element
//! tree with quick-xml and read the header, abstract, body, and the
//! bibliography (`back//listBibl/biblStruct`) from it.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::ExtractionError;

// ═══════════════════════════════════════════
// Element tree
// ═══════════════════════════════════════════

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

/// Minimal XML element: local name, attributes (local names), children.
#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, ExtractionError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ExtractionError::Markup(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ExtractionError::Markup(e.to_string()))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Direct children with the given name.
    pub(crate) fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// First direct child with the given name.
    pub(crate) fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// Follow a chain of direct children, taking the first match at each step.
    pub(crate) fn path(&self, steps: &[&str]) -> Option<&Element> {
        steps.iter().try_fold(self, |el, step| el.child(step))
    }

    /// All descendants with the given name, in document order.
    pub(crate) fn descendants_named(&self, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }

    /// Concatenated text of the element, whitespace collapsed.
    pub(crate) fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        collapse_whitespace(&raw)
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => {
                    // Keep word boundaries between sibling elements such as <s> sentences.
                    out.push(' ');
                    e.collect_text(out);
                    out.push(' ');
                }
            }
        }
    }

    /// Non-empty trimmed text, or `None`.
    pub(crate) fn text_opt(&self) -> Option<String> {
        Some(self.text()).filter(|t| !t.is_empty())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse XML into its root element.
pub(crate) fn parse_markup(xml: &str) -> Result<Element, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Element::from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ExtractionError::Markup("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(parent) = stack.last_mut() {
                    let value = match text.unescape() {
                        Ok(t) => t.into_owned(),
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    parent.children.push(Node::Text(value));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(parent) = stack.last_mut() {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    parent.children.push(Node::Text(value));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractionError::Markup(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if !stack.is_empty() {
        return Err(ExtractionError::Markup("unexpected end of document".into()));
    }
    root.ok_or_else(|| ExtractionError::Markup("document has no root element".into()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ExtractionError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(ExtractionError::Markup("multiple root elements".into())),
    }
    Ok(())
}

// ═══════════════════════════════════════════
// TEI document model
// ═══════════════════════════════════════════

/// One bibliography entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Biblio {
    pub index: usize,
    pub authors: Vec<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub journal: Option<String>,
    pub doi: Option<String>,
}

/// Header metadata of the processed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeiHeader {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub doi: Option<String>,
    pub date: Option<String>,
    pub journal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeiDocument {
    pub header: TeiHeader,
    pub abstract_text: Option<String>,
    pub body: Option<String>,
    pub citations: Vec<Biblio>,
}

/// Parse a full-text TEI response.
pub fn parse_document(xml: &str) -> Result<TeiDocument, ExtractionError> {
    let root = parse_markup(xml)?;
    if root.name() != "TEI" {
        return Err(ExtractionError::Markup(format!(
            "expected <TEI> root, found <{}>",
            root.name()
        )));
    }

    let header_el = root.child("teiHeader");
    let source_biblio = header_el
        .and_then(|h| h.path(&["fileDesc", "sourceDesc", "biblStruct"]))
        .map(|b| parse_biblio(b, 0));

    let stmt_title = header_el
        .and_then(|h| h.path(&["fileDesc", "titleStmt"]))
        .and_then(|stmt| {
            stmt.children_named("title")
                .find(|t| t.attr("type") == Some("main"))
                .or_else(|| stmt.child("title"))
        })
        .and_then(Element::text_opt);

    let publication_date = header_el
        .and_then(|h| h.path(&["fileDesc", "publicationStmt", "date"]))
        .and_then(date_value);

    let header = match source_biblio {
        Some(b) => TeiHeader {
            title: stmt_title.or(b.title),
            authors: b.authors,
            doi: b.doi,
            date: publication_date.or(b.date),
            journal: b.journal,
        },
        None => TeiHeader {
            title: stmt_title,
            date: publication_date,
            ..Default::default()
        },
    };

    let abstract_text = header_el
        .and_then(|h| h.path(&["profileDesc", "abstract"]))
        .and_then(block_text);

    let text_el = root.child("text");
    let body = text_el.and_then(|t| t.child("body")).and_then(block_text);
    let citations = text_el
        .and_then(|t| t.child("back"))
        .map(collect_citations)
        .unwrap_or_default();

    Ok(TeiDocument {
        header,
        abstract_text,
        body,
        citations,
    })
}

fn collect_citations(scope: &Element) -> Vec<Biblio> {
    scope
        .descendants_named("listBibl")
        .into_iter()
        .flat_map(|list| list.children_named("biblStruct"))
        .enumerate()
        .map(|(index, b)| parse_biblio(b, index))
        .collect()
}

fn parse_biblio(b: &Element, index: usize) -> Biblio {
    let analytic = b.child("analytic");
    let monogr = b.child("monogr");

    let title = analytic
        .and_then(|a| main_title(a, |_| true))
        .or_else(|| monogr.and_then(|m| main_title(m, |level| level != Some("j"))));

    let mut authors = analytic.map(author_names).unwrap_or_default();
    if authors.is_empty() {
        authors = monogr.map(author_names).unwrap_or_default();
    }

    let journal = monogr
        .and_then(|m| {
            m.children_named("title")
                .find(|t| t.attr("level") == Some("j"))
        })
        .and_then(Element::text_opt);

    let imprint = monogr.and_then(|m| m.child("imprint"));
    let date = imprint.and_then(|i| i.child("date")).and_then(date_value);
    let scope = |unit: &str| {
        imprint.and_then(|i| {
            i.children_named("biblScope")
                .find(|s| s.attr("unit") == Some(unit))
        })
    };
    let volume = scope("volume").and_then(Element::text_opt);
    let issue = scope("issue").and_then(Element::text_opt);
    let pages = scope("page").and_then(page_range);

    let doi = b
        .descendants_named("idno")
        .into_iter()
        .find(|i| {
            i.attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("doi"))
        })
        .and_then(Element::text_opt);

    Biblio {
        index,
        authors,
        title,
        date,
        volume,
        issue,
        pages,
        journal,
        doi,
    }
}

fn main_title(parent: &Element, level_ok: impl Fn(Option<&str>) -> bool) -> Option<String> {
    let titles: Vec<&Element> = parent
        .children_named("title")
        .filter(|t| level_ok(t.attr("level")))
        .collect();
    titles
        .iter()
        .find(|t| t.attr("type") == Some("main"))
        .or_else(|| titles.first())
        .and_then(|t| t.text_opt())
}

fn author_names(parent: &Element) -> Vec<String> {
    parent
        .children_named("author")
        .filter_map(|a| a.child("persName"))
        .filter_map(full_name)
        .collect()
}

/// Forenames in order, then surname.
fn full_name(pers: &Element) -> Option<String> {
    let mut parts: Vec<String> = pers
        .children_named("forename")
        .filter_map(Element::text_opt)
        .collect();
    if let Some(surname) = pers.child("surname").and_then(Element::text_opt) {
        parts.push(surname);
    }
    if parts.is_empty() {
        pers.text_opt()
    } else {
        Some(parts.join(" "))
    }
}

/// `@when` if present, else the element text.
fn date_value(date: &Element) -> Option<String> {
    date.attr("when")
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .or_else(|| date.text_opt())
}

fn page_range(scope: &Element) -> Option<String> {
    match (scope.attr("from"), scope.attr("to")) {
        (Some(from), Some(to)) => Some(format!("{from}-{to}")),
        (Some(from), None) => Some(from.to_string()),
        (None, Some(to)) => Some(to.to_string()),
        (None, None) => scope.text_opt(),
    }
}

/// Text of a block container: each `<head>`/`<p>` becomes a paragraph.
fn block_text(container: &Element) -> Option<String> {
    let blocks: Vec<String> = container
        .descendants_blocks()
        .into_iter()
        .filter_map(Element::text_opt)
        .collect();
    if blocks.is_empty() {
        container.text_opt()
    } else {
        Some(blocks.join("\n\n"))
    }
}

impl Element {
    fn descendants_blocks(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_blocks(&mut out);
        out
    }

    fn collect_blocks<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.name == "p" || child.name == "head" {
                out.push(child);
            } else {
                child.collect_blocks(out);
            }
        }
    }
}
