/*!
 * Unit extraction from sanitized HTML.
 *
 * The extractor walks the document in order and gives a number to every
 * element that carries direct text, skipping excluded, hidden and
 * already-translated regions. The text of a numbered element includes its
 * inline descendants; block descendants are numbered on their own. The
 * document is rendered back with a `data-number-id` attribute on every
 * numbered element, and a later pass over that output keeps those numbers.
 */

use log::debug;
use scraper::{ElementRef, Html, Node};
use std::collections::HashSet;

use crate::errors::ExtractionError;
use crate::translation::units::{NumberedUnit, TITLE_NUMBER};

/// Attribute carrying a unit number in rendered HTML
pub const NUMBER_ATTRIBUTE: &str = "data-number-id";

/// Largest unit number kept from existing markup; larger ones are renumbered
pub const MAX_UNIT_NUMBER: u32 = 1_000_000;

/// Tags whose content is never translated
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "code", "pre", "kbd", "samp", "var", "input", "textarea", "select",
    "option", "noscript", "template", "svg", "math", "button", "iframe", "object", "canvas",
    "head", "title",
];

/// Tags that start a new unit even inside a numbered element
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "dd", "details", "dialog", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "section", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Result of one extraction pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Units sorted by number, title first
    pub units: Vec<NumberedUnit>,
    /// Input HTML with `data-number-id` on every numbered element
    pub numbered_html: String,
}

/// Extract numbered units from an HTML fragment and its title
pub fn extract_units(html: &str, title: &str) -> Result<ExtractedDocument, ExtractionError> {
    let title = collapse_whitespace(title);
    if title.is_empty() {
        return Err(ExtractionError::EmptyTitle);
    }

    let fragment = Html::parse_fragment(html);
    let mut walker = Walker::new(reserved_numbers(&fragment));
    walker.walk_children(fragment.root_element(), false);

    let mut units = walker.units;
    units.push(NumberedUnit::new(TITLE_NUMBER, title));
    units.sort_by_key(|u| u.number);

    debug!("Extracted {} units from {} bytes of HTML", units.len(), html.len());

    Ok(ExtractedDocument {
        units,
        numbered_html: walker.output,
    })
}

struct Walker {
    units: Vec<NumberedUnit>,
    used: HashSet<u32>,
    /// Numbers already present in the input, never handed to new units
    reserved: HashSet<u32>,
    next_number: u32,
    output: String,
}

impl Walker {
    fn new(reserved: HashSet<u32>) -> Self {
        Self {
            units: Vec::new(),
            used: HashSet::from([TITLE_NUMBER]),
            reserved,
            next_number: 1,
            output: String::new(),
        }
    }

    /// Serialize the children of `element`; `absorbed` means an ancestor unit owns their inline text
    fn walk_children(&mut self, element: ElementRef<'_>, absorbed: bool) {
        let raw_text = RAW_TEXT_TAGS.contains(&element.value().name());

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if raw_text {
                        self.output.push_str(&text.text);
                    } else {
                        escape_into(&mut self.output, &text.text, false);
                    }
                }
                Node::Comment(comment) => {
                    self.output.push_str("<!--");
                    self.output.push_str(&comment.comment);
                    self.output.push_str("-->");
                }
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.walk_element(child_element, absorbed);
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_element(&mut self, element: ElementRef<'_>, absorbed: bool) {
        let name = element.value().name();

        if is_skipped(element) {
            self.write_verbatim(element);
            return;
        }

        if absorbed && !BLOCK_TAGS.contains(&name) {
            self.open_tag(element, None);
            self.walk_children(element, true);
            self.close_tag(name);
            return;
        }

        if has_direct_text(element) {
            let mut raw = String::new();
            collect_inline_text(element, &mut raw);
            let text = collapse_preserving_breaks(&raw);

            if !text.is_empty() {
                let number = self.assign_number(existing_number(element));
                self.units.push(NumberedUnit::new(number, text));
                self.open_tag(element, Some(number));
                self.walk_children(element, true);
                self.close_tag(name);
                return;
            }
        }

        self.open_tag(element, None);
        self.walk_children(element, false);
        self.close_tag(name);
    }

    fn assign_number(&mut self, existing: Option<u32>) -> u32 {
        if let Some(number) = existing.filter(|n| !self.used.contains(n)) {
            self.used.insert(number);
            self.next_number = self.next_number.max(number + 1);
            return number;
        }

        while self.used.contains(&self.next_number) || self.reserved.contains(&self.next_number) {
            self.next_number += 1;
        }
        let number = self.next_number;
        self.used.insert(number);
        self.next_number += 1;
        number
    }

    fn write_verbatim(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        self.open_tag(element, None);
        if !VOID_TAGS.contains(&name) {
            self.walk_children_verbatim(element);
        }
        self.close_tag(name);
    }

    fn walk_children_verbatim(&mut self, element: ElementRef<'_>) {
        let raw_text = RAW_TEXT_TAGS.contains(&element.value().name());
        for child in element.children() {
            match child.value() {
                Node::Text(text) if raw_text => self.output.push_str(&text.text),
                Node::Text(text) => escape_into(&mut self.output, &text.text, false),
                Node::Comment(comment) => {
                    self.output.push_str("<!--");
                    self.output.push_str(&comment.comment);
                    self.output.push_str("-->");
                }
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        let name = child_element.value().name();
                        self.open_tag(child_element, None);
                        if !VOID_TAGS.contains(&name) {
                            self.walk_children_verbatim(child_element);
                        }
                        self.close_tag(name);
                    }
                }
                _ => {}
            }
        }
    }

    fn open_tag(&mut self, element: ElementRef<'_>, number: Option<u32>) {
        let value = element.value();
        self.output.push('<');
        self.output.push_str(value.name());
        for (key, val) in value.attrs() {
            if number.is_some() && key == NUMBER_ATTRIBUTE {
                continue;
            }
            self.output.push(' ');
            self.output.push_str(key);
            self.output.push_str("=\"");
            escape_into(&mut self.output, val, true);
            self.output.push('"');
        }
        if let Some(number) = number {
            self.output.push_str(&format!(" {}=\"{}\"", NUMBER_ATTRIBUTE, number));
        }
        self.output.push('>');
    }

    fn close_tag(&mut self, name: &str) {
        if VOID_TAGS.contains(&name) {
            return;
        }
        self.output.push_str("</");
        self.output.push_str(name);
        self.output.push('>');
    }
}

fn reserved_numbers(fragment: &Html) -> HashSet<u32> {
    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(existing_number)
        .collect()
}

fn existing_number(element: ElementRef<'_>) -> Option<u32> {
    element
        .value()
        .attr(NUMBER_ATTRIBUTE)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n != TITLE_NUMBER && *n <= MAX_UNIT_NUMBER)
}

fn is_skipped(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if EXCLUDED_TAGS.contains(&value.name()) {
        return true;
    }

    let translated = value.attr("data-translated") == Some("true")
        || value.attr("translate") == Some("no")
        || value.classes().any(|c| c == "notranslate");
    if translated {
        return true;
    }

    if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
        return true;
    }

    value.attr("style").is_some_and(|style| {
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        style.contains("display:none") || style.contains("visibility:hidden")
    })
}

fn has_direct_text(element: ElementRef<'_>) -> bool {
    element.children().any(|child| match child.value() {
        Node::Text(text) => !text.text.trim().is_empty(),
        _ => false,
    })
}

/// Collect the text of an element and its inline descendants, `<br>` as a newline
fn collect_inline_text(element: ElementRef<'_>, buf: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buf.push_str(&text.text),
            Node::Element(el) => {
                if el.name() == "br" {
                    buf.push('\n');
                    continue;
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    if is_skipped(child_element) || BLOCK_TAGS.contains(&el.name()) {
                        continue;
                    }
                    collect_inline_text(child_element, buf);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace within each line, keeping explicit breaks
fn collapse_preserving_breaks(input: &str) -> String {
    let lines: Vec<String> = input.split('\n').map(collapse_whitespace).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
