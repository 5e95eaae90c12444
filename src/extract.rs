use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));
static PARAGRAPH_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid paragraph selector"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));
static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name][content]").expect("valid meta selector"));

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];
const DISCARDED_SCHEMES: &[&str] = &["javascript:", "data:", "mailto:", "tel:"];

/// Everything the orchestrator needs from one page of markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub links: BTreeSet<String>,
    pub title: String,
    pub text: String,
    pub description: Option<String>,
}

/// Turns raw markup into links, a title and plain text.
pub trait Extractor: Send + Sync {
    fn extract_links(&self, markup: &str, base_url: &Url) -> BTreeSet<String>;
    fn extract_title(&self, markup: &str) -> String;
    fn extract_text(&self, markup: &str) -> String;

    fn extract_description(&self, _markup: &str) -> Option<String> {
        None
    }

    fn extract(&self, markup: &str, base_url: &Url) -> Extracted {
        Extracted {
            links: self.extract_links(markup, base_url),
            title: self.extract_title(markup),
            text: self.extract_text(markup),
            description: self.extract_description(markup),
        }
    }
}

/// [`Extractor`] backed by an html5ever parse of the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract_links(&self, markup: &str, base_url: &Url) -> BTreeSet<String> {
        links_in(&Html::parse_document(markup), base_url)
    }

    fn extract_title(&self, markup: &str) -> String {
        title_in(&Html::parse_document(markup))
    }

    fn extract_text(&self, markup: &str) -> String {
        text_in(&Html::parse_document(markup))
    }

    fn extract_description(&self, markup: &str) -> Option<String> {
        description_in(&Html::parse_document(markup))
    }

    fn extract(&self, markup: &str, base_url: &Url) -> Extracted {
        let document = Html::parse_document(markup);
        Extracted {
            links: links_in(&document, base_url),
            title: title_in(&document),
            text: text_in(&document),
            description: description_in(&document),
        }
    }
}

fn links_in(document: &Html, base_url: &Url) -> BTreeSet<String> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(base_url, href))
        .collect()
}

fn title_in(document: &Html) -> String {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        .unwrap_or_default()
}

/// Paragraph text when the page has any, otherwise all visible body text.
fn text_in(document: &Html) -> String {
    let paragraphs = document
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| collapse_whitespace(&visible_text(p)))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>();
    if !paragraphs.is_empty() {
        return paragraphs.join("\n\n");
    }

    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());
    collapse_whitespace(&visible_text(root))
}

fn description_in(document: &Html) -> Option<String> {
    document
        .select(&META_SELECTOR)
        .filter(|meta| {
            meta.value()
                .attr("name")
                .is_some_and(|name| name.eq_ignore_ascii_case("description"))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .find(|content| !content.is_empty())
}

/// Resolves `href` against `base` into an absolute http(s) URL without a
/// fragment. Fragment-only links and non-navigational schemes yield `None`.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if DISCARDED_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(element, &mut out);
    out
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_visible_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
