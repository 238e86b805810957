use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use tracing::debug;
use url::Url;

use super::document::{attr_of, first_in, parent_of, slot_text, text_of, Document};
use super::strategy::SignalSource::*;
use super::strategy::{resolve, resolve_or_sentinel, Field, Heuristics, Strategy};
use super::SummaryRecord;
use crate::diagnostics::DiagnosticSink;

const DUMP_BYTES: usize = 10_000;

/// Repeated item containers, newest site layout first.
pub const CONTAINER_PATTERNS: &[&str] = &[
    "search-page-media-row",
    ".findify-components--cards__inner",
    ".js-tile-link",
    ".search__results .poster",
];

static MARKUP_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());
static URL_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/m/[^/]*_(\d{4})(?:/|$)").unwrap());
static TITLE_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d{4})\)$").unwrap());

/// One matched container plus whatever has been resolved for it so far.
pub struct Container<'a> {
    pub node: ElementRef<'a>,
    base: &'a Url,
    pub title: Option<String>,
    pub link: Option<String>,
}

impl<'a> Container<'a> {
    fn new(node: ElementRef<'a>, base: &'a Url) -> Self {
        Container { node, base, title: None, link: None }
    }

    /// Relative hrefs are joined onto the site origin.
    fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base.join(href).ok().map(String::from)
    }

    fn title_node(&self) -> Option<ElementRef<'a>> {
        first_in(self.node, r#"[slot="title"]"#).or_else(|| first_in(self.node, ".movieTitle"))
    }
}

fn title_chain<'a>() -> [Strategy<Container<'a>>; 2] {
    [
        Strategy { id: "item_title_slot", source: DedicatedSelector, extract: |c, _| slot_text(c.node, "title") },
        Strategy { id: "item_title_class", source: DedicatedSelector, extract: |c, _| first_in(c.node, ".movieTitle").map(text_of) },
    ]
}

fn link_chain<'a>() -> [Strategy<Container<'a>>; 3] {
    [
        Strategy { id: "item_link_anchor", source: DedicatedSelector, extract: link_anchor },
        Strategy { id: "item_link_title_parent", source: AttributeScrape, extract: link_title_parent },
        Strategy { id: "item_link_self", source: AttributeScrape, extract: |c, _| c.absolutize(attr_of(c.node, "href")?) },
    ]
}

fn year_chain<'a>() -> [Strategy<Container<'a>>; 7] {
    [
        Strategy { id: "item_year_releaseyear_attr", source: DedicatedSelector, extract: |c, _| attr_of(c.node, "releaseyear").map(str::to_string) },
        Strategy { id: "item_year_slot", source: DedicatedSelector, extract: |c, _| slot_text(c.node, "year") },
        Strategy { id: "item_year_class", source: DedicatedSelector, extract: |c, _| first_in(c.node, ".movieYear").map(text_of) },
        Strategy { id: "item_year_data_attr", source: DedicatedSelector, extract: |c, _| attr_of(c.node, "data-year").map(str::to_string) },
        Strategy { id: "item_year_markup", source: AttributeScrape, extract: year_in_markup },
        Strategy { id: "item_year_url", source: AttributeScrape, extract: year_in_url },
        Strategy { id: "item_year_title_suffix", source: KeywordHeuristic, extract: year_in_title },
    ]
}

/// Locate list items and build one summary per usable container.
///
/// The first container pattern with any match is used; later patterns are not
/// consulted even if they would match more. No match at all is an empty list.
pub fn find_items(
    doc: &Document,
    base: &Url,
    heuristics: &Heuristics,
    sink: &mut dyn DiagnosticSink,
) -> Vec<SummaryRecord> {
    sink.artifact("listing.html", doc.head(DUMP_BYTES));

    let Some((pattern, nodes)) = CONTAINER_PATTERNS
        .iter()
        .map(|p| (*p, doc.select(p)))
        .find(|(_, nodes)| !nodes.is_empty())
    else {
        debug!("No item containers matched any pattern");
        return Vec::new();
    };
    debug!("Found {} containers with pattern '{}'", nodes.len(), pattern);

    let mut items = Vec::new();
    for node in nodes {
        let mut item = Container::new(node, base);

        item.title = resolve(Field::Title, &title_chain(), &item, heuristics, &mut *sink);
        let Some(title) = item.title.clone() else {
            debug!("Skipping container without a title");
            continue;
        };

        item.link = resolve(Field::Link, &link_chain(), &item, heuristics, &mut *sink);
        let Some(detail_url) = item.link.clone() else {
            debug!("Skipping '{}': no link", title);
            continue;
        };

        let year = resolve_or_sentinel(Field::Year, &year_chain(), &item, heuristics, &mut *sink);
        debug!("Added result: {} ({}) - {}", title, year, detail_url);
        items.push(SummaryRecord { title, year, detail_url });
    }
    items
}

fn link_anchor(c: &Container<'_>, _: &Heuristics) -> Option<String> {
    let anchor = first_in(c.node, "a[href]")?;
    c.absolutize(attr_of(anchor, "href")?)
}

fn link_title_parent(c: &Container<'_>, _: &Heuristics) -> Option<String> {
    let parent = parent_of(c.title_node()?)?;
    c.absolutize(attr_of(parent, "href")?)
}

fn year_in_markup(c: &Container<'_>, _: &Heuristics) -> Option<String> {
    MARKUP_YEAR_RE.captures(&c.node.html()).map(|caps| caps[1].to_string())
}

fn year_in_url(c: &Container<'_>, _: &Heuristics) -> Option<String> {
    let link = c.link.as_deref()?;
    if !link.contains("/m/") {
        return None;
    }
    URL_YEAR_RE.captures(link).map(|caps| caps[1].to_string())
}

fn year_in_title(c: &Container<'_>, _: &Heuristics) -> Option<String> {
    let title = c.title.as_deref()?;
    TITLE_YEAR_RE.captures(title.trim()).map(|caps| caps[1].to_string())
}
