use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::document::{attr_of, text_of, Document};
use super::normalize::normalize;
use super::strategy::{resolve_or_sentinel, Field, Heuristics, Strategy};
use super::DetailRecord;
use crate::diagnostics::DiagnosticSink;

use super::strategy::SignalSource::*;

/// How much of a detail page the diagnostic dump keeps.
const DUMP_BYTES: usize = 30_000;
/// Last-resort year scan only looks at the top of the page.
const YEAR_HEAD_BYTES: usize = 5_000;

static TITLE_SCHEMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"@type":"Movie".*?"name":"([^"]+)""#).unwrap());

static YEAR_IN_DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());
static YEAR_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:dateCreated|release)["']?\s*:\s*["']?(?:[^"']*?)(\d{4})"#).unwrap()
});
static YEAR_RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:release|released|year)[^<>\d]{1,20}((?:19|20)\d{2})").unwrap()
});
static YEAR_FILM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:movie|film)[^<>\d]{1,30}((?:19|20)\d{2})").unwrap());
static YEAR_ANY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"((?:19|20)\d{2})").unwrap());

static CRITIC_SCHEMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"aggregateRating".*?"ratingValue":"?(\d+)"?"#).unwrap()
});
// `\b` keeps "audienceScore" from being read as a critic score.
static CRITIC_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:tomatometer\w*|score)["']?\s*:\s*["']?(\d+)"#).unwrap()
});
static CRITIC_PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:critic|tomatometer).*?(\d{1,3})%").unwrap());

static AUDIENCE_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""audience[sS]core":\s*"?(\d+)"?"#).unwrap());
static AUDIENCE_MARKUP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)popcornmeter[^>]*>(\d+)%",
        r"(?i)popcornscore[^>]*>(\d+)%",
        r"(?i)audience-score[^>]*>(\d+)%",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static AUDIENCE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)audiencescore["']?\s*:\s*["']?(\d+)"#).unwrap()
});
static AUDIENCE_PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)audience[^%<>]*?(\d{1,3})%").unwrap());

static REVIEW_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""reviewBody":\s*"([^"]{20,})""#).unwrap());
static CONSENSUS_P_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)<p\s+class="[^"]*critic_consensus[^"]*"[^>]*>(.*?)</p>"#,
        r#"(?is)<p\s+class="consensus"[^>]*>(.*?)</p>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static CONSENSUS_SPAN_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)<span\s+data-qa="critics-consensus"[^>]*>(.*?)</span>"#,
        r#"(?is)data-qa="critics-consensus"[^>]*>(.*?)</span>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static CONSENSUS_DIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\s+class="[^"]*consensus[^"]*"[^>]*>(.*?)</div>"#).unwrap()
});
static CONSENSUS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Critics\s+Consensus:\s*(.*?)(?:</p>|</div>|<br|$)").unwrap()
});
static CONSENSUS_BARE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Consensus:\s*(.*?)(?:</p>|</div>|<br|$)").unwrap()
});

// ── Chains ──

pub const TITLE_CHAIN: &[Strategy<Document>] = &[
    Strategy { id: "title_og_meta", source: StructuredMetadata, extract: title_og_meta },
    Strategy { id: "title_json_ld", source: SchemaMarkup, extract: title_json_ld },
    Strategy { id: "title_schema_scan", source: SchemaMarkup, extract: title_schema_scan },
    Strategy { id: "title_tag", source: DedicatedSelector, extract: title_tag },
];

pub const YEAR_CHAIN: &[Strategy<Document>] = &[
    Strategy { id: "year_json_ld", source: SchemaMarkup, extract: year_json_ld },
    Strategy { id: "year_date_key", source: AttributeScrape, extract: year_date_key },
    Strategy { id: "year_release_keyword", source: KeywordHeuristic, extract: year_release_keyword },
    Strategy { id: "year_film_keyword", source: KeywordHeuristic, extract: year_film_keyword },
    Strategy { id: "year_page_head", source: KeywordHeuristic, extract: year_page_head },
];

pub const CRITIC_CHAIN: &[Strategy<Document>] = &[
    Strategy { id: "critic_json_ld", source: SchemaMarkup, extract: critic_json_ld },
    Strategy { id: "critic_schema_scan", source: SchemaMarkup, extract: critic_schema_scan },
    Strategy { id: "critic_data_qa", source: DedicatedSelector, extract: critic_data_qa },
    Strategy { id: "critic_scoreboard_attr", source: AttributeScrape, extract: critic_scoreboard_attr },
    Strategy { id: "critic_score_key", source: AttributeScrape, extract: critic_score_key },
    Strategy { id: "critic_percent_keyword", source: KeywordHeuristic, extract: critic_percent_keyword },
];

pub const AUDIENCE_CHAIN: &[Strategy<Document>] = &[
    Strategy { id: "audience_json_key", source: StructuredMetadata, extract: audience_json_key },
    Strategy { id: "audience_data_qa", source: DedicatedSelector, extract: audience_data_qa },
    Strategy { id: "audience_score_class", source: DedicatedSelector, extract: audience_score_class },
    Strategy { id: "audience_scoreboard_attr", source: AttributeScrape, extract: audience_scoreboard_attr },
    Strategy { id: "audience_popcorn_markup", source: AttributeScrape, extract: audience_popcorn_markup },
    Strategy { id: "audience_score_key", source: AttributeScrape, extract: audience_score_key },
    Strategy { id: "audience_percent_keyword", source: KeywordHeuristic, extract: audience_percent_keyword },
];

pub const CONSENSUS_CHAIN: &[Strategy<Document>] = &[
    Strategy { id: "consensus_data_qa", source: DedicatedSelector, extract: |d, _| selector_text(d, r#"[data-qa="critics-consensus"]"#) },
    Strategy { id: "consensus_criticsconsensus", source: DedicatedSelector, extract: |d, _| selector_text(d, ".criticsconsensus") },
    Strategy { id: "consensus_critic_consensus", source: DedicatedSelector, extract: |d, _| selector_text(d, ".critic_consensus") },
    Strategy { id: "consensus_what_to_know", source: DedicatedSelector, extract: |d, _| selector_text(d, ".what-to-know__consensus") },
    Strategy { id: "consensus_class", source: DedicatedSelector, extract: |d, _| selector_text(d, ".consensus") },
    Strategy { id: "consensus_p_class", source: DedicatedSelector, extract: |d, _| selector_text(d, "p.consensus") },
    Strategy { id: "consensus_review_body", source: AttributeScrape, extract: |d, _| capture(&REVIEW_BODY_RE, d.raw()) },
    Strategy { id: "consensus_p_marker", source: AttributeScrape, extract: |d, _| first_capture(&CONSENSUS_P_RES, d.raw()) },
    Strategy { id: "consensus_span_marker", source: AttributeScrape, extract: |d, _| first_capture(&CONSENSUS_SPAN_RES, d.raw()) },
    Strategy { id: "consensus_div_marker", source: AttributeScrape, extract: |d, _| capture(&CONSENSUS_DIV_RE, d.raw()) },
    Strategy { id: "consensus_label", source: KeywordHeuristic, extract: |d, _| capture(&CONSENSUS_LABEL_RE, d.raw()) },
    Strategy { id: "consensus_bare_label", source: KeywordHeuristic, extract: |d, _| capture(&CONSENSUS_BARE_LABEL_RE, d.raw()) },
    Strategy { id: "consensus_paragraph_scan", source: KeywordHeuristic, extract: consensus_paragraph_scan },
];

pub fn chain_for(field: Field) -> &'static [Strategy<Document>] {
    match field {
        Field::Title => TITLE_CHAIN,
        Field::Year => YEAR_CHAIN,
        Field::CriticScore => CRITIC_CHAIN,
        Field::AudienceScore => AUDIENCE_CHAIN,
        Field::Consensus => CONSENSUS_CHAIN,
        Field::Link => &[],
    }
}

/// Resolve every detail field. Never fails: unresolved fields carry their sentinel.
pub fn build_detail_record(
    doc: &Document,
    source_url: &str,
    heuristics: &Heuristics,
    sink: &mut dyn DiagnosticSink,
) -> DetailRecord {
    sink.artifact("detail.html", doc.head(DUMP_BYTES));

    let mut field = |f: Field| resolve_or_sentinel(f, chain_for(f), doc, heuristics, &mut *sink);
    let record = DetailRecord {
        title: field(Field::Title),
        year: field(Field::Year),
        critic_score: field(Field::CriticScore),
        audience_score: field(Field::AudienceScore),
        consensus: field(Field::Consensus),
        source_url: source_url.to_string(),
    };

    if let Ok(json) = serde_json::to_string_pretty(&record) {
        sink.artifact("detail_record.json", &json);
    }
    record
}

// ── Helpers ──

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}

fn first_capture(res: &[Regex], text: &str) -> Option<String> {
    res.iter().find_map(|re| capture(re, text))
}

fn selector_text(doc: &Document, css: &str) -> Option<String> {
    doc.first(css).map(text_of)
}

fn before_pipe(s: &str) -> String {
    s.split('|').next().unwrap_or_default().trim().to_string()
}

fn strip_percent(s: String) -> String {
    s.trim().trim_end_matches('%').trim().to_string()
}

fn json_scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_movie(v: &Value) -> bool {
    match v.get("@type") {
        Some(Value::String(t)) => t == "Movie",
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some("Movie")),
        _ => false,
    }
}

fn find_movie(v: &Value) -> Option<&Value> {
    match v {
        Value::Array(items) => items.iter().find_map(find_movie),
        Value::Object(_) if is_movie(v) => Some(v),
        Value::Object(obj) => obj.get("@graph").and_then(find_movie),
        _ => None,
    }
}

/// The first JSON-LD block describing a `Movie`.
fn json_ld_movie(doc: &Document) -> Option<Value> {
    doc.select(r#"script[type="application/ld+json"]"#)
        .into_iter()
        .filter_map(|script| serde_json::from_str::<Value>(text_of(script).trim()).ok())
        .find_map(|v| find_movie(&v).cloned())
}

// ── Title ──

fn title_og_meta(doc: &Document, _: &Heuristics) -> Option<String> {
    let meta = doc.first(r#"meta[property="og:title"]"#)?;
    attr_of(meta, "content").map(before_pipe)
}

fn title_json_ld(doc: &Document, _: &Heuristics) -> Option<String> {
    json_ld_movie(doc)?.get("name").and_then(json_scalar)
}

fn title_schema_scan(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&TITLE_SCHEMA_RE, doc.raw())
}

fn title_tag(doc: &Document, _: &Heuristics) -> Option<String> {
    doc.first("title").map(|t| before_pipe(&text_of(t)))
}

// ── Year ──

fn year_json_ld(doc: &Document, _: &Heuristics) -> Option<String> {
    let movie = json_ld_movie(doc)?;
    ["dateCreated", "datePublished"]
        .iter()
        .filter_map(|k| movie.get(*k).and_then(json_scalar))
        .find_map(|date| capture(&YEAR_IN_DATE_RE, &date))
}

fn year_date_key(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&YEAR_KEY_RE, doc.raw())
}

fn year_release_keyword(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&YEAR_RELEASE_RE, doc.raw())
}

fn year_film_keyword(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&YEAR_FILM_RE, doc.raw())
}

fn year_page_head(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&YEAR_ANY_RE, doc.head(YEAR_HEAD_BYTES))
}

// ── Critic score ──

fn critic_json_ld(doc: &Document, _: &Heuristics) -> Option<String> {
    json_ld_movie(doc)?
        .get("aggregateRating")?
        .get("ratingValue")
        .and_then(json_scalar)
}

fn critic_schema_scan(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&CRITIC_SCHEMA_RE, doc.raw())
}

fn critic_data_qa(doc: &Document, _: &Heuristics) -> Option<String> {
    selector_text(doc, r#"[data-qa="tomatometer"]"#).map(strip_percent)
}

fn critic_scoreboard_attr(doc: &Document, _: &Heuristics) -> Option<String> {
    let board = doc.first("score-board")?;
    attr_of(board, "tomatometerscore").map(str::to_string)
}

fn critic_score_key(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&CRITIC_KEY_RE, doc.raw())
}

fn critic_percent_keyword(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&CRITIC_PERCENT_RE, doc.raw())
}

// ── Audience score ──

fn audience_json_key(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&AUDIENCE_JSON_RE, doc.raw())
}

fn audience_data_qa(doc: &Document, _: &Heuristics) -> Option<String> {
    selector_text(doc, r#"[data-qa="audience-score"]"#).map(strip_percent)
}

fn audience_score_class(doc: &Document, _: &Heuristics) -> Option<String> {
    selector_text(doc, ".audience-score").map(strip_percent)
}

fn audience_scoreboard_attr(doc: &Document, _: &Heuristics) -> Option<String> {
    let board = doc.first("score-board")?;
    attr_of(board, "audiencescore").map(str::to_string)
}

fn audience_popcorn_markup(doc: &Document, _: &Heuristics) -> Option<String> {
    first_capture(&AUDIENCE_MARKUP_RES, doc.raw())
}

fn audience_score_key(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&AUDIENCE_KEY_RE, doc.raw())
}

fn audience_percent_keyword(doc: &Document, _: &Heuristics) -> Option<String> {
    capture(&AUDIENCE_PERCENT_RE, doc.raw())
}

// ── Consensus ──

/// Last resort: the first paragraph that reads like critical commentary.
fn consensus_paragraph_scan(doc: &Document, heuristics: &Heuristics) -> Option<String> {
    doc.select("p")
        .into_iter()
        .map(|p| normalize(&text_of(p)))
        .find(|text| heuristics.looks_like_consensus(text))
}
