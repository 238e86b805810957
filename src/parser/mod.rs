pub mod detail;
pub mod document;
pub mod listing;
pub mod normalize;
pub mod strategy;
pub mod validate;

use serde::Serialize;
use url::Url;

use crate::diagnostics::DiagnosticSink;
use document::Document;
use strategy::Heuristics;

/// One search result: enough to pick a film and fetch its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub title: String,
    pub year: String,
    pub detail_url: String,
}

/// Everything extracted from a film's detail page. Unresolved fields hold
/// their sentinel, so every field is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRecord {
    pub title: String,
    pub year: String,
    pub critic_score: String,
    pub audience_score: String,
    pub consensus: String,
    pub source_url: String,
}

/// Both extraction pipelines bound to one site origin and heuristics set.
/// Stateless between calls; a `Document` is only ever read.
#[derive(Debug, Clone)]
pub struct Extractor {
    base: Url,
    heuristics: Heuristics,
}

impl Extractor {
    pub fn new(base: Url, heuristics: Heuristics) -> Self {
        Extractor { base, heuristics }
    }

    /// Detail page → record.
    pub fn detail(&self, doc: &Document, source_url: &str, sink: &mut dyn DiagnosticSink) -> DetailRecord {
        detail::build_detail_record(doc, source_url, &self.heuristics, sink)
    }

    /// Search/listing page → summaries, in page order.
    pub fn listing(&self, doc: &Document, sink: &mut dyn DiagnosticSink) -> Vec<SummaryRecord> {
        listing::find_items(doc, &self.base, &self.heuristics, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, NullSink};

    fn extractor() -> Extractor {
        Extractor::new(Url::parse("https://www.rottentomatoes.com").unwrap(), Heuristics::default())
    }

    #[test]
    fn same_document_same_record() {
        let html = std::fs::read_to_string("tests/fixtures/inception_detail.html").unwrap();
        let doc = Document::parse(html);
        let ex = extractor();
        let a = ex.detail(&doc, "https://www.rottentomatoes.com/m/inception", &mut NullSink);
        let b = ex.detail(&doc, "https://www.rottentomatoes.com/m/inception", &mut MemorySink::default());
        assert_eq!(a, b);
        assert_eq!(a.source_url, "https://www.rottentomatoes.com/m/inception");
    }

    #[test]
    fn fetched_on_one_thread_extracted_on_another() {
        let html = std::fs::read_to_string("tests/fixtures/inception_detail.html").unwrap();
        let ex = extractor();
        let local = ex.detail(&Document::parse(html.clone()), "u", &mut NullSink);

        let doc = Document::parse(html);
        let worker = ex.clone();
        let remote = std::thread::spawn(move || worker.detail(&doc, "u", &mut NullSink))
            .join()
            .unwrap();
        assert_eq!(local, remote);
    }

    #[test]
    fn listing_writes_artifact() {
        let html = std::fs::read_to_string("tests/fixtures/search_rows.html").unwrap();
        let mut sink = MemorySink::default();
        let results = extractor().listing(&Document::parse(html), &mut sink);
        assert_eq!(results.len(), 3);
        assert!(sink.artifacts.iter().any(|(name, body)| name == "listing.html" && body.len() <= 10_000));
    }

    #[test]
    fn record_serializes_all_fields() {
        let record = extractor().detail(&Document::parse(""), "x", &mut NullSink);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title"], "Unknown Title");
        assert_eq!(json["critic_score"], "N/A");
        assert_eq!(json["consensus"], "No consensus yet.");
    }
}
