use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::normalize::normalize;
use super::validate::validate;
use crate::diagnostics::{DiagnosticSink, Outcome, TraceEvent};

static CONSENSUS_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^critics\s+consensus:?\s*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Year,
    CriticScore,
    AudienceScore,
    Consensus,
    /// Detail-page link of a listing item.
    Link,
}

impl Field {
    /// Placeholder recorded when the chain is exhausted.
    pub fn sentinel(self) -> &'static str {
        match self {
            Field::Title => "Unknown Title",
            Field::Consensus => "No consensus yet.",
            Field::Year | Field::CriticScore | Field::AudienceScore | Field::Link => "N/A",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Year => "year",
            Field::CriticScore => "critic_score",
            Field::AudienceScore => "audience_score",
            Field::Consensus => "consensus",
            Field::Link => "link",
        }
    }

    /// Raw match → candidate. The consensus label is dropped here so the
    /// validator sees exactly what would be returned.
    pub fn prepare(self, raw: &str) -> String {
        let text = normalize(raw);
        match self {
            Field::Consensus => CONSENSUS_PREFIX_RE.replace(&text, "").trim().to_string(),
            _ => text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a strategy reads its signal from, most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    StructuredMetadata,
    SchemaMarkup,
    DedicatedSelector,
    AttributeScrape,
    KeywordHeuristic,
}

impl SignalSource {
    pub fn name(self) -> &'static str {
        match self {
            SignalSource::StructuredMetadata => "structured_metadata",
            SignalSource::SchemaMarkup => "schema_markup",
            SignalSource::DedicatedSelector => "dedicated_selector",
            SignalSource::AttributeScrape => "attribute_scrape",
            SignalSource::KeywordHeuristic => "keyword_heuristic",
        }
    }
}

/// Tunable data for the free-text heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    /// A consensus paragraph must mention one of these.
    pub positive_keywords: Vec<String>,
    /// ...and none of these, which mark plot synopses.
    pub negative_keywords: Vec<String>,
    pub paragraph_min_chars: usize,
    pub paragraph_max_chars: usize,
}

impl Default for Heuristics {
    fn default() -> Self {
        Heuristics {
            positive_keywords: ["director", "cinematic", "visually", "narrative", "performance", "ambitious"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            negative_keywords: ["subconscious", "mission"].iter().map(|s| s.to_string()).collect(),
            paragraph_min_chars: 30,
            paragraph_max_chars: 500,
        }
    }
}

impl Heuristics {
    /// True when `text` reads like critical commentary rather than a synopsis.
    pub fn looks_like_consensus(&self, text: &str) -> bool {
        let chars = text.chars().count();
        if chars <= self.paragraph_min_chars || chars >= self.paragraph_max_chars {
            return false;
        }
        let lower = text.to_lowercase();
        let has = |words: &[String]| words.iter().any(|w| !w.is_empty() && lower.contains(&w.to_lowercase()));
        has(&self.positive_keywords) && !has(&self.negative_keywords)
    }
}

/// One extraction attempt over an input of type `T` (a whole document, or a
/// single listing container).
pub struct Strategy<T: ?Sized> {
    pub id: &'static str,
    pub source: SignalSource,
    pub extract: fn(&T, &Heuristics) -> Option<String>,
}

impl<T: ?Sized> Clone for Strategy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Strategy<T> {}

impl<T: ?Sized> fmt::Debug for Strategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish()
    }
}

/// Try `chain` in order; the first candidate the validator accepts wins.
/// Rejected candidates are dropped and never merged with later ones.
/// `None` means the chain was exhausted and the caller records the sentinel.
pub fn resolve<T: ?Sized>(
    field: Field,
    chain: &[Strategy<T>],
    input: &T,
    heuristics: &Heuristics,
    sink: &mut dyn DiagnosticSink,
) -> Option<String> {
    for strategy in chain {
        let outcome = match (strategy.extract)(input, heuristics) {
            None => Outcome::NoMatch,
            Some(raw) => {
                let candidate = field.prepare(&raw);
                if validate(field, &candidate) {
                    Outcome::Accepted(candidate)
                } else {
                    Outcome::Rejected(candidate)
                }
            }
        };

        debug!(
            field = field.name(),
            strategy = strategy.id,
            source = strategy.source.name(),
            outcome = %outcome,
            "strategy attempt"
        );
        sink.record(TraceEvent {
            field,
            strategy: strategy.id,
            source: strategy.source,
            outcome: outcome.clone(),
        });

        if let Outcome::Accepted(value) = outcome {
            return Some(value);
        }
    }
    None
}

/// Same as [`resolve`], with the sentinel filled in.
pub fn resolve_or_sentinel<T: ?Sized>(
    field: Field,
    chain: &[Strategy<T>],
    input: &T,
    heuristics: &Heuristics,
    sink: &mut dyn DiagnosticSink,
) -> String {
    resolve(field, chain, input, heuristics, sink).unwrap_or_else(|| field.sentinel().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, NullSink};
    use crate::parser::validate::validate;
    use proptest::strategy::{Just, Strategy as _};
    use proptest::{prop_assert, prop_oneof, proptest};

    type Outputs = Vec<Option<String>>;

    fn slot(outputs: &Outputs, i: usize) -> Option<String> {
        outputs.get(i).cloned().flatten()
    }

    const FUZZ_CHAIN: &[Strategy<Outputs>] = &[
        Strategy { id: "s0", source: SignalSource::StructuredMetadata, extract: |o, _| slot(o, 0) },
        Strategy { id: "s1", source: SignalSource::SchemaMarkup, extract: |o, _| slot(o, 1) },
        Strategy { id: "s2", source: SignalSource::DedicatedSelector, extract: |o, _| slot(o, 2) },
        Strategy { id: "s3", source: SignalSource::AttributeScrape, extract: |o, _| slot(o, 3) },
        Strategy { id: "s4", source: SignalSource::KeywordHeuristic, extract: |o, _| slot(o, 4) },
    ];

    const FIELDS: &[Field] = &[
        Field::Title,
        Field::Year,
        Field::CriticScore,
        Field::AudienceScore,
        Field::Consensus,
        Field::Link,
    ];

    fn noisy_output() -> impl proptest::strategy::Strategy<Value = Option<String>> {
        proptest::option::of(prop_oneof![
            "[0-9]{1,5}",
            "(19|20)[0-9]{2}",
            "<span class=\"x\">[a-z ]{0,40}</span>",
            "Critics Consensus: [A-Za-z ,.]{0,60}",
            ".{0,80}",
            Just("https://www.rottentomatoes.com/m/x".to_string()),
            Just("/m/relative_2010".to_string()),
        ])
    }

    proptest! {
        #[test]
        fn never_returns_invalid(
            outputs in proptest::collection::vec(noisy_output(), 5),
            field_idx in 0..FIELDS.len(),
        ) {
            let field = FIELDS[field_idx];
            match resolve(field, FUZZ_CHAIN, &outputs, &Heuristics::default(), &mut NullSink) {
                Some(value) => prop_assert!(validate(field, &value), "{} accepted {:?}", field, value),
                None => {}
            }
        }
    }

    #[test]
    fn first_valid_wins() {
        let outputs: Outputs = vec![None, Some("abc".into()), Some("91".into()), Some("42".into()), None];
        let mut sink = MemorySink::default();
        let got = resolve(Field::CriticScore, FUZZ_CHAIN, &outputs, &Heuristics::default(), &mut sink);
        assert_eq!(got.as_deref(), Some("91"));
        let outcomes: Vec<_> = sink.events.iter().map(|e| (e.strategy, e.outcome.clone())).collect();
        assert_eq!(
            outcomes,
            vec![
                ("s0", Outcome::NoMatch),
                ("s1", Outcome::Rejected("abc".into())),
                ("s2", Outcome::Accepted("91".into())),
            ]
        );
    }

    #[test]
    fn exhausted_chain_gives_sentinel() {
        let outputs: Outputs = vec![Some("999".into()), None, None, None, Some("x".into())];
        let got = resolve_or_sentinel(Field::AudienceScore, FUZZ_CHAIN, &outputs, &Heuristics::default(), &mut NullSink);
        assert_eq!(got, "N/A");
        let got = resolve_or_sentinel(Field::Consensus, FUZZ_CHAIN, &outputs, &Heuristics::default(), &mut NullSink);
        assert_eq!(got, "No consensus yet.");
    }

    #[test]
    fn consensus_prefix_stripped_before_validation() {
        let outputs: Outputs = vec![
            Some("Critics Consensus: Too short".into()),
            Some("critics consensus &nbsp;Inventive, <b>thrilling</b> and smart.".into()),
        ];
        let got = resolve(Field::Consensus, FUZZ_CHAIN, &outputs, &Heuristics::default(), &mut NullSink);
        assert_eq!(got.as_deref(), Some("Inventive, thrilling and smart."));
    }

    #[test]
    fn consensus_heuristic_negative_gate() {
        let h = Heuristics::default();
        assert!(h.looks_like_consensus("A towering performance anchors this sprawling, humane drama."));
        assert!(!h.looks_like_consensus(
            "A thief takes on one final mission, and his performance of it goes badly wrong."
        ));
        assert!(!h.looks_like_consensus("Great performance."));
    }

    #[test]
    fn keyword_sets_are_data() {
        let h = Heuristics {
            positive_keywords: vec!["heist".into()],
            negative_keywords: vec![],
            ..Heuristics::default()
        };
        assert!(h.looks_like_consensus("A slick heist picture that never lets up for a second."));
        assert!(!h.looks_like_consensus("A towering performance anchors this sprawling, humane drama."));
    }
}
