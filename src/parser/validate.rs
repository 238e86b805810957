use chrono::Datelike;
use url::Url;

use super::strategy::Field;

/// First year of commercial film exhibition; nothing older is a release year.
pub const EARLIEST_YEAR: i32 = 1888;
/// Pre-release listings may carry a year slightly in the future.
pub const FUTURE_YEARS: i32 = 2;

const CONSENSUS_MIN_CHARS: usize = 20;
const CONSENSUS_MAX_CHARS: usize = 1000;

/// Leftover markup that means a consensus candidate scraped attribute soup.
const MARKUP_INDICATORS: &[&str] = &["class=", "=\"", "<", ">"];

/// Acceptance gate between "a strategy matched" and "the field is resolved".
pub fn validate(field: Field, candidate: &str) -> bool {
    validate_at(field, candidate, chrono::Local::now().year())
}

pub fn validate_at(field: Field, candidate: &str, current_year: i32) -> bool {
    match field {
        Field::Title => !candidate.trim().is_empty(),
        Field::Year => is_year(candidate, current_year),
        Field::CriticScore | Field::AudienceScore => is_score(candidate),
        Field::Consensus => is_consensus(candidate),
        Field::Link => is_absolute_link(candidate),
    }
}

fn is_year(candidate: &str, current_year: i32) -> bool {
    if candidate.len() != 4 || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    candidate
        .parse::<i32>()
        .map(|y| (EARLIEST_YEAR..=current_year + FUTURE_YEARS).contains(&y))
        .unwrap_or(false)
}

fn is_score(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.len() > 3 || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    candidate.parse::<u8>().map(|s| s <= 100).unwrap_or(false)
}

fn is_consensus(candidate: &str) -> bool {
    let chars = candidate.chars().count();
    chars > CONSENSUS_MIN_CHARS
        && chars < CONSENSUS_MAX_CHARS
        && !MARKUP_INDICATORS.iter().any(|m| candidate.contains(m))
}

fn is_absolute_link(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_bounds() {
        assert!(validate_at(Field::Year, "1888", 2026));
        assert!(validate_at(Field::Year, "2028", 2026));
        assert!(!validate_at(Field::Year, "2029", 2026));
        assert!(!validate_at(Field::Year, "1887", 2026));
        assert!(!validate_at(Field::Year, "201", 2026));
        assert!(!validate_at(Field::Year, "20100", 2026));
        assert!(!validate_at(Field::Year, "+201", 2026));
        assert!(!validate_at(Field::Year, "", 2026));
    }

    #[test]
    fn score_bounds() {
        assert!(validate(Field::CriticScore, "0"));
        assert!(validate(Field::CriticScore, "91"));
        assert!(validate(Field::AudienceScore, "100"));
        assert!(!validate(Field::AudienceScore, "101"));
        assert!(!validate(Field::AudienceScore, "-1"));
        assert!(!validate(Field::CriticScore, "9 1"));
        assert!(!validate(Field::CriticScore, "91%"));
        assert!(!validate(Field::CriticScore, ""));
    }

    #[test]
    fn title_non_empty() {
        assert!(validate(Field::Title, "Inception"));
        assert!(!validate(Field::Title, ""));
        assert!(!validate(Field::Title, "   "));
    }

    #[test]
    fn consensus_length_and_markup() {
        assert!(validate(Field::Consensus, "Smart, innovative, and thrilling."));
        assert!(!validate(Field::Consensus, "Too short to count."));
        assert!(!validate(Field::Consensus, &"a".repeat(1000)));
        assert!(!validate(
            Field::Consensus,
            "span class=\"consensus\" Smart, innovative, and thrilling"
        ));
        assert!(!validate(Field::Consensus, "Smart, innovative <em and thrilling"));
    }

    #[test]
    fn link_must_be_absolute() {
        assert!(validate(Field::Link, "https://www.rottentomatoes.com/m/inception"));
        assert!(!validate(Field::Link, "/m/inception"));
        assert!(!validate(Field::Link, "javascript:void(0)"));
    }
}
