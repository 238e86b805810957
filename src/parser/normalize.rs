use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

/// Named entities seen in the wild on the source pages. Extend here.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", " "),
    ("quot", "\""),
    ("amp", "&"),
    ("apos", "'"),
    ("lt", "<"),
    ("gt", ">"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("rsquo", "\u{2019}"),
    ("lsquo", "\u{2018}"),
    ("rdquo", "\u{201d}"),
    ("ldquo", "\u{201c}"),
];

/// Strip tag fragments, decode entities and collapse whitespace.
///
/// Idempotent: entities are decoded to a fixed point before tags are removed, and
/// tag removal only ever inserts spaces, so a second pass finds nothing to do.
pub fn normalize(text: &str) -> String {
    let decoded = decode_entities(text);
    let untagged = TAG_RE.replace_all(&decoded, " ");
    WS_RE.replace_all(&untagged, " ").trim().to_string()
}

/// Decode entities repeatedly until the text stops changing (`&amp;quot;` → `"`).
/// Every successful decode shortens the string, so the loop terminates.
pub fn decode_entities(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = ENTITY_RE
            .replace_all(&current, |caps: &Captures| {
                decode_one(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn decode_one(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        if code == 0 {
            return None;
        }
        return char::from_u32(code).map(|c| c.to_string());
    }
    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == body)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn baseline_entities() {
        assert_eq!(
            normalize("Tom&nbsp;&amp;&nbsp;Jerry&#39;s &quot;best&quot;"),
            "Tom & Jerry's \"best\""
        );
    }

    #[test]
    fn strips_tags_and_collapses() {
        assert_eq!(normalize("  <p class=\"x\">Hello\n\n <b>world</b></p> "), "Hello world");
    }

    #[test]
    fn double_encoded() {
        assert_eq!(normalize("&amp;amp;quot;"), "\"");
        assert_eq!(normalize("&lt;em&gt;bold&lt;/em&gt;"), "bold");
    }

    #[test]
    fn numeric_and_unknown() {
        assert_eq!(normalize("caf&#233; &#x41;"), "café A");
        assert_eq!(normalize("&bogus; &#0;"), "&bogus; &#0;");
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }

    proptest! {
        #[test]
        fn idempotent(s in ".{0,200}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn idempotent_on_markup(s in "[a-z <>&;#/=\"'0-9]{0,120}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn removes_baseline_entities(
            parts in proptest::collection::vec(
                prop_oneof![
                    Just("&nbsp;".to_string()),
                    Just("&quot;".to_string()),
                    Just("&amp;".to_string()),
                    Just("&#39;".to_string()),
                    "[a-z ]{0,6}",
                ],
                0..20,
            )
        ) {
            let out = normalize(&parts.concat());
            for entity in ["&nbsp;", "&quot;", "&amp;", "&#39;"] {
                prop_assert!(!out.contains(entity), "{:?} still contains {}", out, entity);
            }
        }
    }
}
