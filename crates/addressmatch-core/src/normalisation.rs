//! Text normalisation for restaurant names and addresses
//!
//! Every function here is total: malformed input comes back cleaned as far
//! as possible, and a missing postcode is reported as `None`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::record::{RawRow, Record};

lazy_static! {
    /// UK-style postcode: `GIR 0AA`, or area + district + optional space + sector + unit
    ///
    /// ASCII only, so Unicode digits and case folds like the Kelvin sign
    /// never count as postcode characters.
    static ref POSTCODE_REGEX: Regex =
        Regex::new(r"(?i-u)\b(GIR\s?0AA|[A-Z]{1,2}[0-9][A-Z0-9]?\s?[0-9][A-Z]{2})\b").unwrap();

    static ref ABBREVIATION_REGEX: Regex =
        Regex::new(r"\b(st|rd|ave|dr|pl|ln|sq|terr)\b").unwrap();
}

/// Street abbreviations expanded in normalised addresses
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("rd", "road"),
    ("ave", "avenue"),
    ("dr", "drive"),
    ("pl", "place"),
    ("ln", "lane"),
    ("sq", "square"),
    ("terr", "terrace"),
];

/// An address with its postcode pulled out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAddress {
    /// Uppercased address text with the postcode removed
    pub address: String,
    /// Canonical postcode (`"NW1 6XE"`), if one was found
    pub postcode: Option<String>,
}

/// Normalise a restaurant name
///
/// - Trims surrounding whitespace
/// - Lowercases
/// - Collapses whitespace runs to a single space
pub fn normalise_name(name: &str) -> String {
    collapse_whitespace(&name.trim().to_lowercase())
}

/// Split a raw address into the address text and its postcode
///
/// The first postcode-shaped token becomes the postcode; every
/// postcode-shaped token is removed from the address text. Anything that
/// does not match the grammar stays in the address, uppercased.
pub fn split_address(address: &str) -> SplitAddress {
    let cleaned = collapse_whitespace(&address.to_uppercase());

    match POSTCODE_REGEX.find(&cleaned) {
        Some(found) => {
            let postcode = canonical_postcode(found.as_str());
            let remainder = POSTCODE_REGEX.replace_all(&cleaned, "");
            SplitAddress {
                address: collapse_whitespace(&remainder),
                postcode: Some(postcode),
            }
        }
        None => SplitAddress {
            address: cleaned,
            postcode: None,
        },
    }
}

/// Normalise an address (without its postcode)
///
/// Punctuation is dropped before whitespace is collapsed, since removing
/// it can leave new runs of spaces behind.
pub fn normalise_address(address: &str) -> String {
    let without_punctuation: String = address
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    collapse_whitespace(&without_punctuation.to_lowercase())
}

/// Expand whole-word street abbreviations (`st` -> `street`)
///
/// Expects an already-normalised (lowercase) address.
pub fn expand_abbreviations(address: &str) -> String {
    ABBREVIATION_REGEX
        .replace_all(address, |caps: &Captures| {
            let short = &caps[1];
            ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == short)
                .map(|(_, full)| (*full).to_string())
                .unwrap_or_else(|| short.to_string())
        })
        .into_owned()
}

/// The outcode (leading token) of a postcode
pub fn outcode(postcode: &str) -> Option<&str> {
    postcode.split_whitespace().next()
}

/// Run the full clean transformation over one raw row
pub fn normalise_row(row: &RawRow) -> Record {
    let split = split_address(&row.address);
    let address = expand_abbreviations(&normalise_address(&split.address));

    Record::new(
        row.record_id(),
        normalise_name(&row.name),
        address,
        split.postcode,
    )
}

/// Force a single space before the final three characters of a postcode
fn canonical_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    match compact.char_indices().rev().nth(2) {
        Some((idx, _)) if idx > 0 => format!("{} {}", &compact[..idx], &compact[idx..]),
        _ => compact,
    }
}

/// Collapse whitespace runs to single spaces and trim the ends
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_name() {
        assert_eq!(normalise_name("  The  Golden\tDragon "), "the golden dragon");
        assert_eq!(normalise_name(""), "");
        assert_eq!(normalise_name("   "), "");
    }

    #[test]
    fn test_split_address_with_spaced_postcode() {
        let split = split_address("221B Baker Street, NW1 6XE");
        assert_eq!(split.postcode.as_deref(), Some("NW1 6XE"));
        assert_eq!(split.address, "221B BAKER STREET,");
    }

    #[test]
    fn test_split_address_with_compact_postcode() {
        let split = split_address("221b baker st nw16xe");
        assert_eq!(split.postcode.as_deref(), Some("NW1 6XE"));
        assert_eq!(split.address, "221B BAKER ST");
    }

    #[test]
    fn test_split_address_gir() {
        let split = split_address("Girobank, Bootle GIR0AA");
        assert_eq!(split.postcode.as_deref(), Some("GIR 0AA"));
        assert_eq!(split.address, "GIROBANK, BOOTLE");
    }

    #[test]
    fn test_split_address_without_postcode() {
        let split = split_address("  12   market   square ");
        assert_eq!(split.postcode, None);
        assert_eq!(split.address, "12 MARKET SQUARE");
    }

    #[test]
    fn test_split_address_keeps_first_postcode_and_strips_all() {
        let split = split_address("1 High St E1 6AN, formerly SW1A 1AA");
        assert_eq!(split.postcode.as_deref(), Some("E1 6AN"));
        assert_eq!(split.address, "1 HIGH ST , FORMERLY");
    }

    #[test]
    fn test_split_address_ignores_non_ascii_digits() {
        // Arabic-Indic six in the sector position
        let split = split_address("1 High St NW1 \u{0666}XE");
        assert_eq!(split.postcode, None);
        assert_eq!(split.address, "1 HIGH ST NW1 \u{0666}XE");
    }

    #[test]
    fn test_split_address_ignores_unicode_case_folds() {
        // The Kelvin sign folds to K in Unicode mode
        let split = split_address("2 Mill Lane \u{212A}W1 6XE");
        assert_eq!(split.postcode, None);
        assert_eq!(split.address, "2 MILL LANE \u{212A}W1 6XE");
    }

    #[test]
    fn test_canonical_postcode_splits_on_char_boundary() {
        assert_eq!(canonical_postcode("nw16xe"), "NW1 6XE");
        assert_eq!(canonical_postcode("AB\u{00C9}CD"), "AB \u{00C9}CD");
        assert_eq!(canonical_postcode("\u{00E9}AB"), "\u{00C9}AB");
        assert_eq!(canonical_postcode("XE"), "XE");
    }

    #[test]
    fn test_split_address_postcode_inside_word_is_ignored() {
        let split = split_address("UNITNW16XEB");
        assert_eq!(split.postcode, None);
        assert_eq!(split.address, "UNITNW16XEB");
    }

    #[test]
    fn test_normalise_address_drops_punctuation_before_collapsing() {
        assert_eq!(normalise_address("12 , Market - Square!"), "12 market square");
        assert_eq!(normalise_address("Flat_2, O'Neill's Yard"), "flat_2 oneills yard");
    }

    #[test]
    fn test_expand_abbreviations() {
        assert_eq!(expand_abbreviations("221b baker st"), "221b baker street");
        assert_eq!(expand_abbreviations("1 mill rd"), "1 mill road");
        assert_eq!(expand_abbreviations("5 park terr"), "5 park terrace");
        // Whole words only
        assert_eq!(expand_abbreviations("3 stanley drive"), "3 stanley drive");
        assert_eq!(expand_abbreviations("221b baker street"), "221b baker street");
    }

    #[test]
    fn test_outcode() {
        assert_eq!(outcode("NW1 6XE"), Some("NW1"));
        assert_eq!(outcode(""), None);
    }

    #[test]
    fn test_normalise_row() {
        let row = RawRow {
            position: 0,
            name: " Baker  Street Cafe".to_string(),
            address: "221b baker st nw16xe".to_string(),
            fields: vec![
                " Baker  Street Cafe".to_string(),
                "221b baker st nw16xe".to_string(),
            ],
        };
        let record = normalise_row(&row);

        assert_eq!(record.id, row.record_id());
        assert_eq!(record.name, "baker street cafe");
        assert_eq!(record.address, "221b baker street");
        assert_eq!(record.postcode.as_deref(), Some("NW1 6XE"));
        assert_eq!(record.outcode.as_deref(), Some("NW1"));
    }
}
