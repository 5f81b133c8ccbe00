// src/matching/normalize.rs
use once_cell::sync::Lazy;
use regex::Regex;

static NON_ADDRESS_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s#]").unwrap());

// Directional prefix of the street name, optionally preceded by the house
// number: "123 North Main" / "N Main". Requires a following token so a bare
// single-token string is never eaten.
static LEADING_DIRECTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\d+[a-z]?\s+)?)(?:north|south|east|west|n|s|e|w)\s+").unwrap()
});

static STREET_SYNONYMS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("street", "st"),
        ("avenue", "ave"),
        ("road", "rd"),
        ("drive", "dr"),
        ("lane", "ln"),
        ("boulevard", "blvd"),
        ("court", "ct"),
        ("circle", "cir"),
        ("parkway", "pkwy"),
        ("place", "pl"),
        ("square", "sq"),
        ("terrace", "ter"),
        ("trail", "trl"),
    ]
    .iter()
    .map(|(word, abbr)| (Regex::new(&format!(r"\b{}\b", word)).unwrap(), *abbr))
    .collect()
});

static UNIT_DESIGNATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:apt|apartment|suite|ste|unit|bldg|building|dept|department|room|rm)\s*#?\s*[\w]+")
        .unwrap()
});

static HASH_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\s*[\w]+").unwrap());

static FLOOR_INDICATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:st|nd|rd|th)?\s*(?:floor|fl)\b").unwrap());

// House-number ordinal only: anchored at the start and followed by more
// tokens, so a re-normalized single-token key is left alone.
static HOUSE_NUMBER_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:st|nd|rd|th)\s+").unwrap());

/// Canonicalizes a free-text address into a whitespace-free comparison key.
///
/// Deliberately aggressive: abbreviation folding, directional stripping, and
/// unit removal trade some false-positive risk for recall against the
/// formatting noise real uploads carry. Idempotent.
pub fn normalize_address(address: &str) -> String {
    // 1. Case and whitespace folding.
    let lower = address.to_lowercase();
    let mut normalized = lower.split_whitespace().collect::<Vec<_>>().join(" ");

    // 2. Drop punctuation. '#' survives until unit stripping below.
    normalized = NON_ADDRESS_CHARS.replace_all(&normalized, "").into_owned();
    normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    // 3. Leading directional token.
    normalized = LEADING_DIRECTIONAL.replace(&normalized, "$1").into_owned();

    // 4. Street-type synonyms to canonical abbreviations.
    for (pattern, abbreviation) in STREET_SYNONYMS.iter() {
        normalized = pattern.replace_all(&normalized, *abbreviation).into_owned();
    }

    // 5. Unit designators and trailing floor indicators.
    normalized = UNIT_DESIGNATOR.replace_all(&normalized, "").into_owned();
    normalized = HASH_UNIT.replace_all(&normalized, "").into_owned();
    normalized = FLOOR_INDICATOR.replace_all(&normalized, "").into_owned();

    // 6. Ordinal suffix on the house number.
    normalized = HOUSE_NUMBER_ORDINAL.replace(&normalized, "$1 ").into_owned();

    // 7. The final key carries no whitespace at all.
    normalized.split_whitespace().collect::<Vec<_>>().concat()
}
