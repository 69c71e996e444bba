//! Title normalization for catalog queries
//!
//! Spine-read titles often carry series decorations and volume markers that
//! catalogs index differently. Stripping them raises match rates when the
//! exact title finds nothing.

use once_cell::sync::Lazy;
use regex::Regex;

/// "Then & Now: Subtitle" / "Then and Now: Subtitle"
static DECORATION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*then\s*(?:&|and)\s*now\s*:\s*").expect("valid prefix pattern")
});

/// "Subtitle: Then & Now" / "Subtitle Then and Now"
static DECORATION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[:\s]*\bthen\s*(?:&|and)\s*now\s*$").expect("valid suffix pattern")
});

/// "- Part 2", "Vol. 3 of the saga", "Volume 12" and everything after
static VOLUME_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\s*-\s*)?\b(?:part|vol|volume)\.?\s*\d+.*$").expect("valid volume pattern")
});

/// Strip decorations and volume markers from a detected title
///
/// Total and idempotent: rules are applied until nothing changes, and a rule
/// pass that would erase the whole title is discarded, so the worst case is
/// the trimmed input.
pub fn normalize(raw_title: &str) -> String {
    let trimmed = raw_title.trim();
    let mut current = trimmed.to_string();

    loop {
        let next = strip_once(&current);
        if next.is_empty() || next == current {
            break;
        }
        current = next;
    }

    current
}

fn strip_once(title: &str) -> String {
    let title = DECORATION_PREFIX.replace(title, "");
    let title = DECORATION_SUFFIX.replace(&title, "");
    let title = VOLUME_MARKER.replace(&title, "");
    title.trim().to_string()
}
