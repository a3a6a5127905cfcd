// ABOUTME: Heuristic detection of pull specs inside arbitrary free text.
// ABOUTME: Used for annotations and other fields without a fixed schema.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Finds pull-spec-shaped substrings and returns their byte ranges.
pub type PullSpecHeuristic = fn(&str) -> Vec<Range<usize>>;

/// Runs of characters that may appear in a pull spec.
static CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9/._@:-]+").expect("candidate pattern compiles"));

static PULLSPEC: LazyLock<Regex> = LazyLock::new(|| {
    // A segment starts and ends with an alphanumeric character.
    let part = r"[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?";
    let dotted = r"[A-Za-z0-9][A-Za-z0-9._-]*\.[A-Za-z0-9._-]*[A-Za-z0-9]";
    let registry = format!(r"(?:{dotted}(?::[0-9]+)?|{part}:[0-9]+)");
    let reference = format!(r"(?::{part}|@sha256:[a-f0-9]{{64}})");

    Regex::new(&format!(r"^{registry}(?:/{part})+{reference}$")).expect("pullspec pattern compiles")
});

/// Finds everything in `text` that looks like `registry/namespace*/repo:tag`
/// or `registry/namespace*/repo@sha256:digest`.
///
/// The registry must contain a `.` or carry a numeric port. References
/// without an explicit tag are never reported; they would produce far too
/// many false positives in prose.
///
/// ```
/// use manifest_pin::manifest::default_pullspec_heuristic;
///
/// let text = "First is a.b/c:1. Second is d.e/f:1.";
/// let found: Vec<&str> = default_pullspec_heuristic(text)
///     .into_iter()
///     .map(|span| &text[span])
///     .collect();
/// assert_eq!(found, ["a.b/c:1", "d.e/f:1"]);
/// ```
pub fn default_pullspec_heuristic(text: &str) -> Vec<Range<usize>> {
    CANDIDATE
        .find_iter(text)
        .map(|candidate| trim_to_alphanumeric(text.as_bytes(), candidate.range()))
        .filter(|span| !span.is_empty() && PULLSPEC.is_match(&text[span.clone()]))
        .inspect(|span| tracing::trace!("{} looks like a pullspec", &text[span.clone()]))
        .collect()
}

/// Strips leading and trailing separators such as `.`, `:` or `/` so a
/// pull spec at the end of a sentence is still found.
fn trim_to_alphanumeric(bytes: &[u8], span: Range<usize>) -> Range<usize> {
    let Range { mut start, mut end } = span;
    while start < end && !bytes[start].is_ascii_alphanumeric() {
        start += 1;
    }
    while end > start && !bytes[end - 1].is_ascii_alphanumeric() {
        end -= 1;
    }
    start..end
}
