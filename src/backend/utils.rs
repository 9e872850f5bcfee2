#[cfg(test)]
#[path = "utils_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<think>.*?</think>|<thinking>.*?</thinking>").expect("valid think pattern")
});

static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid blank line pattern"));

/// Strips reasoning blocks some models emit before the answer, collapses
/// runs of blank lines and trims trailing whitespace on every line.
pub(crate) fn clean_response(text: &str) -> String {
    let text = THINK_RE.replace_all(text, "");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
