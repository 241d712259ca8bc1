use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const MARKUP_CHARS: [char; 3] = ['*', '#', '`'];

/// Reduces generated text to plain ASCII.
///
/// Characters are decomposed (NFKD) and their accents dropped, so "riego
/// óptimo" becomes "riego optimo". Whatever is still outside ASCII is removed,
/// markdown emphasis markers are stripped and whitespace is collapsed inside
/// each paragraph. Paragraphs stay separated by a blank line.
pub fn sanitize_narrative(text: &str) -> String {
    let ascii: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii() && !MARKUP_CHARS.contains(c))
        .filter(|c| !c.is_ascii_control() || c.is_ascii_whitespace())
        .collect();

    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in ascii.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(collapse(&current));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(collapse(&current));
    }

    paragraphs.join("\n\n")
}

fn collapse(lines: &[&str]) -> String {
    lines
        .iter()
        .flat_map(|l| l.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
