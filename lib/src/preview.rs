use crate::html;

/// Builds a plain-text preview of rendered `html` at most `length` characters
/// long: the text of the top-level paragraphs, joined by a space and cut at
/// exactly `length` characters, even mid-word.
pub fn preview(html: &str, length: usize) -> String {
    if length == 0 {
        return String::new();
    }

    html::paragraph_text(html)
        .join(" ")
        .chars()
        .take(length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::preview;

    const HTML: &str = "<h1>Heading</h1>\n<p>One two three.</p>\n<pre><code>skip</code></pre>\n<p>Four</p>\n";

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(preview(HTML, 0), "");
    }

    #[test]
    fn joins_paragraphs_with_a_space() {
        assert_eq!(preview(HTML, 100), "One two three. Four");
    }

    #[test]
    fn truncates_mid_word_by_characters() {
        assert_eq!(preview(HTML, 6), "One tw");
        assert_eq!(preview("<p>héllo wörld</p>", 7), "héllo w");
    }

    #[test]
    fn never_exceeds_length() {
        for n in 0..30 {
            assert!(preview(HTML, n).chars().count() <= n);
        }
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(preview("", 10), "");
    }
}
