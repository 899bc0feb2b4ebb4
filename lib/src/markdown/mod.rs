//! Markdown to HTML rendering for content bodies.

use pulldown_cmark::{html, Options, Parser};

/// The parser options used for every content body. Metadata blocks are off:
/// a post's header lives in its first two lines, and a leading `---` in a body
/// is a rule.
pub fn options() -> Options {
    Options::all()
        .difference(Options::ENABLE_SMART_PUNCTUATION)
        .difference(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS)
        .difference(Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS)
}

/// Renders the markdown `body` as an HTML fragment.
pub fn render(body: &str) -> String {
    let parser = Parser::new_ext(body, options());
    let mut output = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn renders_paragraphs_and_emphasis() {
        assert_eq!(render("Body *text*."), "<p>Body <em>text</em>.</p>\n");
    }

    #[test]
    fn leading_rule_is_not_metadata() {
        assert_eq!(render("---\n\nafter"), "<hr />\n<p>after</p>\n");
    }

    #[test]
    fn renders_headings_and_lists() {
        assert_eq!(render("## Part\n\n- one"), "<h2>Part</h2>\n<ul>\n<li>one</li>\n</ul>\n");
    }
}
