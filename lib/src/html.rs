//! Minimal HTML inspection over rendered content fragments.

use quick_xml::events::Event;
use quick_xml::escape::unescape;
use quick_xml::Reader;

/// Elements that never carry an end tag in HTML.
const VOID_ELEMENTS: &[&[u8]] = &[
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input",
    b"link", b"meta", b"param", b"source", b"track", b"wbr",
];

fn is_void(name: &[u8]) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn decode(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match unescape(&text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Returns the text content of every top-level `<p>` element in `html`, in
/// document order. Nested markup inside a paragraph contributes its text;
/// paragraphs nested in other elements (lists, blockquotes) are skipped.
///
/// End tags close the innermost open element of the same name and everything
/// opened inside it. Unmatched end tags are ignored. A `<p>` start tag closes
/// an open `<p>`.
///
/// Malformed markup ends the scan; whatever was collected so far is returned.
pub fn paragraph_text(html: &str) -> Vec<String> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);

    let mut open: Vec<Vec<u8>> = vec![];
    let mut paragraph: Option<String> = None;
    let mut paragraphs = vec![];
    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let name = elem.name().as_ref().to_ascii_lowercase();
                if is_void(&name) {
                    continue;
                }

                if name == b"p" {
                    if let Some(i) = open.iter().rposition(|e| e == b"p") {
                        open.truncate(i);
                        if open.is_empty() {
                            paragraphs.extend(paragraph.take());
                        }
                    }

                    if open.is_empty() {
                        paragraph = Some(String::new());
                    }
                }

                open.push(name);
            }
            Ok(Event::End(elem)) => {
                let name = elem.name().as_ref().to_ascii_lowercase();
                if let Some(i) = open.iter().rposition(|e| *e == name) {
                    open.truncate(i);
                    if open.is_empty() {
                        paragraphs.extend(paragraph.take());
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&decode(&text));
                }
            }
            Ok(Event::CData(text)) => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Ok(Event::GeneralRef(entity)) => {
                if let Some(p) = paragraph.as_mut() {
                    let raw = format!("&{};", String::from_utf8_lossy(&entity));
                    p.push_str(&decode(raw.as_bytes()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("stopping paragraph scan on malformed html: {e}");
                break;
            }
        }
    }

    paragraphs.extend(paragraph);
    paragraphs
}
