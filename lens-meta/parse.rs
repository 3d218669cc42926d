use std::ops::Range;

use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::record::{MetadataRecord, QualityTier};

/// One start or end tag found in the document
#[derive(Debug)]
struct Tag<'a> {
    name: String,
    closing: bool,
    attrs: &'a str,
    span: Range<usize>,
}

/// Extracts [`MetadataRecord`]s from item wiki pages.
///
/// Works on the raw markup with a tag tokenizer instead of a DOM; elements
/// are located by tag name and attribute, and their extent is found by
/// counting nested tags of the same name.
#[derive(Debug, Clone)]
pub struct PageParser {
    tag: Regex,
    attr: Regex,
}

impl PageParser {
    pub fn new() -> ParseResult<Self> {
        Ok(Self {
            tag: Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)((?:\s[^>]*)?)/?>")?,
            attr: Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }

    /// Build the record for `name`; missing sections keep their defaults
    pub fn parse(&self, name: &str, html: &str) -> ParseResult<MetadataRecord> {
        if html.trim().is_empty() {
            return Err(ParseError::EmptyDocument);
        }

        let doc = Document::new(self, html);
        let mut record = MetadataRecord::new(name);

        if let Some(title) = doc.find("h1", |attrs| self.has_class(attrs, "page-header__title")) {
            record.title = doc.text(doc.inner(title));
        }
        if let Some(quality) = self.data_value(&doc, "quality") {
            record.quality = QualityTier::parse(&quality);
        }
        if let Some(id) = self.data_value(&doc, "id") {
            record.entity_id = id;
        }
        if let Some(quote) = self.data_value(&doc, "quote") {
            record.pickup_quote = quote;
        }
        record.effects = self.section_items(&doc, "Effects");
        record.synergies = self.section_items(&doc, "Synergies");

        Ok(record)
    }

    fn attr_value<'h>(&self, attrs: &'h str, key: &str) -> Option<&'h str> {
        self.attr.captures_iter(attrs).find_map(|cap| {
            let name = cap.get(1)?;
            if !name.as_str().eq_ignore_ascii_case(key) {
                return None;
            }
            cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str())
        })
    }

    fn has_class(&self, attrs: &str, class: &str) -> bool {
        self.attr_value(attrs, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Text of the `pi-data-value` cell inside `<div data-source="key">`
    fn data_value(&self, doc: &Document<'_>, key: &str) -> Option<String> {
        let field = doc.find("div", |attrs| self.attr_value(attrs, "data-source") == Some(key))?;
        let value = doc.find_within(field, "div", |attrs| self.has_class(attrs, "pi-data-value"))?;
        Some(doc.text(doc.inner(value)))
    }

    /// Items of the first list after the heading anchor `<span id="...">`
    fn section_items(&self, doc: &Document<'_>, anchor: &str) -> Vec<String> {
        let Some(heading) = doc.find("span", |attrs| self.attr_value(attrs, "id") == Some(anchor)) else {
            return Vec::new();
        };
        let Some(list) = doc.find_after(heading + 1, "ul", |_| true) else {
            return Vec::new();
        };

        let scope = doc.inner(list);
        (list + 1..doc.tags.len())
            .take_while(|&i| doc.tags[i].span.start < scope.end)
            .filter(|&i| !doc.tags[i].closing && doc.tags[i].name == "li")
            .map(|i| doc.text(doc.inner(i)))
            .collect()
    }
}

struct Document<'a> {
    html: &'a str,
    tags: Vec<Tag<'a>>,
    parser: &'a PageParser,
}

impl<'a> Document<'a> {
    fn new(parser: &'a PageParser, html: &'a str) -> Self {
        let tags = parser
            .tag
            .captures_iter(html)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                Some(Tag {
                    name: cap.get(2)?.as_str().to_ascii_lowercase(),
                    closing: !cap.get(1)?.as_str().is_empty(),
                    attrs: cap.get(3).map_or("", |m| m.as_str()),
                    span: whole.range(),
                })
            })
            .collect();
        Self { html, tags, parser }
    }

    /// Index of the first start tag `name` whose attributes satisfy `pred`
    fn find(&self, name: &str, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.find_after(0, name, pred)
    }

    fn find_after(&self, from: usize, name: &str, pred: impl Fn(&str) -> bool) -> Option<usize> {
        (from..self.tags.len()).find(|&i| {
            let tag = &self.tags[i];
            !tag.closing && tag.name == name && pred(tag.attrs)
        })
    }

    /// First matching start tag nested inside the element opened at `open`
    fn find_within(&self, open: usize, name: &str, pred: impl Fn(&str) -> bool) -> Option<usize> {
        let scope = self.inner(open);
        self.find_after(open + 1, name, pred)
            .filter(|&i| self.tags[i].span.start < scope.end)
    }

    /// Byte range between the start tag at `open` and its matching end tag.
    /// An unclosed element runs to the end of the document.
    fn inner(&self, open: usize) -> Range<usize> {
        let start_tag = &self.tags[open];
        let mut depth = 0usize;
        for tag in &self.tags[open + 1..] {
            if tag.name != start_tag.name {
                continue;
            }
            if !tag.closing {
                depth += 1;
            } else if depth == 0 {
                return start_tag.span.end..tag.span.start;
            } else {
                depth -= 1;
            }
        }
        start_tag.span.end..self.html.len()
    }

    /// Visible text of a range: tags removed, entities decoded, whitespace
    /// collapsed
    fn text(&self, range: Range<usize>) -> String {
        let stripped = self.parser.tag.replace_all(&self.html[range], "");
        let decoded = decode_entities(&stripped);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAD_ONION_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<h1 class="page-header__title" id="firstHeading">
    The Sad Onion
</h1>
<aside class="portable-infobox">
  <div class="pi-item pi-data" data-source="id">
    <h3 class="pi-data-label">ID</h3>
    <div class="pi-data-value pi-font">5.100.1</div>
  </div>
  <div class="pi-item pi-data" data-source="quote">
    <h3 class="pi-data-label">Quote</h3>
    <div class="pi-data-value pi-font">&quot;Tears up&quot;</div>
  </div>
  <div class="pi-item pi-data" data-source="quality">
    <h3 class="pi-data-label">Quality</h3>
    <div class="pi-data-value pi-font"><a href="/wiki/Quality">1</a></div>
  </div>
</aside>
<h2><span class="mw-headline" id="Effects">Effects</span></h2>
<ul>
  <li>+0.7 <a href="/wiki/Tears">tears</a> up.</li>
  <li>Stacks with <b>itself</b> &amp; other items.
    <ul><li>Nested note</li></ul>
  </li>
</ul>
<h2><span class="mw-headline" id="Synergies">Synergies</span></h2>
<p>None known.</p>
<ul class="footer"><li>Footer link</li></ul>
</body></html>"#;

    /// Page for the end-to-end detection scenario
    pub(crate) fn stub_page(quality: &str, id: &str, effects: &[&str]) -> String {
        let items: String = effects.iter().map(|e| format!("<li>{e}</li>")).collect();
        format!(
            r#"<h1 class="page-header__title">Sad Onion</h1>
<div data-source="quality"><div class="pi-data-value">{quality}</div></div>
<div data-source="id"><div class="pi-data-value">{id}</div></div>
<div data-source="quote"><div class="pi-data-value">...</div></div>
<span id="Effects"></span><ul>{items}</ul>"#
        )
    }

    fn parse(name: &str, html: &str) -> MetadataRecord {
        PageParser::new().unwrap().parse(name, html).unwrap()
    }

    #[test]
    fn test_full_page() {
        let record = parse("Sad Onion", SAD_ONION_PAGE);
        assert_eq!(record.title, "The Sad Onion");
        assert_eq!(record.entity_id, "5.100.1");
        assert_eq!(record.pickup_quote, "\"Tears up\"");
        assert_eq!(record.quality.value(), 1);
        assert_eq!(
            record.effects,
            vec![
                "+0.7 tears up.".to_string(),
                "Stacks with itself & other items. Nested note".to_string(),
                "Nested note".to_string(),
            ]
        );
        // First list after the anchor, even when it is unrelated
        assert_eq!(record.synergies, vec!["Footer link".to_string()]);
    }

    #[test]
    fn test_stub_page() {
        let record = parse("SadOnion", &stub_page("3", "105", &["Tears up"]));
        assert_eq!(record.quality.value(), 3);
        assert_eq!(record.entity_id, "105");
        assert_eq!(record.pickup_quote, "...");
        assert_eq!(record.effects, vec!["Tears up".to_string()]);
        assert!(record.synergies.is_empty());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let record = parse("Mystery Item", "<html><body><p>Stub article</p></body></html>");
        assert_eq!(record, MetadataRecord::new("Mystery Item"));
    }

    #[test]
    fn test_bad_quality_coerced() {
        let record = parse("X", &stub_page("seven", "1", &[]));
        assert_eq!(record.quality.value(), 0);
        let record = parse("X", &stub_page("5", "1", &[]));
        assert_eq!(record.quality.value(), 0);
    }

    #[test]
    fn test_data_source_without_value_cell() {
        let html = r#"<div data-source="id"><h3>ID</h3></div><div class="pi-data-value">stray</div>"#;
        assert_eq!(parse("X", html).entity_id, "Unknown");
    }

    #[test]
    fn test_empty_document_rejected() {
        let parser = PageParser::new().unwrap();
        assert!(matches!(parser.parse("X", "  \n"), Err(ParseError::EmptyDocument)));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &#39;c&#x27; &lt;d&gt;"), "a & b 'c' <d>");
        assert_eq!(decode_entities("AT&T & co;"), "AT&T & co;");
        assert_eq!(decode_entities("tail &"), "tail &");
    }
}
