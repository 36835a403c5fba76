use pest::{iterators::Pair, Parser};
use pest_derive::Parser as PestParser;

use crate::{Result, StoryError};

#[derive(PestParser)]
#[grammar = "src/compiler/story.pest"]
struct MarkupParser;

/// Generic element of the story markup, before any story grammar applies.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub line: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parses markup text and returns its root element. Text, comments and
/// processing instructions are dropped.
pub(crate) fn parse_document(source: &str) -> Result<Element> {
    let mut pairs = MarkupParser::parse(Rule::document, source)
        .map_err(|err| StoryError::Syntax(err.to_string()))?;
    let document = pairs
        .next()
        .ok_or_else(|| StoryError::Syntax("empty document".to_string()))?;
    let root = document
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::root)
        .ok_or_else(|| StoryError::Syntax("missing root element".to_string()))?;

    element_from_pair(root)
}

fn element_from_pair(pair: Pair<'_, Rule>) -> Result<Element> {
    let (line, _) = pair.line_col();
    let mut element = Element {
        name: String::new(),
        attributes: Vec::new(),
        children: Vec::new(),
        line,
    };

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => element.name = inner.as_str().to_string(),
            Rule::attribute => {
                let (key, value) = attribute_from_pair(inner)?;
                if element.attr(&key).is_some() {
                    return Err(StoryError::Syntax(format!(
                        "line {line}: attribute `{key}` repeated on <{}>",
                        element.name
                    )));
                }
                element.attributes.push((key, value));
            }
            Rule::element => element.children.push(element_from_pair(inner)?),
            _ => {}
        }
    }

    Ok(element)
}

fn attribute_from_pair(pair: Pair<'_, Rule>) -> Result<(String, String)> {
    let mut key = None;
    let mut value = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => key = Some(inner.as_str().to_string()),
            Rule::dq_value | Rule::sq_value => value = decode_entities(inner.as_str())?,
            _ => {}
        }
    }

    let key = key.ok_or_else(|| StoryError::Syntax("attribute without a name".to_string()))?;
    Ok((key, value))
}

fn decode_entities(raw: &str) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail
            .find(';')
            .ok_or_else(|| StoryError::Syntax(format!("unterminated entity in `{raw}`")))?;
        let entity = &tail[..end];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => numeric_entity(entity)
                .ok_or_else(|| StoryError::Syntax(format!("unknown entity `&{entity};`")))?,
        };
        out.push(decoded);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let root = parse_document(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- a walk -->
<story title="Old Town" introfile='intro.mp3'>
    <spot latitude="1.5" longitude="2.5">
        <circle radius="10"/>
    </spot>
</story>
"#,
        )
        .unwrap();

        assert_eq!(root.name, "story");
        assert_eq!(root.attr("title"), Some("Old Town"));
        assert_eq!(root.attr("introfile"), Some("intro.mp3"));
        assert_eq!(root.line, 3);
        assert_eq!(root.children.len(), 1);
        let spot = &root.children[0];
        assert_eq!(spot.attr("latitude"), Some("1.5"));
        assert_eq!(spot.children[0].name, "circle");
        assert!(spot.children[0].children.is_empty());
    }

    #[test]
    fn ignores_text_and_cdata() {
        let root = parse_document(
            "<story title='t'>loose text<![CDATA[<spot/>]]><spot latitude='0' longitude='0'/></story>",
        )
        .unwrap();

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "spot");
    }

    #[test]
    fn accepts_missing_root_close_tag() {
        let root = parse_document("<story title='t'><spot latitude='0' longitude='0'></spot>\n")
            .unwrap();

        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn rejects_mismatched_tags() {
        let err = parse_document("<story><spot></circle></story>").unwrap_err();
        assert!(matches!(err, StoryError::Syntax(_)));
    }

    #[test]
    fn rejects_repeated_attributes() {
        let err = parse_document("<story title='a' title='b'/>").unwrap_err();
        assert!(format!("{err}").contains("title"));
    }

    #[test]
    fn decodes_entities_in_attribute_values() {
        let root = parse_document(r#"<story title="Tom &amp; Jerry &#228;&#x41; &lt;3"/>"#).unwrap();
        assert_eq!(root.attr("title"), Some("Tom & Jerry äA <3"));
    }

    #[test]
    fn rejects_unknown_entities() {
        let err = parse_document(r#"<story title="&nbsp;"/>"#).unwrap_err();
        assert!(format!("{err}").contains("&nbsp;"));
    }
}
