//! A minimal generic XML tree, just expressive enough for the request/
//! response shapes spec §4.10 describes (nested elements, repeated children
//! for list-valued params, text leaves). We don't need anything more
//! general — `quick-xml`'s `serde` feature would fight the dynamic,
//! command-dependent shape of `<params>` more than it would help, on either
//! side of the wire.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use fsal_core::FsalError;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn text_trimmed(&self) -> &str {
        self.text.trim()
    }

    /// A text-only element (serialized as `<name>text</name>`, or
    /// `<name/>` if `text` is empty).
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            text: text.into(),
        }
    }

    /// An element whose content is other elements rather than text.
    pub fn parent(name: impl Into<String>, children: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            children,
            text: String::new(),
        }
    }
}

/// Serializes an [`Element`] tree into a complete XML document.
pub fn write(root: &Element) -> Vec<u8> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root).expect("writing to an in-memory buffer never fails");
    writer.into_inner()
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> quick_xml::Result<()> {
    if el.children.is_empty() {
        if el.text.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new(&el.name)))?;
        } else {
            writer.write_event(Event::Start(BytesStart::new(&el.name)))?;
            let escaped = quick_xml::escape::escape(&el.text);
            writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
            writer.write_event(Event::End(BytesEnd::new(&el.name)))?;
        }
    } else {
        writer.write_event(Event::Start(BytesStart::new(&el.name)))?;
        for child in &el.children {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(&el.name)))?;
    }
    Ok(())
}

/// Parses a complete XML document into a single root [`Element`].
pub fn parse(bytes: &[u8]) -> Result<Element, FsalError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    // A synthetic root holds whatever top-level element the document has
    // (normally exactly one: `<request>`).
    let mut stack: Vec<Element> = vec![Element::default()];
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| FsalError::Protocol(format!("malformed request XML: {e}")))?;
        match event {
            Event::Start(start) => {
                let name = decode(start.name().as_ref());
                stack.push(Element {
                    name,
                    children: Vec::new(),
                    text: String::new(),
                });
            }
            Event::Empty(start) => {
                let name = decode(start.name().as_ref());
                let finished = Element {
                    name,
                    children: Vec::new(),
                    text: String::new(),
                };
                stack
                    .last_mut()
                    .expect("root frame always present")
                    .children
                    .push(finished);
            }
            Event::End(_) => {
                let finished = stack
                    .pop()
                    .ok_or_else(|| FsalError::Protocol("unbalanced request XML".to_string()))?;
                stack
                    .last_mut()
                    .ok_or_else(|| FsalError::Protocol("unbalanced request XML".to_string()))?
                    .children
                    .push(finished);
            }
            Event::Text(text) => {
                let decoded = text
                    .unescape()
                    .map_err(|e| FsalError::Protocol(format!("malformed request XML text: {e}")))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&decoded);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let root = stack
        .pop()
        .ok_or_else(|| FsalError::Protocol("empty request document".to_string()))?;
    root.children
        .into_iter()
        .next()
        .ok_or_else(|| FsalError::Protocol("request document has no root element".to_string()))
}

fn decode(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let doc = b"<request><command><type>LIST_DIR</type><params><path>d</path></params></command></request>";
        let root = parse(doc).unwrap();
        assert_eq!(root.name, "request");
        let command = root.child("command").unwrap();
        assert_eq!(command.child("type").unwrap().text_trimmed(), "LIST_DIR");
        let params = command.child("params").unwrap();
        assert_eq!(params.child("path").unwrap().text_trimmed(), "d");
    }

    #[test]
    fn parses_repeated_children_under_a_list_wrapper() {
        let doc = b"<request><command><type>FILTER</type><params><paths><path>a</path><path>b</path></paths></params></command></request>";
        let root = parse(doc).unwrap();
        let params = root.child("command").unwrap().child("params").unwrap();
        let paths = params.child("paths").unwrap();
        assert_eq!(paths.children.len(), 2);
        assert_eq!(paths.children[0].text_trimmed(), "a");
        assert_eq!(paths.children[1].text_trimmed(), "b");
    }

    #[test]
    fn rejects_malformed_documents() {
        let doc = b"<request><command>";
        assert!(parse(doc).is_err());
    }

    #[test]
    fn writes_nested_elements_and_text() {
        let root = Element::parent(
            "response",
            vec![Element::parent(
                "result",
                vec![Element::leaf("success", "true")],
            )],
        );
        let bytes = write(&root);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<response><result><success>true</success></result></response>"
        );
    }

    #[test]
    fn writes_an_empty_element_without_a_text_node() {
        let root = Element::parent("params", Vec::new());
        let bytes = write(&root);
        assert_eq!(String::from_utf8(bytes).unwrap(), "<params/>");
    }

    #[test]
    fn escapes_text_content() {
        let root = Element::leaf("error", "a < b & c");
        let bytes = write(&root);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<error>a &lt; b &amp; c</error>"
        );
    }

    #[test]
    fn round_trips_through_parse_and_write() {
        let root = Element::parent(
            "request",
            vec![Element::parent(
                "command",
                vec![
                    Element::leaf("type", "LIST_DIR"),
                    Element::parent("params", vec![Element::leaf("path", "docs")]),
                ],
            )],
        );
        let bytes = write(&root);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.child("command").unwrap().child("type").unwrap().text_trimmed(), "LIST_DIR");
    }
}
