use roxmltree::{Document, Node};

/// How the sample file ended up in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleText {
    /// Strict parse succeeded; the element tree was serialized into descriptive text.
    Structured(String),
    /// Parsing failed; the raw bytes were decoded as Latin-1 and kept verbatim.
    Raw { text: String, parse_error: String },
}

/// Describe an XML sample. Never fails: anything that does not parse becomes opaque text.
///
/// Input is UTF-8 unless the XML declaration names ISO-8859-1, in which case it is decoded as
/// Latin-1 before parsing.
pub fn describe_sample(bytes: &[u8]) -> SampleText {
    let latin1;
    let decoded = if let Some(body_start) = latin1_body_start(bytes) {
        // The declaration no longer describes the decoded text, so parse what follows it.
        latin1 = decode_latin1(&bytes[body_start..]);
        latin1.as_str()
    } else {
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                return SampleText::Raw {
                    text: decode_latin1(bytes),
                    parse_error: format!("input is not valid UTF-8: {e}"),
                }
            }
        }
    };
    match Document::parse(decoded) {
        Ok(doc) => SampleText::Structured(serialize_document(&doc)),
        Err(e) => SampleText::Raw {
            text: decode_latin1(bytes),
            parse_error: e.to_string(),
        },
    }
}

/// Byte offset just past the XML declaration when it names ISO-8859-1.
fn latin1_body_start(bytes: &[u8]) -> Option<usize> {
    let label = declared_encoding(bytes)?;
    let latin1 = matches!(
        label.to_ascii_lowercase().as_str(),
        "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" | "l1"
    );
    if !latin1 {
        return None;
    }
    bytes.windows(2).position(|w| w == b"?>").map(|end| end + 2)
}

/// Value of the `encoding` pseudo-attribute in a leading `<?xml ...?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&bytes[..end]).ok()?;
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

/// ISO-8859-1: every byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn serialize_document(doc: &Document<'_>) -> String {
    let root = doc.root_element();
    let mut lines: Vec<String> = Vec::new();
    lines.push("XML structure sample (SCR 3040 fill-in example)".to_string());
    lines.push(format!("Root tag: {}", root.tag_name().name()));
    lines.push(format!("Root attributes: {}", render_attributes(root)));
    lines.push(String::new());
    walk(root, 0, &mut lines);
    lines.join("\n")
}

// Depth-first, parent before children, one blank line after each element.
fn walk(node: Node<'_, '_>, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    lines.push(format!("{indent}Tag: <{}>", node.tag_name().name()));
    if node.attributes().count() > 0 {
        lines.push(format!("{indent}Attributes: {}", render_attributes(node)));
    }
    if let Some(text) = node.text().map(str::trim).filter(|t| !t.is_empty()) {
        lines.push(format!("{indent}Content: {text}"));
    }
    lines.push(String::new());
    for child in node.children().filter(|n| n.is_element()) {
        walk(child, depth + 1, lines);
    }
}

fn render_attributes(node: Node<'_, '_>) -> String {
    let parts: Vec<String> = node
        .attributes()
        .map(|a| format!("{}=\"{}\"", a.name(), a.value()))
        .collect();
    if parts.is_empty() {
        "(none)".to_string()
    } else {
        parts.join(", ")
    }
}
