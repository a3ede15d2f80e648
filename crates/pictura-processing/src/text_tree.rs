//! Indentation-driven text-tree parser.
//!
//! Converts reports such as the output of `identify -verbose` into a nested
//! mapping. The first non-blank line is a header and is discarded; every other
//! line is either a section header (`Name:`) that opens a nested mapping, or a
//! leaf pair (`key: value`). Dedenting by `2n` columns closes `n` sections.
//!
//! Keys have `.` replaced by `*` so they can be used as document field names.
//! Values are kept verbatim as strings.

use pictura_core::ParseError;
use serde_json::{Map, Value};

const INDENT_UNIT: usize = 2;

enum Line<'a> {
    Section(&'a str),
    Leaf(&'a str, &'a str),
}

/// Open section: key in its parent plus the fields collected so far.
struct OpenSection {
    key: String,
    fields: Map<String, Value>,
}

struct TreeBuilder {
    root: Map<String, Value>,
    open: Vec<OpenSection>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            root: Map::new(),
            open: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Map<String, Value> {
        match self.open.last_mut() {
            Some(section) => &mut section.fields,
            None => &mut self.root,
        }
    }

    fn insert(&mut self, key: String, value: Value) {
        // Duplicate keys: last one wins
        self.current().insert(key, value);
    }

    fn close(&mut self, count: usize, line: usize) -> Result<(), ParseError> {
        if count > self.open.len() {
            return Err(ParseError::UnbalancedDedent {
                line,
                closing: count,
                open: self.open.len(),
            });
        }
        for _ in 0..count {
            self.close_one();
        }
        Ok(())
    }

    fn close_one(&mut self) {
        if let Some(section) = self.open.pop() {
            self.insert(section.key, Value::Object(section.fields));
        }
    }

    fn finish(mut self) -> Map<String, Value> {
        while !self.open.is_empty() {
            self.close_one();
        }
        self.root
    }
}

/// Parse an indentation-structured report into a nested mapping.
///
/// ```
/// use pictura_processing::parse_indented_report;
///
/// let report = "Image: photo.jpg\n  Format: JPEG\n  Channel depth:\n    red: 8-bit\n";
/// let tree = parse_indented_report(report).unwrap();
/// assert_eq!(tree["Format"], "JPEG");
/// assert_eq!(tree["Channel depth"]["red"], "8-bit");
/// ```
pub fn parse_indented_report(text: &str) -> Result<Map<String, Value>, ParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .flat_map(|(index, line)| line.split('\r').map(move |part| (index + 1, part)))
        .filter(|(_, line)| !line.trim().is_empty());

    // First line is a header describing the whole report
    lines.next();

    let mut builder = TreeBuilder::new();
    let mut previous_indent = 0usize;
    let mut seen_any = false;

    for (line_no, raw) in lines {
        seen_any = true;
        let indent = leading_whitespace(raw);
        let delta = indent as isize - previous_indent as isize;

        if delta.unsigned_abs() % INDENT_UNIT != 0 {
            return Err(ParseError::OddIndentation {
                line: line_no,
                delta,
            });
        }

        if indent < previous_indent {
            builder.close((previous_indent - indent) / INDENT_UNIT, line_no)?;
        }

        match classify(raw.trim(), line_no)? {
            Line::Section(key) => builder.open.push(OpenSection {
                key: sanitize_key(key),
                fields: Map::new(),
            }),
            Line::Leaf(key, value) => {
                builder.insert(sanitize_key(key), Value::String(value.to_string()))
            }
        }

        previous_indent = indent;
    }

    if !seen_any {
        return Err(ParseError::Empty);
    }

    Ok(builder.finish())
}

fn classify(line: &str, line_no: usize) -> Result<Line<'_>, ParseError> {
    if let Some(key) = line.strip_suffix(':') {
        // `key: value:` is a leaf whose value ends in a colon, not a header
        if key.contains(": ") {
            return Err(ParseError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            });
        }
        return Ok(Line::Section(key));
    }
    match line.split_once(": ") {
        Some((key, value)) => Ok(Line::Leaf(key, value)),
        None => Err(ParseError::MalformedLine {
            line: line_no,
            content: line.to_string(),
        }),
    }
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn sanitize_key(key: &str) -> String {
    key.replace('.', "*")
}
