//! Document walker that feeds a [`TemplateBuilder`].
//!
//! The walker reads the document with quick-xml and copies every event's
//! raw markup through, byte for byte. Tags naming structural elements are
//! reported as elements, notes as statements and fields as expressions.

use crate::{Error, Result, XmlTemplateOptions};
use pod_error_reporting::SourceInfo;
use pod_template::{Dialect, ElementKind, Template, TemplateBuilder};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Statement notes start with this word; other notes are plain comments.
const STATEMENT_KEYWORD: &str = "do";

/// An open tag outside notes and fields.
struct OpenTag {
    name: String,
    structural: bool,
}

/// Text being collected from inside a note or a field.
#[derive(Default)]
enum Capture {
    #[default]
    Idle,
    Note {
        depth: usize,
        start: usize,
        lines: Vec<String>,
        line: Option<String>,
    },
    Field {
        depth: usize,
        start: usize,
        text: String,
    },
}

impl Capture {
    fn is_active(&self) -> bool {
        !matches!(self, Capture::Idle)
    }

    fn push_str(&mut self, text: &str) {
        match self {
            Capture::Note {
                line: Some(line), ..
            } => line.push_str(text),
            Capture::Field { text: field, .. } => field.push_str(text),
            _ => {}
        }
    }
}

pub(crate) struct XmlWalker<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    dialect: &'static dyn Dialect,
    builder: TemplateBuilder,
    open: Vec<OpenTag>,
    capture: Capture,
    document_name: Option<String>,
}

impl<'a> XmlWalker<'a> {
    pub(crate) fn new(source: &'a str, options: &XmlTemplateOptions) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            source,
            reader,
            dialect: options.build.dialect.dialect(),
            builder: TemplateBuilder::new(options.build.clone()),
            open: Vec::new(),
            capture: Capture::Idle,
            document_name: options.document_name.clone(),
        }
    }

    pub(crate) fn walk(mut self) -> Result<Template> {
        let source = self.source;
        loop {
            let start = self.reader.buffer_position() as usize;
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            };
            let end = self.reader.buffer_position() as usize;
            let raw = &source[start..end];

            match event {
                Event::Start(e) => self.handle_start(&e, raw, start)?,
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.handle_end(&name, raw, end)?;
                }
                Event::Empty(e) => self.handle_empty(&e, raw)?,
                Event::Text(e) if self.capture.is_active() => {
                    let text = e.unescape().map_err(|err| Error::XmlSyntax {
                        message: format!("Invalid text content: {err}"),
                        position: Some(start as u64),
                    })?;
                    self.capture.push_str(&text);
                }
                Event::CData(e) if self.capture.is_active() => {
                    self.capture.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
                Event::Eof => break,
                // Comments, declarations and everything outside notes are
                // copied through.
                _ if self.capture.is_active() => {}
                _ => self.builder.write(raw),
            }
        }

        if let Some(tag) = self.open.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", tag.name),
                location: None,
            });
        }
        if self.capture.is_active() {
            return Err(Error::UnexpectedEof {
                expected: format!("the end of a <{}>", self.dialect.note_tag()),
                location: None,
            });
        }
        Ok(self.builder.finish()?)
    }

    fn location(&self, start: usize, end: usize) -> SourceInfo {
        let info = SourceInfo::from_offsets(self.source, start, end);
        match &self.document_name {
            Some(name) => info.with_name(name.clone()),
            None => info,
        }
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, raw: &str, start: usize) -> Result<()> {
        let name = tag_name(e);

        match &mut self.capture {
            Capture::Note { depth, line, .. } => {
                *depth += 1;
                if self.dialect.note_line_tag() == Some(name.as_str()) {
                    *line = Some(String::new());
                }
                return Ok(());
            }
            Capture::Field { depth, .. } => {
                *depth += 1;
                return Ok(());
            }
            Capture::Idle => {}
        }

        if name == self.dialect.note_tag() {
            self.capture = Capture::Note {
                depth: 1,
                start,
                lines: Vec::new(),
                // Without line elements the whole note is one text.
                line: self.dialect.note_line_tag().is_none().then(String::new),
            };
            return Ok(());
        }
        if name == self.dialect.field_tag() {
            self.capture = Capture::Field {
                depth: 1,
                start,
                text: String::new(),
            };
            return Ok(());
        }

        self.declare_columns(e, &name)?;
        let kind = self.dialect.kind_for_tag(&name);
        match kind {
            Some(ElementKind::Cell) if !has_value_type(e) => match raw.strip_suffix('>') {
                Some(head) => {
                    self.builder.start_cell_with_value_type(head, ">");
                }
                None => {
                    self.builder.start_element(ElementKind::Cell, raw);
                }
            },
            Some(kind) => {
                self.builder.start_element(kind, raw);
            }
            None => self.builder.write(raw),
        }
        self.open.push(OpenTag {
            name,
            structural: kind.is_some(),
        });
        Ok(())
    }

    fn handle_end(&mut self, name: &str, raw: &str, end: usize) -> Result<()> {
        match std::mem::take(&mut self.capture) {
            Capture::Note {
                depth,
                start,
                mut lines,
                mut line,
            } => {
                let line_ends = self.dialect.note_line_tag() == Some(name);
                if depth > 1 {
                    if line_ends {
                        lines.extend(line.take());
                    }
                    self.capture = Capture::Note {
                        depth: depth - 1,
                        start,
                        lines,
                        line,
                    };
                    return Ok(());
                }
                lines.extend(line.take());
                return self.finish_note(&lines.join("\n"), start, end);
            }
            Capture::Field { depth, start, text } => {
                if depth > 1 {
                    self.capture = Capture::Field {
                        depth: depth - 1,
                        start,
                        text,
                    };
                    return Ok(());
                }
                let location = self.location(start, end);
                return Ok(self.builder.add_expression(&text, Some(location))?);
            }
            Capture::Idle => {}
        }

        let tag = self.open.pop().ok_or_else(|| Error::MismatchedEndTag {
            expected: String::new(),
            found: name.to_string(),
            location: Some(self.location(end - raw.len(), end)),
        })?;
        if tag.name != name {
            return Err(Error::MismatchedEndTag {
                expected: tag.name,
                found: name.to_string(),
                location: Some(self.location(end - raw.len(), end)),
            });
        }
        if tag.structural {
            self.builder.end_element(raw)?;
        } else {
            self.builder.write(raw);
        }
        Ok(())
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>, raw: &str) -> Result<()> {
        let name = tag_name(e);
        if self.capture.is_active() {
            if let Some(c) = inline_char(&name) {
                self.capture.push_str(c);
            }
            return Ok(());
        }

        self.declare_columns(e, &name)?;
        match self.dialect.kind_for_tag(&name) {
            Some(kind) => {
                self.builder.start_element(kind, raw);
                self.builder.end_element("")?;
            }
            None => self.builder.write(raw),
        }
        Ok(())
    }

    fn finish_note(&mut self, text: &str, start: usize, end: usize) -> Result<()> {
        let is_statement = text
            .split_whitespace()
            .next()
            .is_some_and(|word| word == STATEMENT_KEYWORD);
        if !is_statement {
            tracing::trace!(note = text, "Copying plain note");
            self.builder.write(&self.source[start..end]);
            return Ok(());
        }
        let location = self.location(start, end);
        Ok(self.builder.add_statement(text, Some(location))?)
    }

    fn declare_columns(&mut self, e: &BytesStart<'_>, name: &str) -> Result<()> {
        let (column_tag, repeat) = self.dialect.column_tag();
        if name != column_tag {
            return Ok(());
        }
        let mut count = 1;
        for attr in e.attributes() {
            let attr = attr.map_err(|err| Error::XmlSyntax {
                message: format!("Attribute error: {err}"),
                position: None,
            })?;
            if attr.key.as_ref() == repeat.as_bytes() {
                let value = attr.unescape_value()?;
                count = value.trim().parse().unwrap_or(1);
            }
        }
        self.builder.declare_columns(count);
        Ok(())
    }
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Whether a cell already declares the type of its value.
fn has_value_type(e: &BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|attr| {
        let key = attr.key.as_ref();
        key.ends_with(b"value-type") || key == b"data-pod-type"
    })
}

/// Text standing for an empty inline element inside a note or a field.
fn inline_char(name: &str) -> Option<&'static str> {
    match name {
        "text:s" => Some(" "),
        "text:tab" => Some("\t"),
        "text:line-break" | "br" => Some("\n"),
        _ => None,
    }
}
