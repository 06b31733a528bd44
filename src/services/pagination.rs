use crate::models::DocumentFormat;
use crate::services::pipeline::TransformError;
use crate::services::text::{filter_lines, is_digit_line};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Outcome of [`remove_pagination`]: the new text and one `Removed: ...` entry
/// per dropped element or line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOutcome {
    pub text: String,
    pub removed: Vec<String>,
}

/// Strip page numbers according to the document format.
///
/// Markup: elements whose `class` or `id` contains `page-number` (any case) and
/// `<p>` elements holding only digits are removed, then blank lines are
/// dropped. Everything else is line-oriented: lines that are only digits go.
///
/// A markup parse or serialize failure returns an error and the caller keeps
/// the original text.
pub fn remove_pagination(
    text: &str,
    format: DocumentFormat,
) -> Result<PaginationOutcome, TransformError> {
    match format {
        DocumentFormat::Markup => remove_markup_pagination(text),
        DocumentFormat::PlainText | DocumentFormat::Unknown => Ok(remove_line_pagination(text)),
    }
}

fn remove_line_pagination(text: &str) -> PaginationOutcome {
    let filtered = filter_lines(text, |line| !is_digit_line(line));
    PaginationOutcome {
        text: filtered.text,
        removed: filtered
            .removed
            .iter()
            .map(|line| format!("Removed: {}", line))
            .collect(),
    }
}

/// Events captured for one element, with the nesting depth still open.
struct Capture<'a> {
    depth: usize,
    events: Vec<Event<'a>>,
    text: String,
}

impl<'a> Capture<'a> {
    fn open(start: Event<'a>) -> Self {
        Self {
            depth: 1,
            events: vec![start],
            text: String::new(),
        }
    }

    fn push(&mut self, event: Event<'a>) {
        match &event {
            Event::Start(e) if !is_void_element(e) => self.depth += 1,
            Event::End(_) => self.depth = self.depth.saturating_sub(1),
            Event::Text(t) => self.text.push_str(&String::from_utf8_lossy(t)),
            Event::CData(t) => self.text.push_str(&String::from_utf8_lossy(t)),
            _ => {}
        }
        self.events.push(event);
    }

    fn is_closed(&self) -> bool {
        self.depth == 0
    }
}

enum Kind {
    PageNumberStart,
    PageNumberEmpty,
    ParagraphStart,
    Other,
}

fn classify(event: &Event<'_>) -> Kind {
    match event {
        Event::Start(e) if is_page_number(e) && !is_void_element(e) => Kind::PageNumberStart,
        Event::Start(e) | Event::Empty(e) if is_page_number(e) => Kind::PageNumberEmpty,
        Event::Start(e) if e.local_name().as_ref().eq_ignore_ascii_case(b"p") => {
            Kind::ParagraphStart
        }
        _ => Kind::Other,
    }
}

/// HTML elements that never take a closing tag (`<br>`, `<img>`, ...).
const VOID_ELEMENTS: [&[u8]; 14] = [
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input", b"link", b"meta",
    b"param", b"source", b"track", b"wbr",
];

fn is_void_element(element: &BytesStart<'_>) -> bool {
    let name = element.local_name();
    VOID_ELEMENTS
        .iter()
        .any(|void| name.as_ref().eq_ignore_ascii_case(void))
}

fn is_page_number(element: &BytesStart<'_>) -> bool {
    element.html_attributes().flatten().any(|attr| {
        let key = attr.key.as_ref();
        (key.eq_ignore_ascii_case(b"class") || key.eq_ignore_ascii_case(b"id"))
            && String::from_utf8_lossy(&attr.value)
                .to_ascii_lowercase()
                .contains("page-number")
    })
}

fn remove_markup_pagination(text: &str) -> Result<PaginationOutcome, TransformError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut writer = Writer::new(Vec::new());
    let mut dropping: Option<Capture> = None;
    let mut paragraph: Option<Capture> = None;
    let mut removed = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => event,
            Err(e) => {
                return Err(TransformError::Markup(format!(
                    "parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        };

        if let Some(capture) = dropping.as_mut() {
            capture.push(event);
            if capture.is_closed() {
                if let Some(done) = dropping.take() {
                    removed.push(format!("Removed: {}", serialize(&done.events)?));
                }
            }
            continue;
        }

        match classify(&event) {
            Kind::PageNumberStart => {
                dropping = Some(Capture::open(event));
                continue;
            }
            Kind::PageNumberEmpty => {
                removed.push(format!("Removed: {}", serialize(&[event])?));
                continue;
            }
            Kind::ParagraphStart if paragraph.is_none() => {
                paragraph = Some(Capture::open(event));
                continue;
            }
            _ => {}
        }

        if let Some(capture) = paragraph.as_mut() {
            capture.push(event);
            if capture.is_closed() {
                if let Some(done) = paragraph.take() {
                    flush_paragraph(&mut writer, done, &mut removed)?;
                }
            }
            continue;
        }

        write(&mut writer, event)?;
    }

    // Unterminated elements at end of input
    if let Some(done) = dropping.take() {
        removed.push(format!("Removed: {}", serialize(&done.events)?));
    }
    if let Some(done) = paragraph.take() {
        for event in done.events {
            write(&mut writer, event)?;
        }
    }

    let serialized = String::from_utf8(writer.into_inner())
        .map_err(|e| TransformError::Markup(format!("serialized output is not UTF-8: {}", e)))?;
    let filtered = filter_lines(&serialized, |line| !line.trim().is_empty());

    Ok(PaginationOutcome {
        text: filtered.text,
        removed,
    })
}

/// Drop a paragraph whose text is only digits, otherwise write it through.
fn flush_paragraph(
    writer: &mut Writer<Vec<u8>>,
    paragraph: Capture<'_>,
    removed: &mut Vec<String>,
) -> Result<(), TransformError> {
    if is_digit_line(&paragraph.text) {
        removed.push(format!("Removed: {}", serialize(&paragraph.events)?));
        return Ok(());
    }
    for event in paragraph.events {
        write(writer, event)?;
    }
    Ok(())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), TransformError> {
    writer
        .write_event(event)
        .map_err(|e| TransformError::Markup(format!("serialize error: {}", e)))
}

fn serialize(events: &[Event<'_>]) -> Result<String, TransformError> {
    let mut writer = Writer::new(Vec::new());
    for event in events {
        write(&mut writer, event.clone())?;
    }
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}
