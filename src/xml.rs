//! Azure Storage XML payloads.
//!
//! The Blob, File and Queue services answer list and receive calls with
//! XML documents of the same rough shape: a list of record elements
//! (`<Blob>`, `<File>`, `<Directory>`, `<QueueMessage>`) holding leaf
//! text fields, plus an optional `<NextMarker>` continuation token.
//! [`parse_records`] flattens any of them.  The only request body the
//! app sends as XML is a queue message, rendered by
//! [`render_queue_message`].

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::Cursor;

/// One record element and its leaf text fields keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlRecord {
    pub tag: String,
    pub fields: HashMap<String, String>,
}

impl XmlRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Result of [`parse_records`].
#[derive(Debug, Default, PartialEq)]
pub struct RecordList {
    pub records: Vec<XmlRecord>,
    /// Continuation marker; `None` when absent or empty.
    pub next_marker: Option<String>,
}

/// Extract every element named in `record_tags` from `body`.
///
/// Leaf text anywhere inside a record is stored under its own tag name; the
/// first occurrence wins.  Text of a `<NextMarker>` outside any record
/// becomes the continuation marker.  Text is kept verbatim, whitespace
/// included.
pub fn parse_records(body: &[u8], record_tags: &[&str]) -> Result<RecordList, quick_xml::Error> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();

    let mut result = RecordList::default();
    let mut current: Option<XmlRecord> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if current.is_none() && record_tags.contains(&tag.as_str()) {
                    current = Some(XmlRecord {
                        tag: tag.clone(),
                        fields: HashMap::new(),
                    });
                }
                current_tag = tag;
            }
            Event::Text(ref e) => {
                let text = e.unescape()?.into_owned();
                store_text(&mut result, current.as_mut(), &current_tag, text);
            }
            Event::CData(ref e) => {
                let text = String::from_utf8_lossy(e.as_ref()).to_string();
                store_text(&mut result, current.as_mut(), &current_tag, text);
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if current.as_ref().is_some_and(|r| r.tag == tag) {
                    if let Some(record) = current.take() {
                        result.records.push(record);
                    }
                }
                current_tag.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}

fn store_text(result: &mut RecordList, record: Option<&mut XmlRecord>, tag: &str, text: String) {
    if tag.is_empty() {
        return;
    }
    match record {
        Some(record) => {
            record.fields.entry(tag.to_string()).or_insert(text);
        }
        None if tag == "NextMarker" && !text.is_empty() => result.next_marker = Some(text),
        None => {}
    }
}

/// Render the `Put Message` request body.
///
/// ```xml
/// <QueueMessage><MessageText>Order #42 - Shipped</MessageText></QueueMessage>
/// ```
pub fn render_queue_message(text: &str) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Start(BytesStart::new("QueueMessage")))
        .expect("start QueueMessage");
    writer
        .write_event(Event::Start(BytesStart::new("MessageText")))
        .expect("start MessageText");
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .expect("text");
    writer
        .write_event(Event::End(BytesEnd::new("MessageText")))
        .expect("end MessageText");
    writer
        .write_event(Event::End(BytesEnd::new("QueueMessage")))
        .expect("end QueueMessage");

    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}
