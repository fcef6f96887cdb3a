//! External interface boundaries: the input stream, data formatter,
//! and output stream are named collaborators whose *internals* are out of
//! this core's scope, but whose contracts are specified precisely enough
//! to give a runnable reference implementation so the crate works end to
//! end without an external adapter.

use crate::errors::{RuntimeDataError, UndecodableSnafu};
use crate::event::{Event, Value};
use crate::partial_match::PartialMatch;
use hashbrown::HashMap;
use std::io::BufRead;
use std::sync::Arc;

/// A pull source of raw input rows, produced one at a time until
/// end-of-stream.
pub trait InputStream {
    /// The next raw row, or `None` at end-of-stream.
    fn next_row(&mut self) -> Option<String>;
}

/// Reads whitespace-delimited rows from any [`BufRead`] (stdin, a file),
/// one per line.
#[derive(Debug)]
pub struct LineInputStream<R> {
    lines: std::io::Lines<R>,
}

impl<R: BufRead> LineInputStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> InputStream for LineInputStream<R> {
    fn next_row(&mut self) -> Option<String> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(line),
                Err(_) => return None,
            }
        }
    }
}

/// Decodes one raw row into `(event type, attribute map, timestamp)`. A
/// formatter that cannot decode a row returns a [`RuntimeDataError`]: the
/// caller drops the event, counts it, and continues -- the error never
/// aborts the stream.
pub trait DataFormatter {
    fn parse(&self, raw: &str) -> Result<Event, RuntimeDataError>;
}

/// Fixed column order: `event_type,attr=value,...,timestamp_millis`. The
/// reference formatter this crate ships so the `cep` binary is runnable
/// without an external adapter.
#[derive(Debug, Default)]
pub struct CsvDataFormatter;

impl DataFormatter for CsvDataFormatter {
    fn parse(&self, raw: &str) -> Result<Event, RuntimeDataError> {
        let mut fields: Vec<&str> = raw.split(',').collect();
        let timestamp_field = fields.pop().filter(|s| !s.is_empty()).ok_or_else(|| {
            UndecodableSnafu {
                raw: raw.to_string(),
                reason: "missing timestamp column".to_string(),
            }
            .build()
        })?;
        let timestamp = timestamp_field.parse::<i64>().map_err(|e| {
            UndecodableSnafu {
                raw: raw.to_string(),
                reason: format!("bad timestamp `{timestamp_field}`: {e}"),
            }
            .build()
        })?;

        let mut fields = fields.into_iter();
        let event_type = fields.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            UndecodableSnafu {
                raw: raw.to_string(),
                reason: "missing event type column".to_string(),
            }
            .build()
        })?;

        let mut payload = HashMap::new();
        for field in fields {
            let Some((name, value)) = field.split_once('=') else {
                return Err(UndecodableSnafu {
                    raw: raw.to_string(),
                    reason: format!("expected `name=value`, got `{field}`"),
                }
                .build());
            };
            payload.insert(name.to_string(), parse_value(value));
        }

        Ok(Event::primitive(event_type, payload, timestamp))
    }
}

fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::Str(raw.to_string())
    }
}

/// Accepts a rendered pattern match for delivery.
pub trait OutputStream {
    fn emit(&mut self, pattern_id: u64, render_pattern_ids: bool, pm: &PartialMatch);
    fn close(&mut self) {}
}

/// Renders matches to any [`std::io::Write`]: one event per line, a
/// blank line between matches, and a `pattern_id: ` prefix iff more than
/// one pattern is registered.
#[derive(Debug)]
pub struct TextOutputStream<W> {
    writer: W,
}

impl<W: std::io::Write> TextOutputStream<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: std::io::Write> OutputStream for TextOutputStream<W> {
    fn emit(&mut self, pattern_id: u64, render_pattern_ids: bool, pm: &PartialMatch) {
        for event in &pm.events {
            if render_pattern_ids {
                let _ = write!(self.writer, "{pattern_id}: ");
            }
            let _ = writeln!(self.writer, "{}", render_event(event));
        }
        let _ = writeln!(self.writer);
    }
}

fn render_event(event: &Event) -> String {
    let mut attrs: Vec<(&String, &Value)> = event.payload.iter().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    let attrs_str = attrs
        .iter()
        .map(|(k, v)| format!("{k}={}", render_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{}[{}] {attrs_str} @{}",
        event.event_type, event.min_timestamp, event.max_timestamp
    )
}

fn render_value(v: &Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
    }
}

/// Convenience: apply a [`DataFormatter`] to every row an [`InputStream`]
/// produces, counting malformed rows via `on_error` rather than ever
/// propagating them.
pub fn decode_stream<'a>(
    input: &'a mut dyn InputStream,
    formatter: &'a dyn DataFormatter,
    mut on_error: impl FnMut(RuntimeDataError) + 'a,
) -> impl Iterator<Item = Arc<Event>> + 'a {
    std::iter::from_fn(move || loop {
        let raw = input.next_row()?;
        match formatter.parse(&raw) {
            Ok(event) => return Some(Arc::new(event)),
            Err(e) => {
                on_error(e);
                continue;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_formatter_parses_typed_payload() {
        let formatter = CsvDataFormatter;
        let event = formatter.parse("A,x=1,y=2.5,name=hello,3000").unwrap();
        assert_eq!(event.event_type.as_ref(), "A");
        assert_eq!(event.min_timestamp, 3000);
        assert_eq!(event.get("x"), Some(&Value::Int(1)));
        assert_eq!(event.get("y"), Some(&Value::Float(2.5)));
        assert_eq!(event.get("name"), Some(&Value::Str("hello".to_string())));
    }

    #[test]
    fn csv_formatter_rejects_missing_timestamp() {
        let formatter = CsvDataFormatter;
        assert!(formatter.parse("A,x=1").is_err());
    }

    #[test]
    fn csv_formatter_rejects_malformed_attribute() {
        let formatter = CsvDataFormatter;
        assert!(formatter.parse("A,not-a-pair,3000").is_err());
    }

    #[test]
    fn text_output_separates_matches_with_blank_line() {
        use crate::partial_match::IdGenerator;
        let ids = IdGenerator::new();
        let pm = PartialMatch::singleton(
            Arc::new(Event::primitive("A", HashMap::new(), 1)),
            vec![1],
            &ids,
        );
        let mut buf = Vec::new();
        {
            let mut out = TextOutputStream::new(&mut buf);
            out.emit(1, false, &pm);
            out.emit(1, false, &pm);
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.matches("\n\n").count(), 2);
    }

    #[test]
    fn decode_stream_skips_malformed_rows_and_counts_them() {
        struct Rows(Vec<&'static str>);
        impl InputStream for Rows {
            fn next_row(&mut self) -> Option<String> {
                if self.0.is_empty() {
                    None
                } else {
                    Some(self.0.remove(0).to_string())
                }
            }
        }
        let mut input = Rows(vec!["A,x=1,0", "garbage", "B,x=2,10"]);
        let formatter = CsvDataFormatter;
        let mut errors = 0;
        let events: Vec<_> = decode_stream(&mut input, &formatter, |_| errors += 1).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(errors, 1);
    }
}
