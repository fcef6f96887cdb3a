//! A `tracing_subscriber` [`Layer`] that writes events in `logfmt` format:
//! `key=value` pairs, one event per line, easy to `grep` and safe to mix
//! with the engine's own whitespace-delimited metrics stream (see
//! `cep_core::metrics`) on the same terminal without visual confusion.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

use observability_deps::tracing::{Level, Subscriber};
use std::{
    fmt::Write as _,
    io::Write as _,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{
    field::{Field, Visit},
    layer::Context,
    registry::LookupSpan,
    Layer,
};

/// A [`Layer`] that renders every event as a single logfmt line on the given
/// writer.
#[derive(Debug)]
pub struct LogFmtLayer<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> LogFmtLayer<W>
where
    W: std::io::Write + Send + Sync + 'static,
{
    /// Create a new layer writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

impl<S, W> Layer<S> for LogFmtLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: std::io::Write + Send + Sync + 'static,
{
    fn on_event(
        &self,
        event: &observability_deps::tracing::Event<'_>,
        _ctx: Context<'_, S>,
    ) {
        let mut line = String::new();
        let _ = write!(line, "level={}", level_str(*event.metadata().level()));
        let _ = write!(line, " target={}", event.metadata().target());

        let mut visitor = LogfmtVisitor(&mut line);
        event.record(&mut visitor);

        if let Ok(mut w) = self.writer.lock() {
            let _ = writeln!(w, "{line}");
        }
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

struct LogfmtVisitor<'a>(&'a mut String);

impl<'a> Visit for LogfmtVisitor<'a> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if rendered.contains(' ') && !rendered.starts_with('"') {
            let _ = write!(self.0, " {}={:?}", field.name(), rendered);
        } else {
            let _ = write!(self.0, " {}={}", field.name(), rendered);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if value.contains(' ') {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        } else {
            let _ = write!(self.0, " {}={}", field.name(), value);
        }
    }
}

/// Installs a [`LogFmtLayer`] writing to stdout as the global default
/// subscriber. Intended to be called once from `main`.
pub fn init_default_subscriber() {
    use tracing_subscriber::{layer::SubscriberExt, Registry};

    let layer = LogFmtLayer::new(std::io::stdout());
    let subscriber = Registry::default().with(layer);
    let _ = observability_deps::tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use observability_deps::tracing::{self, info};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct VecWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn renders_logfmt_line() {
        let buf = VecWriter::default();
        let layer = LogFmtLayer::new(buf.clone());
        let subscriber = tracing_subscriber::Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            info!(events = 3, "processed batch");
        });

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("level=info"));
        assert!(out.contains("events=3"));
        assert!(out.contains("message=\"processed batch\"") || out.contains("message=processed"));
    }
}
