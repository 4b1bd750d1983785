//! Line format of the shell log file
//!
//! ```text
//! [25.07.14 09:41] shell::read                            : LBA 3: 0x1298CDEF
//! ```
//!
//! The header is the event's `header` field when present, otherwise its
//! target. Fields other than `header` and `message` are appended as
//! `key=value` pairs.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Column at which the message starts
pub const DEFAULT_HEADER_WIDTH: usize = 56;

/// Event formatter for the shell log
#[derive(Debug, Clone, Copy)]
pub struct ShellLogFormat {
    header_width: usize,
}

impl ShellLogFormat {
    pub fn new() -> Self {
        Self {
            header_width: DEFAULT_HEADER_WIDTH,
        }
    }

    pub fn with_header_width(mut self, width: usize) -> Self {
        self.header_width = width;
        self
    }
}

impl Default for ShellLogFormat {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct LineVisitor {
    header: Option<String>,
    message: String,
    extra: Vec<(&'static str, String)>,
}

impl LineVisitor {
    fn record(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "header" => self.header = Some(value),
            name => self.extra.push((name, value)),
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}

impl<S, N> FormatEvent<S, N> for ShellLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let header = visitor
            .header
            .unwrap_or_else(|| event.metadata().target().to_string());
        let stamp = chrono::Local::now().format("%y.%m.%d %H:%M");
        let lead = format!("[{stamp}] {header}");

        write!(writer, "{:<width$}: {}", lead, visitor.message, width = self.header_width)?;
        for (name, value) in visitor.extra {
            write!(writer, " {name}={value}")?;
        }
        writeln!(writer)
    }
}
