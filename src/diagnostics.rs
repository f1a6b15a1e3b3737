//! Run diagnostics: the append-only log of recoverable failures.
//!
//! Shared through `Arc` by the resolver, the splitter and the worker pool;
//! entries are appended under a `parking_lot` mutex so concurrent writers
//! never interleave.

use crate::log;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use quick_xml::{
    Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use serde::Serialize;
use std::{fs, io::Cursor, path::Path};

/// Fixed message codes of the diagnostics log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    UnresolvedReference,
    MissingDocument,
    MissingInternalReference,
    TaskFailure,
}

impl DiagnosticCode {
    pub const fn message(self) -> &'static str {
        match self {
            Self::UnresolvedReference => "unresolved cross-reference",
            Self::MissingDocument => "missing repository-referenced document",
            Self::MissingInternalReference => "missing internal reference",
            Self::TaskFailure => "worker task failed",
        }
    }

    pub const fn category(self) -> &'static str {
        match self {
            Self::UnresolvedReference | Self::MissingDocument | Self::MissingInternalReference => {
                "Cross-References"
            }
            Self::TaskFailure => "Output",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub category: &'static str,
    pub document: Option<String>,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and echo it to the terminal.
    pub fn record(&self, code: DiagnosticCode, document: Option<&str>, message: impl Into<String>) {
        self.push(code, code.category(), document, message.into());
    }

    /// Append an entry under an explicit category (e.g. "Section Split").
    pub fn record_in(
        &self,
        category: &'static str,
        code: DiagnosticCode,
        document: Option<&str>,
        message: impl Into<String>,
    ) {
        self.push(code, category, document, message.into());
    }

    fn push(
        &self,
        code: DiagnosticCode,
        category: &'static str,
        document: Option<&str>,
        message: String,
    ) {
        match document {
            Some(doc) => log!("warn"; "{}: {message} (in {doc})", code.message()),
            None => log!("warn"; "{}: {message}", code.message()),
        }
        self.entries.lock().push(Diagnostic {
            code,
            category,
            document: document.map(str::to_owned),
            message,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries carrying `code`.
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.entries.lock().iter().filter(|d| d.code == code).count()
    }

    /// Write `<dir>/<name>.err.json` and `<dir>/<name>.err.html`.
    pub fn write(&self, dir: &Path, name: &str) -> Result<Vec<std::path::PathBuf>> {
        let entries = self.entries();
        let json_path = dir.join(format!("{name}.err.json"));
        let html_path = dir.join(format!("{name}.err.html"));

        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(&json_path, json)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
        fs::write(&html_path, render_html(name, &entries)?)
            .with_context(|| format!("Failed to write {}", html_path.display()))?;

        Ok(vec![json_path, html_path])
    }
}

/// Error-annotated page listing every diagnostic of the run.
fn render_html(name: &str, entries: &[Diagnostic]) -> Result<String> {
    let mut w = Writer::new(Cursor::new(Vec::new()));

    w.write_event(Event::Start(BytesStart::new("html")))?;
    w.write_event(Event::Start(BytesStart::new("head")))?;
    text_element(&mut w, "title", &format!("{name}: errors"))?;
    w.write_event(Event::End(BytesEnd::new("head")))?;
    w.write_event(Event::Start(BytesStart::new("body")))?;
    text_element(&mut w, "h1", &format!("{name}: {} problem(s)", entries.len()))?;

    w.write_event(Event::Start(BytesStart::new("table")))?;
    w.write_event(Event::Start(BytesStart::new("tr")))?;
    for head in ["Category", "Code", "Document", "Message", "Time"] {
        text_element(&mut w, "th", head)?;
    }
    w.write_event(Event::End(BytesEnd::new("tr")))?;

    for entry in entries {
        let mut row = BytesStart::new("tr");
        row.push_attribute(("class", "error"));
        w.write_event(Event::Start(row))?;
        text_element(&mut w, "td", entry.category)?;
        text_element(&mut w, "td", entry.code.message())?;
        text_element(&mut w, "td", entry.document.as_deref().unwrap_or(""))?;
        text_element(&mut w, "td", &entry.message)?;
        text_element(&mut w, "td", &entry.timestamp)?;
        w.write_event(Event::End(BytesEnd::new("tr")))?;
    }

    w.write_event(Event::End(BytesEnd::new("table")))?;
    w.write_event(Event::End(BytesEnd::new("body")))?;
    w.write_event(Event::End(BytesEnd::new("html")))?;

    Ok(String::from_utf8(w.into_inner().into_inner())?)
}

pub(crate) fn text_element(w: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
