// Copyright (c) The cargo-soatest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reading the XML reports produced by `soatestcli`, and translating them into failsafe summaries.
//!
//! A `soatestcli` report can be large, so it is never loaded into memory in full. Instead, the
//! document is streamed until the functional test totals are found:
//!
//! ```xml
//! <ExecutedTestsDetails functional="true" type="FT">
//!   <Total total="10" pass="8" fail="2" ... />
//!   ...
//! </ExecutedTestsDetails>
//! ```

use crate::errors::{ReportParseError, SummaryWriteError};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDateTime};
use fs_err as fs;
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use tracing::{debug, warn};

static DETAILS_TAG: &[u8] = b"ExecutedTestsDetails";
static TOTAL_TAG: &[u8] = b"Total";

static SUMMARY_TAG: &str = "failsafe-summary";
static COMPLETED_TAG: &str = "completed";
static ERRORS_TAG: &str = "errors";
static FAILURES_TAG: &str = "failures";
static SKIPPED_TAG: &str = "skipped";
static FAILURE_MESSAGE_TAG: &str = "failureMessage";

/// The name of the XML report `soatestcli` generates when not given a file name.
pub const DEFAULT_XML_REPORT: &str = "report.xml";

/// The name of the HTML report `soatestcli` generates when not given a file name.
pub const DEFAULT_HTML_REPORT: &str = "report.html";

/// Functional test totals extracted from a `soatestcli` report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReportAggregate {
    total: u64,
    failed: u64,
}

impl ReportAggregate {
    /// Creates a new aggregate.
    pub fn new(total: u64, failed: u64) -> Self {
        Self { total, failed }
    }

    /// Returns the number of functional tests that were run.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the number of functional tests that failed.
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Returns the failsafe `result` attribute for this aggregate, if any.
    ///
    /// A summary without a `result` attribute is a success.
    pub fn failsafe_result(&self) -> Option<&'static str> {
        if self.total == 0 {
            Some("NO_TESTS")
        } else if self.failed > 0 {
            Some("FAILURE")
        } else {
            None
        }
    }

    /// Reads the functional test totals from the report at `path`.
    pub fn parse_report_xml(path: &Utf8Path) -> Result<Self, ReportParseError> {
        let file = fs::File::open(path).map_err(|err| ReportParseError::Open {
            path: path.to_owned(),
            err,
        })?;
        Self::parse_report_reader(BufReader::new(file)).map_err(|err| match err {
            ReportParseError::Xml { path: None, err } => ReportParseError::Xml {
                path: Some(path.to_owned()),
                err,
            },
            other => other,
        })
    }

    /// Reads the functional test totals from a report.
    ///
    /// The first `Total` element within an `ExecutedTestsDetails` element marked
    /// `functional="true" type="FT"` wins, and the rest of the document is not read. If there is
    /// no such element, both totals are 0.
    pub fn parse_report_reader(reader: impl BufRead) -> Result<Self, ReportParseError> {
        let mut reader = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut in_functional_details = false;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| ReportParseError::Xml { path: None, err })?;
            match event {
                Event::Start(start) => {
                    let name = start.name();
                    if in_functional_details && name.as_ref() == TOTAL_TAG {
                        return Ok(Self::from_total(&start));
                    }
                    if name.as_ref() == DETAILS_TAG && is_functional_details(&start) {
                        in_functional_details = true;
                    }
                }
                // An empty details element can't contain any totals.
                Event::Empty(start) => {
                    if in_functional_details && start.name().as_ref() == TOTAL_TAG {
                        return Ok(Self::from_total(&start));
                    }
                }
                Event::End(end) => {
                    let name = end.name();
                    if in_functional_details
                        && (name.as_ref() == TOTAL_TAG || name.as_ref() == DETAILS_TAG)
                    {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Self::default())
    }

    /// Writes a failsafe summary for this aggregate to `path`, creating parent directories as
    /// necessary.
    pub fn write_failsafe_summary(&self, path: &Utf8Path) -> Result<(), SummaryWriteError> {
        let write = || -> io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut writer = BufWriter::new(fs::File::create(path)?);
            self.serialize_failsafe_summary(&mut writer)?;
            writer.flush()
        };
        write().map_err(|err| SummaryWriteError::new(path, err))
    }

    /// Serializes a failsafe summary for this aggregate.
    ///
    /// The summary has a fixed shape: only the `result` attribute and the `completed` and
    /// `failures` counts depend on the aggregate.
    pub fn serialize_failsafe_summary(&self, writer: impl Write) -> io::Result<()> {
        let mut writer = Writer::new_with_indent(writer, b' ', 2);

        let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
        writer.write_event(Event::Decl(decl))?;

        let mut summary_tag = BytesStart::new(SUMMARY_TAG);
        if let Some(result) = self.failsafe_result() {
            summary_tag.push_attribute(("result", result));
        }
        summary_tag.push_attribute(("timeout", "false"));
        writer.write_event(Event::Start(summary_tag))?;

        serialize_text_element(COMPLETED_TAG, &self.total.to_string(), &mut writer)?;
        serialize_text_element(ERRORS_TAG, "0", &mut writer)?;
        serialize_text_element(FAILURES_TAG, &self.failed.to_string(), &mut writer)?;
        serialize_text_element(SKIPPED_TAG, "0", &mut writer)?;
        serialize_text_element(FAILURE_MESSAGE_TAG, "", &mut writer)?;

        writer.write_event(Event::End(BytesEnd::new(SUMMARY_TAG)))?;

        // Add a trailing newline.
        writer.write_indent()
    }

    fn from_total(start: &BytesStart<'_>) -> Self {
        Self {
            total: count_attribute(start, "total"),
            failed: count_attribute(start, "fail"),
        }
    }
}

fn is_functional_details(start: &BytesStart<'_>) -> bool {
    attribute_value(start, "functional").as_deref() == Some("true")
        && attribute_value(start, "type").as_deref() == Some("FT")
}

// Missing or malformed counts are treated as 0.
fn count_attribute(start: &BytesStart<'_>, name: &str) -> u64 {
    attribute_value(start, name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn attribute_value(start: &BytesStart<'_>, name: &str) -> Option<String> {
    let attr = start.try_get_attribute(name).ok().flatten()?;
    attr.unescape_value().ok().map(|value| value.into_owned())
}

// Writes <tag>text</tag> on a single line. The empty text event keeps the end tag from being
// indented onto its own line.
fn serialize_text_element(
    tag_name: &'static str,
    text: &str,
    writer: &mut Writer<impl Write>,
) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag_name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

/// Where `soatestcli` writes its reports, derived from the `report` setting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLocation {
    directory: Utf8PathBuf,
    xml_report: Utf8PathBuf,
    has_default_name: bool,
}

impl ReportLocation {
    /// File extensions that make `report` a path to a file rather than a directory.
    pub const FILE_EXTENSIONS: &'static [&'static str] = &["xml", "html"];

    /// Resolves the report location.
    ///
    /// * With no `report`, reports go to `report.xml`/`report.html` in `current_dir`.
    /// * If `report` ends with one of [`FILE_EXTENSIONS`](Self::FILE_EXTENSIONS), it is the
    ///   report file; the XML report has the same name with an `.xml` extension.
    /// * Otherwise `report` is a directory containing `report.xml`.
    ///
    /// `report` is expected to be absolute, or relative to `current_dir`.
    pub fn resolve(report: Option<&Utf8Path>, current_dir: &Utf8Path) -> Self {
        let Some(report) = report else {
            return Self {
                directory: current_dir.to_owned(),
                xml_report: current_dir.join(DEFAULT_XML_REPORT),
                has_default_name: true,
            };
        };

        let report = current_dir.join(report);
        if has_report_extension(&report) {
            let directory = report
                .parent()
                .map_or_else(|| current_dir.to_owned(), |parent| parent.to_owned());
            let has_default_name = report.file_name().is_some_and(is_default_report_name);
            Self {
                directory,
                xml_report: report.with_extension("xml"),
                has_default_name,
            }
        } else {
            Self {
                xml_report: report.join(DEFAULT_XML_REPORT),
                directory: report,
                has_default_name: true,
            }
        }
    }

    /// Returns the directory reports are written to.
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Returns the path of the XML report.
    pub fn xml_report(&self) -> &Utf8Path {
        &self.xml_report
    }

    /// Returns true if `soatestcli` will write reports with the default names
    /// (`report.xml`/`report.html`).
    pub fn has_default_name(&self) -> bool {
        self.has_default_name
    }

    /// Renames reports left over from a previous run, so they aren't overwritten.
    ///
    /// Only reports with the default names are renamed, to `report_<timestamp>.xml` and
    /// `report_<timestamp>.html`. Reports with a name chosen in the `report` setting are left
    /// alone. Returns the new paths of the renamed reports; failures to rename are logged and
    /// otherwise ignored.
    pub fn archive_existing_reports(&self, now: NaiveDateTime) -> Vec<Utf8PathBuf> {
        let mut archived = Vec::new();
        if !self.has_default_name || !self.directory.is_dir() {
            return archived;
        }

        let entries = match self.directory.read_dir_utf8() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "failed to list report directory `{}`: {err}",
                    self.directory
                );
                return archived;
            }
        };

        let timestamp = archive_timestamp(now);
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("failed to read entry in `{}`: {err}", self.directory);
                    continue;
                }
            };
            if !entry.file_type().is_ok_and(|ty| ty.is_file()) {
                continue;
            }
            let file_name = entry.file_name().to_lowercase();
            if !is_default_report_name(&file_name) {
                continue;
            }

            let extension = if file_name.ends_with(".xml") {
                "xml"
            } else {
                "html"
            };
            let new_path = self
                .directory
                .join(format!("report_{timestamp}.{extension}"));
            match fs::rename(entry.path(), &new_path) {
                Ok(()) => {
                    debug!("renamed existing report `{}` to `{new_path}`", entry.path());
                    archived.push(new_path);
                }
                Err(err) => warn!("{err}"),
            }
        }

        archived
    }
}

fn has_report_extension(path: &Utf8Path) -> bool {
    path.extension().is_some_and(|ext| {
        ReportLocation::FILE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

fn is_default_report_name(file_name: &str) -> bool {
    file_name.eq_ignore_ascii_case(DEFAULT_XML_REPORT)
        || file_name.eq_ignore_ascii_case(DEFAULT_HTML_REPORT)
}

/// Formats a timestamp for archived reports: the two-digit quarter, followed by the date and time
/// down to milliseconds.
pub fn archive_timestamp(now: NaiveDateTime) -> String {
    let quarter = now.month0() / 3 + 1;
    format!("{quarter:02}{}", now.format("%Y%m%d%H%M%S%3f"))
}
