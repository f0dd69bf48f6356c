// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of session events.

use owo_colors::{OwoColorize, Style};
use specwatch_runner::{
    classify::{ErrorLogEntry, LinkKind},
    events::{RunStats, SessionEvent},
    reconcile::TestStatus,
    session::RunSession,
};
use std::io::{self, Write};

#[derive(Debug, Default, Clone)]
struct Styles {
    is_colorized: bool,
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    title: Style,
    link: Style,
    vendored: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.is_colorized = true;
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.title = Style::new().bold();
        self.link = Style::new().cyan().underline();
        self.vendored = Style::new().dimmed();
    }
}

/// Writes session events to the terminal as they happen.
#[derive(Debug)]
pub(crate) struct SessionReporter {
    styles: Styles,
    hide_transcript: bool,
    test_count: usize,
}

impl SessionReporter {
    pub(crate) fn new(hide_transcript: bool) -> Self {
        Self {
            styles: Styles::default(),
            hide_transcript,
            test_count: 0,
        }
    }

    pub(crate) fn colorize(&mut self) {
        self.styles.colorize();
    }

    pub(crate) fn report_event(
        &mut self,
        event: &SessionEvent,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match event {
            SessionEvent::RunStarted {
                suite_title,
                test_count,
            } => {
                self.test_count = *test_count;
                writeln!(
                    writer,
                    "{:>12} {} ({} {})",
                    "Starting".style(self.styles.pass),
                    suite_title.style(self.styles.title),
                    test_count.style(self.styles.count),
                    plural(*test_count, "test", "tests"),
                )?;
            }
            SessionEvent::TranscriptLine { line } => {
                if !self.hide_transcript {
                    if self.styles.is_colorized {
                        writeln!(writer, "{line}")?;
                    } else {
                        writeln!(writer, "{}", strip_ansi_escapes::strip_str(line))?;
                    }
                }
            }
            SessionEvent::TestStarted { index, title } => {
                writeln!(
                    writer,
                    "{:>12} {} {title}",
                    "START".style(self.styles.pass),
                    self.counter(*index, self.test_count),
                )?;
            }
            SessionEvent::TestFinished {
                index,
                title,
                signal_title,
                status,
            } => {
                let (label, style) = status_label(*status, &self.styles);
                write!(
                    writer,
                    "{:>12} {} {title}",
                    label.style(style),
                    self.counter(*index, self.test_count),
                )?;
                if signal_title != title {
                    write!(writer, " (reported as `{signal_title}`)")?;
                }
                writeln!(writer)?;
            }
            SessionEvent::ErrorLogged { entry } => {
                write!(writer, "{:>12} ", "ERROR".style(self.styles.fail))?;
                self.write_entry(entry, writer)?;
            }
            SessionEvent::ErrorPanelRevealed | SessionEvent::BusyChanged { .. } => {}
            SessionEvent::RunFinished { exit_code, stats } => {
                self.write_summary(*exit_code, stats, writer)?;
            }
        }

        Ok(())
    }

    /// Writes the status of every declared test, followed by the error log.
    pub(crate) fn write_panel(
        &self,
        session: &RunSession,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(writer, "{}", session.suite_title().style(self.styles.title))?;
        for case in session.cases() {
            let (label, style) = status_label(case.status, &self.styles);
            writeln!(
                writer,
                "{:>12} {} {}",
                label.style(style),
                self.counter(case.ordinal, session.cases().len()),
                case.title
            )?;
        }

        if session.is_error_panel_revealed() {
            writeln!(writer, "{}", "Errors".style(self.styles.fail))?;
            if session.error_log().is_empty() {
                writeln!(writer, "{:>12} (no error output captured)", "")?;
            }
            for entry in session.error_log() {
                write!(writer, "{:>12} ", "")?;
                self.write_entry(entry, writer)?;
            }
        }

        Ok(())
    }

    fn write_entry(&self, entry: &ErrorLogEntry, writer: &mut dyn Write) -> io::Result<()> {
        let text = entry.text().trim_start();
        let offset = entry.text().len() - text.len();

        let mut last = 0;
        for span in entry.links() {
            let start = span.range.start - offset;
            let end = span.range.end - offset;
            write!(writer, "{}", &text[last..start])?;
            let style = match span.kind {
                LinkKind::Clickable(_) => self.styles.link,
                LinkKind::Vendored => self.styles.vendored,
            };
            write!(writer, "{}", (&text[start..end]).style(style))?;
            last = end;
        }
        write!(writer, "{}", &text[last..])?;

        if let Some(line_number) = entry.line_number() {
            let line_number = format!("[line {line_number}]");
            write!(writer, " {}", line_number.style(self.styles.count))?;
        }
        writeln!(writer)
    }

    fn write_summary(
        &self,
        exit_code: Option<i32>,
        stats: &RunStats,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(writer, "------------")?;
        let label_style = if stats.is_success() && exit_code == Some(0) {
            self.styles.pass
        } else {
            self.styles.fail
        };
        write!(
            writer,
            "{:>12} {} {}, {} {}",
            "Summary".style(label_style),
            stats.passed.style(self.styles.count),
            "passed".style(self.styles.pass),
            stats.failed.style(self.styles.count),
            "failed".style(self.styles.fail),
        )?;
        if stats.unresolved() > 0 {
            write!(
                writer,
                ", {} {}",
                stats.unresolved().style(self.styles.count),
                "unresolved".style(self.styles.skip),
            )?;
        }
        match exit_code {
            Some(code) => writeln!(writer, "; runner exited with code {code}"),
            None => writeln!(writer, "; runner was stopped"),
        }
    }

    fn counter(&self, index: usize, total: usize) -> String {
        let width = total.max(1).to_string().len();
        format!(
            "[{:>width$}/{}]",
            (index + 1).style(self.styles.count),
            total.style(self.styles.count),
        )
    }
}

fn status_label(status: TestStatus, styles: &Styles) -> (&'static str, Style) {
    match status {
        TestStatus::Queued => ("QUEUED", Style::new()),
        TestStatus::Running => ("RUNNING", styles.skip),
        TestStatus::Success => ("PASS", styles.pass),
        TestStatus::Error => ("FAIL", styles.fail),
    }
}

fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 { singular } else { plural }
}
