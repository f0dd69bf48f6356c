// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result, SpecwatchExitCode},
    output::{OutputContext, OutputOpts, OutputWriter},
    reporter::SessionReporter,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use owo_colors::{OwoColorize, Style};
use specwatch_runner::{
    config::SpecwatchConfig,
    discovery::{group_by_folder, read_spec_source, scan_for_specs},
    editor::EditorLauncher,
    events::{RunStats, SessionEvent},
    line_buffer::ChunkDecoder,
    location::SourceLocation,
    process::{ProcessEvent, SpecRunner},
    session::SessionController,
    title::{SpecOutline, TitleExtractor},
};
use std::{io::Write, num::NonZeroUsize};
use tracing::{debug, info, warn};

/// Run end-to-end spec files and follow their status live in the terminal.
///
/// specwatch reads the test titles declared in a spec file, runs the spec and matches the
/// runner's pass and fail markers back to those titles. Error output is collected into a
/// separate log with links to the source locations it mentions.
#[derive(Debug, Parser)]
#[command(
    version,
    name = "specwatch",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct SpecwatchApp {
    #[command(flatten)]
    project: ProjectOpts,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl SpecwatchApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the exit code on success.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let project = self.project.load()?;
        match self.command {
            Command::List => exec_list(&project, output, output_writer),
            Command::Show { spec } => exec_show(&project, &spec, output, output_writer),
            Command::Run {
                spec,
                hide_transcript,
            } => exec_run(&project, &spec, hide_transcript, output, output_writer),
            Command::Replay {
                spec,
                log,
                chunk_size,
                exit_code,
                stopped,
                hide_transcript,
            } => {
                let exit_code = if stopped { None } else { Some(exit_code) };
                let opts = ReplayOpts {
                    chunk_size,
                    exit_code,
                    hide_transcript,
                };
                exec_replay(&project, &spec, &log, opts, output, output_writer)
            }
            Command::Open { location } => exec_open(&project, &location),
        }
    }
}

#[derive(Debug, Args)]
struct ProjectOpts {
    /// Project root [default: current directory]
    #[arg(long, global = true, value_name = "DIR", env = "SPECWATCH_PROJECT_ROOT")]
    project_root: Option<Utf8PathBuf>,

    /// Config file [default: project-root/.config/specwatch.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ProjectOpts {
    fn load(&self) -> Result<ProjectContext> {
        let root = match &self.project_root {
            Some(root) => root.clone(),
            None => {
                let current_dir = std::env::current_dir()
                    .map_err(|err| ExpectedError::CurrentDirInvalid { err })?;
                Utf8PathBuf::try_from(current_dir).map_err(|err| {
                    ExpectedError::CurrentDirInvalid {
                        err: err.into_io_error(),
                    }
                })?
            }
        };
        debug!("project root: {root}");

        let config = SpecwatchConfig::from_sources(&root, self.config_file.as_deref())?;
        let extractor = TitleExtractor::new(config.extract());
        Ok(ProjectContext {
            root,
            config,
            extractor,
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List spec files in the project, grouped by folder
    List,

    /// Show the suite title and test cases declared in a spec file
    Show {
        /// The spec file, relative to the project root
        spec: Utf8PathBuf,
    },

    /// Run a spec file and follow its progress
    ///
    /// If the project has no runner configuration file, the run is simulated.
    Run {
        /// The spec file, relative to the project root
        spec: Utf8PathBuf,

        /// Don't echo runner output, only test status and errors
        #[arg(long)]
        hide_transcript: bool,
    },

    /// Replay captured runner output against a spec file
    ///
    /// The log is fed through the same pipeline as a live run, which is useful to see how
    /// output is matched to tests.
    Replay {
        /// The spec file the log was captured from, relative to the project root
        #[arg(long)]
        spec: Utf8PathBuf,

        /// The captured output
        log: Utf8PathBuf,

        /// Feed the log in chunks of this many bytes
        #[arg(long, value_name = "BYTES", default_value = "4096")]
        chunk_size: NonZeroUsize,

        /// Exit code to end the run with
        #[arg(long, value_name = "CODE", default_value_t = 0, allow_negative_numbers = true)]
        exit_code: i32,

        /// End the run as if it had been stopped, without an exit code
        #[arg(long, conflicts_with = "exit_code")]
        stopped: bool,

        /// Don't echo the log, only test status and errors
        #[arg(long)]
        hide_transcript: bool,
    },

    /// Open a `path:line:col` location in the editor
    Open {
        /// The location, as printed in the error log
        location: String,
    },
}

#[derive(Debug)]
struct ProjectContext {
    root: Utf8PathBuf,
    config: SpecwatchConfig,
    extractor: TitleExtractor,
}

impl ProjectContext {
    /// Resolves a spec path given on the command line against the project root.
    fn resolve_spec(&self, spec: &Utf8Path) -> Result<Utf8PathBuf> {
        let path = self.root.join(spec);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ExpectedError::SpecNotFound { path })
        }
    }

    fn read_outline(&self, path: &Utf8Path) -> Result<SpecOutline> {
        let source = read_spec_source(path)?;
        let outline = self.extractor.extract(&source);
        if outline.test_titles.is_empty() {
            warn!("no test cases found in `{path}`");
        }
        Ok(outline)
    }
}

#[derive(Debug, Default)]
struct ListStyles {
    folder: Style,
    title: Style,
    count: Style,
}

impl ListStyles {
    fn new(output: OutputContext) -> Self {
        let mut styles = Self::default();
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            styles.folder = Style::new().magenta().bold();
            styles.title = Style::new().bold();
            styles.count = Style::new().bold();
        }
        styles
    }
}

fn exec_list(
    project: &ProjectContext,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let specs = scan_for_specs(
        &project.root,
        project.config.discovery(),
        &project.extractor,
    )?;
    if specs.is_empty() {
        info!("no spec files found under `{}`", project.root);
        return Ok(SpecwatchExitCode::OK);
    }

    let styles = ListStyles::new(output);
    let mut writer = output_writer.stdout_writer();
    for folder in group_by_folder(&specs) {
        writeln!(writer, "{}:", folder.name.style(styles.folder))
            .map_err(ExpectedError::write_output)?;
        for spec in folder.specs {
            writeln!(writer, "    {} ({})", spec.title.style(styles.title), spec.name)
                .map_err(ExpectedError::write_output)?;
        }
    }
    writer.flush().map_err(ExpectedError::write_output)?;
    Ok(SpecwatchExitCode::OK)
}

fn exec_show(
    project: &ProjectContext,
    spec: &Utf8Path,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let path = project.resolve_spec(spec)?;
    let outline = project.read_outline(&path)?;
    let name = path.file_name().unwrap_or(path.as_str());

    let styles = ListStyles::new(output);
    let mut writer = output_writer.stdout_writer();
    let count = outline.test_titles.len();
    writeln!(
        writer,
        "{} ({} {})",
        outline.suite_title_or(name).style(styles.title),
        count.style(styles.count),
        if count == 1 { "test" } else { "tests" },
    )
    .map_err(ExpectedError::write_output)?;
    for title in &outline.test_titles {
        writeln!(writer, "    {title}").map_err(ExpectedError::write_output)?;
    }
    writer.flush().map_err(ExpectedError::write_output)?;
    Ok(SpecwatchExitCode::OK)
}

fn exec_run(
    project: &ProjectContext,
    spec: &Utf8Path,
    hide_transcript: bool,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let path = project.resolve_spec(spec)?;
    let outline = project.read_outline(&path)?;
    let name = path.file_name().unwrap_or(path.as_str());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| ExpectedError::TokioRuntimeCreateError { err })?;
    let runner = SpecRunner::new(&project.root, project.config.runner());

    let mut driver = SessionDriver::new(project, hide_transcript, output, output_writer);
    driver.start(outline.suite_title_or(name), &outline.test_titles)?;

    let run_result = runtime.block_on(async {
        let mut process = match runner.start(&path) {
            Ok(process) => process,
            Err(err) => {
                driver.note(format!("Failed to start runner: {err}"))?;
                driver.complete(None)?;
                return Err(ExpectedError::from(err));
            }
        };
        driver.note(format!("> {}", process.description()))?;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ctrl_c_done = false;
        let mut exit_code = None;

        loop {
            tokio::select! {
                event = process.next_event() => match event {
                    Some(ProcessEvent::Chunk(chunk)) => driver.feed(&chunk)?,
                    Some(ProcessEvent::SpawnFailed(message)) => driver.note(message)?,
                    Some(ProcessEvent::Exited(code)) => {
                        exit_code = code;
                        match code {
                            Some(code) => driver.note(format!("Process exited with code {code}"))?,
                            None => driver.note("Process was stopped")?,
                        }
                    }
                    None => break,
                },
                res = &mut ctrl_c, if !ctrl_c_done => {
                    ctrl_c_done = true;
                    match res {
                        Ok(()) => {
                            info!("stopping run");
                            process.stop();
                        }
                        Err(error) => warn!("failed to listen for Ctrl-C: {error}"),
                    }
                }
            }
        }

        Ok::<_, ExpectedError>(exit_code)
    });
    let exit_code = match run_result {
        Ok(exit_code) => exit_code,
        Err(error @ ExpectedError::SpawnError { .. }) => {
            // The run was already completed, so every case is left unresolved in the panel.
            driver.finish()?;
            return Err(error);
        }
        Err(error) => return Err(error),
    };

    let stats = driver.complete(exit_code)?;
    driver.finish()?;
    run_exit_code(exit_code, stats)
}

#[derive(Copy, Clone, Debug)]
struct ReplayOpts {
    chunk_size: NonZeroUsize,
    exit_code: Option<i32>,
    hide_transcript: bool,
}

fn exec_replay(
    project: &ProjectContext,
    spec: &Utf8Path,
    log: &Utf8Path,
    opts: ReplayOpts,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let path = project.resolve_spec(spec)?;
    let outline = project.read_outline(&path)?;
    let name = path.file_name().unwrap_or(path.as_str());
    let log_bytes = std::fs::read(log).map_err(|err| ExpectedError::ReadLogError {
        path: log.to_owned(),
        err,
    })?;

    let mut driver = SessionDriver::new(project, opts.hide_transcript, output, output_writer);
    driver.start(outline.suite_title_or(name), &outline.test_titles)?;

    let mut decoder = ChunkDecoder::new();
    for chunk in log_bytes.chunks(opts.chunk_size.get()) {
        driver.feed(&decoder.decode(chunk))?;
    }
    driver.feed(&decoder.finish())?;

    let stats = driver.complete(opts.exit_code)?;
    driver.finish()?;
    run_exit_code(opts.exit_code, stats)
}

fn exec_open(project: &ProjectContext, location: &str) -> Result<i32> {
    let mut location: SourceLocation = location.parse()?;
    if location.path.is_relative() {
        location.path = project.root.join(&location.path);
    }
    EditorLauncher::new(project.config.editor()).open_at(&location)?;
    Ok(SpecwatchExitCode::OK)
}

/// Maps the end of a run to the process exit code.
fn run_exit_code(exit_code: Option<i32>, stats: RunStats) -> Result<i32> {
    if stats.failed > 0 || exit_code.is_some_and(|code| code != 0) {
        Err(ExpectedError::TestRunFailed)
    } else if exit_code.is_none() || stats.unresolved() > 0 {
        Err(ExpectedError::IncompleteRun {
            unresolved: stats.unresolved(),
        })
    } else {
        Ok(SpecwatchExitCode::OK)
    }
}

/// Connects a session controller to the terminal reporter.
struct SessionDriver<'a> {
    controller: SessionController,
    reporter: SessionReporter,
    writer: Box<dyn Write + 'a>,
    events: Vec<SessionEvent>,
}

impl<'a> SessionDriver<'a> {
    fn new(
        project: &ProjectContext,
        hide_transcript: bool,
        output: OutputContext,
        output_writer: &'a mut OutputWriter,
    ) -> Self {
        let mut reporter = SessionReporter::new(hide_transcript);
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            reporter.colorize();
        }
        Self {
            controller: SessionController::new(project.config.output()),
            reporter,
            writer: output_writer.stdout_writer(),
            events: Vec::new(),
        }
    }

    fn start(&mut self, suite_title: &str, titles: &[String]) -> Result<()> {
        let events = &mut self.events;
        self.controller
            .start_run(suite_title, titles, |event| events.push(event));
        self.report()
    }

    fn feed(&mut self, chunk: &str) -> Result<()> {
        let events = &mut self.events;
        self.controller.feed(chunk, |event| events.push(event));
        self.report()
    }

    fn note(&mut self, message: impl Into<String>) -> Result<()> {
        let events = &mut self.events;
        self.controller.note(message, |event| events.push(event));
        self.report()
    }

    fn complete(&mut self, exit_code: Option<i32>) -> Result<RunStats> {
        let events = &mut self.events;
        let stats = self
            .controller
            .complete(exit_code, |event| events.push(event))
            .unwrap_or_default();
        self.report()?;
        Ok(stats)
    }

    /// Writes the final state of every test and the error log.
    fn finish(mut self) -> Result<()> {
        if let Some(session) = self.controller.session() {
            writeln!(self.writer).map_err(ExpectedError::write_output)?;
            self.reporter
                .write_panel(session, &mut self.writer)
                .map_err(ExpectedError::write_output)?;
        }
        self.writer.flush().map_err(ExpectedError::write_output)
    }

    fn report(&mut self) -> Result<()> {
        for event in self.events.drain(..) {
            self.reporter
                .report_event(&event, &mut self.writer)
                .map_err(ExpectedError::write_output)?;
        }
        self.writer.flush().map_err(ExpectedError::write_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs;
    use test_case::test_case;

    #[test]
    fn verify_app() {
        SpecwatchApp::command().debug_assert();
    }

    #[test_case(&["specwatch", "list"]; "list")]
    #[test_case(&["specwatch", "--color", "never", "list", "-v"]; "global options")]
    #[test_case(&["specwatch", "show", "test/e2e/login.spec.js"]; "show")]
    #[test_case(&["specwatch", "run", "--hide-transcript", "a.spec.js"]; "run")]
    #[test_case(&["specwatch", "replay", "--spec", "a.spec.js", "out.log"]; "replay")]
    #[test_case(
        &["specwatch", "replay", "--spec", "a.spec.js", "--chunk-size", "3", "--exit-code", "-1", "out.log"];
        "replay with options"
    )]
    #[test_case(&["specwatch", "--project-root", "/p", "open", "/p/a.js:1:2"]; "open")]
    fn valid_args(args: &[&str]) {
        if let Err(error) = SpecwatchApp::try_parse_from(args) {
            panic!("{args:?} should parse: {error}");
        }
    }

    #[test_case(&["specwatch"]; "no subcommand")]
    #[test_case(&["specwatch", "run"]; "run without spec")]
    #[test_case(&["specwatch", "replay", "out.log"]; "replay without spec")]
    #[test_case(&["specwatch", "replay", "--spec", "a.spec.js", "--chunk-size", "0", "out.log"]; "zero chunk size")]
    #[test_case(
        &["specwatch", "replay", "--spec", "a.spec.js", "--exit-code", "1", "--stopped", "out.log"];
        "exit code and stopped"
    )]
    #[test_case(&["specwatch", "--color", "sometimes", "list"]; "bad color")]
    fn invalid_args(args: &[&str]) {
        SpecwatchApp::try_parse_from(args).expect_err("args should be rejected");
    }

    fn fixtures_dir() -> Utf8PathBuf {
        Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .expect("crate is in a workspace")
            .join("fixtures")
    }

    fn exec(args: &[&str]) -> (Result<i32>, String) {
        exec_in(&fixtures_dir().join("project"), args)
    }

    fn exec_in(project_root: &Utf8Path, args: &[&str]) -> (Result<i32>, String) {
        let mut full_args = vec!["specwatch", "--project-root", project_root.as_str()];
        full_args.extend_from_slice(args);
        let app = SpecwatchApp::try_parse_from(full_args).expect("args are valid");

        let mut output_writer = OutputWriter::Test {
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        let result = app.exec(OutputContext::for_test(), &mut output_writer);
        let OutputWriter::Test { stdout, .. } = output_writer else {
            unreachable!("test writer was used");
        };
        (result, String::from_utf8(stdout).expect("output is UTF-8"))
    }

    fn log_path(name: &str) -> String {
        fixtures_dir().join("logs").join(name).into_string()
    }

    #[test]
    fn list_fixture_project() {
        let (result, stdout) = exec(&["list"]);
        assert_eq!(result.expect("list succeeded"), 0);
        assert_eq!(
            stdout,
            "test/e2e:\n\
             \x20   Shopping Cart (cart.spec.ts)\n\
             \x20   Login Page (login.spec.js)\n\
             webapp/test/integration:\n\
             \x20   smoke.test.js (smoke.test.js)\n"
        );
    }

    #[test]
    fn show_fixture_spec() {
        let (result, stdout) = exec(&["show", "test/e2e/login.spec.js"]);
        assert_eq!(result.expect("show succeeded"), 0);
        assert_eq!(
            stdout,
            "Login Page (3 tests)\n\
             \x20   should display the login form\n\
             \x20   should login with valid credentials\n\
             \x20   should reject a wrong password\n"
        );
    }

    #[test]
    fn show_missing_spec() {
        let (result, _) = exec(&["show", "test/e2e/missing.spec.js"]);
        let error = result.expect_err("spec doesn't exist");
        assert_eq!(error.process_exit_code(), SpecwatchExitCode::SETUP_ERROR);
    }

    #[test]
    fn replay_passing_log() {
        let log = log_path("login-pass.log");
        let (result, stdout) = exec(&[
            "replay",
            "--spec",
            "test/e2e/login.spec.js",
            "--hide-transcript",
            &log,
        ]);
        assert_eq!(result.expect("all tests passed"), 0);
        assert!(
            stdout.contains("PASS [3/3] should reject a wrong password"),
            "{stdout}"
        );
        assert!(stdout.contains("Summary 3 passed, 0 failed;"), "{stdout}");
    }

    #[test]
    fn replay_failing_log() {
        let log = log_path("login-fail.log");
        let (result, stdout) = exec(&[
            "replay",
            "--spec",
            "test/e2e/login.spec.js",
            "--chunk-size",
            "7",
            "--exit-code",
            "1",
            &log,
        ]);
        let error = result.expect_err("a test failed");
        assert_eq!(
            error.process_exit_code(),
            SpecwatchExitCode::TEST_RUN_FAILED
        );
        assert!(stdout.contains("FAIL [3/3] should reject a wrong password"), "{stdout}");
        assert!(stdout.contains("\nErrors\n"), "{stdout}");
    }

    #[test]
    fn replay_stopped_run() {
        let log = log_path("login-crash.log");
        let (result, _) = exec(&[
            "replay",
            "--spec",
            "test/e2e/login.spec.js",
            "--stopped",
            &log,
        ]);
        let error = result.expect_err("run was stopped");
        assert!(
            matches!(error, ExpectedError::IncompleteRun { unresolved: 2 }),
            "{error:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn run_with_missing_runner_prints_panel() {
        let project = Utf8TempDir::new().expect("temp dir created");
        fs::create_dir_all(project.path().join(".config")).expect("config dir created");
        fs::write(
            project.path().join(".config/specwatch.toml"),
            indoc! {r#"
                [runner]
                detect-file = "wdio.conf.js"
                command = ["specwatch-missing-runner"]
            "#},
        )
        .expect("config written");
        fs::write(project.path().join("wdio.conf.js"), "").expect("runner config written");
        fs::create_dir_all(project.path().join("test")).expect("test dir created");
        fs::write(
            project.path().join("test/cart.spec.js"),
            indoc! {"
                describe('Cart', () => {
                    it('adds item', () => {});
                    it('removes item', () => {});
                });
            "},
        )
        .expect("spec written");

        let (result, stdout) = exec_in(project.path(), &["run", "test/cart.spec.js"]);
        let error = result.expect_err("runner is missing");
        assert_eq!(error.process_exit_code(), SpecwatchExitCode::SPAWN_FAILED);
        assert!(stdout.contains("Failed to start runner"), "{stdout}");
        assert!(
            stdout.ends_with(
                "; runner was stopped\n\
                 \n\
                 Cart\n\
                 \x20    RUNNING [1/2] adds item\n\
                 \x20     QUEUED [2/2] removes item\n"
            ),
            "{stdout}"
        );
    }

    #[test_case(Some(0), RunStats { declared: 2, passed: 2, ..Default::default() }, 0; "all passed")]
    #[test_case(Some(0), RunStats::default(), 0; "nothing declared")]
    #[test_case(None, RunStats { declared: 2, passed: 2, ..Default::default() }, 106; "stopped")]
    #[test_case(Some(1), RunStats { declared: 2, passed: 2, ..Default::default() }, 100; "non-zero exit")]
    #[test_case(Some(0), RunStats { declared: 2, passed: 1, failed: 1, ..Default::default() }, 100; "failed test")]
    #[test_case(Some(0), RunStats { declared: 2, passed: 1, ..Default::default() }, 106; "unresolved")]
    fn exit_code_mapping(exit_code: Option<i32>, stats: RunStats, expected: i32) {
        let actual = match run_exit_code(exit_code, stats) {
            Ok(code) => code,
            Err(error) => error.process_exit_code(),
        };
        assert_eq!(actual, expected);
    }
}
