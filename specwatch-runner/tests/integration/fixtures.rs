// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use specwatch_runner::{
    config::SpecwatchConfig,
    discovery::read_spec_source,
    events::{RunStats, SessionEvent},
    line_buffer::ChunkDecoder,
    session::SessionController,
    title::TitleExtractor,
};

pub(crate) fn fixtures_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crate is in a workspace")
        .join("fixtures")
}

pub(crate) fn project_root() -> Utf8PathBuf {
    fixtures_dir().join("project")
}

pub(crate) fn read_log(name: &str) -> Vec<u8> {
    let path = fixtures_dir().join("logs").join(name);
    std::fs::read(&path).unwrap_or_else(|err| panic!("failed to read `{path}`: {err}"))
}

/// The result of replaying a log through a session.
#[derive(Debug)]
pub(crate) struct Replay {
    pub(crate) controller: SessionController,
    pub(crate) events: Vec<SessionEvent>,
    pub(crate) stats: RunStats,
}

/// Replays a captured log for the login spec of the fixture project, `chunk_size` bytes at a
/// time, and completes the run with `exit_code`.
pub(crate) fn replay_login(log: &str, chunk_size: usize, exit_code: Option<i32>) -> Replay {
    let config = SpecwatchConfig::from_sources(project_root(), None).expect("fixture config is valid");
    let source = read_spec_source(&project_root().join("test/e2e/login.spec.js"))
        .expect("fixture spec is readable");
    let outline = TitleExtractor::new(config.extract()).extract(&source);

    let mut controller = SessionController::new(config.output());
    let mut events = Vec::new();
    controller.start_run(
        outline.suite_title_or("login.spec.js"),
        &outline.test_titles,
        |event| events.push(event),
    );

    let mut decoder = ChunkDecoder::new();
    for chunk in read_log(log).chunks(chunk_size) {
        let text = decoder.decode(chunk);
        controller.feed(&text, |event| events.push(event));
    }
    let rest = decoder.finish();
    controller.feed(&rest, |event| events.push(event));

    let stats = controller
        .complete(exit_code, |event| events.push(event))
        .expect("run was in progress");

    Replay {
        controller,
        events,
        stats,
    }
}
