//! Debounced board watcher driving the analysis pipeline.
//!
//! Snapshots arrive whenever the board changes. Analysis starts only after
//! the board has been quiet for the debounce period, so a burst of redraws
//! yields one extraction. Without an engine the watcher keeps extracting and
//! logging positions but analyses nothing.

use crate::session::{EngineProcess, EngineTransport};
use chess_analysis::{
    extract, AnalysisPipeline, AnalysisUpdate, BoardSnapshot, EngineChannel, PipelineError,
    Transport,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

pub struct Watcher<T: Transport> {
    pipeline: Option<AnalysisPipeline<T>>,
    depths: Vec<u32>,
    debounce: Duration,
    results: mpsc::UnboundedSender<AnalysisUpdate>,
}

impl<T: Transport> Watcher<T> {
    /// A watcher with no engine attached.
    pub fn new(
        depths: Vec<u32>,
        debounce: Duration,
        results: mpsc::UnboundedSender<AnalysisUpdate>,
    ) -> Self {
        Self {
            pipeline: None,
            depths,
            debounce,
            results,
        }
    }

    pub fn with_pipeline(mut self, pipeline: AnalysisPipeline<T>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Runs until the snapshot stream ends and nothing is left to analyse.
    ///
    /// A snapshot still waiting out its debounce period when the stream ends
    /// is analysed immediately.
    pub async fn run(
        mut self,
        mut snapshots: mpsc::Receiver<BoardSnapshot>,
        mut engine_lines: mpsc::Receiver<String>,
    ) {
        let mut pending: Option<BoardSnapshot> = None;
        let mut deadline: Option<Instant> = None;
        let mut input_open = true;
        let mut engine_open = self.pipeline.is_some();

        loop {
            if !input_open && pending.is_none() && self.is_idle() {
                break;
            }

            tokio::select! {
                snapshot = snapshots.recv(), if input_open => match snapshot {
                    Some(snapshot) => {
                        pending = Some(snapshot);
                        deadline = Some(Instant::now() + self.debounce);
                    }
                    None => {
                        debug!("snapshot stream closed");
                        input_open = false;
                        deadline = None;
                        if let Some(snapshot) = pending.take() {
                            self.trigger(&snapshot);
                        }
                    }
                },
                line = engine_lines.recv(), if engine_open => match line {
                    Some(line) => self.handle_engine_line(&line),
                    None => {
                        engine_open = false;
                        self.engine_lost("engine exited");
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    if let Some(snapshot) = pending.take() {
                        self.trigger(&snapshot);
                    }
                },
                else => break,
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.pipeline.as_ref().map_or(true, |p| p.is_idle())
    }

    fn trigger(&mut self, snapshot: &BoardSnapshot) {
        let fen = extract(snapshot);
        let Some(pipeline) = self.pipeline.as_mut() else {
            info!(%fen, "position extracted, no engine attached");
            return;
        };

        let results = self.results.clone();
        let sink = move |update| {
            let _ = results.send(update);
        };
        match pipeline.analyze(fen, &self.depths, sink) {
            Ok(true) => {}
            Ok(false) => debug!("board unchanged"),
            Err(PipelineError::NoDepths) => warn!("no search depths configured"),
            Err(PipelineError::Channel(e)) => self.engine_lost(&e.to_string()),
        }
    }

    fn handle_engine_line(&mut self, line: &str) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if let Err(e) = pipeline.handle_line(line) {
            self.engine_lost(&e.to_string());
        }
    }

    fn engine_lost(&mut self, reason: &str) {
        if self.pipeline.take().is_some() {
            warn!(%reason, "engine lost, analysis disabled");
            let _ = self
                .results
                .send(AnalysisUpdate::diagnostic(format!("{}; analysis disabled", reason)));
        }
    }
}

impl Watcher<EngineTransport> {
    /// Starts `command` and attaches it, or reports it unavailable and stays
    /// in degraded mode.
    ///
    /// The engine's output is forwarded to `lines`. The returned process, if
    /// any, must be stopped by the caller.
    pub fn spawn_engine(
        mut self,
        command: &str,
        lines: mpsc::Sender<String>,
    ) -> (Self, Option<EngineProcess>) {
        let process = match EngineProcess::spawn(command, lines) {
            Ok(process) => process,
            Err(e) => {
                self.report_unavailable(&e.to_string());
                return (self, None);
            }
        };

        let mut pipeline = AnalysisPipeline::new(EngineChannel::new(process.transport()));
        match pipeline.start() {
            Ok(()) => self.pipeline = Some(pipeline),
            Err(e) => self.report_unavailable(&e.to_string()),
        }
        (self, Some(process))
    }

    fn report_unavailable(&self, reason: &str) {
        warn!(%reason, "engine unavailable");
        let _ = self.results.send(AnalysisUpdate::diagnostic(format!(
            "engine unavailable: {}; analysis disabled",
            reason
        )));
    }
}
