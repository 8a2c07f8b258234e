//! Iterative-deepening analysis of one position at a time.
//!
//! [`AnalysisPipeline::analyze`] starts a session: it resets the engine,
//! sets the position and searches to the first configured depth. Each
//! `bestmove` closes a depth step, reports a final result with the blunder
//! flag, and escalates to the next depth until the list is exhausted.
//!
//! Starting a session for a different position supersedes the one in
//! flight. Its remaining output is dropped, never delivered to either
//! callback.

use crate::engine::{
    ChannelError, ChannelEvent, EngineChannel, EngineEvent, Generation, Transport,
};
use crate::evaluation::SwingDetector;
use chess_core::Fen;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use uci::{GuiCommand, Score};

/// Errors returned by the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// `analyze` was given an empty depth list.
    #[error("No search depths configured")]
    NoDepths,
    /// A command could not be handed to the engine.
    #[error("Engine channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// A record delivered to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnalysisUpdate {
    /// The search is still running.
    Progress {
        /// First move of the current principal variation.
        best_move: Option<String>,
        evaluation: Option<Score>,
        /// `<reported depth>/<target depth>`, `?` when the engine gave none.
        depth_label: String,
        /// The session's flag as of the last completed depth.
        blunder: bool,
    },
    /// A depth step has completed.
    Final {
        best_move: Option<String>,
        evaluation: Option<Score>,
        depth: u32,
        depth_label: String,
        blunder: bool,
        /// Centipawn change against the previous depth of this session.
        delta: i32,
    },
    /// Informational message about the engine, e.g. that it failed to start.
    Diagnostic { message: String },
}

impl AnalysisUpdate {
    pub fn diagnostic(message: impl Into<String>) -> Self {
        AnalysisUpdate::Diagnostic {
            message: message.into(),
        }
    }

    pub fn depth_label(&self) -> Option<&str> {
        match self {
            AnalysisUpdate::Progress { depth_label, .. }
            | AnalysisUpdate::Final { depth_label, .. } => Some(depth_label),
            AnalysisUpdate::Diagnostic { .. } => None,
        }
    }
}

/// Receives the updates of one session.
pub type UpdateSink = Box<dyn FnMut(AnalysisUpdate) + Send>;

struct Session {
    generation: Generation,
    fen: Fen,
    depths: Vec<u32>,
    index: usize,
    swing: SwingDetector,
    on_event: UpdateSink,
}

impl Session {
    fn target_depth(&self) -> u32 {
        self.depths[self.index]
    }
}

/// Drives an engine through depth-escalating searches.
///
/// Owned by a single task; all state lives here rather than in globals.
pub struct AnalysisPipeline<T: Transport> {
    channel: EngineChannel<T>,
    last_fen: Option<Fen>,
    session: Option<Session>,
}

impl<T: Transport> AnalysisPipeline<T> {
    pub fn new(channel: EngineChannel<T>) -> Self {
        Self {
            channel,
            last_fen: None,
            session: None,
        }
    }

    /// Starts the engine handshake.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.channel.handshake()?;
        Ok(())
    }

    /// Starts analysing `fen` at each of `depths` in turn.
    ///
    /// Returns `Ok(false)` without touching the engine when `fen` is the
    /// position most recently started. Any session still in flight for a
    /// different position is stopped and its output discarded.
    pub fn analyze<F>(
        &mut self,
        fen: Fen,
        depths: &[u32],
        on_event: F,
    ) -> Result<bool, PipelineError>
    where
        F: FnMut(AnalysisUpdate) + Send + 'static,
    {
        if depths.is_empty() {
            return Err(PipelineError::NoDepths);
        }
        if self.last_fen.as_ref() == Some(&fen) {
            debug!(%fen, "position unchanged, skipping analysis");
            return Ok(false);
        }

        self.cancel()?;

        let generation = self.channel.subscribe();
        info!(%fen, ?depths, ?generation, "starting analysis");
        let started = self.begin(&fen, depths[0]);
        if let Err(e) = started {
            self.channel.unsubscribe(generation);
            return Err(e);
        }

        self.last_fen = Some(fen.clone());
        self.session = Some(Session {
            generation,
            fen,
            depths: depths.to_vec(),
            index: 0,
            swing: SwingDetector::new(),
            on_event: Box::new(on_event),
        });
        Ok(true)
    }

    fn begin(&mut self, fen: &Fen, first_depth: u32) -> Result<(), PipelineError> {
        self.channel.send(&GuiCommand::UciNewGame)?;
        self.channel.send(&GuiCommand::position_fen(fen.to_string()))?;
        search(&mut self.channel, fen, first_depth)
    }

    /// Feeds one line of engine output through the pipeline.
    pub fn handle_line(&mut self, line: &str) -> Result<(), PipelineError> {
        let Some(ChannelEvent { generation, event }) = self.channel.receive(line) else {
            return Ok(());
        };
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.generation != generation {
            trace!(?generation, "event for finished session");
            return Ok(());
        }

        match event {
            EngineEvent::Info {
                depth,
                evaluation,
                principal_variation,
                target_depth,
            } => {
                let target = target_depth.unwrap_or_else(|| session.target_depth());
                let update = AnalysisUpdate::Progress {
                    best_move: principal_variation.into_iter().next(),
                    evaluation,
                    depth_label: depth_label(depth, target),
                    blunder: session.swing.blunder(),
                };
                (session.on_event)(update);
                Ok(())
            }
            EngineEvent::BestMove { mv, evaluation, .. } => {
                let target = session.target_depth();
                let swing = session.swing.record(evaluation);
                if swing.blunder {
                    debug!(delta = swing.delta, depth = target, "evaluation dropped");
                }
                (session.on_event)(AnalysisUpdate::Final {
                    best_move: mv.map(|m| m.to_uci()),
                    evaluation,
                    depth: target,
                    depth_label: depth_label(Some(target), target),
                    blunder: swing.blunder,
                    delta: swing.delta,
                });

                session.index += 1;
                match session.depths.get(session.index).copied() {
                    Some(next) => {
                        debug!(depth = next, "escalating search depth");
                        let result = search(&mut self.channel, &session.fen, next);
                        if result.is_err() {
                            warn!("engine channel failed, abandoning session");
                            self.finish();
                        }
                        result
                    }
                    None => {
                        info!(fen = %session.fen, "analysis complete");
                        self.finish();
                        Ok(())
                    }
                }
            }
        }
    }

    /// Stops the session in flight, if any, and drops its subscription.
    ///
    /// The position stays remembered, so analysing it again is still a no-op
    /// until [`reset`](Self::reset).
    pub fn cancel(&mut self) -> Result<(), PipelineError> {
        if let Some(session) = self.session.take() {
            info!(fen = %session.fen, "superseding analysis");
            self.channel.unsubscribe(session.generation);
            self.channel.send(&GuiCommand::Stop)?;
        }
        Ok(())
    }

    /// Forgets the last analysed position so it can be analysed again.
    pub fn reset(&mut self) {
        self.last_fen = None;
    }

    fn finish(&mut self) {
        if let Some(session) = self.session.take() {
            self.channel.unsubscribe(session.generation);
        }
    }

    /// True when no session is in flight.
    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    /// Position of the session in flight.
    pub fn active_fen(&self) -> Option<&Fen> {
        self.session.as_ref().map(|s| &s.fen)
    }

    /// True once the engine has answered the startup handshake.
    pub fn engine_ready(&self) -> bool {
        self.channel.is_ready()
    }

    /// Position most recently started, finished or not.
    pub fn last_fen(&self) -> Option<&Fen> {
        self.last_fen.as_ref()
    }

    pub fn channel(&self) -> &EngineChannel<T> {
        &self.channel
    }
}

fn search<T: Transport>(
    channel: &mut EngineChannel<T>,
    fen: &Fen,
    depth: u32,
) -> Result<(), PipelineError> {
    channel.send(&GuiCommand::position_fen(fen.to_string()))?;
    channel.send(&GuiCommand::go_depth(depth))?;
    Ok(())
}

fn depth_label(depth: Option<u32>, target: u32) -> String {
    match depth {
        Some(d) => format!("{}/{}", d, target),
        None => format!("?/{}", target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::RecordingTransport;
    use std::sync::{Arc, Mutex};

    type Updates = Arc<Mutex<Vec<AnalysisUpdate>>>;

    fn pipeline() -> AnalysisPipeline<RecordingTransport> {
        AnalysisPipeline::new(EngineChannel::new(RecordingTransport::default()))
    }

    fn collector() -> (Updates, impl FnMut(AnalysisUpdate) + Send + 'static) {
        let updates: Updates = Arc::default();
        let sink = Arc::clone(&updates);
        (updates, move |u| sink.lock().unwrap().push(u))
    }

    fn sent(p: &AnalysisPipeline<RecordingTransport>) -> Vec<String> {
        p.channel().transport().lines.clone()
    }

    fn start_fen() -> Fen {
        Fen::default()
    }

    fn other_fen() -> Fen {
        Fen::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap()
    }

    #[test]
    fn session_opens_with_reset_position_and_first_search() {
        let mut p = pipeline();
        let (_, sink) = collector();
        assert_eq!(p.analyze(start_fen(), &[8, 12], sink), Ok(true));

        let position = format!("position fen {}", Fen::STARTPOS);
        assert_eq!(
            sent(&p),
            vec![
                "ucinewgame".to_string(),
                position.clone(),
                position,
                "go depth 8".to_string(),
            ]
        );
        assert_eq!(p.active_fen(), Some(&start_fen()));
    }

    #[test]
    fn progress_carries_partial_move_and_depth_label() {
        let mut p = pipeline();
        let (updates, sink) = collector();
        p.analyze(start_fen(), &[8, 12], sink).unwrap();
        p.handle_line("info depth 3 score cp 34 pv e2e4 e7e5").unwrap();
        p.handle_line("info score cp 30").unwrap();

        let updates = updates.lock().unwrap();
        assert_eq!(
            updates[0],
            AnalysisUpdate::Progress {
                best_move: Some("e2e4".to_string()),
                evaluation: Some(Score::Cp(34)),
                depth_label: "3/8".to_string(),
                blunder: false,
            }
        );
        assert_eq!(updates[1].depth_label(), Some("?/8"));
    }

    #[test]
    fn escalates_then_completes() {
        let mut p = pipeline();
        let (updates, sink) = collector();
        p.analyze(start_fen(), &[8, 12], sink).unwrap();

        p.handle_line("info depth 8 score cp 25 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(sent(&p).last().map(String::as_str), Some("go depth 12"));
        assert!(!p.is_idle());

        p.handle_line("info depth 12 score cp 31 pv d2d4").unwrap();
        p.handle_line("bestmove d2d4").unwrap();
        assert!(p.is_idle());
        assert_eq!(p.channel().active(), None);
        assert_eq!(sent(&p).iter().filter(|l| l.starts_with("go")).count(), 2);

        let finals: Vec<_> = updates
            .lock()
            .unwrap()
            .iter()
            .filter(|u| matches!(u, AnalysisUpdate::Final { .. }))
            .cloned()
            .collect();
        assert_eq!(
            finals,
            vec![
                AnalysisUpdate::Final {
                    best_move: Some("e2e4".to_string()),
                    evaluation: Some(Score::Cp(25)),
                    depth: 8,
                    depth_label: "8/8".to_string(),
                    blunder: false,
                    delta: 0,
                },
                AnalysisUpdate::Final {
                    best_move: Some("d2d4".to_string()),
                    evaluation: Some(Score::Cp(31)),
                    depth: 12,
                    depth_label: "12/12".to_string(),
                    blunder: false,
                    delta: 6,
                },
            ]
        );
    }

    #[test]
    fn depth_over_depth_drop_flags_blunder() {
        let mut p = pipeline();
        let (updates, sink) = collector();
        p.analyze(start_fen(), &[8, 12], sink).unwrap();
        p.handle_line("info depth 8 score cp 100 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();
        p.handle_line("info depth 12 score cp -50 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();

        let updates = updates.lock().unwrap();
        match updates.last() {
            Some(AnalysisUpdate::Final { blunder, delta, .. }) => {
                assert_eq!(*delta, -150);
                assert!(*blunder);
            }
            other => panic!("Expected Final, got {:?}", other),
        }
    }

    #[test]
    fn drop_of_exactly_one_pawn_is_not_flagged() {
        let mut p = pipeline();
        let (updates, sink) = collector();
        p.analyze(start_fen(), &[8, 12], sink).unwrap();
        p.handle_line("info depth 8 score cp 100 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();
        p.handle_line("info depth 12 score cp 0 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();

        let updates = updates.lock().unwrap();
        assert!(matches!(
            updates.last(),
            Some(AnalysisUpdate::Final {
                blunder: false,
                delta: -100,
                ..
            })
        ));
    }

    #[test]
    fn progress_reports_session_blunder_flag() {
        let mut p = pipeline();
        let (updates, sink) = collector();
        p.analyze(start_fen(), &[4, 8, 12], sink).unwrap();
        p.handle_line("info depth 4 score cp 200 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();
        p.handle_line("info depth 8 score cp 0 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();
        p.handle_line("info depth 9 score cp 0 pv e2e4").unwrap();

        let updates = updates.lock().unwrap();
        assert!(matches!(
            updates.last(),
            Some(AnalysisUpdate::Progress { blunder: true, .. })
        ));
    }

    #[test]
    fn same_position_is_not_reanalysed() {
        let mut p = pipeline();
        let (_, sink) = collector();
        p.analyze(start_fen(), &[8], sink).unwrap();
        let before = sent(&p).len();

        let (_, sink) = collector();
        assert_eq!(p.analyze(start_fen(), &[8], sink), Ok(false));
        assert_eq!(sent(&p).len(), before);
    }

    #[test]
    fn reset_allows_reanalysis() {
        let mut p = pipeline();
        let (_, sink) = collector();
        p.analyze(start_fen(), &[8], sink).unwrap();
        p.handle_line("bestmove e2e4").unwrap();
        p.reset();

        let (_, sink) = collector();
        assert_eq!(p.analyze(start_fen(), &[8], sink), Ok(true));
    }

    #[test]
    fn empty_depths_rejected() {
        let mut p = pipeline();
        let (_, sink) = collector();
        assert_eq!(p.analyze(start_fen(), &[], sink), Err(PipelineError::NoDepths));
        assert!(sent(&p).is_empty());
    }

    #[test]
    fn new_position_supersedes_session_in_flight() {
        let mut p = pipeline();
        let (first, sink_a) = collector();
        p.analyze(start_fen(), &[8, 12], sink_a).unwrap();
        p.handle_line("info depth 5 score cp 20 pv e2e4").unwrap();
        let seen_by_a = first.lock().unwrap().len();

        let (second, sink_b) = collector();
        assert_eq!(p.analyze(other_fen(), &[6, 10], sink_b), Ok(true));
        assert!(sent(&p).contains(&"stop".to_string()));

        // Old search drains, then the new one reports.
        p.handle_line("info depth 8 score cp 22 pv e2e4").unwrap();
        p.handle_line("bestmove e2e4").unwrap();
        p.handle_line("info depth 6 score cp -30 pv e7e5").unwrap();
        p.handle_line("bestmove e7e5").unwrap();

        assert_eq!(first.lock().unwrap().len(), seen_by_a);
        let second = second.lock().unwrap();
        assert!(second
            .iter()
            .all(|u| u.depth_label().is_some_and(|l| l.ends_with("/6"))));
        assert_eq!(second.len(), 2);
        assert_eq!(sent(&p).last().map(String::as_str), Some("go depth 10"));
    }

    #[test]
    fn cancel_stops_without_new_session() {
        let mut p = pipeline();
        let (updates, sink) = collector();
        p.analyze(start_fen(), &[8], sink).unwrap();
        p.cancel().unwrap();
        assert!(p.is_idle());
        assert_eq!(sent(&p).last().map(String::as_str), Some("stop"));

        p.handle_line("bestmove e2e4").unwrap();
        assert!(updates.lock().unwrap().is_empty());
        assert_eq!(p.last_fen(), Some(&start_fen()));
    }

    #[test]
    fn updates_serialize_scores_in_display_form() {
        let progress = AnalysisUpdate::Progress {
            best_move: Some("h5f7".to_string()),
            evaluation: Some(Score::Mate(3)),
            depth_label: "7/8".to_string(),
            blunder: false,
        };
        assert_eq!(
            serde_json::to_string(&progress).unwrap(),
            concat!(
                r#"{"kind":"progress","best_move":"h5f7","evaluation":"M3","#,
                r#""depth_label":"7/8","blunder":false}"#
            )
        );

        let fin = AnalysisUpdate::Final {
            best_move: None,
            evaluation: Some(Score::Cp(-34)),
            depth: 8,
            depth_label: "8/8".to_string(),
            blunder: true,
            delta: -150,
        };
        let json: serde_json::Value = serde_json::to_value(&fin).unwrap();
        assert_eq!(json["evaluation"], "-0.34");
        assert_eq!(json["best_move"], serde_json::Value::Null);
    }

    #[test]
    fn failed_send_does_not_remember_position() {
        let mut p = AnalysisPipeline::new(EngineChannel::new(RecordingTransport {
            lines: Vec::new(),
            closed: true,
        }));
        let (_, sink) = collector();
        assert_eq!(
            p.analyze(start_fen(), &[8], sink),
            Err(PipelineError::Channel(ChannelError::Closed))
        );
        assert!(p.is_idle());
        assert_eq!(p.last_fen(), None);
        assert_eq!(p.channel().active(), None);
    }
}
