//! Line-oriented channel to a UCI analysis engine.
//!
//! The channel owns the send side of a [`Transport`] and turns incoming lines
//! into [`EngineEvent`]s. Nothing here blocks: the host feeds lines in with
//! [`EngineChannel::receive`] as its transport delivers them.
//!
//! Every `go` is recorded against the subscription that was active when it
//! was sent. An engine answers each `go` with exactly one `bestmove`, in
//! order, so every `info`/`bestmove` line belongs to the oldest search still
//! outstanding. Lines owned by anything other than the active subscription
//! are dropped here and never reach a consumer.

use chess_core::UciMove;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, trace};
use uci::{EngineMessage, GuiCommand, Score};

/// Errors raised while handing a command to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The engine process or its writer has gone away.
    #[error("Engine channel closed")]
    Closed,
    /// The outbound queue is full.
    #[error("Engine channel full")]
    Full,
}

/// Outbound half of the connection to an engine.
pub trait Transport {
    /// Queue one protocol line (without trailing newline) for the engine.
    fn send_line(&mut self, line: String) -> Result<(), ChannelError>;
}

/// Identifies one subscription. Later subscriptions compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Structured engine output the analysis pipeline understands.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Search progress.
    Info {
        depth: Option<u32>,
        evaluation: Option<Score>,
        principal_variation: Vec<String>,
        target_depth: Option<u32>,
    },
    /// End of a search. `evaluation` and `depth` are the last ones the
    /// search reported.
    BestMove {
        mv: Option<UciMove>,
        evaluation: Option<Score>,
        depth: Option<u32>,
        target_depth: Option<u32>,
    },
}

/// An event together with the subscription it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub generation: Generation,
    pub event: EngineEvent,
}

/// A `go` command the engine has not answered yet.
#[derive(Debug, Clone)]
struct PendingSearch {
    owner: Option<Generation>,
    target_depth: Option<u32>,
    last_score: Option<Score>,
    last_depth: Option<u32>,
}

/// Command/event channel to one engine process.
pub struct EngineChannel<T: Transport> {
    transport: T,
    next_generation: u64,
    active: Option<Generation>,
    pending: VecDeque<PendingSearch>,
    engine_name: Option<String>,
    ready: bool,
}

impl<T: Transport> EngineChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_generation: 0,
            active: None,
            pending: VecDeque::new(),
            engine_name: None,
            ready: false,
        }
    }

    /// Starts the UCI handshake (`uci`, `isready`) without waiting for it.
    pub fn handshake(&mut self) -> Result<(), ChannelError> {
        self.send(&GuiCommand::Uci)?;
        self.send(&GuiCommand::IsReady)
    }

    /// Sends one command to the engine.
    pub fn send(&mut self, command: &GuiCommand) -> Result<(), ChannelError> {
        let line = command.to_uci();
        trace!(%line, "engine <");
        self.transport.send_line(line)?;
        if let GuiCommand::Go { depth } = command {
            self.pending.push_back(PendingSearch {
                owner: self.active,
                target_depth: Some(*depth),
                last_score: None,
                last_depth: None,
            });
        }
        Ok(())
    }

    /// Opens a new subscription, replacing the active one.
    pub fn subscribe(&mut self) -> Generation {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        self.active = Some(generation);
        generation
    }

    /// Closes `generation` if it is still the active subscription.
    pub fn unsubscribe(&mut self, generation: Generation) {
        if self.active == Some(generation) {
            self.active = None;
        }
    }

    /// The subscription events are currently delivered to.
    pub fn active(&self) -> Option<Generation> {
        self.active
    }

    /// Number of `go` commands still waiting for their `bestmove`.
    pub fn pending_searches(&self) -> usize {
        self.pending.len()
    }

    /// Engine name reported during the handshake.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    /// True once the engine has answered `isready`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Interprets one line of engine output.
    ///
    /// Returns `None` for lines outside the grammar, handshake lines, and
    /// events owned by a search that is not on the active subscription.
    pub fn receive(&mut self, line: &str) -> Option<ChannelEvent> {
        trace!(line = line.trim_end(), "engine >");
        match EngineMessage::parse(line)? {
            EngineMessage::Info(info) => {
                let search = self.pending.front_mut()?;
                if info.score.is_some() {
                    search.last_score = info.score;
                }
                if info.depth.is_some() {
                    search.last_depth = info.depth;
                }
                let owner = search.owner;
                let event = EngineEvent::Info {
                    depth: info.depth,
                    evaluation: info.score,
                    principal_variation: info.pv,
                    target_depth: search.target_depth,
                };
                self.deliver(owner, event)
            }
            EngineMessage::BestMove { mv, .. } => {
                let search = self.pending.pop_front()?;
                let event = EngineEvent::BestMove {
                    mv: mv.as_deref().and_then(UciMove::from_uci),
                    evaluation: search.last_score,
                    depth: search.last_depth,
                    target_depth: search.target_depth,
                };
                self.deliver(search.owner, event)
            }
            EngineMessage::Id { name, .. } => {
                if let Some(name) = name {
                    debug!(%name, "engine identified");
                    self.engine_name = Some(name);
                }
                None
            }
            EngineMessage::UciOk => None,
            EngineMessage::ReadyOk => {
                self.ready = true;
                None
            }
        }
    }

    fn deliver(&self, owner: Option<Generation>, event: EngineEvent) -> Option<ChannelEvent> {
        match (owner, self.active) {
            (Some(owner), Some(active)) if owner == active => Some(ChannelEvent {
                generation: owner,
                event,
            }),
            _ => {
                trace!(?owner, active = ?self.active, "dropping event for inactive subscription");
                None
            }
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Transport that records every line it is given.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub lines: Vec<String>,
        pub closed: bool,
    }

    impl Transport for RecordingTransport {
        fn send_line(&mut self, line: String) -> Result<(), ChannelError> {
            if self.closed {
                return Err(ChannelError::Closed);
            }
            self.lines.push(line);
            Ok(())
        }
    }

    fn channel() -> EngineChannel<RecordingTransport> {
        EngineChannel::new(RecordingTransport::default())
    }

    #[test]
    fn handshake_sends_uci_and_isready() {
        let mut ch = channel();
        ch.handshake().unwrap();
        assert_eq!(ch.transport().lines, vec!["uci", "isready"]);

        assert_eq!(ch.receive("id name Stockfish 16"), None);
        assert_eq!(ch.receive("uciok"), None);
        assert!(!ch.is_ready());
        assert_eq!(ch.receive("readyok"), None);
        assert!(ch.is_ready());
        assert_eq!(ch.engine_name(), Some("Stockfish 16"));
    }

    #[test]
    fn info_and_bestmove_reach_active_subscription() {
        let mut ch = channel();
        let generation = ch.subscribe();
        ch.send(&GuiCommand::go_depth(10)).unwrap();

        let info = ch.receive("info depth 10 score cp 34 pv e2e4 e7e5").unwrap();
        assert_eq!(info.generation, generation);
        assert_eq!(
            info.event,
            EngineEvent::Info {
                depth: Some(10),
                evaluation: Some(Score::Cp(34)),
                principal_variation: vec!["e2e4".to_string(), "e7e5".to_string()],
                target_depth: Some(10),
            }
        );

        let best = ch.receive("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(
            best.event,
            EngineEvent::BestMove {
                mv: UciMove::from_uci("e2e4"),
                evaluation: Some(Score::Cp(34)),
                depth: Some(10),
                target_depth: Some(10),
            }
        );
        assert_eq!(ch.pending_searches(), 0);
    }

    #[test]
    fn mate_info_without_pv() {
        let mut ch = channel();
        ch.subscribe();
        ch.send(&GuiCommand::go_depth(5)).unwrap();

        match ch.receive("info depth 5 score mate 3").map(|e| e.event) {
            Some(EngineEvent::Info {
                evaluation,
                principal_variation,
                ..
            }) => {
                assert_eq!(evaluation, Some(Score::Mate(3)));
                assert!(principal_variation.is_empty());
            }
            other => panic!("Expected Info, got {:?}", other),
        }
    }

    #[test]
    fn bestmove_keeps_last_known_score() {
        let mut ch = channel();
        ch.subscribe();
        ch.send(&GuiCommand::go_depth(8)).unwrap();
        ch.receive("info depth 8 score cp -20 pv d7d5");
        ch.receive("info depth 8 currmove g8f6 currmovenumber 2");

        match ch.receive("bestmove d7d5").map(|e| e.event) {
            Some(EngineEvent::BestMove { evaluation, .. }) => {
                assert_eq!(evaluation, Some(Score::Cp(-20)));
            }
            other => panic!("Expected BestMove, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_lines_are_ignored() {
        let mut ch = channel();
        ch.subscribe();
        ch.send(&GuiCommand::go_depth(8)).unwrap();
        assert_eq!(ch.receive("Stockfish 16 by the Stockfish developers"), None);
        assert_eq!(ch.receive(""), None);
        assert_eq!(ch.pending_searches(), 1);
    }

    #[test]
    fn lines_without_pending_search_are_dropped() {
        let mut ch = channel();
        ch.subscribe();
        assert_eq!(ch.receive("info string NNUE enabled"), None);
        assert_eq!(ch.receive("bestmove e2e4"), None);
    }

    #[test]
    fn superseded_search_is_dropped() {
        let mut ch = channel();
        let old = ch.subscribe();
        ch.send(&GuiCommand::go_depth(20)).unwrap();
        ch.unsubscribe(old);
        let new = ch.subscribe();
        ch.send(&GuiCommand::go_depth(8)).unwrap();

        // The old search is still draining.
        assert_eq!(ch.receive("info depth 19 score cp 12 pv a2a3"), None);
        assert_eq!(ch.receive("bestmove a2a3"), None);

        let event = ch.receive("info depth 1 score cp 40 pv e2e4").unwrap();
        assert_eq!(event.generation, new);
        assert!(new > old);
    }

    #[test]
    fn unsubscribe_ignores_stale_generation() {
        let mut ch = channel();
        let old = ch.subscribe();
        let new = ch.subscribe();
        ch.unsubscribe(old);
        assert_eq!(ch.active(), Some(new));
        ch.unsubscribe(new);
        assert_eq!(ch.active(), None);
    }

    #[test]
    fn malformed_bestmove_has_no_move() {
        let mut ch = channel();
        ch.subscribe();
        ch.send(&GuiCommand::go_depth(1)).unwrap();
        match ch.receive("bestmove (none)").map(|e| e.event) {
            Some(EngineEvent::BestMove { mv, .. }) => assert_eq!(mv, None),
            other => panic!("Expected BestMove, got {:?}", other),
        }
    }

    #[test]
    fn closed_transport_records_no_search() {
        let mut ch = channel();
        ch.subscribe();
        ch.transport.closed = true;
        assert_eq!(
            ch.send(&GuiCommand::go_depth(8)),
            Err(ChannelError::Closed)
        );
        assert_eq!(ch.pending_searches(), 0);
    }
}
