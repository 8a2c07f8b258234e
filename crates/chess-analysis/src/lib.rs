//! Live-board position extraction and iterative engine analysis.
//!
//! # Overview
//!
//! - [`BoardSnapshot`] - Square to piece observation map read off a rendered board
//! - [`extract`] - Reconstructs a FEN from a snapshot
//! - [`EngineChannel`] - UCI command/event channel with generation subscriptions
//! - [`AnalysisPipeline`] - Depth-escalating searches with blunder detection
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{extract, AnalysisPipeline, EngineChannel};
//!
//! let mut pipeline = AnalysisPipeline::new(EngineChannel::new(transport));
//! pipeline.start()?;
//! pipeline.analyze(extract(&snapshot), &[8, 12, 15], |update| println!("{:?}", update))?;
//! for line in engine_output {
//!     pipeline.handle_line(&line)?;
//! }
//! ```

pub mod engine;
pub mod evaluation;
pub mod extract;
pub mod pipeline;
pub mod snapshot;

pub use engine::{ChannelError, ChannelEvent, EngineChannel, EngineEvent, Generation, Transport};
pub use evaluation::{Swing, SwingDetector, BLUNDER_THRESHOLD_CP};
pub use extract::extract;
pub use pipeline::{AnalysisPipeline, AnalysisUpdate, PipelineError, UpdateSink};
pub use snapshot::{BoardSnapshot, PieceObservation, PieceSource};
pub use uci::Score as Evaluation;
