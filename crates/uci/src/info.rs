//! UCI info line types.

use serde::{Serialize, Serializer};
use std::fmt;

/// Magnitude used when a mate score has to be compared with centipawns.
///
/// Mate in N maps to `MATE_CP - N`, mated in N to `-(MATE_CP - N)`, so every
/// winning mate ranks above any centipawn score and faster mates rank higher.
pub const MATE_CP: i32 = 100_000;

/// Longer mate distances are treated as this one, so even a malformed
/// `score mate -2147483648` stays a losing extreme.
pub const MAX_MATE_DISTANCE: i32 = 1_000;

/// Score in centipawns or mate distance, from the side to move's view.
///
/// Serializes as its display form: `"0.34"`, `"M3"`, `"-M2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N (positive = side to move mates, negative or zero = gets mated).
    Mate(i32),
}

impl Score {
    /// Returns the score on a single centipawn scale.
    pub fn to_centipawns(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(m) if m > 0 => MATE_CP - m.min(MAX_MATE_DISTANCE),
            Score::Mate(m) => -(MATE_CP - m.saturating_neg().min(MAX_MATE_DISTANCE)),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Score::Cp(cp) => write!(f, "{:.2}", f64::from(cp) / 100.0),
            Score::Mate(m) if m > 0 => write!(f, "M{}", m),
            Score::Mate(m) => write!(f, "-M{}", m.unsigned_abs()),
        }
    }
}

/// Search information from engine.
///
/// Every field is optional; a field missing from the line stays `None`
/// rather than defaulting to zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Which line this is when the engine reports several.
    pub multipv: Option<u32>,
    /// Score evaluation.
    pub score: Option<Score>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    /// Current move being searched.
    pub currmove: Option<String>,
    /// Current move number.
    pub currmovenumber: Option<u32>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Arbitrary string info.
    pub string: Option<String>,
}

impl EngineInfo {
    /// Create a new empty info.
    pub fn new() -> Self {
        Self::default()
    }

    /// First move of the principal variation.
    pub fn best_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }

    /// Format as UCI info string.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(d) = self.seldepth {
            parts.push(format!("seldepth {}", d));
        }
        if let Some(m) = self.multipv {
            parts.push(format!("multipv {}", m));
        }
        match self.score {
            Some(Score::Cp(cp)) => parts.push(format!("score cp {}", cp)),
            Some(Score::Mate(m)) => parts.push(format!("score mate {}", m)),
            None => {}
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {}", n));
        }
        if let Some(n) = self.nps {
            parts.push(format!("nps {}", n));
        }
        if let Some(t) = self.time {
            parts.push(format!("time {}", t));
        }
        if let Some(h) = self.hashfull {
            parts.push(format!("hashfull {}", h));
        }
        if let Some(ref m) = self.currmove {
            parts.push(format!("currmove {}", m));
        }
        if let Some(n) = self.currmovenumber {
            parts.push(format!("currmovenumber {}", n));
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }
        if let Some(ref s) = self.string {
            parts.push(format!("string {}", s));
        }

        parts.join(" ")
    }

    /// Parse UCI info line.
    ///
    /// Returns `None` unless the first token is `info`. Unknown tokens and
    /// malformed values are skipped, never rejected.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"info") {
            return None;
        }

        let mut info = EngineInfo::new();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        info.depth = parts[i].parse().ok();
                    }
                }
                "seldepth" => {
                    i += 1;
                    if i < parts.len() {
                        info.seldepth = parts[i].parse().ok();
                    }
                }
                "multipv" => {
                    i += 1;
                    if i < parts.len() {
                        info.multipv = parts[i].parse().ok();
                    }
                }
                "score" => {
                    i += 1;
                    if i + 1 < parts.len() {
                        let value = parts[i + 1].parse().ok();
                        info.score = match (parts[i], value) {
                            ("cp", Some(cp)) => Some(Score::Cp(cp)),
                            ("mate", Some(m)) => Some(Score::Mate(m)),
                            _ => info.score,
                        };
                        i += 1;
                    }
                }
                "nodes" => {
                    i += 1;
                    if i < parts.len() {
                        info.nodes = parts[i].parse().ok();
                    }
                }
                "nps" => {
                    i += 1;
                    if i < parts.len() {
                        info.nps = parts[i].parse().ok();
                    }
                }
                "time" => {
                    i += 1;
                    if i < parts.len() {
                        info.time = parts[i].parse().ok();
                    }
                }
                "pv" => {
                    i += 1;
                    // Collect all remaining moves until another keyword or end
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue; // Don't increment i again
                }
                "currmove" => {
                    i += 1;
                    if i < parts.len() {
                        info.currmove = Some(parts[i].to_string());
                    }
                }
                "currmovenumber" => {
                    i += 1;
                    if i < parts.len() {
                        info.currmovenumber = parts[i].parse().ok();
                    }
                }
                "hashfull" => {
                    i += 1;
                    if i < parts.len() {
                        info.hashfull = parts[i].parse().ok();
                    }
                }
                "string" => {
                    // Rest of line is the string
                    info.string = Some(parts[i + 1..].join(" "));
                    break;
                }
                // lowerbound / upperbound and engine-specific tokens
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "string"
    )
}

/// Builder for constructing EngineInfo.
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn nodes(mut self, n: u64) -> Self {
        self.info.nodes = Some(n);
        self
    }

    pub fn pv(mut self, moves: &[&str]) -> Self {
        self.info.pv = moves.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.info.string = Some(s.to_string());
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_to_uci() {
        let info = InfoBuilder::new()
            .depth(10)
            .score_cp(35)
            .nodes(50000)
            .pv(&["e2e4", "e7e5"])
            .build();

        let uci = info.to_uci();
        assert!(uci.contains("depth 10"));
        assert!(uci.contains("score cp 35"));
        assert!(uci.contains("nodes 50000"));
        assert!(uci.ends_with("pv e2e4 e7e5"));
    }

    #[test]
    fn parse_info() {
        let line = "info depth 12 score cp 30 nodes 125000 nps 500000 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(12));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.nodes, Some(125000));
        assert_eq!(info.nps, Some(500000));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn parse_centipawns() {
        let info = EngineInfo::parse("info depth 10 score cp 34 pv e2e4 e7e5").unwrap();

        assert_eq!(info.depth, Some(10));
        assert_eq!(info.score.map(|s| s.to_string()).as_deref(), Some("0.34"));
        assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
        assert_eq!(info.best_move(), Some("e2e4"));
    }

    #[test]
    fn parse_mate_without_pv() {
        let info = EngineInfo::parse("info depth 5 score mate 3").unwrap();

        assert_eq!(info.score, Some(Score::Mate(3)));
        assert!(info.pv.is_empty());
        assert_eq!(info.best_move(), None);
    }

    #[test]
    fn absent_fields_stay_unknown() {
        let info = EngineInfo::parse("info nodes 1000").unwrap();
        assert_eq!(info.depth, None);
        assert_eq!(info.score, None);
        assert_eq!(info.nodes, Some(1000));
    }

    #[test]
    fn bound_markers_are_ignored() {
        let line = "info depth 18 seldepth 24 multipv 1 score cp -21 upperbound nodes 9 pv d7d5";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(info.score, Some(Score::Cp(-21)));
        assert_eq!(info.seldepth, Some(24));
        assert_eq!(info.multipv, Some(1));
        assert_eq!(info.nodes, Some(9));
        assert_eq!(info.pv, vec!["d7d5"]);
    }

    #[test]
    fn malformed_values_are_tolerated() {
        let info = EngineInfo::parse("info depth x score cp").unwrap();
        assert_eq!(info.depth, None);
        assert_eq!(info.score, None);

        let info = EngineInfo::parse("info string NNUE evaluation using nn.bin").unwrap();
        assert_eq!(info.string.as_deref(), Some("NNUE evaluation using nn.bin"));
    }

    #[test]
    fn non_info_lines_rejected() {
        assert!(EngineInfo::parse("bestmove e2e4").is_none());
        assert!(EngineInfo::parse("information depth 3").is_none());
        assert!(EngineInfo::parse("").is_none());
    }

    #[test]
    fn mate_ranks_beyond_centipawns() {
        assert!(Score::Mate(5).to_centipawns() > Score::Cp(5000).to_centipawns());
        assert!(Score::Mate(1).to_centipawns() > Score::Mate(5).to_centipawns());
        assert!(Score::Mate(-5).to_centipawns() < Score::Cp(-5000).to_centipawns());
        assert!(Score::Mate(-1).to_centipawns() < Score::Mate(-5).to_centipawns());
        assert!(Score::Mate(0).to_centipawns() < Score::Mate(-1).to_centipawns());
    }

    #[test]
    fn extreme_mate_distances_stay_extreme() {
        let losing = Score::Cp(-(MATE_CP - MAX_MATE_DISTANCE)).to_centipawns();
        assert_eq!(Score::Mate(-100_000).to_centipawns(), losing);
        assert_eq!(Score::Mate(i32::MIN).to_centipawns(), losing);
        assert_eq!(
            Score::Mate(i32::MAX).to_centipawns(),
            MATE_CP - MAX_MATE_DISTANCE
        );
        assert!(Score::Mate(i32::MIN).to_centipawns() < Score::Cp(-10_000).to_centipawns());
    }

    #[test]
    fn score_display() {
        assert_eq!(Score::Cp(34).to_string(), "0.34");
        assert_eq!(Score::Cp(-150).to_string(), "-1.50");
        assert_eq!(Score::Mate(3).to_string(), "M3");
        assert_eq!(Score::Mate(-2).to_string(), "-M2");
    }
}
