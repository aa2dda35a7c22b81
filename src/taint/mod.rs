pub mod ast;
pub mod check;
pub mod propagate;
pub mod resolve;
pub mod state;

use crate::error::Result;
use crate::rules::RuleSet;

/// Parses `source` and runs the full two-pass walk over it, returning the
/// de-duplicated issue list. This is the analyzer's one public entry point;
/// everything else in this module is internal machinery it drives.
pub fn analyze(source: &str, filepath: &str, rules: &RuleSet) -> Result<Vec<Issue>> {
    let mut tree = ast::Ast::parse(source, filepath)?;
    let mut state = state::AnalyzerState::new(filepath);
    propagate::walk_module(&mut tree, &mut state, rules);
    Ok(state.results)
}

use serde::{Deserialize, Serialize};

/// Where in a call's arguments a mark was produced: a positional index or
/// the call's own return value. Distinct from `rules::Position` because a
/// `Taint`/`Sink` records where it *was found*, not where a rule's
/// descriptor says to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgPosition {
    Index(u32),
    Return,
}

/// A single taint mark, carrying enough of the originating rule's
/// descriptor to match against sink descriptors later (`accordance` plus
/// whichever of `function`/`attribute`/`type` that accordance names).
/// Mirrors `issue.py`'s `Taint` dataclass field-for-field; structural
/// equality is derived rather than hand-rolled since every field here is
/// itself comparable, unlike the source's free-form `__dict__` compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub rule_id: String,
    pub accordance: crate::rules::Accordance,
    pub type_: Option<String>,
    pub function: Option<String>,
    pub attribute: Option<String>,
    pub position: Option<ArgPosition>,
    pub keyword: Option<String>,
    pub lineno: i32,
    pub col_offset: i32,
    pub end_lineno: i32,
    pub end_col_offset: i32,
}

impl Taint {
    /// The universal "anything" taint installed on every node at pre-visit.
    /// Never propagates and never matches a sink.
    pub fn universal(lineno: i32, col_offset: i32, end_lineno: i32, end_col_offset: i32) -> Self {
        Taint {
            rule_id: "0000".to_string(),
            accordance: crate::rules::Accordance::Type,
            type_: Some("*".to_string()),
            function: None,
            attribute: None,
            position: None,
            keyword: None,
            lineno,
            col_offset,
            end_lineno,
            end_col_offset,
        }
    }

    pub fn is_universal(&self) -> bool {
        self.accordance == crate::rules::Accordance::Type && self.type_.as_deref() == Some("*")
    }

    /// The discriminator value named by this taint's own `accordance`
    /// field, used both for sink matching and for `{TAINT}` template
    /// substitution.
    pub fn discriminator(&self) -> &str {
        match self.accordance {
            crate::rules::Accordance::Function => self.function.as_deref().unwrap_or(""),
            crate::rules::Accordance::Attribute => self.attribute.as_deref().unwrap_or(""),
            crate::rules::Accordance::Type => self.type_.as_deref().unwrap_or(""),
        }
    }
}

/// A single sink mark on a call node. Mirrors `issue.py`'s `Sink` dataclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    pub rule_id: String,
    pub accordance: crate::rules::Accordance,
    pub function: String,
    pub type_: String,
    pub position: Option<ArgPosition>,
    pub keyword: Option<String>,
    pub lineno: i32,
    pub col_offset: i32,
    pub end_lineno: i32,
    pub end_col_offset: i32,
}

impl Sink {
    pub fn discriminator(&self) -> &str {
        match self.accordance {
            crate::rules::Accordance::Function => &self.function,
            crate::rules::Accordance::Attribute => &self.function,
            crate::rules::Accordance::Type => &self.type_,
        }
    }
}

/// A matched (taint, sink) pair, one rule id, with the severity/confidence
/// maxima and rendered message. Mirrors `issue.py`'s `Issue` dataclass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub rule_id: String,
    pub name: String,
    pub taint: Taint,
    pub sink: Sink,
    pub severity: u8,
    pub confidence: u8,
    pub message: String,
    pub file_path: String,
}

pub const SEVERITY_HIGH: u8 = 7;
pub const SEVERITY_MEDIUM: u8 = 4;

/// Renders a rank number into "low"/"medium"/"high", per `SEVERITY.rank_number_to_str`.
pub fn rank_to_str(rank: u8) -> &'static str {
    if rank >= SEVERITY_HIGH {
        "high"
    } else if rank >= SEVERITY_MEDIUM {
        "medium"
    } else {
        "low"
    }
}
