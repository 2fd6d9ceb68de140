//! # Compound-State Graph Engine
//!
//! Two boolean states `(A, B)` split the rows into runs labelled `TT`, `TF`,
//! `FT` or `FF`. Consecutive runs induce directed transitions between labels,
//! giving a 4-node / 12-edge graph. A compound state selects nodes and edges
//! of that graph; a run is chosen when its label is selected and its
//! neighbours satisfy the selected edges touching that label.
//!
//! The graph also has two sentinel terminals, `Start` and `End`, standing for
//! "before the first run" and "after the last run".
//!
//! All sets are `BTreeSet`/`BTreeMap` for deterministic ordering.

use crate::runs::Run;
use crate::types::IndexRange;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// NODES AND EDGES
// =============================================================================

/// Label of a run: truth of state A, then truth of state B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    TT,
    TF,
    FT,
    FF,
}

impl NodeLabel {
    /// Every label, in canonical order.
    pub const ALL: [Self; 4] = [Self::TT, Self::TF, Self::FT, Self::FF];

    /// Label for a pair of truth values.
    #[must_use]
    pub const fn from_pair(a: bool, b: bool) -> Self {
        match (a, b) {
            (true, true) => Self::TT,
            (true, false) => Self::TF,
            (false, true) => Self::FT,
            (false, false) => Self::FF,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TT => "TT",
            Self::TF => "TF",
            Self::FT => "FT",
            Self::FF => "FF",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An endpoint of a transition: a run label or a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Terminal {
    /// Before the first run.
    Start,
    Node(NodeLabel),
    /// After the last run.
    End,
}

impl Terminal {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "AA",
            Self::Node(label) => label.as_str(),
            Self::End => "ZZ",
        }
    }
}

impl FromStr for Terminal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AA" => Ok(Self::Start),
            "ZZ" => Ok(Self::End),
            "TT" => Ok(Self::Node(NodeLabel::TT)),
            "TF" => Ok(Self::Node(NodeLabel::TF)),
            "FT" => Ok(Self::Node(NodeLabel::FT)),
            "FF" => Ok(Self::Node(NodeLabel::FF)),
            other => Err(format!("unknown graph terminal '{}'", other)),
        }
    }
}

impl From<NodeLabel> for Terminal {
    fn from(label: NodeLabel) -> Self {
        Self::Node(label)
    }
}

/// A directed edge `from -> to`.
///
/// Serialized as the four-letter code of its endpoints, e.g. `"TFFF"` for
/// `TF -> FF`, `"AATT"` for `Start -> TT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Transition {
    pub from: Terminal,
    pub to: Terminal,
}

impl Transition {
    #[must_use]
    pub fn new(from: impl Into<Terminal>, to: impl Into<Terminal>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether `label` is one of the endpoints.
    #[must_use]
    pub fn touches(&self, label: NodeLabel) -> bool {
        self.from == Terminal::Node(label) || self.to == Terminal::Node(label)
    }

    /// Run labels among the endpoints (sentinels excluded).
    pub fn labels(&self) -> impl Iterator<Item = NodeLabel> {
        [self.from, self.to].into_iter().filter_map(|t| match t {
            Terminal::Node(label) => Some(label),
            _ => None,
        })
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from.as_str(), self.to.as_str())
    }
}

impl From<Transition> for String {
    fn from(edge: Transition) -> Self {
        edge.to_string()
    }
}

impl TryFrom<String> for Transition {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        let (Some(from), Some(to)) = (code.get(0..2), code.get(2..4)) else {
            return Err(format!("bad transition code '{}'", code));
        };
        if code.len() != 4 {
            return Err(format!("bad transition code '{}'", code));
        }
        Ok(Self {
            from: from.parse()?,
            to: to.parse()?,
        })
    }
}

// =============================================================================
// GRAPH QUERIES
// =============================================================================

/// Nodes and edges observed in a run sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionGraph {
    pub nodes: BTreeSet<NodeLabel>,
    pub edges: BTreeSet<Transition>,
    /// Label of the first run.
    pub entry: Option<NodeLabel>,
    /// Label of the last run.
    pub exit: Option<NodeLabel>,
}

impl TransitionGraph {
    /// Observed edges plus `Start -> entry` and `exit -> End`.
    #[must_use]
    pub fn edges_with_terminals(&self) -> BTreeSet<Transition> {
        let mut edges = self.edges.clone();
        if let Some(entry) = self.entry {
            edges.insert(Transition::new(Terminal::Start, entry));
        }
        if let Some(exit) = self.exit {
            edges.insert(Transition::new(exit, Terminal::End));
        }
        edges
    }
}

/// Distinct labels present, and the edges between consecutive runs.
pub fn existing_nodes_and_edges(runs: &[Run<NodeLabel>]) -> TransitionGraph {
    TransitionGraph {
        nodes: runs.iter().map(|r| r.value).collect(),
        edges: runs
            .windows(2)
            .map(|pair| Transition::new(pair[0].value, pair[1].value))
            .collect(),
        entry: runs.first().map(|r| r.value),
        exit: runs.last().map(|r| r.value),
    }
}

/// Ranges of the runs chosen by a node/edge selection.
///
/// A run is chosen iff its label is a selected node and:
/// - if any selected edge leaves the label, the next run (or `End`) is the
///   target of one of them;
/// - if any selected edge enters the label, the previous run (or `Start`) is
///   the source of one of them.
///
/// A label with no selected edge on a side is unconstrained on that side, so
/// with no edges selected the result is every run with a selected label.
pub fn selected_ranges(
    runs: &[Run<NodeLabel>],
    nodes: &BTreeSet<NodeLabel>,
    edges: &BTreeSet<Transition>,
) -> Vec<IndexRange> {
    let mut forward: BTreeMap<Terminal, BTreeSet<Terminal>> = BTreeMap::new();
    let mut backward: BTreeMap<Terminal, BTreeSet<Terminal>> = BTreeMap::new();
    for edge in edges {
        forward.entry(edge.from).or_default().insert(edge.to);
        backward.entry(edge.to).or_default().insert(edge.from);
    }

    runs.iter()
        .enumerate()
        .filter(|(i, run)| {
            if !nodes.contains(&run.value) {
                return false;
            }
            let here = Terminal::Node(run.value);
            let prev = i
                .checked_sub(1)
                .and_then(|p| runs.get(p))
                .map_or(Terminal::Start, |r| Terminal::Node(r.value));
            let next = runs
                .get(i + 1)
                .map_or(Terminal::End, |r| Terminal::Node(r.value));

            let outgoing_ok = forward.get(&here).is_none_or(|targets| targets.contains(&next));
            let incoming_ok = backward.get(&here).is_none_or(|sources| sources.contains(&prev));
            outgoing_ok && incoming_ok
        })
        .map(|(_, run)| run.range)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
