//! # Noema Core
//!
//! Attention-driven reasoning engine: an interpreter over a semantic
//! network that selects and expands declarative rules and procedural
//! operators to pursue goals.
//!
//! - **Semantic substrate**: typed nodes with labeled arguments, a reverse
//!   property index, two-level belief, and layered memory bands
//! - **Subgraph matcher**: anchored expansion with hash-bin pruning,
//!   caveats, and backtracking variable bindings - the hot kernel
//! - **Expectation halo**: one- and two-step rule inferences rebuilt every
//!   cycle, with provenance for credit assignment and consolidation
//! - **Attention tree**: priority by weight plus recency boost, fair
//!   newest-first service, age-based retirement, mark-sweep collection
//! - **Hierarchical plans**: chains of typed directives and parallel
//!   plays with backtracking FIND, enumeration, and failure attribution
//!
//! ## Theory background
//!
//! The architecture follows the classic production-system loop (match,
//! select, act) over a spreading semantic network in the style of
//! Collins & Loftus (1975), with a short-lived "halo" of expectations in
//! place of full forward chaining: inferences live only for one cycle and
//! must be re-derived from current beliefs, which keeps truth maintenance
//! trivial and credit assignment local.
//!
//! ## Quick Start
//!
//! ```rust
//! use noema_core::Core;
//!
//! let mut core = Core::new();
//!
//! // post a fact the way a sensor adapter would
//! core.start_note();
//! let obj = core.new_node("obj", None);
//! core.new_prop(obj, "hq", "red", 0, 1.0).unwrap();
//! core.finish_note(None);
//!
//! // run one cognition cycle
//! core.cycle(false);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod act;
pub mod attention;
pub mod core;
pub mod graph;
pub mod grounding;
pub mod kb;
pub mod matcher;
pub mod memory;
pub mod reason;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Graph substrate
pub use crate::graph::{
    lex_hash, query, ArgEntry, Bindings, GraphError, Graphlet, GraphletView, HaloSource, Node,
    NodeId, NodeList, NodePool, PropEntry, ARG_MAX, BIND_MAX, GRAPHLET_MAX, NBINS, PROP_MAX,
};

// Matcher
pub use crate::matcher::{CaptureSink, MatchSink, Situation, CAVEAT_MAX};

// Working memory
pub use crate::memory::{MemoryStats, WorkingMemory, EXT_AGT, EXT_MAX, EXT_OBJ, EXT_SURF};

// Reasoning
pub use crate::reason::{Operator, OperatorMemory, Rule, RuleMemory, RULE_HMAX};

// Action model
pub use crate::act::{
    ChainGraph, DirKind, Directive, Payload, Play, Step, StepId, ALT, DONE, FAIL, GUESS_MAX,
    NRI_MAX, OP_MAX, PLAY_MAX, PUNT, STOPPED, WORKING,
};

// Attention scheduler
pub use crate::attention::{ActionTree, Focus, FocusStats, Mood, FOCUS_MAX};

// Engine context
pub use crate::core::{Core, CoreConfig};

// Grounding surface
pub use crate::grounding::GroundingKernel;

// Knowledge files
pub use crate::kb::{KbError, LineReader, TransTable};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        Bindings, ChainGraph, Core, CoreConfig, DirKind, Directive, Graphlet, GroundingKernel,
        MemoryStats, NodeId, NodeList, Operator, OperatorMemory, Rule, RuleMemory, Situation,
        WorkingMemory,
    };
}
