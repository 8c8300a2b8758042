//! Hierarchical Action Model
//!
//! Chains of steps whose payloads are typed directives or parallel plays.
//! Directives pick methods from procedural memory and orchestrate the FSM
//! states; chains route control along cont/alt/fail edges with backtracking
//! through FIND guesses.

pub mod chain;
pub mod directive;
pub mod play;

pub use chain::{ChainGraph, Payload, Step, StepId};
pub use directive::{DirKind, Directive, GUESS_MAX, NRI_MAX, OP_MAX};
pub use play::{Play, PLAY_MAX};

/// Payload verdicts: working, done, alternate done, stopped, failed, and
/// hard failure that short-circuits backtracking.
pub const WORKING: i32 = 0;
pub const DONE: i32 = 1;
pub const ALT: i32 = 2;
pub const STOPPED: i32 = -1;
pub const FAIL: i32 = -2;
pub const PUNT: i32 = -3;
