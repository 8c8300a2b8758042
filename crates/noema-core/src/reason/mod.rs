//! Reasoning Layer
//!
//! Declarative rules feeding the inference halo, procedural operators
//! advising directives, and the stores that hold them.

pub mod assoc;
pub mod operator;
pub mod procmem;
pub mod rule;

pub use assoc::RuleMemory;
pub use operator::{Operator, NOTE_TAVG, NOTE_TSTD};
pub use procmem::OperatorMemory;
pub use rule::{Rule, RULE_HMAX};
