//! Bindings - Ordered key-to-substitution map used during matching
//!
//! The matcher extends this list as it walks the pattern and trims it back
//! on backtrack, so order matters and capacity is fixed. A pair may also
//! carry a lexical-variable assignment (`***-x` -> concrete word) so later
//! pattern nodes that mention the same variable resolve consistently.

use crate::graph::node::{Node, NodeId};
use crate::graph::GraphError;

/// Maximum number of key/substitution pairs.
pub const BIND_MAX: usize = 20;

/// Lexical variable assignment attached to a pair.
#[derive(Clone, Debug, PartialEq)]
struct LexVar {
    var: String,
    word: String,
    bin: usize,
}

#[derive(Clone, Debug)]
struct Pair {
    key: NodeId,
    sub: Option<NodeId>,
    lex: Option<LexVar>,
}

/// Ordered list of substitutions of one node for another.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    pairs: Vec<Pair>,
    /// Number of pairs a complete match must reach.
    pub expect: usize,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.expect = 0;
    }

    /// Exact copy of some other set of bindings, including order.
    pub fn copy_from(&mut self, reference: &Bindings) {
        self.pairs.clone_from(&reference.pairs);
        self.expect = reference.expect;
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// All expected pattern nodes have been bound.
    pub fn complete(&self) -> bool {
        self.expect > 0 && self.pairs.len() >= self.expect
    }

    // ------------------------------------------------------------------
    // main functions
    // ------------------------------------------------------------------

    /// Current substitution for some key node.
    pub fn lookup(&self, k: NodeId) -> Option<NodeId> {
        self.pairs.iter().find(|p| p.key == k).and_then(|p| p.sub)
    }

    /// Inverse lookup: first key bound to this substitution.
    pub fn find_key(&self, sub: NodeId) -> Option<NodeId> {
        self.pairs
            .iter()
            .find(|p| p.sub == Some(sub))
            .map(|p| p.key)
    }

    pub fn key(&self, i: usize) -> Option<NodeId> {
        self.pairs.get(i).map(|p| p.key)
    }

    pub fn sub(&self, i: usize) -> Option<NodeId> {
        self.pairs.get(i).and_then(|p| p.sub)
    }

    pub fn set_sub(&mut self, i: usize, n: Option<NodeId>) {
        if let Some(p) = self.pairs.get_mut(i) {
            p.sub = n;
        }
    }

    pub fn in_keys(&self, probe: NodeId) -> bool {
        self.pairs.iter().any(|p| p.key == probe)
    }

    pub fn in_subs(&self, probe: NodeId) -> bool {
        self.pairs.iter().any(|p| p.sub == Some(probe))
    }

    /// Remember a key/substitution pair at the end of the list.
    /// Returns the new pair count, for use with `trim_to(n - 1)`.
    pub fn bind(&mut self, k: NodeId, sub: NodeId) -> Result<usize, GraphError> {
        if self.in_keys(k) {
            return Err(GraphError::DuplicateKey);
        }
        if self.pairs.len() >= BIND_MAX {
            return Err(GraphError::BindingsFull);
        }
        self.pairs.push(Pair {
            key: k,
            sub: Some(sub),
            lex: None,
        });
        Ok(self.pairs.len())
    }

    /// Attach a lexical-variable assignment to the most recent pair.
    /// Used when a `***-x` focus first meets a concrete word.
    pub fn bind_lex(&mut self, var: &str, word: &str, bin: usize) {
        if let Some(p) = self.pairs.last_mut() {
            p.lex = Some(LexVar {
                var: var.to_string(),
                word: word.to_string(),
                bin,
            });
        }
    }

    /// Remove most recently added pairs to retain only n.
    pub fn trim_to(&mut self, n: usize) {
        if n <= self.pairs.len() {
            self.pairs.truncate(n);
        }
    }

    pub fn pop(&mut self) {
        self.pairs.pop();
    }

    /// Remove the most recent pair, but only if it has the given key.
    pub fn rem_final(&mut self, k: NodeId) {
        if self.pairs.last().map(|p| p.key) == Some(k) {
            self.pairs.pop();
        }
    }

    // ------------------------------------------------------------------
    // lexical variables
    // ------------------------------------------------------------------

    /// Word already assigned to a lexical variable, if any.
    pub fn lookup_lex(&self, var: &str) -> Option<&str> {
        self.pairs
            .iter()
            .filter_map(|p| p.lex.as_ref())
            .find(|l| l.var == var)
            .map(|l| l.word.as_str())
    }

    /// Lexical term for a node, resolving `***-x` variables through the
    /// assignments recorded so far.
    pub fn lex_sub<'a>(&'a self, k: &'a Node) -> Option<&'a str> {
        if !k.lex_var() {
            return k.lex();
        }
        k.lex().and_then(|v| self.lookup_lex(v))
    }

    /// Hash bin to enumerate for a node, after variable substitution.
    /// Zero means no usable lexical constraint.
    pub fn lex_bin(&self, k: &Node) -> usize {
        if !k.lex_var() {
            return k.code();
        }
        let Some(var) = k.lex() else { return 0 };
        self.pairs
            .iter()
            .filter_map(|p| p.lex.as_ref())
            .find(|l| l.var == var)
            .map(|l| l.bin)
            .unwrap_or(0)
    }

    /// Whether the mate's lexical term is compatible with the focus:
    ///
    /// | focus (binding)   | mate  | agree | reason          |
    /// |-------------------|-------|-------|-----------------|
    /// | none              | any   | yes   | don't care      |
    /// | literal or var    | none  | no    | not specific    |
    /// | `***-1` (unbound) | small | yes   | can add         |
    /// | `***-1` (big)     | small | no    | mismatch        |
    /// | `***-1` (small)   | small | yes   | match           |
    /// | literal           | same  | yes   | match           |
    pub fn lex_agree(&self, focus: &Node, mate: &Node) -> bool {
        let Some(flex) = focus.lex() else {
            return true; // don't care about term
        };
        let Some(mlex) = mate.lex() else {
            return false; // not specific enough
        };
        let flex = if focus.lex_var() {
            match self.lookup_lex(flex) {
                Some(w) => w,
                None => return true, // can add as binding
            }
        } else {
            flex
        };
        flex == mlex
    }

    /// Whether any substitution node is hypothetical.
    pub fn any_hyp(&self, resolve: impl Fn(NodeId) -> bool) -> bool {
        self.pairs
            .iter()
            .filter_map(|p| p.sub)
            .any(resolve)
    }

    // ------------------------------------------------------------------
    // bulk functions
    // ------------------------------------------------------------------

    /// Same keys map to the same values (and lexical variables to the same
    /// words), independent of order. Used for non-return inhibition.
    pub fn same(&self, reference: &Bindings) -> bool {
        if self.pairs.len() != reference.pairs.len() {
            return false;
        }
        for p in &self.pairs {
            match (reference.lookup(p.key), p.sub) {
                (Some(a), Some(b)) if a == b => {}
                _ => return false,
            }
            if let Some(l) = &p.lex {
                match reference.lookup_lex(&l.var) {
                    Some(w) if w == l.word => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Replace each value with its lookup in the reference bindings:
    /// self: `a = b` + ref: `b = c`  -->  self: `a = c`.
    pub fn replace_subs(&mut self, alt: &Bindings) {
        for p in &mut self.pairs {
            if let Some(s) = p.sub {
                if let Some(s2) = alt.lookup(s) {
                    p.sub = Some(s2);
                }
            }
        }
    }

    /// Copy the reference bindings then chain through the alternates.
    pub fn copy_replace(&mut self, reference: &Bindings, alt: &Bindings) {
        self.copy_from(reference);
        self.replace_subs(alt);
    }

    /// Count pattern nodes missing from the keys of these bindings.
    pub fn key_miss(&self, items: &[NodeId]) -> usize {
        items.iter().filter(|n| !self.in_keys(**n)).count()
    }

    /// Count pattern nodes missing from the substitutions.
    pub fn subst_miss(&self, items: &[NodeId]) -> usize {
        items.iter().filter(|n| !self.in_subs(**n)).count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
