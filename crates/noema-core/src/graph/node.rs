//! Semantic Node - The fundamental unit of working memory
//!
//! Each node represents either an object or a predicate/event in the
//! semantic network:
//! - Labeled directed arguments (slot -> target) with a reverse property index
//! - Polarity, eventness, and a two-level belief model (current + default)
//! - Optional lexical term, including late-bound `***-` variables
//! - Tether to a cognate node in another memory band (moor/buoy)
//!
//! Nodes are created and deleted only through a [`crate::graph::NodePool`];
//! the pool keeps the argument/property cross-index consistent.

use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTITY
// ============================================================================

/// Identity of a node: which pool it lives in plus its number there.
///
/// Numbers are positive in ordinary pools and negative in inference (halo)
/// pools, so band checks can work from the number alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) pool: u32,
    pub(crate) num: i32,
}

impl NodeId {
    pub(crate) fn new(pool: u32, num: i32) -> Self {
        Self { pool, num }
    }

    /// Signed number within the owning pool.
    pub fn num(&self) -> i32 {
        self.num
    }

    /// Whether this node belongs to an inference (halo) pool.
    pub fn is_halo(&self) -> bool {
        self.num < 0
    }
}

/// Provenance of a halo inference: the rule that fired and the index of the
/// binding set it used this cycle. Only meaningful within one cognition
/// cycle since the halo is rebuilt from scratch every cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HaloSource {
    pub rule: u32,
    pub bind: usize,
}

// ============================================================================
// LINK ENTRIES
// ============================================================================

/// One outgoing labeled argument of a node.
#[derive(Clone, Debug)]
pub struct ArgEntry {
    pub slot: String,
    pub val: NodeId,
}

/// One incoming reference: `head` has this node as its `anum`'th argument.
#[derive(Clone, Copy, Debug)]
pub struct PropEntry {
    pub head: NodeId,
    pub anum: usize,
}

// ============================================================================
// CAPACITIES
// ============================================================================

/// Maximum arguments for a node.
pub const ARG_MAX: usize = 10;

/// Maximum properties for a node.
pub const PROP_MAX: usize = 100;

// ============================================================================
// NODE
// ============================================================================

/// A node in the semantic network.
///
/// The `belief` field is the current strength: positive = held, zero =
/// hypothetical, negative = suppressed by a newer variant. `default`
/// is the strength the node takes when actualized.
#[derive(Clone, Debug)]
pub struct Node {
    // identity
    pub(crate) id: NodeId,
    pub(crate) kind: String,
    pub(crate) hash: usize,

    // lexical term, negation, eventness, belief
    pub(crate) lex: String,
    pub(crate) quote: Option<String>,
    pub(crate) neg: i32,
    pub(crate) evt: i32,
    pub(crate) blf: f64,
    pub(crate) blf0: f64,

    // structural data (reverse index kept consistent by the pool)
    pub(crate) args: Vec<ArgEntry>,
    pub(crate) props: Vec<PropEntry>,
    pub(crate) arity0: usize,
    pub(crate) wrt: usize,

    // tether to a cognate node in another band
    pub(crate) moor: Option<NodeId>,
    pub(crate) buoy: Option<NodeId>,

    // bookkeeping
    pub(crate) r#gen: u32,
    pub(crate) convo: u32,
    pub(crate) vis: bool,
    pub(crate) keep: i32,

    /// Which attention focus (if any) this node is associated with.
    pub top: i32,
    /// Grammatical tag bitmask.
    pub tags: u32,
    /// Backed by a long-term ghost fact.
    pub ltm: bool,
    /// Rule and binding set that inferred this halo node.
    pub halo_src: Option<HaloSource>,
}

/// Noun tag bit.
pub const TAG_NOUN: u32 = 0x0001;

/// Verb tag bit.
pub const TAG_VERB: u32 = 0x0002;

/// Printable names for tag bits, in bit order.
pub const TAG_STR: [&str; 2] = ["NOUN", "VERB"];

impl Node {
    pub(crate) fn new(id: NodeId, kind: &str) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            hash: 0,
            lex: String::new(),
            quote: None,
            neg: 0,
            evt: 0,
            blf: 0.0,
            blf0: 1.0,
            args: Vec::new(),
            props: Vec::new(),
            arity0: 0,
            wrt: 0,
            moor: None,
            buoy: None,
            r#gen: 0,
            convo: 0,
            vis: true,
            keep: 1,
            top: 0,
            tags: 0,
            ltm: false,
            halo_src: None,
        }
    }

    // ------------------------------------------------------------------
    // basic information
    // ------------------------------------------------------------------

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Short type tag used in the `kind-id` nickname.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Hash bin for the lexical term (0 when there is none).
    pub fn code(&self) -> usize {
        self.hash
    }

    /// Cycle of last change.
    pub fn generation(&self) -> u32 {
        self.r#gen
    }

    /// Conversational recency stamp (bigger = mentioned more recently).
    pub fn last_convo(&self) -> u32 {
        self.convo
    }

    /// Nickname of the form `kind-id` (`kind+id` for halo nodes).
    pub fn nick(&self) -> String {
        let sep = if self.id.is_halo() { '+' } else { '-' };
        format!("{}{}{}", self.kind, sep, self.id.num.abs())
    }

    /// Lexical term, or None when the node has no word attached.
    pub fn lex(&self) -> Option<&str> {
        if self.lex.is_empty() { None } else { Some(&self.lex) }
    }

    /// Raw lexical term (possibly empty).
    pub fn lex_str(&self) -> &str {
        &self.lex
    }

    /// Whether the lexical term is a late-binding variable (`***-…`).
    pub fn lex_var(&self) -> bool {
        self.lex.starts_with('*')
    }

    /// Exact string equality against the lexical term.
    pub fn lex_match(&self, txt: &str) -> bool {
        self.lex == txt
    }

    pub fn lex_same(&self, other: &Node) -> bool {
        self.lex == other.lex
    }

    /// Literal text payload (quoted strings for echo output).
    pub fn literal(&self) -> Option<&str> {
        self.quote.as_deref()
    }

    pub fn has_literal(&self) -> bool {
        self.quote.is_some()
    }

    /// Attach (or clear) a long literal for echo output.
    pub fn set_literal(&mut self, txt: Option<&str>) {
        self.quote = txt.map(|s| s.to_string());
    }

    // ------------------------------------------------------------------
    // negation and belief
    // ------------------------------------------------------------------

    pub fn neg(&self) -> i32 {
        self.neg
    }

    /// Eventness: 0 = ongoing state, 1 = completed event.
    pub fn done(&self) -> i32 {
        self.evt
    }

    pub fn belief(&self) -> f64 {
        self.blf
    }

    /// Strength the node would take when actualized.
    pub fn default_belief(&self) -> f64 {
        self.blf0
    }

    /// Hypothetical (or suppressed) rather than currently held.
    pub fn hyp(&self) -> bool {
        self.blf <= 0.0
    }

    pub fn def_hyp(&self) -> bool {
        self.blf0 <= 0.0
    }

    /// Belief with threshold-sign convention: a positive threshold reads the
    /// current value, non-positive reads the pending default.
    pub fn blf(&self, bth: f64) -> f64 {
        if bth > 0.0 { self.blf } else { self.blf0 }
    }

    /// Whether the node clears the given belief threshold. A negative
    /// threshold checks the pending default against its magnitude.
    pub fn sure(&self, bth: f64) -> bool {
        if bth > 0.0 {
            self.blf >= bth
        } else {
            self.blf0 >= -bth
        }
    }

    pub fn set_neg(&mut self, val: i32) {
        self.neg = val;
    }

    pub fn set_done(&mut self, val: i32) {
        self.evt = val;
    }

    /// Set both the current and pending belief.
    pub fn set_belief(&mut self, val: f64) {
        self.blf = val;
        self.blf0 = val;
    }

    /// Set only the pending (default) belief.
    pub fn set_default(&mut self, val: f64) {
        self.blf0 = val;
    }

    /// Set only the current belief, leaving the default untouched.
    pub fn tmp_belief(&mut self, val: f64) {
        self.blf = val;
    }

    /// Override this assertion in favor of a newer variant.
    pub fn suppress(&mut self) {
        self.blf = -self.blf.abs();
    }

    /// Copy the pending belief into the current one.
    /// Returns true if the belief actually changed.
    pub fn actualize(&mut self, ver: u32) -> bool {
        if self.blf == self.blf0 {
            return false;
        }
        self.blf = self.blf0;
        self.gen_max(ver);
        true
    }

    // ------------------------------------------------------------------
    // status marks
    // ------------------------------------------------------------------

    /// Eligible for matching.
    pub fn visible(&self) -> bool {
        self.vis
    }

    pub fn reveal(&mut self) {
        self.vis = true;
    }

    pub fn conceal(&mut self) {
        self.vis = false;
    }

    pub fn top_max(&mut self, tval: i32) {
        self.top = self.top.max(tval);
    }

    pub fn gen_max(&mut self, ver: u32) {
        if ver > 0 {
            self.r#gen = self.r#gen.max(ver);
        }
    }

    pub fn keep_mark(&self) -> i32 {
        self.keep
    }

    pub fn set_keep(&mut self, val: i32) {
        self.keep = val;
    }

    pub fn noun_tag(&self) -> bool {
        (self.tags & TAG_NOUN) != 0
    }

    pub fn verb_tag(&self) -> bool {
        (self.tags & TAG_VERB) != 0
    }

    // ------------------------------------------------------------------
    // argument access (own entries; band delegation lives in queries)
    // ------------------------------------------------------------------

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    pub fn args_full(&self) -> bool {
        self.args.len() >= ARG_MAX
    }

    /// A node with no arguments denotes an object rather than a predicate.
    pub fn obj_node(&self) -> bool {
        self.args.is_empty()
    }

    pub fn arg(&self, i: usize) -> Option<NodeId> {
        self.args.get(i).map(|a| a.val)
    }

    pub fn slot(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(|a| a.slot.as_str())
    }

    pub fn slot_match(&self, i: usize, link: &str) -> bool {
        self.slot(i) == Some(link)
    }

    /// Number of uniquely named slot families. Numbered suffixes (`ref`,
    /// `ref2`) count once; `wrt` links are tracked separately and count as
    /// one extra family unless `all` is false.
    pub fn arity(&self, all: bool) -> usize {
        let mut cnt = self.arity0;
        if all && self.wrt > 0 {
            cnt += 1;
        }
        cnt
    }

    /// Number of fillers carrying the given slot label.
    pub fn num_vals(&self, slot: &str) -> usize {
        self.args.iter().filter(|a| a.slot == slot).count()
    }

    /// The i'th filler for the given slot label.
    pub fn val(&self, slot: &str, i: usize) -> Option<NodeId> {
        self.args
            .iter()
            .filter(|a| a.slot == slot)
            .nth(i)
            .map(|a| a.val)
    }

    pub fn has_slot(&self, slot: &str) -> bool {
        self.args.iter().any(|a| a.slot == slot)
    }

    pub fn any_slot(&self, labels: &[&str]) -> bool {
        labels.iter().any(|s| self.has_slot(s))
    }

    /// Every slot label of this node also appears on the reference node.
    pub fn same_slots(&self, reference: &Node) -> bool {
        self.args.iter().all(|a| reference.has_slot(&a.slot))
    }

    // ------------------------------------------------------------------
    // property access
    // ------------------------------------------------------------------

    pub fn num_props(&self) -> usize {
        self.props.len()
    }

    pub fn props_full(&self) -> bool {
        self.props.len() >= PROP_MAX
    }

    /// No properties at all (a "naked" node).
    pub fn naked(&self) -> bool {
        self.props.is_empty()
    }

    pub fn prop(&self, i: usize) -> Option<NodeId> {
        self.props.get(i).map(|p| p.head)
    }

    pub fn prop_anum(&self, i: usize) -> Option<usize> {
        self.props.get(i).map(|p| p.anum)
    }

    // ------------------------------------------------------------------
    // band tether
    // ------------------------------------------------------------------

    pub fn moor(&self) -> Option<NodeId> {
        self.moor
    }

    pub fn buoy(&self) -> Option<NodeId> {
        self.buoy
    }

    pub fn moored(&self) -> bool {
        self.moor.is_some()
    }

    pub fn buoyed(&self) -> bool {
        self.buoy.is_some()
    }

    pub(crate) fn set_moor(&mut self, deep: Option<NodeId>) {
        self.moor = deep;
    }

    pub(crate) fn set_buoy(&mut self, surf: Option<NodeId>) {
        self.buoy = surf;
    }

    /// Raw view of the outgoing argument entries.
    pub fn args_view(&self) -> &[ArgEntry] {
        &self.args
    }

    /// Raw view of the incoming property entries.
    pub fn props_view(&self) -> &[PropEntry] {
        &self.props
    }
}

/// Strip any non-alphabetic suffix from a slot name, so `ref2` and `ref`
/// land in the same arity family.
pub fn slot_family(slot: &str) -> &str {
    let end = slot
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(slot.len());
    &slot[..end]
}

// ============================================================================
// TESTS
// ============================================================================
