//! Node Pool - Arena of semantic nodes with hash-bin enumeration
//!
//! Nodes live in exactly one pool. The pool assigns numbers (positive for
//! ordinary pools, negative ascending for inference pools), keeps the
//! per-lexical-hash bucket chains used by the matcher to prune candidates,
//! and maintains the argument/property cross-index whenever structure is
//! added or a node is removed.
//!
//! Enumeration order matters: ordinary pools list the newest node of a bin
//! first (recency), inference pools list strictly in creation order so the
//! band boundaries are monotone in the node number.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::graph::bindings::Bindings;
use crate::graph::graphlet::Graphlet;
use crate::graph::node::{slot_family, ArgEntry, Node, NodeId, PropEntry, ARG_MAX, PROP_MAX};
use crate::graph::GraphError;

/// Number of lexical hash bins (bin 0 holds word-less nodes).
pub const NBINS: usize = 64;

static POOL_SEQ: AtomicU32 = AtomicU32::new(1);

/// Stable hash from a lexical term to a bucket in 1..NBINS.
pub fn lex_hash(word: &str) -> usize {
    let mut h: u32 = 2166136261;
    for b in word.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    1 + (h as usize % (NBINS - 1))
}

// ============================================================================
// ENUMERABLE SOURCES
// ============================================================================

/// Anything the matcher can enumerate candidate mates from: a pool, the
/// layered working memory, or a graphlet viewed against its backing store.
pub trait NodeList {
    /// Resolve a node id to its data (cross-band where applicable).
    fn get(&self, id: NodeId) -> Option<&Node>;

    /// Next node in enumeration order, restricted to one hash bin when
    /// given. Start with `prev = None`.
    fn next_node(&self, prev: Option<NodeId>, bin: Option<usize>) -> Option<NodeId>;

    /// Total enumerable nodes.
    fn length(&self) -> usize;

    fn in_list(&self, id: NodeId) -> bool;

    fn num_bins(&self) -> usize {
        1
    }

    /// How many potential mates share the focus node's hash bin. A focus
    /// with no lexical constraint counts the whole list.
    fn same_bin(&self, focus: &Node, b: Option<&Bindings>) -> usize;

    /// Whether a node is outside the currently valid region.
    fn prohibited(&self, _id: NodeId) -> bool {
        false
    }
}

// ============================================================================
// NODE POOL
// ============================================================================

/// Arena of semantic nodes with per-bin bucket chains.
pub struct NodePool {
    tag: u32,
    nodes: HashMap<i32, Node>,
    bins: Vec<Vec<i32>>,
    neg: bool,
    label: i32,
    vis_def: bool,
    // change counters
    xadd: u32,
    xmod: u32,
    // generation and conversation counters
    ver: u32,
    refnum: u32,
    ref0: u32,
    // construction accumulator
    acc: Option<Graphlet>,
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

impl NodePool {
    pub fn new() -> Self {
        Self {
            tag: POOL_SEQ.fetch_add(1, Ordering::Relaxed),
            nodes: HashMap::new(),
            bins: vec![Vec::new(); NBINS],
            neg: false,
            label: 0,
            vis_def: true,
            xadd: 0,
            xmod: 0,
            ver: 1,
            refnum: 0,
            ref0: 0,
            acc: None,
        }
    }

    /// Switch to negative numbering with creation-order enumeration
    /// (inference pools).
    pub fn negative_ids(&mut self) {
        self.neg = true;
    }

    /// New nodes start hidden until revealed (staged working memory).
    pub fn hide_new(&mut self) {
        self.vis_def = false;
    }

    pub fn pool_tag(&self) -> u32 {
        self.tag
    }

    /// Magnitude of the most recently assigned node number.
    pub fn last_label(&self) -> i32 {
        self.label
    }

    pub fn version(&self) -> u32 {
        self.ver
    }

    pub fn bump_version(&mut self) {
        self.ver += 1;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bin_cnt(&self, bin: Option<usize>) -> usize {
        match bin {
            Some(b) => self.bins.get(b).map_or(0, |v| v.len()),
            None => self.nodes.len(),
        }
    }

    // ------------------------------------------------------------------
    // change tracking
    // ------------------------------------------------------------------

    /// Number of modifications since last asked (resets the counters).
    pub fn changes(&mut self) -> u32 {
        let n = self.xadd + self.xmod;
        self.xadd = 0;
        self.xmod = 0;
        n
    }

    pub fn dirty(&mut self, cnt: u32) {
        self.xmod += cnt;
    }

    // ------------------------------------------------------------------
    // conversation recency
    // ------------------------------------------------------------------

    pub fn inc_convo(&mut self) -> u32 {
        self.refnum += 1;
        self.refnum
    }

    pub fn init_convo(&mut self) {
        self.ref0 = self.refnum;
    }

    pub fn local_convo(&self) -> u32 {
        self.ref0
    }

    /// Stamp a node as just mentioned in conversation.
    pub fn mark_convo(&mut self, id: NodeId) {
        let val = self.inc_convo();
        if let Some(n) = self.node_mut(id) {
            n.convo = val;
        }
    }

    // ------------------------------------------------------------------
    // accumulator
    // ------------------------------------------------------------------

    /// Route subsequently created nodes into a fresh accumulator graphlet.
    pub fn build_in(&mut self) {
        self.acc = Some(Graphlet::new());
    }

    /// Stop accumulating and hand back what was built.
    pub fn take_accum(&mut self) -> Option<Graphlet> {
        self.acc.take()
    }

    pub fn accum(&self) -> Option<&Graphlet> {
        self.acc.as_ref()
    }

    pub fn building(&self) -> bool {
        self.acc.is_some()
    }

    // ------------------------------------------------------------------
    // node access
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.pool != self.tag {
            return None;
        }
        self.nodes.get(&id.num)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.pool != self.tag {
            return None;
        }
        self.nodes.get_mut(&id.num)
    }

    /// Iterate all nodes in enumeration order (all bins).
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for bin in &self.bins {
            for num in bin {
                out.push(NodeId::new(self.tag, *num));
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // construction
    // ------------------------------------------------------------------

    /// Create a bare node of some kind. A negative `def` leaves the node
    /// hypothetical with that default magnitude; a positive one asserts it
    /// outright.
    pub fn make_node(&mut self, kind: &str, word: Option<&str>, neg: i32, def: f64) -> NodeId {
        self.make_node_done(kind, word, neg, def, 0)
    }

    pub fn make_node_done(
        &mut self,
        kind: &str,
        word: Option<&str>,
        neg: i32,
        def: f64,
        done: i32,
    ) -> NodeId {
        let num = self.next_num();
        let id = NodeId::new(self.tag, num);
        let mut n = Node::new(id, if kind.is_empty() { "unk" } else { kind });
        n.neg = neg;
        n.evt = done;
        n.blf0 = def.abs();
        n.blf = if def > 0.0 { def } else { 0.0 };
        n.vis = self.vis_def;
        n.r#gen = self.ver;
        if let Some(w) = word {
            if !w.is_empty() {
                n.lex = w.to_string();
                n.hash = lex_hash(w);
            }
        }
        let h = n.hash;
        self.nodes.insert(num, n);
        self.enlist(h, num);
        self.xadd += 1;
        if let Some(acc) = &mut self.acc {
            let _ = acc.add_item(id);
        }
        id
    }

    /// Create a node at a specific number (used when reading files).
    /// Fails if the number is already taken.
    pub fn make_node_at(&mut self, num: i32, kind: &str) -> Result<NodeId, GraphError> {
        let num = if self.neg { -num.abs() } else { num.abs() };
        if self.nodes.contains_key(&num) {
            return Err(GraphError::DuplicateNode(num));
        }
        let id = NodeId::new(self.tag, num);
        let mut n = Node::new(id, kind);
        n.vis = self.vis_def;
        n.r#gen = self.ver;
        self.nodes.insert(num, n);
        self.enlist(0, num);
        self.label = self.label.max(num.abs());
        self.xadd += 1;
        if let Some(acc) = &mut self.acc {
            let _ = acc.add_item(id);
        }
        Ok(id)
    }

    fn next_num(&mut self) -> i32 {
        self.label += 1;
        if self.neg { -self.label } else { self.label }
    }

    fn enlist(&mut self, hash: usize, num: i32) {
        let bin = &mut self.bins[hash];
        if self.neg {
            bin.push(num); // creation order, band boundaries stay monotone
        } else {
            bin.insert(0, num); // newest first
        }
    }

    fn delist(&mut self, hash: usize, num: i32) {
        let bin = &mut self.bins[hash];
        if let Some(pos) = bin.iter().position(|n| *n == num) {
            bin.remove(pos);
        }
    }

    /// Change (or clear) a node's lexical term, moving it between bins.
    pub fn set_lex(&mut self, id: NodeId, txt: &str) {
        if id.pool != self.tag {
            return;
        }
        let Some(n) = self.nodes.get_mut(&id.num) else {
            return;
        };
        let old = n.hash;
        n.lex = txt.to_string();
        n.hash = if txt.is_empty() { 0 } else { lex_hash(txt) };
        let new = n.hash;
        if old != new {
            self.delist(old, id.num);
            self.enlist(new, id.num);
        }
        self.xmod += 1;
    }

    /// Move a node to the front of its bin so it is retrieved first.
    pub fn refresh(&mut self, id: NodeId) {
        if id.pool != self.tag {
            return;
        }
        let Some(n) = self.nodes.get(&id.num) else {
            return;
        };
        let h = n.hash;
        self.delist(h, id.num);
        self.bins[h].insert(0, id.num);
    }

    /// Record a mutation and stamp the node with the current generation.
    pub fn set_gen(&mut self, id: NodeId, ver: u32) {
        if id.pool != self.tag {
            return;
        }
        let v = if ver > 0 { ver } else { self.ver };
        if let Some(n) = self.nodes.get_mut(&id.num) {
            n.gen_max(v);
        }
        self.xmod += 1;
    }

    /// Set belief and stamp recency in one step.
    pub fn mark_belief(&mut self, id: NodeId, blf: f64) {
        if id.pool != self.tag {
            return;
        }
        let v = self.ver;
        if let Some(n) = self.nodes.get_mut(&id.num) {
            n.set_belief(blf);
            n.gen_max(v);
        }
        self.xmod += 1;
    }

    // ------------------------------------------------------------------
    // structure editing
    // ------------------------------------------------------------------

    /// Add `head -slot-> val`, maintaining the reverse index and arity.
    /// Duplicate triples succeed without change.
    pub fn add_arg(&mut self, head: NodeId, slot: &str, val: NodeId) -> Result<(), GraphError> {
        if head.pool != self.tag || val.pool != self.tag {
            return Err(GraphError::MissingNode(head.num));
        }
        // dedup against existing triple
        if self.has_val(head, slot, val) {
            return Ok(());
        }
        {
            let h = self
                .nodes
                .get(&head.num)
                .ok_or(GraphError::MissingNode(head.num))?;
            if h.args.len() >= ARG_MAX {
                return Err(GraphError::ArgsFull(h.nick()));
            }
            let v = self
                .nodes
                .get(&val.num)
                .ok_or(GraphError::MissingNode(val.num))?;
            if v.props.len() >= PROP_MAX {
                return Err(GraphError::PropsFull(v.nick()));
            }
        }

        // see if a new kind of link (boosts arity)
        let idx;
        {
            let h = self.nodes.get_mut(&head.num).unwrap();
            if slot == "wrt" {
                h.wrt += 1;
            } else {
                let fam = slot_family(slot).to_string();
                let known = h.args.iter().any(|a| slot_family(&a.slot) == fam);
                if !known {
                    h.arity0 += 1;
                }
            }
            idx = h.args.len();
            h.args.push(ArgEntry {
                slot: slot.to_string(),
                val,
            });
        }
        let v = self.nodes.get_mut(&val.num).unwrap();
        v.props.push(PropEntry { head, anum: idx });
        self.xadd += 1;
        Ok(())
    }

    /// Append an argument entry with arity bookkeeping, without touching
    /// the value side (cross-pool arrows handled by the caller).
    pub(crate) fn push_arg_raw(&mut self, head: NodeId, slot: &str, val: NodeId) {
        let Some(h) = self.nodes.get_mut(&head.num) else {
            return;
        };
        if slot == "wrt" {
            h.wrt += 1;
        } else {
            let fam = slot_family(slot).to_string();
            let known = h.args.iter().any(|a| slot_family(&a.slot) == fam);
            if !known {
                h.arity0 += 1;
            }
        }
        h.args.push(ArgEntry {
            slot: slot.to_string(),
            val,
        });
        self.xadd += 1;
    }

    /// Append a reverse property entry (cross-pool counterpart of
    /// [`Self::push_arg_raw`]).
    pub(crate) fn push_prop_raw(&mut self, val: NodeId, head: NodeId, anum: usize) {
        if let Some(v) = self.nodes.get_mut(&val.num) {
            v.props.push(PropEntry { head, anum });
        }
    }

    /// Whether `head -slot-> val` exists, accepting the val's tethered
    /// cognate as the same node.
    pub fn has_val(&self, head: NodeId, slot: &str, val: NodeId) -> bool {
        if head.pool != self.tag {
            return false;
        }
        let Some(h) = self.nodes.get(&head.num) else {
            return false;
        };
        let (vb, vm) = self
            .nodes
            .get(&val.num)
            .map(|v| (v.buoy, v.moor))
            .unwrap_or((None, None));
        h.args.iter().any(|a| {
            a.slot == slot && (a.val == val || Some(a.val) == vb || Some(a.val) == vm)
        })
    }

    /// Replace the i'th argument in place, preserving slot and order.
    pub fn subst_arg(&mut self, head: NodeId, i: usize, val: NodeId) {
        if head.pool != self.tag || val.pool != self.tag {
            return;
        }
        let Some(old) = self
            .nodes
            .get(&head.num)
            .and_then(|h| h.args.get(i))
            .map(|a| a.val)
        else {
            return;
        };
        if old == val {
            return;
        }
        if let Some(ov) = self.nodes.get_mut(&old.num) {
            ov.props.retain(|p| !(p.head == head && p.anum == i));
        }
        if let Some(h) = self.nodes.get_mut(&head.num) {
            h.args[i].val = val;
        }
        if let Some(nv) = self.nodes.get_mut(&val.num) {
            nv.props.push(PropEntry { head, anum: i });
        }
        self.xmod += 1;
    }

    /// Move `head` to the tail of its i'th argument's property list so it
    /// is the first fact retrieved for that node.
    pub fn refresh_arg(&mut self, head: NodeId, i: usize) {
        if head.pool != self.tag {
            return;
        }
        let Some(val) = self
            .nodes
            .get(&head.num)
            .and_then(|h| h.args.get(i))
            .map(|a| a.val)
        else {
            return;
        };
        if let Some(v) = self.nodes.get_mut(&val.num) {
            if let Some(pos) = v.props.iter().position(|p| p.head == head && p.anum == i) {
                let e = v.props.remove(pos);
                v.props.push(e);
            }
        }
    }

    /// Remove the argument at index `i` of `head`, compacting the argument
    /// list and patching every reverse entry that pointed past it.
    fn rem_arg_at(&mut self, head: NodeId, i: usize) {
        let removed;
        {
            let Some(h) = self.nodes.get_mut(&head.num) else {
                return;
            };
            if i >= h.args.len() {
                return;
            }
            removed = h.args.remove(i);

            // arity bookkeeping mirrors the add path
            if removed.slot == "wrt" {
                h.wrt = h.wrt.saturating_sub(1);
            } else {
                let fam = slot_family(&removed.slot).to_string();
                let still = h.args.iter().any(|a| slot_family(&a.slot) == fam);
                if !still {
                    h.arity0 = h.arity0.saturating_sub(1);
                }
            }
        }

        // drop the reverse entry on the removed value
        if let Some(v) = self.nodes.get_mut(&removed.val.num) {
            v.props.retain(|p| !(p.head == head && p.anum == i));
        }

        // later arguments shifted down one: patch their reverse entries
        let later: Vec<(usize, NodeId)> = self
            .nodes
            .get(&head.num)
            .map(|h| {
                h.args
                    .iter()
                    .enumerate()
                    .skip(i)
                    .map(|(j, a)| (j, a.val))
                    .collect()
            })
            .unwrap_or_default();
        for (j, val) in later {
            if let Some(v) = self.nodes.get_mut(&val.num) {
                for p in v.props.iter_mut() {
                    if p.head == head && p.anum == j + 1 {
                        p.anum = j;
                        break;
                    }
                }
            }
        }
    }

    /// Remove a node, dissolving all incoming and outgoing links first.
    /// Returns true when something was removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id.pool != self.tag {
            return false;
        }
        let Some(n) = self.nodes.get(&id.num) else {
            return false;
        };
        let hash = n.hash;
        let moor = n.moor;
        let buoy = n.buoy;
        let out: Vec<NodeId> = n.args.iter().map(|a| a.val).collect();
        let mut inc: Vec<PropEntry> = n.props.clone();

        // unlink any tethered cognate
        if let Some(m) = moor {
            if let Some(mn) = self.nodes.get_mut(&m.num) {
                mn.buoy = None;
            }
        }
        if let Some(b) = buoy {
            if let Some(bn) = self.nodes.get_mut(&b.num) {
                bn.moor = None;
            }
        }

        // detach from every argument's property list
        for val in out {
            if let Some(v) = self.nodes.get_mut(&val.num) {
                v.props.retain(|p| p.head != id);
            }
        }

        // remove self from every fact that used this node, highest
        // argument indices first so earlier entries stay valid
        inc.sort_by(|a, b| b.anum.cmp(&a.anum));
        for p in inc {
            if self.nodes.contains_key(&p.head.num) {
                self.rem_arg_at(p.head, p.anum);
            }
        }

        self.delist(hash, id.num);
        self.nodes.remove(&id.num);
        self.xmod += 1;
        true
    }

    /// Remove everything.
    pub fn purge_all(&mut self) {
        self.nodes.clear();
        for b in &mut self.bins {
            b.clear();
        }
        self.label = 0;
        self.acc = None;
        self.xmod += 1;
    }

    // ------------------------------------------------------------------
    // tethering
    // ------------------------------------------------------------------

    /// Tether a surface node to some deeper cognate. Any previous pairing
    /// of the deep node is broken first; a node moors to at most one other.
    pub fn moor_to(&mut self, surf: NodeId, deep: Option<NodeId>) {
        if surf == deep.unwrap_or(NodeId::new(0, 0)) {
            tracing::warn!("cannot moor a node to itself");
            return;
        }
        let old = self.nodes.get(&surf.num).and_then(|n| n.moor);
        if old == deep {
            return;
        }
        if let Some(d) = deep {
            let prev = self.nodes.get(&d.num).and_then(|n| n.buoy);
            if let Some(p) = prev {
                if let Some(pn) = self.nodes.get_mut(&p.num) {
                    pn.moor = None;
                }
            }
            if let Some(dn) = self.nodes.get_mut(&d.num) {
                dn.buoy = Some(surf);
            }
        }
        if let Some(sn) = self.nodes.get_mut(&surf.num) {
            sn.moor = deep;
        }
    }

    // ------------------------------------------------------------------
    // bulk graphlet operations
    // ------------------------------------------------------------------

    /// Set belief of all listed nodes to their pending defaults.
    /// Returns number of changes made.
    pub fn actualize_all(&mut self, g: &Graphlet, ver: u32) -> usize {
        let mut chg = 0;
        for id in g.items() {
            if let Some(n) = self.nodes.get_mut(&id.num) {
                if n.actualize(ver) {
                    chg += 1;
                }
            }
        }
        chg
    }

    /// Force every listed node to one belief value.
    pub fn force_belief(&mut self, g: &Graphlet, blf: f64) {
        for id in g.items() {
            if let Some(n) = self.nodes.get_mut(&id.num) {
                n.set_belief(blf);
            }
        }
    }

    /// Keep listed nodes from being garbage collected.
    pub fn mark_seeds(&mut self, g: &Graphlet) {
        for id in g.items() {
            if let Some(n) = self.nodes.get_mut(&id.num) {
                n.set_keep(1);
            }
        }
    }

    /// Instantiate a pattern into this pool using the given bindings.
    /// Unbound pattern nodes get fresh local copies (kind, resolved lex,
    /// negation, eventness); the bindings are extended to record them.
    /// Argument arrows are replicated through the bindings; arrows to nodes
    /// outside the pattern keep their original target when it is local.
    pub fn assert_graphlet(
        &mut self,
        pat: &Graphlet,
        pat_pool: &dyn NodeList,
        b: &mut Bindings,
    ) -> Result<Graphlet, GraphError> {
        let mut out = Graphlet::new();

        // make or look up an instance for every pattern item
        for item in pat.items() {
            let inst = match b.lookup(item) {
                Some(s) => s,
                None => {
                    let pn = pat_pool
                        .get(item)
                        .ok_or(GraphError::MissingNode(item.num))?;
                    let word = b.lex_sub(pn).map(|s| s.to_string());
                    let id =
                        self.make_node_done(pn.kind(), word.as_deref(), pn.neg(), -1.0, pn.done());
                    b.bind(item, id)?;
                    id
                }
            };
            let _ = out.add_item(inst);
        }

        // replicate argument structure through the bindings
        for item in pat.items() {
            let head = b.lookup(item).unwrap_or(item);
            let pn = pat_pool
                .get(item)
                .ok_or(GraphError::MissingNode(item.num))?;
            let arrows: Vec<(String, NodeId)> = pn
                .args
                .iter()
                .map(|a| (a.slot.clone(), a.val))
                .collect();
            for (slot, tgt) in arrows {
                let val = b.lookup(tgt).unwrap_or(tgt);
                if self.in_list(head) && self.in_list(val) {
                    self.add_arg(head, &slot, val)?;
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// NodeList for a plain pool
// ============================================================================

impl NodeList for NodePool {
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.node(id)
    }

    fn next_node(&self, prev: Option<NodeId>, bin: Option<usize>) -> Option<NodeId> {
        match prev {
            None => self.first_in(bin),
            Some(p) => self.after(p, bin),
        }
    }

    fn length(&self) -> usize {
        self.nodes.len()
    }

    fn in_list(&self, id: NodeId) -> bool {
        id.pool == self.tag && self.nodes.contains_key(&id.num)
    }

    fn num_bins(&self) -> usize {
        NBINS
    }

    fn same_bin(&self, focus: &Node, b: Option<&Bindings>) -> usize {
        if focus.lex().is_none() {
            return self.length();
        }
        let bin = match b {
            Some(b) => b.lex_bin(focus),
            None => focus.code(),
        };
        if bin == 0 {
            self.length()
        } else {
            self.bin_cnt(Some(bin))
        }
    }
}

impl NodePool {
    pub(crate) fn first_in(&self, bin: Option<usize>) -> Option<NodeId> {
        match bin {
            Some(h) => self
                .bins
                .get(h)
                .and_then(|v| v.first())
                .map(|n| NodeId::new(self.tag, *n)),
            None => {
                for b in &self.bins {
                    if let Some(n) = b.first() {
                        return Some(NodeId::new(self.tag, *n));
                    }
                }
                None
            }
        }
    }

    pub(crate) fn after(&self, prev: NodeId, bin: Option<usize>) -> Option<NodeId> {
        let h = self.nodes.get(&prev.num)?.hash;
        let chain = &self.bins[h];
        let pos = chain.iter().position(|n| *n == prev.num)?;
        if let Some(n) = chain.get(pos + 1) {
            return Some(NodeId::new(self.tag, *n));
        }
        if bin.is_some() {
            return None;
        }
        // shift to the next non-empty bin
        for b in &self.bins[h + 1..] {
            if let Some(n) = b.first() {
                return Some(NodeId::new(self.tag, *n));
            }
        }
        None
    }

    /// First node of the next bin after the one holding `prev` (skip the
    /// rest of the current bin).
    pub(crate) fn next_bin_start(&self, prev: NodeId) -> Option<NodeId> {
        let h = self.nodes.get(&prev.num)?.hash;
        for b in &self.bins[h + 1..] {
            if let Some(n) = b.first() {
                return Some(NodeId::new(self.tag, *n));
            }
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
