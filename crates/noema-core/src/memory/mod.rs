//! Working Memory - Main semantic pool plus the transient inference halo
//!
//! Two pools back the reasoning cycle: the main pool holds current
//! conscious facts (positive numbers, recency ordered) and the halo pool
//! holds short-lived inferences (negative numbers, strictly ascending).
//! Two boundaries partition the halo into bands:
//!
//! ```text
//!   main:  obj-22
//!          obj-2      BAND 0: current conscious facts
//!          obj-9              (ordered by recency)
//!
//!   halo:  obj+3
//!          obj+4      BAND 1: long-term ghost facts
//!                  <--- rim
//!          obj+8
//!          obj+10     BAND 2: one rule inferences
//!                  <--- nimbus
//!          obj+16
//!          obj+20     BAND 3: two rule inferences
//! ```
//!
//! Enumeration flows seamlessly from main into the halo up to the band
//! ceiling (`mode`), which is what the matcher leans on.

use serde::{Deserialize, Serialize};

use crate::graph::query;
use crate::graph::{
    Bindings, GraphError, Graphlet, Node, NodeId, NodeList, NodePool,
};

/// Maximum external reference links.
pub const EXT_MAX: usize = 50;

/// Category of an externally tracked item.
pub const EXT_OBJ: i32 = 0;
pub const EXT_AGT: i32 = 1;
pub const EXT_SURF: i32 = 2;

#[derive(Clone, Copy, Debug)]
struct ExtEntry {
    cat: i32,
    rnum: i32,
    node: NodeId,
}

/// Summary counts for host inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub main_nodes: usize,
    pub halo_nodes: usize,
    pub rim: i32,
    pub nimbus: i32,
    pub skepticism: f64,
}

// ============================================================================
// WORKING MEMORY
// ============================================================================

/// Main temporary semantic network: conscious facts plus expectation halo,
/// conversation participants, and external identity links.
pub struct WorkingMemory {
    main: NodePool,
    halo: NodePool,

    // main vs halo separation
    rim: i32,
    nimbus: i32,
    mode: i32,

    // conversational agents
    self_node: Option<NodeId>,
    user_node: Option<NodeId>,

    // global condition belief threshold (skepticism)
    skep: f64,
    bth0: f64,

    // external linkages
    ext: Vec<ExtEntry>,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingMemory {
    pub fn new() -> Self {
        let mut main = NodePool::new();
        main.hide_new(); // facts become matchable only when revealed
        let mut halo = NodePool::new();
        halo.negative_ids();
        let mut wm = Self {
            main,
            halo,
            rim: 0,
            nimbus: 0,
            mode: 0,
            self_node: None,
            user_node: None,
            skep: 0.5,
            bth0: 0.5,
            ext: Vec::new(),
        };
        wm.init_people(None);
        wm
    }

    /// Remove everything and rebuild the conversation participants.
    pub fn reset(&mut self, rname: Option<&str>) {
        self.ext.clear();
        self.main.purge_all();
        self.clear_halo();
        self.skep = self.bth0;
        self.self_node = None;
        self.user_node = None;
        self.init_people(rname);
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            main_nodes: self.main.node_count(),
            halo_nodes: self.halo.node_count(),
            rim: self.rim,
            nimbus: self.nimbus,
            skepticism: self.skep,
        }
    }

    // ------------------------------------------------------------------
    // pools and bands
    // ------------------------------------------------------------------

    pub fn pool(&self) -> &NodePool {
        &self.main
    }

    pub fn pool_mut(&mut self) -> &mut NodePool {
        &mut self.main
    }

    pub fn halo_pool(&self) -> &NodePool {
        &self.halo
    }

    /// Record the end of the long-term ghost section.
    pub fn border(&mut self) {
        self.rim = self.halo.last_label();
    }

    /// Record the single versus double rule inference boundary.
    pub fn horizon(&mut self) {
        self.nimbus = self.halo.last_label();
    }

    pub fn last_ghost(&self) -> i32 {
        self.rim
    }

    pub fn last_single(&self) -> i32 {
        self.nimbus
    }

    /// Highest band eligible for matching (0..3).
    pub fn max_band(&mut self, lvl: i32) {
        self.mode = lvl.clamp(0, 3);
    }

    pub fn band_mode(&self) -> i32 {
        self.mode
    }

    pub fn wmem_size(&self) -> usize {
        self.main.node_count()
    }

    pub fn halo_size(&self) -> usize {
        self.halo.node_count()
    }

    /// Whether a node lives in the main pool.
    pub fn in_main(&self, id: NodeId) -> bool {
        self.main.in_list(id)
    }

    /// Which memory partition a node occupies (0 main, 1 ghosts,
    /// 2 single-rule halo, 3 double-rule halo).
    pub fn in_band(&self, id: NodeId, part: i32) -> bool {
        if self.main.in_list(id) {
            return part == 0;
        }
        if !self.halo.in_list(id) {
            return true; // external nodes pass any band test
        }
        let num = -id.num();
        match part {
            1 => num <= self.rim,
            2 => num > self.rim && num <= self.nimbus,
            3 => num > self.nimbus,
            _ => false,
        }
    }

    /// Visible node in main memory, or (with `ghost`) a visible long-term
    /// ghost fact in halo band 1.
    pub fn vis_mem(&self, id: NodeId, ghost: bool) -> bool {
        let Some(n) = self.get(id) else {
            return false;
        };
        if !n.visible() {
            return false;
        }
        if !ghost {
            return self.in_main(id);
        }
        self.halo.in_list(id) && id.num().abs() <= self.rim
    }

    // ------------------------------------------------------------------
    // belief threshold
    // ------------------------------------------------------------------

    pub fn min_blf(&self) -> f64 {
        self.skep
    }

    pub fn set_min_blf(&mut self, s: f64) {
        self.skep = s.clamp(0.1, 1.0);
    }

    pub fn default_blf(&self) -> f64 {
        self.bth0
    }

    // ------------------------------------------------------------------
    // node construction (main pool)
    // ------------------------------------------------------------------

    pub fn make_node(&mut self, kind: &str, word: Option<&str>, neg: i32, def: f64) -> NodeId {
        self.main.make_node(kind, word, neg, def)
    }

    pub fn make_node_done(
        &mut self,
        kind: &str,
        word: Option<&str>,
        neg: i32,
        def: f64,
        done: i32,
    ) -> NodeId {
        self.main.make_node_done(kind, word, neg, def, done)
    }

    /// Attach a property fact `prop -role-> head` with the given word.
    /// With `chk` an equivalent existing property is reused instead.
    pub fn add_prop(
        &mut self,
        head: NodeId,
        role: &str,
        word: &str,
        neg: i32,
        def: f64,
        chk: bool,
    ) -> Result<NodeId, GraphError> {
        self.add_prop_kind(head, role, word, neg, def, chk, None)
    }

    pub fn add_prop_kind(
        &mut self,
        head: NodeId,
        role: &str,
        word: &str,
        neg: i32,
        def: f64,
        chk: bool,
        kind: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        if chk {
            if let Some(h) = self.get(head) {
                let found = (0..query::num_props(self, h)).find_map(|i| {
                    let pid = query::prop(self, h, i)?;
                    let p = self.get(pid)?;
                    if query::role_match(self, h, i, role) && p.lex_match(word) && p.neg() == neg {
                        Some(pid)
                    } else {
                        None
                    }
                });
                if let Some(pid) = found {
                    return Ok(pid);
                }
            }
        }
        let p = self
            .main
            .make_node(kind.unwrap_or(role), Some(word), neg, def);
        self.add_arg(p, role, head)?;
        Ok(p)
    }

    /// Property with an attached degree modifier ("very smart").
    pub fn add_deg(
        &mut self,
        head: NodeId,
        role: &str,
        word: &str,
        amt: &str,
        neg: i32,
        def: f64,
    ) -> Result<NodeId, GraphError> {
        let p = self.add_prop(head, role, word, neg, def, false)?;
        self.add_prop(p, "deg", amt, 0, def, false)?;
        Ok(p)
    }

    /// Add `head -slot-> val` across pools, keeping both cross-indices.
    pub fn add_arg(&mut self, head: NodeId, slot: &str, val: NodeId) -> Result<(), GraphError> {
        let same_main = self.main.in_list(head) && self.main.in_list(val);
        let same_halo = self.halo.in_list(head) && self.halo.in_list(val);
        if same_main {
            return self.main.add_arg(head, slot, val);
        }
        if same_halo {
            return self.halo.add_arg(head, slot, val);
        }

        // cross-pool arrow (typically halo inference over a main fact)
        if self.has_val_cross(head, slot, val) {
            return Ok(());
        }
        let idx = {
            let h = self.get(head).ok_or(GraphError::MissingNode(head.num()))?;
            if h.args_full() {
                return Err(GraphError::ArgsFull(h.nick()));
            }
            let v = self.get(val).ok_or(GraphError::MissingNode(val.num()))?;
            if v.props_full() {
                return Err(GraphError::PropsFull(v.nick()));
            }
            h.num_args()
        };
        self.pool_for_mut(head)
            .ok_or(GraphError::MissingNode(head.num()))?
            .push_arg_raw(head, slot, val);
        self.pool_for_mut(val)
            .ok_or(GraphError::MissingNode(val.num()))?
            .push_prop_raw(val, head, idx);
        Ok(())
    }

    fn has_val_cross(&self, head: NodeId, slot: &str, val: NodeId) -> bool {
        self.get(head)
            .map(|h| query::has_val(self, h, slot, val))
            .unwrap_or(false)
    }

    fn pool_for_mut(&mut self, id: NodeId) -> Option<&mut NodePool> {
        if self.main.in_list(id) {
            Some(&mut self.main)
        } else if self.halo.in_list(id) {
            Some(&mut self.halo)
        } else {
            None
        }
    }

    /// Resolve a node in either pool (inherent form of [`NodeList::get`]).
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.main.node(id).or_else(|| self.halo.node(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.main.in_list(id) {
            self.main.node_mut(id)
        } else {
            self.halo.node_mut(id)
        }
    }

    pub fn set_lex(&mut self, id: NodeId, txt: &str) {
        if self.main.in_list(id) {
            self.main.set_lex(id, txt);
        } else {
            self.halo.set_lex(id, txt);
        }
    }

    pub fn set_gen(&mut self, id: NodeId, ver: u32) {
        if let Some(p) = self.pool_for_mut(id) {
            p.set_gen(id, ver);
        }
    }

    pub fn mark_belief(&mut self, id: NodeId, blf: f64) {
        if let Some(p) = self.pool_for_mut(id) {
            p.mark_belief(id, blf);
        }
    }

    /// Tether a surface node to a deep cognate, possibly across pools.
    /// Any previous pairing of the deep node is broken first.
    pub fn moor_to(&mut self, surf: NodeId, deep: Option<NodeId>) {
        if deep == Some(surf) {
            return;
        }
        let old = self.get(surf).and_then(|n| n.moor());
        if old == deep {
            return;
        }
        if let Some(d) = deep {
            if let Some(prev) = self.get(d).and_then(|n| n.buoy()) {
                if let Some(pn) = self.node_mut(prev) {
                    pn.set_moor(None);
                }
            }
            if let Some(dn) = self.node_mut(d) {
                dn.set_buoy(Some(surf));
            }
        }
        if let Some(sn) = self.node_mut(surf) {
            sn.set_moor(deep);
        }
    }

    // ------------------------------------------------------------------
    // halo functions
    // ------------------------------------------------------------------

    pub fn clear_halo(&mut self) {
        // break any tethers into the halo before it vanishes
        for id in self.main.ids() {
            let stale = self
                .main
                .node(id)
                .and_then(|n| n.moor())
                .map(|m| m.is_halo())
                .unwrap_or(false);
            if stale {
                if let Some(n) = self.main.node_mut(id) {
                    n.set_moor(None);
                }
            }
        }
        self.halo.purge_all();
        self.rim = 0;
        self.nimbus = 0;
    }

    /// Instantiate a rule result into the halo using the given bindings.
    /// Unbound pattern nodes get fresh halo nodes (recorded back into the
    /// bindings); argument arrows are replicated across pools.
    pub fn assert_halo(
        &mut self,
        pat: &Graphlet,
        pat_pool: &dyn NodeList,
        b: &mut Bindings,
    ) -> Result<Graphlet, GraphError> {
        let mut out = Graphlet::new();

        for item in pat.items() {
            let inst = match b.lookup(item) {
                Some(s) => s,
                None => {
                    let (kind, word, neg, done) = {
                        let pn = pat_pool
                            .get(item)
                            .ok_or(GraphError::MissingNode(item.num()))?;
                        (
                            pn.kind().to_string(),
                            b.lex_sub(pn).map(|s| s.to_string()),
                            pn.neg(),
                            pn.done(),
                        )
                    };
                    let id = self
                        .halo
                        .make_node_done(&kind, word.as_deref(), neg, -1.0, done);
                    b.bind(item, id)?;
                    id
                }
            };
            let _ = out.add_item(inst);
        }

        for item in pat.items() {
            let head = b.lookup(item).unwrap_or(item);
            let arrows: Vec<(String, NodeId)> = {
                let pn = pat_pool
                    .get(item)
                    .ok_or(GraphError::MissingNode(item.num()))?;
                pn.args_view()
                    .iter()
                    .map(|a| (a.slot.clone(), a.val))
                    .collect()
            };
            for (slot, tgt) in arrows {
                let val = b.lookup(tgt).unwrap_or(tgt);
                self.add_arg(head, &slot, val)?;
            }
        }
        Ok(out)
    }

    /// Instantiate a description into the main pool using the given
    /// bindings: bound pattern nodes map through, unbound ones become
    /// fresh hidden hypotheticals (recorded back into the bindings).
    pub fn assert_main(
        &mut self,
        pat: &Graphlet,
        pat_pool: &dyn NodeList,
        b: &mut Bindings,
    ) -> Result<Graphlet, GraphError> {
        let mut out = Graphlet::new();
        for item in pat.items() {
            let inst = match b.lookup(item) {
                Some(s) => s,
                None => {
                    let (kind, word, neg, done, quote) = {
                        let pn = pat_pool
                            .get(item)
                            .ok_or(GraphError::MissingNode(item.num()))?;
                        (
                            pn.kind().to_string(),
                            b.lex_sub(pn).map(|s| s.to_string()),
                            pn.neg(),
                            pn.done(),
                            pn.literal().map(|s| s.to_string()),
                        )
                    };
                    let id = self
                        .main
                        .make_node_done(&kind, word.as_deref(), neg, -1.0, done);
                    if let Some(q) = quote {
                        if let Some(n) = self.main.node_mut(id) {
                            n.set_literal(Some(&q));
                        }
                    }
                    b.bind(item, id)?;
                    id
                }
            };
            let _ = out.add_item(inst);
        }
        for item in pat.items() {
            let head = b.lookup(item).unwrap_or(item);
            let arrows: Vec<(String, NodeId)> = {
                let pn = pat_pool
                    .get(item)
                    .ok_or(GraphError::MissingNode(item.num()))?;
                pn.args_view()
                    .iter()
                    .map(|a| (a.slot.clone(), a.val))
                    .collect()
            };
            for (slot, tgt) in arrows {
                let val = b.lookup(tgt).unwrap_or(tgt);
                if self.in_list(head) && self.in_list(val) {
                    self.add_arg(head, &slot, val)?;
                }
            }
        }
        Ok(out)
    }

    /// Replace the i'th argument of a node in place (slot preserved).
    pub fn subst_arg(&mut self, head: NodeId, i: usize, val: NodeId) {
        if self.main.in_list(head) && self.main.in_list(val) {
            self.main.subst_arg(head, i, val);
        }
    }

    // ------------------------------------------------------------------
    // truth maintenance
    // ------------------------------------------------------------------

    /// Make all elements of the description eligible for matching.
    pub fn reveal_all(&mut self, desc: &Graphlet) {
        let mut cnt = 0;
        for id in desc.items() {
            if let Some(n) = self.node_mut(id) {
                if !n.visible() {
                    n.reveal();
                    cnt += 1;
                }
            }
        }
        self.main.dirty(cnt);
    }

    /// Set belief of all listed nodes to their pending defaults.
    pub fn actualize_all(&mut self, desc: &Graphlet) -> usize {
        let ver = self.main.version();
        let mut chg = 0;
        for id in desc.items() {
            if let Some(n) = self.node_mut(id) {
                if n.actualize(ver) {
                    chg += 1;
                }
            }
        }
        chg
    }

    /// Override older main-memory versions of the described predicates:
    /// the first non-suppressed match with the same term and arguments
    /// gets a negated belief so only the newest variant stays live.
    /// Ignores sense negation so a truth value can flip.
    pub fn endorse(&mut self, desc: &Graphlet) -> usize {
        let mut hits: Vec<NodeId> = Vec::new();
        for id in desc.items() {
            let Some(n) = self.get(id) else { continue };
            if n.hyp() || n.obj_node() {
                continue;
            }
            let mut probe = self.main.next_node(None, None);
            while let Some(pid) = probe {
                if pid != id {
                    if let Some(n2) = self.main.node(pid) {
                        if !n2.hyp() && !n2.obj_node() && n.lex_same(n2) && query::same_args(self, n, n2)
                        {
                            hits.push(pid);
                            break;
                        }
                    }
                }
                probe = self.main.after(pid, None);
            }
        }
        let cnt = hits.len();
        for pid in hits {
            if let Some(n2) = self.main.node_mut(pid) {
                tracing::debug!(node = %n2.nick(), "endorse overrides");
                n2.suppress();
            }
        }
        self.main.dirty(cnt as u32);
        cnt
    }

    // ------------------------------------------------------------------
    // conversation participants
    // ------------------------------------------------------------------

    fn init_people(&mut self, rname: Option<&str>) {
        let mut gr = Graphlet::new();

        // the agent itself (never changes)
        let me = self.main.make_node("self", Some("me"), 0, -1.0);
        let _ = gr.add_item(me);
        if let Ok(p) = self.add_prop(me, "ako", "robot", 0, -1.0, false) {
            let _ = gr.add_item(p);
        }
        self.self_node = Some(me);
        if let Some(name) = rname {
            self.add_name(me, name, 0);
        }

        // default human generating input
        let you = self.main.make_node("user", Some("you"), 0, -1.0);
        let _ = gr.add_item(you);
        if let Ok(p) = self.add_prop(you, "ako", "person", 0, -1.0, false) {
            let _ = gr.add_item(p);
        }
        self.user_node = Some(you);

        // participants are believed outright, not pending on a NOTE
        self.reveal_all(&gr);
        self.actualize_all(&gr);
    }

    pub fn robot(&self) -> Option<NodeId> {
        self.self_node
    }

    pub fn human(&self) -> Option<NodeId> {
        self.user_node
    }

    /// Force the user to be some existing node (or make a fresh one).
    pub fn set_user(&mut self, n: Option<NodeId>) -> NodeId {
        let old = self.user_node;
        if n.is_some() && n == old {
            return old.unwrap();
        }
        if let Some(u0) = old {
            self.set_lex(u0, "");
        }
        let user = match n {
            Some(id) => {
                self.set_lex(id, "you");
                id
            }
            None => {
                let id = self.main.make_node("user", Some("you"), 0, -1.0);
                if let Some(nn) = self.node_mut(id) {
                    nn.reveal();
                }
                id
            }
        };
        if let (Some(o), u) = (old, user) {
            let old_nick = self.get(o).map(|n| n.nick()).unwrap_or_default();
            let new_nick = self.get(u).map(|n| n.nick()).unwrap_or_default();
            tracing::info!(from = %old_nick, to = %new_nick, "changing user");
        }
        self.user_node = Some(user);
        user
    }

    /// Add a full (and perhaps first) name to a node. A negated full name
    /// is recorded as a restriction without a first-name counterpart.
    pub fn add_name(&mut self, n: NodeId, name: &str, neg: i32) {
        if name.is_empty() {
            return;
        }
        let first = name.split(' ').next().unwrap_or("");
        let _ = self.add_prop(n, "name", name, neg, -1.0, true);
        if first != name && !first.is_empty() && neg <= 0 {
            let _ = self.add_prop(n, "name", first, 0, -1.0, true);
        }
    }

    /// Node associated with a person's name: full name first, then just
    /// the part before the space. Most recent match wins.
    pub fn find_name(&self, full: &str) -> Option<NodeId> {
        if full.is_empty() {
            return None;
        }
        if let Some(p) = self.scan_name(full) {
            return Some(p);
        }
        let first = full.split(' ').next().unwrap_or("");
        if first == full || first.is_empty() {
            return None;
        }
        self.scan_name(first)
    }

    fn scan_name(&self, label: &str) -> Option<NodeId> {
        let bth = self.min_blf();
        let bin = Some(crate::graph::lex_hash(label));
        let mut probe = self.main.next_node(None, bin);
        while let Some(pid) = probe {
            if let Some(n) = self.main.node(pid) {
                if n.neg() <= 0 && n.belief() >= bth && n.lex_match(label) {
                    if let Some(person) = n.val("name", 0) {
                        if !self.name_clash(person, label, 0) {
                            return Some(person);
                        }
                    }
                }
            }
            probe = self.main.after(pid, bin);
        }
        None
    }

    /// Whether an actual name or name restriction on the node conflicts
    /// with the given label.
    pub fn name_clash(&self, n: NodeId, name: &str, neg: i32) -> bool {
        if name.is_empty() {
            return false;
        }
        let first = {
            let f = name.split(' ').next().unwrap_or("");
            if f == name { "" } else { f }
        };
        let Some(nd) = self.get(n) else { return false };
        let cnt = query::num_props(self, nd);
        for i in 0..cnt {
            if !query::role_match(self, nd, i, "name") {
                continue;
            }
            let Some(pid) = query::prop_surf(self, nd, i) else {
                continue;
            };
            let Some(p) = self.get(pid) else { continue };
            if !pid.is_halo() && p.belief() >= self.min_blf() {
                if incompatible(p.lex_str(), p.neg(), name, first, neg) {
                    return true;
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // garbage collection
    // ------------------------------------------------------------------

    /// Mark-sweep over the main pool. Seeds must be marked (`keep = 1`)
    /// before the call; participants get stronger treatment. Returns the
    /// number of nodes removed.
    pub fn clean_mem(&mut self) -> usize {
        // normalize marks
        let ids = self.main.ids();
        for id in &ids {
            if let Some(n) = self.main.node_mut(*id) {
                let k = if n.keep_mark() > 0 { 1 } else { 0 };
                n.set_keep(k);
            }
        }

        // conversation participants keep their identity facts
        if let Some(me) = self.self_node {
            self.keep_party(me);
        }
        if let Some(you) = self.user_node {
            self.keep_party(you);
        }

        // spread marks from every externally marked node
        for id in &ids {
            let seed = self.main.node(*id).map(|n| n.keep_mark() == 1).unwrap_or(false);
            if seed {
                self.keep_from(*id);
            }
        }

        self.rem_unmarked()
    }

    /// Special mark spreader for conversation participants: retain only
    /// believed name and kind facts (plus qualities for non-self), and
    /// degree modifiers hanging off those.
    fn keep_party(&mut self, anchor: NodeId) {
        let is_self = Some(anchor) == self.self_node;
        self.set_keep(anchor, 2);
        let Some(an) = self.get(anchor) else { return };
        let an = an.clone();
        let cnt = query::num_props(self, &an);
        for i in 0..cnt {
            let Some(pid) = query::prop_surf(self, &an, i) else {
                continue;
            };
            let Some(p) = self.get(pid) else { continue };
            if p.hyp() || !self.in_main(pid) {
                continue;
            }
            let role = query::role(self, &an, i).unwrap_or("").to_string();
            let wanted = role == "name" || role == "ako" || (!is_self && (role == "hq" || role == "wrt"));
            if !wanted {
                continue;
            }
            let p = p.clone();
            self.set_keep(pid, 2);
            for j in 0..query::num_args(self, &p) {
                if let Some(a) = query::arg_surf(self, &p, j) {
                    self.set_keep(a, 1); // allow spreading from the argument
                }
            }
            // retain degree for properties like "very smart"
            for j in 0..query::num_props(self, &p) {
                if let Some(did) = query::prop_surf(self, &p, j) {
                    let deg_ok = self
                        .get(did)
                        .map(|d| !d.hyp() && self.in_main(did))
                        .unwrap_or(false);
                    if deg_ok && query::role_match(self, &p, j, "deg") {
                        self.set_keep(did, 2);
                    }
                }
            }
        }
    }

    fn set_keep(&mut self, id: NodeId, val: i32) {
        // routing through the buoy keeps a tethered pair consistent
        let tgt = self.get(id).and_then(|n| n.buoy()).unwrap_or(id);
        if let Some(n) = self.node_mut(tgt) {
            n.set_keep(val);
        }
    }

    fn keep_of(&self, id: NodeId) -> i32 {
        let tgt = self.get(id).and_then(|n| n.buoy()).unwrap_or(id);
        self.get(tgt).map(|n| n.keep_mark()).unwrap_or(0)
    }

    /// Mark a node and everything connected to it as non-garbage.
    fn keep_from(&mut self, anchor: NodeId) {
        if self.keep_of(anchor) > 1 || !self.in_main(anchor) {
            return;
        }
        if Some(anchor) == self.self_node || Some(anchor) == self.user_node {
            return; // handled separately
        }
        self.set_keep(anchor, 2);

        let Some(an) = self.get(anchor) else { return };
        let an = an.clone();
        for i in 0..query::num_args(self, &an) {
            if let Some(a) = query::arg_surf(self, &an, i) {
                self.keep_from(a);
            }
        }
        for i in 0..query::num_props(self, &an) {
            let Some(pid) = query::prop_surf(self, &an, i) else {
                continue;
            };
            let Some(p) = self.get(pid) else { continue };
            // skip user speech acts and dangling beliefless facts
            if p.kind() == "meta" {
                continue;
            }
            if p.belief() == 0.0 && p.naked() {
                continue;
            }
            self.keep_from(pid);
        }
    }

    /// Eliminate all facts not connected to marked nodes. Remaining nodes
    /// are left unmarked for the next round.
    fn rem_unmarked(&mut self) -> usize {
        let ids = self.main.ids();
        let mut cnt = 0;
        for id in ids {
            let keep = self.main.node(id).map(|n| n.keep_mark()).unwrap_or(1);
            if keep > 0 {
                if let Some(n) = self.main.node_mut(id) {
                    n.set_keep(0);
                }
            } else {
                tracing::debug!(node = %self.main.node(id).map(|n| n.nick()).unwrap_or_default(), "forgetting");
                self.rem_ext_node(id);
                self.main.remove(id);
                cnt += 1;
            }
        }
        if cnt > 0 {
            tracing::info!(removed = cnt, "memory cleaned");
        }
        cnt
    }

    // ------------------------------------------------------------------
    // external nodes
    // ------------------------------------------------------------------

    /// Link an external reference number to a node (or unlink with None).
    /// Returns false when the table is full or nothing changed.
    pub fn ext_link(&mut self, rnum: i32, node: Option<NodeId>, kind: i32) -> bool {
        if let Some(pos) = self
            .ext
            .iter()
            .position(|e| e.cat == kind && e.rnum == rnum)
        {
            match node {
                Some(n) if self.ext[pos].node == n => return false,
                Some(n) => {
                    self.ext[pos].node = n;
                    tracing::info!(kind, rnum, "switching tracked item");
                }
                None => {
                    self.ext.remove(pos);
                    tracing::info!(kind, rnum, "unlinking tracked item");
                }
            }
            return true;
        }
        let Some(n) = node else { return false };
        if self.ext.len() >= EXT_MAX {
            return false;
        }
        self.ext.push(ExtEntry {
            cat: kind,
            rnum,
            node: n,
        });
        tracing::info!(kind, rnum, "linking tracked item");
        true
    }

    pub fn ext_ref(&self, rnum: i32, kind: i32) -> Option<NodeId> {
        self.ext
            .iter()
            .find(|e| e.cat == kind && e.rnum == rnum)
            .map(|e| e.node)
    }

    pub fn ext_ref_node(&self, node: NodeId, kind: i32) -> i32 {
        self.ext
            .iter()
            .find(|e| e.cat == kind && e.node == node)
            .map(|e| e.rnum)
            .unwrap_or(0)
    }

    /// Enumerate reference numbers of a kind: start with `last = 0`, feed
    /// in the previous answer, 0 at the end.
    pub fn ext_enum(&self, last: i32, kind: i32) -> i32 {
        let mut ready = last <= 0;
        for e in self.ext.iter().filter(|e| e.cat == kind) {
            if ready {
                return e.rnum;
            }
            if e.rnum == last {
                ready = true;
            }
        }
        0
    }

    fn rem_ext_node(&mut self, node: NodeId) {
        self.ext.retain(|e| e.node != node);
    }
}

/// Whether a known name (or restriction) conflicts with a new label.
/// A single-part new name arrives with an empty `first`.
fn incompatible(name: &str, nneg: i32, full: &str, first: &str, fneg: i32) -> bool {
    // new assertion denies some name
    if fneg > 0 {
        if nneg > 0 {
            return false; // two restrictions never clash
        }
        if name == full {
            return true; // exact contradiction
        }
        let nick = name.split(' ').next().unwrap_or("");
        if nick == name {
            return false;
        }
        return nick == first;
    }

    // positive new assertion with two parts
    if !first.is_empty() {
        if nneg > 0 {
            return name == full || name == first;
        }
        return name != full && name != first;
    }

    // positive one-part name against node name
    if nneg > 0 {
        return name == full;
    }
    if name == full {
        return false;
    }
    let nick = name.split(' ').next().unwrap_or("");
    if nick == name {
        return true;
    }
    nick != full
}

// ============================================================================
// NodeList across bands
// ============================================================================

impl NodeList for WorkingMemory {
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.main.node(id).or_else(|| self.halo.node(id))
    }

    /// Next node in order, transitioning from main into the halo up to the
    /// band ceiling.
    fn next_node(&self, prev: Option<NodeId>, bin: Option<usize>) -> Option<NodeId> {
        let mut n = match prev {
            Some(p) if p.is_halo() => self.halo.after(p, bin),
            _ => {
                let cand = match prev {
                    None => self.main.first_in(bin),
                    Some(p) => self.main.after(p, bin),
                };
                match cand {
                    Some(c) => Some(c),
                    None if self.mode > 0 => self.halo.first_in(bin),
                    None => None,
                }
            }
        };

        // skip halo nodes above the valid band ceiling
        while let Some(c) = n {
            if !c.is_halo() {
                return Some(c);
            }
            let id = c.num().abs();
            let ok = match self.mode {
                1 => id <= self.rim,
                2 => id <= self.nimbus,
                3 => true,
                _ => false,
            };
            if ok {
                return Some(c);
            }
            if bin.is_none() {
                n = self.halo.next_bin_start(c); // ids ascend within a bin
            } else {
                return None;
            }
        }
        None
    }

    fn length(&self) -> usize {
        self.main.node_count() + self.halo.node_count()
    }

    fn in_list(&self, id: NodeId) -> bool {
        self.main.in_list(id) || self.halo.in_list(id)
    }

    fn num_bins(&self) -> usize {
        crate::graph::NBINS
    }

    fn same_bin(&self, focus: &Node, b: Option<&Bindings>) -> usize {
        let bin = if focus.lex().is_none() {
            None
        } else {
            let h = match b {
                Some(b) => b.lex_bin(focus),
                None => focus.code(),
            };
            if h == 0 { None } else { Some(h) }
        };
        if self.mode <= 0 {
            self.main.bin_cnt(bin)
        } else {
            self.main.bin_cnt(bin) + self.halo.bin_cnt(bin)
        }
    }

    /// Nodes beyond the current band ceiling may not be used by anchored
    /// expansion either.
    fn prohibited(&self, id: NodeId) -> bool {
        if !id.is_halo() {
            return false;
        }
        match self.mode {
            0 => true,
            1 | 2 => id.num() < -self.nimbus,
            _ => false,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participants_exist_and_are_believed() {
        let wm = WorkingMemory::new();
        let me = wm.robot().unwrap();
        let you = wm.human().unwrap();
        assert!(wm.get(me).unwrap().lex_match("me"));
        assert!(wm.get(you).unwrap().lex_match("you"));
        assert!(wm.get(me).unwrap().belief() > 0.0);
    }

    #[test]
    fn band_enumeration_respects_mode() {
        let mut wm = WorkingMemory::new();
        let a = wm.make_node("obj", Some("thing"), 0, 1.0);
        wm.node_mut(a).unwrap().reveal();

        // drop a couple of inferences into the halo
        let mut b = Bindings::new();
        let mut pat_pool = NodePool::new();
        let p = pat_pool.make_node("hq", Some("big"), 0, 1.0);
        let mut pat = Graphlet::new();
        pat.add_item(p).unwrap();
        wm.assert_halo(&pat, &pat_pool, &mut b).unwrap();
        wm.horizon(); // single-rule boundary
        let mut b2 = Bindings::new();
        wm.assert_halo(&pat, &pat_pool, &mut b2).unwrap();

        let count_nodes = |wm: &WorkingMemory| {
            let mut cnt = 0;
            let mut n = wm.next_node(None, None);
            while let Some(id) = n {
                cnt += 1;
                n = wm.next_node(Some(id), None);
            }
            cnt
        };

        let base = {
            wm.max_band(0);
            count_nodes(&wm)
        };
        wm.max_band(2);
        assert_eq!(count_nodes(&wm), base + 1); // one single-rule inference
        wm.max_band(3);
        assert_eq!(count_nodes(&wm), base + 2); // both inferences
    }

    #[test]
    fn endorse_suppresses_older_variant() {
        let mut wm = WorkingMemory::new();
        let obj = wm.make_node("obj", None, 0, 1.0);
        let old = wm.add_prop(obj, "hq", "red", 0, 1.0, false).unwrap();
        wm.node_mut(old).unwrap().set_belief(0.9);
        wm.node_mut(old).unwrap().reveal();

        // newer contradictory fact
        let new = wm.add_prop(obj, "hq", "red", 1, 1.0, false).unwrap();
        wm.node_mut(new).unwrap().set_belief(1.0);
        wm.node_mut(new).unwrap().reveal();

        let mut desc = Graphlet::new();
        desc.add_item(new).unwrap();
        assert_eq!(wm.endorse(&desc), 1);
        assert!(wm.get(old).unwrap().belief() < 0.0);
        assert!(wm.get(new).unwrap().belief() > 0.0);
    }

    #[test]
    fn clean_mem_removes_unreachable_chains() {
        let mut wm = WorkingMemory::new();
        let a = wm.make_node("obj", None, 0, 1.0);
        let b = wm.make_node("obj", None, 0, 1.0);
        let f = wm.make_node("act", Some("grab"), 0, 1.0);
        wm.add_arg(f, "agt", a).unwrap();
        wm.add_arg(f, "obj", b).unwrap();
        let c = wm.add_prop(b, "hq", "red", 0, 1.0, false).unwrap();
        wm.ext_link(17, Some(b), EXT_OBJ);

        // fresh nodes get one grace round before becoming collectible
        assert_eq!(wm.clean_mem(), 0);
        let gone = wm.clean_mem();
        assert!(gone >= 4);
        assert!(wm.get(f).is_none());
        assert!(wm.get(c).is_none());
        assert_eq!(wm.ext_ref(17, EXT_OBJ), None);

        // participants survive
        assert!(wm.get(wm.robot().unwrap()).is_some());
    }

    #[test]
    fn keep_marks_preserve_seeded_structure() {
        let mut wm = WorkingMemory::new();
        let a = wm.make_node("obj", None, 0, 1.0);
        let f = wm.add_prop(a, "hq", "red", 0, 1.0, false).unwrap();
        wm.node_mut(f).unwrap().set_belief(1.0);

        // past the grace round, only seeded structure stays
        wm.clean_mem();
        wm.node_mut(a).unwrap().set_keep(1);
        wm.clean_mem();
        assert!(wm.get(a).is_some());
        assert!(wm.get(f).is_some()); // spread through the property
    }

    #[test]
    fn ext_enum_walks_entries() {
        let mut wm = WorkingMemory::new();
        let a = wm.make_node("obj", None, 0, 1.0);
        let b = wm.make_node("obj", None, 0, 1.0);
        wm.ext_link(5, Some(a), EXT_OBJ);
        wm.ext_link(9, Some(b), EXT_OBJ);
        assert_eq!(wm.ext_enum(0, EXT_OBJ), 5);
        assert_eq!(wm.ext_enum(5, EXT_OBJ), 9);
        assert_eq!(wm.ext_enum(9, EXT_OBJ), 0);
        assert_eq!(wm.ext_ref_node(b, EXT_OBJ), 9);
    }

    #[test]
    fn name_logic_accepts_first_and_full() {
        let mut wm = WorkingMemory::new();
        let jon = wm.make_node("dude", None, 0, 1.0);
        wm.add_name(jon, "Jon Connell", 0);
        // realize the pending name facts
        let ids = wm.pool().ids();
        for id in ids {
            if let Some(n) = wm.node_mut(id) {
                n.reveal();
                let _ = n.actualize(1);
            }
        }
        assert_eq!(wm.find_name("Jon Connell"), Some(jon));
        assert_eq!(wm.find_name("Jon"), Some(jon));
        assert_eq!(wm.find_name("Ken"), None);

        // a negated restriction blocks the match
        assert!(!wm.name_clash(jon, "Jon", 0));
        wm.add_name(jon, "Ken", 1);
        let ids = wm.pool().ids();
        for id in ids {
            if let Some(n) = wm.node_mut(id) {
                n.reveal();
                let _ = n.actualize(1);
            }
        }
        assert!(wm.name_clash(jon, "Ken", 0));
    }
}
