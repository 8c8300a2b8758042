//! Directive - Typed step of an action plan
//!
//! The directive is the unit of reasoning: it states what sort of thing to
//! do, selects operators from procedural memory as methods, and runs the
//! per-kind completion logic. Non-return inhibition keeps a history of
//! operator/binding combinations already tried so a failing method is not
//! chosen twice for the same goal.
//!
//! Kinds:
//! - NOTE  assert a new fact; try all applicable operators one by one
//! - DO    request an action; preparation (ANTE) runs first implicitly
//! - ANTE  prepare for an action; exhaust operators then succeed
//! - PUNT  immediate failure, short-circuits backtracking
//! - FCN   kernel grounding call, externally terminated
//! - ACH   succeed as soon as the item is true, else work toward it
//! - KEEP  fail when the item becomes false; never succeeds on its own
//! - CHK   truth test; continue on true, alternate on false
//! - FIND  bind the description to some known item, backtrackable
//! - BIND  like FIND but may assume a new item when stuck
//! - EACH  enumerate all bindings, alternate success when exhausted
//! - ANY   like EACH but alternate even without a first binding
//! - NONE  block executed when FIND/BIND/EACH/ANY got stuck
//! - TRY   scope boundary for a new command or question
//! - ADD   accept a new rule or operator into the system

use std::io::Read;

use crate::act::chain::ChainGraph;
use crate::act::{ALT, DONE, FAIL, PUNT, WORKING};
use crate::core::Core;
use crate::graph::{query, Bindings, Graphlet, NodeId, NodeList, NodePool};
use crate::kb::{self, KbError, LineReader, TransTable};
use crate::matcher::{MatchSink, Situation};

/// Maximum operator choices considered per selection round.
pub const OP_MAX: usize = 20;

/// Maximum non-return inhibition history.
pub const NRI_MAX: usize = 20;

/// Maximum FIND/BIND guesses to try.
pub const GUESS_MAX: usize = 3;

// ============================================================================
// KIND
// ============================================================================

/// The fifteen directive kinds, in canonical order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DirKind {
    #[default]
    Note,
    Do,
    Ante,
    Punt,
    Fcn,
    Ach,
    Keep,
    Chk,
    Find,
    Bind,
    Each,
    Any,
    None,
    Try,
    Add,
}

/// Kind tags in canonical order (must stay aligned with [`DirKind`]).
pub const KIND_TAG: [&str; 15] = [
    "NOTE", "DO", "ANTE", "PUNT", "FCN", "ACH", "KEEP", "CHK", "FIND", "BIND", "EACH", "ANY",
    "NONE", "TRY", "ADD",
];

impl DirKind {
    pub fn tag(&self) -> &'static str {
        KIND_TAG[*self as usize]
    }

    pub fn parse_tag(s: &str) -> Option<Self> {
        use DirKind::*;
        const ALL: [DirKind; 15] = [
            Note, Do, Ante, Punt, Fcn, Ach, Keep, Chk, Find, Bind, Each, Any, None, Try, Add,
        ];
        KIND_TAG
            .iter()
            .position(|t| t.eq_ignore_ascii_case(s))
            .map(|i| ALL[i])
    }

    /// Operator lookup collapses the FIND variants into one family.
    pub fn op_family(&self) -> DirKind {
        match self {
            DirKind::Bind | DirKind::Each | DirKind::Any => DirKind::Find,
            k => *k,
        }
    }

    /// Whether this kind can take the alternate continuation.
    pub fn has_alt(&self) -> bool {
        matches!(self, DirKind::Chk | DirKind::Each | DirKind::Any)
    }

    pub fn is_find(&self) -> bool {
        matches!(
            self,
            DirKind::Find | DirKind::Bind | DirKind::Each | DirKind::Any
        )
    }
}

// ============================================================================
// DIRECTIVE
// ============================================================================

#[derive(Default)]
enum Phase {
    #[default]
    Fresh,
    Prep,
    Main,
}

/// A directive: kind, key description, matching state, and the method
/// currently in progress.
#[derive(Default)]
pub struct Directive {
    pub kind: DirKind,
    /// Description this directive is about (working-memory nodes once
    /// instantiated, pattern nodes inside an operator template).
    pub key: Graphlet,
    /// Top-level assertion (own speech act) marker.
    pub root: bool,
    /// Focus index that owns this directive (relevance routing).
    pub own: i32,

    // matching results filled by procedural memory
    pub ops: Vec<u32>,
    pub matches: Vec<Bindings>,
    pub mc: usize,
    pub any_ops: bool,

    // non-return inhibition
    nri: Vec<(u32, Bindings)>,

    // method in progress
    pub meth: Option<Box<ChainGraph>>,
    cur_op: Option<u32>,
    phase: Phase,

    // FIND state
    pub guess: Vec<NodeId>,
    pub cand0: usize,
    pub hyp: Option<NodeId>,
    found: Option<(NodeId, NodeId)>,
    produced: usize,
    retry: bool,

    // scoping applied to the key, so a retry can undo the old guess
    subst: Vec<(NodeId, usize, NodeId)>,
    swapped: Vec<(NodeId, NodeId)>,

    // FCN state
    pub inst: i32,

    // ADD payload
    pub new_rule: Option<Box<crate::reason::Rule>>,
    pub new_oper: Option<Box<crate::reason::Operator>>,

    pub verdict: i32,
}

impl Directive {
    pub fn new(kind: DirKind) -> Self {
        Self {
            kind,
            mc: OP_MAX,
            matches: vec![Bindings::new(); OP_MAX],
            ops: vec![0; OP_MAX],
            ..Default::default()
        }
    }

    pub fn with_key(kind: DirKind, key: Graphlet) -> Self {
        let mut d = Self::new(kind);
        d.key = key;
        d
    }

    pub fn key_main(&self) -> Option<NodeId> {
        self.key.main()
    }

    /// Whether a FIND/BIND holds a concrete guess that successors can
    /// backtrack into.
    pub fn concrete_find(&self) -> bool {
        self.kind.is_find() && (!self.guess.is_empty() || self.hyp.is_some())
    }

    /// Hand over a fresh binding produced by FIND for chain scoping.
    pub fn take_found(&mut self) -> Option<(NodeId, NodeId)> {
        self.found.take()
    }

    /// Operator whose method is currently in progress, if any.
    pub fn current_op(&self) -> Option<u32> {
        self.cur_op
    }

    /// Arrange for the next start to look for an alternative answer.
    pub fn prepare_retry(&mut self) {
        self.retry = true;
    }

    /// Whether the directive mentions a node in its key (or an argument).
    pub fn involves(&self, pool: &NodePool, item: NodeId) -> bool {
        if self.key.in_desc(item) {
            return true;
        }
        self.key.items().any(|id| {
            pool.node(id)
                .map(|n| n.args_view().iter().any(|a| a.val == item))
                .unwrap_or(false)
        })
    }

    /// Keep all referenced nodes (and any running method) through GC.
    pub fn mark_seeds(&self, wmem: &mut crate::memory::WorkingMemory) {
        for id in self.key.items() {
            if let Some(n) = wmem.node_mut(id) {
                n.set_keep(1);
            }
        }
        for g in &self.guess {
            if let Some(n) = wmem.node_mut(*g) {
                n.set_keep(1);
            }
        }
        if let Some(h) = self.hyp {
            if let Some(n) = wmem.node_mut(h) {
                n.set_keep(1);
            }
        }
        if let Some(m) = &self.meth {
            m.mark_seeds(wmem);
        }
    }

    /// Instantiate a template directive into working memory: bound pattern
    /// nodes map through, unbound ones become fresh hidden hypotheticals.
    pub fn instantiate(
        &self,
        wmem: &mut crate::memory::WorkingMemory,
        pool: &NodePool,
        b: &Bindings,
    ) -> Result<Directive, crate::graph::GraphError> {
        let mut sc = b.clone();
        self.instantiate_shared(wmem, pool, &mut sc)
    }

    pub(crate) fn instantiate_shared(
        &self,
        wmem: &mut crate::memory::WorkingMemory,
        pool: &NodePool,
        sc: &mut Bindings,
    ) -> Result<Directive, crate::graph::GraphError> {
        let mut d = Directive::new(self.kind);
        d.key = wmem.assert_main(&self.key, pool, sc)?;
        Ok(d)
    }

    // ------------------------------------------------------------------
    // main functions
    // ------------------------------------------------------------------

    /// Begin work: apply FIND scoping to the key, then the per-kind entry
    /// action. Returns 0 (working) or an immediate verdict.
    pub fn start(&mut self, core: &mut Core, scoping: &Bindings, _lvl: i32) -> i32 {
        self.subst_key(core, scoping);
        // descriptions become matchable once their directive goes live
        core.wmem.reveal_all(&self.key);
        if self.retry {
            self.retry = false;
            self.cand0 += 1;
        } else {
            self.nri.clear();
            self.guess.clear();
            self.cand0 = 0;
            self.produced = 0;
            self.hyp = None;
        }
        self.meth = None;
        self.cur_op = None;
        self.phase = Phase::Fresh;
        self.verdict = WORKING;

        match self.kind {
            DirKind::Note => {
                // posting: realize the description, stamp it with a fresh
                // relevance marker, retire older variants, and score it
                // against halo expectations
                core.wmem.reveal_all(&self.key);
                core.wmem.actualize_all(&self.key);
                self.own = core.next_tval();
                for id in self.key.items().collect::<Vec<_>>() {
                    if let Some(n) = core.wmem.node_mut(id) {
                        n.top_max(self.own);
                    }
                }
                core.wmem.endorse(&self.key);
                core.compare_halo(&self.key);
            }
            DirKind::Punt => {
                self.verdict = PUNT;
                return PUNT;
            }
            DirKind::Fcn => {
                self.inst = core.kernel_start(&self.key);
                if self.inst < 0 {
                    core.report_unknown_fcn(&self.key);
                    self.verdict = FAIL;
                    return FAIL;
                }
            }
            DirKind::Do => {
                self.phase = Phase::Prep;
            }
            _ => {}
        }
        WORKING
    }

    /// Replace description nodes with earlier FIND results. Any scoping
    /// from a previous round is undone first, so a backstop retry rewires
    /// the description to the fresh guess instead of the failed one.
    fn subst_key(&mut self, core: &mut Core, scoping: &Bindings) {
        for (old, new) in self.swapped.drain(..).rev() {
            self.key.replace_item(new, old);
        }
        for (head, i, orig) in self.subst.drain(..).rev() {
            core.wmem.subst_arg(head, i, orig);
        }
        if scoping.is_empty() {
            return;
        }
        let items: Vec<NodeId> = self.key.items().collect();
        for id in items {
            // rewrite argument arrows that mention substituted nodes
            let arrows: Vec<(usize, NodeId, NodeId)> = core
                .wmem
                .get(id)
                .map(|n| {
                    n.args_view()
                        .iter()
                        .enumerate()
                        .filter_map(|(i, a)| scoping.lookup(a.val).map(|s| (i, a.val, s)))
                        .collect()
                })
                .unwrap_or_default();
            for (i, orig, s) in arrows {
                core.wmem.subst_arg(id, i, s);
                self.subst.push((id, i, orig));
            }
            if let Some(s) = scoping.lookup(id) {
                if self.key.replace_item(id, s) {
                    self.swapped.push((id, s));
                }
            }
        }
    }

    /// Advance by one step. Returns 1/2 done, 0 working, negative failure.
    pub fn status(&mut self, core: &mut Core) -> i32 {
        if self.verdict != WORKING {
            return self.verdict;
        }
        let v = match self.kind {
            DirKind::Note => self.exhaust_ops(core, DirKind::Note, DONE),
            DirKind::Ante => self.exhaust_ops(core, DirKind::Ante, DONE),
            DirKind::None => self.exhaust_ops(core, DirKind::None, DONE),
            DirKind::Do => self.do_status(core),
            DirKind::Punt => PUNT,
            DirKind::Fcn => self.fcn_status(core),
            DirKind::Ach => self.ach_status(core),
            DirKind::Keep => self.keep_status(core),
            DirKind::Chk => self.chk_status(core),
            DirKind::Find | DirKind::Bind | DirKind::Each | DirKind::Any => {
                self.find_status(core)
            }
            DirKind::Try => DONE,
            DirKind::Add => self.add_status(core),
        };
        self.verdict = v;
        v
    }

    /// Courtesy signal that the activity is no longer needed.
    pub fn stop(&mut self, core: &mut Core) {
        if let Some(m) = &mut self.meth {
            m.stop(core);
        }
        if self.kind == DirKind::Fcn && self.inst > 0 {
            core.kernel_stop(&self.key, self.inst);
        }
        self.verdict = -1;
    }

    /// Whether an in-progress activity matches the description, optionally
    /// stopping it. Returns true when something matching was found.
    pub fn find_active(&mut self, core: &mut Core, desc: &Graphlet, halt: bool) -> bool {
        let Some(main) = desc.main() else { return false };
        let Some(mine) = self.key_main() else {
            return false;
        };
        let same = {
            let wm = &core.wmem;
            match (wm.get(main), wm.get(mine)) {
                (Some(a), Some(b)) => a.lex_same(b) && query::same_args(wm, a, b),
                _ => false,
            }
        };
        if same && halt {
            self.stop(core);
        }
        if same {
            return true;
        }
        if let Some(m) = &mut self.meth {
            return m.find_active(core, desc, halt);
        }
        false
    }

    // ------------------------------------------------------------------
    // per-kind logic
    // ------------------------------------------------------------------

    /// Run applicable operators one by one until none remain, then report
    /// the given final verdict.
    fn exhaust_ops(&mut self, core: &mut Core, family: DirKind, last: i32) -> i32 {
        if let Some(v) = self.run_method(core) {
            return v; // method still working (or just delivered a verdict)
        }
        if self.next_method(core, family) {
            return WORKING;
        }
        last
    }

    fn do_status(&mut self, core: &mut Core) -> i32 {
        // preparation phase runs ANTE advice to exhaustion first
        if matches!(self.phase, Phase::Prep) {
            if let Some(_v) = self.run_method(core) {
                return WORKING;
            }
            if self.next_method(core, DirKind::Ante) {
                return WORKING;
            }
            self.phase = Phase::Main;
            self.nri.clear();
        }

        // main phase: first operator success wins
        match self.method_verdict(core) {
            Some(WORKING) => return WORKING,
            Some(v) if v > 0 => return DONE,
            Some(_) => {
                // failed method dings that operator's preference
                if let Some(op) = self.cur_op.take() {
                    core.adj_op_pref(op, false);
                }
                self.meth = None;
            }
            None => {}
        }
        if self.next_method(core, DirKind::Do) {
            return WORKING;
        }
        core.note_failure(&self.key);
        FAIL
    }

    fn fcn_status(&mut self, core: &mut Core) -> i32 {
        match core.kernel_status(&self.key, self.inst) {
            0 => WORKING,
            v if v > 0 => DONE,
            _ => FAIL,
        }
    }

    fn ach_status(&mut self, core: &mut Core) -> i32 {
        // goal already true?
        if self.pat_confirm(core, false) == Some(true) {
            return DONE;
        }
        match self.method_verdict(core) {
            Some(WORKING) => return WORKING,
            Some(_) => self.meth = None,
            None => {}
        }
        if self.pat_confirm(core, false) == Some(true) {
            return DONE;
        }
        if self.next_method(core, DirKind::Ach) {
            return WORKING;
        }
        FAIL
    }

    fn keep_status(&mut self, core: &mut Core) -> i32 {
        // guard: barf as soon as the item becomes false
        if self.pat_confirm(core, true) == Some(false) {
            return FAIL;
        }
        match self.method_verdict(core) {
            Some(WORKING) => return WORKING,
            Some(_) => self.meth = None,
            None => {}
        }
        let _ = self.next_method(core, DirKind::Keep);
        WORKING // never succeeds on its own
    }

    fn chk_status(&mut self, core: &mut Core) -> i32 {
        match self.pat_confirm(core, true) {
            Some(true) => return DONE,
            Some(false) => return ALT,
            None => {}
        }
        match self.method_verdict(core) {
            Some(WORKING) => return WORKING,
            Some(_) => self.meth = None,
            None => {}
        }
        if self.next_method(core, DirKind::Chk) {
            return WORKING;
        }
        FAIL
    }

    fn find_status(&mut self, core: &mut Core) -> i32 {
        // guesses are bounded for plain FIND/BIND
        let bounded = matches!(self.kind, DirKind::Find | DirKind::Bind);
        if bounded && self.cand0 >= GUESS_MAX {
            return FAIL;
        }

        if let Some(mate) = self.seek_instance(core) {
            let main = self.key_main().unwrap_or(mate);
            self.guess.push(mate);
            self.produced += 1;
            if mate != main {
                self.found = Some((main, mate));
            }
            return DONE;
        }

        // let an operator try to scare up more information
        match self.method_verdict(core) {
            Some(WORKING) => return WORKING,
            Some(_) => self.meth = None,
            None => {}
        }
        if self.next_method(core, DirKind::Find) {
            return WORKING;
        }

        // out of candidates and advice
        match self.kind {
            DirKind::Bind => {
                // assume the description itself denotes a new item
                if let Some(main) = self.key_main() {
                    core.wmem.reveal_all(&self.key);
                    core.wmem.mark_belief(main, 1.0);
                    self.hyp = Some(main);
                    self.produced += 1;
                    return DONE;
                }
                FAIL
            }
            DirKind::Each => {
                if self.produced > 0 {
                    ALT
                } else {
                    FAIL
                }
            }
            DirKind::Any => ALT,
            _ => FAIL,
        }
    }

    fn add_status(&mut self, core: &mut Core) -> i32 {
        if let Some(r) = self.new_rule.take() {
            return if core.amem.add_rule(*r, true) { DONE } else { FAIL };
        }
        if let Some(op) = self.new_oper.take() {
            core.pmem.add_operator(*op);
            return DONE;
        }
        DONE
    }

    // ------------------------------------------------------------------
    // truth testing
    // ------------------------------------------------------------------

    /// Match the key description against memory. Returns Some(polarity
    /// agreement) of the completed match, None when nothing matches.
    /// With `flip` a mate of opposite polarity also completes (CHK).
    fn pat_confirm(&mut self, core: &mut Core, flip: bool) -> Option<bool> {
        let main = self.key_main()?;
        let mut sit = Situation::new();
        sit.cond = self.key.clone();
        sit.chkmode = flip;
        sit.bth = -core.wmem.min_blf();
        core.wmem.max_band(2);

        // the description itself must not satisfy its own test
        struct ConfirmSink {
            key: Graphlet,
            won: Option<Bindings>,
        }
        impl MatchSink for ConfirmSink {
            fn match_found(
                &mut self,
                m: &mut [Bindings],
                mc: &mut usize,
                _f: &dyn NodeList,
            ) -> i32 {
                let b = &m[mc.saturating_sub(1)];
                let echoes = (0..b.num_pairs())
                    .any(|i| b.sub(i).map(|s| self.key.in_desc(s)).unwrap_or(false));
                if echoes {
                    return 0;
                }
                if self.won.is_none() {
                    self.won = Some(b.clone());
                }
                1
            }
        }
        let mut sink = ConfirmSink {
            key: self.key.clone(),
            won: None,
        };
        let mut m = [Bindings::new()];
        m[0].expect = self.key.num_items();
        let mut mc = 1usize;
        sit.match_graph(
            &core.wmem,
            &mut sink,
            &mut m,
            &mut mc,
            &sit.cond.clone(),
            &core.wmem,
            None,
        );
        let b = sink.won?;
        let mate = b.lookup(main)?;
        let key_neg = core.wmem.get(main).map(|n| n.neg()).unwrap_or(0);
        let mate_neg = core.wmem.get(mate).map(|n| n.neg()).unwrap_or(0);
        Some(key_neg == mate_neg)
    }

    /// Look for a fresh referent for the key description among visible
    /// memory, excluding guesses already made.
    fn seek_instance(&mut self, core: &mut Core) -> Option<NodeId> {
        let main = self.key_main()?;
        let mut sit = Situation::new();
        sit.cond = self.key.clone();
        sit.refmode = true;
        sit.bth = -core.wmem.min_blf();
        core.wmem.max_band(if self.kind == DirKind::Bind { 1 } else { 2 });

        struct AllSink {
            main: NodeId,
            key: Graphlet,
            out: Vec<NodeId>,
        }
        impl MatchSink for AllSink {
            fn match_found(
                &mut self,
                m: &mut [Bindings],
                mc: &mut usize,
                _f: &dyn NodeList,
            ) -> i32 {
                let b = &m[mc.saturating_sub(1)];
                // a guess built from the description itself is no guess
                let echoes = (0..b.num_pairs())
                    .any(|i| b.sub(i).map(|s| self.key.in_desc(s)).unwrap_or(false));
                if echoes {
                    return 0;
                }
                if let Some(mate) = b.lookup(self.main) {
                    if !self.out.contains(&mate) {
                        self.out.push(mate);
                    }
                }
                1
            }
        }
        let mut sink = AllSink {
            main,
            key: self.key.clone(),
            out: Vec::new(),
        };
        let mut m = [Bindings::new()];
        m[0].expect = self.key.num_items();
        let mut mc = 1usize;
        sit.match_graph(
            &core.wmem,
            &mut sink,
            &mut m,
            &mut mc,
            &sit.cond.clone(),
            &core.wmem,
            None,
        );
        sink.out
            .into_iter()
            .find(|mate| *mate != main && !self.guess.contains(mate))
    }

    // ------------------------------------------------------------------
    // method selection
    // ------------------------------------------------------------------

    /// Poll the running method (if any). None when no method is active;
    /// Some(verdict) passes its current state through.
    fn method_verdict(&mut self, core: &mut Core) -> Option<i32> {
        let m = self.meth.as_mut()?;
        Some(m.status(core))
    }

    /// Like [`Self::method_verdict`] but collapses any finished method:
    /// Some(v) only while one is still working or just finished.
    fn run_method(&mut self, core: &mut Core) -> Option<i32> {
        match self.method_verdict(core) {
            Some(WORKING) => Some(WORKING),
            Some(_) => {
                // completion (either way) moves on to the next operator
                if self.kind == DirKind::Note {
                    if let Some(opid) = self.cur_op.take() {
                        let secs = self.meth.as_ref().map(|m| m.elapsed(core.now())).unwrap_or(0.0);
                        core.pmem.adj_time(opid, secs);
                    }
                }
                self.meth = None;
                None
            }
            None => None,
        }
    }

    /// Choose the next untried operator for this directive and instantiate
    /// its method. Returns false when no further choice exists.
    fn next_method(&mut self, core: &mut Core, family: DirKind) -> bool {
        if self.nri.len() >= NRI_MAX {
            return false;
        }
        // collect applicable operators and their bindings
        let pth = core.min_pref();
        let mth = core.wmem.min_blf();
        core.pmem.find_ops(self, &mut core.wmem, pth, mth, family);

        // pick the highest-preference candidate not already tried
        let mut pick: Option<(usize, f64, usize)> = None; // (slot, pref, spec)
        for i in (self.mc..OP_MAX).rev() {
            let opid = self.ops[i];
            let Some(op) = core.pmem.op(opid) else { continue };
            if self
                .nri
                .iter()
                .any(|(o, b)| *o == opid && op.same_effect(b, &self.matches[i]))
            {
                continue;
            }
            let spec = op.sit.cond.num_items();
            let better = match pick {
                None => true,
                Some((_, p, s)) => op.pref > p || (op.pref == p && spec > s),
            };
            if better {
                pick = Some((i, op.pref, spec));
            }
        }
        let Some((slot, pref, _)) = pick else {
            return false;
        };
        let opid = self.ops[slot];
        let mut b = self.matches[slot].clone();
        self.nri.push((opid, b.clone()));

        // two-step halo support used by this match becomes permanent
        core.amem.consolidate(&b, &core.wmem);
        core.reify_rules(&mut b, 2);

        // build the method from the operator's template
        let inst = {
            let Some((tmpl, pool)) = core.pmem.method_parts(opid) else {
                return false;
            };
            tmpl.instantiate(&mut core.wmem, pool, &b)
        };
        match inst {
            Ok(mut m) => {
                if matches!(self.kind, DirKind::Each | DirKind::Any) {
                    m.enumerate();
                }
                let v = m.start(core, 1);
                self.meth = Some(Box::new(m));
                self.cur_op = Some(opid);
                core.atree.service_wt(pref);
                tracing::debug!(op = opid, kind = self.kind.tag(), "method selected");
                let _ = v;
                true
            }
            Err(_) => false,
        }
    }

    // ------------------------------------------------------------------
    // file functions
    // ------------------------------------------------------------------

    /// Read one directive of the form `KIND[ <graphlet> ]`.
    pub fn load<R: Read>(
        pool: &mut NodePool,
        trans: &mut TransTable,
        input: &mut LineReader<R>,
    ) -> Result<Directive, KbError> {
        let syntax_ln = input.last();
        input.next(false).ok_or(KbError::Syntax(syntax_ln))?;
        let tok = input.token().ok_or(KbError::Syntax(input.last()))?;
        let (tag, rest_open) = match tok.split_once('[') {
            Some((t, r)) => (t.to_string(), r.to_string()),
            None => (tok, String::new()),
        };
        let kind = DirKind::parse_tag(&tag).ok_or(KbError::Syntax(input.last()))?;

        // gather the bracketed description text
        let mut body = String::new();
        let mut line = rest_open;
        if line.is_empty() {
            line = input.head().unwrap_or("").to_string();
            input.flush();
            if let Some(r) = line.strip_prefix('[') {
                line = r.to_string();
            }
        } else {
            input.flush();
        }
        loop {
            let trimmed = line.trim_end();
            if let Some(done) = trimmed.strip_suffix(']') {
                body.push_str(done);
                body.push('\n');
                break;
            }
            body.push_str(&line);
            body.push('\n');
            line = match input.next(false) {
                Some(l) => l.to_string(),
                None => return Err(KbError::Syntax(input.last())),
            };
            input.flush();
        }

        let mut d = Directive::new(kind);
        if !body.trim().is_empty() {
            let mut sub = LineReader::new(body.as_bytes());
            sub.next_content();
            d.key = kb::load_graph(pool, trans, &mut sub)?;
        }
        Ok(d)
    }

    /// Write the directive as `KIND[ <graphlet> ]`.
    pub fn save(&self, pool: &dyn NodeList, out: &mut String, lvl: usize) -> std::fmt::Result {
        use std::fmt::Write;
        let open = format!("{:lvl$} {}[ ", "", self.kind.tag());
        out.push_str(&open);
        kb::write_graphlet(out, pool, &self.key, -(open.len() as i32), 0)?;
        writeln!(out, " ]")?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip() {
        use DirKind::*;
        for k in [
            Note, Do, Ante, Punt, Fcn, Ach, Keep, Chk, Find, Bind, Each, Any, None, Try, Add,
        ] {
            assert_eq!(DirKind::parse_tag(k.tag()), Some(k));
        }
        assert_eq!(DirKind::parse_tag("bogus"), Option::None);
    }

    #[test]
    fn op_family_collapses_find_variants() {
        assert_eq!(DirKind::Bind.op_family(), DirKind::Find);
        assert_eq!(DirKind::Each.op_family(), DirKind::Find);
        assert_eq!(DirKind::Any.op_family(), DirKind::Find);
        assert_eq!(DirKind::Do.op_family(), DirKind::Do);
    }

    #[test]
    fn directive_text_round_trip() {
        let mut pool = NodePool::new();
        let mut trans = TransTable::new();
        let text = " DO[ act-1 -lex- grab\n          -obj-> obj-3 ]\n";
        let mut input = LineReader::new(text.as_bytes());
        let d = Directive::load(&mut pool, &mut trans, &mut input).unwrap();
        assert_eq!(d.kind, DirKind::Do);
        assert_eq!(d.key.num_items(), 2);

        let mut out = String::new();
        d.save(&pool, &mut out, 0).unwrap();
        let mut pool2 = NodePool::new();
        let mut trans2 = TransTable::new();
        let mut in2 = LineReader::new(out.as_bytes());
        let d2 = Directive::load(&mut pool2, &mut trans2, &mut in2).unwrap();
        assert_eq!(d2.kind, DirKind::Do);
        assert_eq!(d2.key.num_items(), 2);
    }

    #[test]
    fn punt_is_empty_and_loads() {
        let mut pool = NodePool::new();
        let mut trans = TransTable::new();
        let mut input = LineReader::new(" PUNT[ ]\n".as_bytes());
        let d = Directive::load(&mut pool, &mut trans, &mut input).unwrap();
        assert_eq!(d.kind, DirKind::Punt);
        assert!(d.key.is_empty());
    }
}
