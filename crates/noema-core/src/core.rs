//! Core - The engine context and cognition cycle
//!
//! One `Core` owns working memory, the attention tree, both knowledge
//! stores, the grounding kernels, and every tunable that used to be a
//! global. A cognition cycle runs in a fixed order: prune and collect,
//! rebuild the expectation halo, then advance each serviceable focus by
//! one FSM step. Credit assignment compares newly asserted facts against
//! halo predictions and nudges the responsible rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::act::chain::ChainGraph;
use crate::act::directive::{DirKind, Directive};
use crate::act::FAIL;
use crate::attention::{ActionTree, Mood};
use crate::graph::{query, Bindings, Graphlet, NodeId, NodeList};
use crate::grounding::GroundingKernel;
use crate::memory::WorkingMemory;
use crate::reason::{OperatorMemory, RuleMemory};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Learning and scheduling parameters. These affect personality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Min belief threshold default.
    pub bth0: f64,
    /// Correct rule confidence up.
    pub cinc: f64,
    /// Wrong rule confidence down.
    pub cdec: f64,
    /// Min preference threshold default.
    pub pth0: f64,
    /// Marginal operator preference up.
    pub pinc: f64,
    /// Failed operator preference down.
    pub pdec: f64,
    /// Action lookback limit (secs).
    pub fresh: f64,
    /// Wildness default value.
    pub wild0: f64,
    /// Threshold for an explicit surprise note (currently dormant).
    pub drill: f64,
    /// Obsession with contradiction (secs).
    pub dwell: f64,
    /// Standard surprise decay (secs).
    pub calm: f64,
    /// Finished focus retirement time (secs).
    pub retire_secs: f64,
    /// Window for FIND retry after downstream failure (secs).
    pub dither: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bth0: 0.5,
            cinc: 0.1,
            cdec: 0.1,
            pth0: 0.5,
            pinc: 0.1,
            pdec: 0.1,
            fresh: 30.0,
            wild0: 0.5,
            drill: 1.3,
            dwell: 5.0,
            calm: 1.0,
            retire_secs: 30.0,
            dither: 3.0,
        }
    }
}

// ============================================================================
// CORE
// ============================================================================

/// The engine: memories, attention, kernels, and tunables in one context.
pub struct Core {
    pub wmem: WorkingMemory,
    pub atree: ActionTree,
    pub amem: RuleMemory,
    pub pmem: OperatorMemory,
    pub mood: Mood,

    kernels: Vec<Box<dyn GroundingKernel>>,
    cfg: CoreConfig,

    // mutable thresholds
    pess: f64,
    wild: f64,

    // relevance stamps for NOTE triggering
    tval_cnt: i32,

    // cycle clock (freezable for deterministic tests)
    now: DateTime<Utc>,
    frozen: bool,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(cfg: CoreConfig) -> Self {
        let mut wmem = WorkingMemory::new();
        wmem.set_min_blf(cfg.bth0);
        Self {
            wmem,
            atree: ActionTree::new(),
            amem: RuleMemory::new(),
            pmem: OperatorMemory::new(),
            mood: Mood::default(),
            kernels: Vec::new(),
            pess: cfg.pth0,
            wild: cfg.wild0,
            cfg,
            tval_cnt: 0,
            now: Utc::now(),
            frozen: false,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn config_mut(&mut self) -> &mut CoreConfig {
        &mut self.cfg
    }

    // ------------------------------------------------------------------
    // clock
    // ------------------------------------------------------------------

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn tick(&mut self) {
        if !self.frozen {
            self.now = Utc::now();
        }
    }

    /// Freeze the clock at a specific time (deterministic tests).
    pub fn set_now(&mut self, t: DateTime<Utc>) {
        self.now = t;
        self.frozen = true;
    }

    // ------------------------------------------------------------------
    // mutable thresholds
    // ------------------------------------------------------------------

    /// Operator preference threshold.
    pub fn min_pref(&self) -> f64 {
        self.pess
    }

    pub fn set_min_pref(&mut self, v: f64) {
        self.pess = v.clamp(0.1, 1.0);
    }

    /// Willingness to pick lower-rated methods.
    pub fn wildness(&self) -> f64 {
        self.wild
    }

    pub fn set_wild(&mut self, v: f64) {
        self.wild = v.clamp(0.0, 1.0);
    }

    /// Main skepticism (belief threshold), clamped to [0.1, 1.0].
    pub fn set_min_blf(&mut self, v: f64) {
        self.wmem.set_min_blf(v);
    }

    /// Unique relevance stamp for a newly serviced assertion.
    pub fn next_tval(&mut self) -> i32 {
        self.tval_cnt += 1;
        self.tval_cnt
    }

    // ------------------------------------------------------------------
    // rule and operator adjustment
    // ------------------------------------------------------------------

    /// Set a rule's result confidence. Returns the signed change.
    pub fn adj_rule_conf(&mut self, rule: u32, cf: f64) -> f64 {
        let Some(r) = self.amem.rule_mut(rule) else {
            return 0.0;
        };
        let chg = r.set_conf(cf);
        if chg != 0.0 {
            tracing::info!(
                rule,
                conf = r.conf,
                dir = if chg > 0.0 { "raise" } else { "lower" },
                "adjust rule confidence"
            );
        }
        chg
    }

    /// Raise rule confidence toward a prediction that proved correct.
    /// Only rules below the belief threshold have headroom to gain.
    fn inc_conf(&mut self, rule: u32, conf0: f64) -> f64 {
        if conf0 >= self.wmem.min_blf() {
            return 0.0;
        }
        let c = (conf0 + self.cfg.cinc).min(1.2);
        self.adj_rule_conf(rule, c)
    }

    /// Lower rule confidence after a contradiction. Only rules above the
    /// threshold (whose prediction was taken seriously) get dinged.
    fn dec_conf(&mut self, rule: u32, conf0: f64) -> f64 {
        if conf0 < self.wmem.min_blf() {
            return 0.0;
        }
        let c = (conf0 - self.cfg.cdec).max(0.1);
        self.adj_rule_conf(rule, c)
    }

    /// Nudge an operator's preference up or down after an outcome.
    pub fn adj_op_pref(&mut self, op: u32, up: bool) -> f64 {
        let (pinc, pdec) = (self.cfg.pinc, self.cfg.pdec);
        let Some(o) = self.pmem.op_mut(op) else {
            return 0.0;
        };
        let chg = o.set_pref(o.pref + if up { pinc } else { -pdec });
        if chg != 0.0 {
            tracing::info!(
                op,
                pref = o.pref,
                dir = if chg > 0.0 { "raise" } else { "lower" },
                "adjust operator preference"
            );
        }
        chg
    }

    // ------------------------------------------------------------------
    // surprise and credit assignment
    // ------------------------------------------------------------------

    /// How unexpected a newly asserted situation is relative to the halo.
    /// Per key item the best (lowest) disagreement across matching
    /// predictions counts; the whole key takes the worst item. Matching
    /// one-step predictions feed confidence credit to their source rule.
    pub fn compare_halo(&mut self, key: &Graphlet) -> f64 {
        let mut surp: f64 = 0.0;
        let (mut hit, mut miss) = (0usize, 0usize);
        let min_blf = self.wmem.min_blf();

        let items: Vec<NodeId> = key.items().collect();
        for item in items {
            let Some(f) = self.wmem.get(item) else { continue };
            if f.obj_node() {
                continue;
            }
            let blf = f.belief();
            let mates = self.halo_equivs(item);
            let mut lo: Option<f64> = None;
            for mate in mates {
                let Some(m) = self.wmem.get(mate) else { continue };
                let same = {
                    let f2 = self.wmem.get(item).unwrap();
                    m.neg() == f2.neg()
                };
                let halo = m.belief();
                let src = m.halo_src;
                let band2 = self.wmem.in_band(mate, 2);

                // surprise relative to this prediction
                let s = if same { (blf - halo).abs() } else { blf + halo };
                lo = Some(lo.map_or(s, |v: f64| v.min(s)));

                if halo >= min_blf {
                    if same {
                        hit += 1;
                    } else {
                        miss += 1;
                    }
                }

                // one-step inferences get clear credit assignment
                if band2 {
                    if let Some(src) = src {
                        let chg = if same {
                            self.inc_conf(src.rule, halo)
                        } else {
                            self.dec_conf(src.rule, halo)
                        };
                        self.mood.rule_adjust(chg);
                    }
                }
            }
            if let Some(l) = lo {
                surp = surp.max(l);
            }
        }
        self.mood.rule_eval(hit, miss, surp);
        surp
    }

    /// Halo nodes with the same term and exact arguments (negation
    /// ignored), skipping ghost facts and hypothetical-based inferences.
    fn halo_equivs(&self, item: NodeId) -> Vec<NodeId> {
        let Some(f) = self.wmem.get(item) else {
            return Vec::new();
        };
        let bin = if f.code() == 0 { None } else { Some(f.code()) };
        let na = f.num_args();
        let mut out = Vec::new();
        let halo = self.wmem.halo_pool();
        let mut h = halo.first_in(bin);
        while let Some(hid) = h {
            if !self.wmem.in_band(hid, 1) {
                if let Some(hn) = halo.node(hid) {
                    if hn.belief() > 0.0
                        && hn.done() == f.done()
                        && hn.num_args() == na
                        && hn.lex_same(f)
                    {
                        let all = (0..na).all(|i| {
                            match (f.slot(i), f.arg(i)) {
                                (Some(s), Some(a)) => query::has_val(&self.wmem, hn, s, a),
                                _ => false,
                            }
                        });
                        if all {
                            out.push(hid);
                        }
                    }
                }
            }
            h = halo.after(hid, bin);
        }
        out
    }

    // ------------------------------------------------------------------
    // halo promotion
    // ------------------------------------------------------------------

    /// Promote every non-main substitution in the bindings to working
    /// memory, rewriting the bindings to the new nodes. With `note` >= 1
    /// a NOTE focus is posted for each promoted rule result (>= 2 limits
    /// that to directly relevant facts). Returns NOTEs generated.
    pub fn reify_rules(&mut self, b: &mut Bindings, note: i32) -> usize {
        let mut h2m = Bindings::new();
        let mut fcnt = 0;
        let mut spin = 0;

        while let Some((item, step)) = self.pick_non_wmem(b, &h2m, 0) {
            spin += 1;
            if spin > 64 {
                break; // badly tangled provenance
            }

            // promote the precondition cohort of the rule that made it
            let hb = self
                .wmem
                .get(item)
                .and_then(|n| n.halo_src)
                .and_then(|src| {
                    self.amem
                        .rule(src.rule)
                        .and_then(|r| r.instantiation(src.bind))
                        .cloned()
                        .map(|b| (src, b))
                });
            match &hb {
                Some((_, bind)) => self.promote_all(&mut h2m, bind),
                None => {
                    // a bare ghost property of a moored item
                    let mut b2 = Bindings::new();
                    let _ = b2.bind(item, item);
                    self.promote_all(&mut h2m, &b2);
                }
            }
            b.replace_subs(&h2m);
            if note <= 0 || step < note {
                continue;
            }

            // instantiate the rule result as a new NOTE focus
            if let Some((src, bind)) = hb {
                let mut b2 = Bindings::new();
                b2.copy_replace(&bind, &h2m);
                let mut keyg = Graphlet::new();
                if let Some(r) = self.amem.rule(src.rule) {
                    r.inferred(&mut keyg, &b2);
                }
                if !keyg.is_empty() {
                    let d = Directive::with_key(DirKind::Note, keyg);
                    let ch = ChainGraph::solo(d);
                    self.atree.add_focus(ch, 1.0, self.now);
                    fcnt += 1;
                }
            }
        }
        fcnt
    }

    /// Some substitution that still lives outside main memory, along with
    /// how directly relevant it is (2 = the fact itself, 1 = a precursor).
    fn pick_non_wmem(&self, b: &Bindings, h2m: &Bindings, stop: usize) -> Option<(NodeId, i32)> {
        let bcnt = if stop > 0 {
            stop.min(b.num_pairs())
        } else {
            b.num_pairs()
        };
        for i in 0..bcnt {
            let Some(sub) = b.sub(i) else { continue };
            if self.wmem.in_main(sub) {
                continue;
            }
            if stop == 0 {
                if let Some(src) = self.wmem.get(sub).and_then(|n| n.halo_src) {
                    let inner = self
                        .amem
                        .rule(src.rule)
                        .and_then(|r| r.instantiation(src.bind).cloned());
                    if let Some(hb) = inner {
                        let mut b2 = Bindings::new();
                        b2.copy_replace(&hb, h2m);
                        let pat = self
                            .amem
                            .rule(src.rule)
                            .map(|r| r.num_pat())
                            .unwrap_or(0);
                        if let Some((mid, _)) = self.pick_non_wmem(&b2, h2m, pat) {
                            return Some((mid, 1));
                        }
                    }
                }
            }
            return Some((sub, 2));
        }
        None
    }

    /// Make a connected main-memory copy of every non-main node in the
    /// bindings, recording the translation in `h2m`.
    fn promote_all(&mut self, h2m: &mut Bindings, b: &Bindings) {
        let mut b2 = Bindings::new();
        b2.copy_replace(b, h2m);
        let h0 = h2m.num_pairs();

        for i in 0..b2.num_pairs() {
            let Some(n) = b2.sub(i) else { continue };
            self.promote(h2m, n);
            let args: Vec<NodeId> = self
                .wmem
                .get(n)
                .map(|nd| {
                    (0..query::num_args(&self.wmem, nd))
                        .filter_map(|j| query::arg_surf(&self.wmem, nd, j))
                        .collect()
                })
                .unwrap_or_default();
            for a in args {
                self.promote(h2m, a);
            }
        }

        // replicate the structure of each promoted node
        let hcnt = h2m.num_pairs();
        for i in h0..hcnt {
            let (Some(n0), Some(n2)) = (h2m.key(i), h2m.sub(i)) else {
                continue;
            };
            let arrows: Vec<(String, NodeId)> = self
                .wmem
                .get(n0)
                .map(|nd| {
                    nd.args_view()
                        .iter()
                        .map(|a| (a.slot.clone(), a.val))
                        .collect()
                })
                .unwrap_or_default();
            for (slot, tgt) in arrows {
                let tgt = if self.wmem.in_main(tgt) {
                    tgt
                } else {
                    match h2m.lookup(tgt) {
                        Some(t) => t,
                        None => continue,
                    }
                };
                let _ = self.wmem.add_arg(n2, &slot, tgt);
            }
        }
    }

    /// Copy one node into main memory (believed and visible) if needed.
    fn promote(&mut self, h2m: &mut Bindings, n: NodeId) -> bool {
        if self.wmem.in_main(n) || h2m.in_keys(n) {
            return false;
        }
        let Some(src) = self.wmem.get(n) else {
            return false;
        };
        let (kind, lex, neg, done, def, ghost, obj) = (
            src.kind().to_string(),
            src.lex().map(|s| s.to_string()),
            src.neg(),
            src.done(),
            src.default_belief(),
            self.wmem.in_band(n, 1),
            src.obj_node(),
        );
        let n2 = self
            .wmem
            .make_node_done(&kind, lex.as_deref(), neg, 1.0, done);
        self.wmem.mark_belief(n2, def);
        if let Some(node) = self.wmem.node_mut(n2) {
            node.reveal();
        }
        let _ = h2m.bind(n, n2);

        if obj && ghost {
            // remembered item surfaces: tether it and announce
            tracing::info!(node = n2.num(), "promote creates surface for remembered item");
            self.wmem.moor_to(n2, Some(n));
            self.note_solo(n2);
        } else {
            tracing::debug!(node = n2.num(), "promoting inferred fact");
        }
        true
    }

    // ------------------------------------------------------------------
    // execution tracing
    // ------------------------------------------------------------------

    /// Stop ALL in-progress activities matching the description whose
    /// focus bids at or below the given priority. Returns 1 if everything
    /// matching was stopped (or none matched), -2 if something could not.
    pub fn halt_active(&mut self, desc: &Graphlet, bid: i32) -> i32 {
        // match against the positive form of the action
        let main = desc.main_act(&self.wmem);
        let neg0 = main.and_then(|m| self.wmem.get(m)).map(|n| n.neg());
        if let (Some(m), Some(_)) = (main, neg0) {
            if let Some(n) = self.wmem.node_mut(m) {
                n.set_neg(0);
            }
        }

        let mut ans = 1;
        for i in 0..self.atree.num_foci() {
            let allowed = bid >= self.atree.base_bid(i);
            let mut ch = self.atree.take_chain(i);
            let hit = ch.find_active(self, desc, allowed);
            self.atree.put_chain(i, ch);
            if hit && !allowed {
                ans = -2; // soft conflict: outranked
            }
        }

        if let (Some(m), Some(neg)) = (main, neg0) {
            if let Some(n) = self.wmem.node_mut(m) {
                n.set_neg(neg);
            }
        }
        ans
    }

    /// Operator that most recently initiated an action matching the
    /// description, with the mapping from description nodes to the
    /// running directive's nodes.
    pub fn motive(&mut self, desc: &Graphlet) -> Option<(u32, Bindings)> {
        let main = desc.main_act(&self.wmem)?;
        for i in (0..self.atree.num_foci()).rev() {
            let ch = self.atree.take_chain(i);
            let found = ch.steps.iter().find_map(|s| match &s.payload {
                crate::act::Payload::Dir(d) => {
                    let mine = d.key_main()?;
                    let ok = {
                        let wm = &self.wmem;
                        match (wm.get(main), wm.get(mine)) {
                            (Some(a), Some(b)) => a.lex_same(b) && query::same_args(wm, a, b),
                            _ => false,
                        }
                    };
                    if ok {
                        d.current_op().map(|op| {
                            let mut m = Bindings::new();
                            let _ = m.bind(main, mine);
                            (op, m)
                        })
                    } else {
                        None
                    }
                }
                _ => None,
            });
            self.atree.put_chain(i, ch);
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Directive responsible for the failure of the serviced focus.
    pub fn find_fail(&self) -> Option<&Directive> {
        let s = self.atree.service()?;
        self.atree.focus(s)?.chain.failed_dir()
    }

    // ------------------------------------------------------------------
    // grounding kernels
    // ------------------------------------------------------------------

    pub fn add_kernel(&mut self, k: Box<dyn GroundingKernel>) {
        self.kernels.push(k);
    }

    /// Dispatch an FCN start to whichever kernel claims the function.
    /// Returns the instance number, or negative when nobody knows it.
    pub fn kernel_start(&mut self, key: &Graphlet) -> i32 {
        let Some(main) = key.main_act(&self.wmem) else {
            return -1;
        };
        let bid = self
            .atree
            .service()
            .map(|s| self.atree.base_bid(s))
            .unwrap_or(0);
        for k in &mut self.kernels {
            let r = k.start(&mut self.wmem, main, bid);
            if r != -2 {
                return r;
            }
        }
        -1
    }

    pub fn kernel_status(&mut self, key: &Graphlet, inst: i32) -> i32 {
        let Some(main) = key.main_act(&self.wmem) else {
            return -1;
        };
        for k in &mut self.kernels {
            let r = k.status(&mut self.wmem, main, inst);
            if r != -2 {
                return r;
            }
        }
        -1
    }

    pub fn kernel_stop(&mut self, key: &Graphlet, inst: i32) {
        let Some(main) = key.main_act(&self.wmem) else {
            return;
        };
        for k in &mut self.kernels {
            k.stop(&mut self.wmem, main, inst);
        }
    }

    /// Post an introspective NOTE that a grounding function is missing.
    pub fn report_unknown_fcn(&mut self, key: &Graphlet) {
        let Some(main) = key.main_act(&self.wmem) else {
            return;
        };
        let name = self
            .wmem
            .get(main)
            .and_then(|n| n.lex())
            .unwrap_or("?")
            .to_string();
        tracing::warn!(fcn = %name, "unknown grounding function");
        self.start_note();
        let _ = self.wmem.add_prop(main, "err", "unknown", 0, -1.0, false);
        self.finish_note(Some(main));
    }

    /// Record the key as the explicit failure reason of the current focus.
    pub fn note_failure(&mut self, key: &Graphlet) {
        self.atree.set_error(key.clone());
    }

    // ------------------------------------------------------------------
    // cognition cycle
    // ------------------------------------------------------------------

    /// One cognition step: (1) retire expired foci and optionally collect
    /// garbage, (2) rebuild the halo, (3) advance each serviceable focus
    /// by one FSM step. Returns the number of foci serviced.
    pub fn cycle(&mut self, gc: bool) -> usize {
        self.tick();
        self.mood.clear();

        // (1) maintenance
        self.atree.prune(self.now, self.cfg.retire_secs);
        if gc {
            self.atree.mark_seeds(&mut self.wmem);
            self.wmem.clean_mem();
        }
        self.wmem.pool_mut().bump_version();

        // (2) expectations
        self.amem.refresh_halo(&mut self.wmem);

        // (3) service foci newest-first, each at most once; slots are
        // re-located by serial since servicing itself can post new foci
        // and compact the ring
        let mut served = 0;
        while let Some(i) = self.atree.next_focus() {
            served += 1;
            let Some(ser) = self.atree.serial_of(i) else {
                continue;
            };
            let mut chain = self.atree.take_chain(i);

            // a top-level free-choice response is cut off past its budget
            let v = if chain.started() && self.over_budget(&chain) {
                chain.stop(self);
                FAIL
            } else if !chain.started() {
                self.atree.set_active(i, self.now, true);
                chain.start(self, 0)
            } else {
                chain.status(self)
            };

            let Some(slot) = self.atree.index_of(ser) else {
                continue; // evicted while out on loan
            };
            self.atree.put_chain(slot, chain);
            if v != 0 {
                tracing::debug!(focus = slot, verdict = v, "focus finished");
                self.atree.set_active(slot, self.now, false);
            }
        }
        served
    }

    fn over_budget(&self, chain: &ChainGraph) -> bool {
        let Some(d) = chain.dir() else { return false };
        if d.kind != DirKind::Note || !d.root {
            return false;
        }
        let Some(op) = d.current_op().and_then(|id| self.pmem.op(id)) else {
            return false;
        };
        let budget = op.budget();
        budget > 0.0 && chain.elapsed(self.now) > budget
    }

    /// Drop every pending activity (memory untouched).
    pub fn clr_foci(&mut self) {
        self.atree.clr_foci();
    }

    // ------------------------------------------------------------------
    // file functions
    // ------------------------------------------------------------------

    /// Load a knowledge base: `<base>.rules` and `<base>.ops`, then any
    /// `<base>.conf` / `<base>.pref` overrides on top. Returns the number
    /// of rules and operators accepted.
    pub fn load_kb(&mut self, base: &std::path::Path, level: i32) -> (usize, usize) {
        let with = |ext: &str| base.with_extension(ext);
        let nr = if with("rules").exists() {
            self.amem.load(&with("rules"), true, level).unwrap_or(0)
        } else {
            0
        };
        let no = if with("ops").exists() {
            self.pmem.load(&with("ops"), true, level).unwrap_or(0)
        } else {
            0
        };
        if with("conf").exists() {
            let _ = self.amem.overrides(&with("conf"));
        }
        if with("pref").exists() {
            let _ = self.pmem.overrides(&with("pref"));
        }
        (nr, no)
    }

    /// Dump all foci in priority order with importance and age headers.
    pub fn save_foci(&self, path: &std::path::Path) -> std::io::Result<usize> {
        let mut out = String::new();
        let mut order: Vec<usize> = (0..self.atree.num_foci()).collect();
        order.sort_by_key(|i| -self.atree.base_bid(*i));
        let mut n = 0;
        for i in order {
            let Some(f) = self.atree.focus(i) else { continue };
            let age = match f.active {
                Some(t) => format!("age = {:5.3}", (self.now - t).num_milliseconds() as f64 / 1000.0),
                None => "new".to_string(),
            };
            out.push_str(&format!(
                "// FOCUS {}: imp = {}, {}\n",
                n + 1,
                self.atree.base_bid(i),
                age
            ));
            if f.chain.save(self.wmem.pool(), &mut out, 0).is_ok() {
                n += 1;
            }
            out.push('\n');
        }
        out.push('\n');
        std::fs::write(path, out)?;
        Ok(n)
    }

    /// Read a list of focal chains from a file, appending unless `add`
    /// is false. Returns the number of top-level foci added.
    pub fn load_foci(&mut self, path: &std::path::Path, add: bool) -> std::io::Result<usize> {
        if !add {
            self.atree.clr_foci();
        }
        let text = std::fs::read_to_string(path)?;
        let mut input = crate::kb::LineReader::new(text.as_bytes());
        let mut trans = crate::kb::TransTable::new();
        let mut n = 0;
        while input.next_content().is_some() {
            match ChainGraph::load(self.wmem.pool_mut(), &mut trans, &mut input) {
                Ok(ch) => {
                    let now = self.now;
                    if self.atree.add_focus(ch, 1.0, now).is_none() {
                        break;
                    }
                    n += 1;
                }
                Err(_) => {
                    if input.next_blank().is_none() {
                        break;
                    }
                }
            }
        }
        Ok(n)
    }

    /// Full restart: clear foci and working memory, rebuild participants.
    pub fn reset(&mut self, rname: Option<&str>) {
        self.atree.clr_foci();
        self.wmem.reset(rname);
        self.wmem.set_min_blf(self.cfg.bth0);
        self.pess = self.cfg.pth0;
        self.wild = self.cfg.wild0;
        self.tval_cnt = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let cfg = CoreConfig::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back: CoreConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.bth0, cfg.bth0);
        assert_eq!(back.retire_secs, cfg.retire_secs);
    }

    #[test]
    fn adjustments_are_clamped_and_monotone() {
        let mut core = Core::new();
        let mut r = crate::reason::Rule::new();
        let x = r.pool.make_node("obj", None, 0, 1.0);
        let a = r.pool.make_node("ako", Some("dog"), 0, 1.0);
        r.pool.add_arg(a, "ako", x).unwrap();
        r.sit.cond.add_item(a).unwrap();
        r.sit.cond.add_item(x).unwrap();
        let b = r.pool.make_node("ako", Some("animal"), 0, 1.0);
        r.pool.add_arg(b, "ako", x).unwrap();
        r.result.add_item(b).unwrap();
        r.conf = 0.3;
        core.amem.add_rule(r, false);

        // raising when correct never decreases
        let before = core.amem.rule(1).unwrap().conf;
        let chg = core.inc_conf(1, before);
        assert!(chg >= 0.0);
        assert!(core.amem.rule(1).unwrap().conf >= before);

        // lowering when wrong never increases, and clamps at 0.1
        core.amem.rule_mut(1).unwrap().conf = 0.6;
        for _ in 0..10 {
            let chg = core.dec_conf(1, 0.6);
            assert!(chg <= 0.0);
        }
        assert!(core.amem.rule(1).unwrap().conf >= 0.1);
    }

    #[test]
    fn unknown_fcn_posts_error_note() {
        let mut core = Core::new();
        core.start_note();
        let act = core.new_node("act", Some("teleport"));
        core.finish_note(None);
        let before = core.atree.num_foci();

        let mut key = Graphlet::new();
        key.add_item(act).unwrap();
        assert_eq!(core.kernel_start(&key), -1);
        core.report_unknown_fcn(&key);
        assert_eq!(core.atree.num_foci(), before + 1);
    }
}
