//! Rule - Declarative implication instantiated into the halo
//!
//! A rule pairs a precondition description with a result description and a
//! confidence. Every complete consistent match of the precondition against
//! working memory deposits an instance of the result into the halo pool,
//! stamped with provenance (which rule, which binding set) so later credit
//! assignment and consolidation can trace inferences back to their source.
//!
//! Pattern nodes live in a private pool owned by the rule; bindings map
//! them onto working-memory (or halo) nodes.

use std::io::Read;

use crate::graph::{
    Bindings, Graphlet, GraphletView, HaloSource, NodeId, NodeList, NodePool,
};
use crate::kb::{self, KbError, LineReader, TransTable};
use crate::matcher::{MatchSink, Situation};
use crate::memory::WorkingMemory;

/// Maximum halo instantiations of one rule per cycle.
pub const RULE_HMAX: usize = 20;

// ============================================================================
// RULE
// ============================================================================

/// Declarative implication: if `cond` (unless ...) then `result`.
pub struct Rule {
    /// Identifier assigned by the rule store.
    pub id: u32,
    /// Source level: 0 kernel, 1 extras, 2 accumulated, 3 newly told.
    pub lvl: i32,
    /// Human readable utterance that generated this rule.
    pub gist: String,
    /// Source file stem for override bookkeeping.
    pub prov: String,
    /// Original number within the source file.
    pub pnum: u32,

    /// Result confidence in (0, 1.2].
    pub conf: f64,
    /// Confidence as loaded (for override deltas).
    pub conf0: f64,

    /// Private pattern pool for condition and result nodes.
    pub pool: NodePool,
    /// Condition, caveats, and matching thresholds.
    pub sit: Situation,
    /// Consequent description.
    pub result: Graphlet,

    // per-cycle instantiations
    hinst: Vec<Bindings>,
    hyp: Vec<bool>,
    tval: Vec<i32>,
    ver: Vec<u32>,
    asserted: Vec<bool>,
    nh: usize,
}

impl Default for Rule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule {
    pub fn new() -> Self {
        Self {
            id: 0,
            lvl: 3, // newly told
            gist: String::new(),
            prov: String::new(),
            pnum: 0,
            conf: 1.0,
            conf0: 1.0,
            pool: NodePool::new(),
            sit: Situation::new(),
            result: Graphlet::new(),
            hinst: vec![Bindings::new(); RULE_HMAX],
            hyp: vec![false; RULE_HMAX],
            tval: vec![0; RULE_HMAX],
            ver: vec![0; RULE_HMAX],
            asserted: vec![false; RULE_HMAX],
            nh: 0,
        }
    }

    pub fn num_pat(&self) -> usize {
        self.sit.cond.num_items()
    }

    /// Binding sets accepted this cycle, newest first.
    pub fn instantiations(&self) -> impl Iterator<Item = &Bindings> {
        self.hinst.iter().skip(RULE_HMAX - self.nh)
    }

    pub fn instantiation(&self, idx: usize) -> Option<&Bindings> {
        if idx >= RULE_HMAX - self.nh {
            self.hinst.get(idx)
        } else {
            None
        }
    }

    /// Remember the human readable utterance behind this rule.
    pub fn set_gist(&mut self, sent: &str) {
        let s = sent.trim().trim_matches('"');
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
        self.gist = out;
    }

    /// Change result confidence, quantized to two decimals and clamped to
    /// [0.1, 1.2]. Returns the actual change that occurred.
    pub fn set_conf(&mut self, v: f64) -> f64 {
        let c0 = self.conf;
        let p = v.clamp(0.1, 1.2);
        self.conf = 0.01 * (100.0 * p).round();
        self.conf - c0
    }

    // ------------------------------------------------------------------
    // halo instantiation
    // ------------------------------------------------------------------

    /// Find all bindings that make the precondition hold and assert the
    /// result for each into the halo. Conditions need `belief >= mth` or
    /// an exactly-zero hypothetical. With `add` the previous round's
    /// instantiations are retained (two-step chaining). Returns how many
    /// results were newly asserted.
    pub fn assert_matches(&mut self, wmem: &mut WorkingMemory, mth: f64, add: bool) -> usize {
        let ni = self.sit.cond.num_items();
        if ni == 0 {
            return 0;
        }
        if !add {
            self.nh = 0;
            self.asserted = vec![false; RULE_HMAX];
        }
        let mc0 = RULE_HMAX - self.nh;
        for b in self.hinst.iter_mut().take(mc0) {
            b.clear();
            b.expect = ni;
        }
        let mut mc = mc0;
        self.sit.bth = -mth; // hypothetical preconditions are ok

        {
            let mut sink = RuleSink {
                result: &self.result,
                pat_pool: &self.pool,
                hyp: &mut self.hyp,
                tval: &mut self.tval,
                ver: &mut self.ver,
            };
            self.sit.match_graph(
                &self.pool,
                &mut sink,
                &mut self.hinst,
                &mut mc,
                &self.sit.cond,
                wmem,
                None,
            );
        }
        let fresh = mc0 - mc;
        self.nh = RULE_HMAX - mc;

        // deposit result instances for everything accepted so far
        for idx in mc..RULE_HMAX {
            if !self.asserted[idx] {
                if wmem
                    .assert_halo(&self.result, &self.pool, &mut self.hinst[idx])
                    .is_err()
                {
                    continue;
                }
                self.asserted[idx] = true;
            }
            self.stamp_result(wmem, idx);
        }
        fresh
    }

    /// Set provenance, relevance, and belief on the halo nodes created for
    /// one accepted binding set.
    fn stamp_result(&self, wmem: &mut WorkingMemory, idx: usize) {
        let b = &self.hinst[idx];
        for item in self.result.items() {
            let Some(n) = b.lookup(item) else { continue };
            if !n.is_halo() || self.sit.cond.in_desc(item) {
                continue;
            }
            let def = self
                .pool
                .node(item)
                .map(|p| p.default_belief())
                .unwrap_or(1.0);
            wmem.set_gen(n, self.ver[idx]);
            if let Some(node) = wmem.node_mut(n) {
                node.top_max(self.tval[idx]);
                node.set_default(def);
                node.tmp_belief(if self.hyp[idx] { 0.0 } else { def });
                node.halo_src = Some(HaloSource {
                    rule: self.id,
                    bind: idx,
                });
            }
        }
    }

    /// Fill a graphlet with the full rule result under some bindings.
    pub fn inferred(&self, key: &mut Graphlet, b: &Bindings) {
        for item in self.result.items() {
            let _ = key.add_item(b.lookup(item).unwrap_or(item));
        }
    }

    /// Whether the instantiated result would use the binding of a node.
    fn result_uses(pool: &NodePool, result: &Graphlet, key: NodeId) -> bool {
        for item in result.items() {
            if item == key {
                return true;
            }
            if let Some(n) = pool.node(item) {
                if n.args_view().iter().any(|a| a.val == key) {
                    return true;
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // validity checks
    // ------------------------------------------------------------------

    /// Whether some other rule essentially matches this one. Only guards
    /// against exact duplicates with items in the same order.
    pub fn identical(&self, other: &Rule) -> bool {
        let nc = self.sit.cond.num_items();
        let nr = self.result.num_items();
        if other.sit.cond.num_items() != nc || other.result.num_items() != nr {
            return false;
        }
        let same = |a: &Graphlet, b: &Graphlet, n: usize| -> bool {
            (0..n).all(|i| {
                let (Some(x), Some(y)) = (a.item(i), b.item(i)) else {
                    return false;
                };
                same_struct(&self.pool, x, &other.pool, y)
            })
        };
        same(&self.sit.cond, &other.sit.cond, nc) && same(&self.result, &other.result, nr)
    }

    /// Whether the rule uselessly infers X -> X: the precondition pattern,
    /// freshly instantiated, already matches within the result description.
    pub fn tautology(&self) -> bool {
        let mut scratch = NodePool::new();
        let mut m = Bindings::new();
        let inst = match scratch.assert_graphlet(&self.sit.cond, &self.pool, &mut m) {
            Ok(g) => g,
            Err(_) => return false,
        };
        let mut sit = Situation::new();
        sit.cond = inst.clone();
        sit.bth = -1.0;
        let facts = GraphletView::new(&self.result, &self.pool);
        let mut sink = crate::matcher::CaptureSink::default();
        let mut mm = [Bindings::new()];
        mm[0].expect = inst.num_items();
        let mut mc = 1usize;
        sit.match_graph(&scratch, &mut sink, &mut mm, &mut mc, &inst, &facts, None) > 0
    }

    /// Whether the result shares no nodes (not even through an argument)
    /// with the precondition.
    pub fn bipartite(&self) -> bool {
        for item in self.result.items() {
            if self.sit.cond.in_desc(item) {
                return false;
            }
            if let Some(n) = self.pool.node(item) {
                if n.args_view()
                    .iter()
                    .any(|a| self.sit.cond.in_desc(a.val))
                {
                    return false;
                }
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // consolidation builders
    // ------------------------------------------------------------------

    /// Equivalent local node for a memory node, created on first sight.
    /// `def` becomes the pending default belief of a new node.
    pub fn get_equiv(
        &mut self,
        m2c: &mut Bindings,
        probe: NodeId,
        def: f64,
        src: &dyn NodeList,
    ) -> Option<NodeId> {
        if let Some(e) = m2c.lookup(probe) {
            return Some(e);
        }
        let n = src.get(probe)?;
        let equiv = self
            .pool
            .make_node_done(n.kind(), n.lex(), n.neg(), -def, n.done());
        m2c.bind(probe, equiv).ok()?;
        Some(equiv)
    }

    /// Fold one first-step rule's precondition into this combined rule.
    pub fn add_combo(&mut self, m2c: &mut Bindings, step1: &Rule, b1: &Bindings, src: &dyn NodeList) {
        let items: Vec<NodeId> = step1.sit.cond.items().collect();
        for item in items {
            if let Some(mem) = b1.lookup(item) {
                if let Some(eq) = self.get_equiv(m2c, mem, 1.0, src) {
                    let _ = self.sit.cond.add_item(eq);
                }
            }
        }
    }

    /// Finish the combined rule from the second-step rule: non-halo
    /// preconditions join the condition, the result is copied over, and
    /// confidence drops to the most fragile intermediate.
    /// `mid_belief` resolves the origin belief of a halo intermediate.
    pub fn link_combo(
        &mut self,
        m2c: &mut Bindings,
        step2: &Rule,
        b2: &Bindings,
        src: &dyn NodeList,
        mid_belief: impl Fn(NodeId) -> f64,
    ) {
        self.conf = step2.conf;
        let cond_items: Vec<NodeId> = step2.sit.cond.items().collect();
        for item in cond_items {
            let Some(mem) = b2.lookup(item) else { continue };
            if !mem.is_halo() {
                if let Some(eq) = self.get_equiv(m2c, mem, 1.0, src) {
                    let _ = self.sit.cond.add_item(eq);
                }
            } else {
                // an inferred intermediate: weakest link caps confidence
                let blf = mid_belief(mem);
                if blf < self.conf {
                    self.conf = blf;
                }
                let _ = self.get_equiv(m2c, mem, blf, src); // may appear in result
            }
        }
        self.connect_args(true, m2c, src);

        let res_items: Vec<NodeId> = step2.result.items().collect();
        for item in res_items {
            if let Some(mem) = b2.lookup(item) {
                let blf = if mem.is_halo() { mid_belief(mem) } else { 1.0 };
                if let Some(eq) = self.get_equiv(m2c, mem, blf, src) {
                    let _ = self.result.add_item(eq);
                }
            }
        }
        self.connect_args(false, m2c, src);
        self.result.rem_all(&self.sit.cond);
        let conf = self.conf;
        self.pool.force_belief(&self.result, conf);
        for item in self.result.items().collect::<Vec<_>>() {
            if let Some(n) = self.pool.node_mut(item) {
                n.set_default(conf);
            }
        }
    }

    /// Replicate the argument pattern of the original memory nodes onto
    /// the combined rule's local copies, pulling in missing arguments.
    fn connect_args(&mut self, cond: bool, m2c: &Bindings, src: &dyn NodeList) {
        let mut i = 0;
        loop {
            let item = {
                let desc = if cond { &self.sit.cond } else { &self.result };
                match desc.item(i) {
                    Some(x) => x,
                    None => break,
                }
            };
            let Some(mem) = m2c.find_key(item) else {
                i += 1;
                continue;
            };
            let arrows: Vec<(String, NodeId)> = src
                .get(mem)
                .map(|n| {
                    n.args_view()
                        .iter()
                        .map(|a| (a.slot.clone(), a.val))
                        .collect()
                })
                .unwrap_or_default();
            for (slot, tgt) in arrows {
                if let Some(carg) = m2c.lookup(tgt) {
                    let _ = self.pool.add_arg(item, &slot, carg);
                    let desc = if cond { &mut self.sit.cond } else { &mut self.result };
                    let _ = desc.add_item(carg);
                }
            }
            i += 1;
        }
    }

    // ------------------------------------------------------------------
    // file functions
    // ------------------------------------------------------------------

    /// Read one rule at the current file position.
    /// Returns Ok(false) at end of file.
    pub fn load<R: Read>(&mut self, input: &mut LineReader<R>) -> Result<bool, KbError> {
        if input.next_content().is_none() {
            return Ok(false);
        }
        let hdr = input.token().ok_or(KbError::Syntax(input.last()))?;
        if !hdr.eq_ignore_ascii_case("RULE") {
            return Err(KbError::Syntax(input.last()));
        }
        if let Some(tok) = input.token() {
            self.pnum = tok.parse().map_err(|_| KbError::Syntax(input.last()))?;
        }
        if let Some(dash) = input.token() {
            if dash == "-" {
                let gist = input.head().unwrap_or("").to_string();
                self.set_gist(&gist);
            }
        }
        input.flush();
        if input.next_content().is_none() {
            return Ok(false);
        }

        let mut trans = TransTable::new();

        // precondition
        if !input.begins("if:") {
            return Err(KbError::Syntax(input.last()));
        }
        input.skip("if:");
        self.sit.cond = kb::load_graph(&mut self.pool, &mut trans, input)?;

        // caveats
        while input.next(false).is_some() && input.begins("unless:") {
            input.skip("unless:");
            let u = kb::load_graph(&mut self.pool, &mut trans, input)?;
            if !self.sit.add_unless(u) {
                tracing::warn!(rule = self.pnum, "too many caveats");
                break;
            }
        }

        // result confidence (defaults to 1.0)
        if input.next(false).is_some() && input.begins("conf:") {
            input.skip("conf:");
            let v = input
                .token()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or(KbError::Syntax(input.last()))?;
            self.conf = v;
            self.conf0 = v;
            input.flush();
            input.next(false);
        }

        // main consequent
        if !input.begins("then:") {
            return Err(KbError::Syntax(input.last()));
        }
        input.skip("then:");
        self.result = kb::load_graph(&mut self.pool, &mut trans, input)?;
        let conf = self.conf;
        self.pool.force_belief(&self.result, conf);
        for item in self.result.items().collect::<Vec<_>>() {
            if let Some(n) = self.pool.node_mut(item) {
                n.set_default(conf);
            }
        }
        Ok(true)
    }

    /// Write the rule in machine readable form.
    pub fn save(&self, out: &mut String, detail: i32) -> std::fmt::Result {
        use std::fmt::Write;

        if detail >= 2 && !self.prov.is_empty() {
            writeln!(out, "// originally rule {} from {}\n", self.pnum, self.prov)?;
        }
        write!(out, "RULE")?;
        if self.id > 0 {
            write!(out, " {}", self.id)?;
        }
        if detail >= 2 && !self.gist.is_empty() {
            write!(out, " - \"{}\"", self.gist)?;
        }
        writeln!(out)?;

        write!(out, "    if: ")?;
        kb::write_graphlet(out, &self.pool, &self.sit.cond, -8, detail.min(1))?;
        writeln!(out)?;

        for u in &self.sit.unless {
            write!(out, "unless: ")?;
            kb::write_graphlet(out, &self.pool, u, -8, detail.min(1))?;
            writeln!(out)?;
        }

        if self.conf != 1.0 {
            writeln!(out, "  conf: {:5.3}", self.conf)?;
        }

        write!(out, "  then: ")?;
        kb::write_graphlet(out, &self.pool, &self.result, -8, detail.min(1))?;
        writeln!(out)?;
        Ok(())
    }
}

/// Structural similarity of one node pair under matching local numbering.
fn same_struct(pa: &NodePool, a: NodeId, pb: &NodePool, b: NodeId) -> bool {
    let (Some(na), Some(nb)) = (pa.node(a), pb.node(b)) else {
        return false;
    };
    if na.neg() != nb.neg() || !na.lex_same(nb) || na.num_args() != nb.num_args() {
        return false;
    }
    na.args_view()
        .iter()
        .zip(nb.args_view())
        .all(|(x, y)| x.val.num().abs() == y.val.num().abs() && x.slot == y.slot)
}

// ============================================================================
// MATCH SINK
// ============================================================================

struct RuleSink<'a> {
    result: &'a Graphlet,
    pat_pool: &'a NodePool,
    hyp: &'a mut Vec<bool>,
    tval: &'a mut Vec<i32>,
    ver: &'a mut Vec<u32>,
}

impl RuleSink<'_> {
    /// Index of an earlier accepted set with an identical result fragment:
    /// positive when this set has better relevance, negative otherwise.
    fn same_result(
        &self,
        m: &[Bindings],
        mc: usize,
        t0: i32,
        facts: &dyn NodeList,
    ) -> Option<(usize, bool)> {
        let b = &m[mc - 1];
        let nb = b.num_pairs();
        let h = self.hyp[mc - 1];
        for j in (mc..RULE_HMAX).rev() {
            if self.hyp[j] != h {
                continue;
            }
            let mut tval = 0;
            let mut differs = false;
            for i in 0..nb {
                let Some(pn) = b.key(i) else { continue };
                let n = m[j].lookup(pn);
                if b.sub(i) != n && Rule::result_uses(self.pat_pool, self.result, pn) {
                    differs = true;
                    break;
                }
                if let Some(t) = n.and_then(|id| facts.get(id)).map(|nd| nd.top) {
                    tval = tval.max(t);
                }
            }
            if !differs {
                return Some((j, tval < t0));
            }
        }
        None
    }
}

impl MatchSink for RuleSink<'_> {
    fn match_found(&mut self, m: &mut [Bindings], mc: &mut usize, facts: &dyn NodeList) -> i32 {
        if *mc == 0 {
            return 0;
        }
        let cur = *mc - 1;
        let b = &m[cur];
        let nb = b.num_pairs();

        // relevance and recency over all substitutions
        let mut tval = 0;
        let mut ver = 0;
        let mut h = false;
        for i in 0..nb {
            if let Some(n) = b.sub(i).and_then(|id| facts.get(id)) {
                tval = tval.max(n.top);
                ver = ver.max(n.generation());
                if n.hyp() {
                    h = true;
                }
            }
        }
        self.hyp[cur] = h;

        // identical result already produced by another binding set?
        if let Some((dup, better)) = self.same_result(m, *mc, tval, facts) {
            if !better {
                return 0; // earlier set is at least as relevant
            }
            // substitute: same effect but this set is more relevant
            let keys: Vec<(usize, Option<NodeId>)> = (0..m[dup].num_pairs())
                .map(|i| (i, m[dup].key(i).and_then(|k| m[cur].lookup(k))))
                .collect();
            for (i, sub) in keys {
                if let Some(s) = sub {
                    m[dup].set_sub(i, Some(s));
                }
            }
            self.tval[dup] = tval;
            self.ver[dup] = ver;
            self.hyp[dup] = h;
            return 0;
        }

        // accept this binding set and shift down to the next slot
        self.tval[cur] = tval;
        self.ver[cur] = ver;
        if *mc <= 1 {
            tracing::warn!("more than {RULE_HMAX} halo instantiations of one rule");
        } else {
            *mc -= 1;
        }
        1
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::query;

    /// if X is a dog then X is an animal (conf 0.9)
    pub(crate) fn dog_animal_rule() -> Rule {
        let mut r = Rule::new();
        let x = r.pool.make_node("obj", None, 0, 1.0);
        let dog = r.pool.make_node("ako", Some("dog"), 0, 1.0);
        r.pool.add_arg(dog, "ako", x).unwrap();
        r.sit.cond.add_item(dog).unwrap();
        r.sit.cond.add_item(x).unwrap();
        let animal = r.pool.make_node("ako", Some("animal"), 0, 1.0);
        r.pool.add_arg(animal, "ako", x).unwrap();
        r.result.add_item(animal).unwrap();
        r.conf = 0.9;
        let conf = r.conf;
        r.pool.force_belief(&r.result, conf);
        r.pool.node_mut(animal).unwrap().set_default(conf);
        r.id = 1;
        r
    }

    fn seed_dog(wmem: &mut WorkingMemory) -> NodeId {
        let obj = wmem.make_node("obj", None, 0, 1.0);
        let dog = wmem.add_prop(obj, "ako", "dog", 0, 1.0, false).unwrap();
        for id in [obj, dog] {
            let n = wmem.node_mut(id).unwrap();
            n.reveal();
            n.set_belief(1.0);
        }
        obj
    }

    #[test]
    fn simple_inference_lands_in_halo() {
        let mut wmem = WorkingMemory::new();
        let obj = seed_dog(&mut wmem);
        let mut r = dog_animal_rule();

        wmem.max_band(1);
        let n = r.assert_matches(&mut wmem, 0.5, false);
        assert_eq!(n, 1);
        assert_eq!(wmem.halo_size(), 1);

        // the inferred fact: ako(animal) over obj with belief 0.9
        let b = r.instantiations().next().unwrap();
        let animal = r.result.item(0).unwrap();
        let inf = b.lookup(animal).unwrap();
        assert!(inf.is_halo());
        let node = wmem.get(inf).unwrap();
        assert_eq!(node.lex(), Some("animal"));
        assert_eq!(node.belief(), 0.9);
        assert_eq!(
            node.halo_src,
            Some(HaloSource { rule: 1, bind: RULE_HMAX - 1 })
        );
        assert!(query::has_val(&wmem, node, "ako", obj));
    }

    #[test]
    fn duplicate_result_not_asserted_twice() {
        let mut wmem = WorkingMemory::new();
        seed_dog(&mut wmem);
        let mut r = dog_animal_rule();
        wmem.max_band(1);
        assert_eq!(r.assert_matches(&mut wmem, 0.5, false), 1);
        // second round with retained instantiations adds nothing new
        wmem.max_band(2);
        assert_eq!(r.assert_matches(&mut wmem, 0.5, true), 0);
        assert_eq!(wmem.halo_size(), 1);
    }

    #[test]
    fn hypothetical_chain_gets_zero_belief() {
        let mut wmem = WorkingMemory::new();
        let obj = wmem.make_node("obj", None, 0, 1.0);
        let dog = wmem.add_prop(obj, "ako", "dog", 0, 1.0, false).unwrap();
        for id in [obj, dog] {
            wmem.node_mut(id).unwrap().reveal();
        }
        wmem.node_mut(obj).unwrap().set_belief(1.0);
        wmem.node_mut(dog).unwrap().tmp_belief(0.0); // hypothetical

        let mut r = dog_animal_rule();
        wmem.max_band(1);
        assert_eq!(r.assert_matches(&mut wmem, 0.5, false), 1);
        let b = r.instantiations().next().unwrap();
        let inf = b.lookup(r.result.item(0).unwrap()).unwrap();
        assert_eq!(wmem.get(inf).unwrap().belief(), 0.0);
        assert_eq!(wmem.get(inf).unwrap().default_belief(), 0.9);
    }

    #[test]
    fn tautology_detected() {
        let mut r = Rule::new();
        let x = r.pool.make_node("obj", None, 0, 1.0);
        let dog = r.pool.make_node("ako", Some("dog"), 0, 1.0);
        r.pool.add_arg(dog, "ako", x).unwrap();
        r.sit.cond.add_item(dog).unwrap();
        r.sit.cond.add_item(x).unwrap();
        // result repeats the precondition
        r.result.add_item(dog).unwrap();
        r.result.add_item(x).unwrap();
        assert!(r.tautology());

        let r2 = dog_animal_rule();
        assert!(!r2.tautology());
    }

    #[test]
    fn bipartite_detected() {
        let mut r = Rule::new();
        let x = r.pool.make_node("obj", None, 0, 1.0);
        let dog = r.pool.make_node("ako", Some("dog"), 0, 1.0);
        r.pool.add_arg(dog, "ako", x).unwrap();
        r.sit.cond.add_item(dog).unwrap();
        r.sit.cond.add_item(x).unwrap();
        // result about a completely unrelated node
        let y = r.pool.make_node("obj", None, 0, 1.0);
        let cat = r.pool.make_node("ako", Some("cat"), 0, 1.0);
        r.pool.add_arg(cat, "ako", y).unwrap();
        r.result.add_item(cat).unwrap();
        assert!(r.bipartite());

        let r2 = dog_animal_rule();
        assert!(!r2.bipartite());
    }

    #[test]
    fn identical_compares_structure() {
        let a = dog_animal_rule();
        let b = dog_animal_rule();
        assert!(a.identical(&b));
        let mut c = dog_animal_rule();
        c.pool.set_lex(c.sit.cond.item(0).unwrap(), "cat");
        assert!(!a.identical(&c));
    }

    #[test]
    fn conf_quantized_and_clamped() {
        let mut r = Rule::new();
        r.set_conf(1.5);
        assert_eq!(r.conf, 1.2);
        r.set_conf(0.0);
        assert_eq!(r.conf, 0.1);
        let chg = r.set_conf(0.734);
        assert_eq!(r.conf, 0.73);
        assert!((chg - 0.63).abs() < 1e-9);
    }

    #[test]
    fn save_load_round_trip() {
        let r = dog_animal_rule();
        let mut out = String::new();
        r.save(&mut out, 2).unwrap();
        out.push('\n');

        let mut input = LineReader::new(out.as_bytes());
        let mut r2 = Rule::new();
        assert!(r2.load(&mut input).unwrap());
        assert_eq!(r2.sit.cond.num_items(), 2);
        assert_eq!(r2.result.num_items(), 1);
        assert_eq!(r2.conf, 0.9);

        // numbering settles after one reload: generations 2 and 3 agree
        let mut out2 = String::new();
        r2.id = r.id;
        r2.save(&mut out2, 2).unwrap();
        out2.push('\n');
        let mut input3 = LineReader::new(out2.as_bytes());
        let mut r3 = Rule::new();
        assert!(r3.load(&mut input3).unwrap());
        r3.id = r.id;
        let mut out3 = String::new();
        r3.save(&mut out3, 2).unwrap();
        out3.push('\n');
        assert_eq!(out2, out3);
    }
}
