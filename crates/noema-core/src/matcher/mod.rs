//! Subgraph Matcher - Pattern descriptions matched against memory
//!
//! The matcher enumerates complete consistent bindings of a pattern
//! graphlet against one or two fact sources, with backtracking. Expansion
//! is anchored: unbound pattern nodes that hang off an already-bound node
//! are tried first (through the property or argument cross-index), and only
//! then does the matcher fall back to hashed bare enumeration, picking the
//! pattern node with the fewest candidates in memory.
//!
//! Caveat ("unless") descriptions use the same machinery with a zero match
//! budget: the first completion proves blockage and rejects the bindings.
//!
//! Only FULL matches are reported; partial matching would go combinatorial.

use crate::graph::query;
use crate::graph::{Bindings, Graphlet, NodeId, NodeList};

// ============================================================================
// SINK
// ============================================================================

/// Receiver for complete consistent bindings.
///
/// The working set is `m[mc - 1]`; an implementation that wants to keep the
/// match decrements `mc` so the set survives backtracking, and uses the
/// remaining lower sets for further matches.
pub trait MatchSink {
    fn match_found(&mut self, m: &mut [Bindings], mc: &mut usize, facts: &dyn NodeList) -> i32;
}

/// Sink that clones the first complete match and stops looking.
#[derive(Default)]
pub struct CaptureSink {
    pub won: Option<Bindings>,
}

impl MatchSink for CaptureSink {
    fn match_found(&mut self, m: &mut [Bindings], mc: &mut usize, _facts: &dyn NodeList) -> i32 {
        if self.won.is_none() {
            let b = &m[mc.saturating_sub(1)];
            self.won = Some(b.clone());
        }
        1
    }
}

// ============================================================================
// SITUATION
// ============================================================================

/// A semantic network description to be matched: a required condition, up
/// to [`CAVEAT_MAX`] blocking descriptions, and the matching thresholds.
#[derive(Clone, Debug, Default)]
pub struct Situation {
    /// Required condition description.
    pub cond: Graphlet,
    /// Blocking descriptions (match of any one rejects the bindings).
    pub unless: Vec<Graphlet>,
    /// Belief threshold: positive requires `belief >= bth`; negative also
    /// accepts exactly-zero (hypothetical) facts against its magnitude.
    pub bth: f64,
    /// Restrict conversation participants: "you" only binds "you", "me"
    /// only "me".
    pub refmode: bool,
    /// Ignore polarity mismatches so a truth value can flip (CHK).
    pub chkmode: bool,
}

/// Maximum number of caveats.
pub const CAVEAT_MAX: usize = 5;

impl Situation {
    pub fn new() -> Self {
        Self {
            bth: 0.5,
            ..Default::default()
        }
    }

    pub fn num_pat(&self) -> usize {
        self.cond.num_items()
    }

    pub fn in_pat(&self, n: NodeId) -> bool {
        self.cond.in_desc(n)
    }

    pub fn add_unless(&mut self, g: Graphlet) -> bool {
        if self.unless.len() >= CAVEAT_MAX {
            return false;
        }
        self.unless.push(g);
        true
    }

    /// Match the condition against `facts`, reporting each complete set of
    /// bindings to the sink. When `facts2` is present, `facts` is a trigger
    /// description matched first and the remainder falls through to
    /// `facts2` (operator matching). Returns the number of completions.
    pub fn match_graph(
        &self,
        pat_pool: &dyn NodeList,
        sink: &mut dyn MatchSink,
        m: &mut [Bindings],
        mc: &mut usize,
        pat: &Graphlet,
        facts: &dyn NodeList,
        facts2: Option<&dyn NodeList>,
    ) -> i32 {
        // an empty pattern matches exactly once
        if pat.is_empty() {
            let n = mc.saturating_sub(1);
            if m[n].is_empty() {
                sink.match_found(m, mc, facts);
                return 1;
            }
        }

        let n = mc.saturating_sub(1);
        let complete = {
            let b = &m[n];
            b.complete()
        };

        // see if current instance fully matched
        if complete {
            // if testing a caveat, report blockage
            if *mc == 0 {
                return 1;
            }

            // otherwise check that none of the caveats are matched;
            // caveats of an operator always run against working memory
            for u in &self.unless {
                let mut m2 = [Bindings::new()];
                m2[0].copy_from(&m[n]);
                m2[0].expect += u.num_items();
                let mut mc2 = 0usize;
                let cav_facts = facts2.unwrap_or(facts);
                if self.match_graph(pat_pool, sink, &mut m2, &mut mc2, u, cav_facts, None) > 0 {
                    return 0;
                }
            }

            // current set of bindings is suitable
            return sink.match_found(m, mc, facts);
        }

        // otherwise pick some new pattern node and try to match it
        let mut cnt = self.try_props(pat_pool, sink, m, mc, pat, facts, facts2);
        if cnt < 0 {
            cnt = self.try_args(pat_pool, sink, m, mc, pat, facts, facts2);
        }
        if cnt < 0 {
            cnt = if facts.num_bins() > 1 {
                self.try_hash(pat_pool, sink, m, mc, pat, facts, facts2)
            } else {
                self.try_bare(pat_pool, sink, m, mc, pat, facts, facts2)
            };
        }
        if cnt > 0 {
            return cnt;
        }

        // for an operator, once the trigger is exhausted try the remainder
        // of the pattern against working memory
        if let Some(f2) = facts2 {
            return self.match_graph(pat_pool, sink, m, mc, pat, f2, None);
        }
        0 // pattern cannot be fully matched
    }

    // ------------------------------------------------------------------
    // anchored expansion
    // ------------------------------------------------------------------

    /// Try an unbound pattern node which is a property of something bound.
    /// Returns -1 when no such focus exists.
    fn try_props(
        &self,
        pat_pool: &dyn NodeList,
        sink: &mut dyn MatchSink,
        m: &mut [Bindings],
        mc: &mut usize,
        pat: &Graphlet,
        facts: &dyn NodeList,
        facts2: Option<&dyn NodeList>,
    ) -> i32 {
        let n = mc.saturating_sub(1);
        let bound = m[n].num_pairs();

        // get a bound pattern node with an unbound property in the pattern
        let mut pick: Option<(NodeId, NodeId, String)> = None;
        'outer: for i in 0..bound {
            let Some(anchor) = m[n].key(i) else { continue };
            let Some(an) = pat_pool.get(anchor) else {
                continue;
            };
            for pnum in 0..query::num_props(pat_pool, an) {
                let Some(focus) = query::prop(pat_pool, an, pnum) else {
                    continue;
                };
                if !m[n].in_keys(focus) && pat.in_desc(focus) {
                    let role = query::role(pat_pool, an, pnum).unwrap_or("").to_string();
                    pick = Some((anchor, focus, role));
                    break 'outer;
                }
            }
        }
        let Some((anchor, focus, role)) = pick else {
            return -1;
        };

        // consider properties of the anchor's binding (most recent first)
        let Some(val) = m[n].lookup(anchor) else {
            return -1;
        };
        let mut cnt = 0;
        let cand: Vec<NodeId> = {
            let Some(vn) = facts.get(val) else { return 0 };
            let np = query::num_props(facts, vn);
            (0..np)
                .rev()
                .filter(|i| query::role_match(facts, vn, *i, &role))
                .filter_map(|i| query::prop(facts, vn, i))
                .collect()
        };
        for mate in cand {
            let hit = self.try_binding(pat_pool, sink, focus, mate, m, mc, pat, facts, facts2);
            if hit < 0 {
                return 1;
            }
            cnt += hit;
        }
        cnt
    }

    /// Try an unbound pattern node which is an argument of something bound.
    fn try_args(
        &self,
        pat_pool: &dyn NodeList,
        sink: &mut dyn MatchSink,
        m: &mut [Bindings],
        mc: &mut usize,
        pat: &Graphlet,
        facts: &dyn NodeList,
        facts2: Option<&dyn NodeList>,
    ) -> i32 {
        let n = mc.saturating_sub(1);
        let bound = m[n].num_pairs();

        let mut pick: Option<(NodeId, NodeId, String)> = None;
        'outer: for i in 0..bound {
            let Some(anchor) = m[n].key(i) else { continue };
            let Some(an) = pat_pool.get(anchor) else {
                continue;
            };
            for anum in 0..query::num_args(pat_pool, an) {
                let Some(focus) = query::arg(pat_pool, an, anum) else {
                    continue;
                };
                if !m[n].in_keys(focus) && pat.in_desc(focus) {
                    let slot = query::slot(pat_pool, an, anum).unwrap_or("").to_string();
                    pick = Some((anchor, focus, slot));
                    break 'outer;
                }
            }
        }
        let Some((anchor, focus, slot)) = pick else {
            return -1;
        };

        // consider arguments of the anchor's binding as candidates
        let Some(fact) = m[n].lookup(anchor) else {
            return -1;
        };
        let mut cnt = 0;
        let cand: Vec<NodeId> = {
            let Some(fnode) = facts.get(fact) else { return 0 };
            let na = query::num_args(facts, fnode);
            (0..na)
                .filter(|i| query::slot(facts, fnode, *i) == Some(slot.as_str()))
                .filter_map(|i| query::arg(facts, fnode, i))
                .collect()
        };
        for mate in cand {
            let hit = self.try_binding(pat_pool, sink, focus, mate, m, mc, pat, facts, facts2);
            if hit < 0 {
                return 1;
            }
            cnt += hit;
        }
        cnt
    }

    /// Try an unbound pattern node against every enumerable fact.
    /// Scan priority: literal argument, literal property, lexical term,
    /// then anything.
    fn try_bare(
        &self,
        pat_pool: &dyn NodeList,
        sink: &mut dyn MatchSink,
        m: &mut [Bindings],
        mc: &mut usize,
        pat: &Graphlet,
        facts: &dyn NodeList,
        facts2: Option<&dyn NodeList>,
    ) -> i32 {
        let n = mc.saturating_sub(1);
        let mut focus: Option<NodeId> = None;
        'scan: for scan in 0..=3 {
            for item in pat.items() {
                if m[n].in_keys(item) {
                    continue;
                }
                let ok = match scan {
                    0 => pat.arg_out(pat_pool, item),
                    1 => pat.prop_out(pat_pool, item),
                    2 => pat_pool
                        .get(item)
                        .map(|nd| m[n].lex_sub(nd).is_some())
                        .unwrap_or(false),
                    _ => true,
                };
                if ok {
                    focus = Some(item);
                    break 'scan;
                }
            }
        }
        let Some(focus) = focus else {
            return -1;
        };

        let mut cnt = 0;
        let mut mate = facts.next_node(None, None);
        while let Some(mid) = mate {
            let hit = self.try_binding(pat_pool, sink, focus, mid, m, mc, pat, facts, facts2);
            if hit < 0 {
                return 1;
            }
            cnt += hit;
            mate = facts.next_node(Some(mid), None);
        }
        cnt
    }

    /// Pick the pattern node with the fewest candidate mates and try only
    /// its hash bin.
    fn try_hash(
        &self,
        pat_pool: &dyn NodeList,
        sink: &mut dyn MatchSink,
        m: &mut [Bindings],
        mc: &mut usize,
        pat: &Graphlet,
        facts: &dyn NodeList,
        facts2: Option<&dyn NodeList>,
    ) -> i32 {
        let n = mc.saturating_sub(1);
        let mut focus: Option<NodeId> = None;
        let mut best = 0usize;
        for item in pat.items() {
            if m[n].in_keys(item) {
                continue;
            }
            let Some(nd) = pat_pool.get(item) else { continue };
            let occ = facts.same_bin(nd, Some(&m[n]));
            if occ == 0 {
                return -1; // pattern unmatchable
            }
            if focus.is_none() || occ < best {
                focus = Some(item);
                best = occ;
            }
        }
        let Some(focus) = focus else {
            return -1;
        };

        // only consider nodes with a matching hash as candidates
        let bin = pat_pool.get(focus).map(|nd| {
            if m[n].lex_sub(nd).is_none() {
                None
            } else {
                let b = m[n].lex_bin(nd);
                if b == 0 { None } else { Some(b) }
            }
        });
        let bin = bin.flatten();

        let mut cnt = 0;
        let mut mate = facts.next_node(None, bin);
        while let Some(mid) = mate {
            let hit = self.try_binding(pat_pool, sink, focus, mid, m, mc, pat, facts, facts2);
            if hit < 0 {
                return 1;
            }
            cnt += hit;
            mate = facts.next_node(Some(mid), bin);
        }
        cnt
    }

    // ------------------------------------------------------------------
    // single candidate
    // ------------------------------------------------------------------

    /// Bind focus to mate then continue toward a full match of the pattern.
    /// Returns matches found, or -1 when a caveat run proved blockage.
    #[allow(clippy::too_many_arguments)]
    pub fn try_binding(
        &self,
        pat_pool: &dyn NodeList,
        sink: &mut dyn MatchSink,
        focus: NodeId,
        mate: NodeId,
        m: &mut [Bindings],
        mc: &mut usize,
        pat: &Graphlet,
        facts: &dyn NodeList,
        facts2: Option<&dyn NodeList>,
    ) -> i32 {
        let Some(mn) = facts.get(mate) else { return 0 };
        if !mn.visible() {
            return 0;
        }

        // make sure superficial pairing is okay
        let n = mc.saturating_sub(1);
        if facts2.is_some() {
            // matching an operator trigger against a directive key
            if !facts.in_list(mate) {
                return 0;
            }
            if self.consistent(pat_pool, facts, mate, focus, pat, &m[n], -self.bth.abs()) <= 0 {
                return 0;
            }
        } else if facts.prohibited(mate) {
            return 0;
        } else if self.consistent(pat_pool, facts, mate, focus, pat, &m[n], self.bth) <= 0 {
            return 0;
        }

        // possible lexical variable assignment carried by this pairing
        let lexvar = pat_pool.get(focus).and_then(|fnode| {
            if fnode.lex_var() && m[n].lookup_lex(fnode.lex_str()).is_none() {
                facts
                    .get(mate)
                    .and_then(|mnode| mnode.lex().map(|w| (fnode.lex_str().to_string(), w.to_string(), mnode.code())))
            } else {
                None
            }
        });

        // add pair to all remaining binding sets (all share the prefix)
        let mut nb = 0;
        for i in 0..=n {
            if let Ok(len) = m[i].bind(focus, mate) {
                nb = len;
                if let Some((var, word, bin)) = &lexvar {
                    m[i].bind_lex(var, word, *bin);
                }
            } else {
                return 0;
            }
        }

        // try to complete the pattern (stop after first match for caveat)
        let cnt = self.match_graph(pat_pool, sink, m, mc, pat, facts, facts2);
        if cnt > 0 && *mc == 0 {
            return -1;
        }

        // remove pair for backtrack (mc might drop on successful match)
        let n = mc.saturating_sub(1);
        for b in m.iter_mut().take(n + 1) {
            b.trim_to(nb.saturating_sub(1));
        }
        cnt
    }

    /// Check whether mate and focus are consistent given current bindings.
    /// Returns 1 when okay, zero or negative indicating where it failed.
    pub fn consistent(
        &self,
        pat_pool: &dyn NodeList,
        facts: &dyn NodeList,
        mate: NodeId,
        focus: NodeId,
        pat: &Graphlet,
        b: &Bindings,
        th: f64,
    ) -> i32 {
        let Some(mn) = facts.get(mate) else { return -10 };
        let Some(fnode) = pat_pool.get(focus) else {
            return -10;
        };

        // prevent use of the same term for different "variables"
        if b.in_subs(mate) {
            return -9;
        }

        // predicates must agree on sense, belief, arity, and eventness
        if query::num_args(pat_pool, fnode) > 0 {
            if !self.chkmode && mn.neg() != fnode.neg() {
                return -8;
            }
            if !mn.sure(th) {
                return -7;
            }
            // "father" matches "father of" (wrt omitted on the mate side)
            if fnode.arity(true) != mn.arity(false) {
                return -6;
            }
            if mn.done() != fnode.done() {
                return -5;
            }
        }

        // actual predicate terms must be compatible
        if !b.lex_agree(fnode, mn) {
            return -4;
        }

        // conversation participants are special when finding referents:
        // "you" can match "someone" but "someone" cannot match "you"
        if self.refmode {
            if mn.lex_match("you") && !fnode.lex_match("you") {
                return -3;
            }
            if mn.lex_match("me") && !fnode.lex_match("me") {
                return -2;
            }
        }

        // mate must realize every closed argument arrow (literals also)
        for i in 0..query::num_args(pat_pool, fnode) {
            let Some(a) = query::arg(pat_pool, fnode, i) else {
                continue;
            };
            let val = if pat.in_desc(a) { b.lookup(a) } else { Some(a) };
            if let Some(v) = val {
                let slot = query::slot(pat_pool, fnode, i).unwrap_or("");
                if !query::has_val(facts, mn, slot, v) {
                    return -1;
                }
            }
        }

        // mate must realize every bound property arrow
        for i in 0..query::num_props(pat_pool, fnode) {
            let Some(p) = query::prop(pat_pool, fnode, i) else {
                continue;
            };
            if let Some(fact) = b.lookup(p) {
                let role = query::role(pat_pool, fnode, i).unwrap_or("");
                if !query::has_fact(facts, fact, role, mate) {
                    return 0;
                }
            }
        }
        1
    }

    /// Find the working-memory equivalent of a description by matching the
    /// condition and reading out the binding for `focus`.
    pub fn find_ref(
        &self,
        pat_pool: &dyn NodeList,
        focus: NodeId,
        facts: &dyn NodeList,
    ) -> Option<NodeId> {
        let mut sink = CaptureSink::default();
        let mut m = [Bindings::new()];
        m[0].expect = self.cond.num_items();
        let mut mc = 1usize;
        if self.match_graph(pat_pool, &mut sink, &mut m, &mut mc, &self.cond, facts, None) > 0 {
            return sink.won.and_then(|b| b.lookup(focus));
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodePool;

    /// Count-only sink that keeps every completion.
    struct CountSink;

    impl MatchSink for CountSink {
        fn match_found(&mut self, _m: &mut [Bindings], mc: &mut usize, _f: &dyn NodeList) -> i32 {
            if *mc > 1 {
                *mc -= 1;
            }
            1
        }
    }

    fn dog_world() -> (NodePool, NodeId, NodeId) {
        let mut f = NodePool::new();
        let obj = f.make_node("obj", None, 0, 1.0);
        let ako = f.make_node("ako", Some("dog"), 0, 1.0);
        f.add_arg(ako, "ako", obj).unwrap();
        (f, obj, ako)
    }

    fn dog_pattern() -> (NodePool, Graphlet, NodeId, NodeId) {
        let mut p = NodePool::new();
        let x = p.make_node("obj", None, 0, 1.0);
        let isdog = p.make_node("ako", Some("dog"), 0, 1.0);
        p.add_arg(isdog, "ako", x).unwrap();
        let mut g = Graphlet::new();
        g.add_item(x).unwrap();
        g.add_item(isdog).unwrap();
        (p, g, x, isdog)
    }

    #[test]
    fn full_match_binds_every_pattern_node() {
        let (facts, obj, ako) = dog_world();
        let (pool, pat, x, isdog) = dog_pattern();
        let mut sit = Situation::new();
        sit.cond = pat.clone();

        let mut sink = CaptureSink::default();
        let mut m = vec![Bindings::new(); 2];
        m[1].expect = 2;
        m[0].expect = 2;
        let mut mc = 2usize;
        let found = sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None);
        assert!(found > 0);
        let b = sink.won.unwrap();
        assert_eq!(b.num_pairs(), 2);
        assert_eq!(b.lookup(x), Some(obj));
        assert_eq!(b.lookup(isdog), Some(ako));
    }

    #[test]
    fn belief_threshold_blocks_weak_facts() {
        let mut facts = NodePool::new();
        let obj = facts.make_node("obj", None, 0, 1.0);
        let ako = facts.make_node("ako", Some("dog"), 0, 0.3);
        facts.add_arg(ako, "ako", obj).unwrap();

        let (pool, pat, _, _) = dog_pattern();
        let mut sit = Situation::new();
        sit.cond = pat.clone();
        sit.bth = 0.5;

        let mut sink = CaptureSink::default();
        let mut m = vec![Bindings::new(); 1];
        m[0].expect = 2;
        let mut mc = 1usize;
        assert_eq!(
            sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None),
            0
        );

        // negative threshold admits exactly-zero hypotheticals
        facts.node_mut(ako).unwrap().tmp_belief(0.0);
        sit.bth = -0.5;
        let mut m = vec![Bindings::new(); 1];
        m[0].expect = 2;
        let mut mc = 1usize;
        assert!(sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None) > 0);
    }

    #[test]
    fn caveat_blocks_completion() {
        let (mut facts, obj, _ako) = dog_world();
        let fierce = facts.make_node("hq", Some("fierce"), 0, 1.0);
        facts.add_arg(fierce, "hq", obj).unwrap();

        let (mut pool, pat, x, _) = dog_pattern();
        let mut sit = Situation::new();
        sit.cond = pat.clone();

        // unless: x is fierce
        let uf = pool.make_node("hq", Some("fierce"), 0, 1.0);
        pool.add_arg(uf, "hq", x).unwrap();
        let mut u = Graphlet::new();
        u.add_item(uf).unwrap();
        sit.add_unless(u);

        let mut sink = CaptureSink::default();
        let mut m = vec![Bindings::new(); 1];
        m[0].expect = 2;
        let mut mc = 1usize;
        assert_eq!(
            sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None),
            0
        );
    }

    #[test]
    fn empty_pattern_matches_once() {
        let facts = NodePool::new();
        let pool = NodePool::new();
        let sit = Situation::new();
        let pat = Graphlet::new();
        let mut sink = CaptureSink::default();
        let mut m = vec![Bindings::new(); 1];
        let mut mc = 1usize;
        assert_eq!(
            sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None),
            1
        );
    }

    #[test]
    fn no_shared_substitutions() {
        // two distinct pattern objects cannot bind the same fact node
        let mut facts = NodePool::new();
        let only = facts.make_node("obj", None, 0, 1.0);
        let hug = facts.make_node("act", Some("hug"), 0, 1.0);
        facts.add_arg(hug, "agt", only).unwrap();
        facts.add_arg(hug, "obj", only).unwrap();

        let mut pool = NodePool::new();
        let a = pool.make_node("obj", None, 0, 1.0);
        let b = pool.make_node("obj", None, 0, 1.0);
        let act = pool.make_node("act", Some("hug"), 0, 1.0);
        pool.add_arg(act, "agt", a).unwrap();
        pool.add_arg(act, "obj", b).unwrap();
        let mut pat = Graphlet::new();
        pat.add_item(act).unwrap();
        pat.add_item(a).unwrap();
        pat.add_item(b).unwrap();

        let mut sit = Situation::new();
        sit.cond = pat.clone();
        let mut sink = CaptureSink::default();
        let mut m = vec![Bindings::new(); 1];
        m[0].expect = 3;
        let mut mc = 1usize;
        assert_eq!(
            sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None),
            0
        );
    }

    #[test]
    fn lex_variable_binds_consistently() {
        // pattern: x has quality ***-1, y has quality ***-1 (same word)
        let mut facts = NodePool::new();
        let o1 = facts.make_node("obj", None, 0, 1.0);
        let o2 = facts.make_node("obj", None, 0, 1.0);
        let h1 = facts.make_node("hq", Some("red"), 0, 1.0);
        let h2 = facts.make_node("hq", Some("blue"), 0, 1.0);
        facts.add_arg(h1, "hq", o1).unwrap();
        facts.add_arg(h2, "hq", o2).unwrap();

        let mut pool = NodePool::new();
        let x = pool.make_node("obj", None, 0, 1.0);
        let y = pool.make_node("obj", None, 0, 1.0);
        let p1 = pool.make_node("hq", Some("***-1"), 0, 1.0);
        let p2 = pool.make_node("hq", Some("***-1"), 0, 1.0);
        pool.add_arg(p1, "hq", x).unwrap();
        pool.add_arg(p2, "hq", y).unwrap();
        let mut pat = Graphlet::new();
        for id in [x, y, p1, p2] {
            pat.add_item(id).unwrap();
        }

        let mut sit = Situation::new();
        sit.cond = pat.clone();
        // h1(red) and h2(blue) disagree, so the only way to complete is
        // impossible: two different objects need the same variable word
        let mut sink = CaptureSink::default();
        let mut m = vec![Bindings::new(); 1];
        m[0].expect = 4;
        let mut mc = 1usize;
        assert_eq!(
            sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None),
            0
        );

        // make both qualities the same word and it goes through
        facts.set_lex(h2, "red");
        let mut m = vec![Bindings::new(); 1];
        m[0].expect = 4;
        let mut mc = 1usize;
        assert!(sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &facts, None) > 0);
    }
}
