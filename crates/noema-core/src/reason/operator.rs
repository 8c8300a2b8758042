//! Operator - Advice on what to do given some stimulus or desire
//!
//! An operator pairs a trigger description (keyed by directive kind) with
//! a method chain and a selection preference. Matching is two-stage: the
//! trigger is matched against the directive's key description first, and
//! whatever remains falls through to working memory (including the halo,
//! so inferences can license actions).
//!
//! NOTE operators also carry an expected completion time (mean + spread)
//! that budgets free-choice activity and is tuned by experience.

use std::io::Read;

use crate::act::chain::ChainGraph;
use crate::act::directive::{DirKind, Directive, OP_MAX};
use crate::graph::{query, Bindings, Graphlet, GraphletView, NodeId, NodeList, NodePool};
use crate::kb::{self, KbError, LineReader, TransTable};
use crate::matcher::{MatchSink, Situation};
use crate::memory::WorkingMemory;

/// Default expected duration for a free-choice NOTE response (secs).
pub const NOTE_TAVG: f64 = 20.0;

/// Default duration spread for a free-choice NOTE response (secs).
pub const NOTE_TSTD: f64 = 10.0;

// ============================================================================
// OPERATOR
// ============================================================================

/// Procedural advice: when the trigger matches, offer the method chain.
pub struct Operator {
    pub id: u32,
    /// Source level: 0 kernel, 1 extras, 2 accumulated, 3 newly told.
    pub lvl: i32,
    pub gist: String,
    pub prov: String,
    pub pnum: u32,

    /// Directive kind this operator responds to.
    pub kind: DirKind,
    /// Private pattern pool for the trigger and method descriptions.
    pub pool: NodePool,
    /// Trigger condition plus caveats.
    pub sit: Situation,

    /// Selection preference in (0, 1.2].
    pub pref: f64,
    pub pref0: f64,

    /// Expected duration (mean and spread) for NOTE operators.
    pub tavg: f64,
    pub tstd: f64,
    pub time0: f64,

    /// Method chain template (pattern-pool descriptions).
    pub meth: Option<ChainGraph>,
}

impl Operator {
    pub fn new(kind: DirKind) -> Self {
        let (tavg, tstd) = if kind == DirKind::Note {
            (NOTE_TAVG, NOTE_TSTD)
        } else {
            (0.0, 0.0)
        };
        Self {
            id: 0,
            lvl: 3,
            gist: String::new(),
            prov: String::new(),
            pnum: 0,
            kind,
            pool: NodePool::new(),
            sit: Situation::new(),
            pref: 1.0,
            pref0: 1.0,
            tavg,
            tstd,
            time0: tavg + tstd,
            meth: None,
        }
    }

    /// Time allowed before a free-choice activity is cut off.
    pub fn budget(&self) -> f64 {
        self.tavg + self.tstd
    }

    /// Change selection preference, quantized to two decimals and clamped
    /// to [0.1, 1.2]. Returns the actual change.
    pub fn set_pref(&mut self, v: f64) -> f64 {
        let p0 = self.pref;
        let p = v.clamp(0.1, 1.2);
        self.pref = 0.01 * (100.0 * p).round();
        self.pref - p0
    }

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

    /// Revise the expected duration with an exponential moving average.
    /// Termination can lengthen (late success) or shorten (early stop).
    pub fn adj_time(&mut self, secs: f64) {
        const TMIX: f64 = 0.1;
        let v0 = self.tstd * self.tstd;
        let dt = secs - self.tavg;
        let tvar = (1.0 - TMIX) * (v0 + TMIX * dt * dt);
        self.tavg += TMIX * dt;
        self.tstd = tvar.sqrt();
    }

    /// Two binding sets yield the same action when every trigger node the
    /// method actually mentions maps to the same substitution.
    pub fn same_effect(&self, b1: &Bindings, b2: &Bindings) -> bool {
        let Some(meth) = &self.meth else { return true };
        for i in 0..b1.num_pairs() {
            let Some(k) = b1.key(i) else { continue };
            if meth.involves(&self.pool, k) && b2.lookup(k) != b1.sub(i) {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // trigger matching
    // ------------------------------------------------------------------

    /// Find all bindings that let this operator apply to the directive.
    /// Accepted sets land in `dir.matches` (with `dir.mc` counting down);
    /// the caller records which operator owns each slot.
    pub fn find_matches(
        &self,
        dir: &mut Directive,
        wmem: &WorkingMemory,
        mth: f64,
        family: DirKind,
    ) -> i32 {
        let nc = self.sit.cond.num_items();
        if nc == 0 {
            return 0;
        }
        let mut focus = match self.sit.cond.main() {
            Some(f) => f,
            None => return 0,
        };

        // the main node of a NOTE is not special: pick most constrained
        if family == DirKind::Note && wmem.num_bins() > 1 {
            let mut best = 0usize;
            for item in self.sit.cond.items() {
                let Some(nd) = self.pool.node(item) else { continue };
                let occ = wmem.same_bin(nd, None);
                if occ == 0 {
                    return 0; // pattern unmatchable
                }
                if best == 0 || occ < best {
                    focus = item;
                    best = occ;
                }
            }
        }

        // matching thresholds by directive family
        let mut sit = self.sit.clone();
        sit.bth = if matches!(family, DirKind::Chk | DirKind::Find) {
            -mth
        } else {
            mth
        };
        sit.chkmode = family == DirKind::Chk;

        let mut cnt = 0;
        match family {
            DirKind::Chk => {
                // triggers can start matching anywhere in the key
                let mates: Vec<NodeId> = dir.key.items().collect();
                for mate in mates {
                    let found = self.try_mate(&sit, focus, mate, dir, wmem);
                    if found < 0 {
                        return found;
                    }
                    cnt += found;
                }
            }
            DirKind::Note => {
                // anything in memory (including the halo) can trigger
                let bin = {
                    let f = self.pool.node(focus);
                    match f.and_then(|n| n.lex()) {
                        Some(_) => {
                            let c = f.map(|n| n.code()).unwrap_or(0);
                            if c == 0 { None } else { Some(c) }
                        }
                        None => None,
                    }
                };
                let mut mate = wmem.next_node(None, bin);
                while let Some(m) = mate {
                    let found = self.try_mate(&sit, focus, m, dir, wmem);
                    if found < 0 {
                        return found;
                    }
                    cnt += found;
                    mate = wmem.next_node(Some(m), bin);
                }
            }
            DirKind::Ante => {
                // the act itself plus its named function superclasses
                let mut mates: Vec<NodeId> = Vec::new();
                if let Some(act) = dir.key.main_act(wmem) {
                    mates.push(act);
                    if let Some(an) = wmem.get(act) {
                        let mut w = 0;
                        while let Some(f) = query::fact(wmem, an, "fcn", w) {
                            mates.push(f);
                            w += 1;
                        }
                    }
                }
                for mate in mates {
                    let found = self.try_mate(&sit, focus, mate, dir, wmem);
                    if found < 0 {
                        return found;
                    }
                    cnt += found;
                }
            }
            _ => {
                // most directives: key main against trigger main
                if let Some(mate) = dir.key_main() {
                    cnt = self.try_mate(&sit, focus, mate, dir, wmem);
                }
            }
        }
        cnt
    }

    /// Try one candidate for the trigger's focus node, then run the full
    /// matcher (trigger against key, remainder against memory).
    fn try_mate(
        &self,
        sit: &Situation,
        focus: NodeId,
        mate: NodeId,
        dir: &mut Directive,
        wmem: &WorkingMemory,
    ) -> i32 {
        let Some(mn) = wmem.get(mate) else { return 0 };
        if !mn.visible() {
            return 0;
        }
        let Some(fnode) = self.pool.node(focus) else {
            return 0;
        };

        // superficial compatibility of the seed pairing
        if self.kind == DirKind::Note && !mn.sure(sit.bth) {
            return 0;
        }
        if (!sit.chkmode && mn.neg() != fnode.neg())
            || mn.done() != fnode.done()
            || (fnode.lex().is_some() && !fnode.lex_match(mn.lex_str()))
        {
            return 0;
        }
        if mn.arity(true) != fnode.arity(true) {
            return 0;
        }

        // force the seed binding into every open slot
        let first = dir.mc;
        let nc = self.sit.cond.num_items();
        for i in 0..first {
            dir.matches[i].clear();
            dir.matches[i].expect = nc;
            let _ = dir.matches[i].bind(focus, mate);
        }

        let mut sink = OpSink {
            pat_pool: &self.pool,
            op: self,
            tval: dir.own,
            first,
            any: false,
        };
        let found = if self.kind == DirKind::Note {
            sit.match_graph(
                &self.pool,
                &mut sink,
                &mut dir.matches,
                &mut dir.mc,
                &self.sit.cond,
                wmem,
                None,
            )
        } else {
            let keyview = GraphletView::new(&dir.key, wmem);
            sit.match_graph(
                &self.pool,
                &mut sink,
                &mut dir.matches,
                &mut dir.mc,
                &self.sit.cond,
                &keyview,
                Some(wmem),
            )
        };
        if sink.any {
            dir.any_ops = true;
        }
        found
    }

    // ------------------------------------------------------------------
    // file functions
    // ------------------------------------------------------------------

    /// Read one operator at the current file position.
    /// Returns Ok(false) at end of file.
    pub fn load<R: Read>(&mut self, input: &mut LineReader<R>) -> Result<bool, KbError> {
        if input.next_content().is_none() {
            return Ok(false);
        }
        let hdr = input.token().ok_or(KbError::Syntax(input.last()))?;
        if !hdr.eq_ignore_ascii_case("OP") {
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

        // trigger condition expressed as a directive
        if !input.begins("trig:") {
            return Err(KbError::Syntax(input.last()));
        }
        input.flush();
        input.next_content();
        let trig = Directive::load(&mut self.pool, &mut trans, input)?;
        self.kind = trig.kind;
        self.sit.cond = trig.key;
        if self.kind == DirKind::Note {
            self.tavg = NOTE_TAVG;
            self.tstd = NOTE_TSTD;
        }

        // caveats
        while input.next_content().is_some() && input.begins("unless:") {
            input.skip("unless:");
            let u = kb::load_graph(&mut self.pool, &mut trans, input)?;
            if !self.sit.add_unless(u) {
                tracing::warn!(op = self.pnum, "too many caveats");
                break;
            }
        }

        // selection preference (defaults to 1.0)
        if input.next(false).is_some() && input.begins("pref:") {
            input.skip("pref:");
            let v = input
                .token()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or(KbError::Syntax(input.last()))?;
            self.pref = v;
            self.pref0 = v;
            input.flush();
            input.next(false);
        }

        // expected duration (only meaningful for NOTE)
        if input.next(false).is_some() && input.begins("time:") {
            input.skip("time:");
            let avg = input
                .token()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or(KbError::Syntax(input.last()))?;
            let plus = input.token();
            if plus.as_deref() != Some("+") {
                return Err(KbError::Syntax(input.last()));
            }
            let std = input
                .token()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or(KbError::Syntax(input.last()))?;
            self.tavg = avg;
            self.tstd = std;
            input.flush();
            input.next(false);
        }
        self.time0 = self.budget();

        // separator then the method chain
        if !input.begins("----") {
            return Err(KbError::Syntax(input.last()));
        }
        input.flush();
        let meth = ChainGraph::load(&mut self.pool, &mut trans, input)?;
        self.meth = Some(meth);
        Ok(true)
    }

    /// Write the operator in machine readable form.
    pub fn save(&self, out: &mut String) -> std::fmt::Result {
        use std::fmt::Write;

        if !self.prov.is_empty() {
            writeln!(out, "// originally operator {} from {}\n", self.pnum, self.prov)?;
        }
        write!(out, "OP")?;
        if self.id > 0 {
            write!(out, " {}", self.id)?;
        }
        if !self.gist.is_empty() {
            write!(out, " - \"{}\"", self.gist)?;
        }
        writeln!(out)?;

        // trigger rendered as a directive of the right kind
        writeln!(out, "  trig:")?;
        let trig = Directive::with_key(self.kind, self.sit.cond.clone());
        trig.save(&self.pool, out, 2)?;

        for u in &self.sit.unless {
            write!(out, "unless: ")?;
            kb::write_graphlet(out, &self.pool, u, -8, 0)?;
            writeln!(out)?;
        }

        if self.pref != 1.0 {
            writeln!(out, "  pref: {:5.3}", self.pref)?;
        }
        if self.kind == DirKind::Note && (self.tavg != NOTE_TAVG || self.tstd != NOTE_TSTD) {
            writeln!(out, "  time: {:3.1} + {:3.1}", self.tavg, self.tstd)?;
        }

        writeln!(out, "-----------------")?;
        if let Some(m) = &self.meth {
            m.save(&self.pool, out, 2)?;
        }
        Ok(())
    }
}

// ============================================================================
// MATCH SINK
// ============================================================================

struct OpSink<'a> {
    pat_pool: &'a NodePool,
    op: &'a Operator,
    tval: i32,
    first: usize,
    any: bool,
}

impl MatchSink for OpSink<'_> {
    fn match_found(&mut self, m: &mut [Bindings], mc: &mut usize, facts: &dyn NodeList) -> i32 {
        if *mc == 0 {
            return 0; // checking an unless clause
        }
        let cur = *mc - 1;

        // a NOTE trigger must touch the newly posted information
        if self.tval > 0 {
            let b = &m[cur];
            let relevant = (0..b.num_pairs()).any(|i| {
                let key_obj = b
                    .key(i)
                    .and_then(|k| self.pat_pool.node(k))
                    .map(|n| n.obj_node())
                    .unwrap_or(true);
                if key_obj {
                    return false;
                }
                b.sub(i)
                    .and_then(|s| facts.get(s))
                    .map(|n| n.top == self.tval)
                    .unwrap_or(false)
            });
            if !relevant {
                return 0;
            }
        }

        self.any = true;

        // same proposed action already in the list?
        let cur_b = m[cur].clone();
        for i in *mc..self.first {
            if self.op.same_effect(&cur_b, &m[i]) {
                return 0;
            }
        }

        if *mc <= 1 {
            tracing::warn!("more than {OP_MAX} applicable operator bindings");
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
mod tests {
    use super::*;

    #[test]
    fn pref_quantized_and_clamped() {
        let mut op = Operator::new(DirKind::Do);
        op.set_pref(2.0);
        assert_eq!(op.pref, 1.2);
        op.set_pref(0.01);
        assert_eq!(op.pref, 0.1);
        op.set_pref(0.856);
        assert_eq!(op.pref, 0.86);
    }

    #[test]
    fn adj_time_moves_toward_observation() {
        let mut op = Operator::new(DirKind::Note);
        let t0 = op.tavg;
        op.adj_time(t0 + 10.0);
        assert!(op.tavg > t0);
        assert!(op.tavg < t0 + 10.0);
        // shortening works too (pre-emptive stop)
        let t1 = op.tavg;
        op.adj_time(1.0);
        assert!(op.tavg < t1);
    }

    #[test]
    fn same_effect_only_checks_method_nodes() {
        let mut op = Operator::new(DirKind::Do);
        let x = op.pool.make_node("obj", None, 0, 1.0);
        let act = op.pool.make_node("act", Some("grab"), 0, 1.0);
        op.pool.add_arg(act, "obj", x).unwrap();
        op.sit.cond.add_item(act).unwrap();
        op.sit.cond.add_item(x).unwrap();

        // method only mentions the act node
        let mut meth = ChainGraph::new();
        let mut g = Graphlet::new();
        g.add_item(act).unwrap();
        meth.push(crate::act::Payload::Dir(Box::new(Directive::with_key(
            DirKind::Fcn,
            g,
        ))));
        op.meth = Some(meth);

        let w1 = NodeId::new(999, 1);
        let w2 = NodeId::new(999, 2);
        let w3 = NodeId::new(999, 3);
        let mut b1 = Bindings::new();
        b1.bind(act, w1).unwrap();
        b1.bind(x, w2).unwrap();
        let mut b2 = Bindings::new();
        b2.bind(act, w1).unwrap();
        b2.bind(x, w3).unwrap();
        // x differs but the method never mentions it
        assert!(op.same_effect(&b1, &b2));

        let mut b3 = Bindings::new();
        b3.bind(act, w3).unwrap();
        b3.bind(x, w2).unwrap();
        assert!(!op.same_effect(&b1, &b3));
    }
}
