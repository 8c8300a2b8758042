//! Associative Memory - The declarative rule store and halo driver
//!
//! Holds every loaded implication and rebuilds the expectation halo each
//! cognition cycle: pass 1 runs one-step inference over main memory (and
//! long-term ghosts), the horizon is recorded, and pass 2 chains a second
//! step over the first set of conclusions. Two-step inferences that prove
//! useful get consolidated into new one-step rules.

use std::path::Path;

use crate::graph::{Bindings, NodeId, NodeList};
use crate::kb::{KbError, LineReader};
use crate::memory::WorkingMemory;
use crate::reason::rule::Rule;

/// Linked store of declarative rules.
#[derive(Default)]
pub struct RuleMemory {
    rules: Vec<Rule>,
    nr: u32,
}

impl RuleMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: u32) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn rule_mut(&mut self, id: u32) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.id == id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Add a rule after validity checks. An exact duplicate from the user
    /// becomes a confidence update on the existing rule instead of a copy.
    /// Returns false when the rule was rejected outright.
    pub fn add_rule(&mut self, r: Rule, user: bool) -> bool {
        if r.result.is_empty() {
            tracing::info!("reject: new rule result is empty");
            return false;
        }
        if r.tautology() {
            tracing::info!("reject: new rule is a tautology");
            return false;
        }
        if r.bipartite() {
            tracing::info!("reject: new rule is disconnected");
            return false;
        }
        if let Some(prev) = self.rules.iter_mut().find(|p| r.identical(p)) {
            if user {
                tracing::info!(rule = prev.id, conf = r.conf, "known: updating confidence");
                prev.conf = r.conf;
                return true;
            }
            tracing::info!(rule = prev.id, "duplicate rule rejected");
            return false;
        }
        let mut r = r;
        self.nr += 1;
        r.id = self.nr;
        tracing::debug!(rule = r.id, "rule added");
        self.rules.push(r);
        true
    }

    /// Remove a rule outright (cleanup of an incomplete ADD).
    pub fn remove(&mut self, id: u32) {
        self.rules.retain(|r| r.id != id);
    }

    // ------------------------------------------------------------------
    // halo refresh
    // ------------------------------------------------------------------

    /// Apply all rules to working memory, conclusions go to the halo.
    /// Pass 1 sees bands 0-1 only; the horizon then separates single from
    /// double rule inferences; pass 2 sees bands 0-2 with accumulated
    /// bindings so chains of two rules can complete.
    /// Returns (one-step, two-step) invocation counts.
    pub fn refresh_halo(&mut self, wmem: &mut WorkingMemory) -> (usize, usize) {
        let mth = wmem.min_blf();
        wmem.clear_halo();

        // PASS 1 - one-step inference over main memory and ghost facts
        wmem.max_band(1);
        let mut cnt = 0;
        for r in &mut self.rules {
            cnt += r.assert_matches(wmem, mth, false);
        }
        wmem.horizon(); // single versus double rule boundary

        // PASS 2 - second step may consume first-step conclusions
        wmem.max_band(2);
        let mut cnt2 = 0;
        for r in &mut self.rules {
            cnt2 += r.assert_matches(wmem, mth, true);
        }

        tracing::debug!(one_step = cnt, two_step = cnt2, "halo refreshed");
        (cnt, cnt2)
    }

    // ------------------------------------------------------------------
    // consolidation
    // ------------------------------------------------------------------

    /// When a two-rule series inferred an essential fact, combine the two
    /// rules into a single new one. Needs the raw bindings before halo
    /// migration. Returns the number of new rules created.
    pub fn consolidate(&mut self, b: &Bindings, wmem: &WorkingMemory) -> usize {
        let mut made = Vec::new();
        let mut seen: Vec<(u32, usize)> = Vec::new();

        for i in 0..b.num_pairs() {
            // find a two-step conclusion among the substitutions
            let Some(sub) = b.sub(i) else { continue };
            let Some(src2) = wmem.get(sub).and_then(|n| n.halo_src) else {
                continue;
            };
            if seen.contains(&(src2.rule, src2.bind)) {
                continue;
            }
            seen.push((src2.rule, src2.bind));

            let Some(r2) = self.rule(src2.rule) else { continue };
            let Some(b2) = r2.instantiation(src2.bind) else {
                continue;
            };

            // look for first-step conclusions that fed its trigger
            let mut steps1: Vec<(u32, usize)> = Vec::new();
            for j in 0..b2.num_pairs() {
                let Some(mid) = b2.sub(j) else { continue };
                if let Some(src1) = wmem.get(mid).and_then(|n| n.halo_src) {
                    if (src1.rule, src1.bind) != (src2.rule, src2.bind)
                        && !steps1.contains(&(src1.rule, src1.bind))
                    {
                        steps1.push((src1.rule, src1.bind));
                    }
                }
            }
            if steps1.is_empty() {
                continue; // pure one-step use, nothing to merge
            }

            // merge every first-step rule then finish with the second
            let mut mix = Rule::new();
            let mut m2c = Bindings::new();
            for (rid, bidx) in &steps1 {
                let Some(r1) = self.rule(*rid) else { continue };
                let Some(b1) = r1.instantiation(*bidx) else {
                    continue;
                };
                tracing::info!(step2 = src2.rule, step1 = rid, "consolidate");
                mix.add_combo(&mut m2c, r1, b1, wmem);
            }
            let resolve = |mem: NodeId| self.origin_belief(mem, wmem);
            let b2c = b2.clone();
            mix.link_combo(&mut m2c, r2, &b2c, wmem, resolve);
            made.push(mix);
        }

        let mut cnt = 0;
        for mix in made {
            if self.add_rule(mix, false) {
                cnt += 1;
            }
        }
        cnt
    }

    /// Belief assigned by the rule that produced a halo node (its own
    /// result pattern belief, which reflects that rule's confidence).
    fn origin_belief(&self, mem: NodeId, wmem: &WorkingMemory) -> f64 {
        let Some(src) = wmem.get(mem).and_then(|n| n.halo_src) else {
            return 1.0;
        };
        let Some(r) = self.rule(src.rule) else {
            return 1.0;
        };
        let Some(b) = r.instantiation(src.bind) else {
            return r.conf;
        };
        b.find_key(mem)
            .and_then(|pn| r.pool.node(pn))
            .map(|n| n.belief())
            .unwrap_or(r.conf)
    }

    // ------------------------------------------------------------------
    // file functions
    // ------------------------------------------------------------------

    /// Read a list of rules, appending unless `add` is false. File ids are
    /// ignored and fresh ones assigned. Returns how many were accepted.
    pub fn load(&mut self, path: &Path, add: bool, level: i32) -> Result<usize, KbError> {
        if !add {
            self.rules.clear();
            self.nr = 0;
        }
        let text = std::fs::read_to_string(path)?;
        let src = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut input = LineReader::new(text.as_bytes());
        let mut n = 0;
        loop {
            let mut r = Rule::new();
            match r.load(&mut input) {
                Ok(true) => {
                    r.lvl = level;
                    if level <= 1 {
                        r.prov = src.clone();
                    }
                    if self.add_rule(r, false) {
                        n += 1;
                    }
                }
                Ok(false) => break,
                Err(_) => {
                    tracing::warn!(line = input.last(), file = %path.display(), "bad rule syntax");
                    if input.next_blank().is_none() {
                        break;
                    }
                }
            }
        }
        tracing::info!(count = n, file = %path.display(), "inference rules loaded");
        Ok(n)
    }

    /// Save rules at or above some level. Returns how many were written.
    pub fn save(&self, path: &Path, level: i32) -> Result<usize, KbError> {
        let mut out = String::new();
        let mut cnt = 0;
        if level >= 2 {
            out.push_str("// newly learned rules\n// ====================\n\n");
        }
        for r in &self.rules {
            if r.lvl >= level {
                r.save(&mut out, 2).map_err(|_| KbError::Syntax(0))?;
                out.push_str("\n\n");
                cnt += 1;
            }
        }
        std::fs::write(path, out)?;
        Ok(cnt)
    }

    /// Store confidence changes relative to loaded values.
    pub fn alterations(&self, path: &Path) -> Result<usize, KbError> {
        let mut out = String::from("// learned changes to default rule confidences\n\n");
        let mut na = 0;
        for r in &self.rules {
            if !r.prov.is_empty() && r.conf != r.conf0 {
                out.push_str(&format!("{} {} = {:4.2}\n", r.prov, r.pnum, r.conf));
                na += 1;
            }
        }
        std::fs::write(path, out)?;
        Ok(na)
    }

    /// Apply confidence overrides saved by [`Self::alterations`].
    pub fn overrides(&mut self, path: &Path) -> Result<usize, KbError> {
        let text = std::fs::read_to_string(path)?;
        let mut input = LineReader::new(text.as_bytes());
        let mut na = 0;
        while input.next_content().is_some() {
            let Some(src) = input.token() else { break };
            let Some(num) = input.token().and_then(|t| t.parse::<u32>().ok()) else {
                break;
            };
            if input.token().as_deref() != Some("=") {
                break;
            }
            let Some(cf) = input.token().and_then(|t| t.parse::<f64>().ok()) else {
                break;
            };
            input.flush();
            for r in &mut self.rules {
                if r.prov == src && r.pnum == num {
                    r.conf = cf;
                    na += 1;
                    break;
                }
            }
        }
        Ok(na)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::rule::tests::dog_animal_rule;

    #[test]
    fn duplicates_become_confidence_updates_for_user() {
        let mut am = RuleMemory::new();
        assert!(am.add_rule(dog_animal_rule(), false));
        // silent duplicate rejected
        assert!(!am.add_rule(dog_animal_rule(), false));
        assert_eq!(am.len(), 1);
        // user duplicate updates confidence in place
        let mut dup = dog_animal_rule();
        dup.conf = 0.6;
        assert!(am.add_rule(dup, true));
        assert_eq!(am.len(), 1);
        assert_eq!(am.rules().next().unwrap().conf, 0.6);
    }

    #[test]
    fn refresh_halo_sets_horizon_between_passes() {
        let mut wmem = WorkingMemory::new();
        let obj = wmem.make_node("obj", None, 0, 1.0);
        let dog = wmem.add_prop(obj, "ako", "dog", 0, 1.0, false).unwrap();
        for id in [obj, dog] {
            let n = wmem.node_mut(id).unwrap();
            n.reveal();
            n.set_belief(1.0);
        }

        let mut am = RuleMemory::new();
        am.add_rule(dog_animal_rule(), false);

        // mammal rule chains off the animal conclusion
        let mut r2 = Rule::new();
        let x = r2.pool.make_node("obj", None, 0, 1.0);
        let animal = r2.pool.make_node("ako", Some("animal"), 0, 1.0);
        r2.pool.add_arg(animal, "ako", x).unwrap();
        r2.sit.cond.add_item(animal).unwrap();
        r2.sit.cond.add_item(x).unwrap();
        let breathes = r2.pool.make_node("ako", Some("breather"), 0, 1.0);
        r2.pool.add_arg(breathes, "ako", x).unwrap();
        r2.result.add_item(breathes).unwrap();
        r2.conf = 0.8;
        let conf = r2.conf;
        r2.pool.force_belief(&r2.result, conf);
        r2.pool.node_mut(breathes).unwrap().set_default(conf);
        am.add_rule(r2, false);

        let (one, two) = am.refresh_halo(&mut wmem);
        assert_eq!(one, 1); // dog -> animal
        assert_eq!(two, 1); // animal -> breather
        assert_eq!(wmem.last_single(), 1);
        assert_eq!(wmem.halo_size(), 2);

        // two-step node sits in band 3
        let mut halo_ids = Vec::new();
        wmem.max_band(3);
        let mut n = wmem.next_node(None, None);
        while let Some(id) = n {
            if id.is_halo() {
                halo_ids.push(id);
            }
            n = wmem.next_node(Some(id), None);
        }
        assert_eq!(halo_ids.len(), 2);
        assert!(halo_ids.iter().any(|id| wmem.in_band(*id, 2)));
        assert!(halo_ids.iter().any(|id| wmem.in_band(*id, 3)));
    }

    #[test]
    fn consolidation_builds_combined_rule() {
        let mut wmem = WorkingMemory::new();
        let obj = wmem.make_node("obj", None, 0, 1.0);
        let dog = wmem.add_prop(obj, "ako", "dog", 0, 1.0, false).unwrap();
        for id in [obj, dog] {
            let n = wmem.node_mut(id).unwrap();
            n.reveal();
            n.set_belief(1.0);
        }

        let mut am = RuleMemory::new();
        am.add_rule(dog_animal_rule(), false);
        let mut r2 = Rule::new();
        let x = r2.pool.make_node("obj", None, 0, 1.0);
        let animal = r2.pool.make_node("ako", Some("animal"), 0, 1.0);
        r2.pool.add_arg(animal, "ako", x).unwrap();
        r2.sit.cond.add_item(animal).unwrap();
        r2.sit.cond.add_item(x).unwrap();
        let breathes = r2.pool.make_node("ako", Some("breather"), 0, 1.0);
        r2.pool.add_arg(breathes, "ako", x).unwrap();
        r2.result.add_item(breathes).unwrap();
        r2.conf = 0.8;
        let c = r2.conf;
        r2.pool.force_belief(&r2.result, c);
        r2.pool.node_mut(breathes).unwrap().set_default(c);
        am.add_rule(r2, false);

        am.refresh_halo(&mut wmem);

        // bindings that used the two-step conclusion
        wmem.max_band(3);
        let mut two_step = None;
        let mut n = wmem.next_node(None, None);
        while let Some(id) = n {
            if id.is_halo() && wmem.in_band(id, 3) {
                two_step = Some(id);
            }
            n = wmem.next_node(Some(id), None);
        }
        let mut b = Bindings::new();
        let probe = wmem.halo_pool().ids()[0]; // unused placeholder key
        b.bind(probe, two_step.unwrap()).unwrap();

        let made = am.consolidate(&b, &wmem);
        assert_eq!(made, 1);
        assert_eq!(am.len(), 3);

        // combined rule goes dog -> breather at min confidence
        let combo = am.rules().last().unwrap();
        assert!((combo.conf - 0.8).abs() < 1e-9);
        assert_eq!(combo.result.num_items(), 1);

        // trying again yields a duplicate which is rejected
        assert_eq!(am.consolidate(&b, &wmem), 0);
    }
}
