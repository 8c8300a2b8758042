//! Procedural Memory - The operator store
//!
//! Holds every loaded operator and matches the applicable ones against a
//! directive, allowing two-step halo inferences to participate in triggers
//! (band ceiling 3). Each accepted binding slot records which operator it
//! came from so the directive can instantiate the winning method.

use std::path::Path;

use crate::act::directive::{DirKind, Directive, OP_MAX};
use crate::act::ChainGraph;
use crate::graph::NodePool;
use crate::kb::{KbError, LineReader};
use crate::memory::WorkingMemory;
use crate::reason::operator::Operator;

/// Linked store of procedural operators.
#[derive(Default)]
pub struct OperatorMemory {
    ops: Vec<Operator>,
    np: u32,
}

impl OperatorMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn op(&self, id: u32) -> Option<&Operator> {
        self.ops.iter().find(|o| o.id == id)
    }

    pub fn op_mut(&mut self, id: u32) -> Option<&mut Operator> {
        self.ops.iter_mut().find(|o| o.id == id)
    }

    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.ops.iter()
    }

    /// Add an operator to the store, assigning its id.
    pub fn add_operator(&mut self, mut op: Operator) -> u32 {
        self.np += 1;
        op.id = self.np;
        tracing::debug!(op = op.id, kind = op.kind.tag(), "operator added");
        self.ops.push(op);
        self.np
    }

    /// Remove an operator outright (cleanup of an incomplete ADD).
    pub fn remove(&mut self, id: u32) {
        self.ops.retain(|o| o.id != id);
    }

    /// Template chain and pattern pool for instantiating a method.
    pub fn method_parts(&self, id: u32) -> Option<(&ChainGraph, &NodePool)> {
        let op = self.op(id)?;
        op.meth.as_ref().map(|m| (m, &op.pool))
    }

    /// Fold an observed completion time into an operator's expectation.
    pub fn adj_time(&mut self, id: u32, secs: f64) {
        if let Some(op) = self.op_mut(id) {
            if op.kind == DirKind::Note {
                op.adj_time(secs);
            }
        }
    }

    // ------------------------------------------------------------------
    // matching
    // ------------------------------------------------------------------

    /// Find applicable operators for the directive; bindings and owning
    /// operator ids are stored inside the directive itself. The `family`
    /// selects which operator kind applies (a DO runs its ANTE phase with
    /// the same key). Returns the number of bindings found.
    pub fn find_ops(
        &self,
        dir: &mut Directive,
        wmem: &mut WorkingMemory,
        pth: f64,
        mth: f64,
        family: DirKind,
    ) -> i32 {
        let family = family.op_family();
        dir.mc = OP_MAX;
        dir.any_ops = false;
        wmem.max_band(3); // halo inferences may license actions

        for op in &self.ops {
            if op.kind.op_family() != family || op.pref < pth {
                continue;
            }
            let mc0 = dir.mc;
            if op.find_matches(dir, wmem, mth, family) < 0 {
                break;
            }
            for i in dir.mc..mc0 {
                dir.ops[i] = op.id;
            }
        }

        let n = (OP_MAX - dir.mc) as i32;
        if n > 0 {
            tracing::debug!(matches = n, kind = family.tag(), "operators matched");
        }
        n
    }

    // ------------------------------------------------------------------
    // file functions
    // ------------------------------------------------------------------

    /// Read a list of operators, appending unless `add` is false.
    /// Returns how many were accepted.
    pub fn load(&mut self, path: &Path, add: bool, level: i32) -> Result<usize, KbError> {
        if !add {
            self.ops.clear();
            self.np = 0;
        }
        let text = std::fs::read_to_string(path)?;
        let src = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut input = LineReader::new(text.as_bytes());
        let mut n = 0;
        loop {
            let mut op = Operator::new(DirKind::Do);
            match op.load(&mut input) {
                Ok(true) => {
                    op.lvl = level;
                    if level <= 1 {
                        op.prov = src.clone();
                    }
                    self.add_operator(op);
                    n += 1;
                }
                Ok(false) => break,
                Err(_) => {
                    tracing::warn!(line = input.last(), file = %path.display(), "bad operator syntax");
                    if input.next_blank().is_none() {
                        break;
                    }
                }
            }
        }
        tracing::info!(count = n, file = %path.display(), "action operators loaded");
        Ok(n)
    }

    /// Save operators at or above some level.
    pub fn save(&self, path: &Path, level: i32) -> Result<usize, KbError> {
        let mut out = String::new();
        let mut cnt = 0;
        if level >= 2 {
            out.push_str("// newly learned operators\n// ========================\n\n");
        }
        for op in &self.ops {
            if op.lvl >= level {
                op.save(&mut out).map_err(|_| KbError::Syntax(0))?;
                out.push_str("\n\n");
                cnt += 1;
            }
        }
        std::fs::write(path, out)?;
        Ok(cnt)
    }

    /// Store preference (and duration) changes relative to loaded values.
    pub fn alterations(&self, path: &Path) -> Result<usize, KbError> {
        let mut out =
            String::from("// learned changes to default operator preferences and durations\n\n");
        let mut na = 0;
        for op in &self.ops {
            if !op.prov.is_empty() && (op.pref != op.pref0 || op.budget() != op.time0) {
                out.push_str(&format!("{} {} = {:4.2}", op.prov, op.pnum, op.pref));
                if op.budget() != op.time0 {
                    out.push_str(&format!(" : {:3.1} + {:3.1}", op.tavg, op.tstd));
                }
                out.push('\n');
                na += 1;
            }
        }
        std::fs::write(path, out)?;
        Ok(na)
    }

    /// Apply preference overrides saved by [`Self::alterations`].
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
            let Some(pf) = input.token().and_then(|t| t.parse::<f64>().ok()) else {
                break;
            };

            // optional timing information after a colon
            let mut dur = None;
            if let Some(colon) = input.token() {
                if colon == ":" {
                    let avg = input.token().and_then(|t| t.parse::<f64>().ok());
                    let plus = input.token();
                    let std = input.token().and_then(|t| t.parse::<f64>().ok());
                    if let (Some(a), Some("+"), Some(s)) = (avg, plus.as_deref(), std) {
                        dur = Some((a, s));
                    } else {
                        break;
                    }
                }
            }
            input.flush();

            for op in &mut self.ops {
                if op.prov == src && op.pnum == num {
                    op.pref = pf;
                    if let Some((a, s)) = dur {
                        op.tavg = a;
                        op.tstd = s;
                    }
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
    use crate::graph::Graphlet;

    fn pickup_op(pref: f64) -> Operator {
        let mut op = Operator::new(DirKind::Do);
        let x = op.pool.make_node("obj", None, 0, 1.0);
        let act = op.pool.make_node("act", Some("pickup"), 0, 1.0);
        op.pool.add_arg(act, "obj", x).unwrap();
        op.sit.cond.add_item(act).unwrap();
        op.sit.cond.add_item(x).unwrap();
        op.pref = pref;

        let mut g = Graphlet::new();
        g.add_item(act).unwrap();
        let mut meth = ChainGraph::new();
        meth.push(crate::act::Payload::Dir(Box::new(Directive::with_key(
            DirKind::Fcn,
            g,
        ))));
        op.meth = Some(meth);
        op
    }

    #[test]
    fn find_ops_fills_slots_by_preference_threshold(){
        let mut wmem = WorkingMemory::new();
        let obj = wmem.make_node("obj", None, 0, 1.0);
        let act = wmem.make_node("act", Some("pickup"), 0, 1.0);
        wmem.add_arg(act, "obj", obj).unwrap();
        for id in [obj, act] {
            let n = wmem.node_mut(id).unwrap();
            n.reveal();
            n.set_belief(1.0);
        }

        let mut pm = OperatorMemory::new();
        pm.add_operator(pickup_op(0.8));
        pm.add_operator(pickup_op(0.6));
        pm.add_operator(pickup_op(0.3)); // below threshold

        let mut key = Graphlet::new();
        key.add_item(act).unwrap();
        key.add_item(obj).unwrap();
        let mut dir = Directive::with_key(DirKind::Do, key);

        let n = pm.find_ops(&mut dir, &mut wmem, 0.5, 0.5, DirKind::Do);
        assert_eq!(n, 2);
        let ids: Vec<u32> = (dir.mc..OP_MAX).map(|i| dir.ops[i]).collect();
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
        assert!(!ids.contains(&3));
    }

    #[test]
    fn overrides_round_trip() {
        let dirb = tempfile::tempdir().unwrap();
        let path = dirb.path().join("kb0.pref");

        let mut pm = OperatorMemory::new();
        let mut op = pickup_op(0.8);
        op.prov = "kb0".to_string();
        op.pnum = 4;
        op.pref0 = 0.8;
        pm.add_operator(op);

        // tweak then persist the delta
        pm.op_mut(1).unwrap().set_pref(0.95);
        pm.op_mut(1).unwrap().tavg = 12.0;
        pm.op_mut(1).unwrap().tstd = 3.0;
        assert_eq!(pm.alterations(&path).unwrap(), 1);

        // fresh store picks the learned values back up
        let mut pm2 = OperatorMemory::new();
        let mut op2 = pickup_op(0.8);
        op2.prov = "kb0".to_string();
        op2.pnum = 4;
        pm2.add_operator(op2);
        assert_eq!(pm2.overrides(&path).unwrap(), 1);
        assert_eq!(pm2.op(1).unwrap().pref, 0.95);
        assert_eq!(pm2.op(1).unwrap().tavg, 12.0);
    }
}
