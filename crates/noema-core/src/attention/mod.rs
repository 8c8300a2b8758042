//! Attention Tree - Fixed-capacity ring of attentional foci
//!
//! Each focus wraps one chain (a goal or a posted assertion) with its
//! service bookkeeping: priority weight from method preference, a recency
//! boost so newly stacked items outrank older peers of equal weight, a
//! serviced-this-cycle mark for fairness, and an activation stamp that
//! drives retirement of finished work.
//!
//! Service order is newest-first: the scheduler scans down from the top
//! of the ring picking each unmarked live focus exactly once per cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::act::ChainGraph;
use crate::graph::Graphlet;

/// Maximum simultaneous attentional foci.
pub const FOCUS_MAX: usize = 30;

/// One attentional entry.
pub struct Focus {
    /// Stable identity that survives ring compaction.
    pub serial: u64,
    pub chain: ChainGraph,
    pub done: bool,
    pub mark: bool,
    /// Importance weight copied from the winning method preference.
    pub wt: f64,
    /// Recency boost: newer unfinished items rank above older ones.
    pub boost: i32,
    /// When the payload first had a cycle (None = never run).
    pub active: Option<DateTime<Utc>>,
    /// When the focus finished (retirement timer).
    pub finished: Option<DateTime<Utc>>,
    /// Explicit error description attached by failure reporting.
    pub err: Graphlet,
}

/// Focus summary for host inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusStats {
    pub index: usize,
    pub bid: i32,
    pub done: bool,
    pub age_secs: f64,
}

/// Cycle-local feedback about how well halo predictions fared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mood {
    /// Net signed confidence adjustment applied to rules.
    pub rule_adj: f64,
    /// Predictions that agreed with newly asserted facts.
    pub hit: usize,
    /// Predictions contradicted by newly asserted facts.
    pub miss: usize,
    /// Largest surprise encountered this cycle.
    pub surprise: f64,
}

impl Mood {
    pub fn rule_adjust(&mut self, chg: f64) {
        self.rule_adj += chg;
    }

    pub fn rule_eval(&mut self, hit: usize, miss: usize, surp: f64) {
        self.hit += hit;
        self.miss += miss;
        self.surprise = self.surprise.max(surp);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// ACTION TREE
// ============================================================================

/// Holder of attentional foci and their scheduling state.
#[derive(Default)]
pub struct ActionTree {
    foci: Vec<Focus>,
    /// Ring length at the start of the cycle: items added mid-cycle are
    /// not serviced until the next one.
    chock: usize,
    svc: Option<usize>,
    next_serial: u64,
}

impl ActionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_foci(&self) -> usize {
        self.foci.len()
    }

    /// How many foci are still live (omits finished ones).
    pub fn active(&self) -> usize {
        self.foci.iter().filter(|f| !f.done).count()
    }

    /// Maximum subgoal depth across all live foci.
    pub fn max_depth(&self) -> usize {
        self.foci
            .iter()
            .filter(|f| !f.done)
            .map(|f| f.chain.max_depth())
            .max()
            .unwrap_or(0)
    }

    /// Number of activities (possibly subgoaled) across all live foci.
    pub fn num_goals(&self, leaf: bool) -> usize {
        self.foci
            .iter()
            .filter(|f| !f.done)
            .map(|f| f.chain.num_goals(leaf))
            .sum()
    }

    pub fn focus(&self, n: usize) -> Option<&Focus> {
        self.foci.get(n)
    }

    pub fn focus_mut(&mut self, n: usize) -> Option<&mut Focus> {
        self.foci.get_mut(n)
    }

    /// Whether the chain has never been started.
    pub fn never_run(&self, n: usize) -> bool {
        self.foci
            .get(n)
            .map(|f| !f.done && f.active.is_none())
            .unwrap_or(false)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Vec<FocusStats> {
        self.foci
            .iter()
            .enumerate()
            .map(|(i, f)| FocusStats {
                index: i,
                bid: self.base_bid(i),
                done: f.done,
                age_secs: f
                    .active
                    .map(|t| (now - t).num_milliseconds() as f64 / 1000.0)
                    .unwrap_or(0.0),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // list manipulation
    // ------------------------------------------------------------------

    /// Add a chain onto the ring with some importance. When full, the
    /// oldest finished focus is dropped to make room. Returns the index,
    /// or None when every slot holds live work.
    pub fn add_focus(&mut self, chain: ChainGraph, pref: f64, now: DateTime<Utc>) -> Option<usize> {
        if self.foci.len() >= FOCUS_MAX && !self.drop_oldest(now) {
            tracing::warn!("more than {FOCUS_MAX} foci, new focus refused");
            return None;
        }

        // newly added items rank above older unfinished peers
        let boost = self
            .foci
            .iter()
            .rev()
            .find(|f| !f.done)
            .map(|f| f.boost + 1)
            .unwrap_or(0);

        self.next_serial += 1;
        self.foci.push(Focus {
            serial: self.next_serial,
            chain,
            done: false,
            mark: false,
            wt: pref,
            boost,
            active: None,
            finished: None,
            err: Graphlet::new(),
        });
        let idx = self.foci.len() - 1;
        tracing::info!(focus = idx, "new active focus");
        Some(idx)
    }

    fn drop_oldest(&mut self, now: DateTime<Utc>) -> bool {
        let oldest = self
            .foci
            .iter()
            .enumerate()
            .filter(|(_, f)| f.done)
            .max_by_key(|(_, f)| {
                f.active
                    .map(|t| (now - t).num_milliseconds())
                    .unwrap_or(i64::MAX)
            })
            .map(|(i, _)| i);
        match oldest {
            Some(i) => {
                self.rem_compact(i);
                true
            }
            None => false,
        }
    }

    fn rem_compact(&mut self, n: usize) {
        tracing::debug!(focus = n, "removing inactive focus");
        self.foci.remove(n);
        if self.chock > n {
            self.chock -= 1;
        }
        if let Some(s) = self.svc {
            if s > n {
                self.svc = Some(s - 1);
            } else if s == n {
                self.svc = None;
            }
        }
    }

    /// Remove all foci.
    pub fn clr_foci(&mut self) {
        self.foci.clear();
        self.chock = 0;
        self.svc = None;
    }

    // ------------------------------------------------------------------
    // scheduling
    // ------------------------------------------------------------------

    /// Start-of-cycle maintenance: retire finished foci past the timer,
    /// clear service marks, and freeze the serviceable ring length.
    /// Returns the number of serviceable foci.
    pub fn prune(&mut self, now: DateTime<Utc>, retire_secs: f64) -> usize {
        let mut i = 0;
        while i < self.foci.len() {
            let expire = {
                let f = &self.foci[i];
                f.done
                    && f.finished
                        .map(|t| (now - t).num_milliseconds() as f64 / 1000.0 > retire_secs)
                        .unwrap_or(true)
            };
            if expire {
                self.rem_compact(i);
            } else {
                self.foci[i].mark = false;
                i += 1;
            }
        }
        self.chock = self.foci.len();
        self.chock
    }

    /// Index of the next newest unserviced live focus; marks it used.
    pub fn next_focus(&mut self) -> Option<usize> {
        let pick = (0..self.chock)
            .rev()
            .find(|i| !self.foci[*i].mark && !self.foci[*i].done);
        if let Some(i) = pick {
            self.foci[i].mark = true;
        }
        self.svc = pick;
        pick
    }

    /// Focus currently being serviced.
    pub fn service(&self) -> Option<usize> {
        self.svc
    }

    /// Priority bid: weight plus a slight boost for recency.
    pub fn base_bid(&self, n: usize) -> i32 {
        self.foci
            .get(n)
            .map(|f| (1000.0 * f.wt).round() as i32 + f.boost)
            .unwrap_or(0)
    }

    /// Update the serviced focus weight to the preference of the method
    /// that just fired. Returns its refreshed bid.
    pub fn service_wt(&mut self, pref: f64) -> i32 {
        let Some(s) = self.svc else { return 0 };
        if let Some(f) = self.foci.get_mut(s) {
            f.wt = pref;
        }
        self.base_bid(s)
    }

    /// Stamp the serviced focus as running (first cycle) or finished.
    pub fn set_active(&mut self, n: usize, now: DateTime<Utc>, running: bool) {
        let Some(f) = self.foci.get_mut(n) else { return };
        if running {
            if f.active.is_none() {
                f.active = Some(now);
            }
        } else {
            f.done = true;
            f.finished = Some(now);
        }
    }

    /// Error description attached to the serviced focus.
    pub fn error(&self) -> Option<&Graphlet> {
        let s = self.svc?;
        let f = self.foci.get(s)?;
        if f.err.is_empty() { None } else { Some(&f.err) }
    }

    pub fn set_error(&mut self, g: Graphlet) {
        if let Some(s) = self.svc {
            if let Some(f) = self.foci.get_mut(s) {
                tracing::info!(focus = s, "recording main task failure reason");
                f.err = g;
            }
        }
    }

    // ------------------------------------------------------------------
    // chain custody during service
    // ------------------------------------------------------------------

    /// Borrow a focus chain out for servicing (the ring keeps an empty
    /// placeholder until it is returned).
    pub fn take_chain(&mut self, n: usize) -> ChainGraph {
        std::mem::take(&mut self.foci[n].chain)
    }

    pub fn put_chain(&mut self, n: usize, chain: ChainGraph) {
        self.foci[n].chain = chain;
    }

    /// Stable identity of a slot (indices shift when the ring compacts).
    pub fn serial_of(&self, n: usize) -> Option<u64> {
        self.foci.get(n).map(|f| f.serial)
    }

    /// Current index of a focus by its stable identity.
    pub fn index_of(&self, serial: u64) -> Option<usize> {
        self.foci.iter().position(|f| f.serial == serial)
    }

    /// Mark every node referenced by any focus (and its error graphlet)
    /// as a garbage collection seed.
    pub fn mark_seeds(&self, wmem: &mut crate::memory::WorkingMemory) {
        for f in &self.foci {
            f.chain.mark_seeds(wmem);
            for id in f.err.items() {
                if let Some(n) = wmem.node_mut(id) {
                    n.set_keep(1);
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
