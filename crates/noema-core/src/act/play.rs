//! Play - Group of coordinated activities run in parallel
//!
//! A play bundles required chains with simultaneous guard chains. All
//! required activities must succeed for the play to succeed; any guard
//! terminating (either way) or any required activity failing spoils the
//! whole play, and everything still running is stopped. The member chains
//! are steps of the enclosing graph, so the execution walk lives on
//! [`ChainGraph`].

use crate::act::chain::{ChainGraph, Payload, StepId};
use crate::act::{DONE, FAIL};
use crate::core::Core;

/// Maximum required or guard activities in one play.
pub const PLAY_MAX: usize = 10;

// ============================================================================
// PLAY
// ============================================================================

/// Parallel composition: all required chains must succeed; any guard
/// terminating (either way) fails the whole play.
#[derive(Default)]
pub struct Play {
    pub req: Vec<StepId>,
    pub simul: Vec<StepId>,
    pub status: Vec<i32>,
    pub gstat: Vec<i32>,
    pub verdict: i32,
}

impl Play {
    pub fn new() -> Self {
        Self {
            verdict: -1,
            ..Default::default()
        }
    }

    /// Add an activity to the set that must be accomplished.
    pub fn add_req(&mut self, s: StepId) -> bool {
        if self.req.len() >= PLAY_MAX {
            return false;
        }
        self.req.push(s);
        self.status.push(-1);
        true
    }

    /// Add an activity that runs in parallel with the main goals.
    pub fn add_simul(&mut self, s: StepId) -> bool {
        if self.simul.len() >= PLAY_MAX {
            return false;
        }
        self.simul.push(s);
        self.gstat.push(-1);
        true
    }
}

// ============================================================================
// EXECUTION (walks steps of the enclosing graph)
// ============================================================================

impl ChainGraph {
    /// Start every member of the play at `sid`: guards first, then the
    /// required activities. Any immediate failure fails the whole set.
    pub(crate) fn play_start(&mut self, core: &mut Core, sid: StepId) -> i32 {
        let (req, simul) = match &self.steps[sid].payload {
            Payload::Play(p) => (p.req.clone(), p.simul.clone()),
            _ => return FAIL,
        };
        let mut gstat = Vec::with_capacity(simul.len());
        for g in &simul {
            gstat.push(self.start_step(core, *g, None));
        }
        let mut status = Vec::with_capacity(req.len());
        for r in &req {
            status.push(self.start_step(core, *r, None));
        }
        let bad = gstat.iter().chain(status.iter()).any(|v| *v < 0);
        if bad {
            self.stop_children(core, &req, &simul, &status, &gstat);
        }
        if let Payload::Play(p) = &mut self.steps[sid].payload {
            p.gstat = gstat;
            p.status = status;
            p.verdict = if bad { FAIL } else { 0 };
            return p.verdict;
        }
        FAIL
    }

    /// One advance of the play at `sid`. Guards run first and spoil the
    /// set by terminating at all; required activities spoil it by failing;
    /// success needs every required activity done.
    pub(crate) fn play_status(&mut self, core: &mut Core, sid: StepId) -> i32 {
        let (req, simul, mut status, mut gstat) = match &self.steps[sid].payload {
            Payload::Play(p) => (
                p.req.clone(),
                p.simul.clone(),
                p.status.clone(),
                p.gstat.clone(),
            ),
            _ => return FAIL,
        };

        // any guard terminating (either way) spoils the play
        let mut verdict = 0;
        for (i, g) in simul.iter().enumerate() {
            if gstat[i] == 0 {
                gstat[i] = self.step_status(core, *g);
                if gstat[i] != 0 {
                    verdict = FAIL;
                }
            }
        }

        // run all required activities that have not finished
        if verdict == 0 {
            for (i, r) in req.iter().enumerate() {
                if status[i] == 0 {
                    status[i] = self.step_status(core, *r);
                    if status[i] < 0 {
                        verdict = FAIL;
                    }
                }
            }
        }

        // done only when every required activity is done
        if verdict == 0 && status.iter().all(|v| *v != 0) {
            verdict = DONE;
        }

        if verdict != 0 {
            self.stop_children(core, &req, &simul, &status, &gstat);
        }
        if let Payload::Play(p) = &mut self.steps[sid].payload {
            p.status = status;
            p.gstat = gstat;
            p.verdict = verdict;
        }
        verdict
    }

    /// Courtesy stop for every member still running.
    pub(crate) fn stop_children(
        &mut self,
        core: &mut Core,
        req: &[StepId],
        simul: &[StepId],
        status: &[i32],
        gstat: &[i32],
    ) {
        for (i, g) in simul.iter().enumerate() {
            if gstat[i] == 0 {
                self.stop_step(core, *g);
            }
        }
        for (i, r) in req.iter().enumerate() {
            if status[i] == 0 {
                self.stop_step(core, *r);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::act::directive::{DirKind, Directive};
    use crate::graph::Graphlet;

    /// NOTE directive over a fresh act node (finishes on first status).
    fn note_dir(core: &mut Core, word: &str) -> Directive {
        let n = core.wmem.make_node("act", Some(word), 0, -1.0);
        let mut g = Graphlet::new();
        g.add_item(n).unwrap();
        Directive::with_key(DirKind::Note, g)
    }

    /// KEEP directive whose condition never becomes false (runs forever).
    fn vigil_dir(core: &mut Core) -> Directive {
        let n = core.wmem.make_node("act", Some("vigil"), 0, -1.0);
        let mut g = Graphlet::new();
        g.add_item(n).unwrap();
        Directive::with_key(DirKind::Keep, g)
    }

    fn run(core: &mut Core, ch: &mut ChainGraph) -> i32 {
        let mut v = ch.start(core, 0);
        for _ in 0..12 {
            if v != 0 {
                break;
            }
            v = ch.status(core);
        }
        v
    }

    #[test]
    fn all_required_succeeding_completes_the_play() {
        let mut core = Core::new();
        let mut ch = ChainGraph::new();
        let s1 = ch.push(Payload::Dir(Box::new(note_dir(&mut core, "wave"))));
        let s2 = ch.push(Payload::Dir(Box::new(note_dir(&mut core, "smile"))));
        let mut play = Play::new();
        assert!(play.add_req(s1));
        assert!(play.add_req(s2));
        let p = ch.push(Payload::Play(play));
        ch.start = p;

        assert_eq!(run(&mut core, &mut ch), DONE);
        assert_eq!(ch.step(s1).done, 1);
        assert_eq!(ch.step(s2).done, 1);
        match &ch.step(p).payload {
            Payload::Play(pl) => assert_eq!(pl.verdict, DONE),
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn guard_termination_spoils_the_play() {
        let mut core = Core::new();
        let mut ch = ChainGraph::new();
        // required work never finishes on its own; the guard does
        let slow = ch.push(Payload::Dir(Box::new(vigil_dir(&mut core))));
        let guard = ch.push(Payload::Dir(Box::new(note_dir(&mut core, "blink"))));
        let mut play = Play::new();
        assert!(play.add_req(slow));
        assert!(play.add_simul(guard));
        let p = ch.push(Payload::Play(play));
        ch.start = p;

        // the guard finishing (a success!) still fails the whole set
        assert_eq!(run(&mut core, &mut ch), FAIL);
        assert_eq!(ch.step(guard).done, 1);
        assert_eq!(ch.step(slow).done, -1); // stopped, not failed
        match &ch.step(p).payload {
            Payload::Play(pl) => assert_eq!(pl.verdict, FAIL),
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn required_failure_fails_the_play() {
        let mut core = Core::new();
        let mut ch = ChainGraph::new();
        let ok = ch.push(Payload::Dir(Box::new(note_dir(&mut core, "wave"))));
        let bad = ch.push(Payload::Dir(Box::new(Directive::new(DirKind::Punt))));
        let mut play = Play::new();
        assert!(play.add_req(ok));
        assert!(play.add_req(bad));
        let p = ch.push(Payload::Play(play));
        ch.start = p;

        assert_eq!(run(&mut core, &mut ch), FAIL);
    }

    #[test]
    fn member_lists_are_capacity_bounded() {
        let mut play = Play::new();
        for s in 0..PLAY_MAX {
            assert!(play.add_req(s));
            assert!(play.add_simul(s));
        }
        assert!(!play.add_req(99));
        assert!(!play.add_simul(99));
        assert_eq!(play.req.len(), PLAY_MAX);
        assert_eq!(play.simul.len(), PLAY_MAX);
    }
}
