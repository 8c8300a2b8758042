//! Chain - Sequence backbone for activities in an FSM graph
//!
//! A chain is an arena of steps. Each step carries exactly one payload (a
//! directive or a play) and up to three outgoing edges: `cont` on success,
//! `alt` on alternate success (CHK false, enumeration exhausted), and
//! `fail`. Jump labels let the text format express loops, so the arena is
//! a graph, not a tree.
//!
//! One `status()` call advances the active path by a single payload step;
//! verdicts are cached per step so control transfers on the next cycle.
//! Failure inside the dither window unwinds to the nearest backstop (the
//! most recent FIND/BIND with a concrete guess) to try another binding.

use std::io::Read;

use chrono::{DateTime, Utc};

use crate::act::directive::Directive;
use crate::act::play::Play;
use crate::act::{ALT, DONE, FAIL};
use crate::core::Core;
use crate::graph::{Bindings, Graphlet, NodePool};
use crate::kb::{KbError, LineReader, TransTable};

pub type StepId = usize;

// ============================================================================
// PAYLOAD
// ============================================================================

/// What a step actually runs.
#[derive(Default)]
pub enum Payload {
    /// Structural placeholder while a step is being built or borrowed.
    #[default]
    Empty,
    Dir(Box<Directive>),
    Play(Play),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

// ============================================================================
// STEP
// ============================================================================

/// One node of the chain graph plus its execution state.
#[derive(Default)]
pub struct Step {
    pub payload: Payload,
    pub cont: Option<StepId>,
    pub alt: Option<StepId>,
    pub fail: Option<StepId>,
    /// A missing alt edge fails (true) or counts as alternate success.
    pub alt_fail: bool,

    // execution state
    pub done: i32,
    pub prev: i32,
    /// Enumeration mode: 2 on terminal steps of a generator method.
    pub spew: i32,
    pub backstop: Option<StepId>,

    // label scratch used by traversal and the text format
    pub idx: i32,
}

impl Step {
    fn new(payload: Payload) -> Self {
        Self {
            payload,
            alt_fail: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// CHAIN GRAPH
// ============================================================================

/// Arena of steps with a designated start, plus the variable scoping that
/// FIND bindings thread through subsequent steps.
#[derive(Default)]
pub struct ChainGraph {
    pub steps: Vec<Step>,
    pub start: StepId,
    pub scoping: Bindings,
    pub level: i32,
    mt0: Option<DateTime<Utc>>,
}

impl ChainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-step chain around one directive.
    pub fn solo(dir: Directive) -> Self {
        let mut g = Self::new();
        g.push(Payload::Dir(Box::new(dir)));
        g
    }

    pub fn push(&mut self, payload: Payload) -> StepId {
        self.steps.push(Step::new(payload));
        self.steps.len() - 1
    }

    pub fn step(&self, s: StepId) -> &Step {
        &self.steps[s]
    }

    pub fn step_mut(&mut self, s: StepId) -> &mut Step {
        &mut self.steps[s]
    }

    /// Directive payload of the start step, if that is what it holds.
    pub fn dir(&self) -> Option<&Directive> {
        match &self.steps.get(self.start)?.payload {
            Payload::Dir(d) => Some(d),
            _ => None,
        }
    }

    pub fn dir_mut(&mut self) -> Option<&mut Directive> {
        match &mut self.steps.get_mut(self.start)?.payload {
            Payload::Dir(d) => Some(d),
            _ => None,
        }
    }

    /// Last step of the normal continuation path.
    pub fn last(&self) -> StepId {
        let mut s = self.start;
        let mut hops = 0;
        while let Some(c) = self.steps[s].cont {
            s = c;
            hops += 1;
            if hops > self.steps.len() {
                break; // looped chain
            }
        }
        s
    }

    /// Append a step on the end of the normal continuation path.
    pub fn append(&mut self, payload: Payload) -> StepId {
        let id = self.push(payload);
        if id > 0 {
            let tail = self.last();
            if tail != id {
                self.steps[tail].cont = Some(id);
            }
        }
        id
    }

    /// Whether some node appears in any directive of the graph.
    pub fn involves(&self, pool: &NodePool, item: crate::graph::NodeId) -> bool {
        self.steps.iter().any(|s| match &s.payload {
            Payload::Dir(d) => d.involves(pool, item),
            _ => false,
        })
    }

    /// Keep every referenced node during garbage collection.
    pub fn mark_seeds(&self, wmem: &mut crate::memory::WorkingMemory) {
        for s in &self.steps {
            if let Payload::Dir(d) = &s.payload {
                d.mark_seeds(wmem);
            }
        }
    }

    /// Force terminal steps to act as generators: a method for an
    /// enumerating FIND restarts after success instead of finishing.
    pub fn enumerate(&mut self) {
        for i in 0..self.steps.len() {
            let s = &self.steps[i];
            let terminal = s.cont.is_none() && s.alt.is_none() && s.fail.is_none();
            self.steps[i].spew = if terminal { 2 } else { 1 };
        }
    }

    /// Elapsed seconds since the chain started.
    pub fn elapsed(&self, now: DateTime<Utc>) -> f64 {
        match self.mt0 {
            Some(t) => (now - t).num_milliseconds() as f64 / 1000.0,
            None => 0.0,
        }
    }

    pub fn started(&self) -> bool {
        self.mt0.is_some()
    }

    // ------------------------------------------------------------------
    // instantiation
    // ------------------------------------------------------------------

    /// Copy this template, instantiating every directive key into working
    /// memory through the bindings. Edges and play membership carry over
    /// index-for-index; description nodes shared between steps map to one
    /// new working-memory node.
    pub fn instantiate(
        &self,
        wmem: &mut crate::memory::WorkingMemory,
        pool: &NodePool,
        b: &Bindings,
    ) -> Result<ChainGraph, crate::graph::GraphError> {
        let mut shared = b.clone();
        let mut out = ChainGraph::new();
        out.start = self.start;
        out.level = self.level;
        for s in &self.steps {
            let payload = match &s.payload {
                Payload::Empty => Payload::Empty,
                Payload::Dir(d) => {
                    Payload::Dir(Box::new(d.instantiate_shared(wmem, pool, &mut shared)?))
                }
                Payload::Play(p) => Payload::Play(Play {
                    req: p.req.clone(),
                    simul: p.simul.clone(),
                    status: vec![-1; p.req.len()],
                    gstat: vec![-1; p.simul.len()],
                    verdict: -1,
                }),
            };
            let id = out.push(payload);
            out.steps[id].cont = s.cont;
            out.steps[id].alt = s.alt;
            out.steps[id].fail = s.fail;
            out.steps[id].alt_fail = s.alt_fail;
            out.steps[id].spew = s.spew;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // execution
    // ------------------------------------------------------------------

    /// Start processing from the head of the chain.
    pub fn start(&mut self, core: &mut Core, lvl: i32) -> i32 {
        self.level = lvl.abs();
        self.mt0 = Some(core.now());
        self.scoping.clear();
        for s in &mut self.steps {
            s.done = 0;
            s.prev = 0;
            s.backstop = None;
        }
        self.start_step(core, self.start, None)
    }

    pub(crate) fn start_step(&mut self, core: &mut Core, sid: StepId, prior: Option<StepId>) -> i32 {
        // a FIND/BIND with a concrete guess becomes the backstop
        if let Some(p) = prior {
            let concrete = match &self.steps[p].payload {
                Payload::Dir(d) => d.concrete_find(),
                _ => false,
            };
            self.steps[sid].backstop = if concrete {
                Some(p)
            } else {
                self.steps[p].backstop
            };
        }
        self.steps[sid].prev = 0;
        self.start_payload(core, sid)
    }

    fn start_payload(&mut self, core: &mut Core, sid: StepId) -> i32 {
        let mut payload = std::mem::take(&mut self.steps[sid].payload);
        let verdict = match &mut payload {
            Payload::Dir(d) => d.start(core, &self.scoping, self.level),
            Payload::Play(p) => {
                p.verdict = 0;
                0
            }
            Payload::Empty => DONE,
        };
        self.steps[sid].payload = payload;
        let v = if verdict == 0 && matches!(self.steps[sid].payload, Payload::Play(_)) {
            self.play_start(core, sid)
        } else {
            verdict
        };
        self.steps[sid].done = v;
        v
    }

    /// Continue running the chain: one payload advance along the active
    /// path. Returns 1/2 done, 0 working, -2 fail, -3 hard fail.
    pub fn status(&mut self, core: &mut Core) -> i32 {
        self.step_status(core, self.start)
    }

    pub(crate) fn step_status(&mut self, core: &mut Core, sid: StepId) -> i32 {
        let first = self.steps[sid].prev == 0;
        self.steps[sid].prev = self.steps[sid].done;
        let done = self.steps[sid].done;

        // see if activation should be passed to the next step
        if done == DONE {
            if let Some(c) = self.steps[sid].cont {
                return if first {
                    self.start_step(core, c, Some(sid))
                } else {
                    self.step_status(core, c)
                };
            }
        }
        if done == ALT {
            if let Some(a) = self.steps[sid].alt {
                return if first {
                    self.start_step(core, a, Some(sid))
                } else {
                    self.step_status(core, a)
                };
            }
            return if self.steps[sid].alt_fail { FAIL } else { ALT };
        }
        if done == FAIL {
            if let Some(f) = self.steps[sid].fail {
                return if first {
                    self.start_step(core, f, Some(sid))
                } else {
                    self.step_status(core, f)
                };
            }
        }

        // run the payload if still active
        if done == 0 {
            let mut v = self.run_payload(core, sid);

            // record any fresh FIND binding into the scoping
            if v == DONE {
                if let Payload::Dir(d) = &mut self.steps[sid].payload {
                    if let Some((key, mate)) = d.take_found() {
                        let _ = self.scoping.bind(key, mate);
                    }
                }
            }
            self.steps[sid].done = v;

            // payload failure inside the dither window unwinds to the
            // most recent FIND to try an alternative binding
            if v == FAIL {
                if let Some(b) = self.steps[sid].backstop {
                    let secs = self.elapsed(core.now());
                    if secs <= core.config().dither {
                        tracing::debug!(secs, "unwind and retry recent guess");
                        self.scoping.pop();
                        if let Payload::Dir(d) = &mut self.steps[b].payload {
                            d.prepare_retry();
                        }
                        self.steps[b].prev = 0;
                        let v2 = self.start_payload(core, b);
                        self.steps[b].done = v2;
                        return 0;
                    }
                }
            }

            // a generator FIND restarts to produce the next variant
            if v == DONE && self.steps[sid].spew >= 2 {
                let is_generator = match &self.steps[sid].payload {
                    Payload::Dir(d) => d.kind.is_find(),
                    _ => false,
                };
                if is_generator {
                    tracing::debug!("generate next variant");
                    self.scoping.pop();
                    if let Payload::Dir(d) = &mut self.steps[sid].payload {
                        d.prepare_retry();
                    }
                    return self.start_payload(core, sid);
                }
            }

            // control transfers on the next cycle
            if (v == DONE && self.steps[sid].cont.is_some())
                || (v == ALT && self.steps[sid].alt.is_some())
                || (v == FAIL && self.steps[sid].fail.is_some())
            {
                return 0;
            }
            if v == ALT && self.steps[sid].alt.is_none() && self.steps[sid].alt_fail {
                v = FAIL;
                self.steps[sid].done = v;
            }
            return v;
        }

        done
    }

    fn run_payload(&mut self, core: &mut Core, sid: StepId) -> i32 {
        let is_play = matches!(self.steps[sid].payload, Payload::Play(_));
        if is_play {
            return self.play_status(core, sid);
        }
        let mut payload = std::mem::take(&mut self.steps[sid].payload);
        let v = match &mut payload {
            Payload::Dir(d) => d.status(core),
            Payload::Empty => DONE,
            Payload::Play(_) => unreachable!(),
        };
        self.steps[sid].payload = payload;
        v
    }

    /// Courtesy signal that the whole chain is no longer needed.
    pub fn stop(&mut self, core: &mut Core) -> i32 {
        self.stop_step(core, self.start)
    }

    pub(crate) fn stop_step(&mut self, core: &mut Core, sid: StepId) -> i32 {
        let done = self.steps[sid].done;
        if done == DONE {
            if let Some(c) = self.steps[sid].cont {
                return self.stop_step(core, c);
            }
        } else if done == ALT {
            if let Some(a) = self.steps[sid].alt {
                return self.stop_step(core, a);
            }
        } else if done == FAIL {
            if let Some(f) = self.steps[sid].fail {
                return self.stop_step(core, f);
            }
        }
        if done == 0 {
            let is_play = matches!(self.steps[sid].payload, Payload::Play(_));
            if is_play {
                let (req, simul, status, gstat) = match &self.steps[sid].payload {
                    Payload::Play(p) => (
                        p.req.clone(),
                        p.simul.clone(),
                        p.status.clone(),
                        p.gstat.clone(),
                    ),
                    _ => unreachable!(),
                };
                self.stop_children(core, &req, &simul, &status, &gstat);
            } else {
                let mut payload = std::mem::take(&mut self.steps[sid].payload);
                if let Payload::Dir(d) = &mut payload {
                    d.stop(core);
                }
                self.steps[sid].payload = payload;
            }
            self.steps[sid].done = -1;
        }
        self.steps[sid].done
    }

    /// Look for in-progress activities matching the description along the
    /// active path, optionally stopping them.
    pub fn find_active(&mut self, core: &mut Core, desc: &Graphlet, halt: bool) -> bool {
        self.find_active_step(core, self.start, desc, halt, 0)
    }

    fn find_active_step(
        &mut self,
        core: &mut Core,
        sid: StepId,
        desc: &Graphlet,
        halt: bool,
        depth: usize,
    ) -> bool {
        if depth > self.steps.len() {
            return false;
        }
        let done = self.steps[sid].done;
        if done == 0 {
            let is_play = matches!(self.steps[sid].payload, Payload::Play(_));
            if is_play {
                let (req, simul, status, gstat) = match &self.steps[sid].payload {
                    Payload::Play(p) => (
                        p.req.clone(),
                        p.simul.clone(),
                        p.status.clone(),
                        p.gstat.clone(),
                    ),
                    _ => unreachable!(),
                };
                let mut hit = false;
                for (i, r) in req.iter().enumerate() {
                    if status.get(i).copied().unwrap_or(-1) == 0
                        && self.find_active_step(core, *r, desc, halt, depth + 1)
                    {
                        hit = true;
                    }
                }
                for (i, g) in simul.iter().enumerate() {
                    if gstat.get(i).copied().unwrap_or(-1) == 0
                        && self.find_active_step(core, *g, desc, halt, depth + 1)
                    {
                        hit = true;
                    }
                }
                return hit;
            }
            let mut payload = std::mem::take(&mut self.steps[sid].payload);
            let hit = match &mut payload {
                Payload::Dir(d) => d.find_active(core, desc, halt),
                _ => false,
            };
            self.steps[sid].payload = payload;
            return hit;
        }
        let next = match done {
            1 => self.steps[sid].cont,
            2 => self.steps[sid].alt,
            -2 => self.steps[sid].fail,
            _ => None,
        };
        match next {
            Some(n) => self.find_active_step(core, n, desc, halt, depth + 1),
            None => false,
        }
    }

    /// Saved verdict of the start step.
    pub fn verdict(&self) -> i32 {
        self.steps.get(self.start).map(|s| s.done).unwrap_or(0)
    }

    /// Maximum method-nesting depth along the active path.
    pub fn max_depth(&self) -> usize {
        self.depth_from(self.start, 0)
    }

    fn depth_from(&self, sid: StepId, hops: usize) -> usize {
        if hops > self.steps.len() {
            return 1;
        }
        let s = &self.steps[sid];
        match s.done {
            0 => match &s.payload {
                Payload::Dir(d) => {
                    1 + d.meth.as_ref().map(|m| m.max_depth()).unwrap_or(0)
                }
                Payload::Play(p) => p
                    .req
                    .iter()
                    .chain(p.simul.iter())
                    .map(|r| self.depth_from(*r, hops + 1))
                    .max()
                    .unwrap_or(1),
                Payload::Empty => 1,
            },
            1 => s
                .cont
                .map(|c| self.depth_from(c, hops + 1))
                .unwrap_or(1),
            2 => s.alt.map(|a| self.depth_from(a, hops + 1)).unwrap_or(1),
            -2 => s
                .fail
                .map(|f| self.depth_from(f, hops + 1))
                .unwrap_or(1),
            _ => 1,
        }
    }

    /// Number of simultaneous activities on the active path. With `leaf`
    /// only directives doing actual work count, not pass-throughs.
    pub fn num_goals(&self, leaf: bool) -> usize {
        self.goals_from(self.start, leaf, 0)
    }

    fn goals_from(&self, sid: StepId, leaf: bool, hops: usize) -> usize {
        if hops > self.steps.len() {
            return 0;
        }
        let s = &self.steps[sid];
        match s.done {
            0 => match &s.payload {
                Payload::Dir(d) => match &d.meth {
                    Some(m) => {
                        let below = m.num_goals(leaf);
                        if leaf { below } else { 1 + below }
                    }
                    None => 1,
                },
                Payload::Play(p) => p
                    .req
                    .iter()
                    .chain(p.simul.iter())
                    .map(|r| self.goals_from(*r, leaf, hops + 1))
                    .sum(),
                Payload::Empty => 0,
            },
            1 => s
                .cont
                .map(|c| self.goals_from(c, leaf, hops + 1))
                .unwrap_or(0),
            2 => s
                .alt
                .map(|a| self.goals_from(a, leaf, hops + 1))
                .unwrap_or(0),
            -2 => s
                .fail
                .map(|f| self.goals_from(f, leaf, hops + 1))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Follow saved verdicts to the directive that actually failed.
    pub fn failed_dir(&self) -> Option<&Directive> {
        let mut sid = self.start;
        let mut hops = 0;
        loop {
            hops += 1;
            if hops > 2 * self.steps.len() + 2 {
                return None; // looping
            }
            let s = &self.steps[sid];
            match s.done {
                v if v < 0 => {
                    // a retried branch that later advanced is not to blame
                    match &s.payload {
                        Payload::Dir(d) => return Some(d),
                        Payload::Play(p) => return self.play_prob(p),
                        Payload::Empty => return None,
                    }
                }
                0 => return None, // still running
                2 => sid = s.alt?,
                _ => sid = s.cont?,
            }
        }
    }

    /// First failing activity within a play: failed required steps first,
    /// then terminated guards, then the last step executed.
    fn play_prob(&self, play: &Play) -> Option<&Directive> {
        for (i, r) in play.req.iter().enumerate() {
            if play.status.get(i).copied().unwrap_or(0) < 0 {
                if let Some(d) = self.failed_from(*r) {
                    return Some(d);
                }
            }
        }
        for (i, g) in play.simul.iter().enumerate() {
            if play.gstat.get(i).copied().unwrap_or(0) != 0 {
                if let Some(d) = self.failed_from(*g) {
                    return Some(d);
                }
                // otherwise blame the last thing done on that branch
                if let Some(d) = self.last_dir_from(*g) {
                    return Some(d);
                }
            }
        }
        None
    }

    fn failed_from(&self, start: StepId) -> Option<&Directive> {
        let mut sid = start;
        let mut hops = 0;
        loop {
            hops += 1;
            if hops > 2 * self.steps.len() + 2 {
                return None;
            }
            let s = &self.steps[sid];
            match s.done {
                v if v < 0 => match &s.payload {
                    Payload::Dir(d) => return Some(d),
                    Payload::Play(p) => return self.play_prob(p),
                    Payload::Empty => return None,
                },
                0 => return None,
                2 => sid = s.alt?,
                _ => sid = s.cont?,
            }
        }
    }

    fn last_dir_from(&self, start: StepId) -> Option<&Directive> {
        let mut sid = start;
        let mut hops = 0;
        let mut last = None;
        loop {
            hops += 1;
            if hops > 2 * self.steps.len() + 2 {
                break;
            }
            let s = &self.steps[sid];
            if let Payload::Dir(d) = &s.payload {
                last = Some(&**d);
            }
            let next = match s.done {
                2 => s.alt,
                1 => s.cont,
                _ => None,
            };
            match next {
                Some(n) => sid = n,
                None => break,
            }
        }
        last
    }

    // ------------------------------------------------------------------
    // reading
    // ------------------------------------------------------------------

    /// Read a chain at the current file position. Steps are listed in
    /// continuation order; `~~~ N` labels a step, `@ N` jumps the normal
    /// continuation, `% N` the alternate, `# N` the failure path, and
    /// `...` terminates a branch. Plays open with `>>>`, separate required
    /// activities with `+++`, guards with `===`, and close with `<<<`.
    pub fn load<R: Read>(
        pool: &mut NodePool,
        trans: &mut TransTable,
        input: &mut LineReader<R>,
    ) -> Result<ChainGraph, KbError> {
        let mut g = ChainGraph::new();
        let mut labels: [Option<StepId>; 100] = [None; 100];
        let mut fixes: Vec<(StepId, i32, i32, i32)> = Vec::new(); // (step, cont, alt, fail)
        if input.next_content().is_none() {
            return Err(KbError::Syntax(input.last()));
        }
        let start = g.build_chain(pool, trans, input, &mut labels, &mut fixes, 0)?;
        g.start = start;

        // substitute real steps for the numbered jumps
        for (sid, cnum, anum, fnum) in fixes {
            if cnum > 0 {
                g.steps[sid].cont = labels[cnum as usize];
                if g.steps[sid].cont.is_none() {
                    return Err(KbError::Syntax(input.last()));
                }
            }
            if anum > 0 {
                g.steps[sid].alt = labels[anum as usize];
            }
            if fnum > 0 {
                g.steps[sid].fail = labels[fnum as usize];
                if g.steps[sid].fail.is_none() {
                    return Err(KbError::Syntax(input.last()));
                }
            }
        }
        Ok(g)
    }

    /// Parse one sequential branch, returning its first step.
    /// `depth` > 0 inside a play body.
    #[allow(clippy::too_many_arguments)]
    fn build_chain<R: Read>(
        &mut self,
        pool: &mut NodePool,
        trans: &mut TransTable,
        input: &mut LineReader<R>,
        labels: &mut [Option<StepId>; 100],
        fixes: &mut Vec<(StepId, i32, i32, i32)>,
        depth: usize,
    ) -> Result<StepId, KbError> {
        let mut head: Option<StepId> = None;
        let mut prev: Option<StepId> = None;

        loop {
            if input.next(false).is_none() || input.blank() {
                break;
            }
            if depth > 0 && (input.begins("+++") || input.begins("===") || input.begins("<<<")) {
                break;
            }

            // label for the step about to be read
            let mut label: Option<usize> = None;
            if input.begins("~~~") {
                input.skip("~~~");
                let num = input
                    .token()
                    .and_then(|t| t.parse::<usize>().ok())
                    .filter(|n| *n > 0 && *n < 100)
                    .ok_or(KbError::Syntax(input.last()))?;
                label = Some(num);
                input.flush();
                if input.next_content().is_none() {
                    return Err(KbError::Syntax(input.last()));
                }
            }

            // payload: play body or directive
            let sid = if input.begins(">>>") {
                input.flush();
                self.load_play(pool, trans, input, labels, fixes, depth + 1)?
            } else {
                let d = Directive::load(pool, trans, input)?;
                self.push(Payload::Dir(Box::new(d)))
            };
            if let Some(num) = label {
                labels[num] = Some(sid);
                self.steps[sid].idx = -(num as i32);
            }
            if head.is_none() {
                head = Some(sid);
            }
            if let Some(p) = prev {
                if self.steps[p].cont.is_none() {
                    self.steps[p].cont = Some(sid);
                }
            }
            prev = Some(sid);

            // trailing jump markers for this step (alt, fail, cont, end)
            let mut stop = false;
            let (mut cnum, mut anum, mut fnum) = (0i32, 0i32, 0i32);
            loop {
                if input.next(false).is_none() || input.blank() {
                    stop = true;
                    break;
                }
                if input.begins("%") {
                    input.skip("%");
                    if input.begins("...") {
                        self.steps[sid].alt_fail = false;
                        input.flush();
                    } else {
                        anum = input
                            .token()
                            .and_then(|t| t.parse::<i32>().ok())
                            .filter(|n| *n > 0 && *n < 100)
                            .ok_or(KbError::Syntax(input.last()))?;
                        input.flush();
                    }
                } else if input.begins("#") {
                    input.skip("#");
                    fnum = input
                        .token()
                        .and_then(|t| t.parse::<i32>().ok())
                        .filter(|n| *n > 0 && *n < 100)
                        .ok_or(KbError::Syntax(input.last()))?;
                    input.flush();
                } else if input.begins("@") {
                    input.skip("@");
                    cnum = input
                        .token()
                        .and_then(|t| t.parse::<i32>().ok())
                        .filter(|n| *n > 0 && *n < 100)
                        .ok_or(KbError::Syntax(input.last()))?;
                    input.flush();
                } else if input.begins("...") {
                    stop = true;
                    input.flush();
                } else {
                    break;
                }
            }
            if cnum > 0 || anum > 0 || fnum > 0 {
                fixes.push((sid, cnum, anum, fnum));
            }
            if cnum > 0 || stop {
                prev = None; // continuation resolved by jump or ended
            }
            if stop {
                // a labeled alternate branch may still follow the end mark
                if input.next(false).is_none() || input.blank() || !input.begins("~~~") {
                    break;
                }
            }
        }
        head.ok_or(KbError::Syntax(input.last()))
    }

    /// Parse the body of a play (after `>>>`), returning its step.
    #[allow(clippy::too_many_arguments)]
    fn load_play<R: Read>(
        &mut self,
        pool: &mut NodePool,
        trans: &mut TransTable,
        input: &mut LineReader<R>,
        labels: &mut [Option<StepId>; 100],
        fixes: &mut Vec<(StepId, i32, i32, i32)>,
        depth: usize,
    ) -> Result<StepId, KbError> {
        let mut play = Play::new();
        let mut guard = false;
        loop {
            if input.next_content().is_none() {
                break;
            }
            if input.begins("<<<") {
                input.flush();
                break;
            }
            if input.begins("+++") {
                guard = false;
                input.flush();
                continue;
            }
            if input.begins("===") {
                guard = true;
                input.flush();
                continue;
            }
            let branch = self.build_chain(pool, trans, input, labels, fixes, depth)?;
            let ok = if guard {
                play.add_simul(branch)
            } else {
                play.add_req(branch)
            };
            if !ok {
                return Err(KbError::Syntax(input.last()));
            }
        }
        Ok(self.push(Payload::Play(play)))
    }

    // ------------------------------------------------------------------
    // writing
    // ------------------------------------------------------------------

    /// Write the chain in machine readable form.
    pub fn save(&self, pool: &NodePool, out: &mut String, lvl: usize) -> std::fmt::Result {
        use std::fmt::Write;

        // number every reachable step; negative = jump target
        let mut order: Vec<StepId> = Vec::new();
        let mut num = vec![0i32; self.steps.len()];
        self.number_steps(self.start, &mut order, &mut num);
        self.mark_jump_targets(&order, &mut num);

        let mut emitted = vec![false; self.steps.len()];
        let mut pending: Vec<StepId> = vec![self.start];
        while let Some(head) = pending.pop() {
            if emitted[head] {
                continue;
            }
            let mut sid = Some(head);
            while let Some(s) = sid {
                if emitted[s] {
                    writeln!(out, "{:lvl$}   @ {}", "", num[s].abs())?;
                    break;
                }
                emitted[s] = true;
                if num[s] < 0 {
                    writeln!(out, "{:lvl$} ~~~ {}", "", -num[s])?;
                }
                self.save_step(pool, out, s, lvl, &mut pending, &num, &emitted)?;
                let step = &self.steps[s];
                match step.cont {
                    Some(c) => sid = Some(c),
                    None => {
                        writeln!(out, "{:lvl$} ...", "")?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn save_step(
        &self,
        pool: &NodePool,
        out: &mut String,
        s: StepId,
        lvl: usize,
        pending: &mut Vec<StepId>,
        num: &[i32],
        emitted: &[bool],
    ) -> std::fmt::Result {
        use std::fmt::Write;
        match &self.steps[s].payload {
            Payload::Dir(d) => d.save(pool, out, lvl)?,
            Payload::Play(p) => {
                writeln!(out, "{:lvl$} >>>", "")?;
                for (i, r) in p.req.iter().enumerate() {
                    if i > 0 {
                        writeln!(out, "{:lvl$} +++", "")?;
                    }
                    self.save_branch(pool, out, *r, lvl + 2, pending, num, emitted)?;
                }
                for g in &p.simul {
                    writeln!(out, "{:lvl$} ===", "")?;
                    self.save_branch(pool, out, *g, lvl + 2, pending, num, emitted)?;
                }
                writeln!(out, "{:lvl$} <<<", "")?;
            }
            Payload::Empty => {}
        }
        if let Some(a) = self.steps[s].alt {
            writeln!(out, "{:lvl$}   % {}", "", num[a].abs())?;
            pending.push(a);
        }
        if let Some(f) = self.steps[s].fail {
            writeln!(out, "{:lvl$}   # {}", "", num[f].abs())?;
            pending.push(f);
        }
        Ok(())
    }

    fn save_branch(
        &self,
        pool: &NodePool,
        out: &mut String,
        head: StepId,
        lvl: usize,
        pending: &mut Vec<StepId>,
        num: &[i32],
        _emitted: &[bool],
    ) -> std::fmt::Result {
        use std::fmt::Write;
        let mut sid = Some(head);
        let mut seen = 0;
        while let Some(s) = sid {
            seen += 1;
            if seen > self.steps.len() {
                break;
            }
            if num[s] < 0 {
                writeln!(out, "{:lvl$} ~~~ {}", "", -num[s])?;
            }
            self.save_step(pool, out, s, lvl, pending, num, &[])?;
            sid = self.steps[s].cont;
        }
        Ok(())
    }

    fn number_steps(&self, sid: StepId, order: &mut Vec<StepId>, num: &mut [i32]) {
        if num[sid] != 0 {
            return;
        }
        num[sid] = order.len() as i32 + 1;
        order.push(sid);
        if let Payload::Play(p) = &self.steps[sid].payload {
            for r in p.req.iter().chain(p.simul.iter()) {
                self.number_steps(*r, order, num);
            }
        }
        if let Some(c) = self.steps[sid].cont {
            self.number_steps(c, order, num);
        }
        if let Some(a) = self.steps[sid].alt {
            self.number_steps(a, order, num);
        }
        if let Some(f) = self.steps[sid].fail {
            self.number_steps(f, order, num);
        }
    }

    fn mark_jump_targets(&self, order: &[StepId], num: &mut [i32]) {
        for (pos, sid) in order.iter().enumerate() {
            let expect = pos as i32 + 2; // label of the naturally next step
            if let Some(c) = self.steps[*sid].cont {
                if num[c].abs() != expect {
                    num[c] = -num[c].abs();
                }
            }
            if let Some(a) = self.steps[*sid].alt {
                num[a] = -num[a].abs();
            }
            if let Some(f) = self.steps[*sid].fail {
                num[f] = -num[f].abs();
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
