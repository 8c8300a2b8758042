//! Knowledge File Format
//!
//! Line-oriented reader/writer for the bespoke knowledge format: rule and
//! operator files, chain dumps, and the graphlet elements inside them.
//! Comments start with `//` or `;` and run to end of line. A graphlet
//! element is a `kind-id` header, optionally followed by descriptor lines
//! (`-lex-`, `-str-`, `-neg-`, `-ach-`, `-ext-`, `-blf-`, `-tag-`) and
//! labeled arrow lines (`-slot-> kind-id`).
//!
//! Saving and loading are round-trip stable: node numbers are reassigned
//! but structure, terms, beliefs, and tags survive unchanged.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Read};

use crate::graph::{Graphlet, NodeId, NodeList, NodePool, TAG_STR};

/// Failures while reading knowledge files.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad syntax at line {0}")]
    Syntax(usize),

    #[error("structure error: {0}")]
    Graph(#[from] crate::graph::GraphError),
}

pub type Result<T> = std::result::Result<T, KbError>;

// ============================================================================
// LINE READER
// ============================================================================

/// Utilities for chopping apart lines of a knowledge file.
///
/// Keeps one current line which callers consume piecewise; `next(true)`
/// forces a fresh line while `next(false)` re-uses any remainder.
pub struct LineReader<R> {
    input: BufReader<R>,
    line: Option<String>,
    read: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
            line: None,
            read: 0,
        }
    }

    /// Number of the most recently read line.
    pub fn last(&self) -> usize {
        self.read
    }

    /// Remainder of the current line (leading whitespace stripped).
    pub fn head(&self) -> Option<&str> {
        self.line.as_deref()
    }

    pub fn blank(&self) -> bool {
        self.line.as_deref().map_or(true, |l| l.trim().is_empty())
    }

    /// Whether the current line looks like a clause tag (`xxx:` or `---`).
    pub fn tag_line(&self) -> bool {
        let Some(l) = self.line.as_deref() else {
            return false;
        };
        if l.starts_with("---") {
            return true;
        }
        l.split_whitespace()
            .next()
            .map_or(false, |w| w.ends_with(':'))
    }

    /// Cleaned-up next line: strips comments and leading whitespace.
    /// Re-uses the current remainder unless `force` is set.
    /// Returns None at end of file.
    pub fn next(&mut self, force: bool) -> Option<&str> {
        if !force && self.line.is_some() {
            return self.head();
        }
        self.line = None;
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = self.input.read_line(&mut buf).ok()?;
            if n == 0 {
                return None;
            }
            self.read += 1;
            let mut s = buf.trim_end_matches(['\n', '\r']).to_string();
            let had_comment = strip_comment(&mut s);
            let trimmed = s.trim_start().to_string();
            if trimmed.is_empty() && had_comment {
                continue; // full-line comment
            }
            self.line = Some(trimmed);
            return self.head();
        }
    }

    /// Advance to the next non-blank line (could be the current one).
    pub fn next_content(&mut self) -> Option<&str> {
        self.next(false)?;
        while self.blank() {
            self.next(true)?;
        }
        self.head()
    }

    /// Advance to the next blank line (skipping malformed content).
    pub fn next_blank(&mut self) -> Option<&str> {
        self.next(false)?;
        while !self.blank() {
            self.next(true)?;
        }
        self.head()
    }

    /// Consume the current line entirely.
    pub fn flush(&mut self) {
        self.line = None;
    }

    /// Whether the current line begins with the given text.
    pub fn begins(&self, tag: &str) -> bool {
        self.line.as_deref().map_or(false, |l| l.starts_with(tag))
    }

    /// Strip a known prefix (plus following whitespace) off the line.
    pub fn skip(&mut self, tag: &str) {
        if let Some(l) = self.line.take() {
            let rest = l.strip_prefix(tag).unwrap_or(&l).trim_start().to_string();
            self.line = Some(rest);
        }
    }

    /// Extract the next whitespace-delimited token from the current line.
    pub fn token(&mut self) -> Option<String> {
        let l = self.line.take()?;
        let trimmed = l.trim_start();
        if trimmed.is_empty() {
            self.line = Some(String::new());
            return None;
        }
        let end = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        let tok = trimmed[..end].to_string();
        self.line = Some(trimmed[end..].trim_start().to_string());
        Some(tok)
    }
}

fn strip_comment(s: &mut String) -> bool {
    let semi = s.find(';');
    let slash = s.find("//");
    let cut = match (semi, slash) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    if let Some(c) = cut {
        s.truncate(c);
        return true;
    }
    false
}

// ============================================================================
// NODE NAME TRANSLATION
// ============================================================================

/// Maps `kind-id` names from a file to freshly numbered local nodes.
#[derive(Default)]
pub struct TransTable {
    map: HashMap<String, NodeId>,
}

impl TransTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Node already associated with a name, or a fresh one in the pool.
    pub fn find(&mut self, pool: &mut NodePool, name: &str) -> NodeId {
        self.find_fresh(pool, name).0
    }

    /// Like [`Self::find`] but reports whether the node was newly created.
    /// Only fresh nodes join the graphlet being loaded, so clauses that
    /// mention earlier nodes do not recount them.
    pub fn find_fresh(&mut self, pool: &mut NodePool, name: &str) -> (NodeId, bool) {
        if let Some(id) = self.map.get(name) {
            return (*id, false);
        }
        let kind = extract_kind(name);
        let id = pool.make_node(kind, None, 0, -1.0);
        self.map.insert(name.to_string(), id);
        (id, true)
    }
}

/// Strip the numeric instance suffix off a `kind-id` name.
fn extract_kind(name: &str) -> &str {
    if let Some(pos) = name.rfind(['-', '+']) {
        if name[pos + 1..].chars().all(|c| c.is_ascii_digit()) && pos > 0 {
            return &name[..pos];
        }
    }
    name
}

// ============================================================================
// GRAPHLET READING
// ============================================================================

/// Read one graphlet element block from the current position. Stops at a
/// blank line or the next clause tag. New nodes are created hidden and
/// pending (actualized later by the caller as appropriate).
pub fn load_graph<R: Read>(
    pool: &mut NodePool,
    trans: &mut TransTable,
    input: &mut LineReader<R>,
) -> Result<Graphlet> {
    let mut g = Graphlet::new();
    let mut topic: Option<NodeId> = None;

    loop {
        if input.next(false).is_none() {
            break;
        }
        if input.blank() {
            if g.is_empty() {
                // residue of the clause tag line: content starts below
                input.flush();
                if input.next(true).is_none() {
                    break;
                }
                continue;
            }
            break;
        }
        if input.tag_line() {
            if g.is_empty() {
                return Err(KbError::Syntax(input.last()));
            }
            break;
        }

        // optional leading node name establishes the current topic
        let first = match input.token() {
            Some(t) => t,
            None => {
                input.flush();
                continue;
            }
        };
        let (desc, node) = if first.starts_with('-') {
            (first, topic)
        } else {
            let (id, fresh) = trans.find_fresh(pool, &first);
            if fresh {
                g.add_item(id)?;
            }
            topic = Some(id);
            match input.token() {
                Some(d) => (d, topic),
                None => {
                    input.flush();
                    continue;
                }
            }
        };
        let Some(node) = node else {
            return Err(KbError::Syntax(input.last()));
        };

        // one descriptor (possibly multi-word) finishes the line
        match desc.as_str() {
            "-lex-" => {
                let word = input.head().unwrap_or("").trim().to_string();
                pool.set_lex(node, &word);
            }
            "-str-" => {
                let txt = input.head().unwrap_or("").trim().to_string();
                if let Some(n) = pool.node_mut(node) {
                    n.set_literal(Some(&txt));
                }
            }
            "-neg-" => {
                let v = input.token().and_then(|t| t.parse::<i32>().ok());
                if let Some(n) = pool.node_mut(node) {
                    n.set_neg(v.unwrap_or(1));
                }
            }
            "-ach-" => {
                let v = input
                    .token()
                    .and_then(|t| t.parse::<i32>().ok())
                    .ok_or(KbError::Syntax(input.last()))?;
                if let Some(n) = pool.node_mut(node) {
                    n.set_done(1);
                    n.set_neg(if v == 0 { 1 } else { 0 });
                }
            }
            "-ext-" => {
                let _ = input.token();
                if let Some(n) = pool.node_mut(node) {
                    n.tmp_belief(0.0);
                }
            }
            "-blf-" => {
                let v = input
                    .token()
                    .and_then(|t| t.parse::<f64>().ok())
                    .ok_or(KbError::Syntax(input.last()))?;
                if let Some(n) = pool.node_mut(node) {
                    n.set_default(v);
                }
            }
            "-tag-" => {
                let mut bits = 0u32;
                while let Some(t) = input.token() {
                    if let Some(i) = TAG_STR.iter().position(|s| *s == t) {
                        bits |= 1 << i;
                    }
                }
                if let Some(n) = pool.node_mut(node) {
                    n.tags |= bits;
                }
            }
            other => {
                // labeled arrow: -slot-> kind-id
                let slot = other
                    .strip_prefix('-')
                    .and_then(|s| s.strip_suffix("->"))
                    .ok_or(KbError::Syntax(input.last()))?;
                let tgt = input.token().ok_or(KbError::Syntax(input.last()))?;
                let (val, fresh) = trans.find_fresh(pool, &tgt);
                if fresh {
                    g.add_item(val)?;
                }
                pool.add_arg(node, slot, val)?;
            }
        }
        input.flush();
    }
    if g.is_empty() {
        return Err(KbError::Syntax(input.last()));
    }
    Ok(g)
}

// ============================================================================
// GRAPHLET WRITING
// ============================================================================

/// Field widths used to line up node names and arrows.
fn txt_sizes(store: &dyn NodeList, g: &Graphlet) -> (usize, usize, usize) {
    let (mut k, mut n, mut r) = (2usize, 1usize, 3usize);
    for id in g.items() {
        if let Some(nd) = store.get(id) {
            k = k.max(nd.kind().len());
            n = n.max(nd.id().num().abs().to_string().len());
            for a in nd.args_view() {
                if let Some(v) = store.get(a.val) {
                    k = k.max(v.kind().len());
                    n = n.max(v.id().num().abs().to_string().len());
                }
                r = r.max(a.slot.len());
            }
        }
    }
    (k, n, r)
}

fn bfmt(val: f64) -> String {
    if val == 0.0 {
        "0".to_string()
    } else {
        format!("{:6.4}", val)
    }
}

/// Write one graphlet element block. A negative `lvl` writes the first
/// node inline (continuing the caller's line); later nodes start at the
/// magnitude. `detail`: 0 bare, 1 default belief, 2 belief + tags,
/// negative variants list the current belief instead.
pub fn write_graphlet(
    out: &mut String,
    store: &dyn NodeList,
    g: &Graphlet,
    lvl: i32,
    detail: i32,
) -> std::fmt::Result {
    if g.is_empty() {
        return Ok(());
    }
    let (k, n, r) = txt_sizes(store, g);
    let mut first = lvl < 0;
    let base = lvl.unsigned_abs() as usize;

    for (i, id) in g.items().enumerate() {
        let Some(nd) = store.get(id) else { continue };
        // naked objects are mentioned only where they appear as arguments
        let shown = i == 0
            || nd.has_literal()
            || nd.num_args() > 0
            || nd.lex().is_some()
            || nd.neg() > 0
            || nd.done() > 0
            || (nd.tags != 0 && detail.abs() >= 2);
        if !shown {
            continue;
        }

        if !first {
            write!(out, "\n{:base$}", "")?;
        }
        first = false;
        let name = nd.nick();
        write!(out, "{name:>width$}", width = k + n + 1)?;
        let indent = base + k + n + 1;
        let mut ln = 0;

        let mut fresh = |out: &mut String, ln: &mut usize| -> std::fmt::Result {
            if *ln > 0 {
                write!(out, "\n{:indent$}", "")?;
            }
            *ln += 1;
            Ok(())
        };

        if let Some(w) = nd.lex() {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$} {}", "-lex-", w, pad = r + 3)?;
        }
        if let Some(q) = nd.literal() {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$} {}", "-str-", q, pad = r + 3)?;
        }
        if nd.done() > 0 {
            fresh(out, &mut ln)?;
            let ach = if nd.neg() > 0 { 0 } else { 1 };
            write!(out, " {:<pad$} {}", "-ach-", ach, pad = r + 3)?;
        } else if nd.neg() > 0 {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$} 1", "-neg-", pad = r + 3)?;
        }
        if detail < 0 && nd.belief() <= 0.0 {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$} 0", "-ext-", pad = r + 3)?;
            if nd.default_belief() != 1.0 {
                fresh(out, &mut ln)?;
                write!(out, " {:<pad$} {}", "-blf-", bfmt(nd.default_belief()), pad = r + 3)?;
            }
        } else if detail < 0 && nd.belief() != 1.0 && !nd.has_literal() {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$} {}", "-blf-", bfmt(nd.belief()), pad = r + 3)?;
        } else if detail > 0 && nd.default_belief() != 1.0 {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$} {}", "-blf-", bfmt(nd.default_belief()), pad = r + 3)?;
        }
        if detail.abs() >= 2 && nd.tags != 0 {
            fresh(out, &mut ln)?;
            write!(out, " {:<pad$}", "-tag-", pad = r + 3)?;
            for (b, s) in TAG_STR.iter().enumerate() {
                if nd.tags & (1 << b) != 0 {
                    write!(out, " {s}")?;
                }
            }
        }

        // labeled arrows to argument nodes
        for a in nd.args_view() {
            fresh(out, &mut ln)?;
            let arrow = format!("-{:-<rr$}>", a.slot, rr = r + 1);
            let tgt = store.get(a.val).map(|v| v.nick()).unwrap_or_default();
            write!(out, " {arrow} {tgt}")?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
