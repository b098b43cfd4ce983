//! Maximum-weight matching over the final preference universe
//!
//! Every pair of students is a candidate edge weighted by [`edge_weight`], so the
//! graph is complete and general (odd cycles are common). The matching is found
//! with Edmonds' blossom algorithm in its primal-dual O(n³) form. Weights are
//! multiples of 0.5 and are handled as integer half-points, so optimality never
//! depends on floating-point tolerance.
//!
//! The time budget is checked at every stage boundary, where the current matching
//! is always valid.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::scoring::{edge_half_points, edge_weight};
use crate::models::{Matching, Pair, PreferenceMap, Solution, SolveStatus};

/// Errors that can occur while solving
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("Solve exceeded its {limit:?} time limit")]
    TimedOut { limit: Duration },

    #[error("Solve was cancelled")]
    Cancelled,

    #[error("Weight of pair ({a}, {b}) overflowed")]
    WeightOverflow { a: String, b: String },

    #[error("Solver reached an inconsistent state: {0}")]
    Inconsistent(String),
}

fn fault(msg: &str) -> SolveError {
    SolveError::Inconsistent(msg.to_string())
}

/// What to do when the time limit runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Return the best matching found so far, flagged `BestEffort`
    #[default]
    BestEffort,
    /// Return `SolveError::TimedOut`
    Fail,
}

/// Solver settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolverConfig {
    /// Wall-clock budget per solve; unlimited when absent
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

/// Shared flag for abandoning an in-flight solve from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Finds the pairing with the highest total mutual preference
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn solve(&self, preferences: &PreferenceMap) -> Result<Solution, SolveError> {
        self.solve_with_cancel(preferences, &CancelToken::new())
    }

    /// Solve, stopping early if `cancel` is triggered
    pub fn solve_with_cancel(
        &self,
        preferences: &PreferenceMap,
        cancel: &CancelToken,
    ) -> Result<Solution, SolveError> {
        let nodes: Vec<&str> = preferences
            .iter()
            .flat_map(|(student, choices)| {
                std::iter::once(student.as_str()).chain(choices.iter().map(String::as_str))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if nodes.len() < 2 {
            return Ok(Solution::empty());
        }

        let mut edges = Vec::with_capacity(nodes.len() * (nodes.len() - 1) / 2);
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let weight = edge_half_points(preferences, nodes[i], nodes[j]).ok_or_else(|| {
                    SolveError::WeightOverflow {
                        a: nodes[i].to_string(),
                        b: nodes[j].to_string(),
                    }
                })?;
                edges.push((i, j, weight));
            }
        }

        let budget = Budget {
            started: Instant::now(),
            limit: self.config.time_limit(),
            cancel,
        };

        let mut state = BlossomState::new(nodes.len(), &edges);
        let interrupted = state.run(&budget)?;
        let mut mates = state.partners();

        let status = match interrupted {
            None => SolveStatus::Optimal,
            Some(Interrupt::Cancelled) => return Err(SolveError::Cancelled),
            Some(Interrupt::TimedOut(limit)) => match self.config.on_timeout {
                TimeoutPolicy::Fail => return Err(SolveError::TimedOut { limit }),
                TimeoutPolicy::BestEffort => {
                    tracing::warn!(
                        "Pairing solve hit its {:?} limit, completing greedily from {} pairs",
                        limit,
                        mates.iter().flatten().count() / 2
                    );
                    fill_greedily(&mut mates, &edges);
                    SolveStatus::BestEffort
                }
            },
        };

        let matching = to_matching(&nodes, &mates)?;
        let total_weight = matching
            .pairs
            .iter()
            .map(|p| edge_weight(preferences, &p.first, &p.second))
            .sum();

        tracing::info!(
            "Solved pairing for {} students: {} pairs, weight {} ({:?}) in {:?}",
            nodes.len(),
            matching.len(),
            total_weight,
            status,
            budget.started.elapsed()
        );

        Ok(Solution { matching, total_weight, status })
    }
}

/// Solve with default settings (no time limit)
pub fn solve_pairing(preferences: &PreferenceMap) -> Result<Solution, SolveError> {
    Solver::default().solve(preferences)
}

fn to_matching(nodes: &[&str], mates: &[Option<usize>]) -> Result<Matching, SolveError> {
    let mut pairs = Vec::new();
    for (v, mate) in mates.iter().enumerate() {
        let Some(u) = *mate else { continue };
        if u == v || mates.get(u).copied().flatten() != Some(v) {
            return Err(fault("matching is not symmetric"));
        }
        if v < u {
            pairs.push(Pair::new(nodes[v], nodes[u]));
        }
    }
    Ok(Matching::new(pairs))
}

/// Pair leftover vertices by descending weight; only used for best-effort results
fn fill_greedily(mates: &mut [Option<usize>], edges: &[(usize, usize, i64)]) {
    let mut open: Vec<&(usize, usize, i64)> = edges
        .iter()
        .filter(|(i, j, _)| mates[*i].is_none() && mates[*j].is_none())
        .collect();
    open.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (a.0, a.1).cmp(&(b.0, b.1))));

    for &(i, j, _) in open {
        if mates[i].is_none() && mates[j].is_none() {
            mates[i] = Some(j);
            mates[j] = Some(i);
        }
    }
}

enum Interrupt {
    TimedOut(Duration),
    Cancelled,
}

struct Budget<'a> {
    started: Instant,
    limit: Option<Duration>,
    cancel: &'a CancelToken,
}

impl Budget<'_> {
    fn check(&self) -> Option<Interrupt> {
        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => Some(Interrupt::TimedOut(limit)),
            _ => None,
        }
    }
}

const FREE: u8 = 0;
const OUTER: u8 = 1;
const INNER: u8 = 2;
const VISITED: u8 = 4;

/// Index into a blossom's child cycle, wrapping negative offsets
fn wrap(j: isize, len: usize) -> usize {
    j.rem_euclid(len as isize) as usize
}

/// Primal-dual state of the blossom algorithm
///
/// Vertices are `0..n`, non-trivial blossoms `n..2n`. Edge `k` has endpoints `2k`
/// and `2k + 1`; `endpoint[p]` is the vertex at endpoint `p` and `p ^ 1` is the
/// opposite end. Labels: `OUTER` (S), `INNER` (T), `FREE`.
struct BlossomState<'a> {
    n: usize,
    edges: &'a [(usize, usize, i64)],
    endpoint: Vec<usize>,
    neighbend: Vec<Vec<usize>>,
    /// Remote endpoint of each vertex's matched edge
    mate: Vec<Option<usize>>,
    label: Vec<u8>,
    label_end: Vec<Option<usize>>,
    in_blossom: Vec<usize>,
    blossom_parent: Vec<Option<usize>>,
    blossom_childs: Vec<Vec<usize>>,
    blossom_base: Vec<Option<usize>>,
    blossom_endps: Vec<Vec<usize>>,
    best_edge: Vec<Option<usize>>,
    blossom_best_edges: Vec<Option<Vec<usize>>>,
    unused_blossoms: Vec<usize>,
    /// Doubled dual variables for vertices, then blossoms
    dual: Vec<i64>,
    allow_edge: Vec<bool>,
    queue: Vec<usize>,
}

impl<'a> BlossomState<'a> {
    fn new(n: usize, edges: &'a [(usize, usize, i64)]) -> Self {
        let max_weight = edges.iter().map(|e| e.2).max().unwrap_or(0).max(0);

        let mut endpoint = Vec::with_capacity(2 * edges.len());
        let mut neighbend = vec![Vec::new(); n];
        for (k, &(i, j, _)) in edges.iter().enumerate() {
            endpoint.push(i);
            endpoint.push(j);
            neighbend[i].push(2 * k + 1);
            neighbend[j].push(2 * k);
        }

        let mut dual = vec![max_weight; n];
        dual.resize(2 * n, 0);

        let mut blossom_base: Vec<Option<usize>> = (0..n).map(Some).collect();
        blossom_base.resize(2 * n, None);

        Self {
            n,
            edges,
            endpoint,
            neighbend,
            mate: vec![None; n],
            label: vec![FREE; 2 * n],
            label_end: vec![None; 2 * n],
            in_blossom: (0..n).collect(),
            blossom_parent: vec![None; 2 * n],
            blossom_childs: vec![Vec::new(); 2 * n],
            blossom_base,
            blossom_endps: vec![Vec::new(); 2 * n],
            best_edge: vec![None; 2 * n],
            blossom_best_edges: vec![None; 2 * n],
            unused_blossoms: (n..2 * n).collect(),
            dual,
            allow_edge: vec![false; edges.len()],
            queue: Vec::new(),
        }
    }

    /// Vertex each vertex is paired with
    fn partners(&self) -> Vec<Option<usize>> {
        self.mate
            .iter()
            .map(|m| m.map(|p| self.endpoint[p]))
            .collect()
    }

    fn slack(&self, k: usize) -> i64 {
        let (i, j, w) = self.edges[k];
        self.dual[i] + self.dual[j] - 2 * w
    }

    fn leaves(&self, b: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![b];
        while let Some(t) = stack.pop() {
            if t < self.n {
                out.push(t);
            } else {
                stack.extend(self.blossom_childs[t].iter().rev());
            }
        }
        out
    }

    fn base_of(&self, b: usize) -> Result<usize, SolveError> {
        self.blossom_base[b].ok_or_else(|| fault("blossom has no base"))
    }

    /// Label `w` and its top-level blossom; an inner label also labels the base's mate outer
    fn assign_label(&mut self, w: usize, t: u8, p: Option<usize>) -> Result<(), SolveError> {
        let (mut w, mut t, mut p) = (w, t, p);
        loop {
            let b = self.in_blossom[w];
            debug_assert!(self.label[w] == FREE && self.label[b] == FREE);
            self.label[w] = t;
            self.label[b] = t;
            self.label_end[w] = p;
            self.label_end[b] = p;
            self.best_edge[w] = None;
            self.best_edge[b] = None;

            if t == OUTER {
                let leaves = self.leaves(b);
                self.queue.extend(leaves);
                return Ok(());
            }

            let base = self.base_of(b)?;
            let mate = self.mate[base].ok_or_else(|| fault("inner blossom base is unmatched"))?;
            w = self.endpoint[mate];
            t = OUTER;
            p = Some(mate ^ 1);
        }
    }

    /// Trace back from `v` and `w`; returns the base of a new blossom, or `None`
    /// when the two paths reach different roots (an augmenting path)
    fn scan_blossom(&mut self, v: usize, w: usize) -> Result<Option<usize>, SolveError> {
        let mut path = Vec::new();
        let mut base = None;
        let (mut v, mut w) = (Some(v), Some(w));

        while let Some(cur) = v {
            let b = self.in_blossom[cur];
            if self.label[b] & VISITED != 0 {
                base = self.blossom_base[b];
                break;
            }
            path.push(b);
            self.label[b] = OUTER | VISITED;

            v = match self.label_end[b] {
                None => None,
                Some(end) => {
                    let t = self.in_blossom[self.endpoint[end]];
                    let back = self.label_end[t].ok_or_else(|| fault("inner blossom without label end"))?;
                    Some(self.endpoint[back])
                }
            };
            if w.is_some() {
                std::mem::swap(&mut v, &mut w);
            }
        }

        for b in path {
            self.label[b] = OUTER;
        }
        Ok(base)
    }

    /// Shrink the odd cycle closed by edge `k` into a new outer blossom
    fn add_blossom(&mut self, base: usize, k: usize) -> Result<(), SolveError> {
        let (v, w, _) = self.edges[k];
        let bb = self.in_blossom[base];
        let mut bv = self.in_blossom[v];
        let mut bw = self.in_blossom[w];
        let b = self
            .unused_blossoms
            .pop()
            .ok_or_else(|| fault("no free blossom slots"))?;

        self.blossom_base[b] = Some(base);
        self.blossom_parent[b] = None;
        self.blossom_parent[bb] = Some(b);

        let mut path = Vec::new();
        let mut endps = Vec::new();
        while bv != bb {
            self.blossom_parent[bv] = Some(b);
            path.push(bv);
            let end = self.label_end[bv].ok_or_else(|| fault("blossom path broken"))?;
            endps.push(end);
            bv = self.in_blossom[self.endpoint[end]];
        }
        path.push(bb);
        path.reverse();
        endps.reverse();
        endps.push(2 * k);
        while bw != bb {
            self.blossom_parent[bw] = Some(b);
            path.push(bw);
            let end = self.label_end[bw].ok_or_else(|| fault("blossom path broken"))?;
            endps.push(end ^ 1);
            bw = self.in_blossom[self.endpoint[end]];
        }

        self.label[b] = OUTER;
        self.label_end[b] = self.label_end[bb];
        self.dual[b] = 0;
        self.blossom_childs[b] = path.clone();
        self.blossom_endps[b] = endps;

        for leaf in self.leaves(b) {
            if self.label[self.in_blossom[leaf]] == INNER {
                self.queue.push(leaf);
            }
            self.in_blossom[leaf] = b;
        }

        // Least-slack edge from the new blossom to every neighbouring outer blossom
        let mut best_edge_to: Vec<Option<usize>> = vec![None; 2 * self.n];
        for &sub in &path {
            let lists: Vec<Vec<usize>> = match self.blossom_best_edges[sub].take() {
                Some(list) => vec![list],
                None => self
                    .leaves(sub)
                    .into_iter()
                    .map(|leaf| self.neighbend[leaf].iter().map(|p| p / 2).collect())
                    .collect(),
            };
            for k in lists.into_iter().flatten() {
                let (i, j, _) = self.edges[k];
                let j = if self.in_blossom[j] == b { i } else { j };
                let bj = self.in_blossom[j];
                if bj != b
                    && self.label[bj] == OUTER
                    && best_edge_to[bj].map_or(true, |e| self.slack(k) < self.slack(e))
                {
                    best_edge_to[bj] = Some(k);
                }
            }
            self.best_edge[sub] = None;
        }

        let best: Vec<usize> = best_edge_to.into_iter().flatten().collect();
        let mut least = None;
        for &k in &best {
            if least.map_or(true, |e| self.slack(k) < self.slack(e)) {
                least = Some(k);
            }
        }
        self.blossom_best_edges[b] = Some(best);
        self.best_edge[b] = least;
        Ok(())
    }

    /// Dissolve blossom `b`, relabelling its children if it was inner mid-stage
    fn expand_blossom(&mut self, b: usize, end_stage: bool) -> Result<(), SolveError> {
        let childs = self.blossom_childs[b].clone();
        for &s in &childs {
            self.blossom_parent[s] = None;
            if s < self.n {
                self.in_blossom[s] = s;
            } else if end_stage && self.dual[s] == 0 {
                self.expand_blossom(s, end_stage)?;
            } else {
                for leaf in self.leaves(s) {
                    self.in_blossom[leaf] = s;
                }
            }
        }

        if !end_stage && self.label[b] == INNER {
            let len = childs.len();
            let endps = self.blossom_endps[b].clone();
            let entry_end = self.label_end[b].ok_or_else(|| fault("inner blossom without label end"))?;
            let entry_child = self.in_blossom[self.endpoint[entry_end ^ 1]];
            let start = childs
                .iter()
                .position(|&c| c == entry_child)
                .ok_or_else(|| fault("entry child not in blossom"))?;

            // Walk the even-length side of the cycle towards the base
            let mut j = start as isize;
            let (step, trick): (isize, usize) = if start & 1 == 1 {
                j -= len as isize;
                (1, 0)
            } else {
                (-1, 1)
            };
            let back = |j: isize| wrap(j - trick as isize, len);

            let mut p = entry_end;
            while j != 0 {
                self.label[self.endpoint[p ^ 1]] = FREE;
                self.label[self.endpoint[endps[back(j)] ^ trick ^ 1]] = FREE;
                self.assign_label(self.endpoint[p ^ 1], INNER, Some(p))?;
                self.allow_edge[endps[back(j)] / 2] = true;
                j += step;
                p = endps[back(j)] ^ trick;
                self.allow_edge[p / 2] = true;
                j += step;
            }

            // The base child keeps its inner label without passing it to its mate
            let bv = childs[wrap(j, len)];
            let entry = self.endpoint[p ^ 1];
            self.label[entry] = INNER;
            self.label[bv] = INNER;
            self.label_end[entry] = Some(p);
            self.label_end[bv] = Some(p);
            self.best_edge[bv] = None;
            j += step;

            while childs[wrap(j, len)] != entry_child {
                let bv = childs[wrap(j, len)];
                if self.label[bv] == OUTER {
                    j += step;
                    continue;
                }
                let reached = self.leaves(bv).into_iter().find(|&v| self.label[v] != FREE);
                if let Some(v) = reached {
                    debug_assert_eq!(self.label[v], INNER);
                    self.label[v] = FREE;
                    let base = self.base_of(bv)?;
                    let mate = self.mate[base].ok_or_else(|| fault("sub-blossom base is unmatched"))?;
                    self.label[self.endpoint[mate]] = FREE;
                    let end = self.label_end[v];
                    self.assign_label(v, INNER, end)?;
                }
                j += step;
            }
        }

        self.label[b] = FREE;
        self.label_end[b] = None;
        self.blossom_childs[b].clear();
        self.blossom_endps[b].clear();
        self.blossom_base[b] = None;
        self.blossom_best_edges[b] = None;
        self.best_edge[b] = None;
        self.unused_blossoms.push(b);
        Ok(())
    }

    /// Flip matched/unmatched edges along the path from `v` to the base of `b`
    fn augment_blossom(&mut self, b: usize, v: usize) -> Result<(), SolveError> {
        let mut t = v;
        while self.blossom_parent[t] != Some(b) {
            t = self.blossom_parent[t].ok_or_else(|| fault("vertex escaped its blossom"))?;
        }
        if t >= self.n {
            self.augment_blossom(t, v)?;
        }

        let len = self.blossom_childs[b].len();
        let start = self.blossom_childs[b]
            .iter()
            .position(|&c| c == t)
            .ok_or_else(|| fault("child not in blossom"))?;
        let mut j = start as isize;
        let (step, trick): (isize, usize) = if start & 1 == 1 {
            j -= len as isize;
            (1, 0)
        } else {
            (-1, 1)
        };

        while j != 0 {
            j += step;
            let t = self.blossom_childs[b][wrap(j, len)];
            let p = self.blossom_endps[b][wrap(j - trick as isize, len)] ^ trick;
            if t >= self.n {
                self.augment_blossom(t, self.endpoint[p])?;
            }
            j += step;
            let t = self.blossom_childs[b][wrap(j, len)];
            if t >= self.n {
                self.augment_blossom(t, self.endpoint[p ^ 1])?;
            }
            self.mate[self.endpoint[p]] = Some(p ^ 1);
            self.mate[self.endpoint[p ^ 1]] = Some(p);
        }

        self.blossom_childs[b].rotate_left(start);
        self.blossom_endps[b].rotate_left(start);
        self.blossom_base[b] = self.blossom_base[self.blossom_childs[b][0]];
        debug_assert_eq!(self.blossom_base[b], Some(v));
        Ok(())
    }

    /// Augment along the path through edge `k` joining two outer trees
    fn augment_matching(&mut self, k: usize) -> Result<(), SolveError> {
        let (v, w, _) = self.edges[k];
        for (mut s, mut p) in [(v, 2 * k + 1), (w, 2 * k)] {
            loop {
                let bs = self.in_blossom[s];
                debug_assert_eq!(self.label[bs], OUTER);
                if bs >= self.n {
                    self.augment_blossom(bs, s)?;
                }
                self.mate[s] = Some(p);

                let Some(end) = self.label_end[bs] else { break };
                let bt = self.in_blossom[self.endpoint[end]];
                let back = self.label_end[bt].ok_or_else(|| fault("inner blossom without label end"))?;
                s = self.endpoint[back];
                let j = self.endpoint[back ^ 1];
                if bt >= self.n {
                    self.augment_blossom(bt, j)?;
                }
                self.mate[j] = Some(back);
                p = back ^ 1;
            }
        }
        Ok(())
    }

    /// Run stages until no augmenting path improves the weight
    ///
    /// Returns the interruption, if the budget ran out between stages.
    fn run(&mut self, budget: &Budget<'_>) -> Result<Option<Interrupt>, SolveError> {
        for _ in 0..self.n {
            if let Some(stop) = budget.check() {
                return Ok(Some(stop));
            }

            self.label.fill(FREE);
            self.best_edge.fill(None);
            for list in &mut self.blossom_best_edges[self.n..] {
                *list = None;
            }
            self.allow_edge.fill(false);
            self.queue.clear();

            for v in 0..self.n {
                if self.mate[v].is_none() && self.label[self.in_blossom[v]] == FREE {
                    self.assign_label(v, OUTER, None)?;
                }
            }

            let mut augmented = false;
            loop {
                while !augmented {
                    let Some(v) = self.queue.pop() else { break };
                    debug_assert_eq!(self.label[self.in_blossom[v]], OUTER);

                    for idx in 0..self.neighbend[v].len() {
                        let p = self.neighbend[v][idx];
                        let k = p / 2;
                        let w = self.endpoint[p];
                        if self.in_blossom[v] == self.in_blossom[w] {
                            continue;
                        }

                        let mut kslack = 0;
                        if !self.allow_edge[k] {
                            kslack = self.slack(k);
                            if kslack <= 0 {
                                self.allow_edge[k] = true;
                            }
                        }

                        if self.allow_edge[k] {
                            match self.label[self.in_blossom[w]] {
                                FREE => self.assign_label(w, INNER, Some(p ^ 1))?,
                                OUTER => match self.scan_blossom(v, w)? {
                                    Some(base) => self.add_blossom(base, k)?,
                                    None => {
                                        self.augment_matching(k)?;
                                        augmented = true;
                                        break;
                                    }
                                },
                                _ => {
                                    if self.label[w] == FREE {
                                        self.label[w] = INNER;
                                        self.label_end[w] = Some(p ^ 1);
                                    }
                                }
                            }
                        } else if self.label[self.in_blossom[w]] == OUTER {
                            let b = self.in_blossom[v];
                            if self.best_edge[b].map_or(true, |e| kslack < self.slack(e)) {
                                self.best_edge[b] = Some(k);
                            }
                        } else if self.label[w] == FREE
                            && self.best_edge[w].map_or(true, |e| kslack < self.slack(e))
                        {
                            self.best_edge[w] = Some(k);
                        }
                    }
                }

                if augmented {
                    break;
                }

                // No tight edge left: pick the smallest dual adjustment
                let mut delta_type = 1;
                let mut delta = self.dual[..self.n].iter().copied().min().unwrap_or(0);
                let mut delta_edge = None;
                let mut delta_blossom = None;

                for v in 0..self.n {
                    if self.label[self.in_blossom[v]] == FREE {
                        if let Some(e) = self.best_edge[v] {
                            let d = self.slack(e);
                            if d < delta {
                                delta = d;
                                delta_type = 2;
                                delta_edge = Some(e);
                            }
                        }
                    }
                }

                for b in 0..2 * self.n {
                    if self.blossom_parent[b].is_none() && self.label[b] == OUTER {
                        if let Some(e) = self.best_edge[b] {
                            let d = self.slack(e) / 2;
                            if d < delta {
                                delta = d;
                                delta_type = 3;
                                delta_edge = Some(e);
                            }
                        }
                    }
                }

                for b in self.n..2 * self.n {
                    if self.blossom_base[b].is_some()
                        && self.blossom_parent[b].is_none()
                        && self.label[b] == INNER
                        && self.dual[b] < delta
                    {
                        delta = self.dual[b];
                        delta_type = 4;
                        delta_blossom = Some(b);
                    }
                }

                for v in 0..self.n {
                    match self.label[self.in_blossom[v]] {
                        OUTER => self.dual[v] -= delta,
                        INNER => self.dual[v] += delta,
                        _ => {}
                    }
                }
                for b in self.n..2 * self.n {
                    if self.blossom_base[b].is_some() && self.blossom_parent[b].is_none() {
                        match self.label[b] {
                            OUTER => self.dual[b] += delta,
                            INNER => self.dual[b] -= delta,
                            _ => {}
                        }
                    }
                }

                match delta_type {
                    1 => break,
                    2 => {
                        let k = delta_edge.ok_or_else(|| fault("missing delta edge"))?;
                        self.allow_edge[k] = true;
                        let (i, j, _) = self.edges[k];
                        let i = if self.label[self.in_blossom[i]] == FREE { j } else { i };
                        self.queue.push(i);
                    }
                    3 => {
                        let k = delta_edge.ok_or_else(|| fault("missing delta edge"))?;
                        self.allow_edge[k] = true;
                        let (i, _, _) = self.edges[k];
                        self.queue.push(i);
                    }
                    _ => {
                        let b = delta_blossom.ok_or_else(|| fault("missing delta blossom"))?;
                        self.expand_blossom(b, false)?;
                    }
                }
            }

            if !augmented {
                break;
            }

            for b in self.n..2 * self.n {
                if self.blossom_parent[b].is_none()
                    && self.blossom_base[b].is_some()
                    && self.label[b] == OUTER
                    && self.dual[b] == 0
                {
                    self.expand_blossom(b, true)?;
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(entries: &[(&str, &[&str])]) -> PreferenceMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    /// Exhaustive optimum over all matchings, in half-points
    fn brute_force(n: usize, weight: &dyn Fn(usize, usize) -> i64) -> i64 {
        fn go(free: &mut Vec<bool>, weight: &dyn Fn(usize, usize) -> i64) -> i64 {
            let Some(i) = free.iter().position(|f| *f) else { return 0 };
            free[i] = false;
            let mut best = go(free, weight);
            for j in (i + 1)..free.len() {
                if free[j] {
                    free[j] = false;
                    best = best.max(weight(i, j) + go(free, weight));
                    free[j] = true;
                }
            }
            free[i] = true;
            best
        }
        go(&mut vec![true; n], weight)
    }

    #[test]
    fn test_camp_scenario() {
        let preferences = prefs(&[
            ("Alice", &["Bob", "Cara"]),
            ("Bob", &["Alice"]),
            ("Cara", &[]),
            ("Dan", &[]),
        ]);

        let solution = solve_pairing(&preferences).unwrap();

        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(
            solution.matching.pairs,
            vec![Pair::new("Alice", "Bob"), Pair::new("Cara", "Dan")]
        );
        assert_eq!(solution.total_weight, 6.0);
    }

    #[test]
    fn test_empty_universe() {
        let solution = solve_pairing(&PreferenceMap::new()).unwrap();
        assert!(solution.matching.is_empty());
        assert_eq!(solution.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_single_student() {
        let solution = solve_pairing(&prefs(&[("Alice", &[])])).unwrap();
        assert!(solution.matching.is_empty());
    }

    #[test]
    fn test_list_only_names_are_nodes() {
        let preferences = prefs(&[("Alice", &["Zara"])]);

        let solution = solve_pairing(&preferences).unwrap();

        assert_eq!(solution.matching.pairs, vec![Pair::new("Alice", "Zara")]);
        assert_eq!(solution.total_weight, 2.5);
    }

    #[test]
    fn test_odd_cycle_needs_blossom() {
        // Five students each ranking the next: a 5-cycle plus one outsider
        let preferences = prefs(&[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &["D"]),
            ("D", &["E"]),
            ("E", &["A"]),
            ("F", &["A", "C"]),
        ]);
        let names = ["A", "B", "C", "D", "E", "F"];

        let solution = solve_pairing(&preferences).unwrap();
        let optimum = brute_force(names.len(), &|i, j| {
            edge_half_points(&preferences, names[i], names[j]).unwrap()
        });

        assert_eq!(solution.total_weight * 2.0, optimum as f64);
        assert_eq!(solution.matching.len(), 3);
    }

    #[test]
    fn test_matches_brute_force_on_dense_lists() {
        let names = ["Ava", "Ben", "Cy", "Dee", "Eli", "Fay", "Gus", "Hal", "Ivy"];
        let preferences: PreferenceMap = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let choices = (1..=((i % 5) + 1))
                    .map(|step| names[(i * 3 + step * 2) % names.len()].to_string())
                    .filter(|c| c != name)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                (name.to_string(), choices)
            })
            .collect();

        let solution = solve_pairing(&preferences).unwrap();
        let optimum = brute_force(names.len(), &|i, j| {
            edge_half_points(&preferences, names[i], names[j]).unwrap()
        });

        assert_eq!(solution.total_weight * 2.0, optimum as f64);
        // Odd universe: exactly one student left over
        assert_eq!(solution.matching.len(), 4);
    }

    #[test]
    fn test_zero_budget_best_effort() {
        let preferences = prefs(&[
            ("Alice", &["Bob"]),
            ("Bob", &["Alice"]),
            ("Cara", &["Dan"]),
            ("Dan", &[]),
        ]);
        let solver = Solver::new(SolverConfig {
            time_limit_ms: Some(0),
            on_timeout: TimeoutPolicy::BestEffort,
        });

        let solution = solver.solve(&preferences).unwrap();

        assert_eq!(solution.status, SolveStatus::BestEffort);
        assert_eq!(
            solution.matching.pairs,
            vec![Pair::new("Alice", "Bob"), Pair::new("Cara", "Dan")]
        );
    }

    #[test]
    fn test_zero_budget_fail_policy() {
        let preferences = prefs(&[("Alice", &["Bob"]), ("Bob", &[])]);
        let solver = Solver::new(SolverConfig {
            time_limit_ms: Some(0),
            on_timeout: TimeoutPolicy::Fail,
        });

        assert_eq!(
            solver.solve(&preferences).unwrap_err(),
            SolveError::TimedOut { limit: Duration::ZERO }
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let preferences = prefs(&[("Alice", &["Bob"]), ("Bob", &[])]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = Solver::default().solve_with_cancel(&preferences, &cancel);

        assert_eq!(result.unwrap_err(), SolveError::Cancelled);
    }

    #[test]
    fn test_output_is_stable() {
        let preferences = prefs(&[
            ("Alice", &["Bob", "Cara"]),
            ("Bob", &["Cara"]),
            ("Cara", &["Alice"]),
            ("Dan", &["Eve"]),
            ("Eve", &[]),
        ]);

        let first = solve_pairing(&preferences).unwrap();
        let second = solve_pairing(&preferences).unwrap();

        assert_eq!(first, second);
    }

    /// Each student ranks five classmates further round the class
    fn class_ring(count: usize) -> PreferenceMap {
        (0..count)
            .map(|i| {
                let choices = (1..=5)
                    .map(|step| format!("S{:03}", (i + step * 7) % count))
                    .collect();
                (format!("S{:03}", i), choices)
            })
            .collect()
    }

    #[test]
    fn test_best_effort_keeps_full_matching_on_large_class() {
        let preferences = class_ring(400);
        let optimum = solve_pairing(&preferences).unwrap();
        let solver = Solver::new(SolverConfig {
            time_limit_ms: Some(1),
            on_timeout: TimeoutPolicy::BestEffort,
        });

        let solution = solver.solve(&preferences).unwrap();

        assert_eq!(optimum.status, SolveStatus::Optimal);
        assert_eq!(solution.status, SolveStatus::BestEffort);
        assert_eq!(solution.matching.len(), 200);
        assert_eq!(solution.matching.paired_names().len(), 400);
        assert!(solution.total_weight <= optimum.total_weight);
        assert!(solution.total_weight > 0.0);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let preferences = class_ring(400);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        let worker = std::thread::spawn(move || {
            Solver::default().solve_with_cancel(&preferences, &worker_cancel)
        });
        cancel.cancel();

        assert_eq!(worker.join().unwrap().unwrap_err(), SolveError::Cancelled);
    }
}
