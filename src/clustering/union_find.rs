// src/clustering/union_find.rs
//! Disjoint-set over record positions that refuses merges above a size cap.

use crate::models::matching::ReasonSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionOutcome {
    Merged { root: usize },
    AlreadyJoined { root: usize },
    WouldExceedCap,
}

pub struct CappedUnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    members: Vec<Vec<usize>>,
    reasons: Vec<ReasonSet>,
    cap: usize,
}

// All positions passed in must be < n (from new()).
impl CappedUnionFind {
    pub fn new(n: usize, cap: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            members: (0..n).map(|i| vec![i]).collect(),
            reasons: vec![ReasonSet::new(); n],
            cap,
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    pub fn union(&mut self, x: usize, y: usize) -> UnionOutcome {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return UnionOutcome::AlreadyJoined { root: rx };
        }
        if self.size[rx] + self.size[ry] > self.cap {
            return UnionOutcome::WouldExceedCap;
        }

        // union by size; ties go to the smaller position for stable roots
        let (big, small) = if self.size[rx] > self.size[ry]
            || (self.size[rx] == self.size[ry] && rx < ry)
        {
            (rx, ry)
        } else {
            (ry, rx)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        let moved = std::mem::take(&mut self.members[small]);
        self.members[big].extend(moved);
        self.members[big].sort_unstable();
        let moved_reasons = std::mem::take(&mut self.reasons[small]);
        self.reasons[big].extend(moved_reasons);
        UnionOutcome::Merged { root: big }
    }

    pub fn add_reasons(&mut self, x: usize, reasons: &ReasonSet) {
        let root = self.find(x);
        self.reasons[root].extend(reasons.iter().copied());
    }

    /// Members of `x`'s component, ascending.
    pub fn members(&mut self, x: usize) -> Vec<usize> {
        let root = self.find(x);
        self.members[root].clone()
    }

    pub fn reasons(&mut self, x: usize) -> ReasonSet {
        let root = self.find(x);
        self.reasons[root].clone()
    }

    /// Dissolves `x`'s whole component back into singletons and returns its
    /// former members.
    pub fn detach_component(&mut self, x: usize) -> Vec<usize> {
        let root = self.find(x);
        let members = std::mem::take(&mut self.members[root]);
        for &m in &members {
            self.parent[m] = m;
            self.size[m] = 1;
            self.members[m] = vec![m];
            self.reasons[m].clear();
        }
        members
    }

    /// Roots of components with at least two members, ascending.
    pub fn multi_member_roots(&mut self) -> Vec<usize> {
        (0..self.parent.len())
            .filter(|&i| self.parent[i] == i && self.size[i] > 1)
            .collect()
    }
}
