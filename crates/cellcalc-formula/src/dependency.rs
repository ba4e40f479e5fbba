//! Dependency tracking for formula calculation
//!
//! Cells are interned into an arena and addressed by [`CellId`]. Each node
//! owns the list of what it read (cells and ranges); the reverse direction
//! is a back-index of ids, so no node owns another.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use cellcalc_core::{CellAddress, CellRange};

/// Unique key for a cell (sheet index + address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// Create from sheet index and cell address
    pub fn from_address(sheet: usize, addr: &CellAddress) -> Self {
        Self::new(sheet, addr.row, addr.col)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{}",
            self.sheet,
            CellAddress::new(self.row, self.col).to_a1_string()
        )
    }
}

/// A range read by a formula, without absolute markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeKey {
    pub sheet: usize,
    pub range: CellRange,
}

impl RangeKey {
    pub fn new(sheet: usize, range: &CellRange) -> Self {
        Self {
            sheet,
            range: CellRange::from_indices(range.start.row, range.start.col, range.end.row, range.end.col),
        }
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.sheet == key.sheet && self.range.contains_cell(key.row, key.col)
    }
}

/// Stable index of an interned cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Node {
    key: CellKey,
    precedents: Vec<CellId>,
    ranges: Vec<RangeKey>,
    dependents: AHashSet<CellId>,
}

impl Node {
    fn new(key: CellKey) -> Self {
        Self {
            key,
            precedents: Vec::new(),
            ranges: Vec::new(),
            dependents: AHashSet::new(),
        }
    }
}

/// Dependency graph for formula cells
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: AHashMap<CellKey, CellId>,
    /// Nodes with at least one range precedent
    range_readers: AHashSet<CellId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `key`, allocating a node on first sight
    pub fn intern(&mut self, key: CellKey) -> CellId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = CellId(self.nodes.len() as u32);
        self.nodes.push(Node::new(key));
        self.index.insert(key, id);
        id
    }

    /// Id of `key` if it was interned
    pub fn id(&self, key: &CellKey) -> Option<CellId> {
        self.index.get(key).copied()
    }

    pub fn key(&self, id: CellId) -> CellKey {
        self.nodes[id.index()].key
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Replace what `id` reads
    pub fn set_precedents(
        &mut self,
        id: CellId,
        cells: impl IntoIterator<Item = CellKey>,
        ranges: impl IntoIterator<Item = RangeKey>,
    ) {
        self.clear_precedents(id);

        let mut precedents: Vec<CellId> = cells.into_iter().map(|key| self.intern(key)).collect();
        precedents.sort_unstable();
        precedents.dedup();
        for &precedent in &precedents {
            self.nodes[precedent.index()].dependents.insert(id);
        }

        let mut unique = AHashSet::new();
        let ranges: Vec<RangeKey> = ranges.into_iter().filter(|r| unique.insert(*r)).collect();
        if !ranges.is_empty() {
            self.range_readers.insert(id);
        }

        let node = &mut self.nodes[id.index()];
        node.precedents = precedents;
        node.ranges = ranges;
    }

    /// Forget what `id` reads
    pub fn clear_precedents(&mut self, id: CellId) {
        let node = &mut self.nodes[id.index()];
        let precedents = std::mem::take(&mut node.precedents);
        node.ranges.clear();
        for precedent in precedents {
            self.nodes[precedent.index()].dependents.remove(&id);
        }
        self.range_readers.remove(&id);
    }

    /// Cells `id` read directly
    pub fn precedents(&self, id: CellId) -> &[CellId] {
        &self.nodes[id.index()].precedents
    }

    /// Ranges `id` read
    pub fn range_precedents(&self, id: CellId) -> &[RangeKey] {
        &self.nodes[id.index()].ranges
    }

    /// Cells that read `id` directly or through a range containing it
    pub fn dependents(&self, id: CellId) -> Vec<CellId> {
        let key = self.key(id);
        let mut dependents: Vec<CellId> = self.nodes[id.index()].dependents.iter().copied().collect();
        dependents.extend(self.range_readers.iter().copied().filter(|&reader| {
            self.nodes[reader.index()].ranges.iter().any(|r| r.contains(&key))
        }));
        dependents.sort_unstable();
        dependents.dedup();
        dependents
    }

    /// Every cell that depends on `id`, directly or not
    ///
    /// `id` itself is included only when it sits on a cycle.
    pub fn transitive_dependents(&self, id: CellId) -> Vec<CellId> {
        let mut visited = AHashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            for dependent in self.dependents(current) {
                if visited.insert(dependent) {
                    result.push(dependent);
                    stack.push(dependent);
                }
            }
        }

        result
    }

    /// Interned cells that `id` reads, ranges expanded
    fn all_precedents(&self, id: CellId) -> Vec<CellId> {
        let node = &self.nodes[id.index()];
        let mut precedents = node.precedents.clone();
        if !node.ranges.is_empty() {
            precedents.extend(
                self.nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| node.ranges.iter().any(|r| r.contains(&other.key)))
                    .map(|(i, _)| CellId(i as u32)),
            );
        }
        precedents
    }

    /// Order `ids` so that precedents come before their dependents
    ///
    /// Only ordering between members of `ids` is considered. Cycles are
    /// broken at the first member reached again.
    pub fn topological_order(&self, ids: &[CellId]) -> Vec<CellId> {
        let members: AHashSet<CellId> = ids.iter().copied().collect();
        let mut result = Vec::with_capacity(ids.len());
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for &id in ids {
            self.visit(id, &members, &mut result, &mut visited, &mut in_stack);
        }

        result
    }

    fn visit(
        &self,
        id: CellId,
        members: &AHashSet<CellId>,
        result: &mut Vec<CellId>,
        visited: &mut AHashSet<CellId>,
        in_stack: &mut AHashSet<CellId>,
    ) {
        if visited.contains(&id) || !in_stack.insert(id) {
            return;
        }

        for precedent in self.all_precedents(id) {
            if members.contains(&precedent) {
                self.visit(precedent, members, result, visited, in_stack);
            }
        }

        in_stack.remove(&id);
        visited.insert(id);
        result.push(id);
    }

    /// Whether `id` can reach itself through its precedents
    pub fn has_circular_reference(&self, id: CellId) -> bool {
        let mut visited = AHashSet::new();
        let mut stack = self.all_precedents(id);

        while let Some(current) = stack.pop() {
            if current == id {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.all_precedents(current));
            }
        }

        false
    }

    /// Every cell on a circular reference, self-references included
    ///
    /// One pass over the whole graph (Tarjan's strongly connected
    /// components), iterative so deep chains cannot overflow the stack.
    pub fn circular_cells(&self) -> AHashSet<CellId> {
        const UNVISITED: usize = usize::MAX;

        let count = self.nodes.len();
        let mut order = vec![UNVISITED; count];
        let mut low = vec![0; count];
        let mut on_stack = vec![false; count];
        let mut stack = Vec::new();
        let mut next = 0;
        let mut circular = AHashSet::new();

        for root in 0..count {
            if order[root] != UNVISITED {
                continue;
            }
            order[root] = next;
            low[root] = next;
            next += 1;
            stack.push(root);
            on_stack[root] = true;
            // (node, its precedents, next precedent to look at)
            let mut work = vec![(root, self.all_precedents(CellId(root as u32)), 0)];

            while let Some((node, precedents, position)) = work.last_mut() {
                let node = *node;
                if let Some(precedent) = precedents.get(*position) {
                    let precedent = precedent.index();
                    *position += 1;
                    if order[precedent] == UNVISITED {
                        order[precedent] = next;
                        low[precedent] = next;
                        next += 1;
                        stack.push(precedent);
                        on_stack[precedent] = true;
                        work.push((precedent, self.all_precedents(CellId(precedent as u32)), 0));
                    } else if on_stack[precedent] {
                        low[node] = low[node].min(order[precedent]);
                    }
                    continue;
                }

                work.pop();
                if let Some((parent, _, _)) = work.last() {
                    low[*parent] = low[*parent].min(low[node]);
                }
                if low[node] != order[node] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(CellId(member as u32));
                    if member == node {
                        break;
                    }
                }
                let id = CellId(node as u32);
                if component.len() > 1 || self.all_precedents(id).contains(&id) {
                    circular.extend(component);
                }
            }
        }

        circular
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.range_readers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(row: u32, col: u16) -> CellKey {
        CellKey::new(0, row, col)
    }

    fn range(sr: u32, sc: u16, er: u32, ec: u16) -> RangeKey {
        RangeKey::new(0, &CellRange::from_indices(sr, sc, er, ec))
    }

    #[test]
    fn test_intern_is_stable() {
        let mut graph = DependencyGraph::new();
        let a1 = graph.intern(key(0, 0));
        let b1 = graph.intern(key(0, 1));
        assert_ne!(a1, b1);
        assert_eq!(graph.intern(key(0, 0)), a1);
        assert_eq!(graph.id(&key(0, 1)), Some(b1));
        assert_eq!(graph.key(b1), key(0, 1));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_set_precedents_replaces_back_index() {
        let mut graph = DependencyGraph::new();
        let c1 = graph.intern(key(0, 2));
        graph.set_precedents(c1, [key(0, 0), key(0, 1)], []);
        let a1 = graph.id(&key(0, 0)).unwrap();
        let b1 = graph.id(&key(0, 1)).unwrap();
        assert_eq!(graph.dependents(a1), vec![c1]);

        graph.set_precedents(c1, [key(0, 1)], []);
        assert!(graph.dependents(a1).is_empty());
        assert_eq!(graph.dependents(b1), vec![c1]);
        assert_eq!(graph.precedents(c1), &[b1]);

        graph.clear_precedents(c1);
        assert!(graph.dependents(b1).is_empty());
    }

    #[test]
    fn test_range_dependents() {
        let mut graph = DependencyGraph::new();
        let total = graph.intern(key(10, 0));
        graph.set_precedents(total, [], [range(0, 0, 9, 0)]);
        let a5 = graph.intern(key(4, 0));
        let b5 = graph.intern(key(4, 1));
        assert_eq!(graph.dependents(a5), vec![total]);
        assert!(graph.dependents(b5).is_empty());
        assert_eq!(graph.range_precedents(total), &[range(0, 0, 9, 0)]);
    }

    #[test]
    fn test_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        let a1 = graph.intern(key(0, 0));
        let b1 = graph.intern(key(0, 1));
        let c1 = graph.intern(key(0, 2));
        graph.set_precedents(b1, [key(0, 0)], []);
        graph.set_precedents(c1, [key(0, 1)], []);

        let mut deps = graph.transitive_dependents(a1);
        deps.sort();
        assert_eq!(deps, vec![b1, c1]);
        assert!(graph.transitive_dependents(c1).is_empty());
    }

    #[test]
    fn test_topological_order() {
        let mut graph = DependencyGraph::new();
        let a1 = graph.intern(key(0, 0));
        let b1 = graph.intern(key(0, 1));
        let c1 = graph.intern(key(0, 2));
        graph.set_precedents(c1, [key(0, 1)], []);
        graph.set_precedents(b1, [], [range(0, 0, 0, 0)]);

        assert_eq!(graph.topological_order(&[c1, b1, a1]), vec![a1, b1, c1]);
        assert_eq!(graph.topological_order(&[c1, b1]), vec![b1, c1]);
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();
        let a1 = graph.intern(key(0, 0));
        let b1 = graph.intern(key(0, 1));
        let c1 = graph.intern(key(0, 2));
        let d1 = graph.intern(key(0, 3));

        // A1 -> B1 -> C1 -> A1
        graph.set_precedents(b1, [key(0, 0)], []);
        graph.set_precedents(c1, [key(0, 1)], []);
        graph.set_precedents(a1, [key(0, 2)], []);
        graph.set_precedents(d1, [key(0, 0)], []);

        assert!(graph.has_circular_reference(a1));
        assert!(graph.has_circular_reference(b1));
        assert!(graph.has_circular_reference(c1));
        assert!(!graph.has_circular_reference(d1));

        let deps = graph.transitive_dependents(a1);
        assert!(deps.contains(&a1));
        assert_eq!(deps.len(), 4);

        let order = graph.topological_order(&[a1, b1, c1, d1]);
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_circular_cells_in_one_pass() {
        let mut graph = DependencyGraph::new();
        let a1 = graph.intern(key(0, 0));
        let b1 = graph.intern(key(0, 1));
        let c1 = graph.intern(key(0, 2));
        let d1 = graph.intern(key(0, 3));
        let e1 = graph.intern(key(0, 4));
        let a9 = graph.intern(key(8, 0));

        // A1 <-> B1, C1 reads the cycle, D1 reads itself, E1 reads a range holding itself
        graph.set_precedents(a1, [key(0, 1)], []);
        graph.set_precedents(b1, [key(0, 0)], []);
        graph.set_precedents(c1, [key(0, 0)], []);
        graph.set_precedents(d1, [key(0, 3)], []);
        graph.set_precedents(e1, [], [range(0, 4, 0, 5)]);
        graph.set_precedents(a9, [key(0, 2)], []);

        let circular = graph.circular_cells();
        let mut found: Vec<CellId> = circular.iter().copied().collect();
        found.sort();
        assert_eq!(found, vec![a1, b1, d1, e1]);
        for id in [a1, b1, c1, d1, e1, a9] {
            assert_eq!(circular.contains(&id), graph.has_circular_reference(id));
        }
    }

    #[test]
    fn test_long_chain_has_no_cycle() {
        let mut graph = DependencyGraph::new();
        for row in 1..20_000 {
            let id = graph.intern(key(row, 0));
            graph.set_precedents(id, [key(row - 1, 0)], []);
        }
        assert!(graph.circular_cells().is_empty());

        let first = graph.intern(key(0, 0));
        graph.set_precedents(first, [key(19_999, 0)], []);
        assert_eq!(graph.circular_cells().len(), 20_000);
    }

    #[test]
    fn test_self_reference_through_range() {
        let mut graph = DependencyGraph::new();
        let a3 = graph.intern(key(2, 0));
        graph.set_precedents(a3, [], [range(0, 0, 5, 0)]);
        assert!(graph.has_circular_reference(a3));
    }
}
