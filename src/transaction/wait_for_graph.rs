use std::collections::{HashMap, HashSet};

use super::TransactionID;

/// Directed graph over transactions: an edge `t -> u` means `t` is
/// waiting for a lock held by `u`.
pub(crate) struct WaitForGraph {
    // key: transaction id, value: the transactions that the key transaction is waiting for
    graph: HashMap<TransactionID, HashSet<TransactionID>>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: HashMap::new(),
        }
    }

    pub(crate) fn add_edge(&mut self, from: TransactionID, to: TransactionID) {
        // reentrancy never counts as waiting on yourself
        if from == to {
            return;
        }

        self.graph
            .entry(from)
            .or_insert_with(HashSet::new)
            .insert(to);
    }

    pub(crate) fn remove_edge(&mut self, from: TransactionID, to: TransactionID) {
        if let Some(transactions) = self.graph.get_mut(&from) {
            transactions.remove(&to);
        }
    }

    /// Drop all outgoing edges of `tid` (it stopped waiting).
    pub(crate) fn remove_waiter(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);
    }

    /// Drop `tid` entirely, incoming edges included (it finished).
    pub(crate) fn remove_transaction(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);
        for targets in self.graph.values_mut() {
            targets.remove(&tid);
        }
    }

    /// Whether `start` can reach itself again, i.e. whether the edges
    /// just added for `start` closed a cycle.
    pub(crate) fn has_cycle_from(&self, start: TransactionID) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionID> = match self.graph.get(&start) {
            Some(targets) => targets.iter().copied().collect(),
            None => return false,
        };

        while let Some(tid) = stack.pop() {
            if tid == start {
                return true;
            }
            if !visited.insert(tid) {
                continue;
            }
            if let Some(targets) = self.graph.get(&tid) {
                stack.extend(targets.iter().copied());
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_party_cycle() {
        let mut g = WaitForGraph::new();
        g.add_edge(1, 2);
        assert!(!g.has_cycle_from(1));

        g.add_edge(2, 1);
        assert!(g.has_cycle_from(2));
        assert!(g.has_cycle_from(1));
    }

    #[test]
    fn test_self_edge_is_ignored() {
        let mut g = WaitForGraph::new();
        g.add_edge(1, 1);
        assert!(!g.has_cycle_from(1));
    }

    #[test]
    fn test_release_breaks_cycle() {
        let mut g = WaitForGraph::new();
        g.add_edge(1, 2);
        g.add_edge(2, 3);
        g.add_edge(3, 1);
        assert!(g.has_cycle_from(3));

        g.remove_transaction(2);
        assert!(!g.has_cycle_from(3));
        assert!(!g.has_cycle_from(1));
    }
}
