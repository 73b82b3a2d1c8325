use std::collections::VecDeque;

use hashbrown::HashSet;
use petgraph::graph::NodeIndex;

/// Insertion index for `priority` in a list sorted by ascending priority.
///
/// Elements with a priority less than or equal to `priority` stay in front of
/// the insertion point, so equal priorities keep their insertion order and
/// index 0 is always the next element to expand.
pub fn find_pos(priorities: &[f64], priority: f64) -> usize {
    priorities.partition_point(|p| *p <= priority)
}

/// The working list of a search.
///
/// An unordered frontier is a plain FIFO queue. An ordered frontier keeps its
/// entries sorted by priority and always hands out the lowest one first.
#[derive(Debug, Clone)]
pub struct Frontier {
    entries: VecDeque<(f64, NodeIndex)>,
    members: HashSet<NodeIndex>,
    ordered: bool,
}

impl Frontier {
    pub fn fifo() -> Self {
        Frontier {
            entries: VecDeque::new(),
            members: HashSet::new(),
            ordered: false,
        }
    }

    pub fn ordered() -> Self {
        Frontier {
            ordered: true,
            ..Self::fifo()
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.members.contains(&node)
    }

    /// See [`find_pos`].
    pub fn find_pos(&self, priority: f64) -> usize {
        self.entries.partition_point(|(p, _)| *p <= priority)
    }

    pub fn push(&mut self, node: NodeIndex, priority: f64) {
        if self.ordered {
            let pos = self.find_pos(priority);
            self.entries.insert(pos, (priority, node));
        } else {
            self.entries.push_back((priority, node));
        }
        self.members.insert(node);
    }

    pub fn pop(&mut self) -> Option<NodeIndex> {
        let (_, node) = self.entries.pop_front()?;
        self.members.remove(&node);
        Some(node)
    }

    /// Moves a node that is already queued to the position of its new
    /// priority. Nodes that are not queued are ignored.
    pub fn reposition(&mut self, node: NodeIndex, priority: f64) {
        if !self.ordered || !self.contains(node) {
            return;
        }

        if let Some(pos) = self.entries.iter().position(|(_, n)| *n == node) {
            self.entries.remove(pos);
            let pos = self.find_pos(priority);
            self.entries.insert(pos, (priority, node));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> {
        self.entries.iter().map(|(_, n)| *n)
    }
}

#[test]
fn test_find_pos() {
    let priorities = [1.0, 2.0, 2.0, 5.0];
    assert_eq!(find_pos(&priorities, 0.5), 0);
    assert_eq!(find_pos(&priorities, 2.0), 3);
    assert_eq!(find_pos(&priorities, 3.0), 3);
    assert_eq!(find_pos(&priorities, 7.0), 4);
    assert_eq!(find_pos(&[], 1.0), 0);
}

#[test]
fn test_ordered_frontier_is_stable() {
    let mut frontier = Frontier::ordered();
    frontier.push(NodeIndex::new(0), 3.0);
    frontier.push(NodeIndex::new(1), 1.0);
    frontier.push(NodeIndex::new(2), 3.0);
    frontier.push(NodeIndex::new(3), 1.0);

    let order = std::iter::from_fn(|| frontier.pop()).collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![
            NodeIndex::new(1),
            NodeIndex::new(3),
            NodeIndex::new(0),
            NodeIndex::new(2)
        ]
    );
}

#[test]
fn test_reposition() {
    let mut frontier = Frontier::ordered();
    frontier.push(NodeIndex::new(0), 1.0);
    frontier.push(NodeIndex::new(1), 2.0);
    frontier.push(NodeIndex::new(2), 3.0);

    frontier.reposition(NodeIndex::new(2), 0.0);
    assert_eq!(frontier.pop(), Some(NodeIndex::new(2)));
    assert!(!frontier.contains(NodeIndex::new(2)));
    assert_eq!(frontier.len(), 2);
}

#[test]
fn test_fifo_frontier() {
    let mut frontier = Frontier::fifo();
    frontier.push(NodeIndex::new(4), 9.0);
    frontier.push(NodeIndex::new(5), 0.0);
    assert_eq!(frontier.pop(), Some(NodeIndex::new(4)));
    assert_eq!(frontier.pop(), Some(NodeIndex::new(5)));
    assert_eq!(frontier.pop(), None);
}
