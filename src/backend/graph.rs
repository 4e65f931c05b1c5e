use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// Undirected graph with an optional color per node.
#[derive(Debug, Clone)]
pub struct Graph<T> {
    nodes: Vec<Node>,
    index: HashMap<T, usize>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub color: Option<usize>,
    neighbours: BTreeSet<usize>,
}

impl<T: Eq + Hash> Graph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds `value` if it is not present yet and returns its node id.
    pub fn add_node(&mut self, value: T) -> usize {
        if let Some(&id) = self.index.get(&value) {
            return id;
        }
        let id = self.nodes.len();
        self.index.insert(value, id);
        self.nodes.push(Node {
            color: None,
            neighbours: BTreeSet::new(),
        });
        id
    }

    /// Connects two present nodes. Self loops are ignored.
    pub fn add_edge(&mut self, a: &T, b: &T) {
        let (Some(&x), Some(&y)) = (self.index.get(a), self.index.get(b)) else {
            return;
        };
        if x == y {
            return;
        }
        self.nodes[x].neighbours.insert(y);
        self.nodes[y].neighbours.insert(x);
    }

    pub fn id(&self, value: &T) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    #[cfg(test)]
    pub fn has_edge(&self, a: &T, b: &T) -> bool {
        match (self.id(a), self.id(b)) {
            (Some(x), Some(y)) => self.nodes[x].neighbours.contains(&y),
            _ => false,
        }
    }

    pub fn neighbours(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[id].neighbours.iter().copied()
    }

    pub fn color(&self, value: &T) -> Option<usize> {
        self.id(value).and_then(|id| self.nodes[id].color)
    }

    pub fn set_color(&mut self, id: usize, color: usize) {
        self.nodes[id].color = Some(color);
    }
}

impl<T: Eq + Hash> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}
