// ==============================================================================
// scene.rs - SCENE NODE LOOKUP
// ------------------------------------------------------------------------------
// Name -> node lookup consumed from the host scene graph.
// ==============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

pub trait NodeResolver {
    fn resolve(&self, name: &str) -> Option<NodeHandle>;
}

/// Resolves nothing; every wheel runs without a node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScene;

impl NodeResolver for NoScene {
    fn resolve(&self, _name: &str) -> Option<NodeHandle> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamedNodes {
    nodes: HashMap<String, NodeHandle>,
    next: u32,
}

impl NamedNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name, returning its handle (existing handle if known).
    pub fn insert(&mut self, name: impl Into<String>) -> NodeHandle {
        let next = &mut self.next;
        *self.nodes.entry(name.into()).or_insert_with(|| {
            let h = NodeHandle(*next);
            *next += 1;
            h
        })
    }
}

impl NodeResolver for NamedNodes {
    fn resolve(&self, name: &str) -> Option<NodeHandle> {
        self.nodes.get(name).copied()
    }
}

impl<S: AsRef<str>> FromIterator<S> for NamedNodes {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut nodes = NamedNodes::new();
        for name in iter {
            nodes.insert(name.as_ref());
        }
        nodes
    }
}
