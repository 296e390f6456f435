//! Document outline stored as an index arena
//!
//! The engine reports a flat, depth-annotated list; it is linked into a
//! tree of [`OutlineNode`]s addressed by index. The whole arena is dropped
//! at once when the session closes.

use crate::engine::OutlineEntry;

/// Index of a node inside an [`Outline`]
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub title: String,
    /// Target page (1-indexed)
    pub page: Option<u32>,
    pub uri: Option<String>,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    nodes: Vec<OutlineNode>,
    roots: Vec<NodeId>,
}

impl Outline {
    /// Link entries in document order; a depth jump of more than one level
    /// attaches to the deepest open ancestor.
    pub fn from_entries(entries: Vec<OutlineEntry>) -> Self {
        let mut outline = Outline::default();
        // Last node seen at each depth
        let mut open: Vec<NodeId> = Vec::new();
        // Last child appended under each open node, and the last root
        let mut last_child: Vec<Option<NodeId>> = Vec::new();
        let mut last_root: Option<NodeId> = None;

        for entry in entries {
            let depth = (entry.depth as usize).min(open.len());
            open.truncate(depth);
            last_child.truncate(depth);

            let id = outline.nodes.len();
            let parent = open.last().copied();
            outline.nodes.push(OutlineNode {
                title: entry.title,
                page: entry.page,
                uri: entry.uri,
                parent,
                first_child: None,
                next_sibling: None,
            });

            match parent {
                Some(p) => {
                    match last_child[depth - 1] {
                        Some(prev) => outline.nodes[prev].next_sibling = Some(id),
                        None => outline.nodes[p].first_child = Some(id),
                    }
                    last_child[depth - 1] = Some(id);
                }
                None => {
                    if let Some(prev) = last_root {
                        outline.nodes[prev].next_sibling = Some(id);
                    }
                    last_root = Some(id);
                    outline.roots.push(id);
                }
            }

            open.push(id);
            last_child.push(None);
        }

        outline
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&OutlineNode> {
        self.nodes.get(id)
    }

    /// Top-level entries in order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            outline: self,
            next: self.nodes.get(id).and_then(|n| n.first_child),
        }
    }

    /// Nesting depth of a node, 0 for roots
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    /// All nodes in document order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &OutlineNode)> {
        self.nodes.iter().enumerate()
    }
}

/// Sibling walk under one node
pub struct Children<'a> {
    outline: &'a Outline,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a OutlineNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = &self.outline.nodes[id];
        self.next = node.next_sibling;
        Some((id, node))
    }
}
