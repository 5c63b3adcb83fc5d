use crate::geometry::Mbr;

/// Position of a node in the tree's arena.
pub(crate) type NodeId = usize;

/// A leaf entry: the bounding box of an indexed key and its payload.
///
/// Points are stored as degenerate boxes (`low == high`).
#[derive(Clone, Debug, PartialEq)]
pub struct LeafEntry<T> {
    pub mbr: Mbr,
    pub item: T,
}

impl<T> LeafEntry<T> {
    pub fn new(mbr: Mbr, item: T) -> LeafEntry<T> {
        LeafEntry { mbr, item }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Node<T> {
    Leaf {
        mbr: Mbr,
        entries: Vec<LeafEntry<T>>,
    },
    Internal {
        mbr: Mbr,
        children: Vec<NodeId>,
    },
}

impl<T> Node<T> {
    pub(crate) fn mbr(&self) -> &Mbr {
        match self {
            Node::Leaf { mbr, .. } => mbr,
            Node::Internal { mbr, .. } => mbr,
        }
    }

    pub(crate) fn fanout(&self) -> usize {
        match self {
            Node::Leaf { entries, .. } => entries.len(),
            Node::Internal { children, .. } => children.len(),
        }
    }
}
