//! NodeId: the (element, group) identifier pair stored as a map value.

use bytemuck::{Pod, Zeroable};

/// Identifies an element (`node`) within a group (`tree`).
///
/// `Default` is [`NodeId::UNASSIGNED`], not zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct NodeId {
    pub node: u32,
    pub tree: u32,
}

impl NodeId {
    /// Sentinel for "no identifier assigned".
    pub const UNASSIGNED: NodeId = NodeId {
        node: u32::MAX,
        tree: u32::MAX,
    };

    #[inline]
    pub const fn new(node: u32, tree: u32) -> Self {
        NodeId { node, tree }
    }

    #[inline]
    pub fn is_unassigned(&self) -> bool {
        *self == Self::UNASSIGNED
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}
