// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SDMMC internal DMA nodes.
//!
//! The IDMA reloads IDMALAR, IDMABASER and IDMABSIZER from each node. The
//! link field of IDMALAR is an offset from IDMABAR, which the driver loads
//! with the head node's address before starting a transfer; that makes these
//! base-offset links. ULA tells the IDMA whether to follow the link at all.

use descq::ops::{AddressingMode, DescOps, LinkMemory, NodeInfo};
use descq::NodeAddr;
use static_assertions::{assert_eq_size, const_assert_eq};

/// Link address field: bits [13:2] of the offset from IDMABAR.
pub const IDMALAR_IDMALA: u32 = 0x3ffc;
/// Update IDMALAR from the next node: clear on the last node.
pub const IDMALAR_ULA: u32 = 1 << 31;
/// Update IDMABSIZER from the next node.
pub const IDMALAR_ULS: u32 = 1 << 30;
/// Acknowledge linked list buffer ready.
pub const IDMALAR_ABR: u32 = 1 << 29;

/// An IDMA node as laid out in memory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct IdmaNode {
    pub link: u32,
    pub buffer_base: u32,
    pub buffer_size: u32,
}

assert_eq_size!(IdmaNode, [u32; 3]);
const_assert_eq!(core::mem::offset_of!(IdmaNode, link), 0);

impl IdmaNode {
    /// A node describing `size` bytes at `buffer_base`, marked ready and
    /// set to reload size and link from the next node.
    pub const fn new(buffer_base: u32, size: u32) -> Self {
        Self {
            link: IDMALAR_ULS | IDMALAR_ABR | IDMALAR_ULA,
            buffer_base,
            buffer_size: size,
        }
    }

    pub fn addr(&self) -> Option<NodeAddr> {
        NodeAddr::of(self)
    }

    pub fn is_buffer_ready(&self) -> bool {
        self.link & IDMALAR_ABR != 0
    }

    pub fn set_buffer_ready(&mut self, ready: bool) {
        if ready {
            self.link |= IDMALAR_ABR;
        } else {
            self.link &= !IDMALAR_ABR;
        }
    }
}

/// Descriptor ops for IDMA nodes.
///
/// Offsets are unsigned, so the head node must have the lowest address in
/// the chain. The IDMALA field also limits the whole chain to 16 KiB above
/// the head, word aligned. The queue refuses nodes that break either rule.
#[derive(Copy, Clone, Debug)]
pub struct SdmmcLinks<M> {
    mem: M,
}

impl<M: LinkMemory> SdmmcLinks<M> {
    pub const fn new(mem: M) -> Self {
        Self { mem }
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }
}

impl<M: LinkMemory> DescOps for SdmmcLinks<M> {
    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            link_offset: 0,
            mode: AddressingMode::BaseOffset,
        }
    }

    fn set_link(
        &self,
        head: Option<NodeAddr>,
        node: NodeAddr,
        next: Option<NodeAddr>,
        offset: u32,
    ) {
        // A link back to the head is an offset of zero with ULA set, which
        // is how a chain loops.
        let value = match (head, next) {
            (Some(head), Some(next)) => {
                (next.get().wrapping_sub(head.get()) & IDMALAR_IDMALA)
                    | IDMALAR_ULA
            }
            _ => 0,
        };
        self.mem
            .modify(node.field(offset), IDMALAR_IDMALA | IDMALAR_ULA, value);
    }

    fn get_link(
        &self,
        head: NodeAddr,
        node: NodeAddr,
        offset: u32,
    ) -> Option<NodeAddr> {
        let la = self.mem.read(node.field(offset)) & IDMALAR_IDMALA;
        NodeAddr::new(head.get().wrapping_add(la))
    }

    fn can_link(&self, head: NodeAddr, next: NodeAddr) -> bool {
        next.get().wrapping_sub(head.get()) & !IDMALAR_IDMALA == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeRam, SparseRam};
    use descq::{QError, Queue};

    #[test]
    fn links_are_offsets_from_head() {
        let ram = FakeRam::new();
        let ops = SdmmcLinks::new(&ram);
        let (head, a, b) = (ram.node(0), ram.node(2), ram.node(5));

        ops.set_link(Some(head), a, Some(b), 0);
        let word = ram.read(a.get());
        assert_eq!(word & IDMALAR_IDMALA, b.get() - head.get());
        assert_eq!(word & IDMALAR_ULA, IDMALAR_ULA);
        assert_eq!(ops.get_link(head, a, 0), Some(b));
    }

    #[test]
    fn last_node_stops_the_idma() {
        let ram = FakeRam::new();
        let ops = SdmmcLinks::new(&ram);
        let (head, a) = (ram.node(0), ram.node(1));
        ram.write(a.get(), IdmaNode::new(0x2000_8000, 512).link);

        ops.set_link(Some(head), a, None, 0);
        let word = ram.read(a.get());
        assert_eq!(word & (IDMALAR_ULA | IDMALAR_IDMALA), 0);
        // Buffer state and size reload are left alone.
        assert_eq!(word, IDMALAR_ULS | IDMALAR_ABR);
        assert_eq!(ops.get_link(head, a, 0), Some(head));
    }

    #[test]
    fn queue_keeps_head_lowest() {
        let ram = FakeRam::new();
        let mut q = Queue::new(SdmmcLinks::new(&ram));
        let (a, b, c) = (ram.node(1), ram.node(2), ram.node(3));

        q.insert_node_tail(b).unwrap();
        q.insert_node_tail(c).unwrap();
        assert_eq!(q.insert_node_tail(a), Err(QError::Unrepresentable));
        q.insert_node_head(a).unwrap();
        assert_eq!(ram.read(b.get()) & IDMALAR_IDMALA, c.get() - a.get());

        q.set_circular_link_head().unwrap();
        assert_eq!(ram.read(c.get()), IDMALAR_ULA);
        q.clear_circular_link().unwrap();
        assert_eq!(ram.read(c.get()), 0);
    }

    #[test]
    fn chain_stays_within_link_reach() {
        let ram = SparseRam::new();
        let mut q = Queue::new(SdmmcLinks::new(&ram));
        let head = NodeAddr::new(0x2000_0000).unwrap();
        let last = NodeAddr::new(0x2000_3ffc).unwrap();
        let far = NodeAddr::new(0x2000_4000).unwrap();

        q.insert_node_tail(head).unwrap();
        let before = ram.snapshot();
        assert_eq!(q.insert_node_tail(far), Err(QError::Unrepresentable));
        assert_eq!(ram.snapshot(), before);

        q.insert_node_tail(last).unwrap();
        assert_eq!(q.iter().collect::<Vec<_>>(), [head, last]);
        assert_eq!(q.ops().memory().read(head.get()), IDMALAR_ULA | 0x3ffc);

        // Lowering the head by a word pushes `last` out of reach.
        let low = NodeAddr::new(0x1fff_fffc).unwrap();
        assert_eq!(q.insert_node_head(low), Err(QError::Unrepresentable));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn buffer_ready_flag() {
        let mut node = IdmaNode::new(0x2000_8000, 512);
        assert!(node.is_buffer_ready());
        node.set_buffer_ready(false);
        assert!(!node.is_buffer_ready());
        assert_eq!(node.link & IDMALAR_ULA, IDMALAR_ULA);
    }
}
