// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GPDMA channel nodes.
//!
//! A node is the block of channel registers the GPDMA reloads when it
//! follows a link: CTR1, CTR2, CBR1, CSAR, CDAR and CLLR for linear
//! channels, with CTR3 and CBR2 in front of CLLR on 2D channels. The update
//! bits in CLLR say which of those registers to reload, and LA gives the low
//! half of the next node's address. A CLLR of zero ends the chain.

use descq::ops::{AddressingMode, DescOps, LinkMemory, NodeInfo};
use descq::NodeAddr;
use static_assertions::{assert_eq_size, const_assert_eq};

/// Link address field: bits [15:2] of the next node's address.
pub const CLLR_LA: u32 = 0xfffc;
/// Bits of a node address that come from CxLBAR instead of CxLLR.
pub const CLBAR_LBA: u32 = 0xffff_0000;

pub const CLLR_UT1: u32 = 1 << 31;
pub const CLLR_UT2: u32 = 1 << 30;
pub const CLLR_UB1: u32 = 1 << 29;
pub const CLLR_USA: u32 = 1 << 28;
pub const CLLR_UDA: u32 = 1 << 27;
pub const CLLR_UT3: u32 = 1 << 26;
pub const CLLR_UB2: u32 = 1 << 25;
pub const CLLR_ULL: u32 = 1 << 16;

pub const NODE_REGISTERS: usize = 8;

/// A channel node as laid out in memory.
///
/// `regs` is as large as the 2D layout needs; linear nodes leave the last
/// two words unused. `info` is ours, the GPDMA never reads it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct GpdmaNode {
    pub regs: [u32; NODE_REGISTERS],
    pub info: u32,
}

assert_eq_size!(GpdmaNode, [u32; NODE_REGISTERS + 1]);
const_assert_eq!(core::mem::offset_of!(GpdmaNode, regs), 0);

impl GpdmaNode {
    pub const fn new() -> Self {
        Self {
            regs: [0; NODE_REGISTERS],
            info: 0,
        }
    }

    pub fn addr(&self) -> Option<NodeAddr> {
        NodeAddr::of(self)
    }

    /// The link register of a node in `layout`.
    pub fn cllr(&self, layout: NodeLayout) -> u32 {
        self.regs[layout.cllr_index()]
    }
}

/// Which set of registers a channel's nodes carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeLayout {
    Linear,
    TwoD,
}

impl NodeLayout {
    const fn cllr_index(self) -> usize {
        match self {
            Self::Linear => 5,
            Self::TwoD => 7,
        }
    }

    /// Byte offset of CLLR within a node.
    pub const fn link_offset(self) -> u32 {
        self.cllr_index() as u32 * 4
    }

    /// CLLR update bits for a node that links onwards: reload every
    /// register the layout has, and the link itself.
    pub const fn update_bits(self) -> u32 {
        let linear =
            CLLR_UT1 | CLLR_UT2 | CLLR_UB1 | CLLR_USA | CLLR_UDA | CLLR_ULL;
        match self {
            Self::Linear => linear,
            Self::TwoD => linear | CLLR_UT3 | CLLR_UB2,
        }
    }
}

const_assert_eq!(NodeLayout::Linear.link_offset(), 20);
const_assert_eq!(NodeLayout::TwoD.link_offset(), 28);

/// Descriptor ops for GPDMA channel nodes.
///
/// Every node of a queue must sit in the same 64 KiB region as the head,
/// since that is all CxLBAR can describe, and be word aligned. The queue
/// refuses nodes elsewhere. Links are absolute within the region, so queues
/// use direct addressing.
#[derive(Copy, Clone, Debug)]
pub struct GpdmaLinks<M> {
    mem: M,
    layout: NodeLayout,
}

impl<M: LinkMemory> GpdmaLinks<M> {
    pub const fn new(mem: M, layout: NodeLayout) -> Self {
        Self { mem, layout }
    }

    pub fn layout(&self) -> NodeLayout {
        self.layout
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }
}

impl<M: LinkMemory> DescOps for GpdmaLinks<M> {
    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            link_offset: self.layout.link_offset(),
            mode: AddressingMode::Direct,
        }
    }

    fn set_link(
        &self,
        _head: Option<NodeAddr>,
        node: NodeAddr,
        next: Option<NodeAddr>,
        offset: u32,
    ) {
        let cllr = node.field(offset);
        match next {
            Some(next) => {
                let update = self.layout.update_bits();
                self.mem.modify(
                    cllr,
                    update | CLLR_LA,
                    update | (next.get() & CLLR_LA),
                );
            }
            None => self.mem.write(cllr, 0),
        }
    }

    fn get_link(
        &self,
        _head: NodeAddr,
        node: NodeAddr,
        offset: u32,
    ) -> Option<NodeAddr> {
        let la = self.mem.read(node.field(offset)) & CLLR_LA;
        NodeAddr::new((node.get() & CLBAR_LBA) + la)
    }

    fn can_link(&self, head: NodeAddr, next: NodeAddr) -> bool {
        next.get() & !CLLR_LA == head.get() & CLBAR_LBA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeRam, SparseRam};
    use descq::{QError, Queue};

    #[test]
    fn linear_links_carry_update_bits() {
        let ram = FakeRam::new();
        let ops = GpdmaLinks::new(&ram, NodeLayout::Linear);
        let (a, b) = (ram.node(0), ram.node(1));

        ops.set_link(Some(a), a, Some(b), 20);
        let cllr = ram.read(a.field(20));
        assert_eq!(cllr & CLLR_LA, b.get() & CLLR_LA);
        assert_eq!(cllr & !CLLR_LA, NodeLayout::Linear.update_bits());
        assert_eq!(cllr & (CLLR_UT3 | CLLR_UB2), 0);
        assert_eq!(ops.get_link(a, a, 20), Some(b));
    }

    #[test]
    fn two_d_links_reload_extra_registers() {
        let ram = FakeRam::new();
        let ops = GpdmaLinks::new(&ram, NodeLayout::TwoD);
        let offset = ops.layout().link_offset();
        assert_eq!(ops.node_info().link_offset, offset);

        let (a, b) = (ram.node(2), ram.node(3));
        ops.set_link(Some(a), a, Some(b), offset);
        let cllr = ram.read(a.field(offset));
        assert_eq!(cllr & (CLLR_UT3 | CLLR_UB2), CLLR_UT3 | CLLR_UB2);
        assert_eq!(ops.get_link(a, a, offset), Some(b));
    }

    #[test]
    fn terminated_link_is_zero() {
        let ram = FakeRam::new();
        let ops = GpdmaLinks::new(&ram, NodeLayout::Linear);
        let (a, b) = (ram.node(0), ram.node(1));
        ops.set_link(Some(a), a, Some(b), 20);
        ops.set_link(Some(a), a, None, 20);
        assert_eq!(ram.read(a.field(20)), 0);
    }

    #[test]
    fn queue_builds_a_channel_chain() {
        let ram = FakeRam::new();
        let mut q = Queue::new(GpdmaLinks::new(&ram, NodeLayout::Linear));
        let (a, b, c) = (ram.node(4), ram.node(1), ram.node(2));

        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        q.insert_node_head(c).unwrap();
        assert_eq!(q.iter().collect::<Vec<_>>(), [c, a, b]);
        assert_eq!(ram.read(b.field(20)), 0);

        q.set_circular_link(a).unwrap();
        assert_eq!(ram.read(b.field(20)) & CLLR_ULL, CLLR_ULL);
        assert_eq!(q.next_of(b), Some(a));
        q.deinit();
        assert!(ram.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn chain_stays_in_one_region() {
        let ram = SparseRam::new();
        let mut q = Queue::new(GpdmaLinks::new(&ram, NodeLayout::Linear));
        let a = NodeAddr::new(0x2000_ffc0).unwrap();
        let b = NodeAddr::new(0x2000_ff00).unwrap();
        let next_region = NodeAddr::new(0x2001_0000).unwrap();

        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        let before = ram.snapshot();
        assert_eq!(
            q.insert_node_tail(next_region),
            Err(QError::Unrepresentable)
        );
        assert_eq!(
            q.insert_node_head(next_region),
            Err(QError::Unrepresentable)
        );
        assert_eq!(
            q.replace_node(b, NodeAddr::new(0x2000_ff02).unwrap()),
            Err(QError::Unrepresentable)
        );
        assert_eq!(ram.snapshot(), before);
        assert_eq!(q.iter().collect::<Vec<_>>(), [a, b]);

        let link = q.ops().layout().link_offset();
        let cllr = q.ops().memory().read(a.field(link));
        assert_eq!(cllr & CLLR_LA, 0xff00);
    }

    #[test]
    fn node_struct_matches_register_block() {
        let mut node = GpdmaNode::new();
        node.regs[5] = 0x1234;
        assert_eq!(node.cllr(NodeLayout::Linear), 0x1234);
        assert_eq!(core::mem::size_of::<GpdmaNode>(), 36);
    }
}
