// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::cell::Cell;

use descq::ops::{BaseOffsetLinks, DirectLinks};
use descq::{AddressingMode, DescOps, LinkMemory, NodeAddr, Queue};

pub const BASE: u32 = 0x3000_0000;
pub const NODE_SIZE: u32 = 32;
pub const NODES: usize = 16;

/// Link word offset used for direct queues: the fifth word, like a GPDMA
/// linear node.
pub const DIRECT_LINK: u32 = 20;
/// Link word offset and field for base-offset queues, like an SDMMC IDMA
/// node.
pub const OFFSET_LINK: u32 = 0;
pub const OFFSET_MASK: u32 = 0x3ffc;

/// Word-addressed stand-in for descriptor RAM.
pub struct FakeRam {
    words: Vec<Cell<u32>>,
}

impl FakeRam {
    pub fn new() -> Self {
        let words = NODES * (NODE_SIZE as usize / 4);
        Self {
            words: (0..words).map(|_| Cell::new(0)).collect(),
        }
    }

    pub fn node(&self, i: usize) -> NodeAddr {
        assert!(i < NODES);
        NodeAddr::new(BASE + i as u32 * NODE_SIZE).unwrap()
    }

    pub fn index_of(&self, node: NodeAddr) -> usize {
        ((node.get() - BASE) / NODE_SIZE) as usize
    }

    pub fn words(&self) -> Vec<u32> {
        self.words.iter().map(Cell::get).collect()
    }

    fn slot(&self, addr: u32) -> &Cell<u32> {
        assert_eq!(addr % 4, 0, "unaligned access at {addr:#x}");
        &self.words[(addr - BASE) as usize / 4]
    }
}

impl LinkMemory for FakeRam {
    fn read(&self, addr: u32) -> u32 {
        self.slot(addr).get()
    }

    fn write(&self, addr: u32, value: u32) {
        self.slot(addr).set(value)
    }
}

pub type DirectQ<'a> = Queue<DirectLinks<&'a FakeRam>>;
pub type OffsetQ<'a> = Queue<BaseOffsetLinks<&'a FakeRam>>;

pub fn direct(ram: &FakeRam) -> DirectQ<'_> {
    Queue::new(DirectLinks::new(ram, DIRECT_LINK))
}

pub fn offset(ram: &FakeRam) -> OffsetQ<'_> {
    Queue::new(BaseOffsetLinks::new(ram, OFFSET_LINK, OFFSET_MASK))
}

pub fn nodes<O: DescOps>(q: &Queue<O>) -> Vec<NodeAddr> {
    q.iter().collect()
}

/// Checks the structural invariants of a linear queue against node memory.
///
/// Walking `len - 1` links from the head lands on the tail, the tail's link
/// word is terminated, and in base-offset mode the head is the lowest node.
pub fn check_invariants<O: DescOps>(q: &Queue<O>, ram: &FakeRam) {
    let info = q.node_info();
    let (Some(head), Some(tail)) = (q.head(), q.tail()) else {
        assert_eq!(q.len(), 0);
        assert_eq!(q.head(), None);
        assert_eq!(q.tail(), None);
        return;
    };
    assert!(q.len() > 0);

    let mut node = head;
    for _ in 1..q.len() {
        node = q
            .ops()
            .get_link(head, node, info.link_offset)
            .expect("broken chain");
    }
    assert_eq!(node, tail);

    let tail_word = ram.read(tail.field(info.link_offset));
    match info.mode {
        AddressingMode::Direct => assert_eq!(tail_word, 0),
        AddressingMode::BaseOffset => {
            assert_eq!(tail_word & OFFSET_MASK, 0);
            assert!(q.iter().skip(1).all(|n| n > head));
        }
    }
}
