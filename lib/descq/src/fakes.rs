// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node memory for tests: a block of words at a made-up bus address.

use core::cell::Cell;

use crate::{LinkMemory, NodeAddr};

pub const BASE: u32 = 0x2000_0000;
pub const NODE_SIZE: u32 = 32;
pub const NODES: usize = 32;

const WORDS: usize = NODES * (NODE_SIZE as usize / 4);

pub struct FakeRam {
    words: Vec<Cell<u32>>,
}

impl FakeRam {
    pub fn new() -> Self {
        Self {
            words: (0..WORDS).map(|_| Cell::new(0)).collect(),
        }
    }

    /// Address of the `i`th node; nodes are laid out in ascending order.
    pub fn node(&self, i: usize) -> NodeAddr {
        assert!(i < NODES);
        NodeAddr::new(BASE + i as u32 * NODE_SIZE).unwrap()
    }

    pub fn words(&self) -> Vec<u32> {
        self.words.iter().map(Cell::get).collect()
    }

    fn slot(&self, addr: u32) -> &Cell<u32> {
        assert_eq!(addr % 4, 0, "unaligned access at {addr:#x}");
        let index = (addr - BASE) as usize / 4;
        &self.words[index]
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
