// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptor RAM for tests, at a made-up SRAM4 address.

use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use descq::{LinkMemory, NodeAddr};

const BASE: u32 = 0x2800_0000;
const NODE_SIZE: u32 = 64;
const NODES: usize = 8;

pub struct FakeRam {
    words: Vec<Cell<u32>>,
}

impl FakeRam {
    pub fn new() -> Self {
        let words = NODES * NODE_SIZE as usize / 4;
        Self {
            words: (0..words).map(|_| Cell::new(0)).collect(),
        }
    }

    pub fn node(&self, i: usize) -> NodeAddr {
        assert!(i < NODES);
        NodeAddr::new(BASE + i as u32 * NODE_SIZE).unwrap()
    }

    pub fn words(&self) -> Vec<u32> {
        self.words.iter().map(Cell::get).collect()
    }

    fn slot(&self, addr: u32) -> &Cell<u32> {
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

/// Words anywhere in the address space, for chains that span more than
/// `FakeRam` covers. Unwritten words read as zero.
pub struct SparseRam {
    words: RefCell<BTreeMap<u32, u32>>,
}

impl SparseRam {
    pub fn new() -> Self {
        Self {
            words: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<u32, u32> {
        self.words.borrow().clone()
    }
}

impl LinkMemory for SparseRam {
    fn read(&self, addr: u32) -> u32 {
        self.words.borrow().get(&addr).copied().unwrap_or(0)
    }

    fn write(&self, addr: u32, value: u32) {
        self.words.borrow_mut().insert(addr, value);
    }
}
