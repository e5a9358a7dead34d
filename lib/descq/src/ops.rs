// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access to node link words.
//!
//! A queue reaches node memory only through [`DescOps`]. Peripheral support
//! code implements it for its own descriptor format; [`DirectLinks`] and
//! [`BaseOffsetLinks`] cover the common case of a plain link word, on top of
//! any [`LinkMemory`].

use crate::NodeAddr;

/// How a link word designates the next node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressingMode {
    /// The link word holds the next node's address.
    #[cfg(feature = "direct-addr")]
    Direct,
    /// The link word holds the next node's address minus the address of the
    /// queue's head node. A zero offset therefore designates the head, which
    /// is also how a chain is terminated.
    #[cfg(feature = "base-offset-addr")]
    BaseOffset,
}

/// Node layout, as reported by the peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    /// Byte offset of the link word within each node.
    pub link_offset: u32,
    pub mode: AddressingMode,
}

/// Descriptor operations for one kind of linked-list node.
///
/// `head` is the head node of the queue the link belongs to; only
/// base-offset formats care about it.
pub trait DescOps {
    fn node_info(&self) -> NodeInfo;

    /// Makes the link word of `node` designate `next`, or terminate the
    /// chain if `next` is `None`. `head` is `None` when the node is being
    /// detached from its queue.
    fn set_link(
        &self,
        head: Option<NodeAddr>,
        node: NodeAddr,
        next: Option<NodeAddr>,
        offset: u32,
    );

    /// Decodes the link word of `node`. Returns `None` only if the word
    /// designates no node at all; in base-offset formats a terminated link
    /// reads back as `head`.
    fn get_link(
        &self,
        head: NodeAddr,
        node: NodeAddr,
        offset: u32,
    ) -> Option<NodeAddr>;

    /// Whether a node of the queue headed by `head` can hold a link to
    /// `next`. Link fields narrower than an address can only reach part of
    /// the address space; the queue refuses to place a node outside it.
    fn can_link(&self, _head: NodeAddr, _next: NodeAddr) -> bool {
        true
    }
}

impl<T: DescOps + ?Sized> DescOps for &T {
    fn node_info(&self) -> NodeInfo {
        (**self).node_info()
    }

    fn set_link(
        &self,
        head: Option<NodeAddr>,
        node: NodeAddr,
        next: Option<NodeAddr>,
        offset: u32,
    ) {
        (**self).set_link(head, node, next, offset)
    }

    fn get_link(
        &self,
        head: NodeAddr,
        node: NodeAddr,
        offset: u32,
    ) -> Option<NodeAddr> {
        (**self).get_link(head, node, offset)
    }

    fn can_link(&self, head: NodeAddr, next: NodeAddr) -> bool {
        (**self).can_link(head, next)
    }
}

/// Word access to node memory.
pub trait LinkMemory {
    fn read(&self, addr: u32) -> u32;
    fn write(&self, addr: u32, value: u32);

    /// Replaces the bits of `mask` in the word at `addr` with those of
    /// `value`, leaving the rest alone.
    fn modify(&self, addr: u32, mask: u32, value: u32) {
        let old = self.read(addr);
        self.write(addr, (old & !mask) | (value & mask));
    }
}

impl<M: LinkMemory + ?Sized> LinkMemory for &M {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }

    fn modify(&self, addr: u32, mask: u32, value: u32) {
        (**self).modify(addr, mask, value)
    }
}

/// Node memory accessed in place with volatile loads and stores, which is
/// what a DMA master will be reading concurrently.
#[derive(Copy, Clone, Debug)]
pub struct Volatile {
    _private: (),
}

impl Volatile {
    /// # Safety
    ///
    /// Every address this is asked to touch must be a valid, 4-byte aligned
    /// word that nothing else holds a Rust reference to. In practice: only
    /// put nodes in the queue that live in memory you set aside for
    /// descriptors, and don't hold `&`/`&mut` to them while the queue is
    /// being edited.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl LinkMemory for Volatile {
    fn read(&self, addr: u32) -> u32 {
        // Safety: the contract of `Volatile::new` makes `addr` a valid word.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write(&self, addr: u32, value: u32) {
        // Safety: as above.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// Link words that hold the next node's address, zero terminating.
#[cfg(feature = "direct-addr")]
#[derive(Copy, Clone, Debug)]
pub struct DirectLinks<M> {
    mem: M,
    link_offset: u32,
}

#[cfg(feature = "direct-addr")]
impl<M: LinkMemory> DirectLinks<M> {
    pub const fn new(mem: M, link_offset: u32) -> Self {
        Self { mem, link_offset }
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }
}

#[cfg(feature = "direct-addr")]
impl<M: LinkMemory> DescOps for DirectLinks<M> {
    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            link_offset: self.link_offset,
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
        self.mem
            .write(node.field(offset), next.map_or(0, NodeAddr::get));
    }

    fn get_link(
        &self,
        _head: NodeAddr,
        node: NodeAddr,
        offset: u32,
    ) -> Option<NodeAddr> {
        NodeAddr::new(self.mem.read(node.field(offset)))
    }
}

/// Link words that hold the next node's offset from the head node, in the
/// bits of `mask`. The other bits of the word belong to the peripheral and
/// are preserved.
#[cfg(feature = "base-offset-addr")]
#[derive(Copy, Clone, Debug)]
pub struct BaseOffsetLinks<M> {
    mem: M,
    link_offset: u32,
    mask: u32,
}

#[cfg(feature = "base-offset-addr")]
impl<M: LinkMemory> BaseOffsetLinks<M> {
    pub const fn new(mem: M, link_offset: u32, mask: u32) -> Self {
        Self {
            mem,
            link_offset,
            mask,
        }
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }
}

#[cfg(feature = "base-offset-addr")]
impl<M: LinkMemory> DescOps for BaseOffsetLinks<M> {
    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            link_offset: self.link_offset,
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
        let delta = match (head, next) {
            (Some(head), Some(next)) => next.get().wrapping_sub(head.get()),
            _ => 0,
        };
        self.mem.modify(node.field(offset), self.mask, delta);
    }

    fn get_link(
        &self,
        head: NodeAddr,
        node: NodeAddr,
        offset: u32,
    ) -> Option<NodeAddr> {
        let delta = self.mem.read(node.field(offset)) & self.mask;
        NodeAddr::new(head.get().wrapping_add(delta))
    }

    fn can_link(&self, head: NodeAddr, next: NodeAddr) -> bool {
        next.get().wrapping_sub(head.get()) & !self.mask == 0
    }
}
