// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;
use core::num::NonZeroU32;

/// The bus address of a node.
///
/// Linked-list masters work with 32-bit addresses, so that is what a queue
/// stores. A `NodeAddr` is never null; "no node" is spelled `None`, and
/// `Option<NodeAddr>` is still four bytes.
///
/// The queue holds these as weak references: it never dereferences one
/// itself, and all access to node memory goes through a
/// [`DescOps`](crate::DescOps).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeAddr(NonZeroU32);

static_assertions::assert_eq_size!(NodeAddr, u32);
static_assertions::assert_eq_size!(Option<NodeAddr>, u32);

impl NodeAddr {
    pub const fn new(addr: u32) -> Option<Self> {
        match NonZeroU32::new(addr) {
            Some(a) => Some(Self(a)),
            None => None,
        }
    }

    /// Returns the address of `node`, or `None` if it does not fit in 32
    /// bits (which only happens when running on a host).
    pub fn of<T>(node: &T) -> Option<Self> {
        Self::from_ptr(node as *const T)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Option<Self> {
        u32::try_from(ptr as usize).ok().and_then(Self::new)
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Address of the word `offset` bytes into the node.
    pub const fn field(self, offset: u32) -> u32 {
        self.get().wrapping_add(offset)
    }
}

impl From<NodeAddr> for u32 {
    fn from(addr: NodeAddr) -> Self {
        addr.get()
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddr({:#010x})", self.get())
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.get())
    }
}
