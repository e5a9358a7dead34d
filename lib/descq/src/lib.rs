// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptor queues
//!
//! A `Queue` threads a singly linked list through descriptors that somebody
//! else owns: DMA channel nodes, SDMMC IDMA nodes, anything with a link word
//! at a fixed byte offset. The queue never allocates, copies or frees a
//! node. It tracks head, tail and node count, and rewrites link words through
//! a [`DescOps`] implementation supplied by the peripheral that will walk the
//! chain.
//!
//! The peripheral decides two things, reported by [`DescOps::node_info`]:
//!
//! - where the link word lives inside a node, and
//! - how a link is expressed ([`AddressingMode`]): either the absolute
//!   address of the next node, or its distance from the queue's head node.
//!   The latter is what you get from masters whose link fields are narrower
//!   than a pointer, and it constrains node placement: the head must sit
//!   below every other node, because offsets are unsigned. Operations that
//!   would break that rule fail with [`QError::Unrepresentable`].
//!
//! Link fields can also be too narrow to reach every address: an offset
//! field of a few bits, or a link register that only holds the low half of
//! an address. [`DescOps::can_link`] reports what a format can reach, in
//! either mode, and a node out of reach is refused the same way.
//!
//! ## Usage
//!
//! ```ignore
//! let ops = DirectLinks::new(unsafe { Volatile::new() }, 20);
//! let mut q = Queue::new(ops);
//! q.insert_node_tail(NodeAddr::of(&NODES[0]).unwrap())?;
//! q.insert_node_tail(NodeAddr::of(&NODES[1]).unwrap())?;
//! q.set_circular_link_head()?;
//! ```
//!
//! A queue can be spliced into another one ([`Queue::insert_q`] and
//! friends), which empties the source. A circular queue refuses structural
//! edits until [`Queue::clear_circular_link`] is called.
//!
//! ## Failure atomicity
//!
//! Every lookup and every placement check runs before the first link word is
//! written. An operation that returns an error has left both the queue and
//! node memory exactly as it found them.
//!
//! ## Features
//!
//! - `direct-addr`, `base-offset-addr`: compile in the addressing modes.
//! - `circular-link`: circular queues.
//! - `check-param`: turn misuse (editing a circular queue, splicing queues
//!   with different node layouts) into `QError::InvalidParameter` instead of
//!   a debug assertion.
//! - `trace`: record outcomes in [`trace::DESCQ_RINGBUF`].
//!
//! The integration tests need the default checks. The unit tests also cover
//! other feature sets, e.g. `--no-default-features --features direct-addr`.

#![cfg_attr(not(test), no_std)]

#[cfg(not(any(feature = "direct-addr", feature = "base-offset-addr")))]
compile_error!(
    "descq needs at least one of the `direct-addr` and `base-offset-addr` \
     features"
);

#[macro_use]
mod trace_macros {
    /// Records a trace event if the `trace` feature is on.
    macro_rules! trace {
        ($event:expr) => {{
            #[cfg(feature = "trace")]
            ringbuf::ringbuf_entry!($crate::trace::DESCQ_RINGBUF, $event);
        }};
    }
}

mod addr;
mod error;
pub mod ops;
mod queue;
#[cfg(feature = "trace")]
pub mod trace;

#[cfg(test)]
mod fakes;

pub use addr::NodeAddr;
pub use error::QError;
pub use ops::{AddressingMode, DescOps, LinkMemory, NodeInfo};
pub use queue::{Iter, Queue};
