// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Queue event trace.
//!
//! Every queue in the program records into the one ring below. Addresses
//! are raw bus addresses so that they read the same in a debugger as in the
//! peripheral's registers.

use ringbuf::ringbuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    None,
    Init { link_offset: u32 },
    DeInit { unlinked: u32 },
    Inserted(u32),
    Removed(u32),
    Replaced { old: u32, new: u32 },
    Spliced { head: u32, count: u32 },
    CircularSet(u32),
    CircularCleared,
    NotFound(u32),
    Unrepresentable(u32),
    Refused(Refusal),
}

/// Why an operation was turned away before it looked at any node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Refusal {
    Empty,
    Circular,
    LayoutMismatch,
}

ringbuf!(pub DESCQ_RINGBUF, Trace, 16, Trace::None);
