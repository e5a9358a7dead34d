// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Reasons a queue operation was refused.
///
/// None of these leave anything half-done: the queue and node memory are as
/// they were before the call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QError {
    /// The call doesn't make sense for this queue: it needs a node and the
    /// queue is empty, it edits a circular queue, or it splices queues whose
    /// nodes are laid out differently.
    InvalidParameter,
    /// A node the operation refers to isn't linked into the queue.
    NodeNotFound,
    /// In base-offset addressing, the resulting chain couldn't be expressed
    /// as unsigned offsets from its head node.
    Unrepresentable,
}

impl QError {
    /// Distinguishes misuse from an operation that was well-formed but could
    /// not be carried out (`NodeNotFound`, `Unrepresentable`).
    pub fn is_invalid_parameter(self) -> bool {
        self == Self::InvalidParameter
    }
}

impl fmt::Display for QError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => f.write_str("invalid parameter"),
            Self::NodeNotFound => f.write_str("node not found in queue"),
            Self::Unrepresentable => {
                f.write_str("node address not representable as a head offset")
            }
        }
    }
}
