// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The queue itself.
//!
//! In base-offset addressing every link is stored relative to the head node,
//! and offsets are unsigned, so the head must be the lowest-addressed node
//! in the queue. Each operation that could change that first checks that the
//! result still satisfies it, then rewrites whatever links the new head
//! invalidates.

use crate::{AddressingMode, DescOps, NodeAddr, NodeInfo, QError};

#[cfg(feature = "trace")]
use crate::trace::{Refusal, Trace};

/// A singly linked list of externally owned nodes.
///
/// The queue holds node addresses, never the nodes. A node must stay valid
/// (and must not be handed to another queue) for as long as it is linked
/// into this one.
#[derive(Debug)]
pub struct Queue<O: DescOps> {
    head: Option<NodeAddr>,
    tail: Option<NodeAddr>,
    #[cfg(feature = "circular-link")]
    first_circular: Option<NodeAddr>,
    len: u32,
    info: NodeInfo,
    ops: O,
}

/// Where a node is going, for the checks that it can be linked there.
#[derive(Copy, Clone, Debug)]
enum Placement {
    /// Behind the current head, which stays.
    AboveHead,
    /// In front of `count` consecutive nodes starting at `start`, as the head
    /// they will be linked relative to. In base-offset addressing it has to
    /// sit below each of them.
    Below { start: NodeAddr, count: u32 },
}

impl<O: DescOps> Queue<O> {
    /// Creates an empty queue whose nodes are laid out as `ops` describes.
    pub fn new(ops: O) -> Self {
        let info = ops.node_info();
        trace!(Trace::Init {
            link_offset: info.link_offset
        });
        Self {
            head: None,
            tail: None,
            #[cfg(feature = "circular-link")]
            first_circular: None,
            len: 0,
            info,
            ops,
        }
    }

    /// Unlinks every node, clearing its link word, and empties the queue.
    ///
    /// A circular tail link is cleared along with the rest. The nodes
    /// themselves are not otherwise touched.
    pub fn deinit(&mut self) {
        let mut unlinked = 0;
        if let Some(head) = self.head {
            let mut node = Some(head);
            while let Some(n) = node {
                if unlinked == self.len {
                    break;
                }
                // Read the successor before the link is gone. The tail's
                // link is never followed.
                node = if unlinked + 1 < self.len {
                    self.ops.get_link(head, n, self.info.link_offset)
                } else {
                    None
                };
                self.unlink(n);
                unlinked += 1;
            }
        }
        self.reset_info();
        trace!(Trace::DeInit { unlinked });
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<NodeAddr> {
        self.head
    }

    pub fn tail(&self) -> Option<NodeAddr> {
        self.tail
    }

    /// The node the tail links back to, if the queue is circular.
    #[cfg(feature = "circular-link")]
    pub fn first_circular_node(&self) -> Option<NodeAddr> {
        self.first_circular
    }

    pub fn is_circular(&self) -> bool {
        #[cfg(feature = "circular-link")]
        {
            self.first_circular.is_some()
        }
        #[cfg(not(feature = "circular-link"))]
        {
            false
        }
    }

    pub fn node_info(&self) -> NodeInfo {
        self.info
    }

    pub fn addressing_mode(&self) -> AddressingMode {
        self.info.mode
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn contains(&self, node: NodeAddr) -> bool {
        self.locate(node).is_some()
    }

    /// Iterates over the nodes in link order, head first. Stops after the
    /// tail even if the queue is circular.
    pub fn iter(&self) -> Iter<'_, O> {
        Iter {
            queue: self,
            next: self.head,
            remaining: self.len,
        }
    }

    /// Returns the node that follows `node`, which must be in the queue.
    ///
    /// The tail is followed by the first circular node, or by nothing.
    pub fn next_of(&self, node: NodeAddr) -> Option<NodeAddr> {
        let head = self.head?;
        if Some(node) == self.tail {
            #[cfg(feature = "circular-link")]
            return self.first_circular;
            #[cfg(not(feature = "circular-link"))]
            return None;
        }
        self.ops.get_link(head, node, self.info.link_offset)
    }

    /// Links `new` in after `anchor`, or at the head if `anchor` is `None`.
    pub fn insert_node(
        &mut self,
        anchor: Option<NodeAddr>,
        new: NodeAddr,
    ) -> Result<(), QError> {
        let Some(anchor) = anchor else {
            return self.insert_node_head(new);
        };
        self.ensure_linear()?;

        let Some(head) = self.head else {
            trace!(Trace::NotFound(anchor.get()));
            return Err(QError::NodeNotFound);
        };
        if Some(anchor) == self.tail {
            return self.insert_node_tail(new);
        }

        self.find_node(anchor)?;
        self.check_placement(new, Placement::AboveHead)?;
        let next = self.link(head, anchor)?;

        self.set(Some(head), new, Some(next));
        self.set(Some(head), anchor, Some(new));
        self.len += 1;
        trace!(Trace::Inserted(new.get()));
        Ok(())
    }

    pub fn insert_node_head(&mut self, new: NodeAddr) -> Result<(), QError> {
        self.ensure_linear()?;

        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            self.adopt_single(new);
            return Ok(());
        };

        self.check_placement(
            new,
            Placement::Below {
                start: head,
                count: self.len,
            },
        )?;
        if self.is_base_offset() {
            self.set(Some(new), new, Some(head));
            self.rebase(head, new, head, self.len - 1);
            self.set(Some(new), tail, None);
        } else {
            self.set(Some(new), new, Some(head));
        }

        self.head = Some(new);
        self.len += 1;
        trace!(Trace::Inserted(new.get()));
        Ok(())
    }

    pub fn insert_node_tail(&mut self, new: NodeAddr) -> Result<(), QError> {
        self.ensure_linear()?;

        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            self.adopt_single(new);
            return Ok(());
        };
        self.check_placement(new, Placement::AboveHead)?;

        self.set(Some(head), new, None);
        self.set(Some(head), tail, Some(new));
        self.tail = Some(new);
        self.len += 1;
        trace!(Trace::Inserted(new.get()));
        Ok(())
    }

    /// Unlinks `node`, wherever it is in the queue, and clears its link.
    pub fn remove_node(&mut self, node: NodeAddr) -> Result<(), QError> {
        self.ensure_linear()?;

        if Some(node) == self.head {
            return self.remove_node_head();
        }
        let prev = self.find_node(node)?;
        let (Some(head), Some(prev)) = (self.head, prev) else {
            // Only the head has no predecessor, and that was handled above.
            return Err(QError::NodeNotFound);
        };

        if Some(node) == self.tail {
            self.set(Some(head), prev, None);
            self.tail = Some(prev);
        } else {
            let next = self.link(head, node)?;
            self.set(Some(head), prev, Some(next));
        }
        self.unlink(node);
        self.len -= 1;
        trace!(Trace::Removed(node.get()));
        Ok(())
    }

    pub fn remove_node_head(&mut self) -> Result<(), QError> {
        self.ensure_linear()?;
        let (head, tail) = self.require_nonempty()?;

        if self.len == 1 {
            self.unlink(head);
            self.reset_info();
            trace!(Trace::Removed(head.get()));
            return Ok(());
        }

        let new_head = self.link(head, head)?;
        if self.is_base_offset() {
            // Everything behind the new head has to sit above it. With two
            // nodes there is nothing behind it, and its link is the
            // terminator, which must not be followed.
            let behind = self.len - 2;
            if behind > 0 {
                let start = self.link(head, new_head)?;
                self.check_placement(
                    new_head,
                    Placement::Below {
                        start,
                        count: behind,
                    },
                )?;
            }
            self.rebase(head, new_head, new_head, behind);
            self.set(Some(new_head), tail, None);
        }

        self.unlink(head);
        self.head = Some(new_head);
        self.len -= 1;
        trace!(Trace::Removed(head.get()));
        Ok(())
    }

    pub fn remove_node_tail(&mut self) -> Result<(), QError> {
        self.ensure_linear()?;
        let (head, tail) = self.require_nonempty()?;

        let Some(prev) = self.find_node(tail)? else {
            // The tail is also the head.
            return self.remove_node_head();
        };

        self.set(Some(head), prev, None);
        self.unlink(tail);
        self.tail = Some(prev);
        self.len -= 1;
        trace!(Trace::Removed(tail.get()));
        Ok(())
    }

    /// Puts `new` in the place of `old`, which is unlinked and cleared.
    pub fn replace_node(
        &mut self,
        old: NodeAddr,
        new: NodeAddr,
    ) -> Result<(), QError> {
        self.ensure_linear()?;

        if Some(old) == self.head {
            return self.replace_node_head(new);
        }
        if Some(old) == self.tail {
            return self.replace_node_tail(new);
        }

        let prev = self.find_node(old)?;
        let (Some(head), Some(prev)) = (self.head, prev) else {
            return Err(QError::NodeNotFound);
        };
        if old == new {
            return Ok(());
        }
        self.check_placement(new, Placement::AboveHead)?;
        let next = self.link(head, old)?;

        self.set(Some(head), new, Some(next));
        self.set(Some(head), prev, Some(new));
        self.unlink(old);
        trace!(Trace::Replaced {
            old: old.get(),
            new: new.get()
        });
        Ok(())
    }

    pub fn replace_node_head(&mut self, new: NodeAddr) -> Result<(), QError> {
        self.ensure_linear()?;
        let (head, tail) = self.require_nonempty()?;
        if head == new {
            return Ok(());
        }

        if self.len == 1 {
            self.set(Some(new), new, None);
            self.unlink(head);
            self.head = Some(new);
            self.tail = Some(new);
        } else {
            let second = self.link(head, head)?;
            self.check_placement(
                new,
                Placement::Below {
                    start: second,
                    count: self.len - 1,
                },
            )?;
            if self.is_base_offset() {
                self.set(Some(new), new, Some(second));
                self.rebase(head, new, second, self.len - 2);
                self.set(Some(new), tail, None);
            } else {
                self.set(Some(new), new, Some(second));
            }
            self.unlink(head);
            self.head = Some(new);
        }

        trace!(Trace::Replaced {
            old: head.get(),
            new: new.get()
        });
        Ok(())
    }

    pub fn replace_node_tail(&mut self, new: NodeAddr) -> Result<(), QError> {
        self.ensure_linear()?;
        let (head, tail) = self.require_nonempty()?;
        if tail == new {
            return Ok(());
        }

        let Some(prev) = self.find_node(tail)? else {
            return self.replace_node_head(new);
        };
        self.check_placement(new, Placement::AboveHead)?;

        self.set(Some(head), new, None);
        self.set(Some(head), prev, Some(new));
        self.unlink(tail);
        self.tail = Some(new);
        trace!(Trace::Replaced {
            old: tail.get(),
            new: new.get()
        });
        Ok(())
    }

    /// Moves every node of `src` into this queue, after `anchor`, or at the
    /// head if `anchor` is `None`. `src` is left empty.
    ///
    /// If this queue is empty it takes over `src`'s chain as is, whatever
    /// `anchor` says.
    pub fn insert_q(
        &mut self,
        src: &mut Self,
        anchor: Option<NodeAddr>,
    ) -> Result<(), QError> {
        self.splice(src, anchor)
    }

    pub fn insert_q_head(&mut self, src: &mut Self) -> Result<(), QError> {
        self.splice(src, None)
    }

    pub fn insert_q_tail(&mut self, src: &mut Self) -> Result<(), QError> {
        let tail = self.tail;
        self.splice(src, tail)
    }

    /// Links the tail back to `node`, making the queue circular.
    #[cfg(feature = "circular-link")]
    pub fn set_circular_link(&mut self, node: NodeAddr) -> Result<(), QError> {
        let (head, tail) = self.require_nonempty()?;
        self.find_node(node)?;
        self.close_loop(head, tail, node);
        Ok(())
    }

    #[cfg(feature = "circular-link")]
    pub fn set_circular_link_head(&mut self) -> Result<(), QError> {
        let (head, tail) = self.require_nonempty()?;
        self.close_loop(head, tail, head);
        Ok(())
    }

    #[cfg(feature = "circular-link")]
    pub fn set_circular_link_tail(&mut self) -> Result<(), QError> {
        let (head, tail) = self.require_nonempty()?;
        self.close_loop(head, tail, tail);
        Ok(())
    }

    /// Terminates the chain at the tail again.
    #[cfg(feature = "circular-link")]
    pub fn clear_circular_link(&mut self) -> Result<(), QError> {
        let (head, tail) = self.require_nonempty()?;
        self.set(Some(head), tail, None);
        self.first_circular = None;
        trace!(Trace::CircularCleared);
        Ok(())
    }

    #[cfg(feature = "circular-link")]
    fn close_loop(&mut self, head: NodeAddr, tail: NodeAddr, node: NodeAddr) {
        self.set(Some(head), tail, Some(node));
        self.first_circular = Some(node);
        trace!(Trace::CircularSet(node.get()));
    }

    fn splice(
        &mut self,
        src: &mut Self,
        anchor: Option<NodeAddr>,
    ) -> Result<(), QError> {
        self.ensure_linear()?;
        src.ensure_linear()?;
        if self.info != src.info {
            if cfg!(feature = "check-param") {
                trace!(Trace::Refused(Refusal::LayoutMismatch));
                return Err(QError::InvalidParameter);
            }
            debug_assert!(false, "splicing queues with different node layouts");
        }

        let (Some(src_head), Some(src_tail)) = (src.head, src.tail) else {
            return Ok(());
        };
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            self.head = Some(src_head);
            self.tail = Some(src_tail);
            self.len = src.len;
            src.reset_info();
            trace!(Trace::Spliced {
                head: src_head.get(),
                count: self.len
            });
            return Ok(());
        };
        let count = src.len;

        match anchor {
            None => {
                self.check_placement(
                    src_head,
                    Placement::Below {
                        start: head,
                        count: self.len,
                    },
                )?;
                if self.is_base_offset() {
                    // The source head becomes ours, so its own chain is
                    // already relative to the right node. Ours is not.
                    self.set(Some(src_head), src_tail, Some(head));
                    self.rebase(head, src_head, head, self.len - 1);
                    self.set(Some(src_head), tail, None);
                } else {
                    self.set(Some(src_head), src_tail, Some(head));
                }
                self.head = Some(src_head);
            }
            Some(anchor) => {
                let at_tail = anchor == tail;
                let next = if at_tail {
                    None
                } else {
                    self.find_node(anchor)?;
                    Some(self.link(head, anchor)?)
                };

                src.check_placement(
                    head,
                    Placement::Below {
                        start: src_head,
                        count,
                    },
                )?;
                if self.is_base_offset() {
                    src.rebase_chain(head);
                }
                self.set(Some(head), src_tail, next);
                self.set(Some(head), anchor, Some(src_head));
                if at_tail {
                    self.tail = Some(src_tail);
                }
            }
        }

        self.len += count;
        src.reset_info();
        trace!(Trace::Spliced {
            head: src_head.get(),
            count
        });
        Ok(())
    }

    fn set(
        &self,
        head: Option<NodeAddr>,
        node: NodeAddr,
        next: Option<NodeAddr>,
    ) {
        self.ops.set_link(head, node, next, self.info.link_offset);
    }

    /// Clears the link of a node that is leaving the queue.
    fn unlink(&self, node: NodeAddr) {
        self.set(None, node, None);
    }

    /// Reads the successor of a node that is known not to be the tail.
    fn link(&self, head: NodeAddr, node: NodeAddr) -> Result<NodeAddr, QError> {
        match self.ops.get_link(head, node, self.info.link_offset) {
            Some(next) => Ok(next),
            None => {
                trace!(Trace::NotFound(node.get()));
                Err(QError::NodeNotFound)
            }
        }
    }

    fn adopt_single(&mut self, node: NodeAddr) {
        self.set(Some(node), node, None);
        self.head = Some(node);
        self.tail = Some(node);
        self.len = 1;
        trace!(Trace::Inserted(node.get()));
    }

    fn reset_info(&mut self) {
        self.head = None;
        self.tail = None;
        #[cfg(feature = "circular-link")]
        {
            self.first_circular = None;
        }
        self.len = 0;
    }

    fn require_nonempty(&self) -> Result<(NodeAddr, NodeAddr), QError> {
        match (self.head, self.tail) {
            (Some(head), Some(tail)) => Ok((head, tail)),
            _ => {
                trace!(Trace::Refused(Refusal::Empty));
                Err(QError::InvalidParameter)
            }
        }
    }

    fn ensure_linear(&self) -> Result<(), QError> {
        if !self.is_circular() {
            return Ok(());
        }
        if cfg!(feature = "check-param") {
            trace!(Trace::Refused(Refusal::Circular));
            return Err(QError::InvalidParameter);
        }
        debug_assert!(false, "structural edit of a circular queue");
        Ok(())
    }

    fn is_base_offset(&self) -> bool {
        #[cfg(feature = "base-offset-addr")]
        {
            self.info.mode == AddressingMode::BaseOffset
        }
        #[cfg(not(feature = "base-offset-addr"))]
        {
            false
        }
    }

    /// Finds `target` and returns its predecessor, `None` for the head.
    ///
    /// The walk visits at most `len` nodes and never follows the tail's
    /// link, so it terminates on circular queues too.
    fn locate(&self, target: NodeAddr) -> Option<Option<NodeAddr>> {
        let head = self.head?;
        let mut prev = None;
        let mut node = head;
        for visited in 1..=self.len {
            if node == target {
                return Some(prev);
            }
            if visited == self.len {
                break;
            }
            prev = Some(node);
            node = self.ops.get_link(head, node, self.info.link_offset)?;
        }
        None
    }

    fn find_node(&self, target: NodeAddr) -> Result<Option<NodeAddr>, QError> {
        match self.locate(target) {
            Some(prev) => Ok(prev),
            None => {
                trace!(Trace::NotFound(target.get()));
                Err(QError::NodeNotFound)
            }
        }
    }

    /// Checks that `candidate` can be placed according to `rule` before
    /// anything is written.
    ///
    /// Every link that the operation will write has to be within reach of
    /// the link format ([`DescOps::can_link`]). In base-offset addressing the
    /// ordering rule applies as well, and a new head rewrites every link
    /// behind it, so the whole span is walked. In direct addressing only the
    /// link from a new head to `start` is new.
    fn check_placement(
        &self,
        candidate: NodeAddr,
        rule: Placement,
    ) -> Result<(), QError> {
        let Some(head) = self.head else {
            return Ok(());
        };
        let base_offset = self.is_base_offset();

        let fits = match rule {
            Placement::AboveHead => {
                (!base_offset || candidate > head)
                    && self.ops.can_link(head, candidate)
            }
            Placement::Below { start, count } => {
                let count = if base_offset { count } else { count.min(1) };
                let mut node = start;
                let mut fits = true;
                for visited in 1..=count {
                    if (base_offset && node <= candidate)
                        || !self.ops.can_link(candidate, node)
                    {
                        fits = false;
                        break;
                    }
                    if visited < count {
                        node = self.link(head, node)?;
                    }
                }
                fits
            }
        };

        if fits {
            Ok(())
        } else {
            trace!(Trace::Unrepresentable(candidate.get()));
            Err(QError::Unrepresentable)
        }
    }

    /// Rewrites the links of `count` consecutive nodes starting at `first`,
    /// currently relative to `old_head`, to be relative to `new_head`.
    ///
    /// Callers have already walked the same span in `check_placement`, so
    /// the links are known to decode.
    fn rebase(
        &self,
        old_head: NodeAddr,
        new_head: NodeAddr,
        first: NodeAddr,
        count: u32,
    ) {
        let mut node = first;
        for _ in 0..count {
            let Some(next) =
                self.ops.get_link(old_head, node, self.info.link_offset)
            else {
                break;
            };
            self.set(Some(new_head), node, Some(next));
            node = next;
        }
    }

    /// Rewrites this queue's whole chain relative to `new_head`, ahead of
    /// splicing it into another queue.
    fn rebase_chain(&self, new_head: NodeAddr) {
        if let Some(head) = self.head {
            self.rebase(head, new_head, head, self.len.saturating_sub(1));
        }
    }
}

impl<'a, O: DescOps> IntoIterator for &'a Queue<O> {
    type Item = NodeAddr;
    type IntoIter = Iter<'a, O>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the nodes of a [`Queue`], from [`Queue::iter`].
pub struct Iter<'a, O: DescOps> {
    queue: &'a Queue<O>,
    next: Option<NodeAddr>,
    remaining: u32,
}

impl<O: DescOps> Iterator for Iter<'_, O> {
    type Item = NodeAddr;

    fn next(&mut self) -> Option<NodeAddr> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.next?;
        self.remaining -= 1;
        self.next = match self.queue.head {
            Some(head) if self.remaining > 0 => self.queue.ops.get_link(
                head,
                node,
                self.queue.info.link_offset,
            ),
            _ => None,
        };
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

#[cfg(all(
    test,
    feature = "direct-addr",
    feature = "base-offset-addr",
    feature = "circular-link",
    feature = "check-param"
))]
mod tests {
    use super::*;
    use crate::fakes::FakeRam;
    use crate::ops::{BaseOffsetLinks, DirectLinks};
    use crate::LinkMemory;

    const DIRECT_LINK: u32 = 20;
    const OFFSET_LINK: u32 = 4;
    const OFFSET_MASK: u32 = 0x3ffc;

    fn direct(ram: &FakeRam) -> Queue<DirectLinks<&FakeRam>> {
        Queue::new(DirectLinks::new(ram, DIRECT_LINK))
    }

    fn offset(ram: &FakeRam) -> Queue<BaseOffsetLinks<&FakeRam>> {
        Queue::new(BaseOffsetLinks::new(ram, OFFSET_LINK, OFFSET_MASK))
    }

    /// Offsets of up to 0x7c: the head and the three nodes above it.
    fn short_reach(ram: &FakeRam) -> Queue<BaseOffsetLinks<&FakeRam>> {
        Queue::new(BaseOffsetLinks::new(ram, OFFSET_LINK, 0x7c))
    }

    fn nodes<O: DescOps>(q: &Queue<O>) -> Vec<NodeAddr> {
        q.iter().collect()
    }

    /// Walks the chain by hand and checks it against head, tail and count.
    fn check<O: DescOps>(q: &Queue<O>) {
        let Some(head) = q.head() else {
            assert_eq!(q.len(), 0);
            assert_eq!(q.tail(), None);
            return;
        };
        let mut node = head;
        for _ in 1..q.len() {
            node = q.next_of(node).unwrap();
        }
        assert_eq!(Some(node), q.tail());
        if q.addressing_mode() == AddressingMode::BaseOffset {
            assert!(q.iter().skip(1).all(|n| n > head));
        }
    }

    #[test]
    fn new_queue_is_empty() {
        let ram = FakeRam::new();
        let q = direct(&ram);
        assert!(q.is_empty());
        assert_eq!((q.head(), q.tail(), q.len()), (None, None, 0));
        assert_eq!(q.node_info().link_offset, DIRECT_LINK);
        assert!(!q.is_circular());
        assert_eq!(q.iter().count(), 0);
    }

    #[test]
    fn head_tail_and_middle_inserts() {
        let ram = FakeRam::new();
        let (a, b, c) = (ram.node(0), ram.node(1), ram.node(2));
        let mut q = direct(&ram);

        q.insert_node_head(a).unwrap();
        q.insert_node_tail(b).unwrap();
        q.insert_node(Some(a), c).unwrap();

        assert_eq!(nodes(&q), [a, c, b]);
        assert_eq!(q.len(), 3);
        assert_eq!(ram.read(a.field(DIRECT_LINK)), c.get());
        assert_eq!(ram.read(c.field(DIRECT_LINK)), b.get());
        assert_eq!(ram.read(b.field(DIRECT_LINK)), 0);
        check(&q);
    }

    #[test]
    fn insert_after_tail_moves_tail() {
        let ram = FakeRam::new();
        let (a, b) = (ram.node(0), ram.node(1));
        let mut q = direct(&ram);
        q.insert_node_tail(a).unwrap();
        q.insert_node(Some(a), b).unwrap();
        assert_eq!(q.tail(), Some(b));
        check(&q);
    }

    #[test]
    fn new_tail_link_is_terminated() {
        let ram = FakeRam::new();
        let (a, b) = (ram.node(0), ram.node(1));
        // Left over from some other chain.
        ram.write(b.field(DIRECT_LINK), 0xdead_beec);

        let mut q = direct(&ram);
        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        assert_eq!(ram.read(b.field(DIRECT_LINK)), 0);
    }

    #[test]
    fn insert_after_missing_anchor() {
        let ram = FakeRam::new();
        let (a, b, x) = (ram.node(0), ram.node(1), ram.node(9));
        let mut q = direct(&ram);

        assert_eq!(q.insert_node(Some(x), a), Err(QError::NodeNotFound));
        assert!(q.is_empty());

        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        let before = ram.words();
        assert_eq!(
            q.insert_node(Some(x), ram.node(3)),
            Err(QError::NodeNotFound)
        );
        assert_eq!(ram.words(), before);
        assert_eq!(nodes(&q), [a, b]);
    }

    #[test]
    fn removes_from_every_position() {
        let ram = FakeRam::new();
        let n: Vec<_> = (0..5).map(|i| ram.node(i)).collect();
        let mut q = direct(&ram);
        for &node in &n {
            q.insert_node_tail(node).unwrap();
        }

        q.remove_node(n[2]).unwrap();
        assert_eq!(nodes(&q), [n[0], n[1], n[3], n[4]]);
        assert_eq!(ram.read(n[2].field(DIRECT_LINK)), 0);

        q.remove_node(n[4]).unwrap();
        assert_eq!(q.tail(), Some(n[3]));
        q.remove_node_head().unwrap();
        assert_eq!(q.head(), Some(n[1]));
        q.remove_node_tail().unwrap();
        assert_eq!(nodes(&q), [n[1]]);
        check(&q);

        q.remove_node_tail().unwrap();
        assert!(q.is_empty());
        assert_eq!(q.remove_node_head(), Err(QError::InvalidParameter));
        assert_eq!(q.remove_node_tail(), Err(QError::InvalidParameter));
        assert_eq!(q.remove_node(n[0]), Err(QError::NodeNotFound));
    }

    #[test]
    fn replaces_in_every_position() {
        let ram = FakeRam::new();
        let n: Vec<_> = (0..6).map(|i| ram.node(i)).collect();
        let mut q = direct(&ram);
        for &node in &n[..3] {
            q.insert_node_tail(node).unwrap();
        }

        q.replace_node(n[1], n[4]).unwrap();
        q.replace_node_head(n[3]).unwrap();
        q.replace_node_tail(n[5]).unwrap();
        assert_eq!(nodes(&q), [n[3], n[4], n[5]]);
        assert_eq!(q.len(), 3);
        for old in &n[..3] {
            assert_eq!(ram.read(old.field(DIRECT_LINK)), 0);
        }
        check(&q);

        assert_eq!(q.replace_node(n[0], n[1]), Err(QError::NodeNotFound));
    }

    #[test]
    fn replace_only_node() {
        let ram = FakeRam::new();
        let (a, b) = (ram.node(0), ram.node(1));
        let mut q = offset(&ram);
        q.insert_node_tail(b).unwrap();
        q.replace_node_tail(a).unwrap();
        assert_eq!((q.head(), q.tail(), q.len()), (Some(a), Some(a), 1));
    }

    #[test]
    fn deinit_clears_links() {
        let ram = FakeRam::new();
        let (a, b, c) = (ram.node(0), ram.node(1), ram.node(2));
        let mut q = direct(&ram);
        for node in [a, b, c] {
            q.insert_node_tail(node).unwrap();
        }
        q.set_circular_link_head().unwrap();

        q.deinit();
        assert!(q.is_empty());
        assert!(!q.is_circular());
        assert!(ram.words().iter().all(|&w| w == 0));

        q.deinit();
        assert!(q.is_empty());
    }

    #[test]
    fn circular_queue_refuses_edits() {
        let ram = FakeRam::new();
        let (a, b, x) = (ram.node(0), ram.node(1), ram.node(2));
        let mut q = direct(&ram);
        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();

        q.set_circular_link(a).unwrap();
        assert_eq!(q.first_circular_node(), Some(a));
        assert_eq!(ram.read(b.field(DIRECT_LINK)), a.get());
        assert_eq!(q.next_of(b), Some(a));
        assert_eq!(q.iter().count(), 2);
        assert!(q.contains(b));

        assert_eq!(q.insert_node_tail(x), Err(QError::InvalidParameter));
        assert_eq!(q.remove_node(b), Err(QError::InvalidParameter));
        assert_eq!(q.replace_node_tail(x), Err(QError::InvalidParameter));

        q.clear_circular_link().unwrap();
        assert_eq!(ram.read(b.field(DIRECT_LINK)), 0);
        assert_eq!(q.next_of(b), None);
        q.insert_node_tail(x).unwrap();
        check(&q);
    }

    #[test]
    fn circular_link_needs_a_member() {
        let ram = FakeRam::new();
        let mut q = direct(&ram);
        assert_eq!(q.set_circular_link_tail(), Err(QError::InvalidParameter));
        assert_eq!(q.clear_circular_link(), Err(QError::InvalidParameter));

        q.insert_node_tail(ram.node(0)).unwrap();
        assert_eq!(
            q.set_circular_link(ram.node(1)),
            Err(QError::NodeNotFound)
        );
        assert!(!q.is_circular());
    }

    #[test]
    fn splice_at_each_position() {
        let ram = FakeRam::new();
        let n: Vec<_> = (0..6).map(|i| ram.node(i)).collect();
        let mut dest = direct(&ram);
        dest.insert_node_tail(n[0]).unwrap();
        dest.insert_node_tail(n[1]).unwrap();

        let mut src = direct(&ram);
        src.insert_node_tail(n[2]).unwrap();
        src.insert_node_tail(n[3]).unwrap();
        dest.insert_q(&mut src, Some(n[0])).unwrap();
        assert_eq!(nodes(&dest), [n[0], n[2], n[3], n[1]]);
        assert!(src.is_empty());

        src.insert_node_tail(n[4]).unwrap();
        dest.insert_q_head(&mut src).unwrap();
        src.insert_node_tail(n[5]).unwrap();
        dest.insert_q_tail(&mut src).unwrap();
        assert_eq!(nodes(&dest), [n[4], n[0], n[2], n[3], n[1], n[5]]);
        assert_eq!(dest.len(), 6);
        check(&dest);
    }

    #[test]
    fn splice_into_empty_adopts_source() {
        let ram = FakeRam::new();
        let (a, b) = (ram.node(0), ram.node(1));
        let mut dest = direct(&ram);
        let mut src = direct(&ram);
        src.insert_node_tail(a).unwrap();
        src.insert_node_tail(b).unwrap();

        dest.insert_q(&mut src, Some(ram.node(7))).unwrap();
        assert_eq!(nodes(&dest), [a, b]);
        assert!(src.is_empty());

        // And an empty source changes nothing.
        dest.insert_q_tail(&mut src).unwrap();
        assert_eq!(dest.len(), 2);
    }

    #[test]
    fn splice_needs_matching_layout() {
        let ram = FakeRam::new();
        let mut dest = direct(&ram);
        let mut src = Queue::new(DirectLinks::new(&ram, 8));
        src.insert_node_tail(ram.node(0)).unwrap();
        assert_eq!(dest.insert_q_head(&mut src), Err(QError::InvalidParameter));
        assert_eq!(src.len(), 1);
    }

    #[test]
    fn base_offset_links_are_head_relative() {
        let ram = FakeRam::new();
        let (a, b, c) = (ram.node(1), ram.node(3), ram.node(5));
        let mut q = offset(&ram);
        q.insert_node_tail(b).unwrap();
        q.insert_node_tail(c).unwrap();
        q.insert_node_head(a).unwrap();

        assert_eq!(nodes(&q), [a, b, c]);
        assert_eq!(ram.read(a.field(OFFSET_LINK)), b.get() - a.get());
        assert_eq!(ram.read(b.field(OFFSET_LINK)), c.get() - a.get());
        assert_eq!(ram.read(c.field(OFFSET_LINK)), 0);
        check(&q);
    }

    #[test]
    fn base_offset_refuses_node_below_head() {
        let ram = FakeRam::new();
        let (a, b, low) = (ram.node(2), ram.node(4), ram.node(1));
        let mut q = offset(&ram);
        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();

        let before = ram.words();
        assert_eq!(q.insert_node_tail(low), Err(QError::Unrepresentable));
        assert_eq!(q.insert_node(Some(a), low), Err(QError::Unrepresentable));
        assert_eq!(
            q.insert_node_head(ram.node(3)),
            Err(QError::Unrepresentable)
        );
        assert_eq!(q.replace_node_tail(low), Err(QError::Unrepresentable));
        assert_eq!(ram.words(), before);
        assert_eq!(nodes(&q), [a, b]);
    }

    #[test]
    fn base_offset_remove_head_rebases() {
        let ram = FakeRam::new();
        let (a, b, c, d) = (ram.node(0), ram.node(1), ram.node(2), ram.node(3));
        let mut q = offset(&ram);
        for node in [a, b, c, d] {
            q.insert_node_tail(node).unwrap();
        }

        q.remove_node_head().unwrap();
        assert_eq!(nodes(&q), [b, c, d]);
        assert_eq!(ram.read(b.field(OFFSET_LINK)), c.get() - b.get());
        assert_eq!(ram.read(c.field(OFFSET_LINK)), d.get() - b.get());
        assert_eq!(ram.read(a.field(OFFSET_LINK)), 0);

        q.remove_node_head().unwrap();
        q.remove_node_head().unwrap();
        assert_eq!(nodes(&q), [d]);
        check(&q);
    }

    #[test]
    fn base_offset_remove_head_keeps_ordering() {
        let ram = FakeRam::new();
        let (a, b, c) = (ram.node(0), ram.node(4), ram.node(2));
        let mut q = offset(&ram);
        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        q.insert_node_tail(c).unwrap();

        // `c` would end up behind a head that sits above it.
        let before = ram.words();
        assert_eq!(q.remove_node_head(), Err(QError::Unrepresentable));
        assert_eq!(ram.words(), before);
        assert_eq!(q.len(), 3);

        // Removing it from the middle is fine.
        q.remove_node(b).unwrap();
        q.remove_node_head().unwrap();
        assert_eq!(nodes(&q), [c]);
    }

    #[test]
    fn base_offset_replace_head() {
        let ram = FakeRam::new();
        let (a, b, c, new) =
            (ram.node(2), ram.node(3), ram.node(4), ram.node(1));
        let mut q = offset(&ram);
        for node in [a, b, c] {
            q.insert_node_tail(node).unwrap();
        }

        q.replace_node_head(new).unwrap();
        assert_eq!(nodes(&q), [new, b, c]);
        assert_eq!(ram.read(new.field(OFFSET_LINK)), b.get() - new.get());
        assert_eq!(ram.read(b.field(OFFSET_LINK)), c.get() - new.get());
        check(&q);

        assert_eq!(
            q.replace_node_head(ram.node(6)),
            Err(QError::Unrepresentable)
        );
    }

    #[test]
    fn base_offset_splice_rebases_both_sides() {
        let ram = FakeRam::new();
        let n: Vec<_> = (0..6).map(|i| ram.node(i)).collect();

        let mut dest = offset(&ram);
        dest.insert_node_tail(n[2]).unwrap();
        dest.insert_node_tail(n[3]).unwrap();
        let mut src = offset(&ram);
        src.insert_node_tail(n[0]).unwrap();
        src.insert_node_tail(n[1]).unwrap();
        dest.insert_q_head(&mut src).unwrap();
        assert_eq!(nodes(&dest), [n[0], n[1], n[2], n[3]]);
        check(&dest);

        src.insert_node_tail(n[4]).unwrap();
        src.insert_node_tail(n[5]).unwrap();
        dest.insert_q(&mut src, Some(n[1])).unwrap();
        assert_eq!(nodes(&dest), [n[0], n[1], n[4], n[5], n[2], n[3]]);
        assert_eq!(
            ram.read(n[4].field(OFFSET_LINK)),
            n[5].get() - n[0].get()
        );
        check(&dest);
    }

    #[test]
    fn base_offset_refuses_links_out_of_reach() {
        let ram = FakeRam::new();
        let mut q = short_reach(&ram);
        let (a, b, far, low) =
            (ram.node(2), ram.node(5), ram.node(6), ram.node(1));
        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        let mem = q.ops().memory();
        assert_eq!(mem.read(a.field(OFFSET_LINK)), b.get() - a.get());

        let before = ram.words();
        assert_eq!(q.insert_node_tail(far), Err(QError::Unrepresentable));
        assert_eq!(q.insert_node(Some(a), far), Err(QError::Unrepresentable));
        assert_eq!(q.replace_node_tail(far), Err(QError::Unrepresentable));
        // Below `a` is fine, but `b` would be out of reach of `low`.
        assert_eq!(q.insert_node_head(low), Err(QError::Unrepresentable));
        assert_eq!(q.replace_node_head(low), Err(QError::Unrepresentable));
        assert_eq!(ram.words(), before);
        assert_eq!(nodes(&q), [a, b]);

        let mut src = short_reach(&ram);
        src.insert_node_tail(ram.node(4)).unwrap();
        src.insert_node_tail(far).unwrap();
        let before = ram.words();
        assert_eq!(q.insert_q_tail(&mut src), Err(QError::Unrepresentable));
        assert_eq!(ram.words(), before);
        assert_eq!((q.len(), src.len()), (2, 2));

        src.remove_node_tail().unwrap();
        q.insert_q(&mut src, Some(a)).unwrap();
        assert_eq!(nodes(&q), [a, ram.node(4), b]);
        check(&q);
    }

    #[test]
    fn base_offset_splice_refuses_low_source() {
        let ram = FakeRam::new();
        let mut dest = offset(&ram);
        dest.insert_node_tail(ram.node(2)).unwrap();
        dest.insert_node_tail(ram.node(3)).unwrap();
        let mut src = offset(&ram);
        src.insert_node_tail(ram.node(1)).unwrap();

        let before = ram.words();
        assert_eq!(dest.insert_q_tail(&mut src), Err(QError::Unrepresentable));
        assert_eq!(ram.words(), before);
        assert_eq!((dest.len(), src.len()), (2, 1));
    }
}

// The modules below only build under non-default feature sets, e.g.
// `--no-default-features --features direct-addr`.

#[cfg(all(test, feature = "direct-addr", not(feature = "circular-link")))]
mod linear_tests {
    use super::*;
    use crate::fakes::FakeRam;
    use crate::ops::DirectLinks;
    use crate::LinkMemory;

    #[test]
    fn tail_is_followed_by_nothing() {
        let ram = FakeRam::new();
        let mut q = Queue::new(DirectLinks::new(&ram, 8));
        let (a, b, c) = (ram.node(0), ram.node(1), ram.node(2));

        q.insert_node_tail(b).unwrap();
        q.insert_node_head(a).unwrap();
        q.insert_node(Some(b), c).unwrap();
        assert!(!q.is_circular());
        assert_eq!(q.iter().collect::<Vec<_>>(), [a, b, c]);
        assert_eq!(q.next_of(c), None);
        assert_eq!(ram.read(c.field(8)), 0);

        q.remove_node(b).unwrap();
        assert_eq!(ram.read(a.field(8)), c.get());
        q.deinit();
        assert!(ram.words().iter().all(|&w| w == 0));
    }
}

#[cfg(all(test, feature = "base-offset-addr", not(feature = "direct-addr")))]
mod base_offset_only_tests {
    use super::*;
    use crate::fakes::FakeRam;
    use crate::ops::BaseOffsetLinks;
    use crate::LinkMemory;

    #[test]
    fn ordering_still_enforced() {
        let ram = FakeRam::new();
        let mut q = Queue::new(BaseOffsetLinks::new(&ram, 0, 0x3ffc));
        let (a, b, low) = (ram.node(2), ram.node(3), ram.node(1));

        q.insert_node_tail(a).unwrap();
        q.insert_node_tail(b).unwrap();
        assert_eq!(q.addressing_mode(), AddressingMode::BaseOffset);
        assert_eq!(q.insert_node_tail(low), Err(QError::Unrepresentable));

        q.insert_node_head(low).unwrap();
        assert_eq!(ram.read(a.get()), b.get() - low.get());
        assert_eq!(q.iter().collect::<Vec<_>>(), [low, a, b]);
    }
}

#[cfg(all(
    test,
    feature = "direct-addr",
    feature = "circular-link",
    not(feature = "check-param")
))]
mod unchecked_tests {
    use super::*;
    use crate::fakes::FakeRam;
    use crate::ops::DirectLinks;

    #[test]
    #[should_panic(expected = "structural edit of a circular queue")]
    fn editing_a_circular_queue_asserts() {
        let ram = FakeRam::new();
        let mut q = Queue::new(DirectLinks::new(&ram, 8));
        q.insert_node_tail(ram.node(0)).unwrap();
        q.set_circular_link_head().unwrap();
        let _ = q.insert_node_tail(ram.node(1));
    }

    #[test]
    #[should_panic(expected = "splicing queues with different node layouts")]
    fn mismatched_splice_asserts() {
        let ram = FakeRam::new();
        let mut dest = Queue::new(DirectLinks::new(&ram, 8));
        let mut src = Queue::new(DirectLinks::new(&ram, 12));
        src.insert_node_tail(ram.node(0)).unwrap();
        let _ = dest.insert_q_tail(&mut src);
    }

    #[test]
    fn empty_queue_is_refused_anyway() {
        let ram = FakeRam::new();
        let mut q = Queue::new(DirectLinks::new(&ram, 8));
        assert_eq!(q.remove_node_head(), Err(QError::InvalidParameter));
        assert_eq!(q.set_circular_link_head(), Err(QError::InvalidParameter));
    }
}
