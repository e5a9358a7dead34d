// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trace ring for libraries that cannot afford to print
//!
//! This is a static ring buffer of small `Copy` records, meant to be left in
//! driver-support code (descriptor chain builders, interrupt paths) where a
//! formatted log would be too expensive or simply unavailable. The ring is
//! read out after the fact: from a debugger, by dumping the static, or in
//! host tests via [`StaticRingbuf::snapshot`].
//!
//! ## Constraints
//!
//! Payloads must implement `Copy` and `PartialEq`. When a new record has the
//! same source line and payload as the most recent one, the existing entry's
//! `count` is bumped instead of consuming another slot, so a tight retry loop
//! doesn't wipe out the history that led up to it.
//!
//! Access to the static goes through a `critical_section::Mutex`, so records
//! may be appended from thread mode and from interrupt handlers alike. The
//! final binary must provide a critical-section implementation; host tests
//! get one by enabling `critical-section/std`.
//!
//! ## Declaring a ring buffer
//!
//! ```ignore
//! ringbuf!(DMA_RINGBUF, Trace, 16, Trace::None);
//! ```
//!
//! declares a 16-entry ring of `Trace` records, every slot initialized to
//! `Trace::None`. Prefix the name with `pub` to make the static visible to
//! other crates (tests, mostly). The name may be omitted, in which case it
//! defaults to `__RINGBUF`; there can then only be one per module.
//!
//! Records are appended with [`ringbuf_entry!`]:
//!
//! ```ignore
//! ringbuf_entry!(DMA_RINGBUF, Trace::Linked(addr));
//! ```
//!
//! ## Inspecting a ring buffer via GDB
//!
//! ```console
//! (gdb) set print pretty on
//! (gdb) print descq::trace::DESCQ_RINGBUF
//! ```
//!
//! The [`Ringbuf`] sits inside the mutex and its `RefCell`. `last` is the
//! index of the most recent entry, and each entry holds the source `line`, a
//! per-slot `generation` (how many times the slot has been reused), the
//! repeat `count`, and the `payload`.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use critical_section::Mutex;

/// Re-exported so that code generated by the macros can always find it.
pub use critical_section;

/// Declares a ring buffer in the current module.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a static named `NAME` of type
/// [`StaticRingbuf<Type, N>`], with every slot initialized to `expr`.
/// `ringbuf!(pub NAME, ...)` does the same with a public static.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    (pub $name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        pub static $name: $crate::StaticRingbuf<$t, $n> =
            $crate::StaticRingbuf::new($init);
    };
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticRingbuf<$t, $n> =
            $crate::StaticRingbuf::new($init);
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    (pub $name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
    ($t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
}

/// Appends a record to a ring buffer declared with [`ringbuf!`].
///
/// `ringbuf_entry!(NAME, expr)` records `expr`, tagged with the line of the
/// invocation. Without a name, the record goes to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate the payload before touching the buffer, and keep the two
        // from seeing each other's bindings.
        let (p, buf) = ($payload, &$buf);
        $crate::StaticRingbuf::record(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

///
/// A single [`Ringbuf`] slot. A `count` of zero marks a slot that has never
/// been written.
///
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

///
/// A ring buffer of `N` entries of type `T`. Usually reached through a
/// [`StaticRingbuf`] declared with [`ringbuf!`].
///
#[derive(Debug, Copy, Clone)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // A fresh ring has no last entry; treating that as an out-of-range
        // index makes the first record land in slot 0 below.
        let last = self.last.unwrap_or(usize::MAX);

        // `get_mut` also covers a corrupted `last`: we just start over at 0.
        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(count) = ent.count.checked_add(1) {
                    ent.count = count;
                    return;
                }
            }
        }

        // Wrap by comparison rather than remainder: several of our targets
        // have no hardware divide.
        let next = last.wrapping_add(1);
        let ndx = if next >= N { 0 } else { next };

        let Some(ent) = self.buffer.get_mut(ndx) else {
            // Only reachable for a zero-sized ring.
            return;
        };
        *ent = RingbufEntry {
            line,
            generation: ent.generation.wrapping_add(1),
            count: 1,
            payload,
        };
        self.last = Some(ndx);
    }

    /// Returns the most recent entry, if anything has been recorded.
    pub fn last_entry(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }

    /// Iterates over the recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let start = match self.last {
            Some(last) if last + 1 < N => last + 1,
            _ => 0,
        };
        let (newer, older) = self.buffer.split_at(start);
        older.iter().chain(newer).filter(|ent| ent.count != 0)
    }
}

/// A [`Ringbuf`] that can live in a `static`.
pub struct StaticRingbuf<T: Copy + PartialEq, const N: usize> {
    inner: Mutex<RefCell<Ringbuf<T, N>>>,
}

impl<T: Copy + PartialEq, const N: usize> StaticRingbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Ringbuf::new(init))),
        }
    }

    /// Records `payload` as coming from `line`. This is what
    /// [`ringbuf_entry!`] expands to.
    pub fn record(&self, line: u16, payload: T) {
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).entry(line, payload);
        });
    }

    /// Copies the current contents out of the ring.
    pub fn snapshot(&self) -> Ringbuf<T, N> {
        critical_section::with(|cs| *self.inner.borrow_ref(cs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_lands_in_slot_zero() {
        let mut rb = Ringbuf::<u8, 4>::new(0);
        assert!(rb.last_entry().is_none());

        rb.entry(10, 7);
        assert_eq!(rb.last, Some(0));
        let ent = rb.last_entry().unwrap();
        assert_eq!((ent.line, ent.count, ent.payload), (10, 1, 7));
    }

    #[test]
    fn repeats_are_counted() {
        let mut rb = Ringbuf::<u8, 4>::new(0);
        rb.entry(10, 7);
        rb.entry(10, 7);
        rb.entry(10, 7);
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.last_entry().unwrap().count, 3);

        // Same payload from a different line is a different record.
        rb.entry(11, 7);
        assert_eq!(rb.last, Some(1));
    }

    #[test]
    fn wraps_and_bumps_generation() {
        let mut rb = Ringbuf::<u8, 3>::new(0);
        for i in 0..5u8 {
            rb.entry(1, i);
        }
        assert_eq!(rb.last, Some(1));
        assert_eq!(rb.buffer[0].generation, 2);
        assert_eq!(rb.buffer[2].generation, 1);

        let payloads: Vec<u8> =
            rb.iter().map(|ent| ent.payload).collect();
        assert_eq!(payloads, [2, 3, 4]);
    }

    #[test]
    fn iter_skips_unused_slots() {
        let mut rb = Ringbuf::<u8, 8>::new(0);
        rb.entry(1, 5);
        rb.entry(2, 6);
        let payloads: Vec<u8> =
            rb.iter().map(|ent| ent.payload).collect();
        assert_eq!(payloads, [5, 6]);
    }

    ringbuf!(TEST_RINGBUF, u32, 4, 0);

    #[test]
    fn static_ring_records() {
        ringbuf_entry!(TEST_RINGBUF, 42);
        let snap = TEST_RINGBUF.snapshot();
        assert!(snap.iter().any(|ent| ent.payload == 42));
    }
}
