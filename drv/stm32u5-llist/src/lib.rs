// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linked-list descriptor formats for the STM32U5
//!
//! Two masters on the U5 walk descriptor chains out of memory, and each
//! encodes its link word differently:
//!
//! - GPDMA channels ([`gpdma`]): the link register CxLLR holds the low half
//!   of the next node's address; the high half comes from CxLBAR, so a
//!   whole chain has to live in one 64 KiB region.
//! - The SDMMC internal DMA ([`sdmmc`]): IDMALAR holds the next node's
//!   offset from the IDMABAR base, which the driver points at the head node.
//!
//! Both are [`descq::DescOps`] implementations, so a [`descq::Queue`] can
//! build and edit the chains.

#![cfg_attr(not(test), no_std)]

pub mod gpdma;
pub mod sdmmc;

pub use gpdma::{GpdmaLinks, GpdmaNode, NodeLayout};
pub use sdmmc::{IdmaNode, SdmmcLinks};

#[cfg(test)]
mod fakes;
