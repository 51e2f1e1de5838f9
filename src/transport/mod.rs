//! The abstract `Transport` contract (spec §4.4) and its two in-core
//! implementations: [`framed::FramedTransport`] and
//! [`inter_thread::InterThreadTransport`].
//!
//! Grounded on the teacher repo's `IpcTransport` trait
//! (`src/ipc/mod.rs`) for the shape of the capability interface, and on
//! eRPC's actual transport inheritance hierarchy (`erpc_c/transports/*`) for
//! the framing/CRC and inter-thread semantics themselves — collapsed per
//! spec §9 into one trait rather than a class hierarchy.

pub mod framed;
pub mod inter_thread;

use crate::buffer::MessageBuffer;
use crate::error::Result;

/// Every transport implementation provides exactly this, nothing else
/// (spec §4.4).
pub trait Transport: Send {
    /// Transmit `buffer.used()` bytes atomically.
    fn send(&mut self, buffer: &MessageBuffer) -> Result<()>;

    /// Fill `buffer` with exactly one message and set its `used()` length.
    fn receive(&mut self, buffer: &mut MessageBuffer) -> Result<()>;

    /// Bytes the codec must leave at the front of its payload for this
    /// transport's own framing (e.g. 4 for [`framed::FramedTransport`], 0 for
    /// a message-preserving link).
    fn header_reserve_size(&self) -> usize;

    /// Cooperative poll hook: true if a message is ready to be received
    /// without blocking. Transports for which this isn't meaningful should
    /// return `true` unconditionally so polling degenerates to blocking
    /// receive.
    fn has_message_available(&self) -> bool {
        true
    }
}
