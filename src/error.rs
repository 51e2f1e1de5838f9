//! Stable error taxonomy shared by the codec, transports, and dispatch runtime.
//!
//! eRPC's C runtime represents failures as an `erpc_status_t` enum returned by
//! value from every API; callers check it instead of catching an exception.
//! This module keeps that contract (a single flat taxonomy, `Result`-based
//! propagation, no panics on protocol or transport failure) but expresses it
//! as a `thiserror`-derived enum so it composes with `?` and `std::error::Error`.

use std::fmt;

/// Result type returned by nearly every public entry point in this crate.
pub type Result<T> = std::result::Result<T, RpcError>;

/// The stable error taxonomy from the eRPC wire protocol (§6 of the spec).
///
/// Numeric values are not part of the wire format — only the reply message's
/// own fields and this crate's `Display` text are observable — but the set of
/// variants is stable and MUST NOT be extended without a protocol version
/// bump, since generated stubs match on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// A non-specific failure with no more precise taxonomy entry.
    #[error("operation failed")]
    Fail,

    /// A caller-supplied argument was invalid (e.g. unknown service/method id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An arbitrated call's pending-reply entry was cancelled or expired.
    #[error("operation timed out")]
    Timeout,

    /// The message header's version byte did not match the codec's version.
    #[error("invalid message version: expected {expected}, got {actual}")]
    InvalidMessageVersion {
        /// Version this codec implements.
        expected: u8,
        /// Version found on the wire.
        actual: u8,
    },

    /// A reply did not match the in-flight request it was read against.
    #[error(
        "expected reply for service={expected_service} request={expected_request} sequence={expected_sequence}, \
         got service={actual_service} request={actual_request} sequence={actual_sequence}"
    )]
    ExpectedReply {
        expected_service: u8,
        expected_request: u8,
        expected_sequence: u32,
        actual_service: u8,
        actual_request: u8,
        actual_sequence: u32,
    },

    /// A framed transport's payload CRC did not match the computed CRC.
    #[error("CRC check failed: expected {expected:#06x}, computed {computed:#06x}")]
    CrcCheckFailed { expected: u16, computed: u16 },

    /// A read or write would advance the cursor past the buffer's capacity.
    #[error("buffer overrun: cursor at {position}, capacity {capacity}, requested {requested} more bytes")]
    BufferOverrun {
        position: u32,
        capacity: u32,
        requested: u32,
    },

    /// A name (service or interface) could not be resolved.
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// The underlying link could not be established or broke unexpectedly.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The peer closed the connection gracefully; distinct from a failure so
    /// servers can exit their receive loop without logging an error.
    #[error("connection closed")]
    ConnectionClosed,

    /// A buffer or codec pool was exhausted (static allocation policy) or the
    /// heap allocator failed (dynamic allocation policy).
    #[error("memory allocation failed")]
    MemoryError,

    /// A call was attempted while the server side was not running.
    #[error("server is down")]
    ServerIsDown,

    /// A transport or component failed to initialize.
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// The transport's underlying `receive` call failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The transport's underlying `send` call failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A received pointer's width exceeds this platform's `usize` width.
    #[error("bad address scale: sender width {sender_width}, local width {local_width}")]
    BadAddressScale { sender_width: u8, local_width: u8 },

    /// A call was attempted re-entrantly from within an active invocation
    /// where the build does not support nested calls.
    #[error("nested call failure")]
    NestedCallFailure,

    /// An arbitrated client's callback service was invoked under an id that
    /// is not registered locally.
    #[error("unknown callback")]
    UnknownCallback,
}

impl RpcError {
    /// True for [`RpcError::Fail`], preserved as a named check since "fail" is
    /// the bare status the codec starts in before any more specific failure
    /// is recorded.
    pub fn is_generic_fail(&self) -> bool {
        matches!(self, RpcError::Fail)
    }
}

/// A sticky status cell used by [`crate::codec::Codec`] implementations.
///
/// Mirrors the C runtime's `m_status` field: every codec operation checks
/// `is_ok()` before doing work, and the first failure poisons all subsequent
/// operations on the same codec instance until it is rebound to a fresh
/// buffer. This is deliberately not `Result`-based internally, because the
/// spec's write-optimistically-then-check-once discipline (§4.2) means the
/// codec itself is not the `?`-propagation boundary — the call sites that
/// drive a codec through a whole message are.
#[derive(Debug, Clone, Default)]
pub struct StickyStatus {
    status: Option<RpcError>,
}

impl StickyStatus {
    /// A fresh, not-yet-failed status.
    pub fn new() -> Self {
        Self { status: None }
    }

    /// True until the first failure is recorded.
    pub fn is_ok(&self) -> bool {
        self.status.is_none()
    }

    /// Record a failure. Only the first call has any effect; later calls
    /// (however many different errors are raised by ensuing no-op operations)
    /// leave the originally recorded error in place.
    pub fn fail(&mut self, err: RpcError) {
        if self.status.is_none() {
            self.status = Some(err);
        }
    }

    /// Reset to a fresh, not-yet-failed status, e.g. when rebinding the codec
    /// to a new buffer for the next message.
    pub fn reset(&mut self) {
        self.status = None;
    }

    /// Consume this status, returning `Ok(())` if it never failed, or the
    /// recorded error otherwise.
    pub fn into_result(self) -> Result<()> {
        match self.status {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Borrow the recorded error, if any.
    pub fn as_error(&self) -> Option<&RpcError> {
        self.status.as_ref()
    }
}

impl fmt::Display for StickyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            None => write!(f, "ok"),
            Some(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_status_keeps_first_error() {
        let mut status = StickyStatus::new();
        assert!(status.is_ok());
        status.fail(RpcError::BufferOverrun {
            position: 4,
            capacity: 4,
            requested: 1,
        });
        status.fail(RpcError::Timeout);
        assert!(!status.is_ok());
        assert_eq!(
            status.into_result(),
            Err(RpcError::BufferOverrun {
                position: 4,
                capacity: 4,
                requested: 1,
            })
        );
    }
}
