//! Failure channel between units of work and the scheduling thread
//!
//! Unwinding out of a parallel region is not a reliable way to report a
//! failure from one of many concurrent units of work. Each schedule call
//! instead owns one pre-allocated [`ErrorSlot`] and hands every unit a copy of
//! its [`ErrorMessageBuffer`]. The first raised message is latched; the
//! scheduling thread inspects the slot once after all units have returned.

use crate::error::{BackendError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maximum number of message bytes kept; longer messages are truncated.
pub const MESSAGE_CAPACITY: usize = 256;

/// Message latched when a unit of work fails without a readable reason.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error in execution environment.";

struct MessageStorage {
    bytes: [u8; MESSAGE_CAPACITY],
    len: usize,
}

/// Storage for the first error raised during one schedule call.
pub struct ErrorSlot {
    raised: AtomicBool,
    message: Mutex<MessageStorage>,
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            message: Mutex::new(MessageStorage {
                bytes: [0; MESSAGE_CAPACITY],
                len: 0,
            }),
        }
    }

    /// Buffer to pass (by value) into every unit of work.
    pub fn buffer(&self) -> ErrorMessageBuffer<'_> {
        ErrorMessageBuffer { slot: self }
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// The latched message, if any.
    pub fn message(&self) -> Option<String> {
        if !self.is_raised() {
            return None;
        }
        let storage = self.message.lock();
        Some(String::from_utf8_lossy(&storage.bytes[..storage.len]).into_owned())
    }

    /// Convert a raised slot into [`BackendError::Execution`].
    pub fn check(&self) -> Result<()> {
        match self.message() {
            None => Ok(()),
            Some(message) => {
                tracing::warn!(message = %message, "execution error raised during schedule");
                Err(BackendError::Execution(message))
            }
        }
    }

    fn raise(&self, message: &str) {
        if self.raised.load(Ordering::Acquire) {
            return;
        }
        let mut storage = self.message.lock();
        if self.raised.load(Ordering::Relaxed) {
            return;
        }

        let mut end = message.len().min(MESSAGE_CAPACITY);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        storage.bytes[..end].copy_from_slice(&message.as_bytes()[..end]);
        storage.len = end;
        self.raised.store(true, Ordering::Release);
    }
}

impl fmt::Debug for ErrorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSlot")
            .field("raised", &self.is_raised())
            .field("message", &self.message())
            .finish()
    }
}

/// Write-once diagnostic channel available to every unit of work.
#[derive(Clone, Copy)]
pub struct ErrorMessageBuffer<'a> {
    slot: &'a ErrorSlot,
}

impl ErrorMessageBuffer<'_> {
    /// Latch `message` unless an earlier error was already raised.
    pub fn raise_error(&self, message: &str) {
        self.slot.raise(message);
    }

    pub fn is_raised(&self) -> bool {
        self.slot.is_raised()
    }

    pub fn message(&self) -> Option<String> {
        self.slot.message()
    }
}

impl fmt::Debug for ErrorMessageBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorMessageBuffer").field(&self.slot).finish()
    }
}
