// The MIT License (MIT)

// Copyright (c) 2015 Rustcc developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Evaluation-time failure kinds.
//!
//! These are the failures the evaluator itself can raise before a single
//! message has been handed off to user-level `Exception raise` machinery
//! (§7 of the runtime spec). Everything here is a plain value; none of it
//! carries a backtrace, since the message stack captured during unwind
//! (`eval::stop::Stop::Exception`) already does that job.

use std::fmt;

use crate::object::{ObjectId, ObjRef};

/// Failures the core itself can produce.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Neither the target nor any proto, nor `forward`, answered the message.
    #[error("object {target:?} does not respond to '{selector}'")]
    DoesNotRespond {
        target: ObjectId,
        selector: String,
    },

    /// A primitive operation received an argument of the wrong tag.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An index (sequence, list, proto position, ...) fell outside bounds.
    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: i64, len: usize },

    /// A block/method was called with the wrong number of arguments for a
    /// selector that requires an exact count.
    #[error("'{selector}' expected {expected} argument(s), got {got}")]
    ArityMismatch {
        selector: String,
        expected: usize,
        got: usize,
    },

    /// `Scheduler::await` would have closed a cycle in the wait graph.
    #[error("deadlock: coroutine {0:?} would wait on itself transitively")]
    Deadlock(ObjectId),

    /// An invariant the runtime relies on was observed broken. Unrecoverable.
    #[error("panic: {0}")]
    Panic(String),
}

impl CoreError {
    pub fn does_not_respond(target: ObjectId, selector: impl Into<String>) -> Self {
        CoreError::DoesNotRespond {
            target,
            selector: selector.into(),
        }
    }
}

/// Convenience alias used throughout the evaluator.
pub type CoreResult<T> = Result<T, CoreError>;

/// A raised language-level exception (spec.md §7, "Language-raised").
///
/// Distinct from [`CoreError`]: this wraps the actual object chosen by
/// `Exception raise` (so `try` can hand it back to user code), plus the
/// stack of messages captured while the `ExceptionStop` signal unwound the
/// chain.
#[derive(Debug, Clone)]
pub struct RaisedException {
    pub value: ObjRef,
    pub message_stack: Vec<String>,
}

impl fmt::Display for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception raised: object {}", self.value.id())?;
        for frame in &self.message_stack {
            write!(f, "\n  at {}", frame)?;
        }
        Ok(())
    }
}
