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

//! Control-flow signals (spec.md §4.7) and the per-coroutine inbox that
//! carries them. The evaluator polls the inbox after every performed
//! message; this is the single suspension/cancellation point every other
//! subsystem (slot cells, futures, the scheduler's pause subprotocol) hangs
//! off of.

use std::sync::{Condvar, Mutex};

use crate::error::{CoreError, RaisedException};
use crate::object::ObjRef;

/// One of the eight signals a coroutine's evaluator reacts to.
#[derive(Debug, Clone)]
pub enum Stop {
    NoStop,
    ContinueStop,
    BreakStop,
    ReturnStop,
    ExceptionStop(RaisedException),
    ExitStop(i32),
    PauseStop,
    ResumeStop,
}

/// What aborts a `Send` chain: either a plain runtime error (a failed
/// lookup, a type mismatch) or a `Stop` propagating out of some nested
/// activation. Kept distinct from `CoreError` because a `Stop` is not
/// necessarily a failure — `ReturnStop` is how a method successfully hands
/// back its result, which is why it carries the value the chain had
/// computed at the moment the stop was observed (spec.md §4.6: "the block
/// returns the result value").
#[derive(Debug)]
pub enum Unwind {
    Error(CoreError),
    Stopped { stop: Stop, value: ObjRef },
}

impl From<CoreError> for Unwind {
    fn from(e: CoreError) -> Self {
        Unwind::Error(e)
    }
}

pub type EvalResult = Result<ObjRef, Unwind>;

/// The one-slot buffered mailbox every coroutine owns (spec.md §4.7).
/// Mirrors the slot cell's mutex+condvar shape, but the write discipline is
/// different: some stops are best-effort (dropped on a full inbox), others
/// must always land.
pub struct Inbox {
    slot: Mutex<Option<Stop>>,
    condvar: Condvar,
}

impl Inbox {
    pub fn new() -> Self {
        Inbox {
            slot: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    /// `NoStop`: used to coax a yield. Dropped if the inbox is already full.
    pub fn post_no_stop(&self) {
        let mut guard = self.slot.lock().unwrap();
        if guard.is_none() {
            *guard = Some(Stop::NoStop);
            self.condvar.notify_one();
        }
    }

    /// `ContinueStop`/`BreakStop`/`ReturnStop`: dropped if the inbox is
    /// already full. Returns whether the post landed.
    pub fn post_control(&self, stop: Stop) -> bool {
        let mut guard = self.slot.lock().unwrap();
        if guard.is_none() {
            *guard = Some(stop);
            self.condvar.notify_one();
            true
        } else {
            false
        }
    }

    /// `ExceptionStop`/`ExitStop`: must always be delivered. An `ExitStop`
    /// already sitting in the inbox is never displaced by anything else;
    /// any other occupant is drained and overwritten.
    pub fn post_urgent(&self, stop: Stop) {
        let mut guard = self.slot.lock().unwrap();
        if matches!(*guard, Some(Stop::ExitStop(_))) {
            return;
        }
        *guard = Some(stop);
        self.condvar.notify_one();
    }

    /// Non-blocking: the shape the evaluator polls with after every
    /// performed message. An empty inbox reads as `NoStop`.
    pub fn poll(&self) -> Stop {
        let mut guard = self.slot.lock().unwrap();
        guard.take().unwrap_or(Stop::NoStop)
    }

    /// Blocks until any `Stop` arrives. Used by the pause subprotocol: a
    /// paused coroutine parks here until `ResumeStop` (or `ExitStop`).
    pub fn wait(&self) -> Stop {
        let mut guard = self.slot.lock().unwrap();
        while guard.is_none() {
            guard = self.condvar.wait(guard).unwrap();
        }
        guard.take().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap().is_none()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}
