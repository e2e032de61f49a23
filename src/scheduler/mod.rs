// The MIT License (MIT)

// Copyright (c) 2015 Rustcc Developers

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

//! The scheduler (spec.md §4.8): a wait-graph (`waits: coro -> coro`, value
//! `None` meaning runnable), deadlock detection on `Await`, and the
//! bookkeeping needed to broadcast `ExitStop` to every live coroutine.
//!
//! The teacher's `scheduler.rs` ran a work-stealing deque of `Handle`s
//! across a fixed pool of OS threads, polling an `mio` event loop for I/O
//! readiness between rounds. Under the OS-thread-per-coroutine redesign
//! (see `coro` module docs) there is no run queue to steal from — each
//! coroutine already has its own thread — so what survives from the
//! teacher is the single-mutex shared-state discipline and its `log`
//! call sites around scheduling decisions, retargeted at the wait graph.

pub mod interrupt;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use log::{debug, info, warn};

use crate::coro::CoroId;
use crate::error::{CoreError, RaisedException};
use crate::eval::stop::{Inbox, Stop};
use crate::object::{Object, Primitive};
use std::sync::Arc;

#[derive(Default)]
struct State {
    waits: HashMap<CoroId, Option<CoroId>>,
    inboxes: HashMap<CoroId, Arc<Inbox>>,
    exit_code: Option<i32>,
}

/// The process-wide scheduler. One instance per `World`; every `Vm` holds
/// an `Arc` to it.
pub struct Scheduler {
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new() -> Arc<Scheduler> {
        Arc::new(Scheduler {
            state: Mutex::new(State::default()),
        })
    }

    /// `Start(a)`: registers `a` as runnable and remembers its inbox so
    /// `Exit`/deadlock injection can reach it later.
    pub fn start(&self, a: CoroId, inbox: Arc<Inbox>) {
        let mut state = self.state.lock().unwrap();
        state.waits.insert(a, None);
        state.inboxes.insert(a, inbox);
        debug!("scheduler: coroutine {} started", a);
    }

    /// `Await(a, b)`: `a` now waits on `b`, unless that would close a cycle
    /// in the wait graph, in which case it is rejected and an exception is
    /// injected into `a`'s inbox (spec.md §4.8, §8 invariant 8).
    pub fn await_on(&self, a: CoroId, b: CoroId) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if Self::reaches(&state.waits, b, a) {
            warn!("scheduler: await({}, {}) would deadlock", a, b);
            if let Some(inbox) = state.inboxes.get(&a) {
                // The scheduler has no access to a `World` (it is the one
                // component spec.md keeps free of the object model), so it
                // raises a minimal, tag-less exception object of its own
                // rather than reaching into `Exception`'s prototype.
                let exc = Object::new_plain();
                let text = Object::new_plain();
                text.set_value(Primitive::Str("deadlock".to_string()));
                exc.bind_slot("message", text, a);
                inbox.post_urgent(Stop::ExceptionStop(RaisedException {
                    value: exc,
                    message_stack: vec!["deadlock".to_string()],
                }));
            }
            return Err(CoreError::Deadlock(a));
        }
        state.waits.insert(a, Some(b));
        Ok(())
    }

    /// `Pause(a)`: removes `a` from the runnable bookkeeping but leaves
    /// every coroutine waiting on it pointed at `a` still. Returns `true`
    /// if, after the removal, no coroutine in the graph is runnable — the
    /// caller treats that as a whole-program deadlock.
    pub fn pause(&self, a: CoroId) -> bool {
        let mut state = self.state.lock().unwrap();
        state.waits.remove(&a);
        !state.waits.values().any(Option::is_none)
    }

    /// `Finish(a)`: removes `a` and wakes every coroutine that was waiting
    /// specifically on it.
    pub fn finish(&self, a: CoroId) {
        let mut state = self.state.lock().unwrap();
        state.waits.remove(&a);
        for v in state.waits.values_mut() {
            if *v == Some(a) {
                *v = None;
            }
        }
        state.inboxes.remove(&a);
        debug!("scheduler: coroutine {} finished", a);
    }

    /// `Exit(code)`: broadcasts `ExitStop` to every known coroutine.
    /// Records `code` as the process's exit status on the first call only.
    pub fn exit(&self, code: i32) {
        let mut state = self.state.lock().unwrap();
        if state.exit_code.is_none() {
            state.exit_code = Some(code);
            info!("scheduler: exit({}) requested", code);
        }
        for inbox in state.inboxes.values() {
            inbox.post_urgent(Stop::ExitStop(code));
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.state.lock().unwrap().exit_code
    }

    /// Depth-first search over the wait graph: can `from` reach `to` by
    /// following `waits` edges?
    fn reaches(waits: &HashMap<CoroId, Option<CoroId>>, from: CoroId, to: CoroId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(cur) = stack.pop() {
            if cur == to {
                return true;
            }
            if !visited.insert(cur) {
                continue;
            }
            if let Some(Some(next)) = waits.get(&cur) {
                stack.push(*next);
            }
        }
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_start_then_finish_clears_entry() {
        let sched = Scheduler::new();
        sched.start(1, Arc::new(Inbox::new()));
        sched.finish(1);
        assert!(sched.pause(1)); // nothing left runnable
    }

    #[test]
    fn test_await_without_cycle_succeeds() {
        let sched = Scheduler::new();
        sched.start(1, Arc::new(Inbox::new()));
        sched.start(2, Arc::new(Inbox::new()));
        assert!(sched.await_on(1, 2).is_ok());
    }

    #[test]
    fn test_self_await_is_deadlock() {
        let sched = Scheduler::new();
        let inbox = Arc::new(Inbox::new());
        sched.start(1, inbox.clone());
        let result = sched.await_on(1, 1);
        assert!(matches!(result, Err(CoreError::Deadlock(1))));
        assert!(matches!(inbox.poll(), Stop::ExceptionStop(_)));
    }

    #[test]
    fn test_transitive_cycle_is_rejected() {
        let sched = Scheduler::new();
        sched.start(1, Arc::new(Inbox::new()));
        sched.start(2, Arc::new(Inbox::new()));
        sched.start(3, Arc::new(Inbox::new()));
        sched.await_on(1, 2).unwrap();
        sched.await_on(2, 3).unwrap();
        assert!(sched.await_on(3, 1).is_err());
    }

    #[test]
    fn test_finish_frees_waiters() {
        let sched = Scheduler::new();
        sched.start(1, Arc::new(Inbox::new()));
        sched.start(2, Arc::new(Inbox::new()));
        sched.await_on(1, 2).unwrap();
        sched.finish(2);
        assert!(!sched.pause(1)); // 1 is runnable again (waits[1] == None)
    }

    #[test]
    fn test_exit_broadcasts_to_all() {
        let sched = Scheduler::new();
        let a = Arc::new(Inbox::new());
        let b = Arc::new(Inbox::new());
        sched.start(1, a.clone());
        sched.start(2, b.clone());
        sched.exit(7);
        assert!(matches!(a.poll(), Stop::ExitStop(7)));
        assert!(matches!(b.poll(), Stop::ExitStop(7)));
        assert_eq!(sched.exit_code(), Some(7));
    }
}
