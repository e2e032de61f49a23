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

//! Coroutines (spec.md §4.8): one logical thread of message evaluation, its
//! control inbox, and the per-thread `Vm` that carries the state a running
//! coroutine needs (its identity, the world it evaluates against, and
//! lookup scratch buffers it owns outright).
//!
//! The teacher's runtime multiplexed coroutines onto a handful of OS
//! threads via a stackful, hand-rolled context switch (`context.rs`,
//! `asm/`). spec.md §5 explicitly allows "the underlying runtime may use
//! true OS threads" for the language's notion of coroutine, so each
//! coroutine here is one OS thread running an evaluator loop, and the
//! teacher's scheduler/builder/options shapes are kept and retargeted at
//! that thread instead of a stack swap.

pub mod builder;
pub mod options;

pub use builder::{Builder, Handle};
pub use options::Options;

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::eval::stop::{EvalResult, Inbox};
use crate::message::MessageRef;
use crate::object::{ObjRef, ObjectId, Primitive, Tag};
use crate::scheduler::Scheduler;
use crate::slot::LookupScratch;
use crate::world::World;

/// A coroutine's identity is just the `ObjectId` of its `Coroutine`-tagged
/// object; there is no separate namespace.
pub type CoroId = ObjectId;

/// The `Coroutine` tag's primitive payload. `CloneValue` on a `Coroutine`
/// produces a fresh `CoroValue` (a new inbox, debug flag reset) so a cloned
/// coroutine object never shares control state with its source (spec.md
/// §4.8).
pub struct CoroValue {
    pub inbox: Arc<Inbox>,
    debug: AtomicBool,
}

impl CoroValue {
    pub fn new() -> Arc<Self> {
        Arc::new(CoroValue {
            inbox: Arc::new(Inbox::new()),
            debug: AtomicBool::new(false),
        })
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, value: bool) {
        self.debug.store(value, Ordering::Relaxed);
    }
}

/// The `Coroutine` tag: identity activation (a coroutine object is just
/// handed back when looked up), but `clone_value` produces a fresh
/// `CoroValue` rather than sharing the original's inbox, since a cloned
/// coroutine has not been started and must not be woken by signals meant
/// for its source.
#[derive(Debug)]
pub struct CoroutineTag;

impl Tag for CoroutineTag {
    fn name(&self) -> &'static str {
        "Coroutine"
    }

    fn activate(
        &self,
        object: &ObjRef,
        _target: &ObjRef,
        _locals: &ObjRef,
        _context: &ObjRef,
        _msg: &MessageRef,
    ) -> EvalResult {
        Ok(object.clone())
    }

    fn clone_value(&self, _value: &Primitive) -> Primitive {
        Primitive::Coroutine(CoroValue::new())
    }
}

pub fn coroutine_tag() -> Arc<dyn Tag> {
    Arc::new(CoroutineTag)
}

/// Per-coroutine evaluation state: everything a running coroutine needs
/// that must not be shared with any other coroutine. Lives for the
/// lifetime of the OS thread running this coroutine.
pub struct Vm {
    pub id: CoroId,
    pub world: Arc<World>,
    pub inbox: Arc<Inbox>,
    pub scheduler: Arc<Scheduler>,
    scratch: UnsafeCell<LookupScratch>,
}

// Safety: a `Vm` is only ever reachable from the OS thread it was installed
// on (`Vm::current`); nothing hands a `&Vm` across a thread boundary.
unsafe impl Sync for Vm {}

impl Vm {
    pub fn new(id: CoroId, world: Arc<World>, inbox: Arc<Inbox>, scheduler: Arc<Scheduler>) -> Vm {
        Vm {
            id,
            world,
            inbox,
            scheduler,
            scratch: UnsafeCell::new(LookupScratch::new()),
        }
    }

    /// Lookup scratch buffers, owned by this coroutine alone so a hot-path
    /// `get` never allocates (spec.md §4.4).
    pub fn scratch(&self) -> &mut LookupScratch {
        // Safety: `Vm` is thread-confined (see the `Sync` impl above), so
        // there is never a second live borrow of this cell.
        unsafe { &mut *self.scratch.get() }
    }

    pub(crate) fn install(self) {
        CURRENT_VM.with(|cell| unsafe {
            *cell.get() = Some(self);
        });
    }

    /// The `Vm` of whichever coroutine is running on the calling OS thread.
    /// Mirrors the teacher's `Environment::current`/`Scheduler::current`
    /// thread-local-singleton pattern (`environment.rs`, `scheduler.rs`).
    pub fn current() -> &'static Vm {
        CURRENT_VM.with(|cell| unsafe {
            (*cell.get())
                .as_ref()
                .expect("Vm::current() called off a coroutine thread")
        })
    }
}

thread_local!(static CURRENT_VM: UnsafeCell<Option<Vm>> = UnsafeCell::new(None));
