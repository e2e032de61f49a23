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

//! The slot cell (spec.md §3, §4.3): mutex, condition variable, owner,
//! recursive hold counter, and the (possibly absent) value. Every name in
//! the trie resolves to one of these.

use std::sync::{Condvar, Mutex};

use crate::coro::CoroId;
use crate::object::ObjRef;

struct Inner {
    owner: Option<CoroId>,
    hold_count: u32,
    value: Option<ObjRef>,
}

/// A named, per-object binding. `None` as `value` means the slot is not
/// currently live (absent or deleted, spec.md §3's slot-cell lifecycle);
/// lookup treats that the same as "not found".
pub struct SlotCell {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl SlotCell {
    pub fn new() -> Self {
        SlotCell {
            inner: Mutex::new(Inner {
                owner: None,
                hold_count: 0,
                value: None,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks unless the owner is nil or already `coro`. A coroutine that
    /// already owns the cell may re-claim it (the hold counter), which is
    /// what makes `x := x + 1` deadlock-free: the read of `x` and the write
    /// to `x` can both be in flight under the same coroutine's ownership.
    pub fn claim(&self, coro: CoroId) {
        let mut guard = self.inner.lock().unwrap();
        loop {
            match guard.owner {
                None => break,
                Some(o) if o == coro => break,
                Some(_) => {
                    guard = self.condvar.wait(guard).unwrap();
                }
            }
        }
        guard.owner = Some(coro);
        guard.hold_count += 1;
    }

    /// Decrements the hold counter; when it reaches zero the cell is freed
    /// and one waiter (if any) is woken.
    pub fn release(&self, coro: CoroId) {
        let mut guard = self.inner.lock().unwrap();
        debug_assert_eq!(guard.owner, Some(coro));
        guard.hold_count -= 1;
        if guard.hold_count == 0 {
            guard.owner = None;
            self.condvar.notify_one();
        }
    }

    /// Reads the value. Only meaningful while the caller holds the claim;
    /// callers that only want a snapshot use `claim`/`load`/`release` in
    /// sequence (`GetSlot` in spec.md §4.4's terms).
    pub fn load(&self) -> Option<ObjRef> {
        self.inner.lock().unwrap().value.clone()
    }

    /// Sets/clears the value. Must be called while the cell is claimed by
    /// the caller; this is a documented discipline (mirroring the message
    /// tree's mutation discipline) rather than one this type enforces with
    /// a typestate, to keep the hot path allocation-free.
    pub fn store(&self, value: Option<ObjRef>) {
        self.inner.lock().unwrap().value = value;
    }

    pub fn is_live(&self) -> bool {
        self.inner.lock().unwrap().value.is_some()
    }
}

impl Default for SlotCell {
    fn default() -> Self {
        Self::new()
    }
}
