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

//! Slot lookup (spec.md §4.4): `get_local` (this object only) and `get`
//! (depth-first, leftmost-first across the proto graph). Both are cycle-safe
//! via an identity visited-set.

use std::collections::HashSet;
use std::sync::Arc;

use crate::coro::CoroId;
use crate::object::{Object, ObjRef, ObjectId};
use crate::slot::cell::SlotCell;

/// The result of a successful lookup: the cell that held the answer, and
/// the proto it was actually found on (`Object::identical(proto_found_on,
/// o)` for a local hit).
pub struct Found {
    pub cell: Arc<SlotCell>,
    pub proto_found_on: ObjRef,
}

/// Per-coroutine scratch buffers so a hot-path lookup does not allocate.
/// Reset at the top of every call to `get`; owned by the calling
/// coroutine's `Vm`, never shared across threads.
#[derive(Default)]
pub struct LookupScratch {
    visited: HashSet<ObjectId>,
    stack: Vec<ObjRef>,
}

impl LookupScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.visited.clear();
        self.stack.clear();
    }
}

/// `o`'s own slots only; does not consult protos. A cell that exists but
/// holds no value (opened, never stored, or removed) reads as absent.
pub fn get_local(o: &ObjRef, name: &str) -> Option<Found> {
    let cell = o.slots().get_existing(name)?;
    if !cell.is_live() {
        return None;
    }
    Some(Found {
        cell,
        proto_found_on: o.clone(),
    })
}

/// Depth-first, leftmost-first search of `o` and its proto graph
/// (spec.md §4.4). `scratch` is reused across calls to avoid allocating a
/// fresh visited-set/stack per lookup.
pub fn get(o: &ObjRef, name: &str, scratch: &mut LookupScratch) -> Option<Found> {
    scratch.reset();
    scratch.stack.push(o.clone());

    while let Some(cur) = scratch.stack.pop() {
        if !scratch.visited.insert(cur.id()) {
            continue;
        }
        if let Some(cell) = cur.slots().get_existing(name) {
            if cell.is_live() {
                return Some(Found {
                    cell,
                    proto_found_on: cur,
                });
            }
        }
        // Push in reverse so the leftmost proto is popped (and thus
        // examined) first.
        let protos = cur.protos().snapshot();
        for p in protos.iter().rev() {
            scratch.stack.push(p.clone());
        }
    }
    None
}

/// `GetSlot`: load the value and release interest in the cell in one call.
/// Returns `None` if the slot was never opened or is not currently live.
pub fn get_slot(o: &ObjRef, name: &str, scratch: &mut LookupScratch) -> Option<ObjRef> {
    get(o, name, scratch).and_then(|found| found.cell.load())
}

/// `GetSlotSync` (spec.md §4.4): like `get`, but claims the found cell for
/// `coro` instead of merely reading it, so the caller can carry out a full
/// read-modify-write (e.g. `updateSlot`'s "evaluate the new value, then
/// store it") without another coroutine's write landing in between. The
/// caller owns the claim on return and must `release` it — including on
/// every error path, since the claim outlives this call. Reentrant: if
/// evaluating the new value sends a message that reads this same slot, the
/// cell's hold counter lets that nest under the same coroutine instead of
/// deadlocking (this is the general form of `x := x + 1`'s self-read).
pub fn get_slot_sync(o: &ObjRef, name: &str, scratch: &mut LookupScratch, coro: CoroId) -> Option<Found> {
    let found = get(o, name, scratch)?;
    found.cell.claim(coro);
    Some(found)
}

/// `GetSlotSync` for `setSlot`'s always-local semantics: opens (or creates)
/// `name` directly on `o`, with no proto walk, and claims the cell for
/// `coro`. The caller must `release` it, on every path, once the new value
/// has been stored.
pub fn open_slot_sync(o: &ObjRef, name: &str, coro: CoroId) -> Arc<SlotCell> {
    let cell = o.slots().open(name);
    cell.claim(coro);
    cell
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::Object;

    fn set(o: &ObjRef, name: &str, value: ObjRef) {
        let cell = o.slots().open(name);
        cell.claim(1);
        cell.store(Some(value));
        cell.release(1);
    }

    #[test]
    fn test_get_local_misses_protos() {
        let parent = Object::new_plain();
        let child = Object::bare_clone(&parent);
        set(&parent, "x", Object::new_plain());

        assert!(get_local(&child, "x").is_none());
        assert!(get_local(&parent, "x").is_some());
    }

    #[test]
    fn test_get_walks_protos() {
        let parent = Object::new_plain();
        let child = Object::bare_clone(&parent);
        let value = Object::new_plain();
        set(&parent, "x", value.clone());

        let mut scratch = LookupScratch::new();
        let found = get(&child, "x", &mut scratch).expect("found on proto");
        assert!(Object::identical(&found.proto_found_on, &parent));
        assert!(Object::identical(&found.cell.load().unwrap(), &value));
    }

    #[test]
    fn test_leftmost_proto_wins() {
        let p1 = Object::new_plain();
        let p2 = Object::new_plain();
        let v1 = Object::new_plain();
        let v2 = Object::new_plain();
        set(&p1, "n", v1.clone());
        set(&p2, "n", v2);

        let child = Object::new_plain();
        child.protos().append(p1.clone());
        child.protos().append(p2);

        let mut scratch = LookupScratch::new();
        let found = get(&child, "n", &mut scratch).unwrap();
        assert!(Object::identical(&found.proto_found_on, &p1));
        assert!(Object::identical(&found.cell.load().unwrap(), &v1));
    }

    #[test]
    fn test_cyclic_proto_graph_terminates_on_miss() {
        let a = Object::new_plain();
        a.protos().append(a.clone());

        let mut scratch = LookupScratch::new();
        assert!(get(&a, "nope", &mut scratch).is_none());
    }

    #[test]
    fn test_get_slot_returns_none_for_unset_but_opened_slot() {
        let o = Object::new_plain();
        o.slots().open("y"); // opened, never stored
        let mut scratch = LookupScratch::new();
        assert!(get_slot(&o, "y", &mut scratch).is_none());
    }

    #[test]
    fn test_get_slot_sync_returns_a_claimed_cell() {
        let o = Object::new_plain();
        set(&o, "x", Object::new_plain());

        let mut scratch = LookupScratch::new();
        let found = get_slot_sync(&o, "x", &mut scratch, 1).expect("found");
        // The cell is claimed by us: a second coroutine's claim would
        // block, so re-claiming under our own id must not.
        found.cell.claim(1);
        found.cell.release(1);
        found.cell.release(1);
    }

    #[test]
    fn test_get_slot_sync_misses_like_get() {
        let o = Object::new_plain();
        let mut scratch = LookupScratch::new();
        assert!(get_slot_sync(&o, "nope", &mut scratch, 1).is_none());
    }

    #[test]
    fn test_open_slot_sync_creates_and_claims_a_fresh_cell() {
        let o = Object::new_plain();
        let cell = open_slot_sync(&o, "x", 1);
        cell.store(Some(Object::new_plain()));
        cell.release(1);
        assert!(get_local(&o, "x").is_some());
    }
}
