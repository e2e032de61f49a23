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

//! The proto list (spec.md §4.2): an ordered, append/prepend/remove sequence
//! of parent objects, published atomically so that readers never block on a
//! concurrent writer and never observe a torn list.
//!
//! The teacher's own concurrency primitives (`sync::spinlock::SpinLock`) are
//! a single-bit compare-and-swap, appropriate for protecting a scalar flag
//! but not for publishing a whole new list; here the "hold the root mutex to
//! mutate the head" discipline spec.md asks for is implemented with a
//! private write lock guarding `ArcSwap::store`, which is itself how
//! `arc-swap` gives lock-free, tear-free reads under a concurrent writer.

use std::sync::Mutex;

use arc_swap::ArcSwap;

use crate::object::ObjRef;

/// Ordered sequence of parent objects. Duplicates are allowed; they are not
/// deduplicated by the list itself (lookup's visited-set is what prevents
/// re-traversal, see `slot::lookup`).
pub struct ProtoList {
    snapshot: ArcSwap<Vec<ObjRef>>,
    writer: Mutex<()>,
}

impl ProtoList {
    pub fn new() -> Self {
        ProtoList {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn from_protos(protos: Vec<ObjRef>) -> Self {
        ProtoList {
            snapshot: ArcSwap::from_pointee(protos),
            writer: Mutex::new(()),
        }
    }

    /// A consistent point-in-time view of the list. Safe to hold across a
    /// long iteration; it will not observe later mutations.
    pub fn snapshot(&self) -> std::sync::Arc<Vec<ObjRef>> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every proto exactly once in list order. `f` returning `false`
    /// terminates iteration early. Per spec.md, the list must not be
    /// structurally modified during iteration by the same coroutine; that
    /// contract is documented here, not enforced, since the snapshot we hand
    /// out is immutable regardless of what a concurrent writer later does.
    pub fn foreach_proto(&self, mut f: impl FnMut(&ObjRef) -> bool) {
        let snap = self.snapshot();
        for proto in snap.iter() {
            if !f(proto) {
                break;
            }
        }
    }

    pub fn set_to(&self, protos: Vec<ObjRef>) {
        let _guard = self.writer.lock().unwrap();
        self.snapshot.store(std::sync::Arc::new(protos));
    }

    pub fn append(&self, proto: ObjRef) {
        let _guard = self.writer.lock().unwrap();
        let mut next = (**self.snapshot.load()).clone();
        next.push(proto);
        self.snapshot.store(std::sync::Arc::new(next));
    }

    pub fn prepend(&self, proto: ObjRef) {
        let _guard = self.writer.lock().unwrap();
        let mut next = Vec::with_capacity(self.snapshot.load().len() + 1);
        next.push(proto);
        next.extend((**self.snapshot.load()).iter().cloned());
        self.snapshot.store(std::sync::Arc::new(next));
    }

    /// Removes every occurrence of `proto` (compared by identity).
    pub fn remove_all(&self, proto: &ObjRef) {
        let _guard = self.writer.lock().unwrap();
        let next: Vec<ObjRef> = self
            .snapshot
            .load()
            .iter()
            .filter(|p| !std::sync::Arc::ptr_eq(p, proto))
            .cloned()
            .collect();
        self.snapshot.store(std::sync::Arc::new(next));
    }
}

impl Default for ProtoList {
    fn default() -> Self {
        Self::new()
    }
}
