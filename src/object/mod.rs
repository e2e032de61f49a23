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

//! The object model (spec.md §3, §4.1): identity, prototype graphs, tagged
//! primitive values, and per-object slot tables.
//!
//! Every value in the language is an `Object`. Behavior is inherited by
//! walking the proto list rather than by instantiating a class, so an
//! `Object` is deliberately a single, non-generic record: a stable identity,
//! an optional `Tag` vtable, an opaque (but closed-set) primitive payload,
//! a proto list, and a slot trie.

pub mod proto_list;
pub mod tag;

pub use proto_list::ProtoList;
pub use tag::{BasicTag, Tag};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::eval::block::BlockValue;
use crate::future::FutureValue;
use crate::message::MessageRef;
use crate::slot::trie::SlotTrie;

/// Process-unique, monotonically increasing object identity (spec.md §3,
/// invariant 1: `id(a) == id(b)` iff `a` and `b` are the same object).
pub type ObjectId = u64;

fn next_object_id() -> ObjectId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reference-counted handle to an object. Pointer equality on the `Arc`
/// is the runtime's notion of object identity below the `ObjectId` level;
/// the two always agree because an `ObjectId` is assigned exactly once, at
/// construction, and never reassigned.
pub type ObjRef = Arc<Object>;

/// The closed set of primitive payloads a tagged object may carry. New
/// native types are added here, not via an open `Box<dyn Any>` escape
/// hatch, per spec.md §9's "prefer a sum-typed payload... if the set of
/// primitive types is closed" guidance.
#[derive(Clone)]
pub enum Primitive {
    /// Plain objects (the common case: a bag of slots, no native payload).
    None,
    Number(f64),
    Str(String),
    Bool(bool),
    List(Vec<ObjRef>),
    Map(HashMap<String, ObjRef>),
    Block(BlockValue),
    Message(MessageRef),
    Coroutine(Arc<crate::coro::CoroValue>),
    Future(Arc<FutureValue>),
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::None => write!(f, "None"),
            Primitive::Number(n) => write!(f, "Number({})", n),
            Primitive::Str(s) => write!(f, "Str({:?})", s),
            Primitive::Bool(b) => write!(f, "Bool({})", b),
            Primitive::List(l) => write!(f, "List(len={})", l.len()),
            Primitive::Map(m) => write!(f, "Map(len={})", m.len()),
            Primitive::Block(_) => write!(f, "Block"),
            Primitive::Message(_) => write!(f, "Message"),
            Primitive::Coroutine(_) => write!(f, "Coroutine"),
            Primitive::Future(_) => write!(f, "Future"),
        }
    }
}

/// The central entity of the runtime (spec.md §3).
pub struct Object {
    id: ObjectId,
    tag: Option<Arc<dyn Tag>>,
    /// Guards the primitive value during mutation, per spec.md's "(f) a
    /// mutex guarding the primitive value during mutation".
    value: Mutex<Primitive>,
    protos: ProtoList,
    slots: SlotTrie,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("tag", &self.tag.as_ref().map(|t| t.name()))
            .finish_non_exhaustive()
    }
}

impl Object {
    fn new(tag: Option<Arc<dyn Tag>>, value: Primitive, protos: Vec<ObjRef>) -> ObjRef {
        Arc::new(Object {
            id: next_object_id(),
            tag,
            value: Mutex::new(value),
            protos: ProtoList::from_protos(protos),
            slots: SlotTrie::new(),
        })
    }

    /// A fresh object with no tag, no protos, and no slots: the root of
    /// every proto graph eventually bottoms out here (or at `BaseObject`,
    /// which is itself built from one of these).
    pub fn new_plain() -> ObjRef {
        Self::new(None, Primitive::None, Vec::new())
    }

    pub fn new_tagged(tag: Arc<dyn Tag>, value: Primitive, protos: Vec<ObjRef>) -> ObjRef {
        Self::new(Some(tag), value, protos)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn tag(&self) -> Option<&Arc<dyn Tag>> {
        self.tag.as_ref()
    }

    pub fn protos(&self) -> &ProtoList {
        &self.protos
    }

    pub fn slots(&self) -> &SlotTrie {
        &self.slots
    }

    pub fn value(&self) -> std::sync::MutexGuard<'_, Primitive> {
        self.value.lock().unwrap()
    }

    pub fn set_value(&self, value: Primitive) {
        *self.value.lock().unwrap() = value;
    }

    /// Pointer equality: the sole comparison key for objects (spec.md §3).
    pub fn identical(a: &ObjRef, b: &ObjRef) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Opens (or reuses) the named slot and stores `value` into it under
    /// `owner`'s claim, releasing the claim before returning. A small
    /// convenience around the trie/cell protocol in spec.md §4.3 for the
    /// common "just set this slot" case that locals construction, native
    /// methods, and the world bootstrap all need.
    pub fn bind_slot(&self, name: &str, value: ObjRef, owner: crate::coro::CoroId) {
        let cell = self.slots.open(name);
        cell.claim(owner);
        cell.store(Some(value));
        cell.release(owner);
    }

    /// The uninitialized half of `clone` (spec.md §4.1): a fresh identity,
    /// a single proto (`o`), the same tag, and a primitive value produced
    /// by `tag.clone_value`. Does not run `init` — callers that want the
    /// full `clone` semantics (`init` dispatch requires sending a message,
    /// which requires a `Vm`) call this and then hand the result to
    /// `eval::clone_with_init`.
    pub fn bare_clone(o: &ObjRef) -> ObjRef {
        let value = match &o.tag {
            Some(tag) => tag.clone_value(&o.value.lock().unwrap()),
            None => o.value.lock().unwrap().clone(),
        };
        Self::new(o.tag.clone(), value, vec![o.clone()])
    }

    /// Depth-first, cycle-safe search of the proto DAG for `proto`,
    /// stopping (returning `true`) the instant it is found. `isKindOf(o, o)`
    /// is `true` because the search starts by comparing `o` to itself.
    pub fn is_kind_of(o: &ObjRef, proto: &ObjRef) -> bool {
        let mut stack = vec![o.clone()];
        let mut visited: std::collections::HashSet<ObjectId> = std::collections::HashSet::new();

        while let Some(cur) = stack.pop() {
            if Object::identical(&cur, proto) {
                return true;
            }
            if !visited.insert(cur.id) {
                continue;
            }
            cur.protos.foreach_proto(|p| {
                stack.push(p.clone());
                true
            });
        }
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identity_is_unique() {
        let a = Object::new_plain();
        let b = Object::new_plain();
        assert_ne!(a.id(), b.id());
        assert!(!Object::identical(&a, &b));
        assert!(Object::identical(&a, &a));
    }

    #[test]
    fn test_bare_clone_single_proto() {
        let a = Object::new_plain();
        let b = Object::bare_clone(&a);
        assert_ne!(a.id(), b.id());
        let snap = b.protos().snapshot();
        assert_eq!(snap.len(), 1);
        assert!(Object::identical(&snap[0], &a));
    }

    #[test]
    fn test_is_kind_of_reflexive_and_through_clone() {
        let a = Object::new_plain();
        let b = Object::bare_clone(&a);
        assert!(Object::is_kind_of(&a, &a));
        assert!(Object::is_kind_of(&b, &a));
        assert!(!Object::is_kind_of(&a, &b));
    }

    #[test]
    fn test_is_kind_of_cyclic_proto_graph_terminates() {
        let a = Object::new_plain();
        // a's only proto is itself.
        a.protos().append(a.clone());
        let other = Object::new_plain();
        assert!(!Object::is_kind_of(&a, &other));
        assert!(Object::is_kind_of(&a, &a));
    }

    #[test]
    fn test_clone_preserves_tag() {
        let tag = BasicTag::new("Thing");
        let a = Object::new_tagged(tag, Primitive::Number(1.0), Vec::new());
        let b = Object::bare_clone(&a);
        assert_eq!(a.tag().unwrap().name(), b.tag().unwrap().name());
    }
}
