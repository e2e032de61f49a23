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

//! The message tree (spec.md §3, §4.5, §6): a singly-linked, doubly
//! referenced tree that is the program's reified AST and the unit of
//! evaluation. Building and parsing text into a tree is explicitly out of
//! scope (spec.md §1); what lives here is the tree shape itself, the
//! operator table it is rewritten against, and the shuffle algorithm.

pub mod operator_table;

pub use operator_table::OperatorTable;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::eval::stop::EvalResult;
use crate::object::{Object, ObjRef, Primitive, Tag};

/// A node in the message tree. Shared via `Arc` because message trees are
/// routinely shared across coroutines (memo caches, a Future's stored
/// message) and because blocks close over the very message they were built
/// from.
pub struct MessageNode {
    pub text: String,
    pub args: Vec<MessageRef>,
    next: Mutex<Option<MessageRef>>,
    prev: Mutex<Option<Weak<MessageNode>>>,
    memo: Mutex<Option<ObjRef>>,
    pub label: Option<String>,
    pub line: u32,
    pub col: u32,
    shuffled: AtomicBool,
}

pub type MessageRef = Arc<MessageNode>;

impl MessageNode {
    pub fn new(text: impl Into<String>, args: Vec<MessageRef>) -> MessageRef {
        Self::with_position(text, args, None, 0, 0)
    }

    pub fn with_position(
        text: impl Into<String>,
        args: Vec<MessageRef>,
        label: Option<String>,
        line: u32,
        col: u32,
    ) -> MessageRef {
        Arc::new(MessageNode {
            text: text.into(),
            args,
            next: Mutex::new(None),
            prev: Mutex::new(None),
            memo: Mutex::new(None),
            label,
            line,
            col,
            shuffled: AtomicBool::new(false),
        })
    }

    /// A terminator message: `";"` or `"\n"`.
    pub fn is_terminator(&self) -> bool {
        self.text == ";" || self.text == "\n"
    }

    pub fn next(&self) -> Option<MessageRef> {
        self.next.lock().unwrap().clone()
    }

    pub fn prev(&self) -> Option<MessageRef> {
        self.prev.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Links `next` as the following sibling of `self`, maintaining the
    /// invariant that `next.prev == self` (spec.md §3 invariants).
    pub fn link_next(self: &MessageRef, next: MessageRef) {
        *next.prev.lock().unwrap() = Some(Arc::downgrade(self));
        *self.next.lock().unwrap() = Some(next);
    }

    pub fn memo(&self) -> Option<ObjRef> {
        self.memo.lock().unwrap().clone()
    }

    pub fn set_memo(&self, value: ObjRef) {
        *self.memo.lock().unwrap() = Some(value);
    }

    pub fn clear_memo(&self) {
        *self.memo.lock().unwrap() = None;
    }

    /// Marks this node as the head of an already-shuffled chain, so a
    /// second `shuffle` pass treats it as a pass-through (idempotency,
    /// spec.md §4.5).
    pub fn mark_shuffled_marker(&self) {
        self.shuffled.store(true, Ordering::Release);
    }

    pub fn is_shuffled_marker(&self) -> bool {
        self.shuffled.load(Ordering::Acquire)
    }

    /// `Message clone`: a deep copy. Distinct identity for every node, but
    /// no shared mutable state with the original (memo caches are not
    /// carried over: a clone has not yet evaluated to anything).
    pub fn deep_clone(self: &MessageRef) -> MessageRef {
        let cloned_args = self.args.iter().map(MessageNode::deep_clone).collect();
        let head = MessageNode::with_position(
            self.text.clone(),
            cloned_args,
            self.label.clone(),
            self.line,
            self.col,
        );
        if let Some(n) = self.next() {
            head.link_next(n.deep_clone());
        }
        head
    }

    /// Collects `(text)` chain for stack traces (spec.md §4.7, exceptions
    /// carry "a stack of messages captured during unwind").
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{}:{}:{} {}", label, self.line, self.col, self.text),
            None => self.text.clone(),
        }
    }
}

/// The tag behind a `Message`-wrapped object (spec.md §6, the `call message`
/// surface a block's locals expose). Activation is identity — a Message
/// object is data, never a callable — but cloning deep-copies the
/// underlying tree, matching "deeply copied on `Message clone`" (spec.md §3).
#[derive(Debug)]
pub struct MessageTag;

impl Tag for MessageTag {
    fn name(&self) -> &'static str {
        "Message"
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

    fn clone_value(&self, value: &Primitive) -> Primitive {
        match value {
            Primitive::Message(m) => Primitive::Message(m.deep_clone()),
            other => other.clone(),
        }
    }
}

pub fn message_tag() -> Arc<dyn Tag> {
    Arc::new(MessageTag)
}

/// Wraps a `MessageRef` as a first-class `Object` (tag `Message`, proto
/// `message_proto`), so block activation can bind `call message` to
/// something language code can send `name`/`args`/`label` to.
pub fn message_object(msg: MessageRef, message_proto: ObjRef) -> ObjRef {
    Object::new_tagged(message_tag(), Primitive::Message(msg), vec![message_proto])
}

impl fmt::Debug for MessageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageNode")
            .field("text", &self.text)
            .field("args", &self.args.len())
            .finish_non_exhaustive()
    }
}

/// Walks the `next` chain into a flat `Vec`, stopping at (but including) the
/// first terminator or the end of the chain.
pub fn flatten_chain(root: &MessageRef) -> Vec<MessageRef> {
    let mut out = Vec::new();
    let mut cur = Some(root.clone());
    while let Some(node) = cur {
        let next = node.next();
        out.push(node);
        cur = next;
    }
    out
}
