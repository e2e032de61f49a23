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

//! `Tag`: the dispatch vtable that lets natively-implemented types override
//! activation and cloning (spec.md §3, §4.1).

use std::fmt;
use std::sync::Arc;

use crate::eval::stop::EvalResult;
use crate::message::MessageRef;
use crate::object::{ObjRef, Primitive};

/// A `Tag` is a process-level singleton keyed by type identity. It decides
/// what happens when its object is found as the value of a slot being sent
/// a message (`activate`), and how its primitive payload is reproduced on
/// `clone` (`clone_value`).
pub trait Tag: Send + Sync + fmt::Debug {
    /// Display name, used in `serialized()` output and diagnostics.
    fn name(&self) -> &'static str;

    /// `o.tag.activate(o, target, locals, context, msg)`. `context` is the
    /// proto on which the slot was actually found. Returns `Unwind::Stop`
    /// rather than a plain error when activation needs to propagate a
    /// control-flow signal (a method body hitting `return`, an exception
    /// raised mid-call, and so on) past this one activation.
    fn activate(
        &self,
        object: &ObjRef,
        target: &ObjRef,
        locals: &ObjRef,
        context: &ObjRef,
        msg: &MessageRef,
    ) -> EvalResult;

    /// How the primitive value is reproduced when an object carrying this
    /// tag is cloned.
    fn clone_value(&self, value: &Primitive) -> Primitive;
}

/// A convenience tag: identity activation (the object is returned unchanged,
/// exactly as the tagless default would) plus shared-copy cloning (the
/// primitive value is reproduced via its own `Clone` impl, which for the
/// reference-counted variants just bumps a refcount rather than deep-copying).
#[derive(Debug, Clone, Copy)]
pub struct BasicTag {
    name: &'static str,
}

impl BasicTag {
    pub fn new(name: &'static str) -> Arc<dyn Tag> {
        Arc::new(BasicTag { name })
    }
}

impl Tag for BasicTag {
    fn name(&self) -> &'static str {
        self.name
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
        value.clone()
    }
}

/// A tag whose activation is an arbitrary Rust closure. This is how every
/// "primitive method" in the runtime is implemented: `Future forward`,
/// `Message name`, and similar native slots are ordinary objects tagged
/// with a `NativeTag` rather than special cases the evaluator knows about.
pub struct NativeTag {
    name: &'static str,
    func: Box<
        dyn Fn(&ObjRef, &ObjRef, &ObjRef, &ObjRef, &MessageRef) -> EvalResult + Send + Sync,
    >,
}

impl NativeTag {
    pub fn new<F>(name: &'static str, func: F) -> Arc<dyn Tag>
    where
        F: Fn(&ObjRef, &ObjRef, &ObjRef, &ObjRef, &MessageRef) -> EvalResult + Send + Sync + 'static,
    {
        Arc::new(NativeTag {
            name,
            func: Box::new(func),
        })
    }
}

impl fmt::Debug for NativeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeTag").field("name", &self.name).finish()
    }
}

impl Tag for NativeTag {
    fn name(&self) -> &'static str {
        self.name
    }

    fn activate(
        &self,
        object: &ObjRef,
        target: &ObjRef,
        locals: &ObjRef,
        context: &ObjRef,
        msg: &MessageRef,
    ) -> EvalResult {
        (self.func)(object, target, locals, context, msg)
    }

    fn clone_value(&self, value: &Primitive) -> Primitive {
        value.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_basic_tag_activates_to_identity() {
        let tag = BasicTag::new("Thing");
        let o = Object::new_tagged(tag, Primitive::None, Vec::new());
        let msg = crate::message::MessageNode::new("x", vec![]);
        let result = o.tag().unwrap().activate(&o, &o, &o, &o, &msg);
        assert!(Object::identical(&result.unwrap(), &o));
    }

    #[test]
    fn test_native_tag_runs_closure() {
        let tag = NativeTag::new("answer", |_object, _target, _locals, _context, _msg| {
            Ok(Object::new_plain())
        });
        let o = Object::new_tagged(tag, Primitive::None, Vec::new());
        let msg = crate::message::MessageNode::new("answer", vec![]);
        let result = o.tag().unwrap().activate(&o, &o, &o, &o, &msg);
        assert!(result.is_ok());
    }
}
