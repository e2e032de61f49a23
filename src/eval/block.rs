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

//! Block/method activation (spec.md §4.6). One record (`BlockValue`)
//! represents both: a *method* is a block with `activatable = true` and no
//! captured scope; a *closure* is a block with a captured scope, returned
//! as-is (not activated) when merely accessed as a slot value.

use std::sync::Arc;

use crate::coro::Vm;
use crate::error::CoreError;
use crate::eval::send;
use crate::eval::stop::{EvalResult, Stop, Unwind};
use crate::message::MessageRef;
use crate::object::{Object, ObjRef, Primitive, Tag};

/// The payload behind `Primitive::Block`.
#[derive(Clone)]
pub struct BlockValue {
    pub message: MessageRef,
    pub arg_names: Vec<String>,
    /// `Some(locals)` for a closure (captures the defining scope); `None`
    /// for a method (fresh locals every call, `self = target`).
    pub scope: Option<ObjRef>,
    pub activatable: bool,
    /// `PassStops`: whether `ReturnStop` (and below) propagate through this
    /// block to its own caller instead of being absorbed here.
    pub pass_stops: bool,
}

impl BlockValue {
    pub fn new_closure(message: MessageRef, arg_names: Vec<String>, scope: ObjRef) -> Self {
        BlockValue {
            message,
            arg_names,
            scope: Some(scope),
            activatable: false,
            pass_stops: false,
        }
    }

    /// `ObjectMethod` (spec.md §4.6): a block plus `activatable = true` and
    /// no captured scope.
    pub fn new_method(message: MessageRef, arg_names: Vec<String>) -> Self {
        BlockValue {
            message,
            arg_names,
            scope: None,
            activatable: true,
            pass_stops: false,
        }
    }

    pub fn pass_stops(mut self, pass: bool) -> Self {
        self.pass_stops = pass;
        self
    }
}

/// Activates method-tagged blocks; a non-activatable (closure) block's tag
/// activation is identity, since it is meant to be handed back as a value
/// when merely looked up (spec.md §4.6's "non-activatable blocks are
/// closures returned as-is when accessed").
#[derive(Debug)]
pub struct BlockTag;

impl Tag for BlockTag {
    fn name(&self) -> &'static str {
        "Block"
    }

    fn activate(
        &self,
        object: &ObjRef,
        target: &ObjRef,
        locals: &ObjRef,
        _context: &ObjRef,
        msg: &MessageRef,
    ) -> EvalResult {
        let block = match &*object.value() {
            Primitive::Block(b) => b.clone(),
            _ => return Ok(object.clone()),
        };

        if !block.activatable {
            return Ok(object.clone());
        }

        call(object, &block, target, locals, msg, Vm::current())
    }

    fn clone_value(&self, value: &Primitive) -> Primitive {
        value.clone()
    }
}

pub fn block_tag() -> Arc<dyn Tag> {
    Arc::new(BlockTag)
}

/// `call(block, target, sender_locals, msg, vm)` (spec.md §4.6, steps 1-5).
pub fn call(
    block_obj: &ObjRef,
    block: &BlockValue,
    target: &ObjRef,
    sender_locals: &ObjRef,
    msg: &MessageRef,
    vm: &Vm,
) -> EvalResult {
    let scope = block.scope.clone().unwrap_or_else(|| target.clone());

    let new_locals = Object::new_plain();
    new_locals.protos().append(scope.clone());
    new_locals.bind_slot("self", scope, vm.id);

    let call_descriptor = build_call_descriptor(sender_locals, block_obj, msg, target, vm);
    new_locals.bind_slot("call", call_descriptor, vm.id);

    for (i, arg_name) in block.arg_names.iter().enumerate() {
        // Arguments are written in the sender's source position, so they
        // evaluate against the sender's own locals, not against `target`
        // (the receiver the call itself landed on).
        let value = match msg.args.get(i) {
            Some(arg_msg) => send(arg_msg, sender_locals, sender_locals, vm)?,
            None => vm.world.nil.clone(),
        };
        new_locals.bind_slot(arg_name, value, vm.id);
    }

    match send(&block.message, &new_locals, &new_locals, vm) {
        Ok(value) => Ok(value),
        Err(Unwind::Stopped {
            stop: Stop::ContinueStop | Stop::BreakStop | Stop::ReturnStop,
            value,
        }) if !block.pass_stops => Ok(value),
        Err(other) => Err(other),
    }
}

/// The `call` descriptor (spec.md §4.6, step 2): `sender-locals`,
/// `activated-block`, `message`, `target`.
fn build_call_descriptor(
    sender_locals: &ObjRef,
    block_obj: &ObjRef,
    msg: &MessageRef,
    target: &ObjRef,
    vm: &Vm,
) -> ObjRef {
    let descriptor = Object::new_plain();
    let message_obj = crate::message::message_object(msg.clone(), vm.world.message_proto.clone());

    descriptor.bind_slot("senderLocals", sender_locals.clone(), vm.id);
    descriptor.bind_slot("activatedBlock", block_obj.clone(), vm.id);
    descriptor.bind_slot("message", message_obj, vm.id);
    descriptor.bind_slot("target", target.clone(), vm.id);
    descriptor
}

/// Fails a block call with the wrong argument count, for callers that want
/// strict arity (most blocks bind missing args to nil per spec.md §4.6
/// instead; this is for natively-implemented methods that require exact
/// arity).
pub fn require_arity(selector: &str, msg: &MessageRef, expected: usize) -> Result<(), CoreError> {
    if msg.args.len() != expected {
        return Err(CoreError::ArityMismatch {
            selector: selector.to_string(),
            expected,
            got: msg.args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::MessageNode;
    use crate::scheduler::Scheduler;
    use crate::world::World;

    fn fresh_vm() -> (Arc<World>, Vm) {
        let world = World::new();
        let scheduler = world.scheduler.clone();
        let inbox = Arc::new(crate::eval::stop::Inbox::new());
        let vm = Vm::new(1, world.clone(), inbox, scheduler);
        (world, vm)
    }

    #[test]
    fn test_method_binds_args_and_runs_body() {
        let (world, vm) = fresh_vm();
        vm.install();

        // method(x, x) -- body just returns its single arg back.
        let body = MessageNode::new("x", vec![]);
        let block = BlockValue::new_method(body, vec!["x".to_string()]);
        let block_obj = Object::new_tagged(block_tag(), Primitive::Block(block.clone()), vec![]);

        let target = Object::new_plain();
        let sender_locals = Object::new_plain();
        let arg_value = Object::new_plain();
        let arg_msg = MessageNode::new("v", vec![]);
        sender_locals.bind_slot("v", arg_value.clone(), 1);

        let call_msg = MessageNode::new("m", vec![arg_msg]);
        let result = call(&block_obj, &block, &target, &sender_locals, &call_msg, Vm::current())
            .expect("call succeeds");
        assert!(Object::identical(&result, &arg_value));
        let _ = world;
    }

    #[test]
    fn test_missing_arg_binds_nil() {
        let (world, vm) = fresh_vm();
        vm.install();

        let body = MessageNode::new("x", vec![]);
        let block = BlockValue::new_method(body, vec!["x".to_string()]);
        let block_obj = Object::new_tagged(block_tag(), Primitive::Block(block.clone()), vec![]);

        let target = Object::new_plain();
        let sender_locals = Object::new_plain();
        let call_msg = MessageNode::new("m", vec![]);

        let result = call(&block_obj, &block, &target, &sender_locals, &call_msg, Vm::current())
            .expect("call succeeds");
        assert!(Object::identical(&result, &world.nil));
    }

    #[test]
    fn test_continue_and_break_are_absorbed_by_default() {
        let (world, vm) = fresh_vm();
        vm.install();
        let vm = Vm::current();

        for stop in [Stop::ContinueStop, Stop::BreakStop] {
            let body = MessageNode::new("x", vec![]);
            let block = BlockValue::new_method(body, vec![]);
            let block_obj = Object::new_tagged(block_tag(), Primitive::Block(block.clone()), vec![]);

            let target = Object::new_plain();
            target.bind_slot("x", Object::new_plain(), 1);
            let sender_locals = Object::new_plain();
            let call_msg = MessageNode::new("m", vec![]);

            vm.inbox.post_control(stop);
            call(&block_obj, &block, &target, &sender_locals, &call_msg, vm)
                .expect("continue/break do not escape a default block");
        }
        let _ = world;
    }

    #[test]
    fn test_pass_stops_lets_continue_and_break_escape() {
        let (world, vm) = fresh_vm();
        vm.install();
        let vm = Vm::current();

        for stop in [Stop::ContinueStop, Stop::BreakStop, Stop::ReturnStop] {
            let body = MessageNode::new("x", vec![]);
            let block = BlockValue::new_method(body, vec![]).pass_stops(true);
            let block_obj = Object::new_tagged(block_tag(), Primitive::Block(block.clone()), vec![]);

            let target = Object::new_plain();
            target.bind_slot("x", Object::new_plain(), 1);
            let sender_locals = Object::new_plain();
            let call_msg = MessageNode::new("m", vec![]);

            vm.inbox.post_control(stop.clone());
            let err = call(&block_obj, &block, &target, &sender_locals, &call_msg, vm).unwrap_err();
            assert!(matches!(err, Unwind::Stopped { stop: s, .. } if std::mem::discriminant(&s) == std::mem::discriminant(&stop)));
        }
        let _ = world;
    }
}
