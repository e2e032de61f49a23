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

//! `World`: the process-wide singletons a running program shares (spec.md
//! §9's "a small set of global, already-bootstrapped prototypes... collected
//! behind one struct rather than a scattering of `once_cell` statics").
//!
//! `World::new` builds the prototype graph and wires up the primitive
//! methods (`clone`, `setSlot`, `try`, `Exception raise`, arithmetic, ...) as
//! `NativeTag` closures, exactly the way a bootstrap `.io` file would define
//! them in the teacher's target language, but expressed as Rust because
//! parsing source text is out of scope (spec.md §1).

use std::sync::Arc;

use crate::coro::Vm;
use crate::error::CoreError;
use crate::eval::stop::{EvalResult, Stop, Unwind};
use crate::message::{MessageRef, OperatorTable};
use crate::object::tag::{BasicTag, NativeTag};
use crate::object::{Object, ObjRef, Primitive};
use crate::scheduler::Scheduler;

/// The bootstrap owner id used to bind slots before any coroutine exists.
/// Real `CoroId`s start at 1 (see `object::next_object_id`), so 0 can never
/// collide with a live coroutine and never needs to be released by anyone
/// else.
const BOOTSTRAP_OWNER: crate::coro::CoroId = 0;

pub struct World {
    /// The default sender context top-level code runs against.
    pub lobby: ObjRef,
    /// Namespace holding the builtin prototypes (`core Object`, `core Number`, ...).
    pub core: ObjRef,
    /// Namespace addons install themselves into; empty by default.
    pub addons: ObjRef,

    pub base_object: ObjRef,
    pub nil: ObjRef,
    pub true_obj: ObjRef,
    pub false_obj: ObjRef,
    pub number_proto: ObjRef,
    pub string_proto: ObjRef,
    pub message_proto: ObjRef,
    pub future_proto: ObjRef,
    pub exception_proto: ObjRef,

    pub operators: Arc<OperatorTable>,
    pub scheduler: Arc<Scheduler>,
    pub coroutine_tag: Arc<dyn crate::object::Tag>,
}

impl World {
    pub fn new() -> Arc<World> {
        let base_object = Object::new_plain();
        let nil = Object::new_plain();
        let number_proto = Object::new_tagged(BasicTag::new("Number"), Primitive::Number(0.0), vec![base_object.clone()]);
        let string_proto = Object::new_tagged(BasicTag::new("Sequence"), Primitive::Str(String::new()), vec![base_object.clone()]);
        let message_proto = Object::new_plain();
        message_proto.protos().append(base_object.clone());
        let future_proto = Object::new_plain();
        future_proto.protos().append(base_object.clone());
        let exception_proto = Object::new_plain();
        exception_proto.protos().append(base_object.clone());
        let true_obj = Object::new_tagged(BasicTag::new("Boolean"), Primitive::Bool(true), vec![base_object.clone()]);
        let false_obj = Object::new_tagged(BasicTag::new("Boolean"), Primitive::Bool(false), vec![base_object.clone()]);

        let core = Object::new_plain();
        core.protos().append(base_object.clone());
        core.bind_slot("Object", base_object.clone(), BOOTSTRAP_OWNER);
        core.bind_slot("Number", number_proto.clone(), BOOTSTRAP_OWNER);
        core.bind_slot("Sequence", string_proto.clone(), BOOTSTRAP_OWNER);
        core.bind_slot("Message", message_proto.clone(), BOOTSTRAP_OWNER);
        core.bind_slot("Future", future_proto.clone(), BOOTSTRAP_OWNER);
        core.bind_slot("Exception", exception_proto.clone(), BOOTSTRAP_OWNER);

        let addons = Object::new_plain();

        // `lobby`'s proto chain reaches `base_object` through `core`, so
        // top-level code gets `clone`/`setSlot`/`try` for free.
        let lobby = Object::new_plain();
        lobby.protos().append(core.clone());

        let world = Arc::new(World {
            lobby,
            core,
            addons,
            base_object: base_object.clone(),
            nil: nil.clone(),
            true_obj,
            false_obj: false_obj.clone(),
            number_proto: number_proto.clone(),
            string_proto,
            message_proto,
            future_proto: future_proto.clone(),
            exception_proto: exception_proto.clone(),
            operators: Arc::new(OperatorTable::default_table()),
            scheduler: Scheduler::new(),
            coroutine_tag: crate::coro::coroutine_tag(),
        });

        install_base_object_methods(&base_object);
        install_number_methods(&number_proto);
        install_string_methods(&world.string_proto);
        install_message_methods(&world.message_proto);
        install_future_methods(&future_proto);
        install_exception_methods(&exception_proto);

        world
    }

    /// A value is "false" only if it is `false` or `nil` (spec.md §4.1);
    /// every other object, including `0` and `""`, is truthy.
    pub fn is_true(&self, obj: &ObjRef) -> bool {
        !Object::identical(obj, &self.false_obj) && !Object::identical(obj, &self.nil)
    }

    pub fn wrap_number(&self, n: f64) -> ObjRef {
        Object::new_tagged(BasicTag::new("Number"), Primitive::Number(n), vec![self.number_proto.clone()])
    }

    pub fn wrap_str(&self, s: impl Into<String>) -> ObjRef {
        Object::new_tagged(BasicTag::new("Sequence"), Primitive::Str(s.into()), vec![self.string_proto.clone()])
    }

    pub fn wrap_bool(&self, b: bool) -> ObjRef {
        if b {
            self.true_obj.clone()
        } else {
            self.false_obj.clone()
        }
    }
}

fn as_number(o: &ObjRef) -> Result<f64, CoreError> {
    match &*o.value() {
        Primitive::Number(n) => Ok(*n),
        _ => Err(CoreError::TypeMismatch {
            expected: "Number",
            found: "other",
        }),
    }
}

fn as_str(o: &ObjRef) -> Result<String, CoreError> {
    match &*o.value() {
        Primitive::Str(s) => Ok(s.clone()),
        _ => Err(CoreError::TypeMismatch {
            expected: "String",
            found: "other",
        }),
    }
}

/// `clone`, `setSlot`, `updateSlot`, `newSlot`, `try` (spec.md §4.1, §4.3,
/// §4.7): the handful of primitive methods every object inherits from
/// `base_object`.
fn install_base_object_methods(base_object: &ObjRef) {
    base_object.bind_slot(
        "clone",
        Object::new_tagged(
            NativeTag::new("clone", |_object, target, _locals, _context, _msg| {
                crate::eval::clone_with_init(target, Vm::current())
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    base_object.bind_slot(
        "setSlot",
        Object::new_tagged(
            NativeTag::new("setSlot", |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let name = slot_name_arg(msg, locals, vm)?;
                // `GetSlotSync`: claim before evaluating the new value, not
                // after, so a concurrent `setSlot`/`updateSlot` on the same
                // name can't land its write between our read and our store.
                let cell = crate::slot::open_slot_sync(target, &name, vm.id);
                let result = eval_and_store(&cell, msg, locals, vm);
                cell.release(vm.id);
                result
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    // `newSlot` (spec.md §4.3, the `::=` rewrite target) behaves exactly
    // like `setSlot` for a core without slot-description metadata.
    base_object.bind_slot(
        "newSlot",
        Object::new_tagged(
            NativeTag::new("newSlot", |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let name = slot_name_arg(msg, locals, vm)?;
                let cell = crate::slot::open_slot_sync(target, &name, vm.id);
                let result = eval_and_store(&cell, msg, locals, vm);
                cell.release(vm.id);
                result
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    base_object.bind_slot(
        "updateSlot",
        Object::new_tagged(
            NativeTag::new("updateSlot", |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let name = slot_name_arg(msg, locals, vm)?;
                let found = match crate::slot::get_slot_sync(target, &name, vm.scratch(), vm.id) {
                    Some(found) => found,
                    None => return Err(CoreError::does_not_respond(target.id(), format!("updateSlot({})", name)).into()),
                };
                let result = eval_and_store(&found.cell, msg, locals, vm);
                found.cell.release(vm.id);
                result
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    base_object.bind_slot(
        "try",
        Object::new_tagged(
            NativeTag::new("try", |_object, _target, locals, _context, msg| {
                let vm = Vm::current();
                let body = match msg.args.first() {
                    Some(b) => b,
                    None => return Ok(vm.world.nil.clone()),
                };
                match crate::eval::send(body, locals, locals, vm) {
                    Ok(value) => Ok(value),
                    Err(Unwind::Stopped {
                        stop: Stop::ExceptionStop(exc),
                        ..
                    }) => Ok(exc.value),
                    Err(other) => Err(other),
                }
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );
}

/// Evaluates `msg.args[1]` (the new value) against the caller's own locals
/// and stores it into `cell`, which the caller already holds claimed —
/// `setSlot`/`newSlot`/`updateSlot`'s shared read-modify-write body. The
/// cell stays claimed across the evaluation itself, so if the value
/// expression reads the same slot by name (`x := x + 1`), that read claims
/// the same cell again under the same coroutine and nests instead of
/// racing a concurrent writer.
fn eval_and_store(cell: &crate::slot::SlotCell, msg: &MessageRef, locals: &ObjRef, vm: &Vm) -> EvalResult {
    let value = match msg.args.get(1) {
        Some(v) => crate::eval::send(v, locals, locals, vm)?,
        None => vm.world.nil.clone(),
    };
    cell.store(Some(value.clone()));
    Ok(value)
}

/// Reads `msg.args[0]` as a slot name: either an already-quoted string
/// literal (the common `setSlot("x", ...)` call shape produced by `:=`
/// shuffling) or any message whose evaluation yields a `Sequence`.
fn slot_name_arg(msg: &MessageRef, locals: &ObjRef, vm: &Vm) -> Result<String, Unwind> {
    let name_msg = msg
        .args
        .first()
        .ok_or_else(|| Unwind::Error(CoreError::ArityMismatch {
            selector: msg.text.clone(),
            expected: 2,
            got: msg.args.len(),
        }))?;
    if name_msg.text.starts_with('"') && name_msg.text.ends_with('"') && name_msg.text.len() >= 2 {
        return Ok(name_msg.text[1..name_msg.text.len() - 1].to_string());
    }
    let value = crate::eval::send(name_msg, locals, locals, vm)?;
    Ok(as_str(&value)?)
}

fn install_number_methods(number_proto: &ObjRef) {
    let binary = |name: &'static str, op: fn(f64, f64) -> f64| {
        Object::new_tagged(
            NativeTag::new(name, move |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let lhs = as_number(target)?;
                let rhs_msg = msg
                    .args
                    .first()
                    .ok_or_else(|| CoreError::ArityMismatch { selector: name.to_string(), expected: 1, got: 0 })?;
                let rhs_obj = crate::eval::send(rhs_msg, locals, locals, vm)?;
                let rhs = as_number(&rhs_obj)?;
                Ok(vm.world.wrap_number(op(lhs, rhs)))
            }),
            Primitive::None,
            vec![],
        )
    };
    let compare = |name: &'static str, op: fn(f64, f64) -> bool| {
        Object::new_tagged(
            NativeTag::new(name, move |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let lhs = as_number(target)?;
                let rhs_msg = msg
                    .args
                    .first()
                    .ok_or_else(|| CoreError::ArityMismatch { selector: name.to_string(), expected: 1, got: 0 })?;
                let rhs_obj = crate::eval::send(rhs_msg, locals, locals, vm)?;
                let rhs = as_number(&rhs_obj)?;
                Ok(vm.world.wrap_bool(op(lhs, rhs)))
            }),
            Primitive::None,
            vec![],
        )
    };

    number_proto.bind_slot("+", binary("+", |a, b| a + b), BOOTSTRAP_OWNER);
    number_proto.bind_slot("-", binary("-", |a, b| a - b), BOOTSTRAP_OWNER);
    number_proto.bind_slot("*", binary("*", |a, b| a * b), BOOTSTRAP_OWNER);
    number_proto.bind_slot("/", binary("/", |a, b| a / b), BOOTSTRAP_OWNER);
    number_proto.bind_slot("<", compare("<", |a, b| a < b), BOOTSTRAP_OWNER);
    number_proto.bind_slot(">", compare(">", |a, b| a > b), BOOTSTRAP_OWNER);
    number_proto.bind_slot("==", compare("==", |a, b| a == b), BOOTSTRAP_OWNER);
}

fn install_string_methods(string_proto: &ObjRef) {
    string_proto.bind_slot(
        ",",
        Object::new_tagged(
            NativeTag::new(",", |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let lhs = as_str(target)?;
                let rhs_msg = msg
                    .args
                    .first()
                    .ok_or_else(|| CoreError::ArityMismatch { selector: ",".to_string(), expected: 1, got: 0 })?;
                let rhs_obj = crate::eval::send(rhs_msg, locals, locals, vm)?;
                let rhs = as_str(&rhs_obj)?;
                Ok(vm.world.wrap_str(format!("{}{}", lhs, rhs)))
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    string_proto.bind_slot(
        "size",
        Object::new_tagged(
            NativeTag::new("size", |_object, target, _locals, _context, _msg| {
                let vm = Vm::current();
                let s = as_str(target)?;
                Ok(vm.world.wrap_number(s.chars().count() as f64))
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );
}

/// `Message name`/`Message arguments` (spec.md §6): the surface a block's
/// `call message` slot exposes.
fn install_message_methods(message_proto: &ObjRef) {
    message_proto.bind_slot(
        "name",
        Object::new_tagged(
            NativeTag::new("name", |_object, target, _locals, _context, _msg| {
                let vm = Vm::current();
                match &*target.value() {
                    Primitive::Message(m) => Ok(vm.world.wrap_str(m.text.clone())),
                    _ => Err(CoreError::TypeMismatch {
                        expected: "Message",
                        found: "other",
                    }
                    .into()),
                }
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    message_proto.bind_slot(
        "argumentCount",
        Object::new_tagged(
            NativeTag::new("argumentCount", |_object, target, _locals, _context, _msg| {
                let vm = Vm::current();
                match &*target.value() {
                    Primitive::Message(m) => Ok(vm.world.wrap_number(m.args.len() as f64)),
                    _ => Err(CoreError::TypeMismatch {
                        expected: "Message",
                        found: "other",
                    }
                    .into()),
                }
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );
}

fn install_future_methods(future_proto: &ObjRef) {
    future_proto.bind_slot(
        "forward",
        Object::new_tagged(
            NativeTag::new("forward", |_object, target, locals, _context, msg| {
                crate::future::future_wait(target, msg, locals, Vm::current())
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );
}

/// `Exception raise`/`Exception type` (spec.md §4.7, §7).
fn install_exception_methods(exception_proto: &ObjRef) {
    exception_proto.bind_slot(
        "raise",
        Object::new_tagged(
            NativeTag::new("raise", |_object, target, locals, _context, msg| {
                let vm = Vm::current();
                let exc = Object::bare_clone(target);
                if let Some(arg) = msg.args.first() {
                    let value = crate::eval::send(arg, locals, locals, vm)?;
                    exc.bind_slot("error", value, vm.id);
                }
                Err(Unwind::Stopped {
                    stop: Stop::ExceptionStop(crate::error::RaisedException {
                        value: exc.clone(),
                        message_stack: vec![msg.describe()],
                    }),
                    value: exc,
                })
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );

    exception_proto.bind_slot(
        "type",
        Object::new_tagged(
            NativeTag::new("type", |_object, _target, _locals, _context, _msg| {
                Ok(Vm::current().world.wrap_str("Exception"))
            }),
            Primitive::None,
            vec![],
        ),
        BOOTSTRAP_OWNER,
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_world_bootstrap_wires_core_namespace() {
        let world = World::new();
        assert!(crate::slot::get_local(&world.core, "Object").is_some());
        assert!(crate::slot::get_local(&world.core, "Exception").is_some());
        assert!(world.is_true(&world.true_obj));
        assert!(!world.is_true(&world.false_obj));
        assert!(!world.is_true(&world.nil));
    }

    #[test]
    fn test_wrap_number_carries_number_proto() {
        let world = World::new();
        let n = world.wrap_number(3.0);
        assert!(Object::is_kind_of(&n, &world.number_proto));
    }
}
