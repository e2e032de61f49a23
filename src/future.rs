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

//! `Future` (spec.md §4.9): a forward-proxying placeholder. `World::future_send`
//! spawns a dedicated coroutine that evaluates a message against a target and
//! stores the result; any message sent to the future before that finishes
//! blocks the sender (registered with the scheduler for deadlock detection)
//! until the value is ready, then resends the original message against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::coro::{CoroId, Vm};
use crate::eval::stop::{EvalResult, Stop, Unwind};
use crate::message::MessageRef;
use crate::object::tag::BasicTag;
use crate::object::{Object, ObjRef, Primitive, Tag};

/// The payload behind `Primitive::Future`.
pub struct FutureValue {
    ready: AtomicBool,
    result: Mutex<Option<ObjRef>>,
    computing: Mutex<Option<CoroId>>,
}

impl FutureValue {
    fn new_pending() -> Arc<Self> {
        Arc::new(FutureValue {
            ready: AtomicBool::new(false),
            result: Mutex::new(None),
            computing: Mutex::new(None),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn set_computing(&self, id: CoroId) {
        *self.computing.lock().unwrap() = Some(id);
    }

    fn computing_coroutine(&self) -> Option<CoroId> {
        *self.computing.lock().unwrap()
    }

    fn resolve(&self, value: ObjRef) {
        *self.result.lock().unwrap() = Some(value);
        self.ready.store(true, Ordering::Release);
        *self.computing.lock().unwrap() = None;
    }
}

pub fn future_tag() -> Arc<dyn Tag> {
    BasicTag::new("Future")
}

/// `Future send` / `World::future_send` (spec.md §4.9): spawns a coroutine
/// that computes `Send(msg, target, locals)` and returns a `Future` object
/// wrapping the in-flight computation.
pub fn spawn_future(msg: MessageRef, target: ObjRef, locals: ObjRef, vm: &Vm) -> ObjRef {
    let future_value = FutureValue::new_pending();
    let future_obj = Object::new_tagged(
        future_tag(),
        Primitive::Future(future_value.clone()),
        vec![vm.world.future_proto.clone()],
    );

    let world = vm.world.clone();
    let scheduler = vm.scheduler.clone();
    let fv = future_value.clone();

    let handle = crate::coro::Builder::new()
        .name("future".to_string())
        .spawn(world, scheduler, move |worker_vm| {
            match crate::eval::send(&msg, &target, &locals, worker_vm) {
                Ok(value) => {
                    fv.resolve(value.clone());
                    Ok(value)
                }
                Err(Unwind::Stopped {
                    stop: Stop::ExceptionStop(exc),
                    ..
                }) => {
                    fv.resolve(exc.value.clone());
                    Err(Unwind::Stopped {
                        stop: Stop::ExceptionStop(exc.clone()),
                        value: exc.value,
                    })
                }
                Err(other) => Err(other),
            }
        });
    future_value.set_computing(handle.coroutine.id());

    future_obj
}

/// `future_proto`'s native `forward` slot: waits for the future backing
/// `future_obj` to resolve, then resends `msg` against the resolved value.
pub fn future_wait(future_obj: &ObjRef, msg: &MessageRef, locals: &ObjRef, vm: &Vm) -> EvalResult {
    let fv = match &*future_obj.value() {
        Primitive::Future(fv) => fv.clone(),
        other => {
            return Err(crate::error::CoreError::TypeMismatch {
                expected: "Future",
                found: primitive_kind(other),
            }
            .into())
        }
    };

    if !fv.is_ready() {
        if let Some(computing) = fv.computing_coroutine() {
            if computing != vm.id {
                vm.scheduler.await_on(vm.id, computing)?;
            }
        }

        while !fv.is_ready() {
            match vm.inbox.poll() {
                Stop::NoStop | Stop::ResumeStop => thread::yield_now(),
                Stop::PauseStop => crate::eval::send::handle_pause(vm)?,
                stop @ (Stop::ContinueStop
                | Stop::BreakStop
                | Stop::ReturnStop
                | Stop::ExceptionStop(_)
                | Stop::ExitStop(_)) => {
                    vm.scheduler.start(vm.id, vm.inbox.clone());
                    return Err(Unwind::Stopped {
                        stop,
                        value: future_obj.clone(),
                    });
                }
            }
        }
        vm.scheduler.start(vm.id, vm.inbox.clone());
    }

    let resolved = fv
        .result
        .lock()
        .unwrap()
        .clone()
        .expect("ready implies a stored result");
    crate::eval::perform(&resolved, locals, msg, vm)
}

fn primitive_kind(p: &Primitive) -> &'static str {
    match p {
        Primitive::None => "None",
        Primitive::Number(_) => "Number",
        Primitive::Str(_) => "String",
        Primitive::Bool(_) => "Bool",
        Primitive::List(_) => "List",
        Primitive::Map(_) => "Map",
        Primitive::Block(_) => "Block",
        Primitive::Message(_) => "Message",
        Primitive::Coroutine(_) => "Coroutine",
        Primitive::Future(_) => "Future",
    }
}
