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

//! End-to-end scenarios exercised against a fully bootstrapped `World`
//! rather than any one module in isolation: cloning, proto dispatch,
//! forwarding, exception handling, coroutine deadlock, futures, and the
//! operator precedence shuffle. Message trees are built by hand since
//! parsing source text is out of scope; each test plays the part a parser
//! would otherwise play.

use std::sync::{Arc, Mutex};

use crate::coro::{Builder, Vm};
use crate::error::CoreError;
use crate::eval::block::{block_tag, BlockValue};
use crate::eval::stop::{Inbox, Stop};
use crate::eval::{clone_with_init, send};
use crate::future::spawn_future;
use crate::message::operator_table::shuffle;
use crate::message::{MessageNode, MessageRef, OperatorTable};
use crate::object::{Object, ObjRef, Primitive};
use crate::world::World;

fn fresh_vm() -> (Arc<World>, Vm) {
    let world = World::new();
    let scheduler = world.scheduler.clone();
    let inbox = Arc::new(Inbox::new());
    let vm = Vm::new(1, world.clone(), inbox, scheduler);
    (world, vm)
}

fn expect_str(o: &ObjRef, want: &str) {
    match &*o.value() {
        Primitive::Str(s) => assert_eq!(s, want),
        other => panic!("expected Str({:?}), got {:?}", want, other),
    }
}

fn expect_number(o: &ObjRef, want: f64) {
    match &*o.value() {
        Primitive::Number(n) => assert_eq!(*n, want),
        other => panic!("expected Number({}), got {:?}", want, other),
    }
}

#[test]
fn clone_preserves_parent_as_first_proto() {
    let (world, vm) = fresh_vm();
    vm.install();
    let vm = Vm::current();

    let a = clone_with_init(&world.base_object, vm).expect("a clones");
    let b = clone_with_init(&a, vm).expect("b clones");

    let protos = b.protos().snapshot();
    assert!(Object::identical(&protos[0], &a));
}

#[test]
fn method_dispatch_resolves_through_the_proto_chain() {
    let (world, vm) = fresh_vm();
    vm.install();
    let vm = Vm::current();

    let a = clone_with_init(&world.base_object, vm).expect("a clones");
    a.bind_slot("greeting", world.wrap_str("hello"), vm.id);
    let greet_body = MessageNode::new("greeting", vec![]);
    let greet = BlockValue::new_method(greet_body, vec![]);
    a.bind_slot(
        "greet",
        Object::new_tagged(block_tag(), Primitive::Block(greet), vec![]),
        vm.id,
    );

    let b = clone_with_init(&a, vm).expect("b clones");

    let call = MessageNode::new("greet", vec![]);
    let result = send(&call, &b, &b, vm).expect("greet dispatches through b's proto a");
    expect_str(&result, "hello");
}

#[test]
fn forward_fallback_sees_the_missed_selector_by_name() {
    let (world, vm) = fresh_vm();
    vm.install();
    let vm = Vm::current();

    let a = clone_with_init(&world.base_object, vm).expect("a clones");
    a.bind_slot("caughtPrefix", world.wrap_str("caught "), vm.id);

    // forward := method("caught " .. call message name)
    let call_node = MessageNode::new("call", vec![]);
    let message_node = MessageNode::new("message", vec![]);
    let name_node = MessageNode::new("name", vec![]);
    call_node.link_next(message_node.clone());
    message_node.link_next(name_node);

    let prefix_node = MessageNode::new("caughtPrefix", vec![]);
    let concat_node = MessageNode::new(",", vec![call_node]);
    prefix_node.link_next(concat_node);

    let forward = BlockValue::new_method(prefix_node, vec![]);
    a.bind_slot(
        "forward",
        Object::new_tagged(block_tag(), Primitive::Block(forward), vec![]),
        vm.id,
    );

    let xyz = MessageNode::new("xyz", vec![]);
    let result = send(&xyz, &a, &a, vm).expect("forward catches the miss");
    expect_str(&result, "caught xyz");
}

#[test]
fn try_catches_a_raised_exception_and_the_result_answers_type() {
    let (world, vm) = fresh_vm();
    vm.install();
    let vm = Vm::current();

    let oops = MessageNode::new("oops", vec![]);
    oops.set_memo(world.wrap_str("oops"));

    // Exception raise("oops")
    let exception_ident = MessageNode::new("Exception", vec![]);
    let raise = MessageNode::new("raise", vec![oops]);
    exception_ident.link_next(raise);

    // try(Exception raise("oops")) type
    let try_msg = MessageNode::new("try", vec![exception_ident]);
    let type_msg = MessageNode::new("type", vec![]);
    try_msg.link_next(type_msg);

    let result = send(&try_msg, &world.lobby, &world.lobby, vm).expect("try catches the raise");
    expect_str(&result, "Exception");
}

#[test]
fn a_coroutine_that_awaits_itself_sees_a_deadlock_exception() {
    let world = World::new();
    let scheduler = world.scheduler.clone();
    let observed_message: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let observed_inner = observed_message.clone();

    let handle = Builder::new().name("self-waiter".to_string()).spawn(
        world.clone(),
        scheduler.clone(),
        move |vm| {
            let result = vm.scheduler.await_on(vm.id, vm.id);
            assert!(matches!(result, Err(CoreError::Deadlock(_))));

            let text = match vm.inbox.poll() {
                Stop::ExceptionStop(exc) => crate::slot::get_local(&exc.value, "message")
                    .and_then(|found| found.cell.load())
                    .and_then(|value| match &*value.value() {
                        Primitive::Str(s) => Some(s.clone()),
                        _ => None,
                    }),
                _ => None,
            };
            *observed_inner.lock().unwrap() = text;
            Ok(vm.world.nil.clone())
        },
    );
    handle.join();

    assert_eq!(observed_message.lock().unwrap().as_deref(), Some("deadlock"));
}

#[test]
fn future_resolves_and_arithmetic_runs_against_the_resolved_value() {
    let (world, vm) = fresh_vm();
    vm.install();
    let vm = Vm::current();

    let forty_two = MessageNode::new("42", vec![]);
    forty_two.set_memo(world.wrap_number(42.0));
    let future = spawn_future(forty_two, world.lobby.clone(), world.lobby.clone(), vm);

    let one = MessageNode::new("1", vec![]);
    one.set_memo(world.wrap_number(1.0));
    let plus = MessageNode::new("+", vec![one]);

    let result = send(&plus, &future, &world.lobby, vm).expect("waiting on the future succeeds");
    expect_number(&result, 43.0);
}

#[test]
fn future_delivers_a_raised_exception_to_the_waiter_instead_of_crashing_it() {
    let (world, vm) = fresh_vm();
    vm.install();
    let vm = Vm::current();

    let raise = MessageNode::new("raise", vec![]);
    let future = spawn_future(raise, world.exception_proto.clone(), world.lobby.clone(), vm);

    let type_msg = MessageNode::new("type", vec![]);
    let result = send(&type_msg, &future, &world.lobby, vm)
        .expect("the waiter gets the exception object back, not a crash");
    expect_str(&result, "Exception");
}

#[test]
fn precedence_shuffle_matches_explicit_parenthesization() {
    fn ident(text: &str) -> MessageRef {
        MessageNode::new(text, vec![])
    }

    fn chain(tokens: Vec<MessageRef>) -> MessageRef {
        for pair in tokens.windows(2) {
            pair[0].link_next(pair[1].clone());
        }
        tokens[0].clone()
    }

    fn structurally_equal(a: &MessageRef, b: &MessageRef) -> bool {
        if a.text != b.text || a.args.len() != b.args.len() {
            return false;
        }
        if !a.args.iter().zip(&b.args).all(|(x, y)| structurally_equal(x, y)) {
            return false;
        }
        match (a.next(), b.next()) {
            (Some(an), Some(bn)) => structurally_equal(&an, &bn),
            (None, None) => true,
            _ => false,
        }
    }

    let table = OperatorTable::default_table();
    let flat = chain(vec![ident("1"), ident("+"), ident("2"), ident("*"), ident("3")]);
    let shuffled = shuffle(&flat, &table);

    // 1 +(2 *(3))
    let three = ident("3");
    let two = MessageNode::new("2", vec![]);
    two.link_next(MessageNode::new("*", vec![three]));
    let explicit = ident("1");
    explicit.link_next(MessageNode::new("+", vec![two]));

    assert!(structurally_equal(&shuffled, &explicit));
}
