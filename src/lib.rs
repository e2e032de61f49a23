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

//! Core runtime for a prototype-based, message-passing scripting language:
//! the object model, per-object slot storage, the message tree and its
//! operator-precedence shuffle, the `Send`/`Perform` evaluator, and the
//! coroutine scheduler that lets many of these evaluators run concurrently.
//!
//! Parsing source text into a message tree and any standard library beyond
//! the prototypes `World` bootstraps are both out of scope; this crate picks
//! up once a tree already exists.

pub mod coro;
pub mod error;
pub mod eval;
pub mod future;
pub mod message;
pub mod object;
pub mod scheduler;
pub mod serialize;
pub mod slot;
pub mod world;

pub use coro::{Builder, Handle, Vm};
pub use error::{CoreError, CoreResult, RaisedException};
pub use eval::{perform, send};
pub use message::{MessageNode, MessageRef, OperatorTable};
pub use object::{Object, ObjRef, Primitive, Tag};
pub use scheduler::Scheduler;
pub use serialize::serialized;
pub use world::World;

#[cfg(test)]
mod tests;
