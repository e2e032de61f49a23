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

//! Coroutine configuration and spawning. Provides detailed control over the
//! properties of a new coroutine, mirroring the teacher's `Builder`/
//! `Options` pair (`builder.rs`, `options.rs`) but spawning a real OS
//! thread paired with a `Vm` instead of a stackful context.
//!
//! ```ignore
//! let handle = Builder::new()
//!     .name(format!("coroutine #{}", 1))
//!     .spawn(world, scheduler, |vm| eval::send(&msg, &target, &locals, vm));
//! ```

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::error;

use crate::coro::options::Options;
use crate::coro::{CoroId, CoroValue, Vm};
use crate::eval::stop::EvalResult;
use crate::object::{Object, ObjRef, Primitive};
use crate::scheduler::Scheduler;
use crate::world::World;

/// A spawned coroutine's object plus a way to wait for it to finish. The
/// object itself (tag `Coroutine`) is what language-level code sees and
/// sends messages to; `Handle` is the host-side spawn receipt.
pub struct Handle {
    pub coroutine: ObjRef,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Handle {
    /// Blocks the calling OS thread until the coroutine's thread exits.
    /// Language-level waiting goes through the scheduler/inbox instead;
    /// this is for host code bootstrapping or tearing down a `World`.
    pub fn join(&self) {
        if let Some(h) = self.join.lock().unwrap().take() {
            let _ = h.join();
        }
    }
}

pub struct Builder {
    opts: Options,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            opts: Default::default(),
        }
    }

    /// Name the coroutine-to-be. Used for identification in panic messages
    /// and log lines only.
    pub fn name(mut self, name: String) -> Builder {
        self.opts.name = Some(name);
        self
    }

    /// Set the size of the underlying OS thread's stack.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.opts.stack_size = size;
        self
    }

    pub fn debug(mut self, debug: bool) -> Builder {
        self.opts.debug = debug;
        self
    }

    /// Spawns a new coroutine running `body`, registers it with `scheduler`
    /// as runnable, and returns a `Handle`. `body` receives the `Vm`
    /// installed on the new coroutine's OS thread (retrievable afterwards
    /// via `Vm::current()` from anywhere further down that thread's call
    /// stack).
    pub fn spawn<F>(self, world: Arc<World>, scheduler: Arc<Scheduler>, body: F) -> Handle
    where
        F: FnOnce(&Vm) -> EvalResult + Send + 'static,
    {
        let coro_value = CoroValue::new();
        coro_value.set_debug(self.opts.debug);
        let inbox = coro_value.inbox.clone();

        let coroutine_tag = world.coroutine_tag.clone();
        let coroutine = Object::new_tagged(coroutine_tag, Primitive::Coroutine(coro_value), vec![]);
        let id: CoroId = coroutine.id();

        scheduler.start(id, inbox.clone());

        let mut thread_builder = thread::Builder::new();
        if let Some(name) = self.opts.name.clone() {
            thread_builder = thread_builder.name(name);
        }
        thread_builder = thread_builder.stack_size(self.opts.stack_size);

        let sched_for_thread = scheduler.clone();
        let join = thread_builder
            .spawn(move || {
                let vm = Vm::new(id, world, inbox, sched_for_thread.clone());
                vm.install();
                let result = body(Vm::current());
                if let Err(unwind) = result {
                    error!("coroutine {} terminated abnormally: {:?}", id, unwind);
                }
                sched_for_thread.finish(id);
            })
            .expect("failed to spawn coroutine OS thread");

        Handle {
            coroutine,
            join: Mutex::new(Some(join)),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::world::World;

    #[test]
    fn test_spawn_runs_body_and_finishes() {
        let world = World::new();
        let scheduler = world.scheduler.clone();
        let handle = Builder::new().name("test coro".to_string()).spawn(
            world.clone(),
            scheduler.clone(),
            |vm| Ok(vm.world.nil.clone()),
        );
        handle.join();
        // finish() removed the coroutine from the wait graph; nothing else
        // is registered, so the graph reads as fully runnable (vacuously).
        assert!(scheduler.pause(999_999));
    }
}
