// The MIT License (MIT)

// Copyright (c) 2015 Rustcc Developers

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

//! The OS-interrupt pathway (spec.md §4.8): "the scheduler registers a
//! handler for the process's interrupt signal. On receipt, it spawns a new
//! coroutine running the `System userInterruptHandler` method; if no such
//! method exists, it invokes `Exit(0)`."
//!
//! The teacher gated its I/O readiness handling on
//! `#[cfg(target_os = "linux")]`/`#[cfg(target_os = "macos", ...)]` blocks
//! around a raw `mio` event loop (`scheduler.rs`). We keep that
//! one-registration-per-process discipline but hand the platform
//! differences to `signal-hook`, which already carries the portability
//! matrix the teacher was hand-coding.

use std::thread::{self, JoinHandle};

use log::debug;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

/// Registers a background thread that loops on the process's interrupt
/// signal, running `handler` once per signal. `handler` decides what
/// "`System userInterruptHandler` or else `Exit(0)`" means in terms of a
/// concrete `World`/`Scheduler`, so this module stays ignorant of the
/// object model.
pub fn install<F>(handler: F) -> std::io::Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    let mut signals = Signals::new([SIGINT])?;
    thread::Builder::new()
        .name("iolang-interrupt".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                debug!("scheduler: received interrupt signal {}", signal);
                handler();
            }
        })
}
