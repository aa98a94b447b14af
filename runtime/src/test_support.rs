//! Shared helpers for the unit tests.
//!
//! Callbacks are plain `extern "C" fn` items, so each test owns a static
//! recorder the callbacks write into.

use std::sync::Mutex;
use std::vec::Vec;

pub struct Recorder(Mutex<Vec<&'static str>>);

impl Recorder {
    pub const fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    pub fn push(&self, name: &'static str) {
        self.0.lock().unwrap().push(name);
    }

    pub fn take(&self) -> Vec<&'static str> {
        core::mem::take(&mut *self.0.lock().unwrap())
    }
}
