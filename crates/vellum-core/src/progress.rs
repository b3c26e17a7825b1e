// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Progress reporting exposed to callers of long-running snapshot operations.

/// Receives `(phase, fraction)` notifications while a snapshot operation runs.
///
/// Within one phase the reported fraction is monotonically non-decreasing and
/// stays within `[0, 1]`.
pub trait ProgressSink {
    /// Called whenever a phase makes progress.
    fn report(&self, phase: &str, fraction: f32);
}

impl<F: Fn(&str, f32)> ProgressSink for F {
    fn report(&self, phase: &str, fraction: f32) {
        self(phase, fraction)
    }
}

/// A sink that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _phase: &str, _fraction: f32) {}
}

/// Tracks one phase and guarantees monotonic, clamped fractions.
pub struct PhaseProgress<'a> {
    sink: &'a dyn ProgressSink,
    phase: &'static str,
    last: f32,
}

impl<'a> PhaseProgress<'a> {
    /// Starts tracking `phase` without reporting anything yet.
    pub fn new(sink: &'a dyn ProgressSink, phase: &'static str) -> Self {
        Self {
            sink,
            phase,
            last: 0.0,
        }
    }

    /// Reports an explicit fraction. Values below the last report are raised to it.
    pub fn set(&mut self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0).max(self.last);
        self.last = fraction;
        self.sink.report(self.phase, fraction);
    }

    /// Reports `done / total`. An empty workload counts as complete.
    pub fn advance(&mut self, done: usize, total: usize) {
        if total == 0 {
            self.set(1.0);
        } else {
            self.set(done as f32 / total as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn fractions_never_go_backwards() {
        let seen = RefCell::new(Vec::new());
        let sink = |phase: &str, f: f32| seen.borrow_mut().push((phase.to_string(), f));
        let mut progress = PhaseProgress::new(&sink, "Storing");

        progress.set(0.5);
        progress.set(0.25);
        progress.set(7.0);

        let seen = seen.into_inner();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].1, 0.5);
        assert_eq!(seen[2].1, 1.0);
        assert!(seen.iter().all(|(p, _)| p == "Storing"));
    }

    #[test]
    fn empty_workload_is_complete() {
        let last = RefCell::new(0.0);
        let sink = |_: &str, f: f32| *last.borrow_mut() = f;
        PhaseProgress::new(&sink, "Loading").advance(0, 0);
        assert_eq!(*last.borrow(), 1.0);
    }
}
