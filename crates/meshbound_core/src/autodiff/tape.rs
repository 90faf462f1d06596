//! Thread-local reverse-mode tape.
//!
//! Every active operation on [`AReal`] appends one node holding the indices of
//! its active operands and the local partial derivatives with respect to them.
//! A reverse sweep over the nodes accumulates adjoints from seeded outputs back
//! to the registered inputs.
//!
//! The tape is per thread. Each [`reset`] starts a new generation; values
//! registered before it are treated as passive until registered again.

use super::AReal;
use std::cell::RefCell;

#[derive(Debug, Clone, Copy)]
struct Node {
    parents: [(usize, f64); 2],
    arity: u8,
}

#[derive(Debug, Default)]
struct Tape {
    nodes: Vec<Node>,
    adjoints: Vec<f64>,
    recording: bool,
    generation: u64,
}

impl Tape {
    fn push(&mut self, parents: &[(usize, f64)]) -> usize {
        let mut node = Node {
            parents: [(0, 0.0); 2],
            arity: 0,
        };
        for &(index, partial) in parents.iter().take(2) {
            node.parents[node.arity as usize] = (index, partial);
            node.arity += 1;
        }
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Slot of `value` if it was registered or recorded on this generation.
    fn live(&self, value: &AReal) -> Option<usize> {
        value
            .index
            .filter(|_| value.generation == self.generation)
    }

    fn sync_adjoints(&mut self) {
        if self.adjoints.len() < self.nodes.len() {
            self.adjoints.resize(self.nodes.len(), 0.0);
        }
    }
}

thread_local! {
    static TAPE: RefCell<Tape> = RefCell::new(Tape::default());
}

/// Appends an operation node when recording and at least one operand is live
/// on the current tape. Returns the new slot and its generation.
pub(crate) fn record(operands: &[(AReal, f64)]) -> Option<(usize, u64)> {
    TAPE.with(|tape| {
        let mut tape = tape.borrow_mut();
        if !tape.recording {
            return None;
        }
        let mut parents = [(0, 0.0); 2];
        let mut arity = 0;
        for (operand, partial) in operands.iter().take(2) {
            if let Some(index) = tape.live(operand) {
                parents[arity] = (index, *partial);
                arity += 1;
            }
        }
        if arity == 0 {
            return None;
        }
        let generation = tape.generation;
        Some((tape.push(&parents[..arity]), generation))
    })
}

/// Slot of `value` on the current tape, `None` when passive or stale.
pub(crate) fn live_index(value: &AReal) -> Option<usize> {
    if value.index.is_none() {
        return None;
    }
    TAPE.with(|tape| tape.borrow().live(value))
}

/// Starts recording operations on active values.
pub fn start_recording() {
    TAPE.with(|tape| tape.borrow_mut().recording = true);
}

/// Stops recording; later operations produce passive results.
pub fn stop_recording() {
    TAPE.with(|tape| tape.borrow_mut().recording = false);
}

pub fn is_recording() -> bool {
    TAPE.with(|tape| tape.borrow().recording)
}

/// Assigns `value` a fresh input slot on the tape, making it active.
///
/// Works whether or not the tape is recording, so inputs can be registered
/// ahead of the forward evaluation.
pub fn register_input(value: &mut AReal) {
    TAPE.with(|tape| {
        let mut tape = tape.borrow_mut();
        value.index = Some(tape.push(&[]));
        value.generation = tape.generation;
    });
}

/// Seeds the adjoint of an output value. Passive values are ignored.
pub fn set_adjoint(value: &AReal, seed: f64) {
    TAPE.with(|tape| {
        let mut tape = tape.borrow_mut();
        let Some(index) = tape.live(value) else {
            return;
        };
        tape.sync_adjoints();
        if let Some(slot) = tape.adjoints.get_mut(index) {
            *slot = seed;
        }
    });
}

/// Runs the reverse sweep, propagating seeded adjoints back to the inputs.
pub fn compute_adjoint() {
    TAPE.with(|tape| {
        let mut tape = tape.borrow_mut();
        tape.sync_adjoints();
        let Tape {
            nodes, adjoints, ..
        } = &mut *tape;
        for i in (0..nodes.len()).rev() {
            let adjoint = adjoints[i];
            if adjoint == 0.0 {
                continue;
            }
            let node = nodes[i];
            for &(parent, partial) in &node.parents[..node.arity as usize] {
                adjoints[parent] += partial * adjoint;
            }
        }
    });
}

/// Adjoint accumulated for `value`; zero for passive or stale values.
pub fn adjoint(value: &AReal) -> f64 {
    TAPE.with(|tape| {
        let tape = tape.borrow();
        tape.live(value)
            .and_then(|index| tape.adjoints.get(index).copied())
            .unwrap_or(0.0)
    })
}

/// Zeroes every adjoint but keeps the recorded operations.
pub fn clear_adjoints() {
    TAPE.with(|tape| {
        for adjoint in tape.borrow_mut().adjoints.iter_mut() {
            *adjoint = 0.0;
        }
    });
}

/// Drops all recorded operations and adjoints, stops recording and starts a
/// new generation.
pub fn reset() {
    TAPE.with(|tape| {
        let mut tape = tape.borrow_mut();
        tape.nodes.clear();
        tape.adjoints.clear();
        tape.recording = false;
        tape.generation = tape.generation.wrapping_add(1);
    });
}

/// Number of nodes (inputs plus operations) on this thread's tape.
pub fn len() -> usize {
    TAPE.with(|tape| tape.borrow().nodes.len())
}

pub fn is_empty() -> bool {
    len() == 0
}
