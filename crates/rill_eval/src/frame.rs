//! Run-time frames.
//!
//! A frame is the value array for one script or lambda invocation, sized
//! to its scope's slot count. Slots for captured symbols hold shared
//! cells instead of plain values: the inner function's frame links to the
//! same cell as the defining frame, giving closure mutation visibility
//! (reference semantics, not copies). Slots start unbound and become
//! bound when their declaration executes, which is what makes shaded
//! lexical symbols detectable before their declaration point.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use rill_ir::Scope;

use crate::value::Value;

/// A shared slot cell linking a captured local across frames.
///
/// Wraps `Arc<RwLock<Option<Value>>>` behind a factory. `Arc` rather
/// than `Rc` because closures travel inside values that cross threads;
/// visibility of cross-thread mutations is the host's coordination
/// problem. The inner `Option` preserves the unbound state: a captured
/// slot whose declaration has not executed reads the same as an
/// uncaptured one.
#[derive(Clone)]
pub struct CaptureCell(Arc<RwLock<Option<Value>>>);

impl CaptureCell {
    /// Create a cell holding `value`.
    #[inline]
    pub fn new(value: Value) -> Self {
        CaptureCell(Arc::new(RwLock::new(Some(value))))
    }

    /// Create a cell whose declaration has not executed yet.
    #[inline]
    pub fn unbound() -> Self {
        CaptureCell(Arc::new(RwLock::new(None)))
    }

    /// Current value of the cell; `None` while unbound.
    #[inline]
    pub fn get(&self) -> Option<Value> {
        self.0.read().clone()
    }

    /// Replace the cell's value; visible to every frame sharing the cell.
    #[inline]
    pub fn set(&self, value: Value) {
        *self.0.write() = Some(value);
    }
}

impl fmt::Debug for CaptureCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CaptureCell").field(&*self.0.read()).finish()
    }
}

/// One frame slot.
#[derive(Clone, Debug)]
enum Slot {
    /// Declaration has not executed yet.
    Unbound,
    Value(Value),
    Cell(CaptureCell),
}

/// Value array for one invocation.
#[derive(Debug)]
pub struct Frame {
    slots: Box<[Slot]>,
}

impl Frame {
    /// Frame for a scope, linking `captured` cells (in the scope's capture
    /// order) and binding positional `args` to the parameter slots.
    ///
    /// Captured non-upvalue slots are pre-created as unbound cells so that
    /// every later write, from this frame or a closure's, goes through the
    /// shared cell while the not-yet-declared state stays observable.
    pub fn new(scope: &Scope, captured: &[CaptureCell], args: Vec<Value>) -> Self {
        let mut slots: Vec<Slot> = scope
            .symbols()
            .iter()
            .map(|sym| {
                if sym.is_captured() {
                    Slot::Cell(CaptureCell::unbound())
                } else {
                    Slot::Unbound
                }
            })
            .collect();
        for (capture, cell) in scope.captures().iter().zip(captured) {
            slots[capture.inner_slot] = Slot::Cell(cell.clone());
        }
        let mut frame = Frame {
            slots: slots.into_boxed_slice(),
        };
        for (slot, arg) in args.into_iter().take(scope.param_count()).enumerate() {
            frame.set(slot, arg);
        }
        frame
    }

    /// Read a slot. `None` means the declaration has not executed.
    pub fn get(&self, slot: usize) -> Option<Value> {
        match self.slots.get(slot) {
            Some(Slot::Value(v)) => Some(v.clone()),
            Some(Slot::Cell(cell)) => cell.get(),
            Some(Slot::Unbound) | None => None,
        }
    }

    /// Write a slot, through the shared cell when the slot is captured.
    pub fn set(&mut self, slot: usize, value: Value) {
        match self.slots.get_mut(slot) {
            Some(Slot::Cell(cell)) => cell.set(value),
            Some(entry) => *entry = Slot::Value(value),
            None => {}
        }
    }

    /// The shared cell for a slot, promoting a plain slot in place.
    ///
    /// Promotion only happens for slots the parser flagged captured, so
    /// in practice the slot already holds a cell; the fallback keeps the
    /// operation total.
    pub fn cell(&mut self, slot: usize) -> CaptureCell {
        match self.slots.get_mut(slot) {
            Some(Slot::Cell(cell)) => cell.clone(),
            Some(entry) => {
                let cell = match entry {
                    Slot::Value(v) => CaptureCell::new(v.clone()),
                    _ => CaptureCell::unbound(),
                };
                *entry = Slot::Cell(cell.clone());
                cell
            }
            None => CaptureCell::unbound(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use rill_ir::{DeclKind, ScopeStack};

    fn scope_with_locals(names: &[&str]) -> Scope {
        let mut stack = ScopeStack::new();
        stack.enter_function();
        for name in names {
            stack.declare_local(name, DeclKind::Var).unwrap();
        }
        stack.exit_function()
    }

    #[test]
    fn slots_start_unbound() {
        let scope = scope_with_locals(&["a", "b"]);
        let mut frame = Frame::new(&scope, &[], vec![]);
        assert_eq!(frame.get(0), None);
        frame.set(0, Value::Int(1));
        assert_eq!(frame.get(0), Some(Value::Int(1)));
        assert_eq!(frame.get(1), None);
    }

    #[test]
    fn captured_slot_shares_mutations_across_frames() {
        // outer scope declares x; inner scope captures it
        let mut stack = ScopeStack::new();
        stack.enter_function();
        let x = stack.declare_local("x", DeclKind::Var).unwrap();
        stack.enter_function();
        let inner_x = stack.resolve("x").unwrap().slot;
        let inner = stack.exit_function();
        let outer = stack.exit_function();

        let mut outer_frame = Frame::new(&outer, &[], vec![]);
        outer_frame.set(x, Value::Int(1));
        let cell = outer_frame.cell(x);
        let inner_frame = Frame::new(&inner, &[cell], vec![]);

        // mutation after closure construction is visible inside
        outer_frame.set(x, Value::Int(2));
        assert_eq!(inner_frame.get(inner_x), Some(Value::Int(2)));
    }

    #[test]
    fn captured_slot_stays_unbound_until_declared() {
        let mut stack = ScopeStack::new();
        stack.enter_function();
        let x = stack.declare_local("x", DeclKind::Var).unwrap();
        stack.enter_function();
        stack.resolve("x").unwrap();
        stack.exit_function();
        let outer = stack.exit_function();

        // Being captured pre-creates the cell, but the cell reports
        // unbound until the declaration writes through it.
        let mut frame = Frame::new(&outer, &[], vec![]);
        assert_eq!(frame.get(x), None);
        frame.set(x, Value::Int(1));
        assert_eq!(frame.get(x), Some(Value::Int(1)));
    }

    #[test]
    fn independent_frames_do_not_share_locals() {
        let scope = scope_with_locals(&["a"]);
        let mut f1 = Frame::new(&scope, &[], vec![]);
        let f2 = Frame::new(&scope, &[], vec![]);
        f1.set(0, Value::Int(9));
        assert_eq!(f2.get(0), None);
    }

    #[test]
    fn parameters_bind_positionally() {
        let mut stack = ScopeStack::new();
        stack.enter_function();
        stack.declare_parameter("x");
        stack.declare_parameter("y");
        let scope = stack.exit_function();
        let frame = Frame::new(&scope, &[], vec![Value::Int(2), Value::Int(1)]);
        assert_eq!(frame.get(0), Some(Value::Int(2)));
        assert_eq!(frame.get(1), Some(Value::Int(1)));
    }
}
