//! Capture cells: closures share storage locations, not value snapshots.
//!
//! A `CaptureCell<T>` is jointly owned by the enclosing scope and every
//! closure or task that cloned it; it lives until the last clone drops. Every
//! access goes through the cell's own lock, so a single `get`/`set`/`update`
//! is atomic. A read-modify-write spread over several calls is not, and needs
//! a [`crate::sync::Mutex`] around it.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct CaptureCell<T> {
    slot: Arc<Mutex<T>>,
}

impl<T> CaptureCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(value)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Apply `f` to the stored value under the cell's lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock())
    }

    /// Number of live handles (scope + closures) sharing this cell.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.slot)
    }
}

impl<T: Clone> CaptureCell<T> {
    pub fn get(&self) -> T {
        self.lock().clone()
    }
}

impl<T> Clone for CaptureCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Default> Default for CaptureCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for CaptureCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CaptureCell").field(&*self.lock()).finish()
    }
}

/// Run a counted loop whose index lives in capture cells.
///
/// Per iteration:
/// 1. stop unless `cond(loop variable)` holds
/// 2. seed a fresh iteration cell from the loop variable
/// 3. run `body` with that cell; closures it creates share it
/// 4. copy the iteration cell back into the loop variable
/// 5. stop if `body` returned `Break`, otherwise run `post` on the loop variable
///
/// Step 5 never touches the iteration cell, so a closure from iteration `n`
/// sees every mutation made by iteration `n`'s body (even after it was
/// created) but not the header's increment. Returns the loop variable's final value.
pub fn for_each_iteration<T, C, P, B>(init: T, mut cond: C, mut post: P, mut body: B) -> T
where
    T: Clone,
    C: FnMut(&T) -> bool,
    P: FnMut(&mut T),
    B: FnMut(&CaptureCell<T>) -> ControlFlow<()>,
{
    let loop_var = CaptureCell::new(init);
    loop {
        if !loop_var.with(|v| cond(v)) {
            break;
        }
        let iteration = CaptureCell::new(loop_var.get());
        let flow = body(&iteration);
        loop_var.set(iteration.get());
        if flow.is_break() {
            break;
        }
        loop_var.update(|v| post(v));
    }
    loop_var.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_storage_location() {
        let cell = CaptureCell::new(1);
        let seen_by_closure = {
            let cell = cell.clone();
            move || cell.get()
        };
        cell.set(5);
        assert_eq!(seen_by_closure(), 5);
    }

    #[test]
    fn closure_outlives_the_scope_that_created_the_cell() {
        let make = || {
            let local = CaptureCell::new(String::from("a"));
            let appender = {
                let local = local.clone();
                move |s: &str| local.update(|v| v.push_str(s))
            };
            let reader = {
                let local = local.clone();
                move || local.get()
            };
            (appender, reader)
        };
        let (append, read) = make();
        append("b");
        append("c");
        assert_eq!(read(), "abc");
    }

    #[test]
    fn counter_closure_mutates_captured_cell() {
        let count = CaptureCell::new(0);
        let next = {
            let count = count.clone();
            move || count.update(|c| {
                *c += 1;
                *c
            })
        };
        assert_eq!(next(), 1);
        assert_eq!(next(), 2);
        assert_eq!(count.get(), 2);
        assert_eq!(count.holders(), 2);
    }

    #[test]
    fn loop_index_is_incremented_twice_per_iteration() {
        let mut observed = Vec::new();
        let mut last: Option<Box<dyn Fn() -> i32>> = None;

        let end = for_each_iteration(
            1,
            |i| *i <= 10,
            |i| *i += 1,
            |i| {
                let cell = i.clone();
                last = Some(Box::new(move || cell.get()));
                i.update(|v| *v += 1);
                observed.push(i.get());
                ControlFlow::Continue(())
            },
        );

        assert_eq!(observed, vec![2, 4, 6, 8, 10]);
        assert_eq!(end, 11);
        // Created while the index was 9; sees the body's increment, not the header's.
        let f = last.expect("loop ran at least once");
        assert_eq!(f(), 10);
    }

    #[test]
    fn closures_from_different_iterations_see_their_own_cell() {
        let mut closures: Vec<Box<dyn Fn() -> i32>> = Vec::new();
        for_each_iteration(
            0,
            |i| *i < 3,
            |i| *i += 1,
            |i| {
                let cell = i.clone();
                closures.push(Box::new(move || cell.get() * 10));
                ControlFlow::Continue(())
            },
        );
        let values: Vec<i32> = closures.iter().map(|f| f()).collect();
        assert_eq!(values, vec![0, 10, 20]);
    }

    #[test]
    fn break_skips_the_post_statement() {
        let end = for_each_iteration(
            0,
            |_| true,
            |i| *i += 1,
            |i| {
                if i.get() == 4 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        );
        assert_eq!(end, 4);
    }
}
