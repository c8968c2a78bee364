//! Effect Stack
//!
//! The effect stack tracks which effect is currently running. This enables
//! automatic dependency tracking: when an observable property is read, the
//! effect on top of the stack is registered as a dependent.
//!
//! # Implementation
//!
//! Entering an effect pushes a frame; the returned guard pops it when
//! dropped, so the previous effect becomes current again even when the
//! effect body returns an error or panics. A frame may also be empty, which
//! suspends tracking for untracked reads inside an effect.
//!
//! This design supports nested effects: an effect created while another one
//! runs (a list item binding inside a repeated block, for instance) tracks
//! its own reads, and the outer effect keeps tracking once it returns.

use parking_lot::Mutex;

use super::effect::{Effect, EffectId};

/// A stack of running effects, owned by a [`Runtime`](super::Runtime).
#[derive(Default)]
pub(crate) struct EffectStack {
    frames: Mutex<Vec<Option<Effect>>>,
}

impl EffectStack {
    /// Push a frame for `effect` (or an untracked frame for `None`).
    ///
    /// The frame is popped when the returned guard is dropped.
    pub(crate) fn enter(&self, effect: Option<Effect>) -> EffectFrame<'_> {
        let id = effect.as_ref().map(Effect::id);
        self.frames.lock().push(effect);
        EffectFrame { stack: self, id }
    }

    /// The effect that reads should be attributed to, if any.
    pub(crate) fn current(&self) -> Option<Effect> {
        self.frames.lock().last().cloned().flatten()
    }

    /// Whether `id` is anywhere on the stack.
    pub(crate) fn contains(&self, id: EffectId) -> bool {
        self.frames
            .lock()
            .iter()
            .flatten()
            .any(|effect| effect.id() == id)
    }

    /// Number of frames, tracked or not.
    pub(crate) fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

/// Guard that pops the frame when dropped.
pub(crate) struct EffectFrame<'a> {
    stack: &'a EffectStack,
    id: Option<EffectId>,
}

impl Drop for EffectFrame<'_> {
    fn drop(&mut self) {
        let popped = self.stack.frames.lock().pop();

        // Frames must unwind in order.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.as_ref().map(Effect::id),
                self.id,
                "EffectStack mismatch: expected {:?}",
                self.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_tracks_current_effect() {
        let stack = EffectStack::default();
        let effect = Effect::new(|| Ok(()));

        assert!(stack.current().is_none());
        assert_eq!(stack.depth(), 0);

        {
            let _frame = stack.enter(Some(effect.clone()));

            assert_eq!(stack.current().map(|e| e.id()), Some(effect.id()));
            assert!(stack.contains(effect.id()));
            assert_eq!(stack.depth(), 1);
        }

        // Frame should be cleaned up after drop
        assert!(stack.current().is_none());
        assert!(!stack.contains(effect.id()));
    }

    #[test]
    fn nested_frames_restore_the_outer_effect() {
        let stack = EffectStack::default();
        let outer = Effect::new(|| Ok(()));
        let inner = Effect::new(|| Ok(()));

        {
            let _outer = stack.enter(Some(outer.clone()));
            assert_eq!(stack.current().map(|e| e.id()), Some(outer.id()));

            {
                let _inner = stack.enter(Some(inner.clone()));
                assert_eq!(stack.current().map(|e| e.id()), Some(inner.id()));
                assert!(stack.contains(outer.id()));
            }

            // After the inner frame drops, the outer effect is current again
            assert_eq!(stack.current().map(|e| e.id()), Some(outer.id()));
        }

        assert!(stack.current().is_none());
    }

    #[test]
    fn untracked_frame_hides_the_outer_effect() {
        let stack = EffectStack::default();
        let outer = Effect::new(|| Ok(()));

        let _outer = stack.enter(Some(outer.clone()));
        {
            let _untracked = stack.enter(None);
            assert!(stack.current().is_none());
            assert!(stack.contains(outer.id()));
        }
        assert_eq!(stack.current().map(|e| e.id()), Some(outer.id()));
    }
}
