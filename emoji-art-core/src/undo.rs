//! Undo transactions.
//!
//! Document intents report their inverse through a [`TransactionRecorder`].
//! [`UndoStack`] is a ready-made recorder with grouping and redo support;
//! hosts with their own undo system can implement the trait directly.

use crate::model::{Background, Emoji, EmojiId};

/// A replayable document edit, recorded as the inverse of an intent.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEdit {
    /// Remove the emoji with this id.
    Remove {
        /// Emoji to remove.
        id: EmojiId,
    },
    /// Put an emoji back at a z-order position.
    Insert {
        /// Position in z-order.
        index: usize,
        /// The emoji, with its original id.
        emoji: Emoji,
    },
    /// Offset an emoji's position.
    Move {
        /// Emoji to move.
        id: EmojiId,
        /// Horizontal offset.
        dx: i32,
        /// Vertical offset.
        dy: i32,
    },
    /// Multiply an emoji's size.
    Scale {
        /// Emoji to scale.
        id: EmojiId,
        /// Scale factor.
        factor: f64,
    },
    /// Replace the background.
    SetBackground(Background),
}

/// Receives the inverse of every mutating document intent.
pub trait TransactionRecorder {
    /// Record `inverse` as the way to undo the intent that just ran.
    fn register_inverse(&mut self, inverse: DocumentEdit);
}

/// Recorder that drops everything, for callers that do not track undo.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUndo;

impl TransactionRecorder for NoUndo {
    fn register_inverse(&mut self, _inverse: DocumentEdit) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Undoing,
    Redoing,
}

/// Undo/redo history of grouped inverse edits.
///
/// Registrations outside [`UndoStack::begin_group`]/[`UndoStack::end_group`]
/// each form their own step.
#[derive(Debug)]
pub struct UndoStack {
    undo: Vec<Vec<DocumentEdit>>,
    redo: Vec<Vec<DocumentEdit>>,
    open: Option<Vec<DocumentEdit>>,
    depth: usize,
    limit: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoStack {
    /// Create an empty history holding at most 100 steps.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(100)
    }

    /// Create an empty history holding at most `limit` steps.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            open: None,
            depth: 0,
            limit: limit.max(1),
        }
    }

    /// Start grouping registrations into one step. Groups may nest; only the
    /// outermost bracket closes the step.
    pub fn begin_group(&mut self) {
        if self.depth == 0 {
            self.open = Some(Vec::new());
        }
        self.depth += 1;
    }

    /// Close the current group.
    pub fn end_group(&mut self) {
        if self.depth == 0 {
            tracing::warn!("end_group called without begin_group");
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(step) = self.open.take() {
                self.push_step(step);
            }
        }
    }

    /// Whether there is a step to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether there is a step to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undoable steps.
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Undo the most recent step by handing its inverses to `apply`, newest
    /// first. Inverses registered by `apply` become the redo step.
    ///
    /// Returns `false` if there was nothing to undo, or if a group is still
    /// open.
    pub fn undo<F>(&mut self, apply: F) -> bool
    where
        F: FnMut(DocumentEdit, &mut Self),
    {
        if self.group_is_open("undo") {
            return false;
        }
        let Some(step) = self.undo.pop() else {
            return false;
        };
        self.replay(step, Replay::Undoing, apply);
        true
    }

    /// Redo the most recently undone step.
    ///
    /// Returns `false` if there was nothing to redo, or if a group is still
    /// open.
    pub fn redo<F>(&mut self, apply: F) -> bool
    where
        F: FnMut(DocumentEdit, &mut Self),
    {
        if self.group_is_open("redo") {
            return false;
        }
        let Some(step) = self.redo.pop() else {
            return false;
        };
        self.replay(step, Replay::Redoing, apply);
        true
    }

    fn group_is_open(&self, action: &str) -> bool {
        if self.depth > 0 {
            tracing::warn!("Refusing to {action} while an undo group is open");
            return true;
        }
        false
    }

    fn replay<F>(&mut self, step: Vec<DocumentEdit>, mode: Replay, mut apply: F)
    where
        F: FnMut(DocumentEdit, &mut Self),
    {
        self.open = Some(Vec::new());
        for edit in step.into_iter().rev() {
            apply(edit, self);
        }
        let inverse = self.open.take().unwrap_or_default();
        if !inverse.is_empty() {
            match mode {
                Replay::Undoing => self.redo.push(inverse),
                Replay::Redoing => self.undo.push(inverse),
            }
        }
    }

    fn push_step(&mut self, step: Vec<DocumentEdit>) {
        if step.is_empty() {
            return;
        }
        self.undo.push(step);
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
        self.redo.clear();
    }
}

impl TransactionRecorder for UndoStack {
    fn register_inverse(&mut self, inverse: DocumentEdit) {
        if let Some(open) = self.open.as_mut() {
            open.push(inverse);
        } else {
            self.push_step(vec![inverse]);
        }
    }
}
