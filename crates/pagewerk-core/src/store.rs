// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotation history: an ordered list (insertion order is z-order) plus a
// redo stack. Undo and redo move annotations between the two without ever
// copying or dropping one; adding a new annotation discards the redo stack.

use tracing::debug;

use crate::annotation::Annotation;
use crate::error::{PagewerkError, Result};

/// Session-scoped annotation history for one open document.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    applied: Vec<Annotation>,
    undone: Vec<Annotation>,
    page_count: usize,
}

impl AnnotationSet {
    /// Empty history for a document with `page_count` pages.
    pub fn new(page_count: usize) -> Self {
        Self {
            applied: Vec::new(),
            undone: Vec::new(),
            page_count,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Append an annotation. Fails without side effects if it targets a page
    /// outside the document.
    pub fn add(&mut self, annotation: Annotation) -> Result<()> {
        if annotation.page_index() >= self.page_count {
            return Err(PagewerkError::PageOutOfRange {
                index: annotation.page_index(),
                page_count: self.page_count,
            });
        }
        debug!(
            id = %annotation.id(),
            page = annotation.page_index(),
            kind = annotation.kind().label(),
            "annotation added"
        );
        self.applied.push(annotation);
        self.undone.clear();
        Ok(())
    }

    /// Move the newest annotation onto the redo stack and return a copy.
    pub fn undo(&mut self) -> Option<Annotation> {
        let annotation = self.applied.pop()?;
        self.undone.push(annotation.clone());
        Some(annotation)
    }

    /// Re-apply the most recently undone annotation and return a copy.
    pub fn redo(&mut self) -> Option<Annotation> {
        let annotation = self.undone.pop()?;
        self.applied.push(annotation.clone());
        Some(annotation)
    }

    /// Annotations on one page, in insertion order.
    pub fn query(&self, page_index: usize) -> Vec<Annotation> {
        self.applied
            .iter()
            .filter(|a| a.page_index() == page_index)
            .cloned()
            .collect()
    }

    /// Every applied annotation, in insertion order.
    pub fn all(&self) -> Vec<Annotation> {
        self.applied.clone()
    }

    pub fn clear(&mut self) {
        self.applied.clear();
        self.undone.clear();
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, RedactionFill};
    use crate::geometry::Rect;
    use proptest::prelude::*;

    fn redaction(page: usize) -> Annotation {
        Annotation::new(
            page,
            AnnotationKind::Redaction {
                rect: Rect::new(0.0, 0.0, 20.0, 20.0),
                fill: RedactionFill::Black,
            },
        )
    }

    #[test]
    fn add_clears_redo() {
        let mut set = AnnotationSet::new(2);
        set.add(redaction(0)).expect("add");
        set.add(redaction(1)).expect("add");
        assert!(set.undo().is_some());
        assert!(set.can_redo());

        set.add(redaction(0)).expect("add");
        assert!(!set.can_redo());
        assert!(set.redo().is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn undo_on_empty_is_none() {
        let mut set = AnnotationSet::new(1);
        assert!(set.undo().is_none());
        assert!(set.redo().is_none());
        assert!(!set.can_undo());
    }

    #[test]
    fn query_filters_by_page_in_order() {
        let mut set = AnnotationSet::new(3);
        let a = redaction(2);
        let b = redaction(0);
        let c = redaction(2);
        let (ida, idc) = (a.id(), c.id());
        for ann in [a, b, c] {
            set.add(ann).expect("add");
        }
        let page2: Vec<_> = set.query(2).iter().map(|a| a.id()).collect();
        assert_eq!(page2, vec![ida, idc]);
        assert!(set.query(1).is_empty());
    }

    #[test]
    fn out_of_range_page_rejected() {
        let mut set = AnnotationSet::new(2);
        let err = set.add(redaction(2)).expect_err("page 2 of 2");
        assert!(matches!(
            err,
            PagewerkError::PageOutOfRange { index: 2, page_count: 2 }
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn clear_empties_both_stacks() {
        let mut set = AnnotationSet::new(1);
        set.add(redaction(0)).expect("add");
        set.add(redaction(0)).expect("add");
        set.undo();
        set.clear();
        assert!(!set.can_undo());
        assert!(!set.can_redo());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Undo,
        Redo,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Add), Just(Op::Undo), Just(Op::Redo)]
    }

    proptest! {
        /// Size tracks adds minus outstanding undos; nothing is ever
        /// duplicated or lost between the stacks.
        #[test]
        fn history_accounting(ops in proptest::collection::vec(op(), 0..64)) {
            let mut set = AnnotationSet::new(1);
            let mut applied = 0usize;
            let mut undone = 0usize;
            for op in ops {
                match op {
                    Op::Add => {
                        set.add(redaction(0)).expect("add");
                        applied += 1;
                        undone = 0;
                    }
                    Op::Undo => {
                        if set.undo().is_some() {
                            applied -= 1;
                            undone += 1;
                        } else {
                            prop_assert_eq!(applied, 0);
                        }
                    }
                    Op::Redo => {
                        if set.redo().is_some() {
                            applied += 1;
                            undone -= 1;
                        } else {
                            prop_assert_eq!(undone, 0);
                        }
                    }
                }
                prop_assert_eq!(set.len(), applied);
                prop_assert_eq!(set.can_redo(), undone > 0);
            }
        }

        #[test]
        fn undo_then_redo_is_identity(n in 1usize..16) {
            let mut set = AnnotationSet::new(1);
            for _ in 0..n {
                set.add(redaction(0)).expect("add");
            }
            let before = set.all();
            set.undo();
            set.redo();
            prop_assert_eq!(set.all(), before);
        }
    }
}
