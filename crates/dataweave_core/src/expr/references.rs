use super::{ChildScope, Expression};

/// Counts of references to the input of a tree.
///
/// A context reference points at the input when its scope reaches past every
/// binding introduced between it and the root of the tree being analyzed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootReferences {
    /// References evaluated with the same bindings as the root.
    pub direct: usize,
    /// References from inside a predicate, projection, key or aggregate.
    pub nested: usize,
}

impl RootReferences {
    /// Count references to the input of `expr`.
    ///
    /// Subtrees for which `skip` returns true aren't visited.
    pub fn count<F>(expr: &Expression, skip: F) -> Self
    where
        F: Fn(&Expression) -> bool,
    {
        let mut refs = RootReferences::default();
        refs.visit(expr, 0, &skip);
        refs
    }

    pub fn total(&self) -> usize {
        self.direct + self.nested
    }

    /// If the input is only used once, and not from a nested scope.
    pub fn is_single_direct(&self) -> bool {
        self.direct == 1 && self.nested == 0
    }

    fn visit<F>(&mut self, expr: &Expression, depth: usize, skip: &F)
    where
        F: Fn(&Expression) -> bool,
    {
        if skip(expr) {
            return;
        }

        if let Expression::Context(context) = expr {
            if context.scope == depth {
                if depth == 0 {
                    self.direct += 1;
                } else {
                    self.nested += 1;
                }
            }
            return;
        }

        // Visiting never fails.
        let _ = expr.for_each_child(&mut |child, scope| {
            let depth = match scope {
                ChildScope::Same => depth,
                ChildScope::Nested => depth + 1,
            };
            self.visit(child, depth, skip);
            Ok(())
        });
    }
}
