//! Negotiates native execution of expression subtrees with a data source.
//!
//! Starting at the root, each subtree that reads the input exactly once is
//! offered to the source. Accepted subtrees are replaced by the source's
//! output, partially accepted ones by the output of evaluating the remainder
//! over what the source returned. Declined subtrees have their children
//! offered in turn. Whatever is left is run through the naive evaluator.

use dataweave_error::{DbError, ErrorKind, Result};
use tracing::debug;

use crate::config::execution::ExecutionConfig;
use crate::datasource::{Execution, NativeOutput, SourceRef};
use crate::eval::{NaiveEvaluator, Output, Substitutions};
use crate::expr::references::RootReferences;
use crate::expr::{ChildScope, Expression};

#[derive(Debug, Clone, Default)]
pub struct OptimizingExecutor {
    config: ExecutionConfig,
}

impl OptimizingExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        OptimizingExecutor { config }
    }

    /// Execute `expr` with every item of `source` as its input.
    pub fn run(&self, expr: &Expression, source: &SourceRef) -> Result<Output> {
        if !self.config.enable_optimizer {
            return source.execute_naive(expr);
        }

        if !self.config.verify_optimized {
            return self.run_optimized(expr, source);
        }

        let optimized = self.run_optimized(expr, source)?.into_value()?;
        let naive = source.execute_naive(expr)?.into_value()?;
        if optimized != naive {
            return Err(DbError::with_kind(
                ErrorKind::Internal,
                "Optimized execution produced a different result",
            )
            .with_field("expression", expr)
            .with_field("source", source.name())
            .with_field("optimized", optimized)
            .with_field("naive", naive));
        }
        Ok(Output::Value(optimized))
    }

    fn run_optimized(&self, expr: &Expression, source: &SourceRef) -> Result<Output> {
        let mut substitutions = Substitutions::default();
        self.negotiate(expr, source, 0, &mut substitutions)?;
        debug!(%expr, substituted = substitutions.len(), "negotiation complete");

        let scan = source.clone();
        NaiveEvaluator::with_substitutions(substitutions)
            .run_lazy(expr, move || scan.enumerate_all())
    }

    fn negotiate(
        &self,
        expr: &Expression,
        source: &SourceRef,
        depth: usize,
        substitutions: &mut Substitutions,
    ) -> Result<()> {
        if depth > self.config.max_negotiation_depth {
            debug!(depth, "max negotiation depth reached");
            return Ok(());
        }

        let refs = RootReferences::count(expr, |_| false);
        if refs.total() == 0 || expr.as_context().is_some() {
            return Ok(());
        }

        if refs.is_single_direct() {
            match source.try_execute(expr)? {
                Execution::Accepted(output) => {
                    debug!(%expr, source = %source.name(), "subtree executed natively");
                    substitutions.insert(expr, source.native_output(output));
                    return Ok(());
                }
                Execution::Partial { output, remainder } => {
                    debug!(
                        %expr,
                        %remainder,
                        source = %source.name(),
                        "subtree partially executed natively"
                    );
                    let output = run_remainder(&remainder, source, output)?;
                    substitutions.insert(expr, output);
                    return Ok(());
                }
                Execution::Declined => {
                    debug!(%expr, source = %source.name(), "subtree declined");
                }
            }
        }

        // Nested children see a different context, only children sharing
        // the scope of this node can still read the input directly.
        expr.for_each_child(&mut |child, scope| match scope {
            ChildScope::Same => self.negotiate(child, source, depth + 1, substitutions),
            ChildScope::Nested => Ok(()),
        })
    }
}

/// Evaluate the part of a subtree the source didn't execute, with the
/// source's output as its input.
fn run_remainder(
    remainder: &Expression,
    source: &SourceRef,
    output: NativeOutput,
) -> Result<Output> {
    let evaluator = NaiveEvaluator::new();
    match source.native_output(output) {
        Output::Value(value) => evaluator.run_with_value(remainder, value),
        Output::Sequence(stream) => evaluator.run(remainder, stream),
    }
}

#[cfg(test)]
mod tests;
