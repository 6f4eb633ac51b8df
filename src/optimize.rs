//! Structural rewrites over compiled stage trees.
//!
//! Optimizers run between compilation and evaluation and must preserve query
//! semantics exactly; they only remove structure that provably changes
//! nothing. Both built-ins are pure tree-to-tree rewrites.

use crate::pipeline::{PipelineStage, Stage};

/// A semantics-preserving rewrite of a stage tree.
pub trait QueryOptimizer {
    /// Rewrite `root` into an equivalent tree.
    fn optimize(&self, root: PipelineStage) -> PipelineStage;
}

/// Splices the children of nested [`Stage::Base`] nodes into their parent.
///
/// A `Base` stage only runs its children, so an inner `Base` is pure
/// indirection left over from query composition.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenBase;

impl QueryOptimizer for FlattenBase {
    fn optimize(&self, root: PipelineStage) -> PipelineStage {
        flatten(root)
    }
}

fn flatten(mut node: PipelineStage) -> PipelineStage {
    let children = std::mem::take(node.children_mut());
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        let child = flatten(child);
        if matches!(child.stage(), Stage::Base) {
            out.extend(child.into_children());
        } else {
            out.push(child);
        }
    }
    *node.children_mut() = out;
    node
}

/// Collapses chains of identical type checks.
///
/// A [`Stage::TypeMatch`] whose sole child repeats the same spec and
/// requiredness re-tests a cursor that has not moved; the inner check can
/// never observe a different value type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupTypeMatch;

impl QueryOptimizer for DedupTypeMatch {
    fn optimize(&self, root: PipelineStage) -> PipelineStage {
        dedup(root)
    }
}

fn dedup(mut node: PipelineStage) -> PipelineStage {
    while let &Stage::TypeMatch { spec, required } = node.stage() {
        let duplicate = node.children().len() == 1
            && matches!(
                node.children()[0].stage(),
                Stage::TypeMatch {
                    spec: inner_spec,
                    required: inner_required,
                } if *inner_spec == spec && *inner_required == required
            );
        if !duplicate {
            break;
        }
        let inner = node.children_mut().remove(0);
        *node.children_mut() = inner.into_children();
    }

    let children = std::mem::take(node.children_mut());
    *node.children_mut() = children.into_iter().map(dedup).collect();
    node
}

/// The default optimizer chain, in application order.
#[must_use]
pub fn default_optimizers() -> Vec<Box<dyn QueryOptimizer>> {
    vec![Box::new(FlattenBase), Box::new(DedupTypeMatch)]
}

pub(crate) fn run(optimizers: &[Box<dyn QueryOptimizer>], root: PipelineStage) -> PipelineStage {
    optimizers
        .iter()
        .fold(root, |tree, opt| opt.optimize(tree))
}
