//! Isotope extension of solved trees.
//!
//! Isotope fragments never take part in tree assembly. The solver collects
//! their selected losses and this module hangs them below the nearest
//! regular fragment as a linear chain.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;

use crate::chemistry::sum_formula::SumFormula;
use crate::data::graph::{FragmentId, FragmentationGraph, GraphFragment, IsotopeMark, LossId};
use crate::data::tree::FragmentationTree;
use crate::error::GraphError;

/// Decides which graph fragments explain isotope peaks.
pub trait IsotopeMarker {
    fn mark(&self, fragment: &GraphFragment) -> Option<IsotopeMark>;
}

/// Trusts the isotope marks the graph builder attached to the fragments.
#[derive(Clone, Copy, Debug, Default)]
pub struct GraphIsotopeMarker;

impl IsotopeMarker for GraphIsotopeMarker {
    fn mark(&self, fragment: &GraphFragment) -> Option<IsotopeMark> {
        fragment.isotope
    }
}

impl<F> IsotopeMarker for F
where
    F: Fn(&GraphFragment) -> Option<IsotopeMark>,
{
    fn mark(&self, fragment: &GraphFragment) -> Option<IsotopeMark> {
        self(fragment)
    }
}

/// Attach the diverted isotope losses to `tree`.
///
/// Arguments:
///
/// * `graph` - graph the tree was solved on
/// * `tree` - assembled tree, extended in place
/// * `nodes` - graph fragment id to tree fragment id of every attached fragment
/// * `stack` - selected losses whose target is an isotope fragment
/// * `color_to_edge` - selected loss leading to each committed color
/// * `marker` - the marker used during assembly
///
/// Returns:
///
/// * `Result<(), GraphError>` - `DetachedIsotope` if a loss has no regular ancestor in the tree
pub(crate) fn attach_isotopes<M: IsotopeMarker + ?Sized>(
    graph: &FragmentationGraph,
    tree: &mut FragmentationTree,
    nodes: &HashMap<FragmentId, usize>,
    stack: &[LossId],
    color_to_edge: &HashMap<usize, LossId>,
    marker: &M,
) -> Result<(), GraphError> {
    let mut groups: BTreeMap<usize, Vec<(usize, LossId)>> = BTreeMap::new();
    for &loss_id in stack {
        let loss = graph.loss(loss_id).ok_or(GraphError::DetachedIsotope { loss: loss_id })?;
        let anchor = anchor_of(graph, nodes, color_to_edge, marker, loss_id, loss.source)?;
        let color = graph
            .fragment(loss.target)
            .and_then(|f| f.color)
            .ok_or(GraphError::DetachedIsotope { loss: loss_id })?;
        groups.entry(anchor).or_default().push((color, loss_id));
    }

    for (anchor, losses) in groups {
        let mut parent = anchor;
        for (color, loss_id) in losses.into_iter().sorted_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1))) {
            let loss = &graph.losses()[loss_id];
            let mark = graph.fragment(loss.target).and_then(|f| marker.mark(f));
            parent = tree.add_child(parent, SumFormula::empty(), color, loss.weight, SumFormula::empty(), mark);
        }
    }
    Ok(())
}

/// Tree node of the nearest non-isotope ancestor, walking up through committed isotope fragments.
fn anchor_of<M: IsotopeMarker + ?Sized>(
    graph: &FragmentationGraph,
    nodes: &HashMap<FragmentId, usize>,
    color_to_edge: &HashMap<usize, LossId>,
    marker: &M,
    loss_id: LossId,
    mut source: FragmentId,
) -> Result<usize, GraphError> {
    let detached = GraphError::DetachedIsotope { loss: loss_id };
    // sources strictly decrease, so the walk is bounded by the fragment count
    for _ in 0..graph.num_fragments() {
        let fragment = graph.fragment(source).ok_or(GraphError::UnknownFragment(source))?;
        if marker.mark(fragment).is_none() {
            return nodes.get(&source).copied().ok_or(detached);
        }
        let edge = fragment
            .color
            .and_then(|color| color_to_edge.get(&color))
            .and_then(|&edge| graph.loss(edge))
            .ok_or_else(|| detached.clone())?;
        if edge.source >= source {
            return Err(detached);
        }
        source = edge.source;
    }
    Err(detached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::critical_path::CriticalPathSolver;
    use crate::chemistry::ionization::Ionization;

    fn formula(s: &str) -> SumFormula {
        SumFormula::new(s).unwrap()
    }

    fn iso(monoisotopic: usize, position: usize) -> Option<IsotopeMark> {
        Some(IsotopeMark { monoisotopic, position })
    }

    /// root -> P(C7H8O, 9) -> F(C6H5, 3) with isotope losses F -> 4 and F -> 5.
    fn graph_with_isotopes() -> FragmentationGraph {
        let mut graph = FragmentationGraph::new(Ionization::protonated());
        let p = graph.add_fragment(formula("C7H8O"), 9, None);
        let f = graph.add_fragment(formula("C6H5"), 3, None);
        let i4 = graph.add_fragment(SumFormula::empty(), 4, iso(3, 1));
        let i5 = graph.add_fragment(SumFormula::empty(), 5, iso(3, 2));
        graph.add_loss(FragmentationGraph::ROOT, p, 1.0).unwrap();
        graph.add_loss(p, f, 2.0).unwrap();
        graph.add_loss(f, i4, 0.5).unwrap();
        graph.add_loss(f, i5, 0.25).unwrap();
        graph
    }

    #[test]
    fn isotopes_chain_in_descending_color_order() {
        let graph = graph_with_isotopes();
        let tree = CriticalPathSolver::new(&graph).solve().unwrap();

        assert_eq!(tree.len(), 4);
        let f = tree.fragments().iter().find(|n| n.formula == formula("C6H5")).unwrap();
        assert_eq!(f.color, 3);
        assert_eq!(f.children.len(), 1);

        let first = tree.fragment(f.children[0]).unwrap();
        assert_eq!(first.color, 5);
        assert!(first.formula.is_empty());
        assert_eq!(first.isotope, iso(3, 2));
        assert_eq!(first.weight, 0.25);

        assert_eq!(first.children.len(), 1);
        let second = tree.fragment(first.children[0]).unwrap();
        assert_eq!(second.color, 4);
        assert_eq!(second.isotope, iso(3, 1));
        assert!(second.children.is_empty());

        assert_eq!(tree.score(), 1.0 + 2.0 + 0.5 + 0.25);
        assert_eq!(second.ionization, *tree.root_ionization());
    }

    #[test]
    fn chained_isotope_losses_walk_up_to_regular_fragment() {
        let mut graph = FragmentationGraph::new(Ionization::protonated());
        let p = graph.add_fragment(formula("C7H8O"), 9, None);
        let f = graph.add_fragment(formula("C6H5"), 3, None);
        let i4 = graph.add_fragment(SumFormula::empty(), 4, iso(3, 1));
        let i5 = graph.add_fragment(SumFormula::empty(), 5, iso(3, 2));
        graph.add_loss(FragmentationGraph::ROOT, p, 1.0).unwrap();
        graph.add_loss(p, f, 2.0).unwrap();
        graph.add_loss(f, i4, 0.5).unwrap();
        graph.add_loss(i4, i5, 0.25).unwrap();

        let tree = CriticalPathSolver::new(&graph).solve().unwrap();
        let colors: Vec<usize> = tree.path_to_root(tree.len() - 1).iter().map(|&id| tree.fragments()[id].color).collect();
        assert_eq!(colors, vec![4, 5, 3, 9]);
    }

    #[test]
    fn closure_marker_overrides_graph_marks() {
        let graph = graph_with_isotopes();
        let no_isotopes = |_: &GraphFragment| -> Option<IsotopeMark> { None };
        let tree = CriticalPathSolver::new(&graph).solve_with(&no_isotopes).unwrap();
        // both isotope fragments now attach directly to F
        let f = tree.fragments().iter().find(|n| n.formula == formula("C6H5")).unwrap();
        assert_eq!(f.children.len(), 2);
        assert!(tree.fragments().iter().all(|n| n.isotope.is_none()));
    }
}
