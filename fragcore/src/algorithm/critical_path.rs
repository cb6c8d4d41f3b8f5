//! Critical path insertion heuristic for the maximum colorful subtree.
//!
//! Every iteration computes, over the fragments whose color is still free,
//! the heaviest path that starts with a loss out of the partial tree and
//! commits its best prefix. The partial tree starts as the synthetic root
//! and grows until no path with positive gain is left. Afterwards the
//! selected losses are assembled into a [`FragmentationTree`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, trace};

use crate::algorithm::isotope::{attach_isotopes, GraphIsotopeMarker, IsotopeMarker};
use crate::chemistry::sum_formula::SumFormula;
use crate::data::graph::{FragmentId, FragmentationGraph, LossId};
use crate::data::tree::FragmentationTree;
use crate::error::GraphError;

/// Gains committed per iteration, in commit order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverTrace {
    pub gains: Vec<f64>,
}

#[derive(Debug, Default)]
struct Selection {
    losses: Vec<LossId>,
    color_to_edge: HashMap<usize, LossId>,
    gains: Vec<f64>,
}

impl Selection {
    fn push(&mut self, loss: LossId, color: usize) {
        self.losses.push(loss);
        self.color_to_edge.insert(color, loss);
    }
}

/// Heuristic solver over a borrowed graph; the graph is never modified.
pub struct CriticalPathSolver<'a> {
    graph: &'a FragmentationGraph,
}

impl<'a> CriticalPathSolver<'a> {
    pub fn new(graph: &'a FragmentationGraph) -> Self {
        CriticalPathSolver { graph }
    }

    /// Solve with the isotope marks of the graph.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::algorithm::critical_path::CriticalPathSolver;
    /// use fragcore::chemistry::ionization::Ionization;
    /// use fragcore::chemistry::sum_formula::SumFormula;
    /// use fragcore::data::graph::FragmentationGraph;
    ///
    /// let mut graph = FragmentationGraph::new(Ionization::protonated());
    /// let glucose = graph.add_fragment(SumFormula::new("C6H12O6").unwrap(), 2, None);
    /// let dehydrated = graph.add_fragment(SumFormula::new("C6H10O5").unwrap(), 1, None);
    /// graph.add_loss(FragmentationGraph::ROOT, glucose, 0.5).unwrap();
    /// graph.add_loss(glucose, dehydrated, 2.0).unwrap();
    ///
    /// let tree = CriticalPathSolver::new(&graph).solve().unwrap();
    /// assert_eq!(tree.len(), 2);
    /// assert_eq!(tree.score(), 2.5);
    /// ```
    pub fn solve(&self) -> Result<FragmentationTree, GraphError> {
        self.solve_with(&GraphIsotopeMarker)
    }

    /// Solve with a custom isotope marker.
    pub fn solve_with<M: IsotopeMarker + ?Sized>(&self, marker: &M) -> Result<FragmentationTree, GraphError> {
        self.run(marker).map(|(tree, _)| tree)
    }

    /// Solve and report the gain of every iteration.
    pub fn solve_traced(&self) -> Result<(FragmentationTree, SolverTrace), GraphError> {
        self.run(&GraphIsotopeMarker)
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(fragments = self.graph.num_fragments(), losses = self.graph.num_losses())
    )]
    fn run<M: IsotopeMarker + ?Sized>(&self, marker: &M) -> Result<(FragmentationTree, SolverTrace), GraphError> {
        let mut selection = self.select()?;

        if selection.losses.is_empty() {
            // keep at least the best explanation of the precursor
            let fallback = self
                .graph
                .outgoing_losses(FragmentationGraph::ROOT)
                .reduce(|best, loss| if loss.weight > best.weight { loss } else { best });
            match fallback {
                Some(loss) => selection.push(loss.id, self.color_of(loss.target)?),
                None => {
                    debug!("graph has no root edge");
                    let ionization = self.graph.root().ionization.clone();
                    return Ok((FragmentationTree::empty(SumFormula::empty(), ionization), SolverTrace::default()));
                }
            }
        }

        let tree = self.assemble(&selection, marker)?;
        debug!(
            iterations = selection.gains.len(),
            selected = selection.losses.len(),
            fragments = tree.len(),
            score = tree.score(),
            "tree assembled"
        );
        Ok((tree, SolverTrace { gains: selection.gains }))
    }

    fn color_of(&self, id: FragmentId) -> Result<usize, GraphError> {
        self.graph
            .fragment(id)
            .and_then(|f| f.color)
            .ok_or(GraphError::UnknownFragment(id))
    }

    fn select(&self) -> Result<Selection, GraphError> {
        let graph = self.graph;
        let n = graph.num_fragments();
        let mut committed = vec![false; n];
        committed[FragmentationGraph::ROOT] = true;
        let mut used_colors: HashSet<usize> = HashSet::new();
        let mut root_attached = false;
        let mut selection = Selection::default();

        let mut best = vec![0.0f64; n];
        let mut next: Vec<Option<LossId>> = vec![None; n];

        for _ in 0..graph.num_colors() {
            let eligible = |id: FragmentId| {
                !committed[id] && graph.fragments()[id].color.map_or(false, |c| !used_colors.contains(&c))
            };

            // best continuation below every eligible fragment, children first
            for v in (1..n).rev() {
                best[v] = 0.0;
                next[v] = None;
                if !eligible(v) {
                    continue;
                }
                for loss in graph.outgoing_losses(v) {
                    if eligible(loss.target) {
                        let value = loss.weight + best[loss.target];
                        if value > best[v] {
                            best[v] = value;
                            next[v] = Some(loss.id);
                        }
                    }
                }
            }

            let mut start: Option<(f64, LossId)> = None;
            for u in (0..n).filter(|&u| committed[u]) {
                if u == FragmentationGraph::ROOT && root_attached {
                    continue;
                }
                for loss in graph.outgoing_losses(u) {
                    if eligible(loss.target) {
                        let value = loss.weight + best[loss.target];
                        if value > start.map_or(0.0, |(v, _)| v) {
                            start = Some((value, loss.id));
                        }
                    }
                }
            }
            let Some((_, first)) = start else {
                break;
            };

            let mut path = Vec::new();
            let mut path_colors = HashSet::new();
            let mut current = Some(first);
            while let Some(id) = current {
                let loss = &graph.losses()[id];
                if !path_colors.insert(self.color_of(loss.target)?) {
                    break;
                }
                path.push(id);
                current = next[loss.target];
            }

            let (mut sum, mut gain, mut len) = (0.0, 0.0, 0);
            for (i, &id) in path.iter().enumerate() {
                sum += graph.losses()[id].weight;
                if sum > gain {
                    gain = sum;
                    len = i + 1;
                }
            }
            if len == 0 {
                break;
            }

            for &id in &path[..len] {
                let loss = &graph.losses()[id];
                let color = self.color_of(loss.target)?;
                committed[loss.target] = true;
                used_colors.insert(color);
                root_attached |= loss.source == FragmentationGraph::ROOT;
                selection.push(id, color);
            }
            trace!(gain, committed = len, "critical path");
            selection.gains.push(gain);
        }
        Ok(selection)
    }

    fn assemble<M: IsotopeMarker + ?Sized>(
        &self,
        selection: &Selection,
        marker: &M,
    ) -> Result<FragmentationTree, GraphError> {
        let graph = self.graph;
        let mut order = selection
            .losses
            .iter()
            .map(|&id| Ok((self.color_of(graph.losses()[id].target)?, id)))
            .collect::<Result<Vec<_>, GraphError>>()?;
        order.sort_unstable();

        let root_at = order
            .iter()
            .position(|&(_, id)| graph.losses()[id].source == FragmentationGraph::ROOT)
            .ok_or(GraphError::MissingRootEdge)?;
        let (color, root_loss) = order.remove(root_at);
        let root_loss = &graph.losses()[root_loss];
        let top = &graph.fragments()[root_loss.target];

        let mut tree = FragmentationTree::with_root(
            top.formula.clone(),
            graph.root().ionization.clone(),
            color,
            root_loss.weight,
        );
        let mut nodes: HashMap<FragmentId, usize> = HashMap::new();
        nodes.insert(top.id, 0);

        let (isotopes, mut pending): (Vec<LossId>, Vec<LossId>) = order
            .into_iter()
            .map(|(_, id)| id)
            .partition(|&id| marker.mark(&graph.fragments()[graph.losses()[id].target]).is_some());

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for id in pending {
                let loss = &graph.losses()[id];
                match nodes.get(&loss.source).copied() {
                    Some(parent) => {
                        let target = &graph.fragments()[loss.target];
                        let color = self.color_of(target.id)?;
                        let node = tree.add_child(
                            parent,
                            target.formula.clone(),
                            color,
                            loss.weight,
                            loss.formula.clone(),
                            None,
                        );
                        nodes.insert(target.id, node);
                    }
                    None => deferred.push(id),
                }
            }
            if deferred.len() == before {
                let loss = &graph.losses()[deferred[0]];
                return Err(GraphError::DetachedLoss {
                    loss: loss.id,
                    source_id: loss.source,
                });
            }
            pending = deferred;
        }

        attach_isotopes(graph, &mut tree, &nodes, &isotopes, &selection.color_to_edge, marker)?;
        Ok(tree)
    }
}
