//! Fragmentation graph: candidate fragment formulas connected by losses.
//!
//! Fragments live in an arena and are referenced by id. Fragment `0` is the
//! synthetic root. Fragments must be added parents-first, so every loss points
//! from a smaller to a larger id and the id order is a topological order.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::chemistry::ionization::Ionization;
use crate::chemistry::sum_formula::SumFormula;
use crate::error::GraphError;

pub type FragmentId = usize;
pub type LossId = usize;

/// Marks a fragment as explaining an isotope peak of another peak.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct IsotopeMark {
    /// Color of the monoisotopic peak
    pub monoisotopic: usize,
    /// 1 for the first isotope peak, 2 for the second, ...
    pub position: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphFragment {
    pub id: FragmentId,
    pub formula: SumFormula,
    pub ionization: Ionization,
    /// Peak this fragment explains; `None` only for the synthetic root
    pub color: Option<usize>,
    pub isotope: Option<IsotopeMark>,
    incoming: Vec<LossId>,
    outgoing: Vec<LossId>,
}

impl GraphFragment {
    pub fn incoming(&self) -> &[LossId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[LossId] {
        &self.outgoing
    }
}

/// Directed edge between two fragments, the neutral loss `source - target`.
#[derive(Clone, Debug, PartialEq)]
pub struct Loss {
    pub id: LossId,
    pub source: FragmentId,
    pub target: FragmentId,
    pub formula: SumFormula,
    pub weight: f64,
}

#[derive(Clone, Debug)]
pub struct FragmentationGraph {
    fragments: Vec<GraphFragment>,
    losses: Vec<Loss>,
    colors: BTreeMap<usize, Vec<FragmentId>>,
}

impl FragmentationGraph {
    pub const ROOT: FragmentId = 0;

    /// A graph holding only the synthetic root.
    pub fn new(ionization: Ionization) -> Self {
        let root = GraphFragment {
            id: Self::ROOT,
            formula: SumFormula::empty(),
            ionization,
            color: None,
            isotope: None,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        };
        FragmentationGraph {
            fragments: vec![root],
            losses: Vec::new(),
            colors: BTreeMap::new(),
        }
    }

    /// Add a fragment explaining peak `color`; it inherits the root ionization.
    pub fn add_fragment(&mut self, formula: SumFormula, color: usize, isotope: Option<IsotopeMark>) -> FragmentId {
        let id = self.fragments.len();
        let ionization = self.root().ionization.clone();
        self.fragments.push(GraphFragment {
            id,
            formula,
            ionization,
            color: Some(color),
            isotope,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        self.colors.entry(color).or_default().push(id);
        id
    }

    /// Connect `source` to `target`.
    ///
    /// The loss formula is `source - target`; it is empty for losses leaving
    /// the root and for isotope targets.
    pub fn add_loss(&mut self, source: FragmentId, target: FragmentId, weight: f64) -> Result<LossId, GraphError> {
        if source >= self.fragments.len() {
            return Err(GraphError::UnknownFragment(source));
        }
        if target >= self.fragments.len() {
            return Err(GraphError::UnknownFragment(target));
        }
        if target == Self::ROOT {
            return Err(GraphError::LossIntoRoot { source_id: source, target });
        }
        if source >= target {
            return Err(GraphError::NotTopological { source_id: source, target });
        }
        if !weight.is_finite() {
            return Err(GraphError::NonFiniteWeight { source_id: source, target, weight });
        }

        let formula = if source == Self::ROOT || self.fragments[target].isotope.is_some() {
            SumFormula::empty()
        } else {
            let (parent, child) = (&self.fragments[source].formula, &self.fragments[target].formula);
            if !child.is_proper_sub_formula_of(parent) {
                return Err(GraphError::NotASubFormula { source_id: source, target });
            }
            parent
                .checked_sub(child)
                .ok_or(GraphError::NotASubFormula { source_id: source, target })?
        };

        let id = self.losses.len();
        self.losses.push(Loss {
            id,
            source,
            target,
            formula,
            weight,
        });
        self.fragments[source].outgoing.push(id);
        self.fragments[target].incoming.push(id);
        Ok(id)
    }

    pub fn root(&self) -> &GraphFragment {
        &self.fragments[Self::ROOT]
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&GraphFragment> {
        self.fragments.get(id)
    }

    pub fn loss(&self, id: LossId) -> Option<&Loss> {
        self.losses.get(id)
    }

    /// All fragments in topological order, root first.
    pub fn fragments(&self) -> &[GraphFragment] {
        &self.fragments
    }

    pub fn losses(&self) -> &[Loss] {
        &self.losses
    }

    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    pub fn num_losses(&self) -> usize {
        self.losses.len()
    }

    pub fn incoming_losses(&self, id: FragmentId) -> impl Iterator<Item = &Loss> + '_ {
        self.fragments
            .get(id)
            .into_iter()
            .flat_map(|f| f.incoming.iter())
            .map(|&l| &self.losses[l])
    }

    pub fn outgoing_losses(&self, id: FragmentId) -> impl Iterator<Item = &Loss> + '_ {
        self.fragments
            .get(id)
            .into_iter()
            .flat_map(|f| f.outgoing.iter())
            .map(|&l| &self.losses[l])
    }

    /// Alternative explanations of peak `color`.
    pub fn fragments_with_color(&self, color: usize) -> &[FragmentId] {
        self.colors.get(&color).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    /// Colors in ascending order.
    pub fn colors(&self) -> impl Iterator<Item = usize> + '_ {
        self.colors.keys().copied()
    }

    pub fn num_colors(&self) -> usize {
        self.colors.len()
    }

    pub fn max_color(&self) -> Option<usize> {
        self.colors.keys().next_back().copied()
    }

    /// `true` if the graph holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.fragments.len() == 1
    }
}
