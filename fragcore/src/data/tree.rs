use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::chemistry::ionization::Ionization;
use crate::chemistry::sum_formula::SumFormula;
use crate::data::graph::IsotopeMark;
use crate::error::CodecError;

/// One node of a solved fragmentation tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct TreeFragment {
    pub id: usize,
    pub formula: SumFormula,
    pub ionization: Ionization,
    /// Peak explained by this fragment
    pub color: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Weight of the loss leading here; for the root the weight of the root edge
    pub weight: f64,
    /// Neutral loss from the parent, empty for the root and isotope fragments
    pub loss: SumFormula,
    pub isotope: Option<IsotopeMark>,
}

/// Parent to child edge as seen by annotation and serialization stages.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeEdge {
    pub parent: usize,
    pub child: usize,
    pub weight: f64,
    /// Peak id of the child
    pub peak: usize,
}

/// A rooted tree explaining a spectrum with one candidate formula.
///
/// Fragments are stored in insertion order, parents before children. The
/// tree is built by the solver and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct FragmentationTree {
    root_formula: SumFormula,
    root_ionization: Ionization,
    fragments: Vec<TreeFragment>,
    score: f64,
}

impl FragmentationTree {
    /// A tree without fragments, the result for graphs without any candidate.
    pub fn empty(root_formula: SumFormula, root_ionization: Ionization) -> Self {
        FragmentationTree {
            root_formula,
            root_ionization,
            fragments: Vec::new(),
            score: 0.0,
        }
    }

    pub(crate) fn with_root(formula: SumFormula, ionization: Ionization, color: usize, weight: f64) -> Self {
        let mut tree = FragmentationTree::empty(formula.clone(), ionization.clone());
        tree.fragments.push(TreeFragment {
            id: 0,
            formula,
            ionization,
            color,
            parent: None,
            children: Vec::new(),
            weight,
            loss: SumFormula::empty(),
            isotope: None,
        });
        tree.score += weight;
        tree
    }

    /// Append a child of `parent` and add `weight` to the score.
    pub(crate) fn add_child(
        &mut self,
        parent: usize,
        formula: SumFormula,
        color: usize,
        weight: f64,
        loss: SumFormula,
        isotope: Option<IsotopeMark>,
    ) -> usize {
        let id = self.fragments.len();
        let ionization = self.root_ionization.clone();
        self.fragments.push(TreeFragment {
            id,
            formula,
            ionization,
            color,
            parent: Some(parent),
            children: Vec::new(),
            weight,
            loss,
            isotope,
        });
        self.fragments[parent].children.push(id);
        self.score += weight;
        id
    }

    pub fn root_formula(&self) -> &SumFormula {
        &self.root_formula
    }

    pub fn root_ionization(&self) -> &Ionization {
        &self.root_ionization
    }

    pub fn root(&self) -> Option<&TreeFragment> {
        self.fragments.first()
    }

    pub fn fragments(&self) -> &[TreeFragment] {
        &self.fragments
    }

    pub fn fragment(&self, id: usize) -> Option<&TreeFragment> {
        self.fragments.get(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Sum of all fragment weights, root edge included.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Weight of the root edge, 0 for an empty tree.
    pub fn root_score(&self) -> f64 {
        self.root().map_or(0.0, |root| root.weight)
    }

    /// All parent to child edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = TreeEdge> + '_ {
        self.fragments.iter().filter_map(|f| {
            f.parent.map(|parent| TreeEdge {
                parent,
                child: f.id,
                weight: f.weight,
                peak: f.color,
            })
        })
    }

    pub fn children_of(&self, id: usize) -> impl Iterator<Item = &TreeFragment> + '_ {
        self.fragments
            .get(id)
            .into_iter()
            .flat_map(|f| f.children.iter())
            .map(|&c| &self.fragments[c])
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreeFragment> + '_ {
        self.fragments.iter().filter(|f| f.children.is_empty())
    }

    /// Fragment ids from `id` up to the root, `id` first.
    pub fn path_to_root(&self, id: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self.fragments.get(id).map(|f| f.id);
        while let Some(node) = current {
            path.push(node);
            current = self.fragments[node].parent;
        }
        path
    }

    /// `true` if no color repeats on any root to leaf path.
    pub fn is_colorful(&self) -> bool {
        self.leaves().all(|leaf| {
            let mut colors: Vec<usize> = self
                .path_to_root(leaf.id)
                .into_iter()
                .map(|id| self.fragments[id].color)
                .collect();
            let len = colors.len();
            colors.sort_unstable();
            colors.dedup();
            colors.len() == len
        })
    }

    /// Compact binary form of the tree.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let (tree, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(tree)
    }
}
