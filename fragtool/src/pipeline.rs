use std::cmp::Ordering;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use fragcore::chemistry::ionization::Ionization;
use fragcore::chemistry::sum_formula::SumFormula;
use fragcore::compute_tree;
use fragcore::data::input::ProcessedInput;
use fragcore::data::tree::FragmentationTree;
use fragcore::scoring::contracts::Scoring;

use crate::error::ToolError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Solved { score: f64, tree: FragmentationTree },
    Failed { error: String },
}

/// Result of one candidate formula, `rank` starts at 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub rank: usize,
    pub formula: SumFormula,
    pub outcome: Outcome,
}

impl CandidateResult {
    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            Outcome::Solved { score, .. } => Some(*score),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn tree(&self) -> Option<&FragmentationTree> {
        match &self.outcome {
            Outcome::Solved { tree, .. } => Some(tree),
            Outcome::Failed { .. } => None,
        }
    }
}

/// compute the fragmentation tree of every candidate formula in parallel and rank them
///
/// Arguments:
///
/// * `input` - processed peaks shared by all candidates
/// * `scoring` - scorers shared by all candidates
/// * `ionization` - precursor ionization
/// * `candidates` - candidate precursor formulas
/// * `num_threads` - size of the dedicated thread pool
///
/// Returns:
///
/// * `Vec<CandidateResult>` - solved candidates by descending score, failed ones last
#[instrument(level = "info", skip_all, fields(candidates = candidates.len(), num_threads = num_threads))]
pub fn rank_candidates(
    input: &ProcessedInput,
    scoring: &Scoring,
    ionization: &Ionization,
    candidates: &[SumFormula],
    num_threads: usize,
) -> Result<Vec<CandidateResult>, ToolError> {
    let thread_pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;

    let mut results: Vec<CandidateResult> = thread_pool.install(|| {
        candidates
            .par_iter()
            .map(|formula| {
                let outcome = match compute_tree(input, scoring, formula, ionization) {
                    Ok(tree) => Outcome::Solved {
                        score: tree.score(),
                        tree,
                    },
                    Err(e) => {
                        warn!(formula = %formula, error = %e, "candidate failed");
                        Outcome::Failed { error: e.to_string() }
                    }
                };
                CandidateResult {
                    rank: 0,
                    formula: formula.clone(),
                    outcome,
                }
            })
            .collect()
    });

    results.sort_by(ranking);
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }

    let solved = results.iter().filter(|r| r.score().is_some()).count();
    info!(solved, failed = results.len() - solved, "candidates ranked");
    Ok(results)
}

fn ranking(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    let by_formula = || a.formula.to_string().cmp(&b.formula.to_string());
    match (a.score(), b.score()) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(by_formula),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => by_formula(),
    }
}
