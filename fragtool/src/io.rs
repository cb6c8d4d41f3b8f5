use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use fragcore::chemistry::ionization::Ionization;
use fragcore::chemistry::sum_formula::SumFormula;
use fragcore::data::input::ProcessedInput;
use fragcore::data::peak::ProcessedPeak;
use fragcore::data::profile::MeasurementProfile;
use fragcore::scoring::contracts::{Scoring, ScoringSettings};

use crate::error::ToolError;
use crate::pipeline::CandidateResult;

/// One spectrum together with the candidate formulas to rank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInstance {
    pub peaks: Vec<ProcessedPeak>,
    /// Adduct notation such as `[M+H]+`
    pub ionization: String,
    pub candidates: Vec<String>,
    #[serde(default)]
    pub profile: MeasurementProfile,
    #[serde(default)]
    pub scoring: ScoringSettings,
}

impl AnalysisInstance {
    pub fn processed_input(&self) -> Result<ProcessedInput, ToolError> {
        Ok(ProcessedInput::new(self.peaks.clone(), self.profile.clone())?)
    }

    pub fn ionization(&self) -> Result<Ionization, ToolError> {
        Ok(Ionization::parse(&self.ionization)?)
    }

    pub fn candidate_formulas(&self) -> Result<Vec<SumFormula>, ToolError> {
        self.candidates
            .iter()
            .map(|c| c.parse::<SumFormula>().map_err(ToolError::from))
            .collect()
    }

    pub fn scoring(&self) -> Result<Scoring, ToolError> {
        Ok(Scoring::from_settings(&self.scoring)?)
    }
}

pub fn read_instance(path: &Path) -> Result<AnalysisInstance, ToolError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Pretty-printed JSON list of the ranked candidates.
pub fn write_results<W: Write>(mut writer: W, results: &[CandidateResult]) -> Result<(), ToolError> {
    serde_json::to_writer_pretty(&mut writer, results)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
