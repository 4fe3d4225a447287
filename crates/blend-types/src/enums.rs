//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A certificate-of-analysis quality attribute carried by every segment.
///
/// The set is closed: the simulator never looks attributes up by free-form
/// name. Serialized names match the column headers the plant exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum QualityParam {
    /// Moisture content, percent.
    #[serde(rename = "moisture_pct")]
    MoisturePct,
    /// Fine-grind extract on a dry basis, percent.
    #[serde(rename = "fine_extract_db_pct")]
    FineExtractDbPct,
    /// Wort pH.
    #[serde(rename = "wort_pH")]
    WortPh,
    /// Diastatic power, Windisch-Kolbach units.
    #[serde(rename = "diastatic_power_WK")]
    DiastaticPowerWk,
    /// Total protein, percent.
    #[serde(rename = "total_protein_pct")]
    TotalProteinPct,
    /// Wort colour, EBC units.
    #[serde(rename = "wort_colour_EBC")]
    WortColourEbc,
}

impl QualityParam {
    /// Every attribute, in canonical reporting order.
    pub const ALL: [Self; 6] = [
        Self::MoisturePct,
        Self::FineExtractDbPct,
        Self::WortPh,
        Self::DiastaticPowerWk,
        Self::TotalProteinPct,
        Self::WortColourEbc,
    ];

    /// The serialized column name of this attribute.
    pub const fn column(self) -> &'static str {
        match self {
            Self::MoisturePct => "moisture_pct",
            Self::FineExtractDbPct => "fine_extract_db_pct",
            Self::WortPh => "wort_pH",
            Self::DiastaticPowerWk => "diastatic_power_WK",
            Self::TotalProteinPct => "total_protein_pct",
            Self::WortColourEbc => "wort_colour_EBC",
        }
    }
}

impl core::fmt::Display for QualityParam {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.column())
    }
}

/// Lifecycle of a single silo inside one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SiloPhase {
    /// Built but no step has run yet.
    Pending,
    /// At least one step has run and the silo can still discharge.
    Running,
    /// No further steps will run.
    Complete,
}

/// Why a silo stopped discharging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Completion {
    /// The configured discharge target was zero.
    NothingToDischarge,
    /// Discharged mass reached the target.
    TargetReached,
    /// Every step ran without reaching the target.
    StepsExhausted,
    /// No segment still holding mass had any kernel weight at the front.
    FrontExhausted,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn quality_params_use_column_names() {
        for param in QualityParam::ALL {
            let json = serde_json::to_string(&param).unwrap();
            assert_eq!(json, format!("\"{}\"", param.column()));
        }
    }

    #[test]
    fn quality_param_parses_mixed_case_column() {
        let parsed: Result<QualityParam, _> = serde_json::from_str("\"wort_pH\"");
        assert!(matches!(parsed, Ok(QualityParam::WortPh)));
    }
}
