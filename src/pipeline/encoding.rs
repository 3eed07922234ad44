//! Integer codes for soil-type labels.
//!
//! Codes are positions in the sorted label list, matching a label encoder
//! fitted on the same labels, so vectors stay compatible with models trained
//! against that ordering. The table is built once and shared read-only.

use std::collections::HashMap;

use super::types::SoilTypeLabel;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct SoilTypeEncoder {
    labels: Vec<SoilTypeLabel>,
    codes: HashMap<SoilTypeLabel, usize>,
    unknown: usize,
}

impl SoilTypeEncoder {
    /// All nine labels: Black 0, Clay 1, Loamy 2, Peaty 3, Red 4, Saline 5,
    /// Sandy 6, Silty 7, Unknown 8.
    pub fn standard() -> Self {
        Self::build(SoilTypeLabel::ALL.to_vec())
    }

    /// Encoder over a custom label set. Labels are sorted and deduplicated;
    /// `Unknown` is required as the fallback.
    pub fn from_labels<I>(labels: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = SoilTypeLabel>,
    {
        let labels: Vec<SoilTypeLabel> = labels.into_iter().collect();
        if !labels.contains(&SoilTypeLabel::Unknown) {
            return Err(PipelineError::config(
                "soil-type encoder needs an 'Unknown' label",
            ));
        }
        Ok(Self::build(labels))
    }

    /// Same as [`from_labels`](Self::from_labels) but from label names.
    pub fn from_names<'a, I>(names: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let labels = names
            .into_iter()
            .map(|name| {
                SoilTypeLabel::from_name(name).ok_or_else(|| {
                    PipelineError::config(format!("unrecognised soil-type label '{name}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_labels(labels)
    }

    fn build(mut labels: Vec<SoilTypeLabel>) -> Self {
        labels.sort_by_key(|label| label.name());
        labels.dedup();
        let codes: HashMap<SoilTypeLabel, usize> = labels
            .iter()
            .enumerate()
            .map(|(code, label)| (*label, code))
            .collect();
        let unknown = codes.get(&SoilTypeLabel::Unknown).copied().unwrap_or(0);
        Self {
            labels,
            codes,
            unknown,
        }
    }

    /// Code for `label`, or the `Unknown` code when the label is not in the table.
    pub fn encode(&self, label: SoilTypeLabel) -> usize {
        self.codes.get(&label).copied().unwrap_or(self.unknown)
    }

    /// Code for a free-form label name; unrecognised names encode as `Unknown`.
    pub fn encode_name(&self, name: &str) -> usize {
        SoilTypeLabel::from_name(name)
            .map(|label| self.encode(label))
            .unwrap_or(self.unknown)
    }

    pub fn decode(&self, code: usize) -> Option<SoilTypeLabel> {
        self.labels.get(code).copied()
    }

    /// `(code, label)` pairs in code order.
    pub fn table(&self) -> impl Iterator<Item = (usize, SoilTypeLabel)> + '_ {
        self.labels.iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for SoilTypeEncoder {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_codes_are_alphabetical() {
        let enc = SoilTypeEncoder::standard();
        let names: Vec<&str> = enc.table().map(|(_, l)| l.name()).collect();
        assert_eq!(
            names,
            ["Black", "Clay", "Loamy", "Peaty", "Red", "Saline", "Sandy", "Silty", "Unknown"]
        );
        assert_eq!(enc.encode(SoilTypeLabel::Loamy), 2);
        assert_eq!(enc.encode(SoilTypeLabel::Unknown), 8);
    }

    #[test]
    fn test_unrecognised_name_falls_back_to_unknown() {
        let enc = SoilTypeEncoder::standard();
        assert_eq!(enc.encode_name("Laterite"), 8);
        assert_eq!(enc.encode_name("sandy"), 6);
    }

    #[test]
    fn test_decode_round_trips_table() {
        let enc = SoilTypeEncoder::standard();
        for (code, label) in enc.table() {
            assert_eq!(enc.decode(code), Some(label));
        }
        assert_eq!(enc.decode(9), None);
    }

    #[test]
    fn test_custom_label_set() {
        // Eight-label table without Silty: Silty falls back to Unknown (7).
        let enc = SoilTypeEncoder::from_names([
            "Black", "Clay", "Loamy", "Peaty", "Red", "Saline", "Sandy", "Unknown",
        ])
        .unwrap();
        assert_eq!(enc.len(), 8);
        assert_eq!(enc.encode(SoilTypeLabel::Silty), 7);
        assert_eq!(enc.encode(SoilTypeLabel::Sandy), 6);
    }

    #[test]
    fn test_custom_label_set_requires_unknown() {
        assert!(SoilTypeEncoder::from_labels([SoilTypeLabel::Clay]).is_err());
        assert!(SoilTypeEncoder::from_names(["Clay", "Mystery"]).is_err());
    }
}
