//! Song sections — ordered section plan, bar→section lookup, and boundaries.
//!
//! The plan is supplied by the song-structure planner. Generation asks it which
//! section a bar belongs to and which bars end a section (the fill points).

pub mod tension;

pub use tension::{TensionSignals, TransitionHint};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The kind of a song section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionType {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Solo,
    Outro,
}

impl SectionType {
    pub const ALL: [SectionType; 6] = [
        SectionType::Intro,
        SectionType::Verse,
        SectionType::Chorus,
        SectionType::Bridge,
        SectionType::Solo,
        SectionType::Outro,
    ];

    /// Sections that play with raised energy.
    pub fn is_high_energy(self) -> bool {
        matches!(
            self,
            SectionType::Chorus | SectionType::Bridge | SectionType::Solo
        )
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionType::Intro => "Intro",
            SectionType::Verse => "Verse",
            SectionType::Chorus => "Chorus",
            SectionType::Bridge => "Bridge",
            SectionType::Solo => "Solo",
            SectionType::Outro => "Outro",
        };
        f.write_str(name)
    }
}

impl FromStr for SectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SectionType::ALL
            .iter()
            .copied()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid(format!("unknown section type '{s}'")))
    }
}

/// A section: a typed region with a length in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionType,
    pub length_in_bars: u32,
}

impl Section {
    pub fn new(kind: SectionType, length_in_bars: u32) -> Self {
        Self {
            kind,
            length_in_bars,
        }
    }
}

/// Where a bar sits inside the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionPosition {
    /// Index into the plan's sections.
    pub index: usize,
    pub kind: SectionType,
    /// 1-based bar within the section.
    pub bar_in_section: u32,
    pub section_length: u32,
}

impl SectionPosition {
    /// Whether this is the section's final bar.
    pub fn is_last_bar(&self) -> bool {
        self.bar_in_section == self.section_length
    }

    /// Position through the section in `(0, 1]`.
    pub fn progress(&self) -> f64 {
        self.bar_in_section as f64 / self.section_length.max(1) as f64
    }
}

/// An ordered list of sections covering the song bar by bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    sections: Vec<Section>,
}

impl SectionPlan {
    /// Build a plan, rejecting zero-length sections.
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        if let Some(idx) = sections.iter().position(|s| s.length_in_bars == 0) {
            return Err(Error::invalid(format!("section {idx} has zero length")));
        }
        Ok(Self { sections })
    }

    /// A single-section plan.
    pub fn single(kind: SectionType, bars: u32) -> Result<Self> {
        Self::new(vec![Section::new(kind, bars)])
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Total length of the plan in bars.
    pub fn total_bars(&self) -> u32 {
        self.sections.iter().map(|s| s.length_in_bars).sum()
    }

    /// Section by index.
    pub fn section(&self, index: usize) -> Result<&Section> {
        self.sections
            .get(index)
            .ok_or_else(|| Error::out_of_range("section", index, self.sections.len()))
    }

    /// Locate a 1-based bar in the plan.
    pub fn position_of(&self, bar: u32) -> Result<SectionPosition> {
        if bar == 0 {
            return Err(Error::out_of_range(
                "bar",
                0,
                self.total_bars() as usize,
            ));
        }
        let mut start = 1;
        for (index, section) in self.sections.iter().enumerate() {
            let end = start + section.length_in_bars;
            if bar < end {
                return Ok(SectionPosition {
                    index,
                    kind: section.kind,
                    bar_in_section: bar - start + 1,
                    section_length: section.length_in_bars,
                });
            }
            start = end;
        }
        Err(Error::out_of_range(
            "bar",
            bar as usize,
            self.total_bars() as usize,
        ))
    }

    /// Last bar number of every section, in order.
    pub fn boundaries(&self) -> Vec<u32> {
        self.sections
            .iter()
            .scan(0u32, |end, s| {
                *end += s.length_in_bars;
                Some(*end)
            })
            .collect()
    }

    /// First bar number of the section at `index`.
    pub fn first_bar_of(&self, index: usize) -> Result<u32> {
        self.section(index)?;
        Ok(1 + self.sections[..index]
            .iter()
            .map(|s| s.length_in_bars)
            .sum::<u32>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_plan() -> SectionPlan {
        SectionPlan::new(vec![
            Section::new(SectionType::Intro, 4),
            Section::new(SectionType::Verse, 8),
            Section::new(SectionType::Chorus, 8),
        ])
        .unwrap()
    }

    #[test]
    fn total_bars_and_count() {
        let plan = test_plan();
        assert_eq!(plan.total_bars(), 20);
        assert_eq!(plan.section_count(), 3);
    }

    #[test]
    fn position_lookup() {
        let plan = test_plan();
        let p = plan.position_of(1).unwrap();
        assert_eq!(p.kind, SectionType::Intro);
        assert_eq!(p.bar_in_section, 1);

        let p = plan.position_of(4).unwrap();
        assert!(p.is_last_bar());

        let p = plan.position_of(5).unwrap();
        assert_eq!(p.kind, SectionType::Verse);
        assert_eq!(p.index, 1);
        assert_eq!(p.bar_in_section, 1);

        let p = plan.position_of(20).unwrap();
        assert_eq!(p.kind, SectionType::Chorus);
        assert!(p.is_last_bar());
        assert!((p.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn position_out_of_range() {
        let plan = test_plan();
        assert!(matches!(plan.position_of(0), Err(Error::OutOfRange { .. })));
        assert!(matches!(plan.position_of(21), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn boundaries_are_section_ends() {
        assert_eq!(test_plan().boundaries(), vec![4, 12, 20]);
    }

    #[test]
    fn section_index_out_of_range() {
        let plan = test_plan();
        assert!(plan.section(2).is_ok());
        assert!(matches!(
            plan.section(3),
            Err(Error::OutOfRange {
                what: "section",
                index: 3,
                len: 3
            })
        ));
    }

    #[test]
    fn first_bar_of_section() {
        let plan = test_plan();
        assert_eq!(plan.first_bar_of(0).unwrap(), 1);
        assert_eq!(plan.first_bar_of(2).unwrap(), 13);
        assert!(plan.first_bar_of(3).is_err());
    }

    #[test]
    fn zero_length_section_rejected() {
        let err = SectionPlan::new(vec![Section::new(SectionType::Verse, 0)]);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn empty_plan() {
        let plan = SectionPlan::default();
        assert_eq!(plan.total_bars(), 0);
        assert!(plan.boundaries().is_empty());
        assert!(plan.position_of(1).is_err());
    }

    #[test]
    fn section_type_parse() {
        assert_eq!("chorus".parse::<SectionType>().unwrap(), SectionType::Chorus);
        assert_eq!("Solo".parse::<SectionType>().unwrap(), SectionType::Solo);
        assert!("coda".parse::<SectionType>().is_err());
    }

    #[test]
    fn high_energy_sections() {
        assert!(SectionType::Chorus.is_high_energy());
        assert!(!SectionType::Verse.is_high_energy());
        assert!(!SectionType::Outro.is_high_energy());
    }
}
