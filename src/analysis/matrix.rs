//! Beat-position matrices — per role, a `[bar][slot]` grid of optional hits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extract::DrumEvent;
use crate::error::{Error, Result};
use crate::event::BarGrid;
use crate::groove::PercussionRole;

/// A filled matrix slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub velocity: u8,
    pub timing_offset: i64,
}

/// Slot-level difference between two bars of one role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarDiff {
    /// Slots hit in the second bar only.
    pub added: Vec<u32>,
    /// Slots hit in the first bar only.
    pub removed: Vec<u32>,
    /// Slots hit in both, with `(first, second)` velocities where they differ.
    pub velocity_changes: Vec<(u32, u8, u8)>,
}

impl BarDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.velocity_changes.is_empty()
    }
}

/// One role's hits laid out by bar and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatPositionMatrix {
    pub role: PercussionRole,
    pub resolution: u32,
    /// Bar number of row 0.
    pub first_bar: u32,
    rows: Vec<Vec<Option<MatrixCell>>>,
}

impl BeatPositionMatrix {
    /// An empty matrix covering `bars` rows starting at `first_bar`.
    pub fn new(role: PercussionRole, first_bar: u32, bars: usize, resolution: u32) -> Self {
        Self {
            role,
            resolution,
            first_bar,
            rows: vec![vec![None; resolution as usize]; bars],
        }
    }

    pub fn bar_count(&self) -> usize {
        self.rows.len()
    }

    fn row_index(&self, bar: u32) -> Result<usize> {
        let index = bar
            .checked_sub(self.first_bar)
            .map(|i| i as usize)
            .filter(|&i| i < self.rows.len())
            .ok_or_else(|| Error::out_of_range("bar", bar as usize, self.rows.len()))?;
        Ok(index)
    }

    fn check_slot(&self, slot: u32) -> Result<()> {
        if slot >= self.resolution {
            return Err(Error::out_of_range("slot", slot as usize, self.resolution as usize));
        }
        Ok(())
    }

    /// The cell at `(bar, slot)`.
    pub fn get(&self, bar: u32, slot: u32) -> Result<Option<MatrixCell>> {
        let row = self.row_index(bar)?;
        self.check_slot(slot)?;
        Ok(self.rows[row][slot as usize])
    }

    /// Place a hit; the louder hit keeps the slot.
    pub fn place(&mut self, bar: u32, slot: u32, cell: MatrixCell) -> Result<()> {
        let row = self.row_index(bar)?;
        self.check_slot(slot)?;
        let target = &mut self.rows[row][slot as usize];
        let keep = matches!(target, Some(existing) if existing.velocity >= cell.velocity);
        if !keep {
            *target = Some(cell);
        }
        Ok(())
    }

    /// Every filled cell as `(bar, slot, cell)`, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, MatrixCell)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.iter().enumerate().filter_map(move |(s, cell)| {
                cell.map(|c| (self.first_bar + r as u32, s as u32, c))
            })
        })
    }

    /// Hits in one bar.
    pub fn hits_in(&self, bar: u32) -> Result<usize> {
        let row = self.row_index(bar)?;
        Ok(self.rows[row].iter().filter(|c| c.is_some()).count())
    }

    /// Compare two bars slot by slot.
    pub fn diff_bars(&self, a: u32, b: u32) -> Result<BarDiff> {
        let (ra, rb) = (self.row_index(a)?, self.row_index(b)?);
        let mut diff = BarDiff::default();
        for (slot, (x, y)) in self.rows[ra].iter().zip(&self.rows[rb]).enumerate() {
            let slot = slot as u32;
            match (x, y) {
                (None, Some(_)) => diff.added.push(slot),
                (Some(_), None) => diff.removed.push(slot),
                (Some(x), Some(y)) if x.velocity != y.velocity => {
                    diff.velocity_changes.push((slot, x.velocity, y.velocity))
                }
                _ => {}
            }
        }
        Ok(diff)
    }
}

/// One matrix per role present in `events`, each with a row per grid bar.
pub fn build_matrices(
    events: &[DrumEvent],
    grid: &BarGrid,
    resolution: u32,
) -> Result<BTreeMap<PercussionRole, BeatPositionMatrix>> {
    if resolution == 0 {
        return Err(Error::invalid("grid resolution must be positive"));
    }
    let first_bar = grid.bars().first().map(|b| b.number).unwrap_or(1);
    let mut matrices = BTreeMap::new();
    for e in events {
        let matrix = matrices
            .entry(e.role)
            .or_insert_with(|| BeatPositionMatrix::new(e.role, first_bar, grid.len(), resolution));
        let cell = MatrixCell {
            velocity: e.velocity,
            timing_offset: e.offset(),
        };
        matrix.place(e.bar, e.slot.min(resolution - 1), cell)?;
    }
    Ok(matrices)
}
