use std::collections::BTreeMap;

use chainlace_core::{CandidateGrid, Digit, DigitSet, House, Position};

use crate::{
    error::EngineError,
    rule::{RuleHint, RuleProducer},
};

const NAME: &str = "Hidden Set";

/// Hidden sets of a fixed degree within a house.
///
/// A hidden pair occurs when two digits fit only the same two cells of a
/// house; those cells then shed every other candidate. The condition
/// candidates are the remaining house cells for the two digits: their lack of
/// the digits is what hides the pair.
///
/// Only degree 2 is used by the chain extension.
#[derive(Debug, Clone, Copy)]
pub struct HiddenSet {
    degree: usize,
}

impl HiddenSet {
    /// Creates a hidden-set rule of the given degree.
    ///
    /// # Panics
    ///
    /// Panics unless `degree` is 2 (larger sets are not used as extensions).
    #[must_use]
    pub fn new(degree: usize) -> Self {
        assert!(degree == 2, "only hidden pairs are supported");
        Self { degree }
    }
}

impl RuleProducer for HiddenSet {
    fn name(&self) -> &'static str {
        NAME
    }

    fn produce_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn FnMut(RuleHint),
    ) -> Result<(), EngineError> {
        debug_assert_eq!(self.degree, 2);
        for house in House::ALL {
            for (i, a) in Digit::ALL.into_iter().enumerate() {
                let mask_a = grid.house_positions(house, a);
                if mask_a.is_empty() || mask_a.len() > 2 {
                    continue;
                }
                for b in Digit::ALL.into_iter().skip(i + 1) {
                    let mask_b = grid.house_positions(house, b);
                    if mask_b.is_empty() || mask_b.len() > 2 {
                        continue;
                    }
                    let union = mask_a | mask_b;
                    if union.len() != 2 {
                        continue;
                    }
                    let pair = DigitSet::from_iter([a, b]);
                    let mut removable: BTreeMap<Position, DigitSet> = BTreeMap::new();
                    for cell_index in union {
                        let cell = house.cell(cell_index);
                        let others = grid.candidates_at(cell).difference(pair);
                        if !others.is_empty() {
                            removable.insert(cell, others);
                        }
                    }
                    if removable.is_empty() {
                        continue;
                    }
                    let mut conditions = vec![];
                    for cell_index in 0..9 {
                        if !union.contains(cell_index) {
                            let cell = house.cell(cell_index);
                            conditions.push((cell, a));
                            conditions.push((cell, b));
                        }
                    }
                    sink(RuleHint::new(
                        format!("Hidden Pair: {a} and {b} in {house}"),
                        removable,
                        conditions,
                    ));
                }
            }
        }
        Ok(())
    }
}
