//! The chaining engine: configuration, propagation and hint drivers.

use std::{
    collections::{HashSet, VecDeque},
    fmt::{self, Display},
};

use chainlace_core::{CandidateGrid, Digit, House, Position};
use log::{debug, trace};
use rayon::prelude::*;

use crate::{
    error::EngineError,
    hint::{ChainingHint, HintKind},
    links::{off_to_on, on_to_off},
    potential::{Potential, PotentialKey, PotentialSet},
    rule::{HintSink, RuleHint, RuleProducer},
    rules::{Fisherman, HiddenSet, Locking, NakedSet},
    settings::{CancelToken, Settings},
    unary::{UnaryLinks, find_cycles, find_forcing_chains, reverse_cycle},
};

/// Configuration of a chaining engine.
///
/// The combination of flags selects the search: plain cycles and forcing
/// chains (`x_chains`/`y_chains` only), multi-branch reductions (`multiple`),
/// grid-mutating propagation (`dynamic`), contradiction-only Nishio search
/// (`nishio`), and nested extension rules (`level`).
#[derive(Debug, Clone, Copy)]
pub struct ChainingConfig {
    /// Follow X-links (digit forced within a house).
    pub x_chains: bool,
    /// Follow Y-links (value forced within a cell).
    pub y_chains: bool,
    /// Enable cell and region multi-branch reductions.
    pub multiple: bool,
    /// Allow the propagation to mutate the working grid (rolled back on exit).
    pub dynamic: bool,
    /// Nishio mode: report only per-candidate contradictions.
    pub nishio: bool,
    /// Nesting depth: `0` none, `1` pattern extensions, `≥2` recursive engines.
    pub level: u8,
    /// Fan out independent starting cells to workers (level ≥ 3 only).
    pub parallel: bool,
    /// Depth cap for recursive sub-engines at level ≥ 4.
    pub nesting_limit: u8,
}

impl ChainingConfig {
    const SIMPLE: Self = Self {
        x_chains: true,
        y_chains: true,
        multiple: false,
        dynamic: false,
        nishio: false,
        level: 0,
        parallel: false,
        nesting_limit: 0,
    };

    /// Bidirectional X-cycles and X-chains (single digit links only).
    #[must_use]
    pub const fn x_cycles() -> Self {
        Self {
            y_chains: false,
            ..Self::SIMPLE
        }
    }

    /// Bidirectional Y-cycles (bivalue cell links only).
    #[must_use]
    pub const fn y_cycles() -> Self {
        Self {
            x_chains: false,
            ..Self::SIMPLE
        }
    }

    /// Forcing chains and cycles with both link kinds.
    #[must_use]
    pub const fn forcing_chains() -> Self {
        Self::SIMPLE
    }

    /// Multiple forcing chains: cell and region reductions.
    #[must_use]
    pub const fn multiple_forcing_chains() -> Self {
        Self {
            multiple: true,
            ..Self::SIMPLE
        }
    }

    /// Dynamic forcing chains: reductions plus grid-mutating propagation.
    #[must_use]
    pub const fn dynamic_forcing_chains() -> Self {
        Self {
            multiple: true,
            dynamic: true,
            ..Self::SIMPLE
        }
    }

    /// Nishio: per-candidate contradiction search.
    #[must_use]
    pub const fn nishio() -> Self {
        Self {
            y_chains: false,
            dynamic: true,
            nishio: true,
            ..Self::SIMPLE
        }
    }

    /// Dynamic forcing chains extended by nested rules at the given level.
    #[must_use]
    pub const fn nested_forcing_chains(level: u8, nesting_limit: u8) -> Self {
        Self {
            multiple: true,
            dynamic: true,
            level,
            nesting_limit,
            ..Self::SIMPLE
        }
    }

    /// Difficulty rating of the configuration.
    ///
    /// # Panics
    ///
    /// Panics for a plain cycle configuration (neither multiple, dynamic nor
    /// nishio at level 0): that combination has no single rating, and asking
    /// for one is a configuration bug.
    #[must_use]
    pub fn difficulty(&self) -> f64 {
        if self.level >= 2 {
            9.0 + 0.5 * f64::from(self.level - 2)
        } else if self.level == 1 {
            8.5
        } else if self.nishio {
            7.5
        } else if self.dynamic {
            8.5
        } else if self.multiple {
            8.0
        } else {
            panic!("difficulty is undefined for plain cycle configurations")
        }
    }

    fn cycle_base_difficulty(&self) -> f64 {
        match (self.x_chains, self.y_chains) {
            (true, false) => 6.5,
            (false, true) => 6.6,
            _ => 7.0,
        }
    }

    fn forcing_base_difficulty(&self) -> f64 {
        match (self.x_chains, self.y_chains) {
            (true, false) => 6.6,
            (false, true) => 7.0,
            _ => 7.5,
        }
    }
}

/// Counters exposed for observability and tests.
#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    propagations: usize,
    memo_hits: usize,
}

impl EngineStats {
    /// Returns the number of propagation runs performed so far.
    #[must_use]
    pub fn propagations(&self) -> usize {
        self.propagations
    }

    /// Returns the number of calls answered from the previous-grid memo.
    #[must_use]
    pub fn memo_hits(&self) -> usize {
        self.memo_hits
    }
}

/// The chaining inference engine.
///
/// One instance owns its grid snapshot buffer, its lazily built extension
/// rules and a single previous-grid memo; it must not be shared between
/// threads. The parallel driver hands each worker a fresh engine instead.
///
/// # Examples
///
/// ```
/// use chainlace_core::CandidateGrid;
/// use chainlace_engine::{ChainingConfig, ChainingEngine, Settings};
///
/// let mut engine =
///     ChainingEngine::new(ChainingConfig::multiple_forcing_chains(), Settings::default());
/// let grid = CandidateGrid::new();
/// let mut hints = vec![];
/// engine.get_hints(&grid, &mut hints)?;
/// # Ok::<(), chainlace_engine::EngineError>(())
/// ```
pub struct ChainingEngine {
    config: ChainingConfig,
    settings: Settings,
    cancel: CancelToken,
    save_grid: CandidateGrid,
    sub_rules: Option<Vec<Box<dyn RuleProducer>>>,
    memo: Option<(CandidateGrid, Vec<ChainingHint>)>,
    stats: EngineStats,
}

impl fmt::Debug for ChainingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainingEngine")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Display for ChainingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.config.nishio {
            write!(f, "Nishio Forcing Chains")
        } else if self.config.level >= 2 {
            write!(f, "Nested Forcing Chains (level {})", self.config.level)
        } else if self.config.level == 1 {
            write!(f, "Dynamic Forcing Chains (+)")
        } else if self.config.dynamic {
            write!(f, "Dynamic Forcing Chains")
        } else if self.config.multiple {
            write!(f, "Multiple Forcing Chains")
        } else {
            match (self.config.x_chains, self.config.y_chains) {
                (true, true) => write!(f, "Forcing Chains & Cycles"),
                (true, false) => write!(f, "X-Cycles & X-Chains"),
                _ => write!(f, "Y-Cycles"),
            }
        }
    }
}

impl ChainingEngine {
    /// Creates an engine with the given configuration and settings.
    #[must_use]
    pub fn new(config: ChainingConfig, settings: Settings) -> Self {
        Self {
            config,
            settings,
            cancel: CancelToken::new(),
            save_grid: CandidateGrid::new(),
            sub_rules: None,
            memo: None,
            stats: EngineStats::default(),
        }
    }

    /// Attaches a cancellation token shared with the caller.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &ChainingConfig {
        &self.config
    }

    /// Returns the engine counters.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Returns the difficulty rating of this engine.
    ///
    /// # Panics
    ///
    /// Panics for plain cycle configurations, see
    /// [`ChainingConfig::difficulty`].
    #[must_use]
    pub fn difficulty(&self) -> f64 {
        self.config.difficulty()
    }

    /// Returns the common name of a hint produced by the simplest modes.
    #[must_use]
    pub fn common_name(&self, hint: &ChainingHint) -> Option<&'static str> {
        if self.config.multiple
            || self.config.dynamic
            || self.config.nishio
            || self.config.level > 0
        {
            return None;
        }
        let cyclic = matches!(hint.kind(), HintKind::Cycle { .. });
        match (self.config.x_chains, self.config.y_chains) {
            (true, false) => Some(if cyclic { "X-Cycle" } else { "X-Chain" }),
            (false, true) => Some(if cyclic { "Y-Cycle" } else { "Y-Chain" }),
            (true, true) => Some(if cyclic { "XY-Cycle" } else { "XY-Chain" }),
            (false, false) => None,
        }
    }

    /// Produces every chaining hint for `grid`, in canonical order.
    ///
    /// Results are memoized for a single grid: calling again with an equal
    /// grid replays the stored hints without propagating.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] when the attached token fires, and
    /// propagates invariant violations and worker failures.
    pub fn get_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn HintSink,
    ) -> Result<(), EngineError> {
        if self.memo.as_ref().is_some_and(|(last, _)| last == grid) {
            self.stats.memo_hits += 1;
            let hints = self.memo.as_ref().map(|(_, h)| h.clone()).unwrap_or_default();
            trace!("memo replay of {} hints", hints.len());
            for hint in hints {
                sink.push(hint);
            }
            return Ok(());
        }

        let hints = self.hint_list(grid)?;
        debug!("{self}: {} hints", hints.len());
        self.memo = Some((grid.clone(), hints.clone()));
        for hint in hints {
            sink.push(hint);
        }
        Ok(())
    }

    fn hint_list(&mut self, grid: &CandidateGrid) -> Result<Vec<ChainingHint>, EngineError> {
        let mut hints = if self.config.multiple || self.config.dynamic {
            self.multiple_chain_hints(grid)?
        } else {
            self.unary_chain_hints(grid)?
        };

        hints.sort_by(ChainingHint::order);
        let mut seen = HashSet::new();
        hints.retain(|hint| seen.insert(hint.canonical_key()));
        Ok(hints)
    }

    /// Cycle and forcing-chain search from every viable starting candidate.
    fn unary_chain_hints(&mut self, grid: &CandidateGrid) -> Result<Vec<ChainingHint>, EngineError> {
        let links = UnaryLinks {
            y_enabled: self.config.y_chains,
            x_enabled: self.config.x_chains,
            deterministic: self.settings.is_deterministic(),
        };
        let mut result = vec![];
        for pos in Position::ALL {
            let cardinality = grid.candidate_count(pos);
            if cardinality < 2 {
                continue;
            }
            if cardinality > 2 && !self.config.x_chains {
                // Y-cycles can only start from a bivalue cell.
                continue;
            }
            for digit in grid.candidates_at(pos) {
                self.stats.propagations += 1;
                let p_on = Potential::new(pos, digit, true);
                if cardinality == 2 {
                    for dst_on in find_cycles(grid, &p_on, links)? {
                        let dst_off = reverse_cycle(&dst_on);
                        let hint = ChainingHint::cycle(
                            grid,
                            &dst_on,
                            &dst_off,
                            self.config.cycle_base_difficulty(),
                        );
                        if hint.is_worth() {
                            result.push(hint);
                        }
                    }
                }
                if self.config.x_chains {
                    let base = self.config.forcing_base_difficulty();
                    for target in find_forcing_chains(grid, &p_on, links)? {
                        let hint = ChainingHint::forcing_chain(grid, &target, base);
                        if hint.is_worth() {
                            result.push(hint);
                        }
                    }
                    let p_off = Potential::new(pos, digit, false);
                    for target in find_forcing_chains(grid, &p_off, links)? {
                        let hint = ChainingHint::forcing_chain(grid, &target, base);
                        if hint.is_worth() {
                            result.push(hint);
                        }
                    }
                }
            }
        }
        Ok(result)
    }

    fn driver_cells(&self, grid: &CandidateGrid) -> Vec<Position> {
        Position::ALL
            .into_iter()
            .filter(|&pos| {
                let cardinality = grid.candidate_count(pos);
                cardinality == 2
                    || ((self.config.multiple || self.config.nishio) && cardinality > 2)
            })
            .collect()
    }

    fn parallel_enabled(&self) -> bool {
        self.config.parallel && self.config.level >= 3 && self.settings.num_threads() > 1
    }

    /// Binary, region and cell drivers over every starting cell, optionally
    /// fanned out to a worker pool.
    fn multiple_chain_hints(
        &mut self,
        grid: &CandidateGrid,
    ) -> Result<Vec<ChainingHint>, EngineError> {
        let cells = self.driver_cells(grid);
        if self.parallel_enabled() {
            return self.parallel_cell_hints(grid, &cells);
        }
        let mut working = grid.clone();
        let mut result = vec![];
        for &cell in &cells {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            result.extend(self.cell_chain_hints(&mut working, cell)?);
        }
        Ok(result)
    }

    /// One task per starting cell; every worker gets a cloned grid and a
    /// fresh engine with fan-out disabled. The indexed collect keeps the
    /// sequential emission order, so the final sort sees identical input
    /// regardless of scheduling.
    fn parallel_cell_hints(
        &mut self,
        grid: &CandidateGrid,
        cells: &[Position],
    ) -> Result<Vec<ChainingHint>, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.num_threads())
            .build()
            .map_err(|e| EngineError::Worker(e.to_string()))?;
        let config = ChainingConfig {
            parallel: false,
            ..self.config
        };
        let settings = self.settings.clone();
        let cancel = self.cancel.clone();
        debug!(
            "fanning out {} starting cells to {} workers",
            cells.len(),
            self.settings.num_threads()
        );

        let results: Result<Vec<Vec<ChainingHint>>, EngineError> = pool.install(|| {
            cells
                .par_iter()
                .map(|&cell| {
                    let mut worker_grid = grid.clone();
                    let mut worker = ChainingEngine::new(config, settings.clone())
                        .with_cancel(cancel.clone());
                    worker.cell_chain_hints(&mut worker_grid, cell)
                })
                .collect()
        });
        Ok(results?.into_iter().flatten().collect())
    }

    /// Runs the binary driver for each candidate of `cell`, feeding the
    /// region and cell reductions from the saturated per-candidate sets.
    fn cell_chain_hints(
        &mut self,
        grid: &mut CandidateGrid,
        cell: Position,
    ) -> Result<Vec<ChainingHint>, EngineError> {
        let cardinality = grid.candidate_count(cell);
        let do_reduction = self.config.multiple && !self.config.nishio;
        let do_contradiction = self.config.dynamic || self.config.nishio;
        let base = self.config.difficulty();
        let mut result = vec![];

        let mut cell_to_on: Option<PotentialSet> = None;
        let mut cell_to_off: Option<PotentialSet> = None;
        let mut value_chains_on: Vec<(Digit, PotentialSet)> = vec![];
        let mut value_chains_off: Vec<(Digit, PotentialSet)> = vec![];

        for digit in grid.candidates_at(cell) {
            let p_on = Potential::new(cell, digit, true);
            let p_off = Potential::new(cell, digit, false);

            let mut on_to_on = PotentialSet::new();
            let mut on_to_off = PotentialSet::new();
            on_to_on.insert(p_on.clone());
            if let Some((abs_on, abs_off)) =
                self.do_chaining(grid, &mut on_to_on, &mut on_to_off, do_contradiction)?
            {
                trace!("{p_on} contradicts itself at {abs_on}");
                let hint = ChainingHint::binary_absurd(grid, &p_on, &abs_on, &abs_off, base);
                if hint.is_worth() {
                    result.push(hint);
                }
            }

            let mut off_to_on_set = PotentialSet::new();
            let mut off_to_off = PotentialSet::new();
            off_to_off.insert(p_off.clone());
            if let Some((abs_on, abs_off)) =
                self.do_chaining(grid, &mut off_to_on_set, &mut off_to_off, do_contradiction)?
            {
                trace!("{p_off} contradicts itself at {abs_on}");
                let hint = ChainingHint::binary_absurd(grid, &p_off, &abs_on, &abs_off, base);
                if hint.is_worth() {
                    result.push(hint);
                }
            }

            if do_reduction {
                for p in on_to_on.iter() {
                    if let Some(other) = off_to_on_set.get(p.key()) {
                        let hint = ChainingHint::binary_reduction(grid, &p_on, p, other, base);
                        if hint.is_worth() {
                            result.push(hint);
                        }
                    }
                }
                for p in on_to_off.iter() {
                    if let Some(other) = off_to_off.get(p.key()) {
                        let hint = ChainingHint::binary_reduction(grid, &p_off, p, other, base);
                        if hint.is_worth() {
                            result.push(hint);
                        }
                    }
                }
            }

            if !self.config.nishio {
                self.region_chain_hints(grid, cell, digit, &on_to_on, &on_to_off, &mut result)?;
            }

            match (&mut cell_to_on, &mut cell_to_off) {
                (Some(on_acc), Some(off_acc)) => {
                    on_acc.retain_intersection(&on_to_on);
                    off_acc.retain_intersection(&on_to_off);
                }
                _ => {
                    cell_to_on = Some(on_to_on.clone());
                    cell_to_off = Some(on_to_off.clone());
                }
            }
            value_chains_on.push((digit, on_to_on));
            value_chains_off.push((digit, on_to_off));
        }

        if do_reduction
            && cardinality >= 2
            && let (Some(on_acc), Some(off_acc)) = (&cell_to_on, &cell_to_off)
        {
            for p in on_acc.iter() {
                let chains: Vec<Potential> = value_chains_on
                    .iter()
                    .filter_map(|(_, set)| set.get(p.key()).cloned())
                    .collect();
                let hint = ChainingHint::cell_reduction(grid, cell, p, chains, base);
                if hint.is_worth() {
                    result.push(hint);
                }
            }
            for p in off_acc.iter() {
                let chains: Vec<Potential> = value_chains_off
                    .iter()
                    .filter_map(|(_, set)| set.get(p.key()).cloned())
                    .collect();
                let hint = ChainingHint::cell_reduction(grid, cell, p, chains, base);
                if hint.is_worth() {
                    result.push(hint);
                }
            }
        }
        Ok(result)
    }

    /// For each house of `cell` where `digit` has few enough viable
    /// positions, propagates from every position and intersects the outcomes.
    ///
    /// Only the lowest-indexed position runs the driver, so a house is
    /// examined once instead of once per member.
    fn region_chain_hints(
        &mut self,
        grid: &mut CandidateGrid,
        cell: Position,
        digit: Digit,
        on_to_on: &PotentialSet,
        on_to_off: &PotentialSet,
        result: &mut Vec<ChainingHint>,
    ) -> Result<(), EngineError> {
        let base = self.config.difficulty();
        for house in House::containing(cell) {
            let mask = grid.house_positions(house, digit);
            let count = mask.len();
            if !(count == 2 || (self.config.multiple && count > 2)) {
                continue;
            }
            let Some(first) = mask.first() else { continue };
            if house.cell(first) != cell {
                continue;
            }

            let mut region_to_on = on_to_on.clone();
            let mut region_to_off = on_to_off.clone();
            let mut pos_chains_on: Vec<PotentialSet> = vec![on_to_on.clone()];
            let mut pos_chains_off: Vec<PotentialSet> = vec![on_to_off.clone()];

            for i in mask {
                let other = house.cell(i);
                if other == cell {
                    continue;
                }
                let mut other_on = PotentialSet::new();
                let mut other_off = PotentialSet::new();
                other_on.insert(Potential::new(other, digit, true));
                self.do_chaining(grid, &mut other_on, &mut other_off, false)?;
                region_to_on.retain_intersection(&other_on);
                region_to_off.retain_intersection(&other_off);
                pos_chains_on.push(other_on);
                pos_chains_off.push(other_off);
            }

            for p in region_to_on.iter() {
                let chains: Vec<Potential> = pos_chains_on
                    .iter()
                    .filter_map(|set| set.get(p.key()).cloned())
                    .collect();
                let hint = ChainingHint::region_reduction(grid, house, digit, p, chains, base);
                if hint.is_worth() {
                    result.push(hint);
                }
            }
            for p in region_to_off.iter() {
                let chains: Vec<Potential> = pos_chains_off
                    .iter()
                    .filter_map(|set| set.get(p.key()).cloned())
                    .collect();
                let hint = ChainingHint::region_reduction(grid, house, digit, p, chains, base);
                if hint.is_worth() {
                    result.push(hint);
                }
            }
        }
        Ok(())
    }

    /// Saturates the `on`/`off` frontiers from the given initial sets.
    ///
    /// On entry the working grid is snapshotted into `save_grid`; it is
    /// restored on every exit path, so the caller's grid is unchanged even
    /// after dynamic propagation. Returns the contradiction pair
    /// `(on, off)` if one was detected and requested.
    fn do_chaining(
        &mut self,
        grid: &mut CandidateGrid,
        to_on: &mut PotentialSet,
        to_off: &mut PotentialSet,
        do_contradiction: bool,
    ) -> Result<Option<(Potential, Potential)>, EngineError> {
        self.stats.propagations += 1;
        self.save_grid.clone_from(grid);
        let result = self.chain_loop(grid, to_on, to_off, do_contradiction);
        grid.clone_from(&self.save_grid);
        result
    }

    fn chain_loop(
        &mut self,
        grid: &mut CandidateGrid,
        to_on: &mut PotentialSet,
        to_off: &mut PotentialSet,
        do_contradiction: bool,
    ) -> Result<Option<(Potential, Potential)>, EngineError> {
        let y_enabled = self.config.y_chains && !self.config.nishio;
        let x_enabled = self.config.x_chains;
        let deterministic = self.settings.is_deterministic();
        let mut pending_on: VecDeque<Potential> = to_on.iter().cloned().collect();
        let mut pending_off: VecDeque<Potential> = to_off.iter().cloned().collect();

        loop {
            if let Some(p) = pending_on.pop_front() {
                let mut contradictions = vec![];
                for p_off in on_to_off(grid, &p, y_enabled) {
                    if let Some(stored_on) = to_on.get(p_off.key().conjugate()) {
                        if do_contradiction {
                            if deterministic {
                                contradictions.push((stored_on.clone(), p_off));
                            } else {
                                return Ok(Some((stored_on.clone(), p_off)));
                            }
                        }
                    } else if to_off.insert(p_off.clone()) {
                        pending_off.push_back(p_off);
                    }
                }
                if let Some(pair) = pick_min_contradiction(contradictions) {
                    return Ok(Some(pair));
                }
            } else if let Some(p) = pending_off.pop_front() {
                let make_on = off_to_on(
                    grid,
                    &self.save_grid,
                    &p,
                    to_off,
                    y_enabled,
                    x_enabled,
                    deterministic,
                )?;
                if self.config.dynamic {
                    grid.remove_candidate(p.position(), p.digit());
                }
                let mut contradictions = vec![];
                for p_on in make_on {
                    if let Some(stored_off) = to_off.get(p_on.key().conjugate()) {
                        if do_contradiction {
                            if deterministic {
                                contradictions.push((p_on, stored_off.clone()));
                            } else {
                                return Ok(Some((p_on, stored_off.clone())));
                            }
                        }
                    } else if to_on.insert(p_on.clone()) {
                        pending_on.push_back(p_on);
                    }
                }
                if let Some(pair) = pick_min_contradiction(contradictions) {
                    return Ok(Some(pair));
                }
            } else if self.config.level > 0 {
                let mut injected = false;
                for p_off in self.advanced_potentials(grid, to_off)? {
                    if to_off.insert(p_off.clone()) {
                        pending_off.push_back(p_off);
                        injected = true;
                    }
                }
                if !injected {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(None)
    }

    fn ensure_sub_rules(&mut self) {
        if self.sub_rules.is_some() {
            return;
        }
        let mut rules: Vec<Box<dyn RuleProducer>> = vec![
            Box::new(Locking::new()),
            Box::new(HiddenSet::new(2)),
            Box::new(NakedSet::new(2)),
            Box::new(Fisherman::new(2)),
        ];
        let nested_settings = Settings::new(1, self.settings.chaining_mode());
        let level = self.config.level;
        if level < 4 {
            if level >= 2 {
                rules.push(Box::new(
                    ChainingEngine::new(ChainingConfig::forcing_chains(), nested_settings.clone())
                        .with_cancel(self.cancel.clone()),
                ));
            }
            if level >= 3 {
                rules.push(Box::new(
                    ChainingEngine::new(
                        ChainingConfig::multiple_forcing_chains(),
                        nested_settings.clone(),
                    )
                    .with_cancel(self.cancel.clone()),
                ));
            }
        } else {
            let mut config = ChainingConfig::dynamic_forcing_chains();
            config.level = (level - 3).min(self.config.nesting_limit);
            config.nesting_limit = self.config.nesting_limit;
            rules.push(Box::new(
                ChainingEngine::new(config, nested_settings).with_cancel(self.cancel.clone()),
            ));
        }
        self.sub_rules = Some(rules);
    }

    /// Invokes the extension rules on the (possibly mutated) working grid
    /// and wires their deductions into the chain as advanced off-potentials.
    ///
    /// A deduction without rule parents holds independently of the chain and
    /// is discarded. The scan stops at the first rule that contributed
    /// anything.
    fn advanced_potentials(
        &mut self,
        grid: &CandidateGrid,
        to_off: &PotentialSet,
    ) -> Result<Vec<Potential>, EngineError> {
        self.ensure_sub_rules();
        let deterministic = self.settings.is_deterministic();
        let Self {
            sub_rules,
            save_grid,
            cancel,
            ..
        } = self;
        let source: &CandidateGrid = save_grid;
        let rules = sub_rules.as_mut().expect("sub-rules were just initialized");

        let mut result: Vec<Potential> = vec![];
        for rule in rules.iter_mut() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let mut hints: Vec<RuleHint> = vec![];
            rule.produce_hints(grid, &mut |hint| hints.push(hint))?;
            for hint in &hints {
                let parent_keys = hint.rule_parents(source, grid);
                if parent_keys.is_empty() {
                    continue;
                }
                let mut parents = Vec::with_capacity(parent_keys.len());
                for (position, digit) in parent_keys {
                    let stored = to_off
                        .get(PotentialKey {
                            position,
                            digit,
                            is_on: false,
                        })
                        .ok_or(EngineError::MissingParent { position, digit })?;
                    parents.push(stored.clone());
                }

                let mut cells: Vec<_> = hint
                    .removable()
                    .iter()
                    .map(|(pos, digits)| (*pos, *digits))
                    .collect();
                if deterministic {
                    cells.sort_by_key(|(pos, digits)| {
                        (pos.x(), pos.y(), digits.first().map_or(10, Digit::value))
                    });
                }
                for (pos, digits) in cells {
                    for digit in digits {
                        result.push(Potential::advanced(
                            pos,
                            digit,
                            hint.description().to_owned(),
                            hint.nested().cloned(),
                            parents.clone(),
                        ));
                    }
                }
            }
            if !result.is_empty() {
                debug!(
                    "extension rule {} contributed {} implications",
                    rule.name(),
                    result.len()
                );
                break;
            }
        }
        Ok(result)
    }
}

/// Keeps the contradiction with the smallest combined ancestor count; ties
/// resolve to the earliest found.
fn pick_min_contradiction(found: Vec<(Potential, Potential)>) -> Option<(Potential, Potential)> {
    found
        .into_iter()
        .min_by_key(|(on, off)| on.ancestor_count() + off.ancestor_count())
}

impl RuleProducer for ChainingEngine {
    fn name(&self) -> &'static str {
        "Nested Forcing Chains"
    }

    /// Runs the engine as an extension rule: every produced hint becomes a
    /// [`RuleHint`] whose condition candidates are the nodes of its proof
    /// graph.
    fn produce_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn FnMut(RuleHint),
    ) -> Result<(), EngineError> {
        let mut hints: Vec<ChainingHint> = vec![];
        self.get_hints(grid, &mut hints)?;
        for hint in hints {
            let conditions: Vec<(Position, Digit)> = hint
                .nodes()
                .iter()
                .map(|p| (p.position(), p.digit()))
                .collect();
            let rule_hint = RuleHint::new(
                hint.to_string(),
                hint.removable_potentials().clone(),
                conditions,
            )
            .with_nested(hint);
            sink(rule_hint);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use chainlace_core::DigitGrid;

    use super::*;
    use crate::{settings::ChainingMode, testing::ChainTester};

    /// Digit 4 forms a chain of bi-position houses that folds back on its
    /// starting cell: row 0, column 7, row 7 and column 2, with the start and
    /// the end of the chain sharing block 0.
    fn nishio_triangle() -> ChainTester {
        ChainTester::new()
            .keep_only(Position::new(0, 0), [Digit::D4, Digit::D5])
            .restrict(
                House::Row { y: 0 },
                Digit::D4,
                &[Position::new(0, 0), Position::new(7, 0)],
            )
            .restrict(
                House::Column { x: 7 },
                Digit::D4,
                &[Position::new(7, 0), Position::new(7, 7)],
            )
            .restrict(
                House::Row { y: 7 },
                Digit::D4,
                &[Position::new(7, 7), Position::new(2, 7)],
            )
            .restrict(
                House::Column { x: 2 },
                Digit::D4,
                &[Position::new(2, 7), Position::new(2, 2)],
            )
            .restrict(
                House::Block { index: 0 },
                Digit::D4,
                &[Position::new(0, 0), Position::new(2, 2)],
            )
    }

    #[test]
    fn test_nishio_contradiction_removes_the_assumption() {
        let tester = nishio_triangle()
            .run(ChainingConfig::nishio())
            .assert_some_hint_removes(Position::new(0, 0), Digit::D4);
        assert!(
            tester.hints().iter().any(|h| matches!(
                h.kind(),
                HintKind::Binary { absurd: true, target, .. }
                    if !target.is_on && target.position == Position::new(0, 0)
            )),
            "expected an absurd binary hint against r1c1=4"
        );
    }

    #[test]
    fn test_removable_entries_are_current_candidates() {
        let tester = nishio_triangle().run(ChainingConfig::nishio());
        for hint in tester.hints() {
            for (&pos, &digits) in hint.removable_potentials() {
                for digit in digits {
                    assert!(
                        tester.grid().has_candidate(pos, digit),
                        "{hint} removes {digit} from {pos}, which is not a candidate"
                    );
                }
            }
        }
    }

    #[test]
    fn test_contradiction_hints_pair_conjugates() {
        let tester = nishio_triangle().run(ChainingConfig::nishio());
        for hint in tester.hints() {
            if let HintKind::Binary { absurd: true, .. } = hint.kind() {
                let [dst_on, dst_off] = hint.chain_targets() else {
                    panic!("absurd hints carry the contradiction pair");
                };
                assert_eq!(dst_on.key().conjugate(), dst_off.key());
                assert!(dst_on.is_on());
            }
        }
    }

    /// Four bivalue {3, 7} cells at the corners of a rectangle, digit 3
    /// bi-positioned in both corner columns.
    fn xy_cycle() -> ChainTester {
        let corners = [
            Position::new(1, 1),
            Position::new(5, 1),
            Position::new(1, 7),
            Position::new(5, 7),
        ];
        let mut tester = ChainTester::new();
        for pos in corners {
            tester = tester.keep_only(pos, [Digit::D3, Digit::D7]);
        }
        tester
            .restrict(
                House::Column { x: 1 },
                Digit::D3,
                &[Position::new(1, 1), Position::new(1, 7)],
            )
            .restrict(
                House::Column { x: 5 },
                Digit::D3,
                &[Position::new(5, 1), Position::new(5, 7)],
            )
    }

    #[test]
    fn test_cycle_hint_cancels_both_digits_outside_the_loop() {
        xy_cycle()
            .run(ChainingConfig::forcing_chains())
            .assert_some_hint_removes(Position::new(3, 1), Digit::D7)
            .assert_some_hint_removes(Position::new(3, 1), Digit::D3);
    }

    #[test]
    fn test_cycle_hint_closes_on_itself() {
        let tester = xy_cycle().run(ChainingConfig::forcing_chains());
        let hint = tester
            .hints()
            .iter()
            .find(|h| matches!(h.kind(), HintKind::Cycle { .. }))
            .expect("cycle hint");
        let chain = hint.chain_targets()[0].first_parent_chain();
        assert_eq!(chain[0].key(), chain[chain.len() - 1].key());
        assert!(chain.len() - 1 >= 4);
        assert_eq!((chain.len() - 1) % 2, 0);
    }

    /// Two-string kite on digit 5: strong links in row 0 and column 0 whose
    /// near ends share block 0.
    fn kite() -> ChainTester {
        ChainTester::new()
            .restrict(
                House::Row { y: 0 },
                Digit::D5,
                &[Position::new(1, 0), Position::new(4, 0)],
            )
            .restrict(
                House::Column { x: 0 },
                Digit::D5,
                &[Position::new(0, 0), Position::new(0, 1), Position::new(0, 6)],
            )
    }

    #[test]
    fn test_x_chain_removes_the_kite_eye() {
        kite()
            .run(ChainingConfig::x_cycles())
            .assert_some_hint_removes(Position::new(4, 6), Digit::D5);
    }

    #[test]
    fn test_common_name_for_simple_modes() {
        let mut engine = ChainingEngine::new(ChainingConfig::x_cycles(), Settings::default());
        let mut hints = vec![];
        engine.get_hints(kite().grid(), &mut hints).unwrap();
        let hint = hints
            .iter()
            .find(|h| matches!(h.kind(), HintKind::ForcingChain { .. }))
            .expect("forcing chain hint");
        assert_eq!(engine.common_name(hint), Some("X-Chain"));

        let multi =
            ChainingEngine::new(ChainingConfig::multiple_forcing_chains(), Settings::default());
        assert_eq!(multi.common_name(hint), None);
    }

    /// XY-Wing: pivot {1, 2} with wings {1, 9} and {2, 9} in the same row.
    fn xy_wing() -> ChainTester {
        ChainTester::new()
            .keep_only(Position::new(0, 0), [Digit::D1, Digit::D2])
            .keep_only(Position::new(1, 0), [Digit::D1, Digit::D9])
            .keep_only(Position::new(5, 0), [Digit::D2, Digit::D9])
    }

    #[test]
    fn test_binary_reduction_finds_xy_wing() {
        let tester = xy_wing()
            .run(ChainingConfig::multiple_forcing_chains())
            .assert_some_hint_removes(Position::new(4, 0), Digit::D9);
        assert!(
            tester.hints().iter().any(|h| matches!(
                h.kind(),
                HintKind::Binary { absurd: false, .. }
            )),
            "expected a binary reduction hint"
        );
    }

    #[test]
    fn test_region_reduction_converges_on_common_eliminations() {
        let tester = ChainTester::new()
            .restrict(
                House::Block { index: 0 },
                Digit::D6,
                &[Position::new(1, 0), Position::new(1, 2)],
            )
            .run(ChainingConfig::multiple_forcing_chains())
            .assert_some_hint_removes(Position::new(1, 4), Digit::D6)
            .assert_some_hint_removes(Position::new(1, 7), Digit::D6);
        assert!(
            tester.hints().iter().any(|h| matches!(
                h.kind(),
                HintKind::RegionReduction { house: House::Block { index: 0 }, digit: Digit::D6, .. }
            )),
            "expected a region reduction for block 1"
        );
    }

    /// Every candidate of r4c4 {2, 5, 8} forces r9c1 to 7 along a different
    /// path; the cell's choice is irrelevant to the outcome.
    fn cell_reduction() -> ChainTester {
        let pivot = Position::new(3, 3);
        let target = Position::new(0, 8);
        ChainTester::new()
            .keep_only(pivot, [Digit::D2, Digit::D5, Digit::D8])
            .keep_only(target, [Digit::D7, Digit::D9])
            .keep_only(Position::new(3, 8), [Digit::D2, Digit::D9])
            .keep_only(Position::new(0, 3), [Digit::D5, Digit::D9])
            .keep_only(Position::new(3, 7), [Digit::D4, Digit::D8])
            .keep_only(Position::new(0, 7), [Digit::D4, Digit::D9])
    }

    #[test]
    fn test_cell_reduction_forces_the_common_outcome() {
        let pivot = Position::new(3, 3);
        let target = Position::new(0, 8);
        let tester = cell_reduction()
            .run(ChainingConfig::multiple_forcing_chains())
            .assert_some_hint_removes(target, Digit::D9);
        assert!(
            tester.hints().iter().any(|h| matches!(
                h.kind(),
                HintKind::CellReduction { cell, target: t }
                    if *cell == pivot && t.position == target
            )),
            "expected a cell reduction hint driven by {pivot}"
        );
    }

    #[test]
    fn test_memo_replays_without_propagating() {
        let tester = xy_wing();
        let mut engine =
            ChainingEngine::new(ChainingConfig::multiple_forcing_chains(), Settings::default());

        let mut first = vec![];
        engine.get_hints(tester.grid(), &mut first).unwrap();
        let propagations = engine.stats().propagations();
        assert!(propagations > 0);

        let mut second = vec![];
        engine.get_hints(tester.grid(), &mut second).unwrap();
        assert_eq!(engine.stats().propagations(), propagations);
        assert_eq!(engine.stats().memo_hits(), 1);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.canonical_key(), b.canonical_key());
            assert_eq!(a.to_string(), b.to_string());
        }
    }

    #[test]
    fn test_identical_runs_are_identical() {
        let render = |hints: &[ChainingHint]| -> Vec<String> {
            hints
                .iter()
                .map(|h| format!("{h} -> {:?}", h.removable_potentials()))
                .collect()
        };
        let a = cell_reduction().run(ChainingConfig::multiple_forcing_chains());
        let b = cell_reduction().run(ChainingConfig::multiple_forcing_chains());
        assert_eq!(render(a.hints()), render(b.hints()));
    }

    /// A solved grid with the four cells of a 6/7 rectangle blanked, leaving
    /// four bivalue starting cells and nothing else to propagate from.
    fn nearly_solved_grid() -> CandidateGrid {
        let grid = DigitGrid::from_str(
            "
            534 __8 912
            672 195 348
            198 342 567
            859 __1 423
            426 853 791
            713 924 856
            961 537 284
            287 419 635
            345 286 179
            ",
        )
        .unwrap();
        CandidateGrid::from_digit_grid(&grid)
    }

    #[test]
    fn test_parallel_output_matches_sequential() {
        let grid = nearly_solved_grid();
        let render = |hints: &[ChainingHint]| -> Vec<String> {
            hints
                .iter()
                .map(|h| format!("{h} -> {:?}", h.removable_potentials()))
                .collect()
        };

        let mut sequential = ChainingEngine::new(
            ChainingConfig::nested_forcing_chains(3, 0),
            Settings::new(1, ChainingMode::Deterministic),
        );
        let mut seq_hints = vec![];
        sequential.get_hints(&grid, &mut seq_hints).unwrap();

        let mut config = ChainingConfig::nested_forcing_chains(3, 0);
        config.parallel = true;
        let mut parallel =
            ChainingEngine::new(config, Settings::new(8, ChainingMode::Deterministic));
        assert!(parallel.parallel_enabled());
        let mut par_hints = vec![];
        parallel.get_hints(&grid, &mut par_hints).unwrap();

        assert_eq!(render(&seq_hints), render(&par_hints));
    }

    #[test]
    fn test_cancellation_unwinds() {
        let token = CancelToken::new();
        token.cancel();
        let mut engine =
            ChainingEngine::new(ChainingConfig::multiple_forcing_chains(), Settings::default())
                .with_cancel(token);
        let mut hints = vec![];
        let result = engine.get_hints(xy_wing().grid(), &mut hints);
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(hints.is_empty());
    }

    #[test]
    fn test_difficulty_ratings() {
        assert!((ChainingConfig::nishio().difficulty() - 7.5).abs() < 1e-9);
        assert!((ChainingConfig::multiple_forcing_chains().difficulty() - 8.0).abs() < 1e-9);
        assert!((ChainingConfig::dynamic_forcing_chains().difficulty() - 8.5).abs() < 1e-9);
        assert!((ChainingConfig::nested_forcing_chains(1, 0).difficulty() - 8.5).abs() < 1e-9);
        assert!((ChainingConfig::nested_forcing_chains(2, 0).difficulty() - 9.0).abs() < 1e-9);
        assert!((ChainingConfig::nested_forcing_chains(4, 1).difficulty() - 10.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "difficulty is undefined")]
    fn test_difficulty_panics_for_plain_cycles() {
        let _ = ChainingConfig::forcing_chains().difficulty();
    }

    #[test]
    fn test_unary_needs_x_chains_beyond_bivalue_cells() {
        // Cells with three or more candidates start no unary work when
        // X-chains are disabled.
        ChainTester::new()
            .run(ChainingConfig::y_cycles())
            .assert_no_hints();
    }

    #[test]
    fn test_advanced_extension_recovers_locking_parents() {
        // Source grid: digit 7 in block 0 occupies (0,0), (1,0) and (0,1).
        // The chain eliminated (0,1): on the working grid the block points
        // along row 0, and the deduction must name that elimination as its
        // parent.
        let mut source = CandidateGrid::new();
        for pos in Position::BLOCKS[0] {
            if pos != Position::new(0, 0) && pos != Position::new(1, 0) && pos != Position::new(0, 1)
            {
                source.remove_candidate(pos, Digit::D7);
            }
        }
        let mut working = source.clone();
        working.remove_candidate(Position::new(0, 1), Digit::D7);

        let mut to_off = PotentialSet::new();
        let eliminated = Potential::new(Position::new(0, 1), Digit::D7, false);
        to_off.insert(eliminated.clone());

        let mut engine = ChainingEngine::new(
            ChainingConfig::nested_forcing_chains(1, 0),
            Settings::default(),
        );
        engine.save_grid.clone_from(&source);
        let advanced = engine.advanced_potentials(&working, &to_off).unwrap();

        assert!(!advanced.is_empty());
        // Canonical order: ascending column first.
        assert_eq!(advanced[0].position(), Position::new(3, 0));
        for p in &advanced {
            assert!(!p.is_on());
            assert_eq!(p.digit(), Digit::D7);
            assert_eq!(p.cause(), crate::potential::Cause::Advanced);
            assert_eq!(p.parents().len(), 1);
            assert_eq!(p.parents()[0].key(), eliminated.key());
            assert_eq!(p.position().y(), 0);
        }
    }

    #[test]
    fn test_nested_engine_reports_proof_conditions() {
        let mut nested =
            ChainingEngine::new(ChainingConfig::forcing_chains(), Settings::default());
        let mut rule_hints = vec![];
        RuleProducer::produce_hints(&mut nested, kite().grid(), &mut |h| rule_hints.push(h))
            .unwrap();

        assert!(!rule_hints.is_empty());
        for hint in &rule_hints {
            assert!(hint.nested().is_some());
            assert!(!hint.conditions().is_empty());
        }
    }

    #[test]
    fn test_display_names() {
        let settings = Settings::default;
        let name = |config| ChainingEngine::new(config, settings()).to_string();
        assert_eq!(name(ChainingConfig::nishio()), "Nishio Forcing Chains");
        assert_eq!(
            name(ChainingConfig::multiple_forcing_chains()),
            "Multiple Forcing Chains"
        );
        assert_eq!(
            name(ChainingConfig::dynamic_forcing_chains()),
            "Dynamic Forcing Chains"
        );
        assert_eq!(
            name(ChainingConfig::nested_forcing_chains(2, 0)),
            "Nested Forcing Chains (level 2)"
        );
        assert_eq!(
            name(ChainingConfig::forcing_chains()),
            "Forcing Chains & Cycles"
        );
    }

    #[test]
    fn test_primary_parent_polarities_flip() {
        let tester = xy_cycle().run(ChainingConfig::forcing_chains());
        for hint in tester.hints() {
            for node in hint.nodes() {
                if node.cause() == crate::potential::Cause::Advanced {
                    continue;
                }
                // The primary implication edge always flips polarity; only
                // advanced edges may carry same-polarity parents.
                if let Some(primary) = node.parents().first() {
                    assert_ne!(primary.is_on(), node.is_on());
                }
            }
        }
    }
}
