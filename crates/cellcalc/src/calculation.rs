//! Dependency-aware calculation engine
//!
//! Formula values are computed on demand and kept in the configured
//! [`CacheBackend`](cellcalc_formula::CacheBackend). Every read a formula
//! makes while it is evaluated is recorded as a precedent, so an edit dirties
//! exactly the cells that (transitively) read the edited cell.
//!
//! # Example
//!
//! ```rust
//! use cellcalc::prelude::*;
//!
//! let mut sheet = Spreadsheet::new();
//! sheet.set_cell_value(0, "A1", 10.0).unwrap();
//! sheet.set_cell_value(0, "A2", 20.0).unwrap();
//! sheet.set_cell_formula(0, "A3", "=A1+A2").unwrap();
//!
//! assert_eq!(sheet.calculated_value(0, "A3").unwrap(), FormulaValue::Number(30.0));
//!
//! sheet.set_cell_value(0, "A1", 15.0).unwrap();
//! assert_eq!(sheet.calculated_value(0, "A3").unwrap(), FormulaValue::Number(35.0));
//! ```

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use cellcalc_core::{CellAddress, CellError, CellValue, Error, Result, Workbook, Worksheet};
use cellcalc_formula::{
    evaluate, CellKey, CellReference, DependencyGraph, EngineConfig, EvaluationContext,
    FormulaResult, FormulaValue, Grid, Program, RangeKey, RangeReference,
};
use tracing::{debug, info, trace, warn};

/// Options for calculation
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOptions {
    /// Resolve circular references by iteration instead of `#CALC!`
    pub iterative: bool,
    /// Maximum iterations for circular references (default: 100)
    pub max_iterations: u32,
    /// Maximum change threshold for convergence (default: 0.001)
    pub max_change: f64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            iterative: false,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}

impl CalculationOptions {
    /// Default options with iterative calculation switched on
    pub fn iterative() -> Self {
        Self {
            iterative: true,
            ..Self::default()
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of formula evaluations performed
    pub cells_calculated: usize,
    /// Largest number of passes any circular reference needed
    pub iterations: u32,
    /// Number of formula cells on a circular reference
    pub circular_references: usize,
    /// Number of formula cells calling a volatile function
    pub volatile_cells: usize,
    /// Number of formula cells whose value is an error
    pub errors: usize,
    /// Whether every circular reference converged
    pub converged: bool,
}

/// Bookkeeping for one formula cell; its value lives in the cache backend
#[derive(Debug)]
struct CacheEntry {
    program: std::result::Result<Arc<Program>, CellError>,
    dirty: bool,
    volatile: bool,
}

/// The calculation engine
///
/// The engine owns the compiled programs and the dependency graph; values go
/// to the configured cache backend and the cells themselves stay in the
/// [`Workbook`] passed to each call.
#[derive(Debug)]
pub struct CalculationEngine {
    options: CalculationOptions,
    config: EngineConfig,
    graph: DependencyGraph,
    cache: AHashMap<CellKey, CacheEntry>,
    in_progress: AHashSet<CellKey>,
    /// Cells re-entered while in progress, iterated once they finish
    cycle_entries: AHashSet<CellKey>,
    chain: Option<Vec<CellKey>>,
    /// Cycle entries whose last iteration ran out of passes
    unconverged: AHashSet<CellKey>,
    iterations: u32,
    evaluations: usize,
}

impl Default for CalculationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl CalculationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            options: CalculationOptions::default(),
            config,
            graph: DependencyGraph::new(),
            cache: AHashMap::new(),
            in_progress: AHashSet::new(),
            cycle_entries: AHashSet::new(),
            chain: None,
            unconverged: AHashSet::new(),
            iterations: 0,
            evaluations: 0,
        }
    }

    pub fn with_options(mut self, options: CalculationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Replace the options; cached values are kept
    pub fn set_options(&mut self, options: CalculationOptions) {
        self.options = options;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// False while the cached value of some circular reference is the
    /// result of running out of iterations
    ///
    /// The flag follows the affected cells: it clears once each of them is
    /// recomputed to convergence or edited, not on unrelated edits.
    pub fn is_converged(&self) -> bool {
        self.unconverged.is_empty()
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    // ==================== Edits ====================

    /// Store a literal (a `CellValue::Formula` is stored as a formula)
    pub fn set_cell_value(&mut self, workbook: &mut Workbook, key: CellKey, value: CellValue) -> Result<()> {
        if let CellValue::Formula { text } = &value {
            let text = text.clone();
            return self.set_cell_formula(workbook, key, &text);
        }
        sheet_mut(workbook, key.sheet)?.set_cell_value_at(key.row, key.col, value)?;
        self.forget(key);
        self.invalidate(key);
        Ok(())
    }

    /// Store formula text; it is compiled when first needed
    pub fn set_cell_formula(&mut self, workbook: &mut Workbook, key: CellKey, formula: &str) -> Result<()> {
        sheet_mut(workbook, key.sheet)?.set_cell_formula_at(key.row, key.col, formula)?;
        self.forget(key);
        self.invalidate(key);
        Ok(())
    }

    pub fn clear_cell(&mut self, workbook: &mut Workbook, key: CellKey) -> Result<()> {
        sheet_mut(workbook, key.sheet)?.clear_cell_at(key.row, key.col);
        self.forget(key);
        self.invalidate(key);
        Ok(())
    }

    /// Define a workbook-scoped name and dirty every formula
    pub fn define_name(&mut self, workbook: &mut Workbook, name: &str, refers_to: &str) -> Result<()> {
        workbook.define_name(name, refers_to)?;
        self.dirty_all(workbook);
        Ok(())
    }

    /// Dirty every formula cell, for changes the graph cannot see
    pub fn dirty_all(&mut self, workbook: &Workbook) {
        for (key, _) in formula_cells(workbook) {
            if let Some(entry) = self.cache.get_mut(&key) {
                entry.dirty = true;
            }
        }
        self.chain = None;
    }

    fn forget(&mut self, key: CellKey) {
        self.cache.remove(&key);
        self.config.cache.delete(&key);
        self.unconverged.remove(&key);
        if let Some(id) = self.graph.id(&key) {
            self.graph.clear_precedents(id);
        }
    }

    /// Dirty every transitive dependent of `key` and every volatile cell
    fn invalidate(&mut self, key: CellKey) {
        let id = self.graph.intern(key);
        let mut dirty = self.graph.transitive_dependents(id);

        let volatile: Vec<CellKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.volatile)
            .map(|(key, _)| *key)
            .collect();
        for key in volatile {
            let id = self.graph.intern(key);
            dirty.push(id);
            dirty.extend(self.graph.transitive_dependents(id));
        }

        for id in &dirty {
            if let Some(entry) = self.cache.get_mut(&self.graph.key(*id)) {
                entry.dirty = true;
            }
        }

        trace!(cell = %key, dirtied = dirty.len(), "invalidated dependents");
        self.chain = None;
    }

    // ==================== Values ====================

    /// Value of any cell; formula cells are computed when dirty
    pub fn calculated_value(&mut self, workbook: &Workbook, key: CellKey) -> FormulaValue {
        match workbook.cell_content(key.sheet, key.row, key.col) {
            Some(CellValue::Formula { text }) => self.formula_value(workbook, key, text),
            Some(value) => FormulaValue::from(value),
            None if key.sheet < workbook.sheet_count() => FormulaValue::Empty,
            None => FormulaValue::Error(CellError::Ref),
        }
    }

    /// Evaluate formula text against the workbook without storing it
    pub fn evaluate(&mut self, workbook: &Workbook, sheet: usize, formula: &str) -> FormulaResult<FormulaValue> {
        let program = Program::compile(formula)?;
        let mut ctx = CellContext::new(self, workbook, sheet);
        Ok(evaluate(&program, &mut ctx))
    }

    /// Cached value of a formula cell, `None` when it has never been stored
    /// or the backend dropped it
    fn cached(&self, key: &CellKey) -> Option<FormulaValue> {
        self.config.cache.get(key)
    }

    fn formula_value(&mut self, workbook: &Workbook, key: CellKey, text: &str) -> FormulaValue {
        if self.cache.get(&key).map_or(false, |entry| !entry.dirty) {
            if let Some(value) = self.cached(&key) {
                return value;
            }
        }

        if self.in_progress.contains(&key) {
            return self.reenter(key);
        }

        let value = self.evaluate_cell(workbook, key, text);
        if self.cycle_entries.remove(&key) {
            return self.iterate(workbook, key, text, value);
        }
        self.unconverged.remove(&key);
        value
    }

    /// A cell read while it is being computed
    fn reenter(&mut self, key: CellKey) -> FormulaValue {
        if !self.options.iterative {
            debug!(cell = %key, "circular reference");
            return FormulaValue::Error(CellError::Calc);
        }

        self.cycle_entries.insert(key);
        self.cached(&key)
            .filter(|value| !value.is_error())
            .unwrap_or(FormulaValue::Number(0.0))
    }

    /// Re-evaluate a cycle's entry cell until its members settle
    fn iterate(&mut self, workbook: &Workbook, key: CellKey, text: &str, first: FormulaValue) -> FormulaValue {
        let id = self.graph.intern(key);
        let mut value = first;
        let mut iterations = 1;

        loop {
            let members: Vec<(CellKey, Option<FormulaValue>)> = self
                .graph
                .transitive_dependents(id)
                .into_iter()
                .map(|member| {
                    let member = self.graph.key(member);
                    (member, self.cached(&member))
                })
                .collect();

            if iterations >= self.options.max_iterations {
                warn!(
                    cell = %key,
                    iterations,
                    "circular reference did not converge"
                );
                self.unconverged.insert(key);
                break;
            }

            for (member, _) in &members {
                if let Some(entry) = self.cache.get_mut(member) {
                    entry.dirty = true;
                }
            }
            value = self.evaluate_cell(workbook, key, text);
            self.cycle_entries.remove(&key);
            iterations += 1;

            let change = members
                .iter()
                .filter_map(|(member, before)| {
                    self.cache.get(member).filter(|e| !e.dirty)?;
                    Some(value_change(before.as_ref(), self.cached(member).as_ref()))
                })
                .fold(0.0, f64::max);

            if change < self.options.max_change {
                debug!(cell = %key, iterations, "circular reference converged");
                self.unconverged.remove(&key);
                break;
            }
        }

        self.iterations = self.iterations.max(iterations);
        value
    }

    /// Compile (once) and evaluate one formula cell, recording its reads
    fn evaluate_cell(&mut self, workbook: &Workbook, key: CellKey, text: &str) -> FormulaValue {
        let program = match self.program(key, text) {
            Ok(program) => program,
            Err(error) => {
                let value = FormulaValue::Error(error);
                self.store(key, value.clone(), Vec::new(), Vec::new());
                return value;
            }
        };

        trace!(cell = %key, formula = program.source(), "computing cell");
        self.in_progress.insert(key);
        let mut ctx = CellContext::new(self, workbook, key.sheet);
        let value = evaluate(&program, &mut ctx);
        let (cells, ranges) = ctx.into_reads();
        self.in_progress.remove(&key);

        self.store(key, value.clone(), cells, ranges);
        value
    }

    fn program(&mut self, key: CellKey, text: &str) -> std::result::Result<Arc<Program>, CellError> {
        if let Some(entry) = self.cache.get(&key) {
            return entry.program.clone();
        }

        let program = Program::compile(text).map(Arc::new).map_err(|err| {
            debug!(cell = %key, formula = text, error = %err, "formula failed to compile");
            err.to_cell_error()
        });
        let locale = &self.config.locale;
        let volatile = program.as_ref().map_or(false, |p| p.is_volatile_in(locale));
        self.cache.insert(
            key,
            CacheEntry {
                program: program.clone(),
                dirty: true,
                volatile,
            },
        );
        program
    }

    fn store(&mut self, key: CellKey, value: FormulaValue, cells: Vec<CellKey>, ranges: Vec<RangeKey>) {
        if let Some(entry) = self.cache.get_mut(&key) {
            entry.dirty = false;
        }
        self.config.cache.set(key, value);
        let id = self.graph.intern(key);
        self.graph.set_precedents(id, cells, ranges);
        self.evaluations += 1;
    }

    // ==================== Full recalculation ====================

    /// Dirty formula cells, precedents first
    ///
    /// Cells never evaluated are ordered by the references written in their
    /// formula; the others by what they read last time.
    pub fn calculation_chain(&mut self, workbook: &Workbook) -> Vec<CellKey> {
        if let Some(chain) = &self.chain {
            return chain.clone();
        }

        let mut ids = Vec::new();
        for (key, text) in formula_cells(workbook) {
            let evaluated = self.cache.contains_key(&key) && self.cached(&key).is_some();
            let dirty = !evaluated || self.cache.get(&key).map_or(true, |entry| entry.dirty);
            if !dirty {
                continue;
            }

            let id = self.graph.intern(key);
            if !evaluated {
                if let Ok(program) = self.program(key, &text) {
                    let (cells, ranges) = static_references(workbook, key.sheet, &program);
                    self.graph.set_precedents(id, cells, ranges);
                }
            }
            ids.push(id);
        }

        let chain: Vec<CellKey> = self
            .graph
            .topological_order(&ids)
            .into_iter()
            .map(|id| self.graph.key(id))
            .collect();
        self.chain = Some(chain.clone());
        chain
    }

    /// Recompute every formula cell in chain order
    pub fn recalculate_all(&mut self, workbook: &Workbook) -> CalculationStats {
        self.dirty_all(workbook);
        self.unconverged.clear();
        self.iterations = 0;
        self.evaluations = 0;

        let formulas = formula_cells(workbook);
        let chain = self.calculation_chain(workbook);

        let mut stats = CalculationStats {
            formula_count: formulas.len(),
            ..Default::default()
        };
        for key in chain {
            if self.calculated_value(workbook, key).is_error() {
                stats.errors += 1;
            }
        }
        self.chain = None;

        let circular = self.graph.circular_cells();
        for (key, _) in &formulas {
            if self.graph.id(key).map_or(false, |id| circular.contains(&id)) {
                stats.circular_references += 1;
            }
            if self.cache.get(key).map_or(false, |e| e.volatile) {
                stats.volatile_cells += 1;
            }
        }
        stats.cells_calculated = self.evaluations;
        stats.iterations = if formulas.is_empty() { 0 } else { self.iterations.max(1) };
        stats.converged = self.is_converged();

        info!(
            formulas = stats.formula_count,
            calculated = stats.cells_calculated,
            errors = stats.errors,
            circular = stats.circular_references,
            "recalculated workbook"
        );
        stats
    }
}

/// Size of a change between two iterations
fn value_change(before: Option<&FormulaValue>, after: Option<&FormulaValue>) -> f64 {
    match (before, after) {
        (Some(FormulaValue::Number(a)), Some(FormulaValue::Number(b))) => (a - b).abs(),
        (a, b) if a == b => 0.0,
        _ => f64::INFINITY,
    }
}

fn sheet_mut(workbook: &mut Workbook, sheet: usize) -> Result<&mut Worksheet> {
    let count = workbook.sheet_count();
    workbook
        .worksheet_mut(sheet)
        .ok_or(Error::SheetOutOfBounds(sheet, count))
}

/// Every formula cell as (key, text), in sheet/row/column order
fn formula_cells(workbook: &Workbook) -> Vec<(CellKey, String)> {
    let mut cells: Vec<(CellKey, String)> = workbook
        .worksheets()
        .enumerate()
        .flat_map(|(sheet, ws)| {
            ws.formula_cells()
                .map(move |(row, col, text)| (CellKey::new(sheet, row, col), text.to_string()))
        })
        .collect();
    cells.sort_by_key(|(key, _)| *key);
    cells
}

fn resolve_sheet(workbook: &Workbook, current: usize, sheet: Option<&str>) -> Option<usize> {
    match sheet {
        Some(name) => workbook.sheet_index(name),
        None if current < workbook.sheet_count() => Some(current),
        None => None,
    }
}

/// References written in a program, resolved against `workbook`
fn static_references(workbook: &Workbook, sheet: usize, program: &Program) -> (Vec<CellKey>, Vec<RangeKey>) {
    let cells = program
        .cell_references()
        .filter_map(|r| {
            resolve_sheet(workbook, sheet, r.sheet.as_deref()).map(|s| CellKey::from_address(s, &r.address))
        })
        .collect();
    let ranges = program
        .range_references()
        .filter_map(|r| resolve_sheet(workbook, sheet, r.sheet.as_deref()).map(|s| RangeKey::new(s, &r.range)))
        .collect();
    (cells, ranges)
}

/// Evaluation context of one formula: reads go through the engine and are
/// recorded as precedents
struct CellContext<'a> {
    engine: &'a mut CalculationEngine,
    workbook: &'a Workbook,
    sheet: usize,
    cells: Vec<CellKey>,
    ranges: Vec<RangeKey>,
    /// Names being resolved, innermost last
    names: Vec<String>,
}

impl<'a> CellContext<'a> {
    fn new(engine: &'a mut CalculationEngine, workbook: &'a Workbook, sheet: usize) -> Self {
        Self {
            engine,
            workbook,
            sheet,
            cells: Vec::new(),
            ranges: Vec::new(),
            names: Vec::new(),
        }
    }

    fn into_reads(self) -> (Vec<CellKey>, Vec<RangeKey>) {
        (self.cells, self.ranges)
    }

    fn sheet_index(&self, sheet: Option<&str>) -> Option<usize> {
        resolve_sheet(self.workbook, self.sheet, sheet)
    }
}

impl EvaluationContext for CellContext<'_> {
    fn cell_value(&mut self, reference: &CellReference) -> FormulaValue {
        let Some(sheet) = self.sheet_index(reference.sheet.as_deref()) else {
            return FormulaValue::Error(CellError::Ref);
        };
        let key = CellKey::from_address(sheet, &reference.address);
        self.cells.push(key);
        self.engine.calculated_value(self.workbook, key).into_scalar()
    }

    fn range_values(&mut self, reference: &RangeReference) -> FormulaValue {
        let Some(sheet) = self.sheet_index(reference.sheet.as_deref()) else {
            return FormulaValue::Error(CellError::Ref);
        };
        let range = &reference.range;
        self.ranges.push(RangeKey::new(sheet, range));

        let mut values = Vec::with_capacity(range.cell_count() as usize);
        for address in range.cells() {
            let key = CellKey::from_address(sheet, &address);
            values.push(self.engine.calculated_value(self.workbook, key).into_scalar());
        }

        Grid::new(range.row_count() as usize, range.col_count() as usize, values)
            .map_or(FormulaValue::Error(CellError::Ref), FormulaValue::Array)
    }

    fn resolve_name(&mut self, name: &str) -> FormulaValue {
        let Some(named) = self.workbook.get_named_range(name, self.sheet) else {
            return FormulaValue::Error(CellError::Name);
        };
        if self.names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            debug!(name, "name refers to itself");
            return FormulaValue::Error(CellError::Calc);
        }

        let program = match Program::compile(named.expression()) {
            Ok(program) => program,
            Err(err) => {
                debug!(name, error = %err, "defined name failed to compile");
                return FormulaValue::Error(err.to_cell_error());
            }
        };

        self.names.push(name.to_string());
        let value = evaluate(&program, self);
        self.names.pop();
        value
    }

    fn config(&self) -> &EngineConfig {
        &self.engine.config
    }
}

/// A workbook together with the engine that calculates it
///
/// All edits go through the spreadsheet so the engine sees them.
#[derive(Debug, Default)]
pub struct Spreadsheet {
    workbook: Workbook,
    engine: CalculationEngine,
}

impl Spreadsheet {
    /// One empty sheet, default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::from_workbook(Workbook::new(), config)
    }

    /// Calculate an existing workbook
    pub fn from_workbook(workbook: Workbook, config: EngineConfig) -> Self {
        Self {
            workbook,
            engine: CalculationEngine::new(config),
        }
    }

    pub fn with_options(mut self, options: CalculationOptions) -> Self {
        self.engine.set_options(options);
        self
    }

    pub fn set_options(&mut self, options: CalculationOptions) {
        self.engine.set_options(options);
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn engine(&self) -> &CalculationEngine {
        &self.engine
    }

    /// Give the workbook back, dropping the engine
    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    pub fn add_worksheet(&mut self, name: &str) -> Result<usize> {
        let index = self.workbook.add_worksheet_with_name(name)?;
        self.engine.dirty_all(&self.workbook);
        Ok(index)
    }

    pub fn set_cell_value<V: Into<CellValue>>(&mut self, sheet: usize, address: &str, value: V) -> Result<()> {
        let key = cell_key(sheet, address)?;
        self.engine.set_cell_value(&mut self.workbook, key, value.into())
    }

    pub fn set_cell_formula(&mut self, sheet: usize, address: &str, formula: &str) -> Result<()> {
        let key = cell_key(sheet, address)?;
        self.engine.set_cell_formula(&mut self.workbook, key, formula)
    }

    pub fn clear_cell(&mut self, sheet: usize, address: &str) -> Result<()> {
        let key = cell_key(sheet, address)?;
        self.engine.clear_cell(&mut self.workbook, key)
    }

    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.engine.define_name(&mut self.workbook, name, refers_to)
    }

    pub fn calculated_value(&mut self, sheet: usize, address: &str) -> Result<FormulaValue> {
        let key = cell_key(sheet, address)?;
        Ok(self.engine.calculated_value(&self.workbook, key))
    }

    pub fn value_at(&mut self, key: CellKey) -> FormulaValue {
        self.engine.calculated_value(&self.workbook, key)
    }

    pub fn recalculate_all(&mut self) -> CalculationStats {
        self.engine.recalculate_all(&self.workbook)
    }

    pub fn calculation_chain(&mut self) -> Vec<CellKey> {
        self.engine.calculation_chain(&self.workbook)
    }

    /// Evaluate an ad-hoc formula as if it were on `sheet`
    pub fn evaluate(&mut self, sheet: usize, formula: &str) -> FormulaResult<FormulaValue> {
        self.engine.evaluate(&self.workbook, sheet, formula)
    }

    pub fn is_converged(&self) -> bool {
        self.engine.is_converged()
    }
}

fn cell_key(sheet: usize, address: &str) -> Result<CellKey> {
    let address = CellAddress::parse(address)?;
    Ok(CellKey::from_address(sheet, &address))
}
