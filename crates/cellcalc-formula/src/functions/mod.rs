//! Built-in functions
//!
//! Every function has the same signature and reports problems as error
//! values; none of them panic. The table is built once and never changes.

pub mod args;
pub mod conditional;
pub mod criteria;
pub mod date;
pub mod info;
pub mod logical;
pub mod math;
pub mod round;
pub mod statistical;
pub mod text;
pub mod web;

use ahash::AHashMap;
use once_cell::sync::Lazy;

use crate::config::EngineConfig;
use crate::value::FormulaValue;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue], &FunctionContext) -> FormulaValue;

/// What a function may consult besides its arguments
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    config: &'a EngineConfig,
}

impl<'a> FunctionContext<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    pub implementation: FunctionImpl,
    /// Recalculates on every pass
    pub volatile: bool,
}

/// Function table keyed by upper-case name
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The shared built-in function table
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

impl FunctionRegistry {
    fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        math::register(&mut registry);
        round::register(&mut registry);
        logical::register(&mut registry);
        info::register(&mut registry);
        text::register(&mut registry);
        date::register(&mut registry);
        web::register(&mut registry);
        conditional::register(&mut registry);
        statistical::register(&mut registry);

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        match self.functions.get(name) {
            Some(def) => Some(def),
            None => self.functions.get(name.to_uppercase().as_str()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in alphabetical order
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub(crate) fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        });
    }

    pub(crate) fn add_volatile(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
            volatile: true,
        });
    }

    fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }
}
