//! Cell-related types
//!
//! - [`CellValue`] - raw content stored in a cell
//! - [`CellError`] - Excel error kinds
//! - [`CellAddress`] / [`CellRange`] - A1-style locations

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use value::{CellError, CellValue, SharedString};
