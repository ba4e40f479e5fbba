//! Element-wise application of scalar functions over grid arguments
//!
//! A function that opts in starts with
//!
//! ```ignore
//! if broadcast::has_array(args) {
//!     return broadcast::apply(args, |a| fn_x(a, ctx));
//! }
//! ```
//!
//! The output shape is the largest row count by the largest column count
//! among the grid arguments. Scalars repeat everywhere, an axis of size 1 is
//! read at index 0, and an index past the end of a longer axis reads `#N/A`.

use cellcalc_core::CellError;

use crate::value::{FormulaValue, Grid};

pub fn has_array(args: &[FormulaValue]) -> bool {
    args.iter().any(FormulaValue::is_array)
}

/// Output shape for `args`, or `None` when no argument is a grid
pub fn broadcast_shape(args: &[FormulaValue]) -> Option<(usize, usize)> {
    args.iter()
        .filter_map(|arg| match arg {
            FormulaValue::Array(grid) => Some(grid.shape()),
            _ => None,
        })
        .reduce(|(r1, c1), (r2, c2)| (r1.max(r2), c1.max(c2)))
}

/// Single-argument form: grids map element-wise, scalars go through `f` once
pub fn map(value: &FormulaValue, mut f: impl FnMut(&FormulaValue) -> FormulaValue) -> FormulaValue {
    match value {
        FormulaValue::Array(grid) => FormulaValue::Array(grid.map(f)),
        scalar => f(scalar),
    }
}

/// Lock-step form: `f` receives one scalar per argument for every output cell
pub fn apply(
    args: &[FormulaValue],
    mut f: impl FnMut(&[FormulaValue]) -> FormulaValue,
) -> FormulaValue {
    let (rows, cols) = match broadcast_shape(args) {
        Some(shape) => shape,
        None => return f(args),
    };

    let mut values = Vec::with_capacity(rows * cols);
    let mut scalars = Vec::with_capacity(args.len());
    for row in 0..rows {
        for col in 0..cols {
            scalars.clear();
            scalars.extend(args.iter().map(|arg| element(arg, row, col)));
            values.push(f(&scalars));
        }
    }

    Grid::new(rows, cols, values).map_or(FormulaValue::Error(CellError::Value), FormulaValue::Array)
}

fn element(arg: &FormulaValue, row: usize, col: usize) -> FormulaValue {
    match arg {
        FormulaValue::Array(grid) => {
            let r = if grid.rows() == 1 { 0 } else { row };
            let c = if grid.cols() == 1 { 0 } else { col };
            grid.get(r, c)
                .cloned()
                .unwrap_or(FormulaValue::Error(CellError::Na))
        }
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn grid(rows: Vec<Vec<f64>>) -> FormulaValue {
        FormulaValue::Array(
            Grid::from_rows(
                rows.into_iter()
                    .map(|r| r.into_iter().map(FormulaValue::Number).collect())
                    .collect(),
            )
            .unwrap(),
        )
    }

    fn add(args: &[FormulaValue]) -> FormulaValue {
        match (args[0].to_number(), args[1].to_number()) {
            (Ok(a), Ok(b)) => FormulaValue::Number(a + b),
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        }
    }

    #[test]
    fn test_shape() {
        assert_eq!(broadcast_shape(&[FormulaValue::Number(1.0)]), None);
        assert_eq!(
            broadcast_shape(&[grid(vec![vec![1.0, 2.0]]), grid(vec![vec![1.0], vec![2.0], vec![3.0]])]),
            Some((3, 2))
        );
    }

    #[test]
    fn test_scalar_repeats() {
        let result = apply(&[grid(vec![vec![1.0, 2.0]]), FormulaValue::Number(10.0)], add);
        assert_eq!(result, grid(vec![vec![11.0, 12.0]]));
    }

    #[test]
    fn test_row_and_column_expand() {
        let row = grid(vec![vec![1.0, 2.0]]);
        let col = grid(vec![vec![10.0], vec![20.0]]);
        assert_eq!(
            apply(&[row, col], add),
            grid(vec![vec![11.0, 12.0], vec![21.0, 22.0]])
        );
    }

    #[test]
    fn test_mismatched_axes_give_na() {
        let a = grid(vec![vec![1.0, 2.0, 3.0]]);
        let b = grid(vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        let FormulaValue::Array(out) = apply(&[a, b], add) else {
            panic!("expected a grid");
        };
        assert_eq!(out.shape(), (2, 3));
        assert_eq!(out.get(0, 0), Some(&FormulaValue::Number(2.0)));
        assert_eq!(out.get(0, 2), Some(&FormulaValue::Error(CellError::Na)));
    }

    #[test]
    fn test_map_scalar_and_grid() {
        let double = |v: &FormulaValue| FormulaValue::Number(v.as_number().unwrap_or(0.0) * 2.0);
        assert_eq!(map(&FormulaValue::Number(2.0), double), FormulaValue::Number(4.0));
        assert_eq!(map(&grid(vec![vec![1.0], vec![3.0]]), double), grid(vec![vec![2.0], vec![6.0]]));
    }

    proptest! {
        #[test]
        fn prop_apply_matches_elementwise(
            values in prop::collection::vec(-1e6f64..1e6, 1..12),
            scalar in -1e6f64..1e6,
        ) {
            let input = FormulaValue::Array(Grid::row(values.iter().copied().map(FormulaValue::Number).collect()).unwrap());
            let out = apply(&[input, FormulaValue::Number(scalar)], add);
            let FormulaValue::Array(out) = out else { panic!("expected a grid") };
            prop_assert_eq!(out.shape(), (1, values.len()));
            for (i, v) in values.iter().enumerate() {
                let expected = add(&[FormulaValue::Number(*v), FormulaValue::Number(scalar)]);
                prop_assert_eq!(out.get(0, i), Some(&expected));
            }
        }
    }
}
