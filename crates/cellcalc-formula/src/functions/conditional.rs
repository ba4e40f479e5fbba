//! Conditional aggregation: COUNTIF(S), SUMIF(S), AVERAGEIF(S), MAXIFS, MINIFS
//!
//! None of these broadcast. Every range argument is flattened row-major
//! into a column of a [`PseudoTable`] and the criteria select its rows.

use cellcalc_core::CellError;

use super::args::arg;
use super::criteria::Criterion;
use super::{FunctionContext, FunctionRegistry};
use crate::query::{conditional_column, Aggregate, PseudoTable, CONDITION, VALUE};
use crate::value::FormulaValue;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add("COUNTIF", 2, Some(2), fn_countif);
    registry.add("COUNTIFS", 0, None, fn_countifs);
    registry.add("SUMIF", 2, Some(3), fn_sumif);
    registry.add("SUMIFS", 0, None, fn_sumifs);
    registry.add("AVERAGEIF", 2, Some(3), fn_averageif);
    registry.add("AVERAGEIFS", 0, None, fn_averageifs);
    registry.add("MAXIFS", 0, None, fn_maxifs);
    registry.add("MINIFS", 0, None, fn_minifs);
}

/// One-criterion query: `range` is tested, `values` (or `range` itself when
/// blank) is folded
fn single(range: &FormulaValue, criterion: &FormulaValue, values: &FormulaValue, aggregate: Aggregate) -> FormulaValue {
    let values = if values.is_empty() { range } else { values };
    let table = PseudoTable::new()
        .with_column(CONDITION, range.flatten())
        .with_column(VALUE, values.flatten());
    let rows = table.filter(&[(CONDITION, Criterion::parse(criterion))]);
    table.aggregate(VALUE, &rows, aggregate)
}

/// Multi-criteria query over `(range, criterion)` pairs
fn multiple(values: Option<&FormulaValue>, pairs: &[FormulaValue], aggregate: Aggregate) -> FormulaValue {
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return FormulaValue::Error(CellError::Value);
    }

    let mut table = PseudoTable::new();
    let mut names = Vec::with_capacity(pairs.len() / 2);
    for (i, pair) in pairs.chunks(2).enumerate() {
        let name = conditional_column(i + 1);
        table = table.with_column(name.clone(), pair[0].flatten());
        names.push((name, Criterion::parse(&pair[1])));
    }
    if let Some(values) = values {
        table = table.with_column(VALUE, values.flatten());
    }

    let criteria: Vec<(&str, Criterion)> = names
        .iter()
        .map(|(name, criterion)| (name.as_str(), criterion.clone()))
        .collect();
    let rows = table.filter(&criteria);
    table.aggregate(VALUE, &rows, aggregate)
}

/// COUNTIF(range, criterion)
pub fn fn_countif(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    single(arg(args, 0), arg(args, 1), arg(args, 0), Aggregate::Count)
}

/// COUNTIFS(range1, criterion1, ...) - no arguments counts 0
pub fn fn_countifs(args: &[FormulaValue], ctx: &FunctionContext) -> FormulaValue {
    match args.len() {
        0 => FormulaValue::Number(0.0),
        2 => fn_countif(args, ctx),
        _ => multiple(None, args, Aggregate::Count),
    }
}

/// SUMIF(range, criterion, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    single(arg(args, 0), arg(args, 1), arg(args, 2), Aggregate::Sum)
}

/// SUMIFS(sum_range, range1, criterion1, ...)
pub fn fn_sumifs(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    match args.len() {
        0 => FormulaValue::Number(0.0),
        3 => single(&args[1], &args[2], &args[0], Aggregate::Sum),
        _ => multiple(Some(&args[0]), &args[1..], Aggregate::Sum),
    }
}

/// AVERAGEIF(range, criterion, [average_range])
pub fn fn_averageif(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    single(arg(args, 0), arg(args, 1), arg(args, 2), Aggregate::Average)
}

/// AVERAGEIFS(average_range, range1, criterion1, ...)
pub fn fn_averageifs(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    match args.len() {
        0 => FormulaValue::Number(0.0),
        3 => single(&args[1], &args[2], &args[0], Aggregate::Average),
        _ => multiple(Some(&args[0]), &args[1..], Aggregate::Average),
    }
}

/// MAXIFS(max_range, range1, criterion1, ...) - 0 when nothing matches
pub fn fn_maxifs(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    match args.split_first() {
        None => FormulaValue::Number(0.0),
        Some((values, pairs)) => multiple(Some(values), pairs, Aggregate::Max),
    }
}

/// MINIFS(min_range, range1, criterion1, ...) - 0 when nothing matches
pub fn fn_minifs(args: &[FormulaValue], _ctx: &FunctionContext) -> FormulaValue {
    match args.split_first() {
        None => FormulaValue::Number(0.0),
        Some((values, pairs)) => multiple(Some(values), pairs, Aggregate::Min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::evaluator::evaluate_formula;
    use crate::value::Grid;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaValue {
        evaluate_formula(formula).unwrap()
    }

    const FRUIT: &str = "{\"apple\";\"pear\";\"apple\";\"plum\"}";
    const QTY: &str = "{10;20;30;40}";

    #[test]
    fn test_countif() {
        assert_eq!(eval("=COUNTIF({1,2,3,4},\">2\")"), FormulaValue::Number(2.0));
        assert_eq!(eval(&format!("=COUNTIF({},\"apple\")", FRUIT)), FormulaValue::Number(2.0));
        assert_eq!(eval(&format!("=COUNTIF({},\"p*\")", FRUIT)), FormulaValue::Number(2.0));
        assert_eq!(eval("=COUNTIF(A1:A4,\"\")"), FormulaValue::Number(4.0));
        assert_eq!(eval("=COUNTIF({1,#N/A,#N/A},#N/A)"), FormulaValue::Number(2.0));
    }

    /// Blank cells and empty text both match a blank criterion; 0 does not
    #[test]
    fn test_blank_criteria_on_mixed_range() {
        let config = EngineConfig::default();
        let ctx = FunctionContext::new(&config);
        let range = FormulaValue::Array(
            Grid::from_rows(vec![vec![
                FormulaValue::Empty,
                FormulaValue::from(""),
                FormulaValue::Number(0.0),
                FormulaValue::from("x"),
                FormulaValue::Empty,
            ]])
            .unwrap(),
        );
        let count = |criterion: FormulaValue| fn_countif(&[range.clone(), criterion], &ctx);

        assert_eq!(count(FormulaValue::from("")), FormulaValue::Number(3.0));
        assert_eq!(count(FormulaValue::from("=")), FormulaValue::Number(3.0));
        assert_eq!(count(FormulaValue::Empty), FormulaValue::Number(3.0));
        assert_eq!(count(FormulaValue::from("<>")), FormulaValue::Number(2.0));
        assert_eq!(count(FormulaValue::Number(0.0)), FormulaValue::Number(1.0));
        assert_eq!(count(FormulaValue::from("*")), FormulaValue::Number(2.0));

        let ones = FormulaValue::Array(Grid::row(vec![FormulaValue::Number(1.0); 5]).unwrap());
        assert_eq!(
            fn_sumifs(&[ones, range.clone(), FormulaValue::from("")], &ctx),
            FormulaValue::Number(3.0)
        );
    }

    #[test]
    fn test_countifs() {
        assert_eq!(eval("=COUNTIFS()"), FormulaValue::Number(0.0));
        assert_eq!(eval("=COUNTIFS({1,2,3},\">1\")"), eval("=COUNTIF({1,2,3},\">1\")"));
        assert_eq!(
            eval(&format!("=COUNTIFS({},\"p*\",{},\">25\")", FRUIT, QTY)),
            FormulaValue::Number(1.0)
        );
        assert_eq!(eval("=COUNTIFS({1,2},\">1\",{1,2})"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_sumif() {
        assert_eq!(eval(&format!("=SUMIF({},\"apple\",{})", FRUIT, QTY)), FormulaValue::Number(40.0));
        assert_eq!(eval("=SUMIF({1,5,10},\">2\")"), FormulaValue::Number(15.0));
        assert_eq!(
            eval(&format!("=SUMIFS({},{},\"apple\")", QTY, FRUIT)),
            eval(&format!("=SUMIF({},\"apple\",{})", FRUIT, QTY))
        );
        assert_eq!(
            eval(&format!("=SUMIFS({},{},\"<>apple\",{},\"<40\")", QTY, FRUIT, QTY)),
            FormulaValue::Number(20.0)
        );
        assert_eq!(eval("=SUMIFS()"), FormulaValue::Number(0.0));
    }

    #[test]
    fn test_averageif() {
        assert_eq!(eval(&format!("=AVERAGEIF({},\"apple\",{})", FRUIT, QTY)), FormulaValue::Number(20.0));
        assert_eq!(eval("=AVERAGEIF({1,2,3},\">5\")"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=AVERAGEIFS()"), FormulaValue::Number(0.0));
        assert_eq!(
            eval(&format!("=AVERAGEIFS({},{},\"p*\")", QTY, FRUIT)),
            eval(&format!("=AVERAGEIF({},\"p*\",{})", FRUIT, QTY))
        );
        assert_eq!(
            eval("=AVERAGEIF({1,2,3},\">0\",{4,#DIV/0!,6})"),
            FormulaValue::Error(CellError::Div0)
        );
        assert_eq!(eval("=AVERAGEIF({1,2,3},\">1\",{4,\"x\",6})"), FormulaValue::Number(6.0));
    }

    #[test]
    fn test_maxifs_minifs() {
        assert_eq!(eval(&format!("=MAXIFS({},{},\"apple\")", QTY, FRUIT)), FormulaValue::Number(30.0));
        assert_eq!(eval(&format!("=MINIFS({},{},\"p*\")", QTY, FRUIT)), FormulaValue::Number(20.0));
        assert_eq!(eval(&format!("=MAXIFS({},{},\"kiwi\")", QTY, FRUIT)), FormulaValue::Number(0.0));
        assert_eq!(eval("=MAXIFS()"), FormulaValue::Number(0.0));
        assert_eq!(eval("=MINIFS({1,2},{1,2})"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_unequal_ranges_are_padded() {
        assert_eq!(eval("=SUMIF({1,1,1},1,{5,6})"), FormulaValue::Number(11.0));
        assert_eq!(eval("=COUNTIFS({1,1,1},1,{1},\"\")"), FormulaValue::Number(2.0));
    }
}
