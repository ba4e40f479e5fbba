//! Tests for formula evaluation against a workbook

use cellcalc::prelude::*;
use cellcalc::evaluate_formula;
use pretty_assertions::assert_eq;

fn number(n: f64) -> FormulaValue {
    FormulaValue::Number(n)
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    assert_eq!(evaluate_formula("=1+2*3").unwrap(), number(7.0));
    assert_eq!(
        evaluate_formula("=\"Hello \"&\"World\"").unwrap(),
        FormulaValue::from("Hello World")
    );
    assert_eq!(evaluate_formula("=5>3").unwrap(), FormulaValue::Boolean(true));
    assert_eq!(evaluate_formula("=50%*4").unwrap(), number(2.0));
    assert_eq!(evaluate_formula("=-2^2").unwrap(), number(4.0));
}

/// Test formula evaluation with cell references
#[test]
fn test_evaluate_with_cell_references() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_value(0, "A1", 10.0).unwrap();
    ss.set_cell_value(0, "A2", 20.0).unwrap();
    ss.set_cell_value(0, "A3", 30.0).unwrap();
    ss.set_cell_value(0, "B1", 5.0).unwrap();

    assert_eq!(ss.evaluate(0, "=A1").unwrap(), number(10.0));
    assert_eq!(ss.evaluate(0, "=A1+B1").unwrap(), number(15.0));
    assert_eq!(ss.evaluate(0, "=A1>B1").unwrap(), FormulaValue::Boolean(true));
    assert_eq!(ss.evaluate(0, "=$A$1*Sheet1!B1").unwrap(), number(50.0));
}

/// Test formula evaluation with range references
#[test]
fn test_evaluate_with_range_references() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_value(0, "A1", 10.0).unwrap();
    ss.set_cell_value(0, "A2", 20.0).unwrap();
    ss.set_cell_value(0, "A3", 30.0).unwrap();

    assert_eq!(ss.evaluate(0, "=SUM(A1:A3)").unwrap(), number(60.0));
    assert_eq!(ss.evaluate(0, "=AVERAGE(A1:A3)").unwrap(), number(20.0));
    assert_eq!(ss.evaluate(0, "=MIN(A1:A3)").unwrap(), number(10.0));
    assert_eq!(ss.evaluate(0, "=MAX(A1:A3)").unwrap(), number(30.0));
    assert_eq!(ss.evaluate(0, "=COUNT(A1:A5)").unwrap(), number(3.0));
}

/// Test complex nested formulas
#[test]
fn test_evaluate_complex_formulas() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_value(0, "A1", 100.0).unwrap();
    ss.set_cell_value(0, "A2", 50.0).unwrap();
    ss.set_cell_value(0, "B1", 0.1).unwrap();

    assert_eq!(ss.evaluate(0, "=IF(A1>A2,A1*B1,A2*B1)").unwrap(), number(10.0));
    assert_eq!(ss.evaluate(0, "=SUM(A1,A2)*B1").unwrap(), number(15.0));
    assert_eq!(ss.evaluate(0, "=ROUND(A1/3,2)").unwrap(), number(33.33));
}

/// Test error propagation in formulas
#[test]
fn test_error_propagation() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_formula(0, "A1", "=1/0").unwrap();
    ss.set_cell_formula(0, "A2", "=A1+5").unwrap();
    ss.set_cell_formula(0, "A3", "=IFERROR(A2,-1)").unwrap();
    ss.set_cell_value(0, "A4", CellError::Na).unwrap();

    let div0 = FormulaValue::Error(CellError::Div0);
    assert_eq!(ss.calculated_value(0, "A1").unwrap(), div0);
    assert_eq!(ss.calculated_value(0, "A2").unwrap(), div0);
    assert_eq!(ss.calculated_value(0, "A3").unwrap(), number(-1.0));
    assert_eq!(ss.evaluate(0, "=ISNA(A4)").unwrap(), FormulaValue::Boolean(true));
    assert_eq!(ss.evaluate(0, "=SUM(A1:A3)").unwrap(), div0);
}

/// Test empty cell handling
#[test]
fn test_empty_cell_handling() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_value(0, "A1", 10.0).unwrap();
    ss.set_cell_value(0, "A3", 30.0).unwrap();

    assert_eq!(ss.evaluate(0, "=A1+A2").unwrap(), number(10.0));
    assert_eq!(ss.evaluate(0, "=SUM(A1:A3)").unwrap(), number(40.0));
    assert_eq!(ss.evaluate(0, "=A2&\"x\"").unwrap(), FormulaValue::from("x"));
    assert_eq!(ss.evaluate(0, "=COUNTBLANK(A1:A3)").unwrap(), number(1.0));
}

/// Test string operations
#[test]
fn test_string_operations() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_value(0, "A1", "Hello").unwrap();
    ss.set_cell_value(0, "B1", "World").unwrap();

    assert_eq!(ss.evaluate(0, "=A1&\" \"&B1").unwrap(), FormulaValue::from("Hello World"));
    assert_eq!(ss.evaluate(0, "=UPPER(LEFT(B1,3))").unwrap(), FormulaValue::from("WOR"));
    assert_eq!(ss.evaluate(0, "=LEN(A1)").unwrap(), number(5.0));
}

/// Test boolean functions
#[test]
fn test_boolean_functions() {
    assert_eq!(evaluate_formula("=AND(TRUE,TRUE,TRUE)").unwrap(), FormulaValue::Boolean(true));
    assert_eq!(evaluate_formula("=AND(TRUE,FALSE,TRUE)").unwrap(), FormulaValue::Boolean(false));
    assert_eq!(evaluate_formula("=OR(FALSE,FALSE,TRUE)").unwrap(), FormulaValue::Boolean(true));
    assert_eq!(evaluate_formula("=NOT(FALSE)").unwrap(), FormulaValue::Boolean(true));
    assert_eq!(
        evaluate_formula("=AND(NOT(FALSE),OR(TRUE,FALSE))").unwrap(),
        FormulaValue::Boolean(true)
    );
}

/// Test conditional aggregates over worksheet ranges
#[test]
fn test_conditional_aggregates() {
    let mut ss = Spreadsheet::new();
    let rows = [("apple", 10.0), ("pear", 20.0), ("apple", 30.0), ("plum", 40.0)];
    for (i, (fruit, qty)) in rows.iter().enumerate() {
        ss.set_cell_value(0, &format!("A{}", i + 1), *fruit).unwrap();
        ss.set_cell_value(0, &format!("B{}", i + 1), *qty).unwrap();
    }

    assert_eq!(ss.evaluate(0, "=COUNTIF(A1:A4,\"apple\")").unwrap(), number(2.0));
    assert_eq!(ss.evaluate(0, "=SUMIF(A1:A4,\"p*\",B1:B4)").unwrap(), number(60.0));
    assert_eq!(ss.evaluate(0, "=AVERAGEIFS(B1:B4,A1:A4,\"apple\")").unwrap(), number(20.0));
    assert_eq!(
        ss.evaluate(0, "=SUMIFS(B1:B4,A1:A4,\"<>apple\",B1:B4,\">25\")").unwrap(),
        number(40.0)
    );
    assert_eq!(ss.evaluate(0, "=MAXIFS(B1:B4,A1:A4,\"APPLE\")").unwrap(), number(30.0));
}

/// Test element-wise broadcasting through worksheet ranges
#[test]
fn test_broadcast_over_ranges() {
    let mut ss = Spreadsheet::new();
    ss.set_cell_value(0, "A1", 1.0).unwrap();
    ss.set_cell_value(0, "A2", 4.0).unwrap();
    ss.set_cell_formula(0, "B1", "=SQRT(A1:A2)*10").unwrap();

    let expected = Grid::from_rows(vec![vec![number(10.0)], vec![number(20.0)]]).unwrap();
    assert_eq!(ss.calculated_value(0, "B1").unwrap(), FormulaValue::Array(expected));
    assert_eq!(ss.evaluate(0, "=B1+1").unwrap(), number(11.0));
}
