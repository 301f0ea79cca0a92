//! Tests for formula evaluation through the workbook extension trait

use chrono::NaiveDate;
use sheetcalc::prelude::*;
use sheetcalc::{DataType, EvaluationStats, FormulaError, RangeAddress};

fn eval(wb: &Workbook, formula: &str) -> CompileResult {
    wb.evaluate_formula("Sheet1", formula).unwrap()
}

fn serial(year: i32, month: u32, day: u32) -> f64 {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
    (date - base).num_days() as f64
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    let wb = Workbook::new();

    // Arithmetic
    assert_eq!(eval(&wb, "=1+2*3").value, Value::Number(7.0));
    assert_eq!(eval(&wb, "=2^3^2").value, Value::Number(512.0));
    assert_eq!(eval(&wb, "=-2^2").value, Value::Number(4.0));

    // String concatenation
    assert_eq!(
        eval(&wb, "=\"Hello \"&\"World\"").value,
        Value::String("Hello World".into())
    );

    // Comparison
    assert_eq!(eval(&wb, "=5>3"), CompileResult::boolean(true));
    assert_eq!(eval(&wb, "=\"abc\"=\"ABC\""), CompileResult::boolean(true));
}

/// Test formula evaluation with cell references
#[test]
fn test_evaluate_with_cell_references() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();
    sheet.set_cell_value("B1", 5.0).unwrap();

    assert_eq!(eval(&wb, "=A1").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=A1+B1").value, Value::Number(15.0));
    assert_eq!(eval(&wb, "=A1>B1"), CompileResult::boolean(true));
    assert_eq!(eval(&wb, "=$A$2*2").value, Value::Number(40.0));

    // A multi-cell range at the top level stays a reference
    let range = eval(&wb, "=A1:A3");
    assert_eq!(range.data_type, DataType::ExcelAddress);
    assert_eq!(range.value, Value::Range(RangeAddress::parse("Sheet1!A1:A3").unwrap()));
    // and is #VALUE! when used as a scalar
    assert_eq!(eval(&wb, "=A1:A3+1"), CompileResult::error(ExcelError::Value));
}

/// Test aggregate functions over ranges
#[test]
fn test_evaluate_with_range_references() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();
    sheet.set_cell_value("A4", "n/a").unwrap();

    assert_eq!(eval(&wb, "=SUM(A1:A4)").value, Value::Number(60.0));
    assert_eq!(eval(&wb, "=SUM(A:A)").value, Value::Number(60.0));
    assert_eq!(eval(&wb, "=AVERAGE(A1:A3)").value, Value::Number(20.0));
    assert_eq!(eval(&wb, "=MIN(A1:A3)").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=MAX(A1:A3)").value, Value::Number(30.0));
    assert_eq!(eval(&wb, "=COUNT(A1:A4)").value, Value::Number(3.0));
    assert_eq!(eval(&wb, "=COUNTA(A1:A4)").value, Value::Number(4.0));
    assert_eq!(eval(&wb, "=COUNTBLANK(A1:B4)").value, Value::Number(4.0));
    assert_eq!(eval(&wb, "=LARGE(A1:A3,1)").value, Value::Number(30.0));
    assert_eq!(eval(&wb, "=LARGE(A1:A3,4)"), CompileResult::error(ExcelError::Num));
}

/// Test complex nested formulas
#[test]
fn test_evaluate_complex_formulas() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 100.0).unwrap();
    sheet.set_cell_value("A2", 50.0).unwrap();
    sheet.set_cell_value("B1", 0.1).unwrap();

    // IF A1 > A2, 10% of A1, else 10% of A2
    assert_eq!(eval(&wb, "=IF(A1>A2,A1*B1,A2*B1)").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=SUM(A1,A2)*B1").value, Value::Number(15.0));
    assert_eq!(eval(&wb, "=ROUND(A2/3,2)").value, Value::Number(16.67));
    assert_eq!(eval(&wb, "=(A1+A2)%").value, Value::Number(1.5));
    assert_eq!(
        eval(&wb, "=IF(AND(A1>0,NOT(A2>A1)),\"ok\",\"bad\")"),
        CompileResult::string("ok")
    );
}

/// Test error propagation in formulas
#[test]
fn test_error_propagation() {
    let wb = Workbook::new();

    assert_eq!(eval(&wb, "=1/0"), CompileResult::error(ExcelError::Div0));
    assert_eq!(eval(&wb, "=1/0+5"), CompileResult::error(ExcelError::Div0));
    assert_eq!(eval(&wb, "=#N/A&\"x\""), CompileResult::error(ExcelError::NA));
    assert_eq!(eval(&wb, "=IFERROR(1/0,-1)").value, Value::Number(-1.0));
    assert_eq!(eval(&wb, "=Nowhere!A1"), CompileResult::error(ExcelError::Ref));
    assert_eq!(eval(&wb, "=UndefinedName"), CompileResult::error(ExcelError::Name));
    assert_eq!(eval(&wb, "=1+(2"), CompileResult::error(ExcelError::Value));

    assert!(matches!(
        wb.evaluate_formula("Sheet1", "=NOSUCHFUNCTION(1)"),
        Err(sheetcalc::Error::Formula(FormulaError::UnknownFunction(_)))
    ));
}

/// Test empty cell handling
#[test]
fn test_empty_cell_handling() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();

    // Empty cells are 0 in arithmetic
    assert_eq!(eval(&wb, "=A1+A2").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=A2&\"x\""), CompileResult::string("x"));
    assert_eq!(eval(&wb, "=SUM(A1:A3)").value, Value::Number(40.0));
    assert_eq!(eval(&wb, "=A2"), CompileResult::empty());
}

/// Test string operations
#[test]
fn test_string_operations() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", "Hello").unwrap();
    sheet.set_cell_value("B1", "World").unwrap();

    assert_eq!(eval(&wb, "=A1&\" \"&B1"), CompileResult::string("Hello World"));
    assert_eq!(eval(&wb, "=UPPER(LEFT(B1,3))"), CompileResult::string("WOR"));
    assert_eq!(eval(&wb, "=LEN(A1&B1)").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=TEXT(0.125,\"0.0%\")"), CompileResult::string("12.5%"));
}

/// Test conditional aggregation
#[test]
fn test_conditional_aggregation() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    let rows = [("east", 10.0), ("west", 20.0), ("east", 30.0), ("north", 40.0)];
    for (i, (region, amount)) in rows.iter().enumerate() {
        let row = i + 1;
        sheet.set_cell_value(&format!("A{row}"), *region).unwrap();
        sheet.set_cell_value(&format!("B{row}"), *amount).unwrap();
    }

    assert_eq!(eval(&wb, "=SUMIF(A1:A4,\"east\",B1:B4)").value, Value::Number(40.0));
    assert_eq!(eval(&wb, "=COUNTIF(B1:B4,\">15\")").value, Value::Number(3.0));
    assert_eq!(
        eval(&wb, "=SUMIFS(B1:B4,A1:A4,\"<>west\",B1:B4,\">=20\")").value,
        Value::Number(70.0)
    );
    assert_eq!(eval(&wb, "=AVERAGEIF(A1:A4,\"e*\",B1:B4)").value, Value::Number(20.0));
    assert_eq!(eval(&wb, "=COUNTIFS(A1:A4,\"east\",B1:B4,\">10\")").value, Value::Number(1.0));
}

/// Test date functions against serial numbers
#[test]
fn test_date_functions() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", serial(2021, 1, 31)).unwrap();
    sheet.set_cell_value("A2", serial(2021, 2, 28)).unwrap();

    assert_eq!(eval(&wb, "=DATE(2021,1,1)").value, Value::Number(serial(2021, 1, 1)));
    assert_eq!(eval(&wb, "=DAYS360(A1,A2)").value, Value::Number(28.0));
    assert_eq!(
        eval(&wb, "=WORKDAY(DATE(2021,1,1),1)").value,
        Value::Number(serial(2021, 1, 4))
    );
    assert_eq!(eval(&wb, "=YEAR(A2)&\"-\"&MONTH(A2)"), CompileResult::string("2021-2"));
    assert_eq!(
        eval(&wb, "=NETWORKDAYS(DATE(2021,1,1),DATE(2021,1,31))").value,
        Value::Number(21.0)
    );
    assert_eq!(
        eval(&wb, "=EOMONTH(DATE(2021,1,15),1)").value,
        Value::Number(serial(2021, 2, 28))
    );
}

/// Test lookups combined with references
#[test]
fn test_lookup_functions() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for (i, name) in ["alpha", "beta", "gamma"].iter().enumerate() {
        let row = i + 1;
        sheet.set_cell_value(&format!("A{row}"), *name).unwrap();
        sheet.set_cell_value(&format!("B{row}"), (row * 100) as f64).unwrap();
    }

    assert_eq!(
        eval(&wb, "=INDEX(B1:B3,MATCH(\"beta\",A1:A3,0))").value,
        Value::Number(200.0)
    );
    assert_eq!(eval(&wb, "=SUM(OFFSET(B1,1,0,2,1))").value, Value::Number(500.0));
    assert_eq!(eval(&wb, "=INDIRECT(ADDRESS(3,2))").value, Value::Number(300.0));
    assert_eq!(eval(&wb, "=CHOOSE(2,A1,A2,A3)"), CompileResult::string("beta"));
    assert_eq!(eval(&wb, "=ROWS(A1:B3)*COLUMNS(A1:B3)").value, Value::Number(6.0));
}

/// Test defined names and cross-sheet references
#[test]
fn test_names_and_sheets() {
    let mut wb = Workbook::new();
    let index = wb.add_worksheet_with_name("Rates Table").unwrap();
    wb.worksheet_mut(index).unwrap().set_cell_value("A1", 0.2).unwrap();
    wb.worksheet_mut(0).unwrap().set_cell_value("A1", 50.0).unwrap();
    wb.define_name("TaxRate", "'Rates Table'!$A$1").unwrap();
    wb.define_name("Gross", "=Sheet1!A1*(1+TaxRate)").unwrap();

    assert_eq!(eval(&wb, "='Rates Table'!A1*A1").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=A1*TaxRate").value, Value::Number(10.0));
    assert_eq!(eval(&wb, "=Gross").value, Value::Number(60.0));
}

/// Test caching results into formula cells
#[test]
fn test_evaluate_cells_and_sheet() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 5.0).unwrap();
    sheet.set_cell_formula("A2", "=A1*2").unwrap();
    sheet.set_cell_formula("A3", "=A2+10").unwrap();
    sheet.set_cell_formula("A4", "=A3*A1").unwrap();
    sheet.set_cell_formula("A5", "=MATCH(99,A1:A4,0)").unwrap();

    let stats = wb.evaluate_sheet("Sheet1", &EvaluationOptions::default()).unwrap();
    assert_eq!(
        stats,
        EvaluationStats {
            formula_count: 4,
            cells_evaluated: 4,
            errors: 1,
        }
    );

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_calculated_value_at(1, 0), CellValue::Number(10.0));
    assert_eq!(sheet.get_calculated_value_at(2, 0), CellValue::Number(20.0));
    assert_eq!(sheet.get_calculated_value_at(3, 0), CellValue::Number(100.0));
    assert_eq!(
        sheet.get_calculated_value_at(4, 0),
        CellValue::Error(CellError::Na)
    );

    assert_eq!(wb.evaluate_cell("Sheet1", "A4").unwrap(), CellValue::Number(100.0));
}
