//! Writers with the fixed interchange headers, as CSV or as a one-sheet
//! XLSX workbook.

use ppto_core::{
  aggregate::{Scope, select_class},
  catalog::BudgetLine,
  operation::{Classifier, Operation},
};
use rust_xlsxwriter::{Format as CellFormat, Workbook};

use crate::{Dataset, Error, Format, Result, import::is_thousands_grouped};

pub(crate) const OPERATION_HEADERS: [&str; 5] =
  ["Ejercicio", "CentroGestor", "Partida", "Importe", "Descripcion"];

pub(crate) const BUDGET_LINE_HEADERS: [&str; 4] =
  ["Ejercicio", "CentroGestor", "Codigo", "Descripcion"];

/// One output cell. Years and amounts stay numeric in XLSX.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field<'a> {
  Int(i32),
  Amount(f64),
  Text(&'a str),
}

fn operation_row(op: &Operation) -> [Field<'_>; 5] {
  [
    Field::Int(op.ejercicio),
    Field::Text(&op.centro_gestor),
    Field::Text(&op.partida_economico),
    Field::Amount(op.importe_total.abs()),
    Field::Text(op.descripcion.as_deref().unwrap_or_default()),
  ]
}

fn budget_line_row(line: &BudgetLine) -> [Field<'_>; 4] {
  [
    Field::Int(line.ejercicio),
    Field::Text(&line.centro_gestor),
    Field::Text(&line.codigo),
    Field::Text(&line.descripcion),
  ]
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

fn write_csv<'a, const N: usize, R>(headers: [&str; N], rows: R) -> Result<Vec<u8>>
where
  R: IntoIterator<Item = [Field<'a>; N]>,
{
  let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
  writer.write_record(headers)?;
  for row in rows {
    writer.write_record(row.iter().map(|field| match *field {
      Field::Int(n) => n.to_string(),
      Field::Amount(x) => format_amount(x),
      Field::Text(s) => s.to_owned(),
    }))?;
  }
  writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// `.`-decimal text for an amount. Values that would read as Spanish
/// thousands (`1.125`) get a trailing zero so they import unchanged.
fn format_amount(x: f64) -> String {
  let mut s = x.to_string();
  if is_thousands_grouped(&s) {
    s.push('0');
  }
  s
}

/// Write `ops` as a CSV document. Amounts are written as magnitudes with a
/// `.` decimal separator; a missing description is an empty cell.
pub fn write_operations<'a, I>(ops: I) -> Result<Vec<u8>>
where
  I: IntoIterator<Item = &'a Operation>,
{
  write_csv(OPERATION_HEADERS, ops.into_iter().map(operation_row))
}

pub fn write_budget_lines<'a, I>(lines: I) -> Result<Vec<u8>>
where
  I: IntoIterator<Item = &'a BudgetLine>,
{
  write_csv(BUDGET_LINE_HEADERS, lines.into_iter().map(budget_line_row))
}

// ─── XLSX ────────────────────────────────────────────────────────────────────

fn write_xlsx<'a, const N: usize, R>(
  sheet_name: &str,
  headers: [&str; N],
  rows: R,
) -> Result<Vec<u8>>
where
  R: IntoIterator<Item = [Field<'a>; N]>,
{
  let mut workbook = Workbook::new();
  let bold = CellFormat::new().set_bold();
  let sheet = workbook.add_worksheet();
  sheet.set_name(sheet_name)?;

  for (col, header) in (0u16..).zip(headers) {
    sheet.write_string_with_format(0, col, header, &bold)?;
  }
  for (row, fields) in (1u32..).zip(rows) {
    for (col, field) in (0u16..).zip(fields) {
      match field {
        Field::Int(n) => sheet.write_number(row, col, f64::from(n))?,
        Field::Amount(x) => sheet.write_number(row, col, x)?,
        Field::Text(s) => sheet.write_string(row, col, s)?,
      };
    }
  }

  Ok(workbook.save_to_buffer()?)
}

/// Write `ops` as a workbook with a single sheet named `sheet_name`.
pub fn write_operations_xlsx<'a, I>(sheet_name: &str, ops: I) -> Result<Vec<u8>>
where
  I: IntoIterator<Item = &'a Operation>,
{
  write_xlsx(sheet_name, OPERATION_HEADERS, ops.into_iter().map(operation_row))
}

pub fn write_budget_lines_xlsx<'a, I>(sheet_name: &str, lines: I) -> Result<Vec<u8>>
where
  I: IntoIterator<Item = &'a BudgetLine>,
{
  write_xlsx(sheet_name, BUDGET_LINE_HEADERS, lines.into_iter().map(budget_line_row))
}

// ─── Dataset export ──────────────────────────────────────────────────────────

/// Write one dataset of `scope` in `format`. Class-bound datasets keep only
/// the in-scope operations of their class.
pub fn export(
  dataset: Dataset,
  format: Format,
  scope: &Scope,
  ops: &[Operation],
  lines: &[BudgetLine],
  classifier: &Classifier,
) -> Result<Vec<u8>> {
  if dataset.is_budget_lines() {
    let lines = lines
      .iter()
      .filter(|l| l.ejercicio == scope.ejercicio && l.centro_gestor == scope.centro_gestor);
    return match format {
      Format::Csv => write_budget_lines(lines),
      Format::Xlsx => write_budget_lines_xlsx(dataset.sheet_name(), lines),
    };
  }

  let selected: Vec<&Operation> = match dataset.class() {
    Some(class) => select_class(ops, scope, classifier, class).collect(),
    None => scope.select(ops).collect(),
  };
  match format {
    Format::Csv => write_operations(selected),
    Format::Xlsx => write_operations_xlsx(dataset.sheet_name(), selected),
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use calamine::{Data, Reader, open_workbook_auto_from_rs};

  use super::*;

  #[test]
  fn operations_have_fixed_headers() {
    let mut op = Operation::new(2026, "023", "22002", "AD", 300.0);
    op.descripcion = None;
    let out = String::from_utf8(write_operations([&op]).unwrap()).unwrap();
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("Ejercicio,CentroGestor,Partida,Importe,Descripcion"));
    assert_eq!(lines.next(), Some("2026,023,22002,300,"));
    assert_eq!(lines.next(), None);
  }

  #[test]
  fn class_datasets_filter_by_tag_and_scope() {
    let ops = vec![
      Operation::new(2026, "023", "22002", "PPTO2026", 1_000.0),
      Operation::new(2026, "023", "22002", "Previsión", 200.0),
      Operation::new(2026, "023", "22002", "Previsión-I", 50.0),
      Operation::new(2026, "023", "22002", "RC", 10.0),
      Operation::new(2026, "081", "22002", "PPTO2026", 9.0),
      Operation::new(2025, "023", "22002", "Previsión", 9.0),
    ];
    let c = Classifier::default();
    let scope = Scope::new(2026, "023");

    let rows = |d| {
      String::from_utf8(export(d, Format::Csv, &scope, &ops, &[], &c).unwrap())
        .unwrap()
        .lines()
        .count()
        - 1
    };
    assert_eq!(rows(Dataset::Presupuesto), 1);
    assert_eq!(rows(Dataset::Prevision), 2);
    assert_eq!(rows(Dataset::Ejecutado), 0);
    assert_eq!(rows(Dataset::Operaciones), 4);
    assert_eq!(rows(Dataset::Partidas), 0);
  }

  #[test]
  fn amounts_never_read_as_thousands() {
    assert_eq!(format_amount(1.125), "1.1250");
    assert_eq!(format_amount(-999.5), "-999.5");
    assert_eq!(format_amount(1500.0), "1500");
    assert_eq!(format_amount(0.125), "0.125");
  }

  #[test]
  fn budget_lines_have_fixed_headers() {
    let line = BudgetLine::new(2026, "711", "62600", "Sensores");
    let out = String::from_utf8(write_budget_lines([&line]).unwrap()).unwrap();
    assert_eq!(out, "Ejercicio,CentroGestor,Codigo,Descripcion\n2026,711,62600,Sensores\n");
  }

  #[test]
  fn xlsx_export_has_a_named_sheet() {
    let ops = vec![
      Operation::new(2026, "023", "22002", "PPTO2026", 1_500.0),
      Operation::new(2026, "023", "22002", "AD", 300.0),
    ];
    let scope = Scope::new(2026, "023");
    let body = export(
      Dataset::Presupuesto,
      Format::Xlsx,
      &scope,
      &ops,
      &[],
      &Classifier::default(),
    )
    .unwrap();
    assert!(body.starts_with(b"PK\x03\x04"));

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(body)).unwrap();
    assert_eq!(workbook.sheet_names(), ["Presupuesto"]);
    let range = workbook.worksheet_range("Presupuesto").unwrap();
    let rows: Vec<_> = range.rows().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], Data::String("Ejercicio".into()));
    assert_eq!(rows[1][0], Data::Float(2026.0));
    assert_eq!(rows[1][2], Data::String("22002".into()));
    assert_eq!(rows[1][3], Data::Float(1_500.0));
  }
}
