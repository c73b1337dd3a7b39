//! CSV / XLSX readers.
//!
//! Pipeline:
//!   body bytes
//!     └─ Table::read()          → header row + non-empty records
//!          └─ import_operations()   → Vec<Operation>
//!          └─ import_budget_lines() → Vec<BudgetLine>

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{Duration, NaiveDate};
use ppto_core::{catalog::BudgetLine, operation::Operation};

use crate::{Error, Format, ImportContext, Result};

// ─── Cells ───────────────────────────────────────────────────────────────────

/// A single sheet cell, reduced to what the importers care about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
  Empty,
  Text(String),
  Number(f64),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
  fn text(s: &str) -> Self {
    let s = s.trim();
    if s.is_empty() {
      Cell::Empty
    } else {
      Cell::Text(s.to_owned())
    }
  }

  /// Map a calamine cell. Excel date-times keep their serial value so the
  /// date reader can convert them.
  pub fn from_data(data: &Data) -> Self {
    match data {
      Data::Empty | Data::Error(_) => Cell::Empty,
      Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
      Data::Float(f) => Cell::Number(*f),
      Data::Int(i) => Cell::Number(*i as f64),
      Data::Bool(b) => Cell::Text(b.to_string()),
      Data::DateTime(dt) => Cell::Number(dt.as_f64()),
    }
  }

  pub fn is_empty(&self) -> bool { matches!(self, Cell::Empty) }

  /// The cell as text. Whole numbers lose their fractional part, so a code
  /// typed as `22002` in a spreadsheet reads back as `"22002"`.
  pub fn as_text(&self) -> Option<String> {
    match self {
      Cell::Empty => None,
      Cell::Text(s) => Some(s.clone()),
      Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
      Cell::Number(n) => Some(n.to_string()),
    }
  }
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// A data row together with its 1-based position in the source sheet.
#[derive(Debug, Clone)]
struct Record {
  row:   usize,
  cells: Vec<Cell>,
}

impl Record {
  fn cell(&self, col: Option<usize>) -> &Cell {
    col.and_then(|i| self.cells.get(i)).unwrap_or(&EMPTY)
  }

  fn text(&self, col: Option<usize>) -> Option<String> { self.cell(col).as_text() }

  /// Missing amounts count as zero.
  fn amount(&self, col: Option<usize>) -> Result<f64> {
    match self.cell(col) {
      Cell::Empty => Ok(0.0),
      Cell::Number(n) => Ok(*n),
      Cell::Text(s) => parse_amount(s).ok_or_else(|| Error::Parse {
        row:     self.row,
        message: format!("invalid amount {s:?}"),
      }),
    }
  }

  fn date(&self, col: Option<usize>) -> Result<Option<NaiveDate>> {
    let parsed = match self.cell(col) {
      Cell::Empty => return Ok(None),
      Cell::Number(n) => excel_serial_to_date(*n),
      Cell::Text(s) => parse_date(s),
    };
    parsed.map(Some).ok_or_else(|| Error::Parse {
      row:     self.row,
      message: format!("invalid date {:?}", self.cell(col).as_text().unwrap_or_default()),
    })
  }
}

/// A parsed sheet: the header row and every non-empty data row after it.
#[derive(Debug, Clone)]
pub struct Table {
  headers: Vec<String>,
  records: Vec<Record>,
}

impl Table {
  pub fn read(body: &[u8], format: Format) -> Result<Self> {
    match format {
      Format::Csv => Self::from_csv(body),
      Format::Xlsx => Self::from_xlsx(body),
    }
  }

  fn from_csv(body: &[u8]) -> Result<Self> {
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);

    // Spreadsheets exported with a Spanish locale separate fields with `;`.
    let first_line = body.split(|b| *b == b'\n').next().unwrap_or_default();
    let count = |sep: u8| first_line.iter().filter(|b| **b == sep).count();
    let delimiter = if count(b';') > count(b',') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
      .has_headers(false)
      .flexible(true)
      .delimiter(delimiter)
      .from_reader(body);

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
      let record = record?;
      rows.push((i + 1, record.iter().map(Cell::text).collect()));
    }
    Ok(Self::from_rows(rows))
  }

  fn from_xlsx(body: &[u8]) -> Result<Self> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(body.to_vec()))
      .map_err(|e| Error::Xlsx(e.to_string()))?;
    let range = workbook
      .worksheet_range_at(0)
      .ok_or(Error::EmptyWorkbook)?
      .map_err(|e| Error::Xlsx(e.to_string()))?;

    let first_row = range.start().map_or(0, |(r, _)| r as usize);
    let rows = range
      .rows()
      .enumerate()
      .map(|(i, cells)| (first_row + i + 1, cells.iter().map(Cell::from_data).collect()))
      .collect();
    Ok(Self::from_rows(rows))
  }

  /// The first non-empty row is the header; later empty rows are dropped.
  fn from_rows(rows: Vec<(usize, Vec<Cell>)>) -> Self {
    let mut rows = rows
      .into_iter()
      .filter(|(_, cells)| !cells.iter().all(Cell::is_empty));

    let headers = rows
      .next()
      .map(|(_, cells)| {
        cells
          .iter()
          .map(|c| c.as_text().unwrap_or_default())
          .collect()
      })
      .unwrap_or_default();
    let records = rows.map(|(row, cells)| Record { row, cells }).collect();

    Self { headers, records }
  }

  pub fn headers(&self) -> &[String] { &self.headers }

  /// Number of non-empty data rows.
  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  /// Index of the first header matching any of `names`, case-insensitively.
  pub fn column(&self, names: &[&str]) -> Option<usize> {
    self.headers.iter().position(|h| {
      let h = h.trim().to_lowercase();
      names.iter().any(|n| h == n.to_lowercase())
    })
  }
}

// ─── Importers ───────────────────────────────────────────────────────────────

const PARTIDA: &[&str] = &["partida_economico", "partida"];
const IMPORTE: &[&str] = &["importe_total", "importe"];
const DESCRIPCION: &[&str] = &["descripcion", "descripción"];
const FECHA: &[&str] = &["fecha"];
const CODIGO: &[&str] = &["codigo", "código"];

/// Build operations from `table`. Year, center and type come from `ctx`;
/// amounts are stored as magnitudes.
pub fn import_operations(table: &Table, ctx: &ImportContext) -> Result<Vec<Operation>> {
  let partida = table.column(PARTIDA);
  let importe = table.column(IMPORTE);
  let descripcion = table.column(DESCRIPCION);
  let fecha = table.column(FECHA);

  table
    .records
    .iter()
    .map(|rec| {
      let mut op = Operation::new(
        ctx.ejercicio,
        &ctx.centro_gestor,
        rec.text(partida).unwrap_or_default(),
        &ctx.tipo_operacion,
        rec.amount(importe)?.abs(),
      );
      op.descripcion = rec.text(descripcion);
      op.fecha = rec.date(fecha)?;
      Ok(op)
    })
    .collect()
}

/// Build budget lines from `table`. The code column accepts `codigo` or
/// `partida`; a row without a code is rejected.
pub fn import_budget_lines(
  table: &Table,
  ejercicio: i32,
  centro_gestor: &str,
) -> Result<Vec<BudgetLine>> {
  let codigo = table.column(CODIGO).or_else(|| table.column(PARTIDA));
  let descripcion = table.column(DESCRIPCION);

  table
    .records
    .iter()
    .map(|rec| {
      let code = rec.text(codigo).ok_or_else(|| Error::Parse {
        row:     rec.row,
        message: "missing codigo".to_owned(),
      })?;
      Ok(BudgetLine::new(
        ejercicio,
        centro_gestor,
        code,
        rec.text(descripcion).unwrap_or_default(),
      ))
    })
    .collect()
}

// ─── Value parsers ───────────────────────────────────────────────────────────

/// True for `1.500`-shaped values: one dot, a one-to-three digit integer part
/// without a leading zero, and exactly three digits after the dot. Spanish
/// sheets write thousands that way, so such a dot is a group separator.
pub(crate) fn is_thousands_grouped(s: &str) -> bool {
  let unsigned = s.strip_prefix('-').unwrap_or(s);
  let Some((int, frac)) = unsigned.split_once('.') else {
    return false;
  };
  (1..=3).contains(&int.len())
    && !int.starts_with('0')
    && int.bytes().all(|b| b.is_ascii_digit())
    && frac.len() == 3
    && frac.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an amount written with `.` decimals (`1234.56`) or in Spanish
/// notation (`1.234,56`, `1.500`). Currency signs and spaces are ignored.
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
  let s: String = raw
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '€')
    .collect();
  if s.is_empty() {
    return Some(0.0);
  }

  // The separator that appears last is the decimal one.
  let normalized = match (s.rfind(','), s.rfind('.')) {
    (Some(comma), Some(dot)) if dot > comma => s.replace(',', ""),
    (Some(_), _) => s.replace('.', "").replace(',', "."),
    (None, Some(_)) if s.matches('.').count() > 1 || is_thousands_grouped(&s) => {
      s.replace('.', "")
    }
    _ => s,
  };
  normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
  let s = raw.trim();
  ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
    .into_iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    .or_else(|| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

/// Convert an Excel serial day number to a date. The epoch is 1899-12-30,
/// which absorbs Excel's phantom 1900-02-29.
pub(crate) fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
  if !(1.0..=2_958_465.0).contains(&serial) {
    return None;
  }
  NaiveDate::from_ymd_opt(1899, 12, 30)?
    .checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ctx() -> ImportContext { ImportContext::new(2026, "023", "AD") }

  #[test]
  fn spanish_and_plain_amounts() {
    assert_eq!(parse_amount("1.234,56"), Some(1234.56));
    assert_eq!(parse_amount("1234.56"), Some(1234.56));
    assert_eq!(parse_amount("12,5"), Some(12.5));
    assert_eq!(parse_amount("1.234.567"), Some(1_234_567.0));
    assert_eq!(parse_amount("1.500"), Some(1_500.0));
    assert_eq!(parse_amount("-12.000"), Some(-12_000.0));
    assert_eq!(parse_amount("1.50"), Some(1.5));
    assert_eq!(parse_amount("0.125"), Some(0.125));
    assert_eq!(parse_amount("1.1250"), Some(1.125));
    assert_eq!(parse_amount("1500.000"), Some(1_500.0));
    assert_eq!(parse_amount("1,234.56"), Some(1234.56));
    assert_eq!(parse_amount("-300 €"), Some(-300.0));
    assert_eq!(parse_amount(""), Some(0.0));
    assert_eq!(parse_amount("doce"), None);
    assert_eq!(parse_amount("inf"), None);
  }

  #[test]
  fn serial_dates() {
    assert_eq!(excel_serial_to_date(46_023.0), NaiveDate::from_ymd_opt(2026, 1, 1));
    assert_eq!(excel_serial_to_date(46_023.75), NaiveDate::from_ymd_opt(2026, 1, 1));
    assert_eq!(excel_serial_to_date(-3.0), None);
    assert_eq!(parse_date("15/03/2026"), NaiveDate::from_ymd_opt(2026, 3, 15));
    assert_eq!(parse_date("2026-03-15T10:00:00Z"), NaiveDate::from_ymd_opt(2026, 3, 15));
  }

  #[test]
  fn headers_match_case_insensitively_by_name_or_label() {
    let body = b"PARTIDA_ECONOMICO,importe,DESCRIPCION,Fecha\n22002,10,Papel,2026-02-01\n";
    let table = Table::read(body, Format::Csv).unwrap();
    let ops = import_operations(&table, &ctx()).unwrap();

    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].partida_economico, "22002");
    assert_eq!(ops[0].importe_total, 10.0);
    assert_eq!(ops[0].descripcion.as_deref(), Some("Papel"));
    assert_eq!(ops[0].fecha, NaiveDate::from_ymd_opt(2026, 2, 1));
    assert_eq!((ops[0].ejercicio, ops[0].centro_gestor.as_str()), (2026, "023"));
    assert_eq!(ops[0].tipo_operacion, "AD");
  }

  #[test]
  fn semicolon_csv_with_bom_and_blank_rows() {
    let body = "\u{feff}Partida;Importe;Descripcion\n22002;\"-1.234,56\";Toner\n;;\n\n22606;;\n"
      .as_bytes();
    let table = Table::read(body, Format::Csv).unwrap();
    assert_eq!(table.headers(), ["Partida", "Importe", "Descripcion"]);
    assert_eq!(table.len(), 2);

    let ops = import_operations(&table, &ctx()).unwrap();
    assert_eq!(ops[0].importe_total, 1234.56);
    assert_eq!(ops[1].partida_economico, "22606");
    assert_eq!(ops[1].importe_total, 0.0);
    assert_eq!(ops[1].descripcion, None);
  }

  #[test]
  fn missing_amount_column_defaults_to_zero() {
    let table = Table::read(b"Partida\n22002\n", Format::Csv).unwrap();
    let ops = import_operations(&table, &ctx()).unwrap();
    assert_eq!(ops[0].importe_total, 0.0);
  }

  #[test]
  fn bad_amount_names_the_row() {
    let body = b"Partida,Importe\n22002,10\n22002,diez\n";
    let table = Table::read(body, Format::Csv).unwrap();
    let err = import_operations(&table, &ctx()).unwrap_err();
    assert!(matches!(err, Error::Parse { row: 3, .. }), "{err}");
  }

  #[test]
  fn budget_lines_need_a_code() {
    let table = Table::read(b"Codigo,Descripcion\n22002,Material\n,Sin codigo\n", Format::Csv)
      .unwrap();
    let err = import_budget_lines(&table, 2026, "023").unwrap_err();
    assert!(matches!(err, Error::Parse { row: 3, .. }));

    let table = Table::read(b"Partida,Descripcion\n22002,Material\n", Format::Csv).unwrap();
    let lines = import_budget_lines(&table, 2026, "023").unwrap();
    assert_eq!(lines[0].codigo, "22002");
    assert_eq!(lines[0].descripcion, "Material");
  }

  #[test]
  fn workbook_cells_map_to_text_and_numbers() {
    assert_eq!(Cell::from_data(&Data::Int(22002)).as_text().as_deref(), Some("22002"));
    assert_eq!(Cell::from_data(&Data::Float(1.5)).as_text().as_deref(), Some("1.5"));
    assert_eq!(Cell::from_data(&Data::String("  ".into())), Cell::Empty);
    assert_eq!(Cell::from_data(&Data::Empty), Cell::Empty);

    let rec = Record { row: 2, cells: vec![Cell::Number(46_023.0), Cell::Number(-80.0)] };
    assert_eq!(rec.date(Some(0)).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 1));
    assert_eq!(rec.amount(Some(1)).unwrap(), -80.0);
    assert_eq!(rec.amount(Some(7)).unwrap(), 0.0);
  }

  #[test]
  fn garbage_workbook_is_an_xlsx_error() {
    let err = Table::read(b"PK\x03\x04not really a zip", Format::Xlsx).unwrap_err();
    assert!(matches!(err, Error::Xlsx(_)));
  }
}
