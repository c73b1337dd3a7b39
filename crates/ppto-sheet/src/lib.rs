//! Spreadsheet interchange for budget data.
//!
//! Writes operations and budget lines with fixed headers, either as CSV or as
//! an XLSX workbook with one named sheet, and reads them back from CSV or XLSX
//! (first worksheet). Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use ppto_sheet::{Format, ImportContext, Table, import_operations};
//!
//! let body = b"Partida,Importe,Descripcion\n22002,\"1.234,56\",Toner\n";
//! let table = Table::read(body, Format::Csv).unwrap();
//! let ctx = ImportContext::new(2026, "023", "AD");
//! let ops = import_operations(&table, &ctx).unwrap();
//! assert_eq!(ops[0].importe_total, 1234.56);
//! ```

pub mod error;
mod export;
mod import;

use std::{fmt, str::FromStr};

pub use error::{Error, Result};
pub use export::{
  export, write_budget_lines, write_budget_lines_xlsx, write_operations, write_operations_xlsx,
};
pub use import::{Cell, Table, import_budget_lines, import_operations};
use ppto_core::operation::OperationClass;

// ─── Datasets ────────────────────────────────────────────────────────────────

/// A named slice of a scope that can be exported or imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
  /// Operations classified as allocation.
  Presupuesto,
  /// Operations classified as executed.
  Ejecutado,
  /// Operations classified as forecast.
  Prevision,
  /// Every operation of the scope regardless of type.
  Operaciones,
  /// Budget lines of the scope.
  Partidas,
}

impl Dataset {
  pub const ALL: [Dataset; 5] = [
    Dataset::Presupuesto,
    Dataset::Ejecutado,
    Dataset::Prevision,
    Dataset::Operaciones,
    Dataset::Partidas,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Dataset::Presupuesto => "presupuesto",
      Dataset::Ejecutado => "ejecutado",
      Dataset::Prevision => "prevision",
      Dataset::Operaciones => "operaciones",
      Dataset::Partidas => "partidas",
    }
  }

  /// The operation class this dataset selects, if it is class-bound.
  pub fn class(self) -> Option<OperationClass> {
    match self {
      Dataset::Presupuesto => Some(OperationClass::Budget),
      Dataset::Ejecutado => Some(OperationClass::Executed),
      Dataset::Prevision => Some(OperationClass::Forecast),
      Dataset::Operaciones | Dataset::Partidas => None,
    }
  }

  pub fn is_budget_lines(self) -> bool { self == Dataset::Partidas }

  /// Worksheet name used for XLSX exports.
  pub fn sheet_name(self) -> &'static str {
    match self {
      Dataset::Presupuesto => "Presupuesto",
      Dataset::Ejecutado => "Ejecutado",
      Dataset::Prevision => "Prevision",
      Dataset::Operaciones => "Operaciones",
      Dataset::Partidas => "Partidas",
    }
  }

  /// Suggested download name, e.g. `ejecutado_023_2026.xlsx`.
  pub fn file_name(self, ejercicio: i32, centro_gestor: &str, format: Format) -> String {
    format!("{}_{centro_gestor}_{ejercicio}.{}", self.as_str(), format.extension())
  }
}

impl fmt::Display for Dataset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Dataset {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Dataset::ALL
      .into_iter()
      .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| Error::UnknownDataset(s.to_owned()))
  }
}

// ─── Formats ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  Csv,
  Xlsx,
}

impl Format {
  /// Sniff the format from the body: a ZIP local-file header means XLSX,
  /// anything else is treated as CSV text.
  pub fn detect(body: &[u8]) -> Self {
    if body.starts_with(b"PK\x03\x04") {
      Format::Xlsx
    } else {
      Format::Csv
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      Format::Csv => "csv",
      Format::Xlsx => "xlsx",
    }
  }

  pub fn content_type(self) -> &'static str {
    match self {
      Format::Csv => "text/csv; charset=utf-8",
      Format::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    }
  }
}

impl FromStr for Format {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "csv" => Ok(Format::Csv),
      "xlsx" | "xls" | "excel" => Ok(Format::Xlsx),
      _ => Err(Error::UnknownFormat(s.to_owned())),
    }
  }
}

// ─── Import context ──────────────────────────────────────────────────────────

/// Values every imported operation takes from the request rather than from
/// the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
  pub ejercicio:      i32,
  pub centro_gestor:  String,
  pub tipo_operacion: String,
}

impl ImportContext {
  pub fn new(
    ejercicio: i32,
    centro_gestor: impl Into<String>,
    tipo_operacion: impl Into<String>,
  ) -> Self {
    Self {
      ejercicio,
      centro_gestor: centro_gestor.into(),
      tipo_operacion: tipo_operacion.into(),
    }
  }
}

// ─── Round-trip test ─────────────────────────────────────────────────────────
