//! Error types for the ppto-sheet codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown dataset: {0}")]
  UnknownDataset(String),

  #[error("unknown sheet format: {0}")]
  UnknownFormat(String),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("XLSX error: {0}")]
  Xlsx(String),

  #[error("XLSX write error: {0}")]
  XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

  #[error("workbook has no worksheets")]
  EmptyWorkbook,

  #[error("row {row}: {message}")]
  Parse { row: usize, message: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
