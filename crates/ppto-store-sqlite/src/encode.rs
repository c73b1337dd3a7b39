//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD`, timestamps as RFC 3339 strings,
//! amounts as REAL.

use chrono::{DateTime, NaiveDate, Utc};
use ppto_core::{
  catalog::{BudgetLine, ManagementCenter},
  operation::Operation,
  user::{AdminUser, AuthorizedUser},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Column list shared by every `SELECT` over `operaciones`, in the order
/// [`RawOperation::from_row`] reads them.
pub const OPERATION_COLUMNS: &str = "id, fecha, ejercicio, centro_gestor, \
  partida_economico, descripcion, tipo_operacion, importe_total, empresa, \
  cif_nif, base_imponible, importe_iva, operacion_previa, \
  operacion_definitiva, expte_contratacion, observaciones, link_placsp";

pub const INSERT_OPERATION: &str = "INSERT INTO operaciones (
    id, fecha, ejercicio, centro_gestor, partida_economico, descripcion,
    tipo_operacion, importe_total, empresa, cif_nif, base_imponible,
    importe_iva, operacion_previa, operacion_definitiva, expte_contratacion,
    observaciones, link_placsp
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

/// An `operaciones` row with the date still in its stored text form.
pub struct RawOperation {
  pub fecha: Option<String>,
  pub rest:  Operation,
}

impl RawOperation {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      fecha: row.get(1)?,
      rest:  Operation {
        id:                   row.get(0)?,
        fecha:                None,
        ejercicio:            row.get(2)?,
        centro_gestor:        row.get(3)?,
        partida_economico:    row.get(4)?,
        descripcion:          row.get(5)?,
        tipo_operacion:       row.get(6)?,
        importe_total:        row.get(7)?,
        empresa:              row.get(8)?,
        cif_nif:              row.get(9)?,
        base_imponible:       row.get(10)?,
        importe_iva:          row.get(11)?,
        operacion_previa:     row.get(12)?,
        operacion_definitiva: row.get(13)?,
        expte_contratacion:   row.get(14)?,
        observaciones:        row.get(15)?,
        link_placsp:          row.get(16)?,
      },
    })
  }

  pub fn into_operation(self) -> Result<Operation> {
    let fecha = match self.fecha.as_deref().map(str::trim) {
      None | Some("") => None,
      Some(s) => Some(decode_date(s)?),
    };
    Ok(Operation { fecha, ..self.rest })
  }
}

/// Bind an operation to [`INSERT_OPERATION`].
pub fn insert_operation(conn: &rusqlite::Connection, op: &Operation) -> rusqlite::Result<()> {
  conn.prepare_cached(INSERT_OPERATION)?.execute(rusqlite::params![
    op.id,
    op.fecha.map(encode_date),
    op.ejercicio,
    op.centro_gestor,
    op.partida_economico,
    op.descripcion,
    op.tipo_operacion,
    op.importe_total,
    op.empresa,
    op.cif_nif,
    op.base_imponible,
    op.importe_iva,
    op.operacion_previa,
    op.operacion_definitiva,
    op.expte_contratacion,
    op.observaciones,
    op.link_placsp,
  ])?;
  Ok(())
}

// ─── Catalogs ────────────────────────────────────────────────────────────────

pub const BUDGET_LINE_COLUMNS: &str = "id, ejercicio, centro_gestor, codigo, descripcion";

pub fn budget_line_from_row(row: &Row<'_>) -> rusqlite::Result<BudgetLine> {
  Ok(BudgetLine {
    id:            row.get(0)?,
    ejercicio:     row.get(1)?,
    centro_gestor: row.get(2)?,
    codigo:        row.get(3)?,
    descripcion:   row.get(4)?,
  })
}

pub fn insert_budget_line(conn: &rusqlite::Connection, line: &BudgetLine) -> rusqlite::Result<()> {
  conn
    .prepare_cached(
      "INSERT INTO partidas (id, ejercicio, centro_gestor, codigo, descripcion)
       VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(rusqlite::params![
      line.id,
      line.ejercicio,
      line.centro_gestor,
      line.codigo,
      line.descripcion,
    ])?;
  Ok(())
}

pub fn center_from_row(row: &Row<'_>) -> rusqlite::Result<ManagementCenter> {
  Ok(ManagementCenter {
    id:     row.get(0)?,
    codigo: row.get(1)?,
    nombre: row.get(2)?,
  })
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// Raw strings read directly from a `usuarios_autorizados` row.
pub struct RawAuthorizedUser {
  pub username:     String,
  pub display_name: String,
  pub added_at:     String,
}

impl RawAuthorizedUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      username:     row.get(0)?,
      display_name: row.get(1)?,
      added_at:     row.get(2)?,
    })
  }

  pub fn into_user(self) -> Result<AuthorizedUser> {
    Ok(AuthorizedUser {
      username:     self.username,
      display_name: self.display_name,
      added_at:     decode_dt(&self.added_at)?,
    })
  }
}

pub fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<AdminUser> {
  Ok(AdminUser {
    username:      row.get(0)?,
    password_hash: row.get(1)?,
    display_name:  row.get(2)?,
  })
}
