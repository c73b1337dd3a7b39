//! [`SqliteStore`]: the SQLite implementation of [`BudgetStore`].

use std::path::Path;

use chrono::Utc;
use ppto_core::{
  aggregate::Scope,
  batch::{ReplaceOutcome, ReplacePredicate},
  catalog::{
    BudgetLine, DEFAULT_BUDGET_LINE_CENTER, DEFAULT_BUDGET_LINE_YEAR,
    DEFAULT_BUDGET_LINES, DEFAULT_CENTERS, ManagementCenter, NewManagementCenter,
  },
  credential::hash_password,
  operation::Operation,
  store::BudgetStore,
  user::{
    AdminUser, AuthorizedUser, DEFAULT_ADMIN_DISPLAY_NAME, DEFAULT_ADMIN_PASSWORD,
    DEFAULT_ADMIN_USERNAME,
  },
};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    BUDGET_LINE_COLUMNS, OPERATION_COLUMNS, RawAuthorizedUser, RawOperation,
    admin_from_row, budget_line_from_row, center_from_row, encode_dt,
    insert_budget_line, insert_operation,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A budget-execution store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation and seed
  /// the default catalogs and admin account where missing.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    store.seed_defaults().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    store.seed_defaults().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Seed the default admin if absent, and the center and budget-line
  /// catalogs if their tables are empty.
  async fn seed_defaults(&self) -> Result<()> {
    if self.get_admin(DEFAULT_ADMIN_USERNAME.to_owned()).await?.is_none() {
      let hash = hash_password(DEFAULT_ADMIN_PASSWORD)?;
      self
        .conn
        .call(move |conn| {
          conn.execute(
            "INSERT OR IGNORE INTO usuarios_admin (username, password_hash, display_name)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![DEFAULT_ADMIN_USERNAME, hash, DEFAULT_ADMIN_DISPLAY_NAME],
          )?;
          Ok(())
        })
        .await?;
      tracing::info!(username = DEFAULT_ADMIN_USERNAME, "seeded default admin account");
    }

    let (centers, lines) = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;

        let center_count: i64 =
          tx.query_row("SELECT COUNT(*) FROM centros_gestores", [], |r| r.get(0))?;
        if center_count == 0 {
          for (id, codigo, nombre) in DEFAULT_CENTERS {
            tx.execute(
              "INSERT INTO centros_gestores (id, codigo, nombre) VALUES (?1, ?2, ?3)",
              rusqlite::params![id, codigo, nombre],
            )?;
          }
        }

        let line_count: i64 =
          tx.query_row("SELECT COUNT(*) FROM partidas", [], |r| r.get(0))?;
        if line_count == 0 {
          for (id, codigo, descripcion) in DEFAULT_BUDGET_LINES {
            let line = BudgetLine {
              id:            (*id).to_owned(),
              ejercicio:     DEFAULT_BUDGET_LINE_YEAR,
              centro_gestor: DEFAULT_BUDGET_LINE_CENTER.to_owned(),
              codigo:        (*codigo).to_owned(),
              descripcion:   (*descripcion).to_owned(),
            };
            insert_budget_line(&tx, &line)?;
          }
        }

        tx.commit()?;
        Ok((center_count == 0, line_count == 0))
      })
      .await?;

    if centers {
      tracing::info!(count = DEFAULT_CENTERS.len(), "seeded management centers");
    }
    if lines {
      tracing::info!(count = DEFAULT_BUDGET_LINES.len(), "seeded budget lines");
    }
    Ok(())
  }

  /// Run an operations `SELECT` with the given `WHERE` tail and parameters.
  async fn query_operations(&self, tail: &'static str, params: Vec<Value>) -> Result<Vec<Operation>> {
    let raws: Vec<RawOperation> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {OPERATION_COLUMNS} FROM operaciones {tail} ORDER BY fecha DESC, rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawOperation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOperation::into_operation).collect()
  }

  async fn query_budget_lines(&self, tail: &'static str, params: Vec<Value>) -> Result<Vec<BudgetLine>> {
    let lines = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {BUDGET_LINE_COLUMNS} FROM partidas {tail} ORDER BY codigo ASC, rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), budget_line_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(lines)
  }

  /// Run a single-row `DELETE`/`UPDATE` and report whether a row changed.
  async fn execute_one(&self, sql: &'static str, params: Vec<Value>) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params_from_iter(params))?))
      .await?;
    Ok(changed > 0)
  }
}

// ─── Predicate → SQL ─────────────────────────────────────────────────────────

/// Ids bound per `DELETE … WHERE id IN (..)`, well under SQLite's variable
/// limit.
const ID_CHUNK: usize = 500;

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

/// Build `DELETE FROM {table} WHERE …` for a replace predicate. Callers must
/// check [`ReplacePredicate::is_empty`] first; `IN ()` is not valid SQL.
fn delete_matching(
  conn: &rusqlite::Connection,
  table: &str,
  predicate: &ReplacePredicate,
) -> rusqlite::Result<usize> {
  let mut clauses = vec![
    format!("ejercicio IN ({})", placeholders(predicate.ejercicios.len())),
    format!("centro_gestor IN ({})", placeholders(predicate.centros.len())),
  ];
  let mut params: Vec<Value> = predicate
    .ejercicios
    .iter()
    .map(|y| Value::Integer(i64::from(*y)))
    .chain(predicate.centros.iter().map(|c| Value::Text(c.clone())))
    .collect();

  if let Some(tipos) = &predicate.tipos {
    clauses.push(format!("tipo_operacion IN ({})", placeholders(tipos.len())));
    params.extend(tipos.iter().map(|t| Value::Text(t.clone())));
  }

  let sql = format!("DELETE FROM {table} WHERE {}", clauses.join(" AND "));
  conn.execute(&sql, rusqlite::params_from_iter(params))
}

/// Delete the stored rows a batch re-keys by `id`, wherever they currently
/// sit. A record moved to another year, center or type is replaced rather
/// than colliding with its old row.
fn delete_ids(
  conn: &rusqlite::Connection,
  table: &str,
  ids: &[String],
) -> rusqlite::Result<usize> {
  let mut deleted = 0;
  for chunk in ids.chunks(ID_CHUNK) {
    let sql = format!("DELETE FROM {table} WHERE id IN ({})", placeholders(chunk.len()));
    deleted += conn.execute(&sql, rusqlite::params_from_iter(chunk.iter()))?;
  }
  Ok(deleted)
}

// ─── BudgetStore impl ────────────────────────────────────────────────────────

impl BudgetStore for SqliteStore {
  type Error = crate::Error;

  // ── Operations ────────────────────────────────────────────────────────────

  async fn list_operations(&self) -> Result<Vec<Operation>> {
    self.query_operations("", vec![]).await
  }

  async fn list_operations_in_scope(&self, scope: Scope) -> Result<Vec<Operation>> {
    self
      .query_operations(
        "WHERE ejercicio = ? AND centro_gestor = ?",
        vec![
          Value::Integer(i64::from(scope.ejercicio)),
          Value::Text(scope.centro_gestor),
        ],
      )
      .await
  }

  async fn list_operations_by_type(&self, tipo_operacion: String) -> Result<Vec<Operation>> {
    self
      .query_operations("WHERE tipo_operacion = ?", vec![Value::Text(tipo_operacion)])
      .await
  }

  async fn get_operation(&self, id: String) -> Result<Option<Operation>> {
    let raw: Option<RawOperation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {OPERATION_COLUMNS} FROM operaciones WHERE id = ?1"),
            rusqlite::params![id],
            RawOperation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawOperation::into_operation).transpose()
  }

  async fn insert_operations(&self, ops: Vec<Operation>) -> Result<usize> {
    let ops: Vec<Operation> = ops.into_iter().map(Operation::normalized).collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for op in &ops {
          insert_operation(&tx, op)?;
        }
        tx.commit()?;
        Ok(ops.len())
      })
      .await?;

    tracing::debug!(inserted, "appended operations");
    Ok(inserted)
  }

  async fn update_operation(&self, op: Operation) -> Result<bool> {
    let op = op.normalized();
    let fecha = op.fecha.map(crate::encode::encode_date);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE operaciones SET
             fecha = ?2, ejercicio = ?3, centro_gestor = ?4, partida_economico = ?5,
             descripcion = ?6, tipo_operacion = ?7, importe_total = ?8, empresa = ?9,
             cif_nif = ?10, base_imponible = ?11, importe_iva = ?12,
             operacion_previa = ?13, operacion_definitiva = ?14,
             expte_contratacion = ?15, observaciones = ?16, link_placsp = ?17
           WHERE id = ?1",
          rusqlite::params![
            op.id,
            fecha,
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
          ],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn delete_operation(&self, id: String) -> Result<bool> {
    self
      .execute_one("DELETE FROM operaciones WHERE id = ?", vec![Value::Text(id)])
      .await
  }

  async fn replace_operations(
    &self,
    ops: Vec<Operation>,
    predicate: ReplacePredicate,
  ) -> Result<ReplaceOutcome> {
    let ops: Vec<Operation> = ops.into_iter().map(Operation::normalized).collect();
    let ids: Vec<String> = ops.iter().map(|op| op.id.clone()).collect();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let deleted = if predicate.is_empty() {
          0
        } else {
          delete_matching(&tx, "operaciones", &predicate)?
        };
        let deleted = deleted + delete_ids(&tx, "operaciones", &ids)?;
        for op in &ops {
          insert_operation(&tx, op)?;
        }
        tx.commit()?;
        Ok(ReplaceOutcome { deleted, inserted: ops.len() })
      })
      .await?;

    tracing::info!(
      deleted = outcome.deleted,
      inserted = outcome.inserted,
      "replaced operations scope"
    );
    Ok(outcome)
  }

  // ── Budget lines ──────────────────────────────────────────────────────────

  async fn list_budget_lines(&self) -> Result<Vec<BudgetLine>> {
    self.query_budget_lines("", vec![]).await
  }

  async fn list_budget_lines_in_scope(&self, scope: Scope) -> Result<Vec<BudgetLine>> {
    self
      .query_budget_lines(
        "WHERE ejercicio = ? AND centro_gestor = ?",
        vec![
          Value::Integer(i64::from(scope.ejercicio)),
          Value::Text(scope.centro_gestor),
        ],
      )
      .await
  }

  async fn insert_budget_lines(&self, lines: Vec<BudgetLine>) -> Result<usize> {
    let lines: Vec<BudgetLine> = lines.into_iter().map(BudgetLine::normalized).collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for line in &lines {
          insert_budget_line(&tx, line)?;
        }
        tx.commit()?;
        Ok(lines.len())
      })
      .await?;
    Ok(inserted)
  }

  async fn update_budget_line(&self, line: BudgetLine) -> Result<bool> {
    self
      .execute_one(
        "UPDATE partidas SET codigo = ?, descripcion = ? WHERE id = ?",
        vec![
          Value::Text(line.codigo),
          Value::Text(line.descripcion),
          Value::Text(line.id),
        ],
      )
      .await
  }

  async fn delete_budget_line(&self, id: String) -> Result<bool> {
    self
      .execute_one("DELETE FROM partidas WHERE id = ?", vec![Value::Text(id)])
      .await
  }

  async fn replace_budget_lines(
    &self,
    lines: Vec<BudgetLine>,
    predicate: ReplacePredicate,
  ) -> Result<ReplaceOutcome> {
    let lines: Vec<BudgetLine> = lines.into_iter().map(BudgetLine::normalized).collect();
    let ids: Vec<String> = lines.iter().map(|line| line.id.clone()).collect();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let deleted = if predicate.is_empty() {
          0
        } else {
          delete_matching(&tx, "partidas", &predicate)?
        };
        let deleted = deleted + delete_ids(&tx, "partidas", &ids)?;
        for line in &lines {
          insert_budget_line(&tx, line)?;
        }
        tx.commit()?;
        Ok(ReplaceOutcome { deleted, inserted: lines.len() })
      })
      .await?;

    tracing::info!(
      deleted = outcome.deleted,
      inserted = outcome.inserted,
      "replaced budget-line scope"
    );
    Ok(outcome)
  }

  // ── Management centers ────────────────────────────────────────────────────

  async fn list_centers(&self) -> Result<Vec<ManagementCenter>> {
    let centers = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, codigo, nombre FROM centros_gestores ORDER BY codigo ASC",
        )?;
        let rows = stmt
          .query_map([], center_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(centers)
  }

  async fn add_center(&self, center: NewManagementCenter) -> Result<ManagementCenter> {
    let center = ManagementCenter {
      id:     Uuid::new_v4().to_string(),
      codigo: center.codigo,
      nombre: center.nombre,
    };

    let row = center.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO centros_gestores (id, codigo, nombre) VALUES (?1, ?2, ?3)",
          rusqlite::params![row.id, row.codigo, row.nombre],
        )?;
        Ok(())
      })
      .await?;

    Ok(center)
  }

  async fn delete_center(&self, id: String) -> Result<bool> {
    self
      .execute_one("DELETE FROM centros_gestores WHERE id = ?", vec![Value::Text(id)])
      .await
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn list_authorized_users(&self) -> Result<Vec<AuthorizedUser>> {
    let raws: Vec<RawAuthorizedUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT username, display_name, added_at FROM usuarios_autorizados
           ORDER BY username ASC",
        )?;
        let rows = stmt
          .query_map([], RawAuthorizedUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuthorizedUser::into_user).collect()
  }

  async fn get_authorized_user(&self, username: String) -> Result<Option<AuthorizedUser>> {
    let raw: Option<RawAuthorizedUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT username, display_name, added_at FROM usuarios_autorizados
             WHERE username = ?1",
            rusqlite::params![username],
            RawAuthorizedUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAuthorizedUser::into_user).transpose()
  }

  async fn add_authorized_user(
    &self,
    username: String,
    display_name: String,
  ) -> Result<AuthorizedUser> {
    let user = AuthorizedUser { username, display_name, added_at: Utc::now() };

    let username = user.username.clone();
    let display  = user.display_name.clone();
    let at_str   = encode_dt(user.added_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO usuarios_autorizados (username, display_name, added_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![username, display, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn remove_authorized_user(&self, username: String) -> Result<bool> {
    self
      .execute_one(
        "DELETE FROM usuarios_autorizados WHERE username = ?",
        vec![Value::Text(username)],
      )
      .await
  }

  async fn get_admin(&self, username: String) -> Result<Option<AdminUser>> {
    let admin = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT username, password_hash, display_name FROM usuarios_admin
             WHERE username = ?1",
            rusqlite::params![username],
            admin_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(admin)
  }

  async fn set_admin_password(&self, username: String, password_hash: String) -> Result<bool> {
    self
      .execute_one(
        "UPDATE usuarios_admin SET password_hash = ? WHERE username = ?",
        vec![Value::Text(password_hash), Value::Text(username)],
      )
      .await
  }
}
