//! The `BudgetStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `ppto-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  aggregate::Scope,
  batch::{ReplaceOutcome, ReplacePredicate},
  catalog::{BudgetLine, ManagementCenter, NewManagementCenter},
  operation::Operation,
  user::{AdminUser, AuthorizedUser},
};

/// Abstraction over a budget-execution store backend.
///
/// Amounts are normalised to magnitudes on every write path. Scope
/// replacements are atomic: either the delete and every insert happen, or
/// nothing does.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait BudgetStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Operations ────────────────────────────────────────────────────────

  /// Every operation, most recent `fecha` first (undated last).
  fn list_operations(
    &self,
  ) -> impl Future<Output = Result<Vec<Operation>, Self::Error>> + Send + '_;

  /// Operations of one `(ejercicio, centro_gestor)` scope.
  fn list_operations_in_scope(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<Operation>, Self::Error>> + Send + '_;

  fn list_operations_by_type(
    &self,
    tipo_operacion: String,
  ) -> impl Future<Output = Result<Vec<Operation>, Self::Error>> + Send + '_;

  fn get_operation(
    &self,
    id: String,
  ) -> impl Future<Output = Result<Option<Operation>, Self::Error>> + Send + '_;

  /// Append operations without deleting anything. Returns the number stored.
  fn insert_operations(
    &self,
    ops: Vec<Operation>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Overwrite a stored operation by id. Returns `false` if it was absent.
  fn update_operation(
    &self,
    op: Operation,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_operation(
    &self,
    id: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every operation matching `predicate`, then insert `ops`, in one
  /// transaction.
  fn replace_operations(
    &self,
    ops: Vec<Operation>,
    predicate: ReplacePredicate,
  ) -> impl Future<Output = Result<ReplaceOutcome, Self::Error>> + Send + '_;

  // ── Budget lines ──────────────────────────────────────────────────────

  /// Every budget line, ordered by `codigo`.
  fn list_budget_lines(
    &self,
  ) -> impl Future<Output = Result<Vec<BudgetLine>, Self::Error>> + Send + '_;

  fn list_budget_lines_in_scope(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<BudgetLine>, Self::Error>> + Send + '_;

  fn insert_budget_lines(
    &self,
    lines: Vec<BudgetLine>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Update `codigo` and `descripcion` of a stored line by id.
  fn update_budget_line(
    &self,
    line: BudgetLine,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_budget_line(
    &self,
    id: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every line matching `predicate`, then insert `lines`, in one
  /// transaction.
  fn replace_budget_lines(
    &self,
    lines: Vec<BudgetLine>,
    predicate: ReplacePredicate,
  ) -> impl Future<Output = Result<ReplaceOutcome, Self::Error>> + Send + '_;

  // ── Management centers ────────────────────────────────────────────────

  /// Every center, ordered by `codigo`.
  fn list_centers(
    &self,
  ) -> impl Future<Output = Result<Vec<ManagementCenter>, Self::Error>> + Send + '_;

  fn add_center(
    &self,
    center: NewManagementCenter,
  ) -> impl Future<Output = Result<ManagementCenter, Self::Error>> + Send + '_;

  fn delete_center(
    &self,
    id: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Every authorized directory user, ordered by username.
  fn list_authorized_users(
    &self,
  ) -> impl Future<Output = Result<Vec<AuthorizedUser>, Self::Error>> + Send + '_;

  fn get_authorized_user(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<AuthorizedUser>, Self::Error>> + Send + '_;

  /// Insert or replace an authorized user; `added_at` is set by the store.
  fn add_authorized_user(
    &self,
    username: String,
    display_name: String,
  ) -> impl Future<Output = Result<AuthorizedUser, Self::Error>> + Send + '_;

  fn remove_authorized_user(
    &self,
    username: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_admin(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<AdminUser>, Self::Error>> + Send + '_;

  /// Replace an admin's password hash. Returns `false` if the admin is
  /// unknown.
  fn set_admin_password(
    &self,
    username: String,
    password_hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
