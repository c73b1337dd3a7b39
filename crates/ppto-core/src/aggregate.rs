//! The aggregation engine: pure reductions of an operation set into scope
//! totals, available balances and a per-budget-line breakdown.
//!
//! Nothing here touches storage. Every function is a deterministic function
//! of its arguments, so callers can recompute freely (e.g. whenever the
//! forecast toggle flips).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
  catalog::BudgetLine,
  operation::{Classifier, Operation, OperationClass},
};

// ─── Scope ───────────────────────────────────────────────────────────────────

/// A `(fiscal year, management center)` pair; the unit every view filters on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
  pub ejercicio:     i32,
  pub centro_gestor: String,
}

impl Scope {
  pub fn new(ejercicio: i32, centro_gestor: impl Into<String>) -> Self {
    Self { ejercicio, centro_gestor: centro_gestor.into() }
  }

  pub fn contains(&self, op: &Operation) -> bool {
    op.in_scope(self.ejercicio, &self.centro_gestor)
  }

  /// The operations of `ops` inside this scope, in input order.
  pub fn select<'a>(
    &'a self,
    ops: &'a [Operation],
  ) -> impl Iterator<Item = &'a Operation> + 'a {
    ops.iter().filter(move |op| self.contains(op))
  }
}

// ─── Per-class sums ──────────────────────────────────────────────────────────

/// Running sums of `importe_total` per aggregate class.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ClassSums {
  budget:   f64,
  executed: f64,
  forecast: f64,
}

impl ClassSums {
  fn add(&mut self, class: OperationClass, amount: f64) {
    match class {
      OperationClass::Budget => self.budget += amount,
      OperationClass::Executed => self.executed += amount,
      OperationClass::Forecast => self.forecast += amount,
      OperationClass::Inert => {}
    }
  }

  fn presupuesto(&self) -> f64 { self.budget }

  // Consumption is reported as a magnitude regardless of stored sign.
  fn ejecutado(&self) -> f64 { self.executed.abs() }

  fn prevision(&self) -> f64 { self.forecast.abs() }

  fn saldo(&self, incluir_prevision: bool) -> f64 {
    let prevision = if incluir_prevision { self.prevision() } else { 0.0 };
    self.presupuesto() - self.ejecutado() - prevision
  }
}

// ─── Scope summary ───────────────────────────────────────────────────────────

/// Totals and balances for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub total_presupuesto:       f64,
  pub total_ejecutado:         f64,
  pub total_prevision:         f64,
  /// Allocation minus executed.
  pub disponible_contabilidad: f64,
  /// Allocation minus executed minus forecast.
  pub disponible_previsto:     f64,
  /// Executed as a percentage of allocation; `0` when nothing is allocated.
  pub porcentaje_ejecutado:    f64,
}

impl Summary {
  fn from_sums(sums: ClassSums) -> Self {
    let total_presupuesto = sums.presupuesto();
    let total_ejecutado   = sums.ejecutado();
    let total_prevision   = sums.prevision();
    let porcentaje_ejecutado = if total_presupuesto > 0.0 {
      total_ejecutado / total_presupuesto * 100.0
    } else {
      0.0
    };
    Self {
      total_presupuesto,
      total_ejecutado,
      total_prevision,
      disponible_contabilidad: sums.saldo(false),
      disponible_previsto: sums.saldo(true),
      porcentaje_ejecutado,
    }
  }

  /// The balance the per-line breakdown reconciles to for a given toggle.
  pub fn disponible(&self, incluir_prevision: bool) -> f64 {
    if incluir_prevision {
      self.disponible_previsto
    } else {
      self.disponible_contabilidad
    }
  }
}

/// Reduce the operations of `scope` into a [`Summary`].
pub fn summarize(ops: &[Operation], scope: &Scope, classifier: &Classifier) -> Summary {
  let mut sums = ClassSums::default();
  for op in scope.select(ops) {
    sums.add(classifier.classify(&op.tipo_operacion), op.importe_total);
  }
  Summary::from_sums(sums)
}

// ─── Per-class selection ─────────────────────────────────────────────────────

/// The in-scope operations whose tag belongs to `class`.
pub fn select_class<'a>(
  ops: &'a [Operation],
  scope: &'a Scope,
  classifier: &'a Classifier,
  class: OperationClass,
) -> impl Iterator<Item = &'a Operation> + 'a {
  scope
    .select(ops)
    .filter(move |op| classifier.classify(&op.tipo_operacion) == class)
}

// ─── Line breakdown ──────────────────────────────────────────────────────────

/// One budget line's figures within a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineBalance {
  pub partida:     String,
  /// Catalog description, when the scope's catalog lists the code.
  pub descripcion: Option<String>,
  pub presupuesto: f64,
  pub ejecutado:   f64,
  pub prevision:   f64,
  pub saldo:       f64,
}

/// Per-line figures for a scope, ordered by `saldo` descending.
///
/// Lines are driven by the operation data: every `partida_economico` present
/// in the scope appears, whether or not the catalog knows it. The sums are
/// computed once; flipping the forecast toggle only re-sorts. Iteration is
/// restartable: [`Breakdown::iter`] may be called any number of times.
#[derive(Debug, Clone)]
pub struct Breakdown {
  lines:             Vec<(String, ClassSums)>,
  descriptions:      HashMap<String, String>,
  scope:             Scope,
  incluir_prevision: bool,
}

impl Breakdown {
  pub fn new(
    ops: &[Operation],
    scope: &Scope,
    classifier: &Classifier,
    incluir_prevision: bool,
  ) -> Self {
    let mut grouped: BTreeMap<&str, ClassSums> = BTreeMap::new();
    for op in scope.select(ops) {
      grouped
        .entry(op.partida_economico.as_str())
        .or_default()
        .add(classifier.classify(&op.tipo_operacion), op.importe_total);
    }

    let mut breakdown = Self {
      lines: grouped
        .into_iter()
        .map(|(code, sums)| (code.to_owned(), sums))
        .collect(),
      descriptions: HashMap::new(),
      scope: scope.clone(),
      incluir_prevision,
    };
    breakdown.sort();
    breakdown
  }

  /// Attach catalog descriptions for the lines of this breakdown's scope.
  /// Catalog entries of other scopes are ignored.
  pub fn with_catalog(mut self, catalog: &[BudgetLine]) -> Self {
    self.descriptions = catalog
      .iter()
      .filter(|l| {
        l.ejercicio == self.scope.ejercicio
          && l.centro_gestor == self.scope.centro_gestor
      })
      .map(|l| (l.codigo.clone(), l.descripcion.clone()))
      .collect();
    self
  }

  pub fn scope(&self) -> &Scope { &self.scope }

  pub fn incluir_prevision(&self) -> bool { self.incluir_prevision }

  pub fn set_incluir_prevision(&mut self, incluir_prevision: bool) {
    if self.incluir_prevision != incluir_prevision {
      self.incluir_prevision = incluir_prevision;
      self.sort();
    }
  }

  pub fn len(&self) -> usize { self.lines.len() }

  pub fn is_empty(&self) -> bool { self.lines.is_empty() }

  pub fn iter(&self) -> Lines<'_> {
    Lines { breakdown: self, inner: self.lines.iter() }
  }

  /// Sum of every line's `saldo`.
  pub fn total_saldo(&self) -> f64 {
    self
      .lines
      .iter()
      .map(|(_, sums)| sums.saldo(self.incluir_prevision))
      .sum()
  }

  fn sort(&mut self) {
    let incluir = self.incluir_prevision;
    self
      .lines
      .sort_by(|(_, a), (_, b)| b.saldo(incluir).total_cmp(&a.saldo(incluir)));
  }

  fn balance(&self, code: &str, sums: &ClassSums) -> LineBalance {
    LineBalance {
      partida:     code.to_owned(),
      descripcion: self.descriptions.get(code).cloned(),
      presupuesto: sums.presupuesto(),
      ejecutado:   sums.ejecutado(),
      prevision:   sums.prevision(),
      saldo:       sums.saldo(self.incluir_prevision),
    }
  }
}

/// Iterator over a [`Breakdown`], yielding lines by `saldo` descending.
pub struct Lines<'a> {
  breakdown: &'a Breakdown,
  inner:     std::slice::Iter<'a, (String, ClassSums)>,
}

impl Iterator for Lines<'_> {
  type Item = LineBalance;

  fn next(&mut self) -> Option<LineBalance> {
    let (code, sums) = self.inner.next()?;
    Some(self.breakdown.balance(code, sums))
  }

  fn size_hint(&self) -> (usize, Option<usize>) { self.inner.size_hint() }
}

impl ExactSizeIterator for Lines<'_> {}

impl<'a> IntoIterator for &'a Breakdown {
  type Item = LineBalance;
  type IntoIter = Lines<'a>;

  fn into_iter(self) -> Lines<'a> { self.iter() }
}

// ─── Domains and group statistics ────────────────────────────────────────────

/// Sorted distinct values present in an operation set, used to populate
/// filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domains {
  pub tipo_operacion:    Vec<String>,
  pub centro_gestor:     Vec<String>,
  pub partida_economico: Vec<String>,
}

pub fn domains(ops: &[Operation]) -> Domains {
  let mut tipos    = BTreeSet::new();
  let mut centros  = BTreeSet::new();
  let mut partidas = BTreeSet::new();
  for op in ops {
    tipos.insert(op.tipo_operacion.as_str());
    centros.insert(op.centro_gestor.as_str());
    partidas.insert(op.partida_economico.as_str());
  }
  let owned = |set: BTreeSet<&str>| set.into_iter().map(str::to_owned).collect();
  Domains {
    tipo_operacion:    owned(tipos),
    centro_gestor:     owned(centros),
    partida_economico: owned(partidas),
  }
}

/// The operation field [`group_stats`] groups on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupField {
  CentroGestor,
  PartidaEconomico,
  TipoOperacion,
}

impl GroupField {
  fn key<'a>(&self, op: &'a Operation) -> &'a str {
    match self {
      GroupField::CentroGestor => op.centro_gestor.as_str(),
      GroupField::PartidaEconomico => op.partida_economico.as_str(),
      GroupField::TipoOperacion => op.tipo_operacion.as_str(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
  pub key:   String,
  pub count: usize,
  /// Raw sum of `importe_total`, regardless of class.
  pub total: f64,
}

/// Count and total per distinct value of `field`, ordered by key.
pub fn group_stats<'a, I>(ops: I, field: GroupField) -> Vec<GroupStat>
where
  I: IntoIterator<Item = &'a Operation>,
{
  let mut groups: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
  for op in ops {
    let entry = groups.entry(field.key(op)).or_default();
    entry.0 += 1;
    entry.1 += op.importe_total;
  }
  groups
    .into_iter()
    .map(|(key, (count, total))| GroupStat { key: key.to_owned(), count, total })
    .collect()
}
