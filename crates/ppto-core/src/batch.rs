//! Whole-scope save batches and the predicate that decides which stored rows
//! a batch replaces.
//!
//! A batch carries the complete new contents of a scope. The store deletes
//! every row matching the batch's [`ReplacePredicate`] and inserts the batch,
//! atomically. With no explicit scope the predicate is derived from the
//! values present in the payload; a partial payload therefore still drops
//! sibling rows of the same (year, center, type).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  catalog::BudgetLine,
  operation::Operation,
};

// ─── Request shape ───────────────────────────────────────────────────────────

/// Explicit replacement scope. Each given key overrides the set derived from
/// the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitScope {
  #[serde(default)]
  pub ejercicio:      Option<i32>,
  #[serde(default)]
  pub centro_gestor:  Option<String>,
  /// Ignored for budget-line batches.
  #[serde(default)]
  pub tipo_operacion: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawSave {
  #[serde(rename = "type")]
  kind:  String,
  #[serde(default)]
  data:  serde_json::Value,
  #[serde(default)]
  scope: Option<ExplicitScope>,
}

/// A validated `POST /save` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveBatch {
  Operaciones {
    data:      Vec<Operation>,
    predicate: ReplacePredicate,
  },
  Partidas {
    data:      Vec<BudgetLine>,
    predicate: ReplacePredicate,
  },
}

impl SaveBatch {
  /// Parse and validate a JSON body of the form
  /// `{"type": "operaciones" | "partidas", "data": [...], "scope": {...}?}`.
  pub fn parse(body: &[u8]) -> Result<Self> {
    let raw: RawSave = serde_json::from_slice(body)?;
    let data = if raw.data.is_null() {
      serde_json::Value::Array(vec![])
    } else {
      raw.data
    };

    match raw.kind.as_str() {
      "operaciones" => {
        let data: Vec<Operation> = serde_json::from_value(data)?;
        let predicate =
          ReplacePredicate::for_operations(&data, raw.scope.as_ref())?;
        Ok(SaveBatch::Operaciones { data, predicate })
      }
      "partidas" => {
        let data: Vec<BudgetLine> = serde_json::from_value(data)?;
        let predicate =
          ReplacePredicate::for_budget_lines(&data, raw.scope.as_ref())?;
        Ok(SaveBatch::Partidas { data, predicate })
      }
      other => Err(Error::UnknownBatchKind(other.to_owned())),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      SaveBatch::Operaciones { .. } => "operaciones",
      SaveBatch::Partidas { .. } => "partidas",
    }
  }

  pub fn len(&self) -> usize {
    match self {
      SaveBatch::Operaciones { data, .. } => data.len(),
      SaveBatch::Partidas { data, .. } => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

// ─── Predicate ───────────────────────────────────────────────────────────────

/// Which stored rows a batch replaces: rows whose year, center and (for
/// operations) type are all members of the respective sets.
///
/// An empty set matches nothing, so an empty derived predicate deletes
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePredicate {
  pub ejercicios: BTreeSet<i32>,
  pub centros:    BTreeSet<String>,
  /// `None` for budget lines, which carry no type.
  pub tipos:      Option<BTreeSet<String>>,
}

impl ReplacePredicate {
  /// Build the predicate for an operations batch and check every record
  /// lies inside it.
  pub fn for_operations(ops: &[Operation], scope: Option<&ExplicitScope>) -> Result<Self> {
    let scope = scope.cloned().unwrap_or_default();

    let predicate = Self {
      ejercicios: match scope.ejercicio {
        Some(y) => BTreeSet::from([y]),
        None => ops.iter().map(|o| o.ejercicio).collect(),
      },
      centros: match scope.centro_gestor {
        Some(c) => BTreeSet::from([c]),
        None => ops.iter().map(|o| o.centro_gestor.clone()).collect(),
      },
      tipos: Some(match scope.tipo_operacion {
        Some(t) => t.into_iter().collect(),
        None => ops.iter().map(|o| o.tipo_operacion.clone()).collect(),
      }),
    };

    if let Some(op) = ops.iter().find(|o| !predicate.matches_operation(o)) {
      return Err(Error::OutOfScope(format!(
        "operation {:?} ({}, {}, {})",
        op.id, op.ejercicio, op.centro_gestor, op.tipo_operacion
      )));
    }
    Ok(predicate)
  }

  /// Build the predicate for a budget-line batch and check every record lies
  /// inside it. Any `tipo_operacion` in the scope is ignored.
  pub fn for_budget_lines(
    lines: &[BudgetLine],
    scope: Option<&ExplicitScope>,
  ) -> Result<Self> {
    let scope = scope.cloned().unwrap_or_default();

    let predicate = Self {
      ejercicios: match scope.ejercicio {
        Some(y) => BTreeSet::from([y]),
        None => lines.iter().map(|l| l.ejercicio).collect(),
      },
      centros: match scope.centro_gestor {
        Some(c) => BTreeSet::from([c]),
        None => lines.iter().map(|l| l.centro_gestor.clone()).collect(),
      },
      tipos: None,
    };

    if let Some(line) = lines.iter().find(|l| !predicate.matches_budget_line(l)) {
      return Err(Error::OutOfScope(format!(
        "budget line {:?} ({}, {})",
        line.codigo, line.ejercicio, line.centro_gestor
      )));
    }
    Ok(predicate)
  }

  pub fn matches_operation(&self, op: &Operation) -> bool {
    self.ejercicios.contains(&op.ejercicio)
      && self.centros.contains(&op.centro_gestor)
      && self
        .tipos
        .as_ref()
        .is_none_or(|t| t.contains(&op.tipo_operacion))
  }

  pub fn matches_budget_line(&self, line: &BudgetLine) -> bool {
    self.ejercicios.contains(&line.ejercicio)
      && self.centros.contains(&line.centro_gestor)
  }

  /// True when the predicate cannot match any row.
  pub fn is_empty(&self) -> bool {
    self.ejercicios.is_empty()
      || self.centros.is_empty()
      || self.tipos.as_ref().is_some_and(BTreeSet::is_empty)
  }
}

/// What a scope replacement did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOutcome {
  pub deleted:  usize,
  pub inserted: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derived_predicate_uses_values_present() {
    let body = br#"{"type":"operaciones","data":[
      {"ejercicio":2026,"centro_gestor":"023","partida_economico":"22002","tipo_operacion":"AD","importe_total":-5},
      {"ejercicio":2026,"centro_gestor":"081","partida_economico":"22002","tipo_operacion":"AD FUTURA","importe_total":5}
    ]}"#;
    let SaveBatch::Operaciones { data, predicate } = SaveBatch::parse(body).unwrap() else {
      panic!("expected operations batch");
    };
    assert_eq!(data.len(), 2);
    assert_eq!(predicate.ejercicios, BTreeSet::from([2026]));
    assert_eq!(predicate.centros, BTreeSet::from(["023".to_owned(), "081".to_owned()]));
    assert_eq!(
      predicate.tipos,
      Some(BTreeSet::from(["AD".to_owned(), "AD FUTURA".to_owned()]))
    );
  }

  #[test]
  fn explicit_scope_overrides_and_validates() {
    let body = br#"{"type":"operaciones","scope":{"ejercicio":2026,"centro_gestor":"023","tipo_operacion":["AD"]},"data":[
      {"ejercicio":2025,"centro_gestor":"023","partida_economico":"1","tipo_operacion":"AD"}
    ]}"#;
    assert!(matches!(SaveBatch::parse(body), Err(Error::OutOfScope(_))));

    let clear = br#"{"type":"operaciones","scope":{"ejercicio":2026,"centro_gestor":"023","tipo_operacion":["AD"]},"data":[]}"#;
    let SaveBatch::Operaciones { predicate, .. } = SaveBatch::parse(clear).unwrap() else {
      panic!("expected operations batch");
    };
    assert!(!predicate.is_empty());
  }

  #[test]
  fn empty_derived_predicate_matches_nothing() {
    let batch = SaveBatch::parse(br#"{"type":"partidas","data":[]}"#).unwrap();
    let SaveBatch::Partidas { predicate, .. } = batch else {
      panic!("expected partidas batch");
    };
    assert!(predicate.is_empty());
    assert_eq!(predicate.tipos, None);
  }

  #[test]
  fn budget_lines_ignore_type_scope() {
    let body = br#"{"type":"partidas","scope":{"centro_gestor":"081","tipo_operacion":["AD"]},"data":[
      {"ejercicio":2026,"centro_gestor":"081","codigo":"22002","descripcion":"x"}
    ]}"#;
    let batch = SaveBatch::parse(body).unwrap();
    assert_eq!(batch.kind(), "partidas");
    assert_eq!(batch.len(), 1);
  }

  #[test]
  fn rejects_unknown_kind_and_bad_records() {
    assert!(matches!(
      SaveBatch::parse(br#"{"type":"centros","data":[]}"#),
      Err(Error::UnknownBatchKind(k)) if k == "centros"
    ));
    assert!(matches!(
      SaveBatch::parse(br#"{"type":"operaciones","data":[{"ejercicio":"x"}]}"#),
      Err(Error::InvalidPayload(_))
    ));
    assert!(SaveBatch::parse(b"not json").is_err());
  }
}
