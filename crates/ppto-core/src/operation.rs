//! Operations, the central fact record of budget execution, and the
//! taxonomy that gives their amounts a meaning.
//!
//! Amounts are stored as non-negative magnitudes. Whether an amount adds to
//! the allocation or consumes it is decided at read time by classifying the
//! operation's `tipo_operacion` tag.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ─── Record ──────────────────────────────────────────────────────────────────

/// A single budget operation: an allocation, an executed commitment, a
/// forecast, or any other tagged movement against a budget line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
  /// Opaque identifier. An empty id is replaced by a fresh UUID on save.
  #[serde(default)]
  pub id:                   String,
  #[serde(default, deserialize_with = "blank_date")]
  pub fecha:                Option<NaiveDate>,
  pub ejercicio:            i32,
  pub centro_gestor:        String,
  pub partida_economico:    String,
  #[serde(default)]
  pub descripcion:          Option<String>,
  pub tipo_operacion:       String,
  #[serde(default)]
  pub importe_total:        f64,

  // Contract tracking; all optional.
  #[serde(default)]
  pub empresa:              Option<String>,
  #[serde(default)]
  pub cif_nif:              Option<String>,
  #[serde(default)]
  pub base_imponible:       Option<f64>,
  #[serde(default)]
  pub importe_iva:          Option<f64>,
  #[serde(default)]
  pub operacion_previa:     Option<String>,
  #[serde(default)]
  pub operacion_definitiva: Option<String>,
  #[serde(default)]
  pub expte_contratacion:   Option<String>,
  #[serde(default)]
  pub observaciones:        Option<String>,
  #[serde(default)]
  pub link_placsp:          Option<String>,
}

impl Operation {
  /// A bare operation with every optional field empty.
  pub fn new(
    ejercicio: i32,
    centro_gestor: impl Into<String>,
    partida_economico: impl Into<String>,
    tipo_operacion: impl Into<String>,
    importe_total: f64,
  ) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      fecha: None,
      ejercicio,
      centro_gestor: centro_gestor.into(),
      partida_economico: partida_economico.into(),
      descripcion: None,
      tipo_operacion: tipo_operacion.into(),
      importe_total,
      empresa: None,
      cif_nif: None,
      base_imponible: None,
      importe_iva: None,
      operacion_previa: None,
      operacion_definitiva: None,
      expte_contratacion: None,
      observaciones: None,
      link_placsp: None,
    }
  }

  /// Bring the record into its storable form: amounts become magnitudes and
  /// a missing id is filled in.
  pub fn normalized(mut self) -> Self {
    if self.id.trim().is_empty() {
      self.id = Uuid::new_v4().to_string();
    }
    self.importe_total  = self.importe_total.abs();
    self.base_imponible = self.base_imponible.map(f64::abs);
    self.importe_iva    = self.importe_iva.map(f64::abs);
    self
  }

  pub fn in_scope(&self, ejercicio: i32, centro_gestor: &str) -> bool {
    self.ejercicio == ejercicio && self.centro_gestor == centro_gestor
  }
}

/// Accepts `null`, `""`, `YYYY-MM-DD`, or a timestamp whose first ten
/// characters are a date.
fn blank_date<'de, D>(de: D) -> Result<Option<NaiveDate>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(de)?;
  let Some(raw) = raw else { return Ok(None) };
  let s = raw.trim();
  if s.is_empty() {
    return Ok(None);
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .or_else(|e| match s.get(..10) {
      Some(head) => NaiveDate::parse_from_str(head, "%Y-%m-%d"),
      None => Err(e),
    })
    .map(Some)
    .map_err(serde::de::Error::custom)
}

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// The aggregate class an operation tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
  /// Allocation; added to the available balance.
  Budget,
  /// Executed or committed expenditure; subtracted.
  Executed,
  /// Anticipated expenditure; subtracted only when forecasts are included.
  Forecast,
  /// Any other tag. Listed in filters, never aggregated.
  Inert,
}

pub const DEFAULT_BUDGET_TAGS: &[&str] = &["PPTO2026"];
pub const DEFAULT_EXECUTED_TAGS: &[&str] =
  &["AD", "AD FUTURA", "AD FUTURA BARRADA", "A FUTURA DEFINITIVA"];
pub const DEFAULT_FORECAST_TAGS: &[&str] = &["Previsión", "Previsión-I"];

/// Maps `tipo_operacion` tags onto [`OperationClass`]es.
///
/// The tag sets are disjoint in practice; if a tag is configured in more than
/// one set, budget wins over executed, which wins over forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
  pub budget:   Vec<String>,
  pub executed: Vec<String>,
  pub forecast: Vec<String>,
}

impl Default for Classifier {
  fn default() -> Self {
    Self::new(
      DEFAULT_BUDGET_TAGS.iter().copied(),
      DEFAULT_EXECUTED_TAGS.iter().copied(),
      DEFAULT_FORECAST_TAGS.iter().copied(),
    )
  }
}

impl Classifier {
  pub fn new<B, E, F>(budget: B, executed: E, forecast: F) -> Self
  where
    B: IntoIterator,
    B::Item: Into<String>,
    E: IntoIterator,
    E::Item: Into<String>,
    F: IntoIterator,
    F::Item: Into<String>,
  {
    Self {
      budget:   budget.into_iter().map(Into::into).collect(),
      executed: executed.into_iter().map(Into::into).collect(),
      forecast: forecast.into_iter().map(Into::into).collect(),
    }
  }

  pub fn classify(&self, tipo_operacion: &str) -> OperationClass {
    let has = |tags: &[String]| tags.iter().any(|t| t == tipo_operacion);
    if has(&self.budget) {
      OperationClass::Budget
    } else if has(&self.executed) {
      OperationClass::Executed
    } else if has(&self.forecast) {
      OperationClass::Forecast
    } else {
      OperationClass::Inert
    }
  }

  /// The tags that make up `class`. Inert has no enumerable tag set.
  pub fn tags(&self, class: OperationClass) -> Option<&[String]> {
    match class {
      OperationClass::Budget => Some(&self.budget),
      OperationClass::Executed => Some(&self.executed),
      OperationClass::Forecast => Some(&self.forecast),
      OperationClass::Inert => None,
    }
  }

  /// The tag stamped on records imported into `class`: the first configured
  /// tag of the set.
  pub fn primary_tag(&self, class: OperationClass) -> Option<&str> {
    self.tags(class)?.iter().next().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_taxonomy() {
    let c = Classifier::default();
    assert_eq!(c.classify("PPTO2026"), OperationClass::Budget);
    assert_eq!(c.classify("AD"), OperationClass::Executed);
    assert_eq!(c.classify("A FUTURA DEFINITIVA"), OperationClass::Executed);
    assert_eq!(c.classify("Previsión-I"), OperationClass::Forecast);
    assert_eq!(c.classify("RC"), OperationClass::Inert);
    // Tags are matched exactly.
    assert_eq!(c.classify("ad"), OperationClass::Inert);
    assert_eq!(c.classify("Prevision"), OperationClass::Inert);
  }

  #[test]
  fn normalized_forces_magnitudes_and_id() {
    let mut op = Operation::new(2026, "023", "22002", "AD", -300.0);
    op.id = "  ".into();
    op.importe_iva = Some(-21.0);

    let op = op.normalized();
    assert_eq!(op.importe_total, 300.0);
    assert_eq!(op.importe_iva, Some(21.0));
    assert_eq!(op.base_imponible, None);
    assert!(Uuid::parse_str(&op.id).is_ok());
  }

  #[test]
  fn operation_deserializes_with_optional_fields_missing() {
    let op: Operation = serde_json::from_str(
      r#"{"ejercicio":2026,"centro_gestor":"023","partida_economico":"22002",
          "tipo_operacion":"AD","importe_total":12.5,"fecha":"2026-03-01"}"#,
    )
    .unwrap();
    assert_eq!(op.id, "");
    assert_eq!(op.fecha, NaiveDate::from_ymd_opt(2026, 3, 1));
    assert!(op.empresa.is_none());
  }

  #[test]
  fn blank_and_timestamp_dates() {
    let base = r#""ejercicio":2026,"centro_gestor":"023","partida_economico":"1","tipo_operacion":"AD""#;
    let op: Operation = serde_json::from_str(&format!(r#"{{{base},"fecha":""}}"#)).unwrap();
    assert_eq!(op.fecha, None);
    let op: Operation =
      serde_json::from_str(&format!(r#"{{{base},"fecha":"2026-01-15T10:00:00.000Z"}}"#)).unwrap();
    assert_eq!(op.fecha, NaiveDate::from_ymd_opt(2026, 1, 15));
    assert!(serde_json::from_str::<Operation>(&format!(r#"{{{base},"fecha":"15/01"}}"#)).is_err());
  }

  #[test]
  fn primary_tag_is_first_configured() {
    let c = Classifier::default();
    assert_eq!(c.primary_tag(OperationClass::Budget), Some("PPTO2026"));
    assert_eq!(c.primary_tag(OperationClass::Executed), Some("AD"));
    assert_eq!(c.primary_tag(OperationClass::Forecast), Some("Previsión"));
    assert_eq!(c.primary_tag(OperationClass::Inert), None);
  }
}
