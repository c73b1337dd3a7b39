//! Reference catalogs: budget lines and management centers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A budget line ("partida") of a management center for one fiscal year.
///
/// Unique in practice per `(ejercicio, centro_gestor, codigo)`; the store
/// does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLine {
  #[serde(default)]
  pub id:            String,
  pub ejercicio:     i32,
  pub centro_gestor: String,
  /// Economic classification code, e.g. `22002`.
  pub codigo:        String,
  #[serde(default)]
  pub descripcion:   String,
}

impl BudgetLine {
  pub fn new(
    ejercicio: i32,
    centro_gestor: impl Into<String>,
    codigo: impl Into<String>,
    descripcion: impl Into<String>,
  ) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      ejercicio,
      centro_gestor: centro_gestor.into(),
      codigo: codigo.into(),
      descripcion: descripcion.into(),
    }
  }

  pub fn normalized(mut self) -> Self {
    if self.id.trim().is_empty() {
      self.id = Uuid::new_v4().to_string();
    }
    self
  }
}

/// An organizational unit that manages part of the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementCenter {
  pub id:     String,
  pub codigo: String,
  pub nombre: String,
}

/// Input for creating a [`ManagementCenter`]; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewManagementCenter {
  pub codigo: String,
  pub nombre: String,
}

/// The management centers every fresh store starts with.
pub const DEFAULT_CENTERS: &[(&str, &str, &str)] = &[
  ("1", "023", "Informática"),
  ("2", "081", "Telecomunicaciones"),
  ("3", "711", "Smart City"),
];

/// The budget lines every fresh store starts with: `(id, codigo, descripcion)`
/// for center `023`, fiscal year 2026.
pub const DEFAULT_BUDGET_LINES: &[(&str, &str, &str)] = &[
  ("1", "22002", "Material de oficina"),
  ("2", "21600", "Equipos informáticos"),
  ("3", "22799", "Otros trabajos empresas"),
  ("4", "22100", "Energía eléctrica"),
  ("5", "22101", "Agua"),
  ("6", "22200", "Telecomunicaciones"),
  ("7", "22699", "Otros gastos diversos"),
  ("8", "21200", "Edificios y construcciones"),
  ("9", "21300", "Maquinaria y instalaciones"),
  ("10", "21400", "Elementos de transporte"),
];

pub const DEFAULT_BUDGET_LINE_CENTER: &str = "023";
pub const DEFAULT_BUDGET_LINE_YEAR: i32 = 2026;
