//! Router tests against an in-memory SQLite store.

use axum::{
  body::Body,
  http::{HeaderMap, Request, StatusCode, header},
};
use ppto_core::store::BudgetStore;
use ppto_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{ApiConfig, AppState, api_router};

async fn make_state(config: ApiConfig) -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(store, config)
}

struct Reply {
  status:  StatusCode,
  headers: HeaderMap,
  body:    Vec<u8>,
}

impl Reply {
  fn json(&self) -> Value { serde_json::from_slice(&self.body).unwrap() }

  fn text(&self) -> String { String::from_utf8(self.body.clone()).unwrap() }

  /// `ppto_session=<token>` from the `Set-Cookie` header.
  fn cookie(&self) -> String {
    let set = self.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    set.split(';').next().unwrap().to_owned()
  }
}

async fn send(
  state:  &AppState<SqliteStore>,
  method: &str,
  uri:    &str,
  cookie: Option<&str>,
  body:   impl Into<Body>,
) -> Reply {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(c) = cookie {
    builder = builder.header(header::COOKIE, c);
  }
  let req = builder.body(body.into()).unwrap();
  let resp = api_router(state.clone()).oneshot(req).await.unwrap();

  let status = resp.status();
  let headers = resp.headers().clone();
  let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap()
    .to_vec();
  Reply { status, headers, body }
}

async fn login(state: &AppState<SqliteStore>, username: &str, password: &str) -> String {
  let body = json!({ "username": username, "password": password }).to_string();
  let reply = send(state, "POST", "/auth", None, body).await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
  reply.cookie()
}

async fn admin(state: &AppState<SqliteStore>) -> String { login(state, "admin", "admin").await }

// ─── Sign-in ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_login_sets_session_cookie() {
  let state = make_state(ApiConfig::default()).await;
  let body = json!({ "username": "admin", "password": "admin" }).to_string();
  let reply = send(&state, "POST", "/auth", None, body).await;

  assert_eq!(reply.status, StatusCode::OK);
  let set = reply.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
  assert!(set.starts_with("ppto_session="));
  assert!(set.contains("HttpOnly"));
  assert!(set.contains("Max-Age=86400"));

  let v = reply.json();
  assert_eq!(v["success"], true);
  assert_eq!(v["user"]["username"], "admin");
  assert_eq!(v["user"]["displayName"], "Administrador");
  assert_eq!(v["user"]["role"], "admin");

  let status = send(&state, "GET", "/auth", Some(&reply.cookie()), Body::empty()).await;
  assert_eq!(status.json()["authenticated"], true);
  assert_eq!(status.json()["user"]["role"], "admin");
}

#[tokio::test]
async fn unknown_user_is_unauthorized() {
  let state = make_state(ApiConfig::default()).await;
  let body = json!({ "username": "ghost", "password": "x" }).to_string();
  let reply = send(&state, "POST", "/auth", None, body).await;

  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
  assert_eq!(reply.json()["success"], false);
  assert!(reply.headers.get(header::SET_COOKIE).is_none());

  let wrong = json!({ "username": "admin", "password": "nope" }).to_string();
  assert_eq!(send(&state, "POST", "/auth", None, wrong).await.status, StatusCode::UNAUTHORIZED);

  let missing = json!({ "password": "x" }).to_string();
  assert_eq!(send(&state, "POST", "/auth", None, missing).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn data_routes_require_a_session() {
  let state = make_state(ApiConfig::default()).await;

  for uri in ["/data", "/centros", "/summary?ejercicio=2026&centro_gestor=023"] {
    let reply = send(&state, "GET", uri, None, Body::empty()).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
    assert_eq!(reply.json()["success"], false);
  }

  let forged = send(&state, "GET", "/data", Some("ppto_session=deadbeef"), Body::empty()).await;
  assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

  let anon = send(&state, "GET", "/auth", None, Body::empty()).await;
  assert_eq!(anon.json(), json!({ "authenticated": false }));
}

#[tokio::test]
async fn directory_users_sign_in_when_trusted() {
  let state = make_state(ApiConfig::default()).await;
  state
    .store
    .add_authorized_user("mgarcia".into(), "María García".into())
    .await
    .unwrap();

  let body = json!({ "username": "mgarcia", "password": "" }).to_string();
  let reply = send(&state, "POST", "/auth", None, body.clone()).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.json()["user"]["role"], "user");
  assert_eq!(reply.json()["user"]["displayName"], "María García");

  let cookie = reply.cookie();
  let users = send(&state, "GET", "/auth/users", Some(&cookie), Body::empty()).await;
  assert_eq!(users.status, StatusCode::FORBIDDEN);
  let data = send(&state, "GET", "/data", Some(&cookie), Body::empty()).await;
  assert_eq!(data.status, StatusCode::OK);

  let strict = make_state(ApiConfig { trust_directory_users: false, ..ApiConfig::default() }).await;
  strict
    .store
    .add_authorized_user("mgarcia".into(), "María García".into())
    .await
    .unwrap();
  let refused = send(&strict, "POST", "/auth", None, body).await;
  assert_eq!(refused.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_the_session() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let out = send(&state, "DELETE", "/auth", Some(&cookie), Body::empty()).await;
  assert_eq!(out.status, StatusCode::OK);
  let cleared = out.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
  assert!(cleared.contains("Max-Age=0"));

  let after = send(&state, "GET", "/data", Some(&cookie), Body::empty()).await;
  assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

// ─── Save and summary ────────────────────────────────────────────────────────

#[tokio::test]
async fn save_then_summarize_scope() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let batch = json!({
    "type": "operaciones",
    "data": [
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "PPTO2026", "importe_total": 1000 },
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "AD", "importe_total": -300, "fecha": "" }
    ]
  });
  let saved = send(&state, "POST", "/save", Some(&cookie), batch.to_string()).await;
  assert_eq!(saved.status, StatusCode::OK, "{}", saved.text());
  assert_eq!(saved.json(), json!({ "success": true, "deleted": 0, "inserted": 2 }));

  let again = send(&state, "POST", "/save", Some(&cookie), batch.to_string()).await;
  assert_eq!(again.json()["deleted"], 2);

  let reply = send(
    &state,
    "GET",
    "/summary?ejercicio=2026&centro_gestor=023",
    Some(&cookie),
    Body::empty(),
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
  let v = reply.json();
  assert_eq!(v["summary"]["totalPresupuesto"], 1000.0);
  assert_eq!(v["summary"]["totalEjecutado"], 300.0);
  assert_eq!(v["summary"]["disponibleContabilidad"], 700.0);
  assert_eq!(v["summary"]["porcentajeEjecutado"], 30.0);
  assert_eq!(v["lineas"][0]["partida"], "22002");
  assert_eq!(v["lineas"][0]["descripcion"], "Material de oficina");
  assert_eq!(v["lineas"][0]["saldo"], 700.0);
  assert_eq!(v["totalSaldo"], 700.0);
  assert_eq!(v["incluirPrevision"], false);
  assert_eq!(
    v["porTipo"],
    json!([
      { "key": "AD", "count": 1, "total": 300.0 },
      { "key": "PPTO2026", "count": 1, "total": 1000.0 }
    ])
  );
}

#[tokio::test]
async fn summary_needs_a_scope() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let missing = send(&state, "GET", "/summary?ejercicio=2026", Some(&cookie), Body::empty()).await;
  assert_eq!(missing.status, StatusCode::BAD_REQUEST);

  let garbled =
    send(&state, "GET", "/summary?ejercicio=dos&centro_gestor=023", Some(&cookie), Body::empty())
      .await;
  assert_eq!(garbled.status, StatusCode::BAD_REQUEST);
  assert_eq!(garbled.json()["success"], false);
}

#[tokio::test]
async fn save_validates_payload_and_scope() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let outside = json!({
    "type": "operaciones",
    "scope": { "ejercicio": 2026, "centro_gestor": "023", "tipo_operacion": ["AD"] },
    "data": [{ "ejercicio": 2026, "centro_gestor": "081", "partida_economico": "1",
               "tipo_operacion": "AD" }]
  });
  let reply = send(&state, "POST", "/save", Some(&cookie), outside.to_string()).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let unknown = json!({ "type": "centros", "data": [] });
  let reply = send(&state, "POST", "/save", Some(&cookie), unknown.to_string()).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let reply = send(&state, "POST", "/save", Some(&cookie), "{").await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resave_after_editing_the_year() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;
  let batch = |ejercicio: i32| {
    json!({
      "type": "operaciones",
      "data": [{ "id": "op-1", "ejercicio": ejercicio, "centro_gestor": "023",
                 "partida_economico": "22002", "tipo_operacion": "AD",
                 "importe_total": 40 }]
    })
    .to_string()
  };

  let first = send(&state, "POST", "/save", Some(&cookie), batch(2025)).await;
  assert_eq!(first.status, StatusCode::OK);

  let edited = send(&state, "POST", "/save", Some(&cookie), batch(2026)).await;
  assert_eq!(edited.status, StatusCode::OK, "{}", edited.text());
  assert_eq!(edited.json(), json!({ "success": true, "deleted": 1, "inserted": 1 }));

  let stored = state.store.get_operation("op-1".into()).await.unwrap().unwrap();
  assert_eq!(stored.ejercicio, 2026);
  assert_eq!(state.store.list_operations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn save_budget_lines_replaces_catalog_scope() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let batch = json!({
    "type": "partidas",
    "data": [{ "ejercicio": 2026, "centro_gestor": "023", "codigo": "22002",
               "descripcion": "Material" }]
  });
  let reply = send(&state, "POST", "/save", Some(&cookie), batch.to_string()).await;
  assert_eq!(reply.json(), json!({ "success": true, "deleted": 10, "inserted": 1 }));

  let snapshot = send(&state, "GET", "/data", Some(&cookie), Body::empty()).await.json();
  assert_eq!(snapshot["partidas"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn snapshot_shape() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let batch = json!({
    "type": "operaciones",
    "data": [
      { "ejercicio": 2026, "centro_gestor": "081", "partida_economico": "22200",
        "tipo_operacion": "AD", "importe_total": 5 },
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "Previsión", "importe_total": 5 }
    ]
  });
  send(&state, "POST", "/save", Some(&cookie), batch.to_string()).await;

  let v = send(&state, "GET", "/data", Some(&cookie), Body::empty()).await.json();
  assert_eq!(v["source_file"], "SQLite Database");
  assert_eq!(v["sheet"], "contabilidad.db");
  assert!(v["generated_at"].is_string());
  assert_eq!(v["records"].as_array().unwrap().len(), 2);
  assert_eq!(v["domains"]["centro_gestor"], json!(["023", "081"]));
  assert_eq!(v["domains"]["tipo_operacion"], json!(["AD", "Previsión"]));
  assert_eq!(v["partidas"].as_array().unwrap().len(), 10);
  assert_eq!(v["centros_gestores"].as_array().unwrap().len(), 3);
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn manage_authorized_users() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let incomplete = json!({ "username": "jlopez" }).to_string();
  let reply = send(&state, "POST", "/auth/users", Some(&cookie), incomplete).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let body = json!({ "username": "jlopez", "displayName": "J. López" }).to_string();
  let reply = send(&state, "POST", "/auth/users", Some(&cookie), body).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.json()["user"]["displayName"], "J. López");

  let list = send(&state, "GET", "/auth/users", Some(&cookie), Body::empty()).await.json();
  assert_eq!(list["users"][0]["username"], "jlopez");
  assert!(list["users"][0]["addedAt"].is_string());

  let reply = send(&state, "DELETE", "/auth/users", Some(&cookie), Body::empty()).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let reply =
    send(&state, "DELETE", "/auth/users?username=jlopez", Some(&cookie), Body::empty()).await;
  assert_eq!(reply.json(), json!({ "success": true, "removed": true }));
}

#[tokio::test]
async fn change_admin_password() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;
  let change = |username: &str, current: &str, new: &str| {
    json!({ "username": username, "currentPassword": current, "newPassword": new }).to_string()
  };

  let reply = send(
    &state,
    "POST",
    "/auth/change-password",
    Some(&cookie),
    change("admin", "wrong", "s3cret"),
  )
  .await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

  let reply = send(
    &state,
    "POST",
    "/auth/change-password",
    Some(&cookie),
    change("root", "admin", "s3cret"),
  )
  .await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);

  let reply =
    send(&state, "POST", "/auth/change-password", Some(&cookie), change("admin", "admin", ""))
      .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let reply = send(
    &state,
    "POST",
    "/auth/change-password",
    Some(&cookie),
    change("admin", "admin", "s3cret"),
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK);

  login(&state, "admin", "s3cret").await;
  let old = json!({ "username": "admin", "password": "admin" }).to_string();
  assert_eq!(send(&state, "POST", "/auth", None, old).await.status, StatusCode::UNAUTHORIZED);
}

// ─── Centers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn centers_are_admin_managed() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;
  state
    .store
    .add_authorized_user("viewer".into(), "Viewer".into())
    .await
    .unwrap();
  let viewer = login(&state, "viewer", "").await;

  let body = json!({ "codigo": "100", "nombre": "Urbanismo" }).to_string();
  let refused = send(&state, "POST", "/centros", Some(&viewer), body.clone()).await;
  assert_eq!(refused.status, StatusCode::FORBIDDEN);

  let created = send(&state, "POST", "/centros", Some(&cookie), body).await;
  assert_eq!(created.status, StatusCode::CREATED);
  let id = created.json()["id"].as_str().unwrap().to_owned();

  let list = send(&state, "GET", "/centros", Some(&viewer), Body::empty()).await.json();
  assert_eq!(list.as_array().unwrap().len(), 4);

  let uri = format!("/centros/{id}");
  assert_eq!(send(&state, "DELETE", &uri, Some(&cookie), Body::empty()).await.status, StatusCode::OK);
  assert_eq!(
    send(&state, "DELETE", &uri, Some(&cookie), Body::empty()).await.status,
    StatusCode::NOT_FOUND
  );
}

// ─── Spreadsheets ────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_then_import_into_another_center() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let batch = json!({
    "type": "operaciones",
    "data": [
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "AD", "importe_total": 120.5, "descripcion": "Toner" },
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "21600",
        "tipo_operacion": "AD FUTURA", "importe_total": 900 },
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "PPTO2026", "importe_total": 5000 }
    ]
  });
  send(&state, "POST", "/save", Some(&cookie), batch.to_string()).await;

  let csv = send(
    &state,
    "GET",
    "/export/ejecutado?ejercicio=2026&centro_gestor=023",
    Some(&cookie),
    Body::empty(),
  )
  .await;
  assert_eq!(csv.status, StatusCode::OK);
  assert!(
    csv.headers[header::CONTENT_TYPE]
      .to_str()
      .unwrap()
      .starts_with("text/csv")
  );
  let text = csv.text();
  assert!(text.starts_with("Ejercicio,CentroGestor,Partida,Importe,Descripcion"));
  assert_eq!(text.lines().count(), 3);

  let imported = send(
    &state,
    "POST",
    "/import/ejecutado?ejercicio=2026&centro_gestor=081",
    Some(&cookie),
    csv.body.clone(),
  )
  .await;
  assert_eq!(imported.status, StatusCode::OK, "{}", imported.text());
  assert_eq!(imported.json(), json!({ "success": true, "imported": 2 }));

  let v = send(
    &state,
    "GET",
    "/summary?ejercicio=2026&centro_gestor=081",
    Some(&cookie),
    Body::empty(),
  )
  .await
  .json();
  assert_eq!(v["summary"]["totalEjecutado"], 1020.5);
}

#[tokio::test]
async fn xlsx_export_imports_into_another_center() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let batch = json!({
    "type": "operaciones",
    "data": [
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "PPTO2026", "importe_total": 5000 },
      { "ejercicio": 2026, "centro_gestor": "023", "partida_economico": "22002",
        "tipo_operacion": "AD", "importe_total": 75 }
    ]
  });
  send(&state, "POST", "/save", Some(&cookie), batch.to_string()).await;

  let xlsx = send(
    &state,
    "GET",
    "/export/presupuesto?ejercicio=2026&centro_gestor=023&format=xlsx",
    Some(&cookie),
    Body::empty(),
  )
  .await;
  assert_eq!(xlsx.status, StatusCode::OK);
  assert_eq!(
    xlsx.headers[header::CONTENT_TYPE],
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
  );
  assert_eq!(
    xlsx.headers[header::CONTENT_DISPOSITION],
    "attachment; filename=\"presupuesto_023_2026.xlsx\""
  );
  assert!(xlsx.body.starts_with(b"PK\x03\x04"));

  let imported = send(
    &state,
    "POST",
    "/import/presupuesto?ejercicio=2026&centro_gestor=711",
    Some(&cookie),
    xlsx.body.clone(),
  )
  .await;
  assert_eq!(imported.status, StatusCode::OK, "{}", imported.text());
  assert_eq!(imported.json()["imported"], 1);

  let v = send(
    &state,
    "GET",
    "/summary?ejercicio=2026&centro_gestor=711",
    Some(&cookie),
    Body::empty(),
  )
  .await
  .json();
  assert_eq!(v["summary"]["totalPresupuesto"], 5000.0);
  assert_eq!(v["summary"]["totalEjecutado"], 0.0);

  let bad = send(
    &state,
    "GET",
    "/export/presupuesto?ejercicio=2026&centro_gestor=023&format=pdf",
    Some(&cookie),
    Body::empty(),
  )
  .await;
  assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn import_budget_lines_and_bad_uploads() {
  let state = make_state(ApiConfig::default()).await;
  let cookie = admin(&state).await;

  let lines = "Codigo;Descripcion\n62600;Sensores\n64100;Licencias\n";
  let reply = send(
    &state,
    "POST",
    "/import/partidas?ejercicio=2026&centro_gestor=711",
    Some(&cookie),
    lines,
  )
  .await;
  assert_eq!(reply.json(), json!({ "success": true, "imported": 2 }));

  let untyped = send(
    &state,
    "POST",
    "/import/operaciones?ejercicio=2026&centro_gestor=711",
    Some(&cookie),
    "Partida,Importe\n62600,10\n",
  )
  .await;
  assert_eq!(untyped.status, StatusCode::BAD_REQUEST);

  let typed = send(
    &state,
    "POST",
    "/import/operaciones?ejercicio=2026&centro_gestor=711&tipo_operacion=RC",
    Some(&cookie),
    "Partida,Importe\n62600,10\n",
  )
  .await;
  assert_eq!(typed.json()["imported"], 1);

  let bad_amount = send(
    &state,
    "POST",
    "/import/presupuesto?ejercicio=2026&centro_gestor=711",
    Some(&cookie),
    "Partida,Importe\n62600,mucho\n",
  )
  .await;
  assert_eq!(bad_amount.status, StatusCode::BAD_REQUEST);
  assert!(bad_amount.json()["error"].as_str().unwrap().contains("row 2"));

  let bad_xlsx = send(
    &state,
    "POST",
    "/import/presupuesto?ejercicio=2026&centro_gestor=711&format=xlsx",
    Some(&cookie),
    "not a workbook",
  )
  .await;
  assert_eq!(bad_xlsx.status, StatusCode::BAD_REQUEST);

  let unknown = send(
    &state,
    "GET",
    "/export/centros?ejercicio=2026&centro_gestor=711",
    Some(&cookie),
    Body::empty(),
  )
  .await;
  assert_eq!(unknown.status, StatusCode::NOT_FOUND);

  let catalog = state
    .store
    .list_budget_lines_in_scope(ppto_core::aggregate::Scope::new(2026, "711"))
    .await
    .unwrap();
  assert_eq!(catalog.len(), 2);
}
