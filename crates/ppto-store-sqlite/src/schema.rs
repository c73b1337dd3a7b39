//! SQL schema for the budget-execution SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS operaciones (
    id                   TEXT PRIMARY KEY,
    fecha                TEXT,            -- YYYY-MM-DD or NULL
    ejercicio            INTEGER NOT NULL,
    centro_gestor        TEXT NOT NULL,
    partida_economico    TEXT NOT NULL,
    descripcion          TEXT,
    tipo_operacion       TEXT NOT NULL,
    importe_total        REAL NOT NULL DEFAULT 0,  -- always a magnitude
    empresa              TEXT,
    cif_nif              TEXT,
    base_imponible       REAL,
    importe_iva          REAL,
    operacion_previa     TEXT,
    operacion_definitiva TEXT,
    expte_contratacion   TEXT,
    observaciones        TEXT,
    link_placsp          TEXT
);

-- Unique per (ejercicio, centro_gestor, codigo) in practice only.
CREATE TABLE IF NOT EXISTS partidas (
    id            TEXT PRIMARY KEY,
    ejercicio     INTEGER NOT NULL,
    centro_gestor TEXT NOT NULL,
    codigo        TEXT NOT NULL,
    descripcion   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS centros_gestores (
    id     TEXT PRIMARY KEY,
    codigo TEXT NOT NULL,
    nombre TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usuarios_autorizados (
    username     TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    added_at     TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE TABLE IF NOT EXISTS usuarios_admin (
    username      TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,  -- argon2 PHC string
    display_name  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS operaciones_scope_idx ON operaciones(ejercicio, centro_gestor);
CREATE INDEX IF NOT EXISTS operaciones_tipo_idx  ON operaciones(tipo_operacion);
CREATE INDEX IF NOT EXISTS partidas_scope_idx    ON partidas(ejercicio, centro_gestor);

PRAGMA user_version = 1;
";
