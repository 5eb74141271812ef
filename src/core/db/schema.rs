//! Database schema initialization and versioning

use rusqlite::OptionalExtension;
use tracing::info;

use super::{Database, SCHEMA_VERSION};
use crate::core::error::{StoreError, StoreResult};

impl Database {
    /// Create the schema on an empty database, or check the stored version
    pub(super) fn migrate(&mut self) -> StoreResult<()> {
        let has_version_table: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
                [],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if !has_version_table {
            self.init_schema()?;
            info!(version = SCHEMA_VERSION, "database schema created");
            return Ok(());
        }

        let found = self.schema_version()?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Version recorded in `schema_version` (0 when missing)
    pub fn schema_version(&self) -> StoreResult<i32> {
        Ok(self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get::<_, Option<i32>>(0)
            })
            .optional()?
            .flatten()
            .unwrap_or(0))
    }

    fn init_schema(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Administrators, client companies and engineers
            CREATE TABLE IF NOT EXISTS usuarios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nome TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                senha_hash TEXT NOT NULL,
                tipo_acesso TEXT NOT NULL
                    CHECK (tipo_acesso IN ('admin', 'cliente', 'engenheiro')),
                empresa TEXT,
                crea TEXT,
                ativo INTEGER NOT NULL DEFAULT 1,
                criado_em TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_usuarios_tipo ON usuarios(tipo_acesso);

            -- Pressure equipment, owned by a client company
            CREATE TABLE IF NOT EXISTS equipamentos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tag TEXT NOT NULL,
                tipo TEXT NOT NULL,
                categoria TEXT,
                empresa_id INTEGER NOT NULL REFERENCES usuarios(id),
                fabricante TEXT,
                numero_serie TEXT,
                ano_fabricacao INTEGER,
                pressao_projeto REAL,
                pressao_trabalho REAL,
                pmta REAL,
                volume REAL,
                fluido TEXT,
                classe_fluido TEXT,
                localizacao TEXT,
                possui_prontuario INTEGER NOT NULL DEFAULT 0,
                frequencia_manutencao INTEGER,
                data_ultima_manutencao TEXT,
                ativo INTEGER NOT NULL DEFAULT 1,
                criado_em TEXT NOT NULL,
                UNIQUE (empresa_id, tag)
            );
            CREATE INDEX IF NOT EXISTS idx_equipamentos_empresa ON equipamentos(empresa_id);

            -- Inspections performed on equipment
            CREATE TABLE IF NOT EXISTS inspecoes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                equipamento_id INTEGER NOT NULL REFERENCES equipamentos(id),
                engenheiro_id INTEGER NOT NULL REFERENCES usuarios(id),
                data_inspecao TEXT NOT NULL,
                tipo_inspecao TEXT NOT NULL,
                resultado TEXT,
                recomendacoes TEXT,
                proxima_inspecao TEXT,
                status TEXT NOT NULL,
                criado_em TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_inspecoes_equipamento ON inspecoes(equipamento_id);
            CREATE INDEX IF NOT EXISTS idx_inspecoes_engenheiro ON inspecoes(engenheiro_id);
            CREATE INDEX IF NOT EXISTS idx_inspecoes_status ON inspecoes(status);

            -- Issued PDF reports
            CREATE TABLE IF NOT EXISTS relatorios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                inspecao_id INTEGER NOT NULL REFERENCES inspecoes(id),
                data_emissao TEXT NOT NULL,
                link_arquivo TEXT NOT NULL,
                observacoes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_relatorios_inspecao ON relatorios(inspecao_id);
            "#,
        )?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
        tx.commit()?;
        Ok(())
    }
}
