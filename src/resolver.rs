//! Resolução de conexões a partir do nome configurado
//!
//! Um nome de conexão como `postgresql_dw_prod` é quebrado em `_`: o primeiro
//! token é o tipo do backend (`postgresql`) e o último é o sufixo (`prod`) que
//! escolhe entre vários conjuntos de credenciais do mesmo tipo. Os campos são
//! buscados no mapa plano de credenciais pela chave `{campo}_{tipo}_{sufixo}`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::{Connections, EdlConfig};
use crate::error::{ConfigError, ETLError, Result};
use crate::types::Phase;

/// Campos de credencial resolvidos por `{campo}_{tipo}_{sufixo}`
pub const CREDENTIAL_FIELDS: [&str; 6] = [
    "myserver",
    "mydatabase",
    "myusername",
    "mypassword",
    "mycharset",
    "myencoding",
];

/// Chave lida literalmente, sem tipo nem sufixo
pub const ORACLE_CLIENT_DIR_KEY: &str = "myoracle_client_dir";

/// Família de backend indicada pelo token de tipo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    Postgres,
    MySql,
    Sqlite,
    /// Postgres-compatível, carregado via staging em S3 + COPY
    Redshift,
    DynamoDb,
}

impl BackendKind {
    pub fn from_type_token(token: &str) -> Result<Self> {
        let lower = token.to_lowercase();
        if lower.contains("redshift") {
            return Ok(BackendKind::Redshift);
        }

        match lower.as_str() {
            "postgres" | "postgresql" | "psql" => Ok(BackendKind::Postgres),
            "mysql" | "mariadb" => Ok(BackendKind::MySql),
            "sqlite" => Ok(BackendKind::Sqlite),
            "dynamodb" => Ok(BackendKind::DynamoDb),
            _ => Err(ETLError::Config(ConfigError::UnknownBackend(token.to_string()))),
        }
    }

    pub fn is_sql(&self) -> bool {
        !matches!(self, BackendKind::DynamoDb)
    }

    /// Backends que recebem upload via arquivo de staging
    pub fn uses_staging(&self) -> bool {
        matches!(self, BackendKind::Redshift)
    }

    /// Esquema de URL usado pelo driver sqlx
    pub fn url_scheme(&self) -> Option<&'static str> {
        match self {
            BackendKind::Postgres | BackendKind::Redshift => Some("postgres"),
            BackendKind::MySql => Some("mysql"),
            BackendKind::Sqlite => Some("sqlite"),
            BackendKind::DynamoDb => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Postgres => "postgres",
            BackendKind::MySql => "mysql",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Redshift => "redshift",
            BackendKind::DynamoDb => "dynamodb",
        };
        f.write_str(name)
    }
}

/// Nome de conexão decomposto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionName {
    pub raw: String,
    pub type_token: String,
    pub suffix: String,
}

impl ConnectionName {
    pub fn parse(raw: &str) -> Self {
        let mut tokens = raw.split('_');
        let type_token = tokens.next().unwrap_or_default().to_string();
        let suffix = raw.rsplit('_').next().unwrap_or_default().to_string();

        Self {
            raw: raw.to_string(),
            type_token,
            suffix,
        }
    }

    /// Chave de credencial `{campo}_{tipo}_{sufixo}`
    pub fn credential_key(&self, field: &str) -> String {
        format!("{}_{}_{}", field, self.type_token, self.suffix)
    }
}

/// Credenciais AWS de um sufixo
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

impl AwsCredentials {
    /// Lê `aws_access_key_id_{sufixo}`, `aws_secret_access_key_{sufixo}` e `region_name_{sufixo}`
    pub fn from_connections(connections: &Connections, suffix: &str) -> Result<Self> {
        Ok(Self {
            access_key_id: connections
                .require(&format!("aws_access_key_id_{}", suffix))?
                .to_string(),
            secret_access_key: connections
                .require(&format!("aws_secret_access_key_{}", suffix))?
                .to_string(),
            region: connections
                .require(&format!("region_name_{}", suffix))?
                .to_string(),
        })
    }

    /// Conjunto usado pelo COPY do Redshift (`..._aws_{sufixo}`)
    pub fn for_copy(connections: &Connections, suffix: &str) -> Result<Self> {
        Self::from_connections(connections, &format!("aws_{}", suffix))
    }
}

/// Registro de conexão resolvido para uma entrada
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub name: String,
    pub kind: BackendKind,
    pub type_token: String,
    pub suffix: String,
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub charset: String,
    pub encoding: String,
    pub oracle_client_dir: String,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("charset", &self.charset)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl ConnectionInfo {
    /// Monta o registro; campos ausentes viram string vazia
    pub fn resolve(connection: &str, connections: &Connections) -> Result<Self> {
        let name = ConnectionName::parse(connection);
        let kind = BackendKind::from_type_token(&name.type_token)?;
        let lookup = |field: &str| connections.get_or_empty(&name.credential_key(field));

        Ok(Self {
            kind,
            server: lookup("myserver"),
            database: lookup("mydatabase"),
            username: lookup("myusername"),
            password: lookup("mypassword"),
            charset: lookup("mycharset"),
            encoding: lookup("myencoding"),
            oracle_client_dir: connections.get_or_empty(ORACLE_CLIENT_DIR_KEY),
            name: name.raw,
            type_token: name.type_token,
            suffix: name.suffix,
        })
    }
}

/// Conexões resolvidas de todas as fases
///
/// A resolução acontece na construção; um tipo desconhecido fica registrado
/// como erro da entrada e só aparece quando a entrada é processada.
#[derive(Debug, Default)]
pub struct ConnectionResolver {
    resolved: HashMap<Phase, BTreeMap<String, std::result::Result<ConnectionInfo, String>>>,
}

impl ConnectionResolver {
    pub fn new(config: &EdlConfig, connections: &Connections) -> Self {
        let mut resolved = HashMap::new();

        for phase in Phase::ALL {
            let Some(names) = config.connection_names(phase) else {
                continue;
            };

            let entries = names
                .into_iter()
                .map(|(key, connection)| {
                    let info = ConnectionInfo::resolve(&connection, connections)
                        .map_err(|e| e.to_string());
                    debug!(
                        phase = %phase,
                        key = %key,
                        connection = %connection,
                        ok = info.is_ok(),
                        "Conexão resolvida"
                    );
                    (key, info)
                })
                .collect();

            resolved.insert(phase, entries);
        }

        Self { resolved }
    }

    pub fn resolve(&self, phase: Phase, key: &str) -> Result<&ConnectionInfo> {
        let entry = self
            .resolved
            .get(&phase)
            .and_then(|entries| entries.get(key))
            .ok_or_else(|| {
                ETLError::Config(ConfigError::MissingRequiredParameter(format!(
                    "{}.entries.{}",
                    phase, key
                )))
            })?;

        entry
            .as_ref()
            .map_err(|e| ETLError::Config(ConfigError::InvalidConfig(e.clone())))
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        self.resolved.contains_key(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connections() -> Connections {
        Connections::from_map([
            ("myserver_postgresql_prod", "db.prod"),
            ("mydatabase_postgresql_prod", "dw"),
            ("myusername_postgresql_prod", "etl"),
            ("mypassword_postgresql_prod", "segredo"),
            ("myserver_mysql_dev", "mysql.dev"),
            ("mycharset_mysql_dev", "utf8mb4"),
            ("myoracle_client_dir", "/opt/oracle"),
            ("aws_access_key_id_prod", "AKIA"),
            ("aws_secret_access_key_prod", "sk"),
            ("region_name_prod", "us-east-1"),
            ("aws_access_key_id_aws_prod", "AKIA2"),
            ("aws_secret_access_key_aws_prod", "sk2"),
            ("region_name_aws_prod", "sa-east-1"),
        ])
    }

    #[test]
    fn test_parse_connection_name() {
        let name = ConnectionName::parse("postgresql_dw_prod");
        assert_eq!(name.type_token, "postgresql");
        assert_eq!(name.suffix, "prod");
        assert_eq!(name.credential_key("myserver"), "myserver_postgresql_prod");

        let single = ConnectionName::parse("sqlite");
        assert_eq!(single.type_token, "sqlite");
        assert_eq!(single.suffix, "sqlite");
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!(BackendKind::from_type_token("psql").unwrap(), BackendKind::Postgres);
        assert_eq!(BackendKind::from_type_token("mariadb").unwrap(), BackendKind::MySql);
        assert_eq!(
            BackendKind::from_type_token("redshiftstaging").unwrap(),
            BackendKind::Redshift
        );
        assert!(!BackendKind::from_type_token("dynamodb").unwrap().is_sql());
        assert!(BackendKind::from_type_token("oracle").is_err());
    }

    #[test]
    fn test_credential_lookup_table() {
        let connections = connections();
        let cases = [
            ("postgresql_dw_prod", "myserver", "db.prod"),
            ("postgresql_dw_prod", "mydatabase", "dw"),
            ("postgresql_dw_prod", "mypassword", "segredo"),
            ("postgresql_dw_prod", "mycharset", ""),
            ("mysql_app_dev", "myserver", "mysql.dev"),
            ("mysql_app_dev", "mycharset", "utf8mb4"),
            ("mysql_app_dev", "myusername", ""),
            ("postgresql_dw_hml", "myserver", ""),
        ];

        for (connection, field, expected) in cases {
            let info = ConnectionInfo::resolve(connection, &connections).unwrap();
            let value = match field {
                "myserver" => &info.server,
                "mydatabase" => &info.database,
                "myusername" => &info.username,
                "mypassword" => &info.password,
                "mycharset" => &info.charset,
                _ => unreachable!(),
            };
            assert_eq!(value, expected, "{} / {}", connection, field);
        }
    }

    #[test]
    fn test_oracle_dir_is_verbatim() {
        let info = ConnectionInfo::resolve("postgresql_dw_prod", &connections()).unwrap();
        assert_eq!(info.oracle_client_dir, "/opt/oracle");
        assert_eq!(info.suffix, "prod");
    }

    #[test]
    fn test_aws_credentials() {
        let connections = connections();
        let direct = AwsCredentials::from_connections(&connections, "prod").unwrap();
        assert_eq!(direct.region, "us-east-1");

        let copy = AwsCredentials::for_copy(&connections, "prod").unwrap();
        assert_eq!(copy.access_key_id, "AKIA2");
        assert!(!format!("{:?}", copy).contains("sk2"));

        assert!(AwsCredentials::from_connections(&connections, "dev").is_err());
    }

    #[test]
    fn test_resolver_per_phase() {
        let config = EdlConfig::from_toml(
            r#"
            [delete.entries.a]
            connection = "postgresql_dw_prod"
            sql = "DELETE FROM a"

            [delete.entries.b]
            connection = "oracle_erp_prod"
            sql = "DELETE FROM b"
            "#,
        )
        .unwrap();

        let resolver = ConnectionResolver::new(&config, &connections());
        assert!(resolver.has_phase(Phase::Delete));
        assert!(!resolver.has_phase(Phase::Upload));
        assert_eq!(resolver.resolve(Phase::Delete, "a").unwrap().server, "db.prod");
        assert!(resolver.resolve(Phase::Delete, "b").is_err());
        assert!(resolver.resolve(Phase::Delete, "c").is_err());
    }
}
