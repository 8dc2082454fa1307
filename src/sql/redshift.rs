//! Carga via arquivo de staging no S3 (`COPY ... FROM 's3://...'`)

use crate::resolver::{AwsCredentials, BackendKind};

use super::{qualified_table, quote_ident};

/// Parâmetros do COPY a partir do staging
#[derive(Debug, Clone)]
pub struct StagingCopy {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub staging_uri: String,
    pub credentials: AwsCredentials,
    pub delimiter: char,
    pub has_headers: bool,
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Monta o comando COPY do Redshift
pub fn redshift_copy_statement(copy: &StagingCopy) -> String {
    let kind = BackendKind::Redshift;
    let columns = if copy.columns.is_empty() {
        String::new()
    } else {
        let quoted: Vec<String> = copy.columns.iter().map(|c| quote_ident(kind, c)).collect();
        format!(" ({})", quoted.join(", "))
    };

    let mut statement = format!(
        "COPY {}{} FROM '{}' CREDENTIALS 'aws_access_key_id={};aws_secret_access_key={}' REGION '{}' CSV DELIMITER '{}'",
        qualified_table(kind, &copy.schema, &copy.table),
        columns,
        escape_literal(&copy.staging_uri),
        escape_literal(&copy.credentials.access_key_id),
        escape_literal(&copy.credentials.secret_access_key),
        escape_literal(&copy.credentials.region),
        escape_literal(&copy.delimiter.to_string()),
    );

    if copy.has_headers {
        statement.push_str(" IGNOREHEADER 1");
    }
    statement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_statement() {
        let copy = StagingCopy {
            schema: "analytics".into(),
            table: "vendas".into(),
            columns: vec!["id".into(), "valor".into()],
            staging_uri: "s3://staging/vendas/2024-03-15.csv".into(),
            credentials: AwsCredentials {
                access_key_id: "AKIA".into(),
                secret_access_key: "sk".into(),
                region: "us-east-1".into(),
            },
            delimiter: ';',
            has_headers: true,
        };

        assert_eq!(
            redshift_copy_statement(&copy),
            "COPY \"analytics\".\"vendas\" (\"id\", \"valor\") FROM 's3://staging/vendas/2024-03-15.csv' \
             CREDENTIALS 'aws_access_key_id=AKIA;aws_secret_access_key=sk' REGION 'us-east-1' \
             CSV DELIMITER ';' IGNOREHEADER 1"
        );
    }
}
