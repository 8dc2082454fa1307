use std::collections::HashMap;

use chrono::NaiveDate;
use etltools::config::{Connections, EdlConfig};
use etltools::pipeline::{ExtractDeleteAndLoad, TemplateVars};
use etltools::types::{DataTable, DataValue};
use tempfile::TempDir;

const CONFIG: &str = r#"
n_parallel = 1

[download.entries.resumo]
connection = "sqlite_local"
table = "resumo"
sql = "SELECT id, loja, valor, dia FROM resumo WHERE dia >= '{start_date}' ORDER BY id"
start_date = "month_start"
connect_args = { mode = "rwc" }

[delete.entries.resumo]
connection = "sqlite_local"
sql = "DELETE FROM resumo WHERE dia < '{start_date}'"
start_date = "yesterday"
connect_args = { mode = "rwc" }

[upload.entries.resumo]
connection = "sqlite_local"
table = "resumo"
chunk_size = 2
connect_args = { mode = "rwc" }
columns = [
    { name = "id", dtype = "INTEGER" },
    { name = "loja", dtype = "TEXT" },
    { name = "valor", dtype = "REAL" },
    { name = "dia", dtype = "TEXT" },
]
"#;

fn source() -> DataTable {
    let mut table = DataTable::new(["id", "loja", "valor", "dia", "ignorada"]);
    let rows = [
        (1, "centro", Some(10.5), "2024-02-28"),
        (2, "norte", Some(3.0), "2024-03-13"),
        (3, "sul", None, "2024-03-14"),
    ];
    for (id, loja, valor, dia) in rows {
        table.push_values([
            DataValue::Integer(id),
            DataValue::from(loja),
            valor.map(DataValue::Float).unwrap_or(DataValue::Null),
            DataValue::from(dia),
            DataValue::Boolean(true),
        ]);
    }
    table
}

#[tokio::test]
async fn test_upload_delete_and_read_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("edl.db");
    let connections = Connections::from_map([(
        "mydatabase_sqlite_local".to_string(),
        database.to_string_lossy().to_string(),
    )]);

    let mut edl = ExtractDeleteAndLoad::builder()
        .config(EdlConfig::from_toml(CONFIG).unwrap())
        .connections(connections)
        .today(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        .build()
        .unwrap();

    let upload = HashMap::from([("resumo".to_string(), source())]);
    let report = edl.upload_data(&upload).await.unwrap().into_result().unwrap();
    assert_eq!(report.rows, 3);

    // Remove o que é anterior a ontem (2024-03-14)
    let report = edl.delete_data(&TemplateVars::new()).await.unwrap().into_result().unwrap();
    assert_eq!(report.rows, 2);

    let report = edl.read_data(&TemplateVars::new()).await.unwrap().into_result().unwrap();
    assert_eq!(report.rows, 1);

    let table = &edl.raw_data()["resumo"];
    assert_eq!(table.columns, vec!["id", "loja", "valor", "dia"]);
    assert_eq!(table.value(0, "id"), &DataValue::Integer(3));
    assert_eq!(table.value(0, "loja"), &DataValue::from("sul"));
    assert_eq!(table.value(0, "valor"), &DataValue::Null);
    assert_eq!(table.value(0, "dia"), &DataValue::from("2024-03-14"));
}
