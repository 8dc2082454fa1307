use std::sync::Arc;

use chrono::NaiveDate;
use etltools::storage::{InMemoryStoreProvider, ObjectStorage, TransferStatus};
use etltools::types::{CsvOptions, DataTable, DataValue, FileFormat};

fn storage() -> ObjectStorage {
    ObjectStorage::new(Arc::new(InMemoryStoreProvider::new()))
}

fn vendas() -> DataTable {
    let mut table = DataTable::new(["loja", "dia", "valor", "ativo"]);
    let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    table.push_values([
        DataValue::from("centro"),
        DataValue::Date(day),
        DataValue::Float(120.5),
        DataValue::Boolean(true),
    ]);
    table.push_values([
        DataValue::from("norte"),
        DataValue::Date(day),
        DataValue::Null,
        DataValue::Boolean(false),
    ]);
    table
}

fn estoque() -> DataTable {
    let mut table = DataTable::new(["sku", "quantidade", "preco", "ativo", "obs"]);
    table.push_values([
        DataValue::from("A-01"),
        DataValue::Integer(12),
        DataValue::Float(3.0),
        DataValue::Boolean(true),
        DataValue::from("caixa fechada"),
    ]);
    table.push_values([
        DataValue::from("B-02"),
        DataValue::Integer(-4),
        DataValue::Float(0.25),
        DataValue::Boolean(false),
        DataValue::Null,
    ]);
    table
}

#[tokio::test]
async fn test_parquet_round_trip_keeps_types() {
    let storage = storage();

    let report = storage
        .upload_table(&vendas(), "gs://dados/vendas/2024-03-15.parquet", None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(report.format, FileFormat::Parquet);
    assert_eq!(report.status, TransferStatus::Uploaded);
    assert!(report.bytes > 0);

    let table = storage
        .read_table("gs://dados/vendas/2024-03-15.parquet", None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(table, vendas());
}

#[tokio::test]
async fn test_csv_with_index_and_separator() {
    let storage = storage();
    let csv = CsvOptions::default().with_delimiter(b'|').with_index(true);

    storage
        .upload_table(&vendas(), "s3://dados/vendas.csv", None, &csv)
        .await
        .unwrap();

    let raw = storage.read_bytes("s3://dados/vendas.csv").await.unwrap();
    let text = String::from_utf8(raw.to_vec()).unwrap();
    assert!(text.starts_with("index|loja|dia|valor|ativo\n0|centro|2024-03-15|120.5|true\n"));

    let table = storage.read_table("s3://dados/vendas.csv", None, &csv).await.unwrap();
    assert_eq!(table.columns, vec!["loja", "dia", "valor", "ativo"]);
    assert_eq!(table.value(0, "valor"), &DataValue::Float(120.5));
    assert_eq!(table.value(1, "valor"), &DataValue::Null);
}

#[tokio::test]
async fn test_buckets_are_isolated_by_scheme() {
    let storage = storage();
    let mut table = DataTable::new(["id"]);
    table.push_values([DataValue::Integer(1)]);

    storage
        .upload_table(&table, "gs://dados/ids.json", None, &CsvOptions::default())
        .await
        .unwrap();

    assert!(storage.read_bytes("s3://dados/ids.json").await.is_err());

    let read = storage
        .read_table("gs://dados/ids.json", None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(read, table);
}

#[tokio::test]
async fn test_bytes_are_not_tabular() {
    let storage = storage();
    storage
        .upload_bytes(b"\x00\x01".to_vec(), "gs://dados/blob.bin", None)
        .await
        .unwrap();

    let bytes = storage.read_bytes("gs://dados/blob.bin").await.unwrap();
    assert_eq!(bytes.as_ref(), b"\x00\x01");
    assert!(storage
        .read_table("gs://dados/blob.bin", None, &CsvOptions::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_csv_round_trip_keeps_types_and_dates() {
    let storage = storage();

    storage
        .upload_table(&vendas(), "gs://dados/vendas.csv", None, &CsvOptions::default())
        .await
        .unwrap();
    let table = storage
        .read_table("gs://dados/vendas.csv", None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(table, vendas());

    storage
        .upload_table(&estoque(), "gs://dados/estoque.csv", None, &CsvOptions::default())
        .await
        .unwrap();
    let table = storage
        .read_table("gs://dados/estoque.csv", None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(table, estoque());
}

#[tokio::test]
async fn test_json_round_trip_keeps_scalar_types() {
    let storage = storage();

    storage
        .upload_table(&estoque(), "s3://dados/estoque.json", None, &CsvOptions::default())
        .await
        .unwrap();
    let table = storage
        .read_table("s3://dados/estoque.json", None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(table, estoque());
}

#[tokio::test]
async fn test_json_dates_come_back_as_text() {
    let storage = storage();

    storage
        .upload_table(&vendas(), "gs://dados/vendas.json", None, &CsvOptions::default())
        .await
        .unwrap();
    let table = storage
        .read_table("gs://dados/vendas.json", None, &CsvOptions::default())
        .await
        .unwrap();

    assert_eq!(table.columns, vendas().columns);
    assert_eq!(table.value(0, "dia"), &DataValue::from("2024-03-15"));
    assert_eq!(table.value(0, "valor"), &DataValue::Float(120.5));
    assert_eq!(table.value(1, "valor"), &DataValue::Null);
    assert_eq!(table.value(1, "ativo"), &DataValue::Boolean(false));
}
