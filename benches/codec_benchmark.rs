use criterion::{black_box, criterion_group, criterion_main, Criterion};
use chrono::NaiveDate;
use etltools::prelude::*;
use std::sync::Arc;

fn sample_table(rows: i64) -> DataTable {
    let mut table = DataTable::new(["id", "loja", "valor", "ativo"]);
    for i in 0..rows {
        table.push_values([
            DataValue::Integer(i),
            DataValue::from(format!("Loja{}", i % 50)),
            DataValue::Float(i as f64 * 1.5),
            DataValue::Boolean(i % 2 == 0),
        ]);
    }
    table
}

fn benchmark_codecs(c: &mut Criterion) {
    let table = sample_table(1000);
    let csv = CsvOptions::default();

    for format in [FileFormat::Csv, FileFormat::Json, FileFormat::Parquet] {
        let encoded = etltools::load::encode(format, &table, &csv).unwrap();

        c.bench_function(&format!("{}_encode_1000_rows", format), |b| {
            b.iter(|| black_box(etltools::load::encode(format, &table, &csv).unwrap()))
        });

        c.bench_function(&format!("{}_decode_1000_rows", format), |b| {
            b.iter(|| black_box(etltools::extract::decode(format, &encoded, &csv).unwrap()))
        });
    }
}

fn benchmark_storage(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let storage = ObjectStorage::new(Arc::new(InMemoryStoreProvider::new()));
    let table = sample_table(1000);

    c.bench_function("parquet_upload_and_read_1000_rows", |b| {
        b.iter(|| {
            runtime.block_on(async {
                storage
                    .upload_table(&table, "gs://bench/vendas.parquet", None, &CsvOptions::default())
                    .await
                    .unwrap();
                let result = storage
                    .read_table("gs://bench/vendas.parquet", None, &CsvOptions::default())
                    .await
                    .unwrap();
                black_box(result);
            });
        })
    });
}

fn benchmark_templates(c: &mut Criterion) {
    let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

    c.bench_function("render_sql_template", |b| {
        b.iter(|| {
            let mut ctx = TemplateContext::new(today).with("today", today).with("loja", "42");
            ctx.insert_date_expr("start_date", "month_start-1m").unwrap();
            ctx.insert_date_expr("end_date", "yesterday").unwrap();
            let sql = ctx
                .render("SELECT * FROM vendas WHERE dia BETWEEN '{start_date}' AND '{end_date:%Y%m%d}' AND loja = {loja}")
                .unwrap();
            black_box(sql);
        })
    });
}

criterion_group!(benches, benchmark_codecs, benchmark_storage, benchmark_templates);
criterion_main!(benches);
