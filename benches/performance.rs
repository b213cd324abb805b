use criterion::{criterion_group, criterion_main, Criterion};
use qshape_compile::ConditionCompiler;
use qshape_core::prelude::{
    DataType, Field, FieldRef, Filter, Page, Prefix, Scalar, ScalarConverter, Schema, Sort,
};
use qshape_exec::{MemoryCatalog, SelectStatement};
use qshape_session::QuerySession;

fn make_catalog(rows: usize) -> MemoryCatalog {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("price", DataType::Float64, false),
    ]);
    let data = (0..rows)
        .map(|i| {
            vec![
                Scalar::I64(i as i64),
                Scalar::Str(format!("product-{}", i % 97)),
                Scalar::F64((i % 100) as f64),
            ]
        })
        .collect();
    let catalog = MemoryCatalog::new();
    catalog.create_table("products", schema, data).unwrap();
    catalog
}

fn price() -> FieldRef {
    FieldRef::column("products", "price", DataType::Float64)
}

fn name() -> FieldRef {
    FieldRef::column("products", "name", DataType::Utf8)
}

fn bench_compile_filters(c: &mut Criterion) {
    let converter = ScalarConverter;
    let compiler = ConditionCompiler::new(&converter);
    let filters = vec![
        Filter::new(name(), Prefix::Eq, (0..16).map(|i| format!("product-{}", i))),
        Filter::new(price(), Prefix::Bw, ["10", "20", "40", "60"]),
        Filter::new(name(), Prefix::Like, ["duct-1", "DUCT-2"]),
    ];
    c.bench_function("compile_filters", |b| {
        b.iter(|| {
            let _ = compiler.compile_all(&filters).unwrap();
        })
    });
}

fn bench_paginate(c: &mut Criterion) {
    let catalog = make_catalog(4096);
    let filter = Filter::new(price(), Prefix::Bw, [10.0, 60.0]);
    c.bench_function("filter_sort_paginate", |b| {
        b.iter(|| {
            let session = QuerySession::new(SelectStatement::select_from(&catalog, "products"))
                .filter(&filter)
                .unwrap()
                .sort(Sort::desc(price()))
                .unwrap()
                .paginate(Page::new(3, 50).unwrap())
                .unwrap();
            let _ = session.fetch().unwrap();
        })
    });
}

criterion_group!(benches, bench_compile_filters, bench_paginate);
criterion_main!(benches);
