//! # metastage 性能基准测试
//!
//! 使用 Criterion.rs 进行性能基准测试。
//!
//! ## 基准测试分组
//! - `translate`: 演示程序的分阶段翻译
//! - `pipeline`: 翻译加运行
//!
//! ## 使用方法
//! ```bash
//! cargo bench            # 运行所有
//! cargo bench translate  # 只运行翻译基准
//! ```

use criterion::{criterion_group, criterion_main, Criterion};
use metastage::frontend::Compiler;
use std::hint::black_box;

const DEMOS: &[&str] = &[
    "mauto.stg",
    "port_a_vector.stg",
    "run_and_compile_time.stg",
    "consteval.stg",
    "constexpr.stg",
];

fn load(name: &str) -> String {
    let path = format!("{}/demos/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Cannot read {}: {}", path, e))
}

/// 较大的元阶段循环：展开 200 次
fn unroll_source() -> String {
    String::from(
        "@meta let squares: [int] = [];\n\
         @meta for i in 0..200 { squares.push(i * i); }\n\
         fn main() {\n\
             let all = @port(squares);\n\
             @meta for i in 0..200 { print(squares[i]); }\n\
         }\n",
    )
}

fn bench_translate_demos(c: &mut Criterion) {
    for name in DEMOS {
        let source = load(name);
        c.bench_function(&format!("translate_{}", name), |b| {
            b.iter(|| {
                let mut compiler = Compiler::new();
                compiler
                    .compile(black_box(&source))
                    .expect("translation failed")
            })
        });
    }
}

fn bench_translate_unroll(c: &mut Criterion) {
    let source = unroll_source();
    c.bench_function("translate_unroll_200", |b| {
        b.iter(|| {
            let mut compiler = Compiler::new();
            compiler
                .compile(black_box(&source))
                .expect("translation failed")
        })
    });
}

fn bench_run_demos(c: &mut Criterion) {
    for name in DEMOS {
        let source = load(name);
        c.bench_function(&format!("run_{}", name), |b| {
            b.iter(|| metastage::run(black_box(&source)).expect("run failed"))
        });
    }
}

criterion_group!(
    name = translate;
    config = Criterion::default().sample_size(30);
    targets = bench_translate_demos, bench_translate_unroll
);

criterion_group!(
    name = pipeline;
    config = Criterion::default().sample_size(30);
    targets = bench_run_demos
);

criterion_main!(translate, pipeline);
