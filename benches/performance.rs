use clangd_query::daemon::protocol::{Request, Response};
use clangd_query::hover_parser::parse_hover_markdown;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_frame_decode(c: &mut Criterion) {
    let body = br#"{"jsonrpc":"2.0","id":1,"method":"textDocument/hover","params":{"textDocument":{"uri":"file:///test.cpp"},"position":{"line":10,"character":5}}}"#;

    c.bench_function("json_from_slice_zero_copy", |b| {
        b.iter(|| {
            let _: serde_json::Value = serde_json::from_slice(black_box(body)).unwrap();
        });
    });
}

fn bench_daemon_wire_protocol(c: &mut Criterion) {
    let request_line = br#"{"id":1,"method":"show","params":{"symbol":"GameObject"}}"#;
    c.bench_function("decode_daemon_request", |b| {
        b.iter(|| {
            let _: Request = serde_json::from_slice(black_box(request_line)).unwrap();
        });
    });

    let response = Response::ok(1, serde_json::json!({ "output": "class game_engine::GameObject\n" }));
    c.bench_function("encode_daemon_response", |b| {
        b.iter(|| {
            black_box(serde_json::to_string(&response).unwrap());
        });
    });
}

const HOVER_MARKDOWN: &str = "```cpp\npublic:\nint GetValue() const\n```\n→ `int`\n\nReturns the cached value.";

fn bench_hover_parsing(c: &mut Criterion) {
    c.bench_function("parse_hover_markdown", |b| {
        b.iter(|| {
            black_box(parse_hover_markdown(black_box(HOVER_MARKDOWN)));
        });
    });
}

criterion_group!(benches, bench_frame_decode, bench_daemon_wire_protocol, bench_hover_parsing);
criterion_main!(benches);
