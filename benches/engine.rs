use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use http::header::HeaderValue;
use http::{HeaderMap, StatusCode};
use resilix::prelude::{Client, RetryPolicy};
use resilix::{Transport, TransportError, TransportReply, TransportRequest};
use serde_json::json;
use tokio::runtime::Runtime;

/// Replies instantly; the measurement is pure engine overhead.
struct ImmediateTransport {
    body: Vec<u8>,
}

impl ImmediateTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            body: serde_json::to_vec(&json!({"ok": true})).expect("static body"),
        })
    }
}

#[async_trait]
impl Transport for ImmediateTransport {
    async fn execute(&self, _request: TransportRequest) -> Result<TransportReply, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(TransportReply::new(
            StatusCode::OK,
            headers,
            self.body.clone(),
        ))
    }
}

fn bench_engine_overhead(criterion: &mut Criterion) {
    let runtime = Runtime::new().expect("build runtime");
    let client = Client::builder_with(ImmediateTransport::new())
        .base_url("https://bench.invalid")
        .retry_policy(RetryPolicy::disabled())
        .build();

    let mut group = criterion.benchmark_group("engine");
    group.throughput(Throughput::Elements(1));
    group.bench_function("request_sequential", |bencher| {
        bencher.iter(|| {
            let response = runtime
                .block_on(client.get("/bench").send())
                .expect("bench request");
            black_box(response.status());
        });
    });

    group.throughput(Throughput::Elements(32));
    group.bench_function("request_concurrent_32", |bencher| {
        bencher.iter(|| {
            runtime.block_on(async {
                let mut handles = Vec::with_capacity(32);
                for _ in 0..32 {
                    let client = client.clone();
                    handles.push(tokio::spawn(
                        async move { client.get("/bench").send().await },
                    ));
                }
                for handle in handles {
                    let response = handle
                        .await
                        .expect("bench task")
                        .expect("bench request");
                    black_box(response.status());
                }
            });
        });
    });
    group.finish();
}

criterion_group!(benches, bench_engine_overhead);
criterion_main!(benches);
