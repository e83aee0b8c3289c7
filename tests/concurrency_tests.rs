//! Concurrency and isolation tests for the analyzer

use std::sync::Arc;
use std::time::Duration;

use patchscan::{AnalyzeRequest, Analyzer, AnalyzerConfig, HealthStatus, StubModel};

const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_analyses_share_one_analyzer() {
    let model = Arc::new(StubModel::colors("yellow", "clear", "blue"));
    let analyzer = Analyzer::new(model.clone(), AnalyzerConfig::default()).unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let analyzer = analyzer.clone();
            tokio::spawn(async move { analyzer.analyze(&AnalyzeRequest::new(PNG)).await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.status, HealthStatus::Monitor);
    }
    assert_eq!(model.calls(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_request_does_not_affect_neighbours() {
    let analyzer = Arc::new(
        Analyzer::new(Arc::new(StubModel::normal()), AnalyzerConfig::default()).unwrap(),
    );

    let good = {
        let analyzer = Arc::clone(&analyzer);
        tokio::spawn(async move { analyzer.respond(&AnalyzeRequest::new(PNG)).await })
    };
    let bad = {
        let analyzer = Arc::clone(&analyzer);
        tokio::spawn(async move { analyzer.respond(&AnalyzeRequest::default()).await })
    };

    assert!(good.await.unwrap().is_success());
    assert!(!bad.await.unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn slow_calls_overlap() {
    let model = Arc::new(StubModel::normal().with_delay(Duration::from_secs(2)));
    let analyzer = Analyzer::new(model.clone(), AnalyzerConfig::default()).unwrap();

    let start = tokio::time::Instant::now();
    let request = AnalyzeRequest::new(PNG);
    let (a, b, c) = tokio::join!(
        analyzer.analyze(&request),
        analyzer.analyze(&request),
        analyzer.analyze(&request),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn cancelled_request_leaves_analyzer_usable() {
    let model = Arc::new(StubModel::normal().with_delay(Duration::from_millis(200)));
    let analyzer = Analyzer::new(model, AnalyzerConfig::default()).unwrap();

    let request = AnalyzeRequest::new(PNG);
    let cancelled =
        tokio::time::timeout(Duration::from_millis(10), analyzer.analyze(&request)).await;
    assert!(cancelled.is_err());

    let result = analyzer.analyze(&request).await.unwrap();
    assert_eq!(result.status, HealthStatus::Healthy);
}
