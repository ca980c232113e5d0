//! Exercises `Router::get_health` and `Router::get_metrics` (spec.md §4.9).

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use router::Router;
use router_config::ProtocolFamily;

#[tokio::test]
async fn fresh_router_reports_healthy_with_no_traffic() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let health = router.get_health();
    assert_eq!(format!("{:?}", health.status), "Healthy");
    assert!((health.score - 100.0).abs() < 1e-6);

    let metrics = router.get_metrics();
    assert_eq!(metrics.total_errors, 0);
}

#[tokio::test]
async fn successful_requests_do_not_degrade_health() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({ "model": "mock-model-1", "messages": [{"role": "user", "content": "Hi"}] });
    for _ in 0..3 {
        router.schedule(body.clone(), "vm1", ProtocolFamily::Openai).await.unwrap();
    }

    assert_eq!(mock.request_count(), 3);
    assert_eq!(format!("{:?}", router.get_health().status), "Healthy");
}
