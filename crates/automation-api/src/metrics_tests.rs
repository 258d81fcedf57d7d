use super::*;

#[test]
fn records_http_request() {
    let metrics = ServiceMetrics::new().expect("fresh registry per test binary");
    metrics.record_http_request("GET", "/healthz", 200, std::time::Duration::from_millis(5));
    assert_eq!(
        metrics
            .http_requests_total
            .with_label_values(&["GET", "/healthz", "200"])
            .get(),
        1
    );
}
