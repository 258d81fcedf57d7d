use super::*;
use std::time::Duration;

#[test]
fn record_success_increments_processed_and_succeeded() {
    let mut progress = BulkOperationProgress::new(RuleId::new(), 3);
    progress.record_success();
    assert_eq!(progress.processed, 1);
    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.failed, 0);
}

#[test]
fn record_failure_appends_bounded_error_list() {
    let mut progress = BulkOperationProgress::new(RuleId::new(), 200);
    for i in 0..150 {
        progress.record_failure(format!("X-{i}"), "boom");
    }
    assert_eq!(progress.errors.len(), 100);
    assert_eq!(progress.errors.first().unwrap().item_key, "X-50");
    assert_eq!(progress.errors.last().unwrap().item_key, "X-149");
}

#[test]
fn processed_equals_succeeded_plus_failed_and_is_monotone() {
    let mut progress = BulkOperationProgress::new(RuleId::new(), 3);
    progress.record_success();
    progress.record_failure("X-2", "err");
    progress.record_success();
    assert_eq!(progress.processed, progress.succeeded + progress.failed);
    assert!(progress.processed <= progress.total);
}

#[test]
fn record_batch_applies_all_outcomes_in_one_call() {
    let mut progress = BulkOperationProgress::new(RuleId::new(), 4);
    progress.record_batch(
        vec![
            BulkItemOutcome::Success,
            BulkItemOutcome::Failure { item_key: "X-2".to_string(), error: "boom".to_string() },
        ],
        Duration::from_millis(200),
    );
    assert_eq!(progress.processed, 2);
    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.failed, 1);
    assert_eq!(progress.errors.len(), 1);
    assert_eq!(progress.errors[0].item_key, "X-2");
    assert!(progress.estimated_completion.is_some());
}

#[test]
fn record_batch_smooths_eta_toward_latest_batch_duration() {
    let mut progress = BulkOperationProgress::new(RuleId::new(), 100);

    // First batch: 10 items in 1000ms => 100ms/item, 90 remaining => ~9000ms out.
    progress.record_batch(vec![BulkItemOutcome::Success; 10], Duration::from_millis(1000));
    let first_eta = progress.estimated_completion.unwrap();
    let first_horizon_ms = (first_eta - Utc::now()).num_milliseconds();
    assert!((8000..10000).contains(&first_horizon_ms), "expected ~9s horizon, got {first_horizon_ms}ms");

    // Second batch is much slower: the EMA should move toward it but not
    // jump all the way there in one step.
    progress.record_batch(vec![BulkItemOutcome::Success; 10], Duration::from_millis(10_000));
    let second_eta = progress.estimated_completion.unwrap();
    let second_horizon_ms = (second_eta - Utc::now()).num_milliseconds();
    assert!(second_horizon_ms > first_horizon_ms, "a slower batch must push the ETA further out");

    // 80 remaining at a blended per-item time between 100ms and 1000ms
    // (alpha = 0.3: 0.3*1000 + 0.7*100 = 370ms/item) should land well short
    // of a naive "as slow as the latest batch" estimate of 80s.
    assert!(second_horizon_ms < 80_000 * 8 / 10, "ETA should be smoothed, not reset to the latest batch's rate");
}

#[test]
fn record_batch_ignores_empty_batches() {
    let mut progress = BulkOperationProgress::new(RuleId::new(), 10);
    progress.record_batch(Vec::new(), Duration::from_millis(500));
    assert_eq!(progress.processed, 0);
    assert!(progress.estimated_completion.is_none());
}

#[test]
fn finish_sets_completed_when_no_failures_else_failed() {
    let mut ok = BulkOperationProgress::new(RuleId::new(), 1);
    ok.record_success();
    ok.finish();
    assert_eq!(ok.status, BulkStatus::Completed);
    assert!(ok.estimated_completion.is_none());

    let mut bad = BulkOperationProgress::new(RuleId::new(), 1);
    bad.record_failure("X-1", "err");
    bad.finish();
    assert_eq!(bad.status, BulkStatus::Failed);
}
