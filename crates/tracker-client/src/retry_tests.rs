use super::*;

#[test]
fn delay_grows_exponentially_and_caps_at_max() {
    let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(1), 2.0);

    let d0 = policy.calculate_delay(0);
    let d1 = policy.calculate_delay(1);
    let d2 = policy.calculate_delay(2);

    assert!(d0 >= Duration::from_millis(100));
    assert!(d1 >= Duration::from_millis(200));
    assert!(d2 >= Duration::from_millis(400));

    // Far enough out that the exponential would blow past max_delay without
    // capping.
    let d_far = policy.calculate_delay(20);
    assert!(d_far <= Duration::from_secs(1) + Duration::from_millis(200));
}

#[test]
fn should_retry_respects_max_attempts() {
    let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1), 2.0);
    assert!(policy.should_retry(0));
    assert!(policy.should_retry(2));
    assert!(!policy.should_retry(3));
}
