//! 任务生命周期集成测试
//!
//! 提交 → 翻译 → 终态 → 回调，包括重试、致命失败和回调重试

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use json_translator::jobs::{
    CallbackLog, CallbackStatus, JobStatus, JobStore, RecoveryReport, RetryPolicy, TranslationJob,
};
use json_translator::translation::core::mock::{MockMode, MockTranslator};
use json_translator::translation::error::TranslationError;
use json_translator::translation::storage::MemoryStore;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{fast_policy, request, RecordingClient, TestEnvironment};

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_job_completes_and_calls_back() {
    let env = TestEnvironment::new(Arc::new(MockTranslator::suffix(" (fr)")), RecordingClient::new());
    let document = json!({"title": "Hello World", "items": [{"name": "Item 1"}], "count": 2});

    let submitted = env.scheduler.submit(request(document, &[])).await.unwrap();
    assert_eq!(submitted.status, JobStatus::Pending);

    let job = env.wait_for_terminal(&submitted.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.total_segments, 2);
    let expected = json!({"title": "Hello World (fr)", "items": [{"name": "Item 1 (fr)"}], "count": 2});
    assert_eq!(job.output_json, Some(expected.clone()));

    let received = env.wait_for_callbacks(1).await;
    let (url, payload) = &received[0];
    assert_eq!(url, "http://localhost:9000/hook");
    assert_eq!(payload.status, CallbackStatus::Completed);
    assert_eq!(payload.data, Some(expected));
    assert_eq!(payload.error, None);
    assert_eq!(payload.source_lang, None);
    assert_eq!(payload.target_lang, "fr");
    assert_eq!(payload.metadata, Some(json!({"requestId": "r-1"})));

    wait_until(|| env.callbacks.stats().get_succeeded() == 1).await;
    let attempts = env.store.attempts_for(&job.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].http_status, 200);

    env.shutdown().await;
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let mock = Arc::new(
        MockTranslator::suffix("!").failing_first(1, TranslationError::NetworkError("reset".into())),
    );
    let env = TestEnvironment::new(mock.clone(), RecordingClient::new());

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    let job = env.wait_for_terminal(&submitted.id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    assert_eq!(mock.call_count(), 2);
    assert_eq!(env.wait_for_callbacks(1).await.len(), 1);

    env.shutdown().await;
}

#[tokio::test]
async fn test_retry_exhaustion_fails_job() {
    let mock = Arc::new(MockTranslator::new(MockMode::Error(TranslationError::TimeoutError(
        "provider timed out".into(),
    ))));
    let env = TestEnvironment::new(mock.clone(), RecordingClient::new());

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    let job = env.wait_for_terminal(&submitted.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.output_json.is_none());
    assert!(job.error.as_deref().unwrap().contains("provider timed out"));
    assert_eq!(mock.call_count(), 3);

    let received = env.wait_for_callbacks(1).await;
    let payload = &received[0].1;
    assert_eq!(payload.status, CallbackStatus::Failed);
    assert!(payload.data.is_none());
    assert!(payload.error.as_deref().unwrap().contains("provider timed out"));

    env.shutdown().await;
}

#[tokio::test]
async fn test_provider_rejection_is_retried() {
    let mock = Arc::new(MockTranslator::suffix("!").failing_first(
        1,
        TranslationError::TranslationServiceError("DeepL 返回 400 Bad Request".into()),
    ));
    let env = TestEnvironment::new(mock.clone(), RecordingClient::new());

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    let job = env.wait_for_terminal(&submitted.id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    assert_eq!(mock.call_count(), 2);

    env.shutdown().await;
}

#[tokio::test]
async fn test_fatal_error_skips_retries() {
    let mock = Arc::new(MockTranslator::new(MockMode::Error(TranslationError::PathResolution {
        path: "title".into(),
    })));
    let env = TestEnvironment::new(mock.clone(), RecordingClient::new());

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    let job = env.wait_for_terminal(&submitted.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert!(job.error.as_deref().unwrap().contains("title"));
    assert_eq!(mock.call_count(), 1);
    assert_eq!(env.wait_for_callbacks(1).await[0].1.status, CallbackStatus::Failed);

    env.shutdown().await;
}

#[tokio::test]
async fn test_callback_retries_are_recorded() {
    let env = TestEnvironment::new(
        Arc::new(MockTranslator::suffix("!")),
        RecordingClient::scripted(&[500, 0, 429]),
    );

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    env.wait_for_terminal(&submitted.id).await;

    wait_until(|| env.callbacks.stats().get_succeeded() == 1).await;
    let attempts = env.store.attempts_for(&submitted.id).await.unwrap();
    let statuses: Vec<u16> = attempts.iter().map(|a| a.http_status).collect();
    assert_eq!(statuses, vec![500, 0, 429, 200]);
    assert!(attempts[0].error.is_some());
    assert_eq!(attempts[0].response_body, "status 500");
    assert!(attempts[3].error.is_none());

    env.shutdown().await;
}

#[tokio::test]
async fn test_callback_exhaustion_keeps_job_completed() {
    let env = TestEnvironment::new(
        Arc::new(MockTranslator::suffix("!")),
        RecordingClient::scripted(&[503; 5]),
    );

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    env.wait_for_terminal(&submitted.id).await;

    wait_until(|| env.callbacks.stats().get_exhausted() == 1).await;
    assert_eq!(env.store.attempts_for(&submitted.id).await.unwrap().len(), 5);

    let job = env.scheduler.get(&submitted.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.callback_settled);

    env.shutdown().await;
}

#[tokio::test]
async fn test_invalid_request_is_not_stored() {
    let env = TestEnvironment::new(Arc::new(MockTranslator::suffix("!")), RecordingClient::new());

    let mut bad_target = request(json!({"title": "Hello"}), &[]);
    bad_target.target_lang = "  ".into();
    let mut bad_callback = request(json!({"title": "Hello"}), &[]);
    bad_callback.callback_url = "not a url".into();
    let zero_constraint = request(json!({"title": "Hello"}), &[("title", 0)]);

    for invalid in [bad_target, bad_callback, zero_constraint] {
        let error = env.scheduler.submit(invalid).await.unwrap_err();
        assert!(matches!(error, TranslationError::InvalidInput(_)), "{}", error);
    }
    assert_eq!(env.store.job_count(), 0);

    env.shutdown().await;
}

#[tokio::test]
async fn test_pending_jobs_are_recovered() {
    let store = Arc::new(MemoryStore::new());
    let pending = TranslationJob::from_request(request(json!({"title": "Hello"}), &[]));
    store.insert(&pending).await.unwrap();

    let env = TestEnvironment::with_store(
        Arc::new(MockTranslator::suffix(" (fr)")),
        RecordingClient::new(),
        store,
        3,
    );

    let report = env.scheduler.recover().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            resumed: 1,
            exhausted: 0,
            callbacks: 0
        }
    );
    let job = env.wait_for_terminal(&pending.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.output_json, Some(json!({"title": "Hello (fr)"})));

    env.shutdown().await;
}

#[tokio::test]
async fn test_recovery_keeps_attempt_budget() {
    let store = Arc::new(MemoryStore::new());
    let mut spent = TranslationJob::from_request(request(json!({"title": "Spent"}), &[]));
    spent.attempts = 3;
    let mut partial = TranslationJob::from_request(request(json!({"title": "Partial"}), &[]));
    partial.attempts = 1;
    store.insert(&spent).await.unwrap();
    store.insert(&partial).await.unwrap();

    let mock = Arc::new(MockTranslator::new(MockMode::Error(TranslationError::NetworkError(
        "reset".into(),
    ))));
    let env = TestEnvironment::with_store(mock.clone(), RecordingClient::new(), store, 3);

    let report = env.scheduler.recover().await.unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(report.exhausted, 1);
    assert_eq!(report.callbacks, 0);

    let job = env.wait_for_terminal(&spent.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);

    // 只剩两次尝试
    let job = env.wait_for_terminal(&partial.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(mock.call_count(), 2);

    let received = env.wait_for_callbacks(2).await;
    assert!(received.iter().all(|(_, payload)| payload.status == CallbackStatus::Failed));

    env.shutdown().await;
}

#[tokio::test]
async fn test_unsettled_callback_is_delivered_after_restart() {
    let store = Arc::new(MemoryStore::new());
    let slow_callbacks = RetryPolicy::new(5, Duration::from_secs(60));
    let env = TestEnvironment::with_policies(
        Arc::new(MockTranslator::suffix(" (fr)")),
        RecordingClient::scripted(&[503]),
        store.clone(),
        fast_policy(3),
        slow_callbacks,
    );

    let submitted = env
        .scheduler
        .submit(request(json!({"title": "Hello"}), &[]))
        .await
        .unwrap();
    env.wait_for_terminal(&submitted.id).await;
    wait_until(|| env.callbacks.stats().get_retried() == 1).await;

    // 回调仍在退避中就停止
    env.shutdown().await;
    let job = store.get(&submitted.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(!job.callback_settled);

    let restarted = TestEnvironment::with_store(
        Arc::new(MockTranslator::suffix(" (fr)")),
        RecordingClient::new(),
        store.clone(),
        3,
    );
    let report = restarted.scheduler.recover().await.unwrap();
    assert_eq!(report.callbacks, 1);
    assert_eq!(report.resumed, 0);

    let received = restarted.wait_for_callbacks(1).await;
    assert_eq!(received[0].1.status, CallbackStatus::Completed);
    assert_eq!(received[0].1.data, Some(json!({"title": "Hello (fr)"})));

    wait_until(|| restarted.callbacks.stats().get_succeeded() == 1).await;
    let job = store.get(&submitted.id).await.unwrap().unwrap();
    assert!(job.callback_settled);
    assert_eq!(store.attempts_for(&submitted.id).await.unwrap().len(), 2);
    assert_eq!(restarted.scheduler.recover().await.unwrap(), RecoveryReport::default());

    restarted.shutdown().await;
}
