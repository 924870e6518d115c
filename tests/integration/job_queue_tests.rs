/*!
 * Per-user queues driven through the job service
 */

use std::sync::Arc;
use std::time::Duration;

use pagetrans::database::{JobStatus, Repository};
use pagetrans::jobs::{JobEvent, JobService};
use pagetrans::providers::mock::MockProvider;

use crate::common::{events_until_terminal, jobs_config, payload, repository_with_page};

async fn service_with(client: MockProvider, max_concurrent_jobs: usize) -> (JobService, Repository, i64) {
    let (repo, page_id) = repository_with_page("intro").await;
    let mut config = jobs_config(10_000);
    config.max_concurrent_jobs = max_concurrent_jobs;
    let service = JobService::new(Arc::new(repo.clone()), Arc::new(client), &config);
    (service, repo, page_id)
}

fn position(events: &[JobEvent], job_id: &str, terminal: bool) -> usize {
    events
        .iter()
        .position(|e| e.job_id == job_id && e.is_terminal() == terminal)
        .unwrap()
}

#[tokio::test]
async fn test_enqueue_forOneUser_shouldRunJobsInOrderOneAtATime() {
    let (service, _repo, page_id) = service_with(MockProvider::slow(50), 4).await;
    let mut rx = service.subscribe();

    let mut job_ids = Vec::new();
    for text in ["First", "Second", "Third"] {
        let id = service
            .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, text)]))
            .await
            .unwrap();
        job_ids.push(id);
    }
    let events = events_until_terminal(&mut rx, 3).await;

    for pair in job_ids.windows(2) {
        let previous_end = position(&events, &pair[0], true);
        let next_start = position(&events, &pair[1], false);
        assert!(
            previous_end < next_start,
            "job {} started before job {} ended",
            pair[1],
            pair[0]
        );
    }
    assert!(events.iter().all(|e| e.user_id == "alice"));
}

#[tokio::test]
async fn test_counts_whileWorking_shouldTrackWaitingAndActive() {
    let (service, _repo, page_id) = service_with(MockProvider::slow(300), 4).await;

    for _ in 0..3 {
        service
            .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "Hello")]))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(service.active_count("alice"), 1);
    assert_eq!(service.waiting_count("alice"), 2);
    assert!(!service.is_user_idle("alice"));

    service.wait_until_idle("alice").await;

    assert_eq!(service.active_count("alice"), 0);
    assert_eq!(service.waiting_count("alice"), 0);
}

#[tokio::test]
async fn test_enqueue_behindRunningJob_shouldStayPending() {
    let (service, _repo, page_id) = service_with(MockProvider::slow(300), 4).await;

    service
        .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "Hello")]))
        .await
        .unwrap();
    let second = service
        .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "World")]))
        .await
        .unwrap();

    let row = service.get_job(&second).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Pending);
    assert_eq!(row.progress, 0.0);

    service.wait_until_idle("alice").await;
    let row = service.get_job(&second).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_enqueue_forTwoUsers_shouldRunConcurrently() {
    let (service, _repo, page_id) = service_with(MockProvider::slow(400), 4).await;

    service
        .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "Hello")]))
        .await
        .unwrap();
    service
        .enqueue("bob", payload("bob", page_id, "Test Page", &[(1, "Hello")]))
        .await
        .unwrap();

    let both_active = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if service.active_count("alice") == 1 && service.active_count("bob") == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(both_active.is_ok(), "jobs of different users did not overlap");
    service.wait_until_idle("alice").await;
    service.wait_until_idle("bob").await;
}

#[tokio::test]
async fn test_workerLimit_ofOne_shouldSerializeAllUsers() {
    let (service, _repo, page_id) = service_with(MockProvider::slow(150), 1).await;

    for user in ["alice", "bob", "carol"] {
        service
            .enqueue(user, payload(user, page_id, "Test Page", &[(1, user)]))
            .await
            .unwrap();
    }

    let mut max_active = 0;
    while !["alice", "bob", "carol"].iter().all(|u| service.is_user_idle(u)) {
        let active: usize = ["alice", "bob", "carol"]
            .iter()
            .map(|u| service.active_count(u))
            .sum();
        max_active = max_active.max(active);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(max_active, 1);
}

#[tokio::test]
async fn test_enqueueDelayed_shouldWaitBeforeRunning() {
    let (service, _repo, page_id) = service_with(MockProvider::working(), 4).await;

    let job_id = service
        .enqueue_delayed(
            "alice",
            payload("alice", page_id, "Test Page", &[(1, "Hello")]),
            Duration::from_millis(200),
        )
        .await
        .unwrap();

    assert_eq!(service.delayed_count("alice"), 1);
    assert_eq!(service.waiting_count("alice"), 0);
    assert!(!service.is_user_idle("alice"));
    let row = service.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Pending);

    service.wait_until_idle("alice").await;

    assert_eq!(service.delayed_count("alice"), 0);
    let row = service.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_secondJob_onSamePage_shouldReuseTranslations() {
    let client = MockProvider::working();
    let (service, _repo, page_id) = service_with(client.clone(), 4).await;
    let mut rx = service.subscribe();
    let units = [(1, "Hello"), (2, "World")];

    service
        .enqueue("alice", payload("alice", page_id, "Test Page", &units))
        .await
        .unwrap();
    let second = service
        .enqueue("alice", payload("alice", page_id, "Test Page", &units))
        .await
        .unwrap();
    let events = events_until_terminal(&mut rx, 2).await;

    let report = events
        .iter()
        .find(|e| e.job_id == second && e.is_terminal())
        .and_then(|e| e.report.clone())
        .unwrap();
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.reused, 3);
    assert_eq!(report.translated, 0);
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_shutdown_shouldFinishQueuedJobs() {
    let (service, repo, page_id) = service_with(MockProvider::slow(100), 4).await;

    let first = service
        .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "Hello")]))
        .await
        .unwrap();
    let second = service
        .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "World")]))
        .await
        .unwrap();

    service.shutdown().await;

    for job_id in [first, second] {
        let row = repo.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
    }
    assert!(
        service
            .enqueue("alice", payload("alice", page_id, "Test Page", &[(1, "Late")]))
            .await
            .is_err()
    );
}
