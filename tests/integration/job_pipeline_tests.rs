/*!
 * Integration tests for the job state machine.
 *
 * Each test runs a job end to end against an in-memory SQLite repository
 * and a scripted mock provider.
 */

use std::sync::Arc;
use std::time::Duration;

use pagetrans::database::JobStatus;
use pagetrans::providers::mock::{MockBehavior, MockProvider};
use pagetrans::store::TranslationStore;

use crate::common::failing_store::{FailingStore, FailurePoint};
use crate::common::{
    drain_events, init_logging, payload, progress_of, queued_job, repository_with_page, runner,
    translation_count,
};

/// Four 10-character paragraphs; with a budget of 10 every unit is its own chunk
const TEN_CHAR_UNITS: &[(u32, &str)] = &[
    (1, "Paragraph1"),
    (2, "Paragraph2"),
    (3, "Paragraph3"),
    (4, "Paragraph4"),
];

#[tokio::test]
async fn test_testPageScenario_shouldCompleteWithThreeRows() {
    init_logging();
    let (repo, page_id) = repository_with_page("test-page").await;
    let client = MockProvider::working();
    let (runner, mut rx) = runner(Arc::new(repo.clone()), Arc::new(client.clone()), 10_000);
    let job = queued_job(
        &repo,
        payload("user-1", page_id, "Test Page", &[(1, "Hello"), (2, "World")]),
    )
    .await;
    let job_id = job.job_id.clone();

    let report = runner.run(job).await;

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.progress, 100.0);
    assert_eq!(report.translated, 3);
    assert_eq!(translation_count(&repo), 3);

    let stored = repo.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, 100.0);
    assert!(stored.completed_at.is_some());

    let sources = repo.list_source_texts(page_id).await.unwrap();
    let ids: Vec<i64> = sources.iter().map(|s| s.id).collect();
    let translations = repo.find_translations(ids, "ja").await.unwrap();
    let mut texts: Vec<String> = translations.into_iter().map(|t| t.text).collect();
    texts.sort();
    assert_eq!(texts, vec!["[ja] Hello", "[ja] Test Page", "[ja] World"]);

    let events = drain_events(&mut rx);
    let last = events.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.report.as_ref().unwrap().translated, 3);
}

#[tokio::test]
async fn test_allFailScenario_shouldFailWithoutRows() {
    let (repo, page_id) = repository_with_page("test-page").await;
    let (runner, mut rx) = runner(
        Arc::new(repo.clone()),
        Arc::new(MockProvider::fixed("[]")),
        10_000,
    );
    let job = queued_job(
        &repo,
        payload("user-1", page_id, "Test Page", &[(1, "Hello"), (2, "World")]),
    )
    .await;
    let job_id = job.job_id.clone();

    let report = runner.run(job).await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.progress, 0.0);
    assert_eq!(report.remaining, vec![0, 1, 2]);
    assert_eq!(translation_count(&repo), 0);

    let stored = repo.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.progress, 0.0);
    assert_eq!(
        stored.error.as_deref(),
        Some("1 of 1 chunks failed to translate")
    );

    assert_eq!(progress_of(&drain_events(&mut rx), &job_id), vec![0.0, 0.0]);
}

#[tokio::test]
async fn test_run_withManyChunks_shouldReportMonotonicProgress() {
    let (repo, page_id) = repository_with_page("long").await;
    let (runner, mut rx) = runner(
        Arc::new(repo.clone()),
        Arc::new(MockProvider::working()),
        10,
    );
    let job = queued_job(&repo, payload("user-1", page_id, "Test Page", TEN_CHAR_UNITS)).await;
    let job_id = job.job_id.clone();

    let report = runner.run(job).await;

    assert_eq!(report.chunks_total, 5);
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(
        progress_of(&drain_events(&mut rx), &job_id),
        vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0, 100.0]
    );
}

#[tokio::test]
async fn test_run_withFailedChunkThenSuccess_shouldNotReportFullProgress() {
    let (repo, page_id) = repository_with_page("mixed").await;
    let client = MockProvider::working()
        .then_script(vec![MockBehavior::Failing, MockBehavior::Working]);
    let (runner, mut rx) = runner(Arc::new(repo.clone()), Arc::new(client), 10);
    let job = queued_job(
        &repo,
        payload("user-1", page_id, "Test Page", &TEN_CHAR_UNITS[..1]),
    )
    .await;
    let job_id = job.job_id.clone();

    let report = runner.run(job).await;

    assert_eq!(report.chunks_total, 2);
    assert_eq!(report.chunks_failed, 1);
    assert_eq!(report.remaining, vec![0]);
    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.progress, 50.0);

    let stored = repo.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.progress, 50.0);
    assert_eq!(
        progress_of(&drain_events(&mut rx), &job_id),
        vec![0.0, 50.0, 50.0]
    );
}

#[tokio::test]
async fn test_retryJob_afterFailedChunk_shouldOnlyTranslateWhatIsLeft() {
    let (repo, page_id) = repository_with_page("long").await;
    let client = MockProvider::working()
        .then_script(vec![MockBehavior::Working, MockBehavior::Failing]);
    let (runner, _rx) = runner(Arc::new(repo.clone()), Arc::new(client.clone()), 10);

    let first_job =
        queued_job(&repo, payload("user-1", page_id, "Test Page", TEN_CHAR_UNITS)).await;
    let first_id = first_job.job_id.clone();
    let first = runner.run(first_job).await;

    assert_eq!(first.status, JobStatus::Failed);
    assert_eq!(first.chunks_failed, 1);
    assert_eq!(first.remaining, vec![1]);
    assert_eq!(first.progress, 80.0);
    let stored = repo.get_job(&first_id).await.unwrap().unwrap();
    assert_eq!(stored.progress, 80.0);
    assert_eq!(translation_count(&repo), 4);
    assert_eq!(client.requested_numbers(), vec![0, 1, 2, 3, 4]);

    let second = runner
        .run(queued_job(&repo, payload("user-1", page_id, "Test Page", TEN_CHAR_UNITS)).await)
        .await;

    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.translated, 1);
    assert_eq!(second.reused, 4);
    assert_eq!(client.requested_numbers(), vec![0, 1, 2, 3, 4, 1]);
    assert_eq!(translation_count(&repo), 5);
}

#[tokio::test]
async fn test_run_withInvalidApiKey_shouldFailImmediately() {
    let (repo, page_id) = repository_with_page("long").await;
    let client = MockProvider::unauthorized();
    let (runner, _rx) = runner(Arc::new(repo.clone()), Arc::new(client.clone()), 10);
    let job = queued_job(&repo, payload("user-1", page_id, "Test Page", TEN_CHAR_UNITS)).await;
    let job_id = job.job_id.clone();

    let report = runner.run(job).await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(client.request_count(), 1);
    assert_eq!(report.remaining, vec![0, 1, 2, 3, 4]);

    let stored = repo.get_job(&job_id).await.unwrap().unwrap();
    assert!(stored.error.unwrap().contains("Authentication error"));
}

#[tokio::test]
async fn test_run_withPersistenceFailure_shouldFailAtLastProgress() {
    let (repo, page_id) = repository_with_page("long").await;
    let store = FailingStore::new(repo.clone(), FailurePoint::SaveTranslation { after: 1 });
    let (runner, _rx) = runner(Arc::new(store), Arc::new(MockProvider::working()), 10);
    let job = queued_job(&repo, payload("user-1", page_id, "Test Page", TEN_CHAR_UNITS)).await;
    let job_id = job.job_id.clone();

    let report = runner.run(job).await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.progress, 20.0);
    assert_eq!(translation_count(&repo), 1);

    let stored = repo.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.progress, 20.0);
    assert!(stored.error.unwrap().starts_with("Persistence error"));
}

#[tokio::test]
async fn test_run_withSourceTextFailure_shouldNotCallProvider() {
    let (repo, page_id) = repository_with_page("long").await;
    let client = MockProvider::working();
    let store = FailingStore::new(repo.clone(), FailurePoint::SyncSourceTexts);
    let (runner, _rx) = runner(Arc::new(store), Arc::new(client.clone()), 10);

    let report = runner
        .run(queued_job(&repo, payload("user-1", page_id, "Test Page", TEN_CHAR_UNITS)).await)
        .await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.progress, 0.0);
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_run_withSlowProvider_shouldTreatTimeoutAsChunkFailure() {
    let (repo, page_id) = repository_with_page("slow").await;
    let (runner, _rx) = runner(
        Arc::new(repo.clone()),
        Arc::new(MockProvider::slow(2_000)),
        10_000,
    );
    let runner = runner.with_chunk_timeout(Duration::from_millis(50));

    let report = runner
        .run(queued_job(&repo, payload("user-1", page_id, "Test Page", &[(1, "Hello")])).await)
        .await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.chunks_failed, 1);
    assert_eq!(report.error.as_deref(), Some("1 of 1 chunks failed to translate"));
    assert_eq!(translation_count(&repo), 0);
}

#[tokio::test]
async fn test_run_withChattyModelOutput_shouldRecoverThroughFallback() {
    let (repo, page_id) = repository_with_page("test-page").await;
    let (runner, _rx) = runner(
        Arc::new(repo.clone()),
        Arc::new(MockProvider::new(MockBehavior::Malformed)),
        10_000,
    );

    let report = runner
        .run(
            queued_job(
                &repo,
                payload("user-1", page_id, "Test Page", &[(1, "Hello"), (2, "World")]),
            )
            .await,
        )
        .await;

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.translated, 3);
    assert_eq!(translation_count(&repo), 3);
}

#[tokio::test]
async fn test_run_withPartialChunk_shouldCompleteAndReportRemaining() {
    let (repo, page_id) = repository_with_page("test-page").await;
    let client = MockProvider::fixed(r#"[{"number": 1, "text": "Bonjour"}, {"number": 42, "text": "?"}]"#);
    let (runner, _rx) = runner(Arc::new(repo.clone()), Arc::new(client), 10_000);

    let report = runner
        .run(
            queued_job(
                &repo,
                payload("user-1", page_id, "Test Page", &[(1, "Hello"), (2, "World")]),
            )
            .await,
        )
        .await;

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.translated, 1);
    assert_eq!(report.remaining, vec![0, 2]);
    assert_eq!(translation_count(&repo), 1);
}

#[tokio::test]
async fn test_run_withOnlyNumberedContent_shouldReExtractUnits() {
    let (repo, page_id) = repository_with_page("html").await;
    let client = MockProvider::working();
    let (runner, _rx) = runner(Arc::new(repo.clone()), Arc::new(client.clone()), 10_000);
    let mut job_payload = payload("user-1", page_id, "Test Page", &[]);
    job_payload.numbered_content =
        r#"<h1 data-number-id="1">Welcome</h1><p data-number-id="2">Hello <b>there</b></p>"#
            .to_string();

    let report = runner.run(queued_job(&repo, job_payload).await).await;

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.translated, 3);
    assert_eq!(client.requested_numbers(), vec![0, 1, 2]);
    let texts: Vec<String> = repo
        .list_source_texts(page_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.text)
        .collect();
    assert_eq!(texts, vec!["Test Page", "Welcome", "Hello there"]);
}

#[tokio::test]
async fn test_run_withEmptyTitle_shouldFailWithExtractionError() {
    let (repo, page_id) = repository_with_page("untitled").await;
    let client = MockProvider::working();
    let (runner, _rx) = runner(Arc::new(repo.clone()), Arc::new(client.clone()), 10_000);

    let report = runner
        .run(queued_job(&repo, payload("user-1", page_id, " ", &[(1, "Hello")])).await)
        .await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(
        report.error.as_deref(),
        Some("Extraction error: Document title is empty")
    );
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_run_onFinishedJob_shouldLeaveTerminalRowUntouched() {
    let (repo, page_id) = repository_with_page("test-page").await;
    let (runner, _rx) = runner(
        Arc::new(repo.clone()),
        Arc::new(MockProvider::working()),
        10_000,
    );
    let job = queued_job(&repo, payload("user-1", page_id, "Test Page", &[(1, "Hello")])).await;
    let store: &dyn TranslationStore = &repo;
    store
        .update_job_status(&job.job_id, JobStatus::Failed, 0.0, Some("cancelled".into()))
        .await
        .unwrap();

    let report = runner.run(job.clone()).await;

    assert_eq!(report.status, JobStatus::Failed);
    let stored = repo.get_job(&job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.error.as_deref(), Some("cancelled"));
    assert_eq!(translation_count(&repo), 0);
}
