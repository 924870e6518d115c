/*!
 * Source text deduplication against SQLite
 */

use futures::future::join_all;
use std::sync::Arc;

use pagetrans::extraction::extract_units;
use pagetrans::jobs::JobPayload;
use pagetrans::providers::mock::MockProvider;
use pagetrans::translation::hash_units;

use crate::common::{payload, queued_job, repository_with_page, runner};

const PAGE_V1: &str = "<h1>Welcome</h1><p>Install the tool.</p><p>Run it.</p>";
const PAGE_V2: &str =
    "<h1>Welcome</h1><p>Read this first.</p><p>Install the tool.</p><p>Run it.</p>";

fn payload_for(page_id: i64, html: &str) -> JobPayload {
    let doc = extract_units(html, "Guide").unwrap();
    let mut p = payload("user-1", page_id, "Guide", &[]);
    p.numbered_elements = doc.units;
    p
}

#[tokio::test]
async fn test_getOrCreateSourceText_concurrently_shouldCreateOneRow() {
    let (repo, page_id) = repository_with_page("intro").await;

    let handles = (0..16).map(|_| {
        let repo = repo.clone();
        tokio::spawn(async move {
            repo.get_or_create_source_text("Hello world", 1, page_id)
                .await
        })
    });
    let ids: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(repo.connection().stats().unwrap().source_text_count, 1);
}

#[tokio::test]
async fn test_getOrCreateSourceText_withWhitespaceVariant_shouldReuseRow() {
    let (repo, page_id) = repository_with_page("intro").await;

    let first = repo
        .get_or_create_source_text("Hello world", 1, page_id)
        .await
        .unwrap();
    let second = repo
        .get_or_create_source_text("  Hello\n  world ", 1, page_id)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_getOrCreateSourceText_onDifferentPages_shouldCreateSeparateRows() {
    let (repo, first_page) = repository_with_page("intro").await;
    let second_page = repo.get_or_create_page("faq").await.unwrap();

    let a = repo
        .get_or_create_source_text("Hello", 1, first_page)
        .await
        .unwrap();
    let b = repo
        .get_or_create_source_text("Hello", 1, second_page)
        .await
        .unwrap();

    assert_ne!(a, b);
}

#[tokio::test]
async fn test_syncSourceTexts_twice_shouldBeIdempotent() {
    let (repo, page_id) = repository_with_page("intro").await;
    let units = extract_units(PAGE_V1, "Guide").unwrap().units;

    let first = repo
        .sync_source_texts(page_id, hash_units(&units))
        .await
        .unwrap();
    let second = repo
        .sync_source_texts(page_id, hash_units(&units))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.connection().stats().unwrap().source_text_count, 4);
}

#[tokio::test]
async fn test_syncSourceTexts_withRepeatedText_shouldKeepOneRowPerOccurrence() {
    let (repo, page_id) = repository_with_page("intro").await;
    let units = extract_units("<p>Note</p><p>Body</p><p>Note</p>", "Guide")
        .unwrap()
        .units;

    let records = repo
        .sync_source_texts(page_id, hash_units(&units))
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    assert_ne!(records[1].id, records[3].id);
    assert_ne!(records[1].text_hash, records[3].text_hash);
}

#[tokio::test]
async fn test_syncSourceTexts_afterInsertion_shouldKeepIdsAndMoveNumbers() {
    let (repo, page_id) = repository_with_page("intro").await;
    let v1 = repo
        .sync_source_texts(
            page_id,
            hash_units(&extract_units(PAGE_V1, "Guide").unwrap().units),
        )
        .await
        .unwrap();
    let v2 = repo
        .sync_source_texts(
            page_id,
            hash_units(&extract_units(PAGE_V2, "Guide").unwrap().units),
        )
        .await
        .unwrap();

    let install_v1 = v1.iter().find(|r| r.text == "Install the tool.").unwrap();
    let install_v2 = v2.iter().find(|r| r.text == "Install the tool.").unwrap();
    assert_eq!(install_v1.id, install_v2.id);
    assert_eq!(install_v1.number, Some(2));
    assert_eq!(install_v2.number, Some(3));
    assert_eq!(repo.connection().stats().unwrap().source_text_count, 5);
}

#[tokio::test]
async fn test_syncSourceTexts_afterRemoval_shouldClearStaleNumber() {
    let (repo, page_id) = repository_with_page("intro").await;
    repo.sync_source_texts(
        page_id,
        hash_units(&extract_units(PAGE_V2, "Guide").unwrap().units),
    )
    .await
    .unwrap();
    repo.sync_source_texts(
        page_id,
        hash_units(&extract_units(PAGE_V1, "Guide").unwrap().units),
    )
    .await
    .unwrap();

    let listed = repo.list_source_texts(page_id).await.unwrap();
    let removed = listed.iter().find(|r| r.text == "Read this first.").unwrap();
    assert_eq!(removed.number, None);
    assert_eq!(listed.last().unwrap().text, "Read this first.");
}

#[tokio::test]
async fn test_jobs_afterPageEdit_shouldOnlyTranslateNewText() {
    let (repo, page_id) = repository_with_page("intro").await;
    let client = MockProvider::working();
    let (runner, _rx) = runner(Arc::new(repo.clone()), Arc::new(client.clone()), 10_000);

    let first = runner
        .run(queued_job(&repo, payload_for(page_id, PAGE_V1)).await)
        .await;
    let second = runner
        .run(queued_job(&repo, payload_for(page_id, PAGE_V2)).await)
        .await;

    assert_eq!(first.translated, 4);
    assert_eq!(second.translated, 1);
    assert_eq!(second.reused, 4);
    assert_eq!(client.requested_numbers(), vec![0, 1, 2, 3, 2]);
}
