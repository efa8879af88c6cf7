use attempt_core::model::{AttemptId, QuestionDetailId};
use attempt_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{DrawingCacheEntry, DrawingCacheRepository, Storage};
use storage::sqlite::SqliteRepository;

fn entry(attempt: &str, question: &str, document: &str) -> DrawingCacheEntry {
    DrawingCacheEntry::new(
        AttemptId::new(attempt),
        QuestionDetailId::new(question),
        document,
        fixed_now(),
    )
}

#[tokio::test]
async fn sqlite_upserts_and_reads_drawings() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_drawing_upsert?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.put_drawing(&entry("TA-1", "Q1", "{\"v\":1}"))
        .await
        .unwrap();
    let mut newer = entry("TA-1", "Q1", "{\"v\":2}");
    newer.updated_at = fixed_now() + Duration::seconds(30);
    repo.put_drawing(&newer).await.unwrap();

    let fetched = repo
        .get_drawing(&AttemptId::new("TA-1"), &QuestionDetailId::new("Q1"))
        .await
        .expect("fetch")
        .expect("entry present");
    assert_eq!(fetched.document, "{\"v\":2}");
    assert_eq!(fetched.updated_at, newer.updated_at);

    let missing = repo
        .get_drawing(&AttemptId::new("TA-1"), &QuestionDetailId::new("Q9"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn sqlite_clear_attempt_is_scoped() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_drawing_clear?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.put_drawing(&entry("TA-1", "Q1", "a")).await.unwrap();
    repo.put_drawing(&entry("TA-1", "Q2", "b")).await.unwrap();
    repo.put_drawing(&entry("TA-2", "Q1", "c")).await.unwrap();

    let removed = repo.clear_attempt(&AttemptId::new("TA-1")).await.unwrap();
    assert_eq!(removed, 2);

    let survivor = repo
        .get_drawing(&AttemptId::new("TA-2"), &QuestionDetailId::new("Q1"))
        .await
        .unwrap();
    assert_eq!(survivor.map(|e| e.document), Some("c".to_string()));

    let again = repo.clear_attempt(&AttemptId::new("TA-1")).await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn migrations_are_idempotent_through_storage() {
    let url = "sqlite:file:memdb_drawing_storage?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("storage");
    storage
        .drawings
        .put_drawing(&entry("TA-3", "Q1", "x"))
        .await
        .unwrap();

    let repo = SqliteRepository::connect(url).await.expect("connect");
    repo.migrate().await.expect("second migrate");
    let fetched = repo
        .get_drawing(&AttemptId::new("TA-3"), &QuestionDetailId::new("Q1"))
        .await
        .unwrap();
    assert!(fetched.is_some());
}
