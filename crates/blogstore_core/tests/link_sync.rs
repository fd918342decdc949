mod common;

use blogstore_core::{BlogStore, EntityRepository, LinkSyncStrategy, Post, RepoError, StoreConfig};
use common::{date, file_config, open_file_store, open_recording_store, seed_post, seed_tags};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::time::Duration;

fn ids(values: &[i64]) -> BTreeSet<i64> {
    values.iter().copied().collect()
}

#[tokio::test]
async fn full_replace_rewrites_link_set_exactly() {
    let t = open_file_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["t1", "t2", "t3"]).await;
    let mut post = seed_post(&t.store, "p", &tags[..2]).await;
    let id = post.id.unwrap();

    post.tags = ids(&tags[1..]);
    t.store.posts().save(post.clone()).await.unwrap();
    assert_eq!(t.store.posts().find_tag_ids(id).await.unwrap(), ids(&tags[1..]));

    post.tags.clear();
    t.store.posts().save(post).await.unwrap();
    assert!(t.store.posts().find_tag_ids(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_insert_phase_reports_partial_sync_with_zero_links() {
    let t = open_file_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["keep"]).await;
    let mut post = seed_post(&t.store, "p", &tags).await;
    let id = post.id.unwrap();

    post.tags = ids(&[tags[0], 9_999]);
    let err = t.store.posts().save(post).await.unwrap_err();
    match &err {
        RepoError::PartialLinkSync {
            link_table,
            owner_id,
            desired,
            ..
        } => {
            assert_eq!(*link_table, "rel_post__tag");
            assert_eq!(*owner_id, id);
            assert_eq!(*desired, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
    assert!(t.store.posts().find_tag_ids(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn injected_insert_failure_is_partial_and_retry_restores_links() {
    let (t, client) = open_recording_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["a1", "b2"]).await;
    let post = seed_post(&t.store, "p", &tags).await;
    let id = post.id.unwrap();

    client.fail_when_sql_starts_with("INSERT INTO rel_post__tag");
    assert!(matches!(
        t.store.posts().save(post.clone()).await,
        Err(RepoError::PartialLinkSync { .. })
    ));
    assert!(t.store.posts().find_tag_ids(id).await.unwrap().is_empty());

    client.stop_failing();
    t.store.posts().save(post).await.unwrap();
    assert_eq!(t.store.posts().find_tag_ids(id).await.unwrap(), ids(&tags));
}

#[tokio::test]
async fn transactional_strategy_keeps_previous_links_on_failure() {
    let t = open_file_store(LinkSyncStrategy::Transactional);
    let tags = seed_tags(&t.store, &["keep"]).await;
    let mut post = seed_post(&t.store, "p", &tags).await;
    let id = post.id.unwrap();

    post.tags = ids(&[tags[0], 9_999]);
    let err = t.store.posts().save(post).await.unwrap_err();
    assert!(matches!(err, RepoError::ReferentialInconsistency(_)));
    assert_eq!(t.store.posts().find_tag_ids(id).await.unwrap(), ids(&tags));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_never_merge_tag_sets() {
    let t = open_file_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["t1", "t2", "t3"]).await;
    let post = seed_post(&t.store, "contended", &[]).await;
    let id = post.id.unwrap();
    let first = ids(&tags[..2]);
    let second = ids(&tags[2..]);

    for _ in 0..20 {
        let mut handles = Vec::new();
        for (title, desired) in [("first", first.clone()), ("second", second.clone())] {
            let store = t.store.clone();
            let mut post = post.clone();
            post.title = Some(title.to_string());
            post.tags = desired;
            handles.push(tokio::spawn(async move { store.posts().save(post).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = t.store.posts().find_by_id(id).await.unwrap().unwrap();
        let expected = if stored.title.as_deref() == Some("first") {
            &first
        } else {
            &second
        };
        assert_eq!(&stored.tags, expected, "title and tags from different saves");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn save_racing_delete_is_ok_or_not_found() {
    let t = open_file_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["r1", "r2"]).await;

    for _ in 0..40 {
        let mut post = seed_post(&t.store, "doomed", &tags[..1]).await;
        let id = post.id.unwrap();
        post.tags = ids(&tags);

        let save = {
            let store = t.store.clone();
            tokio::spawn(async move { store.posts().save(post).await })
        };
        let delete = {
            let store = t.store.clone();
            tokio::spawn(async move { store.posts().delete_by_id(id).await })
        };

        match save.await.unwrap() {
            Ok(_) | Err(RepoError::NotFound { entity: "Post", .. }) => {}
            Err(other) => panic!("save racing delete failed with {other}"),
        }
        delete.await.unwrap().unwrap();

        assert!(t.store.posts().find_by_id(id).await.unwrap().is_none());
        assert!(t.store.posts().find_tag_ids(id).await.unwrap().is_empty());
    }
    t.store.posts().verify_link_integrity().await.unwrap();
}

#[tokio::test]
async fn link_insert_for_vanished_owner_is_not_found() {
    let t = open_file_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["v1"]).await;

    let err = t
        .store
        .posts()
        .replace_tags(4_242, &ids(&tags))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "Post", id: 4_242 }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn deleting_tag_removes_its_links_first() {
    let (t, client) = open_recording_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["gone", "stays"]).await;
    let post = seed_post(&t.store, "p", &tags).await;
    client.clear();

    t.store.tags().delete_by_id(tags[0]).await.unwrap();

    let statements = client.statements();
    assert_eq!(
        statements,
        [
            "DELETE FROM rel_post__tag WHERE tag_id = ?",
            "DELETE FROM tag WHERE id = ?",
        ]
    );
    assert_eq!(
        t.store.posts().find_tag_ids(post.id.unwrap()).await.unwrap(),
        ids(&tags[1..])
    );
}

#[tokio::test]
async fn orphaned_link_rows_are_reported() {
    let t = open_file_store(LinkSyncStrategy::FullReplace);
    let tags = seed_tags(&t.store, &["x1"]).await;
    let post = seed_post(&t.store, "p", &tags).await;
    t.store.posts().verify_link_integrity().await.unwrap();

    // Foreign keys are off by default on a raw connection.
    let raw = rusqlite::Connection::open(&t.path).unwrap();
    raw.execute("DELETE FROM post WHERE id = ?1", [post.id.unwrap()])
        .unwrap();
    drop(raw);

    let err = t.store.posts().verify_link_integrity().await.unwrap_err();
    match err {
        RepoError::ReferentialInconsistency(message) => {
            assert!(message.contains("rel_post__tag"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn dropped_stream_returns_its_connection() {
    let dir = tempfile::tempdir().unwrap();
    let config: StoreConfig = file_config(&dir)
        .with_max_connections(1)
        .with_acquire_timeout_ms(2_000);
    let store = BlogStore::open(&config).unwrap();
    for index in 0..150 {
        store
            .posts()
            .save(Post::new(format!("bulk {index}"), date(1)))
            .await
            .unwrap();
    }

    let mut stream = store.posts().stream_all(None, None).unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.title.as_deref(), Some("bulk 0"));
    drop(stream);

    let total = tokio::time::timeout(Duration::from_secs(5), store.posts().count())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(total, 150);
}
