//! Integration tests for the collection run: mock site in, SQLite out.

mod common;

use std::sync::atomic::Ordering;

use harvester_core::collect::{FailureReason, Stage};
use harvester_core::{
    ArticleParser, Collector, CommentFetcher, Credentials, Database, RunOptions, Store,
};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collector(server: &MockServer, db: &Database) -> Collector {
    let fetcher = common::fast_fetcher();
    Collector::new(
        ArticleParser::new(fetcher.clone(), common::endpoints(server)),
        CommentFetcher::new(fetcher, common::endpoints(server)),
        Store::new(db),
        Credentials::anonymous(),
    )
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

/// Mounts a valid article with a four-comment thread for each id.
async fn mount_valid(server: &MockServer, id: &str, comment_base: i64) {
    common::mount_article(server, id, common::article_page(&["(AAPL)"], &["Body."])).await;
    common::mount_comments(server, id, common::comment_thread(comment_base)).await;
}

#[tokio::test]
async fn test_run_stores_articles_and_comments() {
    let server = MockServer::start().await;
    mount_valid(&server, "1", 100).await;
    mount_valid(&server, "2", 200).await;
    let db = Database::new_in_memory().await.unwrap();

    let summary = collector(&server, &db)
        .run(&ids(&["1", "2"]), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.articles_inserted, 2);
    assert_eq!(summary.comments_inserted, 8);
    assert_eq!(summary.last_committed, Some(1));
    let store = Store::new(&db);
    assert_eq!(store.article_count().await.unwrap(), 2);
    assert_eq!(store.comment_count().await.unwrap(), 8);
}

#[tokio::test]
async fn test_failed_id_does_not_stop_run() {
    let server = MockServer::start().await;
    mount_valid(&server, "1", 100).await;
    common::mount_article(&server, "2", common::article_page(&["(AAPL)"], &["Body."])).await;
    Mock::given(method("GET"))
        .and(path("/account/ajax_get_comments"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    mount_valid(&server, "3", 300).await;
    let db = Database::new_in_memory().await.unwrap();

    let summary = collector(&server, &db)
        .run(&ids(&["1", "2", "3"]), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].article_id, "2");
    assert_eq!(summary.failures[0].position, 1);
    assert!(matches!(
        summary.failures[0].reason,
        FailureReason::Parse {
            stage: Stage::Comments,
            ..
        }
    ));
    // The article of the failed id is not stored either.
    assert_eq!(Store::new(&db).article_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_article_is_network_failure() {
    let server = MockServer::start().await;
    mount_valid(&server, "1", 100).await;
    let db = Database::new_in_memory().await.unwrap();

    let fetcher = common::fast_fetcher();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let dead = harvester_core::config::Endpoints::with_base_url(format!("http://127.0.0.1:{port}"));
    let collector = Collector::new(
        ArticleParser::new(fetcher.clone(), dead),
        CommentFetcher::new(fetcher, common::endpoints(&server)),
        Store::new(&db),
        Credentials::anonymous(),
    );

    let summary = collector
        .run(&ids(&["1"]), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].reason.stage(), Stage::Article);
    assert!(matches!(
        summary.failures[0].reason,
        FailureReason::Network { .. }
    ));
    assert_eq!(summary.last_committed, None);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_valid(&server, "1", 100).await;
    let db = Database::new_in_memory().await.unwrap();
    let collector = collector(&server, &db);
    let list = ids(&["1"]);

    let first = collector.run(&list, &RunOptions::default()).await.unwrap();
    let second = collector.run(&list, &RunOptions::default()).await.unwrap();

    assert_eq!(first.articles_inserted, 1);
    assert_eq!(second.stored, 1);
    assert_eq!(second.articles_inserted, 0);
    assert_eq!(second.comments_inserted, 0);
    assert_eq!(second.duplicates, 5);
    let store = Store::new(&db);
    assert_eq!(store.article_count().await.unwrap(), 1);
    assert_eq!(store.comment_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_invalid_article_is_skipped_and_checkpointed() {
    let server = MockServer::start().await;
    common::mount_article(&server, "1", common::article_page(&[], &["Body."])).await;
    Mock::given(method("GET"))
        .and(path("/account/ajax_get_comments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let db = Database::new_in_memory().await.unwrap();

    let summary = collector(&server, &db)
        .run(&ids(&["1"]), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.last_committed, Some(0));
    let checkpoint = Store::new(&db)
        .load_checkpoint(harvester_core::collect::DEFAULT_RUN_KEY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.article_id, "1");
}

#[tokio::test]
async fn test_comments_only_never_fetches_articles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/article/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    common::mount_comments(&server, "1", common::comment_thread(100)).await;
    let db = Database::new_in_memory().await.unwrap();

    let options = RunOptions {
        comments_only: true,
        ..RunOptions::default()
    };
    let summary = collector(&server, &db)
        .run(&ids(&["1"]), &options)
        .await
        .unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.articles_inserted, 0);
    assert_eq!(summary.comments_inserted, 4);
    let store = Store::new(&db);
    assert_eq!(store.article_count().await.unwrap(), 0);
    assert_eq!(store.comment_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_index_window_and_resume() {
    let server = MockServer::start().await;
    for (i, id) in ["1", "2", "3", "4"].iter().enumerate() {
        mount_valid(&server, id, (i as i64 + 1) * 100).await;
    }
    let db = Database::new_in_memory().await.unwrap();
    let collector = collector(&server, &db);
    let list = ids(&["1", "2", "3", "4"]);

    let first = collector
        .run(
            &list,
            &RunOptions {
                start_index: 1,
                stop_index: Some(3),
                run_key: "aapl".to_string(),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(first.last_committed, Some(2));

    let resumed = collector
        .run(
            &list,
            &RunOptions {
                resume: true,
                run_key: "aapl".to_string(),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resumed.processed, 1);
    assert_eq!(resumed.last_committed, Some(3));
    assert_eq!(Store::new(&db).article_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_stop_flag_ends_run_before_next_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let db = Database::new_in_memory().await.unwrap();
    let collector = collector(&server, &db);
    collector.stop_flag().store(true, Ordering::SeqCst);

    let summary = collector
        .run(&ids(&["1", "2"]), &RunOptions::default())
        .await
        .unwrap();

    assert!(summary.stopped_early);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.last_committed, None);
}
