use super::*;
use crate::fakes::{eventually, FakeFs, Harness};

fn feed() -> FakeFs {
    let fs = FakeFs::with_timeline("home", &[("1", 10, "older\n"), ("2", 20, "newer\n")]);
    fs.add_dir("mentions");
    fs
}

#[tokio::test]
async fn timeline_window_is_tagged_and_loaded() {
    let h = Harness::new(feed());
    let window = h
        .session
        .show_or_create(WindowMode::Home)
        .await
        .expect("create")
        .expect("new window");
    assert_eq!(window.title(), "/twitter/home");
    assert_eq!(h.session.registry().len().await, 1);

    let fake = h.host.window("/twitter/home");
    assert_eq!(fake.tag(), " New Reply Newer Older Trim Get ");
    eventually("initial load", || fake.times_shown() == 1).await;
    assert_eq!(fake.body(), "--- 2\nnewer\n--- 1\nolder\n");
    assert!(fake.is_clean());
    assert!(fake.cursor_at_start());
}

#[tokio::test]
async fn existing_title_is_focused_not_duplicated() {
    let h = Harness::new(feed());
    h.session.open(WindowMode::Mentions).await.expect("first");
    let again = h
        .session
        .show_or_create(WindowMode::Mentions)
        .await
        .expect("lookup");
    assert!(again.is_none());
    assert_eq!(h.host.create_attempts(), 1);
    assert_eq!(h.host.titled("/twitter/mentions").len(), 1);
    assert_eq!(h.session.registry().len().await, 1);
}

#[tokio::test]
async fn compose_window_is_not_loaded() {
    let h = Harness::new(feed());
    h.session
        .open(WindowMode::new_post())
        .await
        .expect("compose");
    let fake = h.host.window("/twitter/new");
    assert_eq!(fake.tag(), " Post ");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fake.body(), "");
    assert_eq!(fake.times_shown(), 0);
}

#[tokio::test]
async fn load_failure_is_shown_in_body() {
    let h = Harness::new(feed());
    h.fs.fail_reads_of("mentions");
    h.session.open(WindowMode::Mentions).await.expect("window");
    let fake = h.host.window("/twitter/mentions");
    eventually("error text", || fake.times_shown() == 1).await;
    assert_eq!(fake.body(), "reading timeline mentions: mentions: i/o error");
    assert!(!fake.is_clean());
    assert!(fake.cursor_at_start());
}

#[tokio::test]
async fn window_creation_is_retried_once() {
    let h = Harness::new(feed());
    h.host.fail_creations(1);
    let window = h.session.open(WindowMode::Home).await;
    assert!(window.is_some());
    assert_eq!(h.host.create_attempts(), 2);
    assert!(h.shutdown.aborts().is_empty());
}

#[tokio::test]
async fn second_creation_failure_aborts() {
    let h = Harness::new(feed());
    h.host.fail_creations(2);
    let window = h.session.open(WindowMode::Home).await;
    assert!(window.is_none());
    assert_eq!(h.host.create_attempts(), 2);
    assert!(h.session.registry().is_empty().await);
    let aborts = h.shutdown.aborts();
    assert_eq!(aborts.len(), 1);
    assert!(aborts[0].contains("/twitter/home"));
    assert_eq!(h.shutdown.finished(), 0);
}

#[tokio::test]
async fn closing_every_window_finishes_exactly_once() {
    let h = Harness::new(feed());
    h.session.open(WindowMode::Home).await.expect("home");
    h.session.open(WindowMode::Mentions).await.expect("mentions");
    h.session
        .open(WindowMode::reply("5"))
        .await
        .expect("reply");

    for title in ["/twitter/home", "/twitter/reply/5"] {
        h.host.window(title).close();
    }
    let registry = h.session.registry();
    for _ in 0..200 {
        if registry.len().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(registry.titles().await, ["/twitter/mentions"]);
    assert_eq!(h.shutdown.finished(), 0);

    h.host.window("/twitter/mentions").close();
    eventually("shutdown", || h.shutdown.finished() == 1).await;
    assert_eq!(h.fs.unmounts(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.shutdown.finished(), 1);
}

#[tokio::test]
async fn failed_event_loop_keeps_window_registered() {
    let h = Harness::new(feed());
    h.session.open(WindowMode::Home).await.expect("home");
    let fake = h.host.window("/twitter/home");
    eventually("initial load", || fake.times_shown() == 1).await;

    fake.break_events();
    eventually("event loop exit", || fake.loop_ended()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.session.registry().titles().await, ["/twitter/home"]);
    assert_eq!(h.shutdown.finished(), 0);
    assert_eq!(h.fs.unmounts(), 0);
}
