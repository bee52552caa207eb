use super::*;
use crate::testing::FakeAcme;

fn pairs(writes: &[(&str, &str)]) -> Vec<(String, String)> {
    writes
        .iter()
        .map(|(path, data)| (path.to_string(), data.to_string()))
        .collect()
}

#[tokio::test]
async fn new_window_reads_its_id_from_ctl() {
    let (acme, _fake) = FakeAcme::start().await;
    let first = acme.new_window().await.expect("first window");
    let second = acme.new_window().await.expect("second window");
    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
}

#[tokio::test]
async fn show_focuses_window_named_in_index() {
    let (acme, fake) = FakeAcme::start().await;
    fake.add_index_entry(3, "/twitter/mentions");
    fake.add_index_entry(4, "/twitter/home");

    assert!(acme.show("/twitter/home").await.expect("show home"));
    assert_eq!(fake.writes_to("4/ctl"), ["show\n"]);

    assert!(!acme.show("/twitter/new").await.expect("show new"));
    assert!(fake.writes_to("3/ctl").is_empty());
    assert_eq!(fake.writes().len(), 1);
}

#[tokio::test]
async fn clear_addresses_whole_body_then_writes_nothing() {
    let (acme, fake) = FakeAcme::start().await;
    let win = acme.new_window().await.expect("window");
    win.clear().await.expect("clear");
    win.write("body", b"--- 1\n").await.expect("append");
    assert_eq!(
        fake.writes(),
        pairs(&[("1/addr", ","), ("1/data", ""), ("1/body", "--- 1\n")])
    );
}

#[tokio::test]
async fn selection_reads_dot_through_xdata() {
    let (acme, fake) = FakeAcme::start().await;
    let win = acme.new_window().await.expect("window");
    fake.set_file("1/xdata", "1234");
    assert_eq!(win.selection().await.expect("selection"), "1234");
    assert_eq!(fake.writes_to("1/ctl"), ["addr=dot\n"]);
}

#[tokio::test]
async fn read_range_addresses_runes() {
    let (acme, fake) = FakeAcme::start().await;
    let win = acme.new_window().await.expect("window");
    fake.set_file("1/xdata", "alice");
    assert_eq!(win.read_range(5, 10).await.expect("range"), "alice");
    assert_eq!(fake.writes_to("1/addr"), ["#5,#10"]);
}

#[tokio::test]
async fn errors_carry_the_window_prefix() {
    let (acme, fake) = FakeAcme::start().await;
    let win = acme.new_window().await.expect("window");
    win.errf("unnamed").await.expect("errf");
    win.set_error_prefix("/twitter/new").await;
    win.errf("ctl: permission denied\n").await.expect("errf");
    win.del(true).await.expect("delete");
    assert_eq!(
        fake.writes_to("1/errors"),
        ["unnamed\n", "/twitter/new: ctl: permission denied\n"]
    );
    assert_eq!(fake.writes_to("1/ctl"), ["delete\n"]);
}

#[tokio::test]
async fn unhandled_events_are_written_back_with_original_range() {
    let (acme, fake) = FakeAcme::start().await;
    let win = acme.new_window().await.expect("window");
    fake.push_event(1, "Ml7 7 2 0 \nMl5 10 0 5 alice\n");
    fake.push_event(1, "Mx0 3 0 3 Del\n");
    let mut events = win.events().await.expect("event file");

    let look = events.next().await.expect("look");
    assert!(look.is_look());
    assert_eq!((look.q0, look.q1, look.text.as_str()), (5, 10, "alice"));
    events.write_back(&look).await.expect("write back");

    let del = events.next().await.expect("execute");
    assert!(del.is_execute());
    events.write_back(&del).await.expect("write back");

    assert_eq!(fake.writes_to("1/event"), ["Ml7 7 \n", "Mx0 3 \n"]);
    assert!(matches!(events.next().await, Err(AcmeError::EventsClosed)));
}

#[tokio::test]
async fn malformed_event_is_skipped() {
    let (acme, fake) = FakeAcme::start().await;
    let win = acme.new_window().await.expect("window");
    fake.push_event(1, "Mx1x 2 0 0 \nMx0 3 0 3 Get\n");
    let mut events = win.events().await.expect("event file");

    assert!(matches!(events.next().await, Err(AcmeError::BadEvent(_))));
    assert_eq!(events.next().await.expect("next event").text, "Get");
    assert!(matches!(events.next().await, Err(AcmeError::EventsClosed)));
}
