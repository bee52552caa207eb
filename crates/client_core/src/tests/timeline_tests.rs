use super::*;
use crate::fakes::FakeFs;

#[tokio::test]
async fn entries_render_newest_first() {
    let fs = FakeFs::with_timeline(
        "home",
        &[("100", 30, "first\n"), ("101", 40, "second\n"), ("102", 35, "third\n")],
    );
    let mut out = Vec::new();
    render(&fs, "home", &mut out).await.expect("render");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "--- 101\nsecond\n--- 102\nthird\n--- 100\nfirst\n"
    );
}

#[tokio::test]
async fn many_distinct_timestamps_strictly_decrease() {
    let fs = FakeFs::with_timeline("mentions", &[]);
    // A fixed shuffle of 0..50.
    for i in 0..50u32 {
        let modified = (i * 37) % 50;
        fs.add_entry("mentions", &format!("e{modified}"), modified, b"x");
    }
    let mut out = Vec::new();
    render(&fs, "mentions", &mut out).await.expect("render");

    let order: Vec<u32> = String::from_utf8(out)
        .expect("utf8")
        .lines()
        .filter_map(|line| line.strip_prefix("--- e"))
        .map(|n| n.parse().expect("number"))
        .collect();
    assert_eq!(order.len(), 50);
    assert!(order.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test]
async fn equal_timestamps_keep_listing_order() {
    let fs = FakeFs::with_timeline("home", &[("a", 5, ""), ("b", 5, ""), ("c", 9, "")]);
    let mut out = Vec::new();
    render(&fs, "home", &mut out).await.expect("render");
    assert_eq!(String::from_utf8(out).expect("utf8"), "--- c\n--- a\n--- b\n");
}

#[tokio::test]
async fn empty_directory_renders_nothing() {
    let fs = FakeFs::with_timeline("home", &[]);
    let mut out = Vec::new();
    render(&fs, "home", &mut out).await.expect("render");
    assert!(out.is_empty());
}

#[tokio::test]
async fn long_entries_are_truncated() {
    let fs = FakeFs::with_timeline("home", &[]);
    fs.add_entry("home", "1", 1, &vec![b'z'; ENTRY_READ_LIMIT + 904]);
    let mut out = Vec::new();
    render(&fs, "home", &mut out).await.expect("render");
    assert_eq!(out.len(), "--- 1\n".len() + ENTRY_READ_LIMIT);
}

#[tokio::test]
async fn entry_failure_aborts_but_keeps_partial_output() {
    let fs = FakeFs::with_timeline("home", &[("x", 2, "body-x"), ("y", 1, "body-y")]);
    fs.fail_reads_of("home/y");
    let mut out = Vec::new();
    let err = render(&fs, "home", &mut out).await.expect_err("should fail");
    assert!(matches!(err, ClientError::Timeline { ref path, .. } if path == "home/y"));
    assert_eq!(String::from_utf8(out).expect("utf8"), "--- x\nbody-x");
}

#[tokio::test]
async fn missing_directory_names_the_path() {
    let fs = FakeFs::default();
    let mut out = Vec::new();
    let err = render(&fs, "users/nobody", &mut out)
        .await
        .expect_err("should fail");
    assert!(err.to_string().contains("users/nobody"));
}

#[test]
fn sort_is_descending_by_mtime() {
    let entry = |name: &str, modified| DirEntry {
        name: name.to_string(),
        modified,
        is_dir: false,
    };
    let mut entries = vec![entry("old", 1), entry("new", 3), entry("mid", 2)];
    sort_newest_first(&mut entries);
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["new", "mid", "old"]);
}
