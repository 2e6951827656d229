use indoc::indoc;

use axon::{ErrorKind, RunStatus};

fn failure(status: &RunStatus) -> Option<(ErrorKind, &str)> {
    match status {
        RunStatus::RuntimeError { kind, message, .. } => Some((*kind, message.as_str())),
        _ => None,
    }
}

#[test]
fn reads_see_the_latest_write() {
    let outcome = axon::run(indoc! {"
        function square(n):
            return n * n

        memory allocate squares 4
        i = 0
        while i < len(squares):
            memory write squares i square(i)
            i = i + 1
        memory write squares 3 \"last\"
        memory read squares 2 as two
        memory read squares 3 as three
        print(two, three)
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(outcome.output, vec!["4 last"]);
}

#[test]
fn every_out_of_range_index_is_rejected() {
    let cases = [
        ("i = -1\nmemory write arr i 1\n", -1),
        ("memory write arr 3 1\n", 3),
        ("i = -2\nmemory read arr i\n", -2),
        ("memory read arr 7\n", 7),
    ];
    for (body, index) in cases {
        let source = format!("memory allocate arr 3\n{body}");
        let outcome = axon::run(&source);
        let expected = format!("index out of bounds: index {index} in buffer 'arr' of capacity 3");
        assert_eq!(
            failure(&outcome.status),
            Some((ErrorKind::MemoryError, expected.as_str())),
            "{source}"
        );
    }
}

#[test]
fn allocation_errors() {
    let twice = axon::run("memory allocate buf 2\nmemory allocate buf 2\n");
    assert_eq!(
        failure(&twice.status),
        Some((ErrorKind::MemoryError, "already allocated: buffer 'buf' is live"))
    );

    let empty = axon::run("memory allocate buf 0\n");
    assert!(matches!(
        failure(&empty.status),
        Some((ErrorKind::MemoryError, message)) if message.starts_with("invalid size 0")
    ));

    let unknown = axon::run("memory read nothing 0\n");
    assert_eq!(
        failure(&unknown.status),
        Some((ErrorKind::MemoryError, "unknown buffer 'nothing'"))
    );

    let text_size = axon::run("memory allocate buf \"big\"\n");
    assert!(matches!(
        failure(&text_size.status),
        Some((ErrorKind::TypeError, _))
    ));
}

#[test]
fn freed_buffers_report_use_after_free() {
    let outcome = axon::run(indoc! {"
        memory allocate buf 2
        memory write buf 0 1
        memory free buf
        memory read buf 0
    "});

    let RunStatus::RuntimeError {
        kind,
        message,
        line,
        ..
    } = &outcome.status
    else {
        panic!("expected runtime error, got {}", outcome.status);
    };
    assert_eq!(*kind, ErrorKind::MemoryError);
    assert_eq!(message, "use after free: buffer 'buf'");
    assert_eq!(*line, 4);
}

#[test]
fn threads_share_buffers() {
    let outcome = axon::run(indoc! {"
        memory allocate mailbox 1

        function producer():
            yield
            memory write mailbox 0 \"hello\"

        thread start producer()
        memory wait mailbox 0
        memory read mailbox 0 as message
        print(message)
    "});

    assert!(outcome.status.is_completed(), "{}", outcome.status);
    assert_eq!(outcome.output, vec!["hello"]);
}

#[test]
fn debug_memory_lists_live_and_freed_buffers() {
    let outcome = axon::run(indoc! {"
        memory allocate a 3
        memory write a 1 \"x\"
        memory allocate b 1
        memory free b
        debug memory
    "});

    assert_eq!(
        outcome.output,
        vec!["Memory:", "  a[3] = [_, x, _]", "  b (freed)"]
    );
}

#[test]
fn handles_to_a_freed_buffer_stay_stale_after_reallocation() {
    let outcome = axon::run(indoc! {"
        memory allocate a 2
        b = a
        memory free a
        memory allocate a 5
        print(b == a, len(a))
        print(len(b))
    "});

    assert_eq!(outcome.output, vec!["false 5"]);
    let RunStatus::RuntimeError {
        kind,
        message,
        line,
        ..
    } = &outcome.status
    else {
        panic!("expected runtime error, got {}", outcome.status);
    };
    assert_eq!(*kind, ErrorKind::MemoryError);
    assert_eq!(message, "use after free: buffer 'a'");
    assert_eq!(*line, 6);
}
