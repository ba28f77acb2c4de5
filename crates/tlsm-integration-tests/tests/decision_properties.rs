//! End-to-end properties of the decision path that need no approver.

#![allow(clippy::arithmetic_side_effects)]

mod common;

use std::time::Duration;

use common::{CAT, Harness, NC, PYTHON, ROOT_SHELL, SERVER};
use tlsm_core::{Operation, OperationStats, TaskId, Verdict};
use tlsm_engine::{DecisionReason, INITIAL_SCORE, score_update};
use tlsm_policy::PolicyError;
use tlsm_test::test_request;

fn harness() -> Harness {
    Harness::new(Duration::from_secs(5))
}

#[tokio::test]
async fn test_empty_store_allows_everything() {
    let h = harness();
    let requests = [
        (CAT, test_request(Operation::FileOpen, "/etc/shadow")),
        (NC, test_request(Operation::SocketConnect, "10.0.0.1:443")),
        (PYTHON, test_request(Operation::SocketBind, "0.0.0.0:80")),
        (SERVER, test_request(Operation::Signal, "")),
        (TaskId(999), test_request(Operation::Execve, "/bin/sh")),
    ];
    for (task, request) in requests {
        let decision = h.engine.evaluate(task, request).await;
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.reason, DecisionReason::NoMatch);
    }
    assert!(h.engine.pending().is_empty());
}

#[tokio::test]
async fn test_first_match_wins_and_order_is_significant() {
    let h = harness();
    h.admin("add /bin/cat deny open secret");
    h.admin("add /bin/cat allow open secret");
    let verdict = h
        .engine
        .authorize(CAT, test_request(Operation::FileOpen, "/etc/secret"))
        .await;
    assert_eq!(verdict, Verdict::Deny);

    let h = harness();
    h.admin("add /bin/cat allow open secret");
    h.admin("add /bin/cat deny open secret");
    let verdict = h
        .engine
        .authorize(CAT, test_request(Operation::FileOpen, "/etc/secret"))
        .await;
    assert_eq!(verdict, Verdict::Allow);
}

#[tokio::test]
async fn test_socket_wildcard_denies_every_address() {
    let h = harness();
    h.admin("add /bin/nc deny connect any");
    for addr in ["10.0.0.1:443", "127.0.0.1:22", "[::1]:8080"] {
        let verdict = h
            .engine
            .authorize(NC, test_request(Operation::SocketConnect, addr))
            .await;
        assert_eq!(verdict, Verdict::Deny, "{addr}");
    }
    // Bind is a different operation.
    let verdict = h
        .engine
        .authorize(NC, test_request(Operation::SocketBind, "0.0.0.0:80"))
        .await;
    assert_eq!(verdict, Verdict::Allow);
}

#[tokio::test]
async fn test_exact_address_denies_only_that_address() {
    let h = harness();
    h.admin("add /usr/bin/python3 deny bind 127.0.0.1:2000");
    let denied = h
        .engine
        .authorize(PYTHON, test_request(Operation::SocketBind, "127.0.0.1:2000"))
        .await;
    let other_port = h
        .engine
        .authorize(PYTHON, test_request(Operation::SocketBind, "127.0.0.1:2001"))
        .await;
    let prefix_of_address = h
        .engine
        .authorize(PYTHON, test_request(Operation::SocketBind, "127.0.0.1:20000"))
        .await;
    assert_eq!(denied, Verdict::Deny);
    assert_eq!(other_port, Verdict::Allow);
    assert_eq!(prefix_of_address, Verdict::Allow);
}

#[tokio::test]
async fn test_file_rules_match_by_substring_and_subject_prefix() {
    let h = harness();
    h.admin("add /bin deny open /home/user/private");
    let inside = h
        .engine
        .authorize(CAT, test_request(Operation::FileOpen, "/home/user/private/key.pem"))
        .await;
    let outside = h
        .engine
        .authorize(CAT, test_request(Operation::FileOpen, "/home/user/public/key.pem"))
        .await;
    let other_subject = h
        .engine
        .authorize(PYTHON, test_request(Operation::FileOpen, "/home/user/private/key.pem"))
        .await;
    assert_eq!(inside, Verdict::Deny);
    assert_eq!(outside, Verdict::Allow);
    assert_eq!(other_subject, Verdict::Allow);
}

#[tokio::test]
async fn test_repeated_denials_clamp_score_at_zero() {
    let h = harness();
    h.admin("add /bin/nc deny connect any");
    for _ in 0..(INITIAL_SCORE / 10 + 5) {
        h.engine
            .authorize(NC, test_request(Operation::SocketConnect, "10.0.0.1:80"))
            .await;
    }
    assert_eq!(h.engine.ledger().entry(NC).score, 0);

    let mut score = INITIAL_SCORE;
    for _ in 0..10 {
        score = score_update(score, -1000);
        assert_eq!(score, 0);
    }
    for _ in 0..10 {
        let next = score_update(score, i64::from(u32::MAX));
        assert!(next >= score);
        score = next;
    }
    assert_eq!(score, u32::MAX);
}

#[tokio::test]
async fn test_root_owner_bypasses_ask_without_pending_request() {
    let h = harness();
    h.admin("add /bin/cat ask open /etc/shadow");
    let decision = h
        .engine
        .evaluate(ROOT_SHELL, test_request(Operation::FileOpen, "/etc/shadow"))
        .await;
    assert_eq!(decision.verdict, Verdict::Allow);
    assert_eq!(decision.reason, DecisionReason::PrivilegedBypass);
    assert!(decision.request_id.is_none());
    assert!(h.engine.pending().is_empty());
    assert!(h.notifier.notified().is_empty());
    // A fresh adjudication would have taken id 1.
    assert_eq!(h.engine.pending().next_id().0, 1);
}

#[tokio::test]
async fn test_stats_count_every_matched_adjudication() {
    let h = harness();
    h.admin("add /usr/bin/python3 deny bind 127.0.0.1:2000");
    h.admin("add /usr/bin/python3 allow bind any");
    h.admin("add /usr/bin/python3 allow signal");

    let binds = [
        "127.0.0.1:2000",
        "0.0.0.0:80",
        "127.0.0.1:2000",
        "10.0.0.2:5000",
        "127.0.0.1:2000",
    ];
    for addr in binds {
        h.engine
            .authorize(PYTHON, test_request(Operation::SocketBind, addr))
            .await;
    }
    h.engine
        .authorize(PYTHON, test_request(Operation::Signal, ""))
        .await;
    // No rule for connect: implicit allow, not counted.
    h.engine
        .authorize(PYTHON, test_request(Operation::SocketConnect, "1.1.1.1:53"))
        .await;

    let entry = h.engine.ledger().entry(PYTHON);
    assert_eq!(
        entry.stats.get(Operation::SocketBind),
        OperationStats { total: 5, deny: 3 }
    );
    assert_eq!(
        entry.stats.get(Operation::Signal),
        OperationStats { total: 1, deny: 0 }
    );
    assert_eq!(entry.stats.get(Operation::SocketConnect), OperationStats::default());
    for (_, stats) in entry.stats.iter() {
        assert!(stats.deny <= stats.total);
    }
    assert_eq!(entry.score, INITIAL_SCORE - 30);

    let listing = h.admin("list");
    assert!(listing.starts_with("rule #0 : /usr/bin/python3 deny bind 127.0.0.1:2000 (hit count 3)"));
}

#[tokio::test]
async fn test_deleting_a_rule_reindexes_the_rest() {
    let h = harness();
    let rules = [
        "/bin/cat deny open secret",
        "/bin/nc deny connect any",
        "/usr/bin/python3 allow signal",
        "/opt/app/server analyze",
    ];
    for rule in rules {
        h.admin(&format!("add {rule}"));
    }

    assert_eq!(h.admin("delete 1"), "deleted rule #1");
    let listing = h.admin("list");
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("rule #0 : /bin/cat deny open secret"));
    assert!(lines[1].starts_with("rule #1 : /usr/bin/python3 allow signal -"));
    assert!(lines[2].starts_with("rule #2 : /opt/app/server analyze - -"));

    // The deleted rule no longer matches.
    let verdict = h
        .engine
        .authorize(NC, test_request(Operation::SocketConnect, "10.0.0.1:80"))
        .await;
    assert_eq!(verdict, Verdict::Allow);

    let err = h
        .control
        .execute(&tlsm_engine::Writer::new(0, "/bin/sh"), "delete 3")
        .unwrap_err();
    assert!(matches!(
        err,
        tlsm_engine::ControlError::Policy(PolicyError::NotFound { index: 3 })
    ));
    assert_eq!(h.engine.rules().len(), 3);
}

#[tokio::test]
async fn test_malformed_rules_leave_store_unchanged() {
    let h = harness();
    h.admin("add /bin/nc deny connect any");
    let writer = tlsm_engine::Writer::new(0, "/bin/sh");
    for line in [
        "add /bin/nc forbid connect any",
        "add /bin/nc deny listen any",
        "add /bin/nc deny signal extra",
        "add /bin/nc deny connect",
        "add /bin/nc analyze open /etc",
    ] {
        assert!(h.control.execute(&writer, line).is_err(), "{line}");
    }
    assert_eq!(h.engine.rules().len(), 1);
}
