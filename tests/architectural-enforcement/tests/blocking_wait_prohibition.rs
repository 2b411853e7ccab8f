//! Integration Test: Blocking Wait Prohibition
//!
//! **Policy**: Production code runs on a tokio runtime and MUST NOT park a
//! worker thread. The splitter core goes further: it MUST NOT sleep or take
//! locks at all, since every wait in it is a rendezvous on a channel.
//!
//! Test modules (`#[cfg(test)]`) and comments are exempt.

use architectural_enforcement::{check_directory, report, Rule};

const BLOCKING: &[Rule] = &[
    Rule {
        pattern: "thread::sleep(",
        reason: "Thread sleep blocks a runtime worker",
    },
    Rule {
        pattern: ".blocking_recv(",
        reason: "Blocking channel receive",
    },
    Rule {
        pattern: ".blocking_send(",
        reason: "Blocking channel send",
    },
    Rule {
        pattern: ".blocking_lock(",
        reason: "Blocking lock acquisition",
    },
    Rule {
        pattern: "block_on(",
        reason: "Nested executor inside async code",
    },
];

const CORE_ONLY: &[Rule] = &[
    Rule {
        pattern: "time::sleep",
        reason: "Sleeping instead of waiting on a rendezvous",
    },
    Rule {
        pattern: "Mutex",
        reason: "Lock in the splitter core",
    },
    Rule {
        pattern: "RwLock",
        reason: "Lock in the splitter core",
    },
];

#[test]
fn test_no_blocking_waits_in_production_code() {
    let mut violations = check_directory("tuplesplit/core/src", BLOCKING);
    violations.extend(check_directory("tuplesplit/demo/src", BLOCKING));

    report("Blocking waits found in production code!", &violations);
}

#[test]
fn test_splitter_core_neither_sleeps_nor_locks() {
    let violations = check_directory("tuplesplit/core/src", CORE_ONLY);

    report("Sleeps or locks found in the splitter core!", &violations);
}
