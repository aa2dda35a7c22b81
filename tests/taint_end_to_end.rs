use repowarden::rules::load_rules;
use repowarden::taint::{analyze, SEVERITY_HIGH};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};

fn tempdir() -> std::path::PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("repowarden-itest-{}-{n}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_rule(dir: &std::path::Path, name: &str, contents: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
}

/// Spec §8 scenario 6: `input()` feeds `os.system(x)` through a variable,
/// with a taint rule on `input`'s return and a sink rule on `os.system`'s
/// first positional argument.
#[test]
fn input_flows_to_os_system_through_a_variable() {
    let rule_dir = tempdir();
    write_rule(
        &rule_dir,
        "cmd_injection.yml",
        r#"
id: "0101"
name: command injection via os.system
type: command-execution
severity: 7
confidence: 7
template: "tainted input from {TAINT} reaches {SINK}"
taints:
  - accordance: function
    function: input
    position: ret
    severity: 5
    confidence: 5
sinks:
  - accordance: function
    function: os.system
    position: 0
    severity: 7
    confidence: 7
"#,
    );
    let rules = load_rules(&rule_dir).unwrap();

    let source = "import os\nx = input()\nos.system(x)\n";
    let issues = analyze(source, "pkg/setup.py", &rules).unwrap();

    assert_eq!(issues.len(), 1, "expected exactly one issue, got {issues:?}");
    let issue = &issues[0];
    assert_eq!(issue.rule_id, "0101");
    assert!(issue.severity >= SEVERITY_HIGH);
    assert!(issue.message.contains("os.system"));
    assert!(issue.message.contains("input"));
}

/// A rule id starting with "00" is taint-only classification and must never
/// participate in sink matching, even when its taint is fed straight into a
/// matching sink.
#[test]
fn taint_only_rule_ids_never_emit_issues() {
    let rule_dir = tempdir();
    write_rule(
        &rule_dir,
        "classify_input.yml",
        r#"
id: "0000"
name: external input marker
type: input
severity: 1
confidence: 1
template: "n/a"
taints:
  - accordance: function
    function: input
    position: ret
    severity: 1
    confidence: 1
"#,
    );
    write_rule(
        &rule_dir,
        "sink_only.yml",
        r#"
id: "0200"
name: os.system sink
type: command-execution
severity: 7
confidence: 7
template: "{TAINT} reaches {SINK}"
sinks:
  - accordance: function
    function: os.system
    position: 0
    severity: 7
    confidence: 7
"#,
    );
    let rules = load_rules(&rule_dir).unwrap();

    let source = "import os\nx = input()\nos.system(x)\n";
    let issues = analyze(source, "pkg/setup.py", &rules).unwrap();
    assert!(issues.is_empty(), "00-prefixed rule taints must not feed sink matching: {issues:?}");
}

/// Arguments bound by one rule's taint don't leak to the next line's use of
/// the same variable as a plain value once it has been reassigned.
#[test]
fn reassignment_clears_prior_taint() {
    let rule_dir = tempdir();
    write_rule(
        &rule_dir,
        "rule.yml",
        r#"
id: "0102"
name: command injection
type: command-execution
severity: 7
confidence: 7
template: "{TAINT} reaches {SINK}"
taints:
  - accordance: function
    function: input
    position: ret
    severity: 5
    confidence: 5
sinks:
  - accordance: function
    function: os.system
    position: 0
    severity: 7
    confidence: 7
"#,
    );
    let rules = load_rules(&rule_dir).unwrap();

    let source = "import os\nx = input()\nx = \"ls\"\nos.system(x)\n";
    let issues = analyze(source, "pkg/setup.py", &rules).unwrap();
    assert!(issues.is_empty(), "reassigning x to a literal must clear its prior taint: {issues:?}");
}

/// The analyzer reinitializes all state per call, so running it twice over
/// the same source produces the same result set (idempotent re-run).
#[test]
fn analyze_is_idempotent_across_reruns() {
    let rule_dir = tempdir();
    write_rule(
        &rule_dir,
        "rule.yml",
        r#"
id: "0103"
name: command injection
type: command-execution
severity: 7
confidence: 7
template: "{TAINT} reaches {SINK}"
taints:
  - accordance: function
    function: input
    position: ret
    severity: 5
    confidence: 5
sinks:
  - accordance: function
    function: os.system
    position: 0
    severity: 7
    confidence: 7
"#,
    );
    let rules = load_rules(&rule_dir).unwrap();

    let source = "import os\nx = input()\nos.system(x)\n";
    let first = analyze(source, "pkg/setup.py", &rules).unwrap();
    let second = analyze(source, "pkg/setup.py", &rules).unwrap();
    assert_eq!(first, second);
}
