#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! migration

use assert_cmd::Command;
use predicates::prelude::*;

mod common;
use common::TestProject;

/// CLI help lists every lifecycle command
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("steady").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("read"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("sandbox"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("steady").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("steadystate"));
}

#[test]
fn test_kinds_lists_identity_formats() {
    let project = TestProject::new();
    project
        .steady()
        .arg("kinds")
        .assert()
        .success()
        .stdout(predicate::str::contains("connect_approved_origin"))
        .stdout(predicate::str::contains("instanceID,queueID"))
        .stdout(predicate::str::contains(
            "instanceID:phoneNumberID:contactFlowID",
        ))
        .stdout(predicate::str::contains("connect_rule"));
}

#[test]
fn test_create_help_requires_kind_and_attrs() {
    let mut cmd = Command::cargo_bin("steady").unwrap();
    cmd.arg("create")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--kind"))
        .stdout(predicate::str::contains("--attrs"));
}

#[test]
fn test_unknown_kind_is_rejected() {
    let project = TestProject::new();
    project
        .steady()
        .args(["create", "web", "--kind", "connect_queue", "--attrs", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource type"));
}

#[test]
fn test_approved_origin_end_to_end() {
    let project = TestProject::new();
    project.run(&["sandbox", "instance", "inst-1"]);

    project
        .steady()
        .args([
            "create",
            "web",
            "--kind",
            "connect_approved_origin",
            "--attrs",
            r#"{"instance_id": "inst-1", "origin": "https://example.com"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("inst-1,https://example.com"));

    assert!(project.state_file().exists());

    project
        .steady()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("web"))
        .stdout(predicate::str::contains("connect_approved_origin"));

    project
        .steady()
        .args(["read", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("origin = https://example.com"));

    project
        .steady()
        .args(["delete", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"));

    project
        .steady()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tracked resources"));
}

#[test]
fn test_create_twice_is_rejected() {
    let project = TestProject::new();
    project.run(&["sandbox", "instance", "inst-1"]);
    let attrs = r#"{"instance_id": "inst-1", "origin": "https://example.com"}"#;

    project.run(&[
        "create",
        "web",
        "--kind",
        "connect_approved_origin",
        "--attrs",
        attrs,
    ]);
    project
        .steady()
        .args([
            "create",
            "web",
            "--kind",
            "connect_approved_origin",
            "--attrs",
            attrs,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already tracked"));
}

#[test]
fn test_read_untracked_fails() {
    let project = TestProject::new();
    project
        .steady()
        .args(["read", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'missing' is not tracked"));
}

#[test]
fn test_attrs_must_be_json_object() {
    let project = TestProject::new();
    project
        .steady()
        .args([
            "create",
            "web",
            "--kind",
            "connect_approved_origin",
            "--attrs",
            "[1, 2]",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a JSON object"));
}

#[test]
fn test_rule_with_ambiguous_action_fails() {
    let project = TestProject::new();
    project.run(&["sandbox", "instance", "inst-1"]);

    project
        .steady()
        .args([
            "create",
            "escalate",
            "--kind",
            "connect_rule",
            "--attrs",
            r#"{
                "instance_id": "inst-1",
                "name": "escalate",
                "event_source_name": "OnPostCallAnalysisAvailable",
                "function": "{}",
                "publish_status": "DRAFT",
                "actions": [{
                    "event_bridge_action": {"name": "post-call"},
                    "assign_contact_category_action": {}
                }]
            }"#,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exactly one"));

    project
        .steady()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tracked resources"));
}

#[test]
fn test_rule_update_and_out_of_band_delete() {
    let project = TestProject::new();
    project.run(&["sandbox", "instance", "inst-1"]);
    project.run(&[
        "create",
        "escalate",
        "--kind",
        "connect_rule",
        "--attrs",
        r#"{
            "instance_id": "inst-1",
            "name": "escalate",
            "event_source_name": "OnPostCallAnalysisAvailable",
            "function": "{}",
            "publish_status": "DRAFT",
            "actions": [{"event_bridge_action": {"name": "post-call"}}]
        }"#,
    ]);

    project
        .steady()
        .args(["update", "escalate", "--attrs", r#"{"publish_status": "PUBLISHED"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 to replace"))
        .stdout(predicate::str::contains("publish_status = PUBLISHED"));

    project
        .steady()
        .args(["update", "escalate", "--attrs", "{}"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    project
        .steady()
        .args([
            "update",
            "escalate",
            "--attrs",
            r#"{"event_source_name": "OnZendeskTicketCreate"}"#,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires replacing"));
}

#[test]
fn test_import_phone_number_contact_flow() {
    let project = TestProject::new();
    project.run(&["sandbox", "instance", "inst-1"]);
    project.run(&["sandbox", "phone-number", "inst-1", "phone-1"]);
    project.run(&["sandbox", "contact-flow", "inst-1", "flow-1"]);
    project.run(&[
        "create",
        "main-line",
        "--kind",
        "connect_phone_number_contact_flow",
        "--attrs",
        r#"{"instance_id": "inst-1", "phone_number_id": "phone-1", "contact_flow_id": "flow-1"}"#,
    ]);

    project
        .steady()
        .args([
            "import",
            "main-line-copy",
            "inst-1:phone-1:flow-1",
            "--kind",
            "connect_phone_number_contact_flow",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("contact_flow_id = flow-1"));

    project
        .steady()
        .args([
            "import",
            "broken",
            "inst-1:phone-1",
            "--kind",
            "connect_phone_number_contact_flow",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "expected instanceID:phoneNumberID:contactFlowID",
        ));
}

#[test]
fn test_queue_converges_under_visibility_lag() {
    let project = TestProject::new();
    project.write_config(
        r#"
poll_interval_ms: 10
sandbox:
  page_size: 1
  visibility_lag: 2
"#,
    );
    project.run(&["sandbox", "instance", "inst-1"]);
    project.run(&["sandbox", "queue", "inst-1", "queue-1"]);
    for id in ["qc-1", "qc-2", "qc-3"] {
        project.run(&["sandbox", "quick-connect", "inst-1", id]);
    }

    project.run(&[
        "create",
        "support",
        "--kind",
        "connect_queue_quick_connects",
        "--attrs",
        r#"{"instance_id": "inst-1", "queue_id": "queue-1", "quick_connect_ids": ["qc-1", "qc-2"]}"#,
    ]);

    project
        .steady()
        .args([
            "update",
            "support",
            "--attrs",
            r#"{"quick_connect_ids": ["qc-2", "qc-3"]}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 to add, 0 to replace, 1 to remove"));

    project
        .steady()
        .args(["sandbox", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("qc-3"));
}

#[test]
fn test_project_dir_flag() {
    let project = TestProject::new();
    let elsewhere = tempfile::tempdir().unwrap();

    common::steady_in(elsewhere.path())
        .arg("--dir")
        .arg(project.path())
        .args(["sandbox", "instance", "inst-1"])
        .assert()
        .success();

    assert!(project.path().join(".steadystate").join("sandbox.json").exists());
}
