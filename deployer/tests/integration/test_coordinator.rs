//! Coordinator tests: policies, scenarios and serial/parallel equivalence

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use sqldeploy::deploy::fsm::RequestState;
use sqldeploy::deploy::signatures::Signatures;
use sqldeploy::errors::DeployError;
use sqldeploy::models::request::{DeploymentRequest, RequestFlags, RunMode};
use sqldeploy::models::result::{Outcome, ScriptStatus};
use sqldeploy::report::summary::DeploymentReport;

use crate::common::{
    coordinator, coordinator_with_command, record, script, FakeResolver, FakeRunner, Reply,
};

const TS: &str = "20261018_101500";

fn parallel() -> RequestFlags {
    RequestFlags {
        run_parallel: true,
        ..Default::default()
    }
}

fn failure_kind(report: &DeploymentReport, target: &str) -> Option<String> {
    report
        .targets
        .iter()
        .find(|t| t.target == target)
        .and_then(|t| t.failure.as_ref())
        .map(|f| f.kind.clone())
}

fn statuses(report: &DeploymentReport, target: &str) -> Vec<ScriptStatus> {
    report
        .targets
        .iter()
        .find(|t| t.target == target)
        .map(|t| t.scripts.iter().map(|s| s.status.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_scenario_generic_error_is_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "insert into t values (1);\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1"]));
    let runner = Arc::new(FakeRunner::new().reply(
        "DB1",
        "a.sql",
        Reply::stdout(&["OK", "ORA-00001: unique constraint violated"]),
    ));
    let coordinator = coordinator(resolver, runner.clone(), &dir.path().join("logs"));

    let request = DeploymentRequest::new(["DB1"], [a], "SYS");
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(report.mode, RunMode::Serial);
    assert_eq!(report.state, RequestState::Reported);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome, Outcome::Completed);
    assert_eq!(
        report.results[0].errors,
        vec!["ORA-00001: unique constraint violated".to_string()]
    );
    assert_eq!(report.aggregate.count("ORA-00001: unique constraint violated"), 1);
    assert!(!report.has_failures());
    assert_eq!(report.exit_code(), 0);

    let log = dir.path().join("logs").join(format!("a.sql.DB1.{TS}.log"));
    let content = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines[0].starts_with('|') && lines[0].ends_with("|DB1|SYS|"));
    assert_eq!(&lines[1..], ["OK", "ORA-00001: unique constraint violated"]);
}

#[tokio::test]
async fn test_scenario_fatal_signature_aborts_target() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let b = script(dir.path(), "b.sql", "select 2 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1"]));
    let runner = Arc::new(FakeRunner::new().reply(
        "DB1",
        "a.sql",
        Reply::stdout(&["ORA-01017: invalid username/password; logon denied", "ORA-00942: never read"]),
    ));
    let coordinator = coordinator(resolver, runner.clone(), dir.path());

    let request = DeploymentRequest::new(["DB1"], [a, b], "SYS");
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(runner.runs(), vec![("db1".to_string(), "a.sql".to_string())]);
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_fatal());
    assert!(report.results[0].errors.is_empty());
    assert_eq!(report.results[0].lines.len(), 1);
    assert_eq!(
        statuses(&report, "DB1"),
        vec![
            ScriptStatus::FatalAbort {
                line: "ORA-01017: invalid username/password; logon denied".to_string()
            },
            ScriptStatus::Skipped,
        ]
    );
    assert_eq!(failure_kind(&report, "DB1").as_deref(), Some("fatal_abort"));
    assert!(report.aggregate.is_empty());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_scenario_parallel_stderr_fails_one_target() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "drop table t;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1", "DB2"]));
    let runner = Arc::new(
        FakeRunner::new()
            .reply("DB1", "a.sql", Reply::stderr("SP2-0310: unable to open file\n"))
            .reply(
                "DB2",
                "a.sql",
                Reply::stdout(&["ORA-00942: table or view does not exist"]),
            ),
    );
    let coordinator = coordinator(resolver, runner.clone(), dir.path());

    let request = DeploymentRequest::new(["DB1", "DB2"], [a], "SYS").with_flags(parallel());
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(report.mode, RunMode::Parallel);
    assert_eq!(report.targets.len(), 2);
    assert_eq!(report.targets[0].target, "DB1");
    assert_eq!(failure_kind(&report, "DB1").as_deref(), Some("script_execution"));
    assert!(matches!(
        statuses(&report, "DB1")[0],
        ScriptStatus::Failed { ref kind, .. } if kind == "script_execution"
    ));
    assert_eq!(failure_kind(&report, "DB2"), None);
    assert_eq!(statuses(&report, "DB2"), vec![ScriptStatus::Completed]);

    // Only the completed run is classified
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].target, "DB2");
    assert_eq!(
        report.aggregate.count("ORA-00942: table or view does not exist"),
        1
    );
    assert_eq!(report.exit_code(), 1);

    // The failed run still leaves its log behind
    let log = dir.path().join(format!("a.sql.DB1.{TS}.log"));
    assert!(std::fs::read_to_string(log)
        .unwrap()
        .contains("SP2-0310: unable to open file"));
}

#[tokio::test]
async fn test_serial_and_parallel_reports_agree() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "update t set x = 1;\n");
    let b = script(dir.path(), "b.sql", "update t set x = 2;\n");
    let runner = || {
        Arc::new(
            FakeRunner::new()
                .reply("DB1", "a.sql", Reply::stdout(&["1 row updated.", "ORA-00054: resource busy  "]))
                .reply("DB1", "b.sql", Reply::stdout(&["ORA-00942: table or view does not exist"]))
                .reply("DB2", "a.sql", Reply::stdout(&["ORA-00942: table or view does not exist", "SP2-0042: unknown command"]))
                .reply("DB3", "a.sql", Reply::stdout(&["Error Message = ORA-12514: TNS:listener does not currently know of service requested in connect descriptor"])),
        )
    };
    let targets = ["DB1", "DB2", "DB3"];

    let serial = coordinator(
        Arc::new(FakeResolver::new().with_targets(&targets)),
        runner(),
        &dir.path().join("serial"),
    )
    .execute_at(&DeploymentRequest::new(targets, [a.clone(), b.clone()], "SYS"), TS)
    .await
    .unwrap();

    let parallel = coordinator(
        Arc::new(FakeResolver::new().with_targets(&targets)),
        runner(),
        &dir.path().join("parallel"),
    )
    .execute_at(
        &DeploymentRequest::new(targets, [a, b], "SYS").with_flags(parallel()),
        TS,
    )
    .await
    .unwrap();

    assert_eq!(serial.aggregate, parallel.aggregate);
    assert_eq!(serial.aggregate.count("ORA-00942: table or view does not exist"), 2);
    assert_eq!(serial.aggregate.count("ORA-00054: resource busy"), 1);
    for target in targets {
        assert_eq!(statuses(&serial, target), statuses(&parallel, target));
        assert_eq!(failure_kind(&serial, target), failure_kind(&parallel, target));
    }
    assert_eq!(failure_kind(&serial, "DB3").as_deref(), Some("fatal_abort"));
    assert_eq!(serial.exit_code(), parallel.exit_code());

    let errors = |report: &DeploymentReport| -> Vec<(String, Vec<String>)> {
        report
            .results
            .iter()
            .map(|r| (r.target.clone(), r.errors.clone()))
            .collect()
    };
    assert_eq!(errors(&serial), errors(&parallel));
}

#[tokio::test]
async fn test_parallel_results_match_rescanned_logs() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1", "DB2"]));
    let runner = Arc::new(
        FakeRunner::new()
            .reply("DB1", "a.sql", Reply::stdout(&["ORA-00001: unique constraint violated", "done"]))
            .reply("DB2", "a.sql", Reply::stdout(&["SP2-0734: unknown command"])),
    );
    let coordinator = coordinator(resolver, runner, dir.path());

    let request = DeploymentRequest::new(["DB1", "DB2"], [a], "SYS").with_flags(parallel());
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    let signatures = Signatures::default();
    for result in &report.results {
        let content = std::fs::read_to_string(&result.log_path).unwrap();
        let first = signatures.scan_log(&content);
        let second = signatures.scan_log(&content);
        assert_eq!(first, second);
        assert_eq!(first.errors, result.errors);
        assert_eq!(first.lines, result.lines);
    }
    assert_eq!(report.aggregate.total(), 2);
}

#[tokio::test]
async fn test_request_level_config_errors() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1"]));
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver.clone(), runner.clone(), dir.path());

    let no_targets = DeploymentRequest::new(Vec::<String>::new(), [a.clone()], "SYS");
    let no_scripts = DeploymentRequest::new(["DB1"], Vec::<std::path::PathBuf>::new(), "SYS");
    let no_user = DeploymentRequest::new(["DB1"], [a], " ");
    let missing = DeploymentRequest::new(["DB1"], [dir.path().join("missing.sql")], "SYS");

    for request in [no_targets, no_scripts, no_user, missing] {
        let result = coordinator.execute_at(&request, TS).await;
        assert!(matches!(result, Err(DeployError::ConfigError(_))));
    }
    assert_eq!(resolver.calls(), 0);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_restricted_script_rejects_every_target() {
    let dir = TempDir::new().unwrap();
    let ok = script(dir.path(), "ok.sql", "create table t (x number);\n");
    let bad = script(dir.path(), "bad.sql", "-- housekeeping\ngrant dba to scott;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1", "DB2"]));
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver.clone(), runner.clone(), dir.path());

    for flags in [RequestFlags::default(), parallel()] {
        let request = DeploymentRequest::new(["DB1", "DB2"], [ok.clone(), bad.clone()], "SYS")
            .with_flags(flags);
        let report = coordinator.execute_at(&request, TS).await.unwrap();

        for target in ["DB1", "DB2"] {
            assert_eq!(
                failure_kind(&report, target).as_deref(),
                Some("restricted_operation")
            );
            assert_eq!(
                statuses(&report, target),
                vec![ScriptStatus::Skipped, ScriptStatus::Skipped]
            );
        }
        assert!(report.results.is_empty());
        assert_eq!(report.exit_code(), 1);
    }
    assert_eq!(resolver.calls(), 0);
    assert!(runner.calls().is_empty());

    // Disabling the check lets the same scripts run
    let request = DeploymentRequest::new(["DB1"], [ok, bad], "SYS").with_flags(RequestFlags {
        enforce_restricted_check: false,
        ..Default::default()
    });
    let report = coordinator.execute_at(&request, TS).await.unwrap();
    assert_eq!(report.exit_code(), 0);
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_unregistered_target_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(
        FakeResolver::new()
            .with_targets(&["DB1"])
            .with("BROKEN", api_models::models::DbRecord {
                connect_descriptor: "no-service".to_string(),
                env_status: String::new(),
                app_name: String::new(),
            }),
    );
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver.clone(), runner.clone(), dir.path());

    let request = DeploymentRequest::new(["NOPE", "DB1", "BROKEN"], [a], "SYS");
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(resolver.calls(), 3);
    assert_eq!(failure_kind(&report, "NOPE").as_deref(), Some("not_registered"));
    assert_eq!(failure_kind(&report, "BROKEN").as_deref(), Some("not_registered"));
    assert_eq!(failure_kind(&report, "DB1"), None);
    assert_eq!(runner.runs(), vec![("db1".to_string(), "a.sql".to_string())]);
    assert_eq!(
        report.targets.iter().map(|t| t.target.as_str()).collect::<Vec<_>>(),
        vec!["NOPE", "DB1", "BROKEN"]
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_production_guard() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(
        FakeResolver::new()
            .with("PRD1", record("PRD1", "Production", "HR"))
            .with("TST1", record("TST1", "Test", "HR")),
    );
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver, runner.clone(), dir.path());

    let guarded = DeploymentRequest::new(["PRD1", "TST1"], [a.clone()], "SYS").with_flags(
        RequestFlags {
            enforce_production_check: true,
            ..Default::default()
        },
    );
    let report = coordinator.execute_at(&guarded, TS).await.unwrap();
    assert_eq!(failure_kind(&report, "PRD1").as_deref(), Some("production_guard"));
    assert_eq!(failure_kind(&report, "TST1"), None);
    assert_eq!(runner.runs(), vec![("tst1".to_string(), "a.sql".to_string())]);

    // The guard is off by default
    let request = DeploymentRequest::new(["PRD1"], [a], "SYS");
    let report = coordinator.execute_at(&request, TS).await.unwrap();
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_application_registration_check() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(
        FakeResolver::new()
            .with("DB1", record("DB1", "Test", "HR,BILLING"))
            .with("DB2", record("DB2", "Test", "HR")),
    );
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver, runner.clone(), dir.path());

    let request = DeploymentRequest::new(["DB1", "DB2"], [a], "SYS")
        .with_flags(parallel())
        .with_required_app(Some("billing".to_string()));
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(failure_kind(&report, "DB1"), None);
    assert_eq!(failure_kind(&report, "DB2").as_deref(), Some("app_mismatch"));
    assert_eq!(runner.runs(), vec![("db1".to_string(), "a.sql".to_string())]);
}

#[tokio::test]
async fn test_timeout_fails_target() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "exec dbms_lock.sleep(3600);\n");
    let b = script(dir.path(), "b.sql", "select 1 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1"]));
    let runner = Arc::new(FakeRunner::new().reply(
        "DB1",
        "a.sql",
        Reply::Timeout(Duration::from_secs(5)),
    ));
    let coordinator = coordinator(resolver, runner.clone(), dir.path());

    let request = DeploymentRequest::new(["DB1"], [a, b], "SYS").with_flags(parallel());
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(failure_kind(&report, "DB1").as_deref(), Some("timeout"));
    let statuses = statuses(&report, "DB1");
    assert!(matches!(statuses[0], ScriptStatus::Failed { ref kind, .. } if kind == "timeout"));
    assert_eq!(statuses[1], ScriptStatus::Skipped);
    assert_eq!(runner.calls().len(), 1);
    assert!(report.results.is_empty());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_privileged_and_wallet_invocation() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1"]));
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver, runner.clone(), dir.path());

    for user in ["SYS", "deployer"] {
        let request = DeploymentRequest::new(["DB1"], [a.clone()], user);
        coordinator.execute_at(&request, TS).await.unwrap();
    }

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].program, "sqlplus");
    assert_eq!(
        calls[0].args,
        vec!["-L", "/@//dbhost.example:1521/db1", "AS", "SYSDBA"]
    );
    assert_eq!(calls[1].args, vec!["-L", "/@//dbhost.example:1521/db1"]);

    let tns_admin = |index: usize| {
        calls[index]
            .env
            .iter()
            .find(|(name, _)| name == "TNS_ADMIN")
            .map(|(_, value)| value.clone())
    };
    assert_eq!(tns_admin(0).as_deref(), Some("/wallets/sys"));
    assert_eq!(tns_admin(1).as_deref(), Some("/wallets/deployer"));
    assert!(calls[0].stdin.ends_with(&format!("@\"{}\"\n", a.display())));
}

#[tokio::test]
async fn test_duplicate_targets_run_once() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1"]));
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator(resolver.clone(), runner.clone(), dir.path());

    let request = DeploymentRequest::new(["DB1", "DB1"], [a], "SYS").with_flags(parallel());
    let report = coordinator.execute_at(&request, TS).await.unwrap();

    assert_eq!(report.targets.len(), 1);
    assert_eq!(resolver.calls(), 1);
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_same_basename_scripts_keep_separate_logs() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("x")).unwrap();
    std::fs::create_dir_all(dir.path().join("y")).unwrap();
    let x = script(&dir.path().join("x"), "upgrade.sql", "alter table t add (y number);\n");
    let y = script(&dir.path().join("y"), "upgrade.sql", "alter table u add (y number);\n");
    let runner = || {
        Arc::new(
            FakeRunner::new()
                .reply("DB1", "x/upgrade.sql", Reply::stdout(&["ORA-00942: table or view does not exist"]))
                .reply("DB1", "y/upgrade.sql", Reply::stdout(&["OK"])),
        )
    };

    let mut reports = Vec::new();
    for (name, flags) in [("serial", RequestFlags::default()), ("parallel", parallel())] {
        let request = DeploymentRequest::new(["DB1"], [x.clone(), y.clone()], "SYS")
            .with_flags(flags);
        let report = coordinator(
            Arc::new(FakeResolver::new().with_targets(&["DB1"])),
            runner(),
            &dir.path().join(name),
        )
        .execute_at(&request, TS)
        .await
        .unwrap();

        let artifacts = report.log_artifacts();
        assert_eq!(artifacts.len(), 2);
        assert_ne!(artifacts[0], artifacts[1]);
        assert!(artifacts[0].ends_with(format!("upgrade.sql.1.DB1.{TS}.log")));
        assert!(artifacts[1].ends_with(format!("upgrade.sql.2.DB1.{TS}.log")));
        reports.push(report);
    }

    let (serial, parallel) = (&reports[0], &reports[1]);
    assert_eq!(serial.aggregate.total(), 1);
    assert_eq!(serial.aggregate, parallel.aggregate);
    assert_eq!(
        serial.results.iter().map(|r| r.errors.clone()).collect::<Vec<_>>(),
        parallel.results.iter().map(|r| r.errors.clone()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_missing_command_processor_is_a_request_error() {
    let dir = TempDir::new().unwrap();
    let a = script(dir.path(), "a.sql", "select 1 from dual;\n");
    let resolver = Arc::new(FakeResolver::new().with_targets(&["DB1", "DB2"]));
    let runner = Arc::new(FakeRunner::new());
    let coordinator = coordinator_with_command(resolver.clone(), runner.clone(), dir.path(), " ");

    for flags in [RequestFlags::default(), parallel()] {
        let request = DeploymentRequest::new(["DB1", "DB2"], [a.clone()], "SYS").with_flags(flags);
        let result = coordinator.execute_at(&request, TS).await;
        assert!(matches!(result, Err(DeployError::ConfigError(_))));
    }
    assert_eq!(resolver.calls(), 0);
    assert!(runner.calls().is_empty());
}
