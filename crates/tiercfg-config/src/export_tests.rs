use super::*;
use crate::env::MapEnvironment;
use crate::test_support::{
    DEFAULT_TEMPLATE, NoCommands, RecordingRunner, RecordingSecrets, store_with_env,
};

const CONN: &str = "postgresql://airflow:p%40ss@db/airflow";

fn store(env: MapEnvironment, file: &str) -> ConfigStore {
    let runner = RecordingRunner::new([("cat /run/conn", CONN), ("cat /run/broker", "amqp://b")]);
    let mut store = ConfigStore::new(DEFAULT_TEMPLATE)
        .unwrap()
        .with_environment(env)
        .with_command_runner(runner);
    store.read_str(file, "airflow.cfg").unwrap();
    store
}

fn value<'a>(snapshot: &'a ConfigSnapshot, section: &str, key: &str) -> &'a str {
    snapshot
        .get(section, key)
        .unwrap_or_else(|| panic!("missing {section}.{key}"))
        .value()
}

fn section_value(entries: &[(String, SectionValue)], key: &str) -> SectionValue {
    entries
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| panic!("missing {key}"))
}

// --- as_dict ---

#[test]
fn test_defaults_and_file_values_present() {
    let store = store(MapEnvironment::new(), "[core]\nparallelism = 8\n\n[scheduler]\nmax_threads = 2\n");
    let snapshot = store.as_dict(ExportOptions::default()).unwrap();
    assert_eq!(value(&snapshot, "core", "parallelism"), "8");
    assert_eq!(value(&snapshot, "core", "executor"), "SequentialExecutor");
    assert_eq!(value(&snapshot, "scheduler", "max_threads"), "2");
}

#[test]
fn test_env_values_masked_except_unit_test_mode() {
    let env = MapEnvironment::new()
        .with("AIRFLOW__CORE__PARALLELISM", "64")
        .with("AIRFLOW__CORE__UNIT_TEST_MODE", "True")
        .with("UNRELATED", "x");
    let store = store(env, "");

    let masked = store.as_dict(ExportOptions::default()).unwrap();
    assert_eq!(value(&masked, "core", "parallelism"), "< hidden >");
    assert_eq!(value(&masked, "core", "unit_test_mode"), "True");

    let shown = store
        .as_dict(ExportOptions {
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(value(&shown, "core", "parallelism"), "64");
}

#[test]
fn test_include_env_false_skips_env_values() {
    let env = MapEnvironment::new().with("AIRFLOW__CORE__PARALLELISM", "64");
    let store = store(env, "");
    let snapshot = store
        .as_dict(ExportOptions {
            include_env: false,
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(value(&snapshot, "core", "parallelism"), "32");
}

#[test]
fn test_env_keys_lowercased_except_verbatim_sections() {
    let env = MapEnvironment::new()
        .with("AIRFLOW__SCHEDULER__MAX_THREADS", "4")
        .with("AIRFLOW__KUBERNETES_ENVIRONMENT_VARIABLES__GIT_SYNC_ROOT", "/git");
    let store = store(env, "");
    let snapshot = store
        .as_dict(ExportOptions {
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(value(&snapshot, "scheduler", "max_threads"), "4");
    assert_eq!(
        value(&snapshot, "kubernetes_environment_variables", "GIT_SYNC_ROOT"),
        "/git"
    );
    let keys: Vec<&str> = snapshot
        .section("kubernetes_environment_variables")
        .unwrap()
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(keys, vec!["GIT_SYNC_ROOT"]);
}

#[test]
fn test_mixed_case_file_key_merges_with_default_and_env() {
    let env = MapEnvironment::new().with("AIRFLOW__CORE__PARALLELISM", "128");
    let original = store(env, "[core]
Parallelism = 64
");
    let snapshot = original
        .as_dict(ExportOptions {
            raw: true,
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();

    let matching = snapshot
        .section("core")
        .unwrap()
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("parallelism"))
        .count();
    assert_eq!(matching, 1);
    assert_eq!(value(&snapshot, "core", "Parallelism"), "128");

    let mut written = Vec::new();
    snapshot.write_ini(&mut written, true).unwrap();
    let mut reloaded = store_with_env(MapEnvironment::new());
    reloaded
        .read_str(&String::from_utf8(written).unwrap(), "exported.cfg")
        .unwrap();
    assert_eq!(reloaded.get("core", "parallelism").unwrap(), "128");
}

#[test]
fn test_upper_case_cmd_directive_dropped_once_replaced() {
    let store = store(
        MapEnvironment::new(),
        "[core]
SQL_ALCHEMY_CONN_CMD = cat /run/conn
",
    );
    let snapshot = store
        .as_dict(ExportOptions {
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(value(&snapshot, "core", "sql_alchemy_conn"), CONN);
    assert!(snapshot.get("core", "sql_alchemy_conn_cmd").is_none());
}

#[test]
fn test_display_source_tags_every_tier() {
    let env = MapEnvironment::new().with("AIRFLOW__CORE__PARALLELISM", "64");
    let secrets = RecordingSecrets::new([("celery/broker", "amqp://secret")]);
    let runner = RecordingRunner::new([("cat /run/conn", CONN)]);
    let mut store = ConfigStore::new(DEFAULT_TEMPLATE)
        .unwrap()
        .with_environment(env)
        .with_command_runner(runner)
        .with_secret_backend(secrets);
    store
        .read_str(
            "[core]\ndags_folder = /srv/dags\nsql_alchemy_conn_cmd = cat /run/conn\n\n\
             [celery]\nbroker_url_secret = celery/broker\n",
            "airflow.cfg",
        )
        .unwrap();

    let snapshot = store
        .as_dict(ExportOptions {
            display_source: true,
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    let source = |section: &str, key: &str| snapshot.get(section, key).and_then(ExportValue::source);
    assert_eq!(source("core", "executor"), Some(SourceTag::Default));
    assert_eq!(source("core", "dags_folder"), Some(SourceTag::File));
    assert_eq!(source("core", "parallelism"), Some(SourceTag::Environment));
    assert_eq!(source("core", "sql_alchemy_conn"), Some(SourceTag::Command));
    assert_eq!(source("celery", "broker_url"), Some(SourceTag::Secret));
    assert_eq!(value(&snapshot, "core", "sql_alchemy_conn"), CONN);
    assert_eq!(value(&snapshot, "celery", "broker_url"), "amqp://secret");
    assert!(snapshot.get("core", "sql_alchemy_conn_cmd").is_none());
    assert!(snapshot.get("celery", "broker_url_secret").is_none());
}

#[test]
fn test_cmd_values_masked_by_default() {
    let store = store(
        MapEnvironment::new(),
        "[core]\nsql_alchemy_conn_cmd = cat /run/conn\n",
    );
    let snapshot = store.as_dict(ExportOptions::default()).unwrap();
    assert_eq!(value(&snapshot, "core", "sql_alchemy_conn"), "< hidden >");
}

#[test]
fn test_include_cmds_false_keeps_directive() {
    let store = store(
        MapEnvironment::new(),
        "[core]\nsql_alchemy_conn_cmd = cat /run/conn\n",
    );
    let snapshot = store
        .as_dict(ExportOptions {
            include_cmds: false,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(
        value(&snapshot, "core", "sql_alchemy_conn"),
        "sqlite:////tmp/airflow.db"
    );
    assert_eq!(value(&snapshot, "core", "sql_alchemy_conn_cmd"), "cat /run/conn");
}

#[test]
fn test_raw_keeps_references_and_escapes_env_percent() {
    let env = MapEnvironment::new().with("AIRFLOW__CORE__DAGS_FOLDER", "/data/100%");
    let store = store(env, "[core]\nbase = /x\nlog_folder = %(base)s/logs\n");

    let raw = store
        .as_dict(ExportOptions {
            raw: true,
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(value(&raw, "core", "log_folder"), "%(base)s/logs");
    assert_eq!(value(&raw, "core", "dags_folder"), "/data/100%%");

    let cooked = store
        .as_dict(ExportOptions {
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    assert_eq!(value(&cooked, "core", "log_folder"), "/x/logs");
    assert_eq!(value(&cooked, "core", "dags_folder"), "/data/100%");
}

#[test]
fn test_raw_sensitive_export_round_trips() {
    let env = MapEnvironment::new()
        .with("AIRFLOW__CORE__DAGS_FOLDER", "/data/100%/dags")
        .with("AIRFLOW__KUBERNETES_ENVIRONMENT_VARIABLES__GIT_SYNC_ROOT", "/git");
    let original = store(
        env,
        "[core]\nsql_alchemy_conn_cmd = cat /run/conn\nbase = /x\nlog_folder = %(base)s/logs\n\
         percent = 50%%\nmotd = line one\n  line two\n",
    );

    let snapshot = original
        .as_dict(ExportOptions {
            raw: true,
            display_sensitive: true,
            ..ExportOptions::default()
        })
        .unwrap();
    let mut written = Vec::new();
    snapshot.write_ini(&mut written, true).unwrap();
    let text = String::from_utf8(written).unwrap();

    let mut reloaded = store_with_env(MapEnvironment::new());
    reloaded.read_str(&text, "exported.cfg").unwrap();

    for (section, entries) in snapshot.sections() {
        for (key, _) in entries {
            assert_eq!(
                reloaded.get(section, key).unwrap(),
                original.get(section, key).unwrap(),
                "[{section}] {key} differs after reload of:\n{text}"
            );
        }
    }
    assert_eq!(reloaded.get("core", "sql_alchemy_conn").unwrap(), CONN);
}

#[test]
fn test_snapshot_serializes_as_nested_map() {
    let env = MapEnvironment::new().with("AIRFLOW__CORE__PARALLELISM", "64");
    let store = store(env, "");
    let snapshot = store
        .as_dict(ExportOptions {
            display_source: true,
            ..ExportOptions::default()
        })
        .unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(
        json["core"]["parallelism"],
        serde_json::json!(["< hidden >", "env var"])
    );
    assert_eq!(
        json["core"]["executor"],
        serde_json::json!(["SequentialExecutor", "default"])
    );
}

// --- get_section ---

#[test]
fn test_get_section_coerces_and_merges_env() {
    let env = MapEnvironment::new()
        .with("AIRFLOW__CELERY__WORKER_CONCURRENCY", "24")
        .with("AIRFLOW__CELERY__BROKER_URL_CMD", "cat /run/broker")
        .with("AIRFLOW__CELERY__VISIBILITY", "21600.5");
    let store = store(env, "[celery]\nssl_active = t\n");

    let entries = store.get_section("celery").unwrap().unwrap();
    assert_eq!(section_value(&entries, "worker_concurrency"), SectionValue::Int(24));
    assert_eq!(
        section_value(&entries, "broker_url"),
        SectionValue::Str("amqp://b".to_string())
    );
    assert_eq!(section_value(&entries, "visibility"), SectionValue::Float(21600.5));
    assert_eq!(section_value(&entries, "ssl_active"), SectionValue::Bool(true));
    assert!(entries.iter().all(|(k, _)| k != "broker_url_cmd"));

    let webserver = store.get_section("webserver").unwrap().unwrap();
    assert_eq!(section_value(&webserver, "authenticate"), SectionValue::Bool(false));
}

#[test]
fn test_get_section_unknown_is_none() {
    let env = MapEnvironment::new().with("AIRFLOW__NOPE__KEY", "1");
    let store = store(env, "");
    assert!(store.get_section("nope").unwrap().is_none());
}

#[test]
fn test_get_section_file_only_section() {
    let store = store(MapEnvironment::new(), "[scheduler]\nmax_threads = 2\n");
    let entries = store.get_section("scheduler").unwrap().unwrap();
    assert_eq!(entries, vec![("max_threads".to_string(), SectionValue::Int(2))]);
}

// --- write ---

#[test]
fn test_write_includes_env_values_and_reloads() {
    let env = MapEnvironment::new().with("AIRFLOW__CORE__DAGS_FOLDER", "/data/100%");
    let store = store(env, "[scheduler]\nmax_threads = 2\n");

    let mut out = Vec::new();
    store.write(&mut out, true).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[core]\n"));
    assert!(text.contains("dags_folder = /data/100%%\n"));
    assert!(text.contains("[scheduler]\nmax_threads = 2\n"));

    let mut reloaded = ConfigStore::new(DEFAULT_TEMPLATE)
        .unwrap()
        .with_environment(MapEnvironment::new())
        .with_command_runner(NoCommands);
    reloaded.read_str(&text, "written.cfg").unwrap();
    assert_eq!(reloaded.get("core", "dags_folder").unwrap(), "/data/100%");
    assert_eq!(reloaded.get_int("scheduler", "max_threads").unwrap(), 2);
}

#[test]
fn test_write_compact_delimiters() {
    let store = store(MapEnvironment::new(), "");
    let mut out = Vec::new();
    store.write(&mut out, false).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("executor=SequentialExecutor\n"));
    assert!(!text.contains(" = "));
}

#[test]
fn test_write_includes_env_only_section() {
    let env = MapEnvironment::new().with("AIRFLOW__EXTRA__TOKEN", "abc");
    let store = store(env, "");

    let mut out = Vec::new();
    store.write(&mut out, true).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[extra]\ntoken = abc\n"), "{text}");
    assert_eq!(text.matches("[core]").count(), 1);

    let mut reloaded = store_with_env(MapEnvironment::new());
    reloaded.read_str(&text, "written.cfg").unwrap();
    assert_eq!(reloaded.get("extra", "token").unwrap(), "abc");
}
