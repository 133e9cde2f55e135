//! End-to-end tests for the hivepatch commands against a hive file.

use hivepatch::cli::{
    ApplyOptions, Context, cmd_apply, cmd_rollback_plan, cmd_seed, cmd_validate, open_store,
};
use hivepatch::settings::Backend;
use hivepatch_core::{Config, HiveStore, HivepatchError, Value, decode, validate};
use serde_json::Value as Json;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BASELINE: &str = r#"[
    {
        "Path": "Software\\Microsoft\\Windows\\CurrentVersion\\Internet Settings",
        "Scope": "CURRENT_USER",
        "Properties": [
            { "Name": "ProxyEnable", "Type": "DWord", "Value": 1 },
            { "Name": "ProxyServer", "Type": "String", "Value": "proxy.corp:8080" },
            { "Name": "WarnOnIntranet", "Type": "DWord", "Value": 1 }
        ]
    },
    {
        "Path": "Software\\Vendor\\Agent",
        "Properties": [
            { "Name": "Servers", "Type": "Strings", "Value": ["a", "b"] },
            { "Name": "Token", "Type": "Binary", "Value": "AAEC" }
        ]
    }
]"#;

const CHANGE: &str = r#"[
    {
        "Path": "Software\\Microsoft\\Windows\\CurrentVersion\\Internet Settings",
        "Scope": "CURRENT_USER",
        "Properties": [
            { "Name": "ProxyEnable", "Type": "DWord", "Value": 0 },
            { "Name": "ProxyServer", "Type": "String", "Value": "" },
            { "Name": "WarnOnIntranet", "Type": "DWord", "Value": 0 }
        ]
    },
    {
        "Path": "Software\\Vendor\\Agent",
        "Properties": [
            { "Name": "Servers", "Type": "Strings", "Value": ["c"] }
        ]
    }
]"#;

struct Fixture {
    dir: TempDir,
    ctx: Context,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = Context {
            backend: Backend::Hive,
            hive: dir.path().join("test.hive"),
            json_mode: false,
            verbose: false,
        };
        let fixture = Self { dir, ctx };
        let baseline = fixture.write("baseline.json", BASELINE);
        cmd_seed(&fixture.ctx, &baseline).expect("seed");
        fixture
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write");
        path
    }

    fn options(&self, config: &Path) -> ApplyOptions {
        ApplyOptions {
            config: config.to_path_buf(),
            save_prev: false,
            confirm: false,
            audit_dir: None,
        }
    }

    fn apply(&self, opts: &ApplyOptions, answers: &str) -> Result<PathBuf, HivepatchError> {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        cmd_apply(&self.ctx, opts, &mut input, &mut output)
    }

    /// Current live values for every property of `doc`, in document order.
    fn live(&self, doc: &str) -> Vec<Value> {
        let mut config = decode(doc.as_bytes()).expect("decode");
        let mut store = HiveStore::open(&self.ctx.hive).expect("open hive");
        validate(&mut store, &mut config).expect("validate");
        prev_values(&config)
    }

    fn files_ending_with(&self, suffix: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").path())
            .filter(|p| p.to_string_lossy().ends_with(suffix))
            .collect();
        found.sort();
        found
    }
}

fn prev_values(config: &Config) -> Vec<Value> {
    config
        .keys
        .iter()
        .flat_map(|k| k.properties.iter())
        .map(|p| p.prev_value.clone().expect("captured"))
        .collect()
}

// =============================================================================
// APPLY
// =============================================================================

#[test]
fn apply_writes_values_and_audit_file() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);

    let audit = fx.apply(&fx.options(&change), "").expect("apply");

    let name = audit
        .file_name()
        .expect("file name")
        .to_string_lossy()
        .to_string();
    assert!(name.starts_with("change.json."));
    assert!(name.ends_with(".save"));
    assert!(!name.ends_with(".partial.save"));

    let json: Json = serde_json::from_slice(&std::fs::read(&audit).expect("read")).expect("json");
    let proxy = json[0]["Properties"].as_array().expect("properties");
    assert_eq!(proxy[0]["PrevValue"], 1);
    assert_eq!(proxy[1]["PrevValue"], "proxy.corp:8080");
    assert_eq!(proxy[2]["PrevValue"], 1);
    assert_eq!(json[1]["Properties"][0]["PrevValue"], serde_json::json!(["a", "b"]));

    assert_eq!(
        fx.live(CHANGE),
        vec![
            Value::DWord(0),
            Value::String(String::new()),
            Value::DWord(0),
            Value::Strings(vec!["c".into()]),
        ]
    );

    // Input is left alone without save_prev.
    assert_eq!(std::fs::read_to_string(&change).expect("read"), CHANGE);
}

#[test]
fn save_prev_overwrites_input() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);
    let mut opts = fx.options(&change);
    opts.save_prev = true;

    let audit = fx.apply(&opts, "").expect("apply");

    let input = decode(&std::fs::read(&change).expect("read")).expect("decode");
    let saved = decode(&std::fs::read(&audit).expect("read")).expect("decode");
    assert_eq!(input, saved);
    assert_eq!(input.captured_count(), 4);

    // Only the input was replaced; no staging file is left behind.
    let entries = std::fs::read_dir(fx.dir.path()).expect("read dir").count();
    assert_eq!(entries, 4);
}

#[test]
fn audit_dir_receives_audit_file() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);
    let audit_dir = fx.dir.path().join("audit");
    std::fs::create_dir(&audit_dir).expect("mkdir");
    let mut opts = fx.options(&change);
    opts.audit_dir = Some(audit_dir.clone());

    let audit = fx.apply(&opts, "").expect("apply");

    assert_eq!(
        audit.parent().map(Path::to_path_buf),
        Some(audit_dir.canonicalize().expect("canonical"))
    );
}

#[test]
fn back_to_back_applies_keep_both_audits() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);

    let first = fx.apply(&fx.options(&change), "").expect("first apply");
    let second = fx.apply(&fx.options(&change), "").expect("second apply");

    assert_ne!(first, second);
    assert_eq!(fx.files_ending_with(".save").len(), 2);

    // The first audit still holds the values from before any change.
    let original = decode(&std::fs::read(&first).expect("read")).expect("decode");
    assert_eq!(
        original.keys[0].properties[0].prev_value,
        Some(Value::DWord(1))
    );
    let repeat = decode(&std::fs::read(&second).expect("read")).expect("decode");
    assert_eq!(repeat.keys[0].properties[0].prev_value, Some(Value::DWord(0)));
}

#[test]
fn missing_audit_dir_fails_before_any_write() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);
    let mut opts = fx.options(&change);
    opts.audit_dir = Some(fx.dir.path().join("nope"));

    let err = fx.apply(&opts, "").expect_err("must fail");

    assert!(matches!(err, HivepatchError::Persist(_)));
    assert_eq!(fx.live(CHANGE)[0], Value::DWord(1));
}

// =============================================================================
// CONFIRMATION
// =============================================================================

#[test]
fn declining_writes_nothing() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);
    let mut opts = fx.options(&change);
    opts.confirm = true;

    let err = fx.apply(&opts, "what?\nno\n").expect_err("declined");

    assert!(matches!(err, HivepatchError::Aborted(_)));
    assert_eq!(fx.live(CHANGE)[0], Value::DWord(1));
    assert!(fx.files_ending_with(".save").is_empty());
}

#[test]
fn closed_stdin_counts_as_no() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);
    let mut opts = fx.options(&change);
    opts.confirm = true;

    assert!(matches!(
        fx.apply(&opts, ""),
        Err(HivepatchError::Aborted(_))
    ));
}

#[test]
fn confirming_proceeds() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);
    let mut opts = fx.options(&change);
    opts.confirm = true;

    fx.apply(&opts, " Y \n").expect("apply");
    assert_eq!(fx.live(CHANGE)[0], Value::DWord(0));
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn failure_writes_partial_audit_and_stops() {
    let fx = Fixture::new();
    let doc = r#"[
        { "Path": "Software\\Vendor\\Agent", "Properties": [
            { "Name": "Servers", "Type": "Strings", "Value": ["z"] } ] },
        { "Path": "Software\\Vendor\\Missing", "Properties": [
            { "Name": "Anything", "Type": "DWord", "Value": 1 } ] },
        { "Path": "Software\\Microsoft\\Windows\\CurrentVersion\\Internet Settings",
          "Scope": "CURRENT_USER", "Properties": [
            { "Name": "ProxyEnable", "Type": "DWord", "Value": 0 } ] }
    ]"#;
    let change = fx.write("broken.json", doc);

    let err = fx.apply(&fx.options(&change), "").expect_err("must fail");
    assert!(matches!(err, HivepatchError::Open { .. }));

    // The first key was applied, the third never reached.
    assert_eq!(fx.live(CHANGE)[0], Value::DWord(1));
    assert_eq!(fx.live(CHANGE)[3], Value::Strings(vec!["z".into()]));

    let partial = fx.files_ending_with(".partial.save");
    assert_eq!(partial.len(), 1);
    let saved = decode(&std::fs::read(&partial[0]).expect("read")).expect("decode");
    assert_eq!(saved.captured_count(), 1);
    assert_eq!(
        saved.keys[0].properties[0].prev_value,
        Some(Value::Strings(vec!["a".into(), "b".into()]))
    );
}

#[test]
fn type_mismatch_in_store_is_a_read_error() {
    let fx = Fixture::new();
    let doc = r#"[{ "Path": "Software\\Vendor\\Agent", "Properties": [
        { "Name": "Token", "Type": "QWord", "Value": 5 } ] }]"#;
    let change = fx.write("mismatch.json", doc);

    let err = fx.apply(&fx.options(&change), "").expect_err("must fail");
    assert!(matches!(err, HivepatchError::Read { .. }));
    let message = err.to_string();
    assert!(message.contains("Token"));
    assert!(message.contains("QWord"));
}

#[test]
fn undecodable_document_is_rejected() {
    let fx = Fixture::new();
    let doc = r#"[{ "Path": "A", "Properties": [
        { "Name": "x", "Type": "ExpandString", "Value": "%PATH%" } ] }]"#;
    let change = fx.write("bad.json", doc);

    assert!(matches!(
        fx.apply(&fx.options(&change), ""),
        Err(HivepatchError::Decode(_))
    ));
    assert!(fx.files_ending_with(".save").is_empty());
}

// =============================================================================
// VALIDATE, ROLLBACK, BACKENDS
// =============================================================================

#[test]
fn validate_never_writes() {
    let fx = Fixture::new();
    let change = fx.write("change.json", CHANGE);

    cmd_validate(&fx.ctx, &change).expect("validate");

    assert_eq!(fx.live(CHANGE)[0], Value::DWord(1));
    assert!(fx.files_ending_with(".save").is_empty());
}

#[test]
fn rollback_plan_restores_previous_values() {
    let fx = Fixture::new();
    let before = fx.live(CHANGE);
    let change = fx.write("change.json", CHANGE);
    let audit = fx.apply(&fx.options(&change), "").expect("apply");

    let plan = fx.dir.path().join("restore.json");
    cmd_rollback_plan(&fx.ctx, &audit, &plan).expect("rollback plan");
    fx.apply(&fx.options(&plan), "").expect("apply plan");

    assert_eq!(fx.live(CHANGE), before);
}

#[test]
fn seed_requires_hive_backend() {
    let fx = Fixture::new();
    let baseline = fx.dir.path().join("baseline.json");
    let ctx = Context {
        backend: Backend::Windows,
        ..fx.ctx.clone()
    };

    assert!(matches!(
        cmd_seed(&ctx, &baseline),
        Err(HivepatchError::Settings(_))
    ));
}

#[cfg(not(windows))]
#[test]
fn windows_backend_unavailable_elsewhere() {
    let ctx = Context {
        backend: Backend::Windows,
        hive: PathBuf::from("unused.hive"),
        json_mode: false,
        verbose: false,
    };
    assert!(matches!(
        open_store(&ctx),
        Err(HivepatchError::Settings(_))
    ));
}
