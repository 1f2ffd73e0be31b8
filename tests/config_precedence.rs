use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn parcelscan_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_parcelscan"));
    cmd.env("HOME", home);
    cmd.env_remove("PARCELSCAN_CONFIG");
    cmd.env_remove("PARCELSCAN_API_BASE_URL");
    cmd.env_remove("PARCELSCAN_API_TOKEN");
    cmd.env_remove("PARCELSCAN_API_TIMEOUT_SECS");
    cmd.env_remove("PARCELSCAN_DECISION_REJECT_ON");
    cmd.env_remove("PARCELSCAN_UI_COLOR");
    cmd.env_remove("PARCELSCAN_EXPORT_DIR");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("parcelscan-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn minor_fixture() -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/minor.json")
        .display()
        .to_string()
}

fn interpret(cmd: &mut Command) -> Output {
    let fixture = minor_fixture();
    cmd.args(["--json", "interpret", fixture.as_str()])
        .output()
        .expect("run parcelscan")
}

#[test]
fn default_policy_rejects_minor_damage() {
    let home = make_temp_home();
    let out = interpret(&mut parcelscan_cmd(&home));
    assert_eq!(out.status.code(), Some(3));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["verdict"]["policy"], "any");
    assert_eq!(v["verdict"]["decision"], "reject");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_file_can_accept_minor_damage() {
    let home = make_temp_home();
    write_file(
        home.join(".config/parcelscan/config.toml").as_path(),
        br#"
[decision]
reject_on = "severe"
"#,
    );

    let out = interpret(&mut parcelscan_cmd(&home));
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["verdict"]["policy"], "severe");
    assert_eq!(v["verdict"]["decision"], "accept");
    assert_eq!(v["verdict"]["primary_damage"]["class_name"], "Crushed Corner");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/parcelscan/config.toml").as_path(),
        b"[decision]\nreject_on = \"severe\"\n",
    );

    let mut cmd = parcelscan_cmd(&home);
    cmd.env("PARCELSCAN_DECISION_REJECT_ON", "any");
    let out = interpret(&mut cmd);
    assert_eq!(out.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn cli_flag_overrides_env() {
    let home = make_temp_home();
    let fixture = minor_fixture();
    let out = parcelscan_cmd(&home)
        .env("PARCELSCAN_DECISION_REJECT_ON", "any")
        .args(["interpret", fixture.as_str(), "--policy", "severe"])
        .output()
        .expect("run parcelscan");
    assert!(out.status.success());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn explicit_config_path_wins_and_must_exist() {
    let home = make_temp_home();
    let custom = home.join("custom.toml");
    write_file(&custom, b"[api]\nbase_url = \"https://inspect.example/api\"\ntoken = \"abc\"\n");

    let out = parcelscan_cmd(&home)
        .args(["--json", "--config", custom.to_str().expect("utf8"), "config", "--show"])
        .output()
        .expect("run parcelscan");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["api"]["base_url"], "https://inspect.example/api");
    assert_eq!(v["api"]["token"], "********");

    let missing = home.join("nope.toml");
    let out = parcelscan_cmd(&home)
        .args(["--config", missing.to_str().expect("utf8"), "config", "--show"])
        .output()
        .expect("run parcelscan");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_value_exits_2() {
    let home = make_temp_home();
    let mut cmd = parcelscan_cmd(&home);
    cmd.env("PARCELSCAN_DECISION_REJECT_ON", "sometimes");
    let out = interpret(&mut cmd);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_config_section_exits_2() {
    let home = make_temp_home();
    write_file(
        home.join(".config/parcelscan/config.toml").as_path(),
        b"[scan]\ndeep = true\n",
    );
    let out = interpret(&mut parcelscan_cmd(&home));
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
