//! End-to-end runs of the `pfile` binary inside a sandbox.
//!
//! Each test starts the binary with the sandbox root as working directory
//! and home, so only the project config written there is picked up.

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use portafile_config::testing::TestEnvironment;

fn pfile(env: &TestEnvironment) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pfile"));
    cmd.current_dir(&env.root)
        .env("HOME", &env.root)
        .env_remove("PORTAFILE_LOG")
        .env_remove("PORTAFILE_LOG_LEVEL")
        .env_remove("PORTAFILE_DEFAULT_MIME")
        .env_remove("PORTAFILE_CAPABILITY_SCHEME");
    cmd
}

fn run(env: &TestEnvironment, args: &[&str]) -> Output {
    pfile(env).args(args).output().expect("Failed to execute pfile")
}

fn run_with_stdin(env: &TestEnvironment, args: &[&str], input: &[u8]) -> Output {
    let mut child = pfile(env)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn pfile");
    child.stdin.take().unwrap().write_all(input).unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn sandbox() -> TestEnvironment {
    let env = TestEnvironment::new().unwrap();
    env.write_project_config().unwrap();
    env
}

// ========== Codec ==========

#[test]
fn test_mode_converts_both_ways() {
    let env = sandbox();

    let out = run(&env, &["mode", "754"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "rwxr-xr--");

    let out = run(&env, &["mode", "rw-r-----"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "640");

    assert!(!run(&env, &["mode", "rwz------"]).status.success());
}

// ========== Path handles ==========

#[test]
fn test_write_then_cat() {
    let env = sandbox();
    let file = env.local_root.join("greeting.txt");
    let file = file.to_str().unwrap();

    assert!(run_with_stdin(&env, &["write", file], b"hello").status.success());
    assert!(run_with_stdin(&env, &["write", "--append", file], b" world")
        .status
        .success());

    let out = run(&env, &["cat", file]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "hello world");
}

#[test]
fn test_touch_mkdir_ls_rm() {
    let env = sandbox();
    let dir = env.local_root.join("a/b");
    let dir = dir.to_str().unwrap();

    assert!(!run(&env, &["mkdir", dir]).status.success());
    assert!(run(&env, &["mkdir", "-p", dir]).status.success());
    assert!(run(&env, &["mkdir", "-p", dir]).status.success());

    let file = format!("{dir}/x.txt");
    assert!(run(&env, &["touch", &file]).status.success());
    assert!(run(&env, &["touch", &file]).status.success());
    env.create_file("a/b/.hidden", b"").unwrap();

    let out = run(&env, &["ls", dir]);
    assert_eq!(stdout(&out).lines().collect::<Vec<_>>(), vec!["x.txt"]);
    let out = run(&env, &["ls", "-a", dir]);
    assert_eq!(
        stdout(&out).lines().collect::<Vec<_>>(),
        vec![".hidden", "x.txt"]
    );

    assert!(run(&env, &["rm", &file]).status.success());
    assert!(!env.local_root.join("a/b/x.txt").exists());
    assert!(!run(&env, &["rm", &file]).status.success());
}

#[test]
fn test_mv_moves_file() {
    let env = sandbox();
    let from = env.create_file("from.txt", b"data").unwrap();
    let to = env.local_root.join("to.txt");

    let out = run(&env, &["mv", from.to_str().unwrap(), to.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(!from.exists());
    assert_eq!(fs::read(&to).unwrap(), b"data");
}

#[cfg(unix)]
#[test]
fn test_permission_commands() {
    use std::os::unix::fs::PermissionsExt;

    let env = sandbox();
    let path = env.create_file("tool.sh", b"").unwrap();
    let file = path.to_str().unwrap();
    let mode = || fs::metadata(&path).unwrap().permissions().mode() & 0o777;

    assert!(run(&env, &["chmod", "754", file]).status.success());
    assert_eq!(mode(), 0o754);

    assert!(run(&env, &["perm", "execute", "off", file]).status.success());
    assert_eq!(mode(), 0o654);

    assert!(run(&env, &["perm", "write", "on", "--all-users", file])
        .status
        .success());
    assert_eq!(mode(), 0o676);

    assert!(run(&env, &["read-only", file]).status.success());
    assert_eq!(mode(), 0o454);

    assert!(run(&env, &["chmod", "rw-------", file]).status.success());
    assert_eq!(mode(), 0o600);
}

#[cfg(unix)]
#[test]
fn test_stat_json_for_path() {
    use std::os::unix::fs::PermissionsExt;

    let env = sandbox();
    let path = env.create_file("data.bin", b"12345").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

    let out = run(&env, &["stat", "--json", path.to_str().unwrap()]);
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["variant"], "path");
    assert_eq!(report["kind"], "file");
    assert_eq!(report["length"], 5);
    assert_eq!(report["permissions"], "rw-r-----");
    assert_eq!(report["mode"], "0640");
    assert_eq!(report["hidden"], false);
    assert!(report["total_space"].as_u64().unwrap() > 0);
}

// ========== Capability handles ==========

#[test]
fn test_capability_round_trip() {
    let env = sandbox();
    let doc = env.capability_uri("notes/today.md");

    assert!(run(&env, &["mkdir", &env.capability_uri("notes")])
        .status
        .success());
    assert!(env.granted_root.join("notes").is_dir());

    assert!(run(&env, &["touch", &doc]).status.success());
    assert!(run_with_stdin(&env, &["write", &doc], b"# today").status.success());
    assert_eq!(
        fs::read_to_string(env.granted_root.join("notes/today.md")).unwrap(),
        "# today"
    );

    let out = run(&env, &["cat", &doc]);
    assert_eq!(stdout(&out), "# today");

    let out = run(&env, &["ls", &env.capability_uri("notes")]);
    assert_eq!(stdout(&out).trim(), "today.md");

    assert!(run(&env, &["rm", &doc]).status.success());
    assert!(!env.granted_root.join("notes/today.md").exists());
}

#[test]
fn test_capability_nested_mkdir() {
    let env = sandbox();
    let deep = env.capability_uri("x/y/z");

    assert!(!run(&env, &["mkdir", &deep]).status.success());
    assert!(run(&env, &["mkdir", "-p", &deep]).status.success());
    assert!(env.granted_root.join("x/y/z").is_dir());
}

#[test]
fn test_capability_stat_reports_unsupported_as_null() {
    let env = sandbox();
    env.create_granted_file("pic.png", b"png").unwrap();

    let out = run(&env, &["stat", "--json", &env.capability_uri("pic.png")]);
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["variant"], "capability");
    assert_eq!(report["length"], 3);
    assert_eq!(report["can_read"], true);
    assert!(report["permissions"].is_null());
    assert!(report["total_space"].is_null());
    assert!(report["hidden"].is_null());
}

#[test]
fn test_capability_permission_change_fails() {
    let env = sandbox();
    env.create_granted_file("locked.txt", b"").unwrap();

    let out = run(&env, &["read-only", &env.capability_uri("locked.txt")]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not supported"));
}

// ========== Resolve / config ==========

#[test]
fn test_resolve_reports_variant() {
    let env = sandbox();

    let out = run(&env, &["resolve", &env.capability_uri("a.txt")]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("variant:   capability"));
    assert!(text.contains("canonical: unsupported"));

    let out = run(&env, &["resolve", "file:///tmp/a%20b.txt"]);
    assert!(stdout(&out).contains("variant:   path"));

    assert!(!run(&env, &["resolve", "gopher://x/y"]).status.success());
}

#[test]
fn test_config_show_returns_valid_toml() {
    let env = sandbox();

    let out = run(&env, &["config", "show"]);
    assert!(out.status.success());
    let parsed: portafile_config::Config = toml::from_str(&stdout(&out)).unwrap();
    assert_eq!(parsed, env.config());

    let out = run(&env, &["config", "default"]);
    let parsed: portafile_config::Config = toml::from_str(&stdout(&out)).unwrap();
    assert_eq!(parsed, portafile_config::Config::default());
}

#[test]
fn test_malformed_config_is_an_error() {
    let env = TestEnvironment::new().unwrap();
    fs::create_dir_all(env.root.join(".portafile")).unwrap();
    fs::write(env.root.join(".portafile/config.toml"), "[logging\nlevel = ").unwrap();

    let out = run(&env, &["config", "show"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to load portafile config"));
}
