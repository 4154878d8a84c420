use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("chatsync/documents.db")
    }
}

fn run_cli(env: &CliTestEnv, user: Option<&str>, args: &[&str]) -> Output {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("chatsync-cli"));

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("CHATSYNC_USER")
        .env_remove("RUST_LOG");
    if let Some(user) = user {
        command.env("CHATSYNC_USER", user);
    }

    command
        .output()
        .unwrap_or_else(|e| panic!("failed to execute chatsync-cli: {e}"))
}

fn assert_success(args: &[&str], output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "chatsync-cli {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status,
            stdout,
            stderr
        );
    }
    stdout
}

fn cli(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_cli(env, Some("alice"), args);
    assert_success(args, &output)
}

#[test]
fn create_append_and_favorite_round_trip() {
    let env = CliTestEnv::new();

    let chat_id = cli(&env, &["new", "--seed", "fn main() {}\nprintln!"])
        .trim()
        .to_string();
    assert!(!chat_id.is_empty());
    assert!(env.db_path().exists(), "store file should exist");

    cli(&env, &["append", &chat_id, "Looks fine.", "--assistant"]);

    let shown: serde_json::Value =
        serde_json::from_str(&cli(&env, &["show", &chat_id, "--format", "json"])).unwrap();
    assert_eq!(shown["title"], "fn main() {}");
    assert_eq!(shown["isFavorited"], false);
    let messages = shown["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["isUser"], true);
    assert_eq!(messages[1]["text"], "Looks fine.");

    assert!(cli(&env, &["favorite", &chat_id]).contains("Favorited"));
    let favorites = cli(&env, &["favorites"]);
    let key = format!("alice_{}", chat_id);
    assert!(favorites.contains(&key), "favorites output:\n{favorites}");

    let snapshot = cli(&env, &["favorite-show", &key]);
    assert!(snapshot.contains("fn main() {}"));

    assert!(cli(&env, &["unfavorite", &chat_id]).contains("Unfavorited"));
    assert!(cli(&env, &["unfavorite", &chat_id]).contains("Unfavorited"));
    assert!(cli(&env, &["favorites"]).contains("No favorites yet."));
}

#[test]
fn list_is_newest_first() {
    let env = CliTestEnv::new();
    cli(&env, &["new", "--seed", "older"]);
    cli(&env, &["new", "--seed", "newer"]);

    let listed: serde_json::Value =
        serde_json::from_str(&cli(&env, &["list", "--format", "json"])).unwrap();
    let titles: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["newer", "older"]);
}

#[test]
fn users_are_isolated() {
    let env = CliTestEnv::new();
    cli(&env, &["new", "--seed", "alice's chat"]);

    let output = run_cli(&env, Some("bob"), &["list"]);
    let stdout = assert_success(&["list"], &output);
    assert!(stdout.contains("No chats yet."));
}

#[test]
fn missing_user_fails_without_writing() {
    let env = CliTestEnv::new();

    let output = run_cli(&env, None, &["new", "--seed", "hello"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not authenticated"), "stderr:\n{stderr}");
    assert!(stderr.contains("CHATSYNC_USER"));

    // Signing in afterwards shows nothing was created
    assert!(cli(&env, &["list"]).contains("No chats yet."));
}

#[test]
fn show_unknown_chat_fails() {
    let env = CliTestEnv::new();
    let output = run_cli(&env, Some("alice"), &["show", "does-not-exist"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no chat 'does-not-exist'"), "stderr:\n{stderr}");
}
