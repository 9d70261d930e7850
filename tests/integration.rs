use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_shelter"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn write_config(test_dir: &Path, extra_agent: &str) {
    let config_contents = String::new()
        + "seed = 2024\n"
        + "\n"
        + "[world]\n"
        + "width = 80.0\n"
        + "height = 80.0\n"
        + "\n"
        + "[agent]\n"
        + "start = [ 60.0, 60.0,]\n"
        + extra_agent
        + "\n"
        + "[output]\n"
        + "steps_per_save = 50\n"
        + "saves_per_file = 40\n";

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    write_config(&test_dir, "");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    let run_dir = test_dir.join("run-0000");
    assert!(run_dir.join("trajectory-0000.msgpack").is_file());
    assert!(run_dir.join("trajectory-0001.msgpack").is_file());
    assert!(run_dir.join("checkpoint.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results = fs::read_to_string(run_dir.join("results.json")).expect("failed to read results");
    let results: serde_json::Value =
        serde_json::from_str(&results).expect("failed to parse results");
    let summary = &results[3]["summary"];
    assert_eq!(summary["step"], 4000);
    assert!(summary["counters"]["storms_survived"].as_u64().unwrap() >= 4);

    // Both runs share the seed, so their results agree.
    let other = fs::read_to_string(test_dir.join("run-0001").join("results.json"))
        .expect("failed to read results");
    assert_eq!(
        results,
        serde_json::from_str::<serde_json::Value>(&other).expect("failed to parse results")
    );

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!run_dir.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    write_config(&test_dir, "max_carry = 0\n");

    let output = Command::new(env!("CARGO_BIN_EXE_shelter"))
        .args(["--sim-dir", test_dir.to_str().unwrap(), "create"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
