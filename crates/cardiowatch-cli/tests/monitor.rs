use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

/// Writes consecutive 20-sample readings; each entry is the number of
/// irregular samples in that reading.
fn write_readings(path: &Path, irregular: &[usize]) {
    let mut out = String::new();
    for &count in irregular {
        for i in 0..20 {
            let value = if i < count { 110.0 } else { 70.0 };
            out.push_str(&format!("{}\n", value));
        }
    }
    fs::write(path, out).unwrap();
}

fn run_monitor(source: &str, feed: &Path, choices: &str) -> Vec<Value> {
    let mut cmd = cargo_bin_cmd!("cardiowatch");
    cmd.args([
        "monitor",
        "--source",
        source,
        "--input",
        feed.to_str().expect("utf8 path"),
        "--duration",
        "20",
        "--timeout-ms",
        "500",
        "--choices",
        choices,
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn summary(steps: &[Value]) -> &Value {
    let last = steps.last().expect("summary line");
    assert_eq!(last["step"], "summary");
    &last["episodes"]
}

#[test]
fn retake_with_clean_reading_resolves_episode() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[8, 0]);
    let steps = run_monitor("recorded", &feed, "retake");

    assert_eq!(steps[0]["step"], "reading");
    assert_eq!(steps[0]["result"]["severity"], "moderate");
    assert_eq!(steps[0]["state"]["state"], "alerting");
    assert_eq!(steps[1]["choice"], "take_ecg");
    assert_eq!(steps[1]["result"]["requires_attention"], false);
    assert_eq!(steps[1]["state"]["state"], "idle");

    let episodes = summary(&steps);
    assert_eq!(episodes.as_array().unwrap().len(), 1);
    assert_eq!(episodes[0]["resolution"], "cleared_by_retake");
    assert_eq!(episodes[0]["retakes"], 1);
}

#[test]
fn dismiss_closes_episode_without_retake() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[15]);
    let steps = run_monitor("recorded", &feed, "dismiss");

    assert_eq!(steps[0]["result"]["severity"], "high");
    assert_eq!(steps[1]["choice"], "dismiss");
    assert_eq!(steps[1]["result"], Value::Null);
    assert_eq!(steps[1]["state"]["state"], "idle");
    let episodes = summary(&steps);
    assert_eq!(episodes[0]["resolution"], "dismissed");
    assert_eq!(episodes[0]["retakes"], 0);
}

#[test]
fn clean_reading_raises_no_alert() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[3]);
    let steps = run_monitor("recorded", &feed, "dismiss");

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["state"]["state"], "idle");
    assert!(summary(&steps).as_array().unwrap().is_empty());
}

#[test]
fn failed_retake_keeps_alert_open_until_dismissed() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[9]);
    let steps = run_monitor("recorded", &feed, "retake,dismiss");

    assert!(steps[1]["error"]
        .as_str()
        .unwrap()
        .contains("acquisition failed"));
    assert_eq!(steps[1]["state"]["state"], "awaiting_user_choice");
    assert_eq!(steps[2]["choice"], "dismiss");
    let episodes = summary(&steps);
    assert_eq!(episodes[0]["resolution"], "dismissed");
}

#[test]
fn repeated_abnormal_retakes_stay_in_one_episode() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[7, 12, 0]);
    let steps = run_monitor("live", &feed, "retake,retake");

    assert_eq!(steps[1]["result"]["severity"], "high");
    assert_eq!(steps[1]["state"]["state"], "alerting");
    assert_eq!(steps[2]["state"]["state"], "idle");
    let episodes = summary(&steps);
    assert_eq!(episodes.as_array().unwrap().len(), 1);
    assert_eq!(episodes[0]["retakes"], 2);
    assert_eq!(episodes[0]["trigger"]["irregular_beat_count"], 7);
}

#[test]
fn missing_answers_dismiss_the_alert() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[10]);
    let mut cmd = cargo_bin_cmd!("cardiowatch");
    cmd.args([
        "monitor",
        "--source",
        "recorded",
        "--input",
        feed.to_str().expect("utf8 path"),
        "--duration",
        "20",
    ])
    .write_stdin("");
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["episodes"][0]["resolution"], "dismissed");
}

#[test]
fn interactive_answers_are_read_from_stdin() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[10, 0]);
    let mut cmd = cargo_bin_cmd!("cardiowatch");
    cmd.args([
        "monitor",
        "--source",
        "recorded",
        "--input",
        feed.to_str().expect("utf8 path"),
        "--duration",
        "20",
    ])
    .write_stdin("what\nr\n");
    let assert = cmd.assert().success();
    let output = assert.get_output();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Irregular heart rhythm detected"));
    assert!(stderr.contains("unknown choice"));
    let text = String::from_utf8(output.stdout.clone()).unwrap();
    let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["episodes"][0]["resolution"], "cleared_by_retake");
}

#[test]
fn failed_interactive_retake_is_reported_and_asked_again() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    write_readings(&feed, &[9]);
    let mut cmd = cargo_bin_cmd!("cardiowatch");
    cmd.args([
        "monitor",
        "--source",
        "recorded",
        "--input",
        feed.to_str().expect("utf8 path"),
        "--duration",
        "20",
    ])
    .write_stdin("r\nd\n");
    let assert = cmd.assert().success();
    let output = assert.get_output();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Retake failed: acquisition failed"), "{}", stderr);
    assert_eq!(stderr.matches("Take another ECG [r] or dismiss [d]?").count(), 2);
    let text = String::from_utf8(output.stdout.clone()).unwrap();
    let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["episodes"][0]["resolution"], "dismissed");
}

#[test]
fn live_feed_with_nan_fails_the_reading() {
    let dir = tempdir().unwrap();
    let feed = dir.path().join("feed.txt");
    fs::write(&feed, "NaN\n".repeat(20)).unwrap();
    let steps = run_monitor("live", &feed, "dismiss");

    assert_eq!(steps[0]["step"], "reading");
    assert!(steps[0]["error"]
        .as_str()
        .unwrap()
        .contains("non-finite sample"));
    assert!(summary(&steps).as_array().unwrap().is_empty());
}

#[test]
fn recorded_source_requires_input() {
    let mut cmd = cargo_bin_cmd!("cardiowatch");
    cmd.args(["monitor", "--source", "recorded", "--choices", "dismiss"]);
    let stderr = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&stderr).contains("requires --input"));
}

#[test]
fn seeded_synthetic_monitoring_is_reproducible() -> Result<(), Box<dyn Error>> {
    let run = || -> Result<Vec<u8>, Box<dyn Error>> {
        let mut cmd = cargo_bin_cmd!("cardiowatch");
        cmd.args([
            "monitor",
            "--seed",
            "2024",
            "--readings",
            "3",
            "--choices",
            "retake,dismiss,dismiss,dismiss",
        ]);
        Ok(cmd.assert().success().get_output().stdout.clone())
    };
    assert_eq!(run()?, run()?);
    Ok(())
}
