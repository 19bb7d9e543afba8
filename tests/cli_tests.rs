use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command; // Run programs
use tempfile::tempdir; // Create temporary directories for testing

fn hex_forge(dir: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("hex-forge")?;
    cmd.current_dir(dir).env("RUST_LOG", "info");
    Ok(cmd)
}

fn read_responses(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    Ok(value.as_array().cloned().unwrap_or_default())
}

#[test]
fn test_demo_run() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let output_file = tmp_dir.path().join("demo.json");

    hex_forge(tmp_dir.path())?
        .arg("demo")
        .arg("--radius")
        .arg("2")
        .arg("--ring")
        .arg("--seed")
        .arg("5")
        .arg("--output")
        .arg(&output_file)
        .assert()
        .success()
        .stderr(predicate::str::contains("Request 1 solved"));

    let responses = read_responses(&output_file)?;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["requestId"], 1);
    assert_eq!(responses[0]["success"], true);
    assert_eq!(responses[0]["tiles"].as_array().map(Vec::len), Some(19));
    Ok(())
}

#[test]
fn test_same_seed_same_output() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let first = tmp_dir.path().join("first.json");
    let second = tmp_dir.path().join("second.json");

    for output in [&first, &second] {
        hex_forge(tmp_dir.path())?
            .args(["demo", "--radius", "3", "--seed", "21", "--output"])
            .arg(output)
            .assert()
            .success();
    }
    assert_eq!(fs::read_to_string(&first)?, fs::read_to_string(&second)?);
    Ok(())
}

#[test]
fn test_solve_request_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let request_file = tmp_dir.path().join("requests.json");
    let output_file = tmp_dir.path().join("responses.json");
    fs::write(
        &request_file,
        r#"[
            { "type": "init", "seed": 3 },
            {
                "type": "solve",
                "requestId": 10,
                "solveCells": [
                    { "q": 0, "r": 0, "s": 0 },
                    { "q": 1, "r": 0, "s": -1 }
                ],
                "fixedCells": [
                    { "q": -1, "r": 0, "s": 1, "type": "WATER", "rotation": 0, "level": 0 }
                ],
                "options": { "tileTypes": ["GRASS", "WATER", "COAST_A"], "logTag": "pair" }
            },
            {
                "type": "solve",
                "requestId": 11,
                "solveCells": [{ "q": 5, "r": 5, "s": -10 }],
                "options": { "levels": 0 }
            }
        ]"#,
    )?;

    hex_forge(tmp_dir.path())?
        .args(["solve", "--workers", "2", "--request"])
        .arg(&request_file)
        .arg("--output")
        .arg(&output_file)
        .assert()
        .success()
        .stderr(predicate::str::contains("[pair]"));

    let responses = read_responses(&output_file)?;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["requestId"], 10);
    assert_eq!(responses[0]["success"], true);
    assert_eq!(responses[1]["requestId"], 11);
    assert_eq!(responses[1]["success"], false);
    assert!(responses[1]["error"].is_string());
    Ok(())
}

#[test]
fn test_config_file_in_working_directory() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let output_file = tmp_dir.path().join("flat.json");
    fs::write(tmp_dir.path().join("hex-forge.toml"), "levels = 1\nseed = 8\n")?;

    hex_forge(tmp_dir.path())?
        .args(["demo", "--radius", "2", "--output"])
        .arg(&output_file)
        .assert()
        .success();

    let responses = read_responses(&output_file)?;
    let tiles = responses[0]["tiles"].as_array().cloned().unwrap_or_default();
    assert!(!tiles.is_empty());
    assert!(tiles.iter().all(|tile| tile["level"] == 0));
    Ok(())
}

#[test]
fn test_missing_config_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    hex_forge(tmp_dir.path())?
        .args(["demo", "--config", "nowhere.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    Ok(())
}

#[test]
fn test_bad_environment_value_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    hex_forge(tmp_dir.path())?
        .env("HEX_FORGE_WORKERS", "0")
        .arg("demo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("workers"));
    Ok(())
}

#[test]
fn test_custom_catalog() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let catalog_file = tmp_dir.path().join("plain.ron");
    let output_file = tmp_dir.path().join("plain.json");
    fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("hexwfc-rules/tests/catalog_data/valid_small.ron"),
        &catalog_file,
    )?;

    hex_forge(tmp_dir.path())?
        .args(["demo", "--radius", "1", "--catalog"])
        .arg(&catalog_file)
        .arg("--output")
        .arg(&output_file)
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded"));

    let responses = read_responses(&output_file)?;
    assert_eq!(responses[0]["success"], true);
    Ok(())
}
