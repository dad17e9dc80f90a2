use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use jsonschema::JSONSchema;
use serde_json::{json, Value};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|err| panic!("clock should be >= UNIX_EPOCH: {err}"))
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{now}"));
    fs::create_dir_all(&dir)
        .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
    dir
}

fn run_gvp<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_gvp"))
        .args(args)
        .output()
        .unwrap_or_else(|err| panic!("failed to execute gvp binary: {err}"))
}

fn run_json<I, S>(args: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_gvp(args);
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "gvp command failed (status={}):\nstdout:\n{}\nstderr:\n{}",
            output.status, stdout, stderr
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    serde_json::from_str(&stdout)
        .unwrap_or_else(|err| panic!("stdout is not valid JSON: {err}\nstdout:\n{stdout}"))
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap_or_else(|| panic!("path should be valid UTF-8: {}", path.display()))
}

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|err| panic!("failed to canonicalize repo root: {err}"))
}

fn read_json_file(path: &Path) -> Value {
    let body = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read JSON file {}: {err}", path.display()));
    serde_json::from_str(&body)
        .unwrap_or_else(|err| panic!("failed to parse JSON file {}: {err}", path.display()))
}

fn validate_schema(schema_file: &str, instance: &Value) {
    let schema_path = repo_root().join("contracts/v1/schemas").join(schema_file);
    let schema_json = read_json_file(&schema_path);
    let compiled = JSONSchema::compile(&schema_json)
        .unwrap_or_else(|err| panic!("failed to compile schema {}: {err}", schema_path.display()));

    let errors = compiled
        .validate(instance)
        .err()
        .map(|iter| iter.map(|err| err.to_string()).collect::<Vec<_>>());
    if let Some(errors) = errors {
        panic!("schema validation failed for {}:\n{}", schema_file, errors.join("\n"));
    }
}

fn write_dataset(dir: &Path) -> PathBuf {
    let dataset = json!([
        {
            "district": "North",
            "record_type": "GVP",
            "location_name": "Sector 4 corner",
            "latitude": 28.61,
            "longitude": 77.21,
            "waste_type_plastic": 1,
            "waste_type_organic": 1,
            "reason_user_fee": 1,
            "who_disposes": "Street vendor stall",
            "location_setting": "Main road",
            "waste_quantity": "above_1_tonne",
            "suggested_solution_1": "More Bins",
            "suggested_solution_2": "N/A",
            "suggested_solution_3": ""
        },
        {
            "district": "north",
            "record_type": "GVP",
            "latitude": "n/a",
            "longitude": 77.0,
            "waste_type_plastic": true,
            "who_disposes": "households",
            "location_setting": "near nala",
            "waste_quantity": "below_500_kg",
            "suggested_solution_1": "awareness campaign"
        },
        {
            "district": "South",
            "record_type": "household",
            "latitude": 12.97,
            "longitude": 77.59,
            "who_disposes": null,
            "waste_quantity": "unknown"
        }
    ]);
    let path = dir.join("gvp.json");
    fs::write(&path, dataset.to_string())
        .unwrap_or_else(|err| panic!("failed to write dataset {}: {err}", path.display()));
    path
}

fn names(distribution: &Value) -> Vec<String> {
    distribution
        .as_array()
        .unwrap_or_else(|| panic!("distribution should be an array: {distribution}"))
        .iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn values(distribution: &Value) -> Vec<f64> {
    distribution
        .as_array()
        .unwrap_or_else(|| panic!("distribution should be an array: {distribution}"))
        .iter()
        .filter_map(|entry| entry.get("value").and_then(Value::as_f64))
        .collect()
}

#[test]
fn summary_reports_every_dashboard_output() {
    let sandbox = unique_temp_dir("gvp-cli-summary");
    let data = write_dataset(&sandbox);

    let output = run_json(["summary", "--data", path_str(&data)]);
    validate_schema("summary.schema.json", &output);

    assert_eq!(output["contract_version"], "cli.v1");
    let summary = &output["summary"];
    assert_eq!(summary["total_records"], 3);
    assert_eq!(summary["gvp_records"], 2);
    assert_eq!(summary["other_records"], 1);
    assert_eq!(summary["total_volume"].as_f64(), Some(13.5));
    assert_eq!(
        names(&summary["solutions"]),
        vec!["Bins and Facilites", "Awareness and Education"]
    );
    assert_eq!(names(&summary["disposal"]).len(), 3);
    assert!(summary["selection"].is_null());

    let total: f64 = values(&summary["disposal"]).iter().sum();
    assert!((total - 100.0).abs() < 1e-9, "disposal shares should sum to 100, got {total}");
}

#[test]
fn summary_filters_by_region_and_selects_single_records() {
    let sandbox = unique_temp_dir("gvp-cli-filter");
    let data = write_dataset(&sandbox);

    let south = run_json(["summary", "--data", path_str(&data), "--region", "south"]);
    validate_schema("summary.schema.json", &south);
    let summary = &south["summary"];
    assert_eq!(summary["total_records"], 1);
    assert_eq!(names(&summary["disposal"]), vec!["Unknown / Not Mentioned"]);
    let solution_values = values(&summary["solutions"]);
    assert_eq!(solution_values.len(), 8);
    assert!(solution_values.iter().all(|value| (value - 12.5).abs() < 1e-9));
    assert_eq!(summary["selection"]["index"], 2);

    let selected = run_json(["summary", "--data", path_str(&data), "--record", "0"]);
    validate_schema("summary.schema.json", &selected);
    let selection = &selected["summary"]["selection"];
    assert_eq!(names(&selection["waste_types"]), vec!["Plastic", "Organic / Food Waste"]);
    assert!(values(&selection["waste_types"]).iter().all(|value| (value - 1.0).abs() < 1e-12));

    let gvp_only = run_json(["summary", "--data", path_str(&data), "--kind", "gvp"]);
    assert_eq!(gvp_only["summary"]["total_records"], 2);
    assert_eq!(gvp_only["filter"]["kind"], "gvp");

    let other_only = run_json(["summary", "--data", path_str(&data), "--kind", " Other "]);
    assert_eq!(other_only["summary"]["total_records"], 1);
    assert_eq!(other_only["filter"]["kind"], "other");

    let rejected = run_gvp(["summary", "--data", path_str(&data), "--kind", "household"]);
    assert!(!rejected.status.success(), "unknown record kinds should be rejected");
    let stderr = String::from_utf8_lossy(&rejected.stderr);
    assert!(stderr.contains("expected `gvp` or `other`"), "unexpected stderr: {stderr}");
}

#[test]
fn table_map_and_regions_project_filtered_records() {
    let sandbox = unique_temp_dir("gvp-cli-table");
    let data = write_dataset(&sandbox);

    let table = run_json(["table", "--data", path_str(&data), "--region", "NORTH"]);
    let rows = table["rows"].as_array().unwrap_or_else(|| panic!("rows should be an array"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["disposal"], "Vendors / Small Stalls");
    assert_eq!(rows[1]["disposal"], "Households / Residents");
    assert_eq!(rows[1]["setting"], "Near Water Body / Drain");
    assert_eq!(rows[0]["weight"].as_f64(), Some(10.0));

    let map = run_json(["map", "--data", path_str(&data)]);
    let points = map["points"].as_array().unwrap_or_else(|| panic!("points should be an array"));
    let indices: Vec<u64> = points.iter().filter_map(|point| point["index"].as_u64()).collect();
    assert_eq!(indices, vec![0, 2]);

    let regions = run_json(["regions", "--data", path_str(&data)]);
    assert_eq!(regions["regions"], json!(["North", "South"]));
}

#[test]
fn classify_reports_first_match_and_unmatched_solutions() {
    let disposal = run_json([
        "classify",
        "--domain",
        "disposal",
        "--text",
        "street vendor stall",
        "--text",
        "",
    ]);
    assert_eq!(disposal["taxonomy"], "disposal");
    assert_eq!(disposal["results"][0]["category"], "Vendors / Small Stalls");
    assert_eq!(disposal["results"][1]["category"], "Unknown / Not Mentioned");

    let solution =
        run_json(["classify", "--domain", "solution", "--text", "More Bins", "--text", "???"]);
    assert_eq!(solution["results"][0]["category"], "Bins and Facilites");
    assert!(solution["results"][1]["category"].is_null());
}

#[test]
fn config_round_trips_through_yaml_and_rejects_invalid_files() {
    let sandbox = unique_temp_dir("gvp-cli-config");

    let output = run_gvp(["config", "show", "--format", "yaml"]);
    assert!(output.status.success(), "config show should succeed");
    let yaml_path = sandbox.join("config.yaml");
    fs::write(&yaml_path, &output.stdout)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", yaml_path.display()));

    let check = run_json(["--config", path_str(&yaml_path), "config", "check"]);
    assert_eq!(check["valid"], true);
    assert_eq!(check["top_n"], 5);
    assert_eq!(check["taxonomies"][2]["entries"], 8);

    let narrowed = sandbox.join("narrow.json");
    fs::write(&narrowed, r#"{"top_n": 1}"#)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", narrowed.display()));
    let data = write_dataset(&sandbox);
    let summary = run_json(["--config", path_str(&narrowed), "summary", "--data", path_str(&data)]);
    assert_eq!(names(&summary["summary"]["disposal"]).len(), 1);

    let invalid = sandbox.join("invalid.json");
    fs::write(&invalid, r#"{"top_n": 0}"#)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", invalid.display()));
    let rejected = run_gvp(["--config", path_str(&invalid), "config", "check"]);
    assert!(!rejected.status.success(), "top_n = 0 should be rejected");
    let stderr = String::from_utf8_lossy(&rejected.stderr);
    assert!(stderr.contains("top_n MUST be >= 1"), "unexpected stderr: {stderr}");
}

#[test]
fn malformed_datasets_fail_with_context() {
    let sandbox = unique_temp_dir("gvp-cli-bad-data");
    let data = sandbox.join("bad.json");
    fs::write(&data, r#"{"not": "an array"}"#)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", data.display()));

    let output = run_gvp(["summary", "--data", path_str(&data)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load dataset"), "unexpected stderr: {stderr}");

    let missing = run_gvp(["summary", "--data", path_str(&sandbox.join("missing.json"))]);
    assert!(!missing.status.success());
}
