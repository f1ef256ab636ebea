use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use quality_schema::Report;
use serde_json::Value;

const REPORT_FIXTURES: &[&str] = &[
    "demo_data/reports/*.json",
    "integration_tests/tests/fixtures/reports/*.json",
];
const LAYER_FIXTURES: &[&str] = &[
    "demo_data/layers/*.geojson",
    "integration_tests/tests/fixtures/layers/*.geojson",
];
const REQUIRED_LAYER_PROPERTIES: &[&str] = &["name", "featureId", "qualityValue"];

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("schema") => print_schemas(),
        Some("validate-fixtures") => validate_fixtures(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask schema");
    eprintln!("       cargo xtask validate-fixtures");
    eprintln!("       cargo xtask help");
}

fn print_schemas() -> Result<(), Box<dyn Error>> {
    let schemas = serde_json::json!({
        "report_response": quality_schema::report_response_schema(),
        "request_body": quality_schema::request_body_schema(),
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

fn validate_fixtures() -> Result<(), Box<dyn Error>> {
    let schema = serde_json::to_value(quality_schema::report_response_schema())?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| format!("report schema is invalid: {err}"))?;

    let mut failures = Vec::new();
    let mut checked = 0usize;

    for pattern in REPORT_FIXTURES {
        for entry in glob::glob(pattern)? {
            let path = entry?;
            checked += 1;
            let text = fs::read_to_string(&path)?;
            failures.extend(check_report(&compiled, &path, &text));
        }
    }

    for pattern in LAYER_FIXTURES {
        for entry in glob::glob(pattern)? {
            let path = entry?;
            checked += 1;
            failures.extend(check_layer(&path, &read_json(&path)?));
        }
    }

    if failures.is_empty() {
        println!("Validated {checked} fixture files");
        return Ok(());
    }
    for failure in &failures {
        eprintln!("{failure}");
    }
    Err(format!("{} fixture problems in {checked} files", failures.len()).into())
}

/// Schema check plus the strict decode the viewer applies. Fixtures named
/// `missing_*` or `invalid_*` must be rejected by the decode instead.
fn check_report(schema: &JSONSchema, path: &Path, text: &str) -> Vec<String> {
    let document: Value = match serde_json::from_str(text) {
        Ok(document) => document,
        Err(err) => return vec![format!("{}: {err}", path.display())],
    };
    let mut problems: Vec<String> = match schema.validate(&document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| format!("{}: {} at {}", path.display(), error, error.instance_path))
            .collect(),
    };

    let expect_rejection = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("missing_") || name.starts_with("invalid_"));
    match (Report::parse_json(text), expect_rejection) {
        (Ok(_), true) => problems.push(format!(
            "{}: expected the report decode to reject this fixture",
            path.display()
        )),
        (Err(err), false) => problems.push(format!("{}: {err}", path.display())),
        _ => {}
    }
    problems
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|err| format!("{}: {err}", path.display()).into())
}

fn check_layer(path: &Path, document: &Value) -> Vec<String> {
    if document["type"] != "FeatureCollection" {
        return vec![format!("{}: not a FeatureCollection", path.display())];
    }
    let Some(features) = document["features"].as_array() else {
        return vec![format!("{}: missing features array", path.display())];
    };
    let mut problems = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        for key in REQUIRED_LAYER_PROPERTIES {
            if feature["properties"].get(key).is_none() {
                problems.push(format!(
                    "{}: feature {index} has no '{key}' property",
                    path.display()
                ));
            }
        }
        if !feature["properties"]["qualityValue"].is_number() {
            problems.push(format!(
                "{}: feature {index} has a non-numeric qualityValue",
                path.display()
            ));
        }
    }
    problems
}
