use crate::report::{CompareReport, DetectReport, VerifyReport};
use schemars::schema_for;
use std::fs;
use std::path::Path;

/// Generate all JSON schemas
pub fn generate_schemas(schema_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(schema_dir)?;

    let detect_schema = schema_for!(DetectReport);
    let detect_json = serde_json::to_string_pretty(&detect_schema)?;
    fs::write(schema_dir.join("detect-report-1.0.json"), detect_json)?;

    let compare_schema = schema_for!(CompareReport);
    let compare_json = serde_json::to_string_pretty(&compare_schema)?;
    fs::write(schema_dir.join("compare-report-1.0.json"), compare_json)?;

    let verify_schema = schema_for!(VerifyReport);
    let verify_json = serde_json::to_string_pretty(&verify_schema)?;
    fs::write(schema_dir.join("verify-report-1.0.json"), verify_json)?;

    Ok(())
}

/// Validate JSON against schema
pub fn validate_json(
    json: &serde_json::Value,
    schema_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    use jsonschema::JSONSchema;

    let schema_content = fs::read_to_string(schema_path)?;
    let schema_json: serde_json::Value = serde_json::from_str(&schema_content)?;

    // Compile and validate in the same scope to keep schema_json alive
    let compiled = JSONSchema::compile(&schema_json)
        .map_err(|e| format!("Failed to compile schema: {:?}", e))?;

    let validation_result = compiled.validate(json);
    let error_iter = match validation_result {
        Ok(()) => return Ok(()),
        Err(errors) => errors,
    };

    let error_msgs: Vec<String> = error_iter.map(|e| format!("{}", e)).collect();
    if !error_msgs.is_empty() {
        Err(format!("Validation error: {}", error_msgs.join("; ")).into())
    } else {
        Ok(())
    }
}
