//! Output formatting

use serde::Serialize;
use serde_json::Value;

use crate::commands::OutputFormat;
use crate::error::CliResult;

/// Print a value in the requested format
pub fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table | OutputFormat::Plain => {
            let value = serde_json::to_value(value)?;
            for line in render_lines(&value, format) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

/// Print as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Key/value lines for the top level of an object
fn render_lines(value: &Value, format: OutputFormat) -> Vec<String> {
    let Value::Object(map) = value else {
        return vec![scalar(value)];
    };
    let width = map.keys().map(String::len).max().unwrap_or(0);
    map.iter()
        .map(|(key, v)| match format {
            OutputFormat::Plain => format!("{}={}", key, scalar(v)),
            _ => format!("{:<width$}  {}", key, scalar(v), width = width),
        })
        .collect()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_lines_are_aligned() {
        let lines = render_lines(
            &json!({ "status": "healthy", "backend": "memory" }),
            OutputFormat::Table,
        );
        assert_eq!(lines, vec!["backend  memory", "status   healthy"]);
    }

    #[test]
    fn test_plain_lines() {
        let lines = render_lines(&json!({ "valid": false, "error": null }), OutputFormat::Plain);
        assert_eq!(lines, vec!["error=-", "valid=false"]);
    }
}
