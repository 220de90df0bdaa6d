use crate::extract::{OutputFormat, ScrapedOutput};

pub fn format_output(
    output: &ScrapedOutput,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Plain => Ok(format_plain(output)),
        OutputFormat::Json => format_json(output),
    }
}

/// One item per line, or the error message when extraction did not proceed.
pub fn format_plain(output: &ScrapedOutput) -> String {
    match &output.error {
        Some(error) => error.clone(),
        None => output.items.join("\n"),
    }
}

pub fn format_json(output: &ScrapedOutput) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(output)
}
