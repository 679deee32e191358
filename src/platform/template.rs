//! `{{KEY}}` substitution for manifest files.

use crate::core::error::SetupError;
use std::collections::BTreeMap;
use std::path::Path;

/// Template variables, keyed by name.
pub type Vars<'a> = BTreeMap<&'a str, String>;

/// Replace every `{{key}}` in `template` with its value. Whitespace inside
/// the braces is ignored. Unknown keys and unclosed braces are errors;
/// substituted values are never rescanned.
pub fn render(template: &str, vars: &Vars<'_>) -> Result<String, String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| format!("unclosed template at position {}", open))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let value = vars
            .get(key)
            .ok_or_else(|| format!("unknown template variable: {}", key))?
            .clone();

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

/// Read and render a manifest file.
pub fn render_file(path: &Path, vars: &Vars<'_>) -> Result<String, SetupError> {
    let template = std::fs::read_to_string(path).map_err(|e| SetupError::Template {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    render(&template, vars).map_err(|message| SetupError::Template {
        path: path.display().to_string(),
        message,
    })
}
