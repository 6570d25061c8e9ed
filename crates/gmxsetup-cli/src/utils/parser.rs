use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid setting '{0}'. Expected KEY=VALUE (e.g., 'solvate.concentration=0.15').")]
    MissingEquals(String),

    #[error("Empty key in setting '{0}'.")]
    EmptyKey(String),

    #[error("Key '{key}' has an empty component in setting '{setting}'.")]
    EmptyComponent { key: String, setting: String },
}

/// A `--set` override: a dotted key path and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub path: Vec<String>,
    pub value: toml::Value,
}

/// Parses `section.key=value`.
///
/// Section and field names use `-` as separator; `_` is accepted there and rewritten.
/// Keys below a field (environment variables, pdb2gmx options, mdp overrides) are user
/// data and kept as given. The value is read
/// as a TOML value when possible (`0.15`, `true`, `[1, 2]`, `"NA+"`) and taken verbatim as
/// a string otherwise, so `-S solvate.cation=K+` needs no quoting.
pub fn parse_setting(setting: &str) -> Result<Setting, ParseError> {
    let (key, raw) = setting
        .split_once('=')
        .ok_or_else(|| ParseError::MissingEquals(setting.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey(setting.to_string()));
    }

    let path: Vec<String> = key
        .split('.')
        .enumerate()
        .map(|(depth, c)| match depth {
            0 | 1 => c.trim().replace('_', "-"),
            _ => c.trim().to_string(),
        })
        .collect();
    if path.iter().any(String::is_empty) {
        return Err(ParseError::EmptyComponent {
            key: key.to_string(),
            setting: setting.to_string(),
        });
    }

    Ok(Setting {
        path,
        value: parse_value(raw.trim()),
    })
}

pub fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
