//! Keyword substitution into GROMACS run-parameter (mdp) files.
//!
//! An mdp file is a list of `key = value ; comment` lines. GROMACS treats `_` and `-` in
//! keys as equivalent and ignores case, so `tc_grps`, `tc-grps` and `TC-GRPS` all name the
//! same parameter; every lookup in this module follows the same rule.

use crate::core::tools::ToolArg;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

static MDP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<lhs>\s*(?P<key>[^=;\s][^=;]*?)\s*=)\s*(?P<value>[^;]*?)\s*(?P<comment>;.*)?$",
    )
    .expect("mdp line pattern is valid")
});

/// A value for an mdp parameter (or, if the template does not know the key, for a
/// `grompp` command-line option).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MdpValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<MdpValue>),
}

impl MdpValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MdpValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MdpValue::Int(i) => Some(*i as f64),
            MdpValue::Float(f) => Some(*f),
            MdpValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converts the value into a command-line option value; booleans become flags.
    pub fn to_tool_arg(&self) -> ToolArg {
        match self {
            MdpValue::Bool(b) => ToolArg::Flag(*b),
            other => ToolArg::Value(other.to_string()),
        }
    }
}

impl fmt::Display for MdpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdpValue::Bool(true) => f.write_str("yes"),
            MdpValue::Bool(false) => f.write_str("no"),
            MdpValue::Int(i) => write!(f, "{}", i),
            MdpValue::Float(x) => write!(f, "{}", x),
            MdpValue::Text(s) => f.write_str(s),
            MdpValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for MdpValue {
    fn from(value: &str) -> Self {
        MdpValue::Text(value.to_string())
    }
}

impl From<String> for MdpValue {
    fn from(value: String) -> Self {
        MdpValue::Text(value)
    }
}

impl From<bool> for MdpValue {
    fn from(value: bool) -> Self {
        MdpValue::Bool(value)
    }
}

impl From<i64> for MdpValue {
    fn from(value: i64) -> Self {
        MdpValue::Int(value)
    }
}

impl From<u64> for MdpValue {
    fn from(value: u64) -> Self {
        MdpValue::Int(value as i64)
    }
}

impl From<f64> for MdpValue {
    fn from(value: f64) -> Self {
        MdpValue::Float(value)
    }
}

/// Canonical spelling of an mdp key used for comparisons.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}

/// Parameter overrides keyed by mdp parameter name.
///
/// Keys keep the spelling they were given with, but every accessor matches them the way
/// GROMACS does (see [`normalize_key`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MdpParams(BTreeMap<String, MdpValue>);

impl MdpParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MdpValue)> {
        self.0.iter()
    }

    fn stored_key(&self, key: &str) -> Option<String> {
        let wanted = normalize_key(key);
        self.0.keys().find(|k| normalize_key(k) == wanted).cloned()
    }

    pub fn get(&self, key: &str) -> Option<&MdpValue> {
        self.stored_key(key).and_then(|k| self.0.get(&k))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stored_key(key).is_some()
    }

    /// Inserts `value`, replacing any entry spelled differently but naming the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MdpValue>) {
        let key = key.into();
        if let Some(existing) = self.stored_key(&key) {
            self.0.remove(&existing);
        }
        self.0.insert(key, value.into());
    }

    /// Inserts `value` only if the key is not present yet.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<MdpValue>) {
        let key = key.into();
        if !self.contains(&key) {
            self.0.insert(key, value.into());
        }
    }

    pub fn take(&mut self, key: &str) -> Option<MdpValue> {
        self.stored_key(key).and_then(|k| self.0.remove(&k))
    }

    /// Adds every entry of `other` whose key is not already present.
    pub fn merge_defaults(&mut self, other: &MdpParams) {
        for (key, value) in other.iter() {
            self.set_default(key.clone(), value.clone());
        }
    }

    /// Overlays `other`; its entries win.
    pub fn extend(&mut self, other: MdpParams) {
        for (key, value) in other.0 {
            self.set(key, value);
        }
    }

    /// Converts the entries into command-line options.
    pub fn to_tool_args(&self) -> Vec<(String, ToolArg)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_tool_arg()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<MdpValue>> FromIterator<(K, V)> for MdpParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = MdpParams::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Parsed `key = value` entries of an mdp file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdpFile {
    entries: Vec<(String, String)>,
}

impl MdpFile {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| MDP_LINE.captures(line))
            .map(|caps| (caps["key"].to_string(), caps["value"].to_string()))
            .collect();
        Self { entries }
    }

    /// Value of the last assignment to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        let wanted = normalize_key(key);
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| normalize_key(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Substitutes `overrides` into the mdp `template`.
///
/// Every assignment line whose key is overridden gets the new value; comments and all
/// other lines are kept verbatim. Returns the edited text and the overrides that matched
/// no line in the template.
pub fn edit_mdp(template: &str, overrides: &MdpParams) -> (String, MdpParams) {
    let wanted: BTreeMap<String, (&String, &MdpValue)> = overrides
        .iter()
        .map(|(k, v)| (normalize_key(k), (k, v)))
        .collect();
    let mut used = std::collections::BTreeSet::new();
    let mut out = String::with_capacity(template.len());

    for line in template.lines() {
        let replaced = MDP_LINE.captures(line).and_then(|caps| {
            let norm = normalize_key(&caps["key"]);
            let (_, value) = wanted.get(&norm)?;
            used.insert(norm);
            let mut new_line = format!("{} {}", &caps["lhs"], value);
            if let Some(comment) = caps.name("comment") {
                new_line.push(' ');
                new_line.push_str(comment.as_str());
            }
            Some(new_line.trim_end().to_string())
        });
        match replaced {
            Some(new_line) => out.push_str(&new_line),
            None => out.push_str(line),
        }
        out.push('\n');
    }

    let unprocessed = wanted
        .into_iter()
        .filter(|(norm, _)| !used.contains(norm))
        .map(|(_, (k, v))| (k.clone(), v.clone()))
        .collect();
    (out, unprocessed)
}

/// Like [`edit_mdp`], writing the result to `new_mdp`.
pub fn edit_mdp_file(
    template: &str,
    new_mdp: &Path,
    overrides: &MdpParams,
) -> io::Result<MdpParams> {
    let (text, unprocessed) = edit_mdp(template, overrides);
    std::fs::write(new_mdp, text)?;
    Ok(unprocessed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
; minimal template
include                  = -I.
define                   =
integrator               = md      ; leap-frog
nsteps                   = 1000
tc_grps                  = Protein SOL
tau-t                    = 0.1 0.1
";

    #[test]
    fn normalize_key_treats_dash_underscore_and_case_alike() {
        assert_eq!(normalize_key("tc_grps"), "tc-grps");
        assert_eq!(normalize_key(" Tc-Grps "), "tc-grps");
        assert_eq!(normalize_key("Tcoupl"), "tcoupl");
    }

    #[test]
    fn edit_replaces_values_and_keeps_comments() {
        let overrides: MdpParams = [
            ("integrator", MdpValue::from("sd")),
            ("nsteps", MdpValue::from(500_000i64)),
        ]
        .into_iter()
        .collect();

        let (text, unprocessed) = edit_mdp(TEMPLATE, &overrides);

        assert!(unprocessed.is_empty());
        assert!(text.contains("integrator               = sd ; leap-frog\n"));
        assert!(text.contains("nsteps                   = 500000\n"));
        assert!(text.starts_with("; minimal template\n"));
        assert!(text.contains("tau-t                    = 0.1 0.1\n"));
    }

    #[test]
    fn edit_matches_keys_with_either_separator() {
        let mut overrides = MdpParams::new();
        overrides.set("tc-grps", "System");
        overrides.set("tau_t", MdpValue::List(vec![0.1.into()]));

        let (text, unprocessed) = edit_mdp(TEMPLATE, &overrides);

        assert!(unprocessed.is_empty());
        assert!(text.contains("tc_grps                  = System\n"));
        assert!(text.contains("tau-t                    = 0.1\n"));
    }

    #[test]
    fn empty_text_blanks_a_parameter() {
        let mut overrides = MdpParams::new();
        overrides.set("tc-grps", "");
        let (text, _) = edit_mdp(TEMPLATE, &overrides);
        assert!(text.contains("tc_grps                  =\n"));
    }

    #[test]
    fn unknown_keys_are_returned_unprocessed() {
        let mut overrides = MdpParams::new();
        overrides.set("maxwarn", 2i64);
        overrides.set("define", "-DPOSRES");

        let (text, unprocessed) = edit_mdp(TEMPLATE, &overrides);

        assert!(text.contains("define                   = -DPOSRES\n"));
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed.get("maxwarn"), Some(&MdpValue::Int(2)));
    }

    #[test]
    fn params_accessors_match_normalized_keys() {
        let mut params = MdpParams::new();
        params.set("tau_t", 0.5);
        params.set("tau-t", 0.1);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("TAU_T"), Some(&MdpValue::Float(0.1)));

        params.set_default("tau_t", 2.0);
        assert_eq!(params.get("tau-t").and_then(MdpValue::as_f64), Some(0.1));

        assert_eq!(params.take("tau_t"), Some(MdpValue::Float(0.1)));
        assert!(params.is_empty());
    }

    #[test]
    fn values_render_for_mdp_and_command_line() {
        assert_eq!(MdpValue::Bool(true).to_string(), "yes");
        assert_eq!(MdpValue::Float(300.0).to_string(), "300");
        assert_eq!(
            MdpValue::List(vec!["Protein".into(), "SOL".into()]).to_string(),
            "Protein SOL"
        );
        assert_eq!(MdpValue::Bool(false).to_tool_arg(), ToolArg::Flag(false));
        assert_eq!(MdpValue::Int(3).to_tool_arg(), ToolArg::Value("3".into()));
    }

    #[test]
    fn mdp_file_reads_effective_values() {
        let mdp = MdpFile::parse("Tcoupl = berendsen\n; Pcoupl = no\npcoupl = No ; off\n");
        assert_eq!(mdp.len(), 2);
        assert_eq!(mdp.get("tcoupl"), Some("berendsen"));
        assert_eq!(mdp.get("Pcoupl"), Some("No"));
        assert!(mdp.get("nsteps").is_none());
    }

    #[test]
    fn values_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            params: MdpParams,
        }
        let parsed: Wrapper = toml::from_str(
            "[params]\nnstxtcout = 250\nref_t = 310.0\ndefine = \"-DPOSRES\"\ngen_vel = true\ntc-grps = [\"Protein\", \"SOL\"]\n",
        )
        .unwrap();
        let p = parsed.params;
        assert_eq!(p.get("nstxtcout"), Some(&MdpValue::Int(250)));
        assert_eq!(p.get("ref-t"), Some(&MdpValue::Float(310.0)));
        assert_eq!(p.get("define"), Some(&MdpValue::Text("-DPOSRES".into())));
        assert_eq!(p.get("gen-vel"), Some(&MdpValue::Bool(true)));
        assert_eq!(p.get("tc_grps").map(|v| v.to_string()).as_deref(), Some("Protein SOL"));
    }
}
