use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static GROUP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<nr>\d+)\s+(?P<name>\S.*?)\s*:\s*(?P<natoms>\d+)\s+atoms\s*$")
        .expect("index group pattern is valid")
});

/// One entry of the group table printed by `make_ndx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexGroup {
    pub nr: usize,
    pub name: String,
    pub natoms: usize,
}

/// Parses the group table from `make_ndx` output.
///
/// `make_ndx` prints the table once on start-up and again after every empty command, so the
/// output usually holds several listings. A listing starts at group 0; the last one is
/// returned since it reflects every command that was issued.
pub fn parse_ndx_listing(output: &str) -> Vec<IndexGroup> {
    let mut listings: Vec<Vec<IndexGroup>> = Vec::new();
    for line in output.lines() {
        let Some(caps) = GROUP_LINE.captures(line) else {
            continue;
        };
        let (Ok(nr), Ok(natoms)) = (caps["nr"].parse(), caps["natoms"].parse()) else {
            continue;
        };
        let group = IndexGroup {
            nr,
            name: caps["name"].to_string(),
            natoms,
        };
        match listings.last_mut() {
            Some(current) if nr != 0 => current.push(group),
            _ => listings.push(vec![group]),
        }
    }
    listings.pop().unwrap_or_default()
}

pub fn find_group<'a>(groups: &'a [IndexGroup], name: &str) -> Option<&'a IndexGroup> {
    groups.iter().find(|g| g.name == name)
}
