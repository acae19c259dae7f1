//! Rule file adapter
//!
//! One rule per line, ptype first and fields separated by commas:
//!
//! ```text
//! # comments and blank lines are ignored
//! p, alice, data1, read
//! g, alice, admin
//! ```
//!
//! Incremental operations read the file, apply the change and write the whole
//! file back.

use super::adapter::Adapter;
use super::{PolicyLine, PolicyLines};
use crate::error::{PolicyError, Result};
use crate::rule::{Rule, Section};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const SEPARATOR: char = ',';
const COMMENT: char = '#';

/// Adapter backed by a rule file
#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileAdapter {
    /// Use the file at `path`; a missing file reads as empty
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<PolicyLines> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let lines = content
            .lines()
            .enumerate()
            .filter_map(|(number, line)| parse_line(line).map(|parsed| (number, parsed)))
            .map(|(number, parsed)| {
                parsed.map_err(|e| {
                    PolicyError::InvalidArgument(format!(
                        "{}:{}: {}",
                        self.path.display(),
                        number + 1,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PolicyLines::new(lines))
    }

    fn write_lines(&self, lines: &[PolicyLine]) -> Result<()> {
        let mut content = String::new();
        for line in lines {
            content.push_str(&format_line(line)?);
            content.push('\n');
        }

        fs::write(&self.path, content)?;
        debug!("Wrote {} rules to {}", lines.len(), self.path.display());
        Ok(())
    }

    fn modify(&self, apply: impl FnOnce(&mut PolicyLines)) -> Result<()> {
        let _guard = self.lock.lock();
        let mut lines = self.read_lines()?;
        apply(&mut lines);
        self.write_lines(lines.as_slice())
    }
}

/// `None` for blank and comment lines
fn parse_line(line: &str) -> Option<Result<PolicyLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(COMMENT) {
        return None;
    }

    let mut tokens = line.split(SEPARATOR).map(str::trim);
    let ptype = tokens.next().unwrap_or_default();
    let rule: Rule = tokens.map(str::to_string).collect();

    if rule.is_empty() {
        return Some(Err(PolicyError::InvalidArgument(format!(
            "rule line '{}' has no fields",
            line
        ))));
    }
    Some(PolicyLine::new(ptype, rule))
}

/// Whether `field` reads back byte for byte after [`parse_line`]
fn is_writable(field: &str) -> bool {
    !field.contains(&[SEPARATOR, '\n', '\r'][..]) && field.trim() == field
}

fn format_line(line: &PolicyLine) -> Result<String> {
    if let Some(bad) = line.rule.iter().find(|field| !is_writable(field)) {
        return Err(PolicyError::InvalidArgument(format!(
            "field {:?} cannot be written to a rule file",
            bad
        )));
    }

    let mut out = line.ptype.clone();
    for field in &line.rule {
        out.push_str(", ");
        out.push_str(field);
    }
    Ok(out)
}

impl Adapter for FileAdapter {
    fn load_policy(&self) -> Result<Vec<PolicyLine>> {
        let _guard = self.lock.lock();
        Ok(self.read_lines()?.into_inner())
    }

    fn save_policy(&self, lines: &[PolicyLine]) -> Result<()> {
        let _guard = self.lock.lock();
        self.write_lines(lines)
    }

    fn add_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()> {
        self.add_policies(section, ptype, std::slice::from_ref(rule))
    }

    fn add_policies(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()> {
        self.modify(|lines| lines.add(section, ptype, rules))
    }

    fn remove_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()> {
        self.remove_policies(section, ptype, std::slice::from_ref(rule))
    }

    fn remove_policies(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()> {
        self.modify(|lines| lines.remove(section, ptype, rules))
    }

    fn remove_filtered_policy(
        &self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<()> {
        self.modify(|lines| lines.remove_filtered(section, ptype, field_index, values))
    }

    fn update_policy(&self, section: Section, ptype: &str, old: &Rule, new: &Rule) -> Result<()> {
        self.update_policies(
            section,
            ptype,
            std::slice::from_ref(old),
            std::slice::from_ref(new),
        )
    }

    fn update_policies(
        &self,
        section: Section,
        ptype: &str,
        olds: &[Rule],
        news: &[Rule],
    ) -> Result<()> {
        self.modify(|lines| lines.update(section, ptype, olds, news))
    }

    fn update_filtered_policies(
        &self,
        section: Section,
        ptype: &str,
        news: &[Rule],
        field_index: usize,
        values: &[String],
    ) -> Result<()> {
        self.modify(|lines| {
            lines.remove_filtered(section, ptype, field_index, values);
            lines.add(section, ptype, news);
        })
    }
}
