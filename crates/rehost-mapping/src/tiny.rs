//! Readers for the tiny v1 and tiny v2 table formats.
//!
//! Both formats list every name once per namespace, tab separated, with
//! member owners and descriptors written in the first namespace. The
//! reader picks two namespaces by name and re-expresses owners and
//! descriptors in the chosen source namespace.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::descriptor::remap_descriptor;
use crate::error::{MappingError, MappingResult};
use crate::table::{ClassMapping, MemberMapping, TranslationTable};

/// Read a tiny table file.
pub fn load_tiny(path: &Path, source: &str, target: &str) -> MappingResult<TranslationTable> {
    let text = fs::read_to_string(path)?;
    let table = read_tiny(&text, source, target)?;
    debug!(
        path = %path.display(),
        classes = table.classes().len(),
        fields = table.fields().len(),
        methods = table.methods().len(),
        "loaded translation table"
    );
    Ok(table)
}

/// Parse tiny v1 or v2 text, selecting `source` → `target`.
pub fn read_tiny(text: &str, source: &str, target: &str) -> MappingResult<TranslationTable> {
    let header = text.lines().next().unwrap_or_default();
    let columns: Vec<&str> = header.split('\t').collect();
    let raw = match columns.as_slice() {
        ["v1", namespaces @ ..] => parse_v1(text, namespaces)?,
        ["tiny", "2", _, namespaces @ ..] => parse_v2(text, namespaces)?,
        _ => return Err(MappingError::UnsupportedFormat(header.chars().take(32).collect())),
    };
    raw.select(source, target)
}

/// A member row: owner and descriptor in column 0, then one name per
/// namespace.
struct RawMember {
    owner: String,
    descriptor: String,
    names: Vec<String>,
}

/// Every row of a table before namespaces are chosen.
struct RawTable {
    namespaces: Vec<String>,
    classes: Vec<Vec<String>>,
    fields: Vec<RawMember>,
    methods: Vec<RawMember>,
}

impl RawTable {
    fn column(&self, namespace: &str) -> MappingResult<usize> {
        self.namespaces
            .iter()
            .position(|ns| ns == namespace)
            .ok_or_else(|| MappingError::UnknownNamespace(namespace.to_string()))
    }

    fn select(self, source: &str, target: &str) -> MappingResult<TranslationTable> {
        let from = self.column(source)?;
        let to = self.column(target)?;

        // column 0 → source, for re-expressing owners and descriptors
        let to_source: HashMap<&str, &str> = self
            .classes
            .iter()
            .map(|names| (names[0].as_str(), names[from].as_str()))
            .collect();
        let rename = |name: &str| {
            to_source
                .get(name)
                .map(|n| n.to_string())
                .unwrap_or_else(|| name.to_string())
        };

        let classes = self
            .classes
            .iter()
            .filter(|names| names[from] != names[to])
            .map(|names| ClassMapping {
                source: names[from].clone(),
                target: names[to].clone(),
            })
            .collect();

        let members = |rows: &[RawMember]| -> MappingResult<Vec<MemberMapping>> {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                if row.names[from] == row.names[to] {
                    continue;
                }
                let descriptor = if from == 0 {
                    row.descriptor.clone()
                } else {
                    remap_descriptor(&row.descriptor, &rename)?
                };
                out.push(MemberMapping {
                    owner: rename(&row.owner),
                    name: row.names[from].clone(),
                    descriptor,
                    target_name: row.names[to].clone(),
                });
            }
            Ok(out)
        };
        let fields = members(&self.fields)?;
        let methods = members(&self.methods)?;

        Ok(TranslationTable::new(source, target, classes, fields, methods))
    }
}

fn expect_columns(parts: &[&str], needed: usize, line: usize) -> MappingResult<()> {
    if parts.len() < needed {
        return Err(MappingError::syntax(
            line,
            format!("expected {needed} columns, found {}", parts.len()),
        ));
    }
    Ok(())
}

/// Names for each namespace; an empty name falls back to column 0.
fn names(parts: &[&str], count: usize) -> Vec<String> {
    let first = parts.first().copied().unwrap_or_default();
    (0..count)
        .map(|i| match parts.get(i).copied() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => first.to_string(),
        })
        .collect()
}

fn parse_v1(text: &str, namespaces: &[&str]) -> MappingResult<RawTable> {
    let count = namespaces.len();
    let mut table = RawTable {
        namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
        classes: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
    };
    for (index, line) in text.lines().enumerate().skip(1) {
        let number = index + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        match parts[0] {
            "CLASS" => {
                expect_columns(&parts, 1 + count, number)?;
                table.classes.push(names(&parts[1..], count));
            }
            kind @ ("FIELD" | "METHOD") => {
                expect_columns(&parts, 3 + count, number)?;
                let member = RawMember {
                    owner: parts[1].to_string(),
                    descriptor: parts[2].to_string(),
                    names: names(&parts[3..], count),
                };
                if kind == "FIELD" {
                    table.fields.push(member);
                } else {
                    table.methods.push(member);
                }
            }
            other => {
                return Err(MappingError::syntax(number, format!("unknown row kind `{other}`")));
            }
        }
    }
    Ok(table)
}

fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_v2(text: &str, namespaces: &[&str]) -> MappingResult<RawTable> {
    let count = namespaces.len();
    let mut table = RawTable {
        namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
        classes: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
    };
    let mut escaped = false;
    let mut in_header = true;
    let mut owner: Option<String> = None;

    for (index, line) in text.lines().enumerate().skip(1) {
        let number = index + 1;
        if line.is_empty() {
            continue;
        }
        let depth = line.bytes().take_while(|b| *b == b'\t').count();
        let owned;
        let body = if escaped {
            owned = line[depth..].split('\t').map(unescape).collect::<Vec<_>>();
            owned.iter().map(String::as_str).collect::<Vec<_>>()
        } else {
            line[depth..].split('\t').collect::<Vec<_>>()
        };

        if in_header && depth == 1 {
            if body[0] == "escaped-names" {
                escaped = true;
            }
            continue;
        }
        in_header = false;

        match (depth, body[0]) {
            (0, "c") => {
                expect_columns(&body, 1 + count, number)?;
                let row = names(&body[1..], count);
                owner = Some(row[0].clone());
                table.classes.push(row);
            }
            (1, kind @ ("f" | "m")) => {
                expect_columns(&body, 2 + count, number)?;
                let class = owner
                    .clone()
                    .ok_or_else(|| MappingError::syntax(number, "member outside of a class"))?;
                let member = RawMember {
                    owner: class,
                    descriptor: body[1].to_string(),
                    names: names(&body[2..], count),
                };
                if kind == "f" {
                    table.fields.push(member);
                } else {
                    table.methods.push(member);
                }
            }
            // parameters, locals and comments carry nothing a rename needs
            (1, "c") | (2, _) | (3, _) => {}
            (_, other) => {
                return Err(MappingError::syntax(
                    number,
                    format!("unexpected `{other}` at depth {depth}"),
                ));
            }
        }
    }
    Ok(table)
}
