//! Field paths naming a location inside a quote.

use crate::quote::JobId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A location in a quote that can diverge between two copies.
///
/// Rendered and parsed as `fields.<name>`, `jobs[<id>].<name>`, `jobs[<id>]`
/// or `financials`, which is also the serde representation so paths can be
/// used as JSON object keys. Inside `jobs[..]` paths, `\` and `]` in the job
/// id and parameter name are escaped with a backslash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldPath {
    /// A scalar field of the quote.
    Scalar(String),
    /// A parameter of one job.
    JobField {
        /// The job.
        job: JobId,
        /// The parameter name.
        field: String,
    },
    /// The presence of one job (removed on one side, edited on the other).
    Job(JobId),
    /// The derived financials sub-record.
    Financials,
}

impl FieldPath {
    /// Path of a scalar field.
    pub fn scalar(name: impl Into<String>) -> Self {
        FieldPath::Scalar(name.into())
    }

    /// Path of a job parameter.
    pub fn job_field(job: JobId, field: impl Into<String>) -> Self {
        FieldPath::JobField {
            job,
            field: field.into(),
        }
    }

    /// The job this path is scoped to, if any.
    pub fn job(&self) -> Option<&JobId> {
        match self {
            FieldPath::JobField { job, .. } | FieldPath::Job(job) => Some(job),
            _ => None,
        }
    }

    /// True if the path lies inside the job collection.
    pub fn is_job_scoped(&self) -> bool {
        self.job().is_some()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Scalar(name) => write!(f, "fields.{name}"),
            FieldPath::JobField { job, field } => {
                write!(f, "jobs[{}].{}", Escaped(job.as_str()), Escaped(field))
            }
            FieldPath::Job(job) => write!(f, "jobs[{}]", Escaped(job.as_str())),
            FieldPath::Financials => f.write_str("financials"),
        }
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if matches!(c, '\\' | ']') {
                f.write_str("\\")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Reads an escaped segment up to the first unescaped `]`.
///
/// Returns the unescaped segment and what follows the `]`, or `None` if the
/// segment is never closed or ends on a lone backslash.
fn take_escaped(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?.1),
            ']' => return Some((out, &s[i + 1..])),
            c => out.push(c),
        }
    }
    None
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            ']' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// Error returned when a string is not a valid [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field path: {0:?}")]
pub struct ParsePathError(pub String);

impl FromStr for FieldPath {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParsePathError(s.to_string());

        if s == "financials" {
            return Ok(FieldPath::Financials);
        }
        if let Some(name) = s.strip_prefix("fields.") {
            if name.is_empty() {
                return Err(invalid());
            }
            return Ok(FieldPath::Scalar(name.to_string()));
        }
        let rest = s.strip_prefix("jobs[").ok_or_else(invalid)?;
        let (id, tail) = take_escaped(rest).ok_or_else(invalid)?;
        if id.is_empty() {
            return Err(invalid());
        }
        if tail.is_empty() {
            return Ok(FieldPath::Job(JobId::new(id)));
        }
        let field = tail
            .strip_prefix('.')
            .and_then(unescape)
            .filter(|field| !field.is_empty())
            .ok_or_else(invalid)?;
        Ok(FieldPath::job_field(JobId::new(id), field))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let paths = [
            FieldPath::scalar("contact_email"),
            FieldPath::job_field(JobId::new("J-1"), "quantity"),
            FieldPath::Job(JobId::new("J-2")),
            FieldPath::Financials,
            FieldPath::job_field(JobId::new("J1"), "size]"),
            FieldPath::job_field(JobId::new("J1].size"), "rate"),
            FieldPath::job_field(JobId::new(r"J\1"), r"a\]."),
            FieldPath::Job(JobId::new("J1].size")),
        ];
        for path in paths {
            let rendered = path.to_string();
            assert_eq!(rendered.parse::<FieldPath>().unwrap(), path);
        }
    }

    #[test]
    fn rendered_forms() {
        assert_eq!(FieldPath::scalar("notes").to_string(), "fields.notes");
        assert_eq!(
            FieldPath::job_field(JobId::new("J1"), "rate").to_string(),
            "jobs[J1].rate"
        );
        assert_eq!(FieldPath::Job(JobId::new("J1")).to_string(), "jobs[J1]");
        assert_eq!(
            FieldPath::job_field(JobId::new("J1"), "size]").to_string(),
            r"jobs[J1].size\]"
        );
    }

    #[test]
    fn rejects_garbage() {
        let bad_paths = [
            "",
            "fields.",
            "jobs[]",
            "jobs[J1",
            "jobs[J1].",
            "quote.notes",
            "jobs[J1]x",
            "jobs[J1].a]b",
            r"jobs[J1\",
            r"jobs[J1].a\",
        ];
        for bad in bad_paths {
            assert!(bad.parse::<FieldPath>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn usable_as_json_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(FieldPath::scalar("status"), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"fields.status":1}"#);
        let back: std::collections::BTreeMap<FieldPath, i32> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);

        let mut map = std::collections::BTreeMap::new();
        map.insert(FieldPath::job_field(JobId::new("J1"), "size]"), 2);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<FieldPath, i32> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
