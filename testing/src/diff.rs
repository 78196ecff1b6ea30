//! Structural diffs of state snapshots for failure messages.
//!
//! Both values are rendered with `{:#?}`. The first line that differs is
//! mapped back to a field path (`EffectsBasicsState.count`,
//! `WebSocketState.received_messages[1]`) by walking the indentation of the
//! pretty `Debug` output, and the full rendering is diffed with
//! `pretty_assertions`.

use pretty_assertions::Comparison;
use std::fmt::{self, Debug};

/// The first difference between an expected and an actual value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDiff {
    /// Field path of the first differing line.
    pub path: String,
    /// Line-by-line diff of the pretty `Debug` renderings.
    pub rendered: String,
}

impl StateDiff {
    /// Compare two values, returning `None` when they are equal.
    #[must_use]
    pub fn between<T: Debug + PartialEq>(expected: &T, actual: &T) -> Option<Self> {
        if expected == actual {
            return None;
        }

        let expected_text = format!("{expected:#?}");
        let actual_text = format!("{actual:#?}");
        let expected_lines: Vec<&str> = expected_text.lines().collect();
        let actual_lines: Vec<&str> = actual_text.lines().collect();

        let first_difference = expected_lines
            .iter()
            .zip(&actual_lines)
            .position(|(left, right)| left != right)
            .unwrap_or_else(|| expected_lines.len().min(actual_lines.len()));

        let path = if first_difference < expected_lines.len() {
            field_path(&expected_lines, first_difference)
        } else if first_difference < actual_lines.len() {
            field_path(&actual_lines, first_difference)
        } else {
            // Unequal by PartialEq but rendered identically.
            String::from("(values differ but render identically)")
        };

        Some(Self {
            path,
            rendered: Comparison::new(expected, actual).to_string(),
        })
    }
}

impl fmt::Display for StateDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "first difference at `{}`", self.path)?;
        write!(f, "{}", self.rendered)
    }
}

enum Segment {
    Root(String),
    Field(String),
    Index(usize),
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_closing(line: &str) -> bool {
    line.trim_start().starts_with(['}', ']', ')'])
}

/// Path of the value rendered at `lines[index]`.
fn field_path(lines: &[&str], index: usize) -> String {
    let mut segments = Vec::new();
    let mut current = index;

    // A closing bracket belongs to the value opened at the same depth.
    if is_closing(lines[current]) {
        let depth = indentation(lines[current]);
        if let Some(opener) = (0..current).rev().find(|&i| indentation(lines[i]) == depth) {
            current = opener;
        }
    }

    loop {
        let depth = indentation(lines[current]);
        let parent = (0..current).rev().find(|&i| indentation(lines[i]) < depth);
        segments.push(segment(lines, current, parent, depth));
        match parent {
            Some(parent) => current = parent,
            None => break,
        }
    }

    segments.reverse();
    let mut path = String::new();
    for segment in segments {
        match segment {
            Segment::Root(name) => path.push_str(&name),
            Segment::Field(name) => {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(&name);
            },
            Segment::Index(position) => {
                path.push('[');
                path.push_str(&position.to_string());
                path.push(']');
            },
        }
    }
    path
}

fn segment(lines: &[&str], current: usize, parent: Option<usize>, depth: usize) -> Segment {
    let text = lines[current].trim_start();

    let Some(parent) = parent else {
        let opens = text.ends_with('{') || text.ends_with('(') || text.ends_with('[');
        let name: String = text
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();
        return if opens && !name.is_empty() {
            Segment::Root(name)
        } else {
            Segment::Root(String::new())
        };
    };

    if let Some((key, _)) = text.split_once(": ") {
        let is_field = key.chars().all(|c| c.is_alphanumeric() || c == '_');
        let is_map_key = key.starts_with('"') && key.ends_with('"');
        if is_field || is_map_key {
            return Segment::Field(key.to_owned());
        }
    }

    // Positional element (sequence item or tuple field).
    let position = lines[parent + 1..current]
        .iter()
        .filter(|line| indentation(line) == depth && !is_closing(line))
        .count();
    Segment::Index(position)
}
