// DevSim - Scripted Device Simulator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::{collections::BTreeMap, fmt::Display};

use crate::NOTIFY_FUNCTION;

const CLOSE_BRACE_PRIORITY: u8 = 255; // closes a wrapped single-statement body
const OPEN_BRACE_PRIORITY: u8 = 191; // opens a wrapped single-statement body
const NOTIFY_PRIORITY: u8 = 63; // notification calls

/// Text to insert into the script body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertContent {
    /// Opening brace turning a single statement into a block
    OpenBrace,
    /// Closing brace of a wrapped single statement
    CloseBrace,
    /// A `__debug_notify(line, vars...);` call
    Notify {
        /// Original line reported by the call
        line: usize,
        /// Variables captured by the call, in declaration order
        variables: Vec<String>,
    },
}

impl InsertContent {
    fn priority(&self) -> u8 {
        match self {
            Self::CloseBrace => CLOSE_BRACE_PRIORITY,
            Self::OpenBrace => OPEN_BRACE_PRIORITY,
            Self::Notify { .. } => NOTIFY_PRIORITY,
        }
    }
}

impl Display for InsertContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenBrace => write!(f, "{{ "),
            Self::CloseBrace => write!(f, " }}"),
            Self::Notify { line, variables } => {
                write!(f, "{NOTIFY_FUNCTION}({line}")?;
                for variable in variables {
                    write!(f, ", {variable}")?;
                }
                write!(f, "); ")
            }
        }
    }
}

/// The collection of insertions on one script body, keyed by byte offset.
#[derive(Debug, Default, Clone)]
pub struct SourceModifications {
    modifications: BTreeMap<usize, Vec<InsertContent>>,
}

impl SourceModifications {
    /// Creates an empty modification set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an insertion at `offset`. Insertions sharing an offset are ordered
    /// by priority, and by arrival among equal priorities.
    pub fn add(&mut self, offset: usize, content: InsertContent) {
        let slot = self.modifications.entry(offset).or_default();
        let idx = slot.partition_point(|existing| existing.priority() >= content.priority());
        slot.insert(idx, content);
    }

    /// Number of insertions.
    pub fn len(&self) -> usize {
        self.modifications.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is inserted.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Applies every insertion to `source`. Offsets past the end are ignored.
    pub fn modify_source(&self, source: &str) -> String {
        let mut modified = source.to_string();
        // Apply back to front so earlier offsets stay valid.
        for (offset, contents) in self.modifications.iter().rev() {
            if *offset > source.len() || !source.is_char_boundary(*offset) {
                continue;
            }
            let text: String = contents.iter().map(ToString::to_string).collect();
            modified.insert_str(*offset, &text);
        }
        modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_rendering() {
        let content = InsertContent::Notify { line: 4, variables: vec!["a".into(), "b".into()] };
        assert_eq!(content.to_string(), "__debug_notify(4, a, b); ");
        let bare = InsertContent::Notify { line: 1, variables: vec![] };
        assert_eq!(bare.to_string(), "__debug_notify(1); ");
    }

    #[test]
    fn test_priority_order_at_same_offset() {
        let mut modifications = SourceModifications::new();
        modifications.add(0, InsertContent::Notify { line: 1, variables: vec![] });
        modifications.add(0, InsertContent::OpenBrace);
        modifications.add(4, InsertContent::CloseBrace);

        assert_eq!(modifications.len(), 3);
        assert_eq!(modifications.modify_source("x++;"), "{ __debug_notify(1); x++; }");
    }
}
