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

//! Thin helpers over `solang-parser` shared by the instrumenter and the compiler.

use solang_parser::{
    diagnostics::Diagnostic as ParserDiagnostic,
    pt::{FunctionDefinition, Loc, SourceUnit, SourceUnitPart, Statement},
};

use crate::ENTRY_POINT;

/// Parses a wrapped translation unit.
pub fn parse_unit(wrapped: &str) -> Result<SourceUnit, Vec<ParserDiagnostic>> {
    solang_parser::parse(wrapped, 0).map(|(unit, _comments)| unit)
}

/// Returns the `(start, end)` byte span of a location in the parsed file.
pub fn span(loc: &Loc) -> Option<(usize, usize)> {
    match loc {
        Loc::File(_, start, end) => Some((*start, *end)),
        _ => None,
    }
}

/// Returns the start offset of a location, if it points into the file.
pub fn start(loc: &Loc) -> Option<usize> {
    span(loc).map(|(start, _)| start)
}

/// Iterates over all function definitions of a unit.
pub fn functions(unit: &SourceUnit) -> impl Iterator<Item = &FunctionDefinition> {
    unit.0.iter().filter_map(|part| match part {
        SourceUnitPart::FunctionDefinition(def) => Some(def.as_ref()),
        _ => None,
    })
}

/// Returns the name of a function definition, if it has one.
pub fn function_name(def: &FunctionDefinition) -> Option<&str> {
    def.name.as_ref().map(|ident| ident.name.as_str())
}

/// Finds the entry point definition and its block body.
pub fn entry_point(unit: &SourceUnit) -> Option<(&FunctionDefinition, &[Statement], &Loc)> {
    functions(unit).filter(|def| function_name(def) == Some(ENTRY_POINT)).find_map(|def| {
        match def.body.as_ref()? {
            Statement::Block { loc, statements, .. } => Some((def, statements.as_slice(), loc)),
            _ => None,
        }
    })
}

/// Returns the offset just past the end of a statement, including a trailing
/// semicolon the parser left out of its location.
pub fn statement_end(source: &str, end: usize) -> usize {
    let rest = source.get(end..).unwrap_or_default();
    let trimmed = rest.trim_start();
    if trimmed.starts_with(';') {
        end + (rest.len() - trimmed.len()) + 1
    } else {
        end
    }
}

/// Finds the opening brace of a block within its span.
pub fn block_open(source: &str, loc: &Loc) -> Option<usize> {
    let (start, end) = span(loc)?;
    source.get(start..end)?.find('{').map(|idx| start + idx)
}

/// Finds the closing brace of a block within its span.
pub fn block_close(source: &str, loc: &Loc) -> Option<usize> {
    let (start, end) = span(loc)?;
    source.get(start..end)?.rfind('}').map(|idx| start + idx)
}
