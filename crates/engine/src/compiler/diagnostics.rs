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

//! Translation of parser diagnostics to original script lines.

use devsim_common::{Diagnostic, Severity};
use solang_parser::diagnostics::{Diagnostic as ParserDiagnostic, Level};

use crate::{
    syntax,
    template::{LineMap, Position},
};

/// Maps parser diagnostics of a wrapped unit onto the original script.
///
/// Diagnostics inside the template are dropped as soon as one diagnostic lands
/// in the script body, since they are consequences of the user's error. If all
/// of them are inside the template they are kept with their raw wrapped line.
pub(crate) fn map_parser_diagnostics(errors: &[ParserDiagnostic], map: &LineMap) -> Vec<Diagnostic> {
    let positioned: Vec<_> = errors
        .iter()
        .map(|error| (map.position(syntax::start(&error.loc).unwrap_or(usize::MAX)), error))
        .collect();
    let any_in_body = positioned.iter().any(|(position, _)| matches!(position, Position::Body(_)));

    let mut diagnostics: Vec<_> = positioned
        .into_iter()
        .filter_map(|(position, error)| {
            let line = match position {
                Position::Body(line) => line,
                Position::Template(_) if any_in_body => return None,
                Position::Template(line) => line,
            };
            Some(Diagnostic { line, message: error.message.clone(), severity: severity(&error.level) })
        })
        .collect();
    diagnostics.sort_by_key(|diag| diag.line);
    diagnostics.dedup();
    diagnostics
}

fn severity(level: &Level) -> Severity {
    match level {
        Level::Warning => Severity::Warning,
        _ => Severity::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{syntax::parse_unit, template::wrap};

    fn diagnostics_for(body: &str) -> Vec<Diagnostic> {
        let wrapped = wrap(body);
        let errors = parse_unit(&wrapped).err().unwrap_or_default();
        map_parser_diagnostics(&errors, &LineMap::new(&wrapped, body))
    }

    #[test]
    fn test_syntax_error_maps_to_original_line() {
        let diagnostics = diagnostics_for("int a = 1;\nint b = 2;\nint c = ;\nreturn c;");
        assert!(!diagnostics.is_empty());
        assert_eq!(diagnostics[0].line, 3);
        assert!(diagnostics[0].is_error());
    }

    #[test]
    fn test_unterminated_block_clamps_to_last_line() {
        let diagnostics = diagnostics_for("int a = 1;\nif (a > 0) {\n    a = 2;");
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(|diag| diag.line <= 3));
    }
}
