//! Moniker range evaluation over an ordered list of moniker definitions.
//!
//! Grammar: alternatives separated by `||`; each alternative is one or more
//! whitespace-separated comparators, all of which must hold. A comparator is
//! an optional operator (`>`, `>=`, `<`, `<=`, `=`) followed by a moniker.
//!
//! ```text
//! >= widgets-2.0 < widgets-4.0 || widgets-1.0
//! ```

use std::collections::BTreeSet;

use tracing::trace;

use docgraph_shared::{Diagnostic, FileId, MonikerConfig, MonikerProvider, codes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

/// A [`MonikerProvider`] over monikers listed in ascending version order.
#[derive(Debug, Clone, Default)]
pub struct OrderedMonikers {
    definitions: Vec<String>,
}

impl OrderedMonikers {
    pub fn new(definitions: Vec<String>) -> Self {
        Self { definitions }
    }

    pub fn from_config(config: &MonikerConfig) -> Self {
        Self::new(config.definitions.clone())
    }

    pub fn definitions(&self) -> &[String] {
        &self.definitions
    }

    /// Evaluate `range` to the monikers it selects, in definition order.
    pub fn evaluate(&self, range: &str) -> Result<Vec<String>, Diagnostic> {
        let selected = self
            .select(range)
            .map_err(|reason| {
                Diagnostic::error(
                    codes::INVALID_MONIKER_RANGE,
                    format!("invalid moniker range '{range}': {reason}"),
                )
            })?;
        trace!(range, selected = selected.len(), "evaluated moniker range");
        Ok(selected
            .into_iter()
            .map(|index| self.definitions[index].clone())
            .collect())
    }

    fn select(&self, range: &str) -> Result<BTreeSet<usize>, String> {
        if range.trim().is_empty() {
            return Err("range is empty".to_string());
        }

        let mut selected = BTreeSet::new();
        for alternative in range.split("||") {
            let mut tokens = alternative.split_whitespace();
            let mut matched: Option<BTreeSet<usize>> = None;

            while let Some(token) = tokens.next() {
                let (op, name) = split_operator(token);
                let name = match name {
                    "" => tokens
                        .next()
                        .ok_or_else(|| format!("operator '{token}' has no moniker"))?,
                    name => name,
                };
                let position = self.position(name)?;
                let hits: BTreeSet<usize> = (0..self.definitions.len())
                    .filter(|&index| match op {
                        Op::Gt => index > position,
                        Op::Ge => index >= position,
                        Op::Lt => index < position,
                        Op::Le => index <= position,
                        Op::Eq => index == position,
                    })
                    .collect();
                matched = Some(match matched {
                    Some(previous) => previous.intersection(&hits).copied().collect(),
                    None => hits,
                });
            }

            match matched {
                Some(hits) => selected.extend(hits),
                None => return Err("empty alternative".to_string()),
            }
        }
        Ok(selected)
    }

    fn position(&self, name: &str) -> Result<usize, String> {
        self.definitions
            .iter()
            .position(|defined| defined.eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown moniker '{name}'"))
    }
}

fn split_operator(token: &str) -> (Op, &str) {
    for (prefix, op) in [
        (">=", Op::Ge),
        ("<=", Op::Le),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (op, rest);
        }
    }
    (Op::Eq, token)
}

impl MonikerProvider for OrderedMonikers {
    fn parse_range(&self, range: &str) -> Result<Vec<String>, Diagnostic> {
        self.evaluate(range)
    }

    /// A file without a declared range is unversioned and gets no monikers.
    fn file_level_monikers(
        &self,
        file: &FileId,
        declared_range: Option<&str>,
    ) -> Result<Vec<String>, Diagnostic> {
        match declared_range {
            Some(range) => self.evaluate(range).map_err(|d| d.with_file(file)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> OrderedMonikers {
        OrderedMonikers::new(vec![
            "widgets-1.0".into(),
            "widgets-2.0".into(),
            "widgets-3.0".into(),
            "widgets-4.0".into(),
        ])
    }

    #[test]
    fn comparators() {
        let m = widgets();
        assert_eq!(m.evaluate("> widgets-2.0").unwrap(), vec!["widgets-3.0", "widgets-4.0"]);
        assert_eq!(m.evaluate(">=widgets-3.0").unwrap(), vec!["widgets-3.0", "widgets-4.0"]);
        assert_eq!(m.evaluate("< widgets-2.0").unwrap(), vec!["widgets-1.0"]);
        assert_eq!(m.evaluate("<= widgets-2.0").unwrap(), vec!["widgets-1.0", "widgets-2.0"]);
        assert_eq!(m.evaluate("widgets-2.0").unwrap(), vec!["widgets-2.0"]);
        assert_eq!(m.evaluate("= WIDGETS-2.0").unwrap(), vec!["widgets-2.0"]);
    }

    #[test]
    fn and_within_alternatives_or_across() {
        let m = widgets();
        assert_eq!(
            m.evaluate(">= widgets-2.0 < widgets-4.0").unwrap(),
            vec!["widgets-2.0", "widgets-3.0"]
        );
        assert_eq!(
            m.evaluate("widgets-4.0 || widgets-1.0").unwrap(),
            vec!["widgets-1.0", "widgets-4.0"]
        );
        assert!(m.evaluate("> widgets-4.0").unwrap().is_empty());
    }

    #[test]
    fn invalid_ranges_are_errors() {
        let m = widgets();
        for range in ["", "> widgets-9.0", ">=", "widgets-1.0 ||"] {
            let err = m.evaluate(range).unwrap_err();
            assert_eq!(err.code, codes::INVALID_MONIKER_RANGE, "range {range:?}");
            assert!(err.is_error());
        }
    }

    #[test]
    fn unversioned_files_have_no_monikers() {
        let m = widgets();
        let file = FileId::new("toc.md");
        assert!(m.file_level_monikers(&file, None).unwrap().is_empty());
        assert_eq!(
            m.file_level_monikers(&file, Some("> widgets-3.0")).unwrap(),
            vec!["widgets-4.0"]
        );
        let err = m.file_level_monikers(&file, Some("nope")).unwrap_err();
        assert_eq!(err.file, Some(file));
    }
}
