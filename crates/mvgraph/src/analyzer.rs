//! Source-table extraction from materialized view definitions.
//!
//! This is a lexical pass, not a SQL parser. The defining query is tokenized
//! with `sqlparser`'s ClickHouse dialect and the token stream is scanned for
//! table references after `FROM` and `JOIN`:
//!
//! - unqualified names resolve against the view's own database
//! - comma joins (`FROM a, b`) are followed
//! - `ARRAY JOIN` is not a table reference
//! - parenthesized subqueries are covered by the same linear scan
//! - names introduced by `WITH name AS (...)` are CTEs, not tables
//! - table functions (`numbers(10)`, `remote(...)`) are skipped
//! - `FROM` inside `extract(...)`-style calls is ignored
//!
//! A full `CREATE MATERIALIZED VIEW ... TO db.t AS SELECT ...` statement is
//! accepted too; the `TO` table is reported as the view's write target.
//!
//! When the tokenizer rejects the text, a regex over `FROM|JOIN [db.]name`
//! is used instead. Nothing here fails: an unrecognizable definition yields
//! no sources and a warning.

use crate::domain::{DiscoveryRecord, TableRef};
use regex::Regex;
use serde::Serialize;
use sqlparser::dialect::ClickHouseDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

static FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN)\s+`?(\w+)`?(?:\.`?(\w+)`?)?").expect("static regex")
});

/// Keywords that sqlparser lexes as keywords but that open a function call
/// whose arguments may contain a bare `FROM`.
const CALL_KEYWORDS: &[Keyword] = &[
    Keyword::EXTRACT,
    Keyword::TRIM,
    Keyword::SUBSTRING,
    Keyword::POSITION,
    Keyword::OVERLAY,
];

/// Table references found in one view definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewReferences {
    /// Tables the view reads from
    pub sources: BTreeSet<TableRef>,

    /// Table named by a `TO` clause, which the view writes into
    pub target: Option<TableRef>,

    /// Why no source could be recognized
    pub warning: Option<String>,
}

impl ViewReferences {
    /// Returns true if no source table was recognized.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Extract the tables a view definition reads from.
///
/// `default_database` qualifies bare table names; pass the view's own
/// database.
pub fn extract_references(query: &str, default_database: &str) -> ViewReferences {
    if query.trim().is_empty() {
        return ViewReferences {
            warning: Some("view definition is empty".to_string()),
            ..ViewReferences::default()
        };
    }

    let dialect = ClickHouseDialect {};
    match Tokenizer::new(&dialect, query).tokenize() {
        Ok(tokens) => {
            let tokens: Vec<Token> = tokens
                .into_iter()
                .filter(|token| !matches!(token, Token::Whitespace(_)))
                .collect();
            let scan = TokenScan {
                tokens: &tokens,
                default_database,
            };
            let body = scan.body_start();
            let target = scan.create_target(body);
            let sources = scan.sources(body);
            finish(sources, target, None)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Tokenizer rejected view definition, using pattern fallback");
            finish(fallback_references(query, default_database), None, Some(e.to_string()))
        }
    }
}

/// Extract references from a discovery record's defining query.
pub fn analyze_view(record: &DiscoveryRecord) -> ViewReferences {
    extract_references(&record.defining_query, &record.table_ref.database)
}

fn finish(
    sources: BTreeSet<TableRef>,
    target: Option<TableRef>,
    tokenizer_error: Option<String>,
) -> ViewReferences {
    let warning = if sources.is_empty() {
        Some(match tokenizer_error {
            Some(e) => format!("could not tokenize view definition: {e}"),
            None => "no FROM or JOIN table reference found".to_string(),
        })
    } else {
        None
    };

    ViewReferences {
        sources,
        target,
        warning,
    }
}

/// Regex extraction used when tokenizing fails.
fn fallback_references(query: &str, default_database: &str) -> BTreeSet<TableRef> {
    FALLBACK_RE
        .captures_iter(query)
        .filter_map(|caps| {
            let first = caps.get(1)?.as_str();
            Some(match caps.get(2) {
                Some(second) => TableRef::new(first, second.as_str()),
                None => TableRef::new(default_database, first),
            })
        })
        .collect()
}

/// A whitespace-free token stream plus the database bare names resolve to.
struct TokenScan<'a> {
    tokens: &'a [Token],
    default_database: &'a str,
}

impl TokenScan<'_> {
    fn keyword(&self, at: usize) -> Option<Keyword> {
        match self.tokens.get(at) {
            Some(Token::Word(word)) => Some(word.keyword),
            _ => None,
        }
    }

    fn word(&self, at: usize) -> Option<&str> {
        match self.tokens.get(at) {
            Some(Token::Word(word)) => Some(word.value.as_str()),
            _ => None,
        }
    }

    fn is(&self, at: usize, expected: &Token) -> bool {
        self.tokens.get(at) == Some(expected)
    }

    fn is_create(&self) -> bool {
        matches!(self.keyword(0), Some(Keyword::CREATE | Keyword::ATTACH))
    }

    /// Index of the first token of the SELECT body.
    fn body_start(&self) -> usize {
        if !self.is_create() {
            return 0;
        }
        (0..self.tokens.len())
            .find(|&at| matches!(self.keyword(at), Some(Keyword::SELECT | Keyword::WITH)))
            .unwrap_or(self.tokens.len())
    }

    /// Table named by `TO` in a CREATE header.
    fn create_target(&self, body: usize) -> Option<TableRef> {
        if !self.is_create() {
            return None;
        }
        let at = (0..body).find(|&at| self.keyword(at) == Some(Keyword::TO))?;
        let (table, _) = self.read_name(at + 1)?;
        Some(table)
    }

    /// `[db.]name` starting at `at`, with the index after it.
    fn read_name(&self, at: usize) -> Option<(TableRef, usize)> {
        let first = self.word(at)?;
        if self.is(at + 1, &Token::Period) {
            if let Some(second) = self.word(at + 2) {
                return Some((TableRef::new(first, second), at + 3));
            }
        }
        Some((TableRef::new(self.default_database, first), at + 1))
    }

    /// Names bound by `name AS (` inside the body.
    fn cte_names(&self, body: usize) -> HashSet<&str> {
        (body..self.tokens.len())
            .filter(|&at| self.keyword(at + 1) == Some(Keyword::AS) && self.is(at + 2, &Token::LParen))
            .filter_map(|at| self.word(at))
            .collect()
    }

    /// True if the `(` at `at` opens a function call.
    fn opens_call(&self, at: usize) -> bool {
        at > 0
            && self
                .keyword(at - 1)
                .is_some_and(|kw| kw == Keyword::NoKeyword || CALL_KEYWORDS.contains(&kw))
    }

    fn sources(&self, body: usize) -> BTreeSet<TableRef> {
        let ctes = self.cte_names(body);
        let mut sources = BTreeSet::new();
        let mut parens: Vec<bool> = Vec::new();

        for at in body..self.tokens.len() {
            match &self.tokens[at] {
                Token::LParen => parens.push(self.opens_call(at)),
                Token::RParen => {
                    parens.pop();
                }
                _ => {
                    if parens.last().copied().unwrap_or(false) {
                        continue;
                    }
                    match self.keyword(at) {
                        Some(Keyword::FROM) => self.read_from_list(at + 1, &ctes, &mut sources),
                        Some(Keyword::JOIN) if self.keyword(at.wrapping_sub(1)) != Some(Keyword::ARRAY) => {
                            self.read_table(at + 1, &ctes, &mut sources);
                        }
                        _ => {}
                    }
                }
            }
        }

        sources
    }

    /// `FROM a [AS x], b [y], ...`
    fn read_from_list(&self, mut at: usize, ctes: &HashSet<&str>, sources: &mut BTreeSet<TableRef>) {
        while let Some(next) = self.read_table(at, ctes, sources) {
            let after_alias = self.skip_alias(next);
            if !self.is(after_alias, &Token::Comma) {
                break;
            }
            at = after_alias + 1;
        }
    }

    /// Record the table at `at`, returning the index after its name.
    ///
    /// Subqueries and table functions return `None`.
    fn read_table(
        &self,
        at: usize,
        ctes: &HashSet<&str>,
        sources: &mut BTreeSet<TableRef>,
    ) -> Option<usize> {
        if matches!(self.keyword(at), Some(Keyword::SELECT | Keyword::WITH)) {
            return None;
        }
        let qualified = self.is(at + 1, &Token::Period);
        let (table, next) = self.read_name(at)?;
        if self.is(next, &Token::LParen) {
            return None;
        }
        if !qualified && ctes.contains(table.name.as_str()) {
            return Some(next);
        }
        sources.insert(table);
        Some(next)
    }

    fn skip_alias(&self, at: usize) -> usize {
        match self.keyword(at) {
            Some(Keyword::AS) if self.word(at + 1).is_some() => at + 2,
            Some(Keyword::NoKeyword) => at + 1,
            _ => at,
        }
    }
}
