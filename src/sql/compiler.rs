//! QuerySpec compiler.
//!
//! Turns a [`QuerySpec`] tree into SQL text. Every table gets a positional
//! alias: the primary table is `t1` and the K-th join target is `t(K+1)`.
//! Nested specs used as derived tables are compiled recursively with their
//! own alias space, and may refer to tables of the enclosing specs, which
//! are searched innermost first.
//!
//! Every join's ON clause reads `t1.<localColumn> = tK.<referenceColumn>`:
//! joins hang off the primary table. [`Compiler::with_join_local_resolution`]
//! resolves the join's local table instead, for chained joins.
//!
//! Layout of the output:
//!
//! ```text
//! SELECT
//!   t1.Email AS Email,
//!   t2.StreetAddress AS "Street Address"
//! FROM Zing.Customers AS t1
//! INNER JOIN (
//!   SELECT
//!     t1.Id,
//!     t1.StreetAddress
//!   FROM Zing.Addresses AS t1
//! ) AS t2 ON t1.AddressId = t2.Id
//! WHERE
//!   t1.Active = true
//! ORDER BY t1.Email ASC
//! ```

use thiserror::Error;

use super::token::{Token, TokenStream};
use crate::spec::{Filter, FilterValue, Join, JoinTarget, QuerySpec, TableRef};

/// Default bound on derived-table nesting.
pub const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("table '{table}' is not the primary table or a join target of this query or any enclosing query")]
    UnresolvedTable { table: String },

    #[error("primary table mismatch: {0}")]
    PrimaryTable(String),

    #[error("derived tables nested deeper than {max} levels")]
    NestingTooDeep { max: usize },
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Compile a spec with the default nesting bound.
pub fn compile(spec: &QuerySpec) -> CompileResult<String> {
    Compiler::default().compile(spec)
}

/// SQL compiler for [`QuerySpec`] trees.
#[derive(Debug, Clone, Copy)]
pub struct Compiler {
    max_depth: usize,
    resolve_join_locals: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            resolve_join_locals: false,
        }
    }
}

/// Aliases visible while compiling one spec.
#[derive(Debug, Clone)]
struct Scope<'a> {
    primary: &'a str,
    joins: Vec<(&'a str, String)>,
}

impl<'a> Scope<'a> {
    fn of(spec: &'a QuerySpec) -> Self {
        let joins = spec
            .joins
            .iter()
            .enumerate()
            .map(|(i, join)| (join.target.table_name(), format!("t{}", i + 2)))
            .collect();
        Self {
            primary: &spec.table.table,
            joins,
        }
    }

    fn resolve(&self, table: &TableRef) -> Option<&str> {
        if table.is_primary {
            return Some("t1");
        }
        // Join targets first so a self-join reaches the joined copy.
        self.joins
            .iter()
            .find(|(name, _)| *name == table.table)
            .map(|(_, alias)| alias.as_str())
            .or_else(|| (self.primary == table.table).then_some("t1"))
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound how deep derived tables may nest before compilation fails.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Take the left side of each ON clause from the join's local table
    /// rather than from `t1`. Off by default.
    pub fn with_join_local_resolution(mut self, enabled: bool) -> Self {
        self.resolve_join_locals = enabled;
        self
    }

    pub fn resolves_join_locals(&self) -> bool {
        self.resolve_join_locals
    }

    /// Compile a spec to SQL text.
    pub fn compile(&self, spec: &QuerySpec) -> CompileResult<String> {
        self.compile_tokens(spec).map(|ts| ts.serialize())
    }

    /// Compile a spec to a token stream.
    pub fn compile_tokens(&self, spec: &QuerySpec) -> CompileResult<TokenStream> {
        let mut ts = TokenStream::new();
        self.compile_into(&mut ts, spec, &[], 0)?;
        Ok(ts)
    }

    fn compile_into<'a>(
        &self,
        ts: &mut TokenStream,
        spec: &'a QuerySpec,
        enclosing: &[Scope<'a>],
        depth: usize,
    ) -> CompileResult<()> {
        if depth > self.max_depth {
            return Err(CompileError::NestingTooDeep {
                max: self.max_depth,
            });
        }
        check_primary(spec)?;

        let scope = Scope::of(spec);
        let resolve = |table: &TableRef| -> CompileResult<String> {
            scope
                .resolve(table)
                .or_else(|| enclosing.iter().rev().find_map(|s| s.resolve(table)))
                .map(str::to_string)
                .ok_or_else(|| CompileError::UnresolvedTable {
                    table: table.table.clone(),
                })
        };
        // Derived tables never carry output labels.
        let labelled = !spec.is_sub_query && depth == 0;
        let indent = depth;

        // SELECT
        ts.push(Token::Select);
        for (i, column) in spec.columns.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.line(indent + 1);
            let alias = resolve(&column.table)?;
            match column.aggregate {
                Some(agg) => {
                    ts.push(Token::Function(agg))
                        .lparen()
                        .column_ref(&alias, &column.column)
                        .rparen();
                }
                None => {
                    ts.column_ref(&alias, &column.column);
                }
            }
            if labelled && !column.label.is_empty() {
                ts.space()
                    .push(Token::As)
                    .space()
                    .push(Token::Label(column.label.clone()));
            }
        }

        // FROM
        ts.line(indent)
            .push(Token::From)
            .space()
            .push(Token::QualifiedIdent {
                database: spec.database.clone(),
                name: spec.table.table.clone(),
            })
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident("t1".into()));

        // JOINs
        for (i, join) in spec.joins.iter().enumerate() {
            let target_alias = format!("t{}", i + 2);
            let local_alias = if self.resolve_join_locals {
                resolve(&join.local_table)?
            } else {
                "t1".to_string()
            };
            ts.line(indent).push(Token::Join(join.kind)).space();
            match &join.target {
                JoinTarget::Table(table) => {
                    if table.is_primary {
                        return Err(CompileError::PrimaryTable(format!(
                            "join target '{}' is flagged as primary",
                            table.table
                        )));
                    }
                    ts.push(Token::QualifiedIdent {
                        database: spec.database.clone(),
                        name: table.table.clone(),
                    });
                }
                JoinTarget::Derived(nested) => {
                    let mut chain = enclosing.to_vec();
                    chain.push(scope.clone());
                    ts.lparen().line(indent + 1);
                    self.compile_into(ts, nested, &chain, depth + 1)?;
                    ts.line(indent).rparen();
                }
            }
            on_clause(ts, join, &local_alias, &target_alias);
        }

        // WHERE
        for (i, filter) in spec.filters.iter().enumerate() {
            if i == 0 {
                ts.line(indent).push(Token::Where);
            }
            ts.line(indent + 1);
            if i > 0 {
                ts.push(Token::And).space();
            }
            let alias = resolve(&filter.table)?;
            predicate(ts, filter, &alias);
        }

        // ORDER BY
        for (i, order) in spec.orders.iter().enumerate() {
            if i == 0 {
                ts.line(indent).push(Token::OrderBy).space();
            } else {
                ts.comma().space();
            }
            let alias = resolve(&order.table)?;
            ts.column_ref(&alias, &order.column).space().push(if order.descending {
                Token::Desc
            } else {
                Token::Asc
            });
        }

        Ok(())
    }
}

fn check_primary(spec: &QuerySpec) -> CompileResult<()> {
    if !spec.table.is_primary {
        return Err(CompileError::PrimaryTable(format!(
            "table '{}' is used as the primary table but not flagged primary",
            spec.table.table
        )));
    }
    Ok(())
}

fn on_clause(ts: &mut TokenStream, join: &Join, local_alias: &str, target_alias: &str) {
    ts.space()
        .push(Token::As)
        .space()
        .push(Token::Ident(target_alias.into()))
        .space()
        .push(Token::On)
        .space()
        .column_ref(local_alias, &join.local_column)
        .space()
        .push(Token::Operator(crate::spec::FilterOperator::Eq))
        .space()
        .column_ref(target_alias, &join.reference_column);
}

fn predicate(ts: &mut TokenStream, filter: &Filter, alias: &str) {
    ts.column_ref(alias, &filter.column)
        .space()
        .push(Token::Operator(filter.operator))
        .space()
        .push(match &filter.value {
            FilterValue::String(s) | FilterValue::Date(s) => Token::LitString(s.clone()),
            FilterValue::Number(n) => Token::LitNumber(n.clone()),
            FilterValue::Boolean(b) => Token::LitBool(*b),
        });
}
