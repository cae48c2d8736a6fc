//! DIMACS CNF reading, writing and sanitisation for the cnfhash toolkit.
//!
//! The parser is deliberately lenient: comment and header lines are skipped wherever they occur,
//! the header's variable and clause counts are advisory only, and clauses may span lines. The
//! writer emits the canonical textual form with a header reflecting the observed counts.
use std::{borrow::Borrow, io};

use cnfhash_formula::{CnfFormula, Lit, Var};

use thiserror::Error;

pub mod reader;
pub mod sanitize;

pub use reader::{open_dimacs, TokenReader};
pub use sanitize::{check_sanitation, determine_counts, normalize, sanitize, Counts, SaniCheck};

/// Possible errors while reading a DIMACS CNF formula.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {line}: unexpected character in DIMACS CNF input: {unexpected:?}")]
    UnexpectedInput { line: usize, unexpected: char },
    #[error("line {line}: literal {value} is too large")]
    LiteralTooLarge { line: usize, value: u64 },
    #[error("line {line}: unterminated clause")]
    UnterminatedClause { line: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parse a DIMACS CNF input into a [`CnfFormula`].
///
/// Variable identifiers up to [`Var::max_count`] are accepted.
pub fn parse_dimacs(input: impl io::Read) -> Result<CnfFormula, ParserError> {
    parse_dimacs_with_limit(input, Var::max_count())
}

/// Parse a DIMACS CNF input, rejecting variable identifiers above `max_var`.
pub fn parse_dimacs_with_limit(
    input: impl io::Read,
    max_var: usize,
) -> Result<CnfFormula, ParserError> {
    let mut reader = TokenReader::new(input);
    let mut formula = CnfFormula::new();
    let mut clause: Vec<Lit> = vec![];

    loop {
        reader.skip_whitespace()?;
        match reader.peek()? {
            None => break,
            Some(b'c') | Some(b'p') if reader.at_line_start() => {
                if !reader.skip_line()? {
                    break;
                }
            }
            Some(_) => {
                clause.clear();
                read_clause(&mut reader, &mut clause, max_var)?;
                formula.add_clause(clause.iter().cloned());
            }
        }
    }

    Ok(formula)
}

/// Read one zero-terminated clause into `clause`. Comment lines may interrupt a clause.
fn read_clause<R: io::Read>(
    reader: &mut TokenReader<R>,
    clause: &mut Vec<Lit>,
    max_var: usize,
) -> Result<(), ParserError> {
    loop {
        reader.skip_whitespace_and_comments()?;
        let number = match reader.read_integer()? {
            Some(number) => number,
            None => {
                return Err(ParserError::UnterminatedClause {
                    line: reader.line(),
                });
            }
        };
        if number == 0 {
            return Ok(());
        }
        if number.unsigned_abs() > max_var as u64 {
            return Err(ParserError::LiteralTooLarge {
                line: reader.line(),
                value: number.unsigned_abs(),
            });
        }
        clause.push(Lit::from_dimacs(number as isize));
    }
}

/// Write a DIMACS CNF header.
///
/// Can be used with [`write_dimacs_clauses`] to implement incremental writing.
pub fn write_dimacs_header(
    target: &mut impl io::Write,
    var_count: usize,
    clause_count: usize,
) -> io::Result<()> {
    writeln!(target, "p cnf {} {}", var_count, clause_count)
}

/// Write an iterator of clauses as headerless DIMACS CNF.
///
/// Every literal is followed by a single space and every clause by ` 0` and a newline.
pub fn write_dimacs_clauses(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = impl IntoIterator<Item = impl Borrow<Lit>>>,
) -> io::Result<()> {
    for clause in clauses.into_iter() {
        for lit in clause.into_iter() {
            itoa::write(&mut *target, lit.borrow().to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Write a formula as DIMACS CNF.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    write_dimacs_header(&mut *target, formula.var_count(), formula.len())?;
    write_dimacs_clauses(&mut *target, formula.iter())
}
