//! Streaming normalisation and sanitisation of DIMACS CNF files.
//!
//! All of these run in two passes over the input: one to determine the counts for the emitted
//! header, one to emit. Callers working with non-seekable (e.g. decompressed) streams therefore
//! open the input twice.
use std::cmp::max;
use std::io;

use cnfhash_formula::{Lit, Var};

use crate::reader::TokenReader;
use crate::{write_dimacs_clauses, write_dimacs_header, ParserError};

/// Observed variable and clause counts of a DIMACS input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Counts {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Determine the observed counts: the maximum absolute literal value and the number of clauses.
///
/// Header values are ignored; empty clauses count as clauses.
pub fn determine_counts(input: impl io::Read) -> Result<Counts, ParserError> {
    let mut reader = TokenReader::new(input);
    let mut var_count: u64 = 0;
    let mut clause_count = 0;

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
                loop {
                    reader.skip_whitespace_and_comments()?;
                    let number = next_in_clause(&mut reader)?;
                    if number == 0 {
                        break;
                    }
                    var_count = max(var_count, number.unsigned_abs());
                }
                clause_count += 1;
            }
        }
    }

    Ok(Counts {
        var_count: var_count as usize,
        clause_count,
    })
}

/// Emit the canonical textual form of a DIMACS input.
///
/// Comments and the original header are dropped, a header with the observed counts is generated,
/// and every clause is written on its own line with single spaces and a ` 0` terminator. Variable
/// numbering and clause and literal order are preserved.
///
/// `counts_input` and `input` must be two readers over the same underlying data.
pub fn normalize(
    counts_input: impl io::Read,
    input: impl io::Read,
    target: &mut impl io::Write,
) -> Result<(), ParserError> {
    let counts = determine_counts(counts_input)?;
    write_dimacs_header(target, counts.var_count, counts.clause_count)?;

    let mut reader = TokenReader::new(input);
    loop {
        reader.skip_whitespace()?;
        match reader.peek()? {
            None => break,
            Some(b'c') | Some(b'p') if reader.at_line_start() => {
                if !reader.skip_line()? {
                    break;
                }
            }
            Some(_) => loop {
                reader.skip_whitespace_and_comments()?;
                let number = next_in_clause(&mut reader)?;
                if number == 0 {
                    target.write_all(b"0\n")?;
                    break;
                }
                itoa::write(&mut *target, number)?;
                target.write_all(b" ")?;
            },
        }
    }

    Ok(())
}

/// Emit the sanitised form of a DIMACS input.
///
/// Like [`normalize`], but each clause is canonicalised first: literals are sorted by
/// `(variable, sign)`, duplicates are removed and tautological clauses are dropped. The header
/// reflects the counts of the surviving clauses, so sanitising a sanitised file reproduces it
/// byte for byte.
pub fn sanitize(
    counts_input: impl io::Read,
    input: impl io::Read,
    target: &mut impl io::Write,
) -> Result<(), ParserError> {
    let counts = sanitized_counts(counts_input)?;
    write_dimacs_header(target, counts.var_count, counts.clause_count)?;

    let mut reader = TokenReader::new(input);
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
                read_lit_clause(&mut reader, &mut clause)?;
                if canonical_clause(&mut clause) {
                    write_dimacs_clauses(&mut *target, std::iter::once(&clause[..]))?;
                }
            }
        }
    }

    Ok(())
}

/// Counts over the clauses surviving sanitisation.
fn sanitized_counts(input: impl io::Read) -> Result<Counts, ParserError> {
    let mut reader = TokenReader::new(input);
    let mut clause: Vec<Lit> = vec![];
    let mut var_count = 0;
    let mut clause_count = 0;

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
                read_lit_clause(&mut reader, &mut clause)?;
                if canonical_clause(&mut clause) {
                    clause_count += 1;
                    for lit in clause.iter() {
                        var_count = max(var_count, lit.index() + 1);
                    }
                }
            }
        }
    }

    Ok(Counts {
        var_count,
        clause_count,
    })
}

/// Read one zero-terminated clause as literals. Comment lines may interrupt a clause.
fn read_lit_clause<R: io::Read>(
    reader: &mut TokenReader<R>,
    clause: &mut Vec<Lit>,
) -> Result<(), ParserError> {
    clause.clear();
    loop {
        reader.skip_whitespace_and_comments()?;
        let number = next_in_clause(reader)?;
        if number == 0 {
            return Ok(());
        }
        if number.unsigned_abs() > Var::max_count() as u64 {
            return Err(ParserError::LiteralTooLarge {
                line: reader.line(),
                value: number.unsigned_abs(),
            });
        }
        clause.push(Lit::from_dimacs(number as isize));
    }
}

/// Sort by `(variable, sign)`, drop duplicates; returns `false` for tautological clauses.
fn canonical_clause(clause: &mut Vec<Lit>) -> bool {
    clause.sort_unstable();
    clause.dedup();

    let mut last = None;
    for &lit in clause.iter() {
        if last == Some(!lit) {
            return false;
        }
        last = Some(lit);
    }
    true
}

fn next_in_clause<R: io::Read>(reader: &mut TokenReader<R>) -> Result<i64, ParserError> {
    match reader.read_integer()? {
        Some(number) => Ok(number),
        None => Err(ParserError::UnterminatedClause {
            line: reader.line(),
        }),
    }
}

/// Sanitation status of a DIMACS CNF file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaniCheck {
    pub header_present: bool,
    pub head_vars: u64,
    pub head_clauses: u64,
    pub norm_vars: u64,
    pub norm_clauses: u64,
    pub whitespace_normalised: bool,
    pub has_comment: bool,
    pub has_tautological_clause: bool,
    pub has_duplicate_literals: bool,
    pub has_empty_clause: bool,
}

impl SaniCheck {
    /// Whether a header is present and its counts match the observed ones.
    pub fn header_consistent(&self) -> bool {
        self.header_present
            && self.head_vars == self.norm_vars
            && self.head_clauses == self.norm_clauses
    }

    pub fn no_comment(&self) -> bool {
        !self.has_comment
    }

    pub fn no_tautological_clause(&self) -> bool {
        !self.has_tautological_clause
    }

    pub fn no_duplicate_literals(&self) -> bool {
        !self.has_duplicate_literals
    }

    pub fn no_empty_clause(&self) -> bool {
        !self.has_empty_clause
    }
}

/// Analyse the sanitation status of a DIMACS input.
///
/// `normalised_input` and `sanitised_input` must be two readers over the same underlying data;
/// the first pass checks layout and counts, the second pass checks clause contents.
pub fn check_sanitation(
    normalised_input: impl io::Read,
    sanitised_input: impl io::Read,
) -> Result<SaniCheck, ParserError> {
    let mut check = check_normalised(normalised_input)?;
    check_sanitised(sanitised_input, &mut check)?;
    Ok(check)
}

fn check_normalised(input: impl io::Read) -> Result<SaniCheck, ParserError> {
    let mut reader = TokenReader::new(input);
    let mut check = SaniCheck {
        whitespace_normalised: true,
        ..SaniCheck::default()
    };

    loop {
        match reader.peek()? {
            None => break,
            Some(b'c') if reader.at_line_start() => {
                check.has_comment = true;
                if !reader.skip_line()? {
                    break;
                }
            }
            Some(b'p') if reader.at_line_start() => {
                if check.header_present {
                    // repeated headers are not normalised, values of the first one win
                    check.whitespace_normalised = false;
                    if !reader.skip_line()? {
                        break;
                    }
                    continue;
                }
                reader.skip()?;
                let mut well_formed = expect_single_space(&mut reader)?;
                well_formed &= expect_bytes(&mut reader, b"cnf")?;
                well_formed &= expect_single_space(&mut reader)?;
                check.head_vars = reader.read_u64()?.unwrap_or(0);
                well_formed &= expect_single_space(&mut reader)?;
                check.head_clauses = reader.read_u64()?.unwrap_or(0);
                well_formed &= expect_single_newline(&mut reader)?;
                check.whitespace_normalised &= well_formed;
                check.header_present = true;
            }
            Some(byte) if byte == b'-' || byte.is_ascii_digit() => loop {
                while reader.at_line_start() && reader.peek()? == Some(b'c') {
                    // a comment interrupting a clause
                    check.has_comment = true;
                    check.whitespace_normalised = false;
                    reader.skip_line()?;
                }
                let number = next_in_clause(&mut reader)?;
                if number == 0 {
                    check.norm_clauses += 1;
                    check.whitespace_normalised &= expect_single_newline(&mut reader)?;
                    break;
                }
                check.norm_vars = max(check.norm_vars, number.unsigned_abs());
                check.whitespace_normalised &= expect_single_space(&mut reader)?;
            },
            Some(_) => {
                // stray whitespace between lines, or a parse error on anything else
                if reader.skip_whitespace()? == 0 {
                    next_in_clause(&mut reader)?;
                }
                check.whitespace_normalised = false;
            }
        }
    }

    Ok(check)
}

fn check_sanitised(input: impl io::Read, check: &mut SaniCheck) -> Result<(), ParserError> {
    let var_count = check.norm_vars as usize;
    // stamp per clause, indexed by literal code
    let mut mask = vec![0u64; 2 * var_count + 2];
    let mut stamp: u64 = 0;

    let mut reader = TokenReader::new(input);
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
                stamp += 1;
                let mut tautological = false;
                let mut kept = 0;
                loop {
                    reader.skip_whitespace_and_comments()?;
                    let number = next_in_clause(&mut reader)?;
                    if number == 0 {
                        break;
                    }
                    if number.unsigned_abs() > var_count as u64 {
                        return Err(ParserError::LiteralTooLarge {
                            line: reader.line(),
                            value: number.unsigned_abs(),
                        });
                    }
                    if tautological {
                        continue;
                    }
                    let lit = Lit::from_dimacs(number as isize);
                    if mask[(!lit).code()] == stamp {
                        tautological = true;
                        check.has_tautological_clause = true;
                    } else if mask[lit.code()] != stamp {
                        mask[lit.code()] = stamp;
                        kept += 1;
                    } else {
                        check.has_duplicate_literals = true;
                    }
                }
                if !tautological && kept == 0 {
                    check.has_empty_clause = true;
                }
            }
        }
    }

    Ok(())
}

/// True when the next whitespace run is exactly one space. Consumes the run.
fn expect_single_space<R: io::Read>(reader: &mut TokenReader<R>) -> Result<bool, ParserError> {
    let space = reader.peek()? == Some(b' ');
    Ok(reader.skip_whitespace()? == 1 && space)
}

/// True when the next whitespace run is exactly one newline. Consumes the run.
fn expect_single_newline<R: io::Read>(reader: &mut TokenReader<R>) -> Result<bool, ParserError> {
    let newline = reader.peek()? == Some(b'\n');
    Ok(reader.skip_whitespace()? == 1 && newline)
}

/// True when the input continues with exactly `expected`. Consumes the matched prefix.
fn expect_bytes<R: io::Read>(
    reader: &mut TokenReader<R>,
    expected: &[u8],
) -> Result<bool, ParserError> {
    for &expected_byte in expected {
        if reader.peek()? == Some(expected_byte) {
            reader.skip()?;
        } else {
            return Ok(false);
        }
    }
    Ok(true)
}
