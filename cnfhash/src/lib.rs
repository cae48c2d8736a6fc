//! Content identifiers and isomorphism-invariant fingerprints for CNF instances.
//!
//! Two identifier families are provided. [`gbdhash`] is a byte-exact content identifier: the MD5
//! digest of the canonical textual form of a DIMACS file, so it identifies formulas up to
//! comments, header and whitespace. [`isohash2`] is invariant under the symmetry group of CNF:
//! clause reordering, literal reordering within clauses and variable renaming all leave it
//! unchanged, while polarity structure, the clause multiset and clause sizes remain visible.
//!
//! Inputs may be compressed; `.gz`, `.bz2`, `.xz` and `.lzma` files are decompressed on the fly
//! based on their file extension.
use std::io;
use std::path::Path;

use cnfhash_dimacs::{open_dimacs, parse_dimacs, ParserError, SaniCheck};

pub mod config;
pub mod error;
pub mod gbdhash;
pub mod isohash2;

pub use config::IsoHash2Settings;
pub use error::{ConfigError, Error};
pub use isohash2::{isohash2_cnf, IsoHash2Result};

pub use cnfhash_dimacs as dimacs;
pub use cnfhash_formula as formula;

/// Compute the content identifier of a CNF file: the MD5 digest of its canonical textual form,
/// rendered as 32 lowercase hex characters.
pub fn gbdhash(path: impl AsRef<Path>) -> Result<String, Error> {
    let path = path.as_ref();
    open_twice(path)
        .and_then(|(counts_input, input)| gbdhash::gbdhash_read(counts_input, input))
        .map_err(Error::parse(path))
}

/// Compute the isomorphism-invariant fingerprint of a CNF file, rendered as 16 lowercase hex
/// characters.
pub fn isohash2(path: impl AsRef<Path>, settings: &IsoHash2Settings) -> Result<String, Error> {
    let path = path.as_ref();
    settings.validate()?;

    let formula = open_dimacs(path)
        .map_err(ParserError::from)
        .and_then(parse_dimacs)
        .map_err(Error::parse(path))?;

    Ok(isohash2_cnf(formula, settings)?.hash)
}

/// Write the canonical textual form of a CNF file to `target`.
pub fn normalize_file(path: impl AsRef<Path>, target: &mut impl io::Write) -> Result<(), Error> {
    let path = path.as_ref();
    open_twice(path)
        .and_then(|(counts_input, input)| cnfhash_dimacs::normalize(counts_input, input, target))
        .map_err(Error::parse(path))
}

/// Write the sanitised form of a CNF file to `target`.
pub fn sanitize_file(path: impl AsRef<Path>, target: &mut impl io::Write) -> Result<(), Error> {
    let path = path.as_ref();
    open_twice(path)
        .and_then(|(counts_input, input)| cnfhash_dimacs::sanitize(counts_input, input, target))
        .map_err(Error::parse(path))
}

/// Analyse the sanitation status of a CNF file.
pub fn check_sanitation_file(path: impl AsRef<Path>) -> Result<SaniCheck, Error> {
    let path = path.as_ref();
    open_twice(path)
        .and_then(|(first, second)| cnfhash_dimacs::check_sanitation(first, second))
        .map_err(Error::parse(path))
}

/// Open the same file twice for the two-pass streaming operations.
fn open_twice(path: &Path) -> Result<(Box<dyn io::Read>, Box<dyn io::Read>), ParserError> {
    Ok((open_dimacs(path)?, open_dimacs(path)?))
}
