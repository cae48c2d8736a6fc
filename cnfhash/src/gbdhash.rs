//! Byte-exact content identifier of the canonical textual form.
use std::io;

use cnfhash_dimacs::{normalize, ParserError};

use md5::{Digest, Md5};

/// Compute the content identifier of a DIMACS input: the MD5 digest of its canonical textual
/// form, rendered as 32 lowercase hex characters.
///
/// `counts_input` and `input` must be two readers over the same underlying data; the
/// normalisation needs one pass for the header counts and one for the clauses.
pub fn gbdhash_read(
    counts_input: impl io::Read,
    input: impl io::Read,
) -> Result<String, ParserError> {
    let mut hasher = Md5::new();
    normalize(counts_input, input, &mut hasher)?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect())
}
