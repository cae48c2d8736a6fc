//! Isomorphism-invariant fingerprinting of CNF formulas.
//!
//! Implements a Weisfeiler-Leman style color refinement on the literal hypergraph of a formula:
//! nodes are the two polarities of every variable, hyperedges are clauses. Each round aggregates
//! clause hashes into the member literals' colors and then canonicalises the refined coloring, so
//! the result is invariant under clause reordering, literal reordering within clauses and
//! variable renaming, while staying sensitive to polarity structure.
use cnfhash_formula::{CnfFormula, Lit, LitIdx};

use log::info;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::IsoHash2Settings;
use crate::error::Error;

/// Outcome of an `isohash2` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoHash2Result {
    /// The fingerprint as 16 lowercase hex characters.
    pub hash: String,
    /// Whether refinement reached a fixed point before the round limit.
    pub stabilized: bool,
    /// Number of refinement rounds executed.
    pub iterations: u32,
}

/// Fingerprint a formula held in memory.
///
/// The formula is canonicalised first (clause sorting and deduplication, tautology removal,
/// gapless variable renumbering), so any formula representing the same instance produces the
/// same fingerprint.
pub fn isohash2_cnf(
    mut formula: CnfFormula,
    settings: &IsoHash2Settings,
) -> Result<IsoHash2Result, Error> {
    settings.validate()?;

    // canonicalise before renumbering so dropped tautologies free their variables, then re-sort
    // clauses under the new numbering
    formula.canonicalize();
    formula.renumber();
    formula.canonicalize();

    let refinement = refine(&formula, settings);
    Ok(IsoHash2Result {
        hash: format!("{:016x}", refinement.hash),
        stabilized: refinement.stabilized,
        iterations: refinement.iterations,
    })
}

/// Finalising step of splitmix64, used to spread aggregated color sums.
#[inline]
fn mix64(mut k: u64) -> u64 {
    k ^= k >> 30;
    k = k.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    k ^= k >> 27;
    k = k.wrapping_mul(0x94d0_49bb_1331_11eb);
    k ^= k >> 31;
    k
}

#[inline]
fn hash_word(a: u64) -> u64 {
    xxh3_64(&a.to_le_bytes())
}

#[inline]
fn hash_pair(a: u64, b: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&a.to_le_bytes());
    bytes[8..].copy_from_slice(&b.to_le_bytes());
    xxh3_64(&bytes)
}

#[inline]
fn hash_triple(a: u64, b: u64, c: u64) -> u64 {
    let mut bytes = [0u8; 24];
    bytes[..8].copy_from_slice(&a.to_le_bytes());
    bytes[8..16].copy_from_slice(&b.to_le_bytes());
    bytes[16..].copy_from_slice(&c.to_le_bytes());
    xxh3_64(&bytes)
}

/// Colors of the two polarities of one variable.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
struct LitColors {
    pos: u64,
    neg: u64,
}

impl LitColors {
    #[inline]
    fn get(&self, lit: Lit) -> u64 {
        if lit.is_negative() {
            self.neg
        } else {
            self.pos
        }
    }

    #[inline]
    fn add(&mut self, lit: Lit, value: u64) {
        let slot = if lit.is_negative() {
            &mut self.neg
        } else {
            &mut self.pos
        };
        *slot = slot.wrapping_add(value);
    }
}

/// Commutative summary of one round's coloring, also the stabilisation criterion.
#[derive(Copy, Clone, PartialEq, Eq)]
struct Fingerprint {
    sum: u64,
    xor: u64,
}

pub(crate) struct Refinement {
    pub hash: u64,
    pub stabilized: bool,
    pub iterations: u32,
}

/// Run color refinement on a canonical formula and hash the stabilised coloring.
///
/// Starts from color 1 for every literal. One round hashes every clause as `mix64` of the sum of
/// its current literal colors, adds that hash into each member literal's next color, and then
/// canonicalises: per variable, the refined `(previous, aggregated, complement)` triples of both
/// polarities are hashed, the variables are sorted by those hash pairs, and each variable's next
/// color becomes `mix64` of one plus its rank in that order. The fingerprint of a round sums and
/// xors the per-variable pair hashes; refinement stops once two consecutive rounds agree on it.
///
/// Empty clauses reach no literal slot, so their constant contribution is added to the
/// accumulators directly, once per clause and round.
pub(crate) fn refine(formula: &CnfFormula, settings: &IsoHash2Settings) -> Refinement {
    let var_count = formula.var_count();

    let mut current = vec![LitColors { pos: 1, neg: 1 }; var_count];
    let mut next = vec![LitColors::default(); var_count];
    let mut signatures: Vec<(u64, u64, LitIdx)> = Vec::with_capacity(var_count);

    let empty_clauses = formula.iter().filter(|clause| clause.is_empty()).count() as u64;
    let empty_contrib = hash_word(0).wrapping_mul(empty_clauses);

    let mut fingerprint = Fingerprint {
        sum: empty_contrib,
        xor: empty_contrib,
    };
    let mut previous: Option<Fingerprint> = None;
    let mut iterations = 0;
    let mut stabilized = false;

    while iterations < settings.max_iterations {
        for colors in next.iter_mut() {
            *colors = LitColors::default();
        }

        for clause in formula.iter() {
            let mut sum: u64 = 0;
            for &lit in clause {
                sum = sum.wrapping_add(current[lit.index()].get(lit));
            }
            let clause_hash = mix64(sum);
            for &lit in clause {
                next[lit.index()].add(lit, clause_hash);
            }
        }

        // canonicalise the refined coloring and fingerprint it
        signatures.clear();
        for index in 0..var_count {
            let cur = current[index];
            let agg = next[index];
            let h_pos = hash_triple(cur.pos, agg.pos, cur.neg);
            let h_neg = hash_triple(cur.neg, agg.neg, cur.pos);
            signatures.push((h_pos, h_neg, index as LitIdx));
        }
        signatures.sort_unstable();

        let mut rank: u64 = 0;
        let mut acc_sum = empty_contrib;
        let mut acc_xor = empty_contrib;
        for i in 0..signatures.len() {
            let (h_pos, h_neg, index) = signatures[i];
            if i > 0 && (h_pos, h_neg) != (signatures[i - 1].0, signatures[i - 1].1) {
                rank += 1;
            }
            // ranks are encoded from 1: mix64 fixes 0, and a zero color class would erase its
            // polarity structure from the next round's clause hashes
            let stable_color = mix64(rank + 1);
            let colors = &mut next[index as usize];
            colors.pos = stable_color;
            colors.neg = stable_color;

            let variable_hash = hash_pair(h_pos, h_neg);
            acc_sum = acc_sum.wrapping_add(variable_hash);
            acc_xor ^= variable_hash;
        }

        fingerprint = Fingerprint {
            sum: acc_sum,
            xor: acc_xor,
        };
        std::mem::swap(&mut current, &mut next);
        iterations += 1;

        if settings.print_stats {
            info!(
                "round {}: {} colors, fingerprint {:016x}{:016x}",
                iterations,
                if var_count == 0 { 0 } else { rank + 1 },
                fingerprint.sum,
                fingerprint.xor
            );
        }

        if previous == Some(fingerprint) {
            stabilized = true;
            break;
        }
        previous = Some(fingerprint);
    }

    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&fingerprint.sum.to_le_bytes());
    bytes[8..].copy_from_slice(&fingerprint.xor.to_le_bytes());

    Refinement {
        hash: xxh3_64(&bytes),
        stabilized,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cnfhash_formula::cnf_formula;

    fn hash_of(formula: CnfFormula) -> String {
        isohash2_cnf(formula, &IsoHash2Settings::default())
            .unwrap()
            .hash
    }

    #[test]
    fn deterministic() {
        let a = hash_of(cnf_formula![1, 2; -2, 3;]);
        let b = hash_of(cnf_formula![1, 2; -2, 3;]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn clause_and_literal_order_do_not_matter() {
        let reference = hash_of(cnf_formula![1, 2; -2, 3;]);
        assert_eq!(hash_of(cnf_formula![-2, 3; 1, 2;]), reference);
        assert_eq!(hash_of(cnf_formula![2, 1; 3, -2;]), reference);
    }

    #[test]
    fn single_literal_polarity_matters() {
        assert_ne!(hash_of(cnf_formula![1;]), hash_of(cnf_formula![-1;]));
    }

    #[test]
    fn tautologies_vanish() {
        assert_eq!(hash_of(cnf_formula![1, -1;]), hash_of(CnfFormula::new()));
    }

    #[test]
    fn empty_clause_is_visible() {
        let empty_formula = hash_of(CnfFormula::new());
        let mut bottom = CnfFormula::new();
        bottom.add_clause(std::iter::empty::<Lit>());
        assert_ne!(hash_of(bottom), empty_formula);
    }

    #[test]
    fn round_limit_is_respected() {
        let settings = IsoHash2Settings {
            max_iterations: 1,
            ..IsoHash2Settings::default()
        };
        let result = isohash2_cnf(cnf_formula![1, 2; -2, 3;], &settings).unwrap();
        assert!(!result.stabilized);
        assert_eq!(result.iterations, 1);
    }
}
