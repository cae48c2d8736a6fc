//! CNF formulas.
use std::cmp::max;
use std::fmt;
use std::iter::Extend;

use crate::lit::{Lit, LitIdx};

/// A formula in conjunctive normal form (CNF).
///
/// Equivalent to `Vec<Vec<Lit>>` but more efficient as it uses a single buffer for all literals,
/// with clause boundaries stored as prefix offsets into that buffer. Clause `i` occupies
/// `literals[starts[i]..starts[i + 1]]`.
#[derive(Eq)]
pub struct CnfFormula {
    var_count: usize,
    literals: Vec<Lit>,
    starts: Vec<usize>,
}

impl Default for CnfFormula {
    fn default() -> CnfFormula {
        CnfFormula {
            var_count: 0,
            literals: vec![],
            starts: vec![0],
        }
    }
}

impl CnfFormula {
    /// Create an empty CNF formula.
    pub fn new() -> CnfFormula {
        CnfFormula::default()
    }

    /// Number of variables in the formula.
    ///
    /// This also counts missing variables if a variable with a higher index is present. A vector
    /// of this length can be indexed with the variable indices present. Gaps are removed by
    /// [`renumber`](CnfFormula::renumber).
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Number of clauses in the formula.
    pub fn len(&self) -> usize {
        self.starts.len() - 1
    }

    /// Whether the formula has no clauses.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of literals over all clauses.
    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    /// Length of the longest clause.
    pub fn max_clause_len(&self) -> usize {
        self.starts
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .max()
            .unwrap_or(0)
    }

    /// The literals of clause `index`.
    pub fn clause(&self, index: usize) -> &[Lit] {
        &self.literals[self.starts[index]..self.starts[index + 1]]
    }

    /// Appends a clause to the formula.
    ///
    /// `literals` can be an `IntoIterator<Item = Lit>` or `IntoIterator<Item = &Lit>`.
    pub fn add_clause<L>(&mut self, literals: impl IntoIterator<Item = L>)
    where
        Vec<Lit>: Extend<L>,
    {
        let begin = self.literals.len();
        self.literals.extend(literals);

        for &lit in self.literals[begin..].iter() {
            self.var_count = max(lit.index() + 1, self.var_count);
        }

        self.starts.push(self.literals.len());
    }

    /// Iterator over all clauses.
    pub fn iter(&self) -> impl Iterator<Item = &[Lit]> {
        let literals = &self.literals;
        self.starts
            .windows(2)
            .map(move |pair| &literals[pair[0]..pair[1]])
    }

    /// Renumbers variables to a gapless range in order of first appearance.
    ///
    /// The first variable occurring in the literal buffer becomes index 0, the next distinct one
    /// index 1, and so on. Signs are preserved. Afterwards `var_count` is the number of distinct
    /// variables actually used by the formula.
    pub fn renumber(&mut self) {
        const UNMAPPED: LitIdx = LitIdx::max_value();

        let mut map = vec![UNMAPPED; self.var_count];
        let mut next: LitIdx = 0;

        for lit in self.literals.iter_mut() {
            let slot = &mut map[lit.index()];
            if *slot == UNMAPPED {
                *slot = next;
                next += 1;
            }
            *lit = Lit::from_index(*slot as usize, lit.is_positive());
        }

        self.var_count = next as usize;
    }

    /// Canonicalises every clause and drops tautological clauses.
    ///
    /// Each clause is sorted by `(variable, sign)` and duplicate literals are removed. A clause
    /// containing a variable in both polarities is dropped entirely. Clauses that were already
    /// empty in the input are kept.
    pub fn canonicalize(&mut self) {
        let mut scratch: Vec<Lit> = vec![];
        let mut new_starts = Vec::with_capacity(self.starts.len());
        let mut out = 0;

        new_starts.push(0);

        for index in 0..self.len() {
            let range = self.starts[index]..self.starts[index + 1];
            scratch.clear();
            scratch.extend_from_slice(&self.literals[range]);
            scratch.sort_unstable();
            scratch.dedup();

            let mut last = None;
            let mut tautological = false;
            for &lit in scratch.iter() {
                if last == Some(!lit) {
                    tautological = true;
                    break;
                }
                last = Some(lit);
            }
            if tautological {
                continue;
            }

            // canonicalisation never grows a clause, so this compacts in place
            for &lit in scratch.iter() {
                self.literals[out] = lit;
                out += 1;
            }
            new_starts.push(out);
        }

        self.literals.truncate(out);
        self.starts = new_starts;
    }
}

/// Convert any iterable of [`Lit`] iterables into a CnfFormula
impl<F, I, L> From<F> for CnfFormula
where
    F: IntoIterator<Item = I>,
    I: IntoIterator<Item = L>,
    Vec<Lit>: Extend<L>,
{
    fn from(formula: F) -> CnfFormula {
        let mut cnf_formula = CnfFormula::new();
        for clause in formula {
            cnf_formula.add_clause(clause);
        }
        cnf_formula
    }
}

impl fmt::Debug for CnfFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.var_count(), f)?;
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for CnfFormula {
    fn eq(&self, other: &CnfFormula) -> bool {
        self.var_count() == other.var_count()
            && self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{collection, collection::SizeRange, prelude::*};

    use crate::lit::strategy::lit;

    /// Clause lists over `vars` variables, as nested vectors.
    pub fn vec_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Vec<Vec<Lit>>> {
        let clauses = clauses.into();
        let clause_len = clause_len.into();

        vars.prop_flat_map(move |vars| {
            collection::vec(
                collection::vec(lit(0..vars), clause_len.clone()),
                clauses.clone(),
            )
        })
    }

    /// Formulas in the flat-buffer representation, built through the `From` conversion so the
    /// start offsets are exercised the same way the parser exercises them.
    pub fn cnf_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = CnfFormula> {
        vec_formula(vars, clauses, clause_len).prop_map(CnfFormula::from)
    }
}

#[cfg(test)]
mod tests {
    use super::{strategy::*, *};

    use proptest::*;

    #[test]
    fn flat_layout_accessors() {
        let mut formula = CnfFormula::new();
        formula.add_clause(lits![2, -3].iter().cloned());
        formula.add_clause(lits![1].iter().cloned());
        formula.add_clause(std::iter::empty::<Lit>());
        formula.add_clause(lits![-1, 2, 4].iter().cloned());

        assert_eq!(formula.len(), 4);
        assert_eq!(formula.literal_count(), 6);
        assert_eq!(formula.max_clause_len(), 3);
        assert_eq!(formula.var_count(), 4);

        assert_eq!(formula.clause(0), lits![2, -3]);
        assert_eq!(formula.clause(1), lits![1]);
        assert!(formula.clause(2).is_empty());
        assert_eq!(formula.clause(3), lits![-1, 2, 4]);
    }

    #[test]
    fn from_nested_vecs() {
        let clauses = cnf![
            2, -3;
            1;
            ;
            -1, 2, 4;
        ];

        let formula = CnfFormula::from(clauses.iter().cloned());
        let collected: Vec<&[Lit]> = formula.iter().collect();

        assert_eq!(collected, clauses);
        assert_eq!(formula.var_count(), 4);
    }

    #[test]
    fn renumber_collapses_gaps() {
        let mut formula = cnf_formula![
            7, 3;
            -3, 9;
        ];
        formula.renumber();

        let expected = cnf_formula![
            1, 2;
            -2, 3;
        ];
        assert_eq!(formula, expected);
        assert_eq!(formula.var_count(), 3);
    }

    #[test]
    fn renumber_uses_first_appearance_order() {
        let mut formula = cnf_formula![
            -5, 2;
            2, 5;
        ];
        formula.renumber();

        let expected = cnf_formula![
            -1, 2;
            2, 1;
        ];
        assert_eq!(formula, expected);
    }

    #[test]
    fn canonicalize_sorts_and_dedups() {
        let mut formula = cnf_formula![
            3, 1, -2, 1;
            2, 2, 2;
        ];
        formula.canonicalize();

        let expected = cnf_formula![
            1, -2, 3;
            2;
        ];
        assert_eq!(formula, expected);
    }

    #[test]
    fn canonicalize_drops_tautologies() {
        let mut formula = cnf_formula![
            1, -1;
            2, 3;
            -3, 2, 3;
        ];
        formula.canonicalize();

        let expected = cnf_formula![
            2, 3;
        ];
        // var_count is untouched by canonicalisation
        assert_eq!(formula.len(), expected.len());
        assert_eq!(formula.clause(0), expected.clause(0));
    }

    #[test]
    fn canonicalize_keeps_empty_clauses() {
        let mut formula = CnfFormula::new();
        formula.add_clause(lits![1, 2].iter().cloned());
        formula.add_clause(std::iter::empty::<Lit>());
        formula.canonicalize();

        assert_eq!(formula.len(), 2);
        assert!(formula.clause(1).is_empty());
    }

    proptest! {
        #[test]
        fn flat_layout_matches_nested_vecs(input in vec_formula(1..200usize, 0..500, 0..10)) {
            let formula = CnfFormula::from(input.iter().map(|clause| clause.iter().cloned()));

            prop_assert_eq!(formula.len(), input.len());
            prop_assert_eq!(
                formula.literal_count(),
                input.iter().map(Vec::len).sum::<usize>()
            );
            prop_assert_eq!(
                formula.max_clause_len(),
                input.iter().map(Vec::len).max().unwrap_or(0)
            );
            for (index, clause) in input.iter().enumerate() {
                prop_assert_eq!(formula.clause(index), &clause[..]);
            }

            let used_vars = input
                .iter()
                .flatten()
                .map(|lit| lit.index() + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(formula.var_count(), used_vars);
        }

        #[test]
        fn canonicalize_is_idempotent(mut formula in cnf_formula(1..100usize, 0..500, 0..10)) {
            formula.canonicalize();
            let once = CnfFormula::from(formula.iter().map(|cl| cl.to_vec()));
            formula.canonicalize();

            for (a, b) in once.iter().zip(formula.iter()) {
                prop_assert_eq!(a, b);
            }
            prop_assert_eq!(once.len(), formula.len());
        }

        #[test]
        fn renumber_is_gapless(mut formula in cnf_formula(1..100usize, 0..500, 0..10)) {
            formula.renumber();

            let mut seen = vec![false; formula.var_count()];
            let mut next_expected = 0;
            for clause in formula.iter() {
                for lit in clause {
                    if !seen[lit.index()] {
                        // first appearance must be the next free index
                        prop_assert_eq!(lit.index(), next_expected);
                        seen[lit.index()] = true;
                        next_expected += 1;
                    }
                }
            }
            prop_assert_eq!(next_expected, formula.var_count());
        }
    }
}
