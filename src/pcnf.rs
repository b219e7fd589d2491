//! The indexed representation of a QBF in prenex CNF: quantifier prefix,
//! variable table, clause list, and per-literal occurrence index.

use crate::{
    clause::{Clause, ClauseId},
    datastructure::{LitVec, VarVec},
    literal::{Lit, Var},
    qdimacs::FromQdimacs,
    quantifier::QuantTy,
};
use miette::Diagnostic;
use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

/// Rejections raised while the formula is populated. The parser wraps these
/// with the source location of the offending scope or clause line.
#[derive(Debug, Error, Diagnostic)]
pub enum PcnfError {
    #[error("variable {0} is quantified in more than one scope")]
    DoubleQuantification(Var),

    #[error("variable {0} does not appear in any scope")]
    UndeclaredVariable(Var),

    #[error("literal {0} has multiple occurrences in one clause")]
    DuplicateLiteral(Lit),

    #[error("clause is tautological: both polarities of variable {}", .0.var())]
    TautologicalClause(Lit),
}

/// Index of a scope in the prefix. Scopes are numbered from the outside in,
/// so the index doubles as the 0-based nesting depth: comparing two ids
/// compares prefix levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn nesting(self) -> usize {
        self.0
    }
}

/// A quantifier block of the prefix, holding the variables bound in it in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    quantifier: QuantTy,
    variables: Vec<Var>,
}

impl Scope {
    pub fn quantifier(&self) -> QuantTy {
        self.quantifier
    }

    pub fn variables(&self) -> &[Var] {
        &self.variables
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.quantifier)?;
        for &var in &self.variables {
            write!(f, " {var}")?;
        }
        writeln!(f, " 0")
    }
}

/// The formula store. Scopes, variables, and clauses are created during
/// parsing only; afterwards the single permitted mutation is flipping the
/// `blocked` flag of a clause through [`Pcnf::set_blocked`].
#[derive(Debug, Default)]
pub struct Pcnf {
    /// Declared variable count; valid ids are `1..=num_variables`.
    num_variables: u32,
    prefix: Vec<Scope>,
    scope_of: VarVec<Option<ScopeId>>,
    /// For every literal, the clauses containing it, in insertion order.
    occurrences: LitVec<Vec<ClauseId>>,
    clauses: Vec<Clause>,
    cnt_blocked: u32,
    /// Transient per-literal marks for validating one clause at a time.
    seen: LitVec<bool>,
}

impl Pcnf {
    #[must_use]
    pub fn with_num_variables(num_variables: u32) -> Self {
        let mut pcnf = Self::default();
        pcnf.set_var_count(num_variables);
        pcnf
    }

    fn set_var_count(&mut self, num_variables: u32) {
        self.num_variables = num_variables;
        let count = usize::try_from(num_variables).unwrap();
        self.scope_of.set_var_count(count);
        self.occurrences.set_var_count(count);
        self.seen.set_var_count(count);
    }

    /// Builds a formula from a QDIMACS-like representation. The variable
    /// count is the largest id mentioned in the prefix or the matrix.
    pub fn build(prefix: &[(QuantTy, &[u32])], matrix: &[&[i32]]) -> Result<Self, PcnfError> {
        let num_variables = prefix
            .iter()
            .flat_map(|(_, bound)| bound.iter().copied())
            .chain(matrix.iter().flat_map(|lits| lits.iter().map(|lit| lit.unsigned_abs())))
            .max()
            .unwrap_or_default();
        let mut pcnf = Self::with_num_variables(num_variables);
        for &(quantifier, bound) in prefix {
            let vars: Vec<Var> =
                bound.iter().map(|&var| Var::from_dimacs(var.try_into().unwrap())).collect();
            pcnf.quantify(quantifier, &vars)?;
        }
        for &lits in matrix {
            let lits: Vec<Lit> = lits.iter().map(|&lit| Lit::from_dimacs(lit)).collect();
            pcnf.add_clause(&lits)?;
        }
        Ok(pcnf)
    }

    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn num_blocked(&self) -> u32 {
        self.cnt_blocked
    }

    /// All declared variable ids, whether or not they are bound in a scope.
    pub fn variables(&self) -> impl Iterator<Item = Var> + '_ {
        (0..self.num_variables).map(Var::from_index)
    }

    pub fn prefix(&self) -> &[Scope] {
        &self.prefix
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn occurrences(&self, lit: Lit) -> &[ClauseId] {
        &self.occurrences[lit]
    }

    pub fn scope_of(&self, var: Var) -> Option<ScopeId> {
        self.scope_of[var]
    }

    /// Prefix level of a variable that occurs in a clause.
    pub fn level(&self, var: Var) -> ScopeId {
        self.scope_of[var].expect("every variable in a clause is bound in a scope")
    }

    pub fn is_existential(&self, var: Var) -> bool {
        self.scope_of[var].is_some_and(|id| self.prefix[id.0].quantifier.is_existential())
    }

    /// Appends a scope binding `vars`, which must be fresh.
    pub fn quantify(&mut self, quantifier: QuantTy, vars: &[Var]) -> Result<(), PcnfError> {
        let id = ScopeId(self.prefix.len());
        for &var in vars {
            let bound = &mut self.scope_of[var];
            if bound.is_some() {
                return Err(PcnfError::DoubleQuantification(var));
            }
            *bound = Some(id);
        }
        self.prefix.push(Scope { quantifier, variables: vars.to_vec() });
        Ok(())
    }

    /// Validates and appends a clause, registering it in the occurrence list
    /// of every literal.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<ClauseId, PcnfError> {
        let mut valid = Ok(());
        for &lit in lits {
            if self.scope_of[lit.var()].is_none() {
                valid = Err(PcnfError::UndeclaredVariable(lit.var()));
                break;
            }
            if self.seen[lit] {
                valid = Err(PcnfError::DuplicateLiteral(lit));
                break;
            }
            if self.seen[!lit] {
                valid = Err(PcnfError::TautologicalClause(lit));
                break;
            }
            self.seen[lit] = true;
        }
        // unmark on both exit paths; clearing unset marks is harmless
        for &lit in lits {
            self.seen[lit] = false;
        }
        valid?;

        let id = ClauseId::new(self.clauses.len());
        for &lit in lits {
            self.occurrences[lit].push(id);
        }
        self.clauses.push(Clause::new(id, lits));
        debug!(clause = %self.annotate(id), "imported clause");
        Ok(id)
    }

    /// Marks a clause as blocked, keeping the counter in sync with the
    /// flags. Returns `false` if the clause was already marked.
    pub fn set_blocked(&mut self, clause: ClauseId) -> bool {
        let newly = self.clauses[clause.as_index()].mark_blocked();
        if newly {
            self.cnt_blocked += 1;
        }
        newly
    }

    /// Display adapter annotating each literal of a clause with the
    /// quantifier type and nesting of its variable, e.g. `E(1)-3`.
    pub(crate) fn annotate(&self, clause: ClauseId) -> AnnotatedClause<'_> {
        AnnotatedClause { pcnf: self, clause }
    }
}

impl std::ops::Index<ClauseId> for Pcnf {
    type Output = Clause;

    fn index(&self, index: ClauseId) -> &Self::Output {
        &self.clauses[index.as_index()]
    }
}

impl FromQdimacs for Pcnf {
    fn set_num_variables(&mut self, variables: u32) {
        self.set_var_count(variables);
    }

    fn set_num_clauses(&mut self, clauses: u32) {
        self.clauses.reserve(usize::try_from(clauses).unwrap());
    }

    fn quantify(&mut self, quant: QuantTy, vars: &[Var]) -> Result<(), PcnfError> {
        Pcnf::quantify(self, quant, vars)
    }

    fn add_clause(&mut self, lits: &[Lit]) -> Result<(), PcnfError> {
        Pcnf::add_clause(self, lits).map(|_| ())
    }
}

/// Emits the formula in QDIMACS. Blocked clauses are skipped and the clause
/// count of the preamble reflects that.
impl Display for Pcnf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let remaining = self.clauses.len() - usize::try_from(self.cnt_blocked).unwrap();
        writeln!(f, "p cnf {} {remaining}", self.num_variables)?;
        for scope in &self.prefix {
            write!(f, "{scope}")?;
        }
        for clause in &self.clauses {
            if !clause.is_blocked() {
                writeln!(f, "{clause}")?;
            }
        }
        Ok(())
    }
}

pub(crate) struct AnnotatedClause<'a> {
    pcnf: &'a Pcnf,
    clause: ClauseId,
}

impl Display for AnnotatedClause<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &lit in self.pcnf[self.clause].lits() {
            let scope = self.pcnf.level(lit.var());
            let quant = self.pcnf.prefix[scope.0].quantifier;
            let tag = if quant.is_existential() { 'E' } else { 'A' };
            write!(f, "{tag}({}){lit} ", scope.nesting())?;
        }
        write!(f, "0")
    }
}

#[cfg(test)]
macro_rules! pcnf_core {
    ($prefix:expr, $matrix:expr,) => {
        crate::pcnf::Pcnf::build(&$prefix, &$matrix).expect("well-formed formula")
    };
    ($prefix:expr, $matrix:expr, a $( $x:literal )* ; $($tail:tt)* ) => {{
        $prefix.push((crate::quantifier::QuantTy::Forall, &[ $( $x ),* ][..]));
        pcnf_core![$prefix, $matrix, $($tail)*]
    }};
    ($prefix:expr, $matrix:expr, e $( $x:literal )* ; $($tail:tt)* ) => {{
        $prefix.push((crate::quantifier::QuantTy::Exists, &[ $( $x ),* ][..]));
        pcnf_core![$prefix, $matrix, $($tail)*]
    }};
    ($prefix:expr, $matrix:expr, $( $x:literal )* ; $($tail:tt)* ) => {{
        $matrix.push(&[ $( $x ),* ][..]);
        pcnf_core![$prefix, $matrix, $($tail)*]
    }};
}

/// Macro that creates a [`Pcnf`] instance from a QDIMACS-like representation.
/// The main differences are:
/// * No support for comments
/// * No header line
/// * Lines are seperated by `;`, whereas QDIMACS uses `0`.
///
/// # Example
/// ```
/// let pcnf = pcnf_formula![
///     a 1 2;
///     e 3;
///     1 2;
/// ];
/// ```
///
#[cfg(test)]
macro_rules! pcnf_formula {
    ($($tail:tt)*) => {
        {
            let mut prefix: Vec<(crate::quantifier::QuantTy, &[u32])> = Vec::new();
            let mut matrix: Vec<&[i32]> = Vec::new();
            pcnf_core![prefix, matrix, $($tail)*]
        }
    };
}

/// Provides a strategy for randomly generating well-formed formulas: every
/// variable is bound in exactly one scope and no clause contains a variable
/// twice.
#[cfg(test)]
pub(crate) mod strategy {
    use super::{Pcnf, QuantTy};
    use proptest::{
        collection::{self, SizeRange},
        prelude::*,
        sample,
    };

    pub(crate) fn pcnf(
        scopes: impl Into<SizeRange>,
        scope_len: impl Into<SizeRange>,
        clauses: impl Into<SizeRange>,
        max_clause_len: usize,
    ) -> impl Strategy<Value = Pcnf> {
        let scope_len = scope_len.into();
        let clauses = clauses.into();
        prefix(scopes.into(), scope_len)
            .prop_flat_map(move |prefix| {
                let num_vars: u32 = prefix.iter().map(|(_, bound)| bound.len() as u32).sum();
                let candidates: Vec<i32> = (1..=i32::try_from(num_vars).unwrap()).collect();
                let len = max_clause_len.min(candidates.len());
                let clause = sample::subsequence(candidates, 0..=len).prop_flat_map(|vars| {
                    let signs = collection::vec(proptest::bool::ANY, vars.len());
                    (Just(vars), signs).prop_map(|(vars, signs)| {
                        vars.into_iter()
                            .zip(signs)
                            .map(|(var, negative)| if negative { -var } else { var })
                            .collect::<Vec<i32>>()
                    })
                });
                (Just(prefix), collection::vec(clause, clauses.clone()))
            })
            .prop_map(|(prefix, matrix)| {
                let prefix: Vec<(QuantTy, &[u32])> =
                    prefix.iter().map(|(quant, bound)| (*quant, bound.as_slice())).collect();
                let matrix: Vec<&[i32]> = matrix.iter().map(Vec::as_slice).collect();
                Pcnf::build(&prefix, &matrix).expect("strategy generates well-formed formulas")
            })
            .no_shrink()
    }

    /// A strategy to generate a quantifier prefix binding the variables
    /// `1..=n` in declaration order.
    fn prefix(
        scopes: SizeRange,
        scope_len: SizeRange,
    ) -> impl Strategy<Value = Vec<(QuantTy, Vec<u32>)>> {
        collection::vec((proptest::bool::ANY, collection::vec(Just(()), scope_len)), scopes)
            .prop_map(|blocks| {
                let mut next = 1;
                blocks
                    .into_iter()
                    .map(|(universal, slots)| {
                        let quant = if universal { QuantTy::Forall } else { QuantTy::Exists };
                        let bound = slots
                            .iter()
                            .map(|()| {
                                let var = next;
                                next += 1;
                                var
                            })
                            .collect();
                        (quant, bound)
                    })
                    .collect()
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formula_macro() {
        let pcnf = pcnf_formula![
            a 1 2;
            e 3;
            1 2;
        ];
        assert_eq!(pcnf.num_variables(), 3);
        assert_eq!(pcnf.num_clauses(), 1);
        assert_eq!(pcnf.prefix().len(), 2);
    }

    #[test]
    fn occurrence_lists_are_registered_per_polarity() {
        let pcnf = pcnf_formula![
            e 1 2 3;
            1 -2;
            -1 3;
        ];
        let var = |id| Var::from_dimacs(id);
        assert_eq!(pcnf.occurrences(var(1).positive()).len(), 1);
        assert_eq!(pcnf.occurrences(var(1).negative()).len(), 1);
        assert_eq!(pcnf.occurrences(var(2).negative()).len(), 1);
        assert_eq!(pcnf.occurrences(var(2).positive()).len(), 0);
        assert_eq!(pcnf.occurrences(var(3).positive()).len(), 1);
    }

    #[test]
    fn blocked_counter_tracks_flags() {
        let mut pcnf = pcnf_formula![
            e 1 2;
            1 2;
            -1 2;
        ];
        let first = pcnf.clauses().next().unwrap().id();
        assert_eq!(pcnf.num_blocked(), 0);
        assert!(pcnf.set_blocked(first));
        assert_eq!(pcnf.num_blocked(), 1);
        // marking twice does not skew the counter
        assert!(!pcnf.set_blocked(first));
        assert_eq!(pcnf.num_blocked(), 1);
        let marked = pcnf.clauses().filter(|clause| clause.is_blocked()).count();
        assert_eq!(marked, 1);
    }

    #[test]
    fn writer_skips_blocked_clauses() {
        let mut pcnf = pcnf_formula![
            a 1;
            e 2;
            1 2;
            -1 -2;
        ];
        let first = pcnf.clauses().next().unwrap().id();
        pcnf.set_blocked(first);
        assert_eq!(format!("{pcnf}"), "p cnf 2 1\na 1 0\ne 2 0\n-1 -2 0\n");
    }

    #[test]
    fn rejects_double_quantification() {
        let result = Pcnf::build(&[(QuantTy::Exists, &[1]), (QuantTy::Forall, &[1])], &[]);
        assert!(matches!(result, Err(PcnfError::DoubleQuantification(_))));
    }

    #[test]
    fn rejects_undeclared_variable() {
        let result = Pcnf::build(&[(QuantTy::Exists, &[1])], &[&[1, 2]]);
        assert!(matches!(result, Err(PcnfError::UndeclaredVariable(_))));
    }

    #[test]
    fn rejects_duplicate_literal() {
        let result = Pcnf::build(&[(QuantTy::Exists, &[1, 2])], &[&[1, 2, 1]]);
        assert!(matches!(result, Err(PcnfError::DuplicateLiteral(_))));
    }

    #[test]
    fn rejects_tautological_clause() {
        let result = Pcnf::build(&[(QuantTy::Exists, &[1, 2])], &[&[1, 2, -1]]);
        assert!(matches!(result, Err(PcnfError::TautologicalClause(_))));
    }

    #[test]
    fn scope_ids_order_by_nesting() {
        let pcnf = pcnf_formula![
            a 1;
            e 2;
            a 3;
        ];
        let level = |id| pcnf.level(Var::from_dimacs(id));
        assert!(level(1) < level(2));
        assert!(level(2) < level(3));
        assert_eq!(level(1).nesting(), 0);
        assert_eq!(level(3).nesting(), 2);
    }

    #[test]
    fn existential_lookup_follows_scope_type() {
        let pcnf = pcnf_formula![
            a 1;
            e 2;
        ];
        assert!(!pcnf.is_existential(Var::from_dimacs(1)));
        assert!(pcnf.is_existential(Var::from_dimacs(2)));
    }
}
