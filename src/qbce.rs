//! Quantified blocked clause elimination (QBCE).
//!
//! A clause C is blocked by one of its existential literals ℓ if resolving C
//! on ℓ with any clause of the opposite polarity occurrence list yields a
//! tautology on a variable quantified no deeper than ℓ. Blocked clauses are
//! redundant: marking them preserves satisfiability of the QBF. Since
//! marking a clause removes it from the occurrence lists considered by the
//! check, further clauses may become blocked; the engine computes the
//! closure with a worklist over literal polarities.

use crate::{
    clause::ClauseId,
    datastructure::LitVec,
    literal::{Lit, Var},
    pcnf::Pcnf,
};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct QbceStats {
    /// Passes over the variable table until the fixpoint was reached.
    pub passes: u32,
    /// Clauses newly marked as blocked by this run.
    pub blocked_clauses: u32,
    pub run_time: Duration,
}

/// Worklist state of one elimination run.
#[derive(Debug)]
pub struct Qbce {
    /// `retry[l]` requests that every clause containing `l` is re-examined
    /// with `l` as the blocking literal candidate.
    retry: LitVec<bool>,
    /// Transient marks holding the candidate clause's literals during a
    /// single blocking test.
    staged: LitVec<bool>,
    stats: QbceStats,
}

impl Qbce {
    #[must_use]
    pub fn new(pcnf: &Pcnf) -> Self {
        let mut retry = LitVec::default();
        let mut staged = LitVec::default();
        let count = usize::try_from(pcnf.num_variables()).unwrap();
        retry.set_var_count(count);
        staged.set_var_count(count);
        Self { retry, staged, stats: QbceStats::default() }
    }

    /// Runs the fixpoint: marks every clause of the greatest blocked set and
    /// returns the run statistics. The formula is only mutated through
    /// [`Pcnf::set_blocked`].
    pub fn run(mut self, pcnf: &mut Pcnf) -> QbceStats {
        let start = Instant::now();

        // every existential literal that occurs is an initial candidate
        for var in pcnf.variables() {
            if pcnf.is_existential(var) {
                self.retry[var.positive()] = true;
                self.retry[var.negative()] = true;
            }
        }

        loop {
            self.stats.passes += 1;
            let newly_blocked = self.pass(pcnf);
            debug!(pass = self.stats.passes, newly_blocked, "qbce pass finished");
            self.stats.blocked_clauses += newly_blocked;
            if newly_blocked == 0 {
                break;
            }
        }

        self.stats.run_time = start.elapsed();
        self.stats
    }

    /// One sweep over the variable table in id order, consuming the pending
    /// retry flags. Returns the number of clauses marked by this pass.
    fn pass(&mut self, pcnf: &mut Pcnf) -> u32 {
        let mut newly_blocked = 0;
        for index in 0..pcnf.num_variables() {
            let var = Var::from_index(index);
            for lit in [var.positive(), var.negative()] {
                if !self.retry[lit] {
                    continue;
                }
                self.retry[lit] = false;
                // occurrence lists are frozen after parsing, so indexed
                // iteration stays valid while clauses are marked
                for idx in 0..pcnf.occurrences(lit).len() {
                    let cid = pcnf.occurrences(lit)[idx];
                    if pcnf[cid].is_blocked() || !self.blocks(pcnf, lit, cid) {
                        continue;
                    }
                    trace!(clause = %pcnf[cid], blocking = %lit, "clause is blocked");
                    pcnf.set_blocked(cid);
                    newly_blocked += 1;
                    // the marked clause leaves the occurrence lists that the
                    // blocking test quantifies over, which are those of the
                    // complements of its literals
                    for &other in pcnf[cid].lits() {
                        if pcnf.is_existential(other.var()) {
                            self.retry[!other] = true;
                        }
                    }
                }
            }
        }
        newly_blocked
    }

    /// Tests whether `lit` blocks the clause `cid` containing it: every
    /// non-blocked clause of the opposite occurrence list must close a
    /// complementary pair with `cid` on a variable at or outside the level
    /// of `lit`'s variable.
    fn blocks(&mut self, pcnf: &Pcnf, lit: Lit, cid: ClauseId) -> bool {
        let pivot = lit.var();
        let level = pcnf.level(pivot);

        // stage the literals of the candidate that can witness a tautology
        for &l in pcnf[cid].lits() {
            if l.var() != pivot && pcnf.level(l.var()) <= level {
                self.staged[l] = true;
            }
        }

        let mut blocked = true;
        for &other in pcnf.occurrences(!lit) {
            if pcnf[other].is_blocked() {
                continue;
            }
            // the resolvent with `other` is a tautology iff `other` contains
            // the complement of a staged literal
            let tautological = pcnf[other].lits().iter().any(|&l| self.staged[!l]);
            if !tautological {
                blocked = false;
                break;
            }
        }

        for &l in pcnf[cid].lits() {
            self.staged[l] = false;
        }
        blocked
    }
}
