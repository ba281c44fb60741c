use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::mutation::record::{Mutation, MutationKind, NaKind};
use crate::reads::Mate;

/// Id of the common (wildtype) allele in every allele arena.
pub const COMMON_ALLELE: usize = 0;

/// One node of the allele tree of a locus. `mutations` holds every mutation on
/// the path from the common allele to this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allele {
    pub id: usize,
    pub parent: Option<usize>,
    pub mutations: Vec<Mutation>,
    pub has_p5_mutation: bool,
    pub has_p7_mutation: bool,
}

/// What an individual carries on one of its two chromosomes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AssignedAllele {
    Allele(usize),
    /// no reads are produced
    Dropout,
    /// not applicable, e.g. the second slot of a common individual
    None,
}

impl AssignedAllele {
    pub fn id(&self) -> Option<usize> {
        match self {
            AssignedAllele::Allele(id) => Some(*id),
            _ => None,
        }
    }
}

impl Allele {
    pub fn common() -> Allele {
        Allele {
            id: COMMON_ALLELE,
            parent: None,
            mutations: Vec::new(),
            has_p5_mutation: false,
            has_p7_mutation: false,
        }
    }

    /// Child of `self` carrying all of its mutations.
    pub fn copy(&self, new_id: usize) -> Allele {
        Allele {
            id: new_id,
            parent: Some(self.id),
            mutations: self.mutations.clone(),
            has_p5_mutation: self.has_p5_mutation,
            has_p7_mutation: self.has_p7_mutation,
        }
    }

    pub fn name(&self) -> String {
        if self.id == COMMON_ALLELE {
            "common".to_string()
        } else {
            format!("allele {}", self.id)
        }
    }

    pub fn is_common(&self) -> bool {
        self.id == COMMON_ALLELE
    }

    pub fn has_mutation_on(&self, mate: Mate) -> bool {
        match mate {
            Mate::P5 => self.has_p5_mutation,
            Mate::P7 => self.has_p7_mutation,
        }
    }

    /// Null allele variant carried on `mate`, if any.
    pub fn na_state(&self, mate: Mate) -> Option<NaKind> {
        self.mutations.iter().find_map(|m| match m.null_allele() {
            Some((na_mate, kind)) if na_mate == mate => Some(kind),
            _ => None,
        })
    }

    /// A dropout on either mate removes the whole read pair.
    pub fn is_dropout(&self) -> bool {
        Mate::BOTH
            .iter()
            .any(|mate| self.na_state(*mate) == Some(NaKind::Dropout))
    }

    /// Mutation types this allele cannot receive any more.
    pub fn prohibited_mutations(&self) -> FxHashSet<MutationKind> {
        let mut prohibited = FxHashSet::default();
        for mate in Mate::BOTH {
            if self.na_state(mate).is_some() {
                prohibited.extend(MutationKind::null_alleles_of(mate));
            }
        }
        prohibited
    }

    fn free_mask(&self, mate: Mate, mutable_length: usize) -> Vec<bool> {
        if self.na_state(mate).is_some() {
            return vec![false; mutable_length];
        }
        let mut free = vec![true; mutable_length];
        for mutation in self.mutations.iter().filter(|m| m.mate() == mate) {
            for pos in mutation.occupied_positions() {
                if let Some(slot) = free.get_mut(pos) {
                    *slot = false;
                }
            }
        }
        free
    }

    /// Positions in `0..mutable_length` of `mate` not touched by any mutation.
    /// A mate carrying a null allele has no positions left.
    pub fn still_unmutated_positions(&self, mate: Mate, mutable_length: usize) -> Vec<usize> {
        self.free_mask(mate, mutable_length)
            .iter()
            .enumerate()
            .filter_map(|(pos, is_free)| if *is_free { Some(pos) } else { None })
            .collect()
    }

    /// Start positions of runs of `length` consecutive unmutated positions.
    pub fn deletion_windows(&self, mate: Mate, mutable_length: usize, length: usize) -> Vec<usize> {
        if length == 0 || length > mutable_length {
            return Vec::new();
        }
        let free = self.free_mask(mate, mutable_length);
        (0..=mutable_length - length)
            .filter(|start| free[*start..*start + length].iter().all(|f| *f))
            .collect()
    }

    /// Length of the longest run of unmutated positions.
    pub fn longest_free_window(&self, mate: Mate, mutable_length: usize) -> usize {
        self.free_mask(mate, mutable_length)
            .split(|is_free| !*is_free)
            .map(|run| run.len())
            .max()
            .unwrap_or(0)
    }

    /// Total number of bases deleted from `mate` along the allele chain.
    pub fn deleted_length(&self, mate: Mate) -> usize {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::Deletion { mate: m_mate, length, .. } if *m_mate == mate => Some(*length),
                _ => None,
            })
            .sum()
    }

    fn push(&mut self, mutation: Mutation) {
        match mutation.mate() {
            Mate::P5 => self.has_p5_mutation = true,
            Mate::P7 => self.has_p7_mutation = true,
        }
        self.mutations.push(mutation);
    }

    fn random_position<R: Rng>(&self, mutable_length: [usize; 2], rng: &mut R) -> Option<(Mate, usize)> {
        let candidates = Mate::BOTH
            .iter()
            .flat_map(|mate| {
                self.still_unmutated_positions(*mate, mutable_length[mate.index()])
                    .into_iter()
                    .map(move |pos| (*mate, pos))
            })
            .collect::<Vec<(Mate, usize)>>();
        candidates.choose(rng).copied()
    }

    /// Substitute a random unmutated base. `templates` holds the common genomic
    /// sequence of both mates. Returns `None` if no position is left.
    pub fn add_snp<R: Rng>(
        &mut self,
        templates: [&[u8]; 2],
        mutable_length: [usize; 2],
        rng: &mut R,
    ) -> Option<(Mate, usize)> {
        let (mate, pos) = self.random_position(mutable_length, rng)?;
        let base_from = *templates[mate.index()].get(pos)?;
        let base_to = crate::sequence::substitute_base(base_from, rng);
        self.push(Mutation::Snp {
            mate,
            pos,
            base_from,
            base_to,
        });
        Some((mate, pos))
    }

    pub fn add_insert<R: Rng>(&mut self, seq: Vec<u8>, mutable_length: [usize; 2], rng: &mut R) -> Option<(Mate, usize)> {
        let (mate, pos) = self.random_position(mutable_length, rng)?;
        self.push(Mutation::Insert { mate, pos, seq });
        Some((mate, pos))
    }

    /// Delete `length` bases on `mate` at a random window of unmutated positions.
    pub fn add_deletion<R: Rng>(&mut self, mate: Mate, length: usize, mutable_length: usize, rng: &mut R) -> Option<usize> {
        let pos = *self.deletion_windows(mate, mutable_length, length).choose(rng)?;
        self.push(Mutation::Deletion {
            mate,
            pos,
            length,
            deleted_seq: None,
        });
        Some(pos)
    }

    pub fn add_p5_na_mut(&mut self, seq: Rc<Vec<u8>>) {
        self.push(Mutation::P5NullAlleleAlt { seq });
    }

    pub fn add_p7_na_mut(&mut self, seq: Rc<Vec<u8>>) {
        self.push(Mutation::P7NullAlleleAlt { seq });
    }

    pub fn add_p5_na_dropout(&mut self) {
        self.push(Mutation::P5NullAlleleDropout);
    }

    pub fn add_p7_na_dropout(&mut self) {
        self.push(Mutation::P7NullAlleleDropout);
    }
}
