use std::rc::Rc;

use rand::seq::{index, SliceRandom};
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::config::{Label, ProbabilityMap, SimulationConfig};
use crate::distributions::{distributed_mutation_type, IndelLengthGenerator};
use crate::error::{Error, Result};
use crate::mutation::allele::{Allele, COMMON_ALLELE};
use crate::mutation::record::{MutationKind, NaKind};
use crate::reads::{Mate, RadRead};
use crate::sequence::random_seq;

/// Attempts to find a parent allele that can still be mutated.
pub const MAX_PARENT_TRIES: usize = 1000;

/// Sequence material of one locus the mutation model works on.
#[derive(Debug, Clone)]
pub struct LocusTemplate {
    /// common genomic sequence of (p5, p7) as seen by the individual with the
    /// shortest auxiliary sequences
    pub genomic: [Rc<Vec<u8>>; 2],
    /// positions `0..mutable_length` may carry mutations on every individual
    pub mutable_length: [usize; 2],
    /// genomic bases available to refill deletions on each mate
    pub spare_length: [usize; 2],
}

/// The allele tree of one locus.
///
/// Built once at construction by repeatedly copying a random allele and
/// giving the copy exactly one new mutation. Allele 0 is the common allele.
#[derive(Debug)]
pub struct MutationModel {
    locus_name: String,
    alleles: Vec<Allele>,
    template: LocusTemplate,
    na_alternatives: [Rc<Vec<u8>>; 2],
    /// first null allele kind placed on a mate fixes that mate for the locus
    na_locks: [Option<NaKind>; 2],
    probabilities: ProbabilityMap<MutationKind>,
    single_end: bool,
    gc_content: f64,
    excluded_motifs: Vec<Vec<u8>>,
    indel_lengths: IndelLengthGenerator,
}

impl MutationModel {
    pub fn new<R: Rng>(
        locus_name: &str,
        template: LocusTemplate,
        config: &SimulationConfig,
        nr_alleles: usize,
        rng: &mut R,
    ) -> Result<MutationModel> {
        let excluded_motifs = config.excluded_motifs();
        let p5_alt = random_seq(template.genomic[0].len(), config.gc_content, &excluded_motifs, rng)?;
        let p7_alt = random_seq(template.genomic[1].len(), config.gc_content, &excluded_motifs, rng)?;

        let mut model = MutationModel {
            locus_name: locus_name.to_string(),
            alleles: vec![Allele::common()],
            template,
            na_alternatives: [Rc::new(p5_alt), Rc::new(p7_alt)],
            na_locks: [None, None],
            probabilities: config.mutation_type_probabilities.clone(),
            single_end: config.single_end,
            gc_content: config.gc_content,
            excluded_motifs,
            indel_lengths: IndelLengthGenerator::new(),
        };
        model.add_alleles(nr_alleles, rng)?;
        Ok(model)
    }

    pub fn locus_name(&self) -> &str {
        &self.locus_name
    }

    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    pub fn allele(&self, id: usize) -> &Allele {
        &self.alleles[id]
    }

    pub fn nr_alleles(&self) -> usize {
        self.alleles.len()
    }

    pub fn template(&self) -> &LocusTemplate {
        &self.template
    }

    fn no_positions_left(&self, detail: String) -> Error {
        Error::NoPositionsLeft {
            locus: self.locus_name.clone(),
            detail,
        }
    }

    fn remaining_deletion(&self, allele: &Allele, mate: Mate) -> usize {
        let slot = mate.index();
        let budget = self.template.spare_length[slot].saturating_sub(allele.deleted_length(mate));
        budget.min(allele.longest_free_window(mate, self.template.mutable_length[slot]))
    }

    /// Types `allele` cannot receive, from its own history, the locus wide
    /// null allele locks and the remaining positions.
    fn prohibited_for(&self, allele: &Allele) -> FxHashSet<MutationKind> {
        let mut prohibited = allele.prohibited_mutations();
        for mate in Mate::BOTH {
            match self.na_locks[mate.index()] {
                Some(NaKind::Alternative) => {
                    prohibited.insert(MutationKind::null_allele(mate, NaKind::Dropout));
                }
                Some(NaKind::Dropout) => {
                    prohibited.insert(MutationKind::null_allele(mate, NaKind::Alternative));
                }
                None => {}
            }
        }
        if self.single_end {
            prohibited.extend(MutationKind::null_alleles_of(Mate::P7));
        }
        let has_positions = Mate::BOTH.iter().any(|mate| {
            !allele
                .still_unmutated_positions(*mate, self.template.mutable_length[mate.index()])
                .is_empty()
        });
        if !has_positions {
            prohibited.insert(MutationKind::Snp);
            prohibited.insert(MutationKind::Insertion);
        }
        if Mate::BOTH.iter().all(|mate| self.remaining_deletion(allele, *mate) == 0) {
            prohibited.insert(MutationKind::Deletion);
        }
        prohibited
    }

    fn can_be_parent(&self, allele: &Allele) -> bool {
        let prohibited = self.prohibited_for(allele);
        self.probabilities
            .entries()
            .iter()
            .any(|(kind, p)| *p > 0.0 && !prohibited.contains(kind))
    }

    /// Grow the allele tree by `n` alleles.
    pub fn add_alleles<R: Rng>(&mut self, n: usize, rng: &mut R) -> Result<()> {
        for _ in 0..n {
            let parent = self.pick_parent(rng)?;
            let mut allele = self.alleles[parent].copy(self.alleles.len());
            let prohibited = self.prohibited_for(&allele);
            let kind = distributed_mutation_type(&self.probabilities, &prohibited, rng)?;
            self.mutate(&mut allele, kind, rng)?;
            trace!(
                "locus {}: {} from {} received {}",
                self.locus_name,
                allele.name(),
                self.alleles[parent].name(),
                kind.label()
            );
            self.alleles.push(allele);
        }
        Ok(())
    }

    fn pick_parent<R: Rng>(&self, rng: &mut R) -> Result<usize> {
        for _ in 0..MAX_PARENT_TRIES {
            let candidate = rng.gen_range(0..self.alleles.len());
            if self.can_be_parent(&self.alleles[candidate]) {
                return Ok(candidate);
            }
        }
        Err(self.no_positions_left(format!(
            "no mutable allele found among {} alleles after {} tries",
            self.alleles.len(),
            MAX_PARENT_TRIES
        )))
    }

    fn mutate<R: Rng>(&mut self, allele: &mut Allele, kind: MutationKind, rng: &mut R) -> Result<()> {
        let mutable_length = self.template.mutable_length;
        match kind {
            MutationKind::Snp => {
                let templates = [self.template.genomic[0].as_slice(), self.template.genomic[1].as_slice()];
                allele
                    .add_snp(templates, mutable_length, rng)
                    .ok_or_else(|| self.no_positions_left("no position left for a SNP".to_string()))?;
            }
            MutationKind::Insertion => {
                let length = self.indel_lengths.get_insert_length(rng);
                let seq = random_seq(length, self.gc_content, &self.excluded_motifs, rng)?;
                allele
                    .add_insert(seq, mutable_length, rng)
                    .ok_or_else(|| self.no_positions_left("no position left for an insertion".to_string()))?;
            }
            MutationKind::Deletion => {
                let candidates = Mate::BOTH
                    .iter()
                    .copied()
                    .filter(|mate| self.remaining_deletion(&*allele, *mate) > 0)
                    .collect::<Vec<Mate>>();
                let mate = *candidates
                    .choose(rng)
                    .ok_or_else(|| self.no_positions_left("no window left for a deletion".to_string()))?;
                let length = self
                    .indel_lengths
                    .get_deletion_length(rng)
                    .min(self.remaining_deletion(&*allele, mate));
                allele
                    .add_deletion(mate, length, mutable_length[mate.index()], rng)
                    .ok_or_else(|| self.no_positions_left(format!("no window of length {} left", length)))?;
            }
            MutationKind::P5NaAlternative => allele.add_p5_na_mut(Rc::clone(&self.na_alternatives[0])),
            MutationKind::P7NaAlternative => allele.add_p7_na_mut(Rc::clone(&self.na_alternatives[1])),
            MutationKind::P5NaDropout => allele.add_p5_na_dropout(),
            MutationKind::P7NaDropout => allele.add_p7_na_dropout(),
        }
        if let Some((mate, na_kind)) = kind.as_null_allele() {
            self.na_locks[mate.index()].get_or_insert(na_kind);
        }
        Ok(())
    }

    /// Two distinct alleles, uniformly chosen.
    pub fn get_random_genotype<R: Rng>(&self, rng: &mut R) -> (usize, usize) {
        if self.alleles.len() < 2 {
            return (COMMON_ALLELE, COMMON_ALLELE);
        }
        let picked = index::sample(rng, self.alleles.len(), 2);
        (picked.index(0), picked.index(1))
    }

    pub fn get_random_allele<R: Rng>(&self, exclude_common: bool, rng: &mut R) -> usize {
        let start = if exclude_common && self.alleles.len() > 1 { 1 } else { 0 };
        rng.gen_range(start..self.alleles.len())
    }

    /// Like `get_random_allele`, but prefers alleles with a mutation on p5,
    /// the only mate sequenced in single end runs.
    pub fn get_random_allele_p5<R: Rng>(&self, exclude_common: bool, rng: &mut R) -> usize {
        let with_p5 = self
            .alleles
            .iter()
            .filter(|a| a.has_p5_mutation && !(exclude_common && a.is_common()))
            .map(|a| a.id)
            .collect::<Vec<usize>>();
        match with_p5.choose(rng) {
            Some(id) => *id,
            None => self.get_random_allele(exclude_common, rng),
        }
    }

    /// Apply allele `id` to a copy of an individual's template read.
    pub fn apply_allele(&mut self, id: usize, read: &mut RadRead) -> Vec<String> {
        let allele = &mut self.alleles[id];
        let name = allele.name();
        read.apply_mutations(&mut allele.mutations, &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template(length: usize, mutable: usize, spare: usize) -> LocusTemplate {
        let mut rng = StdRng::seed_from_u64(99);
        LocusTemplate {
            genomic: [
                Rc::new(random_seq(length, 0.5, &[], &mut rng).unwrap()),
                Rc::new(random_seq(length, 0.5, &[], &mut rng).unwrap()),
            ],
            mutable_length: [mutable, mutable],
            spare_length: [spare, spare],
        }
    }

    fn config_with(mutation_types: &str) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.mutation_type_probabilities = ProbabilityMap::parse("mutation types", mutation_types).unwrap();
        config
    }

    #[test]
    fn tree_has_requested_size() {
        let mut rng = StdRng::seed_from_u64(31);
        let config = SimulationConfig::default();
        let model = MutationModel::new("locus 1", template(80, 70, 40), &config, 12, &mut rng).unwrap();
        assert_eq!(model.nr_alleles(), 13);
        assert_eq!(model.allele(0).name(), "common");
        for allele in model.alleles().iter().skip(1) {
            let parent = allele.parent.unwrap();
            assert!(parent < allele.id);
            assert_eq!(allele.mutations.len(), model.allele(parent).mutations.len() + 1);
        }
    }

    #[test]
    fn positions_are_disjoint_and_null_alleles_exclusive() {
        let mut rng = StdRng::seed_from_u64(32);
        let config = config_with(
            "snp=0.4,insertion=0.1,deletion=0.1,p5 na alternative=0.1,p7 na alternative=0.1,p5 na dropout=0.1,p7 na dropout=0.1",
        );
        for _ in 0..20 {
            let model = MutationModel::new("locus", template(60, 50, 30), &config, 25, &mut rng).unwrap();
            for allele in model.alleles() {
                let mut seen = FxHashSet::default();
                for m in allele.mutations.iter() {
                    for pos in m.occupied_positions() {
                        assert!(seen.insert((m.mate(), pos)), "{:?}", allele.mutations);
                    }
                }
                for mate in Mate::BOTH {
                    let nas = allele
                        .mutations
                        .iter()
                        .filter(|m| m.null_allele().map(|(na_mate, _)| na_mate) == Some(mate))
                        .count();
                    assert!(nas <= 1);
                }
            }
        }
    }

    #[test]
    fn deletions_stay_within_spare_budget() {
        let mut rng = StdRng::seed_from_u64(33);
        let config = config_with("deletion=1.0");
        let model = MutationModel::new("locus", template(100, 90, 25), &config, 10, &mut rng).unwrap();
        for allele in model.alleles() {
            assert!(allele.deleted_length(Mate::P5) <= 25);
            assert!(allele.deleted_length(Mate::P7) <= 25);
        }
    }

    #[test]
    fn no_mutable_positions_is_fatal() {
        let mut rng = StdRng::seed_from_u64(34);
        let config = config_with("snp=0.5,insertion=0.25,deletion=0.25");
        let res = MutationModel::new("locus 7", template(3, 0, 0), &config, 1, &mut rng);
        match res {
            Err(Error::NoPositionsLeft { locus, .. }) => assert_eq!(locus, "locus 7"),
            other => panic!("expected NoPositionsLeft, got {:?}", other.map(|m| m.nr_alleles())),
        }
    }

    #[test]
    fn single_end_never_places_p7_null_alleles() {
        let mut rng = StdRng::seed_from_u64(35);
        let mut config = config_with("snp=0.5,p5 na dropout=0.2,p7 na dropout=0.2,p7 na alternative=0.1");
        config.single_end = true;
        let model = MutationModel::new("locus", template(60, 50, 30), &config, 30, &mut rng).unwrap();
        for allele in model.alleles() {
            assert!(allele.na_state(Mate::P7).is_none());
        }
    }

    #[test]
    fn genotype_alleles_are_distinct() {
        let mut rng = StdRng::seed_from_u64(36);
        let config = SimulationConfig::default();
        let model = MutationModel::new("locus", template(60, 50, 30), &config, 3, &mut rng).unwrap();
        for _ in 0..500 {
            let (a, b) = model.get_random_genotype(&mut rng);
            assert_ne!(a, b);
            assert_ne!(model.get_random_allele(true, &mut rng), COMMON_ALLELE);
        }
    }

    #[test]
    fn p5_allele_preferred_when_available() {
        let mut rng = StdRng::seed_from_u64(37);
        let config = config_with("snp=1.0");
        let model = MutationModel::new("locus", template(60, 50, 30), &config, 8, &mut rng).unwrap();
        for _ in 0..200 {
            let id = model.get_random_allele_p5(true, &mut rng);
            if model.alleles().iter().any(|a| a.has_p5_mutation) {
                assert!(model.allele(id).has_p5_mutation);
            }
        }
    }
}
