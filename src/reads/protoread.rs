use std::rc::Rc;

use rand::seq::index;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::reads::Mate;
use crate::sequence::{resolve_ambiguous, substitute_base};

/// Everything in front of the genomic sequence of one mate. The buffers are
/// shared between all reads of an individual until a read mutates them.
#[derive(Debug, Clone, Default)]
pub struct AuxSegments {
    pub barcode: Rc<Vec<u8>>,
    pub spacer: Rc<Vec<u8>>,
    pub dbr: Rc<Vec<u8>>,
    pub overhang: Rc<Vec<u8>>,
}

impl AuxSegments {
    pub fn new(barcode: &[u8], spacer: &[u8], dbr: &[u8], overhang: &[u8]) -> AuxSegments {
        AuxSegments {
            barcode: Rc::new(barcode.to_vec()),
            spacer: Rc::new(spacer.to_vec()),
            dbr: Rc::new(dbr.to_vec()),
            overhang: Rc::new(overhang.to_vec()),
        }
    }

    pub fn len(&self) -> usize {
        self.barcode.len() + self.spacer.len() + self.dbr.len() + self.overhang.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One half of a read pair: barcode, spacer, DBR (p7 only), overhang and the
/// genomic sequence. The total length equals `read_length` after `fix_length`.
#[derive(Debug, Clone)]
pub struct ProtoRead {
    mate: Mate,
    read_length: usize,
    aux: AuxSegments,
    genomic: Rc<Vec<u8>>,
    /// genomic bases pushed out of the read because this individual's
    /// auxiliary sequences are longer than the shortest at the locus
    spacer_spare: Rc<Vec<u8>>,
    /// genomic bases behind the locus window, shared by all individuals
    locus_spare: Rc<Vec<u8>>,
    seq_errors: Vec<usize>,
}

impl ProtoRead {
    pub fn new(
        mate: Mate,
        read_length: usize,
        aux: AuxSegments,
        genomic: Vec<u8>,
        spacer_spare: Vec<u8>,
        locus_spare: Rc<Vec<u8>>,
    ) -> ProtoRead {
        ProtoRead {
            mate,
            read_length,
            aux,
            genomic: Rc::new(genomic),
            spacer_spare: Rc::new(spacer_spare),
            locus_spare,
            seq_errors: Vec::new(),
        }
    }

    pub fn mate(&self) -> Mate {
        self.mate
    }

    pub fn read_length(&self) -> usize {
        self.read_length
    }

    pub fn aux(&self) -> &AuxSegments {
        &self.aux
    }

    pub fn aux_length(&self) -> usize {
        self.aux.len()
    }

    pub fn genomic(&self) -> &[u8] {
        &self.genomic
    }

    pub fn seq_errors(&self) -> &[usize] {
        &self.seq_errors
    }

    /// Number of genomic bases that fit behind the auxiliary sequences.
    pub fn genomic_target_length(&self) -> usize {
        self.read_length.saturating_sub(self.aux_length())
    }

    pub fn total_length(&self) -> usize {
        self.aux_length() + self.genomic.len()
    }

    pub fn joined(&self) -> Vec<u8> {
        let mut seq = Vec::with_capacity(self.total_length());
        seq.extend_from_slice(&self.aux.barcode);
        seq.extend_from_slice(&self.aux.spacer);
        seq.extend_from_slice(&self.aux.dbr);
        seq.extend_from_slice(&self.aux.overhang);
        seq.extend_from_slice(&self.genomic);
        seq
    }

    pub fn apply_snp(&mut self, pos: usize, base_from: u8, base_to: u8) {
        let genomic = Rc::make_mut(&mut self.genomic);
        debug_assert_eq!(genomic[pos], base_from, "snp does not match the template base");
        genomic[pos] = base_to;
    }

    pub fn apply_insertion(&mut self, pos: usize, seq: &[u8]) {
        let genomic = Rc::make_mut(&mut self.genomic);
        let pos = pos.min(genomic.len());
        genomic.splice(pos..pos, seq.iter().copied());
    }

    /// Remove `length` bases starting at `pos` and return them.
    pub fn apply_deletion(&mut self, pos: usize, length: usize) -> Vec<u8> {
        let genomic = Rc::make_mut(&mut self.genomic);
        let start = pos.min(genomic.len());
        let end = (pos + length).min(genomic.len());
        genomic.drain(start..end).collect()
    }

    /// Replace the whole genomic sequence by a null allele alternative.
    pub fn apply_na(&mut self, seq: &[u8]) {
        let target = self.genomic_target_length().min(seq.len());
        self.genomic = Rc::new(seq[..target].to_vec());
    }

    /// Replace the genomic sequence, used for incomplete digestion reads.
    pub fn replace_genomic(&mut self, seq: Vec<u8>) {
        self.genomic = Rc::new(seq);
    }

    /// Restore `total_length() == read_length` after indels. Overlong reads
    /// lose their 3' end; short reads are filled from the spacer spare first
    /// and the locus spare second, so that individuals sharing a locus agree
    /// wherever their sequences overlap.
    ///
    /// Returns the number of bases that had to be padded with `N` because both
    /// spares ran dry.
    pub fn fix_length(&mut self) -> usize {
        let target = self.genomic_target_length();
        let current = self.genomic.len();
        if current == target {
            return 0;
        }
        let genomic = Rc::make_mut(&mut self.genomic);
        if current > target {
            genomic.truncate(target);
            return 0;
        }
        let missing = target - current;
        genomic.extend(
            self.spacer_spare
                .iter()
                .chain(self.locus_spare.iter())
                .take(missing)
                .copied(),
        );
        let padded = target - genomic.len();
        if padded > 0 {
            warn!(
                "{} spare sequence exhausted, padding {} bases with N",
                self.mate, padded
            );
            genomic.resize(target, b'N');
        }
        padded
    }

    /// Resolve the ambiguity codes of the DBR.
    pub fn finalize_dbr<R: Rng>(&mut self, rng: &mut R) {
        if !self.aux.dbr.is_empty() {
            self.aux.dbr = Rc::new(resolve_ambiguous(&self.aux.dbr, rng));
        }
    }

    fn base_mut(&mut self, pos: usize) -> Option<&mut u8> {
        let mut pos = pos;
        let segments = [
            &mut self.aux.barcode,
            &mut self.aux.spacer,
            &mut self.aux.dbr,
            &mut self.aux.overhang,
            &mut self.genomic,
        ];
        for segment in segments {
            if pos < segment.len() {
                return Rc::make_mut(segment).get_mut(pos);
            }
            pos -= segment.len();
        }
        None
    }

    /// Substitute a Poisson(length * p) number of distinct, uniformly chosen
    /// positions by a different base. Returns the positions that were hit.
    pub fn add_seq_errors<R: Rng>(&mut self, prob_per_base: f64, rng: &mut R) -> Vec<usize> {
        let length = self.total_length();
        if length == 0 || prob_per_base <= 0.0 {
            return Vec::new();
        }
        let expected = length as f64 * prob_per_base;
        let nr_errors = match Poisson::new(expected) {
            Ok(poisson) => (poisson.sample(rng) as usize).min(length),
            Err(_) => 0,
        };
        let mut positions = index::sample(rng, length, nr_errors).into_vec();
        positions.sort_unstable();
        for pos in positions.iter() {
            let new_base = match self.base_mut(*pos) {
                Some(base) => substitute_base(*base, rng),
                None => continue,
            };
            if let Some(base) = self.base_mut(*pos) {
                *base = new_base;
            }
        }
        self.seq_errors.extend(positions.iter().copied());
        self.seq_errors.sort_unstable();
        positions
    }
}
