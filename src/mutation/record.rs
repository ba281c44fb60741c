use std::fmt;
use std::rc::Rc;

use crate::config::Label;
use crate::reads::Mate;

/// Which null allele variant a mate carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NaKind {
    Alternative,
    Dropout,
}

impl fmt::Display for NaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaKind::Alternative => write!(f, "NA_alternative"),
            NaKind::Dropout => write!(f, "NA_dropout"),
        }
    }
}

/// Mutation types that can be drawn when a new allele is grown.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutationKind {
    Snp,
    Insertion,
    Deletion,
    P5NaAlternative,
    P7NaAlternative,
    P5NaDropout,
    P7NaDropout,
}

impl Label for MutationKind {
    fn label(&self) -> &'static str {
        match self {
            MutationKind::Snp => "snp",
            MutationKind::Insertion => "insertion",
            MutationKind::Deletion => "deletion",
            MutationKind::P5NaAlternative => "p5 na alternative",
            MutationKind::P7NaAlternative => "p7 na alternative",
            MutationKind::P5NaDropout => "p5 na dropout",
            MutationKind::P7NaDropout => "p7 na dropout",
        }
    }

    fn all() -> &'static [Self] {
        &[
            MutationKind::Snp,
            MutationKind::Insertion,
            MutationKind::Deletion,
            MutationKind::P5NaAlternative,
            MutationKind::P7NaAlternative,
            MutationKind::P5NaDropout,
            MutationKind::P7NaDropout,
        ]
    }
}

impl MutationKind {
    pub fn null_allele(mate: Mate, kind: NaKind) -> MutationKind {
        match (mate, kind) {
            (Mate::P5, NaKind::Alternative) => MutationKind::P5NaAlternative,
            (Mate::P5, NaKind::Dropout) => MutationKind::P5NaDropout,
            (Mate::P7, NaKind::Alternative) => MutationKind::P7NaAlternative,
            (Mate::P7, NaKind::Dropout) => MutationKind::P7NaDropout,
        }
    }

    /// Both null allele types of one mate.
    pub fn null_alleles_of(mate: Mate) -> [MutationKind; 2] {
        [
            MutationKind::null_allele(mate, NaKind::Alternative),
            MutationKind::null_allele(mate, NaKind::Dropout),
        ]
    }

    pub fn as_null_allele(&self) -> Option<(Mate, NaKind)> {
        match self {
            MutationKind::P5NaAlternative => Some((Mate::P5, NaKind::Alternative)),
            MutationKind::P5NaDropout => Some((Mate::P5, NaKind::Dropout)),
            MutationKind::P7NaAlternative => Some((Mate::P7, NaKind::Alternative)),
            MutationKind::P7NaDropout => Some((Mate::P7, NaKind::Dropout)),
            _ => None,
        }
    }

    /// Whether this type needs unmutated positions on the genomic sequence.
    pub fn needs_positions(&self) -> bool {
        matches!(self, MutationKind::Snp | MutationKind::Insertion | MutationKind::Deletion)
    }
}

/// One mutation of an allele, relative to the common allele.
/// Positions are 0-based on the genomic part of the mate, before any indel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Snp {
        mate: Mate,
        pos: usize,
        base_from: u8,
        base_to: u8,
    },
    Insert {
        mate: Mate,
        pos: usize,
        seq: Vec<u8>,
    },
    Deletion {
        mate: Mate,
        pos: usize,
        length: usize,
        /// filled in once the deletion was applied to a read
        deleted_seq: Option<Vec<u8>>,
    },
    P5NullAlleleAlt {
        seq: Rc<Vec<u8>>,
    },
    P7NullAlleleAlt {
        seq: Rc<Vec<u8>>,
    },
    P5NullAlleleDropout,
    P7NullAlleleDropout,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Snp { .. } => MutationKind::Snp,
            Mutation::Insert { .. } => MutationKind::Insertion,
            Mutation::Deletion { .. } => MutationKind::Deletion,
            Mutation::P5NullAlleleAlt { .. } => MutationKind::P5NaAlternative,
            Mutation::P7NullAlleleAlt { .. } => MutationKind::P7NaAlternative,
            Mutation::P5NullAlleleDropout => MutationKind::P5NaDropout,
            Mutation::P7NullAlleleDropout => MutationKind::P7NaDropout,
        }
    }

    pub fn mate(&self) -> Mate {
        match self {
            Mutation::Snp { mate, .. } | Mutation::Insert { mate, .. } | Mutation::Deletion { mate, .. } => *mate,
            Mutation::P5NullAlleleAlt { .. } | Mutation::P5NullAlleleDropout => Mate::P5,
            Mutation::P7NullAlleleAlt { .. } | Mutation::P7NullAlleleDropout => Mate::P7,
        }
    }

    /// Start position on the genomic sequence, `None` for null alleles.
    pub fn position(&self) -> Option<usize> {
        match self {
            Mutation::Snp { pos, .. } | Mutation::Insert { pos, .. } | Mutation::Deletion { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    /// Positions this mutation blocks for further mutations.
    pub fn occupied_positions(&self) -> std::ops::Range<usize> {
        match self {
            Mutation::Snp { pos, .. } | Mutation::Insert { pos, .. } => *pos..*pos + 1,
            Mutation::Deletion { pos, length, .. } => *pos..*pos + *length,
            _ => 0..0,
        }
    }

    pub fn null_allele(&self) -> Option<(Mate, NaKind)> {
        self.kind().as_null_allele()
    }

    pub fn is_indel(&self) -> bool {
        matches!(self, Mutation::Insert { .. } | Mutation::Deletion { .. })
    }

    /// Change in sequence length when applied.
    pub fn length_delta(&self) -> isize {
        match self {
            Mutation::Insert { seq, .. } => seq.len() as isize,
            Mutation::Deletion { length, .. } => -(*length as isize),
            _ => 0,
        }
    }

    fn priority(&self) -> u8 {
        match self {
            Mutation::Snp { .. } => 0,
            Mutation::Insert { .. } | Mutation::Deletion { .. } => 1,
            _ => 2,
        }
    }

    /// SNPs first, then indels, then null alleles; each by mate and position.
    pub fn sort_key(&self) -> (u8, Mate, usize) {
        (self.priority(), self.mate(), self.position().unwrap_or(0))
    }

    /// Annotation in the ground truth grammar. `offset` is added to the
    /// genomic position to obtain the position in the read.
    pub fn annotation_entry(&self, offset: isize) -> String {
        let read_pos = |pos: &usize| (*pos as isize + offset).max(0);
        match self {
            Mutation::Snp {
                mate,
                pos,
                base_from,
                base_to,
            } => format!(
                "{}@{}({}):{}>{}",
                mate,
                read_pos(pos),
                pos,
                *base_from as char,
                *base_to as char
            ),
            Mutation::Insert { mate, pos, seq } => {
                format!("{}@{}({}):+{}", mate, read_pos(pos), pos, String::from_utf8_lossy(seq))
            }
            Mutation::Deletion {
                mate,
                pos,
                length,
                deleted_seq,
            } => match deleted_seq {
                Some(seq) => format!("{}@{}({}):-{}", mate, read_pos(pos), pos, String::from_utf8_lossy(seq)),
                None => format!("{}@{}({}):-{}", mate, read_pos(pos), pos, length),
            },
            _ => match self.null_allele() {
                Some((mate, kind)) => format!("{}:{}", mate, kind),
                None => String::new(),
            },
        }
    }
}

/// Offset of every mutation at the moment it is applied: the net length
/// change of all indels on the same mate that precede it in `mutations`.
/// `mutations` must be sorted by `Mutation::sort_key`.
pub fn running_indel_offsets(mutations: &[Mutation]) -> Vec<isize> {
    mutations
        .iter()
        .scan([0isize; 2], |offsets, mutation| {
            let slot = mutation.mate().index();
            let before = offsets[slot];
            offsets[slot] += mutation.length_delta();
            Some(before)
        })
        .collect()
}

/// Net length change of all indels on `mate` that start before `pos`.
pub fn indel_shift(mutations: &[Mutation], mate: Mate, pos: usize) -> isize {
    mutations
        .iter()
        .filter(|m| m.is_indel() && m.mate() == mate)
        .filter(|m| m.position().map_or(false, |p| p < pos))
        .map(|m| m.length_delta())
        .sum()
}
