use std::rc::Rc;

use rand::Rng;

use crate::mutation::record::{indel_shift, running_indel_offsets, Mutation};
use crate::mutation::ANNOTATION_SEPARATOR;
use crate::reads::{Mate, ProtoRead};

/// Meta info marker of PCR duplicates.
pub const PCR_COPY_MARKER: &str = "type:'PCR copy'";

/// A FASTQ record ready to be handed to a writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqEntry {
    pub name: String,
    pub description: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// A read pair of one individual together with everything that happened to it.
///
/// `meta_info` accumulates a human readable record of every operation (allele,
/// mutations, PCR copies, sequencing errors) and ends up in the FASTQ header.
#[derive(Debug, Clone)]
pub struct RadRead {
    pub p5: ProtoRead,
    pub p7: ProtoRead,
    pub individual_name: Rc<str>,
    pub meta_info: Vec<String>,
}

impl RadRead {
    pub fn new(p5: ProtoRead, p7: ProtoRead, individual_name: Rc<str>) -> RadRead {
        RadRead {
            p5,
            p7,
            individual_name,
            meta_info: Vec::new(),
        }
    }

    pub fn protoread(&self, mate: Mate) -> &ProtoRead {
        match mate {
            Mate::P5 => &self.p5,
            Mate::P7 => &self.p7,
        }
    }

    pub fn protoread_mut(&mut self, mate: Mate) -> &mut ProtoRead {
        match mate {
            Mate::P5 => &mut self.p5,
            Mate::P7 => &mut self.p7,
        }
    }

    /// Copy that shares all sequence buffers with `self`.
    pub fn shallow_copy(&self) -> RadRead {
        self.clone()
    }

    pub fn pcr_copy(&self) -> RadRead {
        let mut copy = self.shallow_copy();
        copy.meta_info.push(PCR_COPY_MARKER.to_string());
        copy
    }

    pub fn is_pcr_copy(&self) -> bool {
        self.meta_info.iter().any(|m| m == PCR_COPY_MARKER)
    }

    pub fn finalize_dbr<R: Rng>(&mut self, rng: &mut R) {
        self.p5.finalize_dbr(rng);
        self.p7.finalize_dbr(rng);
    }

    /// Add sequencing errors to both mates and note their positions.
    pub fn add_seq_errors<R: Rng>(&mut self, prob_per_base: f64, rng: &mut R) -> usize {
        let mut total = 0;
        for mate in Mate::BOTH {
            let positions = self.protoread_mut(mate).add_seq_errors(prob_per_base, rng);
            if !positions.is_empty() {
                total += positions.len();
                let joined = positions.iter().map(|p| p.to_string()).collect::<Vec<String>>().join(",");
                self.meta_info.push(format!("{}_seq_errors:'{}'", mate, joined));
            }
        }
        total
    }

    pub fn is_length_consistent(&self) -> bool {
        self.p5.total_length() == self.p5.read_length() && self.p7.total_length() == self.p7.read_length()
    }

    /// Apply all mutations of an allele to this read and return their
    /// annotations.
    ///
    /// SNPs go first, then indels in position order with a running offset per
    /// mate, then null allele alternatives which replace the whole mate. Deleted
    /// sequences are written back into the mutations so that annotations carry
    /// the exact bases. Mutations hidden by a null allele alternative or pushed
    /// out of the read by upstream insertions are not annotated.
    pub fn apply_mutations(&mut self, mutations: &mut [Mutation], allele_name: &str) -> Vec<String> {
        mutations.sort_by_key(|m| m.sort_key());

        for mutation in mutations.iter() {
            if let Mutation::Snp {
                mate,
                pos,
                base_from,
                base_to,
            } = mutation
            {
                self.protoread_mut(*mate).apply_snp(*pos, *base_from, *base_to);
            }
        }

        let offsets = running_indel_offsets(mutations);
        for (mutation, offset) in mutations.iter_mut().zip(offsets.into_iter()) {
            match mutation {
                Mutation::Insert { mate, pos, seq } => {
                    let shifted = (*pos as isize + offset).max(0) as usize;
                    self.protoread_mut(*mate).apply_insertion(shifted, seq);
                }
                Mutation::Deletion {
                    mate,
                    pos,
                    length,
                    deleted_seq,
                } => {
                    let shifted = (*pos as isize + offset).max(0) as usize;
                    *deleted_seq = Some(self.protoread_mut(*mate).apply_deletion(shifted, *length));
                }
                _ => {}
            }
        }

        let mut overridden = [false; 2];
        for mutation in mutations.iter() {
            match mutation {
                Mutation::P5NullAlleleAlt { seq } | Mutation::P7NullAlleleAlt { seq } => {
                    let mate = mutation.mate();
                    self.protoread_mut(mate).apply_na(seq);
                    overridden[mate.index()] = true;
                }
                _ => {}
            }
        }

        self.p5.fix_length();
        self.p7.fix_length();

        let annotations = mutations
            .iter()
            .filter_map(|mutation| {
                let mate = mutation.mate();
                let pos = match mutation.position() {
                    None => return Some(mutation.annotation_entry(0)),
                    Some(pos) => pos,
                };
                if overridden[mate.index()] {
                    return None;
                }
                let shift = indel_shift(mutations, mate, pos);
                let protoread = self.protoread(mate);
                if pos as isize + shift >= protoread.genomic_target_length() as isize {
                    return None;
                }
                Some(mutation.annotation_entry(protoread.aux_length() as isize + shift))
            })
            .collect::<Vec<String>>();

        self.meta_info.push(format!("allele:'{}'", allele_name));
        if !annotations.is_empty() {
            self.meta_info
                .push(format!("mutations:'{}'", annotations.join(ANNOTATION_SEPARATOR)));
        }
        annotations
    }

    /// Replace the genomic sequence of one mate by the sequence behind an
    /// uncut restriction site.
    pub fn make_incomplete_digestion(&mut self, mate: Mate, seq: Vec<u8>) {
        let protoread = self.protoread_mut(mate);
        let target = protoread.genomic_target_length();
        let mut seq = seq;
        seq.truncate(target);
        protoread.replace_genomic(seq);
        protoread.fix_length();

        // annotations of the replaced mate no longer describe the read
        let replaced = mate.to_string();
        for meta in self.meta_info.iter_mut() {
            let kept = match meta.strip_prefix("mutations:'").and_then(|x| x.strip_suffix('\'')) {
                Some(list) => list
                    .split(ANNOTATION_SEPARATOR)
                    .filter(|entry| !entry.starts_with(&replaced))
                    .collect::<Vec<&str>>()
                    .join(ANNOTATION_SEPARATOR),
                None => continue,
            };
            *meta = if kept.is_empty() {
                String::new()
            } else {
                format!("mutations:'{}'", kept)
            };
        }
        self.meta_info.retain(|m| !m.is_empty());
        self.meta_info.push(format!("type:'incomplete digestion' id_mate:'{}'", mate));
    }

    /// FASTQ records for both mates. The p7 barcode is not part of the read,
    /// it is reported in the header when several p7 barcodes are in use.
    pub fn fastq_entries(
        &self,
        name: &str,
        p5_qual: Vec<u8>,
        p7_qual: Vec<u8>,
        p7_barcode: Option<&[u8]>,
    ) -> (FastqEntry, FastqEntry) {
        let mut description = format!("individual:'{}'", self.individual_name);
        if let Some(barcode) = p7_barcode {
            description.push_str(&format!(" p7_bc:'{}'", String::from_utf8_lossy(barcode)));
        }
        for meta in self.meta_info.iter() {
            description.push(' ');
            description.push_str(meta);
        }
        let p5 = FastqEntry {
            name: name.to_string(),
            description: description.clone(),
            seq: self.p5.joined(),
            qual: p5_qual,
        };
        let p7 = FastqEntry {
            name: name.to_string(),
            description,
            seq: self.p7.joined(),
            qual: p7_qual,
        };
        (p5, p7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::parse_annotation_list;
    use crate::reads::AuxSegments;

    fn read() -> RadRead {
        let p5 = ProtoRead::new(
            Mate::P5,
            30,
            AuxSegments::new(b"ACGTAC", b"A", b"", b"TGCAT"),
            b"AAAACCCCGGGGTTTTAC".to_vec(),
            vec![],
            Rc::new(b"GATTACAGATTACAGATTACA".to_vec()),
        );
        let p7 = ProtoRead::new(
            Mate::P7,
            30,
            AuxSegments::new(b"", b"", b"NNNNMM", b"TAC"),
            b"TTTTGGGGCCCCAAAATTTTG".to_vec(),
            vec![],
            Rc::new(b"CCCCCCCCCCCCCCCCCCCC".to_vec()),
        );
        RadRead::new(p5, p7, Rc::from("Individual 1"))
    }

    #[test]
    fn mixed_indels_keep_read_length() {
        let mut read = read();
        let mut mutations = vec![
            Mutation::Deletion {
                mate: Mate::P5,
                pos: 8,
                length: 3,
                deleted_seq: None,
            },
            Mutation::Insert {
                mate: Mate::P5,
                pos: 2,
                seq: b"TT".to_vec(),
            },
            Mutation::Snp {
                mate: Mate::P5,
                pos: 0,
                base_from: b'A',
                base_to: b'G',
            },
            Mutation::Insert {
                mate: Mate::P7,
                pos: 1,
                seq: b"AAAAA".to_vec(),
            },
        ];
        let annotations = read.apply_mutations(&mut mutations, "allele 1");
        assert!(read.is_length_consistent());
        assert_eq!(read.p5.genomic(), b"GATTAACCCCGTTTTACG");
        assert_eq!(
            annotations,
            vec![
                "p5@12(0):A>G".to_string(),
                "p5@14(2):+TT".to_string(),
                "p5@22(8):-GGG".to_string(),
                "p7@10(1):+AAAAA".to_string(),
            ]
        );
        assert_eq!(read.p5.joined()[12], b'G');
        assert_eq!(&read.p7.joined()[10..15], b"AAAAA");
    }

    #[test]
    fn annotations_round_trip() {
        let mut read = read();
        let mut mutations = vec![
            Mutation::Snp {
                mate: Mate::P7,
                pos: 5,
                base_from: b'G',
                base_to: b'A',
            },
            Mutation::Deletion {
                mate: Mate::P7,
                pos: 0,
                length: 2,
                deleted_seq: None,
            },
        ];
        read.apply_mutations(&mut mutations, "allele 2");
        let meta = read
            .meta_info
            .iter()
            .find_map(|m| m.strip_prefix("mutations:'").and_then(|x| x.strip_suffix('\'')))
            .unwrap();
        let parsed = parse_annotation_list(meta).unwrap();
        assert_eq!(parsed.len(), 2);
        for mutation in mutations.iter() {
            assert!(parsed.iter().any(|p| p.describes(mutation)));
        }
        // the snp moved two bases to the left
        assert_eq!(read.p7.joined()[9 + 3], b'A');
    }

    #[test]
    fn null_allele_alternative_hides_other_mutations() {
        let mut read = read();
        let mut mutations = vec![
            Mutation::Snp {
                mate: Mate::P5,
                pos: 0,
                base_from: b'A',
                base_to: b'C',
            },
            Mutation::P5NullAlleleAlt {
                seq: Rc::new(vec![b'G'; 40]),
            },
        ];
        let annotations = read.apply_mutations(&mut mutations, "allele 1");
        assert_eq!(annotations, vec!["p5:NA_alternative".to_string()]);
        assert!(read.p5.genomic().iter().all(|b| *b == b'G'));
        assert!(read.is_length_consistent());
    }

    #[test]
    fn pcr_copies_are_tagged() {
        let read = read();
        let copy = read.pcr_copy();
        assert!(copy.is_pcr_copy());
        assert!(!read.is_pcr_copy());
        assert_eq!(copy.p5.joined(), read.p5.joined());
    }

    #[test]
    fn fastq_entries_carry_meta_info() {
        let mut read = read();
        read.meta_info.push("allele:'common'".to_string());
        let (p5, p7) = read.fastq_entries("locus_1:0", vec![b'I'; 30], vec![b'I'; 30], Some(b"TTAGGC"));
        assert_eq!(p5.seq.len(), 30);
        assert_eq!(p7.seq.len(), 30);
        assert_eq!(p5.description, "individual:'Individual 1' p7_bc:'TTAGGC' allele:'common'");
        assert_eq!(p5.name, p7.name);
    }

    #[test]
    fn incomplete_digestion_replaces_genomic() {
        let mut read = read();
        read.make_incomplete_digestion(Mate::P7, vec![b'T'; 40]);
        assert!(read.p7.genomic().iter().all(|b| *b == b'T'));
        assert!(read.is_length_consistent());
    }

    #[test]
    fn incomplete_digestion_drops_annotations_of_replaced_mate() {
        let mut read = read();
        let mut mutations = vec![
            Mutation::Snp {
                mate: Mate::P5,
                pos: 2,
                base_from: b'A',
                base_to: b'G',
            },
            Mutation::Snp {
                mate: Mate::P7,
                pos: 5,
                base_from: b'G',
                base_to: b'A',
            },
        ];
        let annotations = read.apply_mutations(&mut mutations, "allele 3");
        assert_eq!(annotations.len(), 2);

        let mut p7_replaced = read.shallow_copy();
        p7_replaced.make_incomplete_digestion(Mate::P7, vec![b'T'; 40]);
        let meta = p7_replaced
            .meta_info
            .iter()
            .find_map(|m| m.strip_prefix("mutations:'").and_then(|x| x.strip_suffix('\'')))
            .unwrap();
        assert_eq!(meta, annotations[0]);
        assert!(meta.starts_with("p5"));
        assert!(p7_replaced.meta_info.contains(&"allele:'allele 3'".to_string()));

        let mut both = p7_replaced.shallow_copy();
        both.make_incomplete_digestion(Mate::P5, vec![b'C'; 40]);
        assert!(!both.meta_info.iter().any(|m| m.starts_with("mutations:")));
    }
}
