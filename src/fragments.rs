//! Genomic fragments a locus is built from, either random or read from FASTA.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bio::io::fasta;
use rand::Rng;

use crate::error::Result;
use crate::sequence::random_seq;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub seq: Vec<u8>,
}

pub enum FragmentSource {
    Random {
        length: usize,
        gc_content: f64,
        excluded_motifs: Vec<Vec<u8>>,
        created: usize,
    },
    Fasta {
        records: fasta::Records<BufReader<File>>,
        min_length: usize,
        skipped: usize,
    },
}

impl FragmentSource {
    pub fn random(length: usize, gc_content: f64, excluded_motifs: Vec<Vec<u8>>) -> FragmentSource {
        FragmentSource::Random {
            length,
            gc_content,
            excluded_motifs,
            created: 0,
        }
    }

    /// Fragments from a FASTA file. Records shorter than `min_length` are skipped.
    pub fn from_fasta<P: AsRef<Path>>(path: P, min_length: usize) -> Result<FragmentSource> {
        let reader = fasta::Reader::new(File::open(path)?);
        Ok(FragmentSource::Fasta {
            records: reader.records(),
            min_length,
            skipped: 0,
        })
    }

    /// Number of FASTA records skipped for being too short.
    pub fn skipped(&self) -> usize {
        match self {
            FragmentSource::Random { .. } => 0,
            FragmentSource::Fasta { skipped, .. } => *skipped,
        }
    }

    /// Next fragment, `None` once a FASTA source is exhausted.
    pub fn next_fragment<R: Rng>(&mut self, rng: &mut R) -> Result<Option<Fragment>> {
        match self {
            FragmentSource::Random {
                length,
                gc_content,
                excluded_motifs,
                created,
            } => {
                let seq = random_seq(*length, *gc_content, excluded_motifs, rng)?;
                *created += 1;
                Ok(Some(Fragment {
                    name: format!("locus_{}", created),
                    seq,
                }))
            }
            FragmentSource::Fasta {
                records,
                min_length,
                skipped,
            } => {
                for record in records.by_ref() {
                    let record = record?;
                    if record.seq().len() < *min_length {
                        *skipped += 1;
                        warn!(
                            "skipping fasta record {} of length {}, at least {} bases are needed",
                            record.id(),
                            record.seq().len(),
                            min_length
                        );
                        continue;
                    }
                    let seq = record.seq().to_ascii_uppercase();
                    return Ok(Some(Fragment {
                        name: record.id().to_string(),
                        seq,
                    }));
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn random_source_never_runs_dry() {
        let mut rng = StdRng::seed_from_u64(61);
        let mut source = FragmentSource::random(300, 0.5, vec![b"GTAC".to_vec()]);
        for i in 1..=5 {
            let fragment = source.next_fragment(&mut rng).unwrap().unwrap();
            assert_eq!(fragment.seq.len(), 300);
            assert_eq!(fragment.name, format!("locus_{}", i));
        }
    }

    #[test]
    fn fasta_source_skips_short_records_and_ends() {
        let mut rng = StdRng::seed_from_u64(62);
        let path = std::env::temp_dir().join(format!("ddrage_fragments_{}.fa", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, ">long1\n{}", "acgt".repeat(20)).unwrap();
            writeln!(file, ">short\nACGT").unwrap();
            writeln!(file, ">long2\n{}", "TTGA".repeat(20)).unwrap();
        }
        let mut source = FragmentSource::from_fasta(&path, 50).unwrap();
        let first = source.next_fragment(&mut rng).unwrap().unwrap();
        assert_eq!(first.name, "long1");
        assert_eq!(&first.seq[..4], b"ACGT");
        let second = source.next_fragment(&mut rng).unwrap().unwrap();
        assert_eq!(second.name, "long2");
        assert!(source.next_fragment(&mut rng).unwrap().is_none());
        assert_eq!(source.skipped(), 1);
        std::fs::remove_file(&path).unwrap();
    }
}
