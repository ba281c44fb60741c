//! Parser for the mutation annotation grammar written to FASTQ headers and the
//! ground truth, e.g. `p5@54(33):A>T`, `p7@12(3):+GA`, `p5@40(19):-CTT`,
//! `p5:NA_alternative`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::mutation::record::{Mutation, NaKind};
use crate::reads::Mate;

/// Separator between annotations in a read's `mutations:'...'` entry.
pub const ANNOTATION_SEPARATOR: &str = ";";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAnnotation {
    Snp {
        mate: Mate,
        read_pos: usize,
        pos: usize,
        base_from: u8,
        base_to: u8,
    },
    Insertion {
        mate: Mate,
        read_pos: usize,
        pos: usize,
        seq: Vec<u8>,
    },
    Deletion {
        mate: Mate,
        read_pos: usize,
        pos: usize,
        length: usize,
        seq: Option<Vec<u8>>,
    },
    NullAllele {
        mate: Mate,
        kind: NaKind,
    },
}

fn positional_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(p5|p7)@(\d+)\((\d+)\):(?:([ACGTN])>([ACGTN])|\+([ACGTN]+)|-(\d+|[ACGTN]+))$")
            .expect("static regex is valid")
    })
}

fn null_allele_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(p5|p7):NA_(alternative|dropout)$").expect("static regex is valid"))
}

fn parse_mate(text: &str) -> Mate {
    if text == "p5" {
        Mate::P5
    } else {
        Mate::P7
    }
}

fn parse_number(text: &str, annotation: &str) -> Result<usize> {
    text.parse::<usize>()
        .map_err(|_| Error::InvalidAnnotation(annotation.to_string()))
}

/// Parse a single annotation entry.
pub fn parse_annotation(annotation: &str) -> Result<ParsedAnnotation> {
    let annotation = annotation.trim();
    if let Some(caps) = null_allele_regex().captures(annotation) {
        let kind = if &caps[2] == "alternative" {
            NaKind::Alternative
        } else {
            NaKind::Dropout
        };
        return Ok(ParsedAnnotation::NullAllele {
            mate: parse_mate(&caps[1]),
            kind,
        });
    }

    let caps = positional_regex()
        .captures(annotation)
        .ok_or_else(|| Error::InvalidAnnotation(annotation.to_string()))?;
    let mate = parse_mate(&caps[1]);
    let read_pos = parse_number(&caps[2], annotation)?;
    let pos = parse_number(&caps[3], annotation)?;

    if let (Some(from), Some(to)) = (caps.get(4), caps.get(5)) {
        return Ok(ParsedAnnotation::Snp {
            mate,
            read_pos,
            pos,
            base_from: from.as_str().as_bytes()[0],
            base_to: to.as_str().as_bytes()[0],
        });
    }
    if let Some(seq) = caps.get(6) {
        return Ok(ParsedAnnotation::Insertion {
            mate,
            read_pos,
            pos,
            seq: seq.as_str().as_bytes().to_vec(),
        });
    }
    let deleted = caps
        .get(7)
        .ok_or_else(|| Error::InvalidAnnotation(annotation.to_string()))?
        .as_str();
    match deleted.parse::<usize>() {
        Ok(length) => Ok(ParsedAnnotation::Deletion {
            mate,
            read_pos,
            pos,
            length,
            seq: None,
        }),
        Err(_) => Ok(ParsedAnnotation::Deletion {
            mate,
            read_pos,
            pos,
            length: deleted.len(),
            seq: Some(deleted.as_bytes().to_vec()),
        }),
    }
}

/// Parse a `;` separated list of annotations, as stored in read meta info.
pub fn parse_annotation_list(text: &str) -> Result<Vec<ParsedAnnotation>> {
    text.split(ANNOTATION_SEPARATOR)
        .filter(|x| !x.trim().is_empty())
        .map(parse_annotation)
        .collect()
}

impl ParsedAnnotation {
    /// Whether this annotation describes `mutation`. Read positions are not
    /// part of a mutation and are ignored.
    pub fn describes(&self, mutation: &Mutation) -> bool {
        match (self, mutation) {
            (
                ParsedAnnotation::Snp {
                    mate,
                    pos,
                    base_from,
                    base_to,
                    ..
                },
                Mutation::Snp {
                    mate: m,
                    pos: p,
                    base_from: f,
                    base_to: t,
                },
            ) => mate == m && pos == p && base_from == f && base_to == t,
            (ParsedAnnotation::Insertion { mate, pos, seq, .. }, Mutation::Insert { mate: m, pos: p, seq: s }) => {
                mate == m && pos == p && seq == s
            }
            (
                ParsedAnnotation::Deletion {
                    mate, pos, length, seq, ..
                },
                Mutation::Deletion {
                    mate: m,
                    pos: p,
                    length: l,
                    deleted_seq,
                },
            ) => mate == m && pos == p && length == l && (seq.is_none() || seq == deleted_seq),
            (ParsedAnnotation::NullAllele { mate, kind }, other) => other.null_allele() == Some((*mate, *kind)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn parse_snp() {
        assert_eq!(
            parse_annotation("p5@54(33):A>T").unwrap(),
            ParsedAnnotation::Snp {
                mate: Mate::P5,
                read_pos: 54,
                pos: 33,
                base_from: b'A',
                base_to: b'T',
            }
        );
    }

    #[test]
    fn parse_indels() {
        assert_eq!(
            parse_annotation("p7@14(4):+GGA").unwrap(),
            ParsedAnnotation::Insertion {
                mate: Mate::P7,
                read_pos: 14,
                pos: 4,
                seq: b"GGA".to_vec(),
            }
        );
        assert_eq!(
            parse_annotation("p5@7(7):-3").unwrap(),
            ParsedAnnotation::Deletion {
                mate: Mate::P5,
                read_pos: 7,
                pos: 7,
                length: 3,
                seq: None,
            }
        );
        assert_eq!(
            parse_annotation("p5@7(7):-CTA").unwrap(),
            ParsedAnnotation::Deletion {
                mate: Mate::P5,
                read_pos: 7,
                pos: 7,
                length: 3,
                seq: Some(b"CTA".to_vec()),
            }
        );
    }

    #[test]
    fn parse_null_alleles() {
        assert_eq!(
            parse_annotation("p7:NA_dropout").unwrap(),
            ParsedAnnotation::NullAllele {
                mate: Mate::P7,
                kind: NaKind::Dropout,
            }
        );
        assert!(parse_annotation("p5:NA_alternative")
            .unwrap()
            .describes(&Mutation::P5NullAlleleAlt {
                seq: Rc::new(b"ACGT".to_vec())
            }));
    }

    #[test]
    fn reject_garbage() {
        assert!(parse_annotation("p6@1(1):A>T").is_err());
        assert!(parse_annotation("p5@1(1):A>").is_err());
        assert!(parse_annotation("p5:NA").is_err());
    }

    #[test]
    fn entries_reproduce_mutations() {
        let mutations = vec![
            Mutation::Snp {
                mate: Mate::P7,
                pos: 12,
                base_from: b'G',
                base_to: b'C',
            },
            Mutation::Insert {
                mate: Mate::P5,
                pos: 3,
                seq: b"TTG".to_vec(),
            },
            Mutation::Deletion {
                mate: Mate::P5,
                pos: 40,
                length: 2,
                deleted_seq: Some(b"AC".to_vec()),
            },
        ];
        let text = mutations
            .iter()
            .map(|m| m.annotation_entry(17))
            .collect::<Vec<String>>()
            .join(ANNOTATION_SEPARATOR);
        let parsed = parse_annotation_list(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        for (p, m) in parsed.iter().zip(mutations.iter()) {
            assert!(p.describes(m), "{:?} does not describe {:?}", p, m);
        }
    }
}
