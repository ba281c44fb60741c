//! Where finished reads and the ground truth go.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use bio::io::fastq;

use crate::error::Result;
use crate::rad_locus::LocusGroundTruth;
use crate::reads::FastqEntry;

pub trait ReadSink {
    fn write_pair(&mut self, p5: &FastqEntry, p7: &FastqEntry) -> Result<()>;

    /// Append the ground truth of one locus.
    fn write_ground_truth(&mut self, locus: &str, entry: &LocusGroundTruth) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// FASTQ files for both mates and an append-only YAML ground truth. Every
/// locus becomes one top level key, so a run aborted halfway leaves the
/// loci written so far intact.
pub struct FileSink {
    p5: fastq::Writer<File>,
    p7: Option<fastq::Writer<File>>,
    ground_truth: BufWriter<File>,
    paths: Vec<PathBuf>,
}

impl FileSink {
    /// Creates `{prefix}_1.fastq`, `{prefix}_2.fastq` (unless `single_end`)
    /// and `{prefix}_gt.yaml`.
    pub fn create(prefix: &str, single_end: bool) -> Result<FileSink> {
        let p5_path = PathBuf::from(format!("{}_1.fastq", prefix));
        let p7_path = PathBuf::from(format!("{}_2.fastq", prefix));
        let gt_path = PathBuf::from(format!("{}_gt.yaml", prefix));

        let p5 = fastq::Writer::new(File::create(&p5_path)?);
        let p7 = if single_end {
            None
        } else {
            Some(fastq::Writer::new(File::create(&p7_path)?))
        };
        let ground_truth = BufWriter::new(File::create(&gt_path)?);

        let mut paths = vec![p5_path];
        if !single_end {
            paths.push(p7_path);
        }
        paths.push(gt_path);
        info!("writing reads to {:?}", paths);
        Ok(FileSink {
            p5,
            p7,
            ground_truth,
            paths,
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

fn write_entry<W: Write>(writer: &mut fastq::Writer<W>, entry: &FastqEntry) -> Result<()> {
    let description = if entry.description.is_empty() {
        None
    } else {
        Some(entry.description.as_str())
    };
    writer.write(&entry.name, description, &entry.seq, &entry.qual)?;
    Ok(())
}

impl ReadSink for FileSink {
    fn write_pair(&mut self, p5: &FastqEntry, p7: &FastqEntry) -> Result<()> {
        write_entry(&mut self.p5, p5)?;
        if let Some(writer) = self.p7.as_mut() {
            write_entry(writer, p7)?;
        }
        Ok(())
    }

    fn write_ground_truth(&mut self, locus: &str, entry: &LocusGroundTruth) -> Result<()> {
        let mut document = BTreeMap::new();
        document.insert(locus, entry);
        let text = serde_yaml::to_string(&document)?;
        self.ground_truth.write_all(text.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.p5.flush()?;
        if let Some(writer) = self.p7.as_mut() {
            writer.flush()?;
        }
        self.ground_truth.flush()?;
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub pairs: Vec<(FastqEntry, FastqEntry)>,
    pub ground_truth: Vec<(String, LocusGroundTruth)>,
}

impl ReadSink for MemorySink {
    fn write_pair(&mut self, p5: &FastqEntry, p7: &FastqEntry) -> Result<()> {
        self.pairs.push((p5.clone(), p7.clone()));
        Ok(())
    }

    fn write_ground_truth(&mut self, locus: &str, entry: &LocusGroundTruth) -> Result<()> {
        self.ground_truth.push((locus.to_string(), entry.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rad_locus::IndividualAlleleEntry;
    use std::fs;
    use std::path::Path;

    fn remove_files(paths: &[PathBuf]) {
        for path in paths {
            fs::remove_file(path).unwrap();
        }
    }

    fn entry(name: &str) -> FastqEntry {
        FastqEntry {
            name: name.to_string(),
            description: "individual:'Individual 1'".to_string(),
            seq: b"ACGT".to_vec(),
            qual: b"IIII".to_vec(),
        }
    }

    fn truth() -> LocusGroundTruth {
        let mut alleles = BTreeMap::new();
        alleles.insert(
            "allele 1".to_string(),
            IndividualAlleleEntry {
                cov: 12,
                mutations: vec!["p5@20(5):A>G".to_string()],
            },
        );
        let mut individuals = BTreeMap::new();
        individuals.insert("Individual 1".to_string(), alleles);
        LocusGroundTruth {
            p5_seq: "ACGT".to_string(),
            p7_seq: "TTGA".to_string(),
            coverage: 12,
            allele_frequencies: BTreeMap::new(),
            allele_coverages: BTreeMap::new(),
            id_reads: 0,
            individuals,
        }
    }

    #[test]
    fn file_sink_writes_fastq_and_yaml() {
        let prefix = std::env::temp_dir()
            .join(format!("ddrage_output_{}", std::process::id()))
            .to_string_lossy()
            .into_owned();
        let mut sink = FileSink::create(&prefix, false).unwrap();
        sink.write_pair(&entry("locus_1_0"), &entry("locus_1_0")).unwrap();
        sink.write_ground_truth("locus_1", &truth()).unwrap();
        sink.write_ground_truth("locus_2", &truth()).unwrap();
        sink.finish().unwrap();

        let p5 = fs::read_to_string(format!("{}_1.fastq", prefix)).unwrap();
        assert_eq!(p5, "@locus_1_0 individual:'Individual 1'\nACGT\n+\nIIII\n");
        let yaml = fs::read_to_string(format!("{}_gt.yaml", prefix)).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["locus_2"]["p5 seq"].as_str(), Some("ACGT"));
        assert_eq!(
            parsed["locus_1"]["individuals"]["Individual 1"]["allele 1"]["cov"].as_u64(),
            Some(12)
        );
        remove_files(sink.paths());
    }

    #[test]
    fn single_end_skips_p7() {
        let prefix = std::env::temp_dir()
            .join(format!("ddrage_single_{}", std::process::id()))
            .to_string_lossy()
            .into_owned();
        let sink = FileSink::create(&prefix, true).unwrap();
        assert_eq!(sink.paths().len(), 2);
        assert!(!Path::new(&format!("{}_2.fastq", prefix)).exists());
        remove_files(sink.paths());
    }
}
