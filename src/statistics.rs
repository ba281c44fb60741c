use std::collections::BTreeMap;

use crate::rad_locus::RadLocus;

/// Counts collected over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStatistics {
    pub loci_requested: usize,
    pub loci_created: usize,
    pub events: BTreeMap<String, usize>,
    pub normal_reads: usize,
    pub pcr_copies: usize,
    pub id_reads: usize,
    pub seq_errors: usize,
    pub singleton_reads: usize,
    pub hrl_reads: usize,
    pub alleles: usize,
}

impl SimulationStatistics {
    pub fn new(loci_requested: usize) -> SimulationStatistics {
        SimulationStatistics {
            loci_requested,
            ..Default::default()
        }
    }

    /// Add the summary of a simulated locus.
    pub fn add_locus(&mut self, locus: &RadLocus) {
        let summary = locus.summary();
        self.loci_created += 1;
        self.normal_reads += summary.normal_reads;
        self.pcr_copies += summary.pcr_copies;
        self.id_reads += summary.id_reads;
        self.seq_errors += summary.seq_errors;
        self.alleles += summary.nr_alleles;
        for (event, count) in summary.events.iter() {
            *self.events.entry(event.clone()).or_insert(0) += count;
        }
    }

    pub fn total_reads(&self) -> usize {
        self.normal_reads + self.pcr_copies + self.id_reads + self.singleton_reads + self.hrl_reads
    }

    pub fn log(&self) {
        if self.loci_created < self.loci_requested {
            warn!(
                "created {} of {} requested loci",
                self.loci_created, self.loci_requested
            );
        }
        info!("loci: {}, alleles: {}", self.loci_created, self.alleles);
        for (event, count) in self.events.iter() {
            info!("individuals with event {}: {}", event, count);
        }
        info!(
            "reads: {} total, {} normal, {} PCR copies, {} incomplete digestion, {} singletons, {} HRL",
            self.total_reads(),
            self.normal_reads,
            self.pcr_copies,
            self.id_reads,
            self.singleton_reads,
            self.hrl_reads
        );
        info!("sequencing errors: {}", self.seq_errors);
    }
}
