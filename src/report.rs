use log::info;
use walk_common::{FinalReport, Snapshot};

/// Receives the coordinator's per-generation snapshots and the final report.
pub trait ReportSink {
    fn on_snapshot(&mut self, snapshot: &Snapshot);
    fn on_finish(&mut self, report: &FinalReport);
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        (**self).on_snapshot(snapshot);
    }

    fn on_finish(&mut self, report: &FinalReport) {
        (**self).on_finish(report);
    }
}

/// Writes every event to the log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        info!(
            "Distribution of particles on generation {}: {:?} (total {})",
            snapshot.generation, snapshot.cell_counts, snapshot.total_particles
        );
    }

    fn on_finish(&mut self, report: &FinalReport) {
        info!(
            "Final distribution of particles after {} generations: {:?}",
            report.generations, report.final_cell_counts
        );
        info!("Execution time: {:.3} seconds", report.elapsed_seconds);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    snapshots: Vec<Snapshot>,
    final_report: Option<FinalReport>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn final_report(&self) -> Option<&FinalReport> {
        self.final_report.as_ref()
    }
}

impl ReportSink for RecordingSink {
    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        self.snapshots.push(snapshot.clone());
    }

    fn on_finish(&mut self, report: &FinalReport) {
        self.final_report = Some(report.clone());
    }
}

/// Forwards every event to two sinks, in order.
#[derive(Debug, Default, Clone)]
pub struct TeeSink<A, B>(pub A, pub B);

impl<A: ReportSink, B: ReportSink> ReportSink for TeeSink<A, B> {
    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        self.0.on_snapshot(snapshot);
        self.1.on_snapshot(snapshot);
    }

    fn on_finish(&mut self, report: &FinalReport) {
        self.0.on_finish(report);
        self.1.on_finish(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_forwards_to_both_sinks() {
        let mut tee = TeeSink(RecordingSink::new(), RecordingSink::new());
        tee.on_snapshot(&Snapshot::new(1, vec![2, 1]));
        tee.on_finish(&FinalReport {
            final_cell_counts: vec![2, 1],
            generations: 1,
            elapsed_seconds: 0.5,
        });

        for sink in [&tee.0, &tee.1] {
            assert_eq!(sink.snapshots().len(), 1);
            assert_eq!(sink.snapshots()[0].total_particles, 3);
            assert_eq!(sink.final_report().map(|r| r.generations), Some(1));
        }
    }
}
