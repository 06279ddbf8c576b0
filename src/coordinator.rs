use log::{debug, error, info, trace};
use std::time::Instant;

use crate::error::WalkResult;
use crate::lattice::Lattice;
use crate::report::ReportSink;
use crate::tracker::GenerationTracker;
use crate::worker::CancelOnPanic;
use walk_common::{FinalReport, ReportingPolicy, RunParams, Snapshot};

/// Coordinator states, one barrier cycle per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Waiting for every particle to finish the current generation.
    Collecting,
    /// All particles done; applying the reporting policy.
    Reporting,
    /// Resetting completion flags and waking the workers.
    Releasing,
    /// Generation limit reached.
    Done,
}

/// Decides when a generation is complete, reports it and releases the workers.
pub struct Coordinator<'a, S: ReportSink + ?Sized> {
    params: &'a RunParams,
    lattice: &'a Lattice,
    tracker: &'a GenerationTracker,
    sink: &'a mut S,
    state: CoordinatorState,
    /// Number of generations released so far.
    generation: u32,
    started: Instant,
    last_reported_second: u64,
}

impl<'a, S: ReportSink + ?Sized> Coordinator<'a, S> {
    pub fn new(
        params: &'a RunParams,
        lattice: &'a Lattice,
        tracker: &'a GenerationTracker,
        sink: &'a mut S,
        started: Instant,
    ) -> Self {
        Self {
            params,
            lattice,
            tracker,
            sink,
            state: CoordinatorState::Collecting,
            generation: 0,
            started,
            last_reported_second: 0,
        }
    }

    /// Runs barrier cycles until the generation limit and returns the final report.
    ///
    /// Any failure cancels the run, which wakes and stops every worker.
    pub fn run(mut self) -> WalkResult<FinalReport> {
        let _guard = CancelOnPanic(self.tracker);
        let result = self.drive();
        if let Err(e) = &result {
            if !e.is_cancelled() {
                error!("Coordinator halted in generation {}: {}", self.generation + 1, e);
            }
            self.tracker.cancel();
        }
        result
    }

    fn drive(&mut self) -> WalkResult<FinalReport> {
        loop {
            let next = match self.state {
                CoordinatorState::Collecting => {
                    if self.generation >= self.params.generation_limit {
                        CoordinatorState::Done
                    } else {
                        self.tracker.wait_all_arrived(self.params.generation_timeout)?;
                        CoordinatorState::Reporting
                    }
                }
                CoordinatorState::Reporting => {
                    self.report_generation(self.generation + 1)?;
                    CoordinatorState::Releasing
                }
                CoordinatorState::Releasing => {
                    self.generation = self.tracker.release()?;
                    debug!("Released generation {}/{}", self.generation, self.params.generation_limit);
                    CoordinatorState::Collecting
                }
                CoordinatorState::Done => return self.finish(),
            };
            trace!("Coordinator {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Checks conservation for a completed generation and reports it if the policy allows.
    fn report_generation(&mut self, generation: u32) -> WalkResult<()> {
        let deliver = match self.params.reporting {
            ReportingPolicy::EveryGeneration { delay } => {
                if !delay.is_zero() {
                    self.tracker.cancellation().sleep(delay)?;
                }
                true
            }
            ReportingPolicy::OncePerSecond => {
                let elapsed_second = self.started.elapsed().as_secs();
                if elapsed_second > self.last_reported_second {
                    self.last_reported_second = elapsed_second;
                    true
                } else {
                    false
                }
            }
        };

        let snapshot = self.take_snapshot(generation)?;
        if deliver {
            self.sink.on_snapshot(&snapshot);
        } else {
            trace!("Skipping report for generation {}", generation);
        }
        Ok(())
    }

    fn take_snapshot(&self, generation: u32) -> WalkResult<Snapshot> {
        let cell_counts = self.lattice.snapshot()?;
        self.lattice.verify_conservation(generation, &cell_counts)?;
        Ok(Snapshot::new(generation, cell_counts))
    }

    fn finish(&mut self) -> WalkResult<FinalReport> {
        let final_cell_counts = self.lattice.snapshot()?;
        self.lattice.verify_conservation(self.generation, &final_cell_counts)?;

        let report = FinalReport {
            final_cell_counts,
            generations: self.generation,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        };
        info!(
            "Reached {} generations in {:.3} seconds.",
            report.generations, report.elapsed_seconds
        );
        self.sink.on_finish(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::error::WalkError;
    use crate::report::RecordingSink;
    use std::thread;
    use std::time::Duration;

    fn params(particles: usize, generations: u32, reporting: ReportingPolicy) -> RunParams {
        RunParams {
            lattice_length: 3,
            particle_count: particles,
            move_probability: 0.5,
            generation_limit: generations,
            reporting,
            generation_timeout: Duration::from_secs(5),
            seed: None,
        }
    }

    const EVERY: ReportingPolicy = ReportingPolicy::EveryGeneration { delay: Duration::ZERO };

    /// Arrives for every particle index from one thread, one generation at a time.
    fn arrive_all(tracker: &GenerationTracker, particles: usize, generations: u32) -> WalkResult<()> {
        thread::scope(|scope| {
            for generation in 1..=generations {
                let handles: Vec<_> = (0..particles)
                    .map(|i| scope.spawn(move || tracker.arrive(i)))
                    .collect();
                for handle in handles {
                    let epoch = handle.join().expect("arrival thread panicked")?;
                    assert_eq!(epoch, generation);
                }
            }
            Ok(())
        })
    }

    #[test]
    fn reports_every_generation_then_finishes() {
        let params = params(2, 3, EVERY);
        let lattice = Lattice::from_params(&params).unwrap();
        let tracker = GenerationTracker::new(2, CancellationToken::new());
        let mut sink = RecordingSink::new();

        let report = thread::scope(|scope| {
            let arrivals = scope.spawn(|| arrive_all(&tracker, 2, 3));
            let report = Coordinator::new(&params, &lattice, &tracker, &mut sink, Instant::now()).run();
            arrivals.join().unwrap().unwrap();
            report
        })
        .unwrap();

        let generations: Vec<u32> = sink.snapshots().iter().map(|s| s.generation).collect();
        assert_eq!(generations, vec![1, 2, 3]);
        assert!(sink.snapshots().iter().all(|s| s.total_particles == 2));
        assert_eq!(report.generations, 3);
        assert_eq!(report.final_cell_counts, vec![2, 0, 0]);
        assert_eq!(sink.final_report(), Some(&report));
        assert_eq!(tracker.epoch().unwrap(), 3);
    }

    #[test]
    fn once_per_second_skips_fast_generations() {
        let params = params(1, 5, ReportingPolicy::OncePerSecond);
        let lattice = Lattice::from_params(&params).unwrap();
        let tracker = GenerationTracker::new(1, CancellationToken::new());
        let mut sink = RecordingSink::new();

        thread::scope(|scope| {
            let arrivals = scope.spawn(|| arrive_all(&tracker, 1, 5));
            Coordinator::new(&params, &lattice, &tracker, &mut sink, Instant::now())
                .run()
                .unwrap();
            arrivals.join().unwrap().unwrap();
        });

        // Five instant generations all fall within the first wall-clock second.
        assert!(sink.snapshots().is_empty());
        assert_eq!(sink.final_report().map(|r| r.generations), Some(5));
    }

    /// Records the elapsed whole second at which each snapshot was delivered.
    struct TimedSink {
        started: Instant,
        delivered: Vec<(u64, u32)>,
        finished: bool,
    }

    impl ReportSink for TimedSink {
        fn on_snapshot(&mut self, snapshot: &Snapshot) {
            self.delivered.push((self.started.elapsed().as_secs(), snapshot.generation));
        }

        fn on_finish(&mut self, _report: &FinalReport) {
            self.finished = true;
        }
    }

    #[test]
    fn once_per_second_reports_each_new_second_once() {
        let params = params(1, 6, ReportingPolicy::OncePerSecond);
        let lattice = Lattice::from_params(&params).unwrap();
        let tracker = GenerationTracker::new(1, CancellationToken::new());
        let started = Instant::now();
        let mut sink = TimedSink { started, delivered: Vec::new(), finished: false };

        thread::scope(|scope| {
            let arrivals = scope.spawn(|| {
                for generation in 1..=6 {
                    thread::sleep(Duration::from_millis(250));
                    assert_eq!(tracker.arrive(0)?, generation);
                }
                Ok::<_, WalkError>(())
            });
            Coordinator::new(&params, &lattice, &tracker, &mut sink, started)
                .run()
                .unwrap();
            arrivals.join().unwrap().unwrap();
        });

        // Six generations 250 ms apart cross into the second second at least once.
        assert!(sink.finished);
        assert!(!sink.delivered.is_empty());
        assert!(sink.delivered.iter().all(|&(second, _)| second >= 1));
        for pair in sink.delivered.windows(2) {
            assert!(pair[0].0 < pair[1].0, "two reports in second {}", pair[0].0);
            assert!(pair[0].1 < pair[1].1);
        }
    }

    #[test]
    fn conservation_fault_halts_the_barrier() {
        let params = params(2, 4, EVERY);
        let lattice = Lattice::from_params(&params).unwrap();
        let tracker = GenerationTracker::new(2, CancellationToken::new());
        let mut sink = RecordingSink::new();
        lattice.corrupt_cell(1, 5);

        let (result, arrivals) = thread::scope(|scope| {
            let arrivals = scope.spawn(|| arrive_all(&tracker, 2, 4));
            let result = Coordinator::new(&params, &lattice, &tracker, &mut sink, Instant::now()).run();
            (result, arrivals.join().unwrap())
        });

        match result {
            Err(WalkError::InvariantViolation { generation, cell_counts, .. }) => {
                assert_eq!(generation, 1);
                assert_eq!(cell_counts, vec![2, 5, 0]);
            }
            other => panic!("expected invariant violation, got {:?}", other),
        }
        assert!(matches!(arrivals, Err(WalkError::Cancelled)));
        assert!(sink.snapshots().is_empty());
        assert!(sink.final_report().is_none());
        assert_eq!(tracker.epoch().unwrap(), 0);
    }

    #[test]
    fn missing_worker_times_out() {
        let mut params = params(2, 1, EVERY);
        params.generation_timeout = Duration::from_millis(50);
        let lattice = Lattice::from_params(&params).unwrap();
        let tracker = GenerationTracker::new(2, CancellationToken::new());
        let mut sink = RecordingSink::new();

        let result = thread::scope(|scope| {
            // Only particle 0 ever shows up.
            let lonely = scope.spawn(|| tracker.arrive(0));
            let result = Coordinator::new(&params, &lattice, &tracker, &mut sink, Instant::now()).run();
            assert!(matches!(lonely.join().unwrap(), Err(WalkError::Cancelled)));
            result
        });

        assert!(matches!(
            result,
            Err(WalkError::GenerationTimeout { generation: 1, expected: 2, .. })
        ));
        assert!(tracker.cancellation().is_cancelled());
    }
}
