//! Target matching, ranking and slot booking.
//!
//! A [`Broker`] is used in cycles:
//!
//! 1. [`Broker::prefilter_targets`] keeps the targets a job can run on
//! 2. [`Broker::best_target`] ranks them and selects the top one
//! 3. [`Broker::register_job_submission`] books the job against the selection
//!
//! Booking mutates the broker's own copy of the targets, so later selections
//! in the same session see the capacity already consumed.

pub mod filter;
pub mod ranking;

pub use ranking::{Benchmark, FreeSlots, RankerKind, ShortestQueue, TargetRanker};

use crate::config::ClientConfig;
use crate::resource::{ExecutionTarget, JobDescription};

/// Result of one booking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Booking {
    /// Free slots were converted to used slots.
    Reserved,
    /// The selection was already booked; the job was counted as waiting.
    Queued,
    /// The selected target did not have enough free slots. Nothing changed.
    Rejected,
    /// There is no current selection to book against.
    NoSelection,
}

#[derive(Debug)]
struct Selection {
    index: usize,
    booked: bool,
}

#[derive(Debug)]
pub struct Broker {
    ranker: Box<dyn TargetRanker>,
    job: JobDescription,
    possible: Vec<ExecutionTarget>,
    selection: Option<Selection>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(Box::new(FreeSlots))
    }
}

impl Broker {
    pub fn new(ranker: Box<dyn TargetRanker>) -> Self {
        Self {
            ranker,
            job: JobDescription::default(),
            possible: Vec::new(),
            selection: None,
        }
    }

    pub fn with_kind(kind: &RankerKind) -> Self {
        Self::new(kind.build())
    }

    /// Broker ranking with the policy `config` names.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_kind(&config.ranker)
    }

    /// Policy string of the active ranker, e.g. `benchmark:specint2000`.
    pub fn ranker_name(&self) -> &str {
        self.ranker.name()
    }

    /// Keep the targets `job` can run on, skipping any whose endpoint URL is
    /// listed in `reject_urls`. Replaces the previous candidate set and
    /// clears the current selection.
    pub fn prefilter_targets<S: AsRef<str>>(
        &mut self,
        targets: &[ExecutionTarget],
        job: &JobDescription,
        reject_urls: &[S],
    ) -> &[ExecutionTarget] {
        self.job = job.clone();
        self.selection = None;
        self.possible = targets
            .iter()
            .filter(|t| match filter::accepts(t, job, reject_urls) {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(
                        target_url = t.url(),
                        queue = %t.computing_share.name,
                        %reason,
                        "Target rejected"
                    );
                    false
                }
            })
            .cloned()
            .collect();

        tracing::debug!(
            candidates = targets.len(),
            possible = self.possible.len(),
            "Targets prefiltered"
        );
        &self.possible
    }

    pub fn possible_targets(&self) -> &[ExecutionTarget] {
        &self.possible
    }

    /// Rank the candidates and select the best one. Every call starts a new
    /// selection, so the next booking reserves free slots again.
    pub fn best_target(&mut self) -> Option<&ExecutionTarget> {
        if self.possible.is_empty() {
            self.selection = None;
            return None;
        }
        self.ranker.rank(&mut self.possible, &self.job);
        self.selection = Some(Selection {
            index: 0,
            booked: false,
        });

        let best = &self.possible[0];
        tracing::debug!(
            target_url = best.url(),
            queue = %best.computing_share.name,
            ranker = self.ranker.name(),
            "Best target selected"
        );
        Some(best)
    }

    /// The currently selected target, if any.
    pub fn selected(&self) -> Option<&ExecutionTarget> {
        self.selection
            .as_ref()
            .and_then(|s| self.possible.get(s.index))
    }

    /// Book the job's slots against the current selection.
    pub fn register_job_submission(&mut self) -> Booking {
        let slots = self.job.slots();
        let Some(selection) = self.selection.as_mut() else {
            return Booking::NoSelection;
        };
        let Some(target) = self.possible.get_mut(selection.index) else {
            return Booking::NoSelection;
        };
        let share = &mut target.computing_share;

        if selection.booked {
            share.waiting_jobs += slots;
            tracing::debug!(
                target_url = %target.computing_endpoint.url,
                waiting_jobs = share.waiting_jobs,
                "Repeated submission queued behind booked slots"
            );
            return Booking::Queued;
        }

        if share.free_slots < slots {
            tracing::warn!(
                target_url = %target.computing_endpoint.url,
                free_slots = share.free_slots,
                requested = slots,
                "Not enough free slots to book"
            );
            return Booking::Rejected;
        }

        share.free_slots -= slots;
        share.used_slots += slots;
        selection.booked = true;
        Booking::Reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_without_selection() {
        let mut broker = Broker::default();
        assert_eq!(broker.register_job_submission(), Booking::NoSelection);

        let targets = [ExecutionTarget::new("https://ce/")];
        broker.prefilter_targets::<&str>(&targets, &JobDescription::default(), &[]);
        // Prefiltering alone does not select.
        assert_eq!(broker.register_job_submission(), Booking::NoSelection);
    }

    #[test]
    fn ranker_follows_config() {
        assert_eq!(Broker::from_config(&ClientConfig::default()).ranker_name(), "free-slots");

        let config = ClientConfig::default()
            .with_ranker(RankerKind::Benchmark("specint2000".to_string()));
        assert_eq!(Broker::from_config(&config).ranker_name(), "benchmark:specint2000");
    }

    #[test]
    fn best_target_on_empty_set() {
        let mut broker = Broker::default();
        broker.prefilter_targets::<&str>(&[], &JobDescription::default(), &[]);
        assert!(broker.best_target().is_none());
        assert!(broker.selected().is_none());
    }

    #[test]
    fn new_selection_rearms_booking() {
        let mut broker = Broker::default();
        let target = ExecutionTarget::new("https://ce/").with_slots(10, 0, 0);
        broker.prefilter_targets::<&str>(&[target], &JobDescription::default(), &[]);

        broker.best_target();
        assert_eq!(broker.register_job_submission(), Booking::Reserved);
        assert_eq!(broker.register_job_submission(), Booking::Queued);

        broker.best_target();
        assert_eq!(broker.register_job_submission(), Booking::Reserved);

        let share = &broker.possible_targets()[0].computing_share;
        assert_eq!(share.free_slots, 8);
        assert_eq!(share.used_slots, 2);
        assert_eq!(share.waiting_jobs, 1);
    }
}
