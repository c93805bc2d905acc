use crate::config::ExperimentConfig;
use crate::placement::build_array;
use crate::schedule::{build_schedule, PlannedTrial};
use crate::session::SessionInfo;
use crate::stimuli::StimulusSet;
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use visex_core::{ImageStimulus, Phase, Placement, ResponseKey, TrialRecord, TrialState};
use visex_timing::Timer;

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    SpacePressed,
    ResponseReceived(ResponseKey),
    TrialComplete,
    PhaseComplete,
}

/// Running aggregates shown on the debrief screen.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub trials: usize,
    pub correct: usize,
    pub timeouts: usize,
    rt_sum_ms: f64,
    rt_count: usize,
}

impl SessionSummary {
    pub fn accuracy(&self) -> Option<f64> {
        (self.trials > 0).then(|| self.correct as f64 / self.trials as f64)
    }

    pub fn mean_rt_ms(&self) -> Option<f64> {
        (self.rt_count > 0).then(|| self.rt_sum_ms / self.rt_count as f64)
    }
}

/// One trial in flight.
struct ActiveTrial {
    planned: PlannedTrial,
    array: Vec<Placement<ImageStimulus>>,
    state: TrialState,
    started_at_unix: u64,
    fixation_start_ns: u64,
    search_start_ns: Option<u64>,
    feedback_start_ns: Option<u64>,
    response: Option<(ResponseKey, u64)>,
    timed_out: bool,
}

pub struct ExperimentStateMachine<P, T, R>
where
    P: Phase,
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub phase: P,
    pub timer: T,
    rng: R,
    config: ExperimentConfig,
    session: SessionInfo,
    stimuli: StimulusSet,
    schedule: Vec<PlannedTrial>,
    position: usize,
    current: Option<ActiveTrial>,
    pending_records: Vec<TrialRecord>,
    summary: SessionSummary,
}

impl<P, T, R> ExperimentStateMachine<P, T, R>
where
    P: Phase,
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(
        config: ExperimentConfig,
        session: SessionInfo,
        stimuli: StimulusSet,
        timer: T,
        mut rng: R,
    ) -> Self {
        let schedule = build_schedule(&config.blocks, &mut rng);
        info!(
            trials = schedule.len(),
            blocks = config.blocks.len(),
            subject = %session.subject,
            "session scheduled"
        );
        Self {
            phase: P::default(),
            timer,
            rng,
            config,
            session,
            stimuli,
            schedule,
            position: 0,
            current: None,
            pending_records: Vec::new(),
            summary: SessionSummary::default(),
        }
    }

    fn advance_phase(&mut self) -> bool {
        if let Some(next) = self.phase.next() {
            debug!(?next, "phase advanced");
            self.phase = next;
            true
        } else {
            false
        }
    }

    fn start_trial(&mut self) {
        let Some(planned) = self.schedule.get(self.position).cloned() else {
            return;
        };
        let block = &self.config.blocks[planned.block];
        let array = build_array(&self.stimuli, block, planned.target_present, &mut self.rng);
        let now_ns = self.timer.now();
        let started_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        debug!(
            block = planned.block,
            trial = planned.trial,
            target_present = planned.target_present,
            set_size = block.set_size,
            "trial started"
        );

        self.current = Some(ActiveTrial {
            planned,
            array,
            state: TrialState::Fixation,
            started_at_unix,
            fixation_start_ns: now_ns,
            search_start_ns: None,
            feedback_start_ns: None,
            response: None,
            timed_out: false,
        });
    }

    /// Poll trial timing. Called once per frame by the host loop.
    pub fn update(&mut self) -> Vec<ExperimentEvent> {
        let mut events = Vec::new();

        if self.phase.is_search() {
            self.update_trial(&mut events);
            if self.current.is_none() && self.position >= self.schedule.len() {
                events.push(ExperimentEvent::PhaseComplete);
            }
        }

        events
    }

    pub fn handle_event(&mut self, event: ExperimentEvent) -> bool {
        match (&self.phase, &event) {
            // Welcome screen dismissed: enter the first block
            (phase, ExperimentEvent::SpacePressed) if phase.is_welcome() => {
                if self.advance_phase() {
                    self.start_trial();
                    true
                } else {
                    false
                }
            }

            (phase, ExperimentEvent::ResponseReceived(key)) if phase.allows_response() => {
                self.record_response(*key)
            }

            (phase, ExperimentEvent::TrialComplete) if phase.is_search() => {
                self.complete_current_trial();
                true
            }

            (_, ExperimentEvent::PhaseComplete) => self.advance_phase(),

            _ => false,
        }
    }

    fn update_trial(&mut self, events: &mut Vec<ExperimentEvent>) {
        let now_ns = self.timer.now();
        let Some(trial) = &mut self.current else {
            return;
        };
        let block = &self.config.blocks[trial.planned.block];

        match trial.state {
            TrialState::Fixation => {
                if now_ns - trial.fixation_start_ns >= block.fixation_ms * 1_000_000 {
                    trial.state = TrialState::Search;
                    trial.search_start_ns = Some(now_ns);
                    debug!(at_ns = now_ns, "array onset");
                }
            }
            TrialState::Search => {
                let Some(timeout_ms) = block.response_timeout_ms else {
                    return;
                };
                if let Some(start_ns) = trial.search_start_ns {
                    if now_ns - start_ns >= timeout_ms * 1_000_000 {
                        trial.timed_out = true;
                        trial.state = TrialState::Feedback;
                        trial.feedback_start_ns = Some(now_ns);
                        debug!(at_ns = now_ns, "response deadline missed");
                    }
                }
            }
            TrialState::Feedback => {
                if let Some(start_ns) = trial.feedback_start_ns {
                    if now_ns - start_ns >= block.feedback_ms * 1_000_000 {
                        trial.state = TrialState::Complete;
                        events.push(ExperimentEvent::TrialComplete);
                    }
                }
            }
            TrialState::Complete => {}
        }
    }

    /// Record a speeded response; only valid while the array is up.
    pub fn record_response(&mut self, key: ResponseKey) -> bool {
        let now_ns = self.timer.now();
        let Some(trial) = &mut self.current else {
            return false;
        };
        if trial.state != TrialState::Search {
            return false;
        }
        let Some(start_ns) = trial.search_start_ns else {
            return false;
        };

        let rt_ns = now_ns - start_ns;
        trial.response = Some((key, rt_ns));
        trial.state = TrialState::Feedback;
        trial.feedback_start_ns = Some(now_ns);
        debug!(rt_ms = rt_ns as f64 / 1e6, ?key, "response recorded");
        true
    }

    /// Finalize the finished trial into a record and move on.
    fn complete_current_trial(&mut self) {
        if let Some(trial) = self.current.take() {
            let record = self.finalize(&trial);
            self.summary.trials += 1;
            if record.correct {
                self.summary.correct += 1;
            }
            if record.timed_out {
                self.summary.timeouts += 1;
            }
            if let Some(rt) = record.response_time_ms {
                self.summary.rt_sum_ms += rt;
                self.summary.rt_count += 1;
            }
            self.pending_records.push(record);
        }

        self.position += 1;
        self.timer
            .sleep(Duration::from_millis(self.config.intertrial_ms));

        if self.position < self.schedule.len() {
            self.start_trial();
        }
    }

    fn finalize(&self, trial: &ActiveTrial) -> TrialRecord {
        let block = &self.config.blocks[trial.planned.block];
        let correct = trial
            .response
            .map(|(key, _)| key.is_correct_for(trial.planned.target_present))
            .unwrap_or(false);

        TrialRecord {
            subject: self.session.subject.clone(),
            age: self.session.age,
            gender: self.session.gender.clone(),
            run: self.session.run,
            block: trial.planned.block,
            trial: trial.planned.trial,
            set_size: block.set_size,
            radius: block.radius,
            fixation_ms: block.fixation_ms,
            feedback_ms: block.feedback_ms,
            response_timeout_ms: block.response_timeout_ms,
            rotated: block.rotate,
            target_present: trial.planned.target_present,
            timestamp: trial.started_at_unix,
            response_time_ms: trial.response.map(|(_, rt_ns)| rt_ns as f64 / 1e6),
            correct,
            key: trial.response.map(|(key, _)| match key {
                ResponseKey::TargetPresent => self.config.target_present_key,
                ResponseKey::TargetAbsent => self.config.target_absent_key,
            }),
            timed_out: trial.timed_out,
        }
    }

    /// Records finalized since the last call, for immediate persistence.
    pub fn drain_new_records(&mut self) -> Vec<TrialRecord> {
        std::mem::take(&mut self.pending_records)
    }

    pub fn current_phase(&self) -> &P {
        &self.phase
    }

    pub fn current_trial_state(&self) -> Option<&TrialState> {
        self.current.as_ref().map(|t| &t.state)
    }

    /// The search array of the running trial, if one is up.
    pub fn current_array(&self) -> Option<&[Placement<ImageStimulus>]> {
        self.current.as_ref().map(|t| t.array.as_slice())
    }

    pub fn should_show_fixation(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| t.state == TrialState::Fixation)
    }

    pub fn should_show_array(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| t.state == TrialState::Search)
    }

    pub fn should_show_feedback(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| t.state == TrialState::Feedback)
    }

    /// Whether the feedback mark should be the tick.
    pub fn feedback_correct(&self) -> Option<bool> {
        let trial = self.current.as_ref()?;
        if trial.state != TrialState::Feedback {
            return None;
        }
        Some(
            trial
                .response
                .map(|(key, _)| key.is_correct_for(trial.planned.target_present))
                .unwrap_or(false),
        )
    }

    /// (1-based current trial, total trials) while the session runs.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.phase
            .is_search()
            .then(|| ((self.position + 1).min(self.schedule.len()), self.schedule.len()))
    }

    pub fn current_block(&self) -> Option<usize> {
        self.current.as_ref().map(|t| t.planned.block)
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_debrief()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use visex_core::{BlockConfig, SessionPhase, Stimulus};
    use visex_timing::ManualTimer;

    type Machine = ExperimentStateMachine<SessionPhase, ManualTimer, StdRng>;

    fn stimulus_set() -> StimulusSet {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::create_dir(dir.path().join("distractor")).unwrap();
        std::fs::write(dir.path().join("target").join("t.png"), b"x").unwrap();
        for i in 0..3 {
            std::fs::write(
                dir.path().join("distractor").join(format!("d{i}.png")),
                b"x",
            )
            .unwrap();
        }
        StimulusSet::scan(dir.path()).unwrap()
    }

    fn config(blocks: Vec<BlockConfig>) -> ExperimentConfig {
        ExperimentConfig {
            blocks,
            intertrial_ms: 100,
            ..ExperimentConfig::default()
        }
    }

    fn machine(blocks: Vec<BlockConfig>) -> (Machine, ManualTimer) {
        let timer = ManualTimer::new();
        let m = ExperimentStateMachine::new(
            config(blocks),
            SessionInfo::new("s01"),
            stimulus_set(),
            timer.clone(),
            StdRng::seed_from_u64(9),
        );
        (m, timer)
    }

    fn pump(m: &mut Machine) {
        for event in m.update() {
            m.handle_event(event);
        }
    }

    fn block(repetitions: usize) -> BlockConfig {
        let mut b = BlockConfig::new(4, 8.0, repetitions);
        b.fixation_ms = 500;
        b.feedback_ms = 200;
        b
    }

    #[test]
    fn space_starts_the_first_trial() {
        let (mut m, _timer) = machine(vec![block(2)]);
        assert!(m.current_phase().is_welcome());
        assert!(m.current_array().is_none());

        m.handle_event(ExperimentEvent::SpacePressed);
        assert!(m.current_phase().is_search());
        assert!(m.should_show_fixation());
        assert_eq!(m.current_array().map(|a| a.len()), Some(4));
    }

    #[test]
    fn array_appears_after_the_fixation_period() {
        let (mut m, timer) = machine(vec![block(2)]);
        m.handle_event(ExperimentEvent::SpacePressed);

        timer.advance_ms(499);
        pump(&mut m);
        assert!(m.should_show_fixation());

        timer.advance_ms(1);
        pump(&mut m);
        assert!(m.should_show_array());
    }

    #[test]
    fn correct_response_is_scored_and_timed() {
        let (mut m, timer) = machine(vec![block(2)]);
        m.handle_event(ExperimentEvent::SpacePressed);
        timer.advance_ms(500);
        pump(&mut m);

        let target_present = m.current_array().unwrap().iter().any(|p| p.stimulus.is_target());
        let key = if target_present {
            ResponseKey::TargetPresent
        } else {
            ResponseKey::TargetAbsent
        };

        timer.advance_ms(650);
        assert!(m.handle_event(ExperimentEvent::ResponseReceived(key)));
        assert!(m.should_show_feedback());
        assert_eq!(m.feedback_correct(), Some(true));

        // feedback runs out, record lands
        timer.advance_ms(200);
        pump(&mut m);
        let records = m.drain_new_records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.correct);
        assert!(!r.timed_out);
        assert_eq!(r.response_time_ms, Some(650.0));
        assert_eq!(r.target_present, target_present);
    }

    #[test]
    fn wrong_key_scores_incorrect() {
        let (mut m, timer) = machine(vec![block(2)]);
        m.handle_event(ExperimentEvent::SpacePressed);
        timer.advance_ms(500);
        pump(&mut m);

        let target_present = m.current_array().unwrap().iter().any(|p| p.stimulus.is_target());
        let wrong = if target_present {
            ResponseKey::TargetAbsent
        } else {
            ResponseKey::TargetPresent
        };
        m.handle_event(ExperimentEvent::ResponseReceived(wrong));
        assert_eq!(m.feedback_correct(), Some(false));

        timer.advance_ms(200);
        pump(&mut m);
        assert!(!m.drain_new_records()[0].correct);
    }

    #[test]
    fn responses_during_fixation_are_ignored() {
        let (mut m, _timer) = machine(vec![block(2)]);
        m.handle_event(ExperimentEvent::SpacePressed);
        assert!(m.should_show_fixation());

        let handled = m.handle_event(ExperimentEvent::ResponseReceived(
            ResponseKey::TargetPresent,
        ));
        assert!(!handled);
        assert!(m.should_show_fixation());
    }

    #[test]
    fn missed_deadline_records_a_timeout() {
        let mut b = block(1);
        b.response_timeout_ms = Some(1000);
        let (mut m, timer) = machine(vec![b]);
        m.handle_event(ExperimentEvent::SpacePressed);

        timer.advance_ms(500);
        pump(&mut m);
        assert!(m.should_show_array());

        timer.advance_ms(1000);
        pump(&mut m);
        assert!(m.should_show_feedback());
        assert_eq!(m.feedback_correct(), Some(false));

        timer.advance_ms(200);
        pump(&mut m);
        let records = m.drain_new_records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.timed_out);
        assert!(!r.correct);
        assert_eq!(r.response_time_ms, None);
        assert_eq!(r.key, None);
    }

    #[test]
    fn full_session_produces_one_record_per_trial() {
        let (mut m, timer) = machine(vec![block(4), block(2)]);
        m.handle_event(ExperimentEvent::SpacePressed);

        let mut records = Vec::new();
        // drive frames until the debrief phase
        for _ in 0..10_000 {
            timer.advance_ms(10);
            pump(&mut m);
            if m.should_show_array() {
                m.handle_event(ExperimentEvent::ResponseReceived(ResponseKey::TargetAbsent));
            }
            records.extend(m.drain_new_records());
            if m.is_finished() {
                break;
            }
        }

        assert!(m.is_finished());
        assert_eq!(records.len(), 6);
        assert_eq!(m.summary().trials, 6);
        // block 0 has 4/2 = 2 present trials, block 1 has 1
        let present = records.iter().filter(|r| r.target_present).count();
        assert_eq!(present, 3);
        assert_eq!(records.iter().filter(|r| r.block == 1).count(), 2);
    }

    #[test]
    fn summary_tracks_accuracy_and_mean_rt() {
        let (mut m, timer) = machine(vec![block(2)]);
        m.handle_event(ExperimentEvent::SpacePressed);

        for _ in 0..1000 {
            timer.advance_ms(10);
            pump(&mut m);
            if m.should_show_array() {
                // respond 40 ms after array onset
                timer.advance_ms(40);
                m.handle_event(ExperimentEvent::ResponseReceived(ResponseKey::TargetAbsent));
            }
            if m.is_finished() {
                break;
            }
        }

        let summary = m.summary();
        assert_eq!(summary.trials, 2);
        assert!(summary.accuracy().is_some());
        assert_eq!(summary.mean_rt_ms(), Some(40.0));
    }
}
