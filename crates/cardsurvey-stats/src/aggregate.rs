use cardsurvey_types::models::{OptionCounts, Survey};

use crate::delta::StatsDelta;

/// In-memory copy of a survey's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub responses: i64,
    pub skips: i64,
    pub option_counts: OptionCounts,
}

impl Aggregate {
    pub fn new(options: &[String]) -> Self {
        Self {
            responses: 0,
            skips: 0,
            option_counts: OptionCounts::zeroed(options),
        }
    }

    pub fn apply(&mut self, delta: &StatsDelta) {
        self.responses += delta.responses;
        self.skips += delta.skips;
        for change in &delta.options {
            self.option_counts.add(&change.option, change.delta);
        }
    }

    /// Counters are non-negative and option tallies never exceed responses.
    pub fn is_consistent(&self) -> bool {
        self.responses >= 0
            && self.skips >= 0
            && self.option_counts.iter().all(|(_, c)| c >= 0)
            && self.option_counts.total() <= self.responses
    }
}

impl From<&Survey> for Aggregate {
    fn from(survey: &Survey) -> Self {
        Self {
            responses: survey.responses,
            skips: survey.skip_count,
            option_counts: survey.option_counts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cardsurvey_types::models::AnswerState;

    use super::*;
    use crate::delta::{UnknownOptionPolicy, compute_delta};

    fn options() -> Vec<String> {
        vec!["Yes".into(), "No".into(), "Maybe".into()]
    }

    fn answered(v: &str) -> AnswerState {
        AnswerState::Answered(v.to_string())
    }

    /// Moves one respondent to `next`, tracking their last state like storage does.
    fn step(
        agg: &mut Aggregate,
        last: &mut HashMap<u8, AnswerState>,
        respondent: u8,
        next: AnswerState,
        policy: UnknownOptionPolicy,
    ) {
        let delta = compute_delta(last.get(&respondent), &next, &options(), policy).unwrap();
        agg.apply(&delta);
        last.insert(respondent, next);
    }

    fn counts(agg: &Aggregate) -> Vec<i64> {
        agg.option_counts.iter().map(|(_, c)| c).collect()
    }

    #[test]
    fn new_respondent_answers_yes() {
        let mut agg = Aggregate::new(&options());
        let mut last = HashMap::new();
        step(&mut agg, &mut last, 1, answered("Yes"), UnknownOptionPolicy::Reject);

        assert_eq!(agg.responses, 1);
        assert_eq!(agg.skips, 0);
        assert_eq!(counts(&agg), vec![1, 0, 0]);
    }

    #[test]
    fn respondent_changes_yes_to_no() {
        let mut agg = Aggregate::new(&options());
        let mut last = HashMap::new();
        step(&mut agg, &mut last, 1, answered("Yes"), UnknownOptionPolicy::Reject);
        step(&mut agg, &mut last, 1, answered("No"), UnknownOptionPolicy::Reject);

        assert_eq!(agg.responses, 1);
        assert_eq!(counts(&agg), vec![0, 1, 0]);
    }

    #[test]
    fn skipped_respondent_answers_maybe() {
        let mut agg = Aggregate::new(&options());
        let mut last = HashMap::new();
        step(&mut agg, &mut last, 1, AnswerState::Skipped, UnknownOptionPolicy::Reject);
        assert_eq!((agg.responses, agg.skips), (0, 1));

        step(&mut agg, &mut last, 1, answered("Maybe"), UnknownOptionPolicy::Reject);
        assert_eq!((agg.responses, agg.skips), (1, 0));
        assert_eq!(counts(&agg), vec![0, 0, 1]);
    }

    #[test]
    fn resubmitting_same_answer_leaves_aggregate_alone() {
        let mut agg = Aggregate::new(&options());
        let mut last = HashMap::new();
        step(&mut agg, &mut last, 1, answered("No"), UnknownOptionPolicy::Reject);
        let before = agg.clone();
        step(&mut agg, &mut last, 1, answered("No"), UnknownOptionPolicy::Reject);
        assert_eq!(agg, before);
    }

    #[test]
    fn every_transition_lands_on_expected_counters() {
        // (previous, next, responses', skips', [Yes, No, Maybe]) starting from
        // an aggregate that already reflects `previous`.
        let cases: Vec<(Option<AnswerState>, AnswerState, i64, i64, [i64; 3])> = vec![
            (None, AnswerState::Skipped, 0, 1, [0, 0, 0]),
            (None, answered("Yes"), 1, 0, [1, 0, 0]),
            (Some(AnswerState::Skipped), AnswerState::Skipped, 0, 1, [0, 0, 0]),
            (Some(AnswerState::Skipped), answered("No"), 1, 0, [0, 1, 0]),
            (Some(answered("Yes")), AnswerState::Skipped, 0, 1, [0, 0, 0]),
            (Some(answered("Yes")), answered("Yes"), 1, 0, [1, 0, 0]),
            (Some(answered("Yes")), answered("Maybe"), 1, 0, [0, 0, 1]),
        ];

        for (previous, next, r, s, c) in cases {
            let mut agg = Aggregate::new(&options());
            let mut last = HashMap::new();
            if let Some(prev) = previous.clone() {
                step(&mut agg, &mut last, 1, prev, UnknownOptionPolicy::Reject);
            }
            step(&mut agg, &mut last, 1, next.clone(), UnknownOptionPolicy::Reject);

            assert_eq!(agg.responses, r, "{previous:?} -> {next:?}");
            assert_eq!(agg.skips, s, "{previous:?} -> {next:?}");
            assert_eq!(counts(&agg), c.to_vec(), "{previous:?} -> {next:?}");
        }
    }

    #[test]
    fn option_total_never_exceeds_responses() {
        let states = [
            AnswerState::Skipped,
            answered("Yes"),
            answered("No"),
            answered("Maybe"),
            answered("Other"),
        ];
        // Every (respondent, state) sequence of length 4 over two respondents.
        let moves: Vec<(u8, AnswerState)> = [1u8, 2]
            .iter()
            .flat_map(|r| states.iter().map(move |s| (*r, s.clone())))
            .collect();
        let n = moves.len();

        for a in 0..n {
            for b in 0..n {
                for c in 0..n {
                    for d in 0..n {
                        let mut agg = Aggregate::new(&options());
                        let mut last = HashMap::new();
                        for idx in [a, b, c, d] {
                            let (who, state) = moves[idx].clone();
                            step(&mut agg, &mut last, who, state, UnknownOptionPolicy::Drop);
                            assert!(agg.is_consistent(), "{agg:?} after {:?}", [a, b, c, d]);
                        }
                        let answered_now = last.values().filter(|s| !s.is_skipped()).count() as i64;
                        let skipped_now = last.values().filter(|s| s.is_skipped()).count() as i64;
                        assert_eq!(agg.responses, answered_now);
                        assert_eq!(agg.skips, skipped_now);
                    }
                }
            }
        }
    }
}
