// tests/phase_properties.rs

mod common;
use crate::common::{Probe, abort_task, fatal_task, ok_task, soft_task};

use proptest::prelude::*;
use sympack::engine::{Phase, PhaseError, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Soft,
    Abort,
    Fatal,
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        4 => Just(Outcome::Ok),
        3 => Just(Outcome::Soft),
        1 => Just(Outcome::Abort),
        1 => Just(Outcome::Fatal),
    ]
}

fn build_task(i: usize, outcome: Outcome, probe: &Probe) -> Task {
    let name = format!("task_{i}");
    match outcome {
        Outcome::Ok => ok_task(&name, probe),
        Outcome::Soft => soft_task(&name, probe, &format!("error {i}")),
        Outcome::Abort => abort_task(&name, probe),
        Outcome::Fatal => fatal_task(&name, probe, &format!("fatal {i}")),
    }
}

proptest! {
    #[test]
    fn phase_result_matches_first_terminal_outcome(
        outcomes in proptest::collection::vec(outcome_strategy(), 0..12)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let probes: Vec<Probe> = outcomes.iter().map(|_| Probe::new()).collect();
        let tasks = outcomes
            .iter()
            .zip(&probes)
            .enumerate()
            .map(|(i, (outcome, probe))| build_task(i, *outcome, probe))
            .collect();
        let phase = Phase::new("Prop", tasks);

        let result = rt.block_on(phase.run());

        let terminal = outcomes
            .iter()
            .position(|o| matches!(o, Outcome::Abort | Outcome::Fatal));
        let last_run = terminal.unwrap_or(outcomes.len().saturating_sub(1));

        // Tasks run strictly in order and stop at the first abort/fatal.
        for (i, probe) in probes.iter().enumerate() {
            let expected = if outcomes.is_empty() || i > last_run { 0 } else { 1 };
            prop_assert_eq!(probe.count(), expected, "task_{} run count", i);
        }

        match terminal.map(|i| (i, outcomes[i])) {
            Some((_, Outcome::Abort)) => prop_assert_eq!(result, Err(PhaseError::Aborted)),
            Some((i, Outcome::Fatal)) => prop_assert_eq!(
                result,
                Err(PhaseError::Fatal { task: format!("task_{i}"), message: format!("fatal {i}") })
            ),
            _ => {
                let softs: Vec<String> = outcomes
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| **o == Outcome::Soft)
                    .map(|(i, _)| format!("task_{i}"))
                    .collect();
                if softs.is_empty() {
                    prop_assert_eq!(result, Ok(()));
                } else {
                    match result {
                        Err(PhaseError::Failed { failures }) => {
                            let names: Vec<String> = failures.into_iter().map(|f| f.task).collect();
                            prop_assert_eq!(names, softs);
                        }
                        other => prop_assert!(false, "expected Failed, got {:?}", other),
                    }
                }
            }
        }
    }
}
