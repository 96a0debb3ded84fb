use crate::assert_err;
use crate::data::DataError;
use crate::train::{NumericalInstability, StepError, StepOutcome, Substep, TrainError, retry_step};

fn outcome(step: u64) -> StepOutcome {
    StepOutcome {
        step,
        discriminator_loss: 1.0,
        generator_loss: 0.5,
        discriminator_skipped: false,
        generator_skipped: false,
        discriminator_scale: 1.0,
        generator_scale: 1.0,
    }
}

fn unstable(step: u64, attempt: u32) -> StepError {
    StepError::Unstable(NumericalInstability {
        step,
        attempt,
        substep: Substep::Generator,
        detail: "loss = NaN".to_string(),
    })
}

#[test]
fn test_succeeds_after_transient_failures() {
    let mut attempts = Vec::new();
    let result = retry_step(7, 3, |attempt| {
        attempts.push(attempt);
        if attempt < 2 {
            Err(unstable(7, attempt))
        } else {
            Ok(outcome(8))
        }
    });
    assert_eq!(result.unwrap().step, 8);
    assert_eq!(attempts, vec![0, 1, 2]);
}

#[test]
fn test_third_failure_is_fatal() {
    let mut calls = 0;
    let result = retry_step(4, 3, |attempt| {
        calls += 1;
        Err(unstable(4, attempt))
    });
    assert_eq!(calls, 3);
    assert_err!(result, TrainError::FatalInstability { step: 4, attempts: 3, last } if last.attempt == 2);
    assert_eq!(result.unwrap_err().exit_code(), 2);
}

#[test]
fn test_other_errors_are_not_retried() {
    let mut calls = 0;
    let result = retry_step(0, 3, |_| {
        calls += 1;
        Err(StepError::Data(DataError::ZeroBatchSize))
    });
    assert_eq!(calls, 1);
    assert_err!(result, TrainError::Data(DataError::ZeroBatchSize));
}
