use super::{NumericalInstability, StepError, StepOutcome, TrainError};
use tracing::warn;

/// 对同一逻辑步最多尝试`max_attempts`次，只有数值不稳定会被重试。
/// `run`收到的是尝试序号（从0开始），用于重新派生随机数
pub fn retry_step<F>(step: u64, max_attempts: u32, mut run: F) -> Result<StepOutcome, TrainError>
where
    F: FnMut(u32) -> Result<StepOutcome, StepError>,
{
    let mut last: Option<NumericalInstability> = None;
    for attempt in 0..max_attempts {
        match run(attempt) {
            Ok(outcome) => return Ok(outcome),
            Err(StepError::Unstable(e)) => {
                warn!(step, attempt, max_attempts, error = %e, "数值不稳定，重试本步");
                last = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    let last = last.unwrap_or_else(|| NumericalInstability {
        step,
        attempt: 0,
        substep: super::Substep::Discriminator,
        detail: "未执行任何尝试".to_string(),
    });
    Err(TrainError::FatalInstability {
        step,
        attempts: max_attempts,
        last,
    })
}
