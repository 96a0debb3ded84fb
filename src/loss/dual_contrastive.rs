use super::AdversarialLoss;
use crate::nn::{GraphError, Var};

/// 双向对比损失
///
/// `half(a, b) = mean_i CE([a_i, b_1..b_m], 0)`，即每个`a_i`与全部`b`组成一行logits，
/// 以第0项为正类求交叉熵：`CE = lse(row) − a_i`。
/// - D = half(real, fake) + half(−fake, −real)
/// - G = half(fake, real) + half(−real, −fake)
#[derive(Debug, Clone, Copy, Default)]
pub struct DualContrastiveLoss;

fn half(anchors: &Var, others: &Var) -> Result<Var, GraphError> {
    let n = anchors.shape()?[0];
    let m = others.shape()?[0];
    let row = others.reshape(&[1, m])?.broadcast_to(&[n, m])?;
    let logits = Var::concat(&[anchors, &row], 1)?;
    logits.log_sum_exp_last()?.try_sub(anchors)?.mean()
}

impl AdversarialLoss for DualContrastiveLoss {
    fn name(&self) -> &'static str {
        "dual_contrastive"
    }

    fn discriminator_loss(&self, real: &Var, fake: &Var) -> Result<Var, GraphError> {
        let forward = half(real, fake)?;
        let backward = half(&fake.try_neg()?, &real.try_neg()?)?;
        forward.try_add(&backward)
    }

    fn generator_loss(&self, fake: &Var, real: Option<&Var>) -> Result<Var, GraphError> {
        let real = real.ok_or_else(|| {
            GraphError::InvalidOperation("双向对比损失的G损失需要真图分数".to_string())
        })?;
        let forward = half(fake, real)?;
        let backward = half(&real.try_neg()?, &fake.try_neg()?)?;
        forward.try_add(&backward)
    }

    fn needs_real_for_generator(&self) -> bool {
        true
    }
}
