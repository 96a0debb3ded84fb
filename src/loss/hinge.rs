use super::AdversarialLoss;
use crate::nn::{GraphError, Var};

/// Hinge 损失
/// - D = mean(relu(1 − real)) + mean(relu(1 + fake))
/// - G = −mean(fake)
#[derive(Debug, Clone, Copy, Default)]
pub struct HingeLoss;

impl AdversarialLoss for HingeLoss {
    fn name(&self) -> &'static str {
        "hinge"
    }

    fn discriminator_loss(&self, real: &Var, fake: &Var) -> Result<Var, GraphError> {
        let real_term = real.try_neg()?.add_scalar(1.0)?.relu()?.mean()?;
        let fake_term = fake.add_scalar(1.0)?.relu()?.mean()?;
        real_term.try_add(&fake_term)
    }

    fn generator_loss(&self, fake: &Var, _real: Option<&Var>) -> Result<Var, GraphError> {
        fake.mean()?.try_neg()
    }
}
