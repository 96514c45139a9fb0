use crate::adapter::{AdaptError, ProviderAdapter};
use crate::engine::evaluate;
use crate::policy::{PolicyConfig, PolicyError};
use crate::reference::ImageReference;
use crate::report::AvatarReport;
use crate::verdict::Verdict;

/// Adapter plus policy: turns a provider response for one image into a report.
///
/// Holds no mutable state, so one checker can serve any number of
/// concurrent checks.
pub struct AvatarChecker {
    adapter: Box<dyn ProviderAdapter + Send + Sync>,
    policy: PolicyConfig,
}

impl AvatarChecker {
    pub fn new(
        adapter: Box<dyn ProviderAdapter + Send + Sync>,
        policy: PolicyConfig,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { adapter, policy })
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Adapt and evaluate. Provider errors come back as `Err`, untouched.
    pub fn verdict(&self, body: &str) -> Result<Verdict, AdaptError> {
        let outcome = self.adapter.adapt(body)?;
        Ok(evaluate(&outcome, &self.policy))
    }

    /// Adapt and evaluate, folding a provider error into a failure report.
    /// Only a malformed response is an error.
    pub fn check(&self, reference: &ImageReference, body: &str) -> Result<AvatarReport, AdaptError> {
        match self.verdict(body) {
            Ok(verdict) => Ok(AvatarReport::from_verdict(reference, &verdict)),
            Err(AdaptError::Provider(e)) => {
                tracing::warn!(
                    provider = self.adapter.name(),
                    code = %e.code,
                    message = %e.message,
                    "provider reported an error"
                );
                Ok(AvatarReport::provider_failure(reference, &e))
            }
            Err(e) => Err(e),
        }
    }
}
