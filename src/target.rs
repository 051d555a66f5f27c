//! The subject-under-test.

use async_trait::async_trait;

/// A user-supplied subject-under-test.
///
/// The executor calls [`Target::setup`] exactly once before the first
/// iteration and [`Target::teardown`] exactly once after the last,
/// provided setup succeeded. The core never constructs or destroys the
/// target beyond calling these two lifecycle hooks.
#[async_trait]
pub trait Target: Send + Sync {
    /// Identity used in logs and reports.
    fn name(&self) -> &str;

    /// Bring the target up. Called once, before any injector starts.
    async fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Tear the target down. Called once, after all injectors have
    /// stopped, iff `setup` returned `Ok`.
    async fn teardown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
