//! Deployment steps.
//!
//! The step set and its order are fixed:
//! 1. deploy the factory
//! 2. configure the factory fee recipient
//! 3. deploy the router

mod executor;

use std::collections::BTreeSet;

pub use executor::{ChainStepExecutor, StepExecutor};

use crate::DeployError;

/// Identifier of one canonical deployment step.
///
/// The numeric values are stable and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumIter,
)]
#[repr(u8)]
pub enum StepId {
    #[strum(to_string = "1 (deploy factory)")]
    DeployFactory = 1,
    #[strum(to_string = "2 (configure factory)")]
    ConfigureFactory = 2,
    #[strum(to_string = "3 (deploy router)")]
    DeployRouter = 3,
}

impl StepId {
    /// All steps, in execution order.
    pub const CANONICAL: [StepId; 3] = [
        StepId::DeployFactory,
        StepId::ConfigureFactory,
        StepId::DeployRouter,
    ];

    pub fn id(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for StepId {
    type Error = DeployError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        StepId::CANONICAL
            .into_iter()
            .find(|step| step.id() == id)
            .ok_or(DeployError::UnknownStep(id))
    }
}

/// The steps requested for one run.
///
/// Duplicates collapse; the order given by the caller does not matter since steps always run
/// in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(BTreeSet<StepId>);

impl Selection {
    /// Steps run when the caller does not choose.
    pub const DEFAULT_IDS: [u8; 2] = [1, 2];

    /// Build a selection from raw ids, rejecting ids outside the canonical set.
    pub fn from_ids(ids: &[u8]) -> Result<Self, DeployError> {
        ids.iter()
            .map(|id| StepId::try_from(*id))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.0.contains(&step)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Selected steps in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = StepId> + '_ {
        self.0.iter().copied()
    }

    pub fn ids(&self) -> Vec<u8> {
        self.iter().map(|step| step.id()).collect()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::from_ids(&Self::DEFAULT_IDS).expect("default step ids are canonical")
    }
}

impl FromIterator<StepId> for Selection {
    fn from_iter<I: IntoIterator<Item = StepId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
