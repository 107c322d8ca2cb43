//! Value types describing remote capacity and job requirements.
//!
//! - [`ExecutionTarget`]: one remote share as published by a site
//! - [`JobDescription`]: what a job asks for
//!
//! Neither type carries behaviour beyond accessors; matching lives in
//! [`crate::broker`].

pub mod description;
pub mod target;

use serde::{Deserialize, Deserializer};

pub use description::{JobDescription, Range, Resources, ScalableTime, SlotRequirement};
pub use target::{
    ComputingEndpoint, ComputingManager, ComputingShare, ExecutionEnvironment, ExecutionTarget,
};

/// Read an optional bound. Information systems publish `-1` for "no limit",
/// so any negative value becomes `None`.
pub(crate) fn unconstrained_if_negative<'de, D, T>(
    deserializer: D,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + PartialOrd + Default,
{
    let value = Option::<T>::deserialize(deserializer)?;
    Ok(value.filter(|v| *v >= T::default()))
}
