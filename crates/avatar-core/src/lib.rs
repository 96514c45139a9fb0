//! avatar-core — Avatar photo acceptability checks.
//!
//! Classifies image references, normalizes face-attribute responses from a
//! remote face-analysis provider, and evaluates them against a configurable
//! avatar policy. Pure and synchronous: no I/O beyond loading profile files.

pub mod adapter;
pub mod engine;
pub mod pipeline;
pub mod policy;
pub mod profiles;
pub mod reference;
pub mod report;
pub mod types;
pub mod verdict;

pub use adapter::{
    AdaptError, EyeOpenEncoding, GenericAdapter, IaiAdapter, ProviderAdapter, ProviderError,
    ProviderKind, RequestedAttributes,
};
pub use engine::evaluate;
pub use pipeline::AvatarChecker;
pub use policy::{AngleRange, Axis, PolicyConfig, PolicyError};
pub use profiles::{Profile, ProfileError};
pub use reference::{classify, ImageReference, ReferenceKind};
pub use report::AvatarReport;
pub use types::{DetectionOutcome, FaceAttributeRecord, FaceBox, MaskType};
pub use verdict::{Check, Rejection, Verdict};
