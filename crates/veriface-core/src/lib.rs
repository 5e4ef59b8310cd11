//! veriface-core — face-embedding verification ensemble.
//!
//! Four metric algorithms (triplet loss plus the ArcFace, CosFace and
//! SphereFace angular margins) fused into a weighted, vote-gated
//! pass/fail verdict. Pure and synchronous; embedding extraction is an
//! external concern.

pub mod ensemble;
pub mod metrics;
pub mod types;

pub use ensemble::{EnsembleResult, EnsembleStats, EnsembleVerifier, EnsembleWeights, VerifyError};
pub use metrics::{ArcFaceLoss, CosFaceLoss, MetricAlgorithm, SphereFaceLoss, TripletLoss};
pub use types::{AlgorithmResult, Confidence, Embedding};
