// Pose estimation platform integration
// The landmark model is an external collaborator reached through `PoseEstimator`

pub mod estimator;

pub use estimator::{NoPoseEstimator, PoseEstimator, SimulatedPoseEstimator};
