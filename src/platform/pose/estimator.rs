// Pose estimator seam
// Real model backends implement `PoseEstimator`; the two built-ins cover
// running without a bundled model and exercising the pipeline end to end.

use crate::models::capture::RawFrame;
use crate::models::pose::{BodyLandmark, Keypoint, LandmarkFrame, PoseConfig, PoseError, PoseResult};
use std::f64::consts::PI;

/// Estimator trait
/// Implement this for an inference backend
pub trait PoseEstimator: Send + Sync {
    /// Landmarks for the single subject in `frame`, or `None` when nobody is detected
    fn estimate(&self, frame: &RawFrame) -> PoseResult<Option<LandmarkFrame>>;

    /// Check if the model is loaded
    fn is_initialized(&self) -> bool;

    /// Get model info
    fn model_info(&self) -> String;
}

// ==============================================================================
// No Model
// ==============================================================================

/// Never detects anyone
pub struct NoPoseEstimator {
    config: PoseConfig,
}

impl NoPoseEstimator {
    pub fn new(config: &PoseConfig) -> Self {
        log::warn!("No pose model bundled; frames will be streamed without analysis");
        Self {
            config: config.clone(),
        }
    }
}

impl PoseEstimator for NoPoseEstimator {
    fn estimate(&self, frame: &RawFrame) -> PoseResult<Option<LandmarkFrame>> {
        if frame.data.len() != frame.expected_len() {
            return Err(PoseError::UnsupportedFrame(format!(
                "{}x{} frame with {} bytes",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
        Ok(None)
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn model_info(&self) -> String {
        format!(
            "No pose model (detection confidence {:.2})",
            self.config.min_detection_confidence
        )
    }
}

// ==============================================================================
// Simulated Subject
// ==============================================================================

/// Deterministic skeleton driven by the frame timestamp.
///
/// Over each period the elbows bend from 175 to 20 degrees and back, the arms
/// rise from 15 to 100 degrees at the shoulder, and the knees bend from 175 to
/// 80 degrees. Every rep-counting exercise therefore completes one rep per period.
pub struct SimulatedPoseEstimator {
    period_ms: i64,
}

const SIM_VISIBILITY: f32 = 0.95;

type Vec2 = (f64, f64);

fn rotate(v: Vec2, degrees: f64) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (v.0 * cos - v.1 * sin, v.0 * sin + v.1 * cos)
}

fn offset(p: Vec2, dir: Vec2, length: f64) -> Vec2 {
    (p.0 + dir.0 * length, p.1 + dir.1 * length)
}

impl SimulatedPoseEstimator {
    pub fn new() -> Self {
        Self::with_period(3000)
    }

    pub fn with_period(period_ms: i64) -> Self {
        Self {
            period_ms: period_ms.max(1),
        }
    }

    /// Position in the movement cycle: 0 at rest, 1 at full contraction
    fn effort(&self, timestamp: i64) -> f64 {
        let phase = timestamp.rem_euclid(self.period_ms) as f64 / self.period_ms as f64;
        (1.0 - (2.0 * PI * phase).cos()) / 2.0
    }

    /// Joint angles (elbow, shoulder raise, knee) at `timestamp`
    pub fn angles_at(&self, timestamp: i64) -> (f64, f64, f64) {
        let effort = self.effort(timestamp);
        (
            175.0 - 155.0 * effort,
            15.0 + 85.0 * effort,
            175.0 - 95.0 * effort,
        )
    }

    fn skeleton(&self, timestamp: i64) -> Vec<Keypoint> {
        let (elbow, raise, knee) = self.angles_at(timestamp);
        let down = (0.0, 1.0);
        let mut points: Vec<Vec2> = vec![(0.5, 0.5); BodyLandmark::COUNT];

        // side = +1 for the left body side (image left), -1 for the right
        for (side, shoulder_x) in [(1.0, 0.40), (-1.0, 0.60)] {
            let shoulder = (shoulder_x, 0.30);
            let hip = (shoulder_x, 0.55);

            let upper_arm = rotate(down, side * raise);
            let elbow_pt = offset(shoulder, upper_arm, 0.12);
            let forearm = rotate((-upper_arm.0, -upper_arm.1), side * elbow);
            let wrist = offset(elbow_pt, forearm, 0.11);

            let knee_pt = offset(hip, down, 0.20);
            let shin = rotate((0.0, -1.0), side * knee);
            let ankle = offset(knee_pt, shin, 0.20);

            let landmarks = if side > 0.0 {
                [
                    (BodyLandmark::LeftShoulder, shoulder),
                    (BodyLandmark::LeftElbow, elbow_pt),
                    (BodyLandmark::LeftWrist, wrist),
                    (BodyLandmark::LeftPinky, wrist),
                    (BodyLandmark::LeftIndex, wrist),
                    (BodyLandmark::LeftThumb, wrist),
                    (BodyLandmark::LeftHip, hip),
                    (BodyLandmark::LeftKnee, knee_pt),
                    (BodyLandmark::LeftAnkle, ankle),
                    (BodyLandmark::LeftHeel, offset(ankle, down, 0.01)),
                    (BodyLandmark::LeftFootIndex, offset(ankle, (-1.0, 0.0), 0.03)),
                ]
            } else {
                [
                    (BodyLandmark::RightShoulder, shoulder),
                    (BodyLandmark::RightElbow, elbow_pt),
                    (BodyLandmark::RightWrist, wrist),
                    (BodyLandmark::RightPinky, wrist),
                    (BodyLandmark::RightIndex, wrist),
                    (BodyLandmark::RightThumb, wrist),
                    (BodyLandmark::RightHip, hip),
                    (BodyLandmark::RightKnee, knee_pt),
                    (BodyLandmark::RightAnkle, ankle),
                    (BodyLandmark::RightHeel, offset(ankle, down, 0.01)),
                    (BodyLandmark::RightFootIndex, offset(ankle, (1.0, 0.0), 0.03)),
                ]
            };
            for (landmark, point) in landmarks {
                points[landmark.index()] = point;
            }
        }

        // Head
        for (landmark, point) in [
            (BodyLandmark::Nose, (0.50, 0.16)),
            (BodyLandmark::LeftEyeInner, (0.48, 0.14)),
            (BodyLandmark::LeftEye, (0.47, 0.14)),
            (BodyLandmark::LeftEyeOuter, (0.46, 0.14)),
            (BodyLandmark::RightEyeInner, (0.52, 0.14)),
            (BodyLandmark::RightEye, (0.53, 0.14)),
            (BodyLandmark::RightEyeOuter, (0.54, 0.14)),
            (BodyLandmark::LeftEar, (0.44, 0.15)),
            (BodyLandmark::RightEar, (0.56, 0.15)),
            (BodyLandmark::MouthLeft, (0.48, 0.19)),
            (BodyLandmark::MouthRight, (0.52, 0.19)),
        ] {
            points[landmark.index()] = point;
        }

        points
            .into_iter()
            .map(|(x, y)| Keypoint::new(x as f32, y as f32, 0.0, SIM_VISIBILITY))
            .collect()
    }
}

impl Default for SimulatedPoseEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseEstimator for SimulatedPoseEstimator {
    fn estimate(&self, frame: &RawFrame) -> PoseResult<Option<LandmarkFrame>> {
        Ok(Some(LandmarkFrame::new(
            frame.timestamp,
            self.skeleton(frame.timestamp),
        )))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn model_info(&self) -> String {
        format!("Simulated subject ({} ms movement period)", self.period_ms)
    }
}
