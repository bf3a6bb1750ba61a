// Per-exercise evaluation: a static strategy table driven by joint angles

use crate::core::angle::{joint_angle, Point2};
use crate::core::hold_timer::{HoldBand, HoldEvent, HoldTimer};
use crate::core::overlay::{OverlayItem, GREEN, RED, WHITE, YELLOW};
use crate::core::rep_counter::{RepCounter, SideState, Thresholds};
use crate::models::exercise::ExerciseKind;
use crate::models::pose::{BodyLandmark, LandmarkFrame, SKELETON_CONNECTIONS};
use std::time::Duration;
use tokio::time::Instant;

// ==============================================================================
// Landmark View
// ==============================================================================

/// A landmark frame seen through a visibility threshold
#[derive(Debug, Clone, Copy)]
pub struct Landmarks<'a> {
    frame: &'a LandmarkFrame,
    min_visibility: f32,
}

impl<'a> Landmarks<'a> {
    pub fn new(frame: &'a LandmarkFrame, min_visibility: f32) -> Self {
        Self {
            frame,
            min_visibility,
        }
    }

    pub fn point(&self, landmark: BodyLandmark) -> Option<Point2> {
        self.frame
            .get(landmark, self.min_visibility)
            .map(Point2::from)
    }

    /// Angle at the triplet's vertex, or `None` if any of its joints is missing
    pub fn angle(&self, triplet: &JointTriplet) -> Option<(f64, Point2)> {
        let a = self.point(triplet.a)?;
        let b = self.point(triplet.b)?;
        let c = self.point(triplet.c)?;
        Some((joint_angle(a, b, c), b))
    }

    /// Skeleton segments and joint markers for every visible limb
    pub fn skeleton(&self) -> Vec<OverlayItem> {
        let mut items = Vec::new();
        for (from, to) in SKELETON_CONNECTIONS {
            if let (Some(a), Some(b)) = (self.point(*from), self.point(*to)) {
                items.push(OverlayItem::Segment {
                    from: a,
                    to: b,
                    color: WHITE,
                });
            }
        }
        for landmark in [
            BodyLandmark::LeftShoulder,
            BodyLandmark::RightShoulder,
            BodyLandmark::LeftElbow,
            BodyLandmark::RightElbow,
            BodyLandmark::LeftWrist,
            BodyLandmark::RightWrist,
            BodyLandmark::LeftHip,
            BodyLandmark::RightHip,
            BodyLandmark::LeftKnee,
            BodyLandmark::RightKnee,
            BodyLandmark::LeftAnkle,
            BodyLandmark::RightAnkle,
        ] {
            if let Some(at) = self.point(landmark) {
                items.push(OverlayItem::Joint { at, color: GREEN });
            }
        }
        items
    }
}

// ==============================================================================
// Strategy Types
// ==============================================================================

/// Three landmarks forming an angle, vertex in the middle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointTriplet {
    pub a: BodyLandmark,
    pub b: BodyLandmark,
    pub c: BodyLandmark,
}

impl JointTriplet {
    pub const fn new(a: BodyLandmark, b: BodyLandmark, c: BodyLandmark) -> Self {
        Self { a, b, c }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// Independent left and right counters
    PerSide,
    /// Mean of both sides drives one counter, reported as the left count
    Combined,
}

/// Mutable per-session exercise state, advanced once per analyzed frame
#[derive(Debug, Clone)]
pub enum ExerciseState {
    Reps { left: RepCounter, right: RepCounter },
    Hold(HoldTimer),
}

impl ExerciseState {
    pub fn counts(&self, now: Instant) -> (u32, u32) {
        match self {
            ExerciseState::Reps { left, right } => (left.count(), right.count()),
            ExerciseState::Hold(timer) => (timer.total_held_secs(now), timer.total_milestones()),
        }
    }
}

/// Result of evaluating one frame
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub left_count: u32,
    pub right_count: u32,
    pub feedback: Option<String>,
    /// Hold milestones reached on this frame, in seconds of continuous hold
    pub milestones: Vec<u64>,
    pub overlay: Vec<OverlayItem>,
}

pub trait ExerciseStrategy: Send + Sync {
    fn kind(&self) -> ExerciseKind;

    fn new_state(&self) -> ExerciseState;

    /// Advance `state` with one frame of landmarks. Missing joints leave it untouched.
    fn evaluate(&self, landmarks: &Landmarks, state: &mut ExerciseState, now: Instant) -> Evaluation;
}

fn angle_label(at: Point2, angle: f64) -> OverlayItem {
    OverlayItem::Label {
        at,
        text: format!("{:.0}", angle),
        color: YELLOW,
    }
}

// ==============================================================================
// Repetition Strategies
// ==============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RepStrategy {
    pub kind: ExerciseKind,
    pub tracking: Tracking,
    pub left: JointTriplet,
    pub right: JointTriplet,
    pub thresholds: Thresholds,
    /// Shown when a rep completes
    pub rep_feedback: &'static str,
    /// Shown when the limb reaches the extended position
    pub extended_feedback: &'static str,
}

use crate::models::pose::BodyLandmark::*;

const LEFT_ELBOW: JointTriplet = JointTriplet::new(LeftShoulder, LeftElbow, LeftWrist);
const RIGHT_ELBOW: JointTriplet = JointTriplet::new(RightShoulder, RightElbow, RightWrist);
const LEFT_SHOULDER: JointTriplet = JointTriplet::new(LeftHip, LeftShoulder, LeftElbow);
const RIGHT_SHOULDER: JointTriplet = JointTriplet::new(RightHip, RightShoulder, RightElbow);
const LEFT_KNEE: JointTriplet = JointTriplet::new(LeftHip, LeftKnee, LeftAnkle);
const RIGHT_KNEE: JointTriplet = JointTriplet::new(RightHip, RightKnee, RightAnkle);
const LEFT_BODY_LINE: JointTriplet = JointTriplet::new(LeftShoulder, LeftHip, LeftAnkle);
const RIGHT_BODY_LINE: JointTriplet = JointTriplet::new(RightShoulder, RightHip, RightAnkle);

pub static REP_STRATEGIES: [RepStrategy; 9] = [
    RepStrategy {
        kind: ExerciseKind::HammerCurl,
        tracking: Tracking::PerSide,
        left: LEFT_ELBOW,
        right: RIGHT_ELBOW,
        thresholds: Thresholds::new(160.0, 30.0),
        rep_feedback: "Good curl!",
        extended_feedback: "Arm extended, now curl up",
    },
    RepStrategy {
        kind: ExerciseKind::FrontRaise,
        tracking: Tracking::PerSide,
        left: LEFT_SHOULDER,
        right: RIGHT_SHOULDER,
        thresholds: Thresholds::new(80.0, 30.0),
        rep_feedback: "Nice raise!",
        extended_feedback: "Shoulder height, lower slowly",
    },
    RepStrategy {
        kind: ExerciseKind::Squat,
        tracking: Tracking::Combined,
        left: LEFT_KNEE,
        right: RIGHT_KNEE,
        thresholds: Thresholds::new(160.0, 90.0),
        rep_feedback: "Great squat!",
        extended_feedback: "Standing tall, squat down",
    },
    RepStrategy {
        kind: ExerciseKind::TricepsExtension,
        tracking: Tracking::PerSide,
        left: LEFT_ELBOW,
        right: RIGHT_ELBOW,
        thresholds: Thresholds::new(160.0, 70.0),
        rep_feedback: "Good extension!",
        extended_feedback: "Fully extended, lower behind your head",
    },
    RepStrategy {
        kind: ExerciseKind::Lunges,
        tracking: Tracking::PerSide,
        left: LEFT_KNEE,
        right: RIGHT_KNEE,
        thresholds: Thresholds::new(160.0, 100.0),
        rep_feedback: "Good lunge!",
        extended_feedback: "Step forward and lower",
    },
    RepStrategy {
        kind: ExerciseKind::ShoulderPress,
        tracking: Tracking::PerSide,
        left: LEFT_ELBOW,
        right: RIGHT_ELBOW,
        thresholds: Thresholds::new(160.0, 80.0),
        rep_feedback: "Strong press!",
        extended_feedback: "Arms locked out, bring them down",
    },
    RepStrategy {
        kind: ExerciseKind::LateralRaise,
        tracking: Tracking::PerSide,
        left: LEFT_SHOULDER,
        right: RIGHT_SHOULDER,
        thresholds: Thresholds::new(80.0, 25.0),
        rep_feedback: "Nice raise!",
        extended_feedback: "Arms level, lower with control",
    },
    RepStrategy {
        kind: ExerciseKind::TricepsKickback,
        tracking: Tracking::PerSide,
        left: LEFT_ELBOW,
        right: RIGHT_ELBOW,
        thresholds: Thresholds::new(150.0, 70.0),
        rep_feedback: "Good kickback!",
        extended_feedback: "Squeeze at the top, then bend",
    },
    RepStrategy {
        kind: ExerciseKind::PushUps,
        tracking: Tracking::Combined,
        left: LEFT_ELBOW,
        right: RIGHT_ELBOW,
        thresholds: Thresholds::new(160.0, 90.0),
        rep_feedback: "Great push-up!",
        extended_feedback: "Arms straight, lower your chest",
    },
];

impl RepStrategy {
    /// Feed one angle into a counter and pick the feedback it warrants
    fn advance(&self, counter: &mut RepCounter, angle: f64) -> Option<&'static str> {
        let was_extended = counter.state() == SideState::High;
        if counter.update(angle, &self.thresholds).is_some() {
            return Some(self.rep_feedback);
        }
        if !was_extended && counter.state() == SideState::High {
            return Some(self.extended_feedback);
        }
        None
    }
}

impl ExerciseStrategy for RepStrategy {
    fn kind(&self) -> ExerciseKind {
        self.kind
    }

    fn new_state(&self) -> ExerciseState {
        ExerciseState::Reps {
            left: RepCounter::new(),
            right: RepCounter::new(),
        }
    }

    fn evaluate(&self, landmarks: &Landmarks, state: &mut ExerciseState, now: Instant) -> Evaluation {
        let mut evaluation = Evaluation {
            overlay: landmarks.skeleton(),
            ..Default::default()
        };

        let ExerciseState::Reps { left, right } = state else {
            let (l, r) = state.counts(now);
            evaluation.left_count = l;
            evaluation.right_count = r;
            return evaluation;
        };

        let left_angle = landmarks.angle(&self.left);
        let right_angle = landmarks.angle(&self.right);
        for (angle, at) in left_angle.iter().chain(right_angle.iter()) {
            evaluation.overlay.push(angle_label(*at, *angle));
        }

        match self.tracking {
            Tracking::PerSide => {
                let left_feedback = left_angle.and_then(|(angle, _)| self.advance(left, angle));
                let right_feedback = right_angle.and_then(|(angle, _)| self.advance(right, angle));
                evaluation.feedback = left_feedback.or(right_feedback).map(str::to_string);
            }
            Tracking::Combined => {
                let mean = match (left_angle, right_angle) {
                    (Some((l, _)), Some((r, _))) => Some((l + r) / 2.0),
                    (Some((angle, _)), None) | (None, Some((angle, _))) => Some(angle),
                    (None, None) => None,
                };
                evaluation.feedback = mean
                    .and_then(|angle| self.advance(left, angle))
                    .map(str::to_string);
            }
        }

        evaluation.left_count = left.count();
        evaluation.right_count = right.count();
        evaluation
    }
}

// ==============================================================================
// Plank
// ==============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PlankStrategy {
    pub band: HoldBand,
    pub milestone_interval: Duration,
}

pub static PLANK: PlankStrategy = PlankStrategy {
    band: HoldBand::new(160.0, 180.0),
    milestone_interval: Duration::from_secs(5),
};

impl ExerciseStrategy for PlankStrategy {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Plank
    }

    fn new_state(&self) -> ExerciseState {
        ExerciseState::Hold(HoldTimer::new(self.milestone_interval))
    }

    fn evaluate(&self, landmarks: &Landmarks, state: &mut ExerciseState, now: Instant) -> Evaluation {
        let mut evaluation = Evaluation {
            overlay: landmarks.skeleton(),
            ..Default::default()
        };

        let ExerciseState::Hold(timer) = state else {
            let (l, r) = state.counts(now);
            evaluation.left_count = l;
            evaluation.right_count = r;
            return evaluation;
        };

        // Whichever side of the body faces the camera is enough
        let left = landmarks.angle(&LEFT_BODY_LINE);
        let right = landmarks.angle(&RIGHT_BODY_LINE);
        let body_line = match (left, right) {
            (Some((l, at)), Some((r, _))) => Some(((l + r) / 2.0, at)),
            (Some(side), None) | (None, Some(side)) => Some(side),
            (None, None) => None,
        };

        if let Some((angle, at)) = body_line {
            let color = if self.band.contains(angle) { GREEN } else { RED };
            evaluation.overlay.push(OverlayItem::Label {
                at,
                text: format!("{:.0}", angle),
                color,
            });

            evaluation.feedback = match timer.update(angle, &self.band, now) {
                Some(HoldEvent::Started) => Some("Hold it! Keep your body straight".to_string()),
                Some(HoldEvent::Milestone { seconds }) => {
                    evaluation.milestones.push(seconds);
                    Some(format!("{}s held, keep going!", seconds))
                }
                Some(HoldEvent::Broken { .. }) => {
                    Some("Form broken! Straighten your body".to_string())
                }
                None => None,
            };
        }

        evaluation.left_count = timer.total_held_secs(now);
        evaluation.right_count = timer.total_milestones();
        evaluation
    }
}

/// Strategy for an exercise kind
pub fn strategy_for(kind: ExerciseKind) -> &'static dyn ExerciseStrategy {
    if kind == ExerciseKind::Plank {
        return &PLANK;
    }

    REP_STRATEGIES
        .iter()
        .find(|strategy| strategy.kind == kind)
        .map(|strategy| strategy as &'static dyn ExerciseStrategy)
        .unwrap_or(&PLANK)
}
