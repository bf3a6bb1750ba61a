// Exercise catalog: stable identifiers, display names and instructions

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    #[serde(rename = "hummer")]
    HammerCurl,
    FrontRaise,
    Squat,
    #[serde(rename = "triceps")]
    TricepsExtension,
    Lunges,
    ShoulderPress,
    Plank,
    #[serde(rename = "side_lateral_raise")]
    LateralRaise,
    #[serde(rename = "triceps_kickback_side")]
    TricepsKickback,
    PushUps,
}

impl ExerciseKind {
    /// Get all supported exercises, in catalog order
    pub fn all() -> Vec<ExerciseKind> {
        vec![
            ExerciseKind::HammerCurl,
            ExerciseKind::FrontRaise,
            ExerciseKind::Squat,
            ExerciseKind::TricepsExtension,
            ExerciseKind::Lunges,
            ExerciseKind::ShoulderPress,
            ExerciseKind::Plank,
            ExerciseKind::LateralRaise,
            ExerciseKind::TricepsKickback,
            ExerciseKind::PushUps,
        ]
    }

    /// Client-facing identifier
    pub fn id(&self) -> &'static str {
        match self {
            ExerciseKind::HammerCurl => "hummer",
            ExerciseKind::FrontRaise => "front_raise",
            ExerciseKind::Squat => "squat",
            ExerciseKind::TricepsExtension => "triceps",
            ExerciseKind::Lunges => "lunges",
            ExerciseKind::ShoulderPress => "shoulder_press",
            ExerciseKind::Plank => "plank",
            ExerciseKind::LateralRaise => "side_lateral_raise",
            ExerciseKind::TricepsKickback => "triceps_kickback_side",
            ExerciseKind::PushUps => "push_ups",
        }
    }

    /// Parse a client-facing identifier. Matching is exact.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.id() == id)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExerciseKind::HammerCurl => "Bicep Curl (Hammer)",
            ExerciseKind::FrontRaise => "Dumbbell Front Raise",
            ExerciseKind::Squat => "Squat",
            ExerciseKind::TricepsExtension => "Triceps Extension",
            ExerciseKind::Lunges => "Lunges",
            ExerciseKind::ShoulderPress => "Shoulder Press",
            ExerciseKind::Plank => "Plank",
            ExerciseKind::LateralRaise => "Side Lateral Raise",
            ExerciseKind::TricepsKickback => "Triceps Kickback (Side View)",
            ExerciseKind::PushUps => "Push Ups",
        }
    }

    /// Form instructions shown on the simulation feed
    pub fn instructions(&self) -> &'static [&'static str] {
        match self {
            ExerciseKind::HammerCurl => &[
                "Stand with weights at your sides",
                "Curl the weights up to your shoulders",
                "Lower back down with control",
                "Keep elbows close to your body",
            ],
            ExerciseKind::Squat => &[
                "Stand with feet shoulder-width apart",
                "Lower your body as if sitting in a chair",
                "Keep back straight and knees over toes",
                "Return to standing position",
            ],
            ExerciseKind::FrontRaise => &[
                "Stand with weights at your sides",
                "Raise arms forward to shoulder height",
                "Hold briefly at the top",
                "Lower with control",
            ],
            ExerciseKind::PushUps => &[
                "Start in plank position, arms extended",
                "Lower body until chest nearly touches floor",
                "Push back up to starting position",
                "Keep body in straight line throughout",
            ],
            ExerciseKind::Plank => &[
                "Rest on forearms and toes",
                "Keep shoulders, hips and ankles in line",
                "Brace your core and breathe steadily",
            ],
            _ => &["See documentation for proper form"],
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Catalog entry returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseInfo {
    pub id: String,
    pub name: String,
}

impl From<ExerciseKind> for ExerciseInfo {
    fn from(kind: ExerciseKind) -> Self {
        Self {
            id: kind.id().to_string(),
            name: kind.display_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_roundtrip() {
        for kind in ExerciseKind::all() {
            assert_eq!(ExerciseKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(ExerciseKind::all().len(), 10);
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(ExerciseKind::from_id("deadlift"), None);
        assert_eq!(ExerciseKind::from_id("SQUAT"), None);
    }

    #[test]
    fn test_serde_uses_client_ids() {
        let json = serde_json::to_string(&ExerciseKind::TricepsKickback).unwrap();
        assert_eq!(json, "\"triceps_kickback_side\"");
        let parsed: ExerciseKind = serde_json::from_str("\"hummer\"").unwrap();
        assert_eq!(parsed, ExerciseKind::HammerCurl);
    }

    #[test]
    fn test_every_exercise_has_instructions() {
        for kind in ExerciseKind::all() {
            assert!(!kind.instructions().is_empty());
        }
    }
}
