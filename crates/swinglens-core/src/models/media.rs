use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum CameraAngle {
    /// Down the line
    Dtl,
    FaceOn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Uploading,
    Processing,
    Analyzed,
    Reviewed,
    Error,
}

impl VideoStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoStatus::Uploading => "Uploading",
            VideoStatus::Processing => "Processing",
            VideoStatus::Analyzed => "Analyzed",
            VideoStatus::Reviewed => "Reviewed",
            VideoStatus::Error => "Error",
        }
    }

    /// Whether server-side processing has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoStatus::Analyzed | VideoStatus::Reviewed | VideoStatus::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Video {
    pub id: String,
    pub player_id: String,
    pub s3_key: String,
    #[serde(default)]
    pub camera_angle: Option<CameraAngle>,
    #[serde(default)]
    pub club_type: Option<String>,
    pub status: VideoStatus,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub uploaded_at: String,
    #[serde(default)]
    pub processed_at: Option<String>,
}

/// Rendered images for one frame. The mobile app receives no skeleton layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FrameImages {
    pub raw: String,
    pub overlay: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Frame {
    pub id: String,
    pub video_id: String,
    pub swing_phase: String,
    pub frame_number: u32,
    pub images: FrameImages,
    #[serde(default)]
    pub joint_angles: HashMap<String, f64>,
    #[serde(default)]
    pub is_reference: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Minor,
    Major,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeviationScore {
    pub current: f64,
    pub reference: f64,
    pub delta: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Comparison {
    pub id: String,
    pub frame_id: String,
    pub reference_frame_id: String,
    #[serde(default)]
    pub deviation_scores: HashMap<String, DeviationScore>,
    pub overall_score: f64,
    #[serde(default)]
    pub ai_feedback_text: Option<String>,
    #[serde(default)]
    pub coach_feedback_text: Option<String>,
    #[serde(default)]
    pub coach_approved: Option<bool>,
}

impl Comparison {
    /// Joints with the worst severity first, ties broken by largest |delta|.
    pub fn worst_deviations(&self) -> Vec<(&str, &DeviationScore)> {
        let mut scores: Vec<(&str, &DeviationScore)> = self
            .deviation_scores
            .iter()
            .map(|(joint, score)| (joint.as_str(), score))
            .collect();
        scores.sort_by(|a, b| {
            b.1.severity
                .cmp(&a.1.severity)
                .then_with(|| b.1.delta.abs().total_cmp(&a.1.delta.abs()))
                .then_with(|| a.0.cmp(b.0))
        });
        scores
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    AiInstant,
    CoachReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DrillRecommendation {
    pub name: String,
    pub description: String,
    pub video_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PriorityFix {
    pub issue: String,
    pub phase: String,
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Feedback {
    pub id: String,
    pub video_id: String,
    pub player_id: String,
    #[serde(default)]
    pub coach_id: Option<String>,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub drill_recommendations: Vec<DrillRecommendation>,
    #[serde(default)]
    pub priority_fixes: Vec<PriorityFix>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: String,
}
