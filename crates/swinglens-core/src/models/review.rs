use serde::{Deserialize, Serialize};

use super::common::deserialize_opt_decimal;

/// Player summary embedded in a queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct QueuePlayer {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub handicap: Option<f64>,
}

/// One swing waiting for coach review (`GET /api/v1/coach/queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ReviewQueueItem {
    pub id: String,
    #[serde(default)]
    pub video_id: Option<String>,
    pub player: QueuePlayer,
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub club_type: Option<String>,
    #[serde(default)]
    pub flagged_issue: Option<String>,
    pub uploaded_at: String,
}

/// Score band used to color queue badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
    Unscored,
}

impl ReviewQueueItem {
    pub fn score_band(&self) -> ScoreBand {
        match self.overall_score {
            None => ScoreBand::Unscored,
            Some(score) if score >= 80.0 => ScoreBand::Good,
            Some(score) if score >= 60.0 => ScoreBand::Fair,
            Some(_) => ScoreBand::Poor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(score: Option<f64>) -> ReviewQueueItem {
        ReviewQueueItem {
            id: "q1".to_string(),
            video_id: None,
            player: QueuePlayer {
                id: None,
                name: "Arjun Mehta".to_string(),
                handicap: None,
            },
            overall_score: score,
            club_type: None,
            flagged_issue: None,
            uploaded_at: "2025-03-01T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_score_band_thresholds() {
        assert_eq!(item(None).score_band(), ScoreBand::Unscored);
        assert_eq!(item(Some(80.0)).score_band(), ScoreBand::Good);
        assert_eq!(item(Some(79.9)).score_band(), ScoreBand::Fair);
        assert_eq!(item(Some(60.0)).score_band(), ScoreBand::Fair);
        assert_eq!(item(Some(42.0)).score_band(), ScoreBand::Poor);
    }

    #[test]
    fn test_parse_queue_item() {
        let json = r#"{
            "id": "q7", "video_id": "v7",
            "player": {"id": "p7", "name": "Kavya Iyer", "handicap": 4.2},
            "overall_score": 83, "club_type": "driver",
            "flagged_issue": "Over the top", "uploaded_at": "2025-03-02T11:15:00Z"
        }"#;
        let item: ReviewQueueItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.player.handicap, Some(4.2));
        assert_eq!(item.score_band(), ScoreBand::Good);
        assert_eq!(item.flagged_issue.as_deref(), Some("Over the top"));
    }
}
