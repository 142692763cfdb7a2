use serde::{Deserialize, Serialize};

use super::common::deserialize_opt_decimal;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Coach {
    pub id: String,
    #[serde(default)]
    pub academy_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Pro,
    #[serde(other)]
    Unknown,
}

impl SkillLevel {
    pub fn display_name(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
            SkillLevel::Pro => "Pro",
            SkillLevel::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum DominantHand {
    #[default]
    Right,
    Left,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Player {
    pub id: String,
    #[serde(default)]
    pub academy_id: Option<String>,
    #[serde(default)]
    pub coach_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub phone: String,
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub handicap: Option<f64>,
    #[serde(default)]
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub dominant_hand: DominantHand,
    pub created_at: String,
}

impl Player {
    /// Newly auto-created players have an empty name until they fill a profile.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.phone
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_player_with_decimal_handicap() {
        let json = r#"{
            "id": "p1", "academy_id": null, "coach_id": "c1", "name": "Arjun",
            "phone": "+919876543210", "handicap": "12.4", "skill_level": "intermediate",
            "dominant_hand": "left", "created_at": "2025-02-01T08:30:00"
        }"#;
        let player: Player = serde_json::from_str(json).unwrap();
        assert_eq!(player.handicap, Some(12.4));
        assert_eq!(player.skill_level, SkillLevel::Intermediate);
        assert_eq!(player.dominant_hand, DominantHand::Left);
        assert_eq!(player.display_name(), "Arjun");
    }

    #[test]
    fn test_unrecognised_enum_values_fall_back() {
        let json = r#"{
            "id": "p3", "name": "Meera", "phone": "+919811111111",
            "skill_level": "Beginner", "dominant_hand": "ambidextrous",
            "created_at": "2025-02-01T08:30:00"
        }"#;
        let player: Player = serde_json::from_str(json).unwrap();
        assert_eq!(player.skill_level, SkillLevel::Unknown);
        assert_eq!(player.dominant_hand, DominantHand::Unknown);
    }

    #[test]
    fn test_new_player_display_name_falls_back_to_phone() {
        let json = r#"{
            "id": "p2", "name": "", "phone": "+919800000000", "handicap": null,
            "skill_level": "beginner", "dominant_hand": "right", "created_at": "2025-02-01T08:30:00"
        }"#;
        let player: Player = serde_json::from_str(json).unwrap();
        assert_eq!(player.display_name(), "+919800000000");
    }
}
