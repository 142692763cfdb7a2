//! Wire types exchanged with the SwingLens API.
//!
//! - `Coach`, `Player`: identities returned by the login endpoints
//! - Auth request/response types for coach and player login
//! - Media types: `Video`, `Frame`, `Comparison`, `Feedback`
//! - `ReviewQueueItem`: entries in a coach's pending-review queue
//! - `ApiResponse`, `PaginatedResponse`: response envelopes
//!
//! With the `ts` feature enabled these also derive TypeScript definitions so
//! the web and mobile shells can share them.

pub mod auth;
pub mod common;
pub mod media;
pub mod person;
pub mod review;

pub use auth::{
    AuthTokenResponse, CoachLoginRequest, CoachLoginResponse, OtpSendRequest, OtpSendResponse,
    OtpVerifyRequest, PlayerOtpVerifyResponse,
};
pub use common::{ApiResponse, HealthStatus, PaginatedResponse, Pagination};
pub use media::{
    CameraAngle, Comparison, DeviationScore, DrillRecommendation, Feedback, FeedbackType, Frame,
    FrameImages, PriorityFix, Severity, Video, VideoStatus,
};
pub use person::{Coach, DominantHand, Player, SkillLevel};
pub use review::{QueuePlayer, ReviewQueueItem, ScoreBand};
