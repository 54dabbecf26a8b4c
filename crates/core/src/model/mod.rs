mod ids;
mod score;
mod session;

pub use ids::{ParseIdError, ProductId, ScenarioId, SessionId};
pub use score::{
    MAX_SCORE, ScoreBreakdown, ScoreError, SkillDimension, checked_overall, rounded_mean,
};
pub use session::{SessionRecord, SessionRecordDraft, SessionRecordError, SpeakerRole, Turn};
