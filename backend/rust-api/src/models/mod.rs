pub mod attempt;
pub mod content;
pub mod hearts;
pub mod progress;

pub use attempt::{
    AttemptPhase, AttemptProgress, CurrentQuestionResponse, FinishQuizResponse, QuestionAttempt,
    QuizAttempt, StartQuizRequest, StartQuizResponse, SubmitAnswerRequest, SubmitAnswerResponse,
    SubmittedAnswer, XP_PER_CORRECT_ANSWER,
};
pub use content::{
    AnswerSpec, LessonDoc, Mode, Question, QuestionView, UnitDoc, MODES,
};
pub use hearts::{HeartsState, RegenInfo, UserHearts, DEFAULT_MAX_HEARTS, SECONDS_PER_HEART};
pub use progress::{
    HeartsSnapshot, LearningMapResponse, LessonModeRow, LessonOverviewResponse, ModeState,
    PlanetModeProgress, SkillModeRow, SkillModesResponse, SkillRow, SkillState, UnitProgress,
    UserProgressDoc, UserProgressResponse, PASS_THRESHOLD,
};
