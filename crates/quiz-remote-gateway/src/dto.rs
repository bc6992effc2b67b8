//! Wire types. All fields are camelCase JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsDto {
    #[serde(default)]
    pub total_quizzes_taken: i64,
    #[serde(default)]
    pub total_questions_answered: i64,
    #[serde(default)]
    pub total_correct_answers: i64,
    #[serde(default)]
    pub overall_accuracy: f64,
    #[serde(default)]
    pub current_streak: i64,
    #[serde(default)]
    pub longest_streak: i64,
    #[serde(default = "first_exam")]
    pub highest_unlocked_exam: i64,
    /// Comma-joined achievement IDs.
    #[serde(default)]
    pub unlocked_achievements: String,
}

fn first_exam() -> i64 {
    1
}

impl Default for UserStatsDto {
    fn default() -> Self {
        Self {
            total_quizzes_taken: 0,
            total_questions_answered: 0,
            total_correct_answers: 0,
            overall_accuracy: 0.0,
            current_streak: 0,
            longest_streak: 0,
            highest_unlocked_exam: first_exam(),
            unlocked_achievements: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSessionDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default = "completed")]
    pub is_completed: bool,
}

fn completed() -> bool {
    true
}

/// Snapshot pushed by an upload or backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub device_id: String,
    pub user_stats: Option<UserStatsDto>,
    pub quiz_sessions: Option<Vec<QuizSessionDto>>,
    /// Unix milliseconds.
    pub last_sync: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    #[serde(default)]
    pub stats_updated: bool,
    #[serde(default)]
    pub sessions_created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<SyncData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDownloadData {
    #[serde(default)]
    pub user_stats: Option<UserStatsDto>,
    #[serde(default)]
    pub quiz_sessions: Option<Vec<QuizSessionDto>>,
    #[serde(default)]
    pub server_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDownloadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<SyncDownloadData>,
}

/// Generic `{success, data, message, error}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Best human-readable explanation for a failed envelope.
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    #[serde(default)]
    pub rss: i64,
    #[serde(default, rename = "heapTotal")]
    pub heap_total: i64,
    #[serde(default, rename = "heapUsed")]
    pub heap_used: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub memory: Option<MemoryUsage>,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockStatusData {
    #[serde(default)]
    pub marathon_unlocked: bool,
    #[serde(default)]
    pub exams_unlocked: bool,
    #[serde(default)]
    pub current_progress: i64,
    #[serde(default)]
    pub required: i64,
    #[serde(default)]
    pub remaining: i64,
    #[serde(default)]
    pub percentage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamUnlockData {
    pub exam_number: i64,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub highest_unlocked: Option<i64>,
    #[serde(default)]
    pub correct_answers: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockExamRequest {
    pub device_id: String,
    pub exam_number: i64,
    pub score: i64,
    pub passed: bool,
}
