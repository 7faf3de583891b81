use super::{Dashboard, Feature};
use crate::model::StageSpec;
use serde::{Deserialize, Serialize};

pub struct LearningPathDashboard;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPathRequest {
    pub employee_id: String,
    #[serde(default)]
    pub career_goals: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningModule {
    pub module: String,
    pub status: String,
    pub completion: u8,
    pub estimated_hours: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningPath {
    pub employee_id: String,
    pub employee_name: String,
    pub current_role: String,
    pub target_role: String,
    pub learning_modules: Vec<LearningModule>,
    pub total_learning_hours: u32,
    pub estimated_completion: String,
    pub next_milestone: String,
    pub coach_recommendation: String,
}

const STAGES: [StageSpec; 5] = [
    StageSpec {
        name: "skills_analyst",
        display_name: "Skills Gap Analysis",
        working_message: "Comparing current skills with the target role…",
        done_message: "Skill gaps identified",
    },
    StageSpec {
        name: "experience_designer",
        display_name: "Path Design",
        working_message: "Sequencing modules into a learning path…",
        done_message: "Learning path designed",
    },
    StageSpec {
        name: "content_curator",
        display_name: "Content Curation",
        working_message: "Matching videos, workshops and mentoring…",
        done_message: "Content selected",
    },
    StageSpec {
        name: "progress_analyst",
        display_name: "Milestone Planning",
        working_message: "Setting checkpoints and completion targets…",
        done_message: "Milestones planned",
    },
    StageSpec {
        name: "career_coach",
        display_name: "Career Coaching",
        working_message: "Writing coaching recommendations…",
        done_message: "Coaching plan ready",
    },
];

const FACTS: [&str; 3] = [
    "Two focused hours a week is enough to close most skill gaps within a quarter.",
    "Mixing formats (video, workshop, mentoring) improves module completion.",
    "Paths target the next role up, not just the current job description.",
];

impl Dashboard for LearningPathDashboard {
    type Request = LearningPathRequest;
    type Payload = LearningPath;

    const FEATURE: Feature = Feature::LearningPath;
    const ENDPOINT: &'static str = "/api/agents/create-learning-path";

    fn stages() -> &'static [StageSpec] {
        &STAGES
    }

    fn facts() -> &'static [&'static str] {
        &FACTS
    }

    fn slot_key(request: &LearningPathRequest) -> String {
        request.employee_id.clone()
    }

    fn summarize(p: &LearningPath) -> Vec<String> {
        let mut lines = vec![
            format!(
                "{} ({}): {} -> {}",
                p.employee_name, p.employee_id, p.current_role, p.target_role
            ),
            format!(
                "{} hours, complete by {}",
                p.total_learning_hours, p.estimated_completion
            ),
        ];
        lines.extend(p.learning_modules.iter().map(|m| {
            format!(
                "  [{:>3}%] {} ({}h, {})",
                m.completion, m.module, m.estimated_hours, m.status
            )
        }));
        if !p.next_milestone.is_empty() {
            lines.push(format!("Next: {}", p.next_milestone));
        }
        if !p.coach_recommendation.is_empty() {
            lines.push(format!("Coach: {}", p.coach_recommendation));
        }
        lines
    }
}
