use super::{Dashboard, Feature};
use crate::model::StageSpec;
use serde::{Deserialize, Serialize};

/// One heat-map cell: the sentiment of a single department.
pub struct SentimentDashboard;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAnalysisRequest {
    pub department: String,
    pub include_team: bool,
}

impl SentimentAnalysisRequest {
    pub fn for_department(department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            include_team: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentDistribution {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamDynamics {
    pub collaboration_score: f64,
    pub communication_health: f64,
    pub psychological_safety: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSentiment {
    pub department: String,
    pub team_size: u32,
    pub average_sentiment: f64,
    pub sentiment_distribution: SentimentDistribution,
    pub team_morale: String,
    pub risk_employees: Vec<String>,
    pub top_concerns: Vec<String>,
    pub team_dynamics: TeamDynamics,
}

const STAGES: [StageSpec; 5] = [
    StageSpec {
        name: "sentiment_analyst",
        display_name: "Sentiment Analysis",
        working_message: "Scoring recent feedback…",
        done_message: "Sentiment scored",
    },
    StageSpec {
        name: "communication_analyst",
        display_name: "Communication Patterns",
        working_message: "Reading tone across team channels…",
        done_message: "Communication patterns mapped",
    },
    StageSpec {
        name: "pulse_specialist",
        display_name: "Pulse Survey Review",
        working_message: "Folding in pulse survey answers…",
        done_message: "Pulse results merged",
    },
    StageSpec {
        name: "behavior_analyst",
        display_name: "Behavioral Signals",
        working_message: "Checking absence and overtime signals…",
        done_message: "Behavioral risks flagged",
    },
    StageSpec {
        name: "sentiment_strategist",
        display_name: "Action Plan",
        working_message: "Drafting interventions…",
        done_message: "Action plan ready",
    },
];

const FACTS: [&str; 3] = [
    "Scores above 70 count as positive, below 40 as negative.",
    "Morale is rated high, moderate or low from the team average.",
    "High-risk employees are queued for a manager check-in.",
];

impl Dashboard for SentimentDashboard {
    type Request = SentimentAnalysisRequest;
    type Payload = TeamSentiment;

    const FEATURE: Feature = Feature::Sentiment;
    const ENDPOINT: &'static str = "/api/sentiment/analyze";

    fn stages() -> &'static [StageSpec] {
        &STAGES
    }

    fn facts() -> &'static [&'static str] {
        &FACTS
    }

    fn slot_key(request: &SentimentAnalysisRequest) -> String {
        request.department.clone()
    }

    fn summarize(p: &TeamSentiment) -> Vec<String> {
        let d = &p.sentiment_distribution;
        let mut lines = vec![
            format!(
                "{}: {} people, average {:.1} ({} morale)",
                p.department, p.team_size, p.average_sentiment, p.team_morale
            ),
            format!(
                "Positive {} / Neutral {} / Negative {}",
                d.positive, d.neutral, d.negative
            ),
            format!(
                "Collaboration {:.0}  Communication {:.0}  Safety {:.0}",
                p.team_dynamics.collaboration_score,
                p.team_dynamics.communication_health,
                p.team_dynamics.psychological_safety
            ),
        ];
        if !p.risk_employees.is_empty() {
            lines.push(format!("At risk: {}", p.risk_employees.join(", ")));
        }
        lines.extend(p.top_concerns.iter().map(|c| format!("  - {c}")));
        lines
    }
}
