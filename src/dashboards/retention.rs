use super::{percent, Dashboard, Feature};
use crate::model::StageSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub struct RetentionDashboard;

/// Either one employee, one department, or the whole workforce when both are empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionRequest {
    pub employee_id: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSummary {
    pub total_employees: u32,
    pub high_risk_count: u32,
    pub medium_risk_count: u32,
    pub low_risk_count: u32,
    /// Mean of the per-employee risk scores, 0..1.
    pub average_risk_score: f64,
    pub top_risk_factors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeRisk {
    pub employee_id: Option<String>,
    pub name: Option<String>,
    pub department: Option<String>,
    pub risk_score: f64,
    pub tenure_months: u32,
    pub satisfaction_score: f64,
    pub performance_score: f64,
    pub risk_factors: Vec<String>,
    pub interventions: Vec<String>,
    pub sentiment_trend: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionAnalysis {
    pub analysis_id: Option<String>,
    pub timestamp: Option<String>,
    pub employees: Vec<EmployeeRisk>,
    pub summary: RetentionSummary,
    /// Average risk score per department.
    pub department_trends: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// Employees listed in the summary, highest risk first.
const LISTED_EMPLOYEES: usize = 3;

const STAGES: [StageSpec; 5] = [
    StageSpec {
        name: "risk_analyst",
        display_name: "Retention Risk Analysis",
        working_message: "Scoring flight risk across the workforce…",
        done_message: "Risk scores assigned",
    },
    StageSpec {
        name: "engagement_specialist",
        display_name: "Engagement Assessment",
        working_message: "Reading engagement indicators…",
        done_message: "Engagement levels assessed",
    },
    StageSpec {
        name: "career_strategist",
        display_name: "Career Development",
        working_message: "Mapping growth paths for at-risk staff…",
        done_message: "Career strategies drafted",
    },
    StageSpec {
        name: "compensation_analyst",
        display_name: "Compensation Review",
        working_message: "Checking pay competitiveness and equity…",
        done_message: "Compensation gaps identified",
    },
    StageSpec {
        name: "retention_strategist",
        display_name: "Retention Strategy",
        working_message: "Synthesizing the retention plan…",
        done_message: "Retention strategy ready",
    },
];

const FACTS: [&str; 3] = [
    "Replacing a retail employee costs around $50,000 once hiring and training are counted.",
    "Limited growth opportunities are the most common reason people leave.",
    "A small retention investment per employee usually pays for itself within a year.",
];

impl Dashboard for RetentionDashboard {
    type Request = RetentionRequest;
    type Payload = RetentionAnalysis;

    const FEATURE: Feature = Feature::Retention;
    const ENDPOINT: &'static str = "/api/agents/analyze-retention";

    fn stages() -> &'static [StageSpec] {
        &STAGES
    }

    fn facts() -> &'static [&'static str] {
        &FACTS
    }

    fn slot_key(request: &RetentionRequest) -> String {
        match (&request.employee_id, &request.department) {
            (Some(id), _) => format!("employee:{id}"),
            (None, Some(dept)) => format!("department:{dept}"),
            (None, None) => "workforce".to_string(),
        }
    }

    fn summarize(p: &RetentionAnalysis) -> Vec<String> {
        let s = &p.summary;
        let mut lines = vec![
            format!(
                "Analysis: {}  Employees: {}",
                p.analysis_id.as_deref().unwrap_or("-"),
                s.total_employees
            ),
            format!(
                "High risk: {}  Medium: {}  Low: {}  Avg risk: {}",
                s.high_risk_count,
                s.medium_risk_count,
                s.low_risk_count,
                percent(s.average_risk_score)
            ),
        ];
        if !s.top_risk_factors.is_empty() {
            lines.push(format!("Top factors: {}", s.top_risk_factors.join(", ")));
        }

        let mut ranked: Vec<&EmployeeRisk> = p.employees.iter().collect();
        ranked.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        for e in ranked.into_iter().take(LISTED_EMPLOYEES) {
            let reason = e.risk_factors.first().map(String::as_str).unwrap_or("-");
            lines.push(format!(
                "  {} ({}) {}: {}",
                e.name.as_deref().or(e.employee_id.as_deref()).unwrap_or("?"),
                e.department.as_deref().unwrap_or("?"),
                percent(e.risk_score),
                reason
            ));
        }

        if let Some((dept, score)) = p
            .department_trends
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            lines.push(format!("Riskiest department: {dept} ({})", percent(*score)));
        }
        lines.extend(
            p.recommendations
                .iter()
                .filter(|r| !r.trim().is_empty())
                .map(|r| format!("- {}", r.trim())),
        );
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_prefers_employee_over_department() {
        let both = RetentionRequest {
            employee_id: Some("E7".into()),
            department: Some("Sales Floor".into()),
        };
        assert_eq!(RetentionDashboard::slot_key(&both), "employee:E7");
        let dept = RetentionRequest {
            employee_id: None,
            department: Some("Sales Floor".into()),
        };
        assert_eq!(RetentionDashboard::slot_key(&dept), "department:Sales Floor");
        assert_eq!(
            RetentionDashboard::slot_key(&RetentionRequest::default()),
            "workforce"
        );
    }

    fn analysis() -> RetentionAnalysis {
        serde_json::from_value(serde_json::json!({
            "analysis_id": "retention_20240501_093005",
            "timestamp": "2024-05-01T09:30:05",
            "employees": [
                {
                    "employee_id": "emp_1",
                    "name": "Ana Ruiz",
                    "department": "Sales Floor",
                    "risk_score": 0.45,
                    "tenure_months": 20,
                    "satisfaction_score": 3.2,
                    "performance_score": 3.9,
                    "risk_factors": ["Below average satisfaction"],
                    "interventions": ["Conduct engagement survey"],
                    "sentiment_trend": "stable"
                },
                {
                    "employee_id": "emp_2",
                    "name": "Ben Ode",
                    "department": "Electronics",
                    "risk_score": 0.9,
                    "tenure_months": 4,
                    "satisfaction_score": 2.5,
                    "performance_score": 3.1,
                    "risk_factors": ["Excessive overtime hours (burnout risk)", "Low job satisfaction score"],
                    "interventions": ["Review and redistribute workload"],
                    "sentiment_trend": "stable"
                }
            ],
            "summary": {
                "total_employees": 40,
                "high_risk_count": 9,
                "medium_risk_count": 12,
                "low_risk_count": 19,
                "average_risk_score": 0.42,
                "top_risk_factors": ["Compensation gaps", "Work-life balance"]
            },
            "department_trends": {"Sales Floor": 0.38, "Electronics": 0.61},
            "recommendations": ["Review workload distribution across teams", ""],
            "risk_factors": ["Compensation gaps", "Work-life balance"]
        }))
        .unwrap()
    }

    #[test]
    fn summary_lines_come_from_the_response_summary() {
        let lines = RetentionDashboard::summarize(&analysis());
        assert_eq!(
            lines,
            vec![
                "Analysis: retention_20240501_093005  Employees: 40".to_string(),
                "High risk: 9  Medium: 12  Low: 19  Avg risk: 42%".to_string(),
                "Top factors: Compensation gaps, Work-life balance".to_string(),
                "  Ben Ode (Electronics) 90%: Excessive overtime hours (burnout risk)".to_string(),
                "  Ana Ruiz (Sales Floor) 45%: Below average satisfaction".to_string(),
                "Riskiest department: Electronics (61%)".to_string(),
                "- Review workload distribution across teams".to_string(),
            ]
        );
    }

    #[test]
    fn employees_survive_reserialization() {
        let json = serde_json::to_value(analysis()).unwrap();
        assert_eq!(json["employees"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["employees"][1]["interventions"][0], "Review and redistribute workload");
        assert_eq!(json["summary"]["high_risk_count"], 9);
        assert_eq!(json["department_trends"]["Electronics"], 0.61);
    }
}
