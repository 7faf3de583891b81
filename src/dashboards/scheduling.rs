use super::{money, percent, Dashboard, Feature};
use crate::model::StageSpec;
use serde::{Deserialize, Serialize};

pub struct SchedulingDashboard;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub date_range: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shift {
    pub employee_id: String,
    pub employee_name: String,
    pub department: String,
    /// 0 = Monday.
    pub day: u8,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptimization {
    pub optimization_id: String,
    pub shifts: Vec<Shift>,
    pub total_shifts: u32,
    pub total_cost: f64,
    pub cost_savings: f64,
    pub coverage_score: f64,
    pub employee_satisfaction: f64,
    pub quality_score: f64,
    pub recommendations: Vec<String>,
    pub risks: Vec<String>,
    pub compliance_status: serde_json::Value,
}

const STAGES: [StageSpec; 5] = [
    StageSpec {
        name: "demand_forecaster",
        display_name: "Demand Forecasting",
        working_message: "Analyzing Prophet forecast…",
        done_message: "Customer demand allocated to departments",
    },
    StageSpec {
        name: "staff_optimizer",
        display_name: "Staff Optimization",
        working_message: "Creating optimal shift assignments…",
        done_message: "Shift assignments drafted",
    },
    StageSpec {
        name: "cost_analyst",
        display_name: "Cost Analysis",
        working_message: "Calculating labor costs…",
        done_message: "Labor cost and savings computed",
    },
    StageSpec {
        name: "compliance_checker",
        display_name: "Compliance Check",
        working_message: "Verifying break and overtime rules…",
        done_message: "Labor law compliance verified",
    },
    StageSpec {
        name: "quality_auditor",
        display_name: "Quality Audit",
        working_message: "Evaluating schedule quality…",
        done_message: "Schedule quality scored",
    },
];

const FACTS: [&str; 4] = [
    "Electronics traffic peaks on weekends; the Sales Floor stays steady all week.",
    "Store-wide demand comes from a Prophet forecast, then gets split per department.",
    "Schedules respect minimum rest hours between consecutive shifts.",
    "Overtime is flagged before it reaches payroll.",
];

impl Dashboard for SchedulingDashboard {
    type Request = ScheduleRequest;
    type Payload = ScheduleOptimization;

    const FEATURE: Feature = Feature::Scheduling;
    const ENDPOINT: &'static str = "/api/agents/optimize-schedule-crewai";

    fn stages() -> &'static [StageSpec] {
        &STAGES
    }

    fn facts() -> &'static [&'static str] {
        &FACTS
    }

    fn slot_key(request: &ScheduleRequest) -> String {
        request.date_range.clone()
    }

    fn summarize(p: &ScheduleOptimization) -> Vec<String> {
        let mut lines = vec![
            format!("Optimization: {}", p.optimization_id),
            format!(
                "Shifts: {}  Cost: {}  Savings: {}",
                p.total_shifts.max(p.shifts.len() as u32),
                money(p.total_cost),
                money(p.cost_savings)
            ),
            format!(
                "Coverage: {}  Satisfaction: {}  Quality: {:.1}/10",
                percent(p.coverage_score),
                percent(p.employee_satisfaction),
                p.quality_score
            ),
        ];
        lines.extend(p.recommendations.iter().map(|r| format!("  + {r}")));
        lines.extend(p.risks.iter().map(|r| format!("  ! {r}")));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_payload() {
        let raw = serde_json::json!({
            "optimization_id": "ai_opt_20240101_120000",
            "shifts": [{"employee_id": "E1", "department": "Electronics", "day": 5,
                        "start_time": "09:00", "end_time": "17:00", "hours": 8}],
            "total_shifts": 1,
            "total_cost": 12500.0,
            "cost_savings": 1800.4,
            "coverage_score": 0.91,
            "employee_satisfaction": 0.85,
            "quality_score": 7.5,
            "recommendations": ["Add a closer on Saturday"],
            "risks": ["No significant risks identified"],
            "agent_decisions": {"demand_confidence": 0.92}
        });
        let p: ScheduleOptimization = serde_json::from_value(raw).unwrap();
        assert_eq!(p.shifts[0].day, 5);

        let lines = SchedulingDashboard::summarize(&p);
        assert_eq!(lines[1], "Shifts: 1  Cost: $12,500  Savings: $1,800");
        assert_eq!(lines[2], "Coverage: 91%  Satisfaction: 85%  Quality: 7.5/10");
        assert!(lines.contains(&"  ! No significant risks identified".to_string()));
    }

    #[test]
    fn stage_names_are_unique() {
        let mut names: Vec<_> = STAGES.iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), STAGES.len());
    }
}
