//! The four feature controllers behind one dispatch surface.

use crate::backend::BackendClient;
use crate::dashboards::{
    DashboardController, DashboardUpdate, Feature, LearningPathDashboard, LearningPathRequest,
    RetentionDashboard, RetentionRequest, ScheduleRequest, SchedulingDashboard,
    SentimentAnalysisRequest, SentimentDashboard,
};
use crate::model::{RunStatus, SyncConfig};
use anyhow::{bail, Result};
use tokio::sync::watch;

/// Request inputs shared by every dashboard, taken from the command line.
#[derive(Debug, Clone)]
pub(crate) struct RequestParams {
    pub date_range: String,
    pub locations: Vec<String>,
    pub departments: Vec<String>,
    pub constraints: Vec<String>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
}

impl RequestParams {
    fn schedule(&self) -> ScheduleRequest {
        ScheduleRequest {
            date_range: self.date_range.clone(),
            locations: self.locations.clone(),
            departments: self.departments.clone(),
            constraints: self.constraints.clone(),
        }
    }

    fn retention(&self) -> RetentionRequest {
        RetentionRequest {
            employee_id: self.employee_id.clone(),
            department: self.department.clone(),
        }
    }

    fn learning_path(&self) -> Result<LearningPathRequest> {
        let Some(employee_id) = self.employee_id.clone() else {
            bail!("learning paths need an employee (--employee-id)");
        };
        Ok(LearningPathRequest {
            employee_id,
            career_goals: serde_json::Map::new(),
        })
    }

    fn sentiment(&self) -> Result<SentimentAnalysisRequest> {
        match self.department.as_ref().or(self.departments.first()) {
            Some(dept) => Ok(SentimentAnalysisRequest::for_department(dept.clone())),
            None => bail!("sentiment analysis needs a department (--department)"),
        }
    }
}

pub(crate) struct Dashboards {
    params: RequestParams,
    scheduling: DashboardController<SchedulingDashboard>,
    retention: DashboardController<RetentionDashboard>,
    learning: DashboardController<LearningPathDashboard>,
    sentiment: DashboardController<SentimentDashboard>,
}

impl Dashboards {
    pub fn new(client: BackendClient, cfg: SyncConfig, params: RequestParams) -> Self {
        Self {
            params,
            scheduling: DashboardController::new(client.clone(), cfg.clone()),
            retention: DashboardController::new(client.clone(), cfg.clone()),
            learning: DashboardController::new(client.clone(), cfg.clone()),
            sentiment: DashboardController::new(client, cfg),
        }
    }

    /// Start a run for `feature`. `Ok(None)` means one is already in flight.
    pub fn start(&mut self, feature: Feature) -> Result<Option<u64>> {
        let run_id = match feature {
            Feature::Scheduling => self.scheduling.start(self.params.schedule()),
            Feature::Retention => self.retention.start(self.params.retention()),
            Feature::LearningPath => {
                let req = self.params.learning_path()?;
                self.learning.start(req)
            }
            Feature::Sentiment => {
                let req = self.params.sentiment()?;
                self.sentiment.start(req)
            }
        };
        if run_id.is_none() {
            tracing::debug!(%feature, "run already in flight; start ignored");
        }
        Ok(run_id)
    }

    pub fn cancel(&mut self, feature: Feature) {
        match feature {
            Feature::Scheduling => self.scheduling.cancel(),
            Feature::Retention => self.retention.cancel(),
            Feature::LearningPath => self.learning.cancel(),
            Feature::Sentiment => self.sentiment.cancel(),
        }
    }

    pub fn cancel_all(&mut self) {
        for feature in Feature::ALL {
            if self.status(feature).phase.is_in_flight() {
                self.cancel(feature);
            }
        }
    }

    pub fn status(&self, feature: Feature) -> RunStatus {
        match feature {
            Feature::Scheduling => self.scheduling.status(),
            Feature::Retention => self.retention.status(),
            Feature::LearningPath => self.learning.status(),
            Feature::Sentiment => self.sentiment.status(),
        }
    }

    /// Number of committed results held for `feature`.
    pub fn stored(&self, feature: Feature) -> usize {
        match feature {
            Feature::Scheduling => self.scheduling.slots().len(),
            Feature::Retention => self.retention.slots().len(),
            Feature::LearningPath => self.learning.slots().len(),
            Feature::Sentiment => self.sentiment.slots().len(),
        }
    }

    pub fn subscribe(&self, feature: Feature) -> watch::Receiver<RunStatus> {
        match feature {
            Feature::Scheduling => self.scheduling.subscribe(),
            Feature::Retention => self.retention.subscribe(),
            Feature::LearningPath => self.learning.subscribe(),
            Feature::Sentiment => self.sentiment.subscribe(),
        }
    }

    /// Wait for the next committed or failed run on any dashboard and file it into its slot.
    pub async fn next_update(&mut self) -> Option<DashboardUpdate> {
        loop {
            let update = tokio::select! {
                Some(o) = self.scheduling.next_outcome() => self.scheduling.apply(o),
                Some(o) = self.retention.next_outcome() => self.retention.apply(o),
                Some(o) = self.learning.next_outcome() => self.learning.apply(o),
                Some(o) = self.sentiment.next_outcome() => self.sentiment.apply(o),
                else => return None,
            };
            if let Some(DashboardUpdate::Committed { feature, slot, .. }) = &update {
                tracing::info!(%feature, %slot, stored = self.stored(*feature), "result committed");
            }
            if update.is_some() {
                return update;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params() -> RequestParams {
        RequestParams {
            date_range: "2024-01-01 to 2024-01-07".into(),
            locations: vec!["Store 1".into()],
            departments: vec!["Sales Floor".into(), "Electronics".into()],
            constraints: vec!["min_rest_hours".into()],
            employee_id: None,
            department: None,
        }
    }

    fn dashboards(params: RequestParams) -> Dashboards {
        let client = BackendClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        Dashboards::new(client, SyncConfig::default(), params)
    }

    #[test]
    fn sentiment_falls_back_to_first_department() {
        let req = params().sentiment().unwrap();
        assert_eq!(req.department, "Sales Floor");

        let mut p = params();
        p.department = Some("Electronics".into());
        assert_eq!(p.sentiment().unwrap().department, "Electronics");

        p.department = None;
        p.departments.clear();
        assert!(p.sentiment().is_err());
    }

    #[test]
    fn learning_path_requires_employee() {
        assert!(params().learning_path().is_err());
        let mut p = params();
        p.employee_id = Some("emp_1a2b3c4d".into());
        assert_eq!(p.learning_path().unwrap().employee_id, "emp_1a2b3c4d");
    }

    #[tokio::test(start_paused = true)]
    async fn dashboards_run_independently() {
        let mut d = dashboards(params());
        assert!(d.start(Feature::Scheduling).unwrap().is_some());
        assert!(d.start(Feature::Scheduling).unwrap().is_none());
        assert!(d.start(Feature::Retention).unwrap().is_some());
        assert!(d.start(Feature::LearningPath).is_err());

        d.cancel(Feature::Scheduling);
        assert!(!d.status(Feature::Scheduling).phase.is_in_flight());
        assert!(d.status(Feature::Retention).phase.is_in_flight());

        d.cancel_all();
        for feature in Feature::ALL {
            assert!(!d.status(feature).phase.is_in_flight());
            assert_eq!(d.stored(feature), 0);
        }
    }
}
