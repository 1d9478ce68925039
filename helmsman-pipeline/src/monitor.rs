//! Monitoring session wrapper
//!
//! Tracks the pipeline's stages locally and mirrors them to the
//! monitoring backend when one is reachable. Monitoring is strictly
//! best-effort: every backend failure is logged and swallowed, and a
//! pipeline run behaves identically with monitoring disabled.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use helmsman_client::{ClientError, MonitorClient};
use helmsman_core::domain::stage::{
    LogLevel, SessionStatus, StageHandle, StageRecord, StageStatus,
};

/// Monitoring backend operations the session performs
#[async_trait]
pub trait MonitorBackend: Send + Sync {
    async fn create_session(
        &self,
        project_name: &str,
        pipeline_name: &str,
        description: &str,
    ) -> Result<String, ClientError>;

    async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: &str,
    ) -> Result<(), ClientError>;

    async fn create_stage(
        &self,
        session_id: &str,
        name: &str,
        status: StageStatus,
        description: &str,
    ) -> Result<String, ClientError>;

    async fn update_stage(
        &self,
        session_id: &str,
        stage_id: &str,
        status: StageStatus,
        message: &str,
    ) -> Result<(), ClientError>;

    async fn append_log(
        &self,
        session_id: &str,
        message: &str,
        level: LogLevel,
        stage_id: Option<&str>,
    ) -> Result<(), ClientError>;

    async fn close_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        summary: &str,
        duration: Option<i64>,
    ) -> Result<(), ClientError>;
}

#[async_trait]
impl MonitorBackend for MonitorClient {
    async fn create_session(
        &self,
        project_name: &str,
        pipeline_name: &str,
        description: &str,
    ) -> Result<String, ClientError> {
        MonitorClient::create_session(self, project_name, pipeline_name, description).await
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: &str,
    ) -> Result<(), ClientError> {
        MonitorClient::update_status(self, session_id, status, message).await
    }

    async fn create_stage(
        &self,
        session_id: &str,
        name: &str,
        status: StageStatus,
        description: &str,
    ) -> Result<String, ClientError> {
        MonitorClient::create_stage(self, session_id, name, status, description).await
    }

    async fn update_stage(
        &self,
        session_id: &str,
        stage_id: &str,
        status: StageStatus,
        message: &str,
    ) -> Result<(), ClientError> {
        MonitorClient::update_stage(self, session_id, stage_id, status, message).await
    }

    async fn append_log(
        &self,
        session_id: &str,
        message: &str,
        level: LogLevel,
        stage_id: Option<&str>,
    ) -> Result<(), ClientError> {
        MonitorClient::append_log(self, session_id, message, level, stage_id).await
    }

    async fn close_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        summary: &str,
        duration: Option<i64>,
    ) -> Result<(), ClientError> {
        MonitorClient::close_session(self, session_id, status, summary, duration).await
    }
}

/// One pipeline run's monitoring state
pub struct MonitoringSession {
    backend: Option<Arc<dyn MonitorBackend>>,
    session_id: Option<String>,
    stages: Vec<StageRecord>,
    closed: bool,
    opened_at: DateTime<Utc>,
}

impl MonitoringSession {
    /// A session that tracks stages locally and reports nowhere
    pub fn disabled() -> Self {
        Self {
            backend: None,
            session_id: None,
            stages: Vec::new(),
            closed: false,
            opened_at: Utc::now(),
        }
    }

    /// Opens a backend session, degrading to disabled if creation fails
    pub async fn open(
        backend: Arc<dyn MonitorBackend>,
        project_name: &str,
        pipeline_name: &str,
        description: &str,
    ) -> Self {
        match backend
            .create_session(project_name, pipeline_name, description)
            .await
        {
            Ok(session_id) => {
                debug!("Monitoring session '{}' opened", session_id);
                Self {
                    backend: Some(backend),
                    session_id: Some(session_id),
                    stages: Vec::new(),
                    closed: false,
                    opened_at: Utc::now(),
                }
            }
            Err(e) => {
                warn!("Could not open monitoring session, continuing without: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.backend.is_some() && self.session_id.is_some()
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    fn live(&self) -> Option<(&Arc<dyn MonitorBackend>, &str)> {
        match (&self.backend, &self.session_id) {
            (Some(backend), Some(id)) => Some((backend, id.as_str())),
            _ => None,
        }
    }

    /// Reports the overall session status
    pub async fn set_status(&self, status: SessionStatus, message: &str) {
        if let Some((backend, id)) = self.live() {
            if let Err(e) = backend.update_status(id, status, message).await {
                warn!("Could not update session status: {}", e);
            }
        }
    }

    /// Starts a stage and returns its handle
    ///
    /// Starting a stage whose name is already running force-fails the
    /// earlier record first, so at most one record per name is running.
    pub async fn begin_stage(&mut self, name: &str, description: &str) -> StageHandle {
        let stale = self
            .stages
            .iter()
            .position(|s| s.name == name && s.status == StageStatus::Running);
        if let Some(index) = stale {
            warn!("Stage '{}' started twice, failing the earlier run", name);
            let handle = self.stages[index].handle.clone();
            self.end_stage(&handle, StageStatus::Failed, "superseded by a restart")
                .await;
        }

        let handle = match self.live() {
            Some((backend, id)) => {
                match backend
                    .create_stage(id, name, StageStatus::Running, description)
                    .await
                {
                    Ok(stage_id) => StageHandle::Remote(stage_id),
                    Err(e) => {
                        warn!("Could not register stage '{}': {}", name, e);
                        StageHandle::Local(name.to_string())
                    }
                }
            }
            None => StageHandle::Local(name.to_string()),
        };

        self.stages.push(StageRecord::started(name, handle.clone()));
        handle
    }

    /// Moves a stage into a terminal status
    ///
    /// A handle whose record is already terminal is ignored entirely, so
    /// a late second end can never revert the backend's copy either.
    pub async fn end_stage(&mut self, handle: &StageHandle, status: StageStatus, message: &str) {
        match self
            .stages
            .iter_mut()
            .rev()
            .find(|s| &s.handle == handle && !s.status.is_terminal())
        {
            Some(record) => record.finish(status, message),
            None => {
                debug!("Stage '{}' already terminal, dropping late end", handle.id());
                return;
            }
        }

        if let StageHandle::Remote(stage_id) = handle {
            if let Some((backend, id)) = self.live() {
                if let Err(e) = backend.update_stage(id, stage_id, status, message).await {
                    warn!("Could not update stage '{}': {}", stage_id, e);
                }
            }
        }
    }

    /// Mirrors a log line to the backend, optionally tied to a stage
    pub async fn append_log(&self, message: &str, level: LogLevel, stage: Option<&StageHandle>) {
        if let Some((backend, id)) = self.live() {
            let stage_id = stage.map(StageHandle::id);
            if let Err(e) = backend.append_log(id, message, level, stage_id).await {
                warn!("Could not append session log: {}", e);
            }
        }
    }

    /// Closes the session; further closes are no-ops
    pub async fn close(&mut self, status: SessionStatus, summary: &str) {
        if self.closed {
            debug!("Monitoring session already closed");
            return;
        }
        self.closed = true;

        if let Some((backend, id)) = self.live() {
            let duration = (Utc::now() - self.opened_at).num_seconds();
            if let Err(e) = backend
                .close_session(id, status, summary, Some(duration))
                .await
            {
                warn!("Could not close monitoring session: {}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Event {
        Created,
        Status(SessionStatus),
        StageCreated(String),
        StageUpdated(String, StageStatus),
        Log(String),
        Closed(SessionStatus),
    }

    struct RecordingBackend {
        events: Mutex<Vec<Event>>,
        fail_create_session: bool,
        fail_create_stage: bool,
        next_stage_id: Mutex<u32>,
    }

    impl RecordingBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                fail_create_session: false,
                fail_create_stage: false,
                next_stage_id: Mutex::new(0),
            })
        }

        fn failing_sessions() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                fail_create_session: true,
                fail_create_stage: false,
                next_stage_id: Mutex::new(0),
            })
        }

        fn failing_stages() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                fail_create_session: false,
                fail_create_stage: true,
                next_stage_id: Mutex::new(0),
            })
        }

        fn events(&self) -> Vec<Event> {
            std::mem::take(&mut self.events.lock().unwrap())
        }
    }

    #[async_trait]
    impl MonitorBackend for RecordingBackend {
        async fn create_session(
            &self,
            _project_name: &str,
            _pipeline_name: &str,
            _description: &str,
        ) -> Result<String, ClientError> {
            if self.fail_create_session {
                return Err(ClientError::ParseError("down".to_string()));
            }
            self.events.lock().unwrap().push(Event::Created);
            Ok("sess-1".to_string())
        }

        async fn update_status(
            &self,
            _session_id: &str,
            status: SessionStatus,
            _message: &str,
        ) -> Result<(), ClientError> {
            self.events.lock().unwrap().push(Event::Status(status));
            Ok(())
        }

        async fn create_stage(
            &self,
            _session_id: &str,
            name: &str,
            _status: StageStatus,
            _description: &str,
        ) -> Result<String, ClientError> {
            if self.fail_create_stage {
                return Err(ClientError::ParseError("down".to_string()));
            }
            let mut next = self.next_stage_id.lock().unwrap();
            *next += 1;
            self.events
                .lock()
                .unwrap()
                .push(Event::StageCreated(name.to_string()));
            Ok(format!("stg-{}", next))
        }

        async fn update_stage(
            &self,
            _session_id: &str,
            stage_id: &str,
            status: StageStatus,
            _message: &str,
        ) -> Result<(), ClientError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::StageUpdated(stage_id.to_string(), status));
            Ok(())
        }

        async fn append_log(
            &self,
            _session_id: &str,
            message: &str,
            _level: LogLevel,
            _stage_id: Option<&str>,
        ) -> Result<(), ClientError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::Log(message.to_string()));
            Ok(())
        }

        async fn close_session(
            &self,
            _session_id: &str,
            status: SessionStatus,
            _summary: &str,
            _duration: Option<i64>,
        ) -> Result<(), ClientError> {
            self.events.lock().unwrap().push(Event::Closed(status));
            Ok(())
        }
    }

    #[tokio::test]
    async fn stages_are_mirrored_to_the_backend() {
        let backend = RecordingBackend::new();
        let mut session =
            MonitoringSession::open(backend.clone(), "svc", "pipeline", "run").await;
        assert!(session.is_live());

        let handle = session.begin_stage("Analyze", "analyze the document").await;
        assert!(handle.is_remote());
        session
            .end_stage(&handle, StageStatus::Success, "done")
            .await;
        session.close(SessionStatus::Success, "all good").await;

        let events = backend.events();
        assert_eq!(
            events,
            vec![
                Event::Created,
                Event::StageCreated("Analyze".to_string()),
                Event::StageUpdated("stg-1".to_string(), StageStatus::Success),
                Event::Closed(SessionStatus::Success),
            ]
        );
    }

    #[tokio::test]
    async fn open_failure_degrades_to_a_local_session() {
        let backend = RecordingBackend::failing_sessions();
        let mut session =
            MonitoringSession::open(backend.clone(), "svc", "pipeline", "run").await;
        assert!(!session.is_live());

        let handle = session.begin_stage("Analyze", "analyze").await;
        assert!(!handle.is_remote());
        session
            .end_stage(&handle, StageStatus::Failed, "boom")
            .await;

        // Local tracking still works
        assert_eq!(session.stages().len(), 1);
        assert_eq!(session.stages()[0].status, StageStatus::Failed);
        assert!(backend.events().is_empty());
    }

    #[tokio::test]
    async fn stage_registration_failure_falls_back_to_a_local_handle() {
        let backend = RecordingBackend::failing_stages();
        let mut session =
            MonitoringSession::open(backend.clone(), "svc", "pipeline", "run").await;
        assert!(session.is_live());

        let handle = session.begin_stage("Build", "build").await;
        assert_eq!(handle, StageHandle::Local("Build".to_string()));
        session
            .end_stage(&handle, StageStatus::Success, "done")
            .await;

        // The local record finished; no stage update went to the backend
        assert_eq!(session.stages()[0].status, StageStatus::Success);
        assert_eq!(backend.events(), vec![Event::Created]);
    }

    #[tokio::test]
    async fn restarting_a_running_stage_fails_the_earlier_record() {
        let backend = RecordingBackend::new();
        let mut session =
            MonitoringSession::open(backend.clone(), "svc", "pipeline", "run").await;

        let first = session.begin_stage("Build", "build").await;
        let second = session.begin_stage("Build", "build again").await;
        assert_ne!(first, second);

        let records: Vec<_> = session
            .stages()
            .iter()
            .map(|s| (s.name.clone(), s.status))
            .collect();
        assert_eq!(
            records,
            vec![
                ("Build".to_string(), StageStatus::Failed),
                ("Build".to_string(), StageStatus::Running),
            ]
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let backend = RecordingBackend::new();
        let mut session =
            MonitoringSession::open(backend.clone(), "svc", "pipeline", "run").await;

        session.close(SessionStatus::Failed, "first").await;
        session.close(SessionStatus::Success, "second").await;

        let closes = backend
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Closed(_)))
            .count();
        assert_eq!(closes, 1);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn late_end_does_not_reach_the_backend() {
        let backend = RecordingBackend::new();
        let mut session =
            MonitoringSession::open(backend.clone(), "svc", "pipeline", "run").await;

        let handle = session.begin_stage("Build", "build").await;
        session
            .end_stage(&handle, StageStatus::Failed, "boom")
            .await;
        session
            .end_stage(&handle, StageStatus::Success, "late")
            .await;

        assert_eq!(session.stages()[0].status, StageStatus::Failed);
        let updates: Vec<_> = backend
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::StageUpdated(..)))
            .collect();
        assert_eq!(
            updates,
            vec![Event::StageUpdated("stg-1".to_string(), StageStatus::Failed)]
        );
    }

    #[tokio::test]
    async fn terminal_stage_is_not_reopened_by_a_late_end() {
        let mut session = MonitoringSession::disabled();

        let handle = session.begin_stage("Notify", "notify").await;
        session
            .end_stage(&handle, StageStatus::Warning, "partial")
            .await;
        session
            .end_stage(&handle, StageStatus::Success, "late")
            .await;

        assert_eq!(session.stages()[0].status, StageStatus::Warning);
        assert_eq!(session.stages()[0].message, "partial");
    }
}
