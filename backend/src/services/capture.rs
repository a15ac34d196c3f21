//! Capture session registry
//!
//! Holds open boundary captures. Each session sits behind its own mutex so
//! manual edits and samples from a followed position source apply one at a
//! time, each updating points and area together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    CaptureMode, CaptureSession, CaptureSnapshot, CropType, Field, FieldMetadata, GeoPoint,
    PositionSample, SampleOutcome,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{PositionError, PositionSource};
use crate::services::FieldService;

/// Something that happened to a session outside a direct request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaptureEvent {
    pub at: DateTime<Utc>,
    pub kind: CaptureEventKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEventKind {
    /// The position source failed; the session continues in manual mode
    PositionSourceUnavailable,
    /// The position source ended normally
    PositionSourceEnded,
}

/// Acquisition mode requested by a client
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureModeKind {
    #[default]
    Manual,
    Continuous,
}

/// Input for opening a capture session
#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionInput {
    #[serde(default)]
    pub mode: CaptureModeKind,
    /// Continuous mode only; the configured default when omitted
    pub min_displacement_meters: Option<f64>,
    pub name: String,
    pub crop_type: Option<CropType>,
    pub notes: Option<String>,
}

/// Input for placing or moving a point
#[derive(Debug, Deserialize)]
pub struct PointInput {
    pub latitude: f64,
    pub longitude: f64,
}

/// Input for switching a session to manual mode
#[derive(Debug, Default, Deserialize)]
pub struct FallbackInput {
    pub reason: Option<String>,
}

/// Session as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct CaptureView {
    pub id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub snapshot: CaptureSnapshot,
    pub following_position_source: bool,
    pub events: Vec<CaptureEvent>,
}

struct SessionState {
    session: CaptureSession,
    metadata: FieldMetadata,
    events: Vec<CaptureEvent>,
    follower: Option<JoinHandle<()>>,
    last_activity: Instant,
    /// Set once the session is finalized, cancelled or expired
    closed: bool,
}

impl SessionState {
    fn view(&self, id: Uuid) -> CaptureView {
        CaptureView {
            id,
            name: self.metadata.name.clone(),
            snapshot: self.session.snapshot(),
            following_position_source: self
                .follower
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
            events: self.events.clone(),
        }
    }

    fn stop_following(&mut self) {
        if let Some(handle) = self.follower.take() {
            handle.abort();
        }
    }

    fn close(&mut self) {
        self.stop_following();
        self.closed = true;
    }
}

type SharedSession = Arc<Mutex<SessionState>>;

/// Open capture sessions by id
pub struct CaptureRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    default_min_displacement_meters: f64,
}

impl CaptureRegistry {
    pub fn new(default_min_displacement_meters: f64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_min_displacement_meters,
        }
    }

    async fn session(&self, id: Uuid) -> AppResult<SharedSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| session_not_found(id))
    }

    /// Lock an open session and mark it active
    ///
    /// A caller that queued behind a finalize or cancel gets `NotFound`.
    async fn lock_open(&self, id: Uuid) -> AppResult<OwnedMutexGuard<SessionState>> {
        let session = self.session(id).await?;
        let mut state = session.lock_owned().await;
        if state.closed {
            return Err(session_not_found(id));
        }
        state.last_activity = Instant::now();
        Ok(state)
    }

    /// Open a new session
    pub async fn open(&self, input: OpenSessionInput) -> AppResult<CaptureView> {
        shared::validate_field_name(&input.name)
            .map_err(|e| AppError::validation("name", e, "खेत का नाम मान्य नहीं है"))?;

        let mode = match input.mode {
            CaptureModeKind::Manual => CaptureMode::Manual,
            CaptureModeKind::Continuous => CaptureMode::Continuous {
                min_displacement_meters: input
                    .min_displacement_meters
                    .unwrap_or(self.default_min_displacement_meters),
            },
        };
        let session = CaptureSession::new(mode)?;

        let id = Uuid::new_v4();
        let state = SessionState {
            session,
            metadata: FieldMetadata {
                name: input.name,
                crop_type: input.crop_type,
                notes: input.notes,
            },
            events: Vec::new(),
            follower: None,
            last_activity: Instant::now(),
            closed: false,
        };
        let view = state.view(id);
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(state)));

        tracing::info!(session_id = %id, mode = mode.name(), "Capture session opened");
        Ok(view)
    }

    /// Continuous session using the configured displacement threshold
    pub async fn open_continuous(&self, name: impl Into<String>) -> AppResult<CaptureView> {
        self.open(OpenSessionInput {
            mode: CaptureModeKind::Continuous,
            name: name.into(),
            ..Default::default()
        })
        .await
    }

    pub async fn snapshot(&self, id: Uuid) -> AppResult<CaptureView> {
        let state = self.lock_open(id).await?;
        Ok(state.view(id))
    }

    pub async fn add_point(&self, id: Uuid, input: PointInput) -> AppResult<CaptureView> {
        let point = GeoPoint::new(input.latitude, input.longitude)?;
        let mut state = self.lock_open(id).await?;
        state.session.add_point(point)?;
        Ok(state.view(id))
    }

    /// Drag-adjust a point
    pub async fn move_point(&self, id: Uuid, index: usize, input: PointInput) -> AppResult<CaptureView> {
        let mut state = self.lock_open(id).await?;
        state
            .session
            .move_point(index, input.latitude, input.longitude)?;
        Ok(state.view(id))
    }

    pub async fn undo_last_point(&self, id: Uuid) -> AppResult<CaptureView> {
        let mut state = self.lock_open(id).await?;
        if state.session.undo_last_point().is_none() {
            return Err(AppError::validation(
                "points",
                "There is no point to remove",
                "हटाने के लिए कोई बिंदु नहीं है",
            ));
        }
        Ok(state.view(id))
    }

    /// Offer one position sample to a continuous session
    ///
    /// A session that already fell back to manual placement answers with
    /// [`AppError::PositionSourceUnavailable`].
    pub async fn ingest_sample(
        &self,
        id: Uuid,
        sample: PositionSample,
    ) -> AppResult<(SampleOutcome, CaptureView)> {
        let point = sample.into_point()?;
        let mut state = self.lock_open(id).await?;
        if let (CaptureMode::Manual, Some(reason)) =
            (state.session.mode(), state.session.fallback_reason())
        {
            return Err(AppError::PositionSourceUnavailable(reason.to_string()));
        }
        let outcome = state.session.ingest_sample(point)?;
        Ok((outcome, state.view(id)))
    }

    /// Continue a continuous session by hand
    pub async fn fall_back_to_manual(&self, id: Uuid, input: FallbackInput) -> AppResult<CaptureView> {
        let mut state = self.lock_open(id).await?;
        state.stop_following();
        state.session.fall_back_to_manual(
            input
                .reason
                .unwrap_or_else(|| "switched to manual placement".to_string()),
        );
        Ok(state.view(id))
    }

    /// Feed a continuous session from a position source in the background
    ///
    /// When the source fails the session switches to manual mode, keeps its
    /// points and records a [`CaptureEventKind::PositionSourceUnavailable`]
    /// event.
    pub async fn follow(&self, id: Uuid, mut source: Box<dyn PositionSource>) -> AppResult<()> {
        let session = self.session(id).await?;
        let mut state = session.lock().await;
        if state.closed {
            return Err(session_not_found(id));
        }
        if !matches!(state.session.mode(), CaptureMode::Continuous { .. }) {
            return Err(shared::GeometryError::CaptureModeMismatch {
                expected: "continuous",
            }
            .into());
        }
        state.stop_following();

        let task_session = Arc::clone(&session);
        let handle = tokio::spawn(async move {
            loop {
                match source.next_sample().await {
                    Ok(Some(sample)) => {
                        let mut state = task_session.lock().await;
                        if state.closed {
                            break;
                        }
                        state.last_activity = Instant::now();
                        let outcome = sample
                            .into_point()
                            .and_then(|point| state.session.ingest_sample(point));
                        match outcome {
                            Ok(SampleOutcome::Suppressed { distance_meters }) => {
                                tracing::debug!(
                                    session_id = %id,
                                    distance_meters,
                                    "Position sample suppressed"
                                );
                            }
                            Ok(SampleOutcome::Accepted { index }) => {
                                tracing::debug!(session_id = %id, index, "Position sample accepted");
                            }
                            Err(e) => {
                                tracing::warn!(session_id = %id, error = %e, "Position sample rejected");
                                if !matches!(state.session.mode(), CaptureMode::Continuous { .. }) {
                                    break;
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        let mut state = task_session.lock().await;
                        state.events.push(CaptureEvent {
                            at: Utc::now(),
                            kind: CaptureEventKind::PositionSourceEnded,
                            message: "position source ended".to_string(),
                        });
                        break;
                    }
                    Err(error) => {
                        fall_back_after(&task_session, id, error).await;
                        break;
                    }
                }
            }
        });
        state.follower = Some(handle);

        tracing::info!(session_id = %id, "Following position source");
        Ok(())
    }

    /// Validate the boundary and create a mapped field from it
    ///
    /// The session is closed only once the field is stored; on any error it
    /// stays open with its points so the user can retry. A second finalize
    /// queued behind a successful one gets `NotFound`, so one session never
    /// yields two fields.
    pub async fn finalize(&self, id: Uuid, fields: &FieldService) -> AppResult<Field> {
        let mut state = self.lock_open(id).await?;

        let finalized = state.session.finalize()?;
        let field = fields
            .create_field_with_boundary(state.metadata.clone(), Some(finalized.boundary))
            .await?;

        state.close();
        drop(state);
        self.sessions.write().await.remove(&id);

        tracing::info!(
            session_id = %id,
            field_id = %field.id,
            area_hectares = finalized.area_hectares,
            "Capture session finalized"
        );
        Ok(field)
    }

    /// Abandon a session; nothing is persisted
    pub async fn cancel(&self, id: Uuid) -> AppResult<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| session_not_found(id))?;
        session.lock().await.close();
        tracing::info!(session_id = %id, "Capture session cancelled");
        Ok(())
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions untouched for at least `max_idle`; nothing is persisted
    ///
    /// Sessions busy with a request are skipped. Returns how many expired.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let mut expired = Vec::new();
        for (id, session) in sessions.iter() {
            if let Ok(mut state) = session.try_lock() {
                if now.saturating_duration_since(state.last_activity) >= max_idle {
                    state.close();
                    expired.push(*id);
                }
            }
        }
        for id in &expired {
            sessions.remove(id);
            tracing::info!(session_id = %id, "Idle capture session expired");
        }
        expired.len()
    }

    /// Expire idle sessions every `period` in the background
    pub fn spawn_idle_sweeper(self: &Arc<Self>, max_idle: Duration, period: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.expire_idle(max_idle).await;
            }
        })
    }
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Capture session {}", id))
}

async fn fall_back_after(session: &SharedSession, id: Uuid, error: PositionError) {
    tracing::warn!(session_id = %id, error = %error, "Position source unavailable, falling back to manual capture");
    let mut state = session.lock().await;
    if state.closed {
        return;
    }
    let message = error.to_string();
    state.session.fall_back_to_manual(message.clone());
    state.events.push(CaptureEvent {
        at: Utc::now(),
        kind: CaptureEventKind::PositionSourceUnavailable,
        message,
    });
}
