//! Media playback session
//!
//! Lifecycle of a protected video stream over a platform [`MediaBackend`]:
//! license/media keys first, then the stream is attached, and `close` tears
//! both down. Errors never panic; they move the session to `Failed`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Media must be initialized before it is attached")]
    NotInitialized,

    #[error("Session is {0}")]
    InvalidState(String),

    #[error("License acquisition failed: {0}")]
    License(String),

    #[error("Playback failed: {0}")]
    Media(String),
}

/// Key system and license server for protected content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmConfig {
    pub key_system: String,
    pub license_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub url: String,
    pub drm: Option<DrmConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    Attached,
    Failed(String),
    Closed,
}

impl SessionState {
    fn describe(&self) -> String {
        match self {
            SessionState::Created => "not initialized".to_string(),
            SessionState::Initialized => "already initialized".to_string(),
            SessionState::Attached => "already attached".to_string(),
            SessionState::Failed(reason) => format!("failed ({})", reason),
            SessionState::Closed => "closed".to_string(),
        }
    }
}

/// Platform media API
#[async_trait]
pub trait MediaBackend: Send {
    /// Create media keys and acquire a license
    async fn setup_keys(&mut self, drm: &DrmConfig) -> Result<(), PlaybackError>;

    /// Load the stream into the player
    async fn attach(&mut self, url: &str) -> Result<(), PlaybackError>;

    /// Release media keys and the stream
    async fn release(&mut self);
}

pub struct PlaybackSession<B> {
    backend: B,
    source: MediaSource,
    state: SessionState,
}

impl<B: MediaBackend> PlaybackSession<B> {
    pub fn new(backend: B, source: MediaSource) -> Self {
        Self {
            backend,
            source,
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn fail(&mut self, err: PlaybackError) -> PlaybackError {
        warn!("Playback of {} failed: {}", self.source.url, err);
        self.state = SessionState::Failed(err.to_string());
        err
    }

    /// Set up media keys when the source is protected
    pub async fn initialize(&mut self) -> Result<(), PlaybackError> {
        if self.state != SessionState::Created {
            return Err(PlaybackError::InvalidState(self.state.describe()));
        }

        if let Some(drm) = self.source.drm.clone() {
            if let Err(e) = self.backend.setup_keys(&drm).await {
                return Err(self.fail(e));
            }
            debug!("Media keys ready ({})", drm.key_system);
        }

        self.state = SessionState::Initialized;
        Ok(())
    }

    pub async fn attach(&mut self) -> Result<(), PlaybackError> {
        match &self.state {
            SessionState::Initialized => {}
            SessionState::Created => return Err(PlaybackError::NotInitialized),
            other => return Err(PlaybackError::InvalidState(other.describe())),
        }

        let url = self.source.url.clone();
        if let Err(e) = self.backend.attach(&url).await {
            return Err(self.fail(e));
        }

        self.state = SessionState::Attached;
        Ok(())
    }

    /// Report an error raised by the player while streaming
    pub fn report_error(&mut self, err: PlaybackError) -> PlaybackError {
        self.fail(err)
    }

    /// Tear everything down; repeated calls do nothing
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.backend.release().await;
        self.state = SessionState::Closed;
    }
}

/// `j***@example.com` for `jane@example.com`; non-email names pass through
pub fn mask_email(viewer: &str) -> String {
    match viewer.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => viewer.to_string(),
    }
}

/// Overlay text identifying the viewer and the moment of playback
pub fn watermark_label(viewer: &str, at: DateTime<Utc>) -> String {
    format!(
        "{} · {}",
        mask_email(viewer),
        at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Default)]
    struct FakeBackend {
        fail_license: bool,
        fail_attach: bool,
        calls: Vec<&'static str>,
    }

    #[async_trait]
    impl MediaBackend for FakeBackend {
        async fn setup_keys(&mut self, _drm: &DrmConfig) -> Result<(), PlaybackError> {
            self.calls.push("setup_keys");
            if self.fail_license {
                return Err(PlaybackError::License("403 from license server".to_string()));
            }
            Ok(())
        }

        async fn attach(&mut self, _url: &str) -> Result<(), PlaybackError> {
            self.calls.push("attach");
            if self.fail_attach {
                return Err(PlaybackError::Media("manifest not found".to_string()));
            }
            Ok(())
        }

        async fn release(&mut self) {
            self.calls.push("release");
        }
    }

    fn protected_source() -> MediaSource {
        MediaSource {
            url: "https://cdn.example.com/session-1/master.m3u8".to_string(),
            drm: Some(DrmConfig {
                key_system: "com.widevine.alpha".to_string(),
                license_url: "https://license.example.com".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_attach_before_initialize_is_rejected() {
        let mut session = PlaybackSession::new(FakeBackend::default(), protected_source());
        assert_eq!(session.attach().await, Err(PlaybackError::NotInitialized));
        assert!(session.backend().calls.is_empty());
    }

    #[tokio::test]
    async fn test_full_lifecycle_and_idempotent_close() {
        let mut session = PlaybackSession::new(FakeBackend::default(), protected_source());
        session.initialize().await.unwrap();
        session.attach().await.unwrap();
        assert_eq!(session.state(), &SessionState::Attached);

        session.close().await;
        session.close().await;
        assert_eq!(session.state(), &SessionState::Closed);
        assert_eq!(session.backend().calls, vec!["setup_keys", "attach", "release"]);
    }

    #[tokio::test]
    async fn test_unprotected_source_skips_keys() {
        let source = MediaSource {
            url: "https://cdn.example.com/clip.mp4".to_string(),
            drm: None,
        };
        let mut session = PlaybackSession::new(FakeBackend::default(), source);
        session.initialize().await.unwrap();
        session.attach().await.unwrap();
        assert_eq!(session.backend().calls, vec!["attach"]);
    }

    #[tokio::test]
    async fn test_license_failure_moves_to_failed_and_can_close() {
        let backend = FakeBackend {
            fail_license: true,
            ..Default::default()
        };
        let mut session = PlaybackSession::new(backend, protected_source());

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, PlaybackError::License(_)));
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert!(session.attach().await.is_err());

        session.close().await;
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn test_attach_failure_moves_to_failed() {
        let backend = FakeBackend {
            fail_attach: true,
            ..Default::default()
        };
        let mut session = PlaybackSession::new(backend, protected_source());
        session.initialize().await.unwrap();

        assert!(session.attach().await.is_err());
        assert_eq!(
            session.state(),
            &SessionState::Failed("Playback failed: manifest not found".to_string())
        );
    }

    #[test]
    fn test_watermark_label() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            watermark_label("jane@example.com", at),
            "j***@example.com · 2024-03-05 14:07:09 UTC"
        );
        assert_eq!(mask_email("Observer 2"), "Observer 2");
    }
}
