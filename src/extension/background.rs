use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::messages::{
    BackgroundRequest, BackgroundResponse, ErrorCode, ForegroundEvent, API_ERROR_MESSAGE,
    AUTH_REQUIRED_MESSAGE,
};
use super::{RequestHandler, Service};
use crate::errors::{AppError, Result};
use crate::models::Tone;
use crate::services::identity::IdentityResolver;
use crate::services::orchestrator::{Admission, Fulfilment, HumanizeOutcome, Orchestrator};

pub enum BackgroundMessage {
    Request {
        request: BackgroundRequest,
        response: oneshot::Sender<BackgroundResponse>,
    },
    /// Context-menu entry on a page selection; progress goes to `tab`.
    HumanizeSelection {
        selection: String,
        tab: mpsc::Sender<ForegroundEvent>,
    },
    /// Hands a page selection to the popup's input box.
    OpenInPopup { selection: String },
}

#[derive(Clone)]
pub struct BackgroundHandler {
    orchestrator: Arc<Orchestrator>,
    identity: Arc<dyn IdentityResolver>,
    popup: Option<mpsc::Sender<ForegroundEvent>>,
}

impl BackgroundHandler {
    pub fn new(orchestrator: Arc<Orchestrator>, identity: Arc<dyn IdentityResolver>) -> Self {
        BackgroundHandler {
            orchestrator,
            identity,
            popup: None,
        }
    }

    pub fn with_popup(mut self, popup: mpsc::Sender<ForegroundEvent>) -> Self {
        self.popup = Some(popup);
        self
    }

    async fn notify_popup(&self, event: ForegroundEvent) {
        if let Some(ref popup) = self.popup {
            // A closed popup simply misses the update.
            let _ = popup.send(event).await;
        }
    }

    async fn enhance_prompt(&self, prompt: &str, tone: Tone) -> BackgroundResponse {
        let outcome = match self
            .orchestrator
            .humanize(self.identity.as_ref(), prompt, tone)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Enhancement failed: {}", e);
                return BackgroundResponse::failed(ErrorCode::ApiError, API_ERROR_MESSAGE);
            }
        };

        match outcome {
            HumanizeOutcome::Humanized { text, quota } => {
                self.notify_popup(ForegroundEvent::WordsUpdated {
                    words_left: quota.words_left,
                })
                .await;
                BackgroundResponse::Enhanced { result: text }
            }
            HumanizeOutcome::AuthRequired => {
                BackgroundResponse::failed(ErrorCode::AuthRequired, AUTH_REQUIRED_MESSAGE)
            }
            HumanizeOutcome::Denied { message, .. } => {
                BackgroundResponse::failed(ErrorCode::InsufficientWords, message)
            }
            HumanizeOutcome::UpstreamFailed { .. } => {
                BackgroundResponse::failed(ErrorCode::ApiError, API_ERROR_MESSAGE)
            }
        }
    }

    async fn user_data(&self) -> BackgroundResponse {
        let user = match self.identity.resolve().await {
            Ok(email) => match self.orchestrator.store().get_or_create(&email).await {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(email = %email, "Failed to load user data: {}", e);
                    None
                }
            },
            Err(_) => None,
        };

        BackgroundResponse::UserData { user }
    }

    async fn humanize_selection(&self, selection: String, tab: mpsc::Sender<ForegroundEvent>) {
        let ticket = match self
            .orchestrator
            .admit(self.identity.as_ref(), &selection)
            .await
        {
            Ok(Admission::Granted(ticket)) => ticket,
            Ok(Admission::AuthRequired) => {
                let _ = tab.send(ForegroundEvent::AuthRequired).await;
                return;
            }
            Ok(Admission::Denied { message, .. }) => {
                let _ = tab.send(ForegroundEvent::InsufficientWords { message }).await;
                return;
            }
            Err(AppError::Validation(reason)) => {
                tracing::debug!("Selection rejected: {}", reason);
                let _ = tab
                    .send(ForegroundEvent::HumanizationFailed { text: selection })
                    .await;
                return;
            }
            Err(e) => {
                tracing::warn!("Could not admit selection: {}", e);
                let _ = tab.send(ForegroundEvent::AuthRequired).await;
                return;
            }
        };

        let _ = tab.send(ForegroundEvent::StartHumanizing).await;

        match self
            .orchestrator
            .fulfil(ticket, &selection, Tone::Default)
            .await
        {
            Fulfilment::Humanized { text, quota } => {
                let _ = tab.send(ForegroundEvent::CopyToClipboard { text }).await;
                self.notify_popup(ForegroundEvent::WordsUpdated {
                    words_left: quota.words_left,
                })
                .await;
            }
            Fulfilment::UpstreamFailed { original } => {
                let _ = tab
                    .send(ForegroundEvent::HumanizationFailed { text: original })
                    .await;
            }
        }
    }
}

#[async_trait]
impl RequestHandler<BackgroundMessage> for BackgroundHandler {
    async fn handle_request(&self, request: BackgroundMessage) {
        match request {
            BackgroundMessage::Request { request, response } => {
                let reply = match request {
                    BackgroundRequest::EnhancePrompt { prompt, tone } => {
                        self.enhance_prompt(&prompt, tone).await
                    }
                    BackgroundRequest::GetUserData | BackgroundRequest::RefreshUserData => {
                        self.user_data().await
                    }
                };
                let _ = response.send(reply);
            }
            BackgroundMessage::HumanizeSelection { selection, tab } => {
                self.humanize_selection(selection, tab).await;
            }
            BackgroundMessage::OpenInPopup { selection } => {
                self.notify_popup(ForegroundEvent::FillText { text: selection })
                    .await;
            }
        }
    }
}

pub struct BackgroundService;

impl BackgroundService {
    pub fn new() -> Self {
        BackgroundService
    }
}

impl Default for BackgroundService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<BackgroundMessage, BackgroundHandler> for BackgroundService {}

/// Sending half used by the UI surfaces.
#[derive(Clone)]
pub struct BackgroundClient {
    sender: mpsc::Sender<BackgroundMessage>,
}

impl BackgroundClient {
    /// Starts the background service on its own task.
    pub fn spawn(handler: BackgroundHandler, buffer: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(buffer);
        tokio::spawn(async move {
            let mut service = BackgroundService::new();
            service.run(handler, &mut receiver).await;
            tracing::debug!("Background service stopped");
        });

        BackgroundClient { sender }
    }

    async fn dispatch(&self, message: BackgroundMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("background service is not running")))
    }

    pub async fn request(&self, request: BackgroundRequest) -> Result<BackgroundResponse> {
        let (response, receiver) = oneshot::channel();
        self.dispatch(BackgroundMessage::Request { request, response })
            .await?;

        receiver
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to receive response: {}", e)))
    }

    pub async fn humanize_selection(
        &self,
        selection: impl Into<String>,
        tab: mpsc::Sender<ForegroundEvent>,
    ) -> Result<()> {
        self.dispatch(BackgroundMessage::HumanizeSelection {
            selection: selection.into(),
            tab,
        })
        .await
    }

    pub async fn open_in_popup(&self, selection: impl Into<String>) -> Result<()> {
        self.dispatch(BackgroundMessage::OpenInPopup {
            selection: selection.into(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserQuota;
    use crate::services::identity::MockIdentityResolver;
    use crate::services::metrics::MetricsService;
    use crate::services::quota_store::MemoryQuotaStore;
    use crate::services::upstream::MockTextGenerator;
    use chrono::Utc;

    const SELECTION: &str = "this sentence needs some help";

    fn signed_in() -> Arc<dyn IdentityResolver> {
        let mut identity = MockIdentityResolver::new();
        identity
            .expect_resolve()
            .returning(|| Ok("a@b.com".to_string()));
        Arc::new(identity)
    }

    fn signed_out() -> Arc<dyn IdentityResolver> {
        let mut identity = MockIdentityResolver::new();
        identity
            .expect_resolve()
            .returning(|| Err(AppError::AuthRequired));
        Arc::new(identity)
    }

    fn generator(reply: Result<&'static str>) -> MockTextGenerator {
        let mut generator = MockTextGenerator::new();
        match reply {
            Ok(text) => {
                generator
                    .expect_generate()
                    .returning(move |_| Ok(text.to_string()));
            }
            Err(_) => {
                generator
                    .expect_generate()
                    .returning(|_| Err(AppError::upstream(Some(502), "bad gateway")));
            }
        }
        generator
    }

    fn store(words_left: i64) -> Arc<MemoryQuotaStore> {
        let store = Arc::new(MemoryQuotaStore::new());
        let mut quota = UserQuota::new("a@b.com", Utc::now());
        quota.words_left = words_left;
        store.insert(quota);
        store
    }

    fn handler(
        store: Arc<MemoryQuotaStore>,
        generator: MockTextGenerator,
        identity: Arc<dyn IdentityResolver>,
    ) -> BackgroundHandler {
        let orchestrator = Arc::new(Orchestrator::new(
            store,
            Arc::new(generator),
            Arc::new(MetricsService::new()),
        ));
        BackgroundHandler::new(orchestrator, identity)
    }

    async fn drain(mut events: mpsc::Receiver<ForegroundEvent>) -> Vec<ForegroundEvent> {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            seen.push(event);
        }
        seen
    }

    fn enhance(prompt: &str) -> BackgroundRequest {
        BackgroundRequest::EnhancePrompt {
            prompt: prompt.to_string(),
            tone: Tone::Default,
        }
    }

    #[tokio::test]
    async fn enhance_prompt_returns_result_and_updates_popup() {
        let store = store(20);
        let (popup_tx, mut popup_rx) = mpsc::channel(8);
        let client = BackgroundClient::spawn(
            handler(store.clone(), generator(Ok("polished")), signed_in()).with_popup(popup_tx),
            8,
        );

        let response = client.request(enhance(SELECTION)).await.unwrap();
        assert_eq!(
            response,
            BackgroundResponse::Enhanced {
                result: "polished".into()
            }
        );
        assert_eq!(
            popup_rx.recv().await,
            Some(ForegroundEvent::WordsUpdated { words_left: 15 })
        );
        assert_eq!(store.get("a@b.com").unwrap().words_left, 15);
    }

    #[tokio::test]
    async fn enhance_prompt_reports_error_codes() {
        let client = BackgroundClient::spawn(
            handler(store(20), MockTextGenerator::new(), signed_out()),
            8,
        );
        assert_eq!(
            client.request(enhance(SELECTION)).await.unwrap(),
            BackgroundResponse::failed(ErrorCode::AuthRequired, AUTH_REQUIRED_MESSAGE)
        );

        let client = BackgroundClient::spawn(
            handler(store(2), MockTextGenerator::new(), signed_in()),
            8,
        );
        match client.request(enhance(SELECTION)).await.unwrap() {
            BackgroundResponse::Failed { error, message } => {
                assert_eq!(error, ErrorCode::InsufficientWords);
                assert!(message.contains("need 5"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }

        let store = store(20);
        let client = BackgroundClient::spawn(
            handler(store.clone(), generator(Err(AppError::NotFound)), signed_in()),
            8,
        );
        assert_eq!(
            client.request(enhance(SELECTION)).await.unwrap(),
            BackgroundResponse::failed(ErrorCode::ApiError, API_ERROR_MESSAGE)
        );
        assert_eq!(store.get("a@b.com").unwrap().words_left, 20);
    }

    #[tokio::test]
    async fn user_data_is_null_when_signed_out() {
        let client = BackgroundClient::spawn(
            handler(store(20), MockTextGenerator::new(), signed_out()),
            8,
        );
        assert_eq!(
            client.request(BackgroundRequest::GetUserData).await.unwrap(),
            BackgroundResponse::UserData { user: None }
        );

        let client = BackgroundClient::spawn(
            handler(store(20), MockTextGenerator::new(), signed_in()),
            8,
        );
        match client
            .request(BackgroundRequest::RefreshUserData)
            .await
            .unwrap()
        {
            BackgroundResponse::UserData { user: Some(user) } => assert_eq!(user.words_left, 20),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn context_menu_copies_rewrite() {
        let client = BackgroundClient::spawn(
            handler(store(20), generator(Ok("better sentence")), signed_in()),
            8,
        );
        let (tab, events) = mpsc::channel(8);
        client.humanize_selection(SELECTION, tab).await.unwrap();

        assert_eq!(
            drain(events).await,
            vec![
                ForegroundEvent::StartHumanizing,
                ForegroundEvent::CopyToClipboard {
                    text: "better sentence".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn context_menu_falls_back_to_original_on_failure() {
        let store = store(20);
        let client = BackgroundClient::spawn(
            handler(store.clone(), generator(Err(AppError::NotFound)), signed_in()),
            8,
        );
        let (tab, events) = mpsc::channel(8);
        client.humanize_selection(SELECTION, tab).await.unwrap();

        assert_eq!(
            drain(events).await,
            vec![
                ForegroundEvent::StartHumanizing,
                ForegroundEvent::HumanizationFailed {
                    text: SELECTION.into()
                },
            ]
        );
        assert_eq!(store.get("a@b.com").unwrap().total_words_used, 0);
    }

    #[tokio::test]
    async fn context_menu_refuses_without_auth_or_words() {
        let client = BackgroundClient::spawn(
            handler(store(20), MockTextGenerator::new(), signed_out()),
            8,
        );
        let (tab, events) = mpsc::channel(8);
        client.humanize_selection(SELECTION, tab).await.unwrap();
        assert_eq!(drain(events).await, vec![ForegroundEvent::AuthRequired]);

        let client = BackgroundClient::spawn(
            handler(store(1), MockTextGenerator::new(), signed_in()),
            8,
        );
        let (tab, events) = mpsc::channel(8);
        client.humanize_selection(SELECTION, tab).await.unwrap();
        let events = drain(events).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ForegroundEvent::InsufficientWords { .. }));
    }

    #[tokio::test]
    async fn blank_selection_is_returned_unchanged() {
        let store = store(20);
        let client = BackgroundClient::spawn(
            handler(store.clone(), MockTextGenerator::new(), signed_in()),
            8,
        );
        let (tab, events) = mpsc::channel(8);
        client.humanize_selection("   ", tab).await.unwrap();

        assert_eq!(
            drain(events).await,
            vec![ForegroundEvent::HumanizationFailed { text: "   ".into() }]
        );
        assert_eq!(store.get("a@b.com").unwrap().total_words_used, 0);
    }

    #[tokio::test]
    async fn context_menu_treats_lookup_failure_as_signed_out() {
        let mut identity = MockIdentityResolver::new();
        identity
            .expect_resolve()
            .returning(|| Err(AppError::upstream(Some(503), "userinfo unavailable")));
        let client = BackgroundClient::spawn(
            handler(store(20), MockTextGenerator::new(), Arc::new(identity)),
            8,
        );
        let (tab, events) = mpsc::channel(8);
        client.humanize_selection(SELECTION, tab).await.unwrap();
        assert_eq!(drain(events).await, vec![ForegroundEvent::AuthRequired]);
    }

    #[tokio::test]
    async fn selection_can_be_sent_to_the_popup() {
        let (popup_tx, mut popup_rx) = mpsc::channel(8);
        let client = BackgroundClient::spawn(
            handler(store(20), MockTextGenerator::new(), signed_in()).with_popup(popup_tx),
            8,
        );
        client.open_in_popup("draft text").await.unwrap();
        assert_eq!(
            popup_rx.recv().await,
            Some(ForegroundEvent::FillText {
                text: "draft text".into()
            })
        );
    }
}
