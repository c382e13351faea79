//! Search session orchestration.
//!
//! Owns the view state, the request clients and the background work they
//! start. Only the session mutates state; background tasks report back over
//! channels and are applied by [`Session::next_update`].

use crate::ai::{GeminiGuideClient, GeminiImageClient, GuideService, ImageGenerationService};
use crate::controller::{Effect, GuideTicket, ItemKey, Phase, ViewState};
use crate::images::{ImageBoard, ImageCompletion, ImageSlot};
use crate::models::{Category, CityData, Config};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Where the view should move after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Results,
    Top,
}

/// Something visible changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Guide(Phase),
    Image { key: ItemKey, ready: bool },
}

/// Serializable view of everything on screen.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot<'a> {
    pub state: &'a ViewState,
    pub images: BTreeMap<String, &'a ImageSlot>,
}

type GuideOutcome = (GuideTicket, Result<CityData>);

enum Event {
    Guide(GuideOutcome),
    Image(ImageCompletion),
}

/// Sends the guide outcome exactly once. A task that unwinds or is aborted
/// before sending reports a request error instead, so nothing waits on it
/// forever; aborted tickets are already stale when that report arrives.
struct GuideReporter {
    ticket: GuideTicket,
    tx: Option<mpsc::UnboundedSender<GuideOutcome>>,
}

impl GuideReporter {
    fn send(mut self, result: Result<CityData>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send((self.ticket, result));
        }
    }
}

impl Drop for GuideReporter {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            debug!("Guide task ended without a result");
            let _ = tx.send((
                self.ticket,
                Err(Error::Request("Guide request ended without a result".to_string())),
            ));
        }
    }
}

pub struct Session {
    guide: Arc<dyn GuideService>,
    images: ImageBoard,
    state: ViewState,
    guide_task: Option<JoinHandle<()>>,
    guide_tx: mpsc::UnboundedSender<GuideOutcome>,
    guide_rx: mpsc::UnboundedReceiver<GuideOutcome>,
    auto_images: bool,
    scroll: Option<ScrollTarget>,
}

impl Session {
    pub fn new(guide: Arc<dyn GuideService>, image: Arc<dyn ImageGenerationService>) -> Self {
        let (guide_tx, guide_rx) = mpsc::unbounded_channel();
        Self {
            guide,
            images: ImageBoard::new(image),
            state: ViewState::new(),
            guide_task: None,
            guide_tx,
            guide_rx,
            auto_images: true,
            scroll: None,
        }
    }

    /// Build Gemini-backed clients sharing one connection pool.
    pub fn from_config(config: &Config) -> Self {
        let http_client = reqwest::Client::new();

        info!(
            "Guide model: {}, image model: {}",
            config.guide_model, config.image_model
        );

        let guide = GeminiGuideClient::new_with_client(
            config.gemini_api_key.clone(),
            config.guide_model.clone(),
            config.guide_timeout,
            http_client.clone(),
        )
        .with_base_url(config.base_url.clone());

        let image = GeminiImageClient::new_with_client(
            config.gemini_api_key.clone(),
            config.image_model.clone(),
            config.image_timeout,
            http_client,
        )
        .with_base_url(config.base_url.clone());

        Self::new(Arc::new(guide), Arc::new(image))
    }

    /// Generate images for items as soon as they are shown (on by default).
    pub fn with_auto_images(mut self, enabled: bool) -> Self {
        self.auto_images = enabled;
        self
    }

    /// Tab shown when a guide arrives, so its images are the first requested.
    pub fn with_start_tab(mut self, category: Category) -> Self {
        self.state = std::mem::take(&mut self.state).with_start_tab(category);
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn images(&self) -> &ImageBoard {
        &self.images
    }

    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot {
            state: &self.state,
            images: self
                .images
                .slots()
                .map(|(key, slot)| (key.to_string(), slot))
                .collect(),
        }
    }

    /// Pending viewport move, if a transition asked for one.
    pub fn take_scroll(&mut self) -> Option<ScrollTarget> {
        self.scroll.take()
    }

    pub fn set_query(&mut self, query: &str) -> bool {
        self.state.set_query(query)
    }

    /// Search for `query`. Returns `true` when a request was started.
    pub fn submit(&mut self, query: &str) -> bool {
        let effects = self.state.submit_query(query);
        let started = !effects.is_empty();
        self.run_effects(effects);
        started
    }

    pub fn reset(&mut self) {
        let effects = self.state.reset();
        self.run_effects(effects);
    }

    pub fn select_tab(&mut self, category: Category) -> bool {
        let effects = self.state.select_tab(category);
        let changed = !effects.is_empty();
        self.run_effects(effects);
        changed
    }

    /// Start the image for one item by hand (when automatic generation is off).
    pub fn request_image(&mut self, key: ItemKey) -> bool {
        match self.state.prompt_for(key) {
            Some(prompt) if self.state.phase == Phase::Ready => self.images.request(key, prompt),
            _ => false,
        }
    }

    /// Try a failed image again.
    pub fn retry_image(&mut self, key: ItemKey) -> bool {
        match self.state.prompt_for(key) {
            Some(prompt) if self.state.phase == Phase::Ready => self.images.retry(key, prompt),
            _ => false,
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchGuide { ticket, city } => self.spawn_guide(ticket, city),
                Effect::CancelPending => self.cancel_pending(),
                Effect::RequestImages => self.request_visible_images(),
                Effect::ScrollToResults => self.scroll = Some(ScrollTarget::Results),
                Effect::ScrollToTop => self.scroll = Some(ScrollTarget::Top),
            }
        }
    }

    fn spawn_guide(&mut self, ticket: GuideTicket, city: String) {
        if let Some(previous) = self.guide_task.take() {
            previous.abort();
        }
        let guide = Arc::clone(&self.guide);
        let reporter = GuideReporter {
            ticket,
            tx: Some(self.guide_tx.clone()),
        };
        self.guide_task = Some(tokio::spawn(async move {
            let result = guide.fetch_guide(&city).await;
            reporter.send(result);
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.guide_task.take() {
            if !task.is_finished() {
                debug!("Aborting in-flight guide request");
            }
            task.abort();
        }
        self.images.cancel_all();
    }

    fn request_visible_images(&mut self) {
        if !self.auto_images {
            return;
        }
        for item in self.state.visible_items() {
            self.images.request(item.key, item.prompt);
        }
    }

    fn apply(&mut self, event: Event) -> Option<Update> {
        match event {
            Event::Guide((ticket, result)) => {
                let current = self.state.is_current(ticket);
                let effects = self.state.complete(ticket, result);
                if !current {
                    return None;
                }
                self.guide_task = None;
                self.run_effects(effects);
                Some(Update::Guide(self.state.phase))
            }
            Event::Image(completion) => {
                let key = completion.key;
                if !self.images.apply(completion) {
                    return None;
                }
                let ready = matches!(self.images.slot(key), Some(ImageSlot::Ready(_)));
                Some(Update::Image { key, ready })
            }
        }
    }

    /// Wait for the next background result and apply it.
    ///
    /// Pends forever when nothing is in flight; callers either check first or
    /// race it against user input.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            let event = tokio::select! {
                Some(outcome) = self.guide_rx.recv() => Event::Guide(outcome),
                Some(completion) = self.images.recv() => Event::Image(completion),
                else => return None,
            };
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    /// Apply whatever has already arrived, without waiting.
    pub fn try_update(&mut self) -> Option<Update> {
        loop {
            let event = if let Ok(outcome) = self.guide_rx.try_recv() {
                Event::Guide(outcome)
            } else if let Some(completion) = self.images.try_recv() {
                Event::Image(completion)
            } else {
                return None;
            };
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    /// Pump updates until the guide request settles.
    pub async fn wait_for_guide(&mut self) -> Phase {
        while self.state.phase == Phase::Loading {
            if self.next_update().await.is_none() {
                break;
            }
        }
        self.state.phase
    }

    /// Pump updates until no image is loading.
    pub async fn wait_for_images(&mut self) {
        while self.images.in_flight() > 0 {
            if self.next_update().await.is_none() {
                break;
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.guide_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockGuideClient, MockGuideResponse, MockImageGenerationClient};
    use crate::controller::GUIDE_FAILURE_MESSAGE;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn session_with(guide: MockGuideClient, image: MockImageGenerationClient) -> Session {
        Session::new(Arc::new(guide), Arc::new(image))
    }

    #[tokio::test]
    async fn test_search_renders_ten_attractions() {
        let guide = MockGuideClient::new();
        let image = MockImageGenerationClient::new();
        let mut session = session_with(guide.clone(), image.clone());

        assert!(session.submit("Paris"));
        assert_eq!(session.state().phase, Phase::Loading);

        assert_eq!(session.wait_for_guide().await, Phase::Ready);
        assert_eq!(session.take_scroll(), Some(ScrollTarget::Results));

        let data = session.state().data.as_ref().unwrap();
        assert_eq!(data.city_name, "Paris");
        assert_eq!(data.attractions.len(), 10);

        // Landing image plus the ten attractions
        session.wait_for_images().await;
        assert_eq!(image.get_call_count(), 11);
        assert_eq!(guide.get_cities(), vec!["Paris".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_submit_stays_idle() {
        let guide = MockGuideClient::new();
        let mut session = session_with(guide.clone(), MockImageGenerationClient::new());

        assert!(!session.submit("   "));
        assert_eq!(session.state().phase, Phase::Idle);
        assert!(session.try_update().is_none());
        assert_eq!(guide.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_shows_error() {
        let guide = MockGuideClient::new().with_request_failure("connection refused");
        let image = MockImageGenerationClient::new();
        let mut session = session_with(guide, image.clone());

        session.submit("Nowhereville");
        assert_eq!(session.wait_for_guide().await, Phase::Error);

        let state = session.state();
        assert_eq!(state.error.as_deref(), Some(GUIDE_FAILURE_MESSAGE));
        assert!(state.data.is_none());
        assert_eq!(image.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_shows_error() {
        let guide = MockGuideClient::new()
            .with_response(MockGuideResponse::ParseFailure("not json".to_string()));
        let image = MockImageGenerationClient::new();
        let mut session = session_with(guide, image.clone());

        session.submit("Atlantis");
        assert_eq!(session.wait_for_guide().await, Phase::Error);
        assert_eq!(session.state().error.as_deref(), Some(GUIDE_FAILURE_MESSAGE));
        assert_eq!(image.get_call_count(), 0);
    }

    struct PanickingGuideService;

    #[async_trait::async_trait]
    impl GuideService for PanickingGuideService {
        async fn fetch_guide(&self, _city: &str) -> Result<CityData> {
            panic!("guide backend crashed");
        }
    }

    #[tokio::test]
    async fn test_panicked_guide_task_ends_in_error() {
        let mut session = Session::new(
            Arc::new(PanickingGuideService),
            Arc::new(MockImageGenerationClient::new()),
        );

        session.submit("Paris");
        assert_eq!(session.wait_for_guide().await, Phase::Error);
        assert_eq!(session.state().error.as_deref(), Some(GUIDE_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_start_tab_only_generates_its_images() {
        let image = MockImageGenerationClient::new();
        let mut session =
            session_with(MockGuideClient::new(), image.clone()).with_start_tab(Category::Hotels);

        session.submit("Paris");
        assert_eq!(session.wait_for_guide().await, Phase::Ready);
        assert_eq!(session.state().active_tab, Category::Hotels);

        session.wait_for_images().await;
        assert_eq!(image.get_call_count(), 11);
        assert!(image
            .get_prompts()
            .iter()
            .all(|prompt| prompt.contains("hotel") || prompt.contains("travel photography")));
        assert!(session
            .images()
            .slot(ItemKey::Item {
                category: Category::Attractions,
                index: 0
            })
            .is_none());
    }

    #[tokio::test]
    async fn test_set_query_is_locked_while_loading() {
        let guide = MockGuideClient::new().with_delay(Duration::from_millis(10));
        let mut session = session_with(guide, MockImageGenerationClient::new())
            .with_auto_images(false);

        assert!(session.set_query("Kyo"));
        assert_eq!(session.state().query, "Kyo");

        session.submit("Kyoto");
        assert!(!session.set_query("Rome"));
        assert_eq!(session.state().query, "Kyoto");

        session.wait_for_guide().await;
        assert!(session.set_query("Rome"));
    }

    #[tokio::test]
    async fn test_reset_while_loading_discards_late_result() {
        let guide = MockGuideClient::new().with_delay(Duration::from_millis(30));
        let mut session = session_with(guide.clone(), MockImageGenerationClient::new());

        session.submit("Paris");
        tokio::task::yield_now().await;
        session.reset();
        assert_eq!(session.take_scroll(), Some(ScrollTarget::Top));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(session.try_update().is_none());
        assert_eq!(session.state().phase, Phase::Idle);
        assert!(session.state().data.is_none());
    }

    #[tokio::test]
    async fn test_new_search_after_reset_wins() {
        let guide = MockGuideClient::new().with_delay(Duration::from_millis(10));
        let mut session = session_with(guide, MockImageGenerationClient::new())
            .with_auto_images(false);

        session.submit("Paris");
        tokio::task::yield_now().await;
        session.reset();
        session.submit("Kyoto");

        assert_eq!(session.wait_for_guide().await, Phase::Ready);
        assert_eq!(
            session.state().data.as_ref().unwrap().city_name,
            "Kyoto"
        );
    }

    #[tokio::test]
    async fn test_tab_switch_requests_only_new_items() {
        let image = MockImageGenerationClient::new();
        let mut session = session_with(MockGuideClient::new(), image.clone());

        session.submit("Paris");
        session.wait_for_guide().await;
        session.wait_for_images().await;
        assert_eq!(image.get_call_count(), 11);

        assert!(session.select_tab(Category::Nearby));
        session.wait_for_images().await;
        assert_eq!(image.get_call_count(), 16);

        // Back to attractions: already generated, nothing new
        session.select_tab(Category::Attractions);
        assert_eq!(session.images().in_flight(), 0);
        assert_eq!(image.get_call_count(), 16);
    }

    #[tokio::test]
    async fn test_failed_image_retry_is_issued_again() {
        let image = MockImageGenerationClient::new().with_missing_image();
        let mut session =
            session_with(MockGuideClient::new(), image.clone()).with_auto_images(false);

        session.submit("Paris");
        session.wait_for_guide().await;

        assert!(session.request_image(ItemKey::Landing));
        let update = session.next_update().await;
        assert_eq!(
            update,
            Some(Update::Image {
                key: ItemKey::Landing,
                ready: false
            })
        );

        assert!(session.retry_image(ItemKey::Landing));
        session.wait_for_images().await;
        assert!(matches!(
            session.images().slot(ItemKey::Landing),
            Some(ImageSlot::Ready(_))
        ));
        assert_eq!(image.get_call_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_images() {
        let image = MockImageGenerationClient::new().with_delay(Duration::from_millis(30));
        let mut session = session_with(MockGuideClient::new(), image);

        session.submit("Paris");
        session.wait_for_guide().await;
        assert!(session.images().in_flight() > 0);

        session.reset();
        assert_eq!(session.images().in_flight(), 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(session.try_update().is_none());
        assert!(session.snapshot().images.is_empty());
    }

    #[tokio::test]
    async fn test_manual_mode_requests_nothing() {
        let image = MockImageGenerationClient::new();
        let mut session =
            session_with(MockGuideClient::new(), image.clone()).with_auto_images(false);

        session.submit("Paris");
        session.wait_for_guide().await;
        session.wait_for_images().await;
        assert_eq!(image.get_call_count(), 0);
        // Nothing failed, so there is nothing to retry
        assert!(!session.retry_image(ItemKey::Landing));
        assert!(session.request_image(ItemKey::Landing));
        session.wait_for_images().await;
        assert_eq!(image.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_serializes_state_and_images() {
        let mut session = session_with(MockGuideClient::new(), MockImageGenerationClient::new());
        session.submit("Paris");
        session.wait_for_guide().await;
        session.wait_for_images().await;

        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["state"]["phase"], "ready");
        assert_eq!(json["images"]["landing"]["status"], "ready");
        assert_eq!(json["images"]["attractions#10"]["status"], "ready");
    }
}
