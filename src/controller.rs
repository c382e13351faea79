//! View controller state machine
//!
//! `ViewState` is the whole UI state of a search session. Transitions are
//! synchronous and side-effect free; each returns the [`Effect`]s the owner
//! must carry out (start or cancel requests, move the viewport).

use crate::models::{Category, CityData};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message shown for every guide failure, whatever the cause.
pub const GUIDE_FAILURE_MESSAGE: &str = "여행 정보를 찾을 수 없습니다. 다시 시도해 주세요.";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Identifies one guide request. Results carrying an older ticket are stale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GuideTicket(u64);

/// Identity of one rendered image slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ItemKey {
    Landing,
    Item { category: Category, index: usize },
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Landing => f.write_str("landing"),
            ItemKey::Item { category, index } => write!(f, "{}#{}", category, index + 1),
        }
    }
}

/// Parses `landing` or `<category>#<n>` with `n` counted from 1.
impl FromStr for ItemKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("landing") {
            return Ok(ItemKey::Landing);
        }
        let (category, position) = s
            .split_once('#')
            .ok_or_else(|| Error::Config(format!("Invalid item '{}'. Expected landing or <category>#<n>", s)))?;
        let category: Category = category.parse()?;
        let position: usize = position
            .trim()
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::Config(format!("Invalid item position in '{}'", s)))?;
        Ok(ItemKey::Item {
            category,
            index: position - 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchGuide { ticket: GuideTicket, city: String },
    /// Abort the in-flight guide request and every image task.
    CancelPending,
    /// Start image generation for whatever is now visible.
    RequestImages,
    ScrollToResults,
    ScrollToTop,
}

/// An item currently on screen together with its image prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleItem<'a> {
    pub key: ItemKey,
    pub prompt: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub phase: Phase,
    pub query: String,
    pub data: Option<CityData>,
    pub error: Option<String>,
    pub active_tab: Category,
    /// Tab opened when a guide arrives.
    #[serde(default)]
    pub start_tab: Category,
    pub generation: u64,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_tab(mut self, category: Category) -> Self {
        self.start_tab = category;
        self
    }

    /// Edit the search box. The input is locked while a search is running.
    pub fn set_query(&mut self, query: &str) -> bool {
        if self.phase == Phase::Loading {
            return false;
        }
        self.query = query.to_string();
        true
    }

    /// Submit the current query.
    pub fn submit(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Loading {
            return Vec::new();
        }
        let city = self.query.trim();
        if city.is_empty() {
            return Vec::new();
        }
        let city = city.to_string();

        self.generation += 1;
        self.phase = Phase::Loading;
        self.data = None;
        self.error = None;

        tracing::info!("Searching for '{}' (generation {})", city, self.generation);
        vec![
            Effect::CancelPending,
            Effect::FetchGuide {
                ticket: GuideTicket(self.generation),
                city,
            },
        ]
    }

    /// Set the query and submit it in one step.
    pub fn submit_query(&mut self, query: &str) -> Vec<Effect> {
        if !self.set_query(query) {
            return Vec::new();
        }
        self.submit()
    }

    pub fn is_current(&self, ticket: GuideTicket) -> bool {
        self.phase == Phase::Loading && ticket.0 == self.generation
    }

    /// Apply the outcome of a guide request.
    pub fn complete(&mut self, ticket: GuideTicket, result: Result<CityData>) -> Vec<Effect> {
        if !self.is_current(ticket) {
            tracing::warn!(
                "Dropping stale guide result (ticket {}, current generation {})",
                ticket.0,
                self.generation
            );
            return Vec::new();
        }

        match result {
            Ok(data) => {
                tracing::info!("Guide ready for {}", data.city_name);
                self.phase = Phase::Ready;
                self.data = Some(data);
                self.error = None;
                self.active_tab = self.start_tab;
                vec![Effect::ScrollToResults, Effect::RequestImages]
            }
            Err(e) => {
                tracing::error!("Failed to fetch city guide: {}", e);
                self.phase = Phase::Error;
                self.data = None;
                self.error = Some(GUIDE_FAILURE_MESSAGE.to_string());
                Vec::new()
            }
        }
    }

    /// Back to the search screen from any state.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.phase = Phase::Idle;
        self.query.clear();
        self.data = None;
        self.error = None;
        self.active_tab = self.start_tab;
        vec![Effect::CancelPending, Effect::ScrollToTop]
    }

    /// Switch the visible category. Only meaningful with results on screen.
    pub fn select_tab(&mut self, category: Category) -> Vec<Effect> {
        if self.phase != Phase::Ready || self.active_tab == category {
            return Vec::new();
        }
        self.active_tab = category;
        vec![Effect::RequestImages]
    }

    /// Landing image plus the items of the active tab.
    pub fn visible_items(&self) -> Vec<VisibleItem<'_>> {
        let Some(data) = self.data.as_ref().filter(|_| self.phase == Phase::Ready) else {
            return Vec::new();
        };

        let mut visible = vec![VisibleItem {
            key: ItemKey::Landing,
            prompt: &data.landing_image_prompt,
        }];
        visible.extend(
            data.items(self.active_tab)
                .iter()
                .enumerate()
                .map(|(index, item)| VisibleItem {
                    key: ItemKey::Item {
                        category: self.active_tab,
                        index,
                    },
                    prompt: &item.image_prompt,
                }),
        );
        visible
    }

    /// Image prompt behind a slot, in any category.
    pub fn prompt_for(&self, key: ItemKey) -> Option<&str> {
        let data = self.data.as_ref()?;
        match key {
            ItemKey::Landing => Some(&data.landing_image_prompt),
            ItemKey::Item { category, index } => data
                .items(category)
                .get(index)
                .map(|item| item.image_prompt.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGuideClient;
    use pretty_assertions::assert_eq;

    fn ticket_of(effects: &[Effect]) -> GuideTicket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchGuide { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .expect("submit should request a guide")
    }

    fn ready_state(city: &str) -> ViewState {
        let mut state = ViewState::new();
        let ticket = ticket_of(&state.submit_query(city));
        state.complete(ticket, Ok(MockGuideClient::sample_guide(city)));
        state
    }

    #[test]
    fn test_submit_moves_to_loading() {
        let mut state = ViewState::new();
        let effects = state.submit_query("  Paris ");

        assert_eq!(state.phase, Phase::Loading);
        assert_eq!(
            effects,
            vec![
                Effect::CancelPending,
                Effect::FetchGuide {
                    ticket: GuideTicket(1),
                    city: "Paris".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_blank_submit_is_ignored() {
        for query in ["", "   ", "\t\n"] {
            let mut state = ViewState::new();
            assert!(state.submit_query(query).is_empty());
            assert_eq!(state.phase, Phase::Idle);
            assert_eq!(state.generation, 0);
        }
    }

    #[test]
    fn test_submit_while_loading_is_ignored() {
        let mut state = ViewState::new();
        state.submit_query("Paris");
        assert!(state.submit_query("Rome").is_empty());
        assert!(!state.set_query("Rome"));
        assert_eq!(state.query, "Paris");
        assert_eq!(state.generation, 1);
    }

    #[test]
    fn test_success_moves_to_ready_and_scrolls() {
        let mut state = ViewState::new();
        let ticket = ticket_of(&state.submit_query("Paris"));
        let effects = state.complete(ticket, Ok(MockGuideClient::sample_guide("Paris")));

        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(effects, vec![Effect::ScrollToResults, Effect::RequestImages]);
        assert_eq!(state.data.as_ref().unwrap().city_name, "Paris");
        assert_eq!(state.active_tab, Category::Attractions);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_guide_opens_on_start_tab() {
        let mut state = ViewState::new().with_start_tab(Category::Hotels);
        let ticket = ticket_of(&state.submit_query("Paris"));
        state.complete(ticket, Ok(MockGuideClient::sample_guide("Paris")));

        assert_eq!(state.active_tab, Category::Hotels);
        let visible = state.visible_items();
        assert_eq!(visible.len(), 11);
        assert!(visible[1..]
            .iter()
            .all(|item| matches!(item.key, ItemKey::Item { category: Category::Hotels, .. })));

        state.select_tab(Category::Shopping);
        state.reset();
        assert_eq!(state.active_tab, Category::Hotels);
    }

    #[test]
    fn test_failure_sets_fixed_message() {
        let mut state = ViewState::new();
        let ticket = ticket_of(&state.submit_query("Nowhereville"));
        state.complete(ticket, Err(Error::Request("connection refused".to_string())));

        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.error.as_deref(), Some(GUIDE_FAILURE_MESSAGE));
        assert!(state.data.is_none());
    }

    #[test]
    fn test_parse_failure_shows_same_message() {
        let mut state = ViewState::new();
        let ticket = ticket_of(&state.submit_query("Atlantis"));
        state.complete(ticket, Err(Error::Parse("not json".to_string())));
        assert_eq!(state.error.as_deref(), Some(GUIDE_FAILURE_MESSAGE));
    }

    #[test]
    fn test_reset_from_every_phase() {
        let mut loading = ViewState::new();
        loading.submit_query("Paris");

        let mut failed = ViewState::new();
        let ticket = ticket_of(&failed.submit_query("Paris"));
        failed.complete(ticket, Err(Error::Request("down".to_string())));

        for mut state in [ViewState::new(), loading, ready_state("Paris"), failed] {
            let effects = state.reset();
            assert_eq!(effects, vec![Effect::CancelPending, Effect::ScrollToTop]);
            assert_eq!(state.phase, Phase::Idle);
            assert_eq!(state.query, "");
            assert!(state.data.is_none());
            assert!(state.error.is_none());
        }
    }

    #[test]
    fn test_result_after_reset_is_dropped() {
        let mut state = ViewState::new();
        let ticket = ticket_of(&state.submit_query("Paris"));
        state.reset();

        let effects = state.complete(ticket, Ok(MockGuideClient::sample_guide("Paris")));
        assert!(effects.is_empty());
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.data.is_none());
    }

    #[test]
    fn test_older_ticket_cannot_overwrite_newer_search() {
        let mut state = ViewState::new();
        let first = ticket_of(&state.submit_query("Paris"));
        state.reset();
        let second = ticket_of(&state.submit_query("Kyoto"));

        state.complete(first, Ok(MockGuideClient::sample_guide("Paris")));
        assert_eq!(state.phase, Phase::Loading);

        state.complete(second, Ok(MockGuideClient::sample_guide("Kyoto")));
        assert_eq!(state.data.as_ref().unwrap().city_name, "Kyoto");
    }

    #[test]
    fn test_select_tab_does_not_touch_data() {
        let mut state = ready_state("Paris");
        let before = state.data.clone();

        for category in Category::ALL {
            state.select_tab(category);
            assert_eq!(state.active_tab, category);
            assert_eq!(state.data, before);
        }
    }

    #[test]
    fn test_select_tab_outside_ready_is_noop() {
        let mut state = ViewState::new();
        assert!(state.select_tab(Category::Hotels).is_empty());
        assert_eq!(state.active_tab, Category::Attractions);

        state.submit_query("Paris");
        assert!(state.select_tab(Category::Hotels).is_empty());
        assert_eq!(state.active_tab, Category::Attractions);
    }

    #[test]
    fn test_select_same_tab_requests_nothing() {
        let mut state = ready_state("Paris");
        assert!(state.select_tab(Category::Attractions).is_empty());
        assert_eq!(state.select_tab(Category::Hotels), vec![Effect::RequestImages]);
    }

    #[test]
    fn test_visible_items_follow_active_tab() {
        let mut state = ready_state("Paris");
        let visible = state.visible_items();
        assert_eq!(visible.len(), 11);
        assert_eq!(visible[0].key, ItemKey::Landing);
        assert_eq!(
            visible[1].key,
            ItemKey::Item {
                category: Category::Attractions,
                index: 0
            }
        );

        state.select_tab(Category::Nearby);
        let visible = state.visible_items();
        assert_eq!(visible.len(), 6);
        assert!(visible[1..]
            .iter()
            .all(|v| matches!(v.key, ItemKey::Item { category: Category::Nearby, .. })));
    }

    #[test]
    fn test_visible_items_empty_without_results() {
        let mut state = ViewState::new();
        assert!(state.visible_items().is_empty());
        state.submit_query("Paris");
        assert!(state.visible_items().is_empty());
    }

    #[test]
    fn test_prompt_for_looks_up_any_category() {
        let state = ready_state("Paris");
        let key = ItemKey::Item {
            category: Category::Hotels,
            index: 2,
        };
        assert_eq!(
            state.prompt_for(key),
            Some("photorealistic hotel 3 in Paris, 4k")
        );
        assert!(state
            .prompt_for(ItemKey::Item {
                category: Category::Hotels,
                index: 99
            })
            .is_none());
    }

    #[test]
    fn test_item_key_text_form() {
        let key: ItemKey = "hotels#3".parse().unwrap();
        assert_eq!(
            key,
            ItemKey::Item {
                category: Category::Hotels,
                index: 2
            }
        );
        assert_eq!(key.to_string(), "hotels#3");
        assert_eq!("Landing".parse::<ItemKey>().unwrap(), ItemKey::Landing);
        assert!("hotels#0".parse::<ItemKey>().is_err());
        assert!("hotels".parse::<ItemKey>().is_err());
    }

    #[test]
    fn test_state_serializes() {
        let state = ready_state("Paris");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["phase"], "ready");
        assert_eq!(json["activeTab"], "attractions");
        assert_eq!(json["data"]["cityName"], "Paris");

        let back: ViewState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
