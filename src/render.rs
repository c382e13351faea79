//! Text rendering of the search, loading, error and results views.

use crate::controller::{ItemKey, Phase, ViewState};
use crate::images::{ImageBoard, ImageSlot};
use crate::models::{Category, CityData, TravelItem};
use std::fmt::Write as _;

pub const TITLE: &str = "쉽네 Travel";
pub const LOADING_MESSAGE: &str = "여행을 큐레이팅 중입니다...";
pub const SPOTLIGHT_CITIES: [&str; 3] = ["Paris", "Kyoto", "Jeju"];

const RULE: &str = "────────────────────────────────────────";
const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// Google Maps search link for an item.
pub fn maps_link(item: &TravelItem, city: &str) -> String {
    let query = format!("{} {}", item.name, city);
    match reqwest::Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", &query)]) {
        Ok(url) => url.to_string(),
        Err(_) => MAPS_SEARCH_URL.to_string(),
    }
}

fn image_line(slot: Option<&ImageSlot>, key: ItemKey) -> String {
    match slot {
        Some(ImageSlot::Ready(image)) => format!(
            "[사진] {} · {} bytes",
            image.mime_type(),
            image.bytes().len()
        ),
        Some(ImageSlot::Loading) => "[현장 사진 불러오는 중]".to_string(),
        Some(ImageSlot::Failed) => format!("[다시 시도 → :retry {}]", key),
        None => format!("[사진 보기 → :show {}]", key),
    }
}

pub fn render(state: &ViewState, images: &ImageBoard) -> String {
    match state.phase {
        Phase::Idle => render_search(state),
        Phase::Loading => format!("{}\n\n  {}\n", header(state), LOADING_MESSAGE),
        Phase::Error => render_error(state),
        Phase::Ready => match state.data.as_ref() {
            Some(data) => render_results(state, data, images),
            None => render_search(state),
        },
    }
}

fn header(state: &ViewState) -> String {
    if state.query.is_empty() {
        format!("{}\n{}", TITLE, RULE)
    } else {
        format!("{}  ·  {}\n{}", TITLE, state.query, RULE)
    }
}

fn render_search(state: &ViewState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CURATED TRAVEL EXPERIENCE");
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", TITLE);
    let _ = writeln!(out);
    let _ = writeln!(out, "복잡한 계획은 걷어내고,");
    let _ = writeln!(out, "당신이 머물 가장 아름다운 순간만 골랐습니다.");
    let _ = writeln!(out);
    if state.query.is_empty() {
        let _ = writeln!(out, "> 떠나고 싶은 도시를 입력하세요");
    } else {
        let _ = writeln!(out, "> {}", state.query);
    }
    let _ = writeln!(out, "Spotlight Cities: {}", SPOTLIGHT_CITIES.join(" · "));
    out
}

fn render_error(state: &ViewState) -> String {
    let mut out = header(state);
    out.push_str("\n\n");
    if let Some(error) = &state.error {
        let _ = writeln!(out, "  ✕ {}", error);
    }
    let _ = writeln!(out, "  처음으로 돌아가기 → :home");
    out
}

fn tab_strip(active: Category) -> String {
    Category::ALL
        .iter()
        .map(|c| {
            if *c == active {
                format!("[{}]", c.label())
            } else {
                format!(" {} ", c.label())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_results(state: &ViewState, data: &CityData, images: &ImageBoard) -> String {
    let mut out = header(state);
    out.push_str("\n\n");

    let _ = writeln!(out, "CURATED BY AI");
    let _ = writeln!(out, "{} 시선의 끝", data.city_name);
    let _ = writeln!(out, "{}", image_line(images.slot(ItemKey::Landing), ItemKey::Landing));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", data.intro);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", tab_strip(state.active_tab));
    let _ = writeln!(out, "{}", RULE);

    let category = state.active_tab;
    let items = data.items(category);
    if !items.is_empty() {
        let _ = writeln!(out, "{}", category.section_title());
        let _ = writeln!(out);
        for (index, item) in items.iter().enumerate() {
            let key = ItemKey::Item { category, index };
            let _ = writeln!(out, "{:>2}. {}", index + 1, item.name);
            let _ = writeln!(out, "    {}", item.description);
            let _ = writeln!(out, "    {}", image_line(images.slot(key), key));
            let _ = writeln!(out, "    Google Maps 보기: {}", maps_link(item, &data.city_name));
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "새로운 모험 시작하기 → :home");
    out
}
