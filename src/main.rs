use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_guide::controller::{ItemKey, Phase};
use travel_guide::models::{Category, Config};
use travel_guide::render::render;
use travel_guide::session::{ScrollTarget, Session, Update};

#[derive(Debug, Parser)]
#[command(name = "travel-guide")]
#[command(about = "Curated city travel guides with generated photographs")]
struct CliArgs {
    /// City to look up. Starts an interactive session when omitted.
    #[arg(value_name = "CITY")]
    city: Option<String>,

    /// Category to open once the guide is ready.
    #[arg(long, value_name = "CATEGORY", value_parser = parse_category_arg, default_value = "attractions")]
    tab: Category,

    /// Only generate images on request (`:show <item>`).
    #[arg(long)]
    no_images: bool,

    /// Print the final state as JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn parse_category_arg(input: &str) -> std::result::Result<Category, String> {
    input.parse::<Category>().map_err(|e| e.to_string())
}

const HELP: &str = "\
  <city>              search for a city
  :tab <category>     attractions | nearby | hotels | restaurants | shopping
  :show <item>        generate an image (landing, hotels#2, or a number on the current tab)
  :retry <item>       try a failed image again
  :home               back to the search screen
  :quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Search(String),
    Tab(Category),
    Show(ItemKey),
    Retry(ItemKey),
    Home,
    Quit,
    Help,
    Nothing,
}

/// `landing`, `<category>#<n>`, or a bare `<n>` on the active tab.
fn parse_item(input: &str, active: Category) -> std::result::Result<ItemKey, String> {
    let input = input.trim();
    if let Ok(position) = input.parse::<usize>() {
        if position == 0 {
            return Err("Item numbers start at 1".to_string());
        }
        return Ok(ItemKey::Item {
            category: active,
            index: position - 1,
        });
    }
    input.parse::<ItemKey>().map_err(|e| e.to_string())
}

fn parse_command(line: &str, active: Category) -> std::result::Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Nothing);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Search(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "tab" => parse_category_arg(arg).map(Command::Tab),
        "show" => parse_item(arg, active).map(Command::Show),
        "retry" => parse_item(arg, active).map(Command::Retry),
        "home" => Ok(Command::Home),
        "q" | "quit" => Ok(Command::Quit),
        "help" | "?" => Ok(Command::Help),
        other => Err(format!("Unknown command ':{}'. Type :help", other)),
    }
}

enum Input {
    Line(Option<String>),
    Update(Option<Update>),
}

fn print_view(session: &Session) {
    println!("{}", render(session.state(), session.images()));
}

/// Search once and print the result. The session's start tab decides which
/// images get generated.
async fn run_once(session: &mut Session, city: &str, json: bool) -> Result<bool> {
    if !session.submit(city) {
        error!("City name must not be empty");
        return Ok(false);
    }

    let phase = session.wait_for_guide().await;
    if phase == Phase::Ready {
        session.wait_for_images().await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    } else {
        print_view(session);
    }
    Ok(phase == Phase::Ready)
}

async fn run_interactive(mut session: Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_view(&session);

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            update = session.next_update() => Input::Update(update),
        };

        match input {
            Input::Line(None) => break,
            Input::Line(Some(line)) => {
                let command = match parse_command(&line, session.state().active_tab) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{}", message);
                        continue;
                    }
                };
                match command {
                    Command::Nothing => {}
                    Command::Quit => break,
                    Command::Help => println!("{}", HELP),
                    Command::Search(city) => {
                        if session.submit(&city) {
                            print_view(&session);
                        } else {
                            println!("검색이 이미 진행 중입니다.");
                        }
                    }
                    Command::Tab(category) => {
                        if session.select_tab(category) {
                            print_view(&session);
                        }
                    }
                    Command::Show(key) => {
                        if !session.request_image(key) {
                            println!("{}: nothing to generate", key);
                        }
                    }
                    Command::Retry(key) => {
                        if !session.retry_image(key) {
                            println!("{}: nothing to retry", key);
                        }
                    }
                    Command::Home => session.reset(),
                }
            }
            Input::Update(Some(Update::Guide(_))) => print_view(&session),
            Input::Update(Some(Update::Image { key, ready })) => {
                if ready {
                    println!("사진 준비 완료: {}", key);
                } else {
                    println!("사진을 불러오지 못했습니다: {} (:retry {})", key, key);
                }
            }
            Input::Update(None) => break,
        }

        match session.take_scroll() {
            Some(ScrollTarget::Top) => print_view(&session),
            Some(ScrollTarget::Results) | None => {}
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travel_guide=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };
    let mut session = Session::from_config(&config)
        .with_auto_images(!args.no_images)
        .with_start_tab(args.tab);

    match args.city {
        Some(city) => {
            info!("Looking up {}", city.trim());
            match run_once(&mut session, &city, args.json).await {
                Ok(true) => Ok(()),
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    error!("Lookup failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => run_interactive(session).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use travel_guide::ai::{MockGuideClient, MockImageGenerationClient};

    #[tokio::test]
    async fn test_run_once_generates_only_the_chosen_tab() {
        let image = MockImageGenerationClient::new();
        let mut session = Session::new(Arc::new(MockGuideClient::new()), Arc::new(image.clone()))
            .with_start_tab(Category::Hotels);

        assert!(run_once(&mut session, "Paris", true).await.unwrap());
        assert_eq!(session.state().active_tab, Category::Hotels);
        // Landing image plus ten hotels
        assert_eq!(image.get_call_count(), 11);
        assert_eq!(session.snapshot().images.len(), 11);
    }

    #[tokio::test]
    async fn test_run_once_blank_city_fails() {
        let mut session = Session::new(
            Arc::new(MockGuideClient::new()),
            Arc::new(MockImageGenerationClient::new()),
        );
        assert!(!run_once(&mut session, "  ", false).await.unwrap());
    }

    #[test]
    fn test_parse_category_arg_invalid() {
        let err = parse_category_arg("museums").unwrap_err();
        assert!(err.contains("attractions"));
    }

    #[test]
    fn test_cli_defaults() {
        let args = CliArgs::parse_from(["travel-guide", "Paris"]);
        assert_eq!(args.city.as_deref(), Some("Paris"));
        assert_eq!(args.tab, Category::Attractions);
        assert!(!args.no_images);
        assert!(!args.json);
    }

    #[test]
    fn test_cli_tab_and_flags() {
        let args = CliArgs::parse_from(["travel-guide", "Kyoto", "--tab", "hotels", "--no-images", "--json"]);
        assert_eq!(args.tab, Category::Hotels);
        assert!(args.no_images);
        assert!(args.json);
    }

    #[test]
    fn test_plain_line_is_a_search() {
        assert_eq!(
            parse_command("  New York ", Category::Attractions).unwrap(),
            Command::Search("New York".to_string())
        );
        assert_eq!(parse_command("   ", Category::Attractions).unwrap(), Command::Nothing);
    }

    #[test]
    fn test_retry_accepts_bare_number_on_active_tab() {
        assert_eq!(
            parse_command(":retry 3", Category::Hotels).unwrap(),
            Command::Retry(ItemKey::Item {
                category: Category::Hotels,
                index: 2
            })
        );
        assert_eq!(
            parse_command(":show landing", Category::Hotels).unwrap(),
            Command::Show(ItemKey::Landing)
        );
        assert_eq!(
            parse_command(":retry shopping#1", Category::Hotels).unwrap(),
            Command::Retry(ItemKey::Item {
                category: Category::Shopping,
                index: 0
            })
        );
        assert!(parse_command(":retry 0", Category::Hotels).is_err());
    }

    #[test]
    fn test_tab_home_quit() {
        assert_eq!(
            parse_command(":tab nearby", Category::Attractions).unwrap(),
            Command::Tab(Category::Nearby)
        );
        assert_eq!(parse_command(":home", Category::Attractions).unwrap(), Command::Home);
        assert_eq!(parse_command(":quit", Category::Attractions).unwrap(), Command::Quit);
        assert!(parse_command(":fly", Category::Attractions).is_err());
    }
}
