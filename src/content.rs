use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, LazyLock};

use futures_util::stream::{self, StreamExt};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{CONTENT_MAX_ARTICLES, CONTENT_MAX_POSTS, CONTENT_RETENTION_HOURS};
use crate::db::queries::{purge_content_older_than, upsert_content, NewContent};
use crate::error::{AppError, Result};
use crate::extract::profile::parse_selector;
use crate::fetcher::PageFetcher;
use crate::types::now_ns;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Article,
    Social,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Social => "social",
        }
    }
}

/// How headlines are found on a news front page.
#[derive(Debug, Clone, Copy)]
pub struct ArticleLayout {
    pub links: &'static str,
    pub headline: &'static str,
    /// Nearest ancestor that holds the teaser image.
    pub container: &'static str,
    /// Absolute URL must match this pattern, when set.
    pub require: Option<&'static str>,
    pub exclude: &'static [&'static str],
    pub max_title_chars: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum SourceLayout {
    News(ArticleLayout),
    /// old.reddit.com listing markup.
    Subreddit,
}

#[derive(Debug, Clone, Copy)]
pub struct ContentSource {
    pub key: &'static str,
    pub name: &'static str,
    pub url: &'static str,
    pub layout: SourceLayout,
}

impl ContentSource {
    pub fn kind(&self) -> ContentKind {
        match self.layout {
            SourceLayout::News(_) => ContentKind::Article,
            SourceLayout::Subreddit => ContentKind::Social,
        }
    }
}

pub const CONTENT_SOURCES: [ContentSource; 6] = [
    ContentSource {
        key: "bbc_sport",
        name: "BBC Sport",
        url: "https://www.bbc.com/sport/football",
        layout: SourceLayout::News(ArticleLayout {
            links: r#"a[href*="/sport/football/"]"#,
            headline: r#"h3, h2, span[class*="Headline"], p[class*="Headline"]"#,
            container: "div, article, li",
            require: Some(r"/sport/football/\d+"),
            exclude: &["/live/", "/av/"],
            max_title_chars: 200,
        }),
    },
    ContentSource {
        key: "sky_sports",
        name: "Sky Sports",
        url: "https://www.skysports.com/football/news",
        layout: SourceLayout::News(ArticleLayout {
            links: r#".news-list__item a, a[href*="/football/news/"]"#,
            headline: ".news-list__headline, h3, h4",
            container: ".news-list__item, article, div",
            require: Some("/football/"),
            exclude: &[],
            max_title_chars: 200,
        }),
    },
    ContentSource {
        key: "espn_fc",
        name: "ESPN FC",
        url: "https://www.espn.com/soccer/",
        layout: SourceLayout::News(ArticleLayout {
            links: r#"a[href*="/soccer/story/"], a[href*="/soccer/recap/"]"#,
            headline: "h1, h2, h3, .contentItem__title",
            container: ".contentItem, article, div",
            require: None,
            exclude: &[],
            max_title_chars: 200,
        }),
    },
    ContentSource {
        key: "guardian",
        name: "The Guardian",
        url: "https://www.theguardian.com/football",
        layout: SourceLayout::News(ArticleLayout {
            links: r#"a[href*="/football/"][href*="/20"]"#,
            headline: r#"h3, h2, span[class*="headline"]"#,
            container: ".fc-item, article, li",
            require: None,
            exclude: &["/live/", "/video/"],
            max_title_chars: 250,
        }),
    },
    ContentSource {
        key: "reddit_soccer",
        name: "Reddit r/soccer",
        url: "https://old.reddit.com/r/soccer/",
        layout: SourceLayout::Subreddit,
    },
    ContentSource {
        key: "reddit_betting",
        name: "Reddit r/SoccerBetting",
        url: "https://old.reddit.com/r/SoccerBetting/",
        layout: SourceLayout::Subreddit,
    },
];

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

/// A news headline is kept only if it mentions one of these.
const FOOTBALL_KEYWORDS: &[&str] = &[
    "premier league", "la liga", "bundesliga", "serie a", "ligue 1",
    "champions league", "europa league", "world cup", "euro 202",
    "manchester", "liverpool", "arsenal", "chelsea", "tottenham", "city",
    "barcelona", "real madrid", "atletico", "bayern", "dortmund",
    "juventus", "inter", "milan", "napoli", "roma",
    "psg", "marseille", "lyon",
    "transfer", "goal", "score", "match", "lineup", "injury",
    "manager", "coach", "signing", "contract", "deal",
    "football", "soccer", "fc", "united", "league",
];

const TEAM_PATTERNS: &[(&str, &str)] = &[
    ("manchester united", "Man United"),
    ("manchester city", "Man City"),
    ("liverpool", "Liverpool"),
    ("arsenal", "Arsenal"),
    ("chelsea", "Chelsea"),
    ("tottenham", "Tottenham"),
    ("newcastle", "Newcastle"),
    ("aston villa", "Aston Villa"),
    ("brighton", "Brighton"),
    ("west ham", "West Ham"),
    ("fulham", "Fulham"),
    ("brentford", "Brentford"),
    ("crystal palace", "Crystal Palace"),
    ("wolves", "Wolves"),
    ("everton", "Everton"),
    ("nottingham forest", "Nottingham Forest"),
    ("bournemouth", "Bournemouth"),
    ("leicester", "Leicester"),
    ("barcelona", "Barcelona"),
    ("real madrid", "Real Madrid"),
    ("atletico madrid", "Atletico Madrid"),
    ("sevilla", "Sevilla"),
    ("bayern munich", "Bayern Munich"),
    ("borussia dortmund", "Dortmund"),
    ("juventus", "Juventus"),
    ("inter milan", "Inter"),
    ("ac milan", "AC Milan"),
    ("napoli", "Napoli"),
    ("roma", "Roma"),
    ("paris saint-germain", "PSG"),
    ("psg", "PSG"),
];

const COMPETITION_PATTERNS: &[(&str, &str)] = &[
    ("premier league", "Premier League"),
    ("la liga", "La Liga"),
    ("bundesliga", "Bundesliga"),
    ("serie a", "Serie A"),
    ("ligue 1", "Ligue 1"),
    ("champions league", "Champions League"),
    ("europa league", "Europa League"),
    ("fa cup", "FA Cup"),
    ("carabao cup", "Carabao Cup"),
];

const MAX_TEAMS_PER_ITEM: usize = 5;
const MIN_ARTICLE_TITLE_CHARS: usize = 16;
const MIN_POST_TITLE_CHARS: usize = 10;
const MAX_POST_TITLE_CHARS: usize = 300;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

pub fn is_football_related(title: &str) -> bool {
    let lower = title.to_lowercase();
    FOOTBALL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Canonical team names mentioned in `text`, first match order, at most five.
pub fn teams_in(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut teams: Vec<String> = Vec::new();
    for (pattern, name) in TEAM_PATTERNS {
        if lower.contains(pattern) && !teams.iter().any(|t| t == *name) {
            teams.push(name.to_string());
        }
    }
    teams.truncate(MAX_TEAMS_PER_ITEM);
    teams
}

pub fn competition_in(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    COMPETITION_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, name)| name.to_string())
}

// ---------------------------------------------------------------------------
// Parsing (sync: `Html` is not Send)
// ---------------------------------------------------------------------------

pub fn parse_source(source: &ContentSource, page_url: &str, html: &str) -> Result<Vec<NewContent>> {
    match source.layout {
        SourceLayout::News(layout) => parse_articles(source, &layout, page_url, html),
        SourceLayout::Subreddit => parse_subreddit(source, page_url, html),
    }
}

fn parse_articles(
    source: &ContentSource,
    layout: &ArticleLayout,
    page_url: &str,
    html: &str,
) -> Result<Vec<NewContent>> {
    let links = parse_selector(layout.links)?;
    let headline = parse_selector(layout.headline)?;
    let container = parse_selector(layout.container)?;
    let img = parse_selector("img")?;
    let require = match layout.require {
        Some(pattern) => Some(
            Regex::new(pattern).map_err(|e| AppError::Extraction(format!("{pattern}: {e}")))?,
        ),
        None => None,
    };

    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for link in doc.select(&links) {
        let Some(href) = link.value().attr("href") else { continue };
        let url = absolute(base.as_ref(), href);
        if seen.contains(&url) {
            continue;
        }
        if layout.exclude.iter().any(|part| url.contains(part)) {
            continue;
        }
        if require.as_ref().is_some_and(|re| !re.is_match(&url)) {
            continue;
        }
        seen.insert(url.clone());

        let mut title = link
            .select(&headline)
            .next()
            .map(|h| squash(&h))
            .unwrap_or_default();
        if title.is_empty() {
            title = link.value().attr("aria-label").map(squash_str).unwrap_or_default();
        }
        if title.is_empty() {
            title = squash(&link);
        }
        let chars = title.chars().count();
        if chars < MIN_ARTICLE_TITLE_CHARS || chars >= layout.max_title_chars {
            continue;
        }
        if !is_football_related(&title) {
            continue;
        }

        let image_url = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| container.matches(a))
            .and_then(|c| c.select(&img).next())
            .and_then(|i| i.value().attr("src").or_else(|| i.value().attr("data-src")))
            .filter(|src| !src.is_empty())
            .map(|src| absolute(base.as_ref(), src));

        items.push(NewContent {
            source: source.name.to_string(),
            content_type: source.kind().as_str().to_string(),
            related_teams: teams_in(&title),
            related_competition: competition_in(&title),
            title,
            url,
            image_url,
            engagement_score: 0,
            comments_count: 0,
        });
        if items.len() >= CONTENT_MAX_ARTICLES {
            break;
        }
    }
    Ok(items)
}

fn parse_subreddit(source: &ContentSource, page_url: &str, html: &str) -> Result<Vec<NewContent>> {
    let post = parse_selector(".thing.link")?;
    let title_link = parse_selector("a.title")?;
    let score = parse_selector(".score.unvoted")?;
    let comments = parse_selector(".comments")?;
    let thumbnail = parse_selector(".thumbnail img, a.thumbnail img")?;

    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut items = Vec::new();

    for thing in doc.select(&post).take(CONTENT_MAX_POSTS) {
        let Some(link) = thing.select(&title_link).next() else { continue };
        let Some(href) = link.value().attr("href") else { continue };
        let title: String = squash(&link).chars().take(MAX_POST_TITLE_CHARS).collect();
        if title.chars().count() < MIN_POST_TITLE_CHARS {
            continue;
        }

        let engagement_score = thing
            .select(&score)
            .next()
            .map(|s| {
                s.value()
                    .attr("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| squash(&s))
            })
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let comments_count = thing
            .select(&comments)
            .next()
            .map(|c| squash(&c))
            .and_then(|text| FIRST_NUMBER.find(&text).and_then(|m| m.as_str().parse().ok()))
            .unwrap_or(0);

        let image_url = thing
            .select(&thumbnail)
            .next()
            .and_then(|i| i.value().attr("src"))
            .filter(|src| !src.is_empty())
            .map(|src| absolute(base.as_ref(), src))
            .or_else(|| {
                thing
                    .value()
                    .attr("data-url")
                    .filter(|u| u.contains(".jpg") || u.contains(".png") || u.contains("i.redd.it"))
                    .map(str::to_string)
            });

        items.push(NewContent {
            source: source.name.to_string(),
            content_type: source.kind().as_str().to_string(),
            related_teams: teams_in(&title),
            related_competition: competition_in(&title),
            url: absolute(base.as_ref(), href),
            title,
            image_url,
            engagement_score,
            comments_count,
        });
    }
    Ok(items)
}

fn squash(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn squash_str(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn absolute(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentReport {
    pub total_scraped: usize,
    pub new_saved: usize,
    pub source_counts: BTreeMap<String, usize>,
}

/// Scrapes the content sources with a fixed pool of workers. Each worker
/// checks out a fetcher of its own for the duration of one source.
pub struct ContentIngestor {
    pool: SqlitePool,
    sources: Vec<ContentSource>,
    fetchers: Vec<Arc<dyn PageFetcher>>,
}

impl ContentIngestor {
    pub fn new(pool: SqlitePool, sources: Vec<ContentSource>, fetchers: Vec<Arc<dyn PageFetcher>>) -> Self {
        Self { pool, sources, fetchers }
    }

    pub async fn run(&self) -> Result<ContentReport> {
        let workers = self.fetchers.len().max(1);
        let idle = Arc::new(Mutex::new(self.fetchers.clone()));
        info!(sources = self.sources.len(), workers, "content ingestion started");

        let outcomes: Vec<(&'static str, Vec<NewContent>)> = stream::iter(self.sources.clone())
            .map(|source| {
                let idle = Arc::clone(&idle);
                async move {
                    let fetcher = idle.lock().await.pop();
                    let Some(fetcher) = fetcher else {
                        warn!(source = source.key, "no idle fetcher, skipping source");
                        return (source.key, Vec::new());
                    };
                    let items = scrape_one(fetcher.as_ref(), &source).await;
                    idle.lock().await.push(fetcher);
                    (source.key, items)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut report = ContentReport::default();
        let captured_at = now_ns() as i64;
        for (key, items) in outcomes {
            report.source_counts.insert(key.to_string(), items.len());
            report.total_scraped += items.len();
            for item in &items {
                match upsert_content(&self.pool, item, captured_at).await {
                    Ok(true) => report.new_saved += 1,
                    Ok(false) => {}
                    Err(e) => warn!(url = %item.url, "content upsert failed: {e}"),
                }
            }
        }

        let purged = purge_content_older_than(&self.pool, CONTENT_RETENTION_HOURS, now_ns()).await?;
        info!(
            total = report.total_scraped,
            new = report.new_saved,
            purged,
            "content ingestion finished"
        );
        Ok(report)
    }
}

async fn scrape_one(fetcher: &dyn PageFetcher, source: &ContentSource) -> Vec<NewContent> {
    let page = match fetcher.fetch(source.url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(source = source.key, "content fetch failed: {e}");
            return Vec::new();
        }
    };
    match parse_source(source, &page.url, &page.html) {
        Ok(items) => items,
        Err(e) => {
            warn!(source = source.key, "content parse failed: {e}");
            Vec::new()
        }
    }
}
