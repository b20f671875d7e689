//! Run catalog operations against the live TMDB API and print the JSON result.
//! Usage:
//!   cargo run --bin catalog_probe -- browse <movie|series> [key=value ...]
//!   cargo run --bin catalog_probe -- detail <movie|series> <tmdb_id>
//!   cargo run --bin catalog_probe -- episodes <series_id> <season_number>
//!   cargo run --bin catalog_probe -- home
//! Filter keys for browse: page, sort_by, genre, provider, certification,
//! country, query, min_score, max_score.
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use mediavault::catalog::CatalogService;
use mediavault::config::Config;
use mediavault::episodes::EpisodeLookup;
use mediavault::home;
use mediavault::models::MediaKind;
use mediavault::query::{FilterParams, FilterState};
use mediavault::tmdb::{TmdbApi, TmdbClient};
use serde::Serialize;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        usage();
        std::process::exit(1);
    };

    let config = Config::from_env()?;
    let api: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_config(&config)?);
    let catalog = CatalogService::new(api.clone(), config.region.clone());

    match command.as_str() {
        "browse" => {
            let kind: MediaKind = arg(&args, 1, "media kind")?.parse()?;
            let filter = FilterState::try_from(parse_filter(&args[2..])?)?;
            print_json(&catalog.browse(kind, &filter).await?)?;
        }
        "detail" => {
            let kind: MediaKind = arg(&args, 1, "media kind")?.parse()?;
            let id: u64 = arg(&args, 2, "tmdb_id")?
                .parse()
                .context("tmdb_id must be an integer")?;
            print_json(&catalog.open_detail(kind, id).await?)?;
        }
        "episodes" => {
            let id: u64 = arg(&args, 1, "series_id")?
                .parse()
                .context("series_id must be an integer")?;
            let season: u32 = arg(&args, 2, "season_number")?
                .parse()
                .context("season number must be an integer")?;
            let lookup = EpisodeLookup::new(api);
            lookup.open_series(id).await;
            print_json(&lookup.fetch_episodes(id, season).await?)?;
        }
        "home" => print_json(&home::load_home(&catalog).await)?,
        other => {
            usage();
            anyhow::bail!("unknown command '{}'", other);
        }
    }

    Ok(())
}

fn usage() {
    eprintln!("Usage: cargo run --bin catalog_probe -- browse <movie|series> [key=value ...]");
    eprintln!("       cargo run --bin catalog_probe -- detail <movie|series> <tmdb_id>");
    eprintln!("       cargo run --bin catalog_probe -- episodes <series_id> <season_number>");
    eprintln!("       cargo run --bin catalog_probe -- home");
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing {}", name))
}

fn parse_filter(pairs: &[String]) -> Result<FilterParams> {
    let mut params = FilterParams::default();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{}'", pair))?;
        let value = value.to_string();
        match key {
            "page" => params.page = Some(value.parse().context("page must be an integer")?),
            "sort_by" => params.sort_by = Some(value),
            "genre" => params.genre = Some(value),
            "provider" => params.provider = Some(value),
            "certification" => params.certification = Some(value),
            "country" => params.country = Some(value),
            "query" => params.query = Some(value),
            "min_score" => {
                params.min_score = Some(value.parse().context("min_score must be a number")?)
            }
            "max_score" => {
                params.max_score = Some(value.parse().context("max_score must be a number")?)
            }
            other => anyhow::bail!("unknown filter key '{}'", other),
        }
    }
    Ok(params)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
