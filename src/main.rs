mod cli;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use dailynew::config::AppConfig;
use dailynew::core::images::PERMISSION_HINT;
use dailynew::core::publish::ArticleDraft;
use dailynew::{App, ListArticlesRequest};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

const RETRY_HINT: &str = "加载失败，请检查网络后重试";

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info-level logs; override via RUST_LOG if needed.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let mut app = App::new(&config).map_err(|error| anyhow!(error))?;
    run(&mut app, cli.command).await
}

async fn run(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::List { category, search } => {
            refresh(app).await?;
            let articles = app.list_articles(&ListArticlesRequest { category, search });
            if articles.is_empty() {
                println!("暂无文章");
            }
            for entry in articles {
                let marker = if entry.is_favorited { "★" } else { " " };
                let article = entry.article;
                println!(
                    "{marker} {}  {}  [{}] {}",
                    article.id, article.publish_date, article.category, article.title
                );
            }
        }
        Commands::Show { id } => {
            refresh(app).await?;
            let entry = app.open_article(&id).map_err(|error| anyhow!(error))?;
            let article = entry.article;
            println!("{}", article.title);
            println!("{} · {}", article.publish_date, article.author);
            if !article.description.is_empty() {
                println!("{}", article.description);
            }
            for url in &article.image_urls {
                println!("  {url}");
            }
            if !article.video_id.is_empty() {
                println!("video: {}", article.video_id);
            }
            println!("favorited: {}", entry.is_favorited);
        }
        Commands::Favorite { id } => {
            if let Err(error) = app.refresh().await {
                tracing::warn!(error = %error, "feed unavailable, using local records");
            }
            let outcome = app.favorite(&id).map_err(|error| anyhow!(error))?;
            println!("{}", outcome.message());
        }
        Commands::Unfavorite { id } => {
            let outcome = app.unfavorite(&id);
            println!("{}", outcome.message());
            if !outcome.is_success() {
                bail!("could not update favorites");
            }
        }
        Commands::Favorites => print_entries(app.favorites_view()),
        Commands::History => print_entries(app.history_view()),
        Commands::ClearHistory => {
            app.clear_history().map_err(|error| anyhow!(error))?;
            println!("已清空");
        }
        Commands::Status => {
            let summary = app.profile_summary();
            println!("favorites: {}", summary.favorite_count);
            println!("history:   {}", summary.history_count);
            println!("last sync: {}", summary.last_sync_label);
            for (service, state) in app.health_report() {
                println!("{service:<8} {state}");
            }
        }
        Commands::Download { id, all } => {
            if let Err(error) = app.refresh().await {
                tracing::warn!(error = %error, "feed unavailable, using local records");
            }
            let tally = app
                .download_images(&id, all)
                .await
                .map_err(|error| anyhow!(error))?;
            println!("saved {} of {}", tally.succeeded, tally.succeeded + tally.failed);
            for (url, reason) in &tally.failures {
                println!("  failed {url}: {reason}");
            }
            if tally.permission_denied {
                println!("{PERMISSION_HINT}");
            }
            if tally.succeeded == 0 {
                bail!("no images were saved");
            }
        }
        Commands::Publish {
            title,
            images,
            date,
            description,
            author,
            video_id,
        } => {
            let draft = ArticleDraft::from_form(
                &title,
                &description,
                &images.join("\n"),
                &date,
                &video_id,
                &author,
            );
            let published = app.publish(draft).await.map_err(|error| anyhow!(error))?;
            println!(
                "published {} ({} articles total)",
                published.article_id, published.total_count
            );
        }
    }
    Ok(())
}

async fn refresh(app: &mut App) -> Result<()> {
    match app.refresh().await {
        Ok(refreshed) => {
            tracing::info!(
                articles = refreshed.article_count,
                last_update = %refreshed.last_update,
                "feed refreshed"
            );
            Ok(())
        }
        Err(error) => {
            eprintln!("{RETRY_HINT}");
            Err(anyhow!(error))
        }
    }
}

fn print_entries(entries: Vec<dailynew::OverlayEntryDto>) {
    if entries.is_empty() {
        println!("暂无记录");
    }
    for entry in entries {
        println!("{:<8} {}  {}", entry.when, entry.id, entry.title);
    }
}
