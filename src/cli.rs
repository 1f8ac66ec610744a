use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dailynew", version, about = "Daily article feed reader and publisher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the feed and list articles, newest first.
    List {
        /// Only show articles in this category ("全部" shows everything).
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive keyword matched against title, description and tags.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one article and record it in the viewing history.
    Show { id: String },
    /// Add an article to favorites.
    Favorite { id: String },
    /// Remove an article from favorites.
    Unfavorite { id: String },
    /// List favorites, most recent first.
    Favorites,
    /// List viewing history, most recent first.
    History,
    /// Forget the viewing history.
    ClearHistory,
    /// Show local counts, last sync and service readiness.
    Status,
    /// Save an article's images to the photo directory.
    Download {
        id: String,
        /// Save every image instead of only the primary one.
        #[arg(long)]
        all: bool,
    },
    /// Prepend a new article to the remote feed.
    Publish {
        #[arg(long)]
        title: String,
        /// Image URL; repeat for several images. The first becomes the cover.
        #[arg(long = "image", required = true)]
        images: Vec<String>,
        /// Publication date in `YYYY-MM-DD` format (defaults to today).
        #[arg(long, default_value = "")]
        date: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "")]
        video_id: String,
    },
}
