use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use newsdesk::feed::NewsApiClient;
use newsdesk::models::{Article, Comment};
use newsdesk::social::{Session, SqliteSocialStore};
use newsdesk::{AppError, Config, Reconciler};

const WIDTH: usize = 80;

enum Command {
    Headlines,
    Search(String),
    Show(String),
    Comments(String),
    Comment(String, String),
    Like(String),
    Bookmark(String),
    Bookmarks,
    Topics,
    Authors,
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let rest = |from: usize| args[from..].join(" ");
        let id = |name: &str| -> anyhow::Result<String> {
            args.get(1)
                .cloned()
                .with_context(|| format!("usage: newsdesk {} <article-id>", name))
        };
        let text = |name: &str, from: usize, what: &str| -> anyhow::Result<String> {
            let joined = rest(from.min(args.len()));
            if joined.trim().is_empty() {
                bail!("usage: newsdesk {} {}", name, what);
            }
            Ok(joined)
        };

        let command = match args.first().map(String::as_str) {
            None | Some("headlines") => Command::Headlines,
            Some("search") => Command::Search(text("search", 1, "<text>")?),
            Some("show") => Command::Show(id("show")?),
            Some("comments") => Command::Comments(id("comments")?),
            Some("comment") => Command::Comment(
                id("comment")?,
                text("comment", 2, "<article-id> <text>")?,
            ),
            Some("like") => Command::Like(id("like")?),
            Some("bookmark") => Command::Bookmark(id("bookmark")?),
            Some("bookmarks") => Command::Bookmarks,
            Some("topics") => Command::Topics,
            Some("authors") => Command::Authors,
            Some(other) => bail!(
                "unknown command {:?}\nusage: newsdesk [headlines | search <text> | show <id> | comments <id> | comment <id> <text> | like <id> | bookmark <id> | bookmarks | topics | authors]",
                other
            ),
        };
        Ok(command)
    }
}

fn print_article(index: usize, article: &Article) {
    println!("{:>2}. {}", index + 1, article.title);
    println!("    [{}] {}", article.id, article.source_name());
    if let Some(text) = article.description.as_deref().or(article.content_text.as_deref()) {
        let options = textwrap::Options::new(WIDTH)
            .initial_indent("    ")
            .subsequent_indent("    ");
        println!("{}", textwrap::fill(text, options));
    }
}

fn print_comments(comments: &[Comment]) {
    if comments.is_empty() {
        println!("No comments yet.");
    }
    for comment in comments {
        println!("{}:", comment.author_name);
        let options = textwrap::Options::new(WIDTH)
            .initial_indent("  ")
            .subsequent_indent("  ");
        println!("{}", textwrap::fill(&comment.content, options));
    }
}

async fn find_loaded(reconciler: &Reconciler, id: &str) -> anyhow::Result<Article> {
    if let Err(e) = reconciler.load_news().await {
        eprintln!("warning: {}", e);
    }
    reconciler
        .state()
        .loaded_articles()
        .into_iter()
        .find(|a| a.id == id)
        .with_context(|| format!("no loaded article with id {}", id))
}

async fn run(reconciler: &Reconciler, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Headlines => {
            if let Err(e) = reconciler.load_news().await {
                eprintln!("warning: {} (showing sample articles)", e);
            }
            let state = reconciler.state();
            println!("== Trending ==");
            for (i, article) in state.trending.get().iter().enumerate() {
                print_article(i, article);
            }
            println!("\n== Latest ==");
            for (i, article) in state.latest.get().iter().enumerate() {
                print_article(i, article);
            }
        }
        Command::Search(text) => {
            if let Err(e) = reconciler.load_news().await {
                eprintln!("warning: {}", e);
            }
            let results = reconciler.search_articles(&text).await;
            if results.is_empty() {
                println!("Nothing matches {:?}.", text);
            }
            for (i, article) in results.iter().enumerate() {
                print_article(i, article);
            }
        }
        Command::Show(id) => {
            let article = find_loaded(reconciler, &id).await?;
            reconciler.select_article(article.clone()).await;
            let state = reconciler.state();
            print_article(0, &article);
            println!(
                "    {} likes{} | {} comments{}",
                state.article_like_count.get(),
                if state.is_article_liked.get() { " (you)" } else { "" },
                state.article_comment_count.get(),
                if state.is_article_bookmarked.get() { " | bookmarked" } else { "" },
            );
        }
        Command::Comments(id) => {
            let comments = reconciler.load_comments_for_article(&id).await?;
            print_comments(&comments);
        }
        Command::Comment(id, text) => {
            reconciler.add_comment(&id, &text).await?;
            print_comments(&reconciler.state().comments.get());
        }
        Command::Like(id) => {
            let liked = reconciler.toggle_like(&id).await?;
            println!("{} {}", if liked { "Liked" } else { "Unliked" }, id);
        }
        Command::Bookmark(id) => {
            let bookmarked = reconciler.toggle_bookmark(&id).await?;
            println!(
                "{} {}",
                if bookmarked { "Bookmarked" } else { "Removed bookmark" },
                id
            );
        }
        Command::Bookmarks => {
            if let Err(e) = reconciler.load_news().await {
                eprintln!("warning: {}", e);
            }
            let bookmarked = reconciler.state().bookmarked_articles.get();
            if bookmarked.is_empty() {
                println!("No bookmarked articles among today's headlines.");
            }
            for (i, article) in bookmarked.iter().enumerate() {
                print_article(i, article);
            }
        }
        Command::Topics => {
            reconciler.load_topics().await;
            for topic in reconciler.state().topics.get() {
                println!(
                    "{:>3}. {} - {}",
                    topic.id,
                    topic.name,
                    topic.description.unwrap_or_default()
                );
            }
        }
        Command::Authors => {
            reconciler.load_authors().await;
            for author in reconciler.state().authors.get() {
                println!(
                    "{} ({} followers)",
                    author.name,
                    author.followers.unwrap_or_else(|| "?".to_string())
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let config = Config::load().context("loading config")?;
    if config.api_key.is_none() {
        tracing::warn!("No API key configured; set NEWSAPI_KEY or api_key in {:?}", Config::config_path());
    }

    let session = Session::new();
    if let Some(uid) = &config.user_id {
        session.sign_in(uid, config.user_email.as_deref());
    }

    let api = Arc::new(NewsApiClient::new(&config)?);
    let store = Arc::new(
        SqliteSocialStore::open(&config.db_path, session)
            .await
            .with_context(|| format!("opening {}", config.db_path))?,
    );
    let reconciler = Reconciler::new(api, store, &config);

    let result = run(&reconciler, command).await;
    if let Err(e) = &result {
        if e.downcast_ref::<AppError>().is_some_and(AppError::is_auth_required) {
            eprintln!(
                "Set user_id in {:?} or export NEWSDESK_USER to sign in.",
                Config::config_path()
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> anyhow::Result<Command> {
        let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        Command::parse(&args)
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse("").unwrap(), Command::Headlines));
        assert!(matches!(parse("search rust news").unwrap(), Command::Search(q) if q == "rust news"));
        assert!(matches!(
            parse("comment a1 nice piece").unwrap(),
            Command::Comment(id, text) if id == "a1" && text == "nice piece"
        ));
    }

    #[test]
    fn test_missing_text_is_a_usage_error() {
        let err = parse("search").err().unwrap().to_string();
        assert_eq!(err, "usage: newsdesk search <text>");

        let err = parse("comment a1").err().unwrap().to_string();
        assert_eq!(err, "usage: newsdesk comment <article-id> <text>");

        let err = parse("comment").err().unwrap().to_string();
        assert_eq!(err, "usage: newsdesk comment <article-id>");

        let err = parse("like").err().unwrap().to_string();
        assert!(err.starts_with("usage:"));
    }

    #[test]
    fn test_unknown_command() {
        let err = parse("frobnicate").err().unwrap().to_string();
        assert!(err.starts_with("unknown command"));
    }
}
