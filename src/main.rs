//! Margin - a Micro.blog client for the terminal
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use margin::app::{App, StartScreen};
use margin::models::{Feed, Post};
use margin::pager::LoadOutcome;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Start => start().await,
        Command::SignIn { email } => sign_in(&email).await,
        Command::Verify { link } => verify(&link).await,
        Command::Logout => logout(),
        Command::WhoAmI => whoami(),
        Command::Feed { feed, limit, pages } => show_feed(feed, limit, pages).await,
        Command::Profile { username } => show_profile(&username).await,
        Command::Post { content, reply_to } => post(&content, reply_to.as_deref()).await,
        Command::Follow { username, follow } => set_follow(&username, follow).await,
        Command::MarkRead { post_id } => mark_read(&post_id).await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Start,
    SignIn { email: String },
    Verify { link: String },
    Logout,
    WhoAmI,
    Feed {
        feed: Feed,
        limit: Option<usize>,
        pages: usize,
    },
    Profile { username: String },
    Post { content: String, reply_to: Option<String> },
    Follow { username: String, follow: bool },
    MarkRead { post_id: String },
    Help,
    Version,
}

/// Value following a flag, e.g. `--pages 3`
fn flag_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn required(args: &[String], index: usize, what: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Missing {what}\nRun 'margin --help' for usage"))
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Start);
    }

    let pages = flag_value(&args, &["--pages", "-p"])
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    let limit = flag_value(&args, &["--limit", "-l"]).and_then(|s| s.parse().ok());

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "signin" | "login" => Ok(Command::SignIn {
            email: required(&args, 2, "email address")?,
        }),
        "verify" => Ok(Command::Verify {
            link: required(&args, 2, "sign-in link or token")?,
        }),
        "logout" => Ok(Command::Logout),
        "whoami" => Ok(Command::WhoAmI),

        "user" => Ok(Command::Feed {
            feed: Feed::User(required(&args, 2, "username")?.trim_start_matches('@').to_string()),
            limit,
            pages,
        }),
        "profile" => Ok(Command::Profile {
            username: required(&args, 2, "username")?.trim_start_matches('@').to_string(),
        }),

        "post" => Ok(Command::Post {
            content: required(&args, 2, "post content")?,
            reply_to: flag_value(&args, &["--reply-to", "-r"]).map(String::from),
        }),

        "follow" | "unfollow" => Ok(Command::Follow {
            username: required(&args, 2, "username")?.trim_start_matches('@').to_string(),
            follow: args[1] == "follow",
        }),

        "mark-read" | "read" => Ok(Command::MarkRead {
            post_id: required(&args, 2, "post id")?,
        }),

        other => match Feed::from_str(other) {
            Some(feed) => Ok(Command::Feed { feed, limit, pages }),
            None => Err(anyhow::anyhow!(
                "Unknown command: {other}\nRun 'margin --help' for usage"
            )),
        },
    }
}

fn print_help() {
    let config_path = margin::Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"{}
Margin - a Micro.blog client for the terminal

USAGE:
    margin                             Show your default feed (or how to sign in)
    margin [COMMAND]

COMMANDS:
    signin <email>                     Email yourself a sign-in link
    verify <link|token>                Finish signing in with the link from the email
    logout                             Forget the stored session
    whoami                             Show the signed-in account

    timeline [OPTIONS]                 Show your timeline
    mentions [OPTIONS]                 Show posts mentioning you
    bookmarks [OPTIONS]                Show your bookmarks
    discover [OPTIONS]                 Show the discover feed
    user <username> [OPTIONS]          Show a user's posts
      Options:
        -l, --limit <n>                Posts per page (default: page_size from config)
        -p, --pages <n>                Number of pages to load (default: 1)

    profile <username>                 Show a user's profile
    follow <username>                  Follow a user
    unfollow <username>                Unfollow a user
    mark-read <id>                     Move your timeline read marker to a post

    post <content> [OPTIONS]           Publish a post
      Options:
        -r, --reply-to <id>            Reply to a post

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}
"#,
        margin::LOGO,
        config_path
    );
}

fn print_version() {
    println!("margin {}", margin::VERSION);
}

async fn start() -> Result<()> {
    let app = App::open()?;
    match app.start_screen() {
        StartScreen::SignIn => {
            println!("Not signed in.\n");
            println!("Sign in with:");
            println!("  margin signin you@example.com");
            println!("  margin verify <link from the email>");
            Ok(())
        }
        StartScreen::Feed { feed, .. } => print_feed(&app, feed, None, 1).await,
    }
}

async fn sign_in(email: &str) -> Result<()> {
    let app = App::open()?;
    app.request_sign_in(email).await?;
    println!("Check your email for a sign-in link from Micro.blog.");
    println!("Then run: margin verify <link>");
    Ok(())
}

async fn verify(link: &str) -> Result<()> {
    let app = App::open()?;
    let session = app.complete_sign_in(link).await?;
    println!("Signed in as {} ({})", session.handle(), session.display_name);
    Ok(())
}

fn logout() -> Result<()> {
    let app = App::open()?;
    app.sign_out()?;
    println!("Signed out.");
    Ok(())
}

fn whoami() -> Result<()> {
    let app = App::open()?;
    match app.session() {
        Some(session) => println!("{} ({})", session.handle(), session.display_name),
        None => println!("Not signed in."),
    }
    Ok(())
}

async fn show_feed(feed: Feed, limit: Option<usize>, pages: usize) -> Result<()> {
    let app = App::open()?;
    print_feed(&app, feed, limit, pages).await
}

async fn print_feed(app: &App, feed: Feed, limit: Option<usize>, pages: usize) -> Result<()> {
    let pager = match limit {
        Some(limit) => app.pager_with_size(feed, limit),
        None => app.pager(feed),
    };
    pager.refresh().await?;

    for _ in 1..pages {
        if pager.load_more().await? == LoadOutcome::EndReached {
            break;
        }
    }

    let state = pager.snapshot();
    println!("\n{}", pager.feed());
    println!("{}", "─".repeat(60));

    if state.posts.is_empty() {
        println!("\nNothing here yet.");
    }
    for post in &state.posts {
        print_post(post);
    }

    if state.end_reached {
        println!("\n(end of feed)");
    } else if let Some(cursor) = state.cursor() {
        tracing::debug!(cursor, "more posts available");
    }
    Ok(())
}

fn print_post(post: &Post) {
    println!(
        "\n{} {} · {}  [{}]",
        post.author.name,
        post.author.handle(),
        post.relative_time(),
        post.id
    );
    for line in textwrap::wrap(&post.plain_text(), 72) {
        println!("  {line}");
    }
    if !post.url.is_empty() {
        println!("  {}", post.url);
    }
}

async fn show_profile(username: &str) -> Result<()> {
    let app = App::open()?;
    let profile = app.profile(username).await?;

    println!("\n{} @{}", profile.name, profile.username);
    if let Some(url) = &profile.url {
        println!("{url}");
    }
    if !profile.bio.is_empty() {
        println!();
        for line in textwrap::wrap(&profile.bio, 72) {
            println!("{line}");
        }
    }
    println!("\nFollowing {}", profile.following_count);
    if profile.is_you {
        println!("(this is you)");
    } else if profile.is_following {
        println!("You follow @{}", profile.username);
    }
    Ok(())
}

async fn post(content: &str, reply_to: Option<&str>) -> Result<()> {
    let app = App::open()?;
    let created = app.post(content, reply_to).await?;
    match created.url {
        Some(url) => println!("✓ Posted: {url}"),
        None => println!("✓ Posted successfully"),
    }
    Ok(())
}

async fn set_follow(username: &str, follow: bool) -> Result<()> {
    let app = App::open()?;
    if follow {
        app.follow(username).await?;
        println!("✓ Following @{username}");
    } else {
        app.unfollow(username).await?;
        println!("✓ Unfollowed @{username}");
    }
    Ok(())
}

async fn mark_read(post_id: &str) -> Result<()> {
    let app = App::open()?;
    app.mark_read(post_id).await?;
    println!("✓ Marked read up to {post_id}");
    Ok(())
}
