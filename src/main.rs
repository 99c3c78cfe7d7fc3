/// Kejmiltube - command-line client
///
/// Browse, watch, upload and comment on Kejmiltube videos from a terminal.
/// Each subcommand stands in for one page of the site.
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use kejmiltube::{
    content::{format_views, time_ago, FeedTab, Listing},
    engagement::ReactionTarget,
    forms::{self, LoginForm, RegisterForm},
    models::{NewVideo, Video, VideoFilter, CATEGORIES},
    session::SessionState,
    AppContext, ClientConfig,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kejmiltube")]
#[command(about = "Command-line client for the Kejmiltube video site")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List videos, optionally filtered by a search query
    Browse {
        #[arg(short, long)]
        search: Option<String>,
        /// recommended, trending or recent
        #[arg(short, long, default_value = "recommended")]
        tab: FeedTab,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show a video with its comments and count a view
    Watch { video_id: String },
    /// Comment on a video
    Comment { video_id: String, text: String },
    /// Like or dislike a comment
    React {
        video_id: String,
        comment_id: String,
        #[arg(long)]
        dislike: bool,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "KEJMILTUBE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to the password when omitted
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Sign in
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "KEJMILTUBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show who is signed in
    Whoami,
    /// Show channel stats, or change the username
    Profile {
        #[arg(long)]
        username: Option<String>,
    },
    /// Publish a video by external link
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        thumbnail: Option<String>,
    },
    /// List your own uploads
    MyVideos,
    /// List upload categories
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    let default_filter = config.logging.directive();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = AppContext::new(config)
        .await
        .context("Failed to initialize client")?;
    ctx.start().await;

    info!("Kejmiltube client v{}", ctx.config.service.version);

    let result = run(&ctx, cli.command).await;
    ctx.shutdown();
    result
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Browse { search, tab, category } => {
            let filter = match category {
                Some(category) => VideoFilter::category(category),
                None => VideoFilter::default(),
            };
            let videos = ctx.content.list_videos(&filter).await?;
            let listing = Listing::build(videos, search.as_deref(), tab);

            println!("{} ({}, {})", listing.heading(), listing.tab, listing.summary());
            if listing.is_empty() {
                println!("{}", listing.empty_message());
            }
            for video in &listing.videos {
                print_video_line(video);
            }
        }
        Command::Watch { video_id } => {
            let video = ctx.content.get_video(&video_id).await?;
            ctx.engagement.record_view(&video.id).await;

            println!("{}", video.title);
            println!(
                "{} views · {} · {} · {}",
                format_views(video.views),
                time_ago(video.created_at, Utc::now()),
                video.category,
                video.author()
            );
            println!("{}", video.video_url);
            println!("{}", ctx.video_link(&video.id));
            if !video.description_text().is_empty() {
                println!("\n{}", video.description_text());
            }

            let comments = ctx.content.list_comments(&video.id).await?;
            println!("\n{} comments", comments.len());
            for comment in &comments {
                println!(
                    "  [{}] {} ({}): {}  +{} -{}",
                    comment.id,
                    comment.author,
                    time_ago(comment.created_at, Utc::now()),
                    comment.content,
                    comment.likes,
                    comment.dislikes
                );
            }
        }
        Command::Comment { video_id, text } => {
            ctx.content.get_video(&video_id).await?;
            let result = forms::submit_comment(&ctx.session, &ctx.content, &video_id, &text).await;
            println!("{}", result.notice);
        }
        Command::React { video_id, comment_id, dislike } => {
            let comments = ctx.content.list_comments(&video_id).await?;
            ctx.engagement.track_comments(&comments).await;

            let target = ReactionTarget::Comment(comment_id);
            let counts = if dislike {
                ctx.engagement.toggle_dislike(&target).await
            } else {
                ctx.engagement.toggle_like(&target).await
            };
            match counts {
                Ok(counts) => println!("+{} -{}", counts.likes, counts.dislikes),
                Err(e) => println!("Reaction not saved: {}", e.user_message()),
            }
        }
        Command::Register {
            email,
            username,
            password,
            confirm_password,
        } => {
            let form = RegisterForm {
                email,
                username,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            let result = forms::submit_register(&ctx.session, &form).await;
            println!("{}", result.notice);
        }
        Command::Login { email, password } => {
            let result = forms::submit_login(&ctx.session, &LoginForm { email, password }).await;
            println!("{}", result.notice);
        }
        Command::Logout => {
            ctx.session.logout().await;
            println!("Signed out");
        }
        Command::Whoami => match ctx.session.current() {
            SessionState::Authenticated(profile) => {
                println!("{} <{}>", profile.username, profile.email);
            }
            _ => println!("Not signed in"),
        },
        Command::Profile { username } => {
            if let Some(username) = username {
                let result = forms::submit_profile(&ctx.session, &username).await;
                println!("{}", result.notice);
            }
            match forms::profile_overview(&ctx.session, &ctx.content).await {
                Some(overview) => {
                    println!("{} <{}>", overview.profile.username, overview.profile.email);
                    println!("Avatar: {}", overview.profile.avatar());
                    println!(
                        "{} videos, {} total views",
                        overview.stats.video_count,
                        format_views(overview.stats.total_views)
                    );
                }
                None => println!("Sign in to see your profile"),
            }
        }
        Command::Upload {
            title,
            url,
            category,
            description,
            thumbnail,
        } => {
            let video = NewVideo {
                title,
                description,
                category,
                video_url: url,
                thumbnail_url: thumbnail,
            };
            let result = forms::submit_upload(&ctx.session, &ctx.content, video).await;
            println!("{}", result.notice);
            if let Some(video) = result.value {
                println!("{}", ctx.video_link(&video.id));
            }
        }
        Command::MyVideos => {
            let Some(profile) = ctx.session.current_profile() else {
                println!("Sign in to see your videos");
                return Ok(());
            };
            let videos = ctx.content.list_videos(&VideoFilter::owner(&profile.id)).await?;
            if videos.is_empty() {
                println!("You have not uploaded any videos yet");
            }
            for video in &videos {
                print_video_line(video);
            }
        }
        Command::Categories => {
            for category in CATEGORIES {
                println!("{}", category);
            }
        }
    }

    Ok(())
}

fn print_video_line(video: &Video) {
    println!(
        "  [{}] {} · {} · {} views · {}",
        video.id,
        video.title,
        video.author(),
        format_views(video.views),
        time_ago(video.created_at, Utc::now())
    );
}
