//! blog-client: terminal front end for the blog platform
//!
//! Every invocation hydrates the stored session, runs one view or action and
//! prints the result.
//!
//! Usage:
//!   blog-client login -u alice -p 'secret'
//!   blog-client home
//!   blog-client article 42
//!   blog-client comment 42 --content "Nice post" --reply-to 7

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use blog_client::forms::{ArticleForm, Registration};
use blog_client::models::{ArticleId, CommentId};
use blog_client::routes::{Navigator, Route};
use blog_client::views::{
    self, ArticleListView, ArticleView, EditorMode, EditorView, ListSource, LoginView, RegisterView, View,
};
use blog_client::{ApiClient, ClientConfig, ClientError, SessionController, SessionState, SessionStore};

/// Gate redirects are followed at most this many times per run.
const MAX_REDIRECTS: usize = 4;

#[derive(Parser)]
#[command(name = "blog-client")]
#[command(about = "Terminal client for the blog platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend origin; overrides BLOG_BACKEND_URL.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Session database directory; overrides BLOG_SESSION_PATH.
    #[arg(long, global = true)]
    session: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    Home {
        /// `next`/`previous` URL from an earlier page.
        #[arg(long)]
        page: Option<String>,
    },
    /// Open any route path, e.g. `/article/3` or `/tag/rust`.
    Open { route: String },
    Article { id: ArticleId },
    Search { query: String },
    Tag {
        tag: String,
        #[arg(long)]
        page: Option<String>,
    },
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Confirmation; defaults to the password.
        #[arg(long)]
        password2: Option<String>,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        bio: String,
        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        birth_date: String,
        #[arg(long)]
        profile_pic: Option<PathBuf>,
    },
    Logout,
    Whoami,
    CreateArticle {
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        content: String,
        /// Comma-separated.
        #[arg(long, default_value = "")]
        tags: String,
    },
    EditArticle {
        id: ArticleId,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },
    DeleteArticle { id: ArticleId },
    Comment {
        article: ArticleId,
        #[arg(short, long)]
        content: String,
        #[arg(short, long)]
        reply_to: Option<CommentId>,
    },
    EditComment {
        article: ArticleId,
        comment: CommentId,
        #[arg(short, long)]
        content: String,
    },
    DeleteComment { article: ArticleId, comment: CommentId },
}

/// Hard redirects become a printed hint; the next invocation picks it up.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn hard_redirect(&self, route: &Route) {
        println!("-> {route}");
    }
}

fn init_tracing(config: &ClientConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "blog-client.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (writer, config.log_json) {
        (Some(writer), true) => builder.json().with_writer(writer).init(),
        (Some(writer), false) => builder.with_ansi(false).with_writer(writer).init(),
        (None, true) => builder.json().with_writer(std::io::stderr).init(),
        (None, false) => builder.with_writer(std::io::stderr).init(),
    }
    guard
}

/// Load a view, follow gate redirects, and print what it renders.
async fn show(mut view: Box<dyn View>, session: &Arc<SessionController>) {
    for _ in 0..MAX_REDIRECTS {
        if let Err(err) = view.load().await {
            tracing::debug!(error = %err, route = %view.route(), "view loaded with errors");
        }
        match view.redirect() {
            Some(route) => {
                println!("-> {route}");
                view.mount().unmount();
                view = views::open(route, Arc::clone(session));
            }
            None => break,
        }
    }
    println!("{}", view.render());
}

fn report(err: &ClientError) {
    match err {
        ClientError::Validation(errors) => {
            for (field, messages) in errors.iter() {
                for message in messages {
                    eprintln!("{field}: {message}");
                }
            }
        }
        other => eprintln!("{}", other.user_message()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.url {
        config = config.with_backend_url(url)?;
    }
    if let Some(path) = &cli.session {
        config = config.with_session_path(path);
    }
    let _guard = init_tracing(&config);

    let store = SessionStore::open(&config.session_path)?;
    let api = ApiClient::new(config, store);
    let session = Arc::new(SessionController::new(api, Arc::new(TerminalNavigator)));
    let state = session.init().await;
    tracing::debug!(authenticated = state.profile().is_some(), "session initialised");
    let _watcher = session.spawn_expiry_watcher();

    match cli.command {
        Commands::Home { page } => {
            let mut view = ArticleListView::new(Arc::clone(&session), ListSource::All);
            if let Err(err) = view.load_page(page.as_deref()).await {
                tracing::debug!(error = %err, "home page failed to load");
            }
            println!("{}", view.render());
        }
        Commands::Open { route } => match Route::parse(&route) {
            Some(route) => show(views::open(route, Arc::clone(&session)), &session).await,
            None => eprintln!("No page at {route}"),
        },
        Commands::Article { id } => show(Box::new(ArticleView::new(Arc::clone(&session), id)), &session).await,
        Commands::Search { query } => {
            show(views::open(Route::Search(query), Arc::clone(&session)), &session).await
        }
        Commands::Tag { tag, page } => {
            let mut view = ArticleListView::new(Arc::clone(&session), ListSource::Tag(tag));
            if let Err(err) = view.load_page(page.as_deref()).await {
                tracing::debug!(error = %err, "tag page failed to load");
            }
            println!("{}", view.render());
        }
        Commands::Login { username, password } => {
            let mut view = LoginView::new(Arc::clone(&session));
            view.form.username = username;
            view.form.password = password;
            match view.submit().await {
                Ok(route) => show(views::open(route, Arc::clone(&session)), &session).await,
                Err(_) => println!("{}", view.render()),
            }
        }
        Commands::Register {
            username,
            email,
            password,
            password2,
            first_name,
            last_name,
            bio,
            birth_date,
            profile_pic,
        } => {
            let mut view = RegisterView::new(Arc::clone(&session));
            view.form = Registration {
                username,
                email,
                password2: password2.unwrap_or_else(|| password.clone()),
                password,
                first_name,
                last_name,
                bio,
                birth_date,
                profile_pic,
            };
            match view.submit().await {
                Ok(profile) => println!("Welcome, {}!", profile.username),
                Err(_) => println!("{}", view.render()),
            }
        }
        Commands::Logout => session.logout(),
        Commands::Whoami => match session.state() {
            SessionState::Authenticated(profile) => {
                println!("{} (id {})", profile.username, profile.id);
                if !profile.groups.is_empty() {
                    println!("groups: {}", profile.groups.join(", "));
                }
                if profile.is_superuser {
                    println!("superuser");
                }
            }
            _ => println!("Not logged in"),
        },
        Commands::CreateArticle { title, content, tags } => {
            let mut view = EditorView::new(Arc::clone(&session), EditorMode::Create);
            view.load().await?;
            if let Some(route) = view.redirect() {
                println!("-> {route}");
                return Ok(());
            }
            view.form = ArticleForm { title, content, tags };
            match view.submit().await {
                Ok(route) => show(views::open(route, Arc::clone(&session)), &session).await,
                Err(err) => {
                    report(&err);
                    println!("{}", view.render());
                }
            }
        }
        Commands::EditArticle { id, title, content, tags } => {
            let mut view = EditorView::new(Arc::clone(&session), EditorMode::Edit(id));
            if let Err(err) = view.load().await {
                report(&err);
                return Ok(());
            }
            if let Some(route) = view.redirect() {
                println!("-> {route}");
                return Ok(());
            }
            if let Some(title) = title {
                view.form.title = title;
            }
            if let Some(content) = content {
                view.form.content = content;
            }
            if let Some(tags) = tags {
                view.form.tags = tags;
            }
            match view.submit().await {
                Ok(route) => show(views::open(route, Arc::clone(&session)), &session).await,
                Err(err) => {
                    report(&err);
                    println!("{}", view.render());
                }
            }
        }
        Commands::DeleteArticle { id } => {
            let mut view = ArticleView::new(Arc::clone(&session), id);
            match view.delete_article().await {
                Ok(route) => show(views::open(route, Arc::clone(&session)), &session).await,
                Err(err) => report(&err),
            }
        }
        Commands::Comment { article, content, reply_to } => {
            let mut view = ArticleView::new(Arc::clone(&session), article);
            view.load().await?;
            let result = match reply_to {
                Some(parent) => view.reply(parent, &content).await,
                None => view.post_comment(&content).await,
            };
            if let Err(err) = result {
                report(&err);
            }
            println!("{}", view.render());
        }
        Commands::EditComment { article, comment, content } => {
            let mut view = ArticleView::new(Arc::clone(&session), article);
            view.load().await?;
            let result = match view.begin_edit(comment) {
                Ok(()) => {
                    view.set_edit_text(content);
                    view.submit_edit().await
                }
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                report(&err);
            }
            println!("{}", view.render());
        }
        Commands::DeleteComment { article, comment } => {
            let mut view = ArticleView::new(Arc::clone(&session), article);
            view.load().await?;
            if let Err(err) = view.delete_comment(comment).await {
                report(&err);
            }
            println!("{}", view.render());
        }
    }

    Ok(())
}
