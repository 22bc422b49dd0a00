//! `storystage` command line entry point.
//!
//! # Responsibility
//! - Open the story database and run one stage session per invocation.
//! - Map subcommands onto story services and stage commands.

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use storystage_core::db::open_db;
use storystage_core::service::story_service::StoryService;
use storystage_core::{
    init_logging, CommandDispatcher, DispatchOutcome, FlushOutcome, SqliteStoryStore,
    StageConfig, StageController, StoryId, StoryStore, UserEdit,
};
use uuid::Uuid;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Story authoring from the terminal.
#[derive(Parser, Debug)]
#[command(name = "storystage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config and STORYSTAGE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Create a story with its first chapter
    NewStory {
        name: String,

        /// Chapter name of the first page
        #[arg(short, long)]
        chapter: String,
    },

    /// List stories
    List,

    /// Show the pages of a story
    Show { story: Uuid },

    /// Move a story to a zero-based position in the list
    MoveStory { story: Uuid, position: usize },

    /// Replace or extend the text of one page
    Write(WriteArgs),

    /// Run stage commands (save, next-page, insert-after, ...) in order
    Run {
        story: Uuid,

        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Set the chapter name of a page
    RenameChapter { article: Uuid, name: String },

    /// Set the outline of a page
    Outline { article: Uuid, text: String },
}

#[derive(Args, Debug)]
struct WriteArgs {
    story: Uuid,

    /// Zero-based page index
    #[arg(short, long, default_value_t = 0)]
    page: usize,

    /// Append paragraphs instead of replacing the page
    #[arg(short, long)]
    append: bool,

    text: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli)?;
    setup_logging(&cli, &config);

    let db_path = config.resolved_db_path();
    info!("event=cli_start module=cli status=ok db_path={}", db_path.display());
    let conn = open_db(&db_path)?;
    let store = SqliteStoryStore::try_new(&conn)?;

    match cli.command {
        CliCommand::NewStory { name, chapter } => {
            let story = StoryService::new(&store).create_story(&name, &chapter)?;
            println!("{}", story.id);
        }
        CliCommand::List => {
            for story in StoryService::new(&store).list_stories()? {
                println!("{}\t{}\t{} pages", story.id, story.name, story.article_count);
            }
        }
        CliCommand::Show { story } => {
            for page in StoryService::new(&store).story_outline(story)? {
                println!(
                    "{:>3}  {}  [{}] {}{}",
                    page.index,
                    page.article_id,
                    page.alignment.as_str(),
                    page.chapter_name
                        .map(|name| format!("# {name}  "))
                        .unwrap_or_default(),
                    page.preview
                );
            }
        }
        CliCommand::MoveStory { story, position } => {
            StoryService::new(&store).move_story(story, position)?;
        }
        CliCommand::Write(args) => write_page(&store, &config, &args)?,
        CliCommand::Run { story, commands } => run_commands(&store, &config, story, &commands)?,
        CliCommand::RenameChapter { article, name } => {
            StoryService::new(&store).rename_chapter(article, &name)?;
        }
        CliCommand::Outline { article, text } => {
            StoryService::new(&store).set_outline(article, &text)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> CliResult<StageConfig> {
    let config = match &cli.config {
        Some(path) => StageConfig::load(path)?,
        None => StageConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    Ok(config)
}

fn setup_logging(cli: &Cli, config: &StageConfig) {
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("storystage-logs"));
    if let Err(err) = init_logging(&config.log_level, &log_dir.to_string_lossy()) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn write_page(store: &SqliteStoryStore<'_>, config: &StageConfig, args: &WriteArgs) -> CliResult<()> {
    let story = store
        .get_story(args.story)?
        .ok_or_else(|| format!("story not found: {}", args.story))?;
    let article_id = story
        .article_at(args.page)
        .ok_or_else(|| format!("page {} out of range ({} pages)", args.page, story.len()))?;

    let mut stage = StageController::with_system_clock(store, config);
    stage.open_story(story.id, Some(article_id))?;

    if args.append {
        for line in args.text.lines() {
            let edits = append_paragraph(&stage, line);
            for edit in edits {
                stage.apply_edit(&edit)?;
            }
        }
    } else {
        stage.apply_edit(&UserEdit::ReplaceAll {
            text: args.text.clone(),
        })?;
    }

    report_flush(stage.teardown())
}

/// Edits that add `line` as a new last paragraph, reusing an empty
/// document's only block.
fn append_paragraph<C: storystage_core::Clock>(
    stage: &StageController<&SqliteStoryStore<'_>, C>,
    line: &str,
) -> Vec<UserEdit> {
    let Some(document) = stage.visible_document() else {
        return Vec::new();
    };
    let last = document.block_count().saturating_sub(1);
    if document.is_blank() {
        return vec![UserEdit::InsertText {
            block: 0,
            offset: 0,
            text: line.to_string(),
        }];
    }
    let end = document.block(last).map_or(0, |block| block.char_len());
    vec![
        UserEdit::SplitBlock {
            block: last,
            offset: end,
        },
        UserEdit::InsertText {
            block: last + 1,
            offset: 0,
            text: line.to_string(),
        },
    ]
}

fn run_commands(
    store: &SqliteStoryStore<'_>,
    config: &StageConfig,
    story_id: StoryId,
    commands: &[String],
) -> CliResult<()> {
    let dispatcher = CommandDispatcher::default();
    let mut stage = StageController::with_system_clock(store, config);
    stage.open_story(story_id, None)?;

    for name in commands {
        let outcome = dispatcher.dispatch_name(name, &mut stage)?;
        let cursor = stage.cursor();
        match outcome {
            DispatchOutcome::Handled => println!(
                "{name}: handled (page {})",
                cursor.map_or(0, |cursor| cursor.active_page_index)
            ),
            DispatchOutcome::Ignored => println!("{name}: ignored"),
        }
    }

    report_flush(stage.teardown())
}

fn report_flush(outcome: Option<FlushOutcome>) -> CliResult<()> {
    match outcome {
        Some(FlushOutcome::Failed { article_id, .. }) => {
            warn!("event=cli_flush module=cli status=error article_id={article_id}");
            Err(format!("could not save page {article_id}").into())
        }
        _ => Ok(()),
    }
}
