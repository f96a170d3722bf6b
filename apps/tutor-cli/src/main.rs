use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tutor_compose::{grade, preview, QuizOptions, Tutor};
use tutor_core::config::Config;
use tutor_core::types::Difficulty;

const CONTEXT_PREVIEW_CHARS: usize = 600;

#[derive(Parser)]
#[command(name = "tutor", version, about = "Ask grounded questions and take quizzes over your course material")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from the sources directory and load it
    Ingest {
        /// Sources directory (defaults to data.sources_dir)
        dir: Option<PathBuf>,
    },
    /// Force a reload of the committed index
    Reload,
    /// Show the passages retrieved for a query
    Search {
        query: String,
        #[arg(short, default_value_t = 8)]
        k: usize,
    },
    /// Answer a question from the indexed material
    Ask {
        question: String,
        #[arg(long)]
        show_context: bool,
    },
    /// Generate a multiple-choice quiz on a topic
    Quiz {
        topic: String,
        #[arg(short, default_value_t = 5)]
        n: usize,
        #[arg(long, default_value = "easy")]
        difficulty: Difficulty,
        /// Expand short explanations into mini-lessons
        #[arg(long)]
        enrich: bool,
        #[arg(long)]
        shuffle: bool,
        /// Print the quiz as JSON
        #[arg(long)]
        json: bool,
        /// Answer the questions interactively and get a score
        #[arg(long)]
        take: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let show_progress = matches!(cli.command, Command::Ingest { .. });
    let tutor = Tutor::from_settings(&settings, config.base_dir())?.with_progress(show_progress);
    debug!(sources = %tutor.sources_dir().display(), index = %tutor.handle().store().root().display(), "tutor ready");

    match cli.command {
        Command::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| tutor.sources_dir().to_path_buf());
            let report = tutor.build_index_from(&dir).await.with_context(|| format!("building index from {}", dir.display()))?;
            println!("Indexed {} chunks from {} files ({} skipped, {} vectors reused)", report.chunks_indexed, report.files_indexed, report.files_skipped, report.reused_vectors);
            if report.chunks_indexed == 0 {
                println!("No text found in {}; the existing index was left as it was.", dir.display());
                return Ok(());
            }
            let loaded = tutor.reload_index(true).context("reloading the new index")?;
            println!("Loaded generation {} ({} rows, dim {})", loaded.manifest.generation, loaded.snapshot.len(), loaded.snapshot.dim());
        }
        Command::Reload => {
            let loaded = tutor.reload_index(true).context("reloading index")?;
            println!("Loaded generation {} ({} rows, embedder {})", loaded.manifest.generation, loaded.snapshot.len(), loaded.manifest.embedder_id);
        }
        Command::Search { query, k } => {
            let hits = tutor.search(&query, k).await?;
            println!("{} results for \"{}\"", hits.len(), query);
            for (i, h) in hits.iter().enumerate() {
                println!("\n  {}. score={:.4} lexical={:.1}  {} #{}", i + 1, h.score, h.lexical, h.source, h.ordinal);
                println!("     {}", h.text);
            }
        }
        Command::Ask { question, show_context } => {
            let answer = tutor.answer(&question).await?;
            println!("{}", answer.text);
            if show_context {
                println!("\n--- context ---");
                for (i, h) in answer.hits.iter().enumerate() {
                    println!("[{}] ({} #{}) score={:.4}", i + 1, h.source, h.ordinal, h.score);
                    println!("    {}", preview(&h.text, CONTEXT_PREVIEW_CHARS));
                }
            }
        }
        Command::Quiz { topic, n, difficulty, enrich, shuffle, json, take } => {
            let opts = QuizOptions { n, difficulty, enrich: enrich || settings.quiz.enrich };
            let mut quiz = tutor.make_quiz_with(&topic, &opts).await?;
            if shuffle { quiz.shuffle_choices(&mut rand::thread_rng()); }
            if json {
                println!("{}", serde_json::to_string_pretty(&quiz)?);
            } else if take {
                take_quiz(&quiz)?;
            } else {
                print_quiz(&quiz);
            }
        }
    }
    Ok(())
}

fn print_quiz(quiz: &tutor_compose::Quiz) {
    println!("{} of {} questions", quiz.count, quiz.requested);
    for (i, q) in quiz.questions.iter().enumerate() {
        println!("\nQ{}. {}", i + 1, q.prompt);
        for (j, c) in q.choices.iter().enumerate() { println!("   {}) {}", j + 1, c); }
        println!("   Answer: {}", q.answer);
        if !q.explanation.is_empty() { println!("   {}", q.explanation); }
    }
}

fn take_quiz(quiz: &tutor_compose::Quiz) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut responses = Vec::with_capacity(quiz.questions.len());
    for (i, q) in quiz.questions.iter().enumerate() {
        println!("\nQ{}. {}", i + 1, q.prompt);
        for (j, c) in q.choices.iter().enumerate() { println!("   {}) {}", j + 1, c); }
        print!("Your answer: ");
        io::stdout().flush()?;
        let line = lines.next().transpose()?.unwrap_or_default();
        responses.push(q.choice_for(&line));
    }
    let result = grade(quiz, &responses);
    for (i, r) in result.results.iter().enumerate() {
        let mark = if r.correct { "correct" } else { "wrong" };
        println!("\nQ{}: {} (answer: {})", i + 1, mark, r.answer);
        if !r.explanation.is_empty() { println!("   {}", r.explanation); }
    }
    println!("\nScore: {}/{}", result.score, result.total);
    Ok(())
}
