use std::io::{self, BufRead};
use std::path::PathBuf;

use eyre::{Result, WrapErr, bail};
use log::{debug, info, warn};

mod cli;

use cli::{Cli, Command, OutputFormat};
use ytsum::chain::{Acquired, TranscriptChain};
use ytsum::config::{self, Config};
use ytsum::service::Service;
use ytsum::{job, output, server, study};

fn setup_logging(to_stderr: bool) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();

    if to_stderr {
        builder.target(env_logger::Target::Stderr).init();
        return Ok(());
    }

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytsum.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytsum")
        .join("logs")
}

fn key_line(name: &str, present: bool) -> String {
    if present {
        format!("  \x1b[32m✅\x1b[0m {name}")
    } else {
        format!("  \x1b[31m❌\x1b[0m {name} (not set)")
    }
}

fn build_after_help(config: &Config) -> String {
    let keys = [
        key_line("GEMINI_API_KEY", config.gemini_api_key.is_some()),
        key_line("ANTHROPIC_API_KEY", config.anthropic_api_key.is_some()),
        key_line("OPENAI_API_KEY", config.openai_api_key.is_some()),
    ]
    .join("\n");

    let log_path = log_dir().join("ytsum.log");

    format!(
        "\nAPI KEYS:\n{keys}\n\nConfig is read from: {}\nLogs are written to: {}",
        config::config_path().display(),
        log_path.display()
    )
}

fn env_config<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();
    config.apply_env(lookup);
    config
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring config file: {e:#}");
            eprintln!("Ignoring config file: {e:#}");
            env_config(|key| std::env::var(key).ok())
        }
    }
}

fn emit(rendered: &str, path: Option<&PathBuf>, verbose: bool) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, rendered).wrap_err_with(|| format!("writing {}", path.display()))?;
            if verbose {
                eprintln!("Output written to: {}", path.display());
            }
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn report(acquired: &Acquired) {
    eprintln!(
        "Video: {}\nStrategy: {}\nLanguage: {} (requested {})\nCharacters: {}",
        acquired.video_id,
        acquired.strategy,
        acquired.language,
        acquired.requested_language,
        acquired.text.chars().count(),
    );
    for attempt in &acquired.attempts {
        match &attempt.outcome {
            Ok(_) => eprintln!("  ok   {} [{}]", attempt.strategy, attempt.language),
            Err(e) => eprintln!("  fail {} [{}]: {e}", attempt.strategy, attempt.language),
        }
    }
}

async fn transcript(
    config: &Config,
    url: Option<String>,
    format: OutputFormat,
    lang: &str,
    output_path: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let urls = match url {
        Some(url) => vec![url],
        None => {
            let stdin = io::stdin();
            stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
        }
    };
    let urls: Vec<&str> = urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();

    if urls.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytsum transcript <URL>\n       echo <URL> | ytsum transcript");
    }

    let chain = TranscriptChain::youtube(config.http_client()?, config);
    let mut rendered = Vec::with_capacity(urls.len());

    for url_input in urls {
        let video_id = ytsum::resolve(url_input).wrap_err_with(|| {
            format!(
                "could not extract video ID from: {url_input}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>"
            )
        })?;

        let acquired = chain.acquire(&video_id, lang).await?;
        if verbose {
            report(&acquired);
        }

        rendered.push(match format {
            OutputFormat::Text => output::render_text(&acquired),
            OutputFormat::Json => output::render_json(&acquired)?,
        });
    }

    emit(&rendered.join("\n\n"), output_path.as_ref(), verbose)
}

#[allow(clippy::too_many_arguments)]
async fn summarize(
    config: &Config,
    url: &str,
    quiz: Option<usize>,
    flashcards: Option<usize>,
    format: OutputFormat,
    lang: &str,
    output_path: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let service = Service::new(config)?;
    debug!("Summarizing with model {}", config.model());

    let summary = match service.summarize(url, lang).await {
        Ok(summary) => summary,
        Err(e) => match e.suggestion() {
            Some(suggestion) => bail!("{}\n{suggestion}", e.message()),
            None => return Err(e.into()),
        },
    };

    if verbose {
        eprintln!(
            "Video: {} ({})\nLanguage: {}",
            summary.video_title, summary.video_id, summary.language
        );
    }

    let questions = match quiz {
        Some(n) => service.quiz(&summary.summary, n).await?,
        None => Vec::new(),
    };
    let cards: Vec<study::Flashcard> = match flashcards {
        Some(n) => service.flashcards(&summary.summary, n).await?,
        None => Vec::new(),
    };

    let rendered = match format {
        OutputFormat::Text => output::render_summary_text(&summary, &questions, &cards),
        OutputFormat::Json => output::render_summary_json(&summary, &questions, &cards)?,
    };
    emit(&rendered, output_path.as_ref(), verbose)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Help only needs key presence, so the file is not read until logging is up
    let after_help = build_after_help(&env_config(|key| std::env::var(key).ok()));
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    let serving = matches!(cli.command, Command::Serve { .. });
    setup_logging(cli.log_stderr || serving)?;

    let mut config = load_config();

    // CLI flags take priority over config and environment
    if cli.hosted {
        config.hosted = true;
    }
    debug!("Hosted fallback: {}", config.hosted);

    if cli.verbose {
        let config_path = config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }

    match cli.command {
        Command::Transcript {
            url,
            format,
            lang,
            output,
        } => {
            let lang = lang.unwrap_or_else(|| config.lang().to_string());
            transcript(&config, url, format, &lang, output, cli.verbose).await
        }
        Command::Summarize {
            url,
            quiz,
            flashcards,
            format,
            lang,
            model,
            output,
        } => {
            if let Some(model) = model {
                config.default_model = Some(model);
            }
            let lang = lang.unwrap_or_else(|| config.lang().to_string());
            summarize(&config, &url, quiz, flashcards, format, &lang, output, cli.verbose).await
        }
        Command::Serve { port, model } => {
            if let Some(model) = model {
                config.default_model = Some(model);
            }
            if let Some(port) = port {
                config.port = Some(port);
            }
            let service = Service::new(&config)?;
            info!("Serving with model {}", config.model());
            server::serve(service, config.port()).await
        }
        Command::Job { kind, input, output } => {
            let service = Service::new(&config);
            if let Err(e) = &service {
                warn!("Service unavailable: {e:#}");
            }
            let code = job::run(kind, &input, &output, service).await;
            std::process::exit(code);
        }
    }
}
