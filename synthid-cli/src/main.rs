use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use synthid_client::Backend;
use synthid_config::ClientConfig;
use synthid_core::{AppEvent, Testbed};
use synthid_types::{
    AttackType, DetectionId, DetectionQuery, Generation, GenerationId, GenerationQuery, SortOrder,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "synthid", about = "SynthID testbed client")]
struct Cli {
    /// Backend base URL; overrides the config file and SYNTHID_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print records as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate text with the configured model.
    Generate {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        no_watermark: bool,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    Generations {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value_t = SortOrder::Latest)]
        sort: SortOrder,
    },
    Detections {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = SortOrder::Latest)]
        sort: SortOrder,
    },
    ShowGeneration {
        id: GenerationId,
    },
    ShowDetection {
        id: DetectionId,
    },
    /// Attack a generation; the result is stored as a new generation.
    Attack {
        id: GenerationId,
        #[arg(long = "type", default_value_t = AttackType::Deletion)]
        attack_type: AttackType,
        /// Percent of the text to perturb, 0 to 100.
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(0..=100))]
        intensity: u32,
    },
    /// Run watermark detection on a generation.
    Verify {
        id: GenerationId,
    },
    Delete {
        id: GenerationId,
    },
    Stats,
}

fn print_generation(gen: &Generation) {
    match gen.original_id {
        Some(orig) => println!("#{} (attack of #{orig}) {} {}", gen.id, gen.model, gen.created_at),
        None => println!("#{} {} {}", gen.id, gen.model, gen.created_at),
    }
    println!("prompt: {}", gen.input_text);
    println!("output: {}", gen.output_text);
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "synthid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    tracing::debug!(api_url = %config.api_url, "using backend");
    let page_size = config.page_size;
    let mut bed = Testbed::connect(config);

    match cli.command {
        Command::Generate {
            prompt,
            model,
            no_watermark,
            temperature,
            max_tokens,
        } => {
            let mut cfg = bed.state().generation().clone();
            if let Some(model) = model {
                cfg.model = model;
            }
            if no_watermark {
                cfg.watermark_enabled = false;
            }
            if let Some(t) = temperature {
                cfg.temperature = t;
            }
            if let Some(n) = max_tokens {
                cfg.max_tokens = n;
            }
            bed.dispatch(AppEvent::SetGenerationConfig(cfg));
            let gen = bed
                .generate(&prompt)
                .await?
                .context("a generation is already in flight")?;
            if cli.json {
                print_json(&gen)?;
            } else {
                print_generation(&gen);
            }
        }
        Command::Generations {
            page,
            search,
            model,
            sort,
        } => {
            let mut query = GenerationQuery::new(page, page_size);
            query.sort = sort;
            query.search = search;
            query.model = model;
            let listed = bed.backend().list_generations(&query).await?;
            if cli.json {
                return print_json(&listed);
            }
            for row in &listed.items {
                let tag = match row.attack_type {
                    Some(a) => format!(" [{a}]"),
                    None => String::new(),
                };
                let wm = if row.watermark_enabled { "wm" } else { "--" };
                println!(
                    "#{:<5} {} {:<12} {wm}{tag} {}",
                    row.id,
                    row.created_at.format("%Y-%m-%d %H:%M"),
                    row.model,
                    synthid_types::preview(&row.input_text, 60)
                );
            }
            println!("page {}/{} ({} total)", listed.page, pages(listed.total, page_size), listed.total);
        }
        Command::Detections { page, search, sort } => {
            let mut query = DetectionQuery::new(page, page_size);
            query.sort = sort;
            query.search = search;
            let listed = bed.backend().list_detections(&query).await?;
            if cli.json {
                return print_json(&listed);
            }
            for row in &listed.items {
                println!(
                    "#{:<5} gen #{:<5} {:<18} {:>5.1}% {}",
                    row.id,
                    row.generation_id,
                    row.verdict().label(),
                    row.confidence_percent(),
                    row.input_text_preview
                );
            }
            println!("page {}/{} ({} total)", listed.page, pages(listed.total, page_size), listed.total);
        }
        Command::ShowGeneration { id } => {
            let gen = bed.backend().get_generation(id).await?;
            if cli.json {
                print_json(&gen)?;
            } else {
                print_generation(&gen);
            }
        }
        Command::ShowDetection { id } => {
            let det = bed.backend().get_detection(id).await?;
            if cli.json {
                print_json(&det)?;
            } else {
                println!("#{} on generation #{} {}", det.id, det.generation_id, det.created_at);
                println!("{} ({:.1}%)", det.verdict(), det.confidence_percent());
                println!("text: {}", det.input_text);
            }
        }
        Command::Attack {
            id,
            attack_type,
            intensity,
        } => {
            bed.dispatch(AppEvent::SetAttackType(attack_type));
            bed.select(id).await?;
            bed.intensity_mut().input(intensity.to_string());
            let attacked = bed
                .attack()
                .await?
                .context("attack did not run")?;
            if cli.json {
                print_json(&attacked)?;
            } else {
                print_generation(&attacked);
            }
        }
        Command::Verify { id } => {
            bed.select(id).await?;
            let report = bed.verify().await?.context("verification did not run")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{report}");
            }
        }
        Command::Delete { id } => {
            bed.delete(id).await?;
            println!("deleted #{id}");
        }
        Command::Stats => {
            let stats = bed.load_stats().await?;
            if cli.json {
                return print_json(&stats);
            }
            println!("verifications   {}", stats.total_verifications);
            println!("avg auc         {:.3}", stats.avg_auc);
            println!("detection rate  {:.1}%", stats.detection_rate);
            println!("attack attempts {}", stats.attack_attempts);
            for bin in &stats.distribution {
                println!("  {:<8} clean {:>4}  watermarked {:>4}", bin.range, bin.clean, bin.watermarked);
            }
        }
    }

    Ok(())
}

fn pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1))).max(1)
}
