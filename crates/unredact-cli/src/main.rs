//! unredact CLI: detect redactions, calibrate fonts and rank candidates.

mod fonts;
mod io;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use unredact::collab::DEFAULT_SIZES_PT;
use unredact::{
    AnalysisInput, AnalysisReport, Analyzer, CalibrationProfile, CandidateSource, Collaborators,
    EngineConfig, GlyphRenderer, MatchRating, OcrEngine, PageRaster, Rasterizer,
};

use crate::fonts::TtfFontSet;
use crate::io::{FileRoster, PageImageRasterizer, WordListOcr};

#[derive(Parser)]
#[command(name = "unredact")]
#[command(about = "Match candidate names against redaction boxes by width and halo artifacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find redaction boxes on a page image.
    Detect(DetectArgs),

    /// Recover the page's font rendering profile from visible words.
    Calibrate(CalibrateArgs),

    /// Detect, calibrate, match and rank candidates for every box.
    Analyze(AnalyzeArgs),

    /// Print the default engine configuration as JSON.
    Config,
}

#[derive(Debug, Clone, Args)]
struct PageArgs {
    /// Page image (PNG or JPEG).
    #[arg(long)]
    page: PathBuf,

    /// Resolution of the page image in pixels per inch.
    #[arg(long, default_value = "300")]
    ppi: f32,

    /// Engine configuration (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    #[command(flatten)]
    page: PageArgs,

    /// Path to write detected boxes (JSON).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct FontArgs {
    /// OCR word list (JSON) with the visible words of the page.
    #[arg(long)]
    words: PathBuf,

    /// Directory of .ttf/.otf fonts; each file is one family.
    #[arg(long)]
    fonts: PathBuf,

    /// Point sizes to try, comma separated.
    #[arg(long, value_delimiter = ',')]
    sizes: Vec<f32>,
}

impl FontArgs {
    fn sizes(&self) -> &[f32] {
        if self.sizes.is_empty() {
            DEFAULT_SIZES_PT.as_slice()
        } else {
            self.sizes.as_slice()
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    #[command(flatten)]
    page: PageArgs,

    #[command(flatten)]
    fonts: FontArgs,

    /// Path to write the calibration profile (JSON).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    page: PageArgs,

    #[command(flatten)]
    fonts: FontArgs,

    /// Candidate roster (JSON, or CSV with name,confidence,notes columns).
    #[arg(long)]
    candidates: PathBuf,

    /// High-resolution image of the same page, for halo scoring.
    #[arg(long)]
    hires: Option<PathBuf>,

    /// Resolution of the high-resolution image.
    #[arg(long, default_value = "600")]
    hires_ppi: f32,

    /// Saved calibration profile; skips calibration.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Absolute width tolerance floor in pixels.
    #[arg(long)]
    tolerance_floor: Option<f64>,

    /// Width tolerance as a fraction of the predicted width.
    #[arg(long)]
    tolerance_frac: Option<f64>,

    /// Weight of the artifact score in the combined ranking score.
    #[arg(long)]
    artifact_weight: Option<f64>,

    /// Matches to print per box.
    #[arg(long, default_value = "5")]
    top: usize,

    /// Directory to write enhanced halo strips (PNG) of matched boxes.
    #[arg(long)]
    halo_dir: Option<PathBuf>,

    /// Path to write the analysis report (JSON).
    #[arg(long)]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Config => run_config(),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_json_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_page(path: &Path, ppi: f32) -> Result<PageRaster> {
    PageImageRasterizer { native_ppi: ppi }
        .render(path, ppi, 0)
        .with_context(|| format!("failed to load page {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, &json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("Results written to {}", path.display());
    Ok(())
}

// ── config ─────────────────────────────────────────────────────────────

fn run_config() -> Result<()> {
    println!("{}", EngineConfig::default().to_json_pretty()?);
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &DetectArgs) -> Result<()> {
    let config = load_config(args.page.config.as_deref())?;
    let page = load_page(&args.page.page, args.page.ppi)?;
    let analyzer = Analyzer::new(config);

    let boxes = analyzer.detect(&page);
    for (i, b) in boxes.iter().enumerate() {
        println!(
            "  #{:<3} x={:<5} y={:<5} {}x{} px",
            i, b.x, b.y, b.width, b.height
        );
    }
    if let Some(out) = &args.out {
        write_json(out, &boxes)?;
    }
    Ok(())
}

// ── calibrate ──────────────────────────────────────────────────────────

fn run_calibrate(args: &CalibrateArgs) -> Result<()> {
    let config = load_config(args.page.config.as_deref())?;
    let page = load_page(&args.page.page, args.page.ppi)?;
    let fonts = TtfFontSet::load_dir(&args.fonts.fonts)?;
    let library = fonts.library(args.fonts.sizes());
    let words = WordListOcr::load(&args.fonts.words)?.detect_words(&page)?;

    let report = unredact::calibrate_detailed(&page, &words, &library, &fonts, &config.calibration)
        .context("calibration failed")?;
    let profile = &report.profile;

    println!("Calibration profile");
    println!("  font:          {}", profile.font.label());
    println!("  kerning:       {:?}", profile.kerning_mode);
    println!("  scale:         {:.4} px/unit", profile.scale_factor);
    println!("  tracking:      {:+.2} px", profile.tracking_offset_px);
    println!(
        "  consistency:   CV {:.4} over {} words (confidence {:.3})",
        profile.coefficient_of_variation, profile.sample_count, profile.confidence
    );
    println!("  tuples tried:  {}", report.tuples_evaluated);

    println!("Reference fit");
    for fit in profile.validate(&words, &fonts) {
        println!(
            "  {:<20} observed {:>7.1}  predicted {:>7.1}  error {:+.2}%",
            fit.text, fit.observed_width_px, fit.predicted_width_px, fit.error_pct
        );
    }

    if let Some(out) = &args.out {
        profile
            .save_json(out)
            .with_context(|| format!("failed to save profile {}", out.display()))?;
        tracing::info!("Profile written to {}", out.display());
    }
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let mut config = load_config(args.page.config.as_deref())?;
    if let Some(v) = args.tolerance_floor {
        config.width.tolerance_floor_px = v;
    }
    if let Some(v) = args.tolerance_frac {
        config.width.tolerance_fraction = v;
    }
    if let Some(v) = args.artifact_weight {
        config.rank.artifact_weight = v;
    }
    let analyzer = Analyzer::new(config);

    let page = load_page(&args.page.page, args.page.ppi)?;
    let high_res = args
        .hires
        .as_deref()
        .map(|p| load_page(p, args.hires_ppi))
        .transpose()?;
    let fonts = TtfFontSet::load_dir(&args.fonts.fonts)?;
    let library = fonts.library(args.fonts.sizes());
    let words = WordListOcr::load(&args.fonts.words)?.detect_words(&page)?;
    let candidates = FileRoster {
        path: args.candidates.clone(),
    }
    .candidates()?;
    if candidates.is_empty() {
        bail!("candidate roster {} is empty", args.candidates.display());
    }
    let saved = args
        .profile
        .as_deref()
        .map(|p| {
            CalibrationProfile::load_json(p)
                .with_context(|| format!("failed to load profile {}", p.display()))
        })
        .transpose()?;

    let input = AnalysisInput {
        page: &page,
        high_res: high_res.as_ref(),
        references: &words,
        fonts: &library,
        candidates: &candidates,
        profile: saved.as_ref(),
    };
    let collab = Collaborators {
        metrics: &fonts,
        renderer: Some(&fonts as &dyn GlyphRenderer),
    };
    let report = analyzer
        .analyze(&input, &collab)
        .context("analysis failed")?;

    print_report(&report, args.top);
    write_json(&args.out, &report)?;

    if let (Some(dir), Some(hr)) = (&args.halo_dir, high_res.as_ref()) {
        dump_halos(&analyzer, &report, hr, dir)?;
    }
    Ok(())
}

fn print_report(report: &AnalysisReport, top: usize) {
    if let Some(p) = &report.profile {
        println!(
            "Profile: {} {:?} scale {:.4} tracking {:+.2} px",
            p.font.label(),
            p.kerning_mode,
            p.scale_factor,
            p.tracking_offset_px
        );
    }
    println!("Status: {:?}", report.status);
    for (i, b) in report.boxes.iter().enumerate() {
        println!(
            "Box #{} at ({}, {}) {}x{} px",
            i, b.x, b.y, b.width, b.height
        );
        let mut any = false;
        for m in report.matches_for_box(i).take(top) {
            any = true;
            let rating = MatchRating::from_error_pct(m.width_error_pct);
            println!(
                "  {:<3} {:<28} {:>7.1} px  {:+6.1} px  {:5.2}%  art {:.2}  score {:+.2}",
                rating.stars(),
                m.candidate_text,
                m.predicted_width_px,
                m.width_diff_px,
                m.width_error_pct,
                m.artifact_score,
                m.combined_score
            );
        }
        if !any {
            println!("  (no candidate within tolerance)");
        }
    }
    let s = &report.summary;
    println!(
        "{} boxes, {} with matches, {} matches, {} failures",
        s.boxes, s.boxes_with_matches, s.matches, s.failures
    );
    println!(
        "  {} excellent, {} strong, {} fair, {} weak",
        s.excellent, s.strong, s.fair, s.weak
    );
}

fn dump_halos(
    analyzer: &Analyzer,
    report: &AnalysisReport,
    high_res: &PageRaster,
    dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = 0;
    for (i, b) in report.boxes.iter().enumerate() {
        if report.matches_for_box(i).next().is_none() {
            continue;
        }
        let hb = b.rescale(report.working_ppi, high_res.ppi());
        let (_, strips) = analyzer.inspect_halo(high_res, &hb);
        for strip in &strips {
            for (lens, img) in strip.lenses() {
                let path = dir.join(format!("box{i:02}_{}_{lens}.png", strip.side.name()));
                img.save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                written += 1;
            }
        }
    }
    tracing::info!("Wrote {} halo images to {}", written, dir.display());
    Ok(())
}
