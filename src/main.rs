use anyhow::{bail, Context, Result};
use bgremove_client::{
    ClientConfig, DiskStore, HttpTransport, Model, OptionState, Session, SourceFile,
    SubmissionState,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image or video file to process
    input: PathBuf,

    /// Where to write the result (default: <input stem>_no_bg.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base URL of the background-removal service
    /// Empty means relative paths, for use behind a reverse proxy
    #[arg(long, env = "BGREMOVE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Request timeout in seconds (default: none)
    #[arg(long, env = "BGREMOVE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Directory for materialized results and previews
    #[arg(long, env = "BGREMOVE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Override the MIME type guessed from the file extension
    #[arg(long)]
    mime: Option<String>,

    /// Segmentation model
    #[arg(short, long, value_enum, default_value_t = Model::U2net)]
    model: Model,

    /// Enable alpha matting (images only)
    #[arg(long)]
    alpha_matting: bool,

    /// Alpha matting foreground threshold (0-255)
    #[arg(long, default_value_t = 240, allow_negative_numbers = true)]
    foreground_threshold: i32,

    /// Alpha matting background threshold (0-255)
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    background_threshold: i32,

    /// Alpha matting erode structure size (>= 1)
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    erode_structure_size: i32,

    /// Alpha matting base size (>= 100)
    #[arg(long, default_value_t = 1000, allow_negative_numbers = true)]
    base_size: i32,

    /// TV mode (videos only)
    #[arg(long)]
    tv: bool,

    /// Masks only (videos only)
    #[arg(long)]
    mk: bool,

    /// Transparent output video (videos only)
    #[arg(long)]
    tov: bool,

    /// Transparent output images (videos only)
    #[arg(long)]
    toi: bool,

    /// Green background (videos only)
    #[arg(long)]
    gb: bool,

    /// White background (videos only)
    #[arg(long)]
    wn: bool,

    /// Frame rate (videos only)
    #[arg(long)]
    frame_rate: Option<f64>,

    /// Frame limit (videos only)
    #[arg(long)]
    frame_limit: Option<f64>,

    /// Replacement background color, e.g. #FF0000
    #[arg(long)]
    background_color: Option<String>,

    /// Replacement background image
    #[arg(long)]
    background_image: Option<PathBuf>,

    /// Materialize a preview of the input and log its URI
    #[arg(long)]
    preview: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.api_url.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
            work_dir: self.work_dir.clone().unwrap_or(defaults.work_dir),
        }
    }

    fn options(&self) -> Result<OptionState> {
        let mut options = OptionState {
            model: self.model,
            ..OptionState::default()
        };

        options.image.alpha_matting = self.alpha_matting;
        options.image.foreground_threshold = self.foreground_threshold;
        options.image.background_threshold = self.background_threshold;
        options.image.erode_structure_size = self.erode_structure_size;
        options.image.base_size = self.base_size;

        options.video.tv = self.tv;
        options.video.mk = self.mk;
        options.video.tov = self.tov;
        options.video.toi = self.toi;
        options.video.gb = self.gb;
        options.video.wn = self.wn;
        options.video.frame_rate = self.frame_rate;
        options.video.frame_limit = self.frame_limit;

        options.background.color = self.background_color.clone();
        if let Some(path) = &self.background_image {
            let file = SourceFile::from_path(path, None)
                .context("Failed to load background image")?;
            options.background.set_image(file)?;
        }

        Ok(options)
    }
}

fn default_output(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    input.with_file_name(format!("{stem}_no_bg.{extension}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = args.config();
    tracing::info!("bgremove starting");
    tracing::info!("Service: {}", config.endpoint(""));
    tracing::info!("Model: {}", args.model);

    let store = DiskStore::new(&config.work_dir).context("Failed to initialize result store")?;
    let transport = HttpTransport::new(&config).context("Failed to initialize HTTP client")?;

    let mut session = Session::with_options(Box::new(store), args.options()?);

    let input = SourceFile::from_path(&args.input, args.mime.as_deref())?;
    session.select_file(Some(input))?;

    if args.preview {
        if let Some(preview) = session.preview()? {
            tracing::info!("Preview of original: {}", preview.uri());
        }
    }

    if let Some(kind) = session.kind() {
        tracing::info!("Processing your {}... This may take a few moments.", kind);
    }

    let started = Instant::now();
    let state = session.process(&transport).await.clone();
    let elapsed = started.elapsed();

    match state {
        SubmissionState::Succeeded(kind) => {
            let result = session.result().context("Succeeded without a result")?;
            let output = args
                .output
                .clone()
                .unwrap_or_else(|| default_output(&args.input, result.extension()));

            match result.dimensions() {
                Some((width, height)) => tracing::info!(
                    "Background removed from {} in {:.1}s: {}x{}, {} bytes",
                    kind,
                    elapsed.as_secs_f64(),
                    width,
                    height,
                    result.size()
                ),
                None => tracing::info!(
                    "Background removed from {} in {:.1}s: {} bytes",
                    kind,
                    elapsed.as_secs_f64(),
                    result.size()
                ),
            }

            session.save_result(&output)?;
            println!("{}", output.display());
            Ok(())
        }
        SubmissionState::Failed(message) => {
            tracing::error!("Error: {}", message);
            bail!(message)
        }
        other => bail!("Processing ended in unexpected state {other:?}"),
    }
}
