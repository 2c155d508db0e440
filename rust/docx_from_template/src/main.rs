use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use docx_from_template::options::Margins;
use docx_from_template::{render_docx, HttpFetcher, OfflineFetcher, RenderOptions, Strategy, TemplateInput};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Header HTML fragment (printed on the first page only).
    #[arg(long)]
    header: Option<PathBuf>,

    /// Body HTML fragment.
    #[arg(long)]
    body: PathBuf,

    /// Footer HTML fragment.
    #[arg(long)]
    footer: Option<PathBuf>,

    /// Output .docx path.
    #[arg(long)]
    out: PathBuf,

    /// JSON render options; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Walker strategy: `tree` or `scan`.
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Body font size in points.
    #[arg(long)]
    font_size: Option<f32>,

    /// Page margins in millimetres.
    #[arg(long)]
    margin_top: Option<f64>,
    #[arg(long)]
    margin_right: Option<f64>,
    #[arg(long)]
    margin_bottom: Option<f64>,
    #[arg(long)]
    margin_left: Option<f64>,

    /// Image fetch timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Never fetch remote images; only data: URIs are embedded.
    #[arg(long)]
    offline: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn read_fragment(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => fs::read_to_string(p).with_context(|| format!("read {}", p.display())),
        None => Ok(String::new()),
    }
}

fn options_from(args: &Args) -> Result<RenderOptions> {
    let mut options = match &args.config {
        Some(path) => RenderOptions::from_json_file(path)?,
        None => RenderOptions::default(),
    };
    if let Some(s) = args.strategy {
        options.strategy = s;
    }
    if let Some(pt) = args.font_size {
        options.font_size_pt = pt;
    }
    if let Some(t) = args.timeout {
        options.fetch_timeout_secs = t;
    }
    let m: &mut Margins = &mut options.geometry.margins_mm;
    m.top = args.margin_top.unwrap_or(m.top);
    m.right = args.margin_right.unwrap_or(m.right);
    m.bottom = args.margin_bottom.unwrap_or(m.bottom);
    m.left = args.margin_left.unwrap_or(m.left);
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let input = TemplateInput {
        header: read_fragment(args.header.as_deref())?,
        body: read_fragment(Some(&args.body))?,
        footer: read_fragment(args.footer.as_deref())?,
    };
    let options = options_from(&args)?;

    let bytes = if args.offline {
        render_docx(&input, &options, &OfflineFetcher).await?
    } else {
        let fetcher = HttpFetcher::new(options.fetch_timeout())?;
        render_docx(&input, &options, &fetcher).await?
    };

    fs::write(&args.out, &bytes).with_context(|| format!("write {}", args.out.display()))?;
    info!("wrote {} ({} bytes)", args.out.display(), bytes.len());
    Ok(())
}
