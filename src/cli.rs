use crate::config::load_config;
use crate::design::{CircuitDesign, extract_design_json};
#[cfg(feature = "png")]
use crate::render::write_output_png;
use crate::render::{render_svg, write_output_json, write_output_svg};
use crate::transform;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cgraph",
    version,
    about = "Lay out a circuit block design as a signal-colored block diagram"
)]
pub struct Args {
    /// Input design file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON and SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layout, render)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Fit the PNG inside this width (pixels)
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Fit the PNG inside this height (pixels)
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Input is a free-text response; pull the design object out of it
    #[arg(long = "extract")]
    pub extract: bool,

    /// Fail when the design produced any structural warning
    #[arg(long = "strict")]
    pub strict: bool,

    /// Log pipeline stages at debug level
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }

    let input = read_input(args.input.as_deref())?;
    let raw = if args.extract {
        extract_design_json(&input)?
    } else {
        input.as_str()
    };
    let design = CircuitDesign::from_json(raw)?;
    let payload = transform(&design, &config.layout).into_payload(design.info.clone());

    for warning in &payload.warnings {
        eprintln!("warning: {warning}");
    }
    if args.strict && !payload.warnings.is_empty() {
        return Err(anyhow::anyhow!(
            "{} structural warning(s) in strict mode",
            payload.warnings.len()
        ));
    }

    match args.output_format {
        OutputFormat::Json => write_output_json(&payload, args.output.as_deref())?,
        OutputFormat::Svg => {
            let svg = render_svg(&payload, &config.theme, &config.layout, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&payload, &config.theme, &config.layout, &config.render);
            write_png(&svg, &output, &config.render)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, render: &crate::config::RenderConfig) -> Result<()> {
    write_output_png(svg, output, render)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _render: &crate::config::RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the 'png' feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::parse_from([
            "cgraph", "-i", "design.json", "-e", "svg", "--extract", "--strict", "-v",
        ]);
        assert_eq!(args.input.as_deref(), Some(Path::new("design.json")));
        assert_eq!(args.output_format, OutputFormat::Svg);
        assert!(args.extract && args.strict && args.verbose);
        assert!(args.width.is_none());
    }

    #[test]
    fn json_is_default_format() {
        let args = Args::parse_from(["cgraph"]);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(!args.strict);
    }

    #[test]
    fn png_needs_output_path() {
        assert!(ensure_output(&None, "png").is_err());
        let path = PathBuf::from("out.png");
        assert_eq!(ensure_output(&Some(path.clone()), "png").unwrap(), path);
    }
}
