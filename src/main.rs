use anyhow::Context;
use clap::Parser;
use prevalent_colors::args::Args;
use prevalent_colors::core_modules::sink::open_output;
use prevalent_colors::error::PipelineError;
use prevalent_colors::logging::init_logging;
use prevalent_colors::pipeline::ColorPipeline;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose).context("failed to initialize logging")?;

    run(&args).await?;
    Ok(())
}

async fn run(args: &Args) -> Result<(), PipelineError> {
    // --- 1. Open both files; failures are fatal before any work begins ---
    let input = tokio::fs::File::open(&args.input)
        .await
        .map_err(|source| PipelineError::OpenInput {
            path: args.input.clone(),
            source,
        })?;
    let output = open_output(&args.outfile, args.output_mode()).await?;

    // --- 2. Run ---
    let pipeline = ColorPipeline::over_http(args.pipeline_config())?;
    let summary = pipeline.run(BufReader::new(input), output).await?;

    eprintln!(
        "{} rows written to {} ({} failed, {} total)",
        summary.written,
        args.outfile.display(),
        summary.failed,
        summary.submitted
    );
    Ok(())
}
