use crate::core_modules::fetcher::{DEFAULT_REQUEST_TIMEOUT_SECS, FormatPolicy};
use crate::core_modules::sink::{ErrorPolicy, OutputMode};
use crate::parallel_pipeline::DEFAULT_CONCURRENCY;
use crate::pipeline::PipelineConfig;
use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeArg {
    /// Replace any existing content
    Truncate,
    /// Keep existing content and add rows after it
    Append,
    /// Fail if the output file already exists
    CreateNew,
}

impl From<OutputModeArg> for OutputMode {
    fn from(arg: OutputModeArg) -> Self {
        match arg {
            OutputModeArg::Truncate => OutputMode::Truncate,
            OutputModeArg::Append => OutputMode::Append,
            OutputModeArg::CreateNew => OutputMode::CreateNew,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatDetectionArg {
    /// Detect the format from the image bytes, then the Content-Type header
    Sniff,
    /// Trust the Content-Type header only
    ContentType,
}

impl From<FormatDetectionArg> for FormatPolicy {
    fn from(arg: FormatDetectionArg) -> Self {
        match arg {
            FormatDetectionArg::Sniff => FormatPolicy::Sniff,
            FormatDetectionArg::ContentType => FormatPolicy::ContentType,
        }
    }
}

/// Find the three most prevalent colors of every image in a list of URLs.
#[derive(Parser, Debug)]
#[command(name = "prevalent_colors", author, version, about, long_about = None)]
pub struct Args {
    /// File with one image URL per line
    pub input: PathBuf,

    /// Number of images processed concurrently
    #[arg(
        long,
        alias = "parallelism",
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub concurrency: usize,

    /// Output CSV file
    #[arg(long, default_value = "output.csv")]
    pub outfile: PathBuf,

    /// What to do with an existing output file
    #[arg(long, value_enum, default_value_t = OutputModeArg::Truncate)]
    pub output_mode: OutputModeArg,

    /// How the image format of a download is determined
    #[arg(long, value_enum, default_value_t = FormatDetectionArg::Sniff)]
    pub format_detection: FormatDetectionArg,

    /// Abort the whole run on the first failed URL
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    /// Capacity of the work and result queues (defaults to the concurrency)
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            concurrency: self.concurrency,
            queue_capacity: self.queue_capacity.unwrap_or(self.concurrency),
            error_policy: if self.fail_fast {
                ErrorPolicy::Strict
            } else {
                ErrorPolicy::Lenient
            },
            format_policy: self.format_detection.into(),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode.into()
    }
}
