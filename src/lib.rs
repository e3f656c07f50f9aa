// THEORY:
// This file is the main entry point for the `prevalent_colors` library crate. The
// binary in `main.rs` is a thin shell around it: parse flags, open files, call
// `ColorPipeline::run`.
//
// The public surface is the `pipeline` module (`ColorPipeline`, `PipelineConfig`,
// `RunSummary`). The building blocks live in `core_modules` and stay public so each
// stage can be reused and tested on its own: the color tally, the fetch-decode
// adapter, the input reader, the sink and the completion tracker. The worker pool
// that ties them together is in `parallel_pipeline`.

pub mod args;
pub mod core_modules;
pub mod error;
pub mod logging;
pub mod parallel_pipeline;
pub mod pipeline;
