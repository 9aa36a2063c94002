mod color;
mod config;
mod data;
mod pipeline;
mod report;
mod stats;

use std::process::ExitCode;

use config::PipelineConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(config) = PipelineConfig::from_args(std::env::args()) else {
        eprintln!("usage: vehicle-sales <input.csv|.tsv|.json|.parquet>");
        return ExitCode::FAILURE;
    };

    match pipeline::run(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
