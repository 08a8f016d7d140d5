use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use influxwrite::{
    config::{self, Config, DEFAULT_ENV_FILE},
    Point, Writer,
};
use log::{error, warn};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let file_vars = match config::load_env_file(DEFAULT_ENV_FILE) {
        Ok(vars) => vars,
        Err(e) => {
            warn!("error loading environment variables: {}", e);
            vec![]
        }
    };
    let (config, warnings) = Config::from_vars(file_vars.into_iter().chain(std::env::vars()));
    for e in warnings {
        warn!("{}, using the default", e);
    }
    if let Err(e) = config.validate() {
        warn!("incomplete connection settings: {}", e);
    }

    let writer = Writer::new(config)?;
    let result = write_sample(&writer);
    writer.close();
    result
}

fn write_sample(writer: &Writer) -> Result<()> {
    let point = Point::builder("GoTestData")
        .tag("unit", "temperature")
        .field("avg", 23.2)
        .field("max", 45.0)
        .timestamp(Utc::now())
        .build()?;
    writer
        .write_point(&point)
        .context("failed to write point")
}
