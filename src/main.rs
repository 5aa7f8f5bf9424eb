use crate::cli::run;

pub mod cli;
mod config;
pub mod detector;
pub mod domain;
pub mod http;
pub mod poller;
pub mod relay;
pub mod source;
pub mod storage;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run()
}
