use clap::Parser;
use imlabel::Opts;
use imlabel::cli::SubCommandExtend;
use imlabel::config::SubCommand;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Label(config) => config.run(&opts).await,
        SubCommand::Recognize(config) => config.run(&opts).await,
        SubCommand::List(config) => config.run(&opts).await,
        SubCommand::Delete(config) => config.run(&opts).await,
        SubCommand::Compare(config) => config.run(&opts).await,
        SubCommand::Replay(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
