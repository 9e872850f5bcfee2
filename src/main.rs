use chatpress::cli::{self, Command};
use chatpress::config::init_logger;
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Command::new();
    if cmd.version() {
        cmd.print_version();
        return Ok(());
    }

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let config = cmd.get_config()?;
    init_logger(&config.log)?;
    log::debug!("starting {}", chatpress::config::version());

    cli::run(cmd.action(), config).await
}
