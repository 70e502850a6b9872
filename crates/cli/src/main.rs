use tally_cli::{actions, client::HttpRemote, config, error::Result, local_state::LocalState};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, action) = config::load()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "tally_cli={level},engine={level}",
            level = config.level
        ))
        .init();

    let remote = HttpRemote::new(&config.base_url)?;
    let mut local = LocalState::load(&config.state_path)?;
    let outcome = actions::execute(action, &mut local, &remote).await;
    // A failed action leaves the replica as it was, so saving is always safe.
    local.save(&config.state_path)?;

    println!("{}", outcome?);
    Ok(())
}
