//! Commands that wait for a token in the field

use eyre::WrapErr;
use nfcauth_reader::{
    AuthOutcome, JsonFileStore, Mode, ReaderConfig, Session, SessionOutcome, stop_pair,
};
use tracing::info;

use crate::utils;

/// Register the next token presented
pub(crate) async fn register_command(config: ReaderConfig, reader: Option<String>) -> eyre::Result<()> {
    match run_session(config, reader, Mode::Register).await? {
        SessionOutcome::Registered(record) => {
            println!("Registered {} ({})", record.user_name, record.user_id);
        }
        SessionOutcome::Stopped => println!("Stopped before a token was registered"),
        SessionOutcome::Authentication(_) => {}
    }
    Ok(())
}

/// Authenticate the next token presented
pub(crate) async fn auth_command(config: ReaderConfig, reader: Option<String>) -> eyre::Result<()> {
    match run_session(config, reader, Mode::Authenticate).await? {
        SessionOutcome::Authentication(AuthOutcome::Verified { user_id, user_name }) => {
            println!("Authenticated {user_name} ({user_id})");
        }
        SessionOutcome::Authentication(AuthOutcome::Rejected(reason)) => {
            eyre::bail!("Authentication rejected: {reason}");
        }
        SessionOutcome::Stopped => println!("Stopped before a token was authenticated"),
        SessionOutcome::Registered(_) => {}
    }
    Ok(())
}

/// Run the blocking session loop off the runtime, stopping it on Ctrl-C
async fn run_session(
    config: ReaderConfig,
    reader: Option<String>,
    mode: Mode,
) -> eyre::Result<SessionOutcome> {
    let store = JsonFileStore::open(&config.session.store_path).wrap_err_with(|| {
        format!("Failed to open store {}", config.session.store_path.display())
    })?;
    let transport = utils::reader::open_transport(reader)?;
    info!(reader = %transport.reader_name(), "Using reader");

    let (handle, stop) = stop_pair();
    let mut session = Session::new(config, transport, store, stop);
    let mut task = tokio::task::spawn_blocking(move || session.run(mode));

    let outcome = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping the session");
            handle.stop();
            task.await
        }
    };

    let outcome = outcome.wrap_err("Session task failed")??;
    Ok(outcome)
}
