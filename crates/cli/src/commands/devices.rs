//! Commands on the credential store

use eyre::WrapErr;
use nfcauth_reader::{CredentialStore, JsonFileStore, ReaderConfig};

fn open_store(config: &ReaderConfig) -> eyre::Result<JsonFileStore> {
    let path = &config.session.store_path;
    JsonFileStore::open(path).wrap_err_with(|| format!("Failed to open store {}", path.display()))
}

/// Print every registered device
pub(crate) fn list_command(config: &ReaderConfig) -> eyre::Result<()> {
    let records = open_store(config)?.list()?;

    if records.is_empty() {
        println!("No devices registered");
        return Ok(());
    }

    println!("Registered devices:");
    for (i, record) in records.iter().enumerate() {
        println!(
            "{}. {} ({}) registered at {}",
            i + 1,
            record.user_name,
            record.user_id,
            record.registered_at
        );
    }

    Ok(())
}

/// Remove the device registered for `user_id`
pub(crate) fn remove_command(config: &ReaderConfig, user_id: &str) -> eyre::Result<()> {
    if open_store(config)?.delete(user_id)? {
        println!("Removed {user_id}");
        Ok(())
    } else {
        eyre::bail!("No device registered for {user_id}")
    }
}
