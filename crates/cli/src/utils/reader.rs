use nfcauth_apdu_transport_pcsc::{PcscConfig, PcscDeviceManager, PcscTransport};

/// Open the named reader, or the first one available
pub(crate) fn open_transport(reader: Option<String>) -> eyre::Result<PcscTransport> {
    let manager = PcscDeviceManager::new()?;
    let transport = manager.connect_strategy(reader.into(), PcscConfig::default())?;
    Ok(transport)
}

/// List all available readers
pub(crate) fn list_readers() -> eyre::Result<()> {
    let manager = PcscDeviceManager::new()?;
    let readers = manager.list_readers()?;

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = if reader.has_card() {
            "token present"
        } else {
            "no token"
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}
