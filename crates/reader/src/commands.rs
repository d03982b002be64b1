//! Commands understood by the authenticator application

use nfcauth_apdu_core::prelude::*;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Largest JSON body carried by a request
pub const MAX_REQUEST_LEN: usize = 250;

/// SELECT by application identifier
pub const SELECT: [u8; 4] = [0x00, 0xA4, 0x04, 0x00];
/// Registration request
pub const REGISTRATION_REQUEST: [u8; 4] = [0xD0, 0x01, 0x00, 0x00];
/// Registration complete acknowledgment
pub const REGISTRATION_COMPLETE: [u8; 4] = [0xD0, 0x01, 0x00, 0x01];
/// Authentication request
pub const AUTHENTICATION_REQUEST: [u8; 4] = [0xD0, 0x02, 0x00, 0x00];
/// Tell the token its holder is not registered here
pub const USER_NOT_REGISTERED: [u8; 4] = [0xD0, 0x03, 0x00, 0x00];

const fn header(bytes: [u8; 4]) -> Command {
    Command::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

fn with_body(header_bytes: [u8; 4], body: Bytes) -> Result<Command> {
    if body.len() > MAX_REQUEST_LEN {
        return Err(Error::RequestTooLarge {
            len: body.len(),
            max: MAX_REQUEST_LEN,
        });
    }
    Ok(header(header_bytes).with_data(body)?)
}

/// SELECT the application `aid`
pub fn select(aid: &[u8]) -> Result<Command> {
    Ok(header(SELECT).with_data(Bytes::copy_from_slice(aid))?)
}

/// Registration request carrying `body`
pub fn registration_request(body: Bytes) -> Result<Command> {
    with_body(REGISTRATION_REQUEST, body)
}

/// Registration complete
pub const fn registration_complete() -> Command {
    header(REGISTRATION_COMPLETE)
}

/// Authentication request carrying `body`
pub fn authentication_request(body: Bytes) -> Result<Command> {
    with_body(AUTHENTICATION_REQUEST, body)
}

/// User not registered notification
pub const fn user_not_registered() -> Command {
    header(USER_NOT_REGISTERED)
}

/// SELECT `aid`, failing unless the token answers `90 00`
pub(crate) fn select_application(transport: &mut dyn CardTransport, aid: &[u8]) -> Result<()> {
    let response = transport.transmit(&select(aid)?)?;
    match response.status() {
        ResponseStatus::Success => {
            debug!(aid = %hex::encode(aid), "Application selected");
            Ok(())
        }
        _ => {
            let status = Bytes::from(response);
            warn!(status = %hex::encode(&status), "Application select failed");
            Err(Error::ApplicationSelectFailed { status })
        }
    }
}
