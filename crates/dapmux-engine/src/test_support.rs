use std::sync::Arc;

use dapmux_config::SessionConfig;
use dapmux_dap::{ClientOptions, DapClient, Transport};
use tokio::io::DuplexStream;

use crate::language::{AdapterProfile, Language};
use crate::session::Session;

/// A session whose adapter end is returned unread.
pub(crate) fn detached_session(id: &str, language: Language) -> (Arc<Session>, DuplexStream) {
    let (client_io, adapter_io) = tokio::io::duplex(64 * 1024);
    let (r, w) = tokio::io::split(client_io);
    let client = DapClient::start(Transport::from_streams(r, w), ClientOptions::default(), id);
    let session = Session::new(
        id,
        AdapterProfile::new(language),
        SessionConfig::default(),
        client,
        None,
    );
    (session, adapter_io)
}
