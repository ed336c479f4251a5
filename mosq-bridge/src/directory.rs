use std::ffi::CString;
use std::fmt;

use crate::broker::Broker;
use crate::ffi;
use crate::types::StatusCode;

/// Out-of-band session operations, forwarded to the broker.
#[derive(Clone, Copy)]
pub struct Directory<'a> {
    broker: &'a dyn Broker,
}

impl<'a> Directory<'a> {
    #[inline]
    pub fn new(broker: &'a dyn Broker) -> Self {
        Self { broker }
    }

    /// Disconnects the client with this client id, optionally publishing its will.
    pub fn kick_by_client_id(&self, client_id: &str, with_will: bool) -> StatusCode {
        match CString::new(client_id) {
            Ok(client_id) => self.broker.kick_client_by_clientid(&client_id, with_will),
            Err(_) => ffi::MOSQ_ERR_INVAL,
        }
    }

    /// Disconnects every client logged in with this username, optionally publishing their wills.
    pub fn kick_by_username(&self, username: &str, with_will: bool) -> StatusCode {
        match CString::new(username) {
            Ok(username) => self.broker.kick_client_by_username(&username, with_will),
            Err(_) => ffi::MOSQ_ERR_INVAL,
        }
    }

    /// Whether `topic` matches the subscription filter `sub`.
    ///
    /// A matcher failure (invalid filter or topic) reads as no match; use
    /// [`Directory::try_topic_matches`] to tell the two apart.
    #[inline]
    pub fn topic_matches(&self, sub: &str, topic: &str) -> bool {
        self.try_topic_matches(sub, topic).unwrap_or(false)
    }

    pub fn try_topic_matches(&self, sub: &str, topic: &str) -> Result<bool, StatusCode> {
        let sub = CString::new(sub).map_err(|_| ffi::MOSQ_ERR_INVAL)?;
        let topic = CString::new(topic).map_err(|_| ffi::MOSQ_ERR_INVAL)?;
        self.broker.topic_matches_sub(&sub, &topic)
    }
}

impl fmt::Debug for Directory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Directory")
    }
}
