use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_int;

use crate::broker::Broker;
use crate::cert::CertificateBuffer;
use crate::directory::Directory;
use crate::ffi;
use crate::types::{ClientHandle, Protocol, StatusCode};

/// A connected client as seen from inside one event call.
///
/// Text views borrow broker memory and must not outlive the call; copy them to keep them.
#[derive(Clone, Copy)]
pub struct Client<'a> {
    handle: ClientHandle<'a>,
    broker: &'a dyn Broker,
}

impl<'a> Client<'a> {
    #[inline]
    pub fn new(handle: ClientHandle<'a>, broker: &'a dyn Broker) -> Self {
        Self { handle, broker }
    }

    #[inline]
    pub fn handle(&self) -> ClientHandle<'a> {
        self.handle
    }

    #[inline]
    pub fn address(&self) -> Option<&'a str> {
        as_str(self.broker.client_address(self.handle))
    }

    #[inline]
    pub fn id(&self) -> Option<&'a str> {
        as_str(self.broker.client_id(self.handle))
    }

    #[inline]
    pub fn username(&self) -> Option<&'a str> {
        as_str(self.broker.client_username(self.handle))
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.protocol_raw())
    }

    #[inline]
    pub fn protocol_raw(&self) -> c_int {
        self.broker.client_protocol(self.handle)
    }

    /// MQTT protocol level: 3, 4 or 5.
    #[inline]
    pub fn protocol_version(&self) -> c_int {
        self.broker.client_protocol_version(self.handle)
    }

    /// PEM text of the client certificate in a fresh buffer, `None` when the client presented no
    /// certificate or it could not be encoded.
    pub fn certificate(&self) -> Option<CertificateBuffer> {
        let der = self.broker.client_certificate(self.handle)?;
        let pem = CertificateBuffer::from_der(&der);
        if pem.is_none() {
            log::debug!("{:?} certificate could not be PEM encoded", self.id());
        }
        pem
    }

    /// Replaces the client's username; `None` clears it.
    pub fn set_username(&self, username: Option<&str>) -> StatusCode {
        match username.map(CString::new).transpose() {
            Ok(username) => self.broker.set_username(self.handle, username.as_deref()),
            Err(_) => ffi::MOSQ_ERR_INVAL,
        }
    }

    /// Session operations that are not tied to this client.
    #[inline]
    pub fn directory(&self) -> Directory<'a> {
        Directory::new(self.broker)
    }
}

impl fmt::Debug for Client<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id())
            .field("username", &self.username())
            .field("address", &self.address())
            .finish()
    }
}

#[inline]
fn as_str(s: Option<&CStr>) -> Option<&str> {
    s.and_then(|s| s.to_str().ok())
}
