//! The external callback surface.
//!
//! A script layer (an embedded interpreter, or plain Rust as in the static-auth plugin) implements
//! [`Script`]. The bridge calls it with a fixed, flattened argument list per event and hands its
//! integer result back to the broker untouched.

use std::os::raw::c_int;

use crate::client::Client;
use crate::directory::Directory;
use crate::ffi;
use crate::options::PluginOptions;
use crate::types::StatusCode;
use crate::Result;

pub trait Script: Send + Sync + 'static {
    /// Per plugin instance state. The bridge only stores it and passes it back.
    type Instance: Send + Sync + 'static;

    /// Starts the embedded execution context. Called at most once per process, however many
    /// plugin instances the broker loads.
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Builds the state for one plugin instance. An error is fatal for the broker process.
    fn plugin_init(&self, directory: Directory<'static>, options: &PluginOptions) -> Result<Self::Instance>;

    /// Finalizes an instance. Every event callback has been unregistered before this is called.
    fn plugin_cleanup(&self, instance: Self::Instance, options: &PluginOptions) -> StatusCode {
        let _ = (instance, options);
        ffi::MOSQ_ERR_SUCCESS
    }

    fn basic_auth(
        &self,
        instance: &Self::Instance,
        client: &Client<'_>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> StatusCode {
        let _ = (instance, client, username, password);
        ffi::MOSQ_ERR_PLUGIN_DEFER
    }

    /// `access` is one of the `MOSQ_ACL_*` codes, see [`crate::types::Access`]. `payload` is
    /// `None` when the broker supplies no payload pointer.
    fn acl_check(
        &self,
        instance: &Self::Instance,
        client: &Client<'_>,
        topic: &str,
        access: c_int,
        payload: Option<&[u8]>,
    ) -> StatusCode {
        let _ = (instance, client, topic, access, payload);
        ffi::MOSQ_ERR_PLUGIN_DEFER
    }

    /// Looks up a TLS pre-shared key and writes it, as hex text, into `key`.
    ///
    /// Note: the bridge fills `identity` from the event's hint and `hint` from the event's
    /// identity. Implementations relying on the two must account for this.
    fn psk_key(
        &self,
        instance: &Self::Instance,
        client: &Client<'_>,
        identity: Option<&str>,
        hint: Option<&str>,
        key: &mut PskKey<'_>,
    ) -> StatusCode {
        let _ = (instance, client, identity, hint, key);
        ffi::MOSQ_ERR_PLUGIN_DEFER
    }

    fn disconnect(&self, instance: &Self::Instance, client: &Client<'_>, reason: c_int) -> StatusCode {
        let _ = (instance, client, reason);
        ffi::MOSQ_ERR_SUCCESS
    }
}

/// Caller-allocated output buffer for a pre-shared key, `capacity` bytes including the terminator.
pub struct PskKey<'a> {
    buf: &'a mut [u8],
}

impl<'a> PskKey<'a> {
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Writes `key` followed by a NUL. `MOSQ_ERR_INVAL` if it does not fit or contains a NUL.
    pub fn set(&mut self, key: &str) -> StatusCode {
        let bytes = key.as_bytes();
        if bytes.len() >= self.buf.len() || bytes.contains(&0) {
            return ffi::MOSQ_ERR_INVAL;
        }
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.buf[bytes.len()] = 0;
        ffi::MOSQ_ERR_SUCCESS
    }

    /// Raw access for callers that encode the key themselves.
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.buf
    }
}
