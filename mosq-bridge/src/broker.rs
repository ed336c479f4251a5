//! The broker side of the boundary.
//!
//! [`Broker`] lists every broker primitive the bridge consumes. [`NativeBroker`] resolves them
//! from the hosting mosquitto process at runtime, so the crate never links against the broker.

use std::ffi::CStr;
use std::os::raw::{c_int, c_void};
use std::ptr;

use anyhow::Context as _;
use libloading::Library;

use crate::ffi;
use crate::types::{ClientHandle, Event, PluginId, StatusCode};
use crate::Result;

pub trait Broker: Send + Sync {
    fn callback_register(
        &self,
        id: PluginId,
        event: Event,
        callback: ffi::MOSQ_FUNC_generic_callback,
        userdata: *mut c_void,
    ) -> StatusCode;

    fn callback_unregister(
        &self,
        id: PluginId,
        event: Event,
        callback: ffi::MOSQ_FUNC_generic_callback,
    ) -> StatusCode;

    /// `level` is one of the `MOSQ_LOG_*` constants.
    fn log(&self, level: c_int, message: &CStr);

    fn client_address<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr>;

    fn client_id<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr>;

    fn client_username<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr>;

    fn client_protocol(&self, client: ClientHandle<'_>) -> c_int;

    fn client_protocol_version(&self, client: ClientHandle<'_>) -> c_int;

    /// DER encoding of the client's certificate. The transient certificate object the broker hands
    /// out is released before this returns.
    fn client_certificate(&self, client: ClientHandle<'_>) -> Option<Vec<u8>>;

    fn set_username(&self, client: ClientHandle<'_>, username: Option<&CStr>) -> StatusCode;

    fn kick_client_by_clientid(&self, client_id: &CStr, with_will: bool) -> StatusCode;

    fn kick_client_by_username(&self, username: &CStr, with_will: bool) -> StatusCode;

    /// `Err` carries the matcher's status code.
    fn topic_matches_sub(&self, sub: &CStr, topic: &CStr) -> std::result::Result<bool, StatusCode>;
}

/// Broker primitives looked up in the hosting mosquitto process.
pub struct NativeBroker {
    callback_register: ffi::mosquitto_callback_register_fn,
    callback_unregister: ffi::mosquitto_callback_unregister_fn,
    log_printf: ffi::mosquitto_log_printf_fn,
    client_address: ffi::mosquitto_client_str_fn,
    client_id: ffi::mosquitto_client_str_fn,
    client_username: ffi::mosquitto_client_str_fn,
    client_protocol: ffi::mosquitto_client_int_fn,
    client_protocol_version: ffi::mosquitto_client_int_fn,
    client_certificate: ffi::mosquitto_client_certificate_fn,
    set_username: ffi::mosquitto_set_username_fn,
    kick_client_by_clientid: ffi::mosquitto_kick_client_fn,
    kick_client_by_username: ffi::mosquitto_kick_client_fn,
    topic_matches_sub: ffi::mosquitto_topic_matches_sub_fn,
    //libcrypto, optional
    i2d_x509: Option<ffi::i2d_X509_fn>,
    x509_free: Option<ffi::X509_free_fn>,
    //keeps the resolved function pointers valid
    _library: Library,
}

impl NativeBroker {
    pub fn load() -> Result<Self> {
        let library = host_library()?;
        unsafe {
            let i2d_x509 = library.get::<ffi::i2d_X509_fn>(b"i2d_X509\0").ok().map(|s| *s);
            let x509_free = library.get::<ffi::X509_free_fn>(b"X509_free\0").ok().map(|s| *s);
            if i2d_x509.is_none() || x509_free.is_none() {
                log::warn!("libcrypto symbols not found, client certificates will not be available");
            }
            Ok(NativeBroker {
                callback_register: symbol(&library, b"mosquitto_callback_register\0")?,
                callback_unregister: symbol(&library, b"mosquitto_callback_unregister\0")?,
                log_printf: symbol(&library, b"mosquitto_log_printf\0")?,
                client_address: symbol(&library, b"mosquitto_client_address\0")?,
                client_id: symbol(&library, b"mosquitto_client_id\0")?,
                client_username: symbol(&library, b"mosquitto_client_username\0")?,
                client_protocol: symbol(&library, b"mosquitto_client_protocol\0")?,
                client_protocol_version: symbol(&library, b"mosquitto_client_protocol_version\0")?,
                client_certificate: symbol(&library, b"mosquitto_client_certificate\0")?,
                set_username: symbol(&library, b"mosquitto_set_username\0")?,
                kick_client_by_clientid: symbol(&library, b"mosquitto_kick_client_by_clientid\0")?,
                kick_client_by_username: symbol(&library, b"mosquitto_kick_client_by_username\0")?,
                topic_matches_sub: symbol(&library, b"mosquitto_topic_matches_sub\0")?,
                i2d_x509,
                x509_free,
                _library: library,
            })
        }
    }
}

#[cfg(unix)]
fn host_library() -> Result<Library> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn host_library() -> Result<Library> {
    Ok(libloading::os::windows::Library::this().context("open host process")?.into())
}

unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T> {
    let sym = library
        .get::<T>(name)
        .with_context(|| format!("missing broker symbol {}", String::from_utf8_lossy(&name[..name.len() - 1])))?;
    Ok(*sym)
}

#[inline]
unsafe fn opt_cstr<'a>(s: *const std::os::raw::c_char) -> Option<&'a CStr> {
    if s.is_null() {
        None
    } else {
        Some(CStr::from_ptr(s))
    }
}

impl Broker for NativeBroker {
    fn callback_register(
        &self,
        id: PluginId,
        event: Event,
        callback: ffi::MOSQ_FUNC_generic_callback,
        userdata: *mut c_void,
    ) -> StatusCode {
        unsafe { (self.callback_register)(id.as_ptr(), event.code(), callback, ptr::null(), userdata) }
    }

    fn callback_unregister(
        &self,
        id: PluginId,
        event: Event,
        callback: ffi::MOSQ_FUNC_generic_callback,
    ) -> StatusCode {
        unsafe { (self.callback_unregister)(id.as_ptr(), event.code(), callback, ptr::null()) }
    }

    fn log(&self, level: c_int, message: &CStr) {
        unsafe { (self.log_printf)(level, c"%s".as_ptr(), message.as_ptr()) }
    }

    fn client_address<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr> {
        unsafe { opt_cstr((self.client_address)(client.as_ptr())) }
    }

    fn client_id<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr> {
        unsafe { opt_cstr((self.client_id)(client.as_ptr())) }
    }

    fn client_username<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr> {
        unsafe { opt_cstr((self.client_username)(client.as_ptr())) }
    }

    fn client_protocol(&self, client: ClientHandle<'_>) -> c_int {
        unsafe { (self.client_protocol)(client.as_ptr()) }
    }

    fn client_protocol_version(&self, client: ClientHandle<'_>) -> c_int {
        unsafe { (self.client_protocol_version)(client.as_ptr()) }
    }

    fn client_certificate(&self, client: ClientHandle<'_>) -> Option<Vec<u8>> {
        let (i2d_x509, x509_free) = (self.i2d_x509?, self.x509_free?);
        unsafe {
            let cert = (self.client_certificate)(client.as_ptr());
            if cert.is_null() {
                return None;
            }
            let _cert = scopeguard::guard(cert, |cert| x509_free(cert));
            let len = i2d_x509(cert, ptr::null_mut());
            if len <= 0 {
                log::warn!("client certificate could not be DER encoded, {}", len);
                return None;
            }
            let Some(mut der) = crate::cert::try_zeroed(len as usize) else {
                log::warn!("no memory for a {} byte client certificate", len);
                return None;
            };
            let mut out = der.as_mut_ptr();
            if i2d_x509(cert, &mut out) != len {
                return None;
            }
            Some(der)
        }
    }

    fn set_username(&self, client: ClientHandle<'_>, username: Option<&CStr>) -> StatusCode {
        let username = username.map(|u| u.as_ptr()).unwrap_or(ptr::null());
        unsafe { (self.set_username)(client.as_ptr(), username) }
    }

    fn kick_client_by_clientid(&self, client_id: &CStr, with_will: bool) -> StatusCode {
        unsafe { (self.kick_client_by_clientid)(client_id.as_ptr(), with_will) }
    }

    fn kick_client_by_username(&self, username: &CStr, with_will: bool) -> StatusCode {
        unsafe { (self.kick_client_by_username)(username.as_ptr(), with_will) }
    }

    fn topic_matches_sub(&self, sub: &CStr, topic: &CStr) -> std::result::Result<bool, StatusCode> {
        let mut result = false;
        let rc = unsafe { (self.topic_matches_sub)(sub.as_ptr(), topic.as_ptr(), &mut result) };
        if rc == ffi::MOSQ_ERR_SUCCESS {
            Ok(result)
        } else {
            Err(rc)
        }
    }
}
