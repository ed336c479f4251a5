//! Raw mirrors of the mosquitto 2.0 plugin ABI (`mosquitto_broker.h`, `mosquitto_plugin.h`).
//!
//! Layouts must match the C headers byte for byte, including the `future` padding members the
//! broker reserves for later versions.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

/// The one plugin ABI version this crate speaks.
pub const MOSQ_PLUGIN_VERSION: c_int = 5;

/// Returned by `mosquitto_plugin_version` when none of the broker's versions is supported.
pub const MOSQ_PLUGIN_VERSION_INCOMPATIBLE: c_int = -1;

pub const MOSQ_EVT_RELOAD: c_int = 1;
pub const MOSQ_EVT_ACL_CHECK: c_int = 2;
pub const MOSQ_EVT_BASIC_AUTH: c_int = 3;
pub const MOSQ_EVT_EXT_AUTH_START: c_int = 4;
pub const MOSQ_EVT_EXT_AUTH_CONTINUE: c_int = 5;
pub const MOSQ_EVT_CONTROL: c_int = 6;
pub const MOSQ_EVT_MESSAGE: c_int = 7;
pub const MOSQ_EVT_PSK_KEY: c_int = 8;
pub const MOSQ_EVT_TICK: c_int = 9;
pub const MOSQ_EVT_DISCONNECT: c_int = 10;

pub const MOSQ_ERR_AUTH_CONTINUE: c_int = -4;
pub const MOSQ_ERR_NO_SUBSCRIBERS: c_int = -3;
pub const MOSQ_ERR_SUB_EXISTS: c_int = -2;
pub const MOSQ_ERR_CONN_PENDING: c_int = -1;
pub const MOSQ_ERR_SUCCESS: c_int = 0;
pub const MOSQ_ERR_NOMEM: c_int = 1;
pub const MOSQ_ERR_PROTOCOL: c_int = 2;
pub const MOSQ_ERR_INVAL: c_int = 3;
pub const MOSQ_ERR_NO_CONN: c_int = 4;
pub const MOSQ_ERR_CONN_REFUSED: c_int = 5;
pub const MOSQ_ERR_NOT_FOUND: c_int = 6;
pub const MOSQ_ERR_CONN_LOST: c_int = 7;
pub const MOSQ_ERR_TLS: c_int = 8;
pub const MOSQ_ERR_PAYLOAD_SIZE: c_int = 9;
pub const MOSQ_ERR_NOT_SUPPORTED: c_int = 10;
pub const MOSQ_ERR_AUTH: c_int = 11;
pub const MOSQ_ERR_ACL_DENIED: c_int = 12;
pub const MOSQ_ERR_UNKNOWN: c_int = 13;
pub const MOSQ_ERR_ERRNO: c_int = 14;
pub const MOSQ_ERR_EAI: c_int = 15;
pub const MOSQ_ERR_PROXY: c_int = 16;
pub const MOSQ_ERR_PLUGIN_DEFER: c_int = 17;
pub const MOSQ_ERR_MALFORMED_UTF8: c_int = 18;
pub const MOSQ_ERR_KEEPALIVE: c_int = 19;
pub const MOSQ_ERR_LOOKUP: c_int = 20;
pub const MOSQ_ERR_ALREADY_EXISTS: c_int = 31;

pub const MOSQ_ACL_NONE: c_int = 0x00;
pub const MOSQ_ACL_READ: c_int = 0x01;
pub const MOSQ_ACL_WRITE: c_int = 0x02;
pub const MOSQ_ACL_SUBSCRIBE: c_int = 0x04;
pub const MOSQ_ACL_UNSUBSCRIBE: c_int = 0x08;

pub const MOSQ_LOG_NONE: c_int = 0;
pub const MOSQ_LOG_INFO: c_int = 1 << 0;
pub const MOSQ_LOG_NOTICE: c_int = 1 << 1;
pub const MOSQ_LOG_WARNING: c_int = 1 << 2;
pub const MOSQ_LOG_ERR: c_int = 1 << 3;
pub const MOSQ_LOG_DEBUG: c_int = 1 << 4;

/// `enum mosquitto_protocol`
pub const MP_MQTT: c_int = 0;
pub const MP_MQTTSN: c_int = 1;
pub const MP_WEBSOCKETS: c_int = 2;

/// `struct mosquitto`, only ever seen behind a pointer.
#[repr(C)]
pub struct mosquitto {
    _private: [u8; 0],
}

/// `mosquitto_plugin_id_t`, only ever seen behind a pointer.
#[repr(C)]
pub struct mosquitto_plugin_id_t {
    _private: [u8; 0],
}

/// `mosquitto_property`, only ever seen behind a pointer.
#[repr(C)]
pub struct mosquitto_property {
    _private: [u8; 0],
}

/// OpenSSL `X509`, only ever seen behind a pointer.
#[repr(C)]
pub struct X509 {
    _private: [u8; 0],
}

#[repr(C)]
pub struct mosquitto_opt {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

#[repr(C)]
pub struct mosquitto_evt_basic_auth {
    pub future: *mut c_void,
    pub client: *mut mosquitto,
    pub username: *mut c_char,
    pub password: *mut c_char,
    pub future2: [*mut c_void; 4],
}

#[repr(C)]
pub struct mosquitto_evt_acl_check {
    pub future: *mut c_void,
    pub client: *mut mosquitto,
    pub topic: *const c_char,
    pub payload: *const c_void,
    pub properties: *mut mosquitto_property,
    pub access: c_int,
    pub payloadlen: u32,
    pub qos: u8,
    pub retain: bool,
    pub future2: [*mut c_void; 4],
}

#[repr(C)]
pub struct mosquitto_evt_psk_key {
    pub future: *mut c_void,
    pub client: *mut mosquitto,
    pub hint: *const c_char,
    pub identity: *const c_char,
    pub key: *mut c_char,
    pub max_key_len: c_int,
    pub future2: [*mut c_void; 4],
}

#[repr(C)]
pub struct mosquitto_evt_disconnect {
    pub future: *mut c_void,
    pub client: *mut mosquitto,
    pub reason: c_int,
    pub future2: [*mut c_void; 4],
}

/// `MOSQ_FUNC_generic_callback`
pub type MOSQ_FUNC_generic_callback =
    unsafe extern "C" fn(event: c_int, event_data: *mut c_void, userdata: *mut c_void) -> c_int;

pub type mosquitto_callback_register_fn = unsafe extern "C" fn(
    identifier: *mut mosquitto_plugin_id_t,
    event: c_int,
    cb_func: MOSQ_FUNC_generic_callback,
    event_data: *const c_void,
    userdata: *mut c_void,
) -> c_int;

pub type mosquitto_callback_unregister_fn = unsafe extern "C" fn(
    identifier: *mut mosquitto_plugin_id_t,
    event: c_int,
    cb_func: MOSQ_FUNC_generic_callback,
    event_data: *const c_void,
) -> c_int;

pub type mosquitto_log_printf_fn = unsafe extern "C" fn(level: c_int, fmt: *const c_char, ...);

pub type mosquitto_client_str_fn = unsafe extern "C" fn(client: *const mosquitto) -> *const c_char;

pub type mosquitto_client_int_fn = unsafe extern "C" fn(client: *const mosquitto) -> c_int;

pub type mosquitto_client_certificate_fn = unsafe extern "C" fn(client: *const mosquitto) -> *mut X509;

pub type mosquitto_set_username_fn =
    unsafe extern "C" fn(client: *mut mosquitto, username: *const c_char) -> c_int;

pub type mosquitto_kick_client_fn = unsafe extern "C" fn(name: *const c_char, with_will: bool) -> c_int;

pub type mosquitto_topic_matches_sub_fn =
    unsafe extern "C" fn(sub: *const c_char, topic: *const c_char, result: *mut bool) -> c_int;

pub type i2d_X509_fn = unsafe extern "C" fn(x: *mut X509, out: *mut *mut u8) -> c_int;

pub type X509_free_fn = unsafe extern "C" fn(x: *mut X509);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_event_layouts() {
        let ptr = size_of::<*mut c_void>();
        assert_eq!(size_of::<mosquitto_opt>(), 2 * ptr);
        assert_eq!(size_of::<mosquitto_evt_basic_auth>(), 8 * ptr);
        assert_eq!(size_of::<mosquitto_evt_disconnect>() % align_of::<*mut c_void>(), 0);
        assert_eq!(std::mem::offset_of!(mosquitto_evt_psk_key, hint), 2 * ptr);
        assert_eq!(std::mem::offset_of!(mosquitto_evt_psk_key, identity), 3 * ptr);
        assert_eq!(std::mem::offset_of!(mosquitto_evt_acl_check, access), 5 * ptr);
        assert_eq!(std::mem::offset_of!(mosquitto_evt_acl_check, payloadlen), 5 * ptr + 4);
    }
}
