use std::fmt;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::ptr::NonNull;

use crate::ffi;

/// Integer result code as defined by the broker's plugin ABI (`MOSQ_ERR_*`).
pub type StatusCode = c_int;

/// Identifier the broker issues to a plugin instance for its registration API.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PluginId(NonNull<ffi::mosquitto_plugin_id_t>);

// The identifier is an opaque token owned by the broker; it is only passed back to it.
unsafe impl Send for PluginId {}
unsafe impl Sync for PluginId {}

impl PluginId {
    #[inline]
    pub fn from_raw(ptr: *mut ffi::mosquitto_plugin_id_t) -> Option<Self> {
        NonNull::new(ptr).map(PluginId)
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut ffi::mosquitto_plugin_id_t {
        self.0.as_ptr()
    }
}

impl fmt::Debug for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginId({:p})", self.0)
    }
}

/// Broker-owned client handle, valid only for the event call that supplies it.
///
/// The lifetime ties every view derived from the handle to that call.
#[derive(Clone, Copy)]
pub struct ClientHandle<'a> {
    ptr: NonNull<ffi::mosquitto>,
    _call: PhantomData<&'a ffi::mosquitto>,
}

impl<'a> ClientHandle<'a> {
    /// # Safety
    /// `ptr` must be null or point to a client the broker keeps alive for `'a`.
    #[inline]
    pub unsafe fn from_raw(ptr: *const ffi::mosquitto) -> Option<Self> {
        NonNull::new(ptr as *mut ffi::mosquitto).map(|ptr| ClientHandle { ptr, _call: PhantomData })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut ffi::mosquitto {
        self.ptr.as_ptr()
    }
}

impl fmt::Debug for ClientHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientHandle({:p})", self.ptr)
    }
}

/// The event kinds this bridge registers for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Event {
    BasicAuth,
    AclCheck,
    PskKey,
    Disconnect,
}

impl Event {
    pub const ALL: [Event; 4] = [Event::BasicAuth, Event::AclCheck, Event::PskKey, Event::Disconnect];

    #[inline]
    pub fn code(&self) -> c_int {
        match self {
            Event::BasicAuth => ffi::MOSQ_EVT_BASIC_AUTH,
            Event::AclCheck => ffi::MOSQ_EVT_ACL_CHECK,
            Event::PskKey => ffi::MOSQ_EVT_PSK_KEY,
            Event::Disconnect => ffi::MOSQ_EVT_DISCONNECT,
        }
    }

    #[inline]
    pub fn from_code(code: c_int) -> Option<Event> {
        Event::ALL.into_iter().find(|e| e.code() == code)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::BasicAuth => "basic_auth",
            Event::AclCheck => "acl_check",
            Event::PskKey => "psk_key",
            Event::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

/// ACL access being checked, decoded from `MOSQ_ACL_*`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Access {
    None,
    Read,
    Write,
    Subscribe,
    Unsubscribe,
    Other(c_int),
}

impl From<c_int> for Access {
    fn from(code: c_int) -> Self {
        match code {
            ffi::MOSQ_ACL_NONE => Access::None,
            ffi::MOSQ_ACL_READ => Access::Read,
            ffi::MOSQ_ACL_WRITE => Access::Write,
            ffi::MOSQ_ACL_SUBSCRIBE => Access::Subscribe,
            ffi::MOSQ_ACL_UNSUBSCRIBE => Access::Unsubscribe,
            other => Access::Other(other),
        }
    }
}

impl From<Access> for c_int {
    fn from(access: Access) -> Self {
        match access {
            Access::None => ffi::MOSQ_ACL_NONE,
            Access::Read => ffi::MOSQ_ACL_READ,
            Access::Write => ffi::MOSQ_ACL_WRITE,
            Access::Subscribe => ffi::MOSQ_ACL_SUBSCRIBE,
            Access::Unsubscribe => ffi::MOSQ_ACL_UNSUBSCRIBE,
            Access::Other(code) => code,
        }
    }
}

/// Transport a client connected over, decoded from `enum mosquitto_protocol`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Protocol {
    Mqtt,
    MqttSn,
    Websockets,
    Unknown(c_int),
}

impl From<c_int> for Protocol {
    fn from(code: c_int) -> Self {
        match code {
            ffi::MP_MQTT => Protocol::Mqtt,
            ffi::MP_MQTTSN => Protocol::MqttSn,
            ffi::MP_WEBSOCKETS => Protocol::Websockets,
            other => Protocol::Unknown(other),
        }
    }
}
