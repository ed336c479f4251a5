//! Native event handlers.
//!
//! Each handler unpacks one `mosquitto_evt_*` struct, calls the matching [`Script`] callback with
//! the flattened fields and returns its status unchanged. Nothing from the event outlives the call.

use std::any::Any;
use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::slice;

use crate::context::PluginContext;
use crate::ffi;
use crate::script::{PskKey, Script};
use crate::types::{Event, StatusCode};

/// The handler registered for `event`. Init and cleanup both go through here, so the function
/// identity passed to unregister is the one passed to register.
pub fn callback<S: Script>(event: Event) -> ffi::MOSQ_FUNC_generic_callback {
    match event {
        Event::BasicAuth => on_basic_auth::<S>,
        Event::AclCheck => on_acl_check::<S>,
        Event::PskKey => on_psk_key::<S>,
        Event::Disconnect => on_disconnect::<S>,
    }
}

/// # Safety
/// Called by the broker with a `mosquitto_evt_basic_auth` and a context it was registered with.
pub unsafe extern "C" fn on_basic_auth<S: Script>(
    _event: c_int,
    event_data: *mut c_void,
    userdata: *mut c_void,
) -> c_int {
    let (Some(ctx), Some(evt)) = (
        PluginContext::<S>::from_userdata(userdata),
        (event_data as *const ffi::mosquitto_evt_basic_auth).as_ref(),
    ) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    let Some(client) = ctx.client(evt.client) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    let username = text(evt.username);
    let password = text(evt.password);

    dispatch(ctx, Event::BasicAuth, || {
        ctx.bridge().script().basic_auth(ctx.instance(), &client, username.as_deref(), password.as_deref())
    })
}

/// # Safety
/// Called by the broker with a `mosquitto_evt_acl_check` and a context it was registered with.
pub unsafe extern "C" fn on_acl_check<S: Script>(
    _event: c_int,
    event_data: *mut c_void,
    userdata: *mut c_void,
) -> c_int {
    let (Some(ctx), Some(evt)) = (
        PluginContext::<S>::from_userdata(userdata),
        (event_data as *const ffi::mosquitto_evt_acl_check).as_ref(),
    ) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    let (Some(client), Some(topic)) = (ctx.client(evt.client), text(evt.topic)) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    let payload = if evt.payload.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(evt.payload as *const u8, evt.payloadlen as usize))
    };

    dispatch(ctx, Event::AclCheck, || {
        ctx.bridge().script().acl_check(ctx.instance(), &client, &topic, evt.access, payload)
    })
}

/// # Safety
/// Called by the broker with a `mosquitto_evt_psk_key` and a context it was registered with.
pub unsafe extern "C" fn on_psk_key<S: Script>(
    _event: c_int,
    event_data: *mut c_void,
    userdata: *mut c_void,
) -> c_int {
    let (Some(ctx), Some(evt)) = (
        PluginContext::<S>::from_userdata(userdata),
        (event_data as *const ffi::mosquitto_evt_psk_key).as_ref(),
    ) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    let Some(client) = ctx.client(evt.client) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    if evt.key.is_null() {
        return ffi::MOSQ_ERR_INVAL;
    }
    //positional order as the script contract declares it: the hint lands in `identity`, the
    //identity in `hint`
    let identity = text(evt.hint);
    let hint = text(evt.identity);
    let mut key = PskKey::new(slice::from_raw_parts_mut(evt.key as *mut u8, evt.max_key_len.max(0) as usize));

    dispatch(ctx, Event::PskKey, || {
        ctx.bridge().script().psk_key(ctx.instance(), &client, identity.as_deref(), hint.as_deref(), &mut key)
    })
}

/// # Safety
/// Called by the broker with a `mosquitto_evt_disconnect` and a context it was registered with.
pub unsafe extern "C" fn on_disconnect<S: Script>(
    _event: c_int,
    event_data: *mut c_void,
    userdata: *mut c_void,
) -> c_int {
    let (Some(ctx), Some(evt)) = (
        PluginContext::<S>::from_userdata(userdata),
        (event_data as *const ffi::mosquitto_evt_disconnect).as_ref(),
    ) else {
        return ffi::MOSQ_ERR_INVAL;
    };
    let Some(client) = ctx.client(evt.client) else {
        return ffi::MOSQ_ERR_INVAL;
    };

    dispatch(ctx, Event::Disconnect, || ctx.bridge().script().disconnect(ctx.instance(), &client, evt.reason))
}

/// Runs a script callback. Panics must not unwind into the broker.
fn dispatch<S, F>(ctx: &PluginContext<S>, event: Event, f: F) -> StatusCode
where
    S: Script,
    F: FnOnce() -> StatusCode,
{
    if !ctx.catch_panics() {
        return f();
    }
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(rc) => rc,
        Err(e) => {
            log::error!("{:?} {} callback panicked, {}", ctx.identifier(), event, panic_message(e.as_ref()));
            ffi::MOSQ_ERR_UNKNOWN
        }
    }
}

fn panic_message(e: &(dyn Any + Send)) -> &str {
    if let Some(s) = e.downcast_ref::<&str>() {
        s
    } else if let Some(s) = e.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[inline]
unsafe fn text<'a>(s: *const c_char) -> Option<Cow<'a, str>> {
    if s.is_null() {
        None
    } else {
        Some(CStr::from_ptr(s).to_string_lossy())
    }
}
