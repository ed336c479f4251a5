//! The three symbols the broker looks up when it loads the plugin, and the state machine behind
//! them: version negotiation, instance init, instance cleanup.

use std::os::raw::{c_int, c_void};
use std::slice;

use once_cell::sync::OnceCell;

use crate::broker::NativeBroker;
use crate::context::PluginContext;
use crate::error::{die, FatalError};
use crate::events::callback;
use crate::ffi;
use crate::options::PluginOptions;
use crate::runtime::Bridge;
use crate::script::Script;
use crate::settings::Settings;
use crate::types::{Event, PluginId, StatusCode};

/// `MOSQ_PLUGIN_VERSION` when the broker offers it, otherwise `MOSQ_PLUGIN_VERSION_INCOMPATIBLE`.
#[inline]
pub fn negotiate_version(supported: &[c_int]) -> c_int {
    if supported.contains(&ffi::MOSQ_PLUGIN_VERSION) {
        ffi::MOSQ_PLUGIN_VERSION
    } else {
        ffi::MOSQ_PLUGIN_VERSION_INCOMPATIBLE
    }
}

/// # Safety
/// `versions` must be null or point to `count` integers.
pub unsafe fn plugin_version(count: c_int, versions: *const c_int) -> c_int {
    if versions.is_null() || count <= 0 {
        return negotiate_version(&[]);
    }
    negotiate_version(slice::from_raw_parts(versions, count as usize))
}

/// Creates one plugin instance and registers every event handler for it.
///
/// On success the context is written to `*userdata` and `MOSQ_ERR_SUCCESS` returned. A refused
/// registration is rolled back completely and the broker's code returned. `Err` is only returned
/// for failures the broker process must not survive, and always before anything is registered.
///
/// # Safety
/// Arguments as passed to `mosquitto_plugin_init`.
pub unsafe fn plugin_init<S: Script>(
    bridge: &'static Bridge<S>,
    identifier: *mut ffi::mosquitto_plugin_id_t,
    userdata: *mut *mut c_void,
    options: *mut ffi::mosquitto_opt,
    option_count: c_int,
) -> Result<StatusCode, FatalError> {
    let Some(id) = PluginId::from_raw(identifier) else {
        return Ok(ffi::MOSQ_ERR_INVAL);
    };
    if userdata.is_null() {
        return Ok(ffi::MOSQ_ERR_INVAL);
    }

    let opts = PluginOptions::from_raw(options, option_count);
    let (settings, settings_err) = match Settings::from_options(&opts) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    bridge.ensure_started(&settings)?;
    if let Some(e) = settings_err {
        log::warn!("{:?} invalid bridge options, using defaults, {}", id, e);
    }

    let instance = bridge.init_instance(&opts)?;
    let raw = PluginContext::into_raw(Box::new(PluginContext::new(id, bridge, instance, settings.catch_panics)));
    let ctx = &*(raw as *const PluginContext<S>);

    for event in Event::ALL {
        let rc = bridge.broker().callback_register(id, event, callback::<S>(event), raw);
        if rc != ffi::MOSQ_ERR_SUCCESS {
            log::warn!("{:?} broker refused {} registration, {}", id, event, rc);
            release::<S>(raw, &opts);
            return Ok(rc);
        }
        ctx.record_registered(event);
    }

    *userdata = raw;
    log::info!("{:?} plugin instance initialized, {} options", id, opts.len());
    Ok(ffi::MOSQ_ERR_SUCCESS)
}

/// [`plugin_init`], terminating the process on a fatal error.
///
/// # Safety
/// Arguments as passed to `mosquitto_plugin_init`.
pub unsafe fn plugin_init_or_die<S: Script>(
    bridge: &'static Bridge<S>,
    identifier: *mut ffi::mosquitto_plugin_id_t,
    userdata: *mut *mut c_void,
    options: *mut ffi::mosquitto_opt,
    option_count: c_int,
) -> StatusCode {
    match plugin_init(bridge, identifier, userdata, options, option_count) {
        Ok(rc) => rc,
        Err(e) => die(&e),
    }
}

/// Tears down an instance created by [`plugin_init`]: unregisters its handlers, finalizes the
/// script instance and frees the context. Returns the script's status.
///
/// # Safety
/// `userdata` must be null or the pointer `plugin_init` wrote for the same `S`, and must not be
/// used again afterwards.
pub unsafe fn plugin_cleanup<S: Script>(
    userdata: *mut c_void,
    options: *mut ffi::mosquitto_opt,
    option_count: c_int,
) -> StatusCode {
    if userdata.is_null() {
        log::warn!("plugin cleanup without an initialized instance");
        return ffi::MOSQ_ERR_INVAL;
    }
    let opts = PluginOptions::from_raw(options, option_count);
    let rc = release::<S>(userdata, &opts);
    log::info!("plugin instance cleaned up, {}", rc);
    rc
}

unsafe fn release<S: Script>(raw: *mut c_void, opts: &PluginOptions) -> StatusCode {
    let ctx = PluginContext::<S>::from_raw(raw);
    let bridge = ctx.bridge();
    let id = ctx.identifier();
    for event in ctx.take_registered() {
        let rc = bridge.broker().callback_unregister(id, event, callback::<S>(event));
        if rc != ffi::MOSQ_ERR_SUCCESS {
            log::warn!("{:?} failed to unregister {}, {}", id, event, rc);
        }
    }
    bridge.cleanup_instance(ctx.into_instance(), opts)
}

/// The process-wide bridge behind [`plugin_entry!`](crate::plugin_entry), created on first use.
pub fn native_bridge<S, F>(cell: &'static OnceCell<Bridge<S>>, factory: F) -> &'static Bridge<S>
where
    S: Script,
    F: FnOnce() -> S,
{
    cell.get_or_init(|| match NativeBroker::load() {
        Ok(broker) => Bridge::new(factory(), Box::new(broker)),
        Err(e) => die(&FatalError::BrokerSymbols(e)),
    })
}

/// Exports `mosquitto_plugin_version`, `mosquitto_plugin_init` and `mosquitto_plugin_cleanup`
/// for a [`Script`](crate::Script) type. Use once, in a `cdylib` crate.
///
/// ```ignore
/// mosq_bridge::plugin_entry!(StaticAuth, StaticAuth::default);
/// ```
#[macro_export]
macro_rules! plugin_entry {
    ($script:ty, $factory:expr) => {
        static __MOSQ_BRIDGE: $crate::once_cell::sync::OnceCell<$crate::Bridge<$script>> =
            $crate::once_cell::sync::OnceCell::new();

        /// # Safety
        /// Called by the broker only.
        #[no_mangle]
        pub unsafe extern "C" fn mosquitto_plugin_version(
            supported_version_count: ::std::os::raw::c_int,
            supported_versions: *const ::std::os::raw::c_int,
        ) -> ::std::os::raw::c_int {
            $crate::entry::plugin_version(supported_version_count, supported_versions)
        }

        /// # Safety
        /// Called by the broker only.
        #[no_mangle]
        pub unsafe extern "C" fn mosquitto_plugin_init(
            identifier: *mut $crate::ffi::mosquitto_plugin_id_t,
            userdata: *mut *mut ::std::os::raw::c_void,
            options: *mut $crate::ffi::mosquitto_opt,
            option_count: ::std::os::raw::c_int,
        ) -> ::std::os::raw::c_int {
            let bridge = $crate::entry::native_bridge(&__MOSQ_BRIDGE, $factory);
            $crate::entry::plugin_init_or_die(bridge, identifier, userdata, options, option_count)
        }

        /// # Safety
        /// Called by the broker only, with the userdata `mosquitto_plugin_init` wrote.
        #[no_mangle]
        pub unsafe extern "C" fn mosquitto_plugin_cleanup(
            userdata: *mut ::std::os::raw::c_void,
            options: *mut $crate::ffi::mosquitto_opt,
            option_count: ::std::os::raw::c_int,
        ) -> ::std::os::raw::c_int {
            $crate::entry::plugin_cleanup::<$script>(userdata, options, option_count)
        }
    };
}
