use std::os::raw::c_void;

use parking_lot::Mutex;

use crate::client::Client;
use crate::ffi;
use crate::runtime::Bridge;
use crate::script::Script;
use crate::types::{ClientHandle, Event, PluginId};

/// Per plugin instance state. The broker keeps its address and passes it to every callback
/// registered against it.
pub struct PluginContext<S: Script> {
    identifier: PluginId,
    bridge: &'static Bridge<S>,
    instance: S::Instance,
    catch_panics: bool,
    registered: Mutex<Vec<Event>>,
}

impl<S: Script> PluginContext<S> {
    #[inline]
    pub fn new(identifier: PluginId, bridge: &'static Bridge<S>, instance: S::Instance, catch_panics: bool) -> Self {
        Self { identifier, bridge, instance, catch_panics, registered: Mutex::new(Vec::new()) }
    }

    #[inline]
    pub fn identifier(&self) -> PluginId {
        self.identifier
    }

    #[inline]
    pub fn bridge(&self) -> &'static Bridge<S> {
        self.bridge
    }

    #[inline]
    pub fn instance(&self) -> &S::Instance {
        &self.instance
    }

    #[inline]
    pub fn catch_panics(&self) -> bool {
        self.catch_panics
    }

    /// Client view for a handle taken from an event of the current call.
    ///
    /// # Safety
    /// `client` must be null or a client the broker keeps alive for `'a`.
    #[inline]
    pub unsafe fn client<'a>(&'a self, client: *const ffi::mosquitto) -> Option<Client<'a>> {
        ClientHandle::from_raw(client).map(|h| Client::new(h, self.bridge.broker()))
    }

    #[inline]
    pub(crate) fn record_registered(&self, event: Event) {
        self.registered.lock().push(event);
    }

    #[inline]
    pub fn registered(&self) -> Vec<Event> {
        self.registered.lock().clone()
    }

    #[inline]
    pub(crate) fn take_registered(&self) -> Vec<Event> {
        std::mem::take(&mut *self.registered.lock())
    }

    #[inline]
    pub(crate) fn into_instance(self) -> S::Instance {
        self.instance
    }

    /// Hands the context to the broker.
    #[inline]
    pub fn into_raw(ctx: Box<Self>) -> *mut c_void {
        Box::into_raw(ctx) as *mut c_void
    }

    /// # Safety
    /// `ptr` must come from [`PluginContext::into_raw`] for the same `S`, and no callback
    /// registered against it may still run.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut c_void) -> Box<Self> {
        Box::from_raw(ptr as *mut Self)
    }

    /// # Safety
    /// `ptr` must be null or come from [`PluginContext::into_raw`] for the same `S` and still be
    /// alive for `'a`.
    #[inline]
    pub unsafe fn from_userdata<'a>(ptr: *mut c_void) -> Option<&'a Self> {
        (ptr as *const Self).as_ref()
    }
}
