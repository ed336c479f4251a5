//! Recording doubles for the broker and the script, used by the unit tests.

use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::Mutex;

use crate::broker::Broker;
use crate::client::Client;
use crate::directory::Directory;
use crate::ffi;
use crate::options::PluginOptions;
use crate::runtime::Bridge;
use crate::script::{PskKey, Script};
use crate::types::{ClientHandle, Event, PluginId, StatusCode};
use crate::Result;

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn leak_bridge(script: MockScript) -> &'static Bridge<MockScript> {
    leak_bridge_with(script, MockBroker::new())
}

pub fn leak_bridge_with(script: MockScript, broker: MockBroker) -> &'static Bridge<MockScript> {
    Box::leak(Box::new(Bridge::new(script, Box::new(broker))))
}

#[derive(Clone, Copy)]
struct Registration {
    id: usize,
    event: Event,
    callback: ffi::MOSQ_FUNC_generic_callback,
    userdata: usize,
}

#[derive(Default)]
struct BrokerState {
    registrations: Mutex<Vec<Registration>>,
    refused: Mutex<Vec<Event>>,
    journal: Journal,
    kicks: Mutex<Vec<(String, String, bool)>>,
    logs: Mutex<Vec<(c_int, String)>>,
    certificates_released: AtomicUsize,
}

/// Clones share state, so a test can keep one while the bridge owns another.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<BrokerState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal {
        self.state.journal.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.journal.lock().clone()
    }

    pub fn refuse(&self, event: Event) {
        self.state.refused.lock().push(event);
    }

    pub fn registered_events(&self) -> Vec<Event> {
        self.state.registrations.lock().iter().map(|r| r.event).collect()
    }

    pub fn registered_userdata(&self) -> Vec<usize> {
        self.state.registrations.lock().iter().map(|r| r.userdata).collect()
    }

    pub fn kicks(&self) -> Vec<(String, String, bool)> {
        self.state.kicks.lock().clone()
    }

    pub fn certificates_released(&self) -> usize {
        self.state.certificates_released.load(Ordering::SeqCst)
    }

    /// Delivers an event to every handler registered for it, as the broker would.
    ///
    /// # Safety
    /// `event_data` must point to the event struct matching `event`.
    pub unsafe fn dispatch(&self, event: Event, event_data: *mut c_void) -> Vec<StatusCode> {
        let targets: Vec<Registration> =
            self.state.registrations.lock().iter().filter(|r| r.event == event).copied().collect();
        targets.into_iter().map(|r| (r.callback)(event.code(), event_data, r.userdata as *mut c_void)).collect()
    }
}

impl Broker for MockBroker {
    fn callback_register(
        &self,
        id: PluginId,
        event: Event,
        callback: ffi::MOSQ_FUNC_generic_callback,
        userdata: *mut c_void,
    ) -> StatusCode {
        if self.state.refused.lock().contains(&event) {
            return ffi::MOSQ_ERR_NOT_SUPPORTED;
        }
        let id = id.as_ptr() as usize;
        let mut registrations = self.state.registrations.lock();
        if registrations.iter().any(|r| r.id == id && r.event == event && r.callback as usize == callback as usize) {
            return ffi::MOSQ_ERR_ALREADY_EXISTS;
        }
        registrations.push(Registration { id, event, callback, userdata: userdata as usize });
        self.state.journal.lock().push(format!("register {}", event));
        ffi::MOSQ_ERR_SUCCESS
    }

    fn callback_unregister(
        &self,
        id: PluginId,
        event: Event,
        callback: ffi::MOSQ_FUNC_generic_callback,
    ) -> StatusCode {
        let id = id.as_ptr() as usize;
        let mut registrations = self.state.registrations.lock();
        let Some(pos) = registrations
            .iter()
            .position(|r| r.id == id && r.event == event && r.callback as usize == callback as usize)
        else {
            return ffi::MOSQ_ERR_NOT_FOUND;
        };
        registrations.remove(pos);
        self.state.journal.lock().push(format!("unregister {}", event));
        ffi::MOSQ_ERR_SUCCESS
    }

    fn log(&self, level: c_int, message: &CStr) {
        self.state.logs.lock().push((level, message.to_string_lossy().into_owned()));
    }

    fn client_address<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr> {
        let state = unsafe { client_state(client) };
        Some(state.address.as_c_str())
    }

    fn client_id<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr> {
        let state = unsafe { client_state(client) };
        Some(state.id.as_c_str())
    }

    fn client_username<'a>(&self, client: ClientHandle<'a>) -> Option<&'a CStr> {
        let state = unsafe { client_state(client) };
        let current = (*state.username.lock())?;
        let usernames = state.usernames.lock();
        //entries are never removed, their heap buffers live as long as the client
        Some(unsafe { &*(usernames[current].as_c_str() as *const CStr) })
    }

    fn client_protocol(&self, client: ClientHandle<'_>) -> c_int {
        unsafe { client_state(client) }.protocol
    }

    fn client_protocol_version(&self, client: ClientHandle<'_>) -> c_int {
        unsafe { client_state(client) }.protocol_version
    }

    fn client_certificate(&self, client: ClientHandle<'_>) -> Option<Vec<u8>> {
        let der = unsafe { client_state(client) }.certificate.clone()?;
        self.state.certificates_released.fetch_add(1, Ordering::SeqCst);
        Some(der)
    }

    fn set_username(&self, client: ClientHandle<'_>, username: Option<&CStr>) -> StatusCode {
        let state = unsafe { client_state(client) };
        *state.username.lock() = username.map(|u| state.push_username(u.to_owned()));
        ffi::MOSQ_ERR_SUCCESS
    }

    fn kick_client_by_clientid(&self, client_id: &CStr, with_will: bool) -> StatusCode {
        self.state.kicks.lock().push(("clientid".into(), client_id.to_string_lossy().into_owned(), with_will));
        ffi::MOSQ_ERR_SUCCESS
    }

    fn kick_client_by_username(&self, username: &CStr, with_will: bool) -> StatusCode {
        self.state.kicks.lock().push(("username".into(), username.to_string_lossy().into_owned(), with_will));
        ffi::MOSQ_ERR_SUCCESS
    }

    fn topic_matches_sub(&self, sub: &CStr, topic: &CStr) -> std::result::Result<bool, StatusCode> {
        let (Ok(sub), Ok(topic)) = (sub.to_str(), topic.to_str()) else {
            return Err(ffi::MOSQ_ERR_MALFORMED_UTF8);
        };
        topic_matches(sub, topic)
    }
}

fn topic_matches(sub: &str, topic: &str) -> std::result::Result<bool, StatusCode> {
    let filter: Vec<&str> = sub.split('/').collect();
    let valid_filter = filter.iter().enumerate().all(|(pos, level)| match *level {
        "#" => pos == filter.len() - 1,
        "+" => true,
        level => !level.contains(['+', '#']),
    });
    if sub.is_empty() || topic.is_empty() || !valid_filter || topic.contains(['+', '#']) {
        return Err(ffi::MOSQ_ERR_INVAL);
    }

    let mut lhs = filter.iter();
    for rhs in topic.split('/') {
        match lhs.next() {
            Some(&"+") => continue,
            Some(&"#") => return Ok(true),
            Some(level) if *level == rhs => continue,
            _ => return Ok(false),
        }
    }
    Ok(matches!(lhs.next(), Some(&"#") | None))
}

struct ClientState {
    id: CString,
    address: CString,
    protocol: c_int,
    protocol_version: c_int,
    certificate: Option<Vec<u8>>,
    usernames: Mutex<Vec<CString>>,
    username: Mutex<Option<usize>>,
}

impl ClientState {
    fn push_username(&self, username: CString) -> usize {
        let mut usernames = self.usernames.lock();
        usernames.push(username);
        usernames.len() - 1
    }
}

unsafe fn client_state<'a>(client: ClientHandle<'a>) -> &'a ClientState {
    &*(client.as_ptr() as *const ClientState)
}

/// A client the mock broker can answer for. Its address is the handle.
pub struct MockClient {
    state: Box<ClientState>,
}

impl MockClient {
    pub fn new(id: &str, username: Option<&str>, address: &str) -> Self {
        let state = ClientState {
            id: CString::new(id).unwrap(),
            address: CString::new(address).unwrap(),
            protocol: ffi::MP_MQTT,
            protocol_version: 4,
            certificate: None,
            usernames: Mutex::new(Vec::new()),
            username: Mutex::new(None),
        };
        if let Some(username) = username {
            let idx = state.push_username(CString::new(username).unwrap());
            *state.username.lock() = Some(idx);
        }
        MockClient { state: Box::new(state) }
    }

    pub fn protocol(mut self, protocol: c_int, version: c_int) -> Self {
        self.state.protocol = protocol;
        self.state.protocol_version = version;
        self
    }

    pub fn certificate(mut self, der: Vec<u8>) -> Self {
        self.state.certificate = Some(der);
        self
    }

    pub fn handle(&self) -> ClientHandle<'_> {
        unsafe { ClientHandle::from_raw(&*self.state as *const ClientState as *const ffi::mosquitto) }.unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BasicAuth { instance: usize, client_id: Option<String>, username: Option<String>, password: Option<String> },
    AclCheck { instance: usize, client_id: Option<String>, topic: String, access: c_int, payload: Option<Vec<u8>> },
    PskKey { instance: usize, identity: Option<String>, hint: Option<String>, capacity: usize },
    Disconnect { instance: usize, client_id: Option<String>, reason: c_int },
}

#[derive(Debug)]
pub struct MockInstance {
    pub id: usize,
    pub options: PluginOptions,
}

#[derive(Default)]
pub struct MockScript {
    pub starts: AtomicUsize,
    slow_start: bool,
    fail_start: bool,
    fail_init: bool,
    status: Option<StatusCode>,
    panic_on: Option<Event>,
    journal: Option<Journal>,
    next_instance: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    cleanups: Mutex<Vec<usize>>,
}

impl MockScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow_start(mut self) -> Self {
        self.slow_start = true;
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Status every event callback returns instead of its default.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn panic_on(mut self, event: Event) -> Self {
        self.panic_on = Some(event);
        self
    }

    pub fn journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn cleanups(&self) -> Vec<usize> {
        self.cleanups.lock().clone()
    }

    fn record(&self, event: Event, call: Call) -> StatusCode {
        if self.panic_on == Some(event) {
            panic!("script raised in {}", event);
        }
        self.calls.lock().push(call);
        self.status.unwrap_or(ffi::MOSQ_ERR_SUCCESS)
    }
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_owned)
}

impl Script for MockScript {
    type Instance = MockInstance;

    fn start(&self) -> Result<()> {
        if self.slow_start {
            std::thread::sleep(Duration::from_millis(50));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(anyhow!("interpreter unavailable"));
        }
        Ok(())
    }

    fn plugin_init(&self, _directory: Directory<'static>, options: &PluginOptions) -> Result<MockInstance> {
        if self.fail_init {
            return Err(anyhow!("ModuleNotFoundError: auth_rules"));
        }
        let id = self.next_instance.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockInstance { id, options: options.clone() })
    }

    fn plugin_cleanup(&self, instance: MockInstance, _options: &PluginOptions) -> StatusCode {
        self.cleanups.lock().push(instance.id);
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("cleanup {}", instance.id));
        }
        ffi::MOSQ_ERR_SUCCESS
    }

    fn basic_auth(
        &self,
        instance: &MockInstance,
        client: &Client<'_>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> StatusCode {
        self.record(
            Event::BasicAuth,
            Call::BasicAuth {
                instance: instance.id,
                client_id: owned(client.id()),
                username: owned(username),
                password: owned(password),
            },
        )
    }

    fn acl_check(
        &self,
        instance: &MockInstance,
        client: &Client<'_>,
        topic: &str,
        access: c_int,
        payload: Option<&[u8]>,
    ) -> StatusCode {
        self.record(
            Event::AclCheck,
            Call::AclCheck {
                instance: instance.id,
                client_id: owned(client.id()),
                topic: topic.to_owned(),
                access,
                payload: payload.map(<[u8]>::to_vec),
            },
        )
    }

    fn psk_key(
        &self,
        instance: &MockInstance,
        _client: &Client<'_>,
        identity: Option<&str>,
        hint: Option<&str>,
        key: &mut PskKey<'_>,
    ) -> StatusCode {
        let call = Call::PskKey {
            instance: instance.id,
            identity: owned(identity),
            hint: owned(hint),
            capacity: key.capacity(),
        };
        let rc = self.record(Event::PskKey, call);
        match key.set("deadbeef") {
            ffi::MOSQ_ERR_SUCCESS => rc,
            err => err,
        }
    }

    fn disconnect(&self, instance: &MockInstance, client: &Client<'_>, reason: c_int) -> StatusCode {
        let call = Call::Disconnect { instance: instance.id, client_id: owned(client.id()), reason };
        self.record(Event::Disconnect, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_topic_matcher() {
        assert_eq!(topic_matches("sport/#", "sport"), Ok(true));
        assert_eq!(topic_matches("sport/+", "sport/tennis/player1"), Ok(false));
        assert_eq!(topic_matches("#", "a/b/c"), Ok(true));
        assert_eq!(topic_matches("sport/#/x", "sport/x"), Err(ffi::MOSQ_ERR_INVAL));
        assert_eq!(topic_matches("sport/ten+", "sport/tennis"), Err(ffi::MOSQ_ERR_INVAL));
    }
}
