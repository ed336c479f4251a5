//! A mosquitto plugin answering authentication, ACL and PSK lookups from static rules given as
//! plugin options.
//!
//! ```text
//! plugin /usr/lib/libmosq_bridge_static_auth.so
//! plugin_opt_user.alice secret
//! plugin_opt_acl.alice sensors/#,alerts/+
//! plugin_opt_psk.gateway 00112233aabbccdd
//! plugin_opt_bridge_log_level debug
//! ```

use std::os::raw::c_int;

use mosq_bridge::{ffi, Access, Client, Directory, PluginOptions, PskKey, Result, Script, StatusCode};

use rules::Rules;

mod rules;

mosq_bridge::plugin_entry!(StaticAuth, StaticAuth::default);

#[derive(Default)]
pub struct StaticAuth;

impl Script for StaticAuth {
    type Instance = Rules;

    fn start(&self) -> Result<()> {
        log::info!("static auth {} start", env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    fn plugin_init(&self, _directory: Directory<'static>, options: &PluginOptions) -> Result<Rules> {
        let rules = Rules::from_options(options)?;
        if rules.is_empty() {
            log::warn!("static auth has no rules, every request is deferred");
        }
        Ok(rules)
    }

    fn plugin_cleanup(&self, _rules: Rules, _options: &PluginOptions) -> StatusCode {
        log::debug!("static auth cleanup");
        ffi::MOSQ_ERR_SUCCESS
    }

    fn basic_auth(
        &self,
        rules: &Rules,
        client: &Client<'_>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> StatusCode {
        let rc = rules.check_password(username, password);
        log::debug!("{:?} basic auth, username: {:?}, result: {}", client.id(), username, rc);
        rc
    }

    fn acl_check(
        &self,
        rules: &Rules,
        client: &Client<'_>,
        topic: &str,
        access: c_int,
        _payload: Option<&[u8]>,
    ) -> StatusCode {
        let directory = client.directory();
        let rc = rules.check_acl(client.username(), topic, |sub, topic| directory.topic_matches(sub, topic));
        log::debug!("{:?} acl check {:?} {}, result: {}", client.id(), Access::from(access), topic, rc);
        rc
    }

    fn psk_key(
        &self,
        rules: &Rules,
        client: &Client<'_>,
        _identity: Option<&str>,
        hint: Option<&str>,
        key: &mut PskKey<'_>,
    ) -> StatusCode {
        //the client's identity arrives in `hint`
        let Some(psk) = hint.and_then(|identity| rules.psk_key(identity)) else {
            return ffi::MOSQ_ERR_PLUGIN_DEFER;
        };
        let rc = key.set(psk);
        if rc != ffi::MOSQ_ERR_SUCCESS {
            log::warn!("{:?} psk key for {:?} exceeds {} bytes", client.id(), hint, key.capacity());
        }
        rc
    }

    fn disconnect(&self, _rules: &Rules, client: &Client<'_>, reason: c_int) -> StatusCode {
        log::debug!("{:?} disconnected, address: {:?}, reason: {}", client.id(), client.address(), reason);
        ffi::MOSQ_ERR_SUCCESS
    }
}
