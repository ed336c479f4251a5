use anyhow::anyhow;

use mosq_bridge::{ffi, PluginOptions, Result, StatusCode};

type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

pub const USER_PREFIX: &str = "user.";
pub const ACL_PREFIX: &str = "acl.";
pub const PSK_PREFIX: &str = "psk.";

/// Credentials, topic rules and pre-shared keys read from plugin options.
///
/// ```text
/// plugin_opt_user.alice   secret
/// plugin_opt_acl.alice    sensors/#,alerts/+
/// plugin_opt_psk.gateway  00112233aabbccdd
/// ```
#[derive(Debug, Default, Clone)]
pub struct Rules {
    users: HashMap<String, String>,
    acls: HashMap<String, Vec<String>>,
    psk_keys: HashMap<String, String>,
}

impl Rules {
    pub fn from_options(opts: &PluginOptions) -> Result<Self> {
        let mut rules = Rules::default();
        for (key, value) in opts.iter() {
            if let Some(name) = key.strip_prefix(USER_PREFIX) {
                rules.users.insert(non_empty(key, name)?.to_owned(), value.to_owned());
            } else if let Some(name) = key.strip_prefix(ACL_PREFIX) {
                let filters = value.split(',').map(str::trim).filter(|f| !f.is_empty()).map(str::to_owned);
                rules.acls.entry(non_empty(key, name)?.to_owned()).or_default().extend(filters);
            } else if let Some(identity) = key.strip_prefix(PSK_PREFIX) {
                if value.is_empty() || value.len() % 2 != 0 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(anyhow!("option {}: psk key must be an even number of hex digits", key));
                }
                rules.psk_keys.insert(non_empty(key, identity)?.to_owned(), value.to_ascii_lowercase());
            }
        }
        Ok(rules)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.acls.is_empty() && self.psk_keys.is_empty()
    }

    /// Unknown users are left to the next plugin.
    pub fn check_password(&self, username: Option<&str>, password: Option<&str>) -> StatusCode {
        let Some(expected) = username.and_then(|u| self.users.get(u)) else {
            return ffi::MOSQ_ERR_PLUGIN_DEFER;
        };
        if password == Some(expected.as_str()) {
            ffi::MOSQ_ERR_SUCCESS
        } else {
            ffi::MOSQ_ERR_AUTH
        }
    }

    /// Users without rules are left to the next plugin; otherwise one matching filter grants
    /// every kind of access.
    pub fn check_acl<F>(&self, username: Option<&str>, topic: &str, topic_matches: F) -> StatusCode
    where
        F: Fn(&str, &str) -> bool,
    {
        let Some(filters) = username.and_then(|u| self.acls.get(u)) else {
            return ffi::MOSQ_ERR_PLUGIN_DEFER;
        };
        if filters.iter().any(|f| topic_matches(f.as_str(), topic)) {
            ffi::MOSQ_ERR_SUCCESS
        } else {
            ffi::MOSQ_ERR_ACL_DENIED
        }
    }

    #[inline]
    pub fn psk_key(&self, identity: &str) -> Option<&str> {
        self.psk_keys.get(identity).map(String::as_str)
    }
}

fn non_empty<'a>(key: &str, name: &'a str) -> Result<&'a str> {
    if name.is_empty() {
        Err(anyhow!("option {}: missing name", key))
    } else {
        Ok(name)
    }
}
