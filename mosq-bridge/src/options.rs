use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::slice;

use crate::ffi;

/// Plugin options as configured with `plugin_opt_*`, in broker order and unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions(Vec<(String, String)>);

impl PluginOptions {
    #[inline]
    pub fn new(opts: Vec<(String, String)>) -> Self {
        PluginOptions(opts)
    }

    /// Copies the broker's option array.
    ///
    /// # Safety
    /// `options` must be null or point to `count` valid `mosquitto_opt` entries whose strings are
    /// null or NUL terminated.
    pub unsafe fn from_raw(options: *const ffi::mosquitto_opt, count: c_int) -> Self {
        if options.is_null() || count <= 0 {
            return PluginOptions::default();
        }
        let opts = slice::from_raw_parts(options, count as usize);
        PluginOptions(opts.iter().map(|o| (to_string(o.key), to_string(o.value))).collect())
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PluginOptions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        PluginOptions(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[inline]
unsafe fn to_string(s: *const c_char) -> String {
    if s.is_null() {
        String::new()
    } else {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    }
}
