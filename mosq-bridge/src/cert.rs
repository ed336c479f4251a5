use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_char;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----\n";
const PEM_END: &str = "-----END CERTIFICATE-----\n";
const PEM_LINE: usize = 64;

/// PEM text of a client certificate in its own NUL-terminated heap buffer.
///
/// The buffer never aliases broker memory. Whoever holds it owns it; once handed across the
/// boundary with [`CertificateBuffer::into_raw`] it must come back through
/// [`CertificateBuffer::from_raw`] exactly once to be released.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBuffer(CString);

impl CertificateBuffer {
    /// PEM-encodes a DER certificate. `None` for empty input or when the buffer cannot be
    /// allocated.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        if der.is_empty() {
            return None;
        }
        let body_len = base64::encoded_len(der.len(), true)?;
        let mut body = try_zeroed(body_len)?;
        let written = STANDARD.encode_slice(der, &mut body).ok()?;
        body.truncate(written);

        let lines = body.len().div_ceil(PEM_LINE);
        //room for the terminator, so the conversion below does not grow the buffer
        let pem_len = (PEM_BEGIN.len() + PEM_END.len() + lines + 1).checked_add(body.len())?;
        let mut pem = try_with_capacity(pem_len)?;
        pem.extend_from_slice(PEM_BEGIN.as_bytes());
        for line in body.chunks(PEM_LINE) {
            pem.extend_from_slice(line);
            pem.push(b'\n');
        }
        pem.extend_from_slice(PEM_END.as_bytes());
        CString::new(pem).ok().map(CertificateBuffer)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        //only ever built from ASCII
        self.0.to_str().unwrap_or_default()
    }

    #[inline]
    pub fn as_c_str(&self) -> &CStr {
        &self.0
    }

    /// Length of the PEM text, without the terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transfers ownership to the caller.
    #[inline]
    pub fn into_raw(self) -> *mut c_char {
        self.0.into_raw()
    }

    /// Takes back a buffer released by [`CertificateBuffer::into_raw`].
    ///
    /// # Safety
    /// `ptr` must come from `into_raw` and must not be used afterwards.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut c_char) -> Self {
        CertificateBuffer(CString::from_raw(ptr))
    }
}

/// An empty buffer holding `capacity` bytes, `None` if the allocation fails.
#[inline]
pub(crate) fn try_with_capacity(capacity: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity).ok()?;
    Some(buf)
}

/// `len` zero bytes, `None` if the allocation fails.
#[inline]
pub(crate) fn try_zeroed(len: usize) -> Option<Vec<u8>> {
    let mut buf = try_with_capacity(len)?;
    buf.resize(len, 0);
    Some(buf)
}

impl fmt::Debug for CertificateBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateBuffer({} bytes)", self.len())
    }
}

impl fmt::Display for CertificateBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
