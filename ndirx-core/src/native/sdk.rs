//! NDI runtime backend.
//!
//! Loads the NDI library with `libloading` at runtime rather than linking
//! it, so binaries build and start on machines without the SDK and fail
//! with [`NdiError::Library`] only when this backend is requested.
//!
//! # Library lookup
//!
//! 1. An explicit path passed to [`SdkBackend::load_from`].
//! 2. `$NDI_RUNTIME_DIR_V6/<lib>` or `$NDI_RUNTIME_DIR_V5/<lib>`.
//! 3. The bare library name, resolved by the OS loader.
//!
//! # Safety
//!
//! All unsafe FFI calls are confined to this module. Each raw instance
//! is wrapped in a newtype that only this module can construct.

use std::ffi::{CStr, CString, OsStr, c_char, c_void};
use std::path::{Path, PathBuf};
use std::{ptr, slice};

use libloading::Library;
use tracing::{debug, warn};

use super::Backend;
use super::types::{FindSettings, FrameType, RecvSettings, Source, VideoFrameV2};
use crate::error::NdiError;

#[cfg(target_os = "windows")]
const LIBRARY_NAME: &str = "Processing.NDI.Lib.x64.dll";
#[cfg(target_os = "macos")]
const LIBRARY_NAME: &str = "libndi.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_NAME: &str = "libndi.so.6";

const RUNTIME_DIR_VARS: [&str; 2] = ["NDI_RUNTIME_DIR_V6", "NDI_RUNTIME_DIR_V5"];

// ── C layouts ────────────────────────────────────────────────────

type Instance = *mut c_void;

#[repr(C)]
struct NdiSource {
    p_ndi_name: *const c_char,
    p_url_address: *const c_char,
}

#[repr(C)]
struct FindCreate {
    show_local_sources: bool,
    p_groups: *const c_char,
    p_extra_ips: *const c_char,
}

#[repr(C)]
struct RecvCreateV3 {
    source_to_connect_to: NdiSource,
    color_format: i32,
    bandwidth: i32,
    allow_video_fields: bool,
    p_ndi_recv_name: *const c_char,
}

#[repr(C)]
struct SendCreate {
    p_ndi_name: *const c_char,
    p_groups: *const c_char,
    clock_video: bool,
    clock_audio: bool,
}

/// Function table resolved from the library.
struct Api {
    initialize: unsafe extern "C" fn() -> bool,
    destroy: unsafe extern "C" fn(),
    find_create_v2: unsafe extern "C" fn(*const FindCreate) -> Instance,
    find_destroy: unsafe extern "C" fn(Instance),
    find_get_current_sources: unsafe extern "C" fn(Instance, *mut u32) -> *const NdiSource,
    recv_create_v3: unsafe extern "C" fn(*const RecvCreateV3) -> Instance,
    recv_destroy: unsafe extern "C" fn(Instance),
    recv_capture_v2:
        unsafe extern "C" fn(Instance, *mut VideoFrameV2, *mut c_void, *mut c_void, u32) -> i32,
    recv_free_video_v2: unsafe extern "C" fn(Instance, *const VideoFrameV2),
    send_create: unsafe extern "C" fn(*const SendCreate) -> Instance,
    send_destroy: unsafe extern "C" fn(Instance),
}

/// Resolve one exported function.
///
/// # Safety
///
/// `T` must match the exported function's real signature.
unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, NdiError> {
    let sym = unsafe { lib.get::<T>(name) }?;
    Ok(*sym)
}

// ── Raw instances ────────────────────────────────────────────────

#[derive(Debug)]
pub struct SdkFind(Instance);

#[derive(Debug)]
pub struct SdkRecv(Instance);

#[derive(Debug)]
pub struct SdkSend(Instance);

/// Iterator over the library-owned source array.
pub struct SdkSources<'a> {
    inner: slice::Iter<'a, NdiSource>,
}

impl<'a> Iterator for SdkSources<'a> {
    type Item = Source<'a>;

    fn next(&mut self) -> Option<Source<'a>> {
        loop {
            let raw = self.inner.next()?;
            if raw.p_ndi_name.is_null() {
                continue;
            }
            // SAFETY: the library guarantees NUL-terminated strings that live
            // until the next query on this find instance; `'a` borrows it.
            let name = unsafe { CStr::from_ptr(raw.p_ndi_name) };
            let url = if raw.p_url_address.is_null() {
                c""
            } else {
                unsafe { CStr::from_ptr(raw.p_url_address) }
            };
            match (name.to_str(), url.to_str()) {
                (Ok(name), Ok(url_address)) => return Some(Source { name, url_address }),
                _ => debug!("skipping source with non UTF-8 name or address"),
            }
        }
    }
}

// ── SdkBackend ───────────────────────────────────────────────────

/// Backend bound to a loaded NDI runtime library.
pub struct SdkBackend {
    api: Api,
    _lib: Library,
}

impl SdkBackend {
    /// Load from the default location (see module docs).
    pub fn load() -> Result<Self, NdiError> {
        Self::load_from(Self::default_library_path())
    }

    /// Load the library at `path` and initialise it.
    pub fn load_from(path: impl AsRef<OsStr>) -> Result<Self, NdiError> {
        let path = path.as_ref();
        debug!("loading NDI runtime from {}", Path::new(path).display());

        // SAFETY: loading runs the library's initialisers; the NDI runtime
        // has none with preconditions. Signatures below follow the v5 headers.
        let lib = unsafe { Library::new(path) }?;
        let api = unsafe {
            Api {
                initialize: symbol(&lib, b"NDIlib_initialize\0")?,
                destroy: symbol(&lib, b"NDIlib_destroy\0")?,
                find_create_v2: symbol(&lib, b"NDIlib_find_create_v2\0")?,
                find_destroy: symbol(&lib, b"NDIlib_find_destroy\0")?,
                find_get_current_sources: symbol(&lib, b"NDIlib_find_get_current_sources\0")?,
                recv_create_v3: symbol(&lib, b"NDIlib_recv_create_v3\0")?,
                recv_destroy: symbol(&lib, b"NDIlib_recv_destroy\0")?,
                recv_capture_v2: symbol(&lib, b"NDIlib_recv_capture_v2\0")?,
                recv_free_video_v2: symbol(&lib, b"NDIlib_recv_free_video_v2\0")?,
                send_create: symbol(&lib, b"NDIlib_send_create\0")?,
                send_destroy: symbol(&lib, b"NDIlib_send_destroy\0")?,
            }
        };

        if !unsafe { (api.initialize)() } {
            return Err(NdiError::Library(
                "NDIlib_initialize failed (unsupported CPU?)".into(),
            ));
        }

        Ok(Self { api, _lib: lib })
    }

    /// Where [`load`](Self::load) looks for the library.
    pub fn default_library_path() -> PathBuf {
        RUNTIME_DIR_VARS
            .iter()
            .find_map(std::env::var_os)
            .map(|dir| Path::new(&dir).join(LIBRARY_NAME))
            .unwrap_or_else(|| PathBuf::from(LIBRARY_NAME))
    }
}

impl Drop for SdkBackend {
    fn drop(&mut self) {
        // SAFETY: every handle holds an `Rc` to this backend, so none is alive.
        unsafe { (self.api.destroy)() };
    }
}

fn optional_cstring(value: Option<&str>, what: &str) -> Option<Option<CString>> {
    match value.filter(|v| !v.is_empty()).map(CString::new).transpose() {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("{what} contains a NUL byte: {e}");
            None
        }
    }
}

fn as_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |c| c.as_ptr())
}

impl Backend for SdkBackend {
    type Find = SdkFind;
    type Recv = SdkRecv;
    type Send = SdkSend;
    type Sources<'a> = SdkSources<'a>;

    fn find_create(&self, settings: &FindSettings) -> Option<SdkFind> {
        let groups = optional_cstring(settings.groups.as_deref(), "group list")?;
        let extra_ips = optional_cstring(settings.extra_ips.as_deref(), "extra IP list")?;
        let create = FindCreate {
            show_local_sources: settings.show_local_sources,
            p_groups: as_ptr(&groups),
            p_extra_ips: as_ptr(&extra_ips),
        };
        // SAFETY: `create` and its strings outlive the call.
        let inst = unsafe { (self.api.find_create_v2)(&create) };
        (!inst.is_null()).then_some(SdkFind(inst))
    }

    fn find_destroy(&self, find: &mut SdkFind) {
        unsafe { (self.api.find_destroy)(find.0) };
    }

    fn find_current_sources<'a>(&'a self, find: &'a mut SdkFind) -> SdkSources<'a> {
        let mut count = 0u32;
        let array = unsafe { (self.api.find_get_current_sources)(find.0, &mut count) };
        let sources: &'a [NdiSource] = if array.is_null() || count == 0 {
            &[]
        } else {
            // SAFETY: the array holds `count` entries and stays valid until
            // the next call on `find`, which needs a fresh `&mut` borrow.
            unsafe { slice::from_raw_parts(array, count as usize) }
        };
        SdkSources {
            inner: sources.iter(),
        }
    }

    fn recv_create(&self, source: &Source<'_>, settings: &RecvSettings) -> Option<SdkRecv> {
        let name = optional_cstring(Some(source.name), "source name")?;
        let url = optional_cstring(Some(source.url_address), "source address")?;
        let recv_name = optional_cstring(settings.receiver_name.as_deref(), "receiver name")?;
        let create = RecvCreateV3 {
            source_to_connect_to: NdiSource {
                p_ndi_name: as_ptr(&name),
                p_url_address: as_ptr(&url),
            },
            color_format: settings.color_format.to_raw(),
            bandwidth: settings.bandwidth.to_raw(),
            allow_video_fields: settings.allow_video_fields,
            p_ndi_recv_name: as_ptr(&recv_name),
        };
        // SAFETY: `create` and its strings outlive the call; the library
        // copies what it keeps.
        let inst = unsafe { (self.api.recv_create_v3)(&create) };
        (!inst.is_null()).then_some(SdkRecv(inst))
    }

    fn recv_destroy(&self, recv: &mut SdkRecv) {
        unsafe { (self.api.recv_destroy)(recv.0) };
    }

    fn recv_capture_video(
        &self,
        recv: &mut SdkRecv,
        frame: &mut VideoFrameV2,
        timeout_ms: u32,
    ) -> FrameType {
        // Null audio/metadata pointers: only video is requested.
        let raw = unsafe {
            (self.api.recv_capture_v2)(
                recv.0,
                frame,
                ptr::null_mut(),
                ptr::null_mut(),
                timeout_ms,
            )
        };
        FrameType::from_raw(raw)
    }

    unsafe fn recv_free_video(&self, recv: &mut SdkRecv, frame: &VideoFrameV2) {
        unsafe { (self.api.recv_free_video_v2)(recv.0, frame) };
    }

    fn send_create(&self, name: &str) -> Option<SdkSend> {
        let name = optional_cstring(Some(name), "sender name")?;
        let create = SendCreate {
            p_ndi_name: as_ptr(&name),
            p_groups: ptr::null(),
            clock_video: false,
            clock_audio: false,
        };
        let inst = unsafe { (self.api.send_create)(&create) };
        (!inst.is_null()).then_some(SdkSend(inst))
    }

    fn send_destroy(&self, send: &mut SdkSend) {
        unsafe { (self.api.send_destroy)(send.0) };
    }
}

// ── Tests ────────────────────────────────────────────────────────
