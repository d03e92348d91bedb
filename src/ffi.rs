//! C interface
//! Opaque-handle API for embedding the dispatcher in another runtime. Only primitives,
//! C strings, byte buffers and `BleDeviceInfo` cross this boundary, and nothing unwinds
//! through it: malformed input and internal failures turn into `false`, `0` or 127.

use std::ffi::{CStr, c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;
use std::time::Duration;

use log::{LevelFilter, error, warn};

use crate::config::AppConfig;
use crate::core::bluetooth::DeviceRecord;
use crate::core::bluetooth::constants::RSSI_UNAVAILABLE;
use crate::core::dispatch::Dispatcher;
use crate::logging;

/// Device entry filled by `ble_get_scan_results`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BleDeviceInfo {
    /// `XX:XX:XX:XX:XX:XX` plus terminator
    pub address: [c_char; 19],
    pub name: [c_char; 256],
    pub rssi: c_int,
}

impl BleDeviceInfo {
    fn from_record(record: &DeviceRecord) -> Self {
        let mut info = Self {
            address: [0; 19],
            name: [0; 256],
            rssi: c_int::from(record.rssi),
        };
        copy_c_string(&record.address, &mut info.address);
        copy_c_string(&record.name, &mut info.name);
        info
    }
}

/// Copies `src` into `dst`, truncating so a terminator always fits
fn copy_c_string(src: &str, dst: &mut [c_char]) {
    let len = src.len().min(dst.len() - 1);
    for (d, s) in dst.iter_mut().zip(&src.as_bytes()[..len]) {
        *d = *s as c_char;
    }
    dst[len] = 0;
}

fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("Panic caught at the C boundary");
        fallback
    })
}

/// # Safety
/// `fw` must be null or a live handle from `ble_create`.
unsafe fn handle<'a>(fw: *mut Dispatcher) -> Option<&'a Dispatcher> {
    unsafe { fw.as_ref() }
}

/// # Safety
/// `s` must be null or a valid NUL-terminated string.
unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

fn create(config: AppConfig) -> *mut Dispatcher {
    logging::init_logging(LevelFilter::Warn);
    guard(ptr::null_mut(), || match Dispatcher::new(config) {
        Ok(dispatcher) => Box::into_raw(Box::new(dispatcher)),
        Err(e) => {
            error!("Failed to create dispatcher: {}", e);
            ptr::null_mut()
        }
    })
}

/// Creates a dispatcher, falling back to simulation when no adapter is present.
/// Returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn ble_create() -> *mut Dispatcher {
    create(AppConfig::default())
}

/// Creates a dispatcher on the simulation backend.
#[unsafe(no_mangle)]
pub extern "C" fn ble_create_simulated() -> *mut Dispatcher {
    let mut config = AppConfig::default();
    config.dispatcher.force_simulation = true;
    create(config)
}

/// Shuts the dispatcher down and frees it. Blocks until both workers have exited.
///
/// # Safety
/// `fw` must be null or a handle from `ble_create` not yet destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_destroy(fw: *mut Dispatcher) {
    if fw.is_null() {
        return;
    }
    let dispatcher = unsafe { Box::from_raw(fw) };
    guard((), move || drop(dispatcher));
}

/// Scans for `duration_ms` milliseconds and fills the discovery cache.
///
/// # Safety
/// `fw` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_scan(fw: *mut Dispatcher, duration_ms: c_int) -> bool {
    let Some(dispatcher) = (unsafe { handle(fw) }) else {
        return false;
    };
    let Ok(duration_ms) = u64::try_from(duration_ms) else {
        warn!("Negative scan duration {}", duration_ms);
        return false;
    };
    guard(false, || {
        dispatcher
            .scan(Duration::from_millis(duration_ms))
            .inspect_err(|e| error!("Scan failed: {}", e))
            .is_ok()
    })
}

/// Copies up to `max_results` cached devices into `results`. Returns the count written.
///
/// # Safety
/// `fw` must be null or a live handle; `results` must be null or point to at least
/// `max_results` writable entries.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_get_scan_results(
    fw: *mut Dispatcher,
    results: *mut BleDeviceInfo,
    max_results: c_int,
) -> c_int {
    let Some(dispatcher) = (unsafe { handle(fw) }) else {
        return 0;
    };
    if results.is_null() || max_results <= 0 {
        return 0;
    }

    let records = guard(Vec::new(), || {
        dispatcher.get_scan_results(max_results as usize)
    });
    for (i, record) in records.iter().enumerate() {
        unsafe { results.add(i).write(BleDeviceInfo::from_record(record)) };
    }
    records.len() as c_int
}

/// Queues a connect. Returns once queued, not once connected.
///
/// # Safety
/// `fw` must be null or a live handle; `address` must be null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_connect(fw: *mut Dispatcher, address: *const c_char) -> bool {
    let (Some(dispatcher), Some(address)) = (unsafe { handle(fw) }, unsafe { str_arg(address) })
    else {
        return false;
    };
    guard(false, || dispatcher.connect(address).is_ok())
}

/// Queues a disconnect.
///
/// # Safety
/// `fw` must be null or a live handle; `address` must be null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_disconnect(fw: *mut Dispatcher, address: *const c_char) -> bool {
    let (Some(dispatcher), Some(address)) = (unsafe { handle(fw) }, unsafe { str_arg(address) })
    else {
        return false;
    };
    guard(false, || dispatcher.disconnect(address).is_ok())
}

/// Queues a write of `len` bytes from `data`, on the fast-path queue when `fast` is set.
///
/// # Safety
/// `fw` must be null or a live handle; string arguments must be null or C strings;
/// `data` must point to `len` readable bytes when `len > 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_write(
    fw: *mut Dispatcher,
    address: *const c_char,
    svc: *const c_char,
    chr: *const c_char,
    data: *const u8,
    len: c_int,
    fast: bool,
) -> bool {
    let (Some(dispatcher), Some(address), Some(svc), Some(chr)) = (
        unsafe { handle(fw) },
        unsafe { str_arg(address) },
        unsafe { str_arg(svc) },
        unsafe { str_arg(chr) },
    ) else {
        return false;
    };
    let payload: &[u8] = match len {
        0 => &[],
        n if n > 0 && !data.is_null() => unsafe { slice::from_raw_parts(data, n as usize) },
        _ => return false,
    };
    guard(false, || {
        dispatcher.write(address, svc, chr, payload, fast).is_ok()
    })
}

/// Signal strength of a device, or 127 when unavailable.
///
/// # Safety
/// `fw` must be null or a live handle; `address` must be null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_get_rssi(fw: *mut Dispatcher, address: *const c_char) -> c_int {
    let unavailable = c_int::from(RSSI_UNAVAILABLE);
    let (Some(dispatcher), Some(address)) = (unsafe { handle(fw) }, unsafe { str_arg(address) })
    else {
        return unavailable;
    };
    guard(unavailable, || {
        dispatcher
            .query_rssi(address)
            .map(c_int::from)
            .unwrap_or(unavailable)
    })
}

/// Requests an ATT MTU for a device.
///
/// # Safety
/// `fw` must be null or a live handle; `address` must be null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ble_set_mtu(fw: *mut Dispatcher, address: *const c_char, mtu: c_int) -> bool {
    let (Some(dispatcher), Some(address)) = (unsafe { handle(fw) }, unsafe { str_arg(address) })
    else {
        return false;
    };
    guard(false, || {
        dispatcher
            .set_mtu(address, i64::from(mtu))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn read_c_string(buf: &[c_char]) -> String {
        let bytes: Vec<u8> = buf.iter().take_while(|&&b| b != 0).map(|&b| b as u8).collect();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_simulated_round_trip() {
        let fw = ble_create_simulated();
        assert!(!fw.is_null());

        unsafe {
            assert!(ble_scan(fw, 1000));

            let mut results = [BleDeviceInfo {
                address: [0; 19],
                name: [0; 256],
                rssi: 0,
            }; 4];
            let count = ble_get_scan_results(fw, results.as_mut_ptr(), 4);
            assert_eq!(count, 2);
            assert_eq!(read_c_string(&results[0].address), "11:22:33:44:55:66");
            assert_eq!(read_c_string(&results[0].name), "MockDevice_2");
            assert_eq!(results[0].rssi, -75);
            assert_eq!(ble_get_scan_results(fw, results.as_mut_ptr(), 1), 1);

            let address = c("AA:BB:CC:DD:EE:FF");
            assert!(ble_connect(fw, address.as_ptr()));
            let data = [0x01u8, 0x02];
            assert!(ble_write(
                fw,
                address.as_ptr(),
                c("180D").as_ptr(),
                c("2A37").as_ptr(),
                data.as_ptr(),
                data.len() as c_int,
                true,
            ));
            assert_eq!(ble_get_rssi(fw, address.as_ptr()), -55);
            assert!(ble_set_mtu(fw, address.as_ptr(), 247));
            assert!(ble_disconnect(fw, address.as_ptr()));

            ble_destroy(fw);
        }
    }

    #[test]
    fn test_bad_arguments_return_false() {
        let fw = ble_create_simulated();
        unsafe {
            let bad = c("not-an-address");
            assert!(!ble_connect(fw, bad.as_ptr()));
            assert!(!ble_connect(fw, ptr::null()));
            assert!(!ble_connect(ptr::null_mut(), c("AA:BB:CC:DD:EE:FF").as_ptr()));
            assert_eq!(ble_get_rssi(fw, bad.as_ptr()), 127);
            assert!(!ble_set_mtu(fw, c("AA:BB:CC:DD:EE:FF").as_ptr(), 5));
            assert!(!ble_scan(fw, -1));
            assert_eq!(ble_get_scan_results(fw, ptr::null_mut(), 4), 0);
            assert!(!ble_write(
                fw,
                c("AA:BB:CC:DD:EE:FF").as_ptr(),
                c("180D").as_ptr(),
                c("2A37").as_ptr(),
                ptr::null(),
                2,
                false,
            ));
            ble_destroy(fw);
            ble_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_long_name_is_terminated() {
        let record = DeviceRecord::new("AA:BB:CC:DD:EE:FF", "x".repeat(255), -1);
        let info = BleDeviceInfo::from_record(&record);
        assert_eq!(info.name[255], 0);
        assert_eq!(read_c_string(&info.name).len(), 255);
        assert_eq!(read_c_string(&info.address), "AA:BB:CC:DD:EE:FF");
    }
}
