//! Runtime symbol providers for third-party crates.
//!
//! `embassy-sync` guards the log channel with a critical section; on the
//! device the acquire/release symbols are provided here, backed by one
//! process-wide mutex. Nesting on the same thread only bumps a depth count.
//! Host builds get theirs from `critical-section`'s `std` feature.
//!
//! `async_io_mini::Timer` runs on the embassy-time driver, which needs
//! `_embassy_time_now` and `_embassy_time_schedule_wake` on every target.
//! Ticks are microseconds (the driver's default 1 MHz rate).

use core::task::Waker;
use core::time::Duration;

#[cfg(target_os = "espidf")]
use core::cell::{Cell, RefCell};
#[cfg(target_os = "espidf")]
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(target_os = "espidf")]
static CRITICAL_SECTION_MUTEX: Mutex<()> = Mutex::new(());

#[cfg(target_os = "espidf")]
thread_local! {
    static CRITICAL_SECTION_DEPTH: Cell<u8> = const { Cell::new(0) };
    static CRITICAL_SECTION_GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    CRITICAL_SECTION_DEPTH.with(|depth| {
        let d = depth.get();
        if d == 0 {
            let lock = CRITICAL_SECTION_MUTEX
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            CRITICAL_SECTION_GUARD.with(|guard| *guard.borrow_mut() = Some(lock));
        }
        let new_depth = d.saturating_add(1);
        depth.set(new_depth);
        new_depth
    })
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    CRITICAL_SECTION_DEPTH.with(|depth| {
        let d = depth.get();
        if d == 0 {
            return;
        }
        depth.set(d - 1);
        if d == 1 {
            CRITICAL_SECTION_GUARD.with(|guard| *guard.borrow_mut() = None);
        }
    });
}

// ── Time driver ──────────────────────────────────────────────

// Signatures match the driver's `extern "Rust"` declarations.

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub fn _embassy_time_now() -> u64 {
    // SAFETY: plain read of the ESP-IDF high-resolution timer.
    unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
}

/// Microseconds since the first call in this process.
#[cfg(not(target_os = "espidf"))]
#[unsafe(no_mangle)]
pub fn _embassy_time_now() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// Wake `waker` once the clock reaches `at`.
#[unsafe(no_mangle)]
pub fn _embassy_time_schedule_wake(at: u64, waker: &Waker) {
    let waker = waker.clone();
    std::thread::spawn(move || {
        let now = _embassy_time_now();
        if at > now {
            std::thread::sleep(Duration::from_micros(at - now));
        }
        waker.wake();
    });
}
