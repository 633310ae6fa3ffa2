//! Memory probes, the reset line and the supervisor task.

use core::alloc::{GlobalAlloc, Layout};
use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicUsize, Ordering};

use cortex_m::peripheral::SCB;
use embassy_executor::task;
use embassy_nrf::wdt::WatchdogHandle;
use embassy_time::{Duration, Instant, Timer};
use embedded_alloc::LlffHeap;

use crate::beacon::config::HEALTH_CHECK_INTERVAL;
use crate::beacon::supervisor::{Platform, RestartReason, Supervisor, Unit};

pub const HEAP_SIZE: usize = 16 * 1024;

const STACK_PAINT: u32 = 0xC0FF_EE00;
/// Left unpainted below the live frame of the painting function.
const STACK_PAINT_MARGIN: usize = 512;

extern "C" {
    // cortex-m-rt: first address past .bss/.uninit, where the stack region ends.
    static mut __sheap: u32;
}

/// `LlffHeap` that remembers the least free space it has ever had.
pub struct TrackingHeap {
    heap: LlffHeap,
    min_free: AtomicUsize,
}

impl TrackingHeap {
    pub const fn empty() -> Self {
        Self {
            heap: LlffHeap::empty(),
            min_free: AtomicUsize::new(0),
        }
    }

    pub fn used(&self) -> usize {
        self.heap.used()
    }

    pub fn min_free(&self) -> usize {
        self.min_free.load(Ordering::Relaxed)
    }
}

unsafe impl GlobalAlloc for TrackingHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.heap.alloc(layout);
        self.min_free.fetch_min(self.heap.free(), Ordering::Relaxed);
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.heap.dealloc(ptr, layout)
    }
}

#[global_allocator]
pub static HEAP: TrackingHeap = TrackingHeap::empty();

pub fn init_heap() {
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    unsafe { HEAP.heap.init(addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
    HEAP.min_free.store(HEAP_SIZE, Ordering::Relaxed);
}

/// Fills the unused part of the main stack with a marker so that
/// [`stack_headroom`] can find the deepest point it ever reached.
pub fn paint_stack() {
    let bottom = unsafe { addr_of_mut!(__sheap) } as usize;
    let top = (cortex_m::register::msp::read() as usize).saturating_sub(STACK_PAINT_MARGIN);

    let mut word = bottom as *mut u32;
    while (word as usize) < top {
        unsafe {
            word.write_volatile(STACK_PAINT);
            word = word.add(1);
        }
    }
}

/// Bytes of the main stack that have never been written since boot.
pub fn stack_headroom() -> usize {
    let bottom = unsafe { addr_of_mut!(__sheap) } as usize;
    let top = cortex_m::register::msp::read() as usize;

    let mut word = bottom as *const u32;
    while (word as usize) < top && unsafe { word.read_volatile() } == STACK_PAINT {
        word = unsafe { word.add(1) };
    }
    word as usize - bottom
}

/// nRF52840 probes. Every embassy task is polled on the one main stack, so
/// all units report the same headroom.
pub struct NrfPlatform;

impl Platform for NrfPlatform {
    fn stack_headroom(&self, _unit: Unit) -> usize {
        stack_headroom()
    }

    fn min_free_heap(&self) -> usize {
        HEAP.min_free()
    }

    fn restart(&mut self, reason: RestartReason) {
        defmt::error!("Restarting: {:?}", reason);
        SCB::sys_reset();
    }
}

#[task]
pub async fn supervisor_task(mut watchdog: WatchdogHandle) {
    let mut supervisor = Supervisor::new(NrfPlatform);

    loop {
        let uptime = Duration::from_ticks(Instant::now().as_ticks());
        supervisor.health_check(uptime);
        watchdog.pet();
        Timer::after(HEALTH_CHECK_INTERVAL).await;
    }
}
