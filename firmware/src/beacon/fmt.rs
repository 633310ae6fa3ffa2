//! Logging shim for the engine.
//!
//! On target these forward to `defmt`. Host builds (`host-test`) have no
//! global logger, so the arguments are only borrowed to keep them "used".

#![allow(unused_macros)]

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(not(feature = "host-test"))]
        ::defmt::debug!($s $(, $x)*);
        #[cfg(feature = "host-test")]
        let _ = ($(&$x,)*);
    }};
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(not(feature = "host-test"))]
        ::defmt::info!($s $(, $x)*);
        #[cfg(feature = "host-test")]
        let _ = ($(&$x,)*);
    }};
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(not(feature = "host-test"))]
        ::defmt::warn!($s $(, $x)*);
        #[cfg(feature = "host-test")]
        let _ = ($(&$x,)*);
    }};
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(not(feature = "host-test"))]
        ::defmt::error!($s $(, $x)*);
        #[cfg(feature = "host-test")]
        let _ = ($(&$x,)*);
    }};
}
