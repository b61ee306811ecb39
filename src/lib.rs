#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod logger;
pub mod net;

pub use config::NetConfig;
pub use net::{Dispatch, NetError, NetStack, NicDriver};

#[macro_export]
macro_rules! nlog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::logger::log($level, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! nerror {
    ($($arg:tt)*) => {{
        $crate::nlog!($crate::logger::LogLevel::ERROR, $($arg)*);
    }};
}

#[macro_export]
macro_rules! nwarn {
    ($($arg:tt)*) => {{
        $crate::nlog!($crate::logger::LogLevel::WARN, $($arg)*);
    }};
}

#[macro_export]
macro_rules! ninfo {
    ($($arg:tt)*) => {{
        $crate::nlog!($crate::logger::LogLevel::INFO, $($arg)*);
    }};
}

#[macro_export]
macro_rules! ndebug {
    ($($arg:tt)*) => {{
        $crate::nlog!($crate::logger::LogLevel::DEBUG, $($arg)*);
    }};
}

/// Per-frame tracing, compiled out unless `debug_net` is enabled.
#[macro_export]
macro_rules! ntrace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug_net")]
        $crate::nlog!($crate::logger::LogLevel::TRACE, $($arg)*);
    }};
}
