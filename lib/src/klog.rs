use core::ffi::c_int;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::RwLock;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl KlogLevel {
    fn tag(self) -> &'static str {
        match self {
            KlogLevel::Error => "E",
            KlogLevel::Warn => "W",
            KlogLevel::Info => "I",
            KlogLevel::Debug => "D",
            KlogLevel::Trace => "T",
        }
    }
}

/// Destination for log output, supplied by the host (debug port, ring
/// buffer, test capture). Called with the record split into fragments.
pub trait KlogSink: Sync {
    fn write_str(&self, text: &str);
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(KlogLevel::Info as u8);
static SINK: RwLock<Option<&'static dyn KlogSink>> = RwLock::new(None);

#[inline(always)]
fn is_enabled(level: KlogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

pub fn log_args(level: KlogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    let Some(sink) = *SINK.read() else {
        return;
    };

    struct KlogWriter(&'static dyn KlogSink);
    impl fmt::Write for KlogWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0.write_str(s);
            Ok(())
        }
    }

    let mut writer = KlogWriter(sink);
    let _ = fmt::write(&mut writer, format_args!("[ksrt:{}] ", level.tag()));
    let _ = fmt::write(&mut writer, args);
    sink.write_str("\n");
}

pub fn klog_attach_sink(sink: &'static dyn KlogSink) {
    *SINK.write() = Some(sink);
}
pub fn klog_detach_sink() {
    *SINK.write() = None;
}
pub fn klog_set_level(level: KlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}
pub fn klog_is_enabled(level: KlogLevel) -> c_int {
    if is_enabled(level) { 1 } else { 0 }
}

#[macro_export]
macro_rules! klog_error {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_info {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;

    struct Capture(Mutex<String>);

    impl KlogSink for Capture {
        fn write_str(&self, text: &str) {
            self.0.lock().unwrap().push_str(text);
        }
    }

    static CAPTURE: Capture = Capture(Mutex::new(String::new()));

    // Level and sink are process-wide, so everything lives in one test.
    #[test]
    fn records_are_filtered_and_prefixed() {
        klog_info!("dropped {}", 0);

        klog_attach_sink(&CAPTURE);
        klog_info!("table ran {} slots", 3);
        klog_debug!("hidden at info level");
        assert_eq!(klog_is_enabled(KlogLevel::Debug), 0);
        klog_set_level(KlogLevel::Debug);
        assert_eq!(klog_is_enabled(KlogLevel::Debug), 1);
        assert_eq!(klog_is_enabled(KlogLevel::Trace), 0);
        klog_debug!("now visible");
        klog_detach_sink();
        klog_error!("after detach");
        klog_set_level(KlogLevel::Info);

        let out = CAPTURE.0.lock().unwrap().clone();
        assert_eq!(out, "[ksrt:I] table ran 3 slots\n[ksrt:D] now visible\n");
    }
}
