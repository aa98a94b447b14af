#![no_std]

#[cfg(test)]
extern crate std;

pub mod init_flag;
pub mod klog;

pub use init_flag::InitFlag;
pub use klog::{
    KlogLevel, KlogSink, klog_attach_sink, klog_detach_sink, klog_is_enabled, klog_set_level,
};
