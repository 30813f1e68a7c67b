/// Application-level constants
pub const APP_NAME: &str = "MPR Monitor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default horizon for MPR projections, in days.
pub const DEFAULT_HORIZON_DAYS: u32 = 365;

/// Log filter used when `RUST_LOG` is not set.
/// Dependencies log at `warn`, this crate at `info`; per-drug detail needs
/// `RUST_LOG=mpr_monitor_lib=debug`.
pub fn default_log_filter() -> &'static str {
    "warn,mpr_monitor_lib=info"
}
