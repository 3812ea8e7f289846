//! log macro's for service subsystem logging

/// Writes a debug! message to the app::api logger
#[macro_export]
macro_rules! api_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::api", $($arg)+)
    };
}

/// Writes an info! message to the app::api logger
#[macro_export]
macro_rules! api_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::api", $($arg)+)
    };
}

/// Writes an warn! message to the app::api logger
#[macro_export]
macro_rules! api_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::api", $($arg)+)
    };
}

/// Writes an error! message to the app::api logger
#[macro_export]
macro_rules! api_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::api", $($arg)+)
    };
}

/// Writes a debug! message to the app::store logger
#[macro_export]
macro_rules! store_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::store", $($arg)+)
    };
}

/// Writes an info! message to the app::store logger
#[macro_export]
macro_rules! store_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::store", $($arg)+)
    };
}

/// Writes an warn! message to the app::store logger
#[macro_export]
macro_rules! store_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::store", $($arg)+)
    };
}

/// Writes an error! message to the app::store logger
#[macro_export]
macro_rules! store_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::store", $($arg)+)
    };
}

/// Writes a debug! message to the app::models logger
#[macro_export]
macro_rules! models_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::models", $($arg)+)
    };
}

/// Writes an warn! message to the app::models logger
#[macro_export]
macro_rules! models_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::models", $($arg)+)
    };
}

/// Writes an error! message to the app::models logger
#[macro_export]
macro_rules! models_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::models", $($arg)+)
    };
}
