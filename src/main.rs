fn main() {
    // Logging on level `info` by default, with the bot's own module
    // turned up, unless `RUST_LOG` says otherwise.
    let log_level = std::env::var_os("RUST_LOG")
        .and_then(|value| value.into_string().ok())
        .unwrap_or_else(|| String::from("info,channel_guard_bot=debug"));

    // Journald stamps its own timestamps onto everything.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);
    builder.init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the async runtime!")
        .block_on(channel_guard_bot::entry());
}
