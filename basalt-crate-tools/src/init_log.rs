use std::io::Write;

/// 初始化全局 logger
///
/// 默认等级是 Info，可以通过 RUST_LOG 环境变量覆盖。
pub fn init_log() {
    env_logger::Builder::new()
        .format(|buf, record| {
            let base_style = buf.default_level_style(log::Level::Info);
            let level_style = match record.level() {
                log::Level::Info => base_style.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
                log::Level::Warn => base_style.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
                log::Level::Error => base_style.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = base_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let line = record.line().unwrap_or(!0);
            let file = record.file().unwrap_or("").split(['/', '\\']).next_back().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} {}",
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
